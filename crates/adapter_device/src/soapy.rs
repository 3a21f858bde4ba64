//! SoapySDR backend over the C API.
//!
//! Links against `libSoapySDR` (see `build.rs`). Only the calls needed for
//! loopback calibration are bound.

use crate::args::DeviceArgs;
use crate::device::{CaptureDevice, FrequencyStage, GainStage, ReadResult, StatusCode, TransceiverDevice};
use crate::error::{DeviceError, DeviceResult};
use cal_core::types::{Channel, Direction};
use num_complex::{Complex32, Complex64};
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_double, c_int, c_long, c_longlong, c_void};
use std::ptr;
use std::time::Duration;
use tracing::{debug, info};

type RawDevice = c_void;
type RawStream = c_void;

const SOAPY_SDR_TX: c_int = 0;
const SOAPY_SDR_RX: c_int = 1;
const SOAPY_SDR_END_BURST: c_int = 1 << 1;
const SOAPY_SDR_CF32: &[u8] = b"CF32\0";

extern "C" {
    fn SoapySDRDevice_makeStrArgs(args: *const c_char) -> *mut RawDevice;
    fn SoapySDRDevice_unmake(device: *mut RawDevice) -> c_int;
    fn SoapySDRDevice_lastError() -> *const c_char;
    fn SoapySDRDevice_getDriverKey(device: *const RawDevice) -> *mut c_char;
    fn SoapySDRDevice_getHardwareKey(device: *const RawDevice) -> *mut c_char;
    fn SoapySDR_free(ptr: *mut c_void);
    fn SoapySDRDevice_setFrequencyComponent(
        device: *mut RawDevice,
        direction: c_int,
        channel: usize,
        name: *const c_char,
        frequency: c_double,
        args: *const c_void,
    ) -> c_int;
    fn SoapySDRDevice_setGainElement(
        device: *mut RawDevice,
        direction: c_int,
        channel: usize,
        name: *const c_char,
        value: c_double,
    ) -> c_int;
    fn SoapySDRDevice_setAntenna(
        device: *mut RawDevice,
        direction: c_int,
        channel: usize,
        name: *const c_char,
    ) -> c_int;
    fn SoapySDRDevice_setDCOffset(
        device: *mut RawDevice,
        direction: c_int,
        channel: usize,
        offset_i: c_double,
        offset_q: c_double,
    ) -> c_int;
    fn SoapySDRDevice_setIQBalance(
        device: *mut RawDevice,
        direction: c_int,
        channel: usize,
        balance_i: c_double,
        balance_q: c_double,
    ) -> c_int;
    fn SoapySDRDevice_setDCOffsetMode(
        device: *mut RawDevice,
        direction: c_int,
        channel: usize,
        automatic: bool,
    ) -> c_int;
    fn SoapySDRDevice_setMasterClockRate(device: *mut RawDevice, rate: c_double) -> c_int;
    fn SoapySDRDevice_setSampleRate(
        device: *mut RawDevice,
        direction: c_int,
        channel: usize,
        rate: c_double,
    ) -> c_int;
    fn SoapySDRDevice_writeSetting(device: *mut RawDevice, key: *const c_char, value: *const c_char) -> c_int;
    fn SoapySDRDevice_setupStream(
        device: *mut RawDevice,
        direction: c_int,
        format: *const c_char,
        channels: *const usize,
        num_chans: usize,
        args: *const c_void,
    ) -> *mut RawStream;
    fn SoapySDRDevice_activateStream(
        device: *mut RawDevice,
        stream: *mut RawStream,
        flags: c_int,
        time_ns: c_longlong,
        num_elems: usize,
    ) -> c_int;
    fn SoapySDRDevice_deactivateStream(
        device: *mut RawDevice,
        stream: *mut RawStream,
        flags: c_int,
        time_ns: c_longlong,
    ) -> c_int;
    fn SoapySDRDevice_readStream(
        device: *mut RawDevice,
        stream: *mut RawStream,
        buffs: *const *mut c_void,
        num_elems: usize,
        flags: *mut c_int,
        time_ns: *mut c_longlong,
        timeout_us: c_long,
    ) -> c_int;
    fn SoapySDRDevice_closeStream(device: *mut RawDevice, stream: *mut RawStream) -> c_int;
}

fn last_error() -> String {
    unsafe {
        let p = SoapySDRDevice_lastError();
        if p.is_null() {
            "unknown error".to_string()
        } else {
            CStr::from_ptr(p).to_string_lossy().into_owned()
        }
    }
}

fn direction_code(direction: Direction) -> c_int {
    match direction {
        Direction::Rx => SOAPY_SDR_RX,
        Direction::Tx => SOAPY_SDR_TX,
    }
}

fn c_string(operation: &str, value: &str) -> DeviceResult<CString> {
    CString::new(value).map_err(|_| DeviceError::configuration(operation, format!("embedded NUL in {value:?}")))
}

fn check(operation: &str, ret: c_int) -> DeviceResult<()> {
    if ret == 0 {
        Ok(())
    } else {
        Err(DeviceError::configuration(operation, format!("{} ({})", last_error(), ret)))
    }
}

/// Take ownership of a string allocated by the library.
unsafe fn owned_string(p: *mut c_char) -> String {
    if p.is_null() {
        return String::new();
    }
    let s = CStr::from_ptr(p).to_string_lossy().into_owned();
    SoapySDR_free(p as *mut c_void);
    s
}

/// Open receive stream on a SoapySDR device.
pub struct SoapyStream {
    raw: *mut RawStream,
    num_channels: usize,
}

/// SoapySDR device handle. Released on drop.
pub struct SoapyDevice {
    raw: *mut RawDevice,
    args: String,
}

unsafe impl Send for SoapyDevice {}

impl SoapyDevice {
    /// Open the device matching `args`.
    pub fn open(args: &DeviceArgs) -> DeviceResult<Self> {
        let text = args.to_string();
        let c_args = c_string("open", &text)?;
        let raw = unsafe { SoapySDRDevice_makeStrArgs(c_args.as_ptr()) };
        if raw.is_null() {
            return Err(DeviceError::configuration("open", last_error()));
        }
        info!(args = %text, "SoapySDR device opened");
        Ok(Self { raw, args: text })
    }
}

impl Drop for SoapyDevice {
    fn drop(&mut self) {
        unsafe { SoapySDRDevice_unmake(self.raw) };
        debug!(args = %self.args, "SoapySDR device released");
    }
}

impl CaptureDevice for SoapyDevice {
    type Stream = SoapyStream;

    fn setup_rx_stream(&mut self, channels: &[Channel]) -> DeviceResult<SoapyStream> {
        let indices: Vec<usize> = channels.iter().map(|ch| ch.index()).collect();
        let raw = unsafe {
            SoapySDRDevice_setupStream(
                self.raw,
                SOAPY_SDR_RX,
                SOAPY_SDR_CF32.as_ptr() as *const c_char,
                indices.as_ptr(),
                indices.len(),
                ptr::null(),
            )
        };
        if raw.is_null() {
            return Err(DeviceError::stream(format!("setupStream failed: {}", last_error())));
        }
        Ok(SoapyStream {
            raw,
            num_channels: indices.len(),
        })
    }

    fn activate_burst(&mut self, stream: &mut SoapyStream, num_samples: usize) -> DeviceResult<()> {
        let ret = unsafe { SoapySDRDevice_activateStream(self.raw, stream.raw, SOAPY_SDR_END_BURST, 0, num_samples) };
        if ret != 0 {
            return Err(DeviceError::stream(format!("activateStream failed: {} ({})", last_error(), ret)));
        }
        Ok(())
    }

    fn read_stream(
        &mut self,
        stream: &mut SoapyStream,
        buffers: &mut [&mut [Complex32]],
        timeout: Duration,
    ) -> ReadResult {
        if buffers.len() != stream.num_channels {
            return Err(StatusCode::NOT_SUPPORTED);
        }
        let num_elems = buffers.iter().map(|b| b.len()).min().unwrap_or(0);
        let ptrs: Vec<*mut c_void> = buffers.iter_mut().map(|b| b.as_mut_ptr() as *mut c_void).collect();
        let mut flags: c_int = 0;
        let mut time_ns: c_longlong = 0;
        let timeout_us = c_long::try_from(timeout.as_micros()).unwrap_or(c_long::MAX);

        let ret = unsafe {
            SoapySDRDevice_readStream(
                self.raw,
                stream.raw,
                ptrs.as_ptr(),
                num_elems,
                &mut flags,
                &mut time_ns,
                timeout_us,
            )
        };
        if ret < 0 {
            Err(StatusCode(ret))
        } else {
            Ok(ret as usize)
        }
    }

    fn close_stream(&mut self, stream: SoapyStream) -> DeviceResult<()> {
        unsafe { SoapySDRDevice_deactivateStream(self.raw, stream.raw, 0, 0) };
        let ret = unsafe { SoapySDRDevice_closeStream(self.raw, stream.raw) };
        if ret != 0 {
            return Err(DeviceError::stream(format!("closeStream failed: {} ({})", last_error(), ret)));
        }
        Ok(())
    }
}

impl TransceiverDevice for SoapyDevice {
    fn description(&self) -> String {
        let (driver, hardware) = unsafe {
            (
                owned_string(SoapySDRDevice_getDriverKey(self.raw)),
                owned_string(SoapySDRDevice_getHardwareKey(self.raw)),
            )
        };
        format!("{driver}:{hardware}")
    }

    fn set_frequency(
        &mut self,
        direction: Direction,
        channel: Channel,
        stage: FrequencyStage,
        freq_hz: f64,
    ) -> DeviceResult<()> {
        let name = c_string("set_frequency", stage.name())?;
        let ret = unsafe {
            SoapySDRDevice_setFrequencyComponent(
                self.raw,
                direction_code(direction),
                channel.index(),
                name.as_ptr(),
                freq_hz,
                ptr::null(),
            )
        };
        check("set_frequency", ret)
    }

    fn set_gain(&mut self, direction: Direction, channel: Channel, stage: GainStage, gain_db: f64) -> DeviceResult<()> {
        let name = c_string("set_gain", stage.name())?;
        let ret = unsafe {
            SoapySDRDevice_setGainElement(self.raw, direction_code(direction), channel.index(), name.as_ptr(), gain_db)
        };
        check("set_gain", ret)
    }

    fn set_antenna(&mut self, direction: Direction, channel: Channel, name: &str) -> DeviceResult<()> {
        let name = c_string("set_antenna", name)?;
        let ret = unsafe { SoapySDRDevice_setAntenna(self.raw, direction_code(direction), channel.index(), name.as_ptr()) };
        check("set_antenna", ret)
    }

    fn set_dc_offset(&mut self, direction: Direction, channel: Channel, offset: Complex64) -> DeviceResult<()> {
        let ret = unsafe {
            SoapySDRDevice_setDCOffset(self.raw, direction_code(direction), channel.index(), offset.re, offset.im)
        };
        check("set_dc_offset", ret)
    }

    fn set_iq_balance(&mut self, direction: Direction, channel: Channel, balance: Complex64) -> DeviceResult<()> {
        let ret = unsafe {
            SoapySDRDevice_setIQBalance(self.raw, direction_code(direction), channel.index(), balance.re, balance.im)
        };
        check("set_iq_balance", ret)
    }

    fn set_dc_offset_mode(&mut self, direction: Direction, channel: Channel, automatic: bool) -> DeviceResult<()> {
        let ret =
            unsafe { SoapySDRDevice_setDCOffsetMode(self.raw, direction_code(direction), channel.index(), automatic) };
        check("set_dc_offset_mode", ret)
    }

    fn set_master_clock_rate(&mut self, rate_hz: f64) -> DeviceResult<()> {
        let ret = unsafe { SoapySDRDevice_setMasterClockRate(self.raw, rate_hz) };
        check("set_master_clock_rate", ret)
    }

    fn set_sample_rate(&mut self, direction: Direction, channel: Channel, rate_hz: f64) -> DeviceResult<()> {
        let ret = unsafe { SoapySDRDevice_setSampleRate(self.raw, direction_code(direction), channel.index(), rate_hz) };
        check("set_sample_rate", ret)
    }

    fn write_setting(&mut self, key: &str, value: &str) -> DeviceResult<()> {
        let c_key = c_string("write_setting", key)?;
        let c_value = c_string("write_setting", value)?;
        let ret = unsafe { SoapySDRDevice_writeSetting(self.raw, c_key.as_ptr(), c_value.as_ptr()) };
        check("write_setting", ret)
    }
}
