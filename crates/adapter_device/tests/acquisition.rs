//! Acquisition behaviour against scripted and simulated devices.

use adapter_device::{
    acquire, AcquisitionOptions, CancelToken, CaptureDevice, CaptureSession, DeviceError, DeviceResult, ReadResult,
    SimulatedLoopback, StatusCode,
};
use approx::assert_abs_diff_eq;
use cal_core::types::Channel;
use num_complex::{Complex32, Complex64};
use std::collections::VecDeque;
use std::time::Duration;

// ============================================================
// Scripted device
// ============================================================

/// One scripted read: a chunk length, or a status.
#[derive(Debug, Clone, Copy)]
enum Step {
    Chunk(usize),
    Status(StatusCode),
}

/// Replays a fixed read script. Channel A carries `k + 1 + 2j`, channel B
/// carries `-k + 0.5j`, where `k` is the running sample index.
struct ScriptedDevice {
    script: VecDeque<Step>,
    cursor: usize,
    activated: Vec<usize>,
    closed: usize,
}

impl ScriptedDevice {
    fn new(steps: &[Step]) -> Self {
        Self {
            script: steps.iter().copied().collect(),
            cursor: 0,
            activated: Vec::new(),
            closed: 0,
        }
    }
}

impl CaptureDevice for ScriptedDevice {
    type Stream = ();

    fn setup_rx_stream(&mut self, channels: &[Channel]) -> DeviceResult<()> {
        assert_eq!(channels, &Channel::ALL);
        Ok(())
    }

    fn activate_burst(&mut self, _stream: &mut (), num_samples: usize) -> DeviceResult<()> {
        self.activated.push(num_samples);
        Ok(())
    }

    fn read_stream(&mut self, _stream: &mut (), buffers: &mut [&mut [Complex32]], _timeout: Duration) -> ReadResult {
        match self.script.pop_front() {
            Some(Step::Chunk(n)) => {
                for i in 0..n {
                    let k = (self.cursor + i) as f32;
                    buffers[0][i] = Complex32::new(k + 1.0, 2.0);
                    buffers[1][i] = Complex32::new(-k, 0.5);
                }
                self.cursor += n;
                Ok(n)
            }
            Some(Step::Status(code)) => Err(code),
            None => Err(StatusCode::TIMEOUT),
        }
    }

    fn close_stream(&mut self, _stream: ()) -> DeviceResult<()> {
        self.closed += 1;
        Ok(())
    }
}

fn short_options() -> AcquisitionOptions {
    AcquisitionOptions::default()
        .with_timeout(Duration::from_millis(50))
        .with_read_timeout(Duration::from_millis(5))
}

fn mean(samples: &[Complex32]) -> Complex64 {
    let sum = samples
        .iter()
        .fold(Complex64::new(0.0, 0.0), |acc, s| acc + Complex64::new(s.re as f64, s.im as f64));
    sum / samples.len() as f64
}

// ============================================================
// Chunk accumulation
// ============================================================

#[test]
fn test_partial_reads_accumulate() {
    let mut dev = ScriptedDevice::new(&[Step::Chunk(300), Step::Chunk(500), Step::Chunk(224)]);
    let block = acquire(&mut dev, &mut (), 1024, &AcquisitionOptions::default()).unwrap();

    assert_eq!(dev.activated, vec![1024]);
    assert_eq!(block.len(), 1024);
    for ch in Channel::ALL {
        assert_eq!(block.channel(ch).len(), 1024);
        let m = mean(block.channel(ch));
        assert_abs_diff_eq!(m.re, 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(m.im, 0.0, epsilon = 1e-3);
    }
    // Ramp order survives the chunk boundaries
    let a = block.channel(Channel::A);
    assert_abs_diff_eq!((a[300].re - a[299].re) as f64, 1.0, epsilon = 1e-3);
    assert_abs_diff_eq!((a[800].re - a[799].re) as f64, 1.0, epsilon = 1e-3);
}

#[test]
fn test_timeout_status_is_retried() {
    let mut dev = ScriptedDevice::new(&[
        Step::Chunk(100),
        Step::Status(StatusCode::TIMEOUT),
        Step::Status(StatusCode::TIMEOUT),
        Step::Chunk(156),
    ]);
    let block = acquire(&mut dev, &mut (), 256, &AcquisitionOptions::default()).unwrap();
    assert_eq!(block.len(), 256);
}

#[test]
fn test_zero_samples_is_empty_block() {
    let mut dev = ScriptedDevice::new(&[]);
    let block = acquire(&mut dev, &mut (), 0, &AcquisitionOptions::default()).unwrap();
    assert!(block.is_empty());
}

// ============================================================
// Failures
// ============================================================

#[test]
fn test_error_status_aborts() {
    let mut dev = ScriptedDevice::new(&[Step::Chunk(64), Step::Status(StatusCode::OVERFLOW)]);
    let err = acquire(&mut dev, &mut (), 256, &AcquisitionOptions::default()).unwrap_err();
    assert!(err.is_read_status());
    assert!(err.to_string().contains("OVERFLOW"));
    assert!(err.to_string().contains("after 64 samples"));
}

#[test]
fn test_deadline_elapses() {
    let mut dev = SimulatedLoopback::default();
    dev.stall_reads();
    let mut stream = dev.setup_rx_stream(&Channel::ALL).unwrap();
    let err = acquire(&mut dev, &mut stream, 512, &short_options()).unwrap_err();
    assert!(err.is_timeout());
}

#[test]
fn test_cancel_before_read() {
    let token = CancelToken::new();
    token.cancel();
    let mut dev = ScriptedDevice::new(&[Step::Chunk(512)]);
    let options = AcquisitionOptions::default().with_cancel(token);
    let err = acquire(&mut dev, &mut (), 512, &options).unwrap_err();
    assert!(err.is_cancelled());
}

// ============================================================
// Capture session
// ============================================================

#[test]
fn test_session_closes_on_drop() {
    let mut dev = SimulatedLoopback::default();
    dev.fail_reads_after(1);
    {
        let mut session = CaptureSession::open(&mut dev).unwrap();
        // Two reads are needed; the second fails
        let err = session.acquire(8192, &AcquisitionOptions::default()).unwrap_err();
        assert!(err.is_read_status());
    }
    assert_eq!(dev.opened_streams(), 1);
    assert_eq!(dev.closed_streams(), 1);
}

#[test]
fn test_session_close_is_single() {
    let mut dev = ScriptedDevice::new(&[Step::Chunk(16)]);
    let mut session = CaptureSession::open(&mut dev).unwrap();
    session.acquire(16, &AcquisitionOptions::default()).unwrap();
    session.close().unwrap();
    assert_eq!(dev.closed, 1);
}

#[test]
fn test_session_open_failure_propagates() {
    let mut dev = SimulatedLoopback::default();
    dev.fail_operation("setup_rx_stream");
    let err = CaptureSession::open(&mut dev).err().unwrap();
    assert_eq!(err, DeviceError::configuration("setup_rx_stream", "injected failure"));
    assert_eq!(dev.closed_streams(), 0);
}
