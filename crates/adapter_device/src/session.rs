//! Scoped capture stream.

use crate::acquisition::{acquire, AcquisitionOptions};
use crate::device::CaptureDevice;
use crate::error::{AcquisitionError, DeviceError, DeviceResult};
use cal_core::types::{Channel, SampleBlock};
use tracing::{debug, warn};

/// A device together with its open two-channel receive stream.
///
/// The stream is closed exactly once: by [`CaptureSession::close`] on the
/// success path, or on drop if the session is abandoned by an error.
///
/// # Example
///
/// ```
/// use adapter_device::{AcquisitionOptions, CaptureSession, SimulatedLoopback};
///
/// let mut device = SimulatedLoopback::default();
/// let mut session = CaptureSession::open(&mut device).unwrap();
/// let block = session.acquire(1024, &AcquisitionOptions::default()).unwrap();
/// assert_eq!(block.len(), 1024);
/// session.close().unwrap();
/// assert_eq!(device.closed_streams(), 1);
/// ```
pub struct CaptureSession<'d, D: CaptureDevice> {
    device: &'d mut D,
    stream: Option<D::Stream>,
}

impl<'d, D: CaptureDevice> CaptureSession<'d, D> {
    /// Open a receive stream on both channels.
    pub fn open(device: &'d mut D) -> DeviceResult<Self> {
        let stream = device.setup_rx_stream(&Channel::ALL)?;
        debug!("capture stream opened");
        Ok(Self {
            device,
            stream: Some(stream),
        })
    }

    /// The underlying device, for configuration calls.
    pub fn device(&mut self) -> &mut D {
        &mut *self.device
    }

    /// Capture one block of `num_samples` per channel.
    pub fn acquire(
        &mut self,
        num_samples: usize,
        options: &AcquisitionOptions,
    ) -> Result<SampleBlock, AcquisitionError> {
        match self.stream.as_mut() {
            Some(stream) => acquire(&mut *self.device, stream, num_samples, options),
            None => Err(DeviceError::stream("capture stream already closed").into()),
        }
    }

    /// Close the stream, reporting any failure.
    pub fn close(mut self) -> DeviceResult<()> {
        match self.stream.take() {
            Some(stream) => {
                debug!("capture stream closed");
                self.device.close_stream(stream)
            }
            None => Ok(()),
        }
    }
}

impl<D: CaptureDevice> Drop for CaptureSession<'_, D> {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            match self.device.close_stream(stream) {
                Ok(()) => debug!("capture stream closed on unwind"),
                Err(e) => warn!(error = %e, "failed to close capture stream"),
            }
        }
    }
}
