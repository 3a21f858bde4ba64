//! Burst sample acquisition.
//!
//! [`acquire`] starts a finite burst of `N` samples per channel, then reads
//! until both channels hold `N` samples. Partial reads are accumulated.
//! Every read is bounded by the per-read timeout and the whole capture by
//! an overall deadline; a [`CancelToken`] is checked before each read.

use crate::device::CaptureDevice;
use crate::error::AcquisitionError;
use cal_core::types::SampleBlock;
use num_complex::Complex32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// Shared flag that aborts an in-progress acquisition.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create an untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Visible to every clone.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Limits applied to one acquisition.
#[derive(Debug, Clone)]
pub struct AcquisitionOptions {
    /// Deadline for the whole capture.
    pub timeout: Duration,
    /// Upper bound for a single stream read.
    pub read_timeout: Duration,
    /// Cancellation flag.
    pub cancel: CancelToken,
}

impl Default for AcquisitionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            read_timeout: Duration::from_millis(100),
            cancel: CancelToken::new(),
        }
    }
}

impl AcquisitionOptions {
    /// Set the overall deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the per-read bound.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Capture `num_samples` per channel from a two-channel stream.
///
/// Returns a [`SampleBlock`] with each channel's mean removed.
///
/// # Errors
///
/// - [`AcquisitionError::Device`] if the burst cannot be activated
/// - [`AcquisitionError::ReadStatus`] on any non-timeout negative status
/// - [`AcquisitionError::Timeout`] when the overall deadline elapses
/// - [`AcquisitionError::Cancelled`] when the token is triggered
pub fn acquire<D: CaptureDevice>(
    device: &mut D,
    stream: &mut D::Stream,
    num_samples: usize,
    options: &AcquisitionOptions,
) -> Result<SampleBlock, AcquisitionError> {
    device.activate_burst(stream, num_samples)?;

    let mut ch_a = vec![Complex32::new(0.0, 0.0); num_samples];
    let mut ch_b = vec![Complex32::new(0.0, 0.0); num_samples];
    let mut collected = 0;
    let deadline = Instant::now() + options.timeout;

    while collected < num_samples {
        if options.cancel.is_cancelled() {
            return Err(AcquisitionError::Cancelled { collected });
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(AcquisitionError::Timeout {
                collected,
                requested: num_samples,
                timeout: options.timeout,
            });
        }
        let wait = options.read_timeout.min(deadline - now);

        let mut buffers = [&mut ch_a[collected..], &mut ch_b[collected..]];
        match device.read_stream(stream, &mut buffers, wait) {
            Ok(count) => {
                collected += count.min(num_samples - collected);
                trace!(count, collected, num_samples, "stream read");
            }
            Err(status) if status.is_timeout() => {
                trace!(collected, "stream read timed out, retrying");
            }
            Err(status) => {
                return Err(AcquisitionError::ReadStatus {
                    code: status.0,
                    name: status.name(),
                    collected,
                });
            }
        }
    }

    Ok(SampleBlock::from_raw(ch_a, ch_b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_options_builder() {
        let opts = AcquisitionOptions::default()
            .with_timeout(Duration::from_millis(250))
            .with_read_timeout(Duration::from_millis(10));
        assert_eq!(opts.timeout, Duration::from_millis(250));
        assert_eq!(opts.read_timeout, Duration::from_millis(10));
        assert!(!opts.cancel.is_cancelled());
    }
}
