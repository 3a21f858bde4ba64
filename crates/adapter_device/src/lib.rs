//! # adapter_device
//!
//! Hardware adapter for loopback calibration.
//!
//! ## Architecture Position
//!
//! The **A**dapter layer: everything that touches a transceiver lives here,
//! behind two capability traits:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │          cal_optimiser (search engine)        │
//! ├──────────────────────────────────────────────┤
//! │  TransceiverDevice  (tuning, gains, corrections, settings)
//! │  CaptureDevice      (burst capture, reads, close)
//! ├──────────────┬───────────────────────────────┤
//! │ Simulated    │ SoapySDR (feature = "soapy")  │
//! │ loopback     │                               │
//! └──────────────┴───────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `device`: capability traits and stage names
//! - `acquisition`: burst capture with deadline and cancellation
//! - `session`: scoped capture stream, closed on every exit path
//! - `sim`: deterministic software loopback model
//! - `args`: device argument strings (`driver=sim,seed=7`)
//! - `soapy`: SoapySDR C API backend (optional)

pub mod acquisition;
pub mod args;
pub mod device;
pub mod session;
pub mod sim;
#[cfg(feature = "soapy")]
pub mod soapy;

mod error;

pub use acquisition::{acquire, AcquisitionOptions, CancelToken};
pub use args::DeviceArgs;
pub use device::{
    CaptureDevice, FrequencyStage, GainStage, ReadResult, StatusCode, TransceiverDevice,
};
pub use error::{AcquisitionError, DeviceError, DeviceResult};
pub use session::CaptureSession;
pub use sim::{LoopbackModel, SimStream, SimulatedLoopback};
