//! # cal_optimiser
//!
//! Correction search for loopback calibration.
//!
//! Finds per-channel Rx IQ-imbalance, Tx IQ-imbalance and Tx DC-offset
//! corrections by shrinking-grid coordinate descent, driven by tone levels
//! measured on loopback captures.
//!
//! ## Architecture Position
//!
//! The kernel of the calibration layer. Depends on `cal_core` (measurement,
//! correction algebra) and `adapter_device` (capabilities, acquisition).
//!
//! ## Modules
//!
//! - `config`: immutable run configuration with builder and validation
//! - `test_points`: shrinking grid of paired DC/IQ deltas
//! - `state`: strictly-improving best trackers
//! - `engine`: the `INIT → … → DONE` state machine
//! - `session`: device setup and scoped stream around one run
//!
//! ## Example
//!
//! ```
//! use adapter_device::{CancelToken, SimulatedLoopback};
//! use cal_optimiser::prelude::*;
//!
//! let config = CalibrationConfig::builder()
//!     .search_depths(2..=4)
//!     .samples_per_capture(4000)
//!     .build();
//! let mut controller = SessionController::new(SimulatedLoopback::default(), config)?;
//! let outcome = controller.run(900e6, &CancelToken::new())?;
//! assert!(outcome.tx_dc.level_dbfs.0.iter().all(|l| l.is_finite()));
//! # Ok::<(), cal_optimiser::CalibrationError>(())
//! ```

pub mod config;
pub mod engine;
pub mod result;
pub mod session;
pub mod state;
pub mod test_points;

mod error;

pub use config::{CalibrationConfig, CalibrationConfigBuilder};
pub use engine::{measure_levels, CalibrationEngine, CalibrationStage};
pub use error::CalibrationError;
pub use result::{CalibrationOutcome, CorrectionResult, StageCaptures};
pub use session::{configure_device, SessionController};
pub use state::{BestTracker, SearchState};
pub use test_points::{TestPoint, TestPoints};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::engine::*;
    pub use crate::result::*;
    pub use crate::session::*;
    pub use crate::CalibrationError;
}
