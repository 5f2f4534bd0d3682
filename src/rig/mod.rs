//! Sine-wave secondary-motion rigs.
//!
//! [`setup::build_rig`] turns ordered chains of scene objects into a layered
//! rig: an FK tier whose expression joints follow a compiled sine wave, a
//! spline-IK tier that poses the FK offsets from a few curve controls, and one
//! master control holding the wave parameters.

pub mod chain;
pub mod config;
pub mod error;
pub mod fk;
pub mod master;
pub mod naming;
pub mod sets;
pub mod setup;
pub mod shapes;
pub mod spline_ik;
pub mod wave;

pub use chain::{ChainMetrics, ResolvedChain, analyze, resolve};
pub use config::{BuildRequest, ChainEntry, Color, DriverInput, RigConfig, TimeUnit};
pub use error::{ChainError, ChainFailure, ConfigError, RigError};
pub use naming::{ChainNames, RigNames};
pub use setup::{
    BuildReport, ChainReport, build_rig, delete_rig, driver_programs, formula_text, recompile_drivers, rig_names,
};
