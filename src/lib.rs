#[cfg(feature = "cli")]
pub mod cli;
pub mod engine;
pub mod input;
pub mod model;
pub mod notify;
pub mod output;
pub mod probe;
pub mod util;

pub use engine::Engine;
pub use model::{ScanConfig, ScanOutcome, ScanPhase, ScanReport, WriteMode};
