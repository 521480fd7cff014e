//! Scan manager for submitting targets and polling analyses.
//!
//! The `ScanManager` validates and submits targets to a provider, then
//! drives each analysis to a terminal state on a fixed poll schedule.

mod poll;
mod scan_manager;
mod session;

pub use poll::PollConfig;
pub use scan_manager::{ScanManager, ScanManagerBuilder, ScanManagerConfig};
pub use session::{ScanSession, ScanUpdate};
