pub mod capacity;
pub mod cleanup;
pub mod config;
pub mod copy;
pub mod engine;
pub mod enumeration;
pub mod errors;
pub mod history;
pub mod ledger;
pub mod naming;
pub mod orchestrator;
pub mod progress;
pub mod selector;
pub mod usage;

pub use capacity::{CapacityBudget, CapacityOracle, DeviceSpace, SpaceProbe, SystemSpaceProbe};
pub use config::FillConfig;
pub use errors::{ErrorCategory, ItemError, StartupError};
pub use orchestrator::{FillOptions, FillOrchestrator, FillSummary};
