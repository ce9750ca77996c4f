// Execution pipeline: signal state, reconciliation, and the polling loop.
pub mod coordinator;
pub mod reconciler;
pub mod tracker;

pub use coordinator::{Coordinator, CycleOutcome, Stage};
pub use reconciler::decide;
pub use tracker::SignalTracker;
