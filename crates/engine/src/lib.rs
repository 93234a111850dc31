pub mod lifecycle;
pub mod recalc;
pub mod scheduler;
pub mod snapshot;

pub use lifecycle::{activate_rule, deactivate_rule};
pub use recalc::RecalcJob;
pub use scheduler::JobRunner;
pub use snapshot::SnapshotJob;
