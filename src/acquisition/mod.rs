pub mod plan;
pub mod sequencer;

pub use plan::{PlanError, ReadPlan, ReadStep};
pub use sequencer::Sequencer;
