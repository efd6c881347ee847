mod engine;
mod metrics;
mod placement;
mod registry;
mod scheduler;
mod stream;

pub use engine::{Admission, FlowEngine, IngestOutcome};
pub use metrics::{FlowMetricsSnapshot, MetricsAccumulator, MetricsHandle};
pub use placement::{
    plan_placement, uniform_speed, PlacementParams, PlacementPlan, Rejection, MAX_CANDIDATE_BANDS,
};
pub use registry::StreamRegistry;
pub use scheduler::{MotionScheduler, RetireReason, RetiredSlot, SlotPosition, TickReport};
pub use stream::{ActiveSlot, ContainerSize, Slot, SlotId, Stream};
