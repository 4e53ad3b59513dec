pub mod action;
pub mod observation;
pub mod pipeline;
pub mod reward;
pub mod variables;

pub use action::{ActionRemapper, ActionSet, CompositeAction, Resolution};
pub use observation::{ObservationConfig, ObservationFrame, ObservationTransformer};
pub use pipeline::{EpisodeStepPipeline, StepMetrics, REPORT_KEYS};
pub use reward::{RewardMetrics, RewardProfile, RewardShaper, RewardTerm, RewardWeights};
pub use variables::{VariableDelta, VariableSnapshot, VariableTracker};
