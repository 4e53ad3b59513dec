//! Per-step pipeline and recurrent policy for first-person shooter simulators
//!
//! [`EpisodeStepPipeline`](wrappers::EpisodeStepPipeline) wraps one simulator instance:
//! it remaps compact decisions to engine controls, tracks game variables, shapes the
//! reward and normalizes the screen buffer. [`PolicyModel`](nn::PolicyModel) turns
//! those observations into decisions, threading an explicit
//! [`HiddenState`](nn::HiddenState) from step to step.

pub mod config;
pub mod env;
pub mod error;
pub mod nn;
pub mod registry;
pub mod sim;
pub mod traits;
pub mod wrappers;

#[cfg(test)]
pub(crate) mod testing;

pub use config::PipelineConfig;
pub use env::{DiscreteActionSpace, Environment, Report, Step};
pub use error::{Error, ReadError, Result};
pub use registry::{Registry, ScenarioSpec};
