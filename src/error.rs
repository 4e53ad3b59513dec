//! Error types
//!
//! Transient variable reads ([`ReadError`]) are absorbed by the
//! [`VariableTracker`](crate::wrappers::VariableTracker) and never reach callers.
//! Everything in [`Error`] is fatal for the instance that raised it.

use thiserror::Error;

use crate::sim::{Button, GameVariable};

pub type Result<T> = std::result::Result<T, Error>;

/// Failure to read a single scalar game variable for one step
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("variable {0} is not exposed by the simulator this step")]
    Unavailable(GameVariable),
    #[error("simulator returned a non-finite value for {0}")]
    NonFinite(GameVariable),
}

#[derive(Debug, Error)]
pub enum Error {
    // Configuration
    #[error("unknown game variable `{name}`; expected one of: {known}")]
    UnknownVariable { name: String, known: String },

    #[error(
        "raw frame of shape {dims:?} has no 1- or 3-channel axis; configure the simulator \
         for RGB24/CRCGCB or GRAY8 screen formats"
    )]
    UnsupportedChannels { dims: [usize; 3] },

    #[error(
        "composite action `{action}` presses {button}, which the simulator does not declare; \
         add it to the scenario's available buttons or drop the action"
    )]
    UnknownButton { action: String, button: Button },

    #[error("composite actions `{first}` and `{second}` press the same buttons; decision indices must map to distinct control vectors")]
    DuplicateCompositeAction { first: String, second: String },

    #[error("the composite action set is empty; at least one decision is required")]
    EmptyActionSet,

    #[error("required asset `{asset}` not found: {remediation}")]
    MissingAsset { asset: String, remediation: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("reward term `{term}` needs {variable}, which is not tracked; add it to `tracked_variables`")]
    UntrackedVariable { term: String, variable: GameVariable },

    #[error("unknown scenario `{name}`; registered scenarios: {known}")]
    UnknownScenario { name: String, known: String },

    // Runtime contract
    #[error("decision index {index} out of range for {len} composite actions")]
    DecisionOutOfRange { index: usize, len: usize },

    #[error("raw frame declares {expected} samples but carries {actual}")]
    FrameShapeMismatch { expected: usize, actual: usize },

    #[error("step called before reset")]
    EpisodeNotStarted,

    #[error("action distributions disagree on arity: {expected} vs {actual} decisions")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("hidden state has {actual} rows but the observation batch has {expected}")]
    BatchMismatch { expected: usize, actual: usize },

    // Persistence
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Checkpoint(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}
