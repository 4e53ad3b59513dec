//! Neural network building blocks of the recurrent policy

pub mod checkpoint;
pub mod distribution;
pub mod encoder;
pub mod mlp;
pub mod policy;
pub mod recurrent;

pub use checkpoint::{LoadReport, ParamStore, StoredTensor, CHECKPOINT_VERSION};
pub use distribution::{Categorical, CategoricalParams};
pub use encoder::{Encoder, EncoderConfig};
pub use mlp::{MLPConfig, MLP};
pub use policy::{
    ActionOutput, HiddenState, PolicyModel, PolicyModelConfig, PolicyOutput, SequenceOutput,
};
pub use recurrent::{GruCore, GruCoreConfig};
