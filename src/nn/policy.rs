//! Recurrent actor-critic: encoder, GRU core, decoder, action and value heads
//!
//! Recurrence is explicit. Every forward call takes a [`HiddenState`] and returns the
//! next one; the model itself holds nothing but learned parameters.

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::backend::Backend,
};
use rand::{thread_rng, Rng};

use crate::error::{self, Error};
use crate::traits::BoolToTensor;

use super::recurrent::{GruCore, GruCoreConfig};
use super::distribution::Categorical;
use super::encoder::{Encoder, EncoderConfig};
use super::mlp::{MLPConfig, MLP};

#[derive(Config, Debug)]
pub struct PolicyModelConfig {
    /// `[channels, height, width]` of the normalized observation
    pub observation_shape: [usize; 3],
    /// Number of decision indices
    pub num_actions: usize,
    /// Encoder output width (default: 512)
    #[config(default = 512)]
    pub encoder_dim: usize,
    /// GRU hidden size (default: 512)
    #[config(default = 512)]
    pub core_dim: usize,
    /// Decoder layer widths; the last one is the latent fed to both heads (default: [512])
    #[config(default = "vec![512]")]
    pub decoder_layers: Vec<usize>,
}

impl PolicyModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> error::Result<PolicyModel<B>> {
        if self.num_actions == 0 {
            return Err(Error::EmptyActionSet);
        }
        let Some((&latent_dim, hidden)) = self.decoder_layers.split_last() else {
            return Err(Error::InvalidConfig(
                "decoder_layers is empty; give at least the latent width".to_string(),
            ));
        };

        let encoder = EncoderConfig::new(self.observation_shape)
            .with_feature_dim(self.encoder_dim)
            .init(device)?;
        let core = GruCoreConfig::new(self.encoder_dim)
            .with_hidden_dim(self.core_dim)
            .init(device);
        let decoder = MLPConfig::new(self.core_dim, hidden.to_vec(), latent_dim)
            .with_relu_output(true)
            .init(device);

        Ok(PolicyModel {
            encoder,
            core,
            decoder,
            action_head: LinearConfig::new(latent_dim, self.num_actions).init(device),
            value_head: LinearConfig::new(latent_dim, 1).init(device),
        })
    }
}

/// Recurrent memory of a batch of episode instances, `[batch, core_dim]`
///
/// One row per instance. Rows are never shared between instances.
#[derive(Debug, Clone)]
pub struct HiddenState<B: Backend>(Tensor<B, 2>);

impl<B: Backend> HiddenState<B> {
    /// Episode-start state
    pub fn zeros(batch: usize, dim: usize, device: &B::Device) -> Self {
        Self(Tensor::zeros([batch, dim], device))
    }

    pub fn from_tensor(tensor: Tensor<B, 2>) -> Self {
        Self(tensor)
    }

    pub fn tensor(&self) -> &Tensor<B, 2> {
        &self.0
    }

    pub fn into_tensor(self) -> Tensor<B, 2> {
        self.0
    }

    pub fn batch_size(&self) -> usize {
        self.0.dims()[0]
    }

    pub fn dim(&self) -> usize {
        self.0.dims()[1]
    }

    /// Concatenate the rows of several states, in order; `states` must not be empty
    pub fn stack(states: Vec<Self>) -> Self {
        Self(Tensor::cat(states.into_iter().map(|s| s.0).collect(), 0))
    }

    /// One single-row state per instance
    pub fn split(self) -> Vec<Self> {
        let batch = self.batch_size();
        self.0.chunk(batch.max(1), 0).into_iter().map(Self).collect()
    }

    /// Zero the rows whose episode ended
    pub fn reset_where(self, dones: &[bool]) -> error::Result<Self> {
        if dones.len() != self.batch_size() {
            return Err(Error::BatchMismatch {
                expected: dones.len(),
                actual: self.batch_size(),
            });
        }
        let device = self.0.device();
        let keep: Tensor<B, 1> = dones.to_float_mask(&device).neg().add_scalar(1.0);
        let keep: Tensor<B, 2> = keep.unsqueeze_dim(1);
        Ok(Self(self.0 * keep))
    }
}

/// Action half of [`PolicyOutput`]
#[derive(Debug, Clone)]
pub struct ActionOutput<B: Backend> {
    /// Raw head output, `[batch, K]`
    pub logits: Tensor<B, 2>,
    /// Sampled decision per row
    pub actions: Tensor<B, 1, Int>,
    pub log_probs: Tensor<B, 1>,
}

impl<B: Backend> ActionOutput<B> {
    pub fn distribution(&self) -> Categorical<B> {
        Categorical::from_logits(self.logits.clone())
    }

    /// Sampled decisions as pipeline indices
    pub fn decisions(&self) -> Vec<usize> {
        self.actions
            .to_data()
            .iter::<i64>()
            .map(|a| a as usize)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct PolicyOutput<B: Backend> {
    /// Value estimate per row, `[batch]`
    pub value: Tensor<B, 1>,
    /// `None` when called with `values_only`
    pub action: Option<ActionOutput<B>>,
    pub new_hidden: HiddenState<B>,
}

/// Time-major output of [`PolicyModel::forward_sequence`]
#[derive(Debug, Clone)]
pub struct SequenceOutput<B: Backend> {
    /// `[T, batch]`
    pub values: Tensor<B, 2>,
    /// `[T, batch, K]`, `None` when called with `values_only`
    pub logits: Option<Tensor<B, 3>>,
    /// State after the last step
    pub new_hidden: HiddenState<B>,
}

#[derive(Module, Debug)]
pub struct PolicyModel<B: Backend> {
    pub encoder: Encoder<B>,
    pub core: GruCore<B>,
    pub decoder: MLP<B>,
    pub action_head: Linear<B>,
    pub value_head: Linear<B>,
}

impl<B: Backend> PolicyModel<B> {
    pub fn num_actions(&self) -> usize {
        self.action_head.weight.dims()[1]
    }

    pub fn core_dim(&self) -> usize {
        self.core.hidden_dim()
    }

    /// Zero state for `batch` fresh episodes
    pub fn initial_state(&self, batch: usize, device: &B::Device) -> HiddenState<B> {
        HiddenState::zeros(batch, self.core_dim(), device)
    }

    /// One step for a batch of instances, sampling with the thread RNG
    ///
    /// `obs` is `[batch, C, H, W]`; `hidden` must have `batch` rows.
    pub fn forward(
        &self,
        obs: Tensor<B, 4>,
        hidden: HiddenState<B>,
        values_only: bool,
    ) -> error::Result<PolicyOutput<B>> {
        self.forward_with_rng(obs, hidden, values_only, &mut thread_rng())
    }

    /// One step for a single instance, `obs` is `[C, H, W]`
    pub fn forward_single(
        &self,
        obs: Tensor<B, 3>,
        hidden: HiddenState<B>,
        values_only: bool,
    ) -> error::Result<PolicyOutput<B>> {
        self.forward(obs.unsqueeze::<4>(), hidden, values_only)
    }

    pub fn forward_with_rng<R: Rng + ?Sized>(
        &self,
        obs: Tensor<B, 4>,
        hidden: HiddenState<B>,
        values_only: bool,
        rng: &mut R,
    ) -> error::Result<PolicyOutput<B>> {
        check_batch(obs.dims()[0], &hidden)?;

        let features = self.encoder.forward(obs);
        let h = self.core.step(features, hidden.into_tensor());
        let latent = self.decoder.forward(h.clone());
        let value = self.value_head.forward(latent.clone()).squeeze_dims(&[1]);

        let action = if values_only {
            None
        } else {
            let logits = self.action_head.forward(latent);
            let dist = Categorical::from_logits(logits.clone());
            let actions = dist.sample(rng);
            let log_probs = dist.log_prob(actions.clone());
            Some(ActionOutput {
                logits,
                actions,
                log_probs,
            })
        };

        Ok(PolicyOutput {
            value,
            action,
            new_hidden: HiddenState(h),
        })
    }

    /// Run a whole `[T, batch, C, H, W]` rollout in one call
    ///
    /// Produces the same values, logits and final state as `T` chained
    /// [`forward`](Self::forward) calls.
    pub fn forward_sequence(
        &self,
        obs: Tensor<B, 5>,
        hidden: HiddenState<B>,
        values_only: bool,
    ) -> error::Result<SequenceOutput<B>> {
        check_batch(obs.dims()[1], &hidden)?;

        let features = self.encoder.forward_sequence(obs);
        let (outputs, last) = self.core.forward_sequence(features, hidden.into_tensor());
        let latent = self.decoder.forward(outputs);
        let values = self.value_head.forward(latent.clone()).squeeze_dims(&[2]);
        let logits = (!values_only).then(|| self.action_head.forward(latent));

        Ok(SequenceOutput {
            values,
            logits,
            new_hidden: HiddenState(last),
        })
    }
}

fn check_batch<B: Backend>(batch: usize, hidden: &HiddenState<B>) -> error::Result<()> {
    if hidden.batch_size() != batch {
        return Err(Error::BatchMismatch {
            expected: batch,
            actual: hidden.batch_size(),
        });
    }
    Ok(())
}
