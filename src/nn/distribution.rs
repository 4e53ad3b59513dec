//! Categorical action distribution over decision indices

use burn::{
    prelude::*,
    tensor::{activation::log_softmax, backend::Backend, TensorData},
};
use rand::{
    distributions::{Distribution, WeightedIndex},
    Rng,
};

use crate::error::{Error, Result};

/// Probabilities below this are clamped before taking logs
const PROB_FLOOR: f32 = 1e-8;

/// How another distribution happens to be parameterized
#[derive(Debug, Clone)]
pub enum CategoricalParams<B: Backend> {
    /// Unnormalized log-probabilities, `[batch, K]`
    Logits(Tensor<B, 2>),
    /// Probabilities, `[batch, K]`; rows are renormalized
    Probs(Tensor<B, 2>),
}

/// One categorical distribution per batch row, stored as normalized log-probabilities
#[derive(Debug, Clone)]
pub struct Categorical<B: Backend> {
    log_probs: Tensor<B, 2>,
}

impl<B: Backend> From<CategoricalParams<B>> for Categorical<B> {
    fn from(params: CategoricalParams<B>) -> Self {
        match params {
            CategoricalParams::Logits(logits) => Self::from_logits(logits),
            CategoricalParams::Probs(probs) => Self::from_probs(probs),
        }
    }
}

impl<B: Backend> Categorical<B> {
    pub fn from_logits(logits: Tensor<B, 2>) -> Self {
        Self {
            log_probs: log_softmax(logits, 1),
        }
    }

    pub fn from_probs(probs: Tensor<B, 2>) -> Self {
        Self::from_logits(probs.clamp_min(PROB_FLOOR).log())
    }

    /// Normalized log-probabilities, `[batch, K]`
    pub fn log_probs(&self) -> Tensor<B, 2> {
        self.log_probs.clone()
    }

    pub fn probs(&self) -> Tensor<B, 2> {
        self.log_probs.clone().exp()
    }

    pub fn num_actions(&self) -> usize {
        self.log_probs.dims()[1]
    }

    pub fn batch_size(&self) -> usize {
        self.log_probs.dims()[0]
    }

    /// Draw one decision per row
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Tensor<B, 1, Int> {
        let k = self.num_actions();
        let probs: Vec<f32> = self.probs().into_data().iter::<f32>().collect();

        let picks: Vec<i64> = probs
            .chunks(k.max(1))
            .map(|row| match WeightedIndex::new(row) {
                Ok(dist) => dist.sample(&mut *rng) as i64,
                // Degenerate row (all mass underflowed): fall back to the greedy choice
                Err(_) => argmax(row) as i64,
            })
            .collect();

        let len = picks.len();
        let device = self.log_probs.device();
        Tensor::from_data(TensorData::new(picks, [len]).convert::<B::IntElem>(), &device)
    }

    /// Most likely decision per row
    pub fn mode(&self) -> Tensor<B, 1, Int> {
        self.log_probs.clone().argmax(1).squeeze_dims(&[1])
    }

    /// Log-probability of `actions`, one per row
    pub fn log_prob(&self, actions: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        self.log_probs
            .clone()
            .gather(1, actions.unsqueeze_dim(1))
            .squeeze_dims(&[1])
    }

    pub fn entropy(&self) -> Tensor<B, 1> {
        (self.probs() * self.log_probs.clone())
            .sum_dim(1)
            .neg()
            .squeeze_dims(&[1])
    }

    /// `KL(self || other)` per row for an arbitrarily parameterized `other`
    ///
    /// `other` is first rebuilt as a [`Categorical`], so logits and probabilities
    /// compare alike.
    pub fn kl_divergence(&self, other: &CategoricalParams<B>) -> Result<Tensor<B, 1>> {
        self.kl_to(&Categorical::from(other.clone()))
    }

    /// `KL(self || other)` per row
    pub fn kl_to(&self, other: &Categorical<B>) -> Result<Tensor<B, 1>> {
        if other.num_actions() != self.num_actions() {
            return Err(Error::ArityMismatch {
                expected: self.num_actions(),
                actual: other.num_actions(),
            });
        }
        Ok((self.probs() * (self.log_probs.clone() - other.log_probs.clone()))
            .sum_dim(1)
            .squeeze_dims(&[1]))
    }

    /// `0.5 * (KL(p || u) + KL(u || p))` against the uniform distribution `u`
    pub fn symmetric_kl_with_uniform_prior(&self) -> Tensor<B, 1> {
        let k = self.num_actions() as f32;
        let ln_k = k.ln();

        let kl_p_u = (self.probs() * self.log_probs.clone().add_scalar(ln_k)).sum_dim(1);
        let kl_u_p = self
            .log_probs
            .clone()
            .sum_dim(1)
            .mul_scalar(-1.0 / k)
            .sub_scalar(ln_k);

        (kl_p_u + kl_u_p).mul_scalar(0.5).squeeze_dims(&[1])
    }
}

fn argmax(row: &[f32]) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &p)| if p > best.1 { (i, p) } else { best })
        .0
}
