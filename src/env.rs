//! Environment contract exposed to the outer orchestrator

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use crate::error::Result;

/// Result of one environment step
#[derive(Debug, Clone)]
pub struct Step<S, M> {
    pub state: S,
    pub reward: f32,
    pub terminated: bool,
    pub truncated: bool,
    pub metrics: M,
}

impl<S, M> Step<S, M> {
    /// Episode is over for either reason
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// An episodic environment driven one decision at a time
///
/// Steps within one instance are strictly sequential; instances share nothing.
pub trait Environment {
    /// Observation handed to the policy
    type State;
    /// Decision accepted by [`step`](Environment::step)
    type Action;
    /// Per-step diagnostics for external logging
    type Metrics;

    /// Start a new episode
    fn reset(&mut self, seed: Option<u64>) -> Result<Self::State>;

    /// Apply one decision
    fn step(&mut self, action: Self::Action) -> Result<Step<Self::State, Self::Metrics>>;

    /// Uniformly random valid decision
    fn random_action(&self) -> Self::Action;

    /// Whether an episode is currently running
    fn is_active(&self) -> bool;
}

/// Environment whose decisions form a finite set
pub trait DiscreteActionSpace: Environment {
    /// Every valid decision, in index order
    fn actions(&self) -> Vec<Self::Action>;
}

/// Named cumulative counters for one episode
///
/// Keys are fixed at construction; use `entry(..).and_modify(..)` to accumulate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    values: BTreeMap<&'static str, f64>,
}

impl Report {
    pub fn new(keys: Vec<&'static str>) -> Self {
        Self {
            values: keys.into_iter().map(|k| (k, 0.0)).collect(),
        }
    }

    /// Zero every counter, keeping the keys
    pub fn clear(&mut self) {
        self.values.values_mut().for_each(|v| *v = 0.0);
    }

    /// Add `amount` to `key` if it exists
    pub fn add(&mut self, key: &'static str, amount: f64) {
        self.values.entry(key).and_modify(|x| *x += amount);
    }
}

impl Deref for Report {
    type Target = BTreeMap<&'static str, f64>;

    fn deref(&self) -> &Self::Target {
        &self.values
    }
}

impl DerefMut for Report {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.values
    }
}
