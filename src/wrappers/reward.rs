//! Reward shaping
//!
//! The shaped reward is the raw engine reward plus the sum of a fixed, ordered list
//! of [`RewardTerm`]s. Each term is a pure function of the variable delta and the
//! current/previous decision indices; all weights come from [`RewardWeights`].
//!
//! # Profiles
//!
//! Several weight sets are provided as [`RewardProfile`]s. `standard` is the
//! default; the others are tuned for specific scenarios.
//!
//! | profile             | survival | kill | hit | fire (hit / miss) | health | progress | jitter |
//! |---------------------|----------|------|-----|-------------------|--------|----------|--------|
//! | `standard`          | 0.01     | 10   | 5   | 0.5 / -0.1        | 0.1    | -        | -0.05  |
//! | `deadly_corridor`   | -        | 20   | -   | - / -0.2          | 0.5    | 0.01     | -      |
//! | `defend_the_center` | -        | 15   | 2   | 0.5 / -0.3        | 0.2    | -        | -0.1   |
//! | `health_gathering`  | 0.05     | -    | -   | -                 | 1.0    | -        | -      |
//! | `raw`               | -        | -    | -   | -                 | -      | -        | -      |

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::trace;

use crate::error::{Error, Result};
use crate::sim::GameVariable;

use super::variables::{VariableDelta, VariableTracker};

/// One additive contribution to the shaped reward, in evaluation order
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RewardTerm {
    /// Constant bonus per step
    Survival,
    /// `kill_weight * max(0, Δkills)`
    Kill,
    /// `hit_weight * max(0, Δhits)`
    Hit,
    /// Ammo spent this step: `hit_bonus_on_fire` if a hit landed, `miss_penalty` otherwise
    Fire,
    /// `health_weight * min(0, Δhealth)`
    Damage,
    /// `progress_weight * max(0, Δposition_x)`
    Progress,
    /// `jitter_penalty` when (previous, current) decision is an oscillating pair
    Jitter,
}

impl RewardTerm {
    /// Variables whose delta the term reads
    pub fn required_variables(self) -> &'static [GameVariable] {
        match self {
            RewardTerm::Survival | RewardTerm::Jitter => &[],
            RewardTerm::Kill => &[GameVariable::KillCount],
            RewardTerm::Hit => &[GameVariable::HitCount],
            RewardTerm::Fire => &[GameVariable::Ammo, GameVariable::HitCount],
            RewardTerm::Damage => &[GameVariable::Health],
            RewardTerm::Progress => &[GameVariable::PositionX],
        }
    }

    fn evaluate(self, weights: &RewardWeights, input: &ShapingInput<'_>) -> f32 {
        let delta = input.delta;
        match self {
            RewardTerm::Survival => weights.survival_bonus,
            RewardTerm::Kill => weights.kill_weight * delta.kills().max(0.0),
            RewardTerm::Hit => weights.hit_weight * delta.hits().max(0.0),
            RewardTerm::Fire => {
                if delta.ammo() < 0.0 {
                    if delta.hits() > 0.0 {
                        weights.hit_bonus_on_fire
                    } else {
                        weights.miss_penalty
                    }
                } else {
                    0.0
                }
            }
            RewardTerm::Damage => weights.health_weight * delta.health().min(0.0),
            RewardTerm::Progress => weights.progress_weight * delta.position_x().max(0.0),
            RewardTerm::Jitter => match input.prev_action {
                Some(prev) if weights.jitter_pairs.contains(&(prev, input.action)) => {
                    weights.jitter_penalty
                }
                _ => 0.0,
            },
        }
    }
}

/// Named weight presets
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RewardProfile {
    #[default]
    Standard,
    DeadlyCorridor,
    DefendTheCenter,
    HealthGathering,
    Raw,
}

/// Weights for every [`RewardTerm`]
///
/// A term whose weight is zero, or which is listed in `disabled`, contributes nothing
/// and is omitted from the per-step metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardWeights {
    /// Identifies the weight set in logs and saved configurations
    pub version: String,
    /// Added every step (default: 0.01)
    pub survival_bonus: f32,
    /// Per kill (default: 10.0)
    pub kill_weight: f32,
    /// Per hit landed (default: 5.0)
    pub hit_weight: f32,
    /// Offset when ammo was spent and a hit landed in the same step (default: 0.5)
    pub hit_bonus_on_fire: f32,
    /// Offset when ammo was spent without a hit; negative (default: -0.1)
    pub miss_penalty: f32,
    /// Scales health lost; positive (default: 0.1)
    pub health_weight: f32,
    /// Per unit of positive x displacement (default: 0.0)
    pub progress_weight: f32,
    /// Offset for an oscillating decision pair; negative (default: -0.05)
    pub jitter_penalty: f32,
    /// Ordered (previous, current) decision pairs that count as oscillation
    /// (default: `[(0, 1), (1, 0)]`, turn-left/turn-right in the standard action set)
    pub jitter_pairs: Vec<(usize, usize)>,
    /// Terms switched off regardless of weight
    pub disabled: Vec<RewardTerm>,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            version: "standard-v3".to_string(),
            survival_bonus: 0.01,
            kill_weight: 10.0,
            hit_weight: 5.0,
            hit_bonus_on_fire: 0.5,
            miss_penalty: -0.1,
            health_weight: 0.1,
            progress_weight: 0.0,
            jitter_penalty: -0.05,
            jitter_pairs: vec![(0, 1), (1, 0)],
            disabled: Vec::new(),
        }
    }
}

impl RewardWeights {
    /// Every term off; shaped reward equals raw reward
    pub fn zero() -> Self {
        Self {
            version: "raw".to_string(),
            survival_bonus: 0.0,
            kill_weight: 0.0,
            hit_weight: 0.0,
            hit_bonus_on_fire: 0.0,
            miss_penalty: 0.0,
            health_weight: 0.0,
            progress_weight: 0.0,
            jitter_penalty: 0.0,
            jitter_pairs: Vec::new(),
            disabled: Vec::new(),
        }
    }

    pub fn profile(profile: RewardProfile) -> Self {
        match profile {
            RewardProfile::Standard => Self::default(),
            RewardProfile::DeadlyCorridor => Self {
                version: "deadly-corridor-v2".to_string(),
                kill_weight: 20.0,
                progress_weight: 0.01,
                health_weight: 0.5,
                miss_penalty: -0.2,
                ..Self::zero()
            },
            RewardProfile::DefendTheCenter => Self {
                version: "defend-the-center-v2".to_string(),
                kill_weight: 15.0,
                hit_weight: 2.0,
                hit_bonus_on_fire: 0.5,
                miss_penalty: -0.3,
                health_weight: 0.2,
                jitter_penalty: -0.1,
                jitter_pairs: vec![(0, 1), (1, 0)],
                ..Self::zero()
            },
            RewardProfile::HealthGathering => Self {
                version: "health-gathering-v1".to_string(),
                survival_bonus: 0.05,
                health_weight: 1.0,
                ..Self::zero()
            },
            RewardProfile::Raw => Self::zero(),
        }
    }

    pub fn with_jitter_pairs(mut self, pairs: Vec<(usize, usize)>) -> Self {
        self.jitter_pairs = pairs;
        self
    }

    pub fn with_disabled(mut self, term: RewardTerm) -> Self {
        if !self.disabled.contains(&term) {
            self.disabled.push(term);
        }
        self
    }

    /// Whether `term` can contribute anything
    pub fn is_enabled(&self, term: RewardTerm) -> bool {
        if self.disabled.contains(&term) {
            return false;
        }
        match term {
            RewardTerm::Survival => self.survival_bonus != 0.0,
            RewardTerm::Kill => self.kill_weight != 0.0,
            RewardTerm::Hit => self.hit_weight != 0.0,
            RewardTerm::Fire => self.hit_bonus_on_fire != 0.0 || self.miss_penalty != 0.0,
            RewardTerm::Damage => self.health_weight != 0.0,
            RewardTerm::Progress => self.progress_weight != 0.0,
            RewardTerm::Jitter => self.jitter_penalty != 0.0 && !self.jitter_pairs.is_empty(),
        }
    }

    /// Enabled terms in evaluation order
    pub fn enabled_terms(&self) -> impl Iterator<Item = RewardTerm> + '_ {
        RewardTerm::iter().filter(|t| self.is_enabled(*t))
    }

    fn validate(&self) -> Result<()> {
        let signed = [
            ("miss_penalty", self.miss_penalty, false),
            ("jitter_penalty", self.jitter_penalty, false),
            ("health_weight", self.health_weight, true),
        ];
        for (name, value, positive) in signed {
            if !value.is_finite() || (positive && value < 0.0) || (!positive && value > 0.0) {
                let expected = if positive { ">= 0" } else { "<= 0" };
                return Err(Error::InvalidConfig(format!(
                    "reward weight `{name}` is {value}, expected a finite value {expected}"
                )));
            }
        }
        Ok(())
    }
}

/// Everything a term may look at for one step
#[derive(Debug, Clone, Copy)]
pub struct ShapingInput<'a> {
    pub raw_reward: f32,
    pub delta: &'a VariableDelta,
    pub action: usize,
    pub prev_action: Option<usize>,
}

/// Per-step breakdown for external logging
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RewardMetrics {
    /// Contribution of each enabled term, in evaluation order
    pub terms: Vec<(RewardTerm, f32)>,
    pub kills: f32,
    pub hits: f32,
    pub ammo_used: f32,
    pub damage_taken: f32,
    pub progress: f32,
}

impl RewardMetrics {
    /// Contribution of `term`, 0 if it was not evaluated
    pub fn term(&self, term: RewardTerm) -> f32 {
        self.terms
            .iter()
            .find(|(t, _)| *t == term)
            .map(|(_, v)| *v)
            .unwrap_or(0.0)
    }

    pub fn shaping_total(&self) -> f32 {
        self.terms.iter().map(|(_, v)| v).sum()
    }
}

/// Applies [`RewardWeights`] to variable deltas
#[derive(Debug, Clone)]
pub struct RewardShaper {
    weights: RewardWeights,
}

impl RewardShaper {
    pub fn new(weights: RewardWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &RewardWeights {
        &self.weights
    }

    /// Fail if an enabled term reads a variable the tracker does not follow
    pub fn check_tracked(&self, tracker: &VariableTracker) -> Result<()> {
        for term in self.weights.enabled_terms() {
            for &variable in term.required_variables() {
                if !tracker.tracks(variable) {
                    return Err(Error::UntrackedVariable {
                        term: term.to_string(),
                        variable,
                    });
                }
            }
        }
        Ok(())
    }

    /// Shaped reward for one step and its breakdown
    ///
    /// Ammo spent is read from the delta (`prev_ammo - ammo == -Δammo`).
    pub fn shape(
        &self,
        raw_reward: f32,
        delta: &VariableDelta,
        action: usize,
        prev_action: Option<usize>,
    ) -> (f32, RewardMetrics) {
        let input = ShapingInput {
            raw_reward,
            delta,
            action,
            prev_action,
        };

        let terms: Vec<(RewardTerm, f32)> = self
            .weights
            .enabled_terms()
            .map(|term| (term, term.evaluate(&self.weights, &input)))
            .collect();

        let metrics = RewardMetrics {
            terms,
            kills: delta.kills().max(0.0),
            hits: delta.hits().max(0.0),
            ammo_used: (-delta.ammo()).max(0.0),
            damage_taken: (-delta.health()).max(0.0),
            progress: delta.position_x(),
        };

        let shaped = input.raw_reward + metrics.shaping_total();
        trace!(raw_reward, shaped, terms = ?metrics.terms, "shaped reward");
        (shaped, metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::str::FromStr;

    fn delta(kills: f32, hits: f32, health: f32, ammo: f32) -> VariableDelta {
        VariableDelta::from_pairs([
            (GameVariable::KillCount, kills),
            (GameVariable::HitCount, hits),
            (GameVariable::Health, health),
            (GameVariable::Ammo, ammo),
        ])
    }

    fn combat_weights() -> RewardWeights {
        RewardWeights {
            kill_weight: 10.0,
            hit_weight: 5.0,
            hit_bonus_on_fire: 0.5,
            ..RewardWeights::default()
        }
        .with_disabled(RewardTerm::Survival)
    }

    #[test]
    fn accurate_fire_earns_kill_hit_and_fire_bonus() {
        let shaper = RewardShaper::new(combat_weights()).unwrap();
        let (shaped, metrics) = shaper.shape(1.0, &delta(1.0, 1.0, 0.0, -1.0), 2, Some(2));

        assert_relative_eq!(shaped, 1.0 + 10.0 + 5.0 + 0.5);
        assert_eq!(metrics.term(RewardTerm::Fire), 0.5);
        assert_eq!(metrics.kills, 1.0);
        assert_eq!(metrics.ammo_used, 1.0);
    }

    #[test]
    fn wasted_shot_applies_miss_penalty_once() {
        let shaper = RewardShaper::new(combat_weights()).unwrap();
        let (shaped, metrics) = shaper.shape(0.0, &delta(0.0, 0.0, 0.0, -1.0), 2, Some(2));

        let weights = shaper.weights();
        assert_relative_eq!(shaped, weights.miss_penalty);
        let fire_terms = metrics.terms.iter().filter(|(t, _)| *t == RewardTerm::Fire).count();
        assert_eq!(fire_terms, 1);
        assert_eq!(metrics.term(RewardTerm::Fire), weights.miss_penalty);
    }

    #[test]
    fn opposite_turns_pay_jitter_penalty_once() {
        let shaper = RewardShaper::new(combat_weights()).unwrap();
        let quiet = delta(0.0, 0.0, 0.0, 0.0);

        let (first, _) = shaper.shape(0.0, &quiet, 0, None);
        let (second, metrics) = shaper.shape(0.0, &quiet, 1, Some(0));
        let (third, _) = shaper.shape(0.0, &quiet, 1, Some(1));

        assert_eq!(first, 0.0);
        assert_relative_eq!(second, shaper.weights().jitter_penalty);
        assert_eq!(metrics.term(RewardTerm::Jitter), shaper.weights().jitter_penalty);
        assert_eq!(third, 0.0);
    }

    #[test]
    fn damage_is_penalized_but_healing_is_not_rewarded() {
        let shaper = RewardShaper::new(RewardWeights {
            health_weight: 0.5,
            ..RewardWeights::zero()
        })
        .unwrap();

        let (hurt, metrics) = shaper.shape(0.0, &delta(0.0, 0.0, -20.0, 0.0), 0, None);
        let (healed, _) = shaper.shape(0.0, &delta(0.0, 0.0, 25.0, 0.0), 0, None);

        assert_relative_eq!(hurt, -10.0);
        assert_eq!(metrics.damage_taken, 20.0);
        assert_eq!(healed, 0.0);
    }

    #[test]
    fn shaped_minus_raw_equals_sum_of_terms() {
        let shaper = RewardShaper::new(RewardWeights::default()).unwrap();
        let deltas = [
            delta(0.0, 0.0, 0.0, 0.0),
            delta(2.0, 3.0, -7.0, -4.0),
            delta(-1.0, 0.0, 12.0, 5.0),
            delta(0.0, 1.0, 0.0, -1.0),
        ];
        for (i, d) in deltas.iter().enumerate() {
            let raw = i as f32 - 1.5;
            let (shaped, metrics) = shaper.shape(raw, d, i % 3, Some((i + 1) % 3));
            let expected: f32 = RewardTerm::iter()
                .filter(|t| shaper.weights().is_enabled(*t))
                .map(|t| metrics.term(t))
                .sum();
            assert_relative_eq!(shaped - raw, expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn progress_term_only_rewards_forward_motion() {
        let shaper = RewardShaper::new(RewardWeights::profile(RewardProfile::DeadlyCorridor)).unwrap();
        let forward = VariableDelta::from_pairs([(GameVariable::PositionX, 50.0)]);
        let backward = VariableDelta::from_pairs([(GameVariable::PositionX, -50.0)]);

        assert_relative_eq!(shaper.shape(0.0, &forward, 0, None).0, 0.5);
        assert_eq!(shaper.shape(0.0, &backward, 0, None).0, 0.0);
    }

    #[test]
    fn raw_profile_passes_reward_through() {
        let shaper = RewardShaper::new(RewardWeights::profile(RewardProfile::Raw)).unwrap();
        let (shaped, metrics) = shaper.shape(3.25, &delta(4.0, 4.0, -50.0, -4.0), 0, Some(1));
        assert_eq!(shaped, 3.25);
        assert!(metrics.terms.is_empty());
    }

    #[test]
    fn enabled_terms_must_be_tracked() {
        let shaper = RewardShaper::new(RewardWeights::default()).unwrap();
        let tracker = VariableTracker::new(vec![GameVariable::KillCount, GameVariable::Health]);
        let err = shaper.check_tracked(&tracker).unwrap_err();
        assert!(matches!(
            err,
            Error::UntrackedVariable { variable: GameVariable::HitCount, .. }
        ));
    }

    #[test]
    fn positive_miss_penalty_is_rejected() {
        let weights = RewardWeights {
            miss_penalty: 0.3,
            ..RewardWeights::default()
        };
        assert!(matches!(RewardShaper::new(weights), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn profiles_parse_from_snake_case() {
        assert_eq!(
            RewardProfile::from_str("deadly_corridor").unwrap(),
            RewardProfile::DeadlyCorridor
        );
        for profile in RewardProfile::iter() {
            assert!(RewardWeights::profile(profile).validate().is_ok());
        }
    }
}
