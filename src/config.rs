//! Pipeline configuration
//!
//! Every field is enumerated up front with a documented default; a TOML file only
//! needs to name what it changes.
//!
//! ```toml
//! tracked_variables = ["KILLCOUNT", "HITCOUNT", "HEALTH", "AMMO2"]
//! reward_profile = "defend_the_center"
//!
//! [observation]
//! width = 64
//! height = 48
//!
//! [[actions]]
//! name = "turn_left_attack"
//! buttons = ["TURN_LEFT", "ATTACK"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::wrappers::{ActionSet, ObservationConfig, RewardProfile, RewardWeights};

/// Everything needed to wrap one simulator instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Engine variable names to track
    /// (default: `KILLCOUNT`, `HITCOUNT`, `HEALTH`, `AMMO2`, `POSITION_X`)
    pub tracked_variables: Vec<String>,
    /// Named weight preset (default: `standard`)
    pub reward_profile: RewardProfile,
    /// Explicit weights; replaces the profile when present
    pub reward_weights: Option<RewardWeights>,
    pub observation: ObservationConfig,
    /// Composite actions, indexed by decision (default: [`ActionSet::standard`])
    pub actions: ActionSet,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tracked_variables: ["KILLCOUNT", "HITCOUNT", "HEALTH", "AMMO2", "POSITION_X"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            reward_profile: RewardProfile::Standard,
            reward_weights: None,
            observation: ObservationConfig::default(),
            actions: ActionSet::standard(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::MissingAsset {
                asset: path.display().to_string(),
                remediation: "pass the path of an existing pipeline TOML file".to_string(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|err| Error::InvalidConfig(err.to_string()))
    }

    /// Weights in effect: explicit weights if given, else the profile's
    pub fn effective_weights(&self) -> RewardWeights {
        self.reward_weights
            .clone()
            .unwrap_or_else(|| RewardWeights::profile(self.reward_profile))
    }

    pub fn with_profile(mut self, profile: RewardProfile) -> Self {
        self.reward_profile = profile;
        self.reward_weights = None;
        self
    }

    pub fn with_weights(mut self, weights: RewardWeights) -> Self {
        self.reward_weights = Some(weights);
        self
    }

    pub fn with_observation(mut self, observation: ObservationConfig) -> Self {
        self.observation = observation;
        self
    }

    pub fn with_actions(mut self, actions: ActionSet) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_tracked_variables<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.tracked_variables = names.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::Button;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            tracked_variables = ["KILLCOUNT", "HITCOUNT", "HEALTH", "AMMO2"]
            reward_profile = "defend_the_center"

            [observation]
            width = 64
            height = 48
            grayscale = true

            [[actions]]
            name = "turn_left_attack"
            buttons = ["TURN_LEFT", "ATTACK"]
            "#,
        )
        .unwrap();

        assert_eq!(config.reward_profile, RewardProfile::DefendTheCenter);
        assert_eq!(config.observation.width, 64);
        assert_eq!(config.observation.crop_bottom, 0.15);
        assert_eq!(config.actions.len(), 1);
        assert_eq!(
            config.actions.get(0).unwrap().buttons,
            vec![Button::TurnLeft, Button::Attack]
        );
        assert_eq!(
            config.effective_weights(),
            RewardWeights::profile(RewardProfile::DefendTheCenter)
        );
    }

    #[test]
    fn explicit_weights_override_profile() {
        let config = PipelineConfig::from_toml_str(
            r#"
            reward_profile = "raw"

            [reward_weights]
            version = "experiment-7"
            kill_weight = 3.0
            "#,
        )
        .unwrap();

        let weights = config.effective_weights();
        assert_eq!(weights.version, "experiment-7");
        assert_eq!(weights.kill_weight, 3.0);
        assert_eq!(weights.hit_weight, RewardWeights::default().hit_weight);
    }

    #[test]
    fn toml_round_trip_preserves_config() {
        let config = PipelineConfig::default().with_actions(ActionSet::corridor());
        let text = config.to_toml_string().unwrap();
        assert_eq!(PipelineConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn missing_file_names_the_asset() {
        let err = PipelineConfig::from_path("/nonexistent/pipeline.toml").unwrap_err();
        assert!(matches!(err, Error::MissingAsset { asset, .. } if asset.contains("pipeline.toml")));
    }

    #[test]
    fn unknown_profile_is_a_configuration_error() {
        let err = PipelineConfig::from_toml_str(r#"reward_profile = "pacifist""#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
