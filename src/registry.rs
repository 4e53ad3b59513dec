//! Explicit registry of scenarios and simulator factories
//!
//! Built once at startup and handed to whatever builds pipelines and models.
//! Nothing here is global.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::nn::PolicyModelConfig;
use crate::sim::Simulator;
use crate::wrappers::{ActionSet, EpisodeStepPipeline, RewardProfile, RewardWeights};

/// Simulator handle produced by a registered factory
pub type BoxedSimulator = Box<dyn Simulator + Send>;

/// Creates a fresh simulator instance for a scenario
pub type SimulatorFactory = Box<dyn Fn(&ScenarioSpec) -> Result<BoxedSimulator> + Send + Sync>;

/// A named scenario and the pipeline configuration that goes with it
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioSpec {
    pub name: String,
    pub config: PipelineConfig,
}

impl ScenarioSpec {
    pub fn new(name: &str, config: PipelineConfig) -> Self {
        Self {
            name: name.to_string(),
            config,
        }
    }

    /// Scenario whose jitter pairs are the action set's left/right reversals
    fn with_profile(
        name: &str,
        profile: RewardProfile,
        actions: ActionSet,
        tracked: &[&str],
    ) -> Self {
        let weights = RewardWeights::profile(profile).with_jitter_pairs(actions.reversal_pairs());
        let config = PipelineConfig::default()
            .with_tracked_variables(tracked)
            .with_profile(profile)
            .with_weights(weights)
            .with_actions(actions);
        Self::new(name, config)
    }

    pub fn builtin() -> Vec<Self> {
        const COMBAT: [&str; 4] = ["KILLCOUNT", "HITCOUNT", "HEALTH", "AMMO2"];
        vec![
            Self::with_profile("basic", RewardProfile::Standard, ActionSet::basic(), &COMBAT),
            Self::with_profile(
                "defend_the_center",
                RewardProfile::DefendTheCenter,
                ActionSet::standard(),
                &COMBAT,
            ),
            Self::with_profile(
                "deadly_corridor",
                RewardProfile::DeadlyCorridor,
                ActionSet::corridor(),
                &["KILLCOUNT", "HITCOUNT", "HEALTH", "AMMO2", "POSITION_X"],
            ),
            Self::with_profile(
                "health_gathering",
                RewardProfile::HealthGathering,
                ActionSet::navigation(),
                &["HEALTH"],
            ),
        ]
    }
}

#[derive(Default)]
pub struct Registry {
    scenarios: BTreeMap<String, ScenarioSpec>,
    simulators: BTreeMap<String, SimulatorFactory>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("scenarios", &self.scenarios.keys().collect::<Vec<_>>())
            .field("simulators", &self.simulators.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in scenarios, without any simulator factory
    pub fn with_builtin_scenarios() -> Self {
        let mut registry = Self::new();
        for spec in ScenarioSpec::builtin() {
            registry.register_scenario(spec);
        }
        registry
    }

    /// Add or replace a scenario; returns the replaced one
    pub fn register_scenario(&mut self, spec: ScenarioSpec) -> Option<ScenarioSpec> {
        debug!(scenario = %spec.name, "registering scenario");
        self.scenarios.insert(spec.name.clone(), spec)
    }

    /// Attach the factory that creates simulators for `scenario`
    pub fn register_simulator<F>(&mut self, scenario: &str, factory: F) -> Result<()>
    where
        F: Fn(&ScenarioSpec) -> Result<BoxedSimulator> + Send + Sync + 'static,
    {
        self.scenario(scenario)?;
        self.simulators.insert(scenario.to_string(), Box::new(factory));
        Ok(())
    }

    pub fn scenario_names(&self) -> impl Iterator<Item = &str> {
        self.scenarios.keys().map(String::as_str)
    }

    pub fn scenario(&self, name: &str) -> Result<&ScenarioSpec> {
        self.scenarios.get(name).ok_or_else(|| Error::UnknownScenario {
            name: name.to_string(),
            known: self.scenario_names().collect::<Vec<_>>().join(", "),
        })
    }

    /// New simulator instance wrapped in a pipeline
    pub fn build_pipeline(&self, name: &str) -> Result<EpisodeStepPipeline<BoxedSimulator>> {
        let spec = self.scenario(name)?;
        let factory = self.simulators.get(name).ok_or_else(|| Error::MissingAsset {
            asset: format!("simulator for scenario `{name}`"),
            remediation: "register a factory with `Registry::register_simulator` at startup"
                .to_string(),
        })?;

        let sim = factory(spec)?;
        let pipeline = EpisodeStepPipeline::new(sim, &spec.config)?;
        info!(scenario = name, actions = pipeline.num_actions(), "built episode pipeline");
        Ok(pipeline)
    }

    /// Policy configuration sized for the scenario's observations and actions
    pub fn policy_config(&self, name: &str) -> Result<PolicyModelConfig> {
        let config = &self.scenario(name)?.config;
        Ok(PolicyModelConfig::new(
            config.observation.output_shape(),
            config.actions.len(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;
    use crate::sim::GameVariable;
    use crate::testing::ScriptedSimulator;

    fn scripted(_: &ScenarioSpec) -> Result<BoxedSimulator> {
        let start = [
            (GameVariable::KillCount, 0.0),
            (GameVariable::HitCount, 0.0),
            (GameVariable::Health, 100.0),
            (GameVariable::Ammo, 50.0),
        ];
        Ok(Box::new(ScriptedSimulator::new(&start, vec![])))
    }

    #[test]
    fn builtin_scenarios_are_registered_by_name() {
        let registry = Registry::with_builtin_scenarios();
        let names: Vec<&str> = registry.scenario_names().collect();
        assert_eq!(
            names,
            vec!["basic", "deadly_corridor", "defend_the_center", "health_gathering"]
        );
    }

    #[test]
    fn unknown_scenario_lists_known_ones() {
        let registry = Registry::with_builtin_scenarios();
        match registry.scenario("deathmatch") {
            Err(Error::UnknownScenario { name, known }) => {
                assert_eq!(name, "deathmatch");
                assert!(known.contains("basic"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn jitter_pairs_follow_the_action_set() {
        let registry = Registry::with_builtin_scenarios();
        let weights = registry
            .scenario("defend_the_center")
            .unwrap()
            .config
            .effective_weights();
        assert_eq!(weights.jitter_pairs, vec![(0, 1), (1, 0), (3, 4), (4, 3)]);
        assert_eq!(weights.version, "defend-the-center-v2");
    }

    #[test]
    fn pipeline_needs_a_registered_simulator() {
        let registry = Registry::with_builtin_scenarios();
        assert!(matches!(
            registry.build_pipeline("basic"),
            Err(Error::MissingAsset { .. })
        ));
    }

    #[test]
    fn simulator_for_unknown_scenario_is_rejected() {
        let mut registry = Registry::new();
        assert!(registry.register_simulator("basic", scripted).is_err());
    }

    #[test]
    fn registered_factory_builds_working_pipelines() {
        let mut registry = Registry::with_builtin_scenarios();
        registry.register_simulator("defend_the_center", scripted).unwrap();

        let mut first = registry.build_pipeline("defend_the_center").unwrap();
        let second = registry.build_pipeline("defend_the_center").unwrap();

        assert_eq!(first.num_actions(), 5);
        assert_eq!(first.reset(Some(1)).unwrap().shape, [3, 96, 128]);
        assert!(!second.is_active());
    }

    #[test]
    fn policy_config_matches_the_scenario() {
        let registry = Registry::with_builtin_scenarios();
        let config = registry.policy_config("deadly_corridor").unwrap();

        assert_eq!(config.observation_shape, [3, 96, 128]);
        assert_eq!(config.num_actions, 9);
        assert_eq!(config.core_dim, 512);
    }
}
