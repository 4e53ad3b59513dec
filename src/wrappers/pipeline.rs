//! Per-step composition of the wrappers around one simulator instance

use rand::{thread_rng, Rng};
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::env::{DiscreteActionSpace, Environment, Report, Step};
use crate::error::{Error, Result};
use crate::sim::{RawFrame, Simulator};

use super::action::ActionRemapper;
use super::observation::{ObservationFrame, ObservationTransformer};
use super::reward::{RewardMetrics, RewardShaper};
use super::variables::{VariableDelta, VariableTracker};

/// Cumulative counters kept in [`EpisodeStepPipeline::report`]
pub const REPORT_KEYS: [&str; 7] = [
    "reward",
    "raw_reward",
    "kills",
    "hits",
    "ammo_used",
    "damage_taken",
    "steps",
];

/// Diagnostics for one step
#[derive(Debug, Clone, PartialEq)]
pub struct StepMetrics {
    /// Engine reward before shaping
    pub raw_reward: f32,
    pub reward: RewardMetrics,
    pub delta: VariableDelta,
    /// Steps taken in the current episode, this one included
    pub episode_step: usize,
}

/// Turns a policy decision into one engine step and a normalized observation
///
/// Owns its simulator. Calls are strictly sequential: `reset`, then `step` until the
/// episode ends, then `reset` again.
#[derive(Debug)]
pub struct EpisodeStepPipeline<S: Simulator> {
    sim: S,
    tracker: VariableTracker,
    shaper: RewardShaper,
    transformer: ObservationTransformer,
    remapper: ActionRemapper,
    prev_action: Option<usize>,
    episode_step: usize,
    active: bool,
    pub report: Report,
}

impl<S: Simulator> EpisodeStepPipeline<S> {
    pub fn new(sim: S, config: &PipelineConfig) -> Result<Self> {
        let tracker = VariableTracker::from_names(&config.tracked_variables)?;
        let shaper = RewardShaper::new(config.effective_weights())?;
        let transformer = ObservationTransformer::new(config.observation.clone())?;
        let remapper =
            ActionRemapper::new(config.actions.clone(), sim.button_order(), sim.action_catalogue())?;
        Self::from_parts(sim, tracker, shaper, transformer, remapper)
    }

    /// Assemble from already-built wrappers
    pub fn from_parts(
        sim: S,
        tracker: VariableTracker,
        shaper: RewardShaper,
        transformer: ObservationTransformer,
        remapper: ActionRemapper,
    ) -> Result<Self> {
        shaper.check_tracked(&tracker)?;

        if let Some(&(prev, current)) = shaper
            .weights()
            .jitter_pairs
            .iter()
            .find(|(a, b)| *a >= remapper.len() || *b >= remapper.len())
        {
            return Err(Error::InvalidConfig(format!(
                "jitter pair ({prev}, {current}) is outside the {} available decisions",
                remapper.len()
            )));
        }

        let declared = sim.available_variables();
        for variable in tracker.tracked() {
            if !declared.contains(variable) {
                warn!(%variable, "tracked variable is not declared by the scenario, reads will fall back");
            }
        }

        debug!(
            weights = %shaper.weights().version,
            actions = remapper.len(),
            shape = ?transformer.output_shape(),
            "episode pipeline ready"
        );

        Ok(Self {
            sim,
            tracker,
            shaper,
            transformer,
            remapper,
            prev_action: None,
            episode_step: 0,
            active: false,
            report: Report::new(REPORT_KEYS.to_vec()),
        })
    }

    pub fn num_actions(&self) -> usize {
        self.remapper.len()
    }

    /// `[C, H, W]` of every observation
    pub fn observation_shape(&self) -> [usize; 3] {
        self.transformer.output_shape()
    }

    pub fn simulator(&self) -> &S {
        &self.sim
    }

    pub fn tracker(&self) -> &VariableTracker {
        &self.tracker
    }

    pub fn shaper(&self) -> &RewardShaper {
        &self.shaper
    }

    pub fn remapper(&self) -> &ActionRemapper {
        &self.remapper
    }

    pub fn into_simulator(self) -> S {
        self.sim
    }

    #[cfg(test)]
    pub(crate) fn simulator_mut(&mut self) -> &mut S {
        &mut self.sim
    }

    /// A frame that cannot be normalized ends the episode; the caller must reset.
    fn observe(&mut self, frame: &RawFrame) -> Result<ObservationFrame> {
        self.transformer.transform(frame).map_err(|err| {
            self.active = false;
            error!(%err, step = self.episode_step, "cannot normalize engine frame, episode stopped");
            err
        })
    }
}

impl<S: Simulator> Environment for EpisodeStepPipeline<S> {
    type State = ObservationFrame;
    type Action = usize;
    type Metrics = StepMetrics;

    fn reset(&mut self, seed: Option<u64>) -> Result<Self::State> {
        self.active = false;
        let frame = self.sim.reset(seed)?;
        self.tracker.reset(&self.sim);
        self.prev_action = None;
        self.episode_step = 0;
        self.report.clear();

        let observation = self.observe(&frame)?;
        self.active = true;
        Ok(observation)
    }

    fn step(&mut self, action: Self::Action) -> Result<Step<Self::State, Self::Metrics>> {
        if !self.active {
            return Err(Error::EpisodeNotStarted);
        }

        let control = self.remapper.remap(action)?;
        let outcome = self.sim.step(control)?;

        let (_, delta) = self.tracker.update(&self.sim);
        let (reward, breakdown) = self.shaper.shape(outcome.reward, &delta, action, self.prev_action);
        self.prev_action = Some(action);
        self.episode_step += 1;

        self.report.add("reward", reward as f64);
        self.report.add("raw_reward", outcome.reward as f64);
        self.report.add("kills", breakdown.kills as f64);
        self.report.add("hits", breakdown.hits as f64);
        self.report.add("ammo_used", breakdown.ammo_used as f64);
        self.report.add("damage_taken", breakdown.damage_taken as f64);
        self.report.add("steps", 1.0);

        if outcome.terminated || outcome.truncated {
            self.active = false;
            info!(
                steps = self.episode_step,
                terminated = outcome.terminated,
                report = ?self.report,
                "episode finished"
            );
        }

        let state = self.observe(&outcome.frame)?;

        Ok(Step {
            state,
            reward,
            terminated: outcome.terminated,
            truncated: outcome.truncated,
            metrics: StepMetrics {
                raw_reward: outcome.reward,
                reward: breakdown,
                delta,
                episode_step: self.episode_step,
            },
        })
    }

    fn random_action(&self) -> Self::Action {
        thread_rng().gen_range(0..self.remapper.len())
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

impl<S: Simulator> DiscreteActionSpace for EpisodeStepPipeline<S> {
    fn actions(&self) -> Vec<Self::Action> {
        (0..self.remapper.len()).collect()
    }
}
