// Drives the defend_the_center pipeline with an untrained recurrent policy against a
// small synthetic arena, then round-trips the policy parameters through a checkpoint.
//
//   RUST_LOG=doom_rl=debug cargo run --example synthetic_rollout

use std::collections::HashMap;

use burn::backend::{ndarray::NdArrayDevice, NdArray};
use doom_rl::{
    env::Environment,
    error::ReadError,
    registry::{BoxedSimulator, Registry, ScenarioSpec},
    sim::{Button, Control, GameVariable, RawFrame, SimStep, Simulator, VariableSource},
    traits::ToTensor,
};
use once_cell::sync::Lazy;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;

type Backend = NdArray;

static DEVICE: Lazy<NdArrayDevice> = Lazy::new(NdArrayDevice::default);

const NUM_EPISODES: u64 = 3;
const MAX_STEPS: usize = 300;
const SCREEN: [usize; 3] = [120, 160, 3];

/// One enemy circling the player; turning moves it across the screen
struct Arena {
    rng: StdRng,
    buttons: Vec<Button>,
    declared: Vec<GameVariable>,
    vars: HashMap<GameVariable, f32>,
    enemy_x: f32,
    enemy_hits: u32,
    steps: usize,
}

impl Arena {
    fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            buttons: vec![Button::TurnLeft, Button::TurnRight, Button::Attack],
            declared: vec![
                GameVariable::KillCount,
                GameVariable::HitCount,
                GameVariable::Health,
                GameVariable::Ammo,
            ],
            vars: HashMap::new(),
            enemy_x: 0.0,
            enemy_hits: 0,
            steps: 0,
        }
    }

    fn pressed(&self, control: &Control, button: Button) -> bool {
        match control {
            Control::Buttons(states) => self
                .buttons
                .iter()
                .position(|b| *b == button)
                .and_then(|i| states.get(i))
                .is_some_and(|state| *state != 0),
            Control::Catalogue(_) => false,
        }
    }

    fn add(&mut self, var: GameVariable, amount: f32) {
        *self.vars.entry(var).or_insert(0.0) += amount;
    }

    fn render(&self) -> RawFrame {
        let [h, w, c] = SCREEN;
        let mut pixels = vec![0u8; h * w * c];
        let center = ((self.enemy_x + 1.0) * 0.5 * w as f32) as isize;

        for y in 0..h {
            for x in 0..w {
                let px = &mut pixels[(y * w + x) * c..][..c];
                let enemy = (x as isize - center).abs() < 6 && (40..80).contains(&y);
                let shade = if y > h * 85 / 100 {
                    [200, 200, 200]
                } else if enemy {
                    [220, 30, 30]
                } else if y > h / 2 {
                    [60, 50, 40]
                } else {
                    [90, 90, 110]
                };
                px.copy_from_slice(&shade);
            }
        }
        RawFrame {
            pixels,
            dims: SCREEN,
        }
    }
}

impl VariableSource for Arena {
    fn read_variable(&self, variable: GameVariable) -> Result<f32, ReadError> {
        self.vars.read_variable(variable)
    }
}

impl Simulator for Arena {
    fn reset(&mut self, seed: Option<u64>) -> doom_rl::Result<RawFrame> {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        self.vars = [
            (GameVariable::KillCount, 0.0),
            (GameVariable::HitCount, 0.0),
            (GameVariable::Health, 100.0),
            (GameVariable::Ammo, 50.0),
        ]
        .into_iter()
        .collect();
        self.enemy_x = self.rng.gen_range(-1.0..1.0);
        self.enemy_hits = 0;
        self.steps = 0;
        Ok(self.render())
    }

    fn step(&mut self, control: &Control) -> doom_rl::Result<SimStep> {
        self.steps += 1;
        let mut reward = 0.0;

        if self.pressed(control, Button::TurnLeft) {
            self.enemy_x += 0.1;
        }
        if self.pressed(control, Button::TurnRight) {
            self.enemy_x -= 0.1;
        }
        self.enemy_x = (self.enemy_x + self.rng.gen_range(-0.03..0.03)).clamp(-1.0, 1.0);

        let ammo = self.vars.get(&GameVariable::Ammo).copied().unwrap_or(0.0);
        if self.pressed(control, Button::Attack) && ammo > 0.0 {
            self.add(GameVariable::Ammo, -1.0);
            if self.enemy_x.abs() < 0.1 {
                self.add(GameVariable::HitCount, 1.0);
                self.enemy_hits += 1;
                if self.enemy_hits == 3 {
                    self.add(GameVariable::KillCount, 1.0);
                    reward += 1.0;
                    self.enemy_hits = 0;
                    self.enemy_x = self.rng.gen_range(-1.0..1.0);
                }
            }
        }

        if self.rng.gen_bool(0.05) {
            self.add(GameVariable::Health, -5.0);
        }

        let health = self.vars.get(&GameVariable::Health).copied().unwrap_or(0.0);
        Ok(SimStep {
            frame: self.render(),
            reward,
            terminated: health <= 0.0,
            truncated: self.steps >= MAX_STEPS,
        })
    }

    fn button_order(&self) -> &[Button] {
        &self.buttons
    }

    fn action_catalogue(&self) -> Option<&[Vec<u8>]> {
        None
    }

    fn available_variables(&self) -> &[GameVariable] {
        &self.declared
    }
}

fn main() -> doom_rl::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut registry = Registry::with_builtin_scenarios();
    registry.register_simulator(
        "defend_the_center",
        |_: &ScenarioSpec| -> doom_rl::Result<BoxedSimulator> { Ok(Box::new(Arena::new(7))) },
    )?;

    let mut pipeline = registry.build_pipeline("defend_the_center")?;
    let model = registry
        .policy_config("defend_the_center")?
        .with_encoder_dim(128)
        .with_core_dim(128)
        .with_decoder_layers(vec![128])
        .init::<Backend>(&*DEVICE)?;

    for episode in 0..NUM_EPISODES {
        let mut obs = pipeline.reset(Some(episode))?;
        let mut hidden = model.initial_state(1, &*DEVICE);

        loop {
            let out = model.forward_single(obs.to_tensor(&*DEVICE), hidden, false)?;
            hidden = out.new_hidden;
            let decision = out
                .action
                .and_then(|a| a.decisions().first().copied())
                .unwrap_or_else(|| pipeline.random_action());

            let step = pipeline.step(decision)?;
            obs = step.state;
            if step.terminated || step.truncated {
                break;
            }
        }

        info!(episode, report = ?pipeline.report, "episode summary");
    }

    let path = std::env::temp_dir().join("doom_rl_synthetic_policy.json");
    model.save_params(&path)?;

    let mut restored = registry
        .policy_config("defend_the_center")?
        .with_encoder_dim(128)
        .with_core_dim(128)
        .with_decoder_layers(vec![128])
        .init::<Backend>(&*DEVICE)?;
    let report = restored.load_params(&path)?;
    info!(loaded = report.loaded.len(), complete = report.is_complete(), "checkpoint restored");

    Ok(())
}
