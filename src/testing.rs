//! Scripted simulator used by unit tests across the crate

use std::collections::HashMap;

use crate::error::{ReadError, Result};
use crate::sim::{Button, Control, GameVariable, RawFrame, SimStep, Simulator, VariableSource};

/// Variable values and engine outcome for one scripted step
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedStep {
    pub variables: HashMap<GameVariable, f32>,
    pub reward: f32,
    pub terminated: bool,
    pub truncated: bool,
}

impl ScriptedStep {
    pub fn new(variables: &[(GameVariable, f32)], reward: f32) -> Self {
        Self {
            variables: variables.iter().copied().collect(),
            reward,
            ..Self::default()
        }
    }

    pub fn terminal(mut self) -> Self {
        self.terminated = true;
        self
    }

    pub fn truncated(mut self) -> Self {
        self.truncated = true;
        self
    }
}

/// Plays back a fixed list of steps and records every submitted control
///
/// Once the script runs out the last step repeats.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedSimulator {
    pub buttons: Vec<Button>,
    pub catalogue: Option<Vec<Vec<u8>>>,
    pub declared: Vec<GameVariable>,
    pub initial: HashMap<GameVariable, f32>,
    pub script: Vec<ScriptedStep>,
    pub dims: [usize; 3],
    pub submitted: Vec<Control>,
    pub seeds: Vec<Option<u64>>,
    current: HashMap<GameVariable, f32>,
    cursor: usize,
}

impl ScriptedSimulator {
    pub fn new(initial: &[(GameVariable, f32)], script: Vec<ScriptedStep>) -> Self {
        Self {
            buttons: vec![
                Button::TurnLeft,
                Button::TurnRight,
                Button::Attack,
                Button::MoveLeft,
                Button::MoveRight,
            ],
            catalogue: None,
            declared: initial.iter().map(|(v, _)| *v).collect(),
            initial: initial.iter().copied().collect(),
            script,
            dims: [24, 32, 3],
            submitted: Vec::new(),
            seeds: Vec::new(),
            current: HashMap::new(),
            cursor: 0,
        }
    }

    pub fn with_catalogue(mut self, catalogue: Vec<Vec<u8>>) -> Self {
        self.catalogue = Some(catalogue);
        self
    }

    pub fn with_dims(mut self, dims: [usize; 3]) -> Self {
        self.dims = dims;
        self
    }

    fn frame(&self, shade: u8) -> RawFrame {
        let len = self.dims.iter().product();
        RawFrame {
            pixels: vec![shade; len],
            dims: self.dims,
        }
    }
}

impl VariableSource for ScriptedSimulator {
    fn read_variable(&self, variable: GameVariable) -> std::result::Result<f32, ReadError> {
        self.current.read_variable(variable)
    }
}

impl Simulator for ScriptedSimulator {
    fn reset(&mut self, seed: Option<u64>) -> Result<RawFrame> {
        self.seeds.push(seed);
        self.cursor = 0;
        self.current = self.initial.clone();
        Ok(self.frame(0))
    }

    fn step(&mut self, control: &Control) -> Result<SimStep> {
        self.submitted.push(control.clone());
        let step = match self.script.get(self.cursor).or(self.script.last()) {
            Some(step) => step.clone(),
            None => ScriptedStep::default(),
        };
        self.cursor += 1;
        self.current = step.variables.clone();

        Ok(SimStep {
            frame: self.frame((self.cursor * 10).min(255) as u8),
            reward: step.reward,
            terminated: step.terminated,
            truncated: step.truncated,
        })
    }

    fn button_order(&self) -> &[Button] {
        &self.buttons
    }

    fn action_catalogue(&self) -> Option<&[Vec<u8>]> {
        self.catalogue.as_deref()
    }

    fn available_variables(&self) -> &[GameVariable] {
        &self.declared
    }
}
