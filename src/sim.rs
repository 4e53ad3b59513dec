//! Contract of the simulation engine this crate sits on top of
//!
//! The engine itself lives outside the crate. A binding implements [`Simulator`]
//! and hands it to [`EpisodeStepPipeline`](crate::wrappers::EpisodeStepPipeline),
//! which owns it for the lifetime of the episode instance.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::{Error, ReadError, Result};

/// Scalar game variables the pipeline knows how to interpret
///
/// String forms match the engine's configuration names (`KILLCOUNT`, `AMMO2`, ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, AsRefStr,
)]
pub enum GameVariable {
    #[strum(serialize = "KILLCOUNT")]
    KillCount,
    #[strum(serialize = "HITCOUNT")]
    HitCount,
    #[strum(serialize = "HEALTH")]
    Health,
    #[strum(serialize = "AMMO2")]
    Ammo,
    #[strum(serialize = "POSITION_X")]
    PositionX,
    #[strum(serialize = "FRAGCOUNT")]
    FragCount,
    #[strum(serialize = "ARMOR")]
    Armor,
}

impl GameVariable {
    /// Value assumed for the "previous" snapshot when the engine does not report
    /// the variable at episode start.
    pub fn baseline(self) -> f32 {
        match self {
            GameVariable::Health => 100.0,
            _ => 0.0,
        }
    }
}

/// Native buttons, named as in the engine's `available_buttons` list
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
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Button {
    MoveLeft,
    MoveRight,
    TurnLeft,
    TurnRight,
    MoveForward,
    MoveBackward,
    Attack,
    Use,
    Speed,
    Jump,
    Crouch,
}

/// Raw screen buffer as produced by the engine
///
/// `dims` is either channel-first `[C, H, W]` or channel-last `[H, W, C]`; the
/// [`ObservationTransformer`](crate::wrappers::ObservationTransformer) works out which.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub pixels: Vec<u8>,
    pub dims: [usize; 3],
}

impl RawFrame {
    pub fn new(pixels: Vec<u8>, dims: [usize; 3]) -> Result<Self> {
        let expected = dims.iter().product::<usize>();
        if pixels.len() != expected {
            return Err(Error::FrameShapeMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self { pixels, dims })
    }
}

/// What the engine reports after advancing one step
#[derive(Debug, Clone)]
pub struct SimStep {
    pub frame: RawFrame,
    pub reward: f32,
    pub terminated: bool,
    pub truncated: bool,
}

/// Control submitted to the engine for one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// Index into the engine's own discrete action catalogue
    Catalogue(usize),
    /// Raw 0/1 button states in native button order
    Buttons(Vec<u8>),
}

/// Per-variable scalar reads; any single read may fail transiently
pub trait VariableSource {
    fn read_variable(&self, variable: GameVariable) -> std::result::Result<f32, ReadError>;
}

/// A running simulator instance
pub trait Simulator: VariableSource {
    /// Start a new episode and return its first frame
    fn reset(&mut self, seed: Option<u64>) -> Result<RawFrame>;

    /// Advance one step with the given control
    fn step(&mut self, control: &Control) -> Result<SimStep>;

    /// Native button order; every control vector is laid out in this order
    fn button_order(&self) -> &[Button];

    /// The engine's enumerated discrete actions, if it exposes them
    fn action_catalogue(&self) -> Option<&[Vec<u8>]>;

    /// Variables the loaded scenario declares
    fn available_variables(&self) -> &[GameVariable];
}

fn read_from_map(
    value: Option<&f32>,
    variable: GameVariable,
) -> std::result::Result<f32, ReadError> {
    match value {
        Some(v) if v.is_finite() => Ok(*v),
        Some(_) => Err(ReadError::NonFinite(variable)),
        None => Err(ReadError::Unavailable(variable)),
    }
}

impl VariableSource for HashMap<GameVariable, f32> {
    fn read_variable(&self, variable: GameVariable) -> std::result::Result<f32, ReadError> {
        read_from_map(self.get(&variable), variable)
    }
}

impl VariableSource for BTreeMap<GameVariable, f32> {
    fn read_variable(&self, variable: GameVariable) -> std::result::Result<f32, ReadError> {
        read_from_map(self.get(&variable), variable)
    }
}

impl<S: VariableSource + ?Sized> VariableSource for Box<S> {
    fn read_variable(&self, variable: GameVariable) -> std::result::Result<f32, ReadError> {
        (**self).read_variable(variable)
    }
}

impl<S: Simulator + ?Sized> Simulator for Box<S> {
    fn reset(&mut self, seed: Option<u64>) -> Result<RawFrame> {
        (**self).reset(seed)
    }

    fn step(&mut self, control: &Control) -> Result<SimStep> {
        (**self).step(control)
    }

    fn button_order(&self) -> &[Button] {
        (**self).button_order()
    }

    fn action_catalogue(&self) -> Option<&[Vec<u8>]> {
        (**self).action_catalogue()
    }

    fn available_variables(&self) -> &[GameVariable] {
        (**self).available_variables()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn variable_names_round_trip_engine_spelling() {
        assert_eq!(GameVariable::from_str("AMMO2").unwrap(), GameVariable::Ammo);
        assert_eq!(GameVariable::KillCount.to_string(), "KILLCOUNT");
        assert!(GameVariable::from_str("MANA").is_err());
    }

    #[test]
    fn button_names_are_screaming_snake_case() {
        assert_eq!(Button::TurnLeft.to_string(), "TURN_LEFT");
        assert_eq!(Button::from_str("ATTACK").unwrap(), Button::Attack);
    }

    #[test]
    fn raw_frame_rejects_wrong_length() {
        let err = RawFrame::new(vec![0; 10], [3, 2, 2]).unwrap_err();
        assert!(matches!(err, Error::FrameShapeMismatch { expected: 12, actual: 10 }));
    }

    #[test]
    fn map_source_reports_missing_and_non_finite() {
        let mut vars = HashMap::new();
        vars.insert(GameVariable::Health, f32::NAN);
        assert_eq!(
            vars.read_variable(GameVariable::Health),
            Err(ReadError::NonFinite(GameVariable::Health))
        );
        assert_eq!(
            vars.read_variable(GameVariable::Ammo),
            Err(ReadError::Unavailable(GameVariable::Ammo))
        );
    }
}
