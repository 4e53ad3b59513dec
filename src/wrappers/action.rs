//! Composite decision indices to native engine controls
//!
//! A policy picks among a small set of [`CompositeAction`]s ("turn left and fire").
//! Each is resolved once, at construction, against the engine's own discrete action
//! catalogue:
//!
//! 1. an identical catalogue entry is used by index;
//! 2. otherwise the catalogue entry with the smallest Hamming distance is used
//!    (lowest index on ties) and a warning is logged;
//! 3. without a catalogue the raw button vector is submitted.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::sim::{Button, Control};

/// A named combination of simultaneously pressed buttons
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeAction {
    pub name: String,
    pub buttons: Vec<Button>,
}

impl CompositeAction {
    pub fn new(name: &str, buttons: &[Button]) -> Self {
        Self {
            name: name.to_string(),
            buttons: buttons.to_vec(),
        }
    }

    fn mirrored(&self) -> Vec<Button> {
        let mut buttons: Vec<Button> = self
            .buttons
            .iter()
            .map(|b| match b {
                Button::TurnLeft => Button::TurnRight,
                Button::TurnRight => Button::TurnLeft,
                Button::MoveLeft => Button::MoveRight,
                Button::MoveRight => Button::MoveLeft,
                other => *other,
            })
            .collect();
        buttons.sort();
        buttons
    }

    fn is_lateral(&self) -> bool {
        self.buttons.iter().any(|b| {
            matches!(
                b,
                Button::TurnLeft | Button::TurnRight | Button::MoveLeft | Button::MoveRight
            )
        })
    }
}

/// Ordered composite actions; the position of an action is its decision index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionSet {
    actions: Vec<CompositeAction>,
}

impl ActionSet {
    pub fn new(actions: Vec<CompositeAction>) -> Self {
        Self { actions }
    }

    /// Turning and shooting, for arenas where enemies come to the player
    pub fn standard() -> Self {
        use Button::*;
        Self::new(vec![
            CompositeAction::new("turn_left", &[TurnLeft]),
            CompositeAction::new("turn_right", &[TurnRight]),
            CompositeAction::new("attack", &[Attack]),
            CompositeAction::new("turn_left_attack", &[TurnLeft, Attack]),
            CompositeAction::new("turn_right_attack", &[TurnRight, Attack]),
        ])
    }

    /// Strafing and shooting
    pub fn basic() -> Self {
        use Button::*;
        Self::new(vec![
            CompositeAction::new("move_left", &[MoveLeft]),
            CompositeAction::new("move_right", &[MoveRight]),
            CompositeAction::new("attack", &[Attack]),
        ])
    }

    /// Advancing down a corridor while fighting
    pub fn corridor() -> Self {
        use Button::*;
        Self::new(vec![
            CompositeAction::new("turn_left", &[TurnLeft]),
            CompositeAction::new("turn_right", &[TurnRight]),
            CompositeAction::new("attack", &[Attack]),
            CompositeAction::new("move_forward", &[MoveForward]),
            CompositeAction::new("forward_attack", &[MoveForward, Attack]),
            CompositeAction::new("move_left", &[MoveLeft]),
            CompositeAction::new("move_right", &[MoveRight]),
            CompositeAction::new("turn_left_attack", &[TurnLeft, Attack]),
            CompositeAction::new("turn_right_attack", &[TurnRight, Attack]),
        ])
    }

    /// Moving around without a weapon
    pub fn navigation() -> Self {
        use Button::*;
        Self::new(vec![
            CompositeAction::new("turn_left", &[TurnLeft]),
            CompositeAction::new("turn_right", &[TurnRight]),
            CompositeAction::new("move_forward", &[MoveForward]),
            CompositeAction::new("forward_turn_left", &[MoveForward, TurnLeft]),
            CompositeAction::new("forward_turn_right", &[MoveForward, TurnRight]),
        ])
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CompositeAction> {
        self.actions.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompositeAction> {
        self.actions.iter()
    }

    /// Ordered (previous, current) pairs that reverse a lateral direction,
    /// e.g. `turn_left` followed by `turn_right`
    pub fn reversal_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (i, a) in self.actions.iter().enumerate() {
            if !a.is_lateral() {
                continue;
            }
            let mirrored = a.mirrored();
            for (j, b) in self.actions.iter().enumerate() {
                let mut buttons = b.buttons.clone();
                buttons.sort();
                if i != j && buttons == mirrored {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }
}

/// How a decision index reaches the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Identical catalogue entry
    Exact(usize),
    /// Closest catalogue entry by Hamming distance
    Nearest { index: usize, distance: usize },
    /// No catalogue; button vector submitted as is
    Raw,
}

/// Immutable decision-index to control mapping for one simulator instance
#[derive(Debug, Clone)]
pub struct ActionRemapper {
    actions: ActionSet,
    vectors: Vec<Vec<u8>>,
    resolutions: Vec<Resolution>,
    controls: Vec<Control>,
}

impl ActionRemapper {
    /// Resolve every composite action against the engine's button layout and catalogue
    pub fn new(
        actions: ActionSet,
        button_order: &[Button],
        catalogue: Option<&[Vec<u8>]>,
    ) -> Result<Self> {
        if actions.is_empty() {
            return Err(Error::EmptyActionSet);
        }

        let vectors = actions
            .iter()
            .map(|action| button_vector(action, button_order))
            .collect::<Result<Vec<_>>>()?;

        for (i, a) in vectors.iter().enumerate() {
            if let Some(j) = vectors[..i].iter().position(|b| b == a) {
                return Err(Error::DuplicateCompositeAction {
                    first: actions.actions[j].name.clone(),
                    second: actions.actions[i].name.clone(),
                });
            }
        }

        let catalogue = match catalogue {
            Some(entries) if !entries.is_empty() => {
                if let Some(bad) = entries.iter().position(|e| e.len() != button_order.len()) {
                    return Err(Error::InvalidConfig(format!(
                        "catalogue entry {bad} has {} buttons, the engine declares {}",
                        entries[bad].len(),
                        button_order.len()
                    )));
                }
                Some(entries)
            }
            _ => None,
        };

        let resolutions: Vec<Resolution> = vectors
            .iter()
            .map(|v| match catalogue {
                Some(entries) => resolve(v, entries),
                None => Resolution::Raw,
            })
            .collect();

        for (action, resolution) in actions.iter().zip(&resolutions) {
            match resolution {
                Resolution::Nearest { index, distance } => warn!(
                    action = %action.name,
                    catalogue_index = index,
                    distance,
                    "composite action not in the engine catalogue, substituting nearest entry"
                ),
                Resolution::Raw => debug!(action = %action.name, "no catalogue, submitting raw buttons"),
                Resolution::Exact(_) => {}
            }
        }

        let controls = vectors
            .iter()
            .zip(&resolutions)
            .map(|(v, r)| match r {
                Resolution::Exact(index) | Resolution::Nearest { index, .. } => {
                    Control::Catalogue(*index)
                }
                Resolution::Raw => Control::Buttons(v.clone()),
            })
            .collect();

        Ok(Self {
            actions,
            vectors,
            resolutions,
            controls,
        })
    }

    /// Number of decision indices
    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    pub fn actions(&self) -> &ActionSet {
        &self.actions
    }

    /// Requested button vector of decision `index`, in native order
    pub fn button_vector(&self, index: usize) -> Option<&[u8]> {
        self.vectors.get(index).map(|v| v.as_slice())
    }

    pub fn resolution(&self, index: usize) -> Option<Resolution> {
        self.resolutions.get(index).copied()
    }

    /// Decisions that were substituted by a non-identical catalogue entry
    pub fn substitutions(&self) -> impl Iterator<Item = (usize, Resolution)> + '_ {
        self.resolutions
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, r)| matches!(r, Resolution::Nearest { .. }))
    }

    /// Control to submit for decision `index`
    pub fn remap(&self, index: usize) -> Result<&Control> {
        self.controls.get(index).ok_or(Error::DecisionOutOfRange {
            index,
            len: self.controls.len(),
        })
    }
}

fn button_vector(action: &CompositeAction, button_order: &[Button]) -> Result<Vec<u8>> {
    let mut vector = vec![0u8; button_order.len()];
    for button in &action.buttons {
        let slot = button_order
            .iter()
            .position(|b| b == button)
            .ok_or_else(|| Error::UnknownButton {
                action: action.name.clone(),
                button: *button,
            })?;
        vector[slot] = 1;
    }
    Ok(vector)
}

fn hamming(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).filter(|(x, y)| (**x != 0) != (**y != 0)).count()
}

fn resolve(vector: &[u8], catalogue: &[Vec<u8>]) -> Resolution {
    // min_by_key keeps the first minimum, which is the lowest index on ties
    let (index, distance) = catalogue
        .iter()
        .enumerate()
        .map(|(i, entry)| (i, hamming(vector, entry)))
        .min_by_key(|(_, d)| *d)
        .unwrap_or((0, usize::MAX));

    if distance == 0 {
        Resolution::Exact(index)
    } else {
        Resolution::Nearest { index, distance }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Button::*;

    const ORDER: [Button; 4] = [TurnLeft, TurnRight, Attack, MoveForward];

    fn turn_left_attack_only() -> ActionSet {
        ActionSet::new(vec![CompositeAction::new("turn_left_attack", &[TurnLeft, Attack])])
    }

    #[test]
    fn exact_catalogue_match_uses_catalogue_index() {
        let catalogue = vec![vec![0, 0, 0, 0], vec![1, 0, 0, 0], vec![0, 1, 0, 0], vec![1, 0, 1, 0]];
        let remapper = ActionRemapper::new(turn_left_attack_only(), &ORDER, Some(&catalogue)).unwrap();

        assert_eq!(remapper.resolution(0), Some(Resolution::Exact(3)));
        assert_eq!(remapper.remap(0).unwrap(), &Control::Catalogue(3));
        assert_eq!(remapper.substitutions().count(), 0);
    }

    #[test]
    fn missing_entry_falls_back_to_nearest() {
        // distances to [1, 0, 1, 0]: 2, 2, 1, 3
        let catalogue = vec![vec![0, 0, 0, 0], vec![1, 1, 1, 1], vec![1, 0, 0, 0], vec![0, 1, 0, 0]];
        let remapper = ActionRemapper::new(turn_left_attack_only(), &ORDER, Some(&catalogue)).unwrap();

        assert_eq!(
            remapper.resolution(0),
            Some(Resolution::Nearest { index: 2, distance: 1 })
        );
        assert_eq!(remapper.remap(0).unwrap(), &Control::Catalogue(2));
        assert_eq!(remapper.substitutions().count(), 1);
    }

    #[test]
    fn ties_go_to_the_lowest_catalogue_index() {
        let catalogue = vec![vec![0, 1, 1, 1], vec![0, 0, 0, 0], vec![1, 1, 1, 1]];
        let remapper = ActionRemapper::new(turn_left_attack_only(), &ORDER, Some(&catalogue)).unwrap();
        assert_eq!(
            remapper.resolution(0),
            Some(Resolution::Nearest { index: 1, distance: 2 })
        );

        let again = ActionRemapper::new(turn_left_attack_only(), &ORDER, Some(&catalogue)).unwrap();
        assert_eq!(remapper.remap(0).unwrap(), again.remap(0).unwrap());
    }

    #[test]
    fn without_catalogue_the_raw_vector_is_submitted() {
        let remapper = ActionRemapper::new(ActionSet::standard(), &ORDER, None).unwrap();
        assert_eq!(remapper.remap(3).unwrap(), &Control::Buttons(vec![1, 0, 1, 0]));

        let empty: Vec<Vec<u8>> = Vec::new();
        let remapper = ActionRemapper::new(ActionSet::standard(), &ORDER, Some(&empty)).unwrap();
        assert_eq!(remapper.resolution(0), Some(Resolution::Raw));
    }

    #[test]
    fn every_decision_resolves_within_catalogue() {
        let catalogue: Vec<Vec<u8>> = (0..16u8)
            .filter(|m| m.count_ones() <= 1)
            .map(|m| (0..4).map(|bit| (m >> bit) & 1).collect())
            .collect();
        let remapper = ActionRemapper::new(ActionSet::standard(), &ORDER, Some(&catalogue)).unwrap();

        for i in 0..remapper.len() {
            let requested = remapper.button_vector(i).unwrap();
            match (remapper.remap(i).unwrap(), remapper.resolution(i).unwrap()) {
                (Control::Catalogue(idx), Resolution::Exact(e)) => {
                    assert_eq!(*idx, e);
                    assert_eq!(catalogue[e].as_slice(), requested);
                }
                (Control::Catalogue(idx), Resolution::Nearest { index, distance }) => {
                    assert_eq!(*idx, index);
                    assert_eq!(hamming(&catalogue[index], requested), distance);
                    assert!(catalogue.iter().all(|c| hamming(c, requested) >= distance));
                }
                other => panic!("unexpected resolution {other:?}"),
            }
        }
    }

    #[test]
    fn unknown_button_is_a_configuration_error() {
        let err = ActionRemapper::new(ActionSet::basic(), &ORDER, None).unwrap_err();
        assert!(matches!(err, Error::UnknownButton { button: MoveLeft, .. }));
    }

    #[test]
    fn duplicate_vectors_are_rejected() {
        let actions = ActionSet::new(vec![
            CompositeAction::new("fire", &[Attack]),
            CompositeAction::new("shoot", &[Attack]),
        ]);
        let err = ActionRemapper::new(actions, &ORDER, None).unwrap_err();
        assert!(matches!(err, Error::DuplicateCompositeAction { .. }));
    }

    #[test]
    fn empty_action_set_is_rejected() {
        let err = ActionRemapper::new(ActionSet::new(Vec::new()), &ORDER, None).unwrap_err();
        assert!(matches!(err, Error::EmptyActionSet));
    }

    #[test]
    fn out_of_range_decision_is_reported() {
        let remapper = ActionRemapper::new(ActionSet::standard(), &ORDER, None).unwrap();
        assert!(matches!(
            remapper.remap(5),
            Err(Error::DecisionOutOfRange { index: 5, len: 5 })
        ));
    }

    #[test]
    fn reversal_pairs_match_turn_directions() {
        let pairs = ActionSet::standard().reversal_pairs();
        assert_eq!(pairs, vec![(0, 1), (1, 0), (3, 4), (4, 3)]);
    }
}
