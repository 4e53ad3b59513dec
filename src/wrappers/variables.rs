//! Snapshots of scalar game variables and their per-step deltas

use std::collections::BTreeMap;
use std::str::FromStr;

use strum::IntoEnumIterator;
use tracing::trace;

use crate::error::{Error, Result};
use crate::sim::{GameVariable, VariableSource};

/// Value substituted when a variable cannot be read during a step
pub const TRANSIENT_READ_FALLBACK: f32 = 0.0;

/// Current value of every tracked variable
///
/// Every tracked variable always has a value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariableSnapshot {
    values: BTreeMap<GameVariable, f32>,
}

impl VariableSnapshot {
    /// Value of `variable`, 0 if it is not tracked
    pub fn get(&self, variable: GameVariable) -> f32 {
        self.values.get(&variable).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (GameVariable, f32)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }
}

/// `new - previous` for every tracked variable
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariableDelta {
    values: BTreeMap<GameVariable, f32>,
}

impl VariableDelta {
    /// Delta of `variable`, 0 if it is not tracked
    pub fn get(&self, variable: GameVariable) -> f32 {
        self.values.get(&variable).copied().unwrap_or(0.0)
    }

    pub fn kills(&self) -> f32 {
        self.get(GameVariable::KillCount)
    }

    pub fn hits(&self) -> f32 {
        self.get(GameVariable::HitCount)
    }

    pub fn health(&self) -> f32 {
        self.get(GameVariable::Health)
    }

    pub fn ammo(&self) -> f32 {
        self.get(GameVariable::Ammo)
    }

    pub fn position_x(&self) -> f32 {
        self.get(GameVariable::PositionX)
    }

    /// Build a delta directly; used when shaping from externally computed deltas
    pub fn from_pairs(pairs: impl IntoIterator<Item = (GameVariable, f32)>) -> Self {
        Self {
            values: pairs.into_iter().collect(),
        }
    }
}

/// Tracks a fixed set of game variables across the steps of one episode
#[derive(Debug, Clone)]
pub struct VariableTracker {
    tracked: Vec<GameVariable>,
    baseline: BTreeMap<GameVariable, f32>,
    snapshot: VariableSnapshot,
}

impl VariableTracker {
    pub fn new(tracked: Vec<GameVariable>) -> Self {
        let mut tracked = tracked;
        tracked.sort();
        tracked.dedup();

        let baseline: BTreeMap<_, _> = tracked.iter().map(|v| (*v, v.baseline())).collect();
        let snapshot = VariableSnapshot {
            values: baseline.clone(),
        };

        Self {
            tracked,
            baseline,
            snapshot,
        }
    }

    /// Build from engine variable names such as `"KILLCOUNT"`
    ///
    /// An unrecognized name is a configuration error.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let tracked = parse_variables(names)?;
        Ok(Self::new(tracked))
    }

    /// Override the value assumed when `variable` is unreadable at reset
    pub fn with_baseline(mut self, variable: GameVariable, value: f32) -> Self {
        if let Some(slot) = self.baseline.get_mut(&variable) {
            *slot = value;
        }
        self
    }

    pub fn tracked(&self) -> &[GameVariable] {
        &self.tracked
    }

    pub fn tracks(&self, variable: GameVariable) -> bool {
        self.tracked.binary_search(&variable).is_ok()
    }

    pub fn snapshot(&self) -> &VariableSnapshot {
        &self.snapshot
    }

    /// Start a new episode from the engine's initial values
    ///
    /// The previous snapshot is replaced; unreadable variables take their baseline.
    pub fn reset<V: VariableSource + ?Sized>(&mut self, source: &V) -> &VariableSnapshot {
        let values = self
            .tracked
            .iter()
            .map(|&var| {
                let value = source
                    .read_variable(var)
                    .unwrap_or_else(|_| self.baseline.get(&var).copied().unwrap_or(0.0));
                (var, value)
            })
            .collect();
        self.snapshot = VariableSnapshot { values };
        &self.snapshot
    }

    /// Read the current values and return the new snapshot with its delta
    ///
    /// A variable that cannot be read this step counts as [`TRANSIENT_READ_FALLBACK`].
    pub fn update<V: VariableSource + ?Sized>(
        &mut self,
        source: &V,
    ) -> (VariableSnapshot, VariableDelta) {
        let mut delta = BTreeMap::new();

        for &var in &self.tracked {
            let value = match source.read_variable(var) {
                Ok(value) => value,
                Err(err) => {
                    trace!(%err, "using fallback for unreadable variable");
                    TRANSIENT_READ_FALLBACK
                }
            };
            let previous = self.snapshot.values.insert(var, value).unwrap_or(0.0);
            delta.insert(var, value - previous);
        }

        (self.snapshot.clone(), VariableDelta { values: delta })
    }
}

/// Parse engine variable names, failing on the first unknown one
pub fn parse_variables<S: AsRef<str>>(names: &[S]) -> Result<Vec<GameVariable>> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref().trim();
            GameVariable::from_str(name).map_err(|_| Error::UnknownVariable {
                name: name.to_string(),
                known: GameVariable::iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(GameVariable, f32)]) -> HashMap<GameVariable, f32> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn reset_uses_baseline_for_missing_values() {
        let mut tracker = VariableTracker::from_names(&["HEALTH", "AMMO2", "KILLCOUNT"]).unwrap();
        let snapshot = tracker.reset(&vars(&[(GameVariable::Ammo, 26.0)]));

        assert_eq!(snapshot.get(GameVariable::Health), 100.0);
        assert_eq!(snapshot.get(GameVariable::Ammo), 26.0);
        assert_eq!(snapshot.get(GameVariable::KillCount), 0.0);
    }

    #[test]
    fn update_reports_delta_and_replaces_snapshot() {
        let mut tracker =
            VariableTracker::new(vec![GameVariable::Health, GameVariable::KillCount]);
        tracker.reset(&vars(&[(GameVariable::Health, 100.0), (GameVariable::KillCount, 0.0)]));

        let (snapshot, delta) =
            tracker.update(&vars(&[(GameVariable::Health, 80.0), (GameVariable::KillCount, 2.0)]));

        assert_eq!(delta.health(), -20.0);
        assert_eq!(delta.kills(), 2.0);
        assert_eq!(snapshot.get(GameVariable::Health), 80.0);
        assert_eq!(tracker.snapshot(), &snapshot);

        let (_, delta) =
            tracker.update(&vars(&[(GameVariable::Health, 75.0), (GameVariable::KillCount, 2.0)]));
        assert_eq!(delta.health(), -5.0);
        assert_eq!(delta.kills(), 0.0);
    }

    #[test]
    fn unreadable_variable_falls_back_to_zero_without_failing() {
        let mut tracker = VariableTracker::new(vec![GameVariable::Ammo, GameVariable::HitCount]);
        tracker.reset(&vars(&[(GameVariable::Ammo, 10.0), (GameVariable::HitCount, 3.0)]));

        let (snapshot, delta) = tracker.update(&vars(&[(GameVariable::HitCount, 4.0)]));

        assert_eq!(snapshot.get(GameVariable::Ammo), TRANSIENT_READ_FALLBACK);
        assert_eq!(delta.ammo(), -10.0);
        assert_eq!(delta.hits(), 1.0);
    }

    #[test]
    fn untracked_variables_read_as_zero_delta() {
        let mut tracker = VariableTracker::new(vec![GameVariable::Health]);
        tracker.reset(&vars(&[(GameVariable::Health, 100.0)]));
        let (_, delta) =
            tracker.update(&vars(&[(GameVariable::Health, 100.0), (GameVariable::KillCount, 5.0)]));
        assert_eq!(delta.kills(), 0.0);
        assert!(!tracker.tracks(GameVariable::KillCount));
    }

    #[test]
    fn custom_baseline_applies_at_reset() {
        let mut tracker = VariableTracker::new(vec![GameVariable::Health])
            .with_baseline(GameVariable::Health, 150.0);
        let snapshot = tracker.reset(&vars(&[]));
        assert_eq!(snapshot.get(GameVariable::Health), 150.0);
    }

    #[test]
    fn unknown_variable_name_is_a_configuration_error() {
        let err = VariableTracker::from_names(&["HEALTH", "MANA"]).unwrap_err();
        match err {
            Error::UnknownVariable { name, known } => {
                assert_eq!(name, "MANA");
                assert!(known.contains("KILLCOUNT"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
