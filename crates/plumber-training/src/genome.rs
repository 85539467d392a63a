//! Genomes evolved by the two genetic-algorithm variants.
//!
//! - [`ActionSequence`]: a fixed-length list of actions played one per step. The gene
//!   position is the list index.
//! - [`CoordinatePolicy`]: a map from the player's `(x, y)` position to the action to
//!   take there. The gene position is the coordinate.
//!
//! A policy is usually incomplete: evaluation can reach coordinates it has no action
//! for. Those get a random action, collected in a [`PolicyExtension`] that the caller
//! merges back with [`CoordinatePolicy::extend`]; the genome itself stays read-only
//! while it is being evaluated.

use std::collections::HashMap;

use plumber_env::{Action, ActionSpace};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Fixed-length action list, one action per environment step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionSequence(Vec<Action>);

impl ActionSequence {
    /// Creates a sequence of `len` uniformly random actions.
    pub fn random<R>(len: usize, action_space: ActionSpace, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        Self((0..len).map(|_| action_space.sample(rng)).collect())
    }

    #[must_use]
    pub fn from_actions(actions: Vec<Action>) -> Self {
        Self(actions)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.0
    }

    pub(crate) fn set(&mut self, index: usize, action: Action) {
        self.0[index] = action;
    }

    /// Actions joined with `", "`.
    #[must_use]
    pub fn to_artifact(&self) -> String {
        self.0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Player position in game pixels.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Coordinate {
    pub x: u32,
    pub y: u32,
}

/// Inclusive coordinate range `[0, max_x] × [0, max_y]` covered by crossover and
/// mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyBounds {
    pub max_x: u32,
    pub max_y: u32,
}

impl Default for PolicyBounds {
    fn default() -> Self {
        Self {
            max_x: 5000,
            max_y: 255,
        }
    }
}

impl PolicyBounds {
    /// Every coordinate in bounds, column by column.
    pub fn coordinates(self) -> impl Iterator<Item = Coordinate> {
        (0..=self.max_x).flat_map(move |x| (0..=self.max_y).map(move |y| Coordinate { x, y }))
    }

    /// Uniformly random coordinate in bounds.
    pub fn sample<R>(self, rng: &mut R) -> Coordinate
    where
        R: Rng + ?Sized,
    {
        Coordinate {
            x: rng.random_range(0..=self.max_x),
            y: rng.random_range(0..=self.max_y),
        }
    }
}

/// Actions assigned during one evaluation to coordinates the policy did not cover.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyExtension {
    assigned: HashMap<Coordinate, Action>,
}

impl PolicyExtension {
    #[must_use]
    pub fn get(&self, coordinate: Coordinate) -> Option<Action> {
        self.assigned.get(&coordinate).copied()
    }

    pub fn insert(&mut self, coordinate: Coordinate, action: Action) {
        self.assigned.insert(coordinate, action);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}

/// Position-indexed policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatePolicy {
    actions: HashMap<Coordinate, Action>,
}

impl CoordinatePolicy {
    /// Creates a policy with a uniformly random action at every coordinate in bounds.
    pub fn random<R>(bounds: PolicyBounds, action_space: ActionSpace, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        Self {
            actions: bounds
                .coordinates()
                .map(|c| (c, action_space.sample(rng)))
                .collect(),
        }
    }

    #[must_use]
    pub fn get(&self, coordinate: Coordinate) -> Option<Action> {
        self.actions.get(&coordinate).copied()
    }

    pub fn insert(&mut self, coordinate: Coordinate, action: Action) {
        self.actions.insert(coordinate, action);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Coordinate, Action)> + '_ {
        self.actions.iter().map(|(c, a)| (*c, *a))
    }

    /// Merges the actions assigned during an evaluation.
    pub fn extend(&mut self, extension: PolicyExtension) {
        self.actions.extend(extension.assigned);
    }

    /// JSON object `{"x,y": action}`, keys sorted.
    #[must_use]
    pub fn to_artifact(&self) -> String {
        let object = self
            .actions
            .iter()
            .map(|(c, a)| (format!("{},{}", c.x, c.y), serde_json::Value::from(a.index())))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(object).to_string()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    use super::*;

    #[test]
    fn test_random_sequence_stays_in_action_space() {
        let space = ActionSpace::new(3).unwrap();
        let mut rng = Pcg64Mcg::seed_from_u64(0);
        let seq = ActionSequence::random(500, space, &mut rng);
        assert_eq!(seq.len(), 500);
        assert!(seq.actions().iter().all(|a| space.contains(*a)));
    }

    #[test]
    fn test_sequence_artifact() {
        let seq = ActionSequence::from_actions(vec![Action::new(1), Action::new(0), Action::new(6)]);
        assert_eq!(seq.to_artifact(), "1, 0, 6");
    }

    #[test]
    fn test_random_policy_covers_bounds() {
        let bounds = PolicyBounds { max_x: 3, max_y: 2 };
        let mut rng = Pcg64Mcg::seed_from_u64(0);
        let policy = CoordinatePolicy::random(bounds, ActionSpace::SIMPLE, &mut rng);
        assert_eq!(policy.len(), 4 * 3);
        assert!(policy.get(Coordinate { x: 3, y: 2 }).is_some());
        assert!(policy.get(Coordinate { x: 4, y: 0 }).is_none());
    }

    #[test]
    fn test_extension_merges_into_policy() {
        let mut policy = CoordinatePolicy::default();
        policy.insert(Coordinate { x: 0, y: 0 }, Action::new(1));
        let mut extension = PolicyExtension::default();
        extension.insert(Coordinate { x: 40, y: 79 }, Action::new(2));
        policy.extend(extension);
        assert_eq!(policy.len(), 2);
        assert_eq!(policy.get(Coordinate { x: 40, y: 79 }), Some(Action::new(2)));
    }

    #[test]
    fn test_policy_artifact_is_json_object() {
        let mut policy = CoordinatePolicy::default();
        policy.insert(Coordinate { x: 10, y: 2 }, Action::new(3));
        policy.insert(Coordinate { x: 1, y: 5 }, Action::new(0));
        assert_eq!(policy.to_artifact(), r#"{"1,5":0,"10,2":3}"#);
    }
}
