//! Exact (tabular) value store.

use std::{collections::HashMap, hash::Hash};

use plumber_env::{Action, ActionSpace};

use crate::{
    update::{LearningParams, TdUpdate, Transition},
    value::ValueFunction,
};

/// Q-table mapping `(state, action)` to a value estimate.
///
/// Each state owns one slot per action, so lookups borrow the state and only the
/// first write to a state stores a copy of it. Unseen pairs read as `0.0`. Entries
/// are never evicted: the table grows with every new state visited, so the state
/// representation must keep the number of distinct states bounded.
#[derive(Debug, Clone)]
pub struct QTable<S> {
    action_space: ActionSpace,
    values: HashMap<S, Vec<Option<f64>>>,
    pairs: usize,
}

impl<S> QTable<S>
where
    S: Eq + Hash + Clone,
{
    #[must_use]
    pub fn new(action_space: ActionSpace) -> Self {
        Self {
            action_space,
            values: HashMap::new(),
            pairs: 0,
        }
    }

    /// Stored estimate, if the pair has been updated before.
    #[must_use]
    pub fn get(&self, state: &S, action: Action) -> Option<f64> {
        self.values
            .get(state)
            .and_then(|slots| slots.get(action.index()).copied().flatten())
    }

    /// # Panics
    ///
    /// Panics if `action` is outside the table's action space.
    pub fn set(&mut self, state: S, action: Action, value: f64) {
        if let Some(slots) = self.values.get_mut(&state) {
            self.pairs += usize::from(slots[action.index()].replace(value).is_none());
            return;
        }
        let slots = self.new_slots(action, value);
        self.values.insert(state, slots);
    }

    /// Like [`set`](Self::set), copying `state` only when it is new to the table.
    fn set_borrowed(&mut self, state: &S, action: Action, value: f64) {
        if let Some(slots) = self.values.get_mut(state) {
            self.pairs += usize::from(slots[action.index()].replace(value).is_none());
            return;
        }
        let slots = self.new_slots(action, value);
        self.values.insert(state.clone(), slots);
    }

    fn new_slots(&mut self, action: Action, value: f64) -> Vec<Option<f64>> {
        let mut slots = vec![None; self.action_space.len()];
        slots[action.index()] = Some(value);
        self.pairs += 1;
        slots
    }

    /// Number of stored pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs == 0
    }

    /// Number of distinct states stored.
    #[must_use]
    pub fn states(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&S, Action, f64)> + '_ {
        self.values.iter().flat_map(|(state, slots)| {
            slots
                .iter()
                .enumerate()
                .filter_map(move |(index, value)| value.map(|v| (state, Action::new(index), v)))
        })
    }
}

impl<S> ValueFunction<S> for QTable<S>
where
    S: Eq + Hash + Clone,
{
    fn action_space(&self) -> ActionSpace {
        self.action_space
    }

    fn value(&self, state: &S, action: Action) -> f64 {
        self.get(state, action).unwrap_or(0.0)
    }
}

impl<S> TdUpdate<S> for QTable<S>
where
    S: Eq + Hash + Clone,
{
    /// `Q(s,a) ← (1 - α)·Q(s,a) + α·(r + γ·max_a' Q(s',a'))`
    fn update(&mut self, transition: &Transition<S>, params: &LearningParams) {
        let sample = params.sample(self, transition);
        let alpha = params.learning_rate();
        let current = self.value(&transition.state, transition.action);
        self.set_borrowed(
            &transition.state,
            transition.action,
            (1.0 - alpha) * current + alpha * sample,
        );
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;

    /// State that counts how often it is copied.
    #[derive(Debug)]
    struct CountedState {
        id: u8,
        clones: Rc<Cell<usize>>,
    }

    impl Clone for CountedState {
        fn clone(&self) -> Self {
            self.clones.set(self.clones.get() + 1);
            Self {
                id: self.id,
                clones: Rc::clone(&self.clones),
            }
        }
    }

    impl PartialEq for CountedState {
        fn eq(&self, other: &Self) -> bool {
            self.id == other.id
        }
    }

    impl Eq for CountedState {}

    impl Hash for CountedState {
        fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
            self.id.hash(state);
        }
    }

    fn transition(state: u8, action: usize, reward: f64, next_state: u8) -> Transition<u8> {
        Transition {
            state,
            action: Action::new(action),
            reward,
            next_state,
            done: false,
        }
    }

    #[test]
    fn test_unseen_pairs_default_to_zero() {
        let table = QTable::<u8>::new(ActionSpace::new(3).unwrap());
        assert_eq!(table.value(&9, Action::new(2)), 0.0);
        assert!(table.is_empty());
    }

    #[test]
    fn test_state_is_copied_only_on_first_write() {
        let clones = Rc::new(Cell::new(0));
        let state = CountedState {
            id: 7,
            clones: Rc::clone(&clones),
        };
        let transition = Transition {
            state,
            action: Action::new(1),
            reward: 1.0,
            next_state: CountedState {
                id: 8,
                clones: Rc::clone(&clones),
            },
            done: false,
        };
        let mut table = QTable::new(ActionSpace::new(3).unwrap());
        let params = LearningParams::new(0.5, 0.9).unwrap();

        table.update(&transition, &params);
        table.update(&transition, &params);
        let _ = table.value(&transition.state, Action::new(0));
        let _ = table.best_value(&transition.next_state);
        let _ = table.best_actions(&transition.state);

        assert_eq!(clones.get(), 1);
        assert_eq!(table.len(), 1);
        assert_eq!(table.value(&transition.state, Action::new(2)), 0.0);
    }

    #[test]
    fn test_len_counts_pairs_not_states() {
        let mut table = QTable::new(ActionSpace::new(3).unwrap());
        table.set(0_u8, Action::new(0), 1.0);
        table.set(0, Action::new(2), 2.0);
        table.set(0, Action::new(2), 5.0);
        table.set(1, Action::new(1), -1.0);
        assert_eq!(table.len(), 3);
        assert_eq!(table.states(), 2);

        let mut entries = table.iter().map(|(s, a, v)| (*s, a.index(), v)).collect::<Vec<_>>();
        entries.sort_by_key(|&(s, a, _)| (s, a));
        assert_eq!(entries, [(0, 0, 1.0), (0, 2, 5.0), (1, 1, -1.0)]);
        assert_eq!(table.get(&1, Action::new(0)), None);
    }

    #[test]
    fn test_full_learning_rate_replaces_estimate() {
        let mut table = QTable::new(ActionSpace::new(2).unwrap());
        table.set(0, Action::new(0), 123.0);
        table.set(1, Action::new(0), 4.0);
        table.set(1, Action::new(1), 10.0);

        let params = LearningParams::new(1.0, 0.5).unwrap();
        table.update(&transition(0, 0, 2.0, 1), &params);
        assert_eq!(table.value(&0, Action::new(0)), 2.0 + 0.5 * 10.0);
    }

    #[test]
    fn test_partial_learning_rate_blends() {
        let mut table = QTable::new(ActionSpace::new(2).unwrap());
        table.set(0, Action::new(1), 10.0);

        let params = LearningParams::new(0.25, 0.9).unwrap();
        // next state unseen: best value 0.0
        table.update(&transition(0, 1, 2.0, 5), &params);
        assert!((table.value(&0, Action::new(1)) - (0.75 * 10.0 + 0.25 * 2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_best_value_matches_max_over_actions() {
        let mut table = QTable::new(ActionSpace::new(4).unwrap());
        table.set("s", Action::new(0), -2.0);
        table.set("s", Action::new(3), 1.5);
        let max = (0..4)
            .map(|a| table.value(&"s", Action::new(a)))
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(table.best_value(&"s"), max);
        assert_eq!(table.best_actions(&"s"), vec![Action::new(3)]);
    }

    #[test]
    fn test_frozen_params_keep_values() {
        let mut table = QTable::new(ActionSpace::new(2).unwrap());
        table.set(0, Action::new(0), 3.0);
        table.update(&transition(0, 0, 100.0, 0), &LearningParams::frozen());
        assert_eq!(table.value(&0, Action::new(0)), 3.0);
    }
}
