//! The value-function contract shared by every store.

use plumber_env::{Action, ActionSpace};

/// State/action value estimates.
///
/// Implementors only provide [`ValueFunction::value`]; the greedy helpers are derived
/// from it. Action spaces are never empty (see [`ActionSpace::new`]), so
/// [`ValueFunction::best_actions`] always returns at least one action.
pub trait ValueFunction<S>
where
    S: ?Sized,
{
    fn action_space(&self) -> ActionSpace;

    /// Estimated value of taking `action` in `state`.
    fn value(&self, state: &S, action: Action) -> f64;

    /// Maximum estimate over all legal actions.
    fn best_value(&self, state: &S) -> f64 {
        self.action_space()
            .iter()
            .map(|action| self.value(state, action))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Every action whose estimate equals [`ValueFunction::best_value`].
    ///
    /// Ties are expected (all-zero stores tie everywhere); choosing among them is the
    /// selector's job.
    #[allow(clippy::float_cmp)]
    fn best_actions(&self, state: &S) -> Vec<Action> {
        let values = self
            .action_space()
            .iter()
            .map(|action| (action, self.value(state, action)))
            .collect::<Vec<_>>();
        let best = values
            .iter()
            .map(|(_, value)| *value)
            .fold(f64::NEG_INFINITY, f64::max);
        let actions = values
            .iter()
            .filter(|(_, value)| *value == best)
            .map(|(action, _)| *action)
            .collect::<Vec<_>>();
        if actions.is_empty() {
            // every estimate is NaN
            return self.action_space().iter().collect();
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fixed estimates indexed by action, state ignored.
    struct Fixed(Vec<f64>);

    impl ValueFunction<()> for Fixed {
        fn action_space(&self) -> ActionSpace {
            ActionSpace::new(self.0.len()).unwrap()
        }

        fn value(&self, _state: &(), action: Action) -> f64 {
            self.0[action.index()]
        }
    }

    #[test]
    fn test_best_value_is_max() {
        let vf = Fixed(vec![-1.0, 3.5, 2.0]);
        assert_eq!(vf.best_value(&()), 3.5);
    }

    #[test]
    fn test_best_actions_keeps_ties() {
        let vf = Fixed(vec![1.0, 3.0, 3.0, 0.0]);
        assert_eq!(vf.best_actions(&()), vec![Action::new(1), Action::new(2)]);
    }

    #[test]
    fn test_all_zero_ties_everywhere() {
        let vf = Fixed(vec![0.0; 7]);
        assert_eq!(vf.best_actions(&()).len(), 7);
    }

    #[test]
    fn test_nan_falls_back_to_all_actions() {
        let vf = Fixed(vec![f64::NAN, f64::NAN]);
        assert_eq!(vf.best_actions(&()).len(), 2);
    }
}
