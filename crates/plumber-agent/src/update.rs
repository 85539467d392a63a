//! Temporal-difference update rule.

use plumber_env::Action;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, check_unit, value::ValueFunction};

/// One observed transition `(s, a, r, s')`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<S> {
    pub state: S,
    pub action: Action,
    pub reward: f64,
    pub next_state: S,
    /// Whether `next_state` ended the episode.
    ///
    /// The Q-learning stores ignore this flag and always bootstrap from
    /// `next_state`; the replay agent zeroes the bootstrap term on terminal
    /// transitions.
    pub done: bool,
}

/// Step size and discount of the update rule, both within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningParams {
    learning_rate: f64,
    discount: f64,
}

impl LearningParams {
    pub fn new(learning_rate: f64, discount: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            learning_rate: check_unit("learning rate", learning_rate)?,
            discount: check_unit("discount", discount)?,
        })
    }

    /// Parameters that leave every estimate untouched, for greedy replays of a
    /// learned store.
    #[must_use]
    pub const fn frozen() -> Self {
        Self {
            learning_rate: 0.0,
            discount: 1.0,
        }
    }

    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    #[must_use]
    pub fn discount(&self) -> f64 {
        self.discount
    }

    /// `reward + discount * best_value(next_state)`.
    pub fn sample<S, V>(&self, value_fn: &V, transition: &Transition<S>) -> f64
    where
        V: ValueFunction<S> + ?Sized,
    {
        transition.reward + self.discount * value_fn.best_value(&transition.next_state)
    }
}

/// A value function that learns from transitions.
pub trait TdUpdate<S>: ValueFunction<S> {
    fn update(&mut self, transition: &Transition<S>, params: &LearningParams);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_validated() {
        assert!(LearningParams::new(0.6, 0.9).is_ok());
        assert!(LearningParams::new(1.0, 0.0).is_ok());
        let err = LearningParams::new(1.5, 0.9).unwrap_err();
        assert_eq!(err.to_string(), "learning rate must be within [0, 1], got 1.5");
        assert!(LearningParams::new(0.5, -0.1).is_err());
        assert!(LearningParams::new(f64::NAN, 0.5).is_err());
    }
}
