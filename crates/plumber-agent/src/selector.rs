//! Epsilon-greedy action selection.

use plumber_env::Action;
use rand::{Rng, seq::IndexedRandom};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, check_unit, value::ValueFunction};

/// Explores with probability `rate`, otherwise acts greedily.
///
/// `rate` is multiplied by `decay` after every selection, whichever branch was taken,
/// and never drops below `floor`. With `rate == 0` the selector is a pure maximizer
/// that still breaks ties uniformly at random.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpsilonGreedy {
    rate: f64,
    decay: f64,
    floor: f64,
}

impl EpsilonGreedy {
    pub fn new(rate: f64, decay: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            rate: check_unit("exploration rate", rate)?,
            decay: check_unit("exploration decay", decay)?,
            floor: 0.0,
        })
    }

    /// Never decays below `floor`.
    pub fn with_floor(self, floor: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            floor: check_unit("exploration floor", floor)?,
            ..self
        })
    }

    /// Always picks a best action.
    #[must_use]
    pub const fn greedy() -> Self {
        Self {
            rate: 0.0,
            decay: 1.0,
            floor: 0.0,
        }
    }

    #[must_use]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    #[must_use]
    pub fn decay(&self) -> f64 {
        self.decay
    }

    #[must_use]
    pub fn floor(&self) -> f64 {
        self.floor
    }

    pub fn select<S, V, R>(&mut self, value_fn: &V, state: &S, rng: &mut R) -> Action
    where
        S: ?Sized,
        V: ValueFunction<S> + ?Sized,
        R: Rng + ?Sized,
    {
        let action = if rng.random::<f64>() < self.rate {
            value_fn.action_space().sample(rng)
        } else {
            let best = value_fn.best_actions(state);
            *best
                .choose(rng)
                .expect("best actions should never be empty")
        };
        self.advance();
        action
    }

    /// Applies one decay step without selecting.
    pub fn advance(&mut self) {
        self.rate = (self.rate * self.decay).max(self.floor);
    }
}

#[cfg(test)]
mod tests {
    use plumber_env::ActionSpace;
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    use super::*;

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
    fn test_rejects_rates_outside_unit_interval() {
        assert!(EpsilonGreedy::new(1.2, 0.9).is_err());
        assert!(EpsilonGreedy::new(0.5, -1.0).is_err());
        assert!(EpsilonGreedy::new(0.5, 0.9).unwrap().with_floor(2.0).is_err());
    }

    #[test]
    fn test_zero_rate_is_deterministic_maximizer() {
        let vf = Fixed(vec![0.0, 1.0, 5.0, 2.0]);
        let mut selector = EpsilonGreedy::new(0.0, 0.5).unwrap();
        let mut rng = Pcg64Mcg::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(selector.select(&vf, &(), &mut rng), Action::new(2));
        }
    }

    #[test]
    fn test_full_rate_is_uniform() {
        let vf = Fixed(vec![0.0, 100.0, 0.0, 0.0]);
        let mut selector = EpsilonGreedy::new(1.0, 1.0).unwrap();
        let mut rng = Pcg64Mcg::seed_from_u64(7);
        let mut counts = [0_u32; 4];
        for _ in 0..40_000 {
            counts[selector.select(&vf, &(), &mut rng).index()] += 1;
        }
        for count in counts {
            assert!((9_000..11_000).contains(&count), "{counts:?}");
        }
    }

    #[test]
    fn test_ties_broken_fairly() {
        let vf = Fixed(vec![3.0, 0.0, 3.0]);
        let mut selector = EpsilonGreedy::greedy();
        let mut rng = Pcg64Mcg::seed_from_u64(3);
        let mut counts = [0_u32; 3];
        for _ in 0..10_000 {
            counts[selector.select(&vf, &(), &mut rng).index()] += 1;
        }
        assert_eq!(counts[1], 0);
        assert!((4_500..5_500).contains(&counts[0]), "{counts:?}");
    }

    #[test]
    fn test_rate_decays_after_each_selection() {
        let vf = Fixed(vec![0.0; 2]);
        let mut selector = EpsilonGreedy::new(0.8, 0.5).unwrap();
        let mut rng = Pcg64Mcg::seed_from_u64(0);
        selector.select(&vf, &(), &mut rng);
        assert_eq!(selector.rate(), 0.4);
        selector.select(&vf, &(), &mut rng);
        assert_eq!(selector.rate(), 0.2);
    }

    #[test]
    fn test_rate_clamped_at_floor() {
        let mut selector = EpsilonGreedy::new(0.5, 0.1).unwrap().with_floor(0.1).unwrap();
        for _ in 0..5 {
            selector.advance();
        }
        assert_eq!(selector.rate(), 0.1);
    }
}
