//! Q-learning agent: a value store, a selector and update parameters.

use plumber_env::Action;
use rand::Rng;

use crate::{
    selector::EpsilonGreedy,
    update::{LearningParams, TdUpdate, Transition},
    value::ValueFunction,
};

/// Plain one-step Q-learning over any [`TdUpdate`] store.
///
/// The same agent drives both tabular and linear stores; only the store type differs.
#[derive(Debug, Clone)]
pub struct QLearningAgent<V> {
    value_fn: V,
    selector: EpsilonGreedy,
    params: LearningParams,
}

impl<V> QLearningAgent<V> {
    #[must_use]
    pub fn new(value_fn: V, selector: EpsilonGreedy, params: LearningParams) -> Self {
        Self {
            value_fn,
            selector,
            params,
        }
    }

    /// Replays a learned store without exploring or learning.
    #[must_use]
    pub fn greedy(value_fn: V) -> Self {
        Self::new(value_fn, EpsilonGreedy::greedy(), LearningParams::frozen())
    }

    pub fn act<S, R>(&mut self, state: &S, rng: &mut R) -> Action
    where
        V: ValueFunction<S>,
        R: Rng + ?Sized,
    {
        self.selector.select(&self.value_fn, state, rng)
    }

    pub fn observe<S>(&mut self, transition: &Transition<S>)
    where
        V: TdUpdate<S>,
    {
        self.value_fn.update(transition, &self.params);
    }

    /// Swaps the selector, restarting the exploration schedule.
    pub fn set_selector(&mut self, selector: EpsilonGreedy) {
        self.selector = selector;
    }

    #[must_use]
    pub fn exploration_rate(&self) -> f64 {
        self.selector.rate()
    }

    #[must_use]
    pub fn params(&self) -> &LearningParams {
        &self.params
    }

    #[must_use]
    pub fn value_fn(&self) -> &V {
        &self.value_fn
    }

    #[must_use]
    pub fn into_value_fn(self) -> V {
        self.value_fn
    }
}
