//! Deep-Q style agent with experience replay and a target estimator.
//!
//! # How It Works
//!
//! Every transition the agent sees is cached in a bounded [`ReplayMemory`]. Once the
//! burn-in period is over, every `learn_every` steps a random batch is drawn from memory
//! and the online estimator is moved towards the Double-DQN target:
//!
//! ```text
//! a*     = argmax_a online(s', a)
//! target = r + γ · target_net(s', a*)       (bootstrap dropped when `done`)
//! ```
//!
//! Every `sync_every` steps the target estimator is replaced by a copy of the online
//! one. Exploration uses [`EpsilonGreedy`] with a positive floor.
//!
//! # Estimators
//!
//! The estimator is anything implementing [`QNetwork`]. [`LinearNetwork`] (one linear
//! model per action over the input vector) is the only implementation shipped; richer
//! architectures plug in through the same trait.

use std::collections::VecDeque;

use plumber_env::{Action, ActionSpace};
use rand::{Rng, seq::index};
use rand_distr::{Distribution as _, Normal};
use serde::{Deserialize, Serialize};

use crate::{
    ConfigError, check_at_least, check_unit, selector::EpsilonGreedy, update::Transition,
    value::ValueFunction,
};

/// Bounded FIFO of past transitions; the oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct ReplayMemory<T> {
    capacity: usize,
    buf: VecDeque<T>,
}

impl<T> ReplayMemory<T> {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            buf: VecDeque::with_capacity(capacity.min(4096)),
        }
    }

    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.buf.len() >= self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(item);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Draws up to `amount` distinct entries uniformly at random.
    pub fn sample<R>(&self, amount: usize, rng: &mut R) -> Vec<&T>
    where
        R: Rng + ?Sized,
    {
        index::sample(rng, self.buf.len(), amount.min(self.buf.len()))
            .into_iter()
            .map(|i| &self.buf[i])
            .collect()
    }
}

/// A trainable estimator of all action values for an input vector.
pub trait QNetwork: Clone {
    fn action_space(&self) -> ActionSpace;

    /// One estimate per action, in action order.
    fn predict(&self, input: &[f64]) -> Vec<f64>;

    /// One gradient step of the squared error between `predict(input)[action]` and
    /// `target`. Returns the squared error before the step.
    fn train(&mut self, input: &[f64], action: Action, target: f64, learning_rate: f64) -> f64;
}

/// Per-action linear model with bias: `Q(x, a) = w_a · x + b_a`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearNetwork {
    inputs: usize,
    action_space: ActionSpace,
    /// `action_space.len()` rows of `inputs + 1` weights, bias last.
    weights: Vec<f64>,
}

impl LinearNetwork {
    /// Initial weights drawn from `N(0, sigma²)`.
    pub fn random<R>(
        inputs: usize,
        action_space: ActionSpace,
        sigma: f64,
        rng: &mut R,
    ) -> Result<Self, ConfigError>
    where
        R: Rng + ?Sized,
    {
        check_at_least("network inputs", 1, inputs)?;
        let normal = Normal::new(0.0, sigma).map_err(|_| ConfigError::Negative {
            name: "initial weight sigma",
            value: sigma,
        })?;
        let weights = (0..action_space.len() * (inputs + 1))
            .map(|_| normal.sample(rng))
            .collect();
        Ok(Self {
            inputs,
            action_space,
            weights,
        })
    }

    #[must_use]
    pub fn inputs(&self) -> usize {
        self.inputs
    }

    fn row(&self, action: Action) -> &[f64] {
        let width = self.inputs + 1;
        &self.weights[action.index() * width..(action.index() + 1) * width]
    }

    fn estimate(&self, input: &[f64], action: Action) -> f64 {
        let row = self.row(action);
        row[..self.inputs]
            .iter()
            .zip(input)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + row[self.inputs]
    }
}

impl QNetwork for LinearNetwork {
    fn action_space(&self) -> ActionSpace {
        self.action_space
    }

    fn predict(&self, input: &[f64]) -> Vec<f64> {
        debug_assert_eq!(input.len(), self.inputs);
        self.action_space
            .iter()
            .map(|action| self.estimate(input, action))
            .collect()
    }

    fn train(&mut self, input: &[f64], action: Action, target: f64, learning_rate: f64) -> f64 {
        let error = self.estimate(input, action) - target;
        let width = self.inputs + 1;
        let row = &mut self.weights[action.index() * width..(action.index() + 1) * width];
        for (w, x) in row.iter_mut().zip(input) {
            *w -= learning_rate * error * x;
        }
        row[width - 1] -= learning_rate * error;
        error * error
    }
}

/// Hyperparameters of [`ReplayAgent`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub memory_capacity: usize,
    pub batch_size: usize,
    /// Steps before learning starts.
    pub burn_in: usize,
    /// Steps between learning updates.
    pub learn_every: usize,
    /// Steps between target syncs.
    pub sync_every: usize,
    pub learning_rate: f64,
    pub discount: f64,
    pub exploration_rate: f64,
    pub exploration_decay: f64,
    pub exploration_floor: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            memory_capacity: 100_000,
            batch_size: 32,
            burn_in: 10_000,
            learn_every: 3,
            sync_every: 10_000,
            learning_rate: 0.00025,
            discount: 0.9,
            exploration_rate: 1.0,
            exploration_decay: 0.999_999_75,
            exploration_floor: 0.1,
        }
    }
}

impl ReplayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_at_least("batch size", 1, self.batch_size)?;
        check_at_least("memory capacity", self.batch_size, self.memory_capacity)?;
        check_at_least("learn interval", 1, self.learn_every)?;
        check_at_least("sync interval", 1, self.sync_every)?;
        check_unit("learning rate", self.learning_rate)?;
        check_unit("discount", self.discount)?;
        self.selector().map(|_| ())
    }

    fn selector(&self) -> Result<EpsilonGreedy, ConfigError> {
        EpsilonGreedy::new(self.exploration_rate, self.exploration_decay)?
            .with_floor(self.exploration_floor)
    }
}

/// Mean estimate and loss of one learning update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearnStats {
    pub mean_q: f64,
    pub mean_loss: f64,
}

/// Action values already computed for one state.
struct Estimates {
    action_space: ActionSpace,
    values: Vec<f64>,
}

impl ValueFunction<()> for Estimates {
    fn action_space(&self) -> ActionSpace {
        self.action_space
    }

    fn value(&self, _state: &(), action: Action) -> f64 {
        self.values[action.index()]
    }
}

/// Experience-replay agent over an online/target pair of [`QNetwork`]s.
#[derive(Debug, Clone)]
pub struct ReplayAgent<N> {
    online: N,
    target: N,
    memory: ReplayMemory<Transition<Vec<f64>>>,
    selector: EpsilonGreedy,
    config: ReplayConfig,
    step: usize,
}

impl<N> ReplayAgent<N>
where
    N: QNetwork,
{
    pub fn new(network: N, config: ReplayConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            target: network.clone(),
            online: network,
            memory: ReplayMemory::with_capacity(config.memory_capacity),
            selector: config.selector()?,
            config,
            step: 0,
        })
    }

    pub fn act<R>(&mut self, state: &[f64], rng: &mut R) -> Action
    where
        R: Rng + ?Sized,
    {
        let estimates = Estimates {
            action_space: self.online.action_space(),
            values: self.online.predict(state),
        };
        self.step += 1;
        self.selector.select(&estimates, &(), rng)
    }

    pub fn cache(&mut self, transition: Transition<Vec<f64>>) {
        self.memory.push(transition);
    }

    /// Runs the learning schedule for the current step.
    ///
    /// Returns `None` when no update was due (burn-in, off-interval step, or too few
    /// cached transitions).
    pub fn learn<R>(&mut self, rng: &mut R) -> Option<LearnStats>
    where
        R: Rng + ?Sized,
    {
        if self.step % self.config.sync_every == 0 {
            self.target = self.online.clone();
            log::trace!("synced target estimator at step {}", self.step);
        }
        if self.step < self.config.burn_in
            || self.step % self.config.learn_every != 0
            || self.memory.len() < self.config.batch_size
        {
            return None;
        }

        let batch = self
            .memory
            .sample(self.config.batch_size, rng)
            .into_iter()
            .map(|t| (t.state.clone(), t.action, self.td_target(t)))
            .collect::<Vec<_>>();

        let mut q_sum = 0.0;
        let mut loss_sum = 0.0;
        for (state, action, target) in &batch {
            q_sum += self.online.predict(state)[action.index()];
            loss_sum += self
                .online
                .train(state, *action, *target, self.config.learning_rate);
        }
        #[expect(clippy::cast_precision_loss)]
        let n = batch.len() as f64;
        Some(LearnStats {
            mean_q: q_sum / n,
            mean_loss: loss_sum / n,
        })
    }

    fn td_target(&self, transition: &Transition<Vec<f64>>) -> f64 {
        if transition.done {
            return transition.reward;
        }
        let online = self.online.predict(&transition.next_state);
        let best = online
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| {
                if v > bv { (i, v) } else { (bi, bv) }
            })
            .0;
        transition.reward
            + self.config.discount * self.target.predict(&transition.next_state)[best]
    }

    #[must_use]
    pub fn exploration_rate(&self) -> f64 {
        self.selector.rate()
    }

    #[must_use]
    pub fn steps(&self) -> usize {
        self.step
    }

    #[must_use]
    pub fn online(&self) -> &N {
        &self.online
    }

    #[must_use]
    pub fn target(&self) -> &N {
        &self.target
    }

    #[must_use]
    pub fn memory(&self) -> &ReplayMemory<Transition<Vec<f64>>> {
        &self.memory
    }
}
