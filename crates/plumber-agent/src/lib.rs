//! Reinforcement-learning agents for the side-scroller environment.
//!
//! The crate is split along the pieces of the learning loop:
//!
//! 1. **Value-function store** ([`value`], [`table`], [`linear`]) - state/action value
//!    estimates, either exact ([`QTable`](table::QTable)) or a weighted sum over named
//!    features ([`LinearQ`](linear::LinearQ)).
//! 2. **Action selection** ([`selector`]) - epsilon-greedy with multiplicative decay and
//!    fair random tie-breaking.
//! 3. **Temporal-difference update** ([`update`]) - the Q-learning rule, blended for
//!    tables and gradient-style for linear features.
//! 4. **Agents** ([`agent`], [`replay`]) - plain Q-learning, and a deep-Q style agent
//!    with experience replay and an online/target estimator pair.
//! 5. **Episodes** ([`state`], [`episode`]) - how observations become states and how
//!    games are played against an [`Environment`](plumber_env::Environment).
//!
//! ```text
//! Environment ──step──▶ StateEncoder ──state──▶ Learner::act ──action──▶ Environment
//!                                  └──transition──▶ Learner::observe (TD update)
//! ```
//!
//! Agents are strictly single-threaded: one agent updates one store from one running
//! episode at a time. All randomness is drawn from an RNG passed in by the caller.
//!
//! # Example
//!
//! ```
//! use plumber_agent::{
//!     agent::QLearningAgent, selector::EpsilonGreedy, table::QTable, update::LearningParams,
//! };
//! use plumber_env::ActionSpace;
//!
//! let agent = QLearningAgent::new(
//!     QTable::<u32>::new(ActionSpace::SIMPLE),
//!     EpsilonGreedy::new(0.8, 0.99999).unwrap(),
//!     LearningParams::new(0.6, 0.9).unwrap(),
//! );
//! assert_eq!(agent.exploration_rate(), 0.8);
//! ```

pub mod agent;
pub mod episode;
pub mod linear;
pub mod replay;
pub mod selector;
pub mod state;
pub mod table;
pub mod update;
pub mod value;

/// Invalid agent configuration, reported before any environment is created.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("{name} must be within [0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f64 },
    #[display("{name} must be at least {min}, got {value}")]
    TooSmall {
        name: &'static str,
        min: usize,
        value: usize,
    },
    #[display("{name} must be a non-negative number, got {value}")]
    Negative { name: &'static str, value: f64 },
    #[display("feature schema mismatch: {_0}")]
    SchemaMismatch(#[error(not(source))] String),
}

pub(crate) fn check_unit(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::OutOfUnitRange { name, value })
    }
}

pub(crate) fn check_at_least(
    name: &'static str,
    min: usize,
    value: usize,
) -> Result<usize, ConfigError> {
    if value >= min {
        Ok(value)
    } else {
        Err(ConfigError::TooSmall { name, min, value })
    }
}
