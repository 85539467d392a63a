//! Environment boundary for side-scroller learning agents.
//!
//! Learning code never talks to an emulator directly. Everything it needs is behind
//! the [`Environment`] trait:
//!
//! - [`Action`] / [`ActionSpace`] - fixed, ordered set of controller inputs
//! - [`GameInfo`] - fixed-schema record of the game variables after each step
//! - [`Frame`] - opaque screen snapshot, usable as a lookup key
//! - [`Step`] - result of a single transition
//! - [`EnvironmentFactory`] / [`ScopedEnvironment`] - per-evaluation instances that are
//!   closed on every exit path
//! - [`ActionSubset`] - an environment restricted to a few of its actions
//!
//! [`SideScroller`] is a small deterministic platformer implementing the trait. It
//! exists so that agents and genetic algorithms can be run and tested without an
//! emulator; it only mimics the observable interface (coordinates, score, lives,
//! clock, flag) of the real game.
//!
//! # Example
//!
//! ```
//! use plumber_env::{Environment, Scenario, SideScroller, SIMPLE_MOVEMENT};
//!
//! let mut env = SideScroller::new(Scenario::stage(1, 1).unwrap());
//! env.reset().unwrap();
//!
//! // Hold "right" for a while
//! let right = env.action_space().action(1).unwrap();
//! let step = env.step(right).unwrap();
//! assert!(step.info.x_pos > 40);
//! assert_eq!(SIMPLE_MOVEMENT.len(), env.action_space().len());
//! ```

pub use self::{action::*, environment::*, info::*, side_scroller::*, subset::*};

mod action;
mod environment;
mod info;
mod side_scroller;
mod subset;

/// Errors raised by environments and the values crossing their boundary.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum EnvError {
    #[display("action {action} is outside the action space of size {size}")]
    InvalidAction { action: Action, size: usize },
    #[display("action space must contain at least one action")]
    EmptyActionSpace,
    #[display("environment must be reset before stepping")]
    NotReset,
    #[display("episode already finished, reset the environment first")]
    EpisodeFinished,
    #[display("invalid stage {world}-{stage} (world must be 1-8, stage 1-4)")]
    InvalidStage { world: u8, stage: u8 },
    #[display("malformed info record: {_0}")]
    MalformedInfo(serde_json::Error),
    #[display("environment backend failed: {_0}")]
    Backend(#[error(not(source))] String),
}
