use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::EnvError;

/// A controller button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Right,
    Left,
    A,
    B,
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Button::Right => "right",
            Button::Left => "left",
            Button::A => "A",
            Button::B => "B",
        };
        f.write_str(s)
    }
}

/// The reduced button-combination set used by every agent.
///
/// Index `i` of this array is the meaning of [`Action`] `i`.
pub const SIMPLE_MOVEMENT: [&[Button]; 7] = [
    &[],
    &[Button::Right],
    &[Button::Right, Button::A],
    &[Button::Right, Button::B],
    &[Button::Right, Button::A, Button::B],
    &[Button::A],
    &[Button::Left],
];

/// Index into a fixed, ordered action set.
///
/// An `Action` by itself does not know the size of the set it belongs to; use
/// [`ActionSpace::check`] when an index comes from outside (files, CLI, adapters).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(transparent)]
pub struct Action(usize);

impl Action {
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A non-empty, fixed-size set of actions `0..len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpace {
    len: usize,
}

impl ActionSpace {
    /// The action space matching [`SIMPLE_MOVEMENT`].
    pub const SIMPLE: Self = Self {
        len: SIMPLE_MOVEMENT.len(),
    };

    pub fn new(len: usize) -> Result<Self, EnvError> {
        if len == 0 {
            return Err(EnvError::EmptyActionSpace);
        }
        Ok(Self { len })
    }

    #[must_use]
    #[expect(clippy::len_without_is_empty)]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn contains(&self, action: Action) -> bool {
        action.0 < self.len
    }

    /// Returns the action with the given index if it is part of this space.
    #[must_use]
    pub const fn action(&self, index: usize) -> Option<Action> {
        if index < self.len {
            Some(Action(index))
        } else {
            None
        }
    }

    /// Validates an action coming from outside the core.
    pub fn check(&self, action: Action) -> Result<Action, EnvError> {
        if self.contains(action) {
            Ok(action)
        } else {
            Err(EnvError::InvalidAction {
                action,
                size: self.len,
            })
        }
    }

    /// Iterates all actions in index order.
    pub fn iter(&self) -> impl Iterator<Item = Action> + use<> {
        (0..self.len).map(Action)
    }

    /// Draws a uniformly random action.
    pub fn sample<R>(&self, rng: &mut R) -> Action
    where
        R: Rng + ?Sized,
    {
        Action(rng.random_range(0..self.len))
    }
}
