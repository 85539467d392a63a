//! Restricting an environment to a few of its actions.

use crate::{Action, ActionSpace, EnvError, Environment, Frame, Step};

/// Exposes only `actions` of the wrapped environment, renumbered from 0.
///
/// Action `i` of the wrapper is `actions[i]` of the inner environment.
#[derive(Debug, Clone)]
pub struct ActionSubset<E> {
    inner: E,
    actions: Vec<Action>,
    space: ActionSpace,
}

impl<E> ActionSubset<E>
where
    E: Environment,
{
    pub fn new(inner: E, actions: Vec<Action>) -> Result<Self, EnvError> {
        let inner_space = inner.action_space();
        for &action in &actions {
            inner_space.check(action)?;
        }
        let space = ActionSpace::new(actions.len())?;
        Ok(Self {
            inner,
            actions,
            space,
        })
    }

    #[must_use]
    pub fn inner(&self) -> &E {
        &self.inner
    }
}

impl<E> Environment for ActionSubset<E>
where
    E: Environment,
{
    fn action_space(&self) -> ActionSpace {
        self.space
    }

    fn reset(&mut self) -> Result<Frame, EnvError> {
        self.inner.reset()
    }

    fn step(&mut self, action: Action) -> Result<Step, EnvError> {
        let action = self.space.check(action)?;
        self.inner.step(self.actions[action.index()])
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
