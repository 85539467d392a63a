use std::ops::{Deref, DerefMut};

use serde::Serialize;

use crate::{Action, ActionSpace, EnvError, GameInfo, Scenario};

/// Screen snapshot returned by an environment.
///
/// The content is opaque to learning code; it is only compared and hashed, which is
/// what tabular agents need to use raw observations as states.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Frame {
    width: usize,
    height: usize,
    cells: Vec<u8>,
}

impl Frame {
    /// Creates a frame from row-major cells.
    ///
    /// # Panics
    ///
    /// Panics if `cells.len() != width * height`.
    #[must_use]
    pub fn new(width: usize, height: usize, cells: Vec<u8>) -> Self {
        assert_eq!(cells.len(), width * height, "frame size mismatch");
        Self {
            width,
            height,
            cells,
        }
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    #[must_use]
    pub fn cell(&self, x: usize, y: usize) -> u8 {
        self.cells[y * self.width + x]
    }
}

/// Result of one environment transition.
#[derive(Debug, Clone)]
pub struct Step {
    pub observation: Frame,
    pub reward: f64,
    pub done: bool,
    pub info: GameInfo,
}

/// A game the agents can act in.
///
/// `reset` must be called before the first `step` and after every finished episode.
pub trait Environment: Send {
    fn action_space(&self) -> ActionSpace;

    fn reset(&mut self) -> Result<Frame, EnvError>;

    fn step(&mut self, action: Action) -> Result<Step, EnvError>;

    /// Releases backend resources. Called once by [`ScopedEnvironment`] on drop.
    fn close(&mut self) {}
}

impl<E> Environment for Box<E>
where
    E: Environment + ?Sized,
{
    fn action_space(&self) -> ActionSpace {
        (**self).action_space()
    }

    fn reset(&mut self) -> Result<Frame, EnvError> {
        (**self).reset()
    }

    fn step(&mut self, action: Action) -> Result<Step, EnvError> {
        (**self).step(action)
    }

    fn close(&mut self) {
        (**self).close();
    }
}

/// Creates independent environment instances.
///
/// Shared by parallel evaluators, so it must be `Sync`; the instances it creates are
/// owned by exactly one evaluation each.
pub trait EnvironmentFactory: Sync {
    type Env: Environment;

    fn create(&self, scenario: Scenario) -> Result<Self::Env, EnvError>;

    /// Creates an instance that is closed when the returned guard goes out of scope.
    fn open(&self, scenario: Scenario) -> Result<ScopedEnvironment<Self::Env>, EnvError> {
        self.create(scenario).map(ScopedEnvironment::new)
    }
}

/// Owns an environment and closes it on drop, whichever way the owner exits.
#[derive(Debug)]
pub struct ScopedEnvironment<E>
where
    E: Environment,
{
    env: E,
}

impl<E> ScopedEnvironment<E>
where
    E: Environment,
{
    pub fn new(env: E) -> Self {
        Self { env }
    }
}

impl<E> Deref for ScopedEnvironment<E>
where
    E: Environment,
{
    type Target = E;

    fn deref(&self) -> &Self::Target {
        &self.env
    }
}

impl<E> DerefMut for ScopedEnvironment<E>
where
    E: Environment,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.env
    }
}

impl<E> Drop for ScopedEnvironment<E>
where
    E: Environment,
{
    fn drop(&mut self) {
        log::trace!("closing environment");
        self.env.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    struct CountingEnv {
        closed: Arc<AtomicUsize>,
    }

    impl Environment for CountingEnv {
        fn action_space(&self) -> ActionSpace {
            ActionSpace::SIMPLE
        }

        fn reset(&mut self) -> Result<Frame, EnvError> {
            Err(EnvError::Backend("emulator crashed".to_owned()))
        }

        fn step(&mut self, _action: Action) -> Result<Step, EnvError> {
            Err(EnvError::NotReset)
        }

        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct CountingFactory {
        closed: Arc<AtomicUsize>,
    }

    impl EnvironmentFactory for CountingFactory {
        type Env = CountingEnv;

        fn create(&self, _scenario: Scenario) -> Result<Self::Env, EnvError> {
            Ok(CountingEnv {
                closed: Arc::clone(&self.closed),
            })
        }
    }

    fn failing_run(factory: &CountingFactory) -> Result<(), EnvError> {
        let mut env = factory.open(Scenario::AllStages)?;
        env.reset()?;
        Ok(())
    }

    #[test]
    fn test_scoped_environment_closes_on_error_path() {
        let closed = Arc::new(AtomicUsize::new(0));
        let factory = CountingFactory {
            closed: Arc::clone(&closed),
        };
        assert!(failing_run(&factory).is_err());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_frame_indexing() {
        let frame = Frame::new(3, 2, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(frame.cell(2, 0), 2);
        assert_eq!(frame.cell(0, 1), 3);
    }
}
