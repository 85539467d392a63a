//! Playing games with a learning agent.

use plumber_env::{Action, ActionSpace, EnvError, Environment, GameInfo};
use rand::Rng;

use crate::{
    agent::QLearningAgent,
    replay::{QNetwork, ReplayAgent},
    state::StateEncoder,
    update::{TdUpdate, Transition},
};

/// Something that picks actions and learns from the transitions they cause.
pub trait Learner<S> {
    fn act<R>(&mut self, state: &S, rng: &mut R) -> Action
    where
        R: Rng + ?Sized;

    fn observe<R>(&mut self, transition: Transition<S>, rng: &mut R)
    where
        R: Rng + ?Sized;
}

impl<S, V> Learner<S> for QLearningAgent<V>
where
    V: TdUpdate<S>,
{
    fn act<R>(&mut self, state: &S, rng: &mut R) -> Action
    where
        R: Rng + ?Sized,
    {
        QLearningAgent::act(self, state, rng)
    }

    fn observe<R>(&mut self, transition: Transition<S>, _rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        QLearningAgent::observe(self, &transition);
    }
}

impl<N> Learner<Vec<f64>> for ReplayAgent<N>
where
    N: QNetwork,
{
    fn act<R>(&mut self, state: &Vec<f64>, rng: &mut R) -> Action
    where
        R: Rng + ?Sized,
    {
        ReplayAgent::act(self, state, rng)
    }

    fn observe<R>(&mut self, transition: Transition<Vec<f64>>, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        self.cache(transition);
        self.learn(rng);
    }
}

/// Uniformly random play; learns nothing.
#[derive(Debug, Clone, Copy)]
pub struct RandomAgent {
    action_space: ActionSpace,
}

impl RandomAgent {
    #[must_use]
    pub fn new(action_space: ActionSpace) -> Self {
        Self { action_space }
    }
}

impl<S> Learner<S> for RandomAgent {
    fn act<R>(&mut self, _state: &S, rng: &mut R) -> Action
    where
        R: Rng + ?Sized,
    {
        self.action_space.sample(rng)
    }

    fn observe<R>(&mut self, _transition: Transition<S>, _rng: &mut R)
    where
        R: Rng + ?Sized,
    {
    }
}

/// When a game ends besides the environment reporting `done`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GameLimits {
    /// Stop after this many steps.
    pub max_steps: Option<usize>,
    /// Stop as soon as the flag is reached.
    pub stop_on_flag: bool,
}

/// Summary of one finished game.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameRecord {
    /// Info reported by the last step.
    pub info: GameInfo,
    pub steps: usize,
    pub total_reward: f64,
}

/// Plays one game from a fresh reset, feeding every transition to the learner.
///
/// `initial` stands in for the info of the reset observation, which environments do
/// not report. Environment errors abort the game and are returned to the caller.
pub fn run_game<E, C, L, R>(
    env: &mut E,
    encoder: &C,
    learner: &mut L,
    initial: GameInfo,
    limits: GameLimits,
    rng: &mut R,
) -> Result<GameRecord, EnvError>
where
    E: Environment + ?Sized,
    C: StateEncoder,
    C::State: Clone,
    L: Learner<C::State>,
    R: Rng + ?Sized,
{
    let observation = env.reset()?;
    let mut state = encoder.encode(&observation, &initial);
    let mut record = GameRecord {
        info: initial,
        steps: 0,
        total_reward: 0.0,
    };

    loop {
        let action = learner.act(&state, rng);
        let step = env.step(action)?;
        let next_state = encoder.encode(&step.observation, &step.info);

        record.info = step.info;
        record.steps += 1;
        record.total_reward += step.reward;

        let finished = step.done
            || (limits.stop_on_flag && step.info.flag_get)
            || limits.max_steps.is_some_and(|max| record.steps >= max);
        let transition = Transition {
            state,
            action,
            reward: step.reward,
            next_state: next_state.clone(),
            done: step.done,
        };
        learner.observe(transition, rng);
        if finished {
            log::debug!(
                "game finished after {} steps at x={} (score {})",
                record.steps,
                record.info.x_pos,
                record.info.score,
            );
            return Ok(record);
        }
        state = next_state;
    }
}
