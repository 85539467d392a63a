//! Running one genome in its own environment instance.
//!
//! Every evaluation opens a fresh environment through an [`EnvironmentFactory`] and
//! holds it in a [`ScopedEnvironment`](plumber_env::ScopedEnvironment), so the instance
//! is closed however the run ends, including when the environment itself fails.
//! Nothing is shared between evaluations except the read-only genome and the factory,
//! which makes evaluations safe to run in parallel.
//!
//! Errors are returned as-is; turning them into a worst-case record is up to the
//! caller (see [`Individual::failed`]).

use plumber_env::{Environment as _, EnvError, EnvironmentFactory, GameInfo, Scenario, START_LIFE};
use rand::Rng;
use serde::Serialize;

use crate::{
    fitness::RunSummary,
    genome::{ActionSequence, Coordinate, CoordinatePolicy, PolicyExtension},
};

/// Result of running a genome to its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub summary: RunSummary,
    /// Index of the last step played.
    pub steps_reached: usize,
}

/// Which position the last column of a result row reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReachMetric {
    /// Position where the run ended.
    XPosition,
    /// Rightmost position seen during the run.
    MaxX,
}

impl ReachMetric {
    #[must_use]
    pub fn header(self) -> &'static str {
        match self {
            ReachMetric::XPosition => "X Position",
            ReachMetric::MaxX => "Max_X_Position",
        }
    }

    #[must_use]
    pub fn of(self, summary: &RunSummary) -> u32 {
        match self {
            ReachMetric::XPosition => summary.info.x_pos,
            ReachMetric::MaxX => summary.max_x,
        }
    }
}

/// One line of the generation results log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LogRow {
    /// 1-based generation number.
    pub generation: usize,
    /// 1-based position in the generation.
    pub individual: usize,
    pub fitness: f64,
    pub score: u32,
    pub world: u8,
    pub stage: u8,
    pub reach: u32,
}

/// An evaluated genome.
#[derive(Debug, Clone)]
pub struct Individual<G> {
    /// 0-based position in the generation; also the selection tie-breaker.
    pub id: usize,
    pub genome: G,
    pub fitness: f64,
    pub steps_reached: usize,
    pub row: LogRow,
    /// Whether the evaluation was abandoned because the environment failed.
    pub failed: bool,
}

impl<G> Individual<G> {
    #[must_use]
    pub fn evaluated(
        id: usize,
        generation: usize,
        genome: G,
        evaluation: &Evaluation,
        fitness: f64,
        reach: ReachMetric,
    ) -> Self {
        let info = &evaluation.summary.info;
        Self {
            id,
            genome,
            fitness,
            steps_reached: evaluation.steps_reached,
            row: LogRow {
                generation: generation + 1,
                individual: id + 1,
                fitness,
                score: info.score,
                world: info.world,
                stage: info.stage,
                reach: reach.of(&evaluation.summary),
            },
            failed: false,
        }
    }

    /// Record of an abandoned evaluation: worst possible fitness, nothing reached.
    #[must_use]
    pub fn failed(id: usize, generation: usize, genome: G, scenario: Scenario) -> Self {
        let (world, stage) = scenario.start();
        Self {
            id,
            genome,
            fitness: f64::NEG_INFINITY,
            steps_reached: 0,
            row: LogRow {
                generation: generation + 1,
                individual: id + 1,
                fitness: f64::NEG_INFINITY,
                score: 0,
                world,
                stage,
                reach: 0,
            },
            failed: true,
        }
    }

    /// Fitness with flipped sign; selection takes the lowest values first.
    #[must_use]
    pub fn negated_fitness(&self) -> f64 {
        -self.fitness
    }
}

/// Whether the player has lost a life or run out of time.
#[must_use]
pub fn lost_life(info: &GameInfo) -> bool {
    info.life < START_LIFE || info.time == 0
}

/// Plays `sequence` one action per step.
///
/// The run ends when the environment reports `done`, when a life is lost and
/// `stop_on_death` is set, or when the sequence is exhausted.
pub fn run_sequence<F>(
    factory: &F,
    scenario: Scenario,
    sequence: &ActionSequence,
    stop_on_death: bool,
) -> Result<Evaluation, EnvError>
where
    F: EnvironmentFactory + ?Sized,
{
    let mut env = factory.open(scenario)?;
    env.reset()?;

    let mut info = GameInfo::initial(scenario);
    let mut max_x = info.x_pos;
    for (i, &action) in sequence.actions().iter().enumerate() {
        let step = env.step(action)?;
        info = step.info;
        max_x = max_x.max(info.x_pos);
        if step.done || (stop_on_death && lost_life(&info)) {
            return Ok(Evaluation {
                summary: RunSummary { info, max_x },
                steps_reached: i,
            });
        }
    }
    Ok(Evaluation {
        summary: RunSummary { info, max_x },
        steps_reached: sequence.len().saturating_sub(1),
    })
}

/// Plays `policy`, looking up the action for the player's position before each step.
///
/// Positions the policy has no action for get a uniformly random one, which is kept
/// for the rest of the run and returned in the [`PolicyExtension`]. The run ends when
/// the environment reports `done` or after `max_steps` steps.
pub fn run_policy<F, R>(
    factory: &F,
    scenario: Scenario,
    policy: &CoordinatePolicy,
    max_steps: usize,
    rng: &mut R,
) -> Result<(Evaluation, PolicyExtension), EnvError>
where
    F: EnvironmentFactory + ?Sized,
    R: Rng + ?Sized,
{
    let mut env = factory.open(scenario)?;
    env.reset()?;
    let action_space = env.action_space();

    let mut extension = PolicyExtension::default();
    let mut info = GameInfo::initial(scenario);
    let mut max_x = 0;
    let mut steps = 0;
    while steps < max_steps {
        let here = Coordinate {
            x: info.x_pos,
            y: info.y_pos,
        };
        max_x = max_x.max(here.x);
        let action = match policy.get(here).or_else(|| extension.get(here)) {
            Some(action) => action,
            None => {
                let action = action_space.sample(rng);
                extension.insert(here, action);
                action
            }
        };
        let step = env.step(action)?;
        steps += 1;
        info = step.info;
        if step.done {
            break;
        }
    }
    Ok((
        Evaluation {
            summary: RunSummary { info, max_x },
            steps_reached: steps.saturating_sub(1),
        },
        extension,
    ))
}
