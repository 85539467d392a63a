//! Fitness functions turning the outcome of a run into a scalar score.
//!
//! The two genetic-algorithm variants historically scored runs differently, so the
//! formula is a strategy chosen by the caller rather than baked into the evaluator:
//!
//! | Strategy | Formula | Used for |
//! |---|---|---|
//! | [`MultiStageFitness`] | `level_factor * (score / 100) + x_pos * 10` | sequences, all stages |
//! | [`SingleStageFitness`] | `x_pos * 10 + score` | sequences, one stage |
//! | [`FurthestReachFitness`] | `max_x * 5 + score` | coordinate policies |
//!
//! `level_factor` is `10 * world + stage`, or `100` once the flag was reached, so that
//! finishing a stage outweighs depth alone.

use std::fmt;

use plumber_env::{GameInfo, Scenario};

/// What a fitness function gets to see about a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Info reported by the last step.
    pub info: GameInfo,
    /// Rightmost x position seen during the run.
    pub max_x: u32,
}

pub trait FitnessFunction: fmt::Debug + Send + Sync {
    fn fitness(&self, run: &RunSummary) -> f64;
}

/// Multi-stage runs, favouring depth into the game.
#[derive(Debug, Default, Clone, Copy)]
pub struct MultiStageFitness;

impl FitnessFunction for MultiStageFitness {
    fn fitness(&self, run: &RunSummary) -> f64 {
        let info = &run.info;
        let level_factor = if info.flag_get {
            100.0
        } else {
            10.0 * f64::from(info.world) + f64::from(info.stage)
        };
        level_factor * (f64::from(info.score) / 100.0) + f64::from(info.x_pos) * 10.0
    }
}

/// Single-stage runs, favouring progress to the right.
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleStageFitness;

impl FitnessFunction for SingleStageFitness {
    fn fitness(&self, run: &RunSummary) -> f64 {
        f64::from(run.info.x_pos) * 10.0 + f64::from(run.info.score)
    }
}

/// Rewards the furthest point reached rather than where the run ended.
#[derive(Debug, Default, Clone, Copy)]
pub struct FurthestReachFitness;

impl FitnessFunction for FurthestReachFitness {
    fn fitness(&self, run: &RunSummary) -> f64 {
        f64::from(run.max_x) * 5.0 + f64::from(run.info.score)
    }
}

/// Multi-stage fitness for [`Scenario::AllStages`], single-stage otherwise.
#[must_use]
pub fn for_scenario(scenario: Scenario) -> Box<dyn FitnessFunction> {
    match scenario {
        Scenario::AllStages => Box::new(MultiStageFitness),
        Scenario::Stage { .. } => Box::new(SingleStageFitness),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(score: u32, x_pos: u32, flag_get: bool) -> RunSummary {
        let mut info = GameInfo::initial(Scenario::AllStages);
        info.score = score;
        info.x_pos = x_pos;
        info.flag_get = flag_get;
        RunSummary { info, max_x: x_pos }
    }

    #[test]
    fn test_multi_stage_fitness() {
        assert_eq!(MultiStageFitness.fitness(&run(200, 50, false)), 522.0);
    }

    #[test]
    fn test_flag_overrides_level_factor() {
        assert_eq!(MultiStageFitness.fitness(&run(200, 50, true)), 700.0);
    }

    #[test]
    fn test_single_stage_fitness() {
        assert_eq!(SingleStageFitness.fitness(&run(200, 50, false)), 700.0);
    }

    #[test]
    fn test_furthest_reach_uses_max_x() {
        let mut summary = run(100, 30, false);
        summary.max_x = 80;
        assert_eq!(FurthestReachFitness.fitness(&summary), 500.0);
    }

    #[test]
    fn test_strategy_follows_scenario() {
        let summary = run(200, 50, false);
        assert_eq!(for_scenario(Scenario::AllStages).fitness(&summary), 522.0);
        let single = for_scenario(Scenario::stage(1, 1).unwrap());
        assert_eq!(single.fitness(&summary), 700.0);
    }
}
