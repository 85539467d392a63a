//! Genetic algorithms that evolve side-scroller play.
//!
//! Two genome kinds are evolved:
//!
//! - **Action sequences** ([`genome::ActionSequence`]) - one action per step, played
//!   blindly from the start of the stage
//! - **Coordinate policies** ([`genome::CoordinatePolicy`]) - the action to take at each
//!   `(x, y)` position of the player
//!
//! # How Training Works
//!
//! 1. **Initialize** - Create a population of random genomes
//! 2. **Evaluate** - Play every genome once, in parallel, each in its own environment
//! 3. **Log** - Hand one result row per individual to the [`driver::GenerationSink`]
//! 4. **Select** - Keep the best individuals as breeders; persist a new run-wide best
//! 5. **Breed** - Build the next population from segments (sequences) or per-coordinate
//!    picks (policies) of the breeders
//! 6. **Mutate** - Overwrite random genes; the mutation rate decays every generation
//! 7. **Repeat** for a fixed number of generations
//!
//! # Architecture
//!
//! ```text
//! GenerationDriver (phases, parallel evaluation, best tracking)
//!     ↓ generic over
//! GeneticVariant (SequenceVariant | PolicyVariant)
//!     ↓ uses
//! evaluator (run_sequence / run_policy)   operators (crossover, mutation)
//!     ↓ scored by
//! FitnessFunction (injectable)
//!     ↓ reported to
//! GenerationSink (CSV rows, best artifact)
//! ```
//!
//! # Example
//!
//! ```
//! use plumber_env::{Scenario, SideScrollerFactory};
//! use plumber_training::{
//!     driver::{GaConfig, GenerationDriver, NullSink},
//!     variant::{SequenceGaConfig, SequenceVariant},
//! };
//!
//! let mut config = SequenceGaConfig::for_scenario(Scenario::stage(1, 1).unwrap());
//! config.length = 50;
//! let variant = SequenceVariant::new(SideScrollerFactory, config).unwrap();
//!
//! let report = GenerationDriver::new(variant, NullSink, GaConfig::new(4, 2), 0)
//!     .unwrap()
//!     .run();
//! assert_eq!(report.generations.len(), 2);
//! ```
//!
//! # Design Decisions
//!
//! ## Explicit Tie-Breaking
//!
//! Breeders are the top individuals by fitness, ties going to the lower individual id.
//! The order is therefore fully determined by the evaluation results.
//!
//! ## Read-Only Evaluation
//!
//! Evaluating a policy may assign actions to coordinates it did not cover. The
//! assignments come back as a [`genome::PolicyExtension`] and the driver merges them
//! after evaluation, so genomes are never written to while threads share them.
//!
//! ## Failure Isolation
//!
//! One broken environment must not end a long run. An evaluation that fails is kept
//! as a record with fitness `-inf`; it sorts last and never becomes a best.
//!
//! # Current Limitations
//!
//! - **No elitism**: breeders themselves are not carried over into the next generation
//! - **No evaluation timeout**: a policy run is only bounded by its step budget
//! - **Single objective**: fitness is one scalar

pub mod driver;
pub mod evaluator;
pub mod fitness;
pub mod genome;
pub mod operators;
pub mod selection;
pub mod variant;

/// Invalid genetic-algorithm configuration, reported before any environment is created.
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
    #[display("cannot breed {breeders} individuals out of a population of {population}")]
    TooManyBreeders { breeders: usize, population: usize },
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
