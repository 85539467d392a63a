//! The two genetic-algorithm variants run by the
//! [`GenerationDriver`](crate::driver::GenerationDriver).
//!
//! A [`GeneticVariant`] bundles everything that depends on the genome kind: how random
//! genomes are created, how one is evaluated, how breeders produce children and how
//! children are mutated. The driver owns the generation loop and never looks inside a
//! genome.

use std::fmt;

use plumber_env::{ActionSpace, EnvError, EnvironmentFactory, Scenario};
use rand::Rng;

use crate::{
    ConfigError,
    evaluator::{Evaluation, Individual, ReachMetric, run_policy, run_sequence},
    fitness::{self, FitnessFunction, FurthestReachFitness, RunSummary},
    genome::{ActionSequence, CoordinatePolicy, PolicyBounds, PolicyExtension},
    operators,
};

/// Genome-specific half of a genetic algorithm.
///
/// Shared by all evaluation threads, hence `Sync`.
pub trait GeneticVariant: Sync {
    type Genome: Clone + Send + Sync;
    /// What an evaluation adds to the genome it evaluated.
    type Extension: Send;

    fn scenario(&self) -> Scenario;

    fn reach_metric(&self) -> ReachMetric;

    fn initial_population<R>(&self, size: usize, rng: &mut R) -> Vec<Self::Genome>
    where
        R: Rng + ?Sized;

    /// Plays `genome` once in a fresh environment.
    fn evaluate<R>(
        &self,
        genome: &Self::Genome,
        rng: &mut R,
    ) -> Result<(Evaluation, Self::Extension), EnvError>
    where
        R: Rng + ?Sized;

    fn fitness(&self, summary: &RunSummary) -> f64;

    /// Merges what the evaluation of `genome` produced back into it.
    fn absorb(&self, genome: &mut Self::Genome, extension: Self::Extension);

    /// Creates `children` genomes from `breeders` (best first).
    fn breed<R>(
        &self,
        breeders: &[&Individual<Self::Genome>],
        children: usize,
        rng: &mut R,
    ) -> Vec<Self::Genome>
    where
        R: Rng + ?Sized;

    fn mutate<R>(&self, genomes: &mut [Self::Genome], max_reached: usize, rate: f64, rng: &mut R)
    where
        R: Rng + ?Sized;

    /// Text persisted when `genome` becomes the best of the run.
    fn artifact(&self, genome: &Self::Genome) -> String;
}

/// Parameters of the action-sequence variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceGaConfig {
    pub scenario: Scenario,
    /// Actions per sequence.
    pub length: usize,
    /// Cut points per child.
    pub crossovers: usize,
    /// End a run as soon as a life is lost.
    pub stop_on_death: bool,
    pub action_space: ActionSpace,
}

impl SequenceGaConfig {
    pub const SINGLE_STAGE_LENGTH: usize = 5000;
    pub const ALL_STAGES_LENGTH: usize = 20000;

    /// Defaults for `scenario`; playing every stage needs longer sequences.
    #[must_use]
    pub fn for_scenario(scenario: Scenario) -> Self {
        let length = if scenario.is_single_stage() {
            Self::SINGLE_STAGE_LENGTH
        } else {
            Self::ALL_STAGES_LENGTH
        };
        Self {
            scenario,
            length,
            crossovers: 1,
            stop_on_death: true,
            action_space: ActionSpace::SIMPLE,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        crate::check_at_least("sequence length", 1, self.length)?;
        Ok(())
    }
}

/// Evolves fixed-length action sequences.
pub struct SequenceVariant<F> {
    factory: F,
    config: SequenceGaConfig,
    fitness: Box<dyn FitnessFunction>,
}

impl<F> fmt::Debug for SequenceVariant<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceVariant")
            .field("config", &self.config)
            .field("fitness", &self.fitness)
            .finish_non_exhaustive()
    }
}

impl<F> SequenceVariant<F>
where
    F: EnvironmentFactory,
{
    /// Uses the fitness function matching the configured scenario.
    pub fn new(factory: F, config: SequenceGaConfig) -> Result<Self, ConfigError> {
        let fitness = fitness::for_scenario(config.scenario);
        Self::with_fitness(factory, config, fitness)
    }

    pub fn with_fitness(
        factory: F,
        config: SequenceGaConfig,
        fitness: Box<dyn FitnessFunction>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            factory,
            config,
            fitness,
        })
    }

    #[must_use]
    pub fn config(&self) -> &SequenceGaConfig {
        &self.config
    }
}

impl<F> GeneticVariant for SequenceVariant<F>
where
    F: EnvironmentFactory,
{
    type Genome = ActionSequence;
    type Extension = ();

    fn scenario(&self) -> Scenario {
        self.config.scenario
    }

    fn reach_metric(&self) -> ReachMetric {
        ReachMetric::XPosition
    }

    fn initial_population<R>(&self, size: usize, rng: &mut R) -> Vec<ActionSequence>
    where
        R: Rng + ?Sized,
    {
        (0..size)
            .map(|_| ActionSequence::random(self.config.length, self.config.action_space, rng))
            .collect()
    }

    fn evaluate<R>(
        &self,
        genome: &ActionSequence,
        _rng: &mut R,
    ) -> Result<(Evaluation, ()), EnvError>
    where
        R: Rng + ?Sized,
    {
        let evaluation = run_sequence(
            &self.factory,
            self.config.scenario,
            genome,
            self.config.stop_on_death,
        )?;
        Ok((evaluation, ()))
    }

    fn fitness(&self, summary: &RunSummary) -> f64 {
        self.fitness.fitness(summary)
    }

    fn absorb(&self, _genome: &mut ActionSequence, (): ()) {}

    fn breed<R>(
        &self,
        breeders: &[&Individual<ActionSequence>],
        children: usize,
        rng: &mut R,
    ) -> Vec<ActionSequence>
    where
        R: Rng + ?Sized,
    {
        let max_reached = max_reached(breeders);
        let parents = breeders.iter().map(|b| &b.genome).collect::<Vec<_>>();
        operators::crossover_sequences(&parents, max_reached, self.config.crossovers, children, rng)
    }

    fn mutate<R>(&self, genomes: &mut [ActionSequence], max_reached: usize, rate: f64, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        operators::mutate_sequences(genomes, max_reached, rate, self.config.action_space, rng);
    }

    fn artifact(&self, genome: &ActionSequence) -> String {
        genome.to_artifact()
    }
}

/// Parameters of the coordinate-policy variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyGaConfig {
    pub scenario: Scenario,
    pub bounds: PolicyBounds,
    /// Step budget of one run.
    pub max_steps: usize,
    pub action_space: ActionSpace,
}

impl PolicyGaConfig {
    pub const DEFAULT_MAX_STEPS: usize = 20000;

    #[must_use]
    pub fn for_scenario(scenario: Scenario) -> Self {
        Self {
            scenario,
            bounds: PolicyBounds::default(),
            max_steps: Self::DEFAULT_MAX_STEPS,
            action_space: ActionSpace::SIMPLE,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        crate::check_at_least("step budget", 1, self.max_steps)?;
        Ok(())
    }
}

/// Evolves position-indexed policies.
pub struct PolicyVariant<F> {
    factory: F,
    config: PolicyGaConfig,
    fitness: Box<dyn FitnessFunction>,
}

impl<F> fmt::Debug for PolicyVariant<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyVariant")
            .field("config", &self.config)
            .field("fitness", &self.fitness)
            .finish_non_exhaustive()
    }
}

impl<F> PolicyVariant<F>
where
    F: EnvironmentFactory,
{
    /// Scores runs by [`FurthestReachFitness`].
    pub fn new(factory: F, config: PolicyGaConfig) -> Result<Self, ConfigError> {
        Self::with_fitness(factory, config, Box::new(FurthestReachFitness))
    }

    pub fn with_fitness(
        factory: F,
        config: PolicyGaConfig,
        fitness: Box<dyn FitnessFunction>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            factory,
            config,
            fitness,
        })
    }

    #[must_use]
    pub fn config(&self) -> &PolicyGaConfig {
        &self.config
    }
}

impl<F> GeneticVariant for PolicyVariant<F>
where
    F: EnvironmentFactory,
{
    type Genome = CoordinatePolicy;
    type Extension = PolicyExtension;

    fn scenario(&self) -> Scenario {
        self.config.scenario
    }

    fn reach_metric(&self) -> ReachMetric {
        ReachMetric::MaxX
    }

    fn initial_population<R>(&self, size: usize, rng: &mut R) -> Vec<CoordinatePolicy>
    where
        R: Rng + ?Sized,
    {
        (0..size)
            .map(|_| CoordinatePolicy::random(self.config.bounds, self.config.action_space, rng))
            .collect()
    }

    fn evaluate<R>(
        &self,
        genome: &CoordinatePolicy,
        rng: &mut R,
    ) -> Result<(Evaluation, PolicyExtension), EnvError>
    where
        R: Rng + ?Sized,
    {
        run_policy(
            &self.factory,
            self.config.scenario,
            genome,
            self.config.max_steps,
            rng,
        )
    }

    fn fitness(&self, summary: &RunSummary) -> f64 {
        self.fitness.fitness(summary)
    }

    fn absorb(&self, genome: &mut CoordinatePolicy, extension: PolicyExtension) {
        genome.extend(extension);
    }

    fn breed<R>(
        &self,
        breeders: &[&Individual<CoordinatePolicy>],
        children: usize,
        rng: &mut R,
    ) -> Vec<CoordinatePolicy>
    where
        R: Rng + ?Sized,
    {
        let parents = breeders.iter().map(|b| &b.genome).collect::<Vec<_>>();
        operators::crossover_policies(&parents, self.config.bounds, children, rng)
    }

    fn mutate<R>(&self, genomes: &mut [CoordinatePolicy], _max_reached: usize, rate: f64, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        operators::mutate_policies(genomes, self.config.bounds, rate, self.config.action_space, rng);
    }

    fn artifact(&self, genome: &CoordinatePolicy) -> String {
        genome.to_artifact()
    }
}

/// Furthest step played by any of `breeders`.
#[must_use]
pub fn max_reached<G>(breeders: &[&Individual<G>]) -> usize {
    breeders.iter().map(|b| b.steps_reached).max().unwrap_or(0)
}
