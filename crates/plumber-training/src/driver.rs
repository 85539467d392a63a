//! The generation loop, as an explicit state machine.
//!
//! ```text
//! Initializing ─▶ Evaluating ─▶ Logging ─▶ Selecting ─┬─▶ Breeding ─▶ Mutating ─┐
//!                     ▲                               │                          │
//!                     │                               └─▶ Terminal (last gen.)   │
//!                     └──────────────────────────────────────────────────────────┘
//! ```
//!
//! [`GenerationDriver::step`] advances one phase, [`GenerationDriver::run`] steps until
//! [`Phase::Terminal`].
//!
//! # Evaluation
//!
//! Genomes are evaluated in parallel on scoped threads, `workers` batches at a time,
//! with one environment per evaluation. Every genome gets its own RNG seeded from the
//! driver's RNG before any thread starts, so results depend on the seed only and not
//! on scheduling. Records are put back in id order once all threads joined.
//!
//! An evaluation that hits an environment error is recorded as failed with fitness
//! `-inf` and the generation carries on.
//!
//! # Persistence
//!
//! The driver does no I/O. Result rows and best genomes go to a [`GenerationSink`];
//! a sink that fails to persist something reports it and the run continues.

use std::{mem, num::NonZeroUsize, thread};

use plumber_stats::descriptive::DescriptiveStats;
use rand::{Rng as _, SeedableRng as _};
use rand_pcg::Pcg64Mcg;

use crate::{
    ConfigError, check_at_least,
    evaluator::Individual,
    operators::MutationSchedule,
    selection::{BestTracker, rank},
    variant::{GeneticVariant, max_reached},
};

/// Where the driver is in the generation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Evaluating,
    Logging,
    Selecting,
    Breeding,
    Mutating,
    Terminal,
}

/// Parameters shared by both variants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaConfig {
    /// Genomes per generation.
    pub population: usize,
    pub generations: usize,
    /// Best individuals allowed to breed.
    pub breeders: usize,
    /// Maximum number of evaluations running at once.
    pub workers: usize,
    pub mutation: MutationSchedule,
}

impl GaConfig {
    /// Defaults: 10% of the population breeds (at least 2), one worker per core.
    #[must_use]
    pub fn new(population: usize, generations: usize) -> Self {
        Self {
            population,
            generations,
            breeders: Self::default_breeders(population),
            workers: thread::available_parallelism().map_or(1, NonZeroUsize::get),
            mutation: MutationSchedule::default(),
        }
    }

    #[must_use]
    pub fn default_breeders(population: usize) -> usize {
        (population / 10).max(2)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_at_least("population size", 2, self.population)?;
        check_at_least("number of generations", 1, self.generations)?;
        check_at_least("number of breeders", 1, self.breeders)?;
        check_at_least("number of workers", 1, self.workers)?;
        if self.breeders > self.population {
            return Err(ConfigError::TooManyBreeders {
                breeders: self.breeders,
                population: self.population,
            });
        }
        Ok(())
    }
}

/// Receives the output of a run.
pub trait GenerationSink<G> {
    /// Called once per generation with every individual, in id order.
    ///
    /// Returns whether the rows were persisted.
    fn log_generation(&mut self, individuals: &[Individual<G>]) -> bool;

    /// Called when `best` beats every earlier individual of the run.
    ///
    /// `generation` is 1-based. Returns whether the artifact was persisted.
    fn persist_best(&mut self, generation: usize, best: &Individual<G>, artifact: &str) -> bool;
}

impl<G, S> GenerationSink<G> for &mut S
where
    S: GenerationSink<G> + ?Sized,
{
    fn log_generation(&mut self, individuals: &[Individual<G>]) -> bool {
        (**self).log_generation(individuals)
    }

    fn persist_best(&mut self, generation: usize, best: &Individual<G>, artifact: &str) -> bool {
        (**self).persist_best(generation, best, artifact)
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl<G> GenerationSink<G> for NullSink {
    fn log_generation(&mut self, _individuals: &[Individual<G>]) -> bool {
        true
    }

    fn persist_best(&mut self, _generation: usize, _best: &Individual<G>, _artifact: &str) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSummary {
    /// 1-based.
    pub generation: usize,
    /// Statistics over the individuals that did not fail, if any.
    pub fitness: Option<DescriptiveStats>,
    pub failed: usize,
    pub mutation_rate: f64,
    /// Whether the sink persisted the rows.
    pub logged: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub best_fitness: Option<f64>,
    /// 1-based generation of the best individual.
    pub best_generation: Option<usize>,
    pub generations: Vec<GenerationSummary>,
}

/// Runs a genetic algorithm for a fixed number of generations.
pub struct GenerationDriver<V, S>
where
    V: GeneticVariant,
{
    variant: V,
    sink: S,
    config: GaConfig,
    rng: Pcg64Mcg,
    phase: Phase,
    /// 0-based.
    generation: usize,
    mutation: MutationSchedule,
    genomes: Vec<V::Genome>,
    individuals: Vec<Individual<V::Genome>>,
    max_reached: usize,
    best: BestTracker,
    report: RunReport,
}

impl<V, S> GenerationDriver<V, S>
where
    V: GeneticVariant,
    S: GenerationSink<V::Genome>,
{
    pub fn new(variant: V, sink: S, config: GaConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            variant,
            sink,
            config,
            rng: Pcg64Mcg::seed_from_u64(seed),
            phase: Phase::Initializing,
            generation: 0,
            mutation: config.mutation,
            genomes: vec![],
            individuals: vec![],
            max_reached: 0,
            best: BestTracker::new(),
            report: RunReport::default(),
        })
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// 0-based generation currently being processed.
    #[must_use]
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Evaluated individuals of the current generation, best first after selection.
    #[must_use]
    pub fn individuals(&self) -> &[Individual<V::Genome>] {
        &self.individuals
    }

    /// Genomes waiting for evaluation.
    #[must_use]
    pub fn genomes(&self) -> &[V::Genome] {
        &self.genomes
    }

    #[must_use]
    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Executes the current phase and returns the next one.
    pub fn step(&mut self) -> Phase {
        self.phase = match self.phase {
            Phase::Initializing => {
                log::info!("creating {} initial genomes", self.config.population);
                self.genomes = self
                    .variant
                    .initial_population(self.config.population, &mut self.rng);
                Phase::Evaluating
            }
            Phase::Evaluating => {
                log::info!("Generation #{}: evaluating", self.generation + 1);
                self.individuals = self.evaluate_population();
                Phase::Logging
            }
            Phase::Logging => {
                self.log_generation();
                Phase::Selecting
            }
            Phase::Selecting => {
                self.select();
                if self.generation + 1 >= self.config.generations {
                    Phase::Terminal
                } else {
                    Phase::Breeding
                }
            }
            Phase::Breeding => {
                let breeders = self
                    .individuals
                    .iter()
                    .take(self.config.breeders)
                    .collect::<Vec<_>>();
                self.genomes = self
                    .variant
                    .breed(&breeders, self.config.population, &mut self.rng);
                Phase::Mutating
            }
            Phase::Mutating => {
                self.variant.mutate(
                    &mut self.genomes,
                    self.max_reached,
                    self.mutation.rate(),
                    &mut self.rng,
                );
                self.mutation.advance();
                self.individuals.clear();
                self.generation += 1;
                Phase::Evaluating
            }
            Phase::Terminal => Phase::Terminal,
        };
        self.phase
    }

    /// Steps until [`Phase::Terminal`].
    pub fn run(mut self) -> RunReport {
        while self.step() != Phase::Terminal {}
        log::info!(
            "run finished after {} generations, best fitness {:?} (generation {:?})",
            self.config.generations,
            self.report.best_fitness,
            self.report.best_generation,
        );
        self.report
    }

    fn evaluate_population(&mut self) -> Vec<Individual<V::Genome>> {
        let workers = self.config.workers;
        let mut batches = (0..workers).map(|_| vec![]).collect::<Vec<_>>();
        for (id, genome) in mem::take(&mut self.genomes).into_iter().enumerate() {
            let seed = self.rng.random::<u64>();
            batches[id % workers].push((id, genome, seed));
        }

        let variant = &self.variant;
        let generation = self.generation;
        let mut individuals = thread::scope(|s| {
            let handles = batches
                .into_iter()
                .filter(|batch| !batch.is_empty())
                .map(|batch| {
                    s.spawn(move || {
                        batch
                            .into_iter()
                            .map(|(id, genome, seed)| {
                                evaluate_one(variant, generation, id, genome, seed)
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect::<Vec<_>>()
        });
        individuals.sort_by_key(|ind| ind.id);
        individuals
    }

    fn log_generation(&mut self) {
        let logged = self.sink.log_generation(&self.individuals);
        if !logged {
            log::warn!(
                "Generation #{}: result rows were not saved",
                self.generation + 1
            );
        }

        let failed = self.individuals.iter().filter(|ind| ind.failed).count();
        let fitness = DescriptiveStats::new(
            self.individuals
                .iter()
                .filter(|ind| !ind.failed)
                .map(|ind| ind.fitness),
        );

        log::debug!("  Individuals:");
        for ind in &self.individuals {
            log::debug!(
                "  {:3}: reached step {} => {:.3}{}",
                ind.id + 1,
                ind.steps_reached,
                ind.fitness,
                if ind.failed { " (failed)" } else { "" },
            );
        }
        match &fitness {
            Some(stats) => log::info!(
                "Generation #{}: fitness min {:.3} / max {:.3} / mean {:.3}, {} failed, mutation rate {:.4}",
                self.generation + 1,
                stats.min,
                stats.max,
                stats.mean,
                failed,
                self.mutation.rate(),
            ),
            None => log::warn!(
                "Generation #{}: every evaluation failed",
                self.generation + 1
            ),
        }

        self.report.generations.push(GenerationSummary {
            generation: self.generation + 1,
            fitness,
            failed,
            mutation_rate: self.mutation.rate(),
            logged,
        });
    }

    fn select(&mut self) {
        rank(&mut self.individuals);
        let breeders = self
            .individuals
            .iter()
            .take(self.config.breeders)
            .collect::<Vec<_>>();
        self.max_reached = max_reached(&breeders);

        let Some(best) = self.individuals.first() else {
            return;
        };
        if self.best.observe(self.generation, best.fitness) {
            let generation = self.generation + 1;
            log::info!(
                "Generation #{generation}: new best fitness {:.3} (individual {})",
                best.fitness,
                best.id + 1,
            );
            self.report.best_fitness = Some(best.fitness);
            self.report.best_generation = Some(generation);
            let artifact = self.variant.artifact(&best.genome);
            if !self.sink.persist_best(generation, best, &artifact) {
                log::warn!("Generation #{generation}: best genome was not saved");
            }
        }
    }
}

fn evaluate_one<V>(
    variant: &V,
    generation: usize,
    id: usize,
    mut genome: V::Genome,
    seed: u64,
) -> Individual<V::Genome>
where
    V: GeneticVariant,
{
    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    match variant.evaluate(&genome, &mut rng) {
        Ok((evaluation, extension)) => {
            variant.absorb(&mut genome, extension);
            let fitness = variant.fitness(&evaluation.summary);
            Individual::evaluated(
                id,
                generation,
                genome,
                &evaluation,
                fitness,
                variant.reach_metric(),
            )
        }
        Err(e) => {
            log::warn!(
                "Generation #{}: individual {} abandoned: {e}",
                generation + 1,
                id + 1
            );
            Individual::failed(id, generation, genome, variant.scenario())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use plumber_env::{
        Action, ActionSpace, EnvError, Environment, EnvironmentFactory, Frame, GameInfo,
        Scenario, SideScrollerFactory, Step,
    };

    use super::*;
    use crate::{
        genome::ActionSequence,
        variant::{SequenceGaConfig, SequenceVariant},
    };

    #[derive(Default)]
    struct RecordingSink {
        rows: Vec<(usize, usize)>,
        best: Vec<(usize, String)>,
    }

    impl<G> GenerationSink<G> for RecordingSink {
        fn log_generation(&mut self, individuals: &[Individual<G>]) -> bool {
            self.rows
                .extend(individuals.iter().map(|i| (i.row.generation, i.row.individual)));
            true
        }

        fn persist_best(&mut self, generation: usize, _best: &Individual<G>, artifact: &str) -> bool {
            self.best.push((generation, artifact.to_owned()));
            true
        }
    }

    /// Action 1 moves 10 pixels right, action 0 stands still.
    struct Corridor {
        info: GameInfo,
        fail: bool,
    }

    impl Environment for Corridor {
        fn action_space(&self) -> ActionSpace {
            ActionSpace::new(2).unwrap()
        }

        fn reset(&mut self) -> Result<Frame, EnvError> {
            if self.fail {
                return Err(EnvError::Backend("emulator crashed".to_owned()));
            }
            Ok(Frame::new(1, 1, vec![0]))
        }

        fn step(&mut self, action: Action) -> Result<Step, EnvError> {
            self.info.x_pos += 10 * u32::try_from(action.index()).unwrap();
            Ok(Step {
                observation: Frame::new(1, 1, vec![0]),
                reward: 0.0,
                done: false,
                info: self.info,
            })
        }
    }

    /// Every `fail_every`-th environment fails on reset.
    struct CorridorFactory {
        created: AtomicUsize,
        fail_every: Option<usize>,
    }

    impl EnvironmentFactory for CorridorFactory {
        type Env = Corridor;

        fn create(&self, scenario: Scenario) -> Result<Self::Env, EnvError> {
            let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Corridor {
                info: GameInfo::initial(scenario),
                fail: self.fail_every.is_some_and(|k| n % k == 0),
            })
        }
    }

    fn corridor_variant(
        length: usize,
        fail_every: Option<usize>,
    ) -> SequenceVariant<CorridorFactory> {
        let mut config = SequenceGaConfig::for_scenario(Scenario::stage(1, 1).unwrap());
        config.length = length;
        config.action_space = ActionSpace::new(2).unwrap();
        let factory = CorridorFactory {
            created: AtomicUsize::new(0),
            fail_every,
        };
        SequenceVariant::new(factory, config).unwrap()
    }

    fn config(population: usize, generations: usize, rate: f64) -> GaConfig {
        GaConfig {
            breeders: 2,
            workers: 2,
            mutation: MutationSchedule::new(rate, 0.95).unwrap(),
            ..GaConfig::new(population, generations)
        }
    }

    #[test]
    fn test_default_breeders() {
        assert_eq!(GaConfig::default_breeders(5), 2);
        assert_eq!(GaConfig::default_breeders(30), 3);
        assert_eq!(GaConfig::default_breeders(200), 20);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut c = config(4, 1, 0.4);
        c.breeders = 5;
        assert!(matches!(
            c.validate(),
            Err(ConfigError::TooManyBreeders { .. })
        ));
        assert!(config(1, 1, 0.4).validate().is_err());
        assert!(config(4, 0, 0.4).validate().is_err());
    }

    #[test]
    fn test_phases_of_one_generation() {
        let variant = corridor_variant(10, None);
        let mut driver = GenerationDriver::new(variant, NullSink, config(4, 2, 0.0), 1).unwrap();
        let phases = (0..7).map(|_| driver.step()).collect::<Vec<_>>();
        assert_eq!(
            phases,
            [
                Phase::Evaluating,
                Phase::Logging,
                Phase::Selecting,
                Phase::Breeding,
                Phase::Mutating,
                Phase::Evaluating,
                Phase::Logging,
            ]
        );
        assert_eq!(driver.generation(), 1);
        assert_eq!(driver.step(), Phase::Selecting);
        assert_eq!(driver.step(), Phase::Terminal);
        assert_eq!(driver.step(), Phase::Terminal);
    }

    #[test]
    fn test_children_are_built_from_breeder_genes() {
        let variant = corridor_variant(10, None);
        let mut driver = GenerationDriver::new(variant, NullSink, config(4, 2, 0.0), 7).unwrap();
        while driver.phase() != Phase::Breeding {
            driver.step();
        }
        let breeders = driver.individuals()[..2]
            .iter()
            .map(|i| i.genome.clone())
            .collect::<Vec<ActionSequence>>();
        driver.step();
        driver.step();
        assert_eq!(driver.genomes().len(), 4);
        for child in driver.genomes() {
            assert_eq!(child.len(), 10);
            for (i, gene) in child.actions().iter().enumerate() {
                assert!(breeders.iter().any(|b| b.actions()[i] == *gene));
            }
        }
    }

    #[test]
    fn test_rows_and_best_reach_the_sink() {
        let variant = corridor_variant(10, None);
        let mut sink = RecordingSink::default();
        let report = GenerationDriver::new(variant, &mut sink, config(4, 3, 0.4), 3)
            .unwrap()
            .run();
        assert_eq!(sink.rows.len(), 12);
        assert_eq!(sink.rows[0], (1, 1));
        assert_eq!(sink.rows[11], (3, 4));
        assert_eq!(report.generations.len(), 3);
        assert!(!sink.best.is_empty());
        let generations = sink.best.iter().map(|(g, _)| *g).collect::<Vec<_>>();
        assert!(generations.is_sorted_by(|a, b| a < b));
        assert_eq!(report.best_generation, generations.last().copied());
    }

    #[test]
    fn test_best_fitness_never_decreases() {
        let variant = corridor_variant(20, None);
        let report = GenerationDriver::new(variant, NullSink, config(6, 5, 0.4), 11)
            .unwrap()
            .run();
        let best = report.best_fitness.unwrap();
        for summary in &report.generations {
            assert!(summary.fitness.as_ref().unwrap().max <= best);
        }
    }

    #[test]
    fn test_failed_evaluations_do_not_stop_the_run() {
        let variant = corridor_variant(10, Some(3));
        let report = GenerationDriver::new(variant, NullSink, config(6, 2, 0.4), 5)
            .unwrap()
            .run();
        assert_eq!(report.generations.len(), 2);
        let failed = report.generations.iter().map(|g| g.failed).sum::<usize>();
        assert_eq!(failed, 4);
    }

    #[test]
    fn test_same_seed_same_result() {
        let run = |seed| {
            let variant = corridor_variant(15, None);
            GenerationDriver::new(variant, NullSink, config(5, 3, 0.4), seed)
                .unwrap()
                .run()
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn test_runs_on_side_scroller() {
        let mut seq = SequenceGaConfig::for_scenario(Scenario::stage(1, 1).unwrap());
        seq.length = 60;
        let variant = SequenceVariant::new(SideScrollerFactory, seq).unwrap();
        let report = GenerationDriver::new(variant, NullSink, config(4, 2, 0.4), 9)
            .unwrap()
            .run();
        assert_eq!(report.generations.len(), 2);
        assert!(report.generations.iter().all(|g| g.failed == 0));
    }
}
