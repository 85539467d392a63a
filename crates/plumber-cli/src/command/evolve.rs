use std::path::PathBuf;

use plumber_env::{Scenario, SideScrollerFactory};
use plumber_training::{
    driver::{GaConfig, GenerationDriver, GenerationSink, RunReport},
    evaluator::{Individual, LogRow},
    genome::PolicyBounds,
    operators::MutationSchedule,
    variant::{
        GeneticVariant, PolicyGaConfig, PolicyVariant, SequenceGaConfig, SequenceVariant,
    },
};
use rand::Rng as _;

use crate::util::{self, CsvLog, CsvRow, ScenarioArg};

const CSV_HEADER: [&str; 6] = ["Generation", "Sequence", "Fitness", "Score", "World", "Stage"];

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct GaArg {
    /// Genomes per generation
    #[arg(long, default_value_t = 20)]
    population: usize,
    /// Number of generations to run
    #[arg(long, default_value_t = 50)]
    generations: usize,
    /// Individuals allowed to breed [default: 10% of the population, at least 2]
    #[arg(long)]
    breeders: Option<usize>,
    /// Initial mutation rate
    #[arg(long, default_value_t = 0.4)]
    mutation_rate: f64,
    /// Mutation rate multiplier applied after every generation
    #[arg(long, default_value_t = 0.95)]
    mutation_decay: f64,
    /// Evaluations running at once [default: number of CPUs]
    #[arg(long)]
    workers: Option<usize>,
    /// Seed of the run's random generator [default: random]
    #[arg(long)]
    seed: Option<u64>,
    /// Directory for result logs and best genomes
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
}

impl GaArg {
    fn config(&self) -> anyhow::Result<GaConfig> {
        let mut config = GaConfig::new(self.population, self.generations);
        if let Some(breeders) = self.breeders {
            config.breeders = breeders;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config.mutation = MutationSchedule::new(self.mutation_rate, self.mutation_decay)?;
        config.validate()?;
        Ok(config)
    }

    fn seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| rand::rng().random())
    }
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct EvolveSequencesArg {
    #[clap(flatten)]
    ga: GaArg,
    #[clap(flatten)]
    scenario: ScenarioArg,
    /// Actions per sequence [default: 5000 for one stage, 20000 for all stages]
    #[arg(long)]
    length: Option<usize>,
    /// Cut points per child
    #[arg(long, default_value_t = 1)]
    crossovers: usize,
    /// Keep playing after a life is lost
    #[arg(long)]
    play_through_death: bool,
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct EvolvePoliciesArg {
    #[clap(flatten)]
    ga: GaArg,
    #[clap(flatten)]
    scenario: ScenarioArg,
    /// Largest x coordinate covered by crossover and mutation
    #[arg(long, default_value_t = 5000)]
    max_x: u32,
    /// Largest y coordinate covered by crossover and mutation
    #[arg(long, default_value_t = 255)]
    max_y: u32,
    /// Step budget of one run
    #[arg(long, default_value_t = PolicyGaConfig::DEFAULT_MAX_STEPS)]
    max_steps: usize,
}

/// Result log and best-genome file names for a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileNames {
    csv: String,
    best: String,
}

impl FileNames {
    fn sequences(scenario: Scenario) -> Self {
        match scenario {
            Scenario::AllStages => Self {
                csv: "ga_data_all_stages.csv".to_owned(),
                best: "best_seq_all.txt".to_owned(),
            },
            Scenario::Stage { world, stage } => Self {
                csv: format!("ga_data_{world}_{stage}.csv"),
                best: format!("best_seq_{world}_{stage}.txt"),
            },
        }
    }

    fn policies(scenario: Scenario) -> Self {
        match scenario {
            Scenario::AllStages => Self {
                csv: "ga_policy_data_all_stages.csv".to_owned(),
                best: "best_seq_ga_policy_all.txt".to_owned(),
            },
            Scenario::Stage { world, stage } => Self {
                csv: format!("ga_policy_data_{world}_{stage}.csv"),
                best: format!("best_seq_ga_policy_{world}_{stage}.txt"),
            },
        }
    }
}

impl CsvRow for LogRow {
    fn fields(&self) -> Vec<String> {
        vec![
            self.generation.to_string(),
            self.individual.to_string(),
            self.fitness.to_string(),
            self.score.to_string(),
            self.world.to_string(),
            self.stage.to_string(),
            self.reach.to_string(),
        ]
    }
}

/// Writes result rows and the best genome under the data directory.
#[derive(Debug)]
struct FileSink {
    log: CsvLog,
    best_path: PathBuf,
}

impl FileSink {
    fn create<V>(variant: &V, data_dir: &std::path::Path, names: &FileNames) -> anyhow::Result<Self>
    where
        V: GeneticVariant,
    {
        let mut header = CSV_HEADER.to_vec();
        header.push(variant.reach_metric().header());
        let log = CsvLog::create(util::data_file(data_dir, &names.csv)?, &header)?;
        let best_path = util::data_file(data_dir, &names.best)?;
        Ok(Self { log, best_path })
    }
}

impl<G> GenerationSink<G> for FileSink {
    fn log_generation(&mut self, individuals: &[Individual<G>]) -> bool {
        match self.log.append(individuals.iter().map(|ind| ind.row)) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Error adding rows to {}: {e:#}", self.log.path().display());
                false
            }
        }
    }

    fn persist_best(&mut self, generation: usize, _best: &Individual<G>, artifact: &str) -> bool {
        match util::overwrite_artifact(&self.best_path, generation, artifact) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Error saving best genome of generation {generation}: {e:#}");
                false
            }
        }
    }
}

pub(crate) fn run_sequences(arg: &EvolveSequencesArg) -> anyhow::Result<()> {
    let scenario = arg.scenario.scenario()?;
    let ga = arg.ga.config()?;
    let mut config = SequenceGaConfig::for_scenario(scenario);
    if let Some(length) = arg.length {
        config.length = length;
    }
    config.crossovers = arg.crossovers;
    config.stop_on_death = !arg.play_through_death;
    let variant = SequenceVariant::new(SideScrollerFactory, config)?;

    log::info!(
        "evolving {} sequences of {} actions on {scenario}",
        ga.population,
        config.length
    );
    evolve(variant, &arg.ga, ga, &FileNames::sequences(scenario))
}

pub(crate) fn run_policies(arg: &EvolvePoliciesArg) -> anyhow::Result<()> {
    let scenario = arg.scenario.scenario()?;
    let ga = arg.ga.config()?;
    let mut config = PolicyGaConfig::for_scenario(scenario);
    config.bounds = PolicyBounds {
        max_x: arg.max_x,
        max_y: arg.max_y,
    };
    config.max_steps = arg.max_steps;
    let variant = PolicyVariant::new(SideScrollerFactory, config)?;

    log::info!(
        "evolving {} policies over {}x{} positions on {scenario}",
        ga.population,
        arg.max_x + 1,
        arg.max_y + 1
    );
    evolve(variant, &arg.ga, ga, &FileNames::policies(scenario))
}

fn evolve<V>(variant: V, arg: &GaArg, config: GaConfig, names: &FileNames) -> anyhow::Result<()>
where
    V: GeneticVariant,
{
    let sink = FileSink::create(&variant, &arg.data_dir, names)?;
    let csv_path = sink.log.path().to_owned();
    let best_path = sink.best_path.clone();
    let seed = arg.seed();
    log::info!("seed: {seed}");

    let report = GenerationDriver::new(variant, sink, config, seed)?.run();
    print_report(&report, &csv_path, &best_path);
    Ok(())
}

fn print_report(report: &RunReport, csv_path: &std::path::Path, best_path: &std::path::Path) {
    eprintln!();
    eprintln!("Evolution completed");
    eprintln!("  Results: {}", csv_path.display());
    match (report.best_fitness, report.best_generation) {
        (Some(fitness), Some(generation)) => {
            eprintln!("  Best genome: {}", best_path.display());
            eprintln!("  Best fitness: {fitness:.3} (generation {generation})");
        }
        _ => eprintln!("  No individual reached a positive fitness"),
    }
    let failed = report.generations.iter().map(|g| g.failed).sum::<usize>();
    if failed > 0 {
        eprintln!("  Failed evaluations: {failed}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names_follow_scenario() {
        let all = FileNames::sequences(Scenario::AllStages);
        assert_eq!(all.csv, "ga_data_all_stages.csv");
        assert_eq!(all.best, "best_seq_all.txt");
        let one = FileNames::sequences(Scenario::stage(1, 2).unwrap());
        assert_eq!(one.csv, "ga_data_1_2.csv");
        assert_eq!(one.best, "best_seq_1_2.txt");
        let policy = FileNames::policies(Scenario::stage(4, 1).unwrap());
        assert_eq!(policy.csv, "ga_policy_data_4_1.csv");
        assert_eq!(policy.best, "best_seq_ga_policy_4_1.txt");
    }

    #[test]
    fn test_log_row_fields() {
        let row = LogRow {
            generation: 2,
            individual: 5,
            fitness: 522.0,
            score: 200,
            world: 1,
            stage: 1,
            reach: 50,
        };
        assert_eq!(row.fields(), ["2", "5", "522", "200", "1", "1", "50"]);
    }
}
