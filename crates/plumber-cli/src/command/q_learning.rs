use std::path::PathBuf;

use chrono::Utc;
use plumber_agent::{
    agent::QLearningAgent,
    episode::{GameLimits, run_game},
    linear::{
        ActionConditioned, FeatureExtractor, FeatureSet as _, InfoFeatures, InfoScale, LinearQ,
        WeightVector,
    },
    selector::EpsilonGreedy,
    state::{InfoStates, PixelStates, StateEncoder},
    table::QTable,
    update::{LearningParams, TdUpdate},
};
use plumber_env::{
    ActionSpace, EnvironmentFactory as _, GameInfo, Scenario, SideScrollerFactory,
};
use plumber_stats::descriptive::DescriptiveStats;
use rand::{Rng, SeedableRng as _};
use rand_pcg::Pcg64Mcg;

use crate::{
    schema::ai_model::{AiModel, Hyperparameters, WeightMap, table_entries},
    util::{self, CsvLog, CsvRow, Output, ScenarioArg},
};

const CSV_HEADER: [&str; 7] = ["Episode", "Game", "Coins", "Score", "World", "Level", "Time"];

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, derive_more::FromStr)]
pub enum StateKind {
    /// The raw frame
    #[default]
    Pixels,
    /// The game-info record
    Info,
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, derive_more::FromStr)]
pub enum FeatureKind {
    /// The ten info fields, shared by every action
    Info,
    /// The info fields repeated per action, so each action gets its own weights
    #[default]
    Actions,
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, derive_more::FromStr)]
pub enum ScaleKind {
    Raw,
    #[default]
    Normalized,
}

impl From<ScaleKind> for InfoScale {
    fn from(kind: ScaleKind) -> Self {
        match kind {
            ScaleKind::Raw => InfoScale::Raw,
            ScaleKind::Normalized => InfoScale::Normalized,
        }
    }
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct LearningArg {
    /// Number of episodes; exploration restarts at every episode
    #[arg(long, default_value_t = 100)]
    episodes: usize,
    /// Games played per episode
    #[arg(long, default_value_t = 20)]
    games: usize,
    #[arg(long, default_value_t = 0.6)]
    learning_rate: f64,
    #[arg(long, default_value_t = 0.9)]
    discount: f64,
    /// Exploration rate at the start of every episode
    #[arg(long, default_value_t = 0.8)]
    exploration_rate: f64,
    /// Step budget of one game [default: until the game ends]
    #[arg(long)]
    max_steps: Option<usize>,
    /// Seed of the random generator [default: random]
    #[arg(long)]
    seed: Option<u64>,
    #[clap(flatten)]
    scenario: ScenarioArg,
    /// Directory for the per-game log
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
    /// Output file path of the trained model [default: stdout]
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct QLearningArg {
    #[clap(flatten)]
    learning: LearningArg,
    /// State representation: pixels or info
    #[arg(long, default_value = "pixels")]
    states: StateKind,
    #[arg(long, default_value_t = 0.99999)]
    exploration_decay: f64,
    /// Games replayed greedily with the learned table after training
    #[arg(long, default_value_t = 1)]
    greedy_games: usize,
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct QLearningApproxArg {
    #[clap(flatten)]
    learning: LearningArg,
    /// Feature set: info or actions
    #[arg(long, default_value = "actions")]
    features: FeatureKind,
    /// Feature scaling: raw or normalized
    #[arg(long, default_value = "normalized")]
    scale: ScaleKind,
    #[arg(long, default_value_t = 0.99)]
    exploration_decay: f64,
    /// Model file whose weights are the starting point [default: all zero]
    #[arg(long)]
    init_weights: Option<PathBuf>,
}

/// One line of the per-game log.
#[derive(Debug, Clone, Copy)]
struct GameRow {
    episode: usize,
    game: usize,
    info: GameInfo,
}

impl CsvRow for GameRow {
    fn fields(&self) -> Vec<String> {
        vec![
            self.episode.to_string(),
            self.game.to_string(),
            self.info.coins.to_string(),
            self.info.score.to_string(),
            self.info.world.to_string(),
            self.info.stage.to_string(),
            self.info.time.to_string(),
        ]
    }
}

/// Validated settings shared by both Q-learning commands.
#[derive(Debug, Clone, Copy)]
struct Session {
    scenario: Scenario,
    params: LearningParams,
    selector: EpsilonGreedy,
    limits: GameLimits,
}

impl Session {
    fn new(arg: &LearningArg, exploration_decay: f64) -> anyhow::Result<Self> {
        Ok(Self {
            scenario: arg.scenario.scenario()?,
            params: LearningParams::new(arg.learning_rate, arg.discount)?,
            selector: EpsilonGreedy::new(arg.exploration_rate, exploration_decay)?,
            limits: GameLimits {
                max_steps: arg.max_steps,
                stop_on_flag: false,
            },
        })
    }

    fn hyperparameters(&self) -> Hyperparameters {
        Hyperparameters::QLearning {
            learning_rate: self.params.learning_rate(),
            discount: self.params.discount(),
            exploration_rate: self.selector.rate(),
            exploration_decay: self.selector.decay(),
        }
    }
}

pub(crate) fn run(arg: &QLearningArg) -> anyhow::Result<()> {
    let session = Session::new(&arg.learning, arg.exploration_decay)?;
    let mut rng = seeded_rng(arg.learning.seed);
    match arg.states {
        StateKind::Pixels => {
            let csv = open_log(&arg.learning, "q_learning_data.csv")?;
            let table = QTable::new(ActionSpace::SIMPLE);
            let (table, final_score) =
                train(&arg.learning, &session, &PixelStates, table, &csv, &mut rng)?;
            replay_greedy(&session, &PixelStates, &table, arg.greedy_games, &mut rng)?;
            log::info!(
                "learned {} pixel state/action values over {} states",
                table.len(),
                table.states()
            );
            save_model(
                &arg.learning,
                "q_learning_pixels",
                &session,
                final_score,
                table_entries(&table),
            )
        }
        StateKind::Info => {
            let csv = open_log(&arg.learning, "q_learning_features.csv")?;
            let table = QTable::new(ActionSpace::SIMPLE);
            let (table, final_score) =
                train(&arg.learning, &session, &InfoStates, table, &csv, &mut rng)?;
            replay_greedy(&session, &InfoStates, &table, arg.greedy_games, &mut rng)?;
            log::info!(
                "learned {} info state/action values over {} states",
                table.len(),
                table.states()
            );
            save_model(
                &arg.learning,
                "q_learning_info",
                &session,
                final_score,
                table_entries(&table),
            )
        }
    }
}

pub(crate) fn run_approx(arg: &QLearningApproxArg) -> anyhow::Result<()> {
    let session = Session::new(&arg.learning, arg.exploration_decay)?;
    let info = InfoFeatures::new(arg.scale.into());
    match arg.features {
        FeatureKind::Info => approx_with(arg, &session, info),
        FeatureKind::Actions => {
            approx_with(arg, &session, ActionConditioned::new(info, ActionSpace::SIMPLE))
        }
    }
}

fn approx_with<E>(arg: &QLearningApproxArg, session: &Session, extractor: E) -> anyhow::Result<()>
where
    E: FeatureExtractor<GameInfo>,
{
    let value_fn = match &arg.init_weights {
        Some(path) => {
            let model: AiModel<WeightMap> = util::read_json_file("model", path)?;
            log::info!("starting from the weights of {} ({})", model.name, path.display());
            let weights = WeightVector::from_map(extractor.schema(), &model.parameters)?;
            LinearQ::with_weights(extractor, ActionSpace::SIMPLE, weights)?
        }
        None => LinearQ::new(extractor, ActionSpace::SIMPLE),
    };
    let mut rng = seeded_rng(arg.learning.seed);
    let csv = open_log(&arg.learning, "q_learning_approx.csv")?;
    let (value_fn, final_score) =
        train(&arg.learning, session, &InfoStates, value_fn, &csv, &mut rng)?;

    let weights = value_fn.into_weights();
    for (name, weight) in weights.schema().names().iter().zip(weights.values()) {
        log::debug!("  {name}: {weight:.6}");
    }
    save_model(
        &arg.learning,
        "q_learning_approx",
        session,
        final_score,
        weights.to_map(),
    )
}

fn seeded_rng(seed: Option<u64>) -> Pcg64Mcg {
    let seed = seed.unwrap_or_else(|| rand::rng().random());
    log::info!("seed: {seed}");
    Pcg64Mcg::seed_from_u64(seed)
}

fn open_log(arg: &LearningArg, file_name: &str) -> anyhow::Result<CsvLog> {
    CsvLog::create(util::data_file(&arg.data_dir, file_name)?, &CSV_HEADER)
}

/// Plays `episodes x games` games, logging every game, and returns the learned store
/// with the mean score of the last episode.
fn train<C, V, R>(
    arg: &LearningArg,
    session: &Session,
    encoder: &C,
    value_fn: V,
    csv: &CsvLog,
    rng: &mut R,
) -> anyhow::Result<(V, f64)>
where
    C: StateEncoder,
    C::State: Clone,
    V: TdUpdate<C::State>,
    R: Rng + ?Sized,
{
    let mut env = SideScrollerFactory.open(session.scenario)?;
    let mut agent = QLearningAgent::new(value_fn, session.selector, session.params);
    let mut final_score = 0.0;

    for episode in 0..arg.episodes {
        agent.set_selector(session.selector);
        let mut rows = Vec::with_capacity(arg.games);
        for game in 0..arg.games {
            let record = run_game(
                &mut *env,
                encoder,
                &mut agent,
                GameInfo::initial(session.scenario),
                session.limits,
                rng,
            )?;
            rows.push(GameRow {
                episode: episode + 1,
                game: game + 1,
                info: record.info,
            });
        }
        csv.append(&rows)?;

        let scores = DescriptiveStats::new(rows.iter().map(|row| f64::from(row.info.score)));
        if let Some(scores) = &scores {
            log::info!(
                "Episode #{}: score min={:.0} max={:.0} mean={:.1}, exploration {:.4}",
                episode + 1,
                scores.min,
                scores.max,
                scores.mean,
                agent.exploration_rate(),
            );
        }
        final_score = scores.map_or(0.0, |s| s.mean);
    }
    Ok((agent.into_value_fn(), final_score))
}

/// Plays with the learned table, exploring and learning nothing.
fn replay_greedy<C, R>(
    session: &Session,
    encoder: &C,
    table: &QTable<C::State>,
    games: usize,
    rng: &mut R,
) -> anyhow::Result<()>
where
    C: StateEncoder,
    C::State: Eq + std::hash::Hash + Clone,
    R: Rng + ?Sized,
{
    if games == 0 {
        return Ok(());
    }
    let mut env = SideScrollerFactory.open(session.scenario)?;
    let mut agent = QLearningAgent::greedy(table.clone());
    for game in 0..games {
        let record = run_game(
            &mut *env,
            encoder,
            &mut agent,
            GameInfo::initial(session.scenario),
            session.limits,
            rng,
        )?;
        log::info!(
            "Greedy game #{}: score={} x={} flag={}",
            game + 1,
            record.info.score,
            record.info.x_pos,
            record.info.flag_get,
        );
    }
    Ok(())
}

fn save_model<P>(
    arg: &LearningArg,
    name: &str,
    session: &Session,
    final_score: f64,
    parameters: P,
) -> anyhow::Result<()>
where
    P: serde::Serialize,
{
    let model = AiModel {
        name: name.to_owned(),
        trained_at: Utc::now(),
        episodes: arg.episodes,
        final_score,
        hyperparameters: session.hyperparameters(),
        parameters,
    };
    Output::save_json(&model, arg.output.clone())?;
    if let Some(path) = &arg.output {
        eprintln!("Model saved to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_row_fields() {
        let mut info = GameInfo::initial(Scenario::stage(1, 1).unwrap());
        info.coins = 3;
        info.score = 400;
        info.time = 350;
        let row = GameRow {
            episode: 2,
            game: 7,
            info,
        };
        assert_eq!(row.fields(), ["2", "7", "3", "400", "1", "1", "350"]);
    }

    #[test]
    fn test_kinds_parse_from_lowercase() {
        assert_eq!("pixels".parse::<StateKind>().unwrap(), StateKind::Pixels);
        assert_eq!("info".parse::<StateKind>().unwrap(), StateKind::Info);
        assert_eq!("actions".parse::<FeatureKind>().unwrap(), FeatureKind::Actions);
        assert_eq!("raw".parse::<ScaleKind>().unwrap(), ScaleKind::Raw);
    }
}
