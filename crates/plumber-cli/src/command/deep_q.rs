use std::path::PathBuf;

use chrono::Utc;
use plumber_agent::{
    replay::{LinearNetwork, ReplayAgent, ReplayConfig},
    state::{FrameInputs, StateEncoder as _},
    update::Transition,
};
use plumber_env::{
    Action, ActionSubset, Environment as _, EnvironmentFactory as _, GameInfo, ScopedEnvironment,
    SideScrollerFactory,
};
use plumber_stats::moving::MovingAverage;
use rand::{Rng as _, SeedableRng as _};
use rand_pcg::Pcg64Mcg;

use crate::{
    schema::ai_model::{AiModel, Hyperparameters},
    util::{self, CsvLog, CsvRow, Output, ScenarioArg},
};

const CSV_HEADER: [&str; 8] = [
    "Episode", "Game", "Coins", "Score", "World", "Level", "Time", "Reward",
];

/// Run right, and run right while jumping.
const ACTIONS: [Action; 2] = [Action::new(1), Action::new(2)];

const AVERAGE_WINDOW: usize = 100;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct DeepQArg {
    #[arg(long, default_value_t = 40_000)]
    episodes: usize,
    /// Episodes between progress reports
    #[arg(long, default_value_t = 20)]
    report_every: usize,
    /// Step budget of one episode [default: until the game ends]
    #[arg(long)]
    max_steps: Option<usize>,
    #[arg(long, default_value_t = 100_000)]
    memory_capacity: usize,
    #[arg(long, default_value_t = 32)]
    batch_size: usize,
    /// Steps before learning starts
    #[arg(long, default_value_t = 10_000)]
    burn_in: usize,
    /// Steps between learning updates
    #[arg(long, default_value_t = 3)]
    learn_every: usize,
    /// Steps between target estimator syncs
    #[arg(long, default_value_t = 10_000)]
    sync_every: usize,
    #[arg(long, default_value_t = 0.00025)]
    learning_rate: f64,
    #[arg(long, default_value_t = 0.9)]
    discount: f64,
    #[arg(long, default_value_t = 1.0)]
    exploration_rate: f64,
    #[arg(long, default_value_t = 0.999_999_75)]
    exploration_decay: f64,
    #[arg(long, default_value_t = 0.1)]
    exploration_floor: f64,
    /// Standard deviation of the initial weights
    #[arg(long, default_value_t = 0.01)]
    init_sigma: f64,
    /// Seed of the random generator [default: random]
    #[arg(long)]
    seed: Option<u64>,
    #[clap(flatten)]
    scenario: ScenarioArg,
    /// Directory for the per-episode log
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
    /// Output file path of the trained model [default: stdout]
    #[arg(long)]
    output: Option<PathBuf>,
}

impl DeepQArg {
    fn config(&self) -> ReplayConfig {
        ReplayConfig {
            memory_capacity: self.memory_capacity,
            batch_size: self.batch_size,
            burn_in: self.burn_in,
            learn_every: self.learn_every,
            sync_every: self.sync_every,
            learning_rate: self.learning_rate,
            discount: self.discount,
            exploration_rate: self.exploration_rate,
            exploration_decay: self.exploration_decay,
            exploration_floor: self.exploration_floor,
        }
    }
}

/// One line of the per-episode log.
#[derive(Debug, Clone, Copy)]
struct EpisodeRow {
    episode: usize,
    info: GameInfo,
    reward: f64,
}

impl CsvRow for EpisodeRow {
    fn fields(&self) -> Vec<String> {
        vec![
            self.episode.to_string(),
            "1".to_owned(),
            self.info.coins.to_string(),
            self.info.score.to_string(),
            self.info.world.to_string(),
            self.info.stage.to_string(),
            self.info.time.to_string(),
            self.reward.to_string(),
        ]
    }
}

/// Moving averages over the last episodes.
#[derive(Debug, Clone)]
struct Progress {
    rewards: MovingAverage,
    lengths: MovingAverage,
    losses: MovingAverage,
    q_values: MovingAverage,
}

impl Progress {
    fn new() -> Self {
        Self {
            rewards: MovingAverage::new(AVERAGE_WINDOW),
            lengths: MovingAverage::new(AVERAGE_WINDOW),
            losses: MovingAverage::new(AVERAGE_WINDOW),
            q_values: MovingAverage::new(AVERAGE_WINDOW),
        }
    }
}

pub(crate) fn run(arg: &DeepQArg) -> anyhow::Result<()> {
    let config = arg.config();
    config.validate()?;
    let scenario = arg.scenario.scenario()?;
    let seed = arg.seed.unwrap_or_else(|| rand::rng().random());
    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    log::info!("seed: {seed}");

    let csv = CsvLog::create(
        util::data_file(&arg.data_dir, "deep_q_data.csv")?,
        &CSV_HEADER,
    )?;
    let mut env = ScopedEnvironment::new(ActionSubset::new(
        SideScrollerFactory.create(scenario)?,
        ACTIONS.to_vec(),
    )?);

    let initial = GameInfo::initial(scenario);
    let inputs = FrameInputs.encode(&env.reset()?, &initial).len();
    let network = LinearNetwork::random(inputs, env.action_space(), arg.init_sigma, &mut rng)?;
    let mut agent = ReplayAgent::new(network, config)?;
    let mut progress = Progress::new();

    for episode in 0..arg.episodes {
        let mut state = FrameInputs.encode(&env.reset()?, &initial);
        let mut total_reward = 0.0;
        let mut length = 0_usize;
        let mut loss_sum = 0.0;
        let mut q_sum = 0.0;
        let mut updates = 0_u32;

        let info = loop {
            let action = agent.act(&state, &mut rng);
            let step = env.step(action)?;
            let next_state = FrameInputs.encode(&step.observation, &step.info);
            agent.cache(Transition {
                state,
                action,
                reward: step.reward,
                next_state: next_state.clone(),
                done: step.done,
            });
            if let Some(stats) = agent.learn(&mut rng) {
                loss_sum += stats.mean_loss;
                q_sum += stats.mean_q;
                updates += 1;
            }
            total_reward += step.reward;
            length += 1;
            if step.done || step.info.flag_get || arg.max_steps.is_some_and(|max| length >= max) {
                break step.info;
            }
            state = next_state;
        };

        csv.append([EpisodeRow {
            episode: episode + 1,
            info,
            reward: total_reward,
        }])?;
        progress.rewards.push(total_reward);
        #[expect(clippy::cast_precision_loss)]
        progress.lengths.push(length as f64);
        if updates > 0 {
            progress.losses.push(loss_sum / f64::from(updates));
            progress.q_values.push(q_sum / f64::from(updates));
        }

        if (episode + 1) % arg.report_every.max(1) == 0 {
            log::info!(
                "Episode #{}: step {}, exploration {:.3}, mean reward {:.3}, mean length {:.1}, mean loss {:.5}, mean Q {:.3}",
                episode + 1,
                agent.steps(),
                agent.exploration_rate(),
                progress.rewards.mean().unwrap_or(0.0),
                progress.lengths.mean().unwrap_or(0.0),
                progress.losses.mean().unwrap_or(0.0),
                progress.q_values.mean().unwrap_or(0.0),
            );
        }
    }

    let model = AiModel {
        name: "deep_q".to_owned(),
        trained_at: Utc::now(),
        episodes: arg.episodes,
        final_score: progress.rewards.mean().unwrap_or(0.0),
        hyperparameters: Hyperparameters::Replay(config),
        parameters: agent.online().clone(),
    };
    Output::save_json(&model, arg.output.clone())?;
    eprintln!();
    eprintln!("Training completed: {} episodes, {} steps", arg.episodes, agent.steps());
    eprintln!("  Results: {}", csv.path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Cli {
        #[clap(flatten)]
        arg: DeepQArg,
    }

    #[test]
    fn test_default_arguments_match_default_config() {
        let cli = Cli::parse_from(["plumber"]);
        assert_eq!(cli.arg.config(), ReplayConfig::default());
        assert_eq!(cli.arg.episodes, 40_000);
    }

    #[test]
    fn test_actions_are_valid_simple_actions() {
        let space = plumber_env::ActionSpace::SIMPLE;
        assert!(ACTIONS.iter().all(|&a| space.contains(a)));
    }
}
