use plumber_agent::{
    episode::{GameLimits, RandomAgent, run_game},
    state::InfoStates,
};
use plumber_env::{Environment as _, EnvironmentFactory as _, GameInfo, SideScrollerFactory};
use rand::{Rng as _, SeedableRng as _};
use rand_pcg::Pcg64Mcg;

use crate::util::ScenarioArg;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct RandomArg {
    /// Number of games to play
    #[arg(long, default_value_t = 100)]
    games: usize,
    #[clap(flatten)]
    scenario: ScenarioArg,
    /// Seed of the random generator [default: random]
    #[arg(long)]
    seed: Option<u64>,
}

impl Default for RandomArg {
    fn default() -> Self {
        Self {
            games: 100,
            scenario: ScenarioArg::default(),
            seed: None,
        }
    }
}

pub(crate) fn run(arg: &RandomArg) -> anyhow::Result<()> {
    let games = arg.games;
    let scenario = arg.scenario.scenario()?;
    let seed = arg.seed.unwrap_or_else(|| rand::rng().random());
    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    log::info!("playing {games} random games on {scenario} (seed {seed})");

    let mut env = SideScrollerFactory.open(scenario)?;
    let mut agent = RandomAgent::new(env.action_space());
    let mut best = None::<GameInfo>;
    for game in 0..games {
        let record = run_game(
            &mut *env,
            &InfoStates,
            &mut agent,
            GameInfo::initial(scenario),
            GameLimits::default(),
            &mut rng,
        )?;
        let info = record.info;
        log::info!(
            "game {}: score={} coins={} x={} world={}-{} time={} flag={}",
            game + 1,
            info.score,
            info.coins,
            info.x_pos,
            info.world,
            info.stage,
            info.time,
            info.flag_get,
        );
        if best.is_none_or(|b| info.score > b.score) {
            best = Some(info);
        }
    }

    if let Some(best) = best {
        eprintln!();
        eprintln!("Best random game: score {} at x={}", best.score, best.x_pos);
    }
    Ok(())
}
