use clap::{Parser, Subcommand};

use self::{
    deep_q::DeepQArg,
    evolve::{EvolvePoliciesArg, EvolveSequencesArg},
    q_learning::{QLearningApproxArg, QLearningArg},
    random::RandomArg,
};

mod deep_q;
mod evolve;
mod q_learning;
mod random;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// What mode to run the program in
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Evolve fixed action sequences with a genetic algorithm
    EvolveSequences(#[clap(flatten)] EvolveSequencesArg),
    /// Evolve position-indexed policies with a genetic algorithm
    EvolvePolicies(#[clap(flatten)] EvolvePoliciesArg),
    /// Tabular Q-learning over frames or game-info states
    QLearning(#[clap(flatten)] QLearningArg),
    /// Q-learning with a linear function over game-info features
    QLearningApprox(#[clap(flatten)] QLearningApproxArg),
    /// Deep-Q style learning with experience replay
    DeepQ(#[clap(flatten)] DeepQArg),
    /// Play uniformly random games as a baseline
    Random(#[clap(flatten)] RandomArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode.unwrap_or(Mode::Random(RandomArg::default())) {
        Mode::EvolveSequences(arg) => evolve::run_sequences(&arg)?,
        Mode::EvolvePolicies(arg) => evolve::run_policies(&arg)?,
        Mode::QLearning(arg) => q_learning::run(&arg)?,
        Mode::QLearningApprox(arg) => q_learning::run_approx(&arg)?,
        Mode::DeepQ(arg) => deep_q::run(&arg)?,
        Mode::Random(arg) => random::run(&arg)?,
    }
    Ok(())
}
