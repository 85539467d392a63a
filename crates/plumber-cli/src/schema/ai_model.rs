use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use plumber_agent::{replay::ReplayConfig, table::QTable};
use plumber_env::Action;
use serde::{Deserialize, Serialize};

/// A trained agent as saved to disk.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AiModel<P> {
    pub name: String,
    pub trained_at: DateTime<Utc>,
    pub episodes: usize,
    /// Mean score of the games of the last episode.
    pub final_score: f64,
    pub hyperparameters: Hyperparameters,
    pub parameters: P,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Hyperparameters {
    QLearning {
        learning_rate: f64,
        discount: f64,
        exploration_rate: f64,
        exploration_decay: f64,
    },
    Replay(ReplayConfig),
}

/// Learned weights by feature name.
pub type WeightMap = BTreeMap<String, f64>;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TableEntry<S> {
    pub state: S,
    pub action: Action,
    pub value: f64,
}

/// Table entries in a stable order: by action, then by value.
pub fn table_entries<S>(table: &QTable<S>) -> Vec<TableEntry<S>>
where
    S: Eq + std::hash::Hash + Clone,
{
    let mut entries = table
        .iter()
        .map(|(state, action, value)| TableEntry {
            state: state.clone(),
            action,
            value,
        })
        .collect::<Vec<_>>();
    entries.sort_by(|a, b| a.action.cmp(&b.action).then(b.value.total_cmp(&a.value)));
    entries
}
