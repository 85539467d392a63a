//! Choosing breeders and tracking the best individual of a run.

use std::cmp::Ordering;

use crate::evaluator::Individual;

/// Negated fitness ascending (fitness descending), then id ascending.
fn by_rank<G>(a: &Individual<G>, b: &Individual<G>) -> Ordering {
    a.negated_fitness()
        .total_cmp(&b.negated_fitness())
        .then(a.id.cmp(&b.id))
}

/// Sorts a generation best first.
pub fn rank<G>(individuals: &mut [Individual<G>]) {
    individuals.sort_by(by_rank);
}

/// The `k` best individuals, best first.
///
/// Equal fitness is broken by the lower id. Never returns more individuals than
/// there are.
#[must_use]
pub fn select_breeders<G>(individuals: &[Individual<G>], k: usize) -> Vec<&Individual<G>> {
    let mut ranked = individuals.iter().collect::<Vec<_>>();
    ranked.sort_by(|a, b| by_rank(a, b));
    ranked.truncate(k);
    ranked
}

/// Run-wide best fitness; only ever increases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestTracker {
    fitness: f64,
    generation: Option<usize>,
}

impl Default for BestTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl BestTracker {
    /// Starts at fitness 0, so non-positive fitness is never reported as a best.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fitness: 0.0,
            generation: None,
        }
    }

    /// Records `fitness` and returns whether it is strictly higher than any seen before.
    pub fn observe(&mut self, generation: usize, fitness: f64) -> bool {
        if fitness > self.fitness {
            self.fitness = fitness;
            self.generation = Some(generation);
            true
        } else {
            false
        }
    }

    /// Best fitness so far, if any individual beat the starting point.
    #[must_use]
    pub fn fitness(&self) -> Option<f64> {
        self.generation.map(|_| self.fitness)
    }

    /// 0-based generation that produced the best fitness.
    #[must_use]
    pub fn generation(&self) -> Option<usize> {
        self.generation
    }
}
