//! Crossover and mutation for both genome kinds.
//!
//! Operators only ever see the breeders and an explicit RNG. They never change the
//! length of a sequence and never touch coordinates outside [`PolicyBounds`].
//!
//! # Sequences
//!
//! Crossover draws `crossovers` cut points in `[0, max_reached)` once per call, where
//! `max_reached` is the furthest step any breeder played. The cuts split every parent
//! into the same aligned segments, and each child segment is copied from an
//! independently chosen parent, so all children of one call share their boundaries.
//! Genes past `max_reached` therefore still come from some parent intact.
//!
//! Mutation also stays in `[0, max_reached)`: there is no point in perturbing genes
//! that no individual has played yet.
//!
//! # Policies
//!
//! Crossover walks every coordinate in bounds and copies the action of a random parent
//! (coordinates the chosen parent lacks are left unset). Mutation overwrites
//! `ceil(rate * max_x * max_y)` random coordinates.

use plumber_env::ActionSpace;
use rand::{Rng, seq::IndexedRandom as _};

use crate::{
    ConfigError, check_unit,
    genome::{ActionSequence, CoordinatePolicy, PolicyBounds},
};

/// Builds `children` sequences from segments of `parents`.
///
/// The cut points are drawn once and shared by every child. Parents are expected to
/// share one length. Returns no children when there are no parents.
pub fn crossover_sequences<R>(
    parents: &[&ActionSequence],
    max_reached: usize,
    crossovers: usize,
    children: usize,
    rng: &mut R,
) -> Vec<ActionSequence>
where
    R: Rng + ?Sized,
{
    let Some(first) = parents.first() else {
        return vec![];
    };
    let len = first.len();
    debug_assert!(parents.iter().all(|p| p.len() == len));

    let cuts = draw_cuts(max_reached, crossovers, rng);
    (0..children)
        .map(|_| {
            let mut actions = Vec::with_capacity(len);
            let mut start = 0;
            for &end in cuts.iter().chain([&len]) {
                let end = end.clamp(start, len);
                let parent = parents
                    .choose(rng)
                    .expect("parents should never be empty here");
                actions.extend_from_slice(&parent.actions()[start..end]);
                start = end;
            }
            ActionSequence::from_actions(actions)
        })
        .collect()
}

/// Sorted cut points in `[0, max_reached)`; all at 0 when nothing was reached.
fn draw_cuts<R>(max_reached: usize, crossovers: usize, rng: &mut R) -> Vec<usize>
where
    R: Rng + ?Sized,
{
    let mut cuts = (0..crossovers)
        .map(|_| {
            if max_reached == 0 {
                0
            } else {
                rng.random_range(0..max_reached)
            }
        })
        .collect::<Vec<_>>();
    cuts.sort_unstable();
    cuts
}

/// Overwrites random genes in `[0, max_reached)` of every sequence.
///
/// Each sequence gets between 0 and `floor(max_reached * rate)` mutations.
pub fn mutate_sequences<R>(
    sequences: &mut [ActionSequence],
    max_reached: usize,
    rate: f64,
    action_space: ActionSpace,
    rng: &mut R,
) where
    R: Rng + ?Sized,
{
    #[expect(clippy::cast_precision_loss)]
    let limit = max_reached as f64 * rate;
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let max_mutations = limit.floor() as usize;

    for sequence in sequences {
        let span = max_reached.min(sequence.len());
        if span == 0 {
            continue;
        }
        let count = rng.random_range(0..=max_mutations);
        for _ in 0..count {
            let index = rng.random_range(0..span);
            sequence.set(index, action_space.sample(rng));
        }
    }
}

/// Builds `children` policies, copying each coordinate from a random parent.
pub fn crossover_policies<R>(
    parents: &[&CoordinatePolicy],
    bounds: PolicyBounds,
    children: usize,
    rng: &mut R,
) -> Vec<CoordinatePolicy>
where
    R: Rng + ?Sized,
{
    if parents.is_empty() {
        return vec![];
    }
    (0..children)
        .map(|_| {
            let mut child = CoordinatePolicy::default();
            for coordinate in bounds.coordinates() {
                let parent = parents
                    .choose(rng)
                    .expect("parents should never be empty here");
                if let Some(action) = parent.get(coordinate) {
                    child.insert(coordinate, action);
                }
            }
            child
        })
        .collect()
}

/// Number of coordinates overwritten per policy by [`mutate_policies`].
#[must_use]
pub fn policy_mutation_count(bounds: PolicyBounds, rate: f64) -> usize {
    let count = (rate * f64::from(bounds.max_x) * f64::from(bounds.max_y)).ceil();
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = count.max(0.0) as usize;
    count
}

/// Overwrites [`policy_mutation_count`] random in-bounds coordinates of every policy.
pub fn mutate_policies<R>(
    policies: &mut [CoordinatePolicy],
    bounds: PolicyBounds,
    rate: f64,
    action_space: ActionSpace,
    rng: &mut R,
) where
    R: Rng + ?Sized,
{
    let count = policy_mutation_count(bounds, rate);
    for policy in policies {
        for _ in 0..count {
            policy.insert(bounds.sample(rng), action_space.sample(rng));
        }
    }
}

/// Mutation rate decaying geometrically once per generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MutationSchedule {
    rate: f64,
    decay: f64,
}

impl Default for MutationSchedule {
    fn default() -> Self {
        Self {
            rate: 0.4,
            decay: 0.95,
        }
    }
}

impl MutationSchedule {
    pub fn new(rate: f64, decay: f64) -> Result<Self, ConfigError> {
        check_unit("mutation rate", rate)?;
        check_unit("mutation decay", decay)?;
        Ok(Self { rate, decay })
    }

    #[must_use]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    #[must_use]
    pub fn decay(&self) -> f64 {
        self.decay
    }

    /// Applies one generation of decay.
    pub fn advance(&mut self) {
        self.rate *= self.decay;
    }
}
