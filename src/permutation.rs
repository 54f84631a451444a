//! Capacity-constrained permutations.
//!
//! A permutation splits a time budget between the `n` incoming streets of an
//! intersection: `n` non-negative green durations whose sum never exceeds the budget.

use crate::Time;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How to split the green time of an intersection between its streets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermutationStrategy {
    /// One slot for every street. See [minimum_fill].
    #[default]
    MinimumFill,
    /// Randomly weighted slots. See [randomized_fill].
    RandomizedFill,
}

impl PermutationStrategy {
    /// Generates `n` green durations within `budget`.
    pub fn generate<R: Rng + ?Sized>(self, n: usize, budget: Time, rng: &mut R) -> Vec<Time> {
        match self {
            Self::MinimumFill => minimum_fill(n, budget, rng),
            Self::RandomizedFill => randomized_fill(n, budget, rng),
        }
    }
}

/// Gives every slot a duration of one.
///
/// When there are more slots than the budget allows, a random subset of
/// `budget` slots gets one unit each and the rest get nothing.
pub fn minimum_fill<R: Rng + ?Sized>(n: usize, budget: Time, rng: &mut R) -> Vec<Time> {
    if n > budget as usize {
        return unit_subset(n, budget, rng);
    }
    vec![1; n]
}

/// Starts every slot at one, then repeatedly boosts a random slot which is still
/// at one by a random share of the remaining budget, until either the budget is
/// spent or every slot has been boosted.
///
/// Falls back to [minimum_fill] when there are more slots than the budget allows.
pub fn randomized_fill<R: Rng + ?Sized>(n: usize, budget: Time, rng: &mut R) -> Vec<Time> {
    if n > budget as usize {
        return unit_subset(n, budget, rng);
    }

    let mut slots = vec![1; n];
    let mut remaining = budget - n as Time;
    let mut unboosted: Vec<usize> = (0..n).collect();

    while remaining > 0 && !unboosted.is_empty() {
        let amount = rng.gen_range(0..=remaining);
        let pick = rng.gen_range(0..unboosted.len());
        if amount == 0 {
            continue;
        }
        let idx = unboosted.swap_remove(pick);
        slots[idx] += amount;
        remaining -= amount;
    }

    slots
}

/// Gives one unit to `budget` slots chosen uniformly at random.
fn unit_subset<R: Rng + ?Sized>(n: usize, budget: Time, rng: &mut R) -> Vec<Time> {
    let mut slots = vec![0; n];
    for idx in rand::seq::index::sample(rng, n, budget as usize) {
        slots[idx] = 1;
    }
    slots
}
