//! Schedule generators and mutation operators.
//!
//! Every operator leaves its input untouched and returns a new [Schedule].

use crate::permutation::{randomized_fill, PermutationStrategy};
use crate::{Cycle, IntersectionId, Network, Schedule, Time};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A way of perturbing a schedule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Move {
    /// Re-split the green time of one random intersection. See [mutate_intersection].
    #[default]
    Resplit,
    /// Re-time one street of one random intersection. See [mutate_single_street].
    Retime,
    /// Cross over with a fresh random schedule. See [mutate_schedule].
    Crossover { strength: f64 },
}

/// A candidate schedule produced by a [Move].
#[derive(Clone, Debug)]
pub struct Proposal {
    pub schedule: Schedule,
    /// The intersection altered by the move, when it targeted exactly one.
    pub target: Option<IntersectionId>,
}

impl Move {
    /// Applies the move to a copy of `incumbent`.
    pub fn propose<R: Rng + ?Sized>(
        &self,
        network: &Network,
        incumbent: &Schedule,
        rng: &mut R,
    ) -> Proposal {
        let (schedule, target) = match *self {
            Self::Resplit => mutate_intersection(network, incumbent, rng),
            Self::Retime => mutate_single_street(network, incumbent, rng),
            Self::Crossover { strength } => {
                (mutate_schedule(network, incumbent, strength, rng), None)
            }
        };
        Proposal { schedule, target }
    }
}

/// Builds a schedule by splitting every intersection's green time with `strategy`.
///
/// Green durations follow the order of each intersection's incoming streets.
pub fn random_solution<R: Rng + ?Sized>(
    network: &Network,
    strategy: PermutationStrategy,
    rng: &mut R,
) -> Schedule {
    let mut schedule = Schedule::new(network.num_intersections());
    for intersection in network.intersections() {
        let incoming = intersection.incoming();
        let durations = strategy.generate(incoming.len(), network.duration(), rng);
        schedule.set_cycle(intersection.id(), Cycle::from_durations(incoming, &durations));
    }
    schedule
}

/// Replaces the cycle of one random intersection with a randomly weighted one.
///
/// Returns the new schedule and the intersection chosen, if the network has any.
pub fn mutate_intersection<R: Rng + ?Sized>(
    network: &Network,
    schedule: &Schedule,
    rng: &mut R,
) -> (Schedule, Option<IntersectionId>) {
    let mut schedule = schedule.clone();
    let Some(id) = pick_intersection(network, rng) else {
        return (schedule, None);
    };

    let incoming = network.intersection(id).incoming();
    let durations = randomized_fill(incoming.len(), network.duration(), rng);
    schedule.set_cycle(id, Cycle::from_durations(incoming, &durations));
    (schedule, Some(id))
}

/// Redraws the green duration of a single street at one random intersection.
///
/// The street is picked among those with green time, or among all incoming
/// streets if none has any. Its new duration is uniform between zero and what
/// the other streets of the intersection leave of the network's duration.
pub fn mutate_single_street<R: Rng + ?Sized>(
    network: &Network,
    schedule: &Schedule,
    rng: &mut R,
) -> (Schedule, Option<IntersectionId>) {
    let mut schedule = schedule.clone();
    let Some(id) = pick_intersection(network, rng) else {
        return (schedule, None);
    };
    let incoming = network.intersection(id).incoming();
    if incoming.is_empty() {
        return (schedule, Some(id));
    }

    let mut durations: Vec<Time> = incoming
        .iter()
        .map(|street| schedule.green_duration(id, *street))
        .collect();
    let green: Vec<usize> = (0..durations.len())
        .filter(|idx| durations[*idx] > 0)
        .collect();
    let idx = match green.choose(rng) {
        Some(idx) => *idx,
        None => rng.gen_range(0..incoming.len()),
    };

    let others = durations
        .iter()
        .enumerate()
        .filter(|(other, _)| *other != idx)
        .fold(0, |sum: Time, (_, duration)| sum.saturating_add(*duration));
    let remaining = network.duration().saturating_sub(others);
    durations[idx] = rng.gen_range(0..=remaining);

    schedule.set_cycle(id, Cycle::from_durations(incoming, &durations));
    (schedule, Some(id))
}

/// Takes each intersection's cycle from `donor` with the given probability,
/// otherwise from `base`.
pub fn mix_solutions<R: Rng + ?Sized>(
    network: &Network,
    base: &Schedule,
    donor: &Schedule,
    probability: f64,
    rng: &mut R,
) -> Schedule {
    let mut mixed = Schedule::new(network.num_intersections());
    for intersection in network.intersections() {
        let id = intersection.id();
        let source = if rng.gen::<f64>() < probability {
            donor
        } else {
            base
        };
        mixed.set_shared(id, source.shared(id));
    }
    mixed
}

/// Replaces each intersection's cycle with a random one with probability `strength`.
pub fn mutate_schedule<R: Rng + ?Sized>(
    network: &Network,
    schedule: &Schedule,
    strength: f64,
    rng: &mut R,
) -> Schedule {
    let fresh = random_solution(network, PermutationStrategy::RandomizedFill, rng);
    mix_solutions(network, schedule, &fresh, strength, rng)
}

fn pick_intersection<R: Rng + ?Sized>(network: &Network, rng: &mut R) -> Option<IntersectionId> {
    match network.num_intersections() {
        0 => None,
        n => Some(IntersectionId::new(rng.gen_range(0..n) as u32)),
    }
}
