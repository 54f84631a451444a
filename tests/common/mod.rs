//! Networks shared by the integration tests.

#![allow(dead_code)]

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use traffic_signaling::{Cycle, Network, Schedule, Time};

/// Builds a random ring-shaped network where every intersection has two
/// incoming and two outgoing streets, and cars follow random walks.
pub fn random_network(seed: u64, intersections: u32, cars: usize, duration: Time) -> Network {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut builder = Network::builder(duration, intersections as usize, 100);
    let mut outgoing = vec![vec![]; intersections as usize];

    for idx in 0..intersections {
        for hop in [1, 2] {
            let end = (idx + hop) % intersections;
            let name = format!("s{idx}-{end}");
            builder
                .add_street(&name, idx, end, rng.gen_range(1..=3))
                .unwrap();
            outgoing[idx as usize].push((name, end));
        }
    }

    for _ in 0..cars {
        let mut at = rng.gen_range(0..intersections) as usize;
        let mut path = vec![];
        for _ in 0..rng.gen_range(2..=5) {
            let (name, end) = &outgoing[at][rng.gen_range(0..2)];
            path.push(name.clone());
            at = *end as usize;
        }
        builder.add_car(&path).unwrap();
    }

    builder.build()
}

/// Gives every incoming street of every intersection the same green duration.
pub fn uniform_schedule(network: &Network, duration: Time) -> Schedule {
    let mut schedule = Schedule::new(network.num_intersections());
    for intersection in network.intersections() {
        let durations = vec![duration; intersection.incoming().len()];
        schedule.set_cycle(
            intersection.id(),
            Cycle::from_durations(intersection.incoming(), &durations),
        );
    }
    schedule
}
