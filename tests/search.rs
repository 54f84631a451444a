//! Tests that run the taboo search end to end.

mod common;

use traffic_signaling::{
    evaluate, parse_network, parse_schedule, Move, Network, TabooConfig, TabooSearch,
};

fn config(iterations: usize, seed: u64) -> TabooConfig {
    TabooConfig {
        iterations,
        mutations_per_iteration: 4,
        random_seed: Some(seed),
        ..Default::default()
    }
}

fn network() -> Network {
    common::random_network(11, 8, 80, 40)
}

/// Test that a seeded search is reproducible, however the candidates are scheduled.
#[test]
fn seeded_search_is_deterministic() {
    let network = network();
    let first = TabooSearch::new(&network, config(25, 7)).run().unwrap();
    let second = TabooSearch::new(&network, config(25, 7)).run().unwrap();

    assert_eq!(first.history, second.history);
    assert_eq!(first.schedule, second.schedule);
    assert_eq!(first.score, second.score);
}

/// Test that the best score never decreases and is the score of the returned schedule.
#[test]
fn best_score_is_monotonic() {
    let network = network();
    let outcome = TabooSearch::new(&network, config(40, 3)).run().unwrap();

    assert_eq!(outcome.history.len(), 40);
    assert!(outcome.score >= outcome.baseline);
    assert!(outcome
        .history
        .windows(2)
        .all(|pair| pair[0].best <= pair[1].best));
    assert_eq!(outcome.history.last().map(|r| r.best), Some(outcome.score));
    assert_eq!(evaluate(&network, &outcome.schedule), Ok(outcome.score));
    assert!(!outcome.timed_out);
}

/// Test that the incumbent never strays further below the best score than tolerated.
#[test]
fn regressions_stay_within_tolerance() {
    let network = network();
    let mut config = config(40, 5);
    config.max_worse_jump_percentage = 0.05;
    let outcome = TabooSearch::new(&network, config).run().unwrap();
    let tolerance = outcome.baseline as f64 * 0.05;

    for record in &outcome.history {
        assert!(record.incumbent <= record.best);
        if record.reverted {
            assert_eq!(record.incumbent, record.best);
        } else {
            assert!((record.best - record.incumbent) as f64 <= tolerance);
        }
    }
}

/// Test that with no tolerance every regression sends the search back to the best schedule.
#[test]
fn zero_tolerance_always_reverts() {
    let network = network();
    let mut config = config(30, 9);
    config.max_worse_jump_percentage = 0.0;
    let outcome = TabooSearch::new(&network, config).run().unwrap();

    assert!(outcome
        .history
        .iter()
        .all(|record| record.incumbent == record.best));
}

/// Test that an intersection chosen while cooling down was forced through.
#[test]
fn cooling_intersections_are_avoided() {
    let network = network();
    let outcome = TabooSearch::new(&network, config(60, 13)).run().unwrap();
    let history = &outcome.history;

    for (i, record) in history.iter().enumerate() {
        let Some(target) = record.target else {
            panic!("iteration {i} has no target");
        };
        assert!(record.cooldown <= (60 - i) / 2);

        let reused = history
            .iter()
            .skip(i + 1)
            .take(record.cooldown)
            .find(|later| later.target == Some(target));
        if let Some(later) = reused {
            assert!(later.forced);
        }
    }
}

/// Test that a zero time limit stops the search before its first iteration.
#[test]
fn time_limit_stops_search() {
    let network = network();
    let mut config = config(1000, 1);
    config.time_limit_secs = Some(0.0);
    let outcome = TabooSearch::new(&network, config).run().unwrap();

    assert!(outcome.timed_out);
    assert!(outcome.history.is_empty());
    assert_eq!(outcome.score, outcome.baseline);
}

/// Test that an invalid time limit is ignored instead of cutting the search short.
#[test]
fn invalid_time_limit_is_ignored() {
    let network = network();
    for limit in [-1.0, f64::NAN, f64::MAX] {
        let mut config = config(10, 6);
        config.time_limit_secs = Some(limit);
        let outcome = TabooSearch::new(&network, config).run().unwrap();

        assert!(!outcome.timed_out);
        assert_eq!(outcome.history.len(), 10);
    }
}

/// Test the other neighbourhoods.
#[test]
fn alternative_moves() {
    let network = network();

    let mut retime = config(20, 2);
    retime.neighborhood = Move::Retime;
    let outcome = TabooSearch::new(&network, retime).run().unwrap();
    assert!(outcome.score >= outcome.baseline);
    assert!(outcome.history.iter().all(|record| record.target.is_some()));

    let mut crossover = config(20, 2);
    crossover.neighborhood = Move::Crossover { strength: 0.3 };
    let outcome = TabooSearch::new(&network, crossover).run().unwrap();
    assert!(outcome.score >= outcome.baseline);
    assert!(outcome
        .history
        .iter()
        .all(|record| record.target.is_none() && record.cooldown == 0 && !record.forced));
}

/// Test that the search config can be read from JSON.
#[test]
fn config_from_json() {
    let config: TabooConfig = serde_json::from_str(
        r#"{
            "iterations": 12,
            "random_seed": 4,
            "neighborhood": { "kind": "crossover", "strength": 0.25 }
        }"#,
    )
    .unwrap();

    assert_eq!(config.iterations, 12);
    assert_eq!(config.random_seed, Some(4));
    assert_eq!(config.neighborhood, Move::Crossover { strength: 0.25 });
    assert_eq!(
        config.mutations_per_iteration,
        TabooConfig::default().mutations_per_iteration
    );
}

const NETWORK: &str = "\
6 4 5 2 1000
2 0 rue-de-londres 1
0 1 rue-d-amsterdam 1
3 1 rue-d-athenes 1
2 3 rue-de-rome 2
1 2 rue-de-moscou 3
4 rue-de-londres rue-d-amsterdam rue-de-moscou rue-de-rome
3 rue-d-athenes rue-de-moscou rue-de-londres
";

const SCHEDULE: &str = "\
3
1
2
rue-d-athenes 2
rue-d-amsterdam 1
0
1
rue-de-londres 2
2
1
rue-de-moscou 1
";

/// Test a search which starts from a schedule read from text.
#[test]
fn search_from_parsed_schedule() {
    let network = parse_network(NETWORK).unwrap();

    // Intersection 3 is missing
    let partial = parse_schedule(&network, SCHEDULE).unwrap();
    assert!(evaluate(&network, &partial).is_err());
    assert!(TabooSearch::new(&network, config(5, 0))
        .run_from(partial)
        .is_err());

    let complete = SCHEDULE.replacen('3', "4", 1) + "3\n1\nrue-de-rome 1\n";
    let initial = parse_schedule(&network, &complete).unwrap();
    assert_eq!(evaluate(&network, &initial), Ok(1002));

    let outcome = TabooSearch::new(&network, config(10, 0))
        .run_from(initial)
        .unwrap();
    assert_eq!(outcome.baseline, 1002);
    assert!(outcome.score >= 1002);
}
