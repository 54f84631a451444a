//! Taboo search over green light schedules.
//!
//! Each iteration proposes a batch of mutations of the incumbent schedule, scores
//! them in parallel and moves to the best one, even if it is worse. Intersections
//! which were just mutated cool down for a random number of iterations, during
//! which proposals touching them are redrawn. Regressions larger than a fraction
//! of the initial score send the search back to the best schedule found so far.

use crate::error::IncompleteScheduleError;
use crate::mutation::{random_solution, Move, Proposal};
use crate::permutation::PermutationStrategy;
use crate::simulation::evaluate;
use crate::{IntersectionId, Network, Schedule, Score};
use log::{debug, info, trace, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Redraws allowed before a proposal touching a cooling intersection is accepted anyway.
const MAX_TABOO_REJECTIONS: usize = 100;

/// Options of a [TabooSearch].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabooConfig {
    /// The number of search rounds.
    pub iterations: usize,
    /// The number of candidates proposed in each round.
    pub mutations_per_iteration: usize,
    /// The largest regression from the best score, as a fraction of the initial
    /// score, which the search tolerates before reverting to the best schedule.
    pub max_worse_jump_percentage: f64,
    /// Seed of the random number generator. Seeded from the OS if absent.
    pub random_seed: Option<u64>,
    /// Stop after this many seconds, even if iterations remain.
    pub time_limit_secs: Option<f64>,
    /// The move used to propose candidates.
    pub neighborhood: Move,
}

impl Default for TabooConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            mutations_per_iteration: 8,
            max_worse_jump_percentage: 0.1,
            random_seed: None,
            time_limit_secs: None,
            neighborhood: Move::Resplit,
        }
    }
}

/// What happened during one iteration of the search.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct IterationRecord {
    /// The score of the incumbent at the end of the iteration.
    pub incumbent: Score,
    /// The best score found so far.
    pub best: Score,
    /// The intersection mutated by the chosen candidate.
    pub target: Option<IntersectionId>,
    /// The cooldown given to `target`.
    pub cooldown: usize,
    /// Whether the chosen candidate was accepted despite its target cooling down.
    pub forced: bool,
    /// Whether the incumbent was reset to the best schedule.
    pub reverted: bool,
}

/// The result of a search.
#[derive(Clone, Debug)]
pub struct SearchOutcome {
    /// The best schedule found.
    pub schedule: Schedule,
    pub score: Score,
    /// The score of the schedule the search started from.
    pub baseline: Score,
    /// One record per completed iteration.
    pub history: Vec<IterationRecord>,
    /// Whether the time limit cut the search short.
    pub timed_out: bool,
}

/// A taboo search optimising the schedule of a network.
pub struct TabooSearch<'a> {
    network: &'a Network,
    config: TabooConfig,
    rng: ChaCha8Rng,
    /// The number of iterations each intersection stays taboo for.
    cooldowns: Vec<usize>,
}

#[derive(Clone)]
struct Scored {
    schedule: Schedule,
    score: Score,
}

struct Candidate {
    proposal: Proposal,
    score: Score,
    forced: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Verdict {
    Improved,
    Tolerated,
    Reverted,
}

impl<'a> TabooSearch<'a> {
    /// Creates a search over the given network.
    ///
    /// # Panics
    ///
    /// Panics if `config.mutations_per_iteration` is 0.
    pub fn new(network: &'a Network, config: TabooConfig) -> Self {
        assert!(
            config.mutations_per_iteration > 0,
            "called `TabooSearch::new()` with zero mutations per iteration"
        );
        let rng = match config.random_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            network,
            config,
            rng,
            cooldowns: vec![0; network.num_intersections()],
        }
    }

    pub fn config(&self) -> &TabooConfig {
        &self.config
    }

    /// Gets the remaining cooldown of every intersection.
    pub fn cooldowns(&self) -> &[usize] {
        &self.cooldowns
    }

    /// Runs the search from a schedule giving every street one green slot.
    pub fn run(&mut self) -> Result<SearchOutcome, IncompleteScheduleError> {
        let initial =
            random_solution(self.network, PermutationStrategy::MinimumFill, &mut self.rng);
        self.run_from(initial)
    }

    /// Runs the search from the given schedule.
    pub fn run_from(
        &mut self,
        initial: Schedule,
    ) -> Result<SearchOutcome, IncompleteScheduleError> {
        let started = Instant::now();
        let deadline = self
            .config
            .time_limit_secs
            .and_then(|secs| deadline_after(started, secs));
        let iterations = self.config.iterations;

        let baseline = evaluate(self.network, &initial)?;
        let tolerance = baseline as f64 * self.config.max_worse_jump_percentage;
        let mut incumbent = Scored {
            schedule: initial,
            score: baseline,
        };
        let mut best = incumbent.clone();
        self.cooldowns.iter_mut().for_each(|cooldown| *cooldown = 0);

        info!(
            "taboo search: {} iterations of {} candidates, baseline score {}",
            iterations, self.config.mutations_per_iteration, baseline
        );

        let mut history = Vec::with_capacity(iterations);
        let mut timed_out = false;

        for iteration in 0..iterations {
            if matches!(deadline, Some(deadline) if Instant::now() >= deadline) {
                info!("time limit reached after {} iterations", iteration);
                timed_out = true;
                break;
            }

            let candidates = self.candidates(&incumbent.schedule)?;
            let Some(chosen) = candidates
                .into_iter()
                .reduce(|best, next| if next.score > best.score { next } else { best })
            else {
                break;
            };

            let cooldown = match chosen.proposal.target {
                Some(_) => self.rng.gen_range(0..=(iterations - iteration) / 2),
                None => 0,
            };
            self.cool_down(chosen.proposal.target, cooldown);

            incumbent = Scored {
                schedule: chosen.proposal.schedule,
                score: chosen.score,
            };
            let verdict = judge(incumbent.score, best.score, tolerance);
            match verdict {
                Verdict::Improved => {
                    debug!("iteration {}: new best score {}", iteration, incumbent.score);
                    best = incumbent.clone();
                }
                Verdict::Tolerated => {}
                Verdict::Reverted => {
                    debug!(
                        "iteration {}: score {} too far below best {}, reverting",
                        iteration, incumbent.score, best.score
                    );
                    incumbent = best.clone();
                }
            }

            history.push(IterationRecord {
                incumbent: incumbent.score,
                best: best.score,
                target: chosen.proposal.target,
                cooldown,
                forced: chosen.forced,
                reverted: verdict == Verdict::Reverted,
            });
            debug!(
                "iteration {}: incumbent {}, best {}",
                iteration, incumbent.score, best.score
            );
        }

        info!(
            "taboo search finished: best score {} (baseline {})",
            best.score, baseline
        );

        Ok(SearchOutcome {
            schedule: best.schedule,
            score: best.score,
            baseline,
            history,
            timed_out,
        })
    }

    /// Ticks every cooldown down by one iteration, then makes `target` taboo
    /// for the next `cooldown` iterations.
    fn cool_down(&mut self, target: Option<IntersectionId>, cooldown: usize) {
        for remaining in &mut self.cooldowns {
            *remaining = remaining.saturating_sub(1);
        }
        if let Some(target) = target {
            self.cooldowns[target.index()] = cooldown;
        }
    }

    /// Proposes and scores one batch of candidates.
    ///
    /// Every candidate draws from its own generator, seeded from the search's
    /// generator and the candidate's index, so results do not depend on scheduling.
    fn candidates(
        &mut self,
        incumbent: &Schedule,
    ) -> Result<Vec<Candidate>, IncompleteScheduleError> {
        let base_seed: u64 = self.rng.gen();
        let network = self.network;
        let neighborhood = self.config.neighborhood;
        let cooldowns = &self.cooldowns;

        (0..self.config.mutations_per_iteration)
            .into_par_iter()
            .map(|idx| {
                let mut rng = candidate_rng(base_seed, idx);
                let (proposal, forced) =
                    propose_allowed(network, neighborhood, incumbent, cooldowns, &mut rng);
                let score = evaluate(network, &proposal.schedule)?;
                Ok(Candidate {
                    proposal,
                    score,
                    forced,
                })
            })
            .collect()
    }
}

/// Draws proposals until one does not touch a cooling intersection, or until
/// [MAX_TABOO_REJECTIONS] have been rejected in a row.
///
/// Returns the proposal and whether it was forced through.
fn propose_allowed<R: Rng + ?Sized>(
    network: &Network,
    neighborhood: Move,
    incumbent: &Schedule,
    cooldowns: &[usize],
    rng: &mut R,
) -> (Proposal, bool) {
    let mut rejections = 0;
    loop {
        let proposal = neighborhood.propose(network, incumbent, rng);
        let taboo = matches!(proposal.target, Some(target) if cooldowns[target.index()] > 0);
        if !taboo {
            return (proposal, false);
        }
        if rejections >= MAX_TABOO_REJECTIONS {
            trace!("accepting taboo proposal after {} rejections", rejections);
            return (proposal, true);
        }
        rejections += 1;
    }
}

/// Decides what to do with the new incumbent score.
fn judge(incumbent: Score, best: Score, tolerance: f64) -> Verdict {
    if incumbent > best {
        Verdict::Improved
    } else if (best - incumbent) as f64 > tolerance {
        Verdict::Reverted
    } else {
        Verdict::Tolerated
    }
}

/// Gets the instant `secs` seconds after `started`. Limits which are negative,
/// not a number or too far away give no deadline.
fn deadline_after(started: Instant, secs: f64) -> Option<Instant> {
    let deadline = Duration::try_from_secs_f64(secs)
        .ok()
        .and_then(|limit| started.checked_add(limit));
    if deadline.is_none() {
        warn!("ignoring invalid time limit of {} seconds", secs);
    }
    deadline
}

fn candidate_rng(base_seed: u64, idx: usize) -> ChaCha8Rng {
    let seed = base_seed ^ (idx as u64).rotate_left(17) ^ 0x9E37_79B1_85EB_CA87u64;
    ChaCha8Rng::seed_from_u64(seed)
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn ring(size: u32) -> Network {
        let mut builder = Network::builder(20, size as usize, 5);
        for idx in 0..size {
            builder
                .add_street(&format!("r{idx}"), idx, (idx + 1) % size, 1)
                .unwrap();
        }
        builder.add_car(&["r0", "r1"]).unwrap();
        builder.build()
    }

    #[test]
    fn default_config() {
        let config = TabooConfig::default();
        assert_eq!(config.iterations, 100);
        assert_approx_eq!(config.max_worse_jump_percentage, 0.1);
        assert_eq!(config.neighborhood, Move::Resplit);
    }

    #[test]
    fn config_fills_in_defaults() {
        let config: TabooConfig =
            serde_json::from_str(r#"{ "iterations": 7, "neighborhood": { "kind": "retime" } }"#)
                .unwrap();
        assert_eq!(config.iterations, 7);
        assert_eq!(config.mutations_per_iteration, 8);
        assert_eq!(config.neighborhood, Move::Retime);
        assert_approx_eq!(config.max_worse_jump_percentage, 0.1);
    }

    #[test]
    #[should_panic(expected = "called `TabooSearch::new()` with zero mutations per iteration")]
    fn zero_mutations_panics() {
        let network = ring(3);
        TabooSearch::new(
            &network,
            TabooConfig {
                mutations_per_iteration: 0,
                ..Default::default()
            },
        );
    }

    #[test]
    fn judge_tolerates_small_regressions() {
        assert_eq!(judge(11, 10, 0.0), Verdict::Improved);
        assert_eq!(judge(10, 10, 0.0), Verdict::Tolerated);
        assert_eq!(judge(95, 100, 5.0), Verdict::Tolerated);
        assert_eq!(judge(94, 100, 5.0), Verdict::Reverted);
        assert_eq!(judge(0, 1, 0.0), Verdict::Reverted);
    }

    #[test]
    fn proposals_avoid_cooling_intersections() {
        let network = ring(4);
        let schedule = random_solution(
            &network,
            PermutationStrategy::MinimumFill,
            &mut ChaCha8Rng::seed_from_u64(0),
        );
        let cooldowns = [3, 0, 5, 1];
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        for _ in 0..50 {
            let (proposal, forced) =
                propose_allowed(&network, Move::Resplit, &schedule, &cooldowns, &mut rng);
            assert_eq!(proposal.target, Some(IntersectionId::new(1)));
            assert!(!forced);
        }
    }

    #[test]
    fn escape_hatch_when_everything_is_taboo() {
        let network = ring(2);
        let schedule = random_solution(
            &network,
            PermutationStrategy::MinimumFill,
            &mut ChaCha8Rng::seed_from_u64(0),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(2);

        let (proposal, forced) =
            propose_allowed(&network, Move::Resplit, &schedule, &[1, 1], &mut rng);
        assert!(proposal.target.is_some());
        assert!(forced);
    }

    #[test]
    fn crossover_proposals_are_never_taboo() {
        let network = ring(2);
        let schedule = random_solution(
            &network,
            PermutationStrategy::MinimumFill,
            &mut ChaCha8Rng::seed_from_u64(0),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let (proposal, forced) = propose_allowed(
            &network,
            Move::Crossover { strength: 0.5 },
            &schedule,
            &[4, 4],
            &mut rng,
        );
        assert_eq!(proposal.target, None);
        assert!(!forced);
    }

    #[test]
    fn cooldown_of_one_blocks_the_next_iteration() {
        let network = ring(2);
        let schedule = random_solution(
            &network,
            PermutationStrategy::MinimumFill,
            &mut ChaCha8Rng::seed_from_u64(0),
        );
        let mut search = TabooSearch::new(
            &network,
            TabooConfig {
                random_seed: Some(4),
                ..Default::default()
            },
        );

        search.cool_down(Some(IntersectionId::new(0)), 1);
        assert_eq!(search.cooldowns(), &[1, 0]);
        for candidate in search.candidates(&schedule).unwrap() {
            assert_eq!(candidate.proposal.target, Some(IntersectionId::new(1)));
            assert!(!candidate.forced);
        }

        search.cool_down(Some(IntersectionId::new(1)), 0);
        assert_eq!(search.cooldowns(), &[0, 0]);
    }

    #[test]
    fn invalid_time_limits_give_no_deadline() {
        let now = Instant::now();
        assert_eq!(deadline_after(now, 0.0), Some(now));
        assert_eq!(deadline_after(now, 1.5), Some(now + Duration::from_millis(1500)));
        assert_eq!(deadline_after(now, -1.0), None);
        assert_eq!(deadline_after(now, f64::NAN), None);
        assert_eq!(deadline_after(now, f64::INFINITY), None);
        assert_eq!(deadline_after(now, 1e300), None);

        let network = ring(3);
        let outcome = TabooSearch::new(
            &network,
            TabooConfig {
                iterations: 5,
                random_seed: Some(2),
                time_limit_secs: Some(-1.0),
                ..Default::default()
            },
        )
        .run()
        .unwrap();
        assert!(!outcome.timed_out);
        assert_eq!(outcome.history.len(), 5);
    }

    #[test]
    fn incomplete_initial_schedule_is_rejected() {
        let network = ring(3);
        let mut search = TabooSearch::new(
            &network,
            TabooConfig {
                random_seed: Some(1),
                ..Default::default()
            },
        );
        let result = search.run_from(Schedule::new(3));
        assert_eq!(
            result.err(),
            Some(IncompleteScheduleError {
                intersection: IntersectionId::new(0)
            })
        );
    }
}
