use crate::error::IncompleteScheduleError;
use crate::schedule::Cycle;
use crate::{CarId, IntersectionId, Network, Schedule, Score, StreetId, Time};
use serde::Serialize;
use std::collections::VecDeque;

/// A discrete-event simulation of a [Network] driven by a [Schedule].
///
/// Time advances in whole steps from 0 up to and including the network's duration.
/// Within a step cars are considered in increasing ID order, and at most one car
/// may cross each intersection.
pub struct Simulation<'a> {
    network: &'a Network,
    /// The cycle of each intersection.
    cycles: Vec<&'a Cycle>,
    /// The cars on each street, front of the queue first.
    queues: Vec<VecDeque<CarId>>,
    /// The run-local state of each car.
    cars: Vec<CarState>,
    /// The cars which have not yet arrived, in ID order.
    active: Vec<CarId>,
    /// The last time step at which a car crossed each intersection.
    last_crossing: Vec<Option<Time>>,
    /// The next time step to simulate.
    time: Time,
    /// Whether the final time step has been simulated.
    done: bool,
    /// The score accumulated so far.
    score: Score,
    /// The crossings made during the last step.
    crossings: Vec<Crossing>,
}

#[derive(Clone, Copy, Debug, Default)]
struct CarState {
    /// The index of the current street in the car's path.
    leg: usize,
    /// The earliest time at which the car may cross its next light.
    not_before: Time,
    /// The time the car reached the end of its path.
    arrival: Option<Time>,
}

/// A car crossing an intersection at a green light.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Crossing {
    pub time: Time,
    pub car: CarId,
    /// The street the car left.
    pub street: StreetId,
    pub intersection: IntersectionId,
}

/// The position of a car which is still driving.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CarPosition {
    pub car: CarId,
    pub street: StreetId,
    /// The time left before the car reaches the end of the street.
    pub remaining: Time,
}

/// A snapshot of the simulation state, sufficient to render it.
#[derive(Clone, Debug, Serialize)]
pub struct Frame<'a> {
    pub time: Time,
    /// The names of the streets with a green light.
    pub green: Vec<&'a str>,
    pub cars: Vec<CarPosition>,
    pub score: Score,
}

impl<'a> Simulation<'a> {
    /// Prepares a simulation run.
    ///
    /// Cars whose path is a single street start at their destination: they are
    /// scored on entry as arriving at time 0, without crossing any light.
    ///
    /// Fails if the schedule has no cycle for one of the network's intersections.
    pub fn new(
        network: &'a Network,
        schedule: &'a Schedule,
    ) -> Result<Self, IncompleteScheduleError> {
        let cycles = network
            .intersections()
            .map(|intersection| {
                schedule
                    .cycle(intersection.id())
                    .ok_or(IncompleteScheduleError {
                        intersection: intersection.id(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut sim = Self {
            network,
            cycles,
            queues: vec![VecDeque::new(); network.num_streets()],
            cars: vec![CarState::default(); network.num_cars()],
            active: Vec::with_capacity(network.num_cars()),
            last_crossing: vec![None; network.num_intersections()],
            time: 0,
            done: false,
            score: 0,
            crossings: vec![],
        };

        for car in network.cars() {
            if let [street, _, ..] = car.path() {
                sim.queues[street.index()].push_back(car.id());
                sim.active.push(car.id());
            } else {
                // Already at the end of its only street
                sim.cars[car.id().index()].arrival = Some(0);
                sim.score += reward(network, 0);
            }
        }

        Ok(sim)
    }

    /// Gets the next time step to be simulated.
    pub fn time(&self) -> Time {
        self.time
    }

    /// Gets the score accumulated so far.
    pub fn score(&self) -> Score {
        self.score
    }

    /// Whether every time step up to the duration has been simulated.
    pub fn is_finished(&self) -> bool {
        self.done
    }

    /// Gets the time a car reached its destination, if it has.
    pub fn arrival(&self, car: CarId) -> Option<Time> {
        self.cars[car.index()].arrival
    }

    /// Returns an iterator over the cars which are still driving.
    pub fn active_cars(&self) -> impl Iterator<Item = CarId> + '_ {
        self.active.iter().copied()
    }

    /// Gets the street which is green at an intersection at the next time step.
    pub fn green_street(&self, intersection: IntersectionId) -> Option<StreetId> {
        self.cycles[intersection.index()].green_at(self.time)
    }

    /// Simulates a single time step, returning the crossings made.
    pub fn step(&mut self) -> &[Crossing] {
        self.crossings.clear();
        if self.done {
            return &self.crossings;
        }

        let t = self.time;
        let network = self.network;
        let mut any_arrived = false;

        for &car_id in &self.active {
            let state = &mut self.cars[car_id.index()];
            if state.not_before > t {
                continue;
            }
            let path = network.car(car_id).path();
            let street = path[state.leg];
            if self.queues[street.index()].front() != Some(&car_id) {
                continue;
            }
            let intersection = network.controlling_intersection(street);
            if self.cycles[intersection.index()].green_at(t) != Some(street) {
                continue;
            }
            let last_crossing = &mut self.last_crossing[intersection.index()];
            if *last_crossing == Some(t) {
                continue;
            }

            *last_crossing = Some(t);
            self.queues[street.index()].pop_front();
            self.crossings.push(Crossing {
                time: t,
                car: car_id,
                street,
                intersection,
            });

            state.leg += 1;
            let next = path[state.leg];
            let reach_end = t.saturating_add(network.street(next).length());
            if state.leg + 1 == path.len() {
                // Cars leave the network as soon as they reach the end of their path
                state.arrival = Some(reach_end);
                any_arrived = true;
                self.score += reward(network, reach_end);
            } else {
                self.queues[next.index()].push_back(car_id);
                state.not_before = reach_end;
            }
        }

        if any_arrived {
            let cars = &self.cars;
            self.active.retain(|id| cars[id.index()].arrival.is_none());
        }

        if t >= self.network.duration() {
            self.done = true;
        } else {
            self.time += 1;
        }

        &self.crossings
    }

    /// Captures the state of the simulation before the next time step.
    pub fn frame(&self) -> Frame<'a> {
        let network = self.network;
        let green = self
            .cycles
            .iter()
            .filter_map(|cycle| cycle.green_at(self.time))
            .map(|street| network.street(street).name())
            .collect();
        let cars = self
            .active
            .iter()
            .map(|car_id| {
                let state = &self.cars[car_id.index()];
                CarPosition {
                    car: *car_id,
                    street: network.car(*car_id).path()[state.leg],
                    remaining: state.not_before.saturating_sub(self.time),
                }
            })
            .collect();
        Frame {
            time: self.time,
            green,
            cars,
            score: self.score,
        }
    }

    /// Simulates every remaining time step and returns the final score.
    pub fn run(mut self) -> Score {
        while !self.done {
            self.step();
        }
        self.score
    }
}

/// The score of a car reaching its destination at `arrival`.
fn reward(network: &Network, arrival: Time) -> Score {
    match network.duration().checked_sub(arrival) {
        Some(early) => Score::from(network.bonus()) + Score::from(early),
        None => 0,
    }
}

/// Scores a schedule by simulating the network to the end of its duration.
pub fn evaluate(network: &Network, schedule: &Schedule) -> Result<Score, IncompleteScheduleError> {
    Ok(Simulation::new(network, schedule)?.run())
}
