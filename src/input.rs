//! Reading networks and schedules from their text encoding, and writing schedules back.
//!
//! A network starts with a `duration intersections streets cars bonus` header,
//! followed by one `start end name length` line per street and one
//! `count name...` line per car. A schedule starts with the number of scheduled
//! intersections; each then has a line with its ID, a line with its number of
//! green phases and one `name duration` line per phase.

use crate::error::{Error, MalformedInputError};
use crate::{Cycle, IntersectionId, Network, Phase, Schedule};
use itertools::Itertools;
use log::info;
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

/// Non-blank lines, paired with their 1-based line numbers.
struct Records<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
}

impl<'a> Records<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
        }
    }

    fn next_record(&mut self) -> Option<(usize, &'a str)> {
        self.lines
            .by_ref()
            .map(|(idx, line)| (idx + 1, line.trim()))
            .find(|(_, line)| !line.is_empty())
    }

    /// Counts the records left.
    fn remaining(mut self) -> usize {
        std::iter::from_fn(|| self.next_record()).count()
    }
}

fn number<T: FromStr>(
    line: usize,
    field: &'static str,
    value: &str,
) -> Result<T, MalformedInputError> {
    value
        .parse()
        .map_err(|_| MalformedInputError::InvalidNumber {
            line,
            field,
            value: value.to_owned(),
        })
}

fn intersection_id(value: i64, count: usize) -> Result<u32, MalformedInputError> {
    u32::try_from(value)
        .ok()
        .filter(|id| (*id as usize) < count)
        .ok_or(MalformedInputError::UnknownIntersection { id: value, count })
}

/// Parses a network description.
pub fn parse_network(text: &str) -> Result<Network, MalformedInputError> {
    let mut records = Records::new(text);
    let (line, header) = records.next_record().ok_or(MalformedInputError::Empty)?;
    let (duration, num_intersections, num_streets, num_cars, bonus) = header
        .split_whitespace()
        .collect_tuple()
        .ok_or(MalformedInputError::BadRecord {
            line,
            expected: "`duration intersections streets cars bonus`",
        })?;
    let duration = number(line, "duration", duration)?;
    let num_intersections: usize = number(line, "intersection count", num_intersections)?;
    let num_streets: usize = number(line, "street count", num_streets)?;
    let num_cars: usize = number(line, "car count", num_cars)?;
    let bonus = number(line, "bonus", bonus)?;

    let mut builder = Network::builder(duration, num_intersections, bonus);

    for _ in 0..num_streets {
        let (line, record) = records
            .next_record()
            .ok_or(MalformedInputError::CountMismatch {
                what: "streets",
                declared: num_streets,
                found: builder.num_streets(),
            })?;
        let (start, end, name, length) = record.split_whitespace().collect_tuple().ok_or(
            MalformedInputError::BadRecord {
                line,
                expected: "`start end name length`",
            },
        )?;
        let start = intersection_id(number(line, "intersection", start)?, num_intersections)?;
        let end = intersection_id(number(line, "intersection", end)?, num_intersections)?;
        let length: i64 = number(line, "street length", length)?;
        if length <= 0 {
            return Err(MalformedInputError::NonPositiveLength {
                name: name.to_owned(),
                length,
            });
        }
        let length = u32::try_from(length).map_err(|_| MalformedInputError::InvalidNumber {
            line,
            field: "street length",
            value: length.to_string(),
        })?;
        builder.add_street(name, start, end, length)?;
    }

    for _ in 0..num_cars {
        let (line, record) = records
            .next_record()
            .ok_or(MalformedInputError::CountMismatch {
                what: "cars",
                declared: num_cars,
                found: builder.num_cars(),
            })?;
        let mut fields = record.split_whitespace();
        let declared: usize = fields
            .next()
            .ok_or(MalformedInputError::BadRecord {
                line,
                expected: "`count name...`",
            })
            .and_then(|count| number(line, "path length", count))?;
        let path: Vec<&str> = fields.collect();
        if path.len() != declared {
            return Err(MalformedInputError::CountMismatch {
                what: "streets in car path",
                declared,
                found: path.len(),
            });
        }
        builder.add_car(&path)?;
    }

    let extra = records.remaining();
    if extra > 0 {
        return Err(MalformedInputError::CountMismatch {
            what: "street and car records",
            declared: num_streets + num_cars,
            found: num_streets + num_cars + extra,
        });
    }

    Ok(builder.build())
}

/// Parses a schedule for the given network.
///
/// Intersections missing from the text are left without a cycle.
pub fn parse_schedule(network: &Network, text: &str) -> Result<Schedule, MalformedInputError> {
    let mut records = Records::new(text);
    let (line, count) = records.next_record().ok_or(MalformedInputError::Empty)?;
    let declared: usize = number(line, "intersection count", count)?;

    let mut schedule = Schedule::new(network.num_intersections());
    for scheduled in 0..declared {
        let missing = MalformedInputError::CountMismatch {
            what: "scheduled intersections",
            declared,
            found: scheduled,
        };
        let (line, id) = records.next_record().ok_or_else(|| missing.clone())?;
        let id = IntersectionId::new(intersection_id(
            number(line, "intersection", id)?,
            network.num_intersections(),
        )?);
        if schedule.cycle(id).is_some() {
            return Err(MalformedInputError::RepeatedIntersection(id));
        }

        let (line, num_phases) = records.next_record().ok_or(missing)?;
        let num_phases: usize = number(line, "phase count", num_phases)?;
        let mut phases = Vec::with_capacity(num_phases);
        let mut seen = HashSet::new();
        for found in 0..num_phases {
            let (line, record) = records
                .next_record()
                .ok_or(MalformedInputError::CountMismatch {
                    what: "phases",
                    declared: num_phases,
                    found,
                })?;
            let (name, duration) = record.split_whitespace().collect_tuple().ok_or(
                MalformedInputError::BadRecord {
                    line,
                    expected: "`name duration`",
                },
            )?;
            let street = network
                .street_by_name(name)
                .ok_or_else(|| MalformedInputError::UnknownStreet(name.to_owned()))?;
            if street.end() != id {
                return Err(MalformedInputError::ForeignStreet {
                    street: name.to_owned(),
                    intersection: id,
                });
            }
            if !seen.insert(street.id()) {
                return Err(MalformedInputError::RepeatedPhase {
                    street: name.to_owned(),
                    intersection: id,
                });
            }
            let duration: i64 = number(line, "green duration", duration)?;
            let duration = u32::try_from(duration)
                .ok()
                .filter(|duration| *duration > 0)
                .ok_or(MalformedInputError::NonPositiveDuration {
                    street: name.to_owned(),
                    duration,
                })?;
            phases.push(Phase {
                street: street.id(),
                duration,
            });
        }
        schedule.set_cycle(id, Cycle::new(phases));
    }

    let extra = records.remaining();
    if extra > 0 {
        return Err(MalformedInputError::CountMismatch {
            what: "schedule records",
            declared,
            found: declared + extra,
        });
    }

    Ok(schedule)
}

/// Writes every cycle of a schedule, in intersection order.
pub fn write_schedule<W: Write>(
    network: &Network,
    schedule: &Schedule,
    mut out: W,
) -> std::io::Result<()> {
    let cycles = schedule
        .iter()
        .filter(|(id, _)| id.index() < network.num_intersections())
        .collect_vec();
    writeln!(out, "{}", cycles.len())?;
    for (id, cycle) in cycles {
        writeln!(out, "{}", id)?;
        writeln!(out, "{}", cycle.phases().len())?;
        for phase in cycle.phases() {
            writeln!(
                out,
                "{} {}",
                network.street(phase.street).name(),
                phase.duration
            )?;
        }
    }
    out.flush()
}

/// Reads and parses a network file.
pub fn load_network(path: impl AsRef<Path>) -> Result<Network, Error> {
    let path = path.as_ref();
    let network = parse_network(&std::fs::read_to_string(path)?)?;
    info!(
        "loaded {}: {} intersections, {} streets, {} cars, duration {}",
        path.display(),
        network.num_intersections(),
        network.num_streets(),
        network.num_cars(),
        network.duration()
    );
    Ok(network)
}

/// Reads and parses a schedule file for the given network.
pub fn load_schedule(network: &Network, path: impl AsRef<Path>) -> Result<Schedule, Error> {
    Ok(parse_schedule(network, &std::fs::read_to_string(path)?)?)
}
