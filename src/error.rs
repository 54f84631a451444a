//! Errors raised while loading inputs and evaluating schedules.

use crate::IntersectionId;
use thiserror::Error;

/// A structural problem in a network or schedule description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedInputError {
    #[error("input is empty")]
    Empty,
    #[error("line {line}: expected {expected}")]
    BadRecord { line: usize, expected: &'static str },
    #[error("line {line}: `{value}` is not a valid {field}")]
    InvalidNumber {
        line: usize,
        field: &'static str,
        value: String,
    },
    #[error("declared {declared} {what} but found {found}")]
    CountMismatch {
        what: &'static str,
        declared: usize,
        found: usize,
    },
    #[error("unknown street `{0}`")]
    UnknownStreet(String),
    #[error("street `{0}` is defined more than once")]
    DuplicateStreet(String),
    #[error("street `{name}` has non-positive length {length}")]
    NonPositiveLength { name: String, length: i64 },
    #[error("intersection {id} is out of range (network has {count})")]
    UnknownIntersection { id: i64, count: usize },
    #[error("car {0} has an empty path")]
    EmptyPath(usize),
    #[error("street `{street}` does not enter intersection {intersection}")]
    ForeignStreet {
        street: String,
        intersection: IntersectionId,
    },
    #[error("street `{street}` is listed twice for intersection {intersection}")]
    RepeatedPhase {
        street: String,
        intersection: IntersectionId,
    },
    #[error("intersection {0} is scheduled more than once")]
    RepeatedIntersection(IntersectionId),
    #[error("street `{street}` has non-positive green duration {duration}")]
    NonPositiveDuration { street: String, duration: i64 },
}

/// A schedule was evaluated without a cycle for one of the network's intersections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("schedule has no cycle for intersection {intersection}")]
pub struct IncompleteScheduleError {
    /// The first intersection found without a cycle.
    pub intersection: IntersectionId,
}

/// Any error produced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed input: {0}")]
    Malformed(#[from] MalformedInputError),
    #[error(transparent)]
    IncompleteSchedule(#[from] IncompleteScheduleError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
