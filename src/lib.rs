pub use error::{Error, IncompleteScheduleError, MalformedInputError};
pub use input::{load_network, load_schedule, parse_network, parse_schedule, write_schedule};
pub use mutation::{
    mix_solutions, mutate_intersection, mutate_schedule, mutate_single_street, random_solution,
    Move, Proposal,
};
pub use network::{Car, Intersection, Network, NetworkBuilder, Street};
pub use permutation::PermutationStrategy;
pub use schedule::{Cycle, Phase, Schedule};
pub use simulation::{evaluate, CarPosition, Crossing, Frame, Simulation};
pub use taboo::{IterationRecord, SearchOutcome, TabooConfig, TabooSearch};

mod error;
mod input;
mod mutation;
mod network;
pub mod permutation;
mod schedule;
mod simulation;
mod taboo;

/// A simulation time, in whole time units.
pub type Time = u32;

/// A simulation score.
pub type Score = u64;

macro_rules! id_type {
    ($(#[$outer:meta])* $name:ident) => {
        $(#[$outer])*
        #[derive(
            Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a dense index.
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            /// Gets the dense index of this ID.
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type! {
    /// Unique ID of a [Street].
    StreetId
}

id_type! {
    /// Unique ID of an [Intersection].
    IntersectionId
}

id_type! {
    /// Unique ID of a [Car].
    CarId
}
