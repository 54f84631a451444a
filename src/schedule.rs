use crate::error::IncompleteScheduleError;
use crate::{IntersectionId, Network, StreetId, Time};
use std::sync::Arc;

/// A single green phase: one street is green for `duration` consecutive slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Phase {
    pub street: StreetId,
    pub duration: Time,
}

/// The repeating sequence of green lights at one intersection.
///
/// A cycle with no phases keeps every light at the intersection red.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cycle {
    /// The phases, none of which has a zero duration.
    phases: Vec<Phase>,
    /// The exclusive end slot of each phase.
    ends: Vec<Time>,
}

/// A green light schedule for every intersection of a network.
///
/// Cycles are shared between clones and replaced wholesale when altered,
/// so cloning a schedule only copies one pointer per intersection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Schedule {
    cycles: Vec<Option<Arc<Cycle>>>,
}

impl Cycle {
    /// Creates a cycle from its phases, dropping phases with no green time.
    pub fn new(phases: impl IntoIterator<Item = Phase>) -> Self {
        let phases: Vec<_> = phases
            .into_iter()
            .filter(|phase| phase.duration > 0)
            .collect();
        let ends = phases
            .iter()
            .scan(0, |end, phase| {
                *end += phase.duration;
                Some(*end)
            })
            .collect();
        Self { phases, ends }
    }

    /// Creates a cycle which gives `durations[i]` slots to `streets[i]`, in order.
    pub fn from_durations(streets: &[StreetId], durations: &[Time]) -> Self {
        debug_assert_eq!(streets.len(), durations.len());
        Self::new(
            streets
                .iter()
                .zip(durations)
                .map(|(street, duration)| Phase {
                    street: *street,
                    duration: *duration,
                }),
        )
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Gets the number of slots in the cycle.
    pub fn length(&self) -> Time {
        self.ends.last().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Gets the street which is green at time `t`, if any.
    #[inline]
    pub fn green_at(&self, t: Time) -> Option<StreetId> {
        let length = self.length();
        if length == 0 {
            return None;
        }
        let slot = t % length;
        let idx = self.ends.partition_point(|end| *end <= slot);
        self.phases.get(idx).map(|phase| phase.street)
    }

    /// Gets the number of slots in which the street is green.
    pub fn green_duration(&self, street: StreetId) -> Time {
        self.phases
            .iter()
            .filter(|phase| phase.street == street)
            .map(|phase| phase.duration)
            .sum()
    }

    /// Returns an iterator over the green street of every slot in the cycle.
    pub fn slots(&self) -> impl Iterator<Item = StreetId> + '_ {
        self.phases
            .iter()
            .flat_map(|phase| std::iter::repeat(phase.street).take(phase.duration as usize))
    }
}

impl Schedule {
    /// Creates a schedule with no cycles for `num_intersections` intersections.
    pub fn new(num_intersections: usize) -> Self {
        Self {
            cycles: vec![None; num_intersections],
        }
    }

    /// Gets the number of intersections this schedule has room for.
    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    /// Gets the cycle of an intersection, if it has been scheduled.
    pub fn cycle(&self, id: IntersectionId) -> Option<&Cycle> {
        self.cycles.get(id.index())?.as_deref()
    }

    /// Replaces the cycle of an intersection.
    pub fn set_cycle(&mut self, id: IntersectionId, cycle: Cycle) {
        self.set_shared(id, Some(Arc::new(cycle)));
    }

    /// Returns an iterator over the scheduled intersections and their cycles, in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (IntersectionId, &Cycle)> {
        self.cycles.iter().enumerate().filter_map(|(idx, cycle)| {
            cycle
                .as_deref()
                .map(|cycle| (IntersectionId::new(idx as u32), cycle))
        })
    }

    /// Gets the number of slots in which a street is green at an intersection.
    pub fn green_duration(&self, intersection: IntersectionId, street: StreetId) -> Time {
        self.cycle(intersection)
            .map(|cycle| cycle.green_duration(street))
            .unwrap_or(0)
    }

    /// Checks that every intersection of the network has a cycle.
    pub fn check_complete(&self, network: &Network) -> Result<(), IncompleteScheduleError> {
        let missing = (0..network.num_intersections())
            .find(|idx| self.cycles.get(*idx).map_or(true, Option::is_none));
        match missing {
            Some(idx) => Err(IncompleteScheduleError {
                intersection: IntersectionId::new(idx as u32),
            }),
            None => Ok(()),
        }
    }

    pub(crate) fn shared(&self, id: IntersectionId) -> Option<Arc<Cycle>> {
        self.cycles.get(id.index()).cloned().flatten()
    }

    pub(crate) fn set_shared(&mut self, id: IntersectionId, cycle: Option<Arc<Cycle>>) {
        if self.cycles.len() <= id.index() {
            self.cycles.resize(id.index() + 1, None);
        }
        self.cycles[id.index()] = cycle;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn street(idx: u32) -> StreetId {
        StreetId::new(idx)
    }

    #[test]
    fn cycle_wraps_around() {
        let cycle = Cycle::from_durations(&[street(0), street(1), street(2)], &[2, 0, 1]);

        assert_eq!(cycle.length(), 3);
        assert_eq!(cycle.phases().len(), 2);
        let greens: Vec<_> = (0..7).map(|t| cycle.green_at(t)).collect();
        assert_eq!(
            greens,
            [0, 0, 2, 0, 0, 2, 0].map(|idx| Some(street(idx)))
        );
    }

    #[test]
    fn slots_match_durations() {
        let cycle = Cycle::from_durations(&[street(4), street(7)], &[3, 2]);
        let slots: Vec<_> = cycle.slots().collect();

        assert_eq!(slots.len() as Time, cycle.length());
        assert_eq!(slots.iter().filter(|s| **s == street(4)).count(), 3);
        assert_eq!(cycle.green_duration(street(7)), 2);
        assert_eq!(cycle.green_duration(street(9)), 0);
    }

    #[test]
    fn empty_cycle_is_always_red() {
        let cycle = Cycle::from_durations(&[street(0)], &[0]);
        assert!(cycle.is_empty());
        assert_eq!(cycle.green_at(0), None);
        assert_eq!(cycle.green_at(12), None);
    }

    #[test]
    fn clones_share_cycles_until_replaced() {
        let mut schedule = Schedule::new(2);
        schedule.set_cycle(IntersectionId::new(0), Cycle::from_durations(&[street(0)], &[1]));

        let mut copy = schedule.clone();
        copy.set_cycle(IntersectionId::new(0), Cycle::from_durations(&[street(0)], &[5]));

        assert_eq!(
            schedule.green_duration(IntersectionId::new(0), street(0)),
            1
        );
        assert_eq!(copy.green_duration(IntersectionId::new(0), street(0)), 5);
        assert_eq!(schedule.iter().count(), 1);
    }
}
