//! Scheduled scenario events, keyed by round number.

use hashbrown::HashMap;
use ringelect::NodeId;
use tracing::warn;

/// Rounds at which elections start and nodes fail.
///
/// Elections accumulate per round; at most one failure can be scheduled per
/// round, and a later failure scheduled for the same round replaces the
/// earlier one.
#[derive(Debug, Default)]
pub struct EventSchedule {
    elections: HashMap<u64, Vec<NodeId>>,
    failures: HashMap<u64, NodeId>,
}

impl EventSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `node` to start an election at `round`.
    pub fn elect_at(&mut self, round: u64, node: NodeId) {
        self.elections.entry(round).or_default().push(node);
    }

    /// Schedule `node` to fail at `round`.
    pub fn fail_at(&mut self, round: u64, node: NodeId) {
        if let Some(previous) = self.failures.insert(round, node) {
            warn!(round, previous, node, "replacing scheduled failure");
        }
    }

    /// Remove and return the elections scheduled for `round`.
    pub fn take_elections(&mut self, round: u64) -> Vec<NodeId> {
        self.elections.remove(&round).unwrap_or_default()
    }

    /// Remove and return the failure scheduled for `round`, if any.
    pub fn take_failure(&mut self, round: u64) -> Option<NodeId> {
        self.failures.remove(&round)
    }

    /// True once every scheduled event has been taken.
    pub fn is_empty(&self) -> bool {
        self.elections.is_empty() && self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elections_accumulate_per_round() {
        let mut schedule = EventSchedule::new();
        schedule.elect_at(3, 1);
        schedule.elect_at(3, 4);
        schedule.elect_at(5, 2);

        assert_eq!(schedule.take_elections(3), vec![1, 4]);
        assert_eq!(schedule.take_elections(3), Vec::<NodeId>::new());
        assert!(!schedule.is_empty());
        assert_eq!(schedule.take_elections(5), vec![2]);
        assert!(schedule.is_empty());
    }

    #[test]
    fn test_later_failure_replaces_earlier() {
        let mut schedule = EventSchedule::new();
        schedule.fail_at(10, 2);
        schedule.fail_at(10, 3);

        assert_eq!(schedule.take_failure(10), Some(3));
        assert_eq!(schedule.take_failure(10), None);
        assert!(schedule.is_empty());
    }
}
