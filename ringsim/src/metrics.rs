//! Run outcome, per-phase election log, and traffic counters.

use ringelect::NodeId;

use crate::error::FatalError;

/// Which side of the scheduled failure the run is on.
///
/// A run starts in phase A and flips to phase B the moment a node failure
/// is triggered. Leaders elected before the flip are attributed to A,
/// leaders elected after to B.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    A,
    B,
}

/// Leaders elected in each phase, in order of election.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElectionLog {
    pub phase_a: Vec<NodeId>,
    pub phase_b: Vec<NodeId>,
}

impl ElectionLog {
    pub fn record(&mut self, phase: Phase, leader: NodeId) {
        match phase {
            Phase::A => self.phase_a.push(leader),
            Phase::B => self.phase_b.push(leader),
        }
    }
}

/// Message traffic counters collected during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimMetrics {
    /// Envelopes collected from node outbound queues.
    pub messages_sent: u64,
    /// Envelopes handed to a recipient's inbound queue.
    pub messages_delivered: u64,
    /// Relay envelopes moved one hop by the router.
    pub messages_relayed: u64,
    /// Stale envelopes dropped because the recipient is gone.
    pub messages_rejected: u64,
}

/// How a simulation run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// The schedule drained and every node went quiescent.
    Completed { round: u64 },
    /// A failure split the network.
    Disconnected { round: u64, failed: NodeId },
    /// A relay envelope had no live path to its target.
    Unreachable { round: u64, from: NodeId, to: NodeId },
}

impl RunStatus {
    /// The round at which the run ended.
    pub fn round(&self) -> u64 {
        match *self {
            Self::Completed { round }
            | Self::Disconnected { round, .. }
            | Self::Unreachable { round, .. } => round,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

impl From<FatalError> for RunStatus {
    fn from(err: FatalError) -> Self {
        match err {
            FatalError::Disconnected { round, failed } => Self::Disconnected { round, failed },
            FatalError::Unreachable { round, from, to } => Self::Unreachable { round, from, to },
        }
    }
}

/// Everything a finished run reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationReport {
    pub status: RunStatus,
    /// Leaders elected before the failure, in order.
    pub elected_a: Vec<NodeId>,
    /// Leaders elected after the failure, in order.
    pub elected_b: Vec<NodeId>,
    pub metrics: SimMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_attributes_by_phase() {
        let mut log = ElectionLog::default();
        log.record(Phase::A, 5);
        log.record(Phase::B, 4);
        log.record(Phase::A, 5);

        assert_eq!(log.phase_a, vec![5, 5]);
        assert_eq!(log.phase_b, vec![4]);
    }

    #[test]
    fn test_status_round_and_conversion() {
        let status: RunStatus = FatalError::Disconnected { round: 7, failed: 2 }.into();
        assert_eq!(status, RunStatus::Disconnected { round: 7, failed: 2 });
        assert_eq!(status.round(), 7);
        assert!(!status.is_completed());
        assert!(RunStatus::Completed { round: 3 }.is_completed());
    }
}
