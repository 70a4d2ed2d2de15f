#![forbid(unsafe_code)]
//! ringsim - Round-based network simulator for ring leader election.
//!
//! This crate runs the `ringelect` protocol over a simulated network: a
//! ring of node actors with optional chordal shortcuts, a round scheduler
//! that moves messages between them, and a scenario schedule that starts
//! elections and fails nodes at chosen rounds.
//!
//! # Features
//!
//! - **Node actors**: every node runs its state machine behind a task
//! - **Round scheduler**: per-round collect, deliver, trigger stages with
//!   a one-envelope-per-recipient cap
//! - **Failure and repair**: a failed node is cut out, the ring stitched
//!   shut, and a fresh election started automatically
//! - **Relay routing**: traffic across severed ring links is re-routed
//!   hop by hop with a breadth-first search
//! - **Scenario builder**: declarative layouts and event schedules
//!
//! # Example
//!
//! ```
//! use ringsim::ScenarioBuilder;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! # tokio::time::pause();
//! let report = ScenarioBuilder::ring(3)
//!     .elect_at(0, [1])
//!     .run()
//!     .await;
//!
//! // The highest id always wins.
//! assert!(report.status.is_completed());
//! assert_eq!(report.elected_a, vec![3]);
//! # }
//! ```
//!
//! # Architecture
//!
//! The scheduler owns the topology and ticks rounds on a timer. Each round:
//! 1. Collect outbound envelopes from every node, in load order
//! 2. Deliver direct envelopes, route relay envelopes one hop
//! 3. Trigger this round's scheduled elections and failure
//!
//! Actor tasks drain their inbound queues between rounds and report
//! election wins over a channel. The run ends when the schedule is drained
//! and every node is quiescent.

pub mod actor;
pub mod error;
pub mod event;
pub mod metrics;
pub mod scenario;
pub mod sim;
pub mod topology;

pub use actor::SimNode;
pub use error::{FatalError, RepairError};
pub use event::EventSchedule;
pub use metrics::{ElectionLog, Phase, RunStatus, SimMetrics, SimulationReport};
pub use ringelect::{Envelope, Node, NodeId, ParseError, ProtocolMessage};
pub use scenario::ScenarioBuilder;
pub use sim::{Simulator, DEFAULT_ROUND_PERIOD};
pub use topology::{NodeSpec, Topology};

#[cfg(test)]
mod tests {
    use super::*;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_election_highest_id_wins() {
        init_tracing();
        let report = ScenarioBuilder::ring(3).elect_at(0, [1]).run().await;

        assert!(report.status.is_completed());
        assert_eq!(report.elected_a, vec![3]);
        assert!(report.elected_b.is_empty());
        assert_eq!(report.metrics.messages_relayed, 0);
        assert_eq!(report.metrics.messages_rejected, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_triggers_elect_one_leader() {
        let report = ScenarioBuilder::ring(5).elect_at(0, 1..=5).run().await;

        assert!(report.status.is_completed());
        assert_eq!(report.elected_a, vec![5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_trigger_is_harmless() {
        let report = ScenarioBuilder::ring(3).elect_at(0, [1, 1]).run().await;

        assert!(report.status.is_completed());
        assert_eq!(report.elected_a, vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chordal_edges_do_not_disturb_election() {
        let report = ScenarioBuilder::ring(6)
            .chord(1, 4)
            .chord(2, 5)
            .elect_at(0, [3])
            .run()
            .await;

        assert!(report.status.is_completed());
        assert_eq!(report.elected_a, vec![6]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_triggers_repair_and_reelection() {
        init_tracing();
        let report = ScenarioBuilder::ring(3)
            .elect_at(0, [1])
            .fail_at(10, 2)
            .run()
            .await;

        assert!(report.status.is_completed());
        assert_eq!(report.elected_a, vec![3]);
        assert_eq!(report.elected_b, vec![3]);
        assert_eq!(report.metrics.messages_rejected, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_relay_crosses_severed_link_with_hops() {
        // In a 5-ring with node 2 gone, node 1's successor (3) is not
        // adjacent, so re-election traffic must be carried hop by hop.
        let report = ScenarioBuilder::ring(5)
            .elect_at(0, [1])
            .fail_at(15, 2)
            .run()
            .await;

        assert!(report.status.is_completed());
        assert_eq!(report.elected_a, vec![5]);
        assert_eq!(report.elected_b, vec![5]);
        assert!(report.metrics.messages_relayed > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leader_failure_elects_survivor() {
        let report = ScenarioBuilder::ring(3)
            .elect_at(0, [1])
            .fail_at(10, 3)
            .run()
            .await;

        assert!(report.status.is_completed());
        assert_eq!(report.elected_a, vec![3]);
        assert_eq!(report.elected_b, vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_without_prior_election() {
        let report = ScenarioBuilder::ring(3).fail_at(5, 2).run().await;

        assert!(report.status.is_completed());
        assert!(report.elected_a.is_empty());
        assert_eq!(report.elected_b, vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_failure_disconnects_plain_ring() {
        let report = ScenarioBuilder::ring(4)
            .elect_at(0, [1])
            .fail_at(10, 2)
            .fail_at(30, 4)
            .run()
            .await;

        assert_eq!(
            report.status,
            RunStatus::Disconnected {
                round: 30,
                failed: 4,
            }
        );
        assert_eq!(report.elected_a, vec![4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chord_survives_second_failure() {
        // The 1-3 chord keeps the survivors connected after both ring
        // neighbours of node 1 are gone.
        let report = ScenarioBuilder::ring(4)
            .chord(1, 3)
            .elect_at(0, [1])
            .fail_at(10, 2)
            .fail_at(30, 4)
            .run()
            .await;

        assert!(report.status.is_completed());
        assert_eq!(report.elected_a, vec![4]);
        assert_eq!(report.elected_b.last(), Some(&3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_schedule_completes_immediately() {
        let report = ScenarioBuilder::ring(3).run().await;

        assert_eq!(report.status, RunStatus::Completed { round: 0 });
        assert!(report.elected_a.is_empty());
        assert_eq!(report.metrics.messages_sent, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_node_ring() {
        let report = ScenarioBuilder::ring(1).elect_at(0, [1]).run().await;

        assert!(report.status.is_completed());
        assert_eq!(report.elected_a, vec![1]);
        assert_eq!(report.metrics.messages_sent, 0);
    }
}
