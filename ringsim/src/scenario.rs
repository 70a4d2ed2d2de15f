//! Declarative scenario construction.

use std::time::Duration;

use ringelect::NodeId;
use tracing::warn;

use crate::event::EventSchedule;
use crate::metrics::SimulationReport;
use crate::sim::{Simulator, DEFAULT_ROUND_PERIOD};
use crate::topology::NodeSpec;

/// Builder for a network layout plus a schedule of scenario events.
///
/// ```
/// use ringsim::ScenarioBuilder;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// # tokio::time::pause();
/// let report = ScenarioBuilder::ring(4)
///     .chord(1, 3)
///     .elect_at(0, [2])
///     .run()
///     .await;
/// assert_eq!(report.elected_a, vec![4]);
/// # }
/// ```
#[derive(Debug)]
pub struct ScenarioBuilder {
    specs: Vec<NodeSpec>,
    schedule: EventSchedule,
    period: Duration,
}

impl ScenarioBuilder {
    /// A plain ring of `n` nodes with ids `1..=n` in ring order.
    pub fn ring(n: u32) -> Self {
        Self::from_specs((1..=n).map(|id| NodeSpec::new(id, [])).collect())
    }

    /// An arbitrary layout: ring order follows the spec order.
    pub fn from_specs(specs: Vec<NodeSpec>) -> Self {
        Self {
            specs,
            schedule: EventSchedule::new(),
            period: DEFAULT_ROUND_PERIOD,
        }
    }

    /// Add a chordal edge between `a` and `b` on top of the ring.
    pub fn chord(mut self, a: NodeId, b: NodeId) -> Self {
        match self.specs.iter_mut().find(|s| s.id == a) {
            Some(spec) => spec.neighbours.push(b),
            None => warn!(a, b, "chord endpoint not in layout"),
        }
        self
    }

    /// Schedule `nodes` to start elections at `round`.
    pub fn elect_at(mut self, round: u64, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        for node in nodes {
            self.schedule.elect_at(round, node);
        }
        self
    }

    /// Schedule `node` to fail at `round`.
    pub fn fail_at(mut self, round: u64, node: NodeId) -> Self {
        self.schedule.fail_at(round, node);
        self
    }

    /// Override the wall-clock duration of one round.
    pub fn period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Build the simulator. Must be called within a Tokio runtime.
    pub fn build(self) -> Simulator {
        Simulator::with_period(&self.specs, self.schedule, self.period)
    }

    /// Build and run the scenario to completion.
    pub async fn run(self) -> SimulationReport {
        self.build().run().await
    }
}
