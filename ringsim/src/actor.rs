//! Node actors: each protocol state machine runs behind a task.
//!
//! A [`SimNode`] wraps a [`ringelect::Node`] in shared state plus a spawned
//! task. The scheduler delivers messages and wakes the actor; the task
//! drains the inbound queue and reports any election win over a channel.
//! Outbound envelopes stay queued in the node until the scheduler collects
//! them at the start of the next round.

use std::sync::Arc;

use parking_lot::Mutex;
use ringelect::{Node, NodeId};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::debug;

/// Handle to one simulated node and its processing task.
#[derive(Debug)]
pub struct SimNode {
    state: Arc<Mutex<Node>>,
    wake: Arc<Notify>,
    task: JoinHandle<()>,
}

impl SimNode {
    /// Spawn the actor task for `node`, reporting election wins on
    /// `elected_tx`.
    pub fn spawn(node: Node, elected_tx: mpsc::UnboundedSender<NodeId>) -> Self {
        let state = Arc::new(Mutex::new(node));
        let wake = Arc::new(Notify::new());

        let task_state = Arc::clone(&state);
        let task_wake = Arc::clone(&wake);
        let task = tokio::spawn(async move {
            loop {
                task_wake.notified().await;
                let elected = task_state.lock().process_inbound();
                for winner in elected {
                    if elected_tx.send(winner).is_err() {
                        debug!(winner, "election report channel closed");
                        return;
                    }
                }
            }
        });

        Self { state, wake, task }
    }

    /// Lock the protocol state. Held only for short, non-await sections.
    pub fn lock(&self) -> parking_lot::MutexGuard<'_, Node> {
        self.state.lock()
    }

    /// Ask the actor task to process its inbound queue.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Stop the actor task.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for SimNode {
    fn drop(&mut self) {
        self.task.abort();
    }
}
