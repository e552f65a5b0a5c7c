//! In-process progress channel.
//!
//! The orchestrator task produces events; the SSE writer consumes them.
//! Single producer, single consumer, bounded. Detach semantics: when the
//! consumer goes away the producer keeps running and further emits become
//! no-ops; a terminal event is the sentinel after which nothing follows.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use adreel_models::AdEvent;

/// Bounded queue depth between the orchestrator and the SSE writer.
const PROGRESS_BUFFER_SIZE: usize = 64;

/// Create a connected progress channel pair.
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::channel(PROGRESS_BUFFER_SIZE);
    (
        ProgressSender {
            tx,
            detached: Arc::new(AtomicBool::new(false)),
            terminated: Arc::new(AtomicBool::new(false)),
        },
        ProgressReceiver { rx },
    )
}

/// Producer half, owned by the orchestrator task.
#[derive(Clone)]
pub struct ProgressSender {
    tx: mpsc::Sender<AdEvent>,
    detached: Arc<AtomicBool>,
    terminated: Arc<AtomicBool>,
}

impl ProgressSender {
    /// Emit an event.
    ///
    /// Blocks only for queue backpressure, never on a dead consumer: once
    /// the receiver is dropped the sender marks itself detached and later
    /// emits return immediately. After a terminal event every further emit
    /// is dropped, preserving the nothing-after-terminal contract.
    pub async fn emit(&self, event: AdEvent) {
        if self.terminated.load(Ordering::SeqCst) {
            debug!("Dropping event after terminal: {}", event.name());
            return;
        }
        if event.is_terminal() {
            self.terminated.store(true, Ordering::SeqCst);
        }
        if self.detached.load(Ordering::SeqCst) {
            return;
        }

        // try_send first; fall back to an awaited send for backpressure
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                if self.tx.send(event).await.is_err() {
                    self.detached.store(true, Ordering::SeqCst);
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Progress consumer gone, detaching");
                self.detached.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Whether a terminal event has been emitted.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}

/// Consumer half, owned by the SSE writer.
pub struct ProgressReceiver {
    rx: mpsc::Receiver<AdEvent>,
}

impl ProgressReceiver {
    /// Receive the next event. `None` when the producer is gone.
    pub async fn recv(&mut self) -> Option<AdEvent> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adreel_models::JobId;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (tx, mut rx) = progress_channel();
        tx.emit(AdEvent::planning_started()).await;
        tx.emit(AdEvent::planning_complete(2)).await;
        tx.emit(AdEvent::clip_completed(1, 2)).await;

        assert_eq!(rx.recv().await.unwrap().name(), "step1");
        assert_eq!(rx.recv().await.unwrap().name(), "step1_complete");
        assert_eq!(rx.recv().await.unwrap().name(), "step2_clip");
    }

    #[tokio::test]
    async fn test_nothing_follows_a_terminal_event() {
        let (tx, mut rx) = progress_channel();
        tx.emit(AdEvent::error("boom")).await;
        tx.emit(AdEvent::clip_completed(1, 2)).await;
        tx.emit(AdEvent::complete(JobId::from_string("j"), "url")).await;

        assert_eq!(rx.recv().await.unwrap().name(), "error");
        drop(tx);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_consumer_death_does_not_block_producer() {
        let (tx, rx) = progress_channel();
        drop(rx);

        // Emits become no-ops; none of these may hang or panic
        for _ in 0..200 {
            tx.emit(AdEvent::clip_completed(1, 5)).await;
        }
        tx.emit(AdEvent::complete(JobId::from_string("j"), "url")).await;
        assert!(tx.is_terminated());
    }
}
