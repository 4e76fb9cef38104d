//! In-memory FIFO between the pipeline and the forwarder.
//!
//! Unbounded by default: a slow forwarder grows memory instead of blocking
//! consumption. With a capacity, a full queue suspends the pipeline until
//! the forwarder catches up.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;

use buckit_core::emit;
use buckit_core::metrics::events::HandoffDepth;

use crate::envelope::ResultRecord;

enum Tx {
    Bounded(mpsc::Sender<ResultRecord>),
    Unbounded(mpsc::UnboundedSender<ResultRecord>),
}

enum Rx {
    Bounded(mpsc::Receiver<ResultRecord>),
    Unbounded(mpsc::UnboundedReceiver<ResultRecord>),
}

/// Producing half, owned by the pipeline.
pub struct HandoffSender {
    tx: Tx,
    depth: Arc<AtomicUsize>,
}

/// Consuming half, owned by the forwarder.
pub struct HandoffReceiver {
    rx: Rx,
    depth: Arc<AtomicUsize>,
}

/// Create a hand-off queue; `None` means unbounded.
pub fn channel(capacity: Option<usize>) -> (HandoffSender, HandoffReceiver) {
    let depth = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = match capacity {
        Some(capacity) => {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            (Tx::Bounded(tx), Rx::Bounded(rx))
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (Tx::Unbounded(tx), Rx::Unbounded(rx))
        }
    };

    (
        HandoffSender {
            tx,
            depth: depth.clone(),
        },
        HandoffReceiver { rx, depth },
    )
}

impl HandoffSender {
    /// Append a record. Returns it back if the receiver is gone.
    pub async fn send(&self, record: ResultRecord) -> Result<(), ResultRecord> {
        // Count before sending so the receiver never decrements below zero
        let count = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        let sent = match &self.tx {
            Tx::Bounded(tx) => tx.send(record).await.map_err(|e| e.0),
            Tx::Unbounded(tx) => tx.send(record).map_err(|e| e.0),
        };

        match sent {
            Ok(()) => {
                emit!(HandoffDepth { count });
                Ok(())
            }
            Err(record) => {
                self.depth.fetch_sub(1, Ordering::SeqCst);
                Err(record)
            }
        }
    }
}

impl HandoffReceiver {
    /// Take the oldest record; `None` once every sender is dropped and the queue is empty.
    pub async fn recv(&mut self) -> Option<ResultRecord> {
        let record = match &mut self.rx {
            Rx::Bounded(rx) => rx.recv().await,
            Rx::Unbounded(rx) => rx.recv().await,
        }?;
        let count = self.depth.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        emit!(HandoffDepth { count });
        Some(record)
    }

    /// Records currently waiting.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
