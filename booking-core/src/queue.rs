use tokio::sync::mpsc;

use crate::types::{BookingId, BookingSnapshot, RequestId, UserId};

/// Post-commit notification work. Enqueued strictly after the owning state
/// transition commits; delivery happens out of band and its failure never
/// rolls the transition back.
#[derive(Debug, Clone)]
pub enum NotifyJob {
    BookingConfirmed {
        booking_id: BookingId,
    },
    RequestRejected {
        request_id: RequestId,
    },
    /// Carries a snapshot because the booking rows are already gone by the
    /// time this job runs.
    BookingCancelled {
        requester_id: UserId,
        cancelled_by: UserId,
        snapshot: BookingSnapshot,
    },
}

/// Producer half of the in-process notification queue.
#[derive(Debug, Clone)]
pub struct NotifyQueue {
    tx: mpsc::UnboundedSender<NotifyJob>,
}

impl NotifyQueue {
    pub fn channel() -> (NotifyQueue, mpsc::UnboundedReceiver<NotifyJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (NotifyQueue { tx }, rx)
    }

    pub fn enqueue(&self, job: NotifyJob) {
        if self.tx.send(job).is_err() {
            tracing::error!("notification worker is gone, dropping job");
        }
    }
}
