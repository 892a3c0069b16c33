use chrono::Utc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::error;

use booking_core::queue::NotifyJob;

use crate::notifier::Notifier;

/// Drains the notification queue until every sender is dropped. Delivery
/// failures are logged and never stop the loop.
pub async fn run(mut rx: UnboundedReceiver<NotifyJob>, notifier: Notifier) {
    while let Some(job) = rx.recv().await {
        let now = Utc::now().naive_utc();
        if let Err(e) = notifier.handle(job, now).await {
            error!(error = %e, "notification delivery failed");
        }
    }
}
