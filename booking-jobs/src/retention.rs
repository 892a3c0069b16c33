use std::time::Duration;

use anyhow::Result;
use chrono::{NaiveDateTime, Utc};
use tracing::{error, info};

use booking_core::repo::{NotificationRepo, SharedStore};

/// Deletes in-app notifications older than the retention window. Schedule
/// rows are not touched; sent ones stay as an audit trail of what fired.
#[derive(Clone)]
pub struct NotificationRetention {
    store: SharedStore,
    retention_days: i64,
}

impl NotificationRetention {
    pub fn new(store: SharedStore, retention_days: i64) -> Self {
        NotificationRetention {
            store,
            retention_days,
        }
    }

    pub async fn run(self, interval_secs: u64) {
        info!(
            interval_secs,
            retention_days = self.retention_days,
            "starting notification retention sweep"
        );
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            let now = Utc::now().naive_utc();
            if let Err(e) = self.run_once(now).await {
                error!(error = %e, "retention sweep failed");
            }
        }
    }

    pub async fn run_once(&self, now: NaiveDateTime) -> Result<u64> {
        let cutoff = now - chrono::Duration::days(self.retention_days);
        let removed = self.store.prune_notifications_before(cutoff).await?;
        if removed > 0 {
            info!(removed, "pruned old notifications");
        }
        Ok(removed)
    }
}
