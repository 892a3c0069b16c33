use std::time::Duration;

use anyhow::Result;
use chrono::{NaiveDateTime, Utc};
use tracing::{debug, error, info};

use booking_core::repo::{BookingRepo, RoomRepo, SharedStore};
use booking_core::types::RoomStatus;

/// Keeps the derived `occupied`/`available` status in step with the
/// bookings table. Rooms in maintenance are left alone; that status is set
/// and cleared by hand.
#[derive(Clone)]
pub struct RoomReconciler {
    store: SharedStore,
}

impl RoomReconciler {
    pub fn new(store: SharedStore) -> Self {
        RoomReconciler { store }
    }

    pub async fn run(self, interval_secs: u64) {
        info!(interval_secs, "starting room status reconciler");
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            let now = Utc::now().naive_utc();
            if let Err(e) = self.run_once(now).await {
                error!(error = %e, "room reconcile failed");
            }
        }
    }

    /// Returns the number of rooms whose status changed.
    pub async fn run_once(&self, now: NaiveDateTime) -> Result<u64> {
        let mut changed = 0;
        for room in self.store.active_rooms().await? {
            if room.status == RoomStatus::Maintenance {
                continue;
            }
            let in_use = self
                .store
                .active_booking_exists(room.id, now.date(), now.time())
                .await?;
            let wanted = if in_use {
                RoomStatus::Occupied
            } else {
                RoomStatus::Available
            };
            if room.status != wanted {
                debug!(
                    room_id = room.id,
                    previous = room.status.as_str(),
                    next = wanted.as_str(),
                    "room status change"
                );
                self.store.set_room_status(room.id, wanted).await?;
                changed += 1;
            }
        }
        if changed > 0 {
            info!(changed, "room statuses reconciled");
        }
        Ok(changed)
    }
}
