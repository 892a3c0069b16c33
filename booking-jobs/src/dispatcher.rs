use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{NaiveDateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use booking_core::repo::{BookingRepo, ScheduleRepo, SharedStore};
use booking_delivery::Notifier;

/// Outcome of one dispatch sweep.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
    pub orphaned: usize,
    pub skipped: bool,
}

/// Sends due reminders. One sweep at a time; an interval tick that lands
/// while the previous sweep is still running is skipped, not queued.
pub struct ReminderDispatcher {
    store: SharedStore,
    notifier: Notifier,
    running: Mutex<()>,
}

impl ReminderDispatcher {
    pub fn new(store: SharedStore, notifier: Notifier) -> Arc<Self> {
        Arc::new(ReminderDispatcher {
            store,
            notifier,
            running: Mutex::new(()),
        })
    }

    pub async fn run(self: Arc<Self>, interval_secs: u64) {
        info!(interval_secs, "starting reminder dispatcher");
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            let now = Utc::now().naive_utc();
            if let Err(e) = self.run_once(now).await {
                error!(error = %e, "reminder sweep failed");
            }
        }
    }

    /// One sweep over the due, unsent, non-exhausted schedule rows.
    pub async fn run_once(&self, now: NaiveDateTime) -> Result<DispatchReport> {
        let _guard = match self.running.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("previous sweep still running, skipping");
                return Ok(DispatchReport {
                    skipped: true,
                    ..DispatchReport::default()
                });
            }
        };

        let due = self.store.due_pending_schedules(now).await?;
        if due.is_empty() {
            return Ok(DispatchReport::default());
        }
        debug!(count = due.len(), "found due reminders");

        let mut report = DispatchReport::default();
        for schedule in due {
            let booking = match self.store.booking(schedule.booking_id).await? {
                Some(booking) => booking,
                None => {
                    // The booking was cancelled between planning and
                    // dispatch. Retire the row so it never fires.
                    warn!(
                        schedule_id = schedule.id,
                        booking_id = schedule.booking_id,
                        "schedule points at a missing booking, retiring it"
                    );
                    self.store.mark_schedule_sent(schedule.id, now).await?;
                    report.orphaned += 1;
                    continue;
                }
            };

            match self.notifier.send_reminder(&schedule, &booking, now).await {
                Ok(()) => {
                    if self.store.mark_schedule_sent(schedule.id, now).await? {
                        report.sent += 1;
                    } else {
                        debug!(schedule_id = schedule.id, "schedule already claimed");
                    }
                }
                Err(e) => {
                    warn!(schedule_id = schedule.id, error = %e, "reminder delivery failed");
                    self.store
                        .record_schedule_failure(schedule.id, &e.to_string())
                        .await?;
                    report.failed += 1;
                }
            }
        }

        if report.sent > 0 || report.failed > 0 || report.orphaned > 0 {
            info!(
                sent = report.sent,
                failed = report.failed,
                orphaned = report.orphaned,
                "reminder sweep finished"
            );
        }
        Ok(report)
    }
}
