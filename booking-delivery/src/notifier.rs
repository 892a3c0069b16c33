use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use tracing::{debug, warn};

use booking_core::queue::NotifyJob;
use booking_core::repo::{
    BookingRepo, NotificationRepo, PreferenceRepo, RequestRepo, RoomRepo, SharedStore, UserRepo,
};
use booking_core::types::{
    Booking, Channel, NewNotification, NotificationSchedule, Room, UserId,
};

use crate::mailer::SharedMailer;
use crate::messages::{self, Message};

/// Turns queued jobs and due schedules into in-app notification rows and
/// emails. The in-app row is the durable leg: it is written first, and an
/// email failure after that point is logged, not retried.
#[derive(Clone)]
pub struct Notifier {
    store: SharedStore,
    mailer: SharedMailer,
}

impl Notifier {
    pub fn new(store: SharedStore, mailer: SharedMailer) -> Self {
        Notifier { store, mailer }
    }

    pub async fn handle(&self, job: NotifyJob, now: NaiveDateTime) -> Result<()> {
        match job {
            NotifyJob::BookingConfirmed { booking_id } => {
                let booking = self
                    .store
                    .booking(booking_id)
                    .await?
                    .ok_or_else(|| anyhow!("booking {} disappeared before delivery", booking_id))?;
                let request = self
                    .store
                    .request(booking.request_id)
                    .await?
                    .ok_or_else(|| anyhow!("request {} not found", booking.request_id))?;
                let room = self.room(booking.room_id).await?;
                let msg =
                    messages::confirmation(&room, booking.date, booking.start_time, booking.end_time);
                self.deliver(
                    request.requester_id,
                    Some(booking.id),
                    "confirmation",
                    msg,
                    now,
                )
                .await
            }
            NotifyJob::RequestRejected { request_id } => {
                let request = self
                    .store
                    .request(request_id)
                    .await?
                    .ok_or_else(|| anyhow!("request {} not found", request_id))?;
                let reason = request.rejection_reason.as_deref().unwrap_or("not specified");
                let msg =
                    messages::rejection(request.date, request.start_time, request.end_time, reason);
                self.deliver(request.requester_id, None, "rejection", msg, now)
                    .await
            }
            NotifyJob::BookingCancelled {
                requester_id,
                cancelled_by,
                snapshot,
            } => {
                debug!(requester_id, cancelled_by, "delivering cancellation notice");
                let msg = messages::cancellation(&snapshot);
                self.deliver(requester_id, None, "cancellation", msg, now)
                    .await
            }
        }
    }

    /// Delivers one due reminder. Fails only when the in-app row cannot be
    /// written; an email failure after that is logged and swallowed so the
    /// schedule still counts as sent.
    pub async fn send_reminder(
        &self,
        schedule: &NotificationSchedule,
        booking: &Booking,
        now: NaiveDateTime,
    ) -> Result<()> {
        let request = self
            .store
            .request(booking.request_id)
            .await?
            .ok_or_else(|| anyhow!("request {} not found", booking.request_id))?;
        let room = self.room(booking.room_id).await?;
        let msg = messages::reminder(
            schedule.notify_type,
            &room,
            booking.date,
            booking.start_time,
            booking.end_time,
        );

        self.store
            .create_notification(
                NewNotification {
                    user_id: request.requester_id,
                    booking_id: Some(booking.id),
                    title: msg.title.clone(),
                    message: msg.body.clone(),
                    kind: "reminder".to_string(),
                    channel: schedule.channel,
                },
                now,
            )
            .await
            .context("failed to write in-app reminder")?;

        if schedule.channel.includes_email() {
            self.email_leg(request.requester_id, &msg).await;
        }
        Ok(())
    }

    async fn deliver(
        &self,
        user_id: UserId,
        booking_id: Option<i64>,
        kind: &str,
        msg: Message,
        now: NaiveDateTime,
    ) -> Result<()> {
        let prefs = self.store.preferences(user_id).await?;
        let channel = if prefs.email_notifications {
            Channel::Both
        } else {
            Channel::InApp
        };

        self.store
            .create_notification(
                NewNotification {
                    user_id,
                    booking_id,
                    title: msg.title.clone(),
                    message: msg.body.clone(),
                    kind: kind.to_string(),
                    channel,
                },
                now,
            )
            .await
            .context("failed to write in-app notification")?;

        if channel.includes_email() {
            self.email_leg(user_id, &msg).await;
        }
        Ok(())
    }

    async fn email_leg(&self, user_id: UserId, msg: &Message) {
        let user = match self.store.user(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(user_id, "user missing, skipping email");
                return;
            }
            Err(e) => {
                warn!(user_id, error = %e, "user lookup failed, skipping email");
                return;
            }
        };
        if let Err(e) = self.mailer.send(&user.email, &msg.title, &msg.body).await {
            warn!(user_id, email = %user.email, error = %e, "email delivery failed");
        }
    }

    async fn room(&self, room_id: i64) -> Result<Room> {
        self.store
            .room(room_id)
            .await?
            .ok_or_else(|| anyhow!("room {} not found", room_id))
    }
}
