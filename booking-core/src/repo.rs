use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::StoreError;
use crate::types::*;

/// A schedule row that keeps failing delivery is retried until it has been
/// attempted this many times, then left alone.
pub const MAX_SEND_ATTEMPTS: i32 = 3;

#[async_trait]
pub trait RoomRepo: Send + Sync {
    async fn room(&self, id: RoomId) -> Result<Option<Room>, StoreError>;
    async fn rooms(&self) -> Result<Vec<Room>, StoreError>;
    async fn active_rooms(&self) -> Result<Vec<Room>, StoreError>;
    async fn create_room(&self, room: NewRoom) -> Result<Room, StoreError>;
    async fn update_room(&self, id: RoomId, update: RoomUpdate) -> Result<Room, StoreError>;
    async fn set_room_status(&self, id: RoomId, status: RoomStatus) -> Result<(), StoreError>;
}

#[async_trait]
pub trait RequestRepo: Send + Sync {
    async fn create_request(
        &self,
        request: NewRequest,
        now: NaiveDateTime,
    ) -> Result<Request, StoreError>;

    async fn request(&self, id: RequestId) -> Result<Option<Request>, StoreError>;

    async fn list_requests(
        &self,
        status: Option<RequestStatus>,
        requester: Option<UserId>,
    ) -> Result<Vec<Request>, StoreError>;

    /// Guarded write: applies only while the request is still pending,
    /// otherwise fails with `Stale`.
    async fn update_pending_request(
        &self,
        id: RequestId,
        fields: RequestUpdate,
        now: NaiveDateTime,
    ) -> Result<Request, StoreError>;
}

#[async_trait]
pub trait BookingRepo: Send + Sync {
    async fn booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError>;

    async fn booking_for_request(
        &self,
        request_id: RequestId,
    ) -> Result<Option<Booking>, StoreError>;

    async fn bookings_for_room_on(
        &self,
        room: RoomId,
        date: NaiveDate,
    ) -> Result<Vec<Booking>, StoreError>;

    async fn bookings_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        room: Option<RoomId>,
    ) -> Result<Vec<Booking>, StoreError>;

    /// Whether some booking for the room covers `at` on `date`, boundaries
    /// included. Input to the room-status reconciler.
    async fn active_booking_exists(
        &self,
        room: RoomId,
        date: NaiveDate,
        at: NaiveTime,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait ScheduleRepo: Send + Sync {
    async fn schedules_for_booking(
        &self,
        booking_id: BookingId,
    ) -> Result<Vec<NotificationSchedule>, StoreError>;

    /// Unsent rows due at or before `now` that have not exhausted their
    /// attempts, oldest first.
    async fn due_pending_schedules(
        &self,
        now: NaiveDateTime,
    ) -> Result<Vec<NotificationSchedule>, StoreError>;

    /// Claims the row. Returns false when it was already sent, so a row is
    /// never dispatched twice.
    async fn mark_schedule_sent(
        &self,
        id: ScheduleId,
        now: NaiveDateTime,
    ) -> Result<bool, StoreError>;

    async fn record_schedule_failure(&self, id: ScheduleId, error: &str)
        -> Result<(), StoreError>;
}

#[async_trait]
pub trait NotificationRepo: Send + Sync {
    async fn create_notification(
        &self,
        notification: NewNotification,
        now: NaiveDateTime,
    ) -> Result<Notification, StoreError>;

    async fn notifications_for_user(
        &self,
        user: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, StoreError>;

    async fn mark_notification_read(
        &self,
        id: NotificationId,
        user: UserId,
        now: NaiveDateTime,
    ) -> Result<bool, StoreError>;

    async fn delete_notification(&self, id: NotificationId, user: UserId)
        -> Result<bool, StoreError>;

    /// Retention sweep. Returns the number of rows removed.
    async fn prune_notifications_before(
        &self,
        cutoff: NaiveDateTime,
    ) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait PreferenceRepo: Send + Sync {
    /// Falls back to `UserPreference::default_for` when no row exists.
    async fn preferences(&self, user: UserId) -> Result<UserPreference, StoreError>;

    async fn set_preferences(
        &self,
        prefs: UserPreference,
        now: NaiveDateTime,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError>;
}

/// The full storage surface plus the compound units the state machine needs
/// to apply atomically.
#[async_trait]
pub trait Store:
    RoomRepo + RequestRepo + BookingRepo + ScheduleRepo + NotificationRepo + PreferenceRepo + UserRepo
{
    /// The approval unit: request → approved, booking inserted, schedule
    /// rows inserted; all or nothing. The slot is re-checked inside the
    /// unit, so two concurrent approvals of the same slot cannot both
    /// succeed: the loser gets `Conflict`. A request that is no longer
    /// pending yields `Stale`.
    async fn commit_approval(
        &self,
        request_id: RequestId,
        approver: UserId,
        booking: NewBooking,
        schedules: Vec<NewSchedule>,
        now: NaiveDateTime,
    ) -> Result<Booking, StoreError>;

    /// Pending → rejected with the reason recorded. `Stale` when the
    /// request already left pending.
    async fn commit_rejection(
        &self,
        request_id: RequestId,
        approver: UserId,
        reason: &str,
        now: NaiveDateTime,
    ) -> Result<(), StoreError>;

    /// → cancelled; deletes the booking and its schedules when one exists
    /// and returns it. `Stale` when the request was already terminal.
    async fn commit_cancellation(
        &self,
        request_id: RequestId,
        now: NaiveDateTime,
    ) -> Result<Option<Booking>, StoreError>;
}

pub type SharedStore = Arc<dyn Store>;
