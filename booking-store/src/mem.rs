use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tokio::sync::Mutex;

use booking_core::error::StoreError;
use booking_core::repo::{
    BookingRepo, NotificationRepo, PreferenceRepo, RequestRepo, RoomRepo, ScheduleRepo, Store,
    UserRepo, MAX_SEND_ATTEMPTS,
};
use booking_core::types::*;

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, User>,
    rooms: HashMap<RoomId, Room>,
    requests: HashMap<RequestId, Request>,
    bookings: HashMap<BookingId, Booking>,
    schedules: HashMap<ScheduleId, NotificationSchedule>,
    notifications: HashMap<NotificationId, Notification>,
    preferences: HashMap<UserId, UserPreference>,
    next_id: i64,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn overlapping_booking_exists(&self, booking: &NewBooking) -> bool {
        let candidate = booking_core::TimeRange::new(
            booking.date,
            booking.start_time,
            booking.end_time,
        );
        self.bookings
            .values()
            .any(|b| b.room_id == booking.room_id && b.time_range().overlaps(&candidate))
    }
}

/// Everything behind one lock, so the compound operations are atomic for
/// free. Used by tests and as the no-database dev mode.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, name: &str, email: &str, role: Role) -> User {
        let mut inner = self.inner.lock().await;
        let user = User {
            id: inner.next_id(),
            name: name.to_string(),
            email: email.to_string(),
            role,
        };
        inner.users.insert(user.id, user.clone());
        user
    }

    pub async fn add_room(&self, room: NewRoom) -> Room {
        let mut inner = self.inner.lock().await;
        let room = Room {
            id: inner.next_id(),
            name: room.name,
            capacity: room.capacity,
            location: room.location,
            description: room.description,
            status: RoomStatus::Available,
            is_active: true,
            created_by: room.created_by,
        };
        inner.rooms.insert(room.id, room.clone());
        room
    }
}

#[async_trait]
impl RoomRepo for MemStore {
    async fn room(&self, id: RoomId) -> Result<Option<Room>, StoreError> {
        Ok(self.inner.lock().await.rooms.get(&id).cloned())
    }

    async fn rooms(&self) -> Result<Vec<Room>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rooms: Vec<_> = inner.rooms.values().cloned().collect();
        rooms.sort_by_key(|r| r.id);
        Ok(rooms)
    }

    async fn active_rooms(&self) -> Result<Vec<Room>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rooms: Vec<_> = inner
            .rooms
            .values()
            .filter(|r| r.is_active)
            .cloned()
            .collect();
        rooms.sort_by_key(|r| r.id);
        Ok(rooms)
    }

    async fn create_room(&self, room: NewRoom) -> Result<Room, StoreError> {
        Ok(self.add_room(room).await)
    }

    async fn update_room(&self, id: RoomId, update: RoomUpdate) -> Result<Room, StoreError> {
        let mut inner = self.inner.lock().await;
        let room = inner.rooms.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(name) = update.name {
            room.name = name;
        }
        if let Some(capacity) = update.capacity {
            room.capacity = capacity;
        }
        if let Some(location) = update.location {
            room.location = location;
        }
        if let Some(description) = update.description {
            room.description = description;
        }
        if let Some(status) = update.status {
            room.status = status;
        }
        if let Some(is_active) = update.is_active {
            room.is_active = is_active;
        }
        Ok(room.clone())
    }

    async fn set_room_status(&self, id: RoomId, status: RoomStatus) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let room = inner.rooms.get_mut(&id).ok_or(StoreError::NotFound)?;
        room.status = status;
        Ok(())
    }
}

#[async_trait]
impl RequestRepo for MemStore {
    async fn create_request(
        &self,
        request: NewRequest,
        now: NaiveDateTime,
    ) -> Result<Request, StoreError> {
        let mut inner = self.inner.lock().await;
        let request = Request {
            id: inner.next_id(),
            requester_id: request.requester_id,
            capacity: request.capacity,
            purpose: request.purpose,
            notes: request.notes,
            date: request.date,
            start_time: request.start_time,
            end_time: request.end_time,
            status: RequestStatus::Pending,
            assigned_by: None,
            rejection_reason: None,
            created_at: now,
        };
        inner.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn request(&self, id: RequestId) -> Result<Option<Request>, StoreError> {
        Ok(self.inner.lock().await.requests.get(&id).cloned())
    }

    async fn list_requests(
        &self,
        status: Option<RequestStatus>,
        requester: Option<UserId>,
    ) -> Result<Vec<Request>, StoreError> {
        let inner = self.inner.lock().await;
        let mut requests: Vec<_> = inner
            .requests
            .values()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .filter(|r| requester.map_or(true, |u| r.requester_id == u))
            .cloned()
            .collect();
        requests.sort_by_key(|r| r.id);
        Ok(requests)
    }

    async fn update_pending_request(
        &self,
        id: RequestId,
        fields: RequestUpdate,
        _now: NaiveDateTime,
    ) -> Result<Request, StoreError> {
        let mut inner = self.inner.lock().await;
        let request = inner.requests.get_mut(&id).ok_or(StoreError::NotFound)?;
        if request.status != RequestStatus::Pending {
            return Err(StoreError::Stale);
        }
        if let Some(capacity) = fields.capacity {
            request.capacity = capacity;
        }
        if let Some(purpose) = fields.purpose {
            request.purpose = purpose;
        }
        if let Some(notes) = fields.notes {
            request.notes = notes;
        }
        if let Some(date) = fields.date {
            request.date = date;
        }
        if let Some(start_time) = fields.start_time {
            request.start_time = start_time;
        }
        if let Some(end_time) = fields.end_time {
            request.end_time = end_time;
        }
        Ok(request.clone())
    }
}

#[async_trait]
impl BookingRepo for MemStore {
    async fn booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        Ok(self.inner.lock().await.bookings.get(&id).cloned())
    }

    async fn booking_for_request(
        &self,
        request_id: RequestId,
    ) -> Result<Option<Booking>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .bookings
            .values()
            .find(|b| b.request_id == request_id)
            .cloned())
    }

    async fn bookings_for_room_on(
        &self,
        room: RoomId,
        date: NaiveDate,
    ) -> Result<Vec<Booking>, StoreError> {
        let inner = self.inner.lock().await;
        let mut bookings: Vec<_> = inner
            .bookings
            .values()
            .filter(|b| b.room_id == room && b.date == date)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.start_time);
        Ok(bookings)
    }

    async fn bookings_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        room: Option<RoomId>,
    ) -> Result<Vec<Booking>, StoreError> {
        let inner = self.inner.lock().await;
        let mut bookings: Vec<_> = inner
            .bookings
            .values()
            .filter(|b| b.date >= from && b.date <= to)
            .filter(|b| room.map_or(true, |r| b.room_id == r))
            .cloned()
            .collect();
        bookings.sort_by_key(|b| (b.date, b.start_time));
        Ok(bookings)
    }

    async fn active_booking_exists(
        &self,
        room: RoomId,
        date: NaiveDate,
        at: NaiveTime,
    ) -> Result<bool, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .bookings
            .values()
            .any(|b| b.room_id == room && b.date == date && b.start_time <= at && at <= b.end_time))
    }
}

#[async_trait]
impl ScheduleRepo for MemStore {
    async fn schedules_for_booking(
        &self,
        booking_id: BookingId,
    ) -> Result<Vec<NotificationSchedule>, StoreError> {
        let inner = self.inner.lock().await;
        let mut schedules: Vec<_> = inner
            .schedules
            .values()
            .filter(|s| s.booking_id == booking_id)
            .cloned()
            .collect();
        schedules.sort_by_key(|s| s.notify_at);
        Ok(schedules)
    }

    async fn due_pending_schedules(
        &self,
        now: NaiveDateTime,
    ) -> Result<Vec<NotificationSchedule>, StoreError> {
        let inner = self.inner.lock().await;
        let mut due: Vec<_> = inner
            .schedules
            .values()
            .filter(|s| !s.is_sent && s.notify_at <= now && s.attempts < MAX_SEND_ATTEMPTS)
            .cloned()
            .collect();
        due.sort_by_key(|s| s.notify_at);
        Ok(due)
    }

    async fn mark_schedule_sent(
        &self,
        id: ScheduleId,
        now: NaiveDateTime,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let schedule = inner.schedules.get_mut(&id).ok_or(StoreError::NotFound)?;
        if schedule.is_sent {
            return Ok(false);
        }
        schedule.is_sent = true;
        schedule.sent_at = Some(now);
        Ok(true)
    }

    async fn record_schedule_failure(
        &self,
        id: ScheduleId,
        error: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let schedule = inner.schedules.get_mut(&id).ok_or(StoreError::NotFound)?;
        schedule.attempts += 1;
        schedule.last_error = Some(error.to_string());
        Ok(())
    }
}

#[async_trait]
impl NotificationRepo for MemStore {
    async fn create_notification(
        &self,
        notification: NewNotification,
        now: NaiveDateTime,
    ) -> Result<Notification, StoreError> {
        let mut inner = self.inner.lock().await;
        let notification = Notification {
            id: inner.next_id(),
            user_id: notification.user_id,
            booking_id: notification.booking_id,
            title: notification.title,
            message: notification.message,
            kind: notification.kind,
            channel: notification.channel,
            is_read: false,
            read_at: None,
            created_at: now,
        };
        inner
            .notifications
            .insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn notifications_for_user(
        &self,
        user: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, StoreError> {
        let inner = self.inner.lock().await;
        let mut notifications: Vec<_> = inner
            .notifications
            .values()
            .filter(|n| n.user_id == user)
            .filter(|n| !unread_only || !n.is_read)
            .cloned()
            .collect();
        notifications.sort_by_key(|n| std::cmp::Reverse(n.id));
        Ok(notifications)
    }

    async fn mark_notification_read(
        &self,
        id: NotificationId,
        user: UserId,
        now: NaiveDateTime,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let notification = inner
            .notifications
            .get_mut(&id)
            .filter(|n| n.user_id == user)
            .ok_or(StoreError::NotFound)?;
        if notification.is_read {
            return Ok(false);
        }
        notification.is_read = true;
        notification.read_at = Some(now);
        Ok(true)
    }

    async fn delete_notification(
        &self,
        id: NotificationId,
        user: UserId,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.notifications.get(&id) {
            Some(n) if n.user_id == user => {
                inner.notifications.remove(&id);
                Ok(true)
            }
            _ => Err(StoreError::NotFound),
        }
    }

    async fn prune_notifications_before(
        &self,
        cutoff: NaiveDateTime,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let before = inner.notifications.len();
        inner.notifications.retain(|_, n| n.created_at >= cutoff);
        Ok((before - inner.notifications.len()) as u64)
    }
}

#[async_trait]
impl PreferenceRepo for MemStore {
    async fn preferences(&self, user: UserId) -> Result<UserPreference, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .preferences
            .get(&user)
            .cloned()
            .unwrap_or_else(|| UserPreference::default_for(user)))
    }

    async fn set_preferences(
        &self,
        prefs: UserPreference,
        _now: NaiveDateTime,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.preferences.insert(prefs.user_id, prefs);
        Ok(())
    }
}

#[async_trait]
impl UserRepo for MemStore {
    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().await.users.get(&id).cloned())
    }
}

#[async_trait]
impl Store for MemStore {
    async fn commit_approval(
        &self,
        request_id: RequestId,
        approver: UserId,
        booking: NewBooking,
        schedules: Vec<NewSchedule>,
        _now: NaiveDateTime,
    ) -> Result<Booking, StoreError> {
        let mut inner = self.inner.lock().await;

        let status = inner
            .requests
            .get(&request_id)
            .ok_or(StoreError::NotFound)?
            .status;
        if status != RequestStatus::Pending {
            return Err(StoreError::Stale);
        }
        if inner.overlapping_booking_exists(&booking) {
            return Err(StoreError::Conflict);
        }

        if let Some(request) = inner.requests.get_mut(&request_id) {
            request.status = RequestStatus::Approved;
            request.assigned_by = Some(approver);
        }

        let booking = Booking {
            id: inner.next_id(),
            request_id: booking.request_id,
            room_id: booking.room_id,
            approved_by: booking.approved_by,
            date: booking.date,
            start_time: booking.start_time,
            end_time: booking.end_time,
        };
        inner.bookings.insert(booking.id, booking.clone());

        for schedule in schedules {
            let schedule = NotificationSchedule {
                id: inner.next_id(),
                booking_id: booking.id,
                notify_type: schedule.notify_type,
                notify_at: schedule.notify_at,
                channel: schedule.channel,
                is_sent: false,
                sent_at: None,
                attempts: 0,
                last_error: None,
            };
            inner.schedules.insert(schedule.id, schedule);
        }

        Ok(booking)
    }

    async fn commit_rejection(
        &self,
        request_id: RequestId,
        approver: UserId,
        reason: &str,
        _now: NaiveDateTime,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let request = inner
            .requests
            .get_mut(&request_id)
            .ok_or(StoreError::NotFound)?;
        if request.status != RequestStatus::Pending {
            return Err(StoreError::Stale);
        }
        request.status = RequestStatus::Rejected;
        request.assigned_by = Some(approver);
        request.rejection_reason = Some(reason.to_string());
        Ok(())
    }

    async fn commit_cancellation(
        &self,
        request_id: RequestId,
        _now: NaiveDateTime,
    ) -> Result<Option<Booking>, StoreError> {
        let mut inner = self.inner.lock().await;
        let request = inner
            .requests
            .get_mut(&request_id)
            .ok_or(StoreError::NotFound)?;
        if !matches!(
            request.status,
            RequestStatus::Pending | RequestStatus::Approved
        ) {
            return Err(StoreError::Stale);
        }
        request.status = RequestStatus::Cancelled;

        let booking = inner
            .bookings
            .values()
            .find(|b| b.request_id == request_id)
            .cloned();
        if let Some(ref booking) = booking {
            inner.schedules.retain(|_, s| s.booking_id != booking.id);
            inner.bookings.remove(&booking.id);
        }
        Ok(booking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 20)
            .unwrap()
            .and_time(t(9, 0))
    }

    async fn seed(store: &MemStore) -> (User, User, Room, Request) {
        let requester = store.add_user("Ana", "ana@example.com", Role::Member).await;
        let ga = store
            .add_user("Gani", "gani@example.com", Role::GeneralAffairs)
            .await;
        let room = store
            .add_room(NewRoom {
                name: "Discussion Room".to_string(),
                capacity: 6,
                location: "2F".to_string(),
                description: None,
                created_by: ga.id,
            })
            .await;
        let request = store
            .create_request(
                NewRequest {
                    requester_id: requester.id,
                    capacity: 4,
                    purpose: "Sprint planning".to_string(),
                    notes: None,
                    date: d(),
                    start_time: t(14, 0),
                    end_time: t(15, 0),
                },
                now(),
            )
            .await
            .unwrap();
        (requester, ga, room, request)
    }

    fn new_booking(request: &Request, room: &Room, ga: &User) -> NewBooking {
        NewBooking {
            request_id: request.id,
            room_id: room.id,
            approved_by: ga.id,
            date: request.date,
            start_time: request.start_time,
            end_time: request.end_time,
        }
    }

    #[tokio::test]
    async fn commit_approval_rejects_taken_slot() {
        let store = MemStore::new();
        let (requester, ga, room, request) = seed(&store).await;

        store
            .commit_approval(request.id, ga.id, new_booking(&request, &room, &ga), vec![], now())
            .await
            .unwrap();

        // A second request for an overlapping slot loses at commit time.
        let second = store
            .create_request(
                NewRequest {
                    requester_id: requester.id,
                    capacity: 2,
                    purpose: "1:1".to_string(),
                    notes: None,
                    date: d(),
                    start_time: t(14, 30),
                    end_time: t(15, 30),
                },
                now(),
            )
            .await
            .unwrap();
        let err = store
            .commit_approval(second.id, ga.id, new_booking(&second, &room, &ga), vec![], now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));

        // The loser's request is untouched.
        let second = store.request(second.id).await.unwrap().unwrap();
        assert_eq!(second.status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn commit_approval_is_stale_on_non_pending_request() {
        let store = MemStore::new();
        let (_, ga, room, request) = seed(&store).await;

        store
            .commit_approval(request.id, ga.id, new_booking(&request, &room, &ga), vec![], now())
            .await
            .unwrap();
        let err = store
            .commit_approval(request.id, ga.id, new_booking(&request, &room, &ga), vec![], now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Stale));
    }

    #[tokio::test]
    async fn mark_schedule_sent_claims_exactly_once() {
        let store = MemStore::new();
        let (_, ga, room, request) = seed(&store).await;
        let booking = store
            .commit_approval(
                request.id,
                ga.id,
                new_booking(&request, &room, &ga),
                vec![NewSchedule {
                    notify_type: ReminderOffset::M30,
                    notify_at: d().and_time(t(13, 30)),
                    channel: Channel::Both,
                }],
                now(),
            )
            .await
            .unwrap();

        let schedule = &store.schedules_for_booking(booking.id).await.unwrap()[0];
        assert!(store.mark_schedule_sent(schedule.id, now()).await.unwrap());
        assert!(!store.mark_schedule_sent(schedule.id, now()).await.unwrap());
    }

    #[tokio::test]
    async fn cancellation_cascades_to_booking_and_schedules() {
        let store = MemStore::new();
        let (_, ga, room, request) = seed(&store).await;
        let booking = store
            .commit_approval(
                request.id,
                ga.id,
                new_booking(&request, &room, &ga),
                vec![NewSchedule {
                    notify_type: ReminderOffset::H3,
                    notify_at: d().and_time(t(11, 0)),
                    channel: Channel::InApp,
                }],
                now(),
            )
            .await
            .unwrap();

        let deleted = store.commit_cancellation(request.id, now()).await.unwrap();
        assert_eq!(deleted.unwrap().id, booking.id);
        assert!(store.booking(booking.id).await.unwrap().is_none());
        assert!(store
            .schedules_for_booking(booking.id)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            store.request(request.id).await.unwrap().unwrap().status,
            RequestStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn prune_removes_only_rows_older_than_cutoff() {
        let store = MemStore::new();
        let user = store.add_user("Ana", "ana@example.com", Role::Member).await;

        let old = now() - chrono::Duration::days(40);
        for (created_at, title) in [(old, "old"), (now(), "fresh")] {
            store
                .create_notification(
                    NewNotification {
                        user_id: user.id,
                        booking_id: None,
                        title: title.to_string(),
                        message: "m".to_string(),
                        kind: "booking_reminder".to_string(),
                        channel: Channel::InApp,
                    },
                    created_at,
                )
                .await
                .unwrap();
        }

        let cutoff = now() - chrono::Duration::days(30);
        assert_eq!(store.prune_notifications_before(cutoff).await.unwrap(), 1);
        let left = store.notifications_for_user(user.id, false).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].title, "fresh");
    }
}
