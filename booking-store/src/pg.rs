use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};
use scoped_futures::ScopedFutureExt;

use booking_core::db::{DbConnection, DbPool};
use booking_core::error::StoreError;
use booking_core::repo::{
    BookingRepo, NotificationRepo, PreferenceRepo, RequestRepo, RoomRepo, ScheduleRepo, Store,
    UserRepo, MAX_SEND_ATTEMPTS,
};
use booking_core::schema::{
    bookings, notification_schedules, notifications, requests, rooms, user_preferences, users,
};
use booking_core::types::*;

/// Postgres-backed store. Compound operations run in a transaction; the
/// `bookings_no_overlap` exclusion constraint backs up the in-transaction
/// overlap check.
pub struct PgStore {
    pool: Arc<DbPool>,
}

impl PgStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        PgStore { pool }
    }

    async fn conn(&self) -> Result<DbConnection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Backend(anyhow!("connection pool: {}", e)))
    }
}

fn parse_enum<T>(parsed: Option<T>, column: &str, raw: &str) -> Result<T, StoreError> {
    parsed.ok_or_else(|| StoreError::Backend(anyhow!("unknown {} value: {}", column, raw)))
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = booking_core::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    role: String,
}

impl UserRow {
    fn into_domain(self) -> Result<User, StoreError> {
        Ok(User {
            id: self.id,
            name: self.name,
            email: self.email,
            role: parse_enum(Role::from_str(&self.role), "role", &self.role)?,
        })
    }
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = booking_core::schema::rooms)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct RoomRow {
    id: i64,
    name: String,
    capacity: i32,
    location: String,
    description: Option<String>,
    status: String,
    is_active: bool,
    created_by: i64,
}

impl RoomRow {
    fn into_domain(self) -> Result<Room, StoreError> {
        Ok(Room {
            id: self.id,
            name: self.name,
            capacity: self.capacity,
            location: self.location,
            description: self.description,
            status: parse_enum(RoomStatus::from_str(&self.status), "status", &self.status)?,
            is_active: self.is_active,
            created_by: self.created_by,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = booking_core::schema::rooms)]
struct NewRoomRow<'a> {
    name: &'a str,
    capacity: i32,
    location: &'a str,
    description: Option<&'a str>,
    status: &'a str,
    is_active: bool,
    created_by: i64,
}

#[derive(AsChangeset)]
#[diesel(table_name = booking_core::schema::rooms)]
struct RoomChanges<'a> {
    name: Option<&'a str>,
    capacity: Option<i32>,
    location: Option<&'a str>,
    // Double option so an explicit null clears the column.
    description: Option<Option<&'a str>>,
    status: Option<&'a str>,
    is_active: Option<bool>,
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = booking_core::schema::requests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct RequestRow {
    id: i64,
    requester_id: i64,
    capacity: i32,
    purpose: String,
    notes: Option<String>,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    status: String,
    assigned_by: Option<i64>,
    rejection_reason: Option<String>,
    created_at: NaiveDateTime,
}

impl RequestRow {
    fn into_domain(self) -> Result<Request, StoreError> {
        Ok(Request {
            id: self.id,
            requester_id: self.requester_id,
            capacity: self.capacity,
            purpose: self.purpose,
            notes: self.notes,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            status: parse_enum(
                RequestStatus::from_str(&self.status),
                "status",
                &self.status,
            )?,
            assigned_by: self.assigned_by,
            rejection_reason: self.rejection_reason,
            created_at: self.created_at,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = booking_core::schema::requests)]
struct NewRequestRow<'a> {
    requester_id: i64,
    capacity: i32,
    purpose: &'a str,
    notes: Option<&'a str>,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    status: &'a str,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(AsChangeset)]
#[diesel(table_name = booking_core::schema::requests)]
struct RequestChanges<'a> {
    capacity: Option<i32>,
    purpose: Option<&'a str>,
    // Double option so an explicit null clears the column.
    notes: Option<Option<&'a str>>,
    date: Option<NaiveDate>,
    start_time: Option<NaiveTime>,
    end_time: Option<NaiveTime>,
    updated_at: NaiveDateTime,
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = booking_core::schema::bookings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct BookingRow {
    id: i64,
    request_id: i64,
    room_id: i64,
    approved_by: i64,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
}

impl BookingRow {
    fn into_domain(self) -> Booking {
        Booking {
            id: self.id,
            request_id: self.request_id,
            room_id: self.room_id,
            approved_by: self.approved_by,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = booking_core::schema::bookings)]
struct NewBookingRow {
    request_id: i64,
    room_id: i64,
    approved_by: i64,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    created_at: NaiveDateTime,
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = booking_core::schema::notification_schedules)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct ScheduleRow {
    id: i64,
    booking_id: i64,
    notify_type: String,
    notify_at: NaiveDateTime,
    channel: String,
    is_sent: bool,
    sent_at: Option<NaiveDateTime>,
    attempts: i32,
    last_error: Option<String>,
}

impl ScheduleRow {
    fn into_domain(self) -> Result<NotificationSchedule, StoreError> {
        Ok(NotificationSchedule {
            id: self.id,
            booking_id: self.booking_id,
            notify_type: parse_enum(
                ReminderOffset::from_str(&self.notify_type),
                "notify_type",
                &self.notify_type,
            )?,
            notify_at: self.notify_at,
            channel: parse_enum(Channel::from_str(&self.channel), "channel", &self.channel)?,
            is_sent: self.is_sent,
            sent_at: self.sent_at,
            attempts: self.attempts,
            last_error: self.last_error,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = booking_core::schema::notification_schedules)]
struct NewScheduleRow<'a> {
    booking_id: i64,
    notify_type: &'a str,
    notify_at: NaiveDateTime,
    channel: &'a str,
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = booking_core::schema::notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct NotificationRow {
    id: i64,
    user_id: i64,
    booking_id: Option<i64>,
    title: String,
    message: String,
    kind: String,
    channel: String,
    is_read: bool,
    read_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
}

impl NotificationRow {
    fn into_domain(self) -> Result<Notification, StoreError> {
        Ok(Notification {
            id: self.id,
            user_id: self.user_id,
            booking_id: self.booking_id,
            title: self.title,
            message: self.message,
            kind: self.kind,
            channel: parse_enum(Channel::from_str(&self.channel), "channel", &self.channel)?,
            is_read: self.is_read,
            read_at: self.read_at,
            created_at: self.created_at,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = booking_core::schema::notifications)]
struct NewNotificationRow<'a> {
    user_id: i64,
    booking_id: Option<i64>,
    title: &'a str,
    message: &'a str,
    kind: &'a str,
    channel: &'a str,
    created_at: NaiveDateTime,
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = booking_core::schema::user_preferences)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct PreferenceRow {
    user_id: i64,
    notify_24h: bool,
    notify_3h: bool,
    notify_30m: bool,
    email_notifications: bool,
}

impl PreferenceRow {
    fn into_domain(self) -> UserPreference {
        UserPreference {
            user_id: self.user_id,
            notify_24h: self.notify_24h,
            notify_3h: self.notify_3h,
            notify_30m: self.notify_30m,
            email_notifications: self.email_notifications,
        }
    }
}

#[async_trait]
impl RoomRepo for PgStore {
    async fn room(&self, id: RoomId) -> Result<Option<Room>, StoreError> {
        let mut conn = self.conn().await?;
        let row: Option<RoomRow> = rooms::table
            .filter(rooms::id.eq(id))
            .select(RoomRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        row.map(RoomRow::into_domain).transpose()
    }

    async fn rooms(&self) -> Result<Vec<Room>, StoreError> {
        let mut conn = self.conn().await?;
        let rows: Vec<RoomRow> = rooms::table
            .order(rooms::id.asc())
            .select(RoomRow::as_select())
            .load(&mut conn)
            .await?;
        rows.into_iter().map(RoomRow::into_domain).collect()
    }

    async fn active_rooms(&self) -> Result<Vec<Room>, StoreError> {
        let mut conn = self.conn().await?;
        let rows: Vec<RoomRow> = rooms::table
            .filter(rooms::is_active.eq(true))
            .order(rooms::id.asc())
            .select(RoomRow::as_select())
            .load(&mut conn)
            .await?;
        rows.into_iter().map(RoomRow::into_domain).collect()
    }

    async fn create_room(&self, room: NewRoom) -> Result<Room, StoreError> {
        let mut conn = self.conn().await?;
        let row: RoomRow = diesel::insert_into(rooms::table)
            .values(NewRoomRow {
                name: &room.name,
                capacity: room.capacity,
                location: &room.location,
                description: room.description.as_deref(),
                status: RoomStatus::Available.as_str(),
                is_active: true,
                created_by: room.created_by,
            })
            .returning(RoomRow::as_returning())
            .get_result(&mut conn)
            .await?;
        row.into_domain()
    }

    async fn update_room(&self, id: RoomId, update: RoomUpdate) -> Result<Room, StoreError> {
        let changes = RoomChanges {
            name: update.name.as_deref(),
            capacity: update.capacity,
            location: update.location.as_deref(),
            description: update.description.as_ref().map(|d| d.as_deref()),
            status: update.status.map(|s| s.as_str()),
            is_active: update.is_active,
        };

        // Nothing to change: hand back the current row.
        if changes.name.is_none()
            && changes.capacity.is_none()
            && changes.location.is_none()
            && changes.description.is_none()
            && changes.status.is_none()
            && changes.is_active.is_none()
        {
            return self.room(id).await?.ok_or(StoreError::NotFound);
        }

        let mut conn = self.conn().await?;
        let row: Option<RoomRow> = diesel::update(rooms::table.filter(rooms::id.eq(id)))
            .set(&changes)
            .returning(RoomRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?;
        row.ok_or(StoreError::NotFound)?.into_domain()
    }

    async fn set_room_status(&self, id: RoomId, status: RoomStatus) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let affected = diesel::update(rooms::table.filter(rooms::id.eq(id)))
            .set(rooms::status.eq(status.as_str()))
            .execute(&mut conn)
            .await?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl RequestRepo for PgStore {
    async fn create_request(
        &self,
        request: NewRequest,
        now: NaiveDateTime,
    ) -> Result<Request, StoreError> {
        let mut conn = self.conn().await?;
        let row: RequestRow = diesel::insert_into(requests::table)
            .values(NewRequestRow {
                requester_id: request.requester_id,
                capacity: request.capacity,
                purpose: &request.purpose,
                notes: request.notes.as_deref(),
                date: request.date,
                start_time: request.start_time,
                end_time: request.end_time,
                status: RequestStatus::Pending.as_str(),
                created_at: now,
                updated_at: now,
            })
            .returning(RequestRow::as_returning())
            .get_result(&mut conn)
            .await?;
        row.into_domain()
    }

    async fn request(&self, id: RequestId) -> Result<Option<Request>, StoreError> {
        let mut conn = self.conn().await?;
        let row: Option<RequestRow> = requests::table
            .filter(requests::id.eq(id))
            .select(RequestRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        row.map(RequestRow::into_domain).transpose()
    }

    async fn list_requests(
        &self,
        status: Option<RequestStatus>,
        requester: Option<UserId>,
    ) -> Result<Vec<Request>, StoreError> {
        let mut conn = self.conn().await?;
        let mut query = requests::table.order(requests::id.asc()).into_boxed();
        if let Some(status) = status {
            query = query.filter(requests::status.eq(status.as_str()));
        }
        if let Some(requester) = requester {
            query = query.filter(requests::requester_id.eq(requester));
        }
        let rows: Vec<RequestRow> = query
            .select(RequestRow::as_select())
            .load(&mut conn)
            .await?;
        rows.into_iter().map(RequestRow::into_domain).collect()
    }

    async fn update_pending_request(
        &self,
        id: RequestId,
        fields: RequestUpdate,
        now: NaiveDateTime,
    ) -> Result<Request, StoreError> {
        let mut conn = self.conn().await?;
        let changes = RequestChanges {
            capacity: fields.capacity,
            purpose: fields.purpose.as_deref(),
            notes: fields.notes.as_ref().map(|n| n.as_deref()),
            date: fields.date,
            start_time: fields.start_time,
            end_time: fields.end_time,
            updated_at: now,
        };
        let row: Option<RequestRow> = diesel::update(
            requests::table
                .filter(requests::id.eq(id))
                .filter(requests::status.eq(RequestStatus::Pending.as_str())),
        )
        .set(&changes)
        .returning(RequestRow::as_returning())
        .get_result(&mut conn)
        .await
        .optional()?;

        match row {
            Some(row) => row.into_domain(),
            None => {
                let exists: i64 = requests::table
                    .filter(requests::id.eq(id))
                    .count()
                    .get_result(&mut conn)
                    .await?;
                Err(if exists > 0 {
                    StoreError::Stale
                } else {
                    StoreError::NotFound
                })
            }
        }
    }
}

#[async_trait]
impl BookingRepo for PgStore {
    async fn booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        let mut conn = self.conn().await?;
        let row: Option<BookingRow> = bookings::table
            .filter(bookings::id.eq(id))
            .select(BookingRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row.map(BookingRow::into_domain))
    }

    async fn booking_for_request(
        &self,
        request_id: RequestId,
    ) -> Result<Option<Booking>, StoreError> {
        let mut conn = self.conn().await?;
        let row: Option<BookingRow> = bookings::table
            .filter(bookings::request_id.eq(request_id))
            .select(BookingRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row.map(BookingRow::into_domain))
    }

    async fn bookings_for_room_on(
        &self,
        room: RoomId,
        date: NaiveDate,
    ) -> Result<Vec<Booking>, StoreError> {
        let mut conn = self.conn().await?;
        let rows: Vec<BookingRow> = bookings::table
            .filter(bookings::room_id.eq(room))
            .filter(bookings::date.eq(date))
            .order(bookings::start_time.asc())
            .select(BookingRow::as_select())
            .load(&mut conn)
            .await?;
        Ok(rows.into_iter().map(BookingRow::into_domain).collect())
    }

    async fn bookings_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        room: Option<RoomId>,
    ) -> Result<Vec<Booking>, StoreError> {
        let mut conn = self.conn().await?;
        let mut query = bookings::table
            .filter(bookings::date.ge(from))
            .filter(bookings::date.le(to))
            .order((bookings::date.asc(), bookings::start_time.asc()))
            .into_boxed();
        if let Some(room) = room {
            query = query.filter(bookings::room_id.eq(room));
        }
        let rows: Vec<BookingRow> = query
            .select(BookingRow::as_select())
            .load(&mut conn)
            .await?;
        Ok(rows.into_iter().map(BookingRow::into_domain).collect())
    }

    async fn active_booking_exists(
        &self,
        room: RoomId,
        date: NaiveDate,
        at: NaiveTime,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        let count: i64 = bookings::table
            .filter(bookings::room_id.eq(room))
            .filter(bookings::date.eq(date))
            .filter(bookings::start_time.le(at))
            .filter(bookings::end_time.ge(at))
            .count()
            .get_result(&mut conn)
            .await?;
        Ok(count > 0)
    }
}

#[async_trait]
impl ScheduleRepo for PgStore {
    async fn schedules_for_booking(
        &self,
        booking_id: BookingId,
    ) -> Result<Vec<NotificationSchedule>, StoreError> {
        let mut conn = self.conn().await?;
        let rows: Vec<ScheduleRow> = notification_schedules::table
            .filter(notification_schedules::booking_id.eq(booking_id))
            .order(notification_schedules::notify_at.asc())
            .select(ScheduleRow::as_select())
            .load(&mut conn)
            .await?;
        rows.into_iter().map(ScheduleRow::into_domain).collect()
    }

    async fn due_pending_schedules(
        &self,
        now: NaiveDateTime,
    ) -> Result<Vec<NotificationSchedule>, StoreError> {
        let mut conn = self.conn().await?;
        let rows: Vec<ScheduleRow> = notification_schedules::table
            .filter(notification_schedules::is_sent.eq(false))
            .filter(notification_schedules::notify_at.le(now))
            .filter(notification_schedules::attempts.lt(MAX_SEND_ATTEMPTS))
            .order(notification_schedules::notify_at.asc())
            .select(ScheduleRow::as_select())
            .load(&mut conn)
            .await?;
        rows.into_iter().map(ScheduleRow::into_domain).collect()
    }

    async fn mark_schedule_sent(
        &self,
        id: ScheduleId,
        now: NaiveDateTime,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        let affected = diesel::update(
            notification_schedules::table
                .filter(notification_schedules::id.eq(id))
                .filter(notification_schedules::is_sent.eq(false)),
        )
        .set((
            notification_schedules::is_sent.eq(true),
            notification_schedules::sent_at.eq(Some(now)),
        ))
        .execute(&mut conn)
        .await?;

        if affected > 0 {
            return Ok(true);
        }
        let exists: i64 = notification_schedules::table
            .filter(notification_schedules::id.eq(id))
            .count()
            .get_result(&mut conn)
            .await?;
        if exists > 0 {
            Ok(false)
        } else {
            Err(StoreError::NotFound)
        }
    }

    async fn record_schedule_failure(
        &self,
        id: ScheduleId,
        error: &str,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let affected = diesel::update(
            notification_schedules::table.filter(notification_schedules::id.eq(id)),
        )
        .set((
            notification_schedules::attempts.eq(notification_schedules::attempts + 1),
            notification_schedules::last_error.eq(Some(error)),
        ))
        .execute(&mut conn)
        .await?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationRepo for PgStore {
    async fn create_notification(
        &self,
        notification: NewNotification,
        now: NaiveDateTime,
    ) -> Result<Notification, StoreError> {
        let mut conn = self.conn().await?;
        let row: NotificationRow = diesel::insert_into(notifications::table)
            .values(NewNotificationRow {
                user_id: notification.user_id,
                booking_id: notification.booking_id,
                title: &notification.title,
                message: &notification.message,
                kind: &notification.kind,
                channel: notification.channel.as_str(),
                created_at: now,
            })
            .returning(NotificationRow::as_returning())
            .get_result(&mut conn)
            .await?;
        row.into_domain()
    }

    async fn notifications_for_user(
        &self,
        user: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, StoreError> {
        let mut conn = self.conn().await?;
        let mut query = notifications::table
            .filter(notifications::user_id.eq(user))
            .order(notifications::id.desc())
            .into_boxed();
        if unread_only {
            query = query.filter(notifications::is_read.eq(false));
        }
        let rows: Vec<NotificationRow> = query
            .select(NotificationRow::as_select())
            .load(&mut conn)
            .await?;
        rows.into_iter().map(NotificationRow::into_domain).collect()
    }

    async fn mark_notification_read(
        &self,
        id: NotificationId,
        user: UserId,
        now: NaiveDateTime,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        let affected = diesel::update(
            notifications::table
                .filter(notifications::id.eq(id))
                .filter(notifications::user_id.eq(user))
                .filter(notifications::is_read.eq(false)),
        )
        .set((
            notifications::is_read.eq(true),
            notifications::read_at.eq(Some(now)),
        ))
        .execute(&mut conn)
        .await?;

        if affected > 0 {
            return Ok(true);
        }
        let exists: i64 = notifications::table
            .filter(notifications::id.eq(id))
            .filter(notifications::user_id.eq(user))
            .count()
            .get_result(&mut conn)
            .await?;
        if exists > 0 {
            Ok(false)
        } else {
            Err(StoreError::NotFound)
        }
    }

    async fn delete_notification(
        &self,
        id: NotificationId,
        user: UserId,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        let affected = diesel::delete(
            notifications::table
                .filter(notifications::id.eq(id))
                .filter(notifications::user_id.eq(user)),
        )
        .execute(&mut conn)
        .await?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(true)
    }

    async fn prune_notifications_before(
        &self,
        cutoff: NaiveDateTime,
    ) -> Result<u64, StoreError> {
        let mut conn = self.conn().await?;
        let deleted =
            diesel::delete(notifications::table.filter(notifications::created_at.lt(cutoff)))
                .execute(&mut conn)
                .await?;
        Ok(deleted as u64)
    }
}

#[async_trait]
impl PreferenceRepo for PgStore {
    async fn preferences(&self, user: UserId) -> Result<UserPreference, StoreError> {
        let mut conn = self.conn().await?;
        let row: Option<PreferenceRow> = user_preferences::table
            .filter(user_preferences::user_id.eq(user))
            .select(PreferenceRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row
            .map(PreferenceRow::into_domain)
            .unwrap_or_else(|| UserPreference::default_for(user)))
    }

    async fn set_preferences(
        &self,
        prefs: UserPreference,
        now: NaiveDateTime,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        diesel::insert_into(user_preferences::table)
            .values((
                user_preferences::user_id.eq(prefs.user_id),
                user_preferences::notify_24h.eq(prefs.notify_24h),
                user_preferences::notify_3h.eq(prefs.notify_3h),
                user_preferences::notify_30m.eq(prefs.notify_30m),
                user_preferences::email_notifications.eq(prefs.email_notifications),
                user_preferences::updated_at.eq(now),
            ))
            .on_conflict(user_preferences::user_id)
            .do_update()
            .set((
                user_preferences::notify_24h.eq(prefs.notify_24h),
                user_preferences::notify_3h.eq(prefs.notify_3h),
                user_preferences::notify_30m.eq(prefs.notify_30m),
                user_preferences::email_notifications.eq(prefs.email_notifications),
                user_preferences::updated_at.eq(now),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepo for PgStore {
    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let mut conn = self.conn().await?;
        let row: Option<UserRow> = users::table
            .filter(users::id.eq(id))
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        row.map(UserRow::into_domain).transpose()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn commit_approval(
        &self,
        request_id: RequestId,
        approver: UserId,
        booking: NewBooking,
        schedules: Vec<NewSchedule>,
        now: NaiveDateTime,
    ) -> Result<Booking, StoreError> {
        let mut conn = self.conn().await?;
        conn.transaction::<Booking, StoreError, _>(|conn| {
            async move {
                let status: Option<String> = requests::table
                    .filter(requests::id.eq(request_id))
                    .select(requests::status)
                    .first(conn)
                    .await
                    .optional()?;
                match status.as_deref() {
                    None => return Err(StoreError::NotFound),
                    Some("pending") => {}
                    Some(_) => return Err(StoreError::Stale),
                }

                // Re-check the slot inside the transaction; the exclusion
                // constraint catches anything that still slips through.
                let overlapping: i64 = bookings::table
                    .filter(bookings::room_id.eq(booking.room_id))
                    .filter(bookings::date.eq(booking.date))
                    .filter(bookings::start_time.lt(booking.end_time))
                    .filter(bookings::end_time.gt(booking.start_time))
                    .count()
                    .get_result(conn)
                    .await?;
                if overlapping > 0 {
                    return Err(StoreError::Conflict);
                }

                diesel::update(requests::table.filter(requests::id.eq(request_id)))
                    .set((
                        requests::status.eq(RequestStatus::Approved.as_str()),
                        requests::assigned_by.eq(Some(approver)),
                        requests::updated_at.eq(now),
                    ))
                    .execute(conn)
                    .await?;

                let row: BookingRow = diesel::insert_into(bookings::table)
                    .values(NewBookingRow {
                        request_id: booking.request_id,
                        room_id: booking.room_id,
                        approved_by: booking.approved_by,
                        date: booking.date,
                        start_time: booking.start_time,
                        end_time: booking.end_time,
                        created_at: now,
                    })
                    .returning(BookingRow::as_returning())
                    .get_result(conn)
                    .await?;

                for schedule in &schedules {
                    diesel::insert_into(notification_schedules::table)
                        .values(NewScheduleRow {
                            booking_id: row.id,
                            notify_type: schedule.notify_type.as_str(),
                            notify_at: schedule.notify_at,
                            channel: schedule.channel.as_str(),
                        })
                        .execute(conn)
                        .await?;
                }

                Ok(row.into_domain())
            }
            .scope_boxed()
        })
        .await
    }

    async fn commit_rejection(
        &self,
        request_id: RequestId,
        approver: UserId,
        reason: &str,
        now: NaiveDateTime,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let affected = diesel::update(
            requests::table
                .filter(requests::id.eq(request_id))
                .filter(requests::status.eq(RequestStatus::Pending.as_str())),
        )
        .set((
            requests::status.eq(RequestStatus::Rejected.as_str()),
            requests::assigned_by.eq(Some(approver)),
            requests::rejection_reason.eq(Some(reason)),
            requests::updated_at.eq(now),
        ))
        .execute(&mut conn)
        .await?;

        if affected > 0 {
            return Ok(());
        }
        let exists: i64 = requests::table
            .filter(requests::id.eq(request_id))
            .count()
            .get_result(&mut conn)
            .await?;
        Err(if exists > 0 {
            StoreError::Stale
        } else {
            StoreError::NotFound
        })
    }

    async fn commit_cancellation(
        &self,
        request_id: RequestId,
        now: NaiveDateTime,
    ) -> Result<Option<Booking>, StoreError> {
        let mut conn = self.conn().await?;
        conn.transaction::<Option<Booking>, StoreError, _>(|conn| {
            async move {
                let affected = diesel::update(
                    requests::table
                        .filter(requests::id.eq(request_id))
                        .filter(requests::status.eq_any([
                            RequestStatus::Pending.as_str(),
                            RequestStatus::Approved.as_str(),
                        ])),
                )
                .set((
                    requests::status.eq(RequestStatus::Cancelled.as_str()),
                    requests::updated_at.eq(now),
                ))
                .execute(conn)
                .await?;

                if affected == 0 {
                    let exists: i64 = requests::table
                        .filter(requests::id.eq(request_id))
                        .count()
                        .get_result(conn)
                        .await?;
                    return Err(if exists > 0 {
                        StoreError::Stale
                    } else {
                        StoreError::NotFound
                    });
                }

                let row: Option<BookingRow> = bookings::table
                    .filter(bookings::request_id.eq(request_id))
                    .select(BookingRow::as_select())
                    .first(conn)
                    .await
                    .optional()?;

                if let Some(ref booking) = row {
                    diesel::delete(
                        notification_schedules::table
                            .filter(notification_schedules::booking_id.eq(booking.id)),
                    )
                    .execute(conn)
                    .await?;
                    diesel::delete(bookings::table.filter(bookings::id.eq(booking.id)))
                        .execute(conn)
                        .await?;
                }

                Ok(row.map(BookingRow::into_domain))
            }
            .scope_boxed()
        })
        .await
    }
}
