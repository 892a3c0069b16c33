use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};

use crate::timerange::TimeRange;

pub type UserId = i64;
pub type RoomId = i64;
pub type RequestId = i64;
pub type BookingId = i64;
pub type ScheduleId = i64;
pub type NotificationId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    RoomAdmin,
    GeneralAffairs,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::RoomAdmin => "room_admin",
            Role::GeneralAffairs => "general_affairs",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "member" => Some(Role::Member),
            "room_admin" => Some(Role::RoomAdmin),
            "general_affairs" => Some(Role::GeneralAffairs),
            _ => None,
        }
    }
}

/// The identity an operation runs as. Always passed explicitly; the core
/// never reads an ambient "current user".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Available,
    Occupied,
    Maintenance,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Available => "available",
            RoomStatus::Occupied => "occupied",
            RoomStatus::Maintenance => "maintenance",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "available" => Some(RoomStatus::Available),
            "occupied" => Some(RoomStatus::Occupied),
            "maintenance" => Some(RoomStatus::Maintenance),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub capacity: i32,
    pub location: String,
    pub description: Option<String>,
    pub status: RoomStatus,
    pub is_active: bool,
    pub created_by: UserId,
}

#[derive(Debug, Clone)]
pub struct NewRoom {
    pub name: String,
    pub capacity: i32,
    pub location: String,
    pub description: Option<String>,
    pub created_by: UserId,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomUpdate {
    pub name: Option<String>,
    pub capacity: Option<i32>,
    pub location: Option<String>,
    /// `Some(None)` clears the description; an absent field keeps it.
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub status: Option<RoomStatus>,
    pub is_active: Option<bool>,
}

/// Keeps an explicit JSON `null` apart from an absent field: absent
/// deserializes to `None` via the field default, `null` to `Some(None)`.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "rejected" => Some(RequestStatus::Rejected),
            "cancelled" => Some(RequestStatus::Cancelled),
            _ => None,
        }
    }
}

/// A user's ask to book some room at some time. Distinct from the Booking
/// that approval creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub requester_id: UserId,
    pub capacity: i32,
    pub purpose: String,
    pub notes: Option<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: RequestStatus,
    pub assigned_by: Option<UserId>,
    pub rejection_reason: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Request {
    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(self.date, self.start_time, self.end_time)
    }
}

#[derive(Debug, Clone)]
pub struct NewRequest {
    pub requester_id: UserId,
    pub capacity: i32,
    pub purpose: String,
    pub notes: Option<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Partial update applied to a pending request; absent fields keep their
/// current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestUpdate {
    pub capacity: Option<i32>,
    pub purpose: Option<String>,
    /// `Some(None)` clears the notes; an absent field keeps them.
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
}

/// A confirmed reservation. Created only by approving a Request; date and
/// times are copied from the request at approval time and never change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub request_id: RequestId,
    pub room_id: RoomId,
    pub approved_by: UserId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl Booking {
    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(self.date, self.start_time, self.end_time)
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub request_id: RequestId,
    pub room_id: RoomId,
    pub approved_by: UserId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReminderOffset {
    #[serde(rename = "24h_before")]
    H24,
    #[serde(rename = "3h_before")]
    H3,
    #[serde(rename = "30m_before")]
    M30,
}

impl ReminderOffset {
    pub const ALL: [ReminderOffset; 3] =
        [ReminderOffset::H24, ReminderOffset::H3, ReminderOffset::M30];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderOffset::H24 => "24h_before",
            ReminderOffset::H3 => "3h_before",
            ReminderOffset::M30 => "30m_before",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "24h_before" => Some(ReminderOffset::H24),
            "3h_before" => Some(ReminderOffset::H3),
            "30m_before" => Some(ReminderOffset::M30),
            _ => None,
        }
    }

    pub fn offset(&self) -> chrono::Duration {
        match self {
            ReminderOffset::H24 => chrono::Duration::hours(24),
            ReminderOffset::H3 => chrono::Duration::hours(3),
            ReminderOffset::M30 => chrono::Duration::minutes(30),
        }
    }

    /// Human label embedded in reminder messages.
    pub fn label(&self) -> &'static str {
        match self {
            ReminderOffset::H24 => "24 hours",
            ReminderOffset::H3 => "3 hours",
            ReminderOffset::M30 => "30 minutes",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    InApp,
    Both,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::InApp => "in_app",
            Channel::Both => "both",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "email" => Some(Channel::Email),
            "in_app" => Some(Channel::InApp),
            "both" => Some(Channel::Both),
            _ => None,
        }
    }

    pub fn includes_email(&self) -> bool {
        matches!(self, Channel::Email | Channel::Both)
    }
}

/// One pending reminder. Flips to sent exactly once; never re-sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSchedule {
    pub id: ScheduleId,
    pub booking_id: BookingId,
    pub notify_type: ReminderOffset,
    pub notify_at: NaiveDateTime,
    pub channel: Channel,
    pub is_sent: bool,
    pub sent_at: Option<NaiveDateTime>,
    pub attempts: i32,
    pub last_error: Option<String>,
}

/// A planned reminder, not yet tied to a booking row; `commit_approval`
/// attaches the booking id when it inserts these.
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub notify_type: ReminderOffset,
    pub notify_at: NaiveDateTime,
    pub channel: Channel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub booking_id: Option<BookingId>,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub channel: Channel,
    pub is_read: bool,
    pub read_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: UserId,
    pub booking_id: Option<BookingId>,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub channel: Channel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreference {
    pub user_id: UserId,
    pub notify_24h: bool,
    pub notify_3h: bool,
    pub notify_30m: bool,
    pub email_notifications: bool,
}

impl UserPreference {
    /// Defaults used when a user has never changed anything.
    pub fn default_for(user_id: UserId) -> Self {
        UserPreference {
            user_id,
            notify_24h: true,
            notify_3h: true,
            notify_30m: true,
            email_notifications: true,
        }
    }

    pub fn wants(&self, offset: ReminderOffset) -> bool {
        match offset {
            ReminderOffset::H24 => self.notify_24h,
            ReminderOffset::H3 => self.notify_3h,
            ReminderOffset::M30 => self.notify_30m,
        }
    }
}

/// Slot details captured before cancellation deletes anything, so the
/// cancellation notification does not depend on removed rows. Room fields
/// are absent when the request was still pending (no booking yet).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSnapshot {
    pub room_name: Option<String>,
    pub room_location: Option<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}
