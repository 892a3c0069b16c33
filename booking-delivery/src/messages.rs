use chrono::{NaiveDate, NaiveTime};

use booking_core::types::{BookingSnapshot, ReminderOffset, Room};

/// Title and body of one notification, shared by the in-app row and the
/// email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub title: String,
    pub body: String,
}

fn slot(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> String {
    format!(
        "{} {}-{}",
        date.format("%Y-%m-%d"),
        start.format("%H:%M"),
        end.format("%H:%M")
    )
}

fn room_line(name: &str, location: &str) -> String {
    format!("{} ({})", name, location)
}

pub fn confirmation(room: &Room, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Message {
    Message {
        title: "Booking confirmed".to_string(),
        body: format!(
            "Your booking request was approved.\nRoom: {}\nWhen: {}",
            room_line(&room.name, &room.location),
            slot(date, start, end)
        ),
    }
}

pub fn rejection(date: NaiveDate, start: NaiveTime, end: NaiveTime, reason: &str) -> Message {
    Message {
        title: "Booking request rejected".to_string(),
        body: format!(
            "Your booking request for {} was rejected.\nReason: {}",
            slot(date, start, end),
            reason
        ),
    }
}

pub fn cancellation(snapshot: &BookingSnapshot) -> Message {
    let room = match (&snapshot.room_name, &snapshot.room_location) {
        (Some(name), Some(location)) => format!("\nRoom: {}", room_line(name, location)),
        _ => String::new(),
    };
    Message {
        title: "Booking cancelled".to_string(),
        body: format!(
            "Your booking for {} was cancelled.{}",
            slot(snapshot.date, snapshot.start_time, snapshot.end_time),
            room
        ),
    }
}

pub fn reminder(
    offset: ReminderOffset,
    room: &Room,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
) -> Message {
    Message {
        title: format!("Meeting in {}", offset.label()),
        body: format!(
            "Your meeting starts in {}.\nRoom: {}\nWhen: {}",
            offset.label(),
            room_line(&room.name, &room.location),
            slot(date, start, end)
        ),
    }
}
