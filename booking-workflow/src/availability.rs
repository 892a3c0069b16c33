use chrono::{NaiveDate, NaiveTime};

use booking_core::error::WorkflowError;
use booking_core::repo::{BookingRepo, RoomRepo, SharedStore};
use booking_core::types::{BookingId, Request, Room, RoomId, RoomStatus};
use booking_core::TimeRange;

/// Pure availability queries. No side effects.
#[derive(Clone)]
pub struct AvailabilityChecker {
    store: SharedStore,
}

impl AvailabilityChecker {
    pub fn new(store: SharedStore) -> Self {
        AvailabilityChecker { store }
    }

    /// Whether the room can take a booking for [start, end) on `date`.
    ///
    /// False when the room is missing, inactive or in maintenance; false
    /// when any existing booking overlaps the candidate slot. Equal
    /// boundaries do not conflict. `exclude_booking` ignores a booking
    /// that is being re-evaluated.
    pub async fn is_available(
        &self,
        room_id: RoomId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        exclude_booking: Option<BookingId>,
    ) -> Result<bool, WorkflowError> {
        let room = match self.store.room(room_id).await? {
            Some(room) => room,
            None => return Ok(false),
        };
        if !room.is_active || room.status == RoomStatus::Maintenance {
            return Ok(false);
        }

        let candidate = TimeRange::new(date, start, end);
        let bookings = self.store.bookings_for_room_on(room_id, date).await?;
        Ok(!bookings
            .iter()
            .filter(|b| exclude_booking != Some(b.id))
            .any(|b| b.time_range().overlaps(&candidate)))
    }

    /// Rooms a GA could assign to the request: active, currently
    /// `available`, big enough, and free at the request's slot.
    pub async fn available_rooms_for(
        &self,
        request: &Request,
    ) -> Result<Vec<Room>, WorkflowError> {
        let mut out = Vec::new();
        for room in self.store.active_rooms().await? {
            if room.status != RoomStatus::Available || room.capacity < request.capacity {
                continue;
            }
            if self
                .is_available(
                    room.id,
                    request.date,
                    request.start_time,
                    request.end_time,
                    None,
                )
                .await?
            {
                out.push(room);
            }
        }
        Ok(out)
    }
}
