use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use tracing::info;

use booking_core::error::WorkflowError;
use booking_core::queue::{NotifyJob, NotifyQueue};
use booking_core::repo::{
    BookingRepo, PreferenceRepo, RequestRepo, RoomRepo, SharedStore, Store,
};
use booking_core::types::{
    Actor, Booking, BookingSnapshot, NewBooking, NewRequest, Request, RequestId, RequestStatus,
    RequestUpdate, RoomId, UserId,
};
use booking_core::StoreError;

use crate::availability::AvailabilityChecker;
use crate::permissions::Permissions;
use crate::scheduler::plan_schedules;

/// Slot length limits enforced at submission and edit time, in minutes.
pub const MIN_DURATION_MINUTES: i64 = 30;
pub const MAX_DURATION_MINUTES: i64 = 8 * 60;

/// How far ahead a request may be placed.
pub const MAX_DAYS_AHEAD: i64 = 30;

/// Payload for a new request, as it arrives over the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub capacity: i32,
    pub purpose: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// The request/booking state machine. Every transition validates, applies
/// one atomic store unit, and only then enqueues notification work.
#[derive(Clone)]
pub struct Workflow {
    store: SharedStore,
    checker: AvailabilityChecker,
    queue: NotifyQueue,
}

impl Workflow {
    pub fn new(store: SharedStore, queue: NotifyQueue) -> Self {
        let checker = AvailabilityChecker::new(store.clone());
        Workflow {
            store,
            checker,
            queue,
        }
    }

    pub fn availability(&self) -> &AvailabilityChecker {
        &self.checker
    }

    /// Member submits a request; it enters the queue as `pending`.
    pub async fn submit(
        &self,
        actor: Actor,
        submit: SubmitRequest,
        now: NaiveDateTime,
    ) -> Result<Request, WorkflowError> {
        let purpose = submit.purpose.trim().to_string();
        if purpose.is_empty() {
            return Err(WorkflowError::validation("purpose", "must not be empty"));
        }
        if submit.capacity < 1 {
            return Err(WorkflowError::validation("capacity", "must be at least 1"));
        }
        validate_slot(submit.date, submit.start_time, submit.end_time, now)?;

        let request = self
            .store
            .create_request(
                NewRequest {
                    requester_id: actor.id,
                    capacity: submit.capacity,
                    purpose,
                    notes: submit.notes,
                    date: submit.date,
                    start_time: submit.start_time,
                    end_time: submit.end_time,
                },
                now,
            )
            .await?;

        info!(request_id = request.id, requester = actor.id, "request submitted");
        Ok(request)
    }

    /// Requester edits their own request while it is still pending.
    pub async fn update(
        &self,
        actor: Actor,
        request_id: RequestId,
        fields: RequestUpdate,
        now: NaiveDateTime,
    ) -> Result<Request, WorkflowError> {
        let request = self.load(request_id).await?;
        if request.requester_id != actor.id {
            return Err(WorkflowError::Forbidden(
                "only the requester may edit a request".to_string(),
            ));
        }
        if request.status != RequestStatus::Pending {
            return Err(WorkflowError::InvalidState(
                "only pending requests can be edited".to_string(),
            ));
        }

        // Validate the request as it will look after the merge.
        let capacity = fields.capacity.unwrap_or(request.capacity);
        if capacity < 1 {
            return Err(WorkflowError::validation("capacity", "must be at least 1"));
        }
        if let Some(purpose) = &fields.purpose {
            if purpose.trim().is_empty() {
                return Err(WorkflowError::validation("purpose", "must not be empty"));
            }
        }
        let date = fields.date.unwrap_or(request.date);
        let start = fields.start_time.unwrap_or(request.start_time);
        let end = fields.end_time.unwrap_or(request.end_time);
        validate_slot(date, start, end, now)?;

        match self.store.update_pending_request(request_id, fields, now).await {
            Ok(updated) => Ok(updated),
            Err(StoreError::Stale) => Err(WorkflowError::InvalidState(
                "request was already handled".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// GA approves a pending request by assigning a room. The store applies
    /// the whole unit atomically and re-checks the slot, so a lost race
    /// surfaces as `Conflict` here rather than as a double booking.
    pub async fn approve(
        &self,
        actor: Actor,
        request_id: RequestId,
        room_id: RoomId,
        now: NaiveDateTime,
    ) -> Result<Booking, WorkflowError> {
        if !actor.can_review_requests() {
            return Err(WorkflowError::Forbidden(
                "only general affairs may approve requests".to_string(),
            ));
        }

        let request = self.load(request_id).await?;
        if request.status != RequestStatus::Pending {
            return Err(WorkflowError::InvalidState(format!(
                "cannot approve a {} request",
                request.status.as_str()
            )));
        }
        if request.date < now.date() {
            return Err(WorkflowError::InvalidState(
                "cannot approve a request whose date has passed".to_string(),
            ));
        }

        if self.store.room(room_id).await?.is_none() {
            return Err(WorkflowError::NotFound("room"));
        }
        if !self
            .checker
            .is_available(
                room_id,
                request.date,
                request.start_time,
                request.end_time,
                None,
            )
            .await?
        {
            return Err(WorkflowError::Conflict(
                "room not available at the requested time".to_string(),
            ));
        }

        let prefs = self.store.preferences(request.requester_id).await?;
        let schedules = plan_schedules(request.date.and_time(request.start_time), &prefs, now);

        let booking = match self
            .store
            .commit_approval(
                request_id,
                actor.id,
                NewBooking {
                    request_id,
                    room_id,
                    approved_by: actor.id,
                    date: request.date,
                    start_time: request.start_time,
                    end_time: request.end_time,
                },
                schedules,
                now,
            )
            .await
        {
            Ok(booking) => booking,
            Err(StoreError::Conflict) => {
                return Err(WorkflowError::Conflict(
                    "room not available at the requested time".to_string(),
                ))
            }
            Err(StoreError::Stale) => {
                return Err(WorkflowError::InvalidState(
                    "request was already handled".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            request_id,
            booking_id = booking.id,
            room_id,
            approver = actor.id,
            "request approved"
        );
        self.queue.enqueue(NotifyJob::BookingConfirmed {
            booking_id: booking.id,
        });
        Ok(booking)
    }

    /// GA rejects a pending request with a reason the requester will see.
    pub async fn reject(
        &self,
        actor: Actor,
        request_id: RequestId,
        reason: &str,
        now: NaiveDateTime,
    ) -> Result<(), WorkflowError> {
        if !actor.can_review_requests() {
            return Err(WorkflowError::Forbidden(
                "only general affairs may reject requests".to_string(),
            ));
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(WorkflowError::validation("reason", "must not be empty"));
        }

        let request = self.load(request_id).await?;
        if request.status != RequestStatus::Pending {
            return Err(WorkflowError::InvalidState(format!(
                "cannot reject a {} request",
                request.status.as_str()
            )));
        }

        match self
            .store
            .commit_rejection(request_id, actor.id, reason, now)
            .await
        {
            Ok(()) => {}
            Err(StoreError::Stale) => {
                return Err(WorkflowError::InvalidState(
                    "request was already handled".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        }

        info!(request_id, approver = actor.id, "request rejected");
        self.queue.enqueue(NotifyJob::RequestRejected { request_id });
        Ok(())
    }

    /// Requester cancels their own request. A pending request just flips
    /// state; an approved one also loses its booking and reminders, and GA
    /// is told the slot is free again.
    pub async fn cancel(
        &self,
        actor: Actor,
        request_id: RequestId,
        now: NaiveDateTime,
    ) -> Result<(), WorkflowError> {
        let request = self.load(request_id).await?;
        if request.requester_id != actor.id {
            return Err(WorkflowError::Forbidden(
                "only the requester may cancel a request".to_string(),
            ));
        }
        match request.status {
            RequestStatus::Pending => {}
            RequestStatus::Approved if request.date >= now.date() => {}
            RequestStatus::Approved => {
                return Err(WorkflowError::InvalidState(
                    "cannot cancel a booking whose date has passed".to_string(),
                ))
            }
            _ => {
                return Err(WorkflowError::InvalidState(format!(
                    "cannot cancel a {} request",
                    request.status.as_str()
                )))
            }
        }

        // Capture everything the cancellation notice needs before the
        // cascade removes the booking.
        let snapshot = self.snapshot_for(&request).await?;

        match self.store.commit_cancellation(request_id, now).await {
            Ok(_) => {}
            Err(StoreError::Stale) => {
                return Err(WorkflowError::InvalidState(
                    "request was already handled".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        }

        info!(request_id, requester = actor.id, "request cancelled");
        self.queue.enqueue(NotifyJob::BookingCancelled {
            requester_id: request.requester_id,
            cancelled_by: actor.id,
            snapshot,
        });
        Ok(())
    }

    pub async fn get(&self, request_id: RequestId) -> Result<Request, WorkflowError> {
        self.load(request_id).await
    }

    pub async fn list(
        &self,
        actor: Actor,
        status: Option<RequestStatus>,
    ) -> Result<Vec<Request>, WorkflowError> {
        // Reviewers see the whole queue; everyone else only their own.
        let requester: Option<UserId> = if actor.can_review_requests() {
            None
        } else {
            Some(actor.id)
        };
        Ok(self.store.list_requests(status, requester).await?)
    }

    async fn load(&self, request_id: RequestId) -> Result<Request, WorkflowError> {
        self.store
            .request(request_id)
            .await?
            .ok_or(WorkflowError::NotFound("request"))
    }

    async fn snapshot_for(&self, request: &Request) -> Result<BookingSnapshot, WorkflowError> {
        let booking = self.store.booking_for_request(request.id).await?;
        let room = match &booking {
            Some(b) => self.store.room(b.room_id).await?,
            None => None,
        };
        Ok(BookingSnapshot {
            room_name: room.as_ref().map(|r| r.name.clone()),
            room_location: room.as_ref().map(|r| r.location.clone()),
            date: request.date,
            start_time: request.start_time,
            end_time: request.end_time,
        })
    }
}

fn validate_slot(
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    now: NaiveDateTime,
) -> Result<(), WorkflowError> {
    if end <= start {
        return Err(WorkflowError::validation(
            "end_time",
            "must be after start_time",
        ));
    }
    let duration = end - start;
    if duration < Duration::minutes(MIN_DURATION_MINUTES) {
        return Err(WorkflowError::validation(
            "end_time",
            "slot must be at least 30 minutes",
        ));
    }
    if duration > Duration::minutes(MAX_DURATION_MINUTES) {
        return Err(WorkflowError::validation(
            "end_time",
            "slot must be at most 8 hours",
        ));
    }
    let today = now.date();
    if date < today {
        return Err(WorkflowError::validation("date", "must not be in the past"));
    }
    if date > today + Duration::days(MAX_DAYS_AHEAD) {
        return Err(WorkflowError::validation(
            "date",
            "must be within 30 days from today",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use booking_core::repo::{BookingRepo, ScheduleRepo, Store};
    use booking_core::types::*;
    use booking_store::MemStore;
    use std::sync::Arc;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Fixture {
        store: Arc<MemStore>,
        workflow: Workflow,
        rx: UnboundedReceiver<NotifyJob>,
        member: Actor,
        ga: Actor,
        room: Room,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemStore::new());
        let member_user = store.add_user("Ana", "ana@example.com", Role::Member).await;
        let ga_user = store
            .add_user("Gani", "gani@example.com", Role::GeneralAffairs)
            .await;
        let room = store
            .add_room(NewRoom {
                name: "Discussion Room".to_string(),
                capacity: 6,
                location: "2F".to_string(),
                description: None,
                created_by: ga_user.id,
            })
            .await;
        let (queue, rx) = NotifyQueue::channel();
        let workflow = Workflow::new(store.clone() as SharedStore, queue);
        Fixture {
            store,
            workflow,
            rx,
            member: Actor {
                id: member_user.id,
                role: Role::Member,
            },
            ga: Actor {
                id: ga_user.id,
                role: Role::GeneralAffairs,
            },
            room,
        }
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn now() -> NaiveDateTime {
        d(1).and_time(t(9, 0))
    }

    fn submit_payload() -> SubmitRequest {
        SubmitRequest {
            capacity: 4,
            purpose: "Sprint planning".to_string(),
            notes: None,
            date: d(10),
            start_time: t(14, 0),
            end_time: t(15, 0),
        }
    }

    async fn submitted(fx: &Fixture) -> Request {
        fx.workflow
            .submit(fx.member, submit_payload(), now())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn submit_validates_payload() {
        let fx = fixture().await;

        let err = fx
            .workflow
            .submit(
                fx.member,
                SubmitRequest {
                    purpose: "  ".to_string(),
                    ..submit_payload()
                },
                now(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");

        let err = fx
            .workflow
            .submit(
                fx.member,
                SubmitRequest {
                    capacity: 0,
                    ..submit_payload()
                },
                now(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");

        // 15-minute slot is below the minimum.
        let err = fx
            .workflow
            .submit(
                fx.member,
                SubmitRequest {
                    end_time: t(14, 15),
                    ..submit_payload()
                },
                now(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");

        // 9 hours is above the maximum.
        let err = fx
            .workflow
            .submit(
                fx.member,
                SubmitRequest {
                    start_time: t(8, 0),
                    end_time: t(17, 30),
                    ..submit_payload()
                },
                now(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");

        let err = fx
            .workflow
            .submit(
                fx.member,
                SubmitRequest {
                    date: d(1) - Duration::days(1),
                    ..submit_payload()
                },
                now(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");

        let err = fx
            .workflow
            .submit(
                fx.member,
                SubmitRequest {
                    date: d(1) + Duration::days(31),
                    ..submit_payload()
                },
                now(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn submit_creates_pending_request() {
        let fx = fixture().await;
        let request = submitted(&fx).await;

        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.requester_id, fx.member.id);
        assert_eq!(request.purpose, "Sprint planning");
    }

    #[tokio::test]
    async fn approve_creates_booking_schedules_and_notification_job() {
        let mut fx = fixture().await;
        let request = submitted(&fx).await;

        let booking = fx
            .workflow
            .approve(fx.ga, request.id, fx.room.id, now())
            .await
            .unwrap();

        assert_eq!(booking.room_id, fx.room.id);
        assert_eq!(booking.request_id, request.id);

        let updated = fx.workflow.get(request.id).await.unwrap();
        assert_eq!(updated.status, RequestStatus::Approved);
        assert_eq!(updated.assigned_by, Some(fx.ga.id));

        // Default preferences plan all three reminders; all fire times are
        // in the future relative to the 2024-06-01 approval.
        let schedules = fx.store.schedules_for_booking(booking.id).await.unwrap();
        assert_eq!(schedules.len(), 3);

        match fx.rx.try_recv().unwrap() {
            NotifyJob::BookingConfirmed { booking_id } => assert_eq!(booking_id, booking.id),
            other => panic!("unexpected job: {other:?}"),
        }
    }

    #[tokio::test]
    async fn approve_requires_reviewer_role() {
        let fx = fixture().await;
        let request = submitted(&fx).await;

        let err = fx
            .workflow
            .approve(fx.member, request.id, fx.room.id, now())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "forbidden");
    }

    #[tokio::test]
    async fn approve_twice_fails_and_leaves_one_booking() {
        let fx = fixture().await;
        let request = submitted(&fx).await;

        fx.workflow
            .approve(fx.ga, request.id, fx.room.id, now())
            .await
            .unwrap();
        let err = fx
            .workflow
            .approve(fx.ga, request.id, fx.room.id, now())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_state");

        let bookings = fx
            .store
            .bookings_for_room_on(fx.room.id, d(10))
            .await
            .unwrap();
        assert_eq!(bookings.len(), 1);
    }

    #[tokio::test]
    async fn approve_conflicting_slot_fails() {
        let fx = fixture().await;
        let first = submitted(&fx).await;
        fx.workflow
            .approve(fx.ga, first.id, fx.room.id, now())
            .await
            .unwrap();

        // Second request overlaps the first by half an hour.
        let second = fx
            .workflow
            .submit(
                fx.member,
                SubmitRequest {
                    start_time: t(14, 30),
                    end_time: t(15, 30),
                    ..submit_payload()
                },
                now(),
            )
            .await
            .unwrap();

        let err = fx
            .workflow
            .approve(fx.ga, second.id, fx.room.id, now())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "conflict");

        // The loser's request is untouched and can go to another room.
        let second = fx.workflow.get(second.id).await.unwrap();
        assert_eq!(second.status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn approve_unknown_room_is_not_found() {
        let fx = fixture().await;
        let request = submitted(&fx).await;

        let err = fx
            .workflow
            .approve(fx.ga, request.id, 999, now())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn reject_records_reason_and_enqueues_job() {
        let mut fx = fixture().await;
        let request = submitted(&fx).await;

        fx.workflow
            .reject(fx.ga, request.id, "no projector available", now())
            .await
            .unwrap();

        let updated = fx.workflow.get(request.id).await.unwrap();
        assert_eq!(updated.status, RequestStatus::Rejected);
        assert_eq!(
            updated.rejection_reason.as_deref(),
            Some("no projector available")
        );

        match fx.rx.try_recv().unwrap() {
            NotifyJob::RequestRejected { request_id } => assert_eq!(request_id, request.id),
            other => panic!("unexpected job: {other:?}"),
        }
    }

    #[tokio::test]
    async fn reject_requires_a_reason() {
        let fx = fixture().await;
        let request = submitted(&fx).await;

        let err = fx
            .workflow
            .reject(fx.ga, request.id, "   ", now())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn reject_after_approval_is_invalid_state() {
        let fx = fixture().await;
        let request = submitted(&fx).await;
        fx.workflow
            .approve(fx.ga, request.id, fx.room.id, now())
            .await
            .unwrap();

        let err = fx
            .workflow
            .reject(fx.ga, request.id, "too late", now())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_state");
    }

    #[tokio::test]
    async fn cancel_approved_request_removes_booking_and_reminders() {
        let mut fx = fixture().await;
        let request = submitted(&fx).await;
        let booking = fx
            .workflow
            .approve(fx.ga, request.id, fx.room.id, now())
            .await
            .unwrap();
        let _ = fx.rx.try_recv();

        fx.workflow.cancel(fx.member, request.id, now()).await.unwrap();

        let updated = fx.workflow.get(request.id).await.unwrap();
        assert_eq!(updated.status, RequestStatus::Cancelled);
        assert!(fx.store.booking(booking.id).await.unwrap().is_none());
        assert!(fx
            .store
            .schedules_for_booking(booking.id)
            .await
            .unwrap()
            .is_empty());

        // The job carries a snapshot with the room details, even though the
        // booking row is gone.
        match fx.rx.try_recv().unwrap() {
            NotifyJob::BookingCancelled {
                requester_id,
                cancelled_by,
                snapshot,
            } => {
                assert_eq!(requester_id, fx.member.id);
                assert_eq!(cancelled_by, fx.member.id);
                assert_eq!(snapshot.room_name.as_deref(), Some("Discussion Room"));
                assert_eq!(snapshot.date, d(10));
            }
            other => panic!("unexpected job: {other:?}"),
        }

        // The freed slot is bookable again.
        let another = submitted(&fx).await;
        fx.workflow
            .approve(fx.ga, another.id, fx.room.id, now())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancel_pending_request_has_no_room_in_snapshot() {
        let mut fx = fixture().await;
        let request = submitted(&fx).await;

        fx.workflow.cancel(fx.member, request.id, now()).await.unwrap();

        match fx.rx.try_recv().unwrap() {
            NotifyJob::BookingCancelled { snapshot, .. } => {
                assert!(snapshot.room_name.is_none());
                assert_eq!(snapshot.start_time, t(14, 0));
            }
            other => panic!("unexpected job: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_is_requester_only() {
        let fx = fixture().await;
        let request = submitted(&fx).await;

        let err = fx
            .workflow
            .cancel(fx.ga, request.id, now())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "forbidden");
    }

    #[tokio::test]
    async fn cancel_twice_is_invalid_state() {
        let fx = fixture().await;
        let request = submitted(&fx).await;
        fx.workflow.cancel(fx.member, request.id, now()).await.unwrap();

        let err = fx
            .workflow
            .cancel(fx.member, request.id, now())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_state");
    }

    #[tokio::test]
    async fn update_edits_pending_request_only() {
        let fx = fixture().await;
        let request = submitted(&fx).await;

        let updated = fx
            .workflow
            .update(
                fx.member,
                request.id,
                RequestUpdate {
                    capacity: Some(5),
                    start_time: Some(t(15, 0)),
                    end_time: Some(t(16, 0)),
                    ..Default::default()
                },
                now(),
            )
            .await
            .unwrap();
        assert_eq!(updated.capacity, 5);
        assert_eq!(updated.start_time, t(15, 0));

        fx.workflow
            .approve(fx.ga, request.id, fx.room.id, now())
            .await
            .unwrap();
        let err = fx
            .workflow
            .update(
                fx.member,
                request.id,
                RequestUpdate {
                    capacity: Some(2),
                    ..Default::default()
                },
                now(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_state");
    }

    #[tokio::test]
    async fn update_can_clear_the_notes() {
        let fx = fixture().await;
        let request = fx
            .workflow
            .submit(
                fx.member,
                SubmitRequest {
                    notes: Some("bring the projector".to_string()),
                    ..submit_payload()
                },
                now(),
            )
            .await
            .unwrap();

        // An absent field leaves the notes alone.
        let updated = fx
            .workflow
            .update(
                fx.member,
                request.id,
                RequestUpdate {
                    capacity: Some(5),
                    ..Default::default()
                },
                now(),
            )
            .await
            .unwrap();
        assert_eq!(updated.notes.as_deref(), Some("bring the projector"));

        // An explicit null clears them.
        let updated = fx
            .workflow
            .update(
                fx.member,
                request.id,
                RequestUpdate {
                    notes: Some(None),
                    ..Default::default()
                },
                now(),
            )
            .await
            .unwrap();
        assert!(updated.notes.is_none());
    }

    #[tokio::test]
    async fn update_validates_the_merged_slot() {
        let fx = fixture().await;
        let request = submitted(&fx).await;

        // Moving only the end time before the existing start must fail.
        let err = fx
            .workflow
            .update(
                fx.member,
                request.id,
                RequestUpdate {
                    end_time: Some(t(13, 0)),
                    ..Default::default()
                },
                now(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn list_scopes_to_requester_unless_reviewer() {
        let fx = fixture().await;
        submitted(&fx).await;

        let other = fx
            .store
            .add_user("Ben", "ben@example.com", Role::Member)
            .await;
        let other_actor = Actor {
            id: other.id,
            role: Role::Member,
        };

        assert!(fx
            .workflow
            .list(other_actor, None)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(fx.workflow.list(fx.member, None).await.unwrap().len(), 1);
        assert_eq!(fx.workflow.list(fx.ga, None).await.unwrap().len(), 1);
    }
}
