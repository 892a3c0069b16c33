use axum::extract::{Extension, Path, Query};
use axum::http::HeaderMap;
use axum::response::Json;
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;

use booking_core::error::WorkflowError;
use booking_core::repo::{NotificationRepo, PreferenceRepo};
use booking_core::types::{RequestStatus, RequestUpdate, RoomUpdate, UserPreference};
use booking_workflow::rooms::CreateRoom;
use booking_workflow::{Permissions, SubmitRequest};

use crate::auth::actor;
use crate::error::ApiError;
use crate::server::ApiContext;

type ApiResult = Result<Json<serde_json::Value>, ApiError>;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "booking-api"
    }))
}

// -------- requests --------

pub async fn submit_request(
    Extension(ctx): Extension<ApiContext>,
    headers: HeaderMap,
    Json(body): Json<SubmitRequest>,
) -> ApiResult {
    let actor = actor(&ctx.store, &headers).await?;
    let request = ctx
        .workflow
        .submit(actor, body, Utc::now().naive_utc())
        .await?;
    Ok(Json(serde_json::to_value(request).unwrap_or_default()))
}

#[derive(Deserialize)]
pub struct ListRequestsQuery {
    #[serde(default)]
    pub status: Option<RequestStatus>,
}

pub async fn list_requests(
    Extension(ctx): Extension<ApiContext>,
    headers: HeaderMap,
    Query(params): Query<ListRequestsQuery>,
) -> ApiResult {
    let actor = actor(&ctx.store, &headers).await?;
    let requests = ctx.workflow.list(actor, params.status).await?;
    Ok(Json(serde_json::to_value(requests).unwrap_or_default()))
}

pub async fn get_request(
    Extension(ctx): Extension<ApiContext>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult {
    let actor = actor(&ctx.store, &headers).await?;
    let request = ctx.workflow.get(id).await?;
    if request.requester_id != actor.id && !actor.can_review_requests() {
        return Err(ApiError(WorkflowError::Forbidden(
            "not your request".to_string(),
        )));
    }
    Ok(Json(serde_json::to_value(request).unwrap_or_default()))
}

pub async fn update_request(
    Extension(ctx): Extension<ApiContext>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<RequestUpdate>,
) -> ApiResult {
    let actor = actor(&ctx.store, &headers).await?;
    let request = ctx
        .workflow
        .update(actor, id, body, Utc::now().naive_utc())
        .await?;
    Ok(Json(serde_json::to_value(request).unwrap_or_default()))
}

#[derive(Deserialize)]
pub struct ApproveBody {
    pub room_id: i64,
}

pub async fn approve_request(
    Extension(ctx): Extension<ApiContext>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<ApproveBody>,
) -> ApiResult {
    let actor = actor(&ctx.store, &headers).await?;
    let booking = ctx
        .workflow
        .approve(actor, id, body.room_id, Utc::now().naive_utc())
        .await?;
    Ok(Json(serde_json::to_value(booking).unwrap_or_default()))
}

#[derive(Deserialize)]
pub struct RejectBody {
    pub reason: String,
}

pub async fn reject_request(
    Extension(ctx): Extension<ApiContext>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<RejectBody>,
) -> ApiResult {
    let actor = actor(&ctx.store, &headers).await?;
    ctx.workflow
        .reject(actor, id, &body.reason, Utc::now().naive_utc())
        .await?;
    Ok(Json(serde_json::json!({"status": "rejected"})))
}

pub async fn cancel_request(
    Extension(ctx): Extension<ApiContext>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult {
    let actor = actor(&ctx.store, &headers).await?;
    ctx.workflow
        .cancel(actor, id, Utc::now().naive_utc())
        .await?;
    Ok(Json(serde_json::json!({"status": "cancelled"})))
}

pub async fn available_rooms(
    Extension(ctx): Extension<ApiContext>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult {
    let actor = actor(&ctx.store, &headers).await?;
    if !actor.can_review_requests() {
        return Err(ApiError(WorkflowError::Forbidden(
            "only general affairs may assign rooms".to_string(),
        )));
    }
    let request = ctx.workflow.get(id).await?;
    let rooms = ctx.workflow.availability().available_rooms_for(&request).await?;
    Ok(Json(serde_json::to_value(rooms).unwrap_or_default()))
}

// -------- rooms --------

#[derive(Deserialize)]
pub struct ListRoomsQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

pub async fn list_rooms(
    Extension(ctx): Extension<ApiContext>,
    Query(params): Query<ListRoomsQuery>,
) -> ApiResult {
    let rooms = ctx.rooms.list(params.include_inactive).await?;
    Ok(Json(serde_json::to_value(rooms).unwrap_or_default()))
}

pub async fn create_room(
    Extension(ctx): Extension<ApiContext>,
    headers: HeaderMap,
    Json(body): Json<CreateRoom>,
) -> ApiResult {
    let actor = actor(&ctx.store, &headers).await?;
    let room = ctx.rooms.create(actor, body).await?;
    Ok(Json(serde_json::to_value(room).unwrap_or_default()))
}

pub async fn get_room(
    Extension(ctx): Extension<ApiContext>,
    Path(id): Path<i64>,
) -> ApiResult {
    let room = ctx.rooms.get(id).await?;
    Ok(Json(serde_json::to_value(room).unwrap_or_default()))
}

pub async fn update_room(
    Extension(ctx): Extension<ApiContext>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<RoomUpdate>,
) -> ApiResult {
    let actor = actor(&ctx.store, &headers).await?;
    let room = ctx.rooms.update(actor, id, body).await?;
    Ok(Json(serde_json::to_value(room).unwrap_or_default()))
}

#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

pub async fn room_availability(
    Extension(ctx): Extension<ApiContext>,
    Path(id): Path<i64>,
    Query(params): Query<AvailabilityQuery>,
) -> ApiResult {
    let available = ctx
        .workflow
        .availability()
        .is_available(id, params.date, params.start_time, params.end_time, None)
        .await?;
    Ok(Json(serde_json::json!({"available": available})))
}

// -------- notifications --------

#[derive(Deserialize)]
pub struct NotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
}

pub async fn list_notifications(
    Extension(ctx): Extension<ApiContext>,
    headers: HeaderMap,
    Query(params): Query<NotificationsQuery>,
) -> ApiResult {
    let actor = actor(&ctx.store, &headers).await?;
    let rows = ctx
        .store
        .notifications_for_user(actor.id, params.unread_only)
        .await
        .map_err(WorkflowError::from)?;
    Ok(Json(serde_json::to_value(rows).unwrap_or_default()))
}

pub async fn read_notification(
    Extension(ctx): Extension<ApiContext>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult {
    let actor = actor(&ctx.store, &headers).await?;
    let updated = ctx
        .store
        .mark_notification_read(id, actor.id, Utc::now().naive_utc())
        .await
        .map_err(WorkflowError::from)?;
    if !updated {
        return Ok(Json(serde_json::json!({"status": "already_read"})));
    }
    Ok(Json(serde_json::json!({"status": "ok"})))
}

pub async fn delete_notification(
    Extension(ctx): Extension<ApiContext>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult {
    let actor = actor(&ctx.store, &headers).await?;
    ctx.store
        .delete_notification(id, actor.id)
        .await
        .map_err(WorkflowError::from)?;
    Ok(Json(serde_json::json!({"status": "ok"})))
}

// -------- preferences --------

pub async fn get_preferences(
    Extension(ctx): Extension<ApiContext>,
    headers: HeaderMap,
) -> ApiResult {
    let actor = actor(&ctx.store, &headers).await?;
    let prefs = ctx
        .store
        .preferences(actor.id)
        .await
        .map_err(WorkflowError::from)?;
    Ok(Json(serde_json::to_value(prefs).unwrap_or_default()))
}

#[derive(Deserialize)]
pub struct PreferencesBody {
    pub notify_24h: Option<bool>,
    pub notify_3h: Option<bool>,
    pub notify_30m: Option<bool>,
    pub email_notifications: Option<bool>,
}

pub async fn put_preferences(
    Extension(ctx): Extension<ApiContext>,
    headers: HeaderMap,
    Json(body): Json<PreferencesBody>,
) -> ApiResult {
    let actor = actor(&ctx.store, &headers).await?;
    let current = ctx
        .store
        .preferences(actor.id)
        .await
        .map_err(WorkflowError::from)?;
    let prefs = UserPreference {
        user_id: actor.id,
        notify_24h: body.notify_24h.unwrap_or(current.notify_24h),
        notify_3h: body.notify_3h.unwrap_or(current.notify_3h),
        notify_30m: body.notify_30m.unwrap_or(current.notify_30m),
        email_notifications: body.email_notifications.unwrap_or(current.email_notifications),
    };
    ctx.store
        .set_preferences(prefs.clone(), Utc::now().naive_utc())
        .await
        .map_err(WorkflowError::from)?;
    Ok(Json(serde_json::to_value(prefs).unwrap_or_default()))
}

// -------- jobs --------

pub async fn run_reminders(
    Extension(ctx): Extension<ApiContext>,
    headers: HeaderMap,
) -> ApiResult {
    require_job_runner(&ctx, &headers).await?;
    let report = ctx
        .dispatcher
        .run_once(Utc::now().naive_utc())
        .await
        .map_err(|e| WorkflowError::Store(booking_core::StoreError::Backend(e)))?;
    Ok(Json(serde_json::json!({
        "sent": report.sent,
        "failed": report.failed,
        "orphaned": report.orphaned,
        "skipped": report.skipped,
    })))
}

pub async fn run_reconcile(
    Extension(ctx): Extension<ApiContext>,
    headers: HeaderMap,
) -> ApiResult {
    require_job_runner(&ctx, &headers).await?;
    let changed = ctx
        .reconciler
        .run_once(Utc::now().naive_utc())
        .await
        .map_err(|e| WorkflowError::Store(booking_core::StoreError::Backend(e)))?;
    Ok(Json(serde_json::json!({"changed": changed})))
}

pub async fn run_retention(
    Extension(ctx): Extension<ApiContext>,
    headers: HeaderMap,
) -> ApiResult {
    require_job_runner(&ctx, &headers).await?;
    let removed = ctx
        .retention
        .run_once(Utc::now().naive_utc())
        .await
        .map_err(|e| WorkflowError::Store(booking_core::StoreError::Backend(e)))?;
    Ok(Json(serde_json::json!({"removed": removed})))
}

async fn require_job_runner(ctx: &ApiContext, headers: &HeaderMap) -> Result<(), ApiError> {
    let actor = actor(&ctx.store, headers).await?;
    if !actor.can_run_jobs() {
        return Err(ApiError(WorkflowError::Forbidden(
            "only general affairs may trigger jobs".to_string(),
        )));
    }
    Ok(())
}
