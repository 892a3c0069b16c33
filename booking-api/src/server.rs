use std::net::SocketAddr;

use anyhow::Result;
use axum::extract::Extension;
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use booking_core::config::ServerConfig;
use booking_core::repo::SharedStore;
use booking_jobs::{NotificationRetention, RoomReconciler};
use booking_workflow::{RoomService, Workflow};

use crate::handlers;

/// Everything a handler can reach, injected as one extension.
#[derive(Clone)]
pub struct ApiContext {
    pub store: SharedStore,
    pub workflow: Workflow,
    pub rooms: RoomService,
    pub dispatcher: std::sync::Arc<booking_jobs::ReminderDispatcher>,
    pub reconciler: RoomReconciler,
    pub retention: NotificationRetention,
}

pub fn router(ctx: ApiContext) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/requests", post(handlers::submit_request))
        .route("/api/v1/requests", get(handlers::list_requests))
        .route("/api/v1/requests/:id", get(handlers::get_request))
        .route("/api/v1/requests/:id", patch(handlers::update_request))
        .route("/api/v1/requests/:id/approve", post(handlers::approve_request))
        .route("/api/v1/requests/:id/reject", post(handlers::reject_request))
        .route("/api/v1/requests/:id/cancel", post(handlers::cancel_request))
        .route(
            "/api/v1/requests/:id/available-rooms",
            get(handlers::available_rooms),
        )
        .route("/api/v1/rooms", get(handlers::list_rooms))
        .route("/api/v1/rooms", post(handlers::create_room))
        .route("/api/v1/rooms/:id", get(handlers::get_room))
        .route("/api/v1/rooms/:id", patch(handlers::update_room))
        .route(
            "/api/v1/rooms/:id/availability",
            get(handlers::room_availability),
        )
        .route("/api/v1/notifications", get(handlers::list_notifications))
        .route(
            "/api/v1/notifications/:id/read",
            post(handlers::read_notification),
        )
        .route(
            "/api/v1/notifications/:id",
            delete(handlers::delete_notification),
        )
        .route("/api/v1/preferences", get(handlers::get_preferences))
        .route("/api/v1/preferences", put(handlers::put_preferences))
        .route("/api/v1/jobs/reminders/run", post(handlers::run_reminders))
        .route("/api/v1/jobs/reconcile/run", post(handlers::run_reconcile))
        .route("/api/v1/jobs/retention/run", post(handlers::run_retention))
        .layer(
            ServiceBuilder::new()
                .layer(Extension(ctx))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

pub async fn run(config: &ServerConfig, ctx: ApiContext) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}
