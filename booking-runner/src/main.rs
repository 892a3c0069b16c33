use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};

use booking_api::ApiContext;
use booking_core::repo::SharedStore;
use booking_core::types::{NewRoom, Role};
use booking_core::{Config, NotifyQueue};
use booking_delivery::{Notifier, ResendMailer, SharedMailer};
use booking_jobs::{NotificationRetention, ReminderDispatcher, RoomReconciler};
use booking_store::{MemStore, PgStore};
use booking_workflow::{RoomService, Workflow};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting room booking server");

    let config = Config::from_env();

    let store: SharedStore = if config.database.url.is_some() {
        booking_core::db::run_migrations(&config.database).await?;
        let pool = booking_core::db::create_pool(&config.database).await?;
        Arc::new(PgStore::new(pool))
    } else {
        warn!("DATABASE_URL not set, using the in-memory store; data will not survive a restart");
        let mem = Arc::new(MemStore::new());
        seed_demo_data(&mem).await;
        mem
    };

    let (queue, rx) = NotifyQueue::channel();
    let workflow = Workflow::new(store.clone(), queue);
    let rooms = RoomService::new(store.clone());

    let mailer: SharedMailer = Arc::new(ResendMailer::new(&config.email)?);
    let notifier = Notifier::new(store.clone(), mailer);

    let dispatcher = ReminderDispatcher::new(store.clone(), notifier.clone());
    let reconciler = RoomReconciler::new(store.clone());
    let retention = NotificationRetention::new(store.clone(), config.jobs.retention_days);

    tokio::spawn(booking_delivery::worker::run(rx, notifier.clone()));
    tokio::spawn(dispatcher.clone().run(config.jobs.reminder_interval_secs));
    tokio::spawn(
        reconciler
            .clone()
            .run(config.jobs.reconcile_interval_secs),
    );
    tokio::spawn(
        retention
            .clone()
            .run(config.jobs.retention_interval_secs),
    );

    let ctx = ApiContext {
        store,
        workflow,
        rooms,
        dispatcher,
        reconciler,
        retention,
    };

    if let Err(e) = booking_api::run(&config.server, ctx).await {
        error!(error = %e, "API server exited");
        return Err(e);
    }
    Ok(())
}

/// Minimal fixtures so the in-memory dev mode is usable out of the box.
async fn seed_demo_data(store: &Arc<MemStore>) {
    let member = store.add_user("Demo Member", "member@example.com", Role::Member).await;
    let admin = store
        .add_user("Demo Room Admin", "admin@example.com", Role::RoomAdmin)
        .await;
    let ga = store
        .add_user("Demo General Affairs", "ga@example.com", Role::GeneralAffairs)
        .await;
    store
        .add_room(NewRoom {
            name: "Small Meeting Room".to_string(),
            capacity: 4,
            location: "1F".to_string(),
            description: Some("Whiteboard, no screen".to_string()),
            created_by: admin.id,
        })
        .await;
    store
        .add_room(NewRoom {
            name: "Large Conference Room".to_string(),
            capacity: 12,
            location: "3F".to_string(),
            description: Some("Projector and video conferencing".to_string()),
            created_by: admin.id,
        })
        .await;
    info!(
        member = member.id,
        room_admin = admin.id,
        general_affairs = ga.id,
        "seeded demo users and rooms"
    );
}
