//! Periodic background jobs: reminder dispatch, room status reconciliation
//! and notification retention. Each job exposes `run_once` for manual
//! triggering and `run` for the interval loop the runner spawns.

pub mod dispatcher;
pub mod reconciler;
pub mod retention;

pub use dispatcher::{DispatchReport, ReminderDispatcher};
pub use reconciler::RoomReconciler;
pub use retention::NotificationRetention;
