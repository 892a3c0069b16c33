pub mod config;
pub mod db;
pub mod error;
pub mod queue;
pub mod repo;
pub mod schema;
pub mod timerange;
pub mod types;

pub use config::Config;
pub use db::DbPool;
pub use error::{StoreError, WorkflowError};
pub use queue::{NotifyJob, NotifyQueue};
pub use repo::{SharedStore, Store};
pub use timerange::TimeRange;
