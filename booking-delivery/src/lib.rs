//! Notification delivery: message composition, the in-app/email fan-out,
//! and the worker that drains the post-commit queue.

pub mod email;
pub mod mailer;
pub mod messages;
pub mod notifier;
pub mod worker;

pub use email::ResendMailer;
pub use mailer::{Mailer, MemoryMailer, SharedMailer};
pub use notifier::Notifier;
