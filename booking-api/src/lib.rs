//! HTTP surface: one axum router over the workflow, room management,
//! notifications, preferences and the manual job triggers.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use server::{router, run, ApiContext};
