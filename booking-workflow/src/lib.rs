//! The request/booking state machine and the policies around it.
//!
//! Everything here is storage-agnostic: operations run against the
//! `Store` trait, validate and authorize up front, apply one atomic
//! store unit, and enqueue notification work only after it commits.

pub mod availability;
pub mod permissions;
pub mod requests;
pub mod rooms;
pub mod scheduler;

pub use availability::AvailabilityChecker;
pub use permissions::Permissions;
pub use requests::{SubmitRequest, Workflow};
pub use rooms::{CreateRoom, RoomService};
