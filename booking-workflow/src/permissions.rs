use booking_core::types::{Actor, Role};

/// Capability predicates, checked once at the state-machine boundary.
pub trait Permissions {
    /// Approving, rejecting and assigning rooms to requests.
    fn can_review_requests(&self) -> bool;

    /// Creating rooms and editing room details/status.
    fn can_manage_rooms(&self) -> bool;

    /// Triggering the periodic jobs by hand.
    fn can_run_jobs(&self) -> bool;
}

impl Permissions for Actor {
    fn can_review_requests(&self) -> bool {
        matches!(self.role, Role::GeneralAffairs)
    }

    fn can_manage_rooms(&self) -> bool {
        matches!(self.role, Role::GeneralAffairs | Role::RoomAdmin)
    }

    fn can_run_jobs(&self) -> bool {
        matches!(self.role, Role::GeneralAffairs)
    }
}
