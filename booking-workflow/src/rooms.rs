use serde::Deserialize;
use tracing::info;

use booking_core::error::WorkflowError;
use booking_core::repo::{RoomRepo, SharedStore};
use booking_core::types::{Actor, NewRoom, Room, RoomId, RoomUpdate};

use crate::permissions::Permissions;

/// Payload for creating a room.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoom {
    pub name: String,
    pub capacity: i32,
    pub location: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Room management, gated on the room-admin capability.
#[derive(Clone)]
pub struct RoomService {
    store: SharedStore,
}

impl RoomService {
    pub fn new(store: SharedStore) -> Self {
        RoomService { store }
    }

    pub async fn create(&self, actor: Actor, create: CreateRoom) -> Result<Room, WorkflowError> {
        if !actor.can_manage_rooms() {
            return Err(WorkflowError::Forbidden(
                "only room admins may manage rooms".to_string(),
            ));
        }
        let name = create.name.trim().to_string();
        if name.is_empty() {
            return Err(WorkflowError::validation("name", "must not be empty"));
        }
        if create.capacity < 1 {
            return Err(WorkflowError::validation("capacity", "must be at least 1"));
        }

        let room = self
            .store
            .create_room(NewRoom {
                name,
                capacity: create.capacity,
                location: create.location,
                description: create.description,
                created_by: actor.id,
            })
            .await?;
        info!(room_id = room.id, creator = actor.id, "room created");
        Ok(room)
    }

    pub async fn update(
        &self,
        actor: Actor,
        room_id: RoomId,
        update: RoomUpdate,
    ) -> Result<Room, WorkflowError> {
        if !actor.can_manage_rooms() {
            return Err(WorkflowError::Forbidden(
                "only room admins may manage rooms".to_string(),
            ));
        }
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(WorkflowError::validation("name", "must not be empty"));
            }
        }
        if let Some(capacity) = update.capacity {
            if capacity < 1 {
                return Err(WorkflowError::validation("capacity", "must be at least 1"));
            }
        }

        match self.store.update_room(room_id, update).await {
            Ok(room) => Ok(room),
            Err(booking_core::StoreError::NotFound) => Err(WorkflowError::NotFound("room")),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Room>, WorkflowError> {
        let rooms = if include_inactive {
            self.store.rooms().await?
        } else {
            self.store.active_rooms().await?
        };
        Ok(rooms)
    }

    pub async fn get(&self, room_id: RoomId) -> Result<Room, WorkflowError> {
        self.store
            .room(room_id)
            .await?
            .ok_or(WorkflowError::NotFound("room"))
    }
}
