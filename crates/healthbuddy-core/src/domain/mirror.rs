//! MirrorEntry domain entity
//!
//! A mirror entry is the latest locally known value of one syncable entity,
//! together with a flag telling whether the value still awaits confirmation
//! by the remote.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{EntityId, EntityKind};

/// Opaque entity value as exchanged with the remote (a JSON document)
pub type EntityPayload = serde_json::Value;

/// Fields in which the remote returns the id it assigned, in lookup order
pub const SERVER_ID_FIELDS: [&str; 2] = ["mealId", "id"];

/// Returns the id the remote assigned to an entity, if `value` carries one
pub fn server_id(value: &EntityPayload) -> Option<&str> {
    SERVER_ID_FIELDS
        .iter()
        .find_map(|field| value.get(*field).and_then(|v| v.as_str()))
}

/// Lays a newer optimistic value over a server response
///
/// Fields the optimistic value sets win; fields only the server knows
/// (assigned ids, computed values) are kept. A non-object optimistic value
/// replaces the server value.
pub fn overlay(server_value: &EntityPayload, optimistic: &EntityPayload) -> EntityPayload {
    match (server_value, optimistic) {
        (EntityPayload::Object(server), EntityPayload::Object(local)) => {
            let mut merged = server.clone();
            for (key, value) in local {
                merged.insert(key.clone(), value.clone());
            }
            EntityPayload::Object(merged)
        }
        _ => optimistic.clone(),
    }
}

/// Latest known value of one entity in the local mirror
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorEntry {
    /// Entity this entry belongs to
    entity_id: EntityId,
    /// Current local value (optimistic or server-canonical)
    value: EntityPayload,
    /// True while the value is not reconciled with the remote
    pending_sync: bool,
    /// When the entry was last written
    last_updated: DateTime<Utc>,
}

impl MirrorEntry {
    /// Creates a mirror entry
    pub fn new(
        entity_id: EntityId,
        value: EntityPayload,
        pending_sync: bool,
        last_updated: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_id,
            value,
            pending_sync,
            last_updated,
        }
    }

    /// Returns the entity id
    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    /// Returns the entity kind
    pub fn kind(&self) -> EntityKind {
        self.entity_id.kind()
    }

    /// Returns the current value
    pub fn value(&self) -> &EntityPayload {
        &self.value
    }

    /// Consumes the entry and returns its value
    pub fn into_value(self) -> EntityPayload {
        self.value
    }

    /// Returns true if the value awaits reconciliation with the remote
    pub fn pending_sync(&self) -> bool {
        self.pending_sync
    }

    /// Returns when the entry was last written
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Returns a top-level string field of the value, if present
    pub fn field_str(&self, field: &str) -> Option<&str> {
        self.value.get(field).and_then(|v| v.as_str())
    }

    /// Returns the id the remote assigned to this entity, once known
    pub fn server_id(&self) -> Option<&str> {
        server_id(&self.value)
    }
}
