//! Meal service
//!
//! Manual meals are recorded and queued immediately. Photo meals start as
//! local drafts (`status: "draft"`, nothing queued) and are queued for
//! upload when the user submits them.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use healthbuddy_core::domain::{
    newtypes::{EntityId, EntityKind},
    DomainError, MirrorEntry, NewOperation, OperationMethod, SyncError,
};
use healthbuddy_core::ports::EntryFilter;

use super::{as_object, merge, path, to_payload};
use crate::client::SyncClient;

const STATUS_FIELD: &str = "status";
const DRAFT: &str = "draft";

/// One food item of a manual meal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealItem {
    pub name: String,
    pub portion_grams: f64,
}

/// Sync status of a meal, derived from its mirror entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealStatus {
    /// Saved locally only; not queued
    Draft,
    /// Queued or awaiting reconciliation
    PendingSync,
    /// Reconciled with the remote
    Synced,
}

impl MealStatus {
    pub fn of(entry: &MirrorEntry) -> Self {
        if entry.pending_sync() {
            MealStatus::PendingSync
        } else if entry.field_str(STATUS_FIELD) == Some(DRAFT) {
            MealStatus::Draft
        } else {
            MealStatus::Synced
        }
    }
}

impl Display for MealStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MealStatus::Draft => write!(f, "draft"),
            MealStatus::PendingSync => write!(f, "pending_sync"),
            MealStatus::Synced => write!(f, "synced"),
        }
    }
}

/// A mirrored meal with its derived status
#[derive(Debug, Clone, PartialEq)]
pub struct MealRecord {
    pub entry: MirrorEntry,
    pub status: MealStatus,
}

impl From<MirrorEntry> for MealRecord {
    fn from(entry: MirrorEntry) -> Self {
        let status = MealStatus::of(&entry);
        Self { entry, status }
    }
}

/// Records meals and lists the mirrored ones
#[derive(Clone)]
pub struct MealService {
    client: Arc<SyncClient>,
}

impl MealService {
    pub fn new(client: Arc<SyncClient>) -> Self {
        Self { client }
    }

    /// Records a manually entered meal (`POST /meals`)
    pub async fn create_manual_meal(
        &self,
        taken_at: DateTime<Utc>,
        items: Vec<MealItem>,
    ) -> Result<MealRecord, SyncError> {
        let entity_id = EntityId::generate(EntityKind::Meal);
        let payload = json!({
            "localId": entity_id.key(),
            "takenAt": taken_at,
            "items": to_payload(&items)?,
            "source": "manual",
        });

        let operation = NewOperation::new(
            OperationMethod::Create,
            path("/meals")?,
            entity_id,
            payload.clone(),
        );
        self.client.record(&payload, operation).await.map(MealRecord::from)
    }

    /// Saves a photo meal as a local draft; nothing is queued
    pub async fn save_photo_meal(
        &self,
        photo_path: &str,
        taken_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<MealRecord, SyncError> {
        let entity_id = EntityId::generate(EntityKind::Meal);
        let draft = json!({
            "localId": entity_id.key(),
            "status": DRAFT,
            "photoPath": photo_path,
            "takenAt": taken_at,
            "notes": notes,
            "source": "photo",
        });

        self.client
            .save_local(&entity_id, &draft)
            .await
            .map(MealRecord::from)
    }

    /// Queues a draft photo meal for upload (`POST /meals/photo`)
    ///
    /// # Errors
    ///
    /// `DomainError::InvalidState` if the meal is not a draft.
    pub async fn submit_photo_meal(&self, entity_id: &EntityId) -> Result<MealRecord, SyncError> {
        let entry = self.require(entity_id).await?;
        if MealStatus::of(&entry) != MealStatus::Draft {
            return Err(DomainError::InvalidState(format!("meal {entity_id} is not a draft")).into());
        }

        let mut meal = entry.into_value();
        if let Value::Object(fields) = &mut meal {
            fields.remove(STATUS_FIELD);
        }
        let payload = json!({
            "localId": entity_id.key(),
            "photoPath": meal.get("photoPath"),
            "takenAt": meal.get("takenAt"),
            "notes": meal.get("notes"),
        });

        let operation = NewOperation::new(
            OperationMethod::Create,
            path("/meals/photo")?,
            entity_id.clone(),
            payload,
        );
        self.client.record(&meal, operation).await.map(MealRecord::from)
    }

    /// Applies a partial edit
    ///
    /// Drafts are edited locally. Other meals are sent with
    /// `PUT /meals/{id}`, using the server id once known and the local key
    /// (carried as `localId` by the create) before that. Edits queued under
    /// the local key are moved to the server id when the create is
    /// acknowledged.
    pub async fn edit_meal(
        &self,
        entity_id: &EntityId,
        changes: &Value,
    ) -> Result<MealRecord, SyncError> {
        let changes = as_object(changes)?;
        let entry = self.require(entity_id).await?;
        let status = MealStatus::of(&entry);
        let remote_id = entry
            .server_id()
            .or(entity_id.key())
            .map(str::to_string)
            .ok_or_else(|| DomainError::InvalidEntityId(entity_id.to_string()))?;

        let mut meal = entry.into_value();
        merge(&mut meal, &strip_status(changes));

        if status == MealStatus::Draft {
            return self
                .client
                .save_local(entity_id, &meal)
                .await
                .map(MealRecord::from);
        }

        let operation = NewOperation::new(
            OperationMethod::Update,
            path(format!("/meals/{remote_id}"))?,
            entity_id.clone(),
            meal.clone(),
        );
        self.client.record(&meal, operation).await.map(MealRecord::from)
    }

    /// Most recently updated meals, newest first
    pub async fn recent_meals(&self, limit: u32) -> Result<Vec<MealRecord>, SyncError> {
        let filter = EntryFilter::new()
            .with_kind(EntityKind::Meal)
            .with_limit(limit);
        Ok(self
            .client
            .list(&filter)
            .await?
            .into_iter()
            .map(MealRecord::from)
            .collect())
    }

    /// Meals awaiting reconciliation, newest first
    pub async fn pending_meals(&self) -> Result<Vec<MealRecord>, SyncError> {
        let filter = EntryFilter::new().with_kind(EntityKind::Meal).pending();
        Ok(self
            .client
            .list(&filter)
            .await?
            .into_iter()
            .map(MealRecord::from)
            .collect())
    }

    async fn require(&self, entity_id: &EntityId) -> Result<MirrorEntry, SyncError> {
        if entity_id.kind() != EntityKind::Meal {
            return Err(DomainError::InvalidEntityId(format!("{entity_id} is not a meal")).into());
        }
        self.client
            .get(entity_id)
            .await?
            .ok_or_else(|| DomainError::ValidationFailed(format!("unknown meal {entity_id}")).into())
    }
}

fn strip_status(changes: &Map<String, Value>) -> Map<String, Value> {
    changes
        .iter()
        .filter(|(key, _)| key.as_str() != STATUS_FIELD)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
