//! Goals service

use std::sync::Arc;

use serde_json::Value;

use healthbuddy_core::domain::{
    newtypes::EntityId, MirrorEntry, NewOperation, OperationMethod, SyncError,
};

use super::{as_object, merge, path};
use crate::client::SyncClient;

/// Records goal changes (`PUT /goals`) and reads the mirrored goals
#[derive(Clone)]
pub struct GoalsService {
    client: Arc<SyncClient>,
}

impl GoalsService {
    pub fn new(client: Arc<SyncClient>) -> Self {
        Self { client }
    }

    /// Merges `changes` into the current goals and sends the result
    pub async fn update_goals(&self, changes: &Value) -> Result<MirrorEntry, SyncError> {
        let changes = as_object(changes)?;
        let mut goals = self
            .goals()
            .await?
            .map(MirrorEntry::into_value)
            .unwrap_or(Value::Null);
        merge(&mut goals, changes);

        let operation = NewOperation::new(
            OperationMethod::Update,
            path("/goals")?,
            EntityId::goals(),
            goals.clone(),
        );
        self.client.record(&goals, operation).await
    }

    pub async fn goals(&self) -> Result<Option<MirrorEntry>, SyncError> {
        self.client.get(&EntityId::goals()).await
    }

    /// Refreshes the mirror from `GET /goals` when online and not pending
    pub async fn refresh_goals(&self) -> Result<Option<MirrorEntry>, SyncError> {
        self.client.refresh(&EntityId::goals(), &path("/goals")?).await
    }
}
