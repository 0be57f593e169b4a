//! Profile service
//!
//! The profile is a singleton entity. Its baseline section (conditions,
//! pain areas, notes) is patched separately through `/profile/baseline`
//! and mirrored under `baselineJson`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use healthbuddy_core::domain::{
    newtypes::EntityId, MirrorEntry, NewOperation, OperationMethod, SyncError,
};

use super::{as_object, merge, path, to_payload};
use crate::client::SyncClient;

/// Field holding the baseline section in the mirrored profile
const BASELINE_FIELD: &str = "baselineJson";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
}

/// Onboarding answers sent when the profile is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProfile {
    pub age: u32,
    pub sex: Sex,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub activity_level: ActivityLevel,
}

/// Health baseline section of the profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Baseline {
    pub conditions: Vec<String>,
    pub pain_areas: Vec<String>,
    pub notes: Option<String>,
}

/// Records profile mutations and reads the mirrored profile
#[derive(Clone)]
pub struct ProfileService {
    client: Arc<SyncClient>,
}

impl ProfileService {
    pub fn new(client: Arc<SyncClient>) -> Self {
        Self { client }
    }

    /// Creates the profile (`POST /profile`)
    pub async fn create_profile(&self, profile: &NewProfile) -> Result<MirrorEntry, SyncError> {
        let payload = to_payload(profile)?;
        let mut optimistic = self.current_value().await?;
        merge(&mut optimistic, as_object(&payload)?);

        let operation = NewOperation::new(
            OperationMethod::Create,
            path("/profile")?,
            EntityId::profile(),
            payload,
        );
        self.client.record(&optimistic, operation).await
    }

    /// Applies a partial update and sends the full profile (`PUT /profile`)
    pub async fn update_profile(&self, changes: &Value) -> Result<MirrorEntry, SyncError> {
        let changes = as_object(changes)?;
        let mut profile = self.current_value().await?;
        merge(&mut profile, changes);

        let operation = NewOperation::new(
            OperationMethod::Update,
            path("/profile")?,
            EntityId::profile(),
            profile.clone(),
        );
        self.client.record(&profile, operation).await
    }

    /// Replaces the baseline section (`PATCH /profile/baseline`)
    pub async fn update_baseline(&self, baseline: &Baseline) -> Result<MirrorEntry, SyncError> {
        let payload = to_payload(baseline)?;
        let mut profile = self.current_value().await?;
        let mut section = Map::new();
        section.insert(BASELINE_FIELD.to_string(), payload.clone());
        merge(&mut profile, &section);

        let operation = NewOperation::new(
            OperationMethod::Patch,
            path("/profile/baseline")?,
            EntityId::profile(),
            payload,
        );
        self.client.record(&profile, operation).await
    }

    /// The locally mirrored profile
    pub async fn profile(&self) -> Result<Option<MirrorEntry>, SyncError> {
        self.client.get(&EntityId::profile()).await
    }

    /// True once the onboarding fields are present and positive
    pub async fn is_profile_complete(&self) -> Result<bool, SyncError> {
        Ok(self
            .profile()
            .await?
            .is_some_and(|entry| is_complete(entry.value())))
    }

    /// Refreshes the mirror from `GET /profile` when online and not pending
    pub async fn refresh_profile(&self) -> Result<Option<MirrorEntry>, SyncError> {
        self.client
            .refresh(&EntityId::profile(), &path("/profile")?)
            .await
    }

    async fn current_value(&self) -> Result<Value, SyncError> {
        Ok(self
            .profile()
            .await?
            .map(MirrorEntry::into_value)
            .unwrap_or(Value::Null))
    }
}

fn is_complete(profile: &Value) -> bool {
    let positive = |field: &str| profile.get(field).and_then(Value::as_f64).is_some_and(|v| v > 0.0);
    let present = |field: &str| profile.get(field).and_then(Value::as_str).is_some_and(|s| !s.is_empty());

    positive("age")
        && present("sex")
        && positive("heightCm")
        && positive("weightKg")
        && present("activityLevel")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_profile_wire_format() {
        let profile = NewProfile {
            age: 34,
            sex: Sex::Female,
            height_cm: 168.0,
            weight_kg: 61.5,
            activity_level: ActivityLevel::Moderate,
        };
        assert_eq!(
            serde_json::to_value(&profile).unwrap(),
            json!({
                "age": 34,
                "sex": "F",
                "heightCm": 168.0,
                "weightKg": 61.5,
                "activityLevel": "moderate"
            })
        );
    }

    #[test]
    fn test_completeness() {
        let complete = json!({
            "age": 34, "sex": "Other", "heightCm": 168, "weightKg": 61.5,
            "activityLevel": "light"
        });
        assert!(is_complete(&complete));

        let mut zero_height = complete.clone();
        zero_height["heightCm"] = json!(0);
        assert!(!is_complete(&zero_height));

        let mut missing = complete.clone();
        missing.as_object_mut().unwrap().remove("activityLevel");
        assert!(!is_complete(&missing));

        assert!(!is_complete(&Value::Null));
    }
}
