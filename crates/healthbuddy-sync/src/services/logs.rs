//! Hydration and biometric logging
//!
//! Each log call creates a new collection entity and queues its `CREATE`.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use healthbuddy_core::domain::{
    newtypes::{EntityId, EntityKind},
    MirrorEntry, NewOperation, OperationMethod, SyncError,
};

use super::{path, to_payload};
use crate::client::SyncClient;

// ============================================================================
// Hydration
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HydrationLog<'a> {
    local_id: Option<&'a str>,
    amount_ml: u32,
    taken_at: DateTime<Utc>,
}

/// Records water intake (`POST /hydration`)
#[derive(Clone)]
pub struct HydrationService {
    client: Arc<SyncClient>,
}

impl HydrationService {
    pub fn new(client: Arc<SyncClient>) -> Self {
        Self { client }
    }

    pub async fn log_hydration(
        &self,
        amount_ml: u32,
        taken_at: DateTime<Utc>,
    ) -> Result<MirrorEntry, SyncError> {
        let entity_id = EntityId::generate(EntityKind::Hydration);
        let payload = to_payload(&HydrationLog {
            local_id: entity_id.key(),
            amount_ml,
            taken_at,
        })?;

        let operation = NewOperation::new(
            OperationMethod::Create,
            path("/hydration")?,
            entity_id,
            payload.clone(),
        );
        self.client.record(&payload, operation).await
    }
}

// ============================================================================
// Biometrics
// ============================================================================

/// Biometric series, one remote collection each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiometricKind {
    Weight,
    Waist,
    /// Blood pressure and heart rate
    Vitals,
    /// Mood and energy
    Wellbeing,
    Pain,
}

impl BiometricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BiometricKind::Weight => "weight",
            BiometricKind::Waist => "waist",
            BiometricKind::Vitals => "vitals",
            BiometricKind::Wellbeing => "wellbeing",
            BiometricKind::Pain => "pain",
        }
    }
}

impl Display for BiometricKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One biometric reading; the variant determines the series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum BiometricReading {
    Weight {
        value_kg: f64,
    },
    Waist {
        value_cm: f64,
    },
    Vitals {
        systolic: u32,
        diastolic: u32,
        heart_rate: u32,
    },
    Wellbeing {
        mood: u8,
        energy: u8,
    },
    Pain {
        level: u8,
        area: Option<String>,
    },
}

impl BiometricReading {
    pub fn kind(&self) -> BiometricKind {
        match self {
            BiometricReading::Weight { .. } => BiometricKind::Weight,
            BiometricReading::Waist { .. } => BiometricKind::Waist,
            BiometricReading::Vitals { .. } => BiometricKind::Vitals,
            BiometricReading::Wellbeing { .. } => BiometricKind::Wellbeing,
            BiometricReading::Pain { .. } => BiometricKind::Pain,
        }
    }
}

/// Records biometric readings (`POST /biometrics/{kind}`)
#[derive(Clone)]
pub struct BiometricsService {
    client: Arc<SyncClient>,
}

impl BiometricsService {
    pub fn new(client: Arc<SyncClient>) -> Self {
        Self { client }
    }

    pub async fn log_biometric(
        &self,
        reading: &BiometricReading,
        taken_at: DateTime<Utc>,
    ) -> Result<MirrorEntry, SyncError> {
        let kind = reading.kind();
        let entity_id = EntityId::generate(EntityKind::Biometric);

        let mut payload = to_payload(reading)?;
        if let Value::Object(fields) = &mut payload {
            fields.insert("kind".into(), Value::from(kind.as_str()));
            fields.insert("localId".into(), Value::from(entity_id.key()));
            fields.insert("takenAt".into(), to_payload(&taken_at)?);
        }

        let operation = NewOperation::new(
            OperationMethod::Create,
            path(format!("/biometrics/{kind}"))?,
            entity_id,
            payload.clone(),
        );
        self.client.record(&payload, operation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reading_wire_format() {
        let vitals = BiometricReading::Vitals {
            systolic: 120,
            diastolic: 80,
            heart_rate: 64,
        };
        assert_eq!(vitals.kind(), BiometricKind::Vitals);
        assert_eq!(
            serde_json::to_value(&vitals).unwrap(),
            json!({"systolic": 120, "diastolic": 80, "heartRate": 64})
        );

        let weight = BiometricReading::Weight { value_kg: 72.4 };
        assert_eq!(
            serde_json::to_value(&weight).unwrap(),
            json!({"valueKg": 72.4})
        );
    }

    #[test]
    fn test_kind_labels_match_routes() {
        let labels: Vec<_> = [
            BiometricKind::Weight,
            BiometricKind::Waist,
            BiometricKind::Vitals,
            BiometricKind::Wellbeing,
            BiometricKind::Pain,
        ]
        .iter()
        .map(BiometricKind::as_str)
        .collect();
        assert_eq!(labels, ["weight", "waist", "vitals", "wellbeing", "pain"]);
    }
}
