//! Domain services
//!
//! Thin glue between the app's screens and the engine client. Each service
//! builds the optimistic mirror value and the queued operation for one
//! mutation and returns the optimistic entry immediately; none of them
//! waits on the network.

mod goals;
mod logs;
mod meals;
mod profile;

pub use goals::GoalsService;
pub use logs::{BiometricKind, BiometricReading, BiometricsService, HydrationService};
pub use meals::{MealItem, MealRecord, MealService, MealStatus};
pub use profile::{ActivityLevel, Baseline, NewProfile, ProfileService, Sex};

use serde::Serialize;
use serde_json::{Map, Value};

use healthbuddy_core::domain::{newtypes::LogicalPath, DomainError, SyncError};

/// Parses a remote path built by a service
fn path(raw: impl Into<String>) -> Result<LogicalPath, SyncError> {
    Ok(LogicalPath::new(raw)?)
}

/// Serializes a typed payload into a JSON value
fn to_payload<T: Serialize>(value: &T) -> Result<Value, SyncError> {
    serde_json::to_value(value)
        .map_err(|e| DomainError::ValidationFailed(format!("unserializable payload: {e}")).into())
}

/// Requires a JSON object (partial updates)
fn as_object(changes: &Value) -> Result<&Map<String, Value>, SyncError> {
    changes
        .as_object()
        .ok_or_else(|| DomainError::ValidationFailed("changes must be a JSON object".into()).into())
}

/// Shallow merge of `changes` over `base`; `base` becomes an object if it
/// was not one
fn merge(base: &mut Value, changes: &Map<String, Value>) {
    if !base.is_object() {
        *base = Value::Object(Map::new());
    }
    if let Value::Object(target) = base {
        for (key, value) in changes {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_overwrites_and_keeps() {
        let mut base = json!({"age": 30, "sex": "F"});
        merge(&mut base, json!({"age": 31, "heightCm": 170}).as_object().unwrap());
        assert_eq!(base, json!({"age": 31, "sex": "F", "heightCm": 170}));
    }

    #[test]
    fn test_merge_into_null() {
        let mut base = Value::Null;
        merge(&mut base, json!({"dailyCalories": 2000}).as_object().unwrap());
        assert_eq!(base, json!({"dailyCalories": 2000}));
    }

    #[test]
    fn test_non_object_changes_rejected() {
        let err = as_object(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, SyncError::Domain(DomainError::ValidationFailed(_))));
    }
}
