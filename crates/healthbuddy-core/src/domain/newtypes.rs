//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// EntityKind
// ============================================================================

/// Kind of syncable entity held in the local mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// The user profile (singleton)
    Profile,
    /// Nutrition and activity goals (singleton)
    Goals,
    /// A logged meal (collection)
    Meal,
    /// A hydration log entry (collection)
    Hydration,
    /// A biometric reading (collection)
    Biometric,
}

impl EntityKind {
    /// Returns the stable storage label for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Profile => "profile",
            EntityKind::Goals => "goals",
            EntityKind::Meal => "meal",
            EntityKind::Hydration => "hydration",
            EntityKind::Biometric => "biometric",
        }
    }

    /// Returns true if there is exactly one entity of this kind per account
    pub fn is_singleton(&self) -> bool {
        matches!(self, EntityKind::Profile | EntityKind::Goals)
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profile" => Ok(EntityKind::Profile),
            "goals" => Ok(EntityKind::Goals),
            "meal" => Ok(EntityKind::Meal),
            "hydration" => Ok(EntityKind::Hydration),
            "biometric" => Ok(EntityKind::Biometric),
            other => Err(DomainError::InvalidEntityId(format!(
                "unknown entity kind '{other}'"
            ))),
        }
    }
}

// ============================================================================
// EntityId
// ============================================================================

/// Identifier of a mirror entry
///
/// Singletons are identified by their kind alone (`profile`, `goals`).
/// Collection members use `<kind>:<key>`, where the key is generated
/// locally at creation time and never changes, even after the server
/// assigns its own id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// The profile singleton
    #[must_use]
    pub fn profile() -> Self {
        Self(EntityKind::Profile.as_str().to_string())
    }

    /// The goals singleton
    #[must_use]
    pub fn goals() -> Self {
        Self(EntityKind::Goals.as_str().to_string())
    }

    /// Creates a collection member id from a kind and key
    pub fn member(kind: EntityKind, key: impl AsRef<str>) -> Result<Self, DomainError> {
        let key = key.as_ref();
        if kind.is_singleton() {
            return Err(DomainError::InvalidEntityId(format!(
                "{kind} is a singleton and takes no key"
            )));
        }
        if key.is_empty() || key.contains(char::is_whitespace) || key.contains(':') {
            return Err(DomainError::InvalidEntityId(format!(
                "invalid key '{key}' for {kind}"
            )));
        }
        Ok(Self(format!("{}:{}", kind.as_str(), key)))
    }

    /// Generates a fresh collection member id with a random key
    #[must_use]
    pub fn generate(kind: EntityKind) -> Self {
        Self(format!("{}:{}", kind.as_str(), Uuid::new_v4()))
    }

    /// Returns the kind encoded in this id
    pub fn kind(&self) -> EntityKind {
        let label = self.0.split(':').next().unwrap_or_default();
        // Construction guarantees a valid kind prefix
        EntityKind::from_str(label).unwrap_or(EntityKind::Profile)
    }

    /// Returns the member key, or `None` for singletons
    pub fn key(&self) -> Option<&str> {
        self.0.split_once(':').map(|(_, key)| key)
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            None => {
                let kind = EntityKind::from_str(s)?;
                if kind.is_singleton() {
                    Ok(Self(s.to_string()))
                } else {
                    Err(DomainError::InvalidEntityId(format!(
                        "{kind} ids need a key: '{s}'"
                    )))
                }
            }
            Some((kind, key)) => Self::member(EntityKind::from_str(kind)?, key),
        }
    }
}

impl TryFrom<String> for EntityId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

// ============================================================================
// LogicalPath
// ============================================================================

/// Remote resource path targeted by a queued operation (e.g. `/profile/baseline`)
///
/// Must be absolute, non-root, without whitespace, empty segments, query
/// strings or a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LogicalPath(String);

impl LogicalPath {
    /// Creates a validated logical path
    pub fn new(path: impl Into<String>) -> Result<Self, DomainError> {
        let path = path.into();

        if !path.starts_with('/') {
            return Err(DomainError::InvalidPath(format!(
                "path must be absolute: '{path}'"
            )));
        }
        if path.len() == 1 {
            return Err(DomainError::InvalidPath("root is not a resource".into()));
        }
        if path.contains(char::is_whitespace) || path.contains('?') || path.contains('#') {
            return Err(DomainError::InvalidPath(format!(
                "path contains invalid characters: '{path}'"
            )));
        }
        if path[1..].split('/').any(str::is_empty) {
            return Err(DomainError::InvalidPath(format!(
                "path has an empty segment: '{path}'"
            )));
        }

        Ok(Self(path))
    }

    /// Returns the path segments without the leading slash
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0[1..].split('/')
    }

    /// Returns the path as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for LogicalPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LogicalPath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for LogicalPath {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LogicalPath> for String {
    fn from(path: LogicalPath) -> Self {
        path.0
    }
}

// ============================================================================
// QueueId
// ============================================================================

/// Monotonic identifier assigned by the outbound queue at enqueue time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueId(i64);

impl QueueId {
    /// Wraps a raw queue id
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw value
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl Display for QueueId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid queue id '{s}': {e}")))
    }
}

impl From<i64> for QueueId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

// ============================================================================
// IdempotencyKey
// ============================================================================

/// Key sent with every dispatch attempt of one operation so the remote can
/// recognise retries of the same mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(Uuid);

impl IdempotencyKey {
    /// Create a new random key
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a key from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for IdempotencyKey {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for IdempotencyKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IdempotencyKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid idempotency key: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singleton_ids() {
        assert_eq!(EntityId::profile().as_str(), "profile");
        assert_eq!(EntityId::goals().kind(), EntityKind::Goals);
        assert!(EntityId::profile().key().is_none());
    }

    #[test]
    fn test_member_ids() {
        let id = EntityId::member(EntityKind::Meal, "17").unwrap();
        assert_eq!(id.as_str(), "meal:17");
        assert_eq!(id.kind(), EntityKind::Meal);
        assert_eq!(id.key(), Some("17"));

        let generated = EntityId::generate(EntityKind::Hydration);
        assert_eq!(generated.kind(), EntityKind::Hydration);
        assert_eq!(generated.key().unwrap().len(), 36);
    }

    #[test]
    fn test_member_rejects_singleton_and_bad_keys() {
        assert!(EntityId::member(EntityKind::Profile, "x").is_err());
        assert!(EntityId::member(EntityKind::Meal, "").is_err());
        assert!(EntityId::member(EntityKind::Meal, "a b").is_err());
        assert!(EntityId::member(EntityKind::Meal, "a:b").is_err());
    }

    #[test]
    fn test_entity_id_parse() {
        assert_eq!("profile".parse::<EntityId>().unwrap(), EntityId::profile());
        assert_eq!(
            "biometric:w1".parse::<EntityId>().unwrap().kind(),
            EntityKind::Biometric
        );
        assert!("meal".parse::<EntityId>().is_err());
        assert!("steps:1".parse::<EntityId>().is_err());
    }

    #[test]
    fn test_entity_id_serde_roundtrip() {
        let id = EntityId::member(EntityKind::Meal, "abc").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"meal:abc\"");
        let back: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<EntityId>("\"nope:1\"").is_err());
    }

    #[test]
    fn test_logical_path_validation() {
        assert!(LogicalPath::new("/profile").is_ok());
        assert!(LogicalPath::new("/profile/baseline").is_ok());
        assert!(LogicalPath::new("profile").is_err());
        assert!(LogicalPath::new("/").is_err());
        assert!(LogicalPath::new("/meals/").is_err());
        assert!(LogicalPath::new("//meals").is_err());
        assert!(LogicalPath::new("/meals?limit=1").is_err());
        assert!(LogicalPath::new("/my meals").is_err());
    }

    #[test]
    fn test_logical_path_segments() {
        let path = LogicalPath::new("/biometrics/weight").unwrap();
        let segments: Vec<&str> = path.segments().collect();
        assert_eq!(segments, vec!["biometrics", "weight"]);
    }

    #[test]
    fn test_queue_id_ordering() {
        assert!(QueueId::new(1) < QueueId::new(2));
        assert_eq!("42".parse::<QueueId>().unwrap(), QueueId::new(42));
        assert!("x".parse::<QueueId>().is_err());
    }

    #[test]
    fn test_idempotency_key_parse() {
        let key = IdempotencyKey::new();
        let parsed: IdempotencyKey = key.to_string().parse().unwrap();
        assert_eq!(parsed, key);
        assert!("not-a-uuid".parse::<IdempotencyKey>().is_err());
    }
}
