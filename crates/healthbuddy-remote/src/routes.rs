//! Route table for queued operations
//!
//! Only the `(method, path)` pairs listed here are ever sent to the API.
//! Anything else is a permanent failure: retrying an unknown route cannot
//! succeed.
//!
//! | Path                    | Methods          | HTTP          |
//! |-------------------------|------------------|---------------|
//! | `/profile`              | CREATE, UPDATE   | POST, PUT     |
//! | `/profile/baseline`     | PATCH            | PATCH         |
//! | `/goals`                | UPDATE           | PUT           |
//! | `/meals`                | CREATE           | POST          |
//! | `/meals/photo`          | CREATE           | POST          |
//! | `/meals/{id}`           | UPDATE           | PUT           |
//! | `/hydration`            | CREATE           | POST          |
//! | `/biometrics/{kind}`    | CREATE           | POST          |
//!
//! Reads (`fetch`) are allowed on `/profile` and `/goals`.

use healthbuddy_core::domain::{newtypes::LogicalPath, OperationMethod};
use reqwest::Method;

use crate::ApiError;

/// Biometric series accepted under `/biometrics/{kind}`
pub const BIOMETRIC_KINDS: &[&str] = &["weight", "waist", "vitals", "wellbeing", "pain"];

const CREATE: &[OperationMethod] = &[OperationMethod::Create];
const UPDATE: &[OperationMethod] = &[OperationMethod::Update];
const PATCH: &[OperationMethod] = &[OperationMethod::Patch];
const CREATE_OR_UPDATE: &[OperationMethod] = &[OperationMethod::Create, OperationMethod::Update];

/// Methods a path accepts; `None` if the path is not routable at all
fn allowed_methods(path: &LogicalPath) -> Option<&'static [OperationMethod]> {
    let segments: Vec<&str> = path.segments().collect();
    match segments.as_slice() {
        ["profile"] => Some(CREATE_OR_UPDATE),
        ["profile", "baseline"] => Some(PATCH),
        ["goals"] => Some(UPDATE),
        ["meals"] => Some(CREATE),
        ["meals", "photo"] => Some(CREATE),
        ["meals", _id] => Some(UPDATE),
        ["hydration"] => Some(CREATE),
        ["biometrics", kind] if BIOMETRIC_KINDS.contains(kind) => Some(CREATE),
        _ => None,
    }
}

/// Resolves the HTTP method for a queued operation
///
/// # Errors
///
/// `ApiError::UnknownRoute` when the path is not routable,
/// `ApiError::UnsupportedMethod` when the path exists but rejects `method`.
pub fn resolve(method: OperationMethod, path: &LogicalPath) -> Result<Method, ApiError> {
    let allowed =
        allowed_methods(path).ok_or_else(|| ApiError::UnknownRoute(path.to_string()))?;

    if !allowed.contains(&method) {
        return Err(ApiError::UnsupportedMethod {
            method: method.to_string(),
            path: path.to_string(),
        });
    }

    Method::from_bytes(method.http_verb().as_bytes())
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))
}

/// Checks that `path` may be read with GET
pub fn resolve_fetch(path: &LogicalPath) -> Result<(), ApiError> {
    match path.as_str() {
        "/profile" | "/goals" => Ok(()),
        other => Err(ApiError::UnknownRoute(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> LogicalPath {
        LogicalPath::new(p).unwrap()
    }

    #[test]
    fn test_known_routes_resolve() {
        let cases = [
            (OperationMethod::Create, "/profile", Method::POST),
            (OperationMethod::Update, "/profile", Method::PUT),
            (OperationMethod::Patch, "/profile/baseline", Method::PATCH),
            (OperationMethod::Update, "/goals", Method::PUT),
            (OperationMethod::Create, "/meals", Method::POST),
            (OperationMethod::Create, "/meals/photo", Method::POST),
            (OperationMethod::Update, "/meals/abc-123", Method::PUT),
            (OperationMethod::Create, "/hydration", Method::POST),
            (OperationMethod::Create, "/biometrics/weight", Method::POST),
            (OperationMethod::Create, "/biometrics/pain", Method::POST),
        ];
        for (method, p, expected) in cases {
            assert_eq!(resolve(method, &path(p)).unwrap(), expected, "{method} {p}");
        }
    }

    #[test]
    fn test_unknown_path_is_rejected() {
        let err = resolve(OperationMethod::Create, &path("/sleep")).unwrap_err();
        assert!(matches!(err, ApiError::UnknownRoute(_)));

        let err = resolve(OperationMethod::Create, &path("/biometrics/shoe-size")).unwrap_err();
        assert!(matches!(err, ApiError::UnknownRoute(_)));
    }

    #[test]
    fn test_wrong_method_is_rejected() {
        let err = resolve(OperationMethod::Patch, &path("/goals")).unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedMethod { .. }));

        // `photo` is not a meal id
        let err = resolve(OperationMethod::Update, &path("/meals/photo")).unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedMethod { .. }));
    }

    #[test]
    fn test_fetch_routes() {
        assert!(resolve_fetch(&path("/profile")).is_ok());
        assert!(resolve_fetch(&path("/goals")).is_ok());
        assert!(resolve_fetch(&path("/meals")).is_err());
    }
}
