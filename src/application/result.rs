//! Uniform success/error envelope returned by every service operation.
//!
//! `ServiceResult<T>` is a plain `Result`, so exactly one of data or error is
//! ever present. [`Envelope`] gives it the `{success, data | error}` wire
//! shape for callers that serialize results.

use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::application::repos::RepoError;
use crate::domain::error::DomainError;

pub type ServiceResult<T> = Result<T, ServiceError>;

pub fn success<T>(data: T) -> ServiceResult<T> {
    Ok(data)
}

pub fn failure<T>(error: ServiceError) -> ServiceResult<T> {
    Err(error)
}

/// Closed set of error codes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input failed a precondition; retrying without changes fails again.
    ValidationError,
    /// Storage failed or refused the operation; `details` carry the cause.
    DbError,
    /// The failure could not be classified.
    UnknownError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::DbError => "DB_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Codes whose failures can clear up without changing the input. A
    /// constraint violation is also `DB_ERROR`; check `details` before retrying one.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorCode::DbError)
    }

    fn error_name(self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "ValidationError",
            ErrorCode::DbError => "DatabaseError",
            ErrorCode::UnknownError => "UnknownError",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error value crossing the service boundary.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{code}: {message}")]
pub struct ServiceError {
    pub name: &'static str,
    pub message: String,
    pub code: ErrorCode,
    /// Operation that produced the error, e.g. `organizacion.update`.
    #[serde(rename = "source", skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ServiceError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            name: code.error_name(),
            message: message.into(),
            code,
            origin: None,
            details: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::from(DomainError::not_found(entity, id))
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DbError, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnknownError, message)
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn is_validation(&self) -> bool {
        self.code == ErrorCode::ValidationError
    }

    /// Map an arbitrary error into the service shape, keeping its cause chain.
    pub fn from_error(origin: &str, error: &(dyn StdError + 'static)) -> Self {
        if let Some(repo) = error.downcast_ref::<RepoError>() {
            return Self::from(repo.clone()).with_origin(origin);
        }
        if let Some(domain) = error.downcast_ref::<DomainError>() {
            return Self::from(domain.clone()).with_origin(origin);
        }
        if let Some(service) = error.downcast_ref::<ServiceError>() {
            return service.clone();
        }

        Self::unknown(error.to_string())
            .with_origin(origin)
            .with_details(json!({ "causes": cause_chain(error) }))
    }
}

impl From<DomainError> for ServiceError {
    fn from(error: DomainError) -> Self {
        let details = match &error {
            DomainError::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
            other => other.field().map(|field| json!({ "field": field })),
        };
        let mut mapped = Self::validation(error.to_string());
        mapped.details = details;
        mapped
    }
}

impl From<RepoError> for ServiceError {
    fn from(error: RepoError) -> Self {
        let message = error.to_string();
        match error {
            RepoError::NotFound => Self::validation(message),
            // Anything storage refused is a database error, even when the
            // caller could fix it; validation happens before I/O.
            RepoError::Duplicate { constraint } => {
                Self::database(message).with_details(json!({ "constraint": constraint }))
            }
            RepoError::InvalidInput { message: cause } | RepoError::Integrity { message: cause } => {
                Self::database(message).with_details(json!({ "cause": cause }))
            }
            RepoError::Persistence(cause) => {
                Self::database("storage operation failed").with_details(json!({ "cause": cause }))
            }
            RepoError::Timeout => {
                Self::database(message).with_details(json!({ "cause": "statement timeout" }))
            }
            RepoError::Decode(cause) => {
                Self::unknown(message).with_details(json!({ "cause": cause }))
            }
        }
    }
}

fn cause_chain(error: &(dyn StdError + 'static)) -> Vec<String> {
    let mut messages = vec![error.to_string()];
    let mut current = error.source();
    while let Some(inner) = current {
        messages.push(inner.to_string());
        current = inner.source();
    }
    messages
}

/// Serializable `{success, data}` / `{success, error}` view of a result.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Envelope<'a, T> {
    Success { success: bool, data: &'a T },
    Failure { success: bool, error: &'a ServiceError },
}

impl<'a, T> From<&'a ServiceResult<T>> for Envelope<'a, T> {
    fn from(result: &'a ServiceResult<T>) -> Self {
        match result {
            Ok(data) => Envelope::Success {
                success: true,
                data,
            },
            Err(error) => Envelope::Failure {
                success: false,
                error,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("outer failure")]
    struct Outer {
        #[source]
        inner: std::io::Error,
    }

    #[test]
    fn success_envelope_has_no_error() {
        let result = success(vec![1, 2]);
        let value = serde_json::to_value(Envelope::from(&result)).expect("encodes");
        assert_eq!(value, json!({ "success": true, "data": [1, 2] }));
    }

    #[test]
    fn failure_envelope_has_no_data() {
        let result: ServiceResult<u8> =
            failure(ServiceError::validation("nombre is required").with_origin("organizacion.create"));
        let value = serde_json::to_value(Envelope::from(&result)).expect("encodes");

        assert_eq!(value["success"], json!(false));
        assert!(value.get("data").is_none());
        assert_eq!(value["error"]["code"], json!("VALIDATION_ERROR"));
        assert_eq!(value["error"]["name"], json!("ValidationError"));
        assert_eq!(value["error"]["source"], json!("organizacion.create"));
        assert!(value["error"].get("details").is_none());
    }

    #[test]
    fn domain_errors_are_validation_errors_with_field() {
        let error = ServiceError::from(DomainError::malformed("sitio_web", "no host"));
        assert_eq!(error.code, ErrorCode::ValidationError);
        assert_eq!(error.details, Some(json!({ "field": "sitio_web" })));
        assert!(!error.code.is_retryable());
    }

    #[test]
    fn not_found_is_validation_not_db() {
        let error = ServiceError::not_found("organizacion", "org1");
        assert_eq!(error.code, ErrorCode::ValidationError);
        assert_eq!(error.message, "organizacion `org1` not found");
    }

    #[test]
    fn persistence_failures_are_retryable_db_errors() {
        let error = ServiceError::from(RepoError::from_persistence("connection reset"));
        assert_eq!(error.code, ErrorCode::DbError);
        assert!(error.code.is_retryable());
        assert_eq!(error.details, Some(json!({ "cause": "connection reset" })));
    }

    #[test]
    fn constraint_violations_are_db_errors_with_cause() {
        let error = ServiceError::from(RepoError::Duplicate {
            constraint: "organizacion_tema_pkey".into(),
        });
        assert_eq!(error.code, ErrorCode::DbError);
        assert_eq!(
            error.details,
            Some(json!({ "constraint": "organizacion_tema_pkey" }))
        );

        let error = ServiceError::from(RepoError::Integrity {
            message: "null value in column \"nombre\"".into(),
        });
        assert_eq!(error.code, ErrorCode::DbError);

        let error = ServiceError::from(RepoError::invalid_input("column \"x\" does not exist"));
        assert_eq!(error.code, ErrorCode::DbError);
        assert_eq!(
            error.details,
            Some(json!({ "cause": "column \"x\" does not exist" }))
        );
    }

    #[test]
    fn storage_not_found_stays_a_validation_error() {
        assert!(ServiceError::from(RepoError::NotFound).is_validation());
    }

    #[test]
    fn from_error_recognizes_repo_errors() {
        let repo = RepoError::Timeout;
        let error = ServiceError::from_error("proyecto.search", &repo);
        assert_eq!(error.code, ErrorCode::DbError);
        assert_eq!(error.origin.as_deref(), Some("proyecto.search"));
    }

    #[test]
    fn from_error_keeps_cause_chain_for_unknown_errors() {
        let outer = Outer {
            inner: std::io::Error::other("disk on fire"),
        };
        let error = ServiceError::from_error("cli", &outer);
        assert_eq!(error.code, ErrorCode::UnknownError);
        assert_eq!(
            error.details,
            Some(json!({ "causes": ["outer failure", "disk on fire"] }))
        );
    }
}
