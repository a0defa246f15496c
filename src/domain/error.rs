use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("{entity} `{id}` not found")]
    NotFound { entity: String, id: String },
    #[error("field `{field}` is required")]
    MissingField { field: &'static str },
    #[error("field `{field}` is malformed: {reason}")]
    Malformed { field: &'static str, reason: String },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn missing(field: &'static str) -> Self {
        Self::MissingField { field }
    }

    pub fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            field,
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Field the error points at, when it concerns a single input field.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::MissingField { field } | Self::Malformed { field, .. } => Some(field),
            Self::NotFound { .. } | Self::Validation { .. } => None,
        }
    }
}
