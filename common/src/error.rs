use thiserror::Error;

/// Errors raised while building or loading a service definition.
///
/// Every variant is produced at the point a value is assigned or parsed.
/// Renderers never produce errors of their own; they only surface the ones
/// recorded while the definition block ran.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("{field} expects {expected}, got {found}")]
    Shape {
        field: &'static str,
        expected: &'static str,
        found: String,
    },

    #[error("{field} must be one of [{}], got {value:?}", allowed.join(", "))]
    UnknownVariant {
        field: &'static str,
        value: String,
        allowed: &'static [&'static str],
    },

    #[error("invalid cron statement {statement:?}: {reason}")]
    Schedule { statement: String, reason: String },

    #[error("unreadable persisted service: {0}")]
    Persisted(String),
}

impl ServiceError {
    pub(crate) fn shape(field: &'static str, expected: &'static str, found: impl ToString) -> Self {
        ServiceError::Shape {
            field,
            expected,
            found: found.to_string(),
        }
    }
}

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;
