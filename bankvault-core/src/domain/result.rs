//! Result and error types for the core library

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single violated field from a validation schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// All violations found while validating one request, in schema order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether a given field has at least one violation
    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Turn collected violations into a result
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(ValidationErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Deliberately says nothing about which half of the credentials was wrong
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Current password is incorrect")]
    IncorrectPassword,

    /// Cipher-level failure. Internal: operations map it to `Unreadable`
    /// or fall back to a legacy comparison.
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// A stored record failed to decrypt. The message shown to callers is
    /// fixed; the cipher's reason is kept for logging only.
    #[error("Stored data could not be read")]
    Unreadable(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a validation error for a single field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, message);
        Self::Validation(errors)
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Storage and startup failures. These escape the operation boundary;
    /// everything else is folded into an `OperationResult`.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Database(_) | Error::Io(_) | Error::Json(_) | Error::Config(_)
        )
    }

    /// Short machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::InvalidCredentials => "invalid_credentials",
            Error::IncorrectPassword => "incorrect_password",
            Error::Decryption(_) => "decryption",
            Error::Unreadable(_) => "unreadable",
            Error::Encryption(_) => "encryption",
            Error::Config(_) => "config",
            Error::Database(_) => "database",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
        }
    }
}

impl From<duckdb::Error> for Error {
    fn from(e: duckdb::Error) -> Self {
        Error::Database(e.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Operation result with optional context (for UI / FFI serialization)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub context: Option<HashMap<String, serde_json::Value>>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            context: None,
        }
    }

    /// Create a failed result
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: None,
        }
    }

    /// Create a failed result with context
    pub fn fail_with_context(
        error: impl Into<String>,
        context: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: Some(context),
        }
    }

    /// Fold an operation outcome into a result object.
    ///
    /// Fatal errors (storage, IO, config) are returned as `Err`; every other
    /// error becomes a failed `OperationResult` carrying its kind and, for
    /// validation failures, the offending fields.
    pub fn settle(outcome: Result<T>) -> Result<Self> {
        match outcome {
            Ok(data) => Ok(Self::ok(data)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                let mut context = HashMap::new();
                context.insert("kind".to_string(), serde_json::json!(e.kind()));
                if let Error::Validation(fields) = &e {
                    context.insert("fields".to_string(), serde_json::json!(fields.errors));
                }
                Ok(Self::fail_with_context(e.to_string(), context))
            }
        }
    }

    /// Error kind recorded by `settle`, if any
    pub fn error_kind(&self) -> Option<&str> {
        self.context
            .as_ref()
            .and_then(|c| c.get("kind"))
            .and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_result_ok() {
        let result: OperationResult<i32> = OperationResult::ok(42);
        assert!(result.success);
        assert_eq!(result.data, Some(42));
        assert!(result.error.is_none());
    }

    #[test]
    fn test_operation_result_fail() {
        let result: OperationResult<i32> = OperationResult::fail("Something went wrong");
        assert!(!result.success);
        assert!(result.data.is_none());
        assert_eq!(result.error, Some("Something went wrong".to_string()));
    }

    #[test]
    fn test_settle_folds_domain_errors() {
        let err: Result<i32> = Err(Error::not_found("Bank not found"));
        let result = OperationResult::settle(err).unwrap();
        assert!(!result.success);
        assert_eq!(result.error_kind(), Some("not_found"));
    }

    #[test]
    fn test_settle_lists_validation_fields() {
        let mut errors = ValidationErrors::new();
        errors.add("atm_pin", "must be exactly 4 digits");
        errors.add("account_number", "must be 5-20 characters");
        let result = OperationResult::<()>::settle(Err(Error::Validation(errors))).unwrap();

        let fields = &result.context.as_ref().unwrap()["fields"];
        assert_eq!(fields.as_array().unwrap().len(), 2);
        assert_eq!(fields[0]["field"], "atm_pin");
        assert!(result.error.unwrap().contains("account_number"));
    }

    #[test]
    fn test_settle_propagates_fatal_errors() {
        let err: Result<i32> = Err(Error::database("connection lost"));
        assert!(OperationResult::settle(err).is_err());
    }

    #[test]
    fn test_unreadable_hides_cipher_reason() {
        let err: Result<i32> = Err(Error::Unreadable("authentication failed".to_string()));
        let result = OperationResult::settle(err).unwrap();
        assert_eq!(result.error_kind(), Some("unreadable"));
        assert_eq!(result.error.as_deref(), Some("Stored data could not be read"));
    }

    #[test]
    fn test_invalid_credentials_message_is_generic() {
        let msg = Error::InvalidCredentials.to_string();
        assert_eq!(msg, "Invalid username or password");
    }
}
