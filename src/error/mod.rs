use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;

use anyhow::Error as AnyhowError;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeJsonError;
use sqlx::Error as SqlxError;
use std::io::Error as IoError;
use ts_rs::TS;

mod storage;

pub use storage::{IdentifierKind, StorageError};

/// Raised when an operation needs a signed-in actor and none is present.
pub const AUTH_REQUIRED: &str = "AUTH/REQUIRED";
pub const STORE_SCHEMA_MISSING: &str = "STORE/SCHEMA_MISSING";
pub const STORE_PERMISSION_DENIED: &str = "STORE/PERMISSION_DENIED";
pub const STORE_ERROR: &str = "STORE/ERROR";
pub const STORE_INVALID_TABLE: &str = "STORE/INVALID_TABLE";
pub const STORE_INVALID_COLUMN: &str = "STORE/INVALID_COLUMN";
pub const STORE_NOT_FOUND: &str = "STORE/NOT_FOUND";
pub const RECORD_DECODE: &str = "RECORD/DECODE";

/// Error surfaced to the CLI and to any front end consuming the bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AppError {
    /// Machine readable error code.
    pub code: String,
    /// Message that can be shown directly to the broker.
    pub message: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    #[ts(optional, as = "Option<HashMap<String, String>>")]
    pub context: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub cause: Option<Box<AppError>>,
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Code used when an upstream error does not expose a specific code.
    pub const UNKNOWN_CODE: &'static str = "APP/UNKNOWN";
    /// Code used for errors created from free-form messages.
    pub const GENERIC_CODE: &'static str = "APP/GENERIC";

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        AppError {
            code: code.into(),
            message: message.into(),
            context: HashMap::new(),
            cause: None,
        }
    }

    /// Precondition failure for mutations attempted while signed out.
    pub fn auth_required(action: &str, label: &str) -> Self {
        let article = match label.chars().next() {
            Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
            _ => "a",
        };
        AppError::new(
            AUTH_REQUIRED,
            format!("You must be logged in to {action} {article} {label}"),
        )
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &HashMap<String, String> {
        &self.context
    }

    pub fn cause(&self) -> Option<&AppError> {
        self.cause.as_deref()
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<AppError>) -> Self {
        self.cause = Some(Box::new(cause.into()));
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.is_empty() {
            write!(f, "[{}] {}", self.code, self.message)
        } else {
            let mut keys: Vec<_> = self.context.iter().collect();
            keys.sort();
            write!(f, "[{}] {} ({:?})", self.code, self.message, keys)
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

impl From<&str> for AppError {
    fn from(message: &str) -> Self {
        AppError::new(AppError::GENERIC_CODE, message)
    }
}

impl From<String> for AppError {
    fn from(message: String) -> Self {
        AppError::new(AppError::GENERIC_CODE, message)
    }
}

impl From<AnyhowError> for AppError {
    fn from(error: AnyhowError) -> Self {
        fn convert(err: &(dyn StdError + 'static)) -> AppError {
            if let Some(app) = err.downcast_ref::<AppError>() {
                return app.clone();
            }
            if let Some(storage) = err.downcast_ref::<StorageError>() {
                return AppError::from(storage.clone());
            }

            let mut root = AppError::new(AppError::UNKNOWN_CODE, err.to_string());
            if let Some(source) = err.source() {
                root.cause = Some(Box::new(convert(source)));
            }
            root
        }

        convert(error.as_ref())
    }
}

impl From<StorageError> for AppError {
    fn from(error: StorageError) -> Self {
        match &error {
            StorageError::SchemaMissing { table } => {
                AppError::new(STORE_SCHEMA_MISSING, error.to_string()).with_context("table", table)
            }
            StorageError::PermissionDenied { table } => {
                AppError::new(STORE_PERMISSION_DENIED, error.to_string())
                    .with_context("table", table)
            }
            StorageError::NotFound { table, id } => AppError::new(STORE_NOT_FOUND, error.to_string())
                .with_context("table", table)
                .with_context("id", id),
            StorageError::InvalidIdentifier { kind, name } => {
                let code = match kind {
                    IdentifierKind::Table => STORE_INVALID_TABLE,
                    IdentifierKind::Column => STORE_INVALID_COLUMN,
                };
                AppError::new(code, error.to_string()).with_context("name", name)
            }
            StorageError::Other(message) => AppError::new(STORE_ERROR, message.clone()),
        }
    }
}

impl From<IoError> for AppError {
    fn from(error: IoError) -> Self {
        let code = format!("IO/{:?}", error.kind());
        let mut app_error = AppError::new(code, error.to_string());
        if let Some(os_code) = error.raw_os_error() {
            app_error = app_error.with_context("os_code", os_code.to_string());
        }
        app_error
    }
}

impl From<SerdeJsonError> for AppError {
    fn from(error: SerdeJsonError) -> Self {
        let code = if error.is_data() {
            "JSON/DATA"
        } else if error.is_syntax() {
            "JSON/SYNTAX"
        } else if error.is_eof() {
            "JSON/EOF"
        } else {
            "JSON/ERROR"
        };
        AppError::new(code, error.to_string())
    }
}

impl From<SqlxError> for AppError {
    fn from(error: SqlxError) -> Self {
        match error {
            SqlxError::RowNotFound => AppError::new("SQLX/ROW_NOT_FOUND", "Record not found"),
            SqlxError::PoolTimedOut => AppError::new(
                "SQLX/POOL_TIMEOUT",
                "Timed out acquiring a database connection",
            ),
            SqlxError::PoolClosed => AppError::new("SQLX/POOL_CLOSED", "Database pool is closed"),
            SqlxError::Io(err) => AppError::from(err).with_context("source", "sqlx"),
            SqlxError::Database(db) => {
                let code = db
                    .code()
                    .map(|code| format!("Sqlite/{code}"))
                    .unwrap_or_else(|| "SQLX/DATABASE".to_string());
                AppError::new(code, db.message().to_string())
            }
            other => AppError::new("SQLX/ERROR", other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn auth_required_reads_naturally() {
        let err = AppError::auth_required("add", "referral");
        assert_eq!(err.code(), AUTH_REQUIRED);
        assert_eq!(err.message(), "You must be logged in to add a referral");

        let err = AppError::auth_required("delete", "incentive");
        assert_eq!(err.message(), "You must be logged in to delete an incentive");
    }

    #[test]
    fn storage_errors_keep_their_class() {
        let denied = AppError::from(StorageError::PermissionDenied {
            table: "referrals".into(),
        });
        assert_eq!(denied.code(), STORE_PERMISSION_DENIED);
        assert_eq!(denied.context().get("table").map(String::as_str), Some("referrals"));

        let other = AppError::from(StorageError::Other("disk I/O error".into()));
        assert_eq!(other.code(), STORE_ERROR);
        assert_eq!(other.message(), "disk I/O error");

        let missing = AppError::from(StorageError::not_found("referrals", "r-9"));
        assert_eq!(missing.code(), STORE_NOT_FOUND);
        assert_eq!(missing.context().get("id").map(String::as_str), Some("r-9"));
        let invalid = AppError::from(StorageError::InvalidIdentifier {
            kind: IdentifierKind::Table,
            name: "pets".into(),
        });
        assert_eq!(invalid.code(), STORE_INVALID_TABLE);
    }

    #[test]
    fn free_text_messages_are_never_reclassified() {
        // A driver message that happens to look like a typed failure stays generic.
        let lookalike = AppError::from(StorageError::Other(
            "invalid table: sqlite_master row x not found".into(),
        ));
        assert_eq!(lookalike.code(), STORE_ERROR);
    }

    #[test]
    fn anyhow_chain_preserves_storage_cause() {
        let err = (|| -> anyhow::Result<()> {
            Err(StorageError::SchemaMissing {
                table: "commissions".into(),
            })
            .context("load commissions")
        })()
        .unwrap_err();

        let app_error = AppError::from(err);
        assert_eq!(app_error.code(), AppError::UNKNOWN_CODE);
        assert_eq!(app_error.message(), "load commissions");
        let cause = app_error.cause().expect("storage cause present");
        assert_eq!(cause.code(), STORE_SCHEMA_MISSING);
    }

    #[test]
    fn sqlx_row_not_found_translates_to_specific_code() {
        let app_error = AppError::from(SqlxError::RowNotFound);
        assert_eq!(app_error.code(), "SQLX/ROW_NOT_FOUND");
    }

    #[test]
    fn json_shape_is_flat_struct() {
        let error = AppError::new("VALIDATION/REQUIRED", "nope").with_context("field", "source");
        let value = serde_json::to_value(&error).expect("serialize app error");
        assert_eq!(value["code"], "VALIDATION/REQUIRED");
        assert_eq!(value["context"]["field"], "source");
        assert!(value.get("cause").is_none());
    }
}
