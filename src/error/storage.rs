use std::fmt;

use thiserror::Error;

/// Postgres SQLSTATE for an undefined table.
pub const SQLSTATE_UNDEFINED_TABLE: &str = "42P01";
/// Postgres SQLSTATE raised by row-level security and missing grants.
pub const SQLSTATE_INSUFFICIENT_PRIVILEGE: &str = "42501";
/// SQLite primary result code for an authorizer denial.
pub const SQLITE_AUTH: &str = "23";

/// Failure reported by a [`crate::store::RowStore`] adapter.
///
/// Adapters translate their backend's error encoding into one of these
/// variants so the fetch and operations layers never match vendor codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("relation \"{table}\" does not exist")]
    SchemaMissing { table: String },
    #[error("permission denied for table {table}")]
    PermissionDenied { table: String },
    /// No row with `id` is visible to the actor.
    #[error("{table} row {id} not found")]
    NotFound { table: String, id: String },
    #[error("invalid {kind}: {name}")]
    InvalidIdentifier { kind: IdentifierKind, name: String },
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Table,
    Column,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IdentifierKind::Table => "table",
            IdentifierKind::Column => "column",
        })
    }
}

impl StorageError {
    /// Classify a backend error from its code and message.
    pub fn classify(code: Option<&str>, message: &str, table: &str) -> Self {
        let lowered = message.to_ascii_lowercase();
        let table = table.to_string();
        match code {
            Some(SQLSTATE_UNDEFINED_TABLE) => return StorageError::SchemaMissing { table },
            Some(SQLSTATE_INSUFFICIENT_PRIVILEGE) | Some(SQLITE_AUTH) => {
                return StorageError::PermissionDenied { table }
            }
            _ => {}
        }
        if lowered.contains("no such table")
            || (lowered.contains("relation") && lowered.contains("does not exist"))
        {
            StorageError::SchemaMissing { table }
        } else if lowered.contains("permission denied") || lowered.contains("not authorized") {
            StorageError::PermissionDenied { table }
        } else {
            StorageError::Other(message.to_string())
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, StorageError::PermissionDenied { .. })
    }

    pub fn is_schema_missing(&self) -> bool {
        matches!(self, StorageError::SchemaMissing { .. })
    }

    pub fn not_found(table: &str, id: &str) -> Self {
        StorageError::NotFound {
            table: table.to_string(),
            id: id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_codes_take_priority() {
        assert_eq!(
            StorageError::classify(Some("42P01"), "whatever", "referrals"),
            StorageError::SchemaMissing {
                table: "referrals".into()
            }
        );
        assert_eq!(
            StorageError::classify(Some("42501"), "new row violates policy", "referrals"),
            StorageError::PermissionDenied {
                table: "referrals".into()
            }
        );
    }

    #[test]
    fn messages_are_sniffed_when_code_is_absent() {
        assert!(StorageError::classify(None, "no such table: clients", "clients")
            .is_schema_missing());
        assert!(StorageError::classify(
            None,
            "relation \"public.referrals\" does not exist",
            "referrals"
        )
        .is_schema_missing());
        assert!(
            StorageError::classify(None, "permission denied for table incentives", "incentives")
                .is_permission_denied()
        );
        assert_eq!(
            StorageError::classify(Some("2067"), "UNIQUE constraint failed: clients.id", "clients"),
            StorageError::Other("UNIQUE constraint failed: clients.id".into())
        );
    }

    #[test]
    fn typed_variants_render_readable_messages() {
        assert_eq!(
            StorageError::not_found("referrals", "r-9").to_string(),
            "referrals row r-9 not found"
        );
        let invalid = StorageError::InvalidIdentifier {
            kind: IdentifierKind::Column,
            name: "date; drop".into(),
        };
        assert_eq!(invalid.to_string(), "invalid column: date; drop");
    }
}
