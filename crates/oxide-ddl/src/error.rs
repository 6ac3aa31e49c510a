//! Error types for DDL emission and migration synthesis.

use std::fmt;
use std::path::PathBuf;

use crate::schema::EntityId;

/// The kind of schema entity an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A table.
    Table,
    /// A field (column) of a table.
    Field,
    /// An index of a table.
    Index,
    /// A relationship (foreign key).
    Relationship,
    /// A composite type.
    CompositeType,
    /// A schema-level enumeration.
    Enumeration,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Table => "table",
            Self::Field => "field",
            Self::Index => "index",
            Self::Relationship => "relationship",
            Self::CompositeType => "type",
            Self::Enumeration => "enum",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while compiling a schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// An entity references another entity that does not exist.
    #[error("{kind} '{id}' references missing {target} '{target_id}'")]
    DanglingReference {
        /// Kind of the referencing entity.
        kind: EntityKind,
        /// Identifier of the referencing entity.
        id: String,
        /// Kind of the missing entity.
        target: EntityKind,
        /// Identifier (or name) of the missing entity.
        target_id: String,
    },

    /// A required name is empty.
    #[error("{kind} '{id}' has an empty name")]
    EmptyName {
        /// Kind of the unnamed entity.
        kind: EntityKind,
        /// Identifier of the unnamed entity.
        id: String,
    },

    /// Two entities share an identifier within the same scope.
    #[error("duplicate {kind} id '{id}' in {scope}")]
    DuplicateId {
        /// Kind of the duplicated entity.
        kind: EntityKind,
        /// The duplicated identifier.
        id: String,
        /// Where the duplicate was found (e.g. a table name).
        scope: String,
    },

    /// A dialect name could not be parsed.
    #[error("unknown dialect '{0}' (expected one of: mysql, mariadb, postgres, sqlite, mssql)")]
    UnknownDialect(String),

    /// IO error (reading schemas, writing scripts).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Output file already exists.
    #[error("file already exists: {0}")]
    FileExists(PathBuf),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SchemaError {
    /// Creates a dangling reference error.
    pub fn dangling(
        kind: EntityKind,
        id: impl fmt::Display,
        target: EntityKind,
        target_id: impl fmt::Display,
    ) -> Self {
        Self::DanglingReference {
            kind,
            id: id.to_string(),
            target,
            target_id: target_id.to_string(),
        }
    }

    /// Creates an empty name error.
    pub fn empty_name(kind: EntityKind, id: &EntityId) -> Self {
        Self::EmptyName {
            kind,
            id: id.to_string(),
        }
    }

    /// Returns `true` for model-integrity errors (as opposed to IO or
    /// configuration failures).
    #[must_use]
    pub const fn is_integrity_error(&self) -> bool {
        matches!(
            self,
            Self::DanglingReference { .. } | Self::EmptyName { .. } | Self::DuplicateId { .. }
        )
    }
}

/// Result type for schema compilation.
pub type Result<T> = std::result::Result<T, SchemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dangling_reference_message_locates_entity() {
        let err = SchemaError::dangling(
            EntityKind::Relationship,
            "fk_orders",
            EntityKind::Table,
            7,
        );
        assert_eq!(
            err.to_string(),
            "relationship 'fk_orders' references missing table '7'"
        );
        assert!(err.is_integrity_error());
    }

    #[test]
    fn io_errors_are_not_integrity_errors() {
        let err = SchemaError::from(std::io::Error::other("disk full"));
        assert!(!err.is_integrity_error());
    }
}
