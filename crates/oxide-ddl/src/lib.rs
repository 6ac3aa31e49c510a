//! Dialect-aware DDL emission and migration synthesis for diagram schemas.
//!
//! `oxide-ddl` compiles the JSON schema model of a database diagram editor
//! into SQL:
//! - A whole schema is emitted as `CREATE` statements for one dialect
//!   (MySQL, MariaDB, PostgreSQL, SQLite, SQL Server)
//! - Two snapshots are compared into a change map keyed by dotted path
//! - A change map is turned into `up` and `down` migration scripts
//!
//! # Architecture
//!
//! - **Schema** - Tables, fields, indices, relationships, composite types
//!   and enumerations, with integrity validation
//! - **Types** - Classification of abstract type names and default values
//! - **Dialect** - Database-specific SQL generation
//! - **Diff** - Structural comparison of two documents
//! - **Autodetector** - Plans migration operations from a change map
//! - **Migration** - Renders planned operations as scripts
//! - **Writer** - Writes scripts and migration pairs to disk
//!
//! # Example
//!
//! ```rust
//! use oxide_ddl::prelude::*;
//!
//! let schema = Schema::new().table(
//!     Table::new(0, "users")
//!         .field(Field::new(0, "id", "INT").primary().increment())
//!         .field(Field::new(1, "name", "VARCHAR")),
//! );
//!
//! let sql = emit(&schema, Dialect::MySql).unwrap();
//! assert!(sql.starts_with("CREATE TABLE `users`"));
//!
//! let mut next = schema.clone();
//! next.tables[0].fields.push(Field::new(2, "age", "INT"));
//! let migration = migrate(&schema, &next, Dialect::Postgres, &IgnoreKeys::presentation()).unwrap();
//! assert_eq!(migration.up, "ALTER TABLE \"users\" ADD COLUMN \"age\" integer;\n");
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Export a schema as DDL
//! oxide-ddl export schema.json --dialect postgres
//!
//! # Show the change map between two snapshots
//! oxide-ddl diff old.json new.json
//!
//! # Write <timestamp>-migration.up.sql / .down.sql
//! oxide-ddl migrate old.json new.json --dialect mysql --out-dir migrations
//! ```

pub mod autodetector;
pub mod dialect;
pub mod diff;
pub mod emitter;
pub mod error;
pub mod migration;
pub mod operations;
pub mod schema;
pub mod types;
pub mod writer;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::autodetector::{Autodetector, Scope};
    pub use crate::dialect::{
        Dialect, MariaDbDialect, MsSqlDialect, MySqlDialect, PostgresDialect, SqlDialect,
        SqliteDialect,
    };
    pub use crate::diff::{diff, diff_schemas, Change, ChangeMap, IgnoreKeys};
    pub use crate::emitter::{emit, emit_script, Script};
    pub use crate::error::{EntityKind, Result, SchemaError};
    pub use crate::migration::{migrate, synthesize, Migration, Snapshots};
    pub use crate::operations::{FieldChanges, MigrationOperation, TableRef};
    pub use crate::schema::{
        Cardinality, CompositeType, ConstraintAction, EntityId, Enumeration, Field, Index,
        Relationship, Schema, Table, TypeField,
    };
    pub use crate::writer::{generate_migration_name, write_script, MigrationWriter};
}
