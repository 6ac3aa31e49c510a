//! Migration synthesis.
//!
//! A migration is a pair of scripts: `up` moves the database from the
//! older snapshot to the newer one and `down` moves it back. Both are
//! planned from the same change map, so `down` is the plan of the reversed
//! snapshots rather than a mechanical inversion of `up`.

use serde::Serialize;
use tracing::debug;

use crate::autodetector::{Autodetector, Scope};
use crate::dialect::Dialect;
use crate::diff::{diff_schemas, ChangeMap, IgnoreKeys};
use crate::emitter::Script;
use crate::error::Result;
use crate::operations::MigrationOperation;
use crate::schema::Schema;

/// The two snapshots a change map was computed from.
#[derive(Debug, Clone, Copy)]
pub struct Snapshots<'a> {
    /// Older snapshot.
    pub from: &'a Schema,
    /// Newer snapshot.
    pub to: &'a Schema,
}

impl<'a> Snapshots<'a> {
    /// Creates a snapshot pair.
    #[must_use]
    pub const fn new(from: &'a Schema, to: &'a Schema) -> Self {
        Self { from, to }
    }

    /// The same pair, newer first.
    #[must_use]
    pub const fn reversed(self) -> Self {
        Self {
            from: self.to,
            to: self.from,
        }
    }
}

/// Forward and reverse migration scripts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Migration {
    /// Script applying the change.
    pub up: String,
    /// Script reverting the change.
    pub down: String,
}

impl Migration {
    /// Returns true if neither direction has any statement.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.up.is_empty() && self.down.is_empty()
    }
}

/// Synthesizes the migration described by a change map.
///
/// An empty change map yields an empty migration without looking at the
/// snapshots.
///
/// # Errors
///
/// Returns an integrity error if either snapshot fails validation. Nothing
/// is produced in that case.
pub fn synthesize(
    changes: &ChangeMap,
    dialect: Dialect,
    snapshots: Snapshots<'_>,
) -> Result<Migration> {
    if changes.is_empty() {
        debug!("No changes detected");
        return Ok(Migration::default());
    }

    snapshots.from.validate()?;
    snapshots.to.validate()?;

    let scope = Scope::from_changes(changes);
    if scope.is_empty() {
        debug!(changes = changes.len(), "No schema entity changed");
        return Ok(Migration::default());
    }

    let detector = Autodetector::new(dialect);
    let up = detector.plan(&scope, snapshots.from, snapshots.to)?;
    let reverse = snapshots.reversed();
    let down = detector.plan(&scope, reverse.from, reverse.to)?;

    let migration = Migration {
        up: render(dialect, &up)?,
        down: render(dialect, &down)?,
    };
    debug!(
        dialect = %dialect,
        changes = changes.len(),
        up = up.len(),
        down = down.len(),
        "Synthesized migration"
    );
    Ok(migration)
}

/// Diffs two snapshots and synthesizes the migration between them.
///
/// # Errors
///
/// Returns an integrity error if either snapshot fails validation.
pub fn migrate(
    from: &Schema,
    to: &Schema,
    dialect: Dialect,
    ignore: &IgnoreKeys,
) -> Result<Migration> {
    let changes = diff_schemas(from, to, ignore)?;
    synthesize(&changes, dialect, Snapshots::new(from, to))
}

/// Renders operations as one script.
///
/// # Errors
///
/// Returns an integrity error if an operation references a missing entity.
pub fn render(dialect: Dialect, operations: &[MigrationOperation<'_>]) -> Result<String> {
    let sql = dialect.sql();
    let mut script = Script::for_dialect(sql);
    for operation in operations {
        let statements = sql.generate_sql(operation)?;
        debug!(
            operation = operation.kind(),
            statements = statements.len(),
            "Generated SQL"
        );
        script.extend(statements);
    }
    Ok(script.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::Change;
    use crate::error::SchemaError;
    use crate::schema::{Field, Relationship, Table};
    use serde_json::json;

    fn users() -> Schema {
        Schema::new().table(
            Table::new(0, "users")
                .field(Field::new(0, "id", "INT").primary().increment())
                .field(Field::new(1, "email", "VARCHAR").size("100")),
        )
    }

    #[test]
    fn test_empty_change_map_is_empty_migration() {
        let schema = users();
        let migration =
            synthesize(&ChangeMap::new(), Dialect::MySql, Snapshots::new(&schema, &schema))
                .unwrap();
        assert!(migration.is_empty());
    }

    #[test]
    fn test_add_column_up_and_down() {
        let from = users();
        let mut to = users();
        to.tables[0].fields.push(Field::new(2, "age", "INT"));

        let migration = migrate(&from, &to, Dialect::MySql, &IgnoreKeys::presentation()).unwrap();
        assert_eq!(migration.up, "ALTER TABLE `users` ADD COLUMN `age` INT;\n");
        assert_eq!(migration.down, "ALTER TABLE `users` DROP COLUMN `age`;\n");
    }

    #[test]
    fn test_non_schema_paths_produce_nothing() {
        let schema = users();
        let mut changes = ChangeMap::new();
        changes.insert(
            "database".to_string(),
            Change {
                from: Some(json!("generic")),
                to: Some(json!("mysql")),
            },
        );
        let migration =
            synthesize(&changes, Dialect::Postgres, Snapshots::new(&schema, &schema)).unwrap();
        assert!(migration.is_empty());
    }

    #[test]
    fn test_invalid_snapshot_aborts() {
        let from = users();
        let to = users().relationship(Relationship::new(3, "fk_bad", (0, 1), (7, 0)));
        let err = migrate(&from, &to, Dialect::Postgres, &IgnoreKeys::presentation()).unwrap_err();
        assert!(err.is_integrity_error());
        assert!(matches!(err, SchemaError::DanglingReference { .. }));
    }

    #[test]
    fn test_presentation_only_changes_are_ignored() {
        let from = users();
        let mut older = serde_json::to_value(&from).unwrap();
        let mut newer = older.clone();
        older["tables"][0]["x"] = json!(10);
        newer["tables"][0]["x"] = json!(250);
        newer["tables"][0]["color"] = json!("#175e7a");
        let changes = crate::diff::diff(&older, &newer, &IgnoreKeys::presentation());
        let migration =
            synthesize(&changes, Dialect::Sqlite, Snapshots::new(&from, &from)).unwrap();
        assert!(migration.is_empty());
    }
}
