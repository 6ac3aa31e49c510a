//! SQLite dialect.
//!
//! SQLite has limited ALTER TABLE support, so some operations require
//! the "table recreation" strategy: create a new table, copy data,
//! drop the old table, rename the new table. Foreign keys cannot be added
//! after creation and are declared inside `CREATE TABLE`; SQLite resolves
//! the referenced table lazily, so declaration order does not matter.
//!
//! Column types use SQLite's affinity names. Enumerations and JSON are
//! stored as `TEXT` guarded by a check constraint.

use tracing::warn;

use crate::error::Result;
use crate::operations::MigrationOperation;
use crate::schema::{Field, Index, Schema, Table};
use crate::types::{
    classify, group_call, is_integer, quoted_values, render_default, ColumnType, TypeCategory,
    TypeRef,
};

use super::{rebuild_table, SqlDialect};

/// SQLite dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// The sole integer primary key column declared as
    /// `INTEGER PRIMARY KEY AUTOINCREMENT`, if the table has one.
    fn autoincrement_key(table: &Table) -> Option<&Field> {
        let mut pk = table.primary_key();
        match (pk.next(), pk.next()) {
            (Some(field), None) if field.increment && is_integer(field) => Some(field),
            _ => None,
        }
    }

    fn in_values_check(&self, field: &Field, values: &[String]) -> Option<String> {
        if values.is_empty() {
            None
        } else {
            Some(format!(
                "CHECK({} IN ({}))",
                self.quote_identifier(&field.name),
                quoted_values(values)
            ))
        }
    }

    fn json_check(&self, field: &Field) -> String {
        format!("CHECK(json_valid({}))", self.quote_identifier(&field.name))
    }
}

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn column_type(&self, schema: &Schema, table: &Table, field: &Field) -> ColumnType {
        let ty = match classify(schema, &field.type_name) {
            TypeRef::Builtin(b) => {
                let affinity = match b.category {
                    TypeCategory::Integer | TypeCategory::Boolean => "INTEGER",
                    TypeCategory::Decimal => "NUMERIC",
                    TypeCategory::Float => "REAL",
                    TypeCategory::Binary | TypeCategory::Blob => "BLOB",
                    _ => "TEXT",
                };
                let ty = ColumnType::new(affinity);
                match b.category {
                    TypeCategory::Enum => match self.in_values_check(field, &field.values) {
                        Some(check) => ty.with_check(check),
                        None => ty,
                    },
                    TypeCategory::Json => ty.with_check(self.json_check(field)),
                    _ => ty,
                }
            }
            TypeRef::Composite(_) => ColumnType::new("TEXT").with_check(self.json_check(field)),
            TypeRef::Enumeration(en) => match self.in_values_check(field, &en.values) {
                Some(check) => ColumnType::new("TEXT").with_check(check),
                None => ColumnType::new("TEXT"),
            },
            TypeRef::Unknown => {
                warn!(
                    table = %table.name,
                    field = %field.name,
                    type_name = %field.type_name,
                    fallback = "BLOB",
                    "Unknown type, using lossy fallback"
                );
                ColumnType::new("BLOB").lossy()
            }
        };

        if !field.increment {
            return ty;
        }
        match Self::autoincrement_key(table) {
            Some(key) if key.id == field.id => {
                ColumnType::new("INTEGER PRIMARY KEY AUTOINCREMENT").identity()
            }
            _ => {
                warn!(
                    table = %table.name,
                    field = %field.name,
                    "AUTOINCREMENT requires a sole INTEGER primary key, ignoring"
                );
                ty
            }
        }
    }

    fn identity_clause(&self) -> Option<&'static str> {
        None
    }

    // Expression defaults must be parenthesized.
    fn default_literal(&self, schema: &Schema, field: &Field, raw: &str) -> String {
        let rendered = render_default(raw, classify(schema, &field.type_name).quoted_default());
        group_call(rendered, |_| false)
    }

    fn supports_alter_column(&self) -> bool {
        false
    }

    fn supports_add_constraint(&self) -> bool {
        false
    }

    fn create_table_keyword(&self) -> &'static str {
        "CREATE TABLE IF NOT EXISTS"
    }

    fn inline_primary_key(&self, table: &Table) -> bool {
        Self::autoincrement_key(table).is_some()
    }

    fn table_constraints(&self, schema: &Schema, table: &Table) -> Result<Vec<String>> {
        Ok(schema
            .foreign_keys_of(table)?
            .iter()
            .map(|fk| self.foreign_key_clause(fk))
            .collect())
    }

    fn index_if_not_exists(&self) -> bool {
        true
    }

    fn drop_index(&self, _table: &Table, index: &Index) -> String {
        format!("DROP INDEX IF EXISTS {}", self.quote_identifier(&index.name))
    }

    fn generate_sql(&self, operation: &MigrationOperation) -> Result<Vec<String>> {
        let q = |name: &str| self.quote_identifier(name);
        let statements = match operation {
            MigrationOperation::CreateType { .. }
            | MigrationOperation::DropType { .. }
            | MigrationOperation::AlterType { .. }
            | MigrationOperation::CreateEnum { .. }
            | MigrationOperation::DropEnum { .. }
            | MigrationOperation::AlterEnum { .. }
            | MigrationOperation::SetTableComment { .. }
            | MigrationOperation::SetInheritance { .. } => Vec::new(),

            MigrationOperation::CreateTable { table } => {
                self.create_table(table.schema, table.table)?
            }

            MigrationOperation::DropTable { table } => vec![self.drop_table(table.table)],

            MigrationOperation::RenameTable { old, new } => {
                vec![self.rename_table(old.name(), new.name())]
            }

            MigrationOperation::RebuildTable { old, new } => {
                let mut statements = vec!["PRAGMA foreign_keys=OFF".to_string()];
                statements.extend(rebuild_table(self, *old, *new)?);
                statements.push("PRAGMA foreign_keys=ON".to_string());
                statements
            }

            MigrationOperation::AddColumn { table, field } => vec![format!(
                "ALTER TABLE {} ADD COLUMN {}",
                q(table.name()),
                self.column_definition(table.schema, table.table, field)
            )],

            // SQLite 3.35.0+ supports DROP COLUMN
            MigrationOperation::DropColumn { table, field } => vec![format!(
                "ALTER TABLE {} DROP COLUMN {}",
                q(table.name()),
                q(&field.name)
            )],

            MigrationOperation::AlterColumn {
                old,
                new_table,
                new,
                changes,
                ..
            } => {
                let mut statements = Vec::new();
                if changes.renamed {
                    statements.push(format!(
                        "ALTER TABLE {} RENAME COLUMN {} TO {}",
                        q(new_table.name()),
                        q(&old.name),
                        q(&new.name)
                    ));
                }
                if changes.alters_definition() || changes.unique {
                    statements.push(format!(
                        "-- ALTER COLUMN not supported in SQLite. \
                         Table recreation required for: {}.{}",
                        new_table.name(),
                        new.name
                    ));
                }
                statements
            }

            MigrationOperation::SetPrimaryKey { new, .. } => vec![format!(
                "-- Primary key cannot be changed in SQLite. \
                 Table recreation required for: {}",
                new.name()
            )],

            MigrationOperation::CreateIndex { table, index } => {
                vec![self.create_index(table.table, index)]
            }

            MigrationOperation::DropIndex { table, index } => {
                vec![self.drop_index(table.table, index)]
            }

            MigrationOperation::AddForeignKey { fk } | MigrationOperation::DropForeignKey { fk } => {
                vec![format!(
                    "-- Foreign key {} cannot be changed after table creation in SQLite. \
                     Table recreation required.",
                    fk.constraint_name()
                )]
            }
        };
        Ok(statements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::TableRef;
    use crate::schema::Relationship;

    fn dialect() -> SqliteDialect {
        SqliteDialect::new()
    }

    #[test]
    fn test_inline_autoincrement_primary_key() {
        let table = Table::new(0, "users")
            .field(Field::new(0, "id", "INT").primary().increment())
            .field(Field::new(1, "name", "VARCHAR"));
        let sql = dialect()
            .create_table_statement(&Schema::new(), &table, "users")
            .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"users\" (\n\t\"id\" INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,\n\t\"name\" TEXT\n)"
        );
    }

    #[test]
    fn test_composite_key_keeps_trailing_clause() {
        let table = Table::new(0, "pairs")
            .field(Field::new(0, "a", "INT").primary())
            .field(Field::new(1, "b", "INT").primary());
        let sql = dialect()
            .create_table_statement(&Schema::new(), &table, "pairs")
            .unwrap();
        assert!(sql.contains("PRIMARY KEY(\"a\", \"b\")"));
    }

    #[test]
    fn test_enum_becomes_checked_text() {
        let table = Table::new(0, "t").field(Field::new(0, "size", "ENUM").values(["s", "m"]));
        assert_eq!(
            dialect().column_definition(&Schema::new(), &table, &table.fields[0]),
            "\"size\" TEXT CHECK(\"size\" IN ('s', 'm'))"
        );
    }

    #[test]
    fn test_function_defaults_are_parenthesized() {
        let table = Table::new(0, "t")
            .field(Field::new(0, "tag", "VARCHAR").default_value("lower('X')"))
            .field(Field::new(1, "at", "DATETIME").default_value("CURRENT_TIMESTAMP"))
            .field(Field::new(2, "n", "INT").default_value("0"));
        let schema = Schema::new();
        let column = |i: usize| dialect().column_definition(&schema, &table, &table.fields[i]);
        assert_eq!(column(0), "\"tag\" TEXT DEFAULT (lower('X'))");
        assert_eq!(column(1), "\"at\" TEXT DEFAULT CURRENT_TIMESTAMP");
        assert_eq!(column(2), "\"n\" INTEGER DEFAULT 0");
    }

    #[test]
    fn test_foreign_keys_are_inline() {
        let schema = Schema::new()
            .table(
                Table::new(0, "orders")
                    .field(Field::new(0, "id", "INT").primary())
                    .field(Field::new(1, "customer_id", "INT")),
            )
            .table(Table::new(1, "customers").field(Field::new(0, "id", "INT").primary()))
            .relationship(Relationship::new(0, "fk", (0, 1), (1, 0)));
        let sql = dialect()
            .create_table_statement(&schema, &schema.tables[0], "orders")
            .unwrap();
        assert!(sql.contains(
            "FOREIGN KEY(\"customer_id\") REFERENCES \"customers\"(\"id\") ON UPDATE NO ACTION ON DELETE NO ACTION"
        ));
    }

    #[test]
    fn test_rebuild_copies_surviving_columns() {
        let old = Schema::new().table(
            Table::new(0, "t")
                .field(Field::new(0, "a", "INT"))
                .field(Field::new(1, "b", "TEXT")),
        );
        let new = Schema::new().table(
            Table::new(0, "t")
                .field(Field::new(0, "a", "INT").not_null())
                .field(Field::new(2, "c", "TEXT"))
                .index(Index::new(0, "idx_a", ["a"])),
        );
        let op = MigrationOperation::RebuildTable {
            old: TableRef::new(&old, &old.tables[0]),
            new: TableRef::new(&new, &new.tables[0]),
        };
        let statements = dialect().generate_sql(&op).unwrap();
        assert_eq!(
            statements,
            vec![
                "PRAGMA foreign_keys=OFF".to_string(),
                "CREATE TABLE IF NOT EXISTS \"t__rebuild\" (\n\t\"a\" INTEGER NOT NULL,\n\t\"c\" TEXT\n)".to_string(),
                "INSERT INTO \"t__rebuild\" (\"a\") SELECT \"a\" FROM \"t\"".to_string(),
                "DROP TABLE IF EXISTS \"t\"".to_string(),
                "ALTER TABLE \"t__rebuild\" RENAME TO \"t\"".to_string(),
                "CREATE INDEX IF NOT EXISTS \"idx_a\" ON \"t\" (\"a\")".to_string(),
                "PRAGMA foreign_keys=ON".to_string(),
            ]
        );
    }
}
