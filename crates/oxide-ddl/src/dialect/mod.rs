//! SQL dialect implementations.
//!
//! Each dialect knows how to spell column types, table and index
//! statements, foreign keys and migration operations for one database
//! system. [`Dialect`] is the closed set of supported targets and
//! dispatches to the matching [`SqlDialect`] implementation.

mod mariadb;
mod mssql;
mod mysql;
mod postgres;
mod sqlite;

use std::fmt;
use std::str::FromStr;

pub use mariadb::MariaDbDialect;
pub use mssql::MsSqlDialect;
pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use crate::error::{Result, SchemaError};
use crate::operations::{MigrationOperation, TableRef};
use crate::schema::{ConstraintAction, Field, ForeignKey, Index, Schema, Table};
use crate::types::{classify, render_default, ColumnType};

/// The supported target dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// MySQL 8.
    MySql,
    /// MariaDB 10.7+.
    MariaDb,
    /// PostgreSQL.
    Postgres,
    /// SQLite 3.35+.
    Sqlite,
    /// Microsoft SQL Server 2016+.
    MsSql,
}

impl Dialect {
    /// All dialects, in display order.
    pub const ALL: [Self; 5] = [
        Self::MySql,
        Self::MariaDb,
        Self::Postgres,
        Self::Sqlite,
        Self::MsSql,
    ];

    /// Returns the statement generator for this dialect.
    #[must_use]
    pub fn sql(self) -> &'static dyn SqlDialect {
        match self {
            Self::MySql => &MySqlDialect,
            Self::MariaDb => &MariaDbDialect,
            Self::Postgres => &PostgresDialect,
            Self::Sqlite => &SqliteDialect,
            Self::MsSql => &MsSqlDialect,
        }
    }

    /// Returns the dialect's canonical lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::MariaDb => "mariadb",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
            Self::MsSql => "mssql",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = SchemaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(Self::MySql),
            "mariadb" => Ok(Self::MariaDb),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "sqlite" => Ok(Self::Sqlite),
            "mssql" | "sqlserver" => Ok(Self::MsSql),
            _ => Err(SchemaError::UnknownDialect(s.to_string())),
        }
    }
}

/// Where a column check constraint comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckSource {
    /// Induced by the column type (enumerated values, JSON validity).
    Type,
    /// The field's own check expression.
    Field,
}

/// Trait for database-specific SQL generation.
///
/// The provided methods build the shared statement shapes out of a few
/// per-dialect hooks; dialects override whole statements only where the
/// syntax genuinely differs.
pub trait SqlDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Resolves a field's abstract type to this dialect's column type.
    fn column_type(&self, schema: &Schema, table: &Table, field: &Field) -> ColumnType;

    /// Clause appended to auto-increment columns whose type does not embed
    /// the identity form.
    fn identity_clause(&self) -> Option<&'static str>;

    /// Generates SQL for a migration operation.
    ///
    /// # Errors
    ///
    /// Returns an integrity error if a foreign key cannot be resolved.
    fn generate_sql(&self, operation: &MigrationOperation) -> Result<Vec<String>>;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Quotes and joins a list of identifiers.
    fn quote_list(&self, names: &[&str]) -> String {
        names
            .iter()
            .map(|n| self.quote_identifier(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Statement terminator, including any batch separator.
    fn terminator(&self) -> &'static str {
        ";"
    }

    /// Returns whether this dialect can alter columns in place.
    fn supports_alter_column(&self) -> bool {
        true
    }

    /// Returns whether this dialect supports adding constraints after table creation.
    fn supports_add_constraint(&self) -> bool {
        true
    }

    /// Returns whether composite types and enumerations are real database
    /// objects that columns reference by name.
    fn native_named_types(&self) -> bool {
        false
    }

    /// Renders a field's default expression.
    fn default_literal(&self, schema: &Schema, field: &Field, raw: &str) -> String {
        render_default(raw, classify(schema, &field.type_name).quoted_default())
    }

    /// Name given to a column check at creation. `None` leaves naming to
    /// the database.
    fn column_check_name(
        &self,
        _table: &Table,
        _field: &Field,
        _source: CheckSource,
    ) -> Option<String> {
        None
    }

    /// A `CHECK(...)` clause, prefixed with its constraint name when the
    /// dialect names column checks.
    fn check_clause(&self, table: &Table, field: &Field, source: CheckSource, check: String) -> String {
        match self.column_check_name(table, field, source) {
            Some(name) => format!("CONSTRAINT {} {check}", self.quote_identifier(&name)),
            None => check,
        }
    }

    /// Column comment clause, for dialects with inline comments.
    fn inline_comment(&self, _comment: &str) -> Option<String> {
        None
    }

    /// Maps a referential action to this dialect's keyword.
    fn referential_action(&self, action: ConstraintAction) -> &'static str {
        action.as_sql()
    }

    /// Generates column definition SQL.
    fn column_definition(&self, schema: &Schema, table: &Table, field: &Field) -> String {
        let ty = self.column_type(schema, table, field);
        let mut parts = vec![self.quote_identifier(&field.name), ty.sql];

        if field.not_null {
            parts.push("NOT NULL".to_string());
        }

        if field.increment && !ty.identity_in_type {
            if let Some(identity) = self.identity_clause() {
                parts.push(identity.to_string());
            }
        }

        if field.unique {
            parts.push("UNIQUE".to_string());
        }

        if let Some(default) = &field.default {
            parts.push(format!(
                "DEFAULT {}",
                self.default_literal(schema, field, default)
            ));
        }

        if let Some(check) = ty.check {
            parts.push(self.check_clause(table, field, CheckSource::Type, check));
        }

        if let Some(check) = &field.check {
            parts.push(self.check_clause(
                table,
                field,
                CheckSource::Field,
                format!("CHECK({check})"),
            ));
        }

        if !field.comment.is_empty() {
            if let Some(comment) = self.inline_comment(&field.comment) {
                parts.push(comment);
            }
        }

        parts.join(" ")
    }

    /// Leading keyword of table creation.
    fn create_table_keyword(&self) -> &'static str {
        "CREATE TABLE"
    }

    /// Whether the primary key is already declared inside a column clause.
    fn inline_primary_key(&self, _table: &Table) -> bool {
        false
    }

    /// Extra table constraints (after the primary key).
    ///
    /// # Errors
    ///
    /// Returns an integrity error if a referenced entity is missing.
    fn table_constraints(&self, _schema: &Schema, _table: &Table) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// Text following the closing parenthesis of `CREATE TABLE`.
    fn table_options(&self, _table: &Table) -> String {
        String::new()
    }

    /// Statements that must precede a table's creation.
    fn table_prelude(&self, _schema: &Schema, _table: &Table) -> Vec<String> {
        Vec::new()
    }

    /// Statements that follow a table's creation (comments).
    fn table_postlude(&self, _table: &Table) -> Vec<String> {
        Vec::new()
    }

    /// Schema-level declarations emitted before any table.
    fn schema_types(&self, _schema: &Schema) -> Vec<String> {
        Vec::new()
    }

    /// Generates the `CREATE TABLE` statement under the given name.
    ///
    /// # Errors
    ///
    /// Returns an integrity error if a table constraint cannot be resolved.
    fn create_table_statement(&self, schema: &Schema, table: &Table, name: &str) -> Result<String> {
        let mut lines: Vec<String> = table
            .fields
            .iter()
            .map(|f| self.column_definition(schema, table, f))
            .collect();

        let pk: Vec<&str> = table.primary_key().map(|f| f.name.as_str()).collect();
        if !pk.is_empty() && !self.inline_primary_key(table) {
            lines.push(format!("PRIMARY KEY({})", self.quote_list(&pk)));
        }

        lines.extend(self.table_constraints(schema, table)?);

        let body = if lines.is_empty() {
            "()".to_string()
        } else {
            format!("(\n\t{}\n)", lines.join(",\n\t"))
        };

        Ok(format!(
            "{} {} {}{}",
            self.create_table_keyword(),
            self.quote_identifier(name),
            body,
            self.table_options(table)
        ))
    }

    /// Generates all statements creating a table (without its indices).
    ///
    /// # Errors
    ///
    /// Returns an integrity error if a table constraint cannot be resolved.
    fn create_table(&self, schema: &Schema, table: &Table) -> Result<Vec<String>> {
        let mut statements = self.table_prelude(schema, table);
        statements.push(self.create_table_statement(schema, table, &table.name)?);
        statements.extend(self.table_postlude(table));
        Ok(statements)
    }

    /// Generates SQL renaming a table.
    fn rename_table(&self, from: &str, to: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(from),
            self.quote_identifier(to)
        )
    }

    /// Generates SQL for dropping a table.
    fn drop_table(&self, table: &Table) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quote_identifier(&table.name))
    }

    /// Whether `CREATE INDEX` uses the `IF NOT EXISTS` form.
    fn index_if_not_exists(&self) -> bool {
        false
    }

    /// Generates SQL for creating an index.
    fn create_index(&self, table: &Table, index: &Index) -> String {
        let mut sql = String::from("CREATE ");
        if index.unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        if self.index_if_not_exists() {
            sql.push_str("IF NOT EXISTS ");
        }
        let fields: Vec<&str> = index.fields.iter().map(String::as_str).collect();
        sql.push_str(&format!(
            "{} ON {} ({})",
            self.quote_identifier(&index.name),
            self.quote_identifier(&table.name),
            self.quote_list(&fields)
        ));
        sql
    }

    /// Generates SQL for dropping an index.
    fn drop_index(&self, table: &Table, index: &Index) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(&index.name),
            self.quote_identifier(&table.name)
        )
    }

    /// The `FOREIGN KEY(...) REFERENCES ...(...) ON UPDATE ... ON DELETE ...`
    /// clause.
    fn foreign_key_clause(&self, fk: &ForeignKey) -> String {
        format!(
            "FOREIGN KEY({}) REFERENCES {}({}) ON UPDATE {} ON DELETE {}",
            self.quote_identifier(&fk.field.name),
            self.quote_identifier(&fk.references_table.name),
            self.quote_identifier(&fk.references_field.name),
            self.referential_action(fk.relationship.update_constraint),
            self.referential_action(fk.relationship.delete_constraint)
        )
    }

    /// Generates SQL adding a foreign key, optionally named.
    fn add_foreign_key(&self, fk: &ForeignKey, named: bool) -> String {
        let constraint = if named {
            format!("CONSTRAINT {} ", self.quote_identifier(&fk.constraint_name()))
        } else {
            String::new()
        };
        format!(
            "ALTER TABLE {} ADD {}{}",
            self.quote_identifier(&fk.table.name),
            constraint,
            self.foreign_key_clause(fk)
        )
    }

    /// Generates SQL dropping a named foreign key.
    fn drop_foreign_key(&self, fk: &ForeignKey) -> String {
        format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.quote_identifier(&fk.table.name),
            self.quote_identifier(&fk.constraint_name())
        )
    }
}

/// Recreates a table under its target definition and copies the rows of
/// every column that survives (matched by field id).
///
/// The planner only asks for a rebuild on dialects without in-place column
/// changes, but every dialect renders it through this one path.
///
/// # Errors
///
/// Returns an integrity error if a table constraint cannot be resolved.
pub(crate) fn rebuild_table(d: &dyn SqlDialect, old: TableRef, new: TableRef) -> Result<Vec<String>> {
    let staging = format!("{}__rebuild", new.name());
    let mut statements = vec![d.create_table_statement(new.schema, new.table, &staging)?];

    let (targets, sources): (Vec<&str>, Vec<&str>) = new
        .table
        .fields
        .iter()
        .filter_map(|f| {
            old.table
                .get_field(&f.id)
                .map(|o| (f.name.as_str(), o.name.as_str()))
        })
        .unzip();
    if !targets.is_empty() {
        statements.push(format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            d.quote_identifier(&staging),
            d.quote_list(&targets),
            d.quote_list(&sources),
            d.quote_identifier(old.name())
        ));
    }

    statements.push(d.drop_table(old.table));
    statements.push(d.rename_table(&staging, new.name()));
    statements.extend(
        new.table
            .indices
            .iter()
            .map(|index| d.create_index(new.table, index)),
    );
    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dialect_names() {
        assert_eq!("mysql".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert_eq!("MariaDB".parse::<Dialect>().unwrap(), Dialect::MariaDb);
        assert_eq!("postgresql".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("sqlite".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert_eq!("sqlserver".parse::<Dialect>().unwrap(), Dialect::MsSql);
        assert!(matches!(
            "oracle".parse::<Dialect>(),
            Err(SchemaError::UnknownDialect(_))
        ));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for dialect in Dialect::ALL {
            assert_eq!(dialect.to_string().parse::<Dialect>().unwrap(), dialect);
            assert_eq!(dialect.sql().name(), dialect.as_str());
        }
    }

    #[test]
    fn test_quote_identifiers() {
        assert_eq!(Dialect::MySql.sql().quote_identifier("a`b"), "`a``b`");
        assert_eq!(Dialect::Postgres.sql().quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(Dialect::MsSql.sql().quote_identifier("a]b"), "[a]]b]");
    }

    #[test]
    fn test_rename_table_forms() {
        assert_eq!(
            Dialect::Postgres.sql().rename_table("a", "b"),
            "ALTER TABLE \"a\" RENAME TO \"b\""
        );
        assert_eq!(Dialect::MySql.sql().rename_table("a", "b"), "RENAME TABLE `a` TO `b`");
        assert_eq!(Dialect::MsSql.sql().rename_table("a", "b"), "EXEC sp_rename N'a', N'b'");
    }

    #[test]
    fn test_rebuild_renders_for_every_dialect() {
        let old = Schema::new().table(Table::new(0, "t").field(Field::new(0, "a", "INT")));
        let new = Schema::new().table(Table::new(0, "t").field(Field::new(0, "a", "BIGINT")));
        for dialect in Dialect::ALL {
            let op = MigrationOperation::RebuildTable {
                old: TableRef::new(&old, &old.tables[0]),
                new: TableRef::new(&new, &new.tables[0]),
            };
            let statements = dialect.sql().generate_sql(&op).unwrap();
            let staging = dialect.sql().quote_identifier("t__rebuild");
            assert!(statements.iter().any(|s| s.contains(&staging)), "{dialect}");
            assert!(
                statements.contains(&dialect.sql().rename_table("t__rebuild", "t")),
                "{dialect}: {statements:?}"
            );
        }
    }

    #[test]
    fn test_terminators() {
        assert_eq!(Dialect::MsSql.sql().terminator(), ";\nGO");
        assert_eq!(Dialect::Sqlite.sql().terminator(), ";");
    }
}
