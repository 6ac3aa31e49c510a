//! DDL emission.
//!
//! [`emit`] renders a whole schema for one dialect: schema-level type
//! declarations, then every table in declaration order followed by its
//! indices, then the foreign keys as trailing `ALTER TABLE` statements.
//! Output is deterministic for a given input.

use std::fmt;

use tracing::debug;

use crate::dialect::{Dialect, SqlDialect};
use crate::error::Result;
use crate::schema::Schema;

/// An ordered list of statements rendered with a dialect's terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    terminator: &'static str,
    statements: Vec<String>,
}

impl Script {
    /// Creates an empty script.
    #[must_use]
    pub fn new(terminator: &'static str) -> Self {
        Self {
            terminator,
            statements: Vec::new(),
        }
    }

    /// Creates an empty script for a dialect.
    #[must_use]
    pub fn for_dialect(dialect: &dyn SqlDialect) -> Self {
        Self::new(dialect.terminator())
    }

    /// Appends a statement.
    pub fn push(&mut self, statement: impl Into<String>) {
        self.statements.push(statement.into());
    }

    /// Returns the statements, without terminators.
    #[must_use]
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Number of statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Returns true if the script has no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

impl Extend<String> for Script {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        self.statements.extend(iter);
    }
}

impl fmt::Display for Script {
    /// Statements are separated by a blank line. SQL comments are left
    /// unterminated; everything else gets the terminator.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, statement) in self.statements.iter().enumerate() {
            if i > 0 {
                f.write_str("\n\n")?;
            }
            f.write_str(statement)?;
            if !statement.starts_with("--") {
                f.write_str(self.terminator)?;
            }
        }
        if !self.statements.is_empty() {
            f.write_str("\n")?;
        }
        Ok(())
    }
}

/// Builds the statement list for a schema.
///
/// # Errors
///
/// Returns an integrity error if the schema fails validation.
pub fn emit_script(schema: &Schema, dialect: Dialect) -> Result<Script> {
    schema.validate()?;

    let sql = dialect.sql();
    let mut script = Script::for_dialect(sql);

    script.extend(sql.schema_types(schema));

    for table in &schema.tables {
        script.extend(sql.create_table(schema, table)?);
        for index in &table.indices {
            script.push(sql.create_index(table, index));
        }
    }

    if sql.supports_add_constraint() {
        for rel in &schema.relationships {
            let fk = schema.resolve_relationship(rel)?;
            script.push(sql.add_foreign_key(&fk, false));
        }
    }

    debug!(
        dialect = %dialect,
        tables = schema.tables.len(),
        statements = script.len(),
        "Emitted schema"
    );
    Ok(script)
}

/// Renders a schema as DDL text for a dialect.
///
/// # Errors
///
/// Returns an integrity error (with entity kind and id) if the schema has
/// dangling references, duplicate ids or empty names.
pub fn emit(schema: &Schema, dialect: Dialect) -> Result<String> {
    Ok(emit_script(schema, dialect)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use crate::schema::{Field, Index, Relationship, Table};

    fn users() -> Schema {
        Schema::new().table(
            Table::new(0, "users")
                .field(Field::new(0, "id", "INT").primary().increment())
                .field(Field::new(1, "name", "VARCHAR"))
                .index(Index::new(0, "idx_name", ["name"])),
        )
    }

    #[test]
    fn test_script_rendering() {
        let mut script = Script::new(";");
        script.push("CREATE TABLE a ()");
        script.push("-- note");
        script.push("DROP TABLE b");
        assert_eq!(
            script.to_string(),
            "CREATE TABLE a ();\n\n-- note\n\nDROP TABLE b;\n"
        );
        assert_eq!(Script::new(";").to_string(), "");
    }

    #[test]
    fn test_emit_mysql_users() {
        let sql = emit(&users(), Dialect::MySql).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE `users` (\n\
             \t`id` INT NOT NULL AUTO_INCREMENT,\n\
             \t`name` VARCHAR(255),\n\
             \tPRIMARY KEY(`id`)\n\
             );\n\n\
             CREATE INDEX `idx_name` ON `users` (`name`);\n"
        );
    }

    #[test]
    fn test_emit_is_deterministic() {
        let schema = users();
        for dialect in Dialect::ALL {
            assert_eq!(
                emit(&schema, dialect).unwrap(),
                emit(&schema, dialect).unwrap()
            );
        }
    }

    #[test]
    fn test_emit_rejects_dangling_relationship() {
        let schema = users().relationship(Relationship::new(5, "fk_x", (0, 1), (9, 0)));
        let err = emit(&schema, Dialect::Postgres).unwrap_err();
        assert!(matches!(err, SchemaError::DanglingReference { .. }));
        assert!(err.to_string().contains("relationship '5'"));
    }

    #[test]
    fn test_mssql_batches() {
        let sql = emit(&users(), Dialect::MsSql).unwrap();
        assert!(sql.contains(");\nGO\n\nCREATE INDEX [idx_name] ON [users] ([name]);\nGO\n"));
    }

    #[test]
    fn test_empty_schema_emits_nothing() {
        assert_eq!(emit(&Schema::new(), Dialect::Sqlite).unwrap(), "");
    }
}
