//! MariaDB dialect.
//!
//! Same statements as MySQL, with `CREATE OR REPLACE` table and index forms
//! and a native `UUID` type.

use crate::error::Result;
use crate::operations::MigrationOperation;
use crate::schema::{Field, ForeignKey, Index, Schema, Table};
use crate::types::{escape_literal, ColumnType};

use super::mysql::{self, quote};
use super::SqlDialect;

/// MariaDB dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MariaDbDialect;

impl MariaDbDialect {
    /// Creates a new MariaDB dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SqlDialect for MariaDbDialect {
    fn name(&self) -> &'static str {
        "mariadb"
    }

    fn column_type(&self, schema: &Schema, table: &Table, field: &Field) -> ColumnType {
        mysql::column_type(schema, table, field, true)
    }

    fn identity_clause(&self) -> Option<&'static str> {
        Some("AUTO_INCREMENT")
    }

    fn generate_sql(&self, operation: &MigrationOperation) -> Result<Vec<String>> {
        mysql::generate(self, operation)
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote(name)
    }

    fn rename_table(&self, from: &str, to: &str) -> String {
        mysql::rename_table(from, to)
    }

    fn inline_comment(&self, comment: &str) -> Option<String> {
        Some(format!("COMMENT '{}'", escape_literal(comment)))
    }

    fn table_options(&self, table: &Table) -> String {
        if table.comment.is_empty() {
            String::new()
        } else {
            format!(" COMMENT='{}'", escape_literal(&table.comment))
        }
    }

    fn create_table_keyword(&self) -> &'static str {
        "CREATE OR REPLACE TABLE"
    }

    fn create_index(&self, table: &Table, index: &Index) -> String {
        let fields: Vec<&str> = index.fields.iter().map(String::as_str).collect();
        format!(
            "CREATE OR REPLACE {}INDEX {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            quote(&index.name),
            quote(&table.name),
            self.quote_list(&fields)
        )
    }

    fn drop_foreign_key(&self, fk: &ForeignKey) -> String {
        format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}",
            quote(&fk.table.name),
            quote(&fk.constraint_name())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_or_replace_forms() {
        let table = Table::new(0, "items")
            .field(Field::new(0, "id", "INT").primary().increment())
            .index(Index::new(0, "idx_id", ["id"]));
        let dialect = MariaDbDialect::new();
        let create = dialect
            .create_table_statement(&Schema::new(), &table, "items")
            .unwrap();
        assert!(create.starts_with("CREATE OR REPLACE TABLE `items` ("));
        assert!(create.contains("`id` INT NOT NULL AUTO_INCREMENT"));
        assert_eq!(
            dialect.create_index(&table, &table.indices[0]),
            "CREATE OR REPLACE INDEX `idx_id` ON `items` (`id`)"
        );
    }

    #[test]
    fn test_uuid_is_native() {
        let table = Table::new(0, "t").field(Field::new(0, "u", "UUID"));
        let schema = Schema::new();
        assert_eq!(
            MariaDbDialect::new()
                .column_type(&schema, &table, &table.fields[0])
                .sql,
            "UUID"
        );
        assert_eq!(
            super::super::MySqlDialect::new()
                .column_type(&schema, &table, &table.fields[0])
                .sql,
            "VARCHAR(36)"
        );
    }
}
