//! Microsoft SQL Server dialect.
//!
//! Identifiers are bracket-quoted and every statement is its own batch
//! (`GO`). Unique, check and default constraints declared inline get
//! system-generated names, so migrations look them up in the catalogue
//! before dropping them.

use tracing::warn;

use crate::error::Result;
use crate::operations::{FieldChanges, MigrationOperation, TableRef};
use crate::schema::{ConstraintAction, Field, Index, Schema, Table};
use crate::types::{
    apply_size, classify, escape_literal, quoted_values, render_default, ColumnType, TypeCategory,
    TypeRef,
};

use super::{rebuild_table, SqlDialect};

/// Microsoft SQL Server dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsSqlDialect;

fn quote(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Catalogue view holding a kind of column constraint.
#[derive(Debug, Clone, Copy)]
enum Catalogue {
    Default,
    Check,
    Unique,
}

impl MsSqlDialect {
    /// Creates a new SQL Server dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn in_values_check(&self, field: &Field, values: &[String]) -> Option<String> {
        if values.is_empty() {
            None
        } else {
            Some(format!(
                "CHECK({} IN ({}))",
                quote(&field.name),
                quoted_values(values)
            ))
        }
    }

    fn enum_type(&self, field: &Field, values: &[String]) -> ColumnType {
        let width = values
            .iter()
            .map(|v| v.chars().count())
            .max()
            .unwrap_or(1)
            .max(1);
        let ty = ColumnType::new(format!("VARCHAR({width})"));
        match self.in_values_check(field, values) {
            Some(check) => ty.with_check(check),
            None => ty,
        }
    }

    fn json_type(&self, field: &Field) -> ColumnType {
        ColumnType::new("NVARCHAR(MAX)")
            .with_check(format!("CHECK(ISJSON({}) = 1)", quote(&field.name)))
    }

    /// Dynamic SQL dropping every constraint found by `source`, which must
    /// select from the catalogue under the alias `k`.
    fn drop_constraints(&self, table: &str, source: &str) -> String {
        format!(
            "DECLARE @sql NVARCHAR(MAX) = N'';\n\
             SELECT @sql += N'ALTER TABLE {} DROP CONSTRAINT ' + QUOTENAME(k.name) + N';'\n\
             {source};\n\
             EXEC sp_executesql @sql",
            escape_literal(&quote(table))
        )
    }

    fn drop_column_constraints(&self, table: &str, column: &str, catalogue: Catalogue) -> String {
        let object = escape_literal(&quote(table));
        let column = escape_literal(column);
        let source = match catalogue {
            Catalogue::Default => format!(
                "FROM sys.default_constraints k\n\
                 JOIN sys.columns c ON c.object_id = k.parent_object_id AND c.column_id = k.parent_column_id\n\
                 WHERE k.parent_object_id = OBJECT_ID(N'{object}') AND c.name = N'{column}'"
            ),
            Catalogue::Check => format!(
                "FROM sys.check_constraints k\n\
                 JOIN sys.columns c ON c.object_id = k.parent_object_id AND c.column_id = k.parent_column_id\n\
                 WHERE k.parent_object_id = OBJECT_ID(N'{object}') AND c.name = N'{column}'"
            ),
            Catalogue::Unique => format!(
                "FROM sys.key_constraints k\n\
                 JOIN sys.index_columns ic ON ic.object_id = k.parent_object_id AND ic.index_id = k.unique_index_id\n\
                 JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id\n\
                 WHERE k.type = 'UQ' AND k.parent_object_id = OBJECT_ID(N'{object}') AND c.name = N'{column}'"
            ),
        };
        self.drop_constraints(table, &source)
    }

    fn drop_primary_key(&self, table: &str) -> String {
        let source = format!(
            "FROM sys.key_constraints k\n\
             WHERE k.type = 'PK' AND k.parent_object_id = OBJECT_ID(N'{}')",
            escape_literal(&quote(table))
        );
        self.drop_constraints(table, &source)
    }

    /// Type-induced check plus the field's own check, as `CHECK(...)` clauses.
    fn checks(&self, table: TableRef, field: &Field) -> Vec<String> {
        let mut checks: Vec<String> = self
            .column_type(table.schema, table.table, field)
            .check
            .into_iter()
            .collect();
        if let Some(check) = &field.check {
            checks.push(format!("CHECK({check})"));
        }
        checks
    }

    fn alter_column(
        &self,
        old_table: TableRef,
        old: &Field,
        new_table: TableRef,
        new: &Field,
        changes: &FieldChanges,
    ) -> Vec<String> {
        let name = new_table.name();
        let table = quote(name);
        let column = quote(&new.name);
        let retyped = changes.retyped || changes.values;
        let recheck = retyped || changes.check;
        let mut statements = Vec::new();

        if changes.renamed {
            statements.push(format!(
                "EXEC sp_rename N'{}.{}', N'{}', N'COLUMN'",
                escape_literal(name),
                escape_literal(&old.name),
                escape_literal(&new.name)
            ));
        }

        if changes.increment {
            warn!(
                table = %name,
                field = %new.name,
                "IDENTITY cannot be toggled in place, column must be recreated manually"
            );
            statements.push(format!(
                "-- {table}.{column}: IDENTITY cannot be added to or removed from an existing column; recreate the column manually"
            ));
        }

        if recheck && !self.checks(old_table, old).is_empty() {
            statements.push(self.drop_column_constraints(name, &new.name, Catalogue::Check));
        }
        let reset_default = changes.default || (retyped && old.default.is_some());
        if reset_default && old.default.is_some() {
            statements.push(self.drop_column_constraints(name, &new.name, Catalogue::Default));
        }
        let reset_unique = (changes.unique || retyped) && old.unique;
        if reset_unique {
            statements.push(self.drop_column_constraints(name, &new.name, Catalogue::Unique));
        }

        // Indices and the primary key pin the column's type. Changed indices
        // are already dropped and recreated around the table's changes.
        let pinned: Vec<&Index> = if retyped {
            old_table
                .table
                .indices
                .iter()
                .filter(|i| new_table.table.get_index(&i.id) == Some(*i))
                .filter(|i| i.fields.iter().any(|f| *f == new.name))
                .collect()
        } else {
            Vec::new()
        };
        for index in &pinned {
            statements.push(self.drop_index(new_table.table, index));
        }
        let reset_key = retyped && old.primary;
        if reset_key {
            statements.push(self.drop_primary_key(name));
        }

        if retyped || changes.nullability {
            let ty = self.column_type(new_table.schema, new_table.table, new);
            let nullability = if new.not_null { "NOT NULL" } else { "NULL" };
            statements.push(format!(
                "ALTER TABLE {table} ALTER COLUMN {column} {} {nullability}",
                ty.sql
            ));
        }

        let same_key = old_table
            .table
            .primary_key()
            .map(|f| &f.id)
            .eq(new_table.table.primary_key().map(|f| &f.id));
        if reset_key && same_key {
            let pk: Vec<&str> = new_table.table.primary_key().map(|f| f.name.as_str()).collect();
            statements.push(format!(
                "ALTER TABLE {table} ADD PRIMARY KEY({})",
                self.quote_list(&pk)
            ));
        }
        for index in &pinned {
            statements.push(self.create_index(new_table.table, index));
        }

        if reset_default {
            if let Some(default) = &new.default {
                statements.push(format!(
                    "ALTER TABLE {table} ADD DEFAULT {} FOR {column}",
                    self.default_literal(new_table.schema, new, default)
                ));
            }
        }

        if new.unique && (changes.unique || reset_unique) {
            statements.push(format!("ALTER TABLE {table} ADD UNIQUE({column})"));
        }

        if recheck {
            for check in self.checks(new_table, new) {
                statements.push(format!("ALTER TABLE {table} ADD {check}"));
            }
        }

        statements
    }
}

impl SqlDialect for MsSqlDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn column_type(&self, schema: &Schema, table: &Table, field: &Field) -> ColumnType {
        match classify(schema, &field.type_name) {
            TypeRef::Builtin(b) => match b.name {
                "INT" | "INTEGER" | "MEDIUMINT" => ColumnType::new("INT"),
                "DOUBLE" => ColumnType::new("FLOAT(53)"),
                "FLOAT" | "REAL" => ColumnType::new(b.name),
                "DATETIME" | "TIMESTAMP" => ColumnType::new("DATETIME2"),
                "BOOLEAN" => ColumnType::new("BIT"),
                "UUID" => ColumnType::new("UNIQUEIDENTIFIER"),
                "JSON" => self.json_type(field),
                "ENUM" => self.enum_type(field, &field.values),
                "SET" => {
                    let width = field.values.iter().map(|v| v.chars().count()).sum::<usize>()
                        + field.values.len().saturating_sub(1);
                    warn!(
                        table = %table.name,
                        field = %field.name,
                        fallback = "VARCHAR",
                        "SET has no native form, members are not validated"
                    );
                    ColumnType::new(format!("VARCHAR({})", width.max(1))).lossy()
                }
                _ => match b.category {
                    TypeCategory::Text => ColumnType::new("NVARCHAR(MAX)"),
                    TypeCategory::Blob => ColumnType::new("VARBINARY(MAX)"),
                    _ => ColumnType::new(apply_size(b.name, b, field.size.as_deref())),
                },
            },
            TypeRef::Composite(_) => self.json_type(field),
            TypeRef::Enumeration(en) => self.enum_type(field, &en.values),
            TypeRef::Unknown => {
                warn!(
                    table = %table.name,
                    field = %field.name,
                    type_name = %field.type_name,
                    fallback = "NVARCHAR(MAX)",
                    "Unknown type, using lossy fallback"
                );
                ColumnType::new("NVARCHAR(MAX)").lossy()
            }
        }
    }

    fn identity_clause(&self) -> Option<&'static str> {
        Some("IDENTITY(1,1)")
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote(name)
    }

    fn terminator(&self) -> &'static str {
        ";\nGO"
    }

    fn rename_table(&self, from: &str, to: &str) -> String {
        format!(
            "EXEC sp_rename N'{}', N'{}'",
            escape_literal(from),
            escape_literal(to)
        )
    }

    fn referential_action(&self, action: ConstraintAction) -> &'static str {
        match action {
            ConstraintAction::Restrict => "NO ACTION",
            other => other.as_sql(),
        }
    }

    fn default_literal(&self, schema: &Schema, field: &Field, raw: &str) -> String {
        let is_bit = matches!(
            classify(schema, &field.type_name).category(),
            Some(TypeCategory::Boolean)
        );
        if is_bit {
            match raw.trim().to_ascii_lowercase().as_str() {
                "true" => return "1".to_string(),
                "false" => return "0".to_string(),
                _ => {}
            }
        }
        render_default(raw, classify(schema, &field.type_name).quoted_default())
    }

    fn generate_sql(&self, operation: &MigrationOperation) -> Result<Vec<String>> {
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

            MigrationOperation::RebuildTable { old, new } => rebuild_table(self, *old, *new)?,

            MigrationOperation::AddColumn { table, field } => vec![format!(
                "ALTER TABLE {} ADD {}",
                quote(table.name()),
                self.column_definition(table.schema, table.table, field)
            )],

            MigrationOperation::DropColumn { table, field } => {
                let name = table.name();
                let mut statements = Vec::new();
                if field.default.is_some() {
                    statements.push(self.drop_column_constraints(name, &field.name, Catalogue::Default));
                }
                if field.check.is_some()
                    || self
                        .column_type(table.schema, table.table, field)
                        .check
                        .is_some()
                {
                    statements.push(self.drop_column_constraints(name, &field.name, Catalogue::Check));
                }
                if field.unique {
                    statements.push(self.drop_column_constraints(name, &field.name, Catalogue::Unique));
                }
                statements.push(format!(
                    "ALTER TABLE {} DROP COLUMN {}",
                    quote(name),
                    quote(&field.name)
                ));
                statements
            }

            MigrationOperation::AlterColumn {
                old_table,
                old,
                new_table,
                new,
                changes,
            } => self.alter_column(*old_table, old, *new_table, new, changes),

            MigrationOperation::SetPrimaryKey { old, new } => {
                let mut statements = Vec::new();
                if old.table.primary_key().next().is_some() {
                    statements.push(self.drop_primary_key(new.name()));
                }
                let pk: Vec<&str> = new.table.primary_key().map(|f| f.name.as_str()).collect();
                if !pk.is_empty() {
                    statements.push(format!(
                        "ALTER TABLE {} ADD PRIMARY KEY({})",
                        quote(new.name()),
                        self.quote_list(&pk)
                    ));
                }
                statements
            }

            MigrationOperation::CreateIndex { table, index } => {
                vec![self.create_index(table.table, index)]
            }

            MigrationOperation::DropIndex { table, index } => {
                vec![self.drop_index(table.table, index)]
            }

            MigrationOperation::AddForeignKey { fk } => vec![self.add_foreign_key(fk, true)],

            MigrationOperation::DropForeignKey { fk } => vec![self.drop_foreign_key(fk)],
        };
        Ok(statements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Relationship;

    fn dialect() -> MsSqlDialect {
        MsSqlDialect::new()
    }

    fn column(field: Field) -> String {
        let table = Table::new(0, "t").field(field);
        dialect().column_definition(&Schema::new(), &table, &table.fields[0])
    }

    #[test]
    fn test_identity_and_types() {
        assert_eq!(
            column(Field::new(0, "id", "INT").primary().increment()),
            "[id] INT NOT NULL IDENTITY(1,1)"
        );
        assert_eq!(column(Field::new(0, "body", "TEXT")), "[body] NVARCHAR(MAX)");
        assert_eq!(column(Field::new(0, "at", "DATETIME")), "[at] DATETIME2");
        assert_eq!(
            column(Field::new(0, "doc", "JSON")),
            "[doc] NVARCHAR(MAX) CHECK(ISJSON([doc]) = 1)"
        );
    }

    #[test]
    fn test_enum_width_and_check() {
        assert_eq!(
            column(Field::new(0, "size", "ENUM").values(["s", "xl"])),
            "[size] VARCHAR(2) CHECK([size] IN ('s', 'xl'))"
        );
    }

    #[test]
    fn test_set_is_unvalidated_text() {
        let table = Table::new(0, "t").field(Field::new(0, "tags", "SET").values(["a", "bc"]));
        let ty = dialect().column_type(&Schema::new(), &table, &table.fields[0]);
        assert_eq!(ty.sql, "VARCHAR(4)");
        assert!(ty.check.is_none());
        assert!(ty.lossy);
    }

    fn alter(from: Table, to: Table, changes: FieldChanges) -> Vec<String> {
        let from = Schema::new().table(from);
        let to = Schema::new().table(to);
        let op = MigrationOperation::AlterColumn {
            old_table: TableRef::new(&from, &from.tables[0]),
            old: &from.tables[0].fields[0],
            new_table: TableRef::new(&to, &to.tables[0]),
            new: &to.tables[0].fields[0],
            changes,
        };
        dialect().generate_sql(&op).unwrap()
    }

    #[test]
    fn test_rename_and_retype_resets_default_and_check() {
        let statements = alter(
            Table::new(0, "stock").field(Field::new(1, "qty", "INT").default_value("0").check("qty >= 0")),
            Table::new(0, "stock").field(
                Field::new(1, "amount", "BIGINT")
                    .default_value("0")
                    .check("amount >= 0"),
            ),
            FieldChanges {
                renamed: true,
                retyped: true,
                check: true,
                ..FieldChanges::default()
            },
        );
        assert_eq!(statements.len(), 6, "{statements:#?}");
        assert_eq!(statements[0], "EXEC sp_rename N'stock.qty', N'amount', N'COLUMN'");
        assert!(statements[1].contains("FROM sys.check_constraints k"));
        assert!(statements[1].contains("c.name = N'amount'"));
        assert!(statements[2].contains("FROM sys.default_constraints k"));
        assert_eq!(statements[3], "ALTER TABLE [stock] ALTER COLUMN [amount] BIGINT NULL");
        assert_eq!(statements[4], "ALTER TABLE [stock] ADD DEFAULT 0 FOR [amount]");
        assert_eq!(statements[5], "ALTER TABLE [stock] ADD CHECK(amount >= 0)");
    }

    #[test]
    fn test_identity_toggle_is_left_to_the_operator() {
        let statements = alter(
            Table::new(0, "t").field(Field::new(0, "id", "INT").primary()),
            Table::new(0, "t").field(Field::new(0, "id", "INT").primary().increment()),
            FieldChanges {
                increment: true,
                ..FieldChanges::default()
            },
        );
        assert_eq!(statements.len(), 1);
        assert!(statements[0].starts_with("-- [t].[id]: IDENTITY cannot be added"));
    }

    #[test]
    fn test_retyped_indexed_column_lifts_the_index() {
        let table = |size: &str| {
            Table::new(0, "users")
                .field(Field::new(0, "code", "VARCHAR").size(size))
                .index(Index::new(0, "idx_code", ["code"]))
        };
        let statements = alter(
            table("10"),
            table("40"),
            FieldChanges {
                retyped: true,
                ..FieldChanges::default()
            },
        );
        assert_eq!(
            statements,
            vec![
                "DROP INDEX [idx_code] ON [users]".to_string(),
                "ALTER TABLE [users] ALTER COLUMN [code] VARCHAR(40) NULL".to_string(),
                "CREATE INDEX [idx_code] ON [users] ([code])".to_string(),
            ]
        );
    }

    #[test]
    fn test_retyped_key_column_lifts_the_primary_key() {
        let statements = alter(
            Table::new(0, "users").field(Field::new(0, "id", "INT").primary()),
            Table::new(0, "users").field(Field::new(0, "id", "BIGINT").primary()),
            FieldChanges {
                retyped: true,
                ..FieldChanges::default()
            },
        );
        assert_eq!(statements.len(), 3);
        assert!(statements[0].contains("WHERE k.type = 'PK'"));
        assert_eq!(statements[1], "ALTER TABLE [users] ALTER COLUMN [id] BIGINT NOT NULL");
        assert_eq!(statements[2], "ALTER TABLE [users] ADD PRIMARY KEY([id])");
    }

    #[test]
    fn test_bit_defaults() {
        assert_eq!(
            column(Field::new(0, "active", "BOOLEAN").default_value("true")),
            "[active] BIT DEFAULT 1"
        );
    }

    #[test]
    fn test_restrict_becomes_no_action() {
        let schema = Schema::new()
            .table(Table::new(0, "a").field(Field::new(0, "b_id", "INT")))
            .table(Table::new(1, "b").field(Field::new(0, "id", "INT")))
            .relationship(
                Relationship::new(0, "fk_a_b", (0, 0), (1, 0))
                    .on_delete(ConstraintAction::Restrict),
            );
        let fk = schema.resolve_relationship(&schema.relationships[0]).unwrap();
        assert_eq!(
            dialect().add_foreign_key(&fk, false),
            "ALTER TABLE [a] ADD FOREIGN KEY([b_id]) REFERENCES [b]([id]) ON UPDATE NO ACTION ON DELETE NO ACTION"
        );
    }

    #[test]
    fn test_drop_column_clears_named_constraints() {
        let schema = Schema::new().table(
            Table::new(0, "t").field(Field::new(0, "c", "INT").default_value("0").unique()),
        );
        let op = MigrationOperation::DropColumn {
            table: TableRef::new(&schema, &schema.tables[0]),
            field: &schema.tables[0].fields[0],
        };
        let statements = dialect().generate_sql(&op).unwrap();
        assert_eq!(statements.len(), 3);
        assert!(statements[0].contains("sys.default_constraints"));
        assert!(statements[1].contains("sys.key_constraints"));
        assert_eq!(statements[2], "ALTER TABLE [t] DROP COLUMN [c]");
    }
}
