//! MySQL dialect.
//!
//! Enumerations and sets are inline column types, auto-increment is a column
//! clause and comments are part of the column and table definitions. Composite
//! types have no native form and become `JSON` columns validated against a
//! generated JSON Schema.

use tracing::{debug, warn};

use crate::error::Result;
use crate::operations::{FieldChanges, MigrationOperation, TableRef};
use crate::schema::{Field, ForeignKey, Schema, Table};
use crate::types::{
    apply_size, classify, escape_literal, group_call, json_schema, quoted_values, render_default,
    ColumnType, TypeCategory, TypeRef,
};

use super::{rebuild_table, CheckSource, SqlDialect};

/// MySQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

const BARE_DEFAULT_FUNCTIONS: &[&str] = &["NOW", "CURRENT_TIMESTAMP", "LOCALTIME", "LOCALTIMESTAMP"];

pub(super) fn quote(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

pub(super) fn rename_table(from: &str, to: &str) -> String {
    format!("RENAME TABLE {} TO {}", quote(from), quote(to))
}

/// Column types shared by MySQL and MariaDB. Only UUID differs.
pub(super) fn column_type(
    schema: &Schema,
    table: &Table,
    field: &Field,
    native_uuid: bool,
) -> ColumnType {
    match classify(schema, &field.type_name) {
        TypeRef::Builtin(b) => match b.category {
            TypeCategory::Enum | TypeCategory::Set if !field.values.is_empty() => {
                ColumnType::new(format!("{}({})", b.name, quoted_values(&field.values)))
            }
            TypeCategory::Enum | TypeCategory::Set => {
                warn!(
                    table = %table.name,
                    field = %field.name,
                    "{} without values, using TEXT",
                    b.name
                );
                ColumnType::new("TEXT").lossy()
            }
            TypeCategory::Uuid if !native_uuid => ColumnType::new("VARCHAR(36)"),
            _ => ColumnType::new(apply_size(b.name, b, field.size.as_deref())),
        },
        TypeRef::Composite(ty) => {
            let doc = json_schema(schema, ty).to_string();
            ColumnType::new("JSON").with_check(format!(
                "CHECK(JSON_SCHEMA_VALID('{}', {}))",
                escape_literal(&doc),
                quote(&field.name)
            ))
        }
        TypeRef::Enumeration(en) => {
            ColumnType::new(format!("ENUM({})", quoted_values(&en.values)))
        }
        TypeRef::Unknown => {
            warn!(
                table = %table.name,
                field = %field.name,
                type_name = %field.type_name,
                fallback = "LONGTEXT",
                "Unknown type, using lossy fallback"
            );
            ColumnType::new("LONGTEXT").lossy()
        }
    }
}

/// Migration SQL shared by MySQL and MariaDB.
pub(super) fn generate(d: &dyn SqlDialect, operation: &MigrationOperation) -> Result<Vec<String>> {
    let q = |name: &str| d.quote_identifier(name);
    let statements = match operation {
        // Enumerations and composite types live inside column definitions.
        MigrationOperation::CreateType { .. }
        | MigrationOperation::DropType { .. }
        | MigrationOperation::AlterType { .. }
        | MigrationOperation::CreateEnum { .. }
        | MigrationOperation::DropEnum { .. }
        | MigrationOperation::AlterEnum { .. } => Vec::new(),

        MigrationOperation::CreateTable { table } => d.create_table(table.schema, table.table)?,

        MigrationOperation::DropTable { table } => vec![d.drop_table(table.table)],

        MigrationOperation::RenameTable { old, new } => {
            vec![d.rename_table(old.name(), new.name())]
        }

        MigrationOperation::RebuildTable { old, new } => rebuild_table(d, *old, *new)?,

        MigrationOperation::AddColumn { table, field } => vec![format!(
            "ALTER TABLE {} ADD COLUMN {}",
            q(table.name()),
            d.column_definition(table.schema, table.table, field)
        )],

        MigrationOperation::DropColumn { table, field } => {
            let mut statements = drop_checks(d, *table, field);
            statements.push(format!(
                "ALTER TABLE {} DROP COLUMN {}",
                q(table.name()),
                q(&field.name)
            ));
            statements
        }

        MigrationOperation::AlterColumn {
            old_table,
            old,
            new_table,
            new,
            changes,
        } => alter_column(d, *old_table, old, *new_table, new, changes),

        MigrationOperation::SetPrimaryKey { old, new } => {
            let old_pk = old.table.primary_key().count();
            let new_pk: Vec<&str> = new.table.primary_key().map(|f| f.name.as_str()).collect();
            let mut clauses = Vec::new();
            if old_pk > 0 {
                clauses.push("DROP PRIMARY KEY".to_string());
            }
            if !new_pk.is_empty() {
                clauses.push(format!("ADD PRIMARY KEY({})", d.quote_list(&new_pk)));
            }
            if clauses.is_empty() {
                Vec::new()
            } else {
                vec![format!("ALTER TABLE {} {}", q(new.name()), clauses.join(", "))]
            }
        }

        MigrationOperation::SetTableComment { table } => vec![format!(
            "ALTER TABLE {} COMMENT = '{}'",
            q(table.name()),
            escape_literal(&table.table.comment)
        )],

        MigrationOperation::SetInheritance { new, .. } => {
            debug!(table = %new.name(), "Table inheritance is not supported, skipping");
            Vec::new()
        }

        MigrationOperation::CreateIndex { table, index } => vec![d.create_index(table.table, index)],

        MigrationOperation::DropIndex { table, index } => vec![d.drop_index(table.table, index)],

        MigrationOperation::AddForeignKey { fk } => vec![d.add_foreign_key(fk, true)],

        MigrationOperation::DropForeignKey { fk } => vec![d.drop_foreign_key(fk)],
    };
    Ok(statements)
}

/// Drops the named checks a column carries. Empty for dialects that leave
/// check names to the database.
fn drop_checks(d: &dyn SqlDialect, table: TableRef, field: &Field) -> Vec<String> {
    let type_check = d.column_type(table.schema, table.table, field).check.is_some();
    [
        (CheckSource::Type, type_check),
        (CheckSource::Field, field.check.is_some()),
    ]
    .into_iter()
    .filter(|(_, present)| *present)
    .filter_map(|(source, _)| d.column_check_name(table.table, field, source))
    .map(|name| {
        format!(
            "ALTER TABLE {} DROP CHECK {}",
            d.quote_identifier(table.name()),
            d.quote_identifier(&name)
        )
    })
    .collect()
}

/// `CHANGE COLUMN` restates the whole definition, checks included, so the
/// old checks are dropped first. Uniqueness is an index named after the
/// column and is handled separately so the restated column does not gain a
/// second unique key.
fn alter_column(
    d: &dyn SqlDialect,
    old_table: TableRef,
    old: &Field,
    table: TableRef,
    new: &Field,
    changes: &FieldChanges,
) -> Vec<String> {
    let name = d.quote_identifier(table.name());
    let mut statements = Vec::new();

    if changes.unique && old.unique {
        statements.push(format!(
            "ALTER TABLE {name} DROP INDEX {}",
            d.quote_identifier(&old.name)
        ));
    }

    if changes.renamed || changes.alters_definition() || changes.comment {
        // Old definition under the table's current name.
        let current = TableRef::new(old_table.schema, table.table);
        statements.extend(drop_checks(d, current, old));
        let restated = Field {
            unique: false,
            ..new.clone()
        };
        statements.push(format!(
            "ALTER TABLE {name} CHANGE COLUMN {} {}",
            d.quote_identifier(&old.name),
            d.column_definition(table.schema, table.table, &restated)
        ));
    }

    if changes.renamed && old.unique && new.unique && !changes.unique {
        statements.push(format!(
            "ALTER TABLE {name} RENAME INDEX {} TO {}",
            d.quote_identifier(&old.name),
            d.quote_identifier(&new.name)
        ));
    }

    if changes.unique && new.unique {
        statements.push(format!(
            "ALTER TABLE {name} ADD UNIQUE({})",
            d.quote_identifier(&new.name)
        ));
    }

    statements
}

impl SqlDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn column_type(&self, schema: &Schema, table: &Table, field: &Field) -> ColumnType {
        column_type(schema, table, field, false)
    }

    fn identity_clause(&self) -> Option<&'static str> {
        Some("AUTO_INCREMENT")
    }

    // Only the timestamp functions may appear bare after DEFAULT.
    fn default_literal(&self, schema: &Schema, field: &Field, raw: &str) -> String {
        let rendered = render_default(raw, classify(schema, &field.type_name).quoted_default());
        group_call(rendered, |name| {
            BARE_DEFAULT_FUNCTIONS
                .iter()
                .any(|f| f.eq_ignore_ascii_case(name))
        })
    }

    fn generate_sql(&self, operation: &MigrationOperation) -> Result<Vec<String>> {
        generate(self, operation)
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote(name)
    }

    fn rename_table(&self, from: &str, to: &str) -> String {
        rename_table(from, to)
    }

    // Check names are unique per database and must survive renames, so they
    // are derived from entity ids.
    fn column_check_name(&self, table: &Table, field: &Field, source: CheckSource) -> Option<String> {
        Some(match source {
            CheckSource::Field => format!("chk_{}_{}", table.id, field.id),
            CheckSource::Type => format!("chk_{}_{}_type", table.id, field.id),
        })
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
    use crate::schema::{CompositeType, Enumeration, Index, TypeField};

    fn dialect() -> MySqlDialect {
        MySqlDialect::new()
    }

    fn column(schema: &Schema, field: Field) -> String {
        let table = Table::new(0, "t").field(field);
        dialect().column_definition(schema, &table, &table.fields[0])
    }

    #[test]
    fn test_auto_increment_clause() {
        let sql = column(&Schema::new(), Field::new(0, "id", "INT").primary().increment());
        assert_eq!(sql, "`id` INT NOT NULL AUTO_INCREMENT");
    }

    #[test]
    fn test_sized_and_precision_types() {
        let schema = Schema::new();
        assert_eq!(column(&schema, Field::new(0, "name", "VARCHAR")), "`name` VARCHAR(255)");
        assert_eq!(
            column(&schema, Field::new(0, "price", "DECIMAL").size("10,2")),
            "`price` DECIMAL(10,2)"
        );
        assert_eq!(column(&schema, Field::new(0, "flag", "CHAR")), "`flag` CHAR(1)");
    }

    #[test]
    fn test_default_quoting_follows_type() {
        let schema = Schema::new();
        assert_eq!(
            column(&schema, Field::new(0, "status", "VARCHAR").size("16").default_value("new")),
            "`status` VARCHAR(16) DEFAULT 'new'"
        );
        assert_eq!(
            column(&schema, Field::new(0, "n", "INT").default_value("0")),
            "`n` INT DEFAULT 0"
        );
        assert_eq!(
            column(
                &schema,
                Field::new(0, "at", "TIMESTAMP").default_value("CURRENT_TIMESTAMP")
            ),
            "`at` TIMESTAMP DEFAULT CURRENT_TIMESTAMP"
        );
    }

    #[test]
    fn test_expression_defaults_are_parenthesized() {
        let schema = Schema::new();
        assert_eq!(
            column(&schema, Field::new(0, "tag", "VARCHAR").default_value("lower('X')")),
            "`tag` VARCHAR(255) DEFAULT (lower('X'))"
        );
        assert_eq!(
            column(&schema, Field::new(0, "at", "DATETIME").default_value("now()")),
            "`at` DATETIME DEFAULT now()"
        );
        assert_eq!(
            column(&schema, Field::new(0, "at", "TIMESTAMP").default_value("CURRENT_TIMESTAMP(3)")),
            "`at` TIMESTAMP DEFAULT CURRENT_TIMESTAMP(3)"
        );
    }

    #[test]
    fn test_enum_and_set_inline() {
        let schema = Schema::new();
        assert_eq!(
            column(&schema, Field::new(0, "size", "ENUM").values(["s", "m"])),
            "`size` ENUM('s', 'm')"
        );
        assert_eq!(
            column(&schema, Field::new(0, "tags", "SET").values(["a", "b"])),
            "`tags` SET('a', 'b')"
        );
    }

    #[test]
    fn test_schema_enum_inlined() {
        let schema = Schema::new().enumeration(Enumeration::new("mood", ["sad", "ok"]));
        assert_eq!(column(&schema, Field::new(0, "m", "mood")), "`m` ENUM('sad', 'ok')");
    }

    #[test]
    fn test_composite_type_becomes_validated_json() {
        let schema = Schema::new().composite_type(
            CompositeType::new("address").field(TypeField::new("city", "VARCHAR")),
        );
        let sql = column(&schema, Field::new(0, "home", "address"));
        assert!(sql.starts_with("`home` JSON CONSTRAINT `chk_0_0_type` CHECK(JSON_SCHEMA_VALID('{"));
        assert!(sql.contains("\"city\""));
        assert!(sql.ends_with("', `home`))"));
    }

    fn alter(old: Field, new: Field) -> Vec<String> {
        let from = Schema::new().table(Table::new(3, "t").field(old));
        let to = Schema::new().table(Table::new(3, "t").field(new));
        let (old, new) = (&from.tables[0].fields[0], &to.tables[0].fields[0]);
        let changes = FieldChanges {
            renamed: old.name != new.name,
            nullability: old.not_null != new.not_null,
            unique: old.unique != new.unique,
            check: old.check != new.check,
            ..FieldChanges::default()
        };
        let op = MigrationOperation::AlterColumn {
            old_table: TableRef::new(&from, &from.tables[0]),
            old,
            new_table: TableRef::new(&to, &to.tables[0]),
            new,
            changes,
        };
        dialect().generate_sql(&op).unwrap()
    }

    #[test]
    fn test_checks_are_named_by_id() {
        assert_eq!(
            column(&Schema::new(), Field::new(5, "qty", "INT").check("qty > 0")),
            "`qty` INT CONSTRAINT `chk_0_5` CHECK(qty > 0)"
        );
    }

    #[test]
    fn test_changed_check_replaces_the_old_one() {
        let statements = alter(
            Field::new(1, "qty", "INT").check("qty > 0"),
            Field::new(1, "qty", "INT").check("qty > 10"),
        );
        assert_eq!(
            statements,
            vec![
                "ALTER TABLE `t` DROP CHECK `chk_3_1`".to_string(),
                "ALTER TABLE `t` CHANGE COLUMN `qty` `qty` INT CONSTRAINT `chk_3_1` CHECK(qty > 10)"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_restated_column_keeps_a_single_check() {
        let statements = alter(
            Field::new(1, "qty", "INT").check("qty > 0"),
            Field::new(1, "qty", "INT").check("qty > 0").not_null(),
        );
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], "ALTER TABLE `t` DROP CHECK `chk_3_1`");
        assert!(statements[1].ends_with("NOT NULL CONSTRAINT `chk_3_1` CHECK(qty > 0)"));
    }

    #[test]
    fn test_renamed_unique_column_renames_its_index() {
        let statements = alter(
            Field::new(1, "email", "VARCHAR").unique(),
            Field::new(1, "mail", "VARCHAR").unique(),
        );
        assert_eq!(
            statements,
            vec![
                "ALTER TABLE `t` CHANGE COLUMN `email` `mail` VARCHAR(255)".to_string(),
                "ALTER TABLE `t` RENAME INDEX `email` TO `mail`".to_string(),
            ]
        );
    }

    #[test]
    fn test_dropped_column_drops_its_checks_first() {
        let schema = Schema::new()
            .table(Table::new(3, "t").field(Field::new(1, "qty", "INT").check("qty > 0")));
        let op = MigrationOperation::DropColumn {
            table: TableRef::new(&schema, &schema.tables[0]),
            field: &schema.tables[0].fields[0],
        };
        assert_eq!(
            dialect().generate_sql(&op).unwrap(),
            vec![
                "ALTER TABLE `t` DROP CHECK `chk_3_1`".to_string(),
                "ALTER TABLE `t` DROP COLUMN `qty`".to_string(),
            ]
        );
    }

    #[test]
    fn test_unknown_type_falls_back_to_longtext() {
        let table = Table::new(0, "t").field(Field::new(0, "g", "GEOMETRY"));
        let ty = dialect().column_type(&Schema::new(), &table, &table.fields[0]);
        assert_eq!(ty.sql, "LONGTEXT");
        assert!(ty.lossy);
    }

    #[test]
    fn test_comments_inline() {
        let table = Table::new(0, "users")
            .comment("People")
            .field(Field::new(0, "id", "INT").comment("it's the key"));
        let sql = dialect()
            .create_table_statement(&Schema::new(), &table, "users")
            .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE `users` (\n\t`id` INT COMMENT 'it''s the key'\n) COMMENT='People'"
        );
    }

    #[test]
    fn test_create_and_drop_index() {
        let table = Table::new(0, "users").field(Field::new(0, "email", "VARCHAR"));
        let index = Index::new(0, "idx_email", ["email"]).unique();
        assert_eq!(
            dialect().create_index(&table, &index),
            "CREATE UNIQUE INDEX `idx_email` ON `users` (`email`)"
        );
        assert_eq!(
            dialect().drop_index(&table, &index),
            "DROP INDEX `idx_email` ON `users`"
        );
    }
}
