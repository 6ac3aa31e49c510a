//! PostgreSQL dialect.
//!
//! PostgreSQL has real named types, so composite types and enumerations are
//! declared with `CREATE TYPE` and referenced by name. Inline `ENUM`/`SET`
//! fields get a dedicated enum type named `<table>_<field>_t`, declared right
//! before their table. Auto-increment integers use the `serial` family.
//!
//! Unique, check and primary key constraints are left to PostgreSQL's
//! default naming (`<table>_<column>_key`, `<table>_<column>_check`,
//! `<table>_pkey`), which is what migrations use to drop them later. Renames
//! carry those names along with `RENAME CONSTRAINT`.

use tracing::warn;

use crate::error::Result;
use crate::operations::{FieldChanges, MigrationOperation, TableRef, TypeUsage};
use crate::schema::{CompositeType, Enumeration, Field, Index, Schema, Table};
use crate::types::{
    apply_size, classify, escape_literal, quoted_values, BuiltinType, ColumnType, TypeCategory,
    TypeRef,
};

use super::{rebuild_table, SqlDialect};

/// PostgreSQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn enum_type_name(table: &str, field: &str) -> String {
    format!("{table}_{field}_t")
}

fn unique_name(table: &str, field: &str) -> String {
    format!("{table}_{field}_key")
}

fn check_name(table: &str, field: &str) -> String {
    format!("{table}_{field}_check")
}

fn pkey_name(table: &str) -> String {
    format!("{table}_pkey")
}

fn rename_constraint(table: &str, from: &str, to: &str) -> String {
    format!(
        "ALTER TABLE {} RENAME CONSTRAINT {} TO {}",
        quote(table),
        quote(from),
        quote(to)
    )
}

fn is_inline_enum(field: &Field) -> bool {
    matches!(
        crate::types::builtin(&field.type_name).map(|b| b.category),
        Some(TypeCategory::Enum | TypeCategory::Set)
    )
}

fn is_set(field: &Field) -> bool {
    crate::types::builtin(&field.type_name).is_some_and(|b| b.category == TypeCategory::Set)
}

fn comment_literal(comment: &str) -> String {
    if comment.is_empty() {
        "NULL".to_string()
    } else {
        format!("'{}'", escape_literal(comment))
    }
}

fn builtin_sql(b: &BuiltinType, size: Option<&str>, identity: bool) -> String {
    match b.name {
        "INT" | "INTEGER" | "MEDIUMINT" if identity => "serial".to_string(),
        "INT" | "INTEGER" | "MEDIUMINT" => "integer".to_string(),
        "TINYINT" | "SMALLINT" if identity => "smallserial".to_string(),
        "TINYINT" | "SMALLINT" => "smallint".to_string(),
        "BIGINT" if identity => "bigserial".to_string(),
        "BIGINT" => "bigint".to_string(),
        "DECIMAL" | "NUMERIC" => apply_size(&b.name.to_ascii_lowercase(), b, size),
        "FLOAT" | "REAL" => "real".to_string(),
        "DOUBLE" => "double precision".to_string(),
        "CHAR" | "VARCHAR" => apply_size(&b.name.to_ascii_lowercase(), b, size),
        "DATE" => "date".to_string(),
        "TIME" => "time".to_string(),
        "DATETIME" => "timestamp".to_string(),
        "TIMESTAMP" => "timestamptz".to_string(),
        "BOOLEAN" => "boolean".to_string(),
        "JSON" => "jsonb".to_string(),
        "UUID" => "uuid".to_string(),
        _ => match b.category {
            TypeCategory::Binary | TypeCategory::Blob => "bytea".to_string(),
            _ => "text".to_string(),
        },
    }
}

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Resolves a type. `table` is `None` for composite type attributes,
    /// which cannot own an inline enum type and fall back to `text`.
    fn resolve(
        &self,
        schema: &Schema,
        table: Option<&str>,
        field: &Field,
        identity: bool,
    ) -> ColumnType {
        match classify(schema, &field.type_name) {
            TypeRef::Builtin(b) => match (b.category, table) {
                (TypeCategory::Enum, Some(table)) => {
                    ColumnType::new(quote(&enum_type_name(table, &field.name)))
                }
                (TypeCategory::Set, Some(table)) => {
                    ColumnType::new(format!("{}[]", quote(&enum_type_name(table, &field.name))))
                }
                (TypeCategory::Integer, _) if identity => {
                    ColumnType::new(builtin_sql(b, None, true)).identity()
                }
                _ => {
                    if identity {
                        warn!(
                            field = %field.name,
                            type_name = %field.type_name,
                            "Auto-increment requires an integer type, ignoring"
                        );
                    }
                    ColumnType::new(builtin_sql(b, field.size.as_deref(), false))
                }
            },
            TypeRef::Composite(ty) => ColumnType::new(quote(&ty.name)),
            TypeRef::Enumeration(en) => ColumnType::new(quote(&en.name)),
            TypeRef::Unknown => {
                warn!(
                    field = %field.name,
                    type_name = %field.type_name,
                    fallback = "text",
                    "Unknown type, using lossy fallback"
                );
                ColumnType::new("text").lossy()
            }
        }
    }

    /// The column's type without the serial form, as `ALTER COLUMN TYPE`
    /// needs it.
    fn storage_type(&self, table: TableRef, field: &Field) -> String {
        self.resolve(table.schema, Some(table.name()), field, false).sql
    }

    fn create_inline_enum(&self, table: &str, field: &Field) -> String {
        format!(
            "CREATE TYPE {} AS ENUM ({})",
            quote(&enum_type_name(table, &field.name)),
            quoted_values(&field.values)
        )
    }

    fn drop_inline_enum(&self, table: &str, field: &Field) -> String {
        format!(
            "DROP TYPE IF EXISTS {}",
            quote(&enum_type_name(table, &field.name))
        )
    }

    fn create_enum(&self, en: &Enumeration) -> String {
        format!(
            "CREATE TYPE {} AS ENUM ({})",
            quote(&en.name),
            quoted_values(&en.values)
        )
    }

    fn create_composite(&self, schema: &Schema, ty: &CompositeType) -> Vec<String> {
        let attributes: Vec<String> = ty
            .fields
            .iter()
            .map(|f| {
                format!(
                    "{} {}",
                    quote(&f.name),
                    self.resolve(schema, None, &f.as_field(), false).sql
                )
            })
            .collect();
        let mut statements = vec![format!(
            "CREATE TYPE {} AS (\n\t{}\n)",
            quote(&ty.name),
            attributes.join(",\n\t")
        )];
        if !ty.comment.is_empty() {
            statements.push(format!(
                "COMMENT ON TYPE {} IS {}",
                quote(&ty.name),
                comment_literal(&ty.comment)
            ));
        }
        statements
    }

    fn alter_composite(&self, schema: &Schema, old: &CompositeType, new: &CompositeType) -> Vec<String> {
        let name = quote(&new.name);
        let mut statements = Vec::new();
        for attr in &old.fields {
            if !new.fields.iter().any(|f| f.name == attr.name) {
                statements.push(format!(
                    "ALTER TYPE {name} DROP ATTRIBUTE IF EXISTS {}",
                    quote(&attr.name)
                ));
            }
        }
        for attr in &new.fields {
            let sql = self.resolve(schema, None, &attr.as_field(), false).sql;
            match old.fields.iter().find(|f| f.name == attr.name) {
                None => statements.push(format!(
                    "ALTER TYPE {name} ADD ATTRIBUTE {} {sql}",
                    quote(&attr.name)
                )),
                Some(prev) if prev != attr => statements.push(format!(
                    "ALTER TYPE {name} ALTER ATTRIBUTE {} TYPE {sql}",
                    quote(&attr.name)
                )),
                Some(_) => {}
            }
        }
        if old.comment != new.comment {
            statements.push(format!(
                "COMMENT ON TYPE {name} IS {}",
                comment_literal(&new.comment)
            ));
        }
        statements
    }

    fn alter_enum(&self, old: &Enumeration, new: &Enumeration, usages: &[TypeUsage]) -> Vec<String> {
        let name = quote(&new.name);

        // Values can only be added in place, and only if the existing ones
        // keep their relative order.
        let kept: Vec<&String> = new.values.iter().filter(|v| old.values.contains(v)).collect();
        let additive = kept.len() == old.values.len() && kept.iter().copied().eq(old.values.iter());
        if additive {
            let mut statements = Vec::new();
            let mut previous: Option<&str> = None;
            for value in &new.values {
                if !old.values.contains(value) {
                    let position = match (previous, old.values.first()) {
                        (Some(p), _) => format!(" AFTER '{}'", escape_literal(p)),
                        (None, Some(first)) => format!(" BEFORE '{}'", escape_literal(first)),
                        (None, None) => String::new(),
                    };
                    statements.push(format!(
                        "ALTER TYPE {name} ADD VALUE '{}'{position}",
                        escape_literal(value)
                    ));
                }
                previous = Some(value);
            }
            return statements;
        }

        let stale = quote(&format!("{}__old", new.name));
        let mut statements = vec![
            format!("ALTER TYPE {} RENAME TO {stale}", quote(&old.name)),
            self.create_enum(new),
        ];
        for usage in usages {
            let table = quote(&usage.table.name);
            let column = quote(&usage.field.name);
            if usage.field.default.is_some() {
                statements.push(format!(
                    "ALTER TABLE {table} ALTER COLUMN {column} DROP DEFAULT"
                ));
            }
            statements.push(format!(
                "ALTER TABLE {table} ALTER COLUMN {column} TYPE {name} USING {column}::text::{name}"
            ));
            if let Some(default) = &usage.field.default {
                statements.push(format!(
                    "ALTER TABLE {table} ALTER COLUMN {column} SET DEFAULT {}",
                    crate::types::render_default(default, true)
                ));
            }
        }
        statements.push(format!("DROP TYPE {stale}"));
        statements
    }

    fn alter_column(
        &self,
        old: &Field,
        new_table: TableRef,
        new: &Field,
        changes: &FieldChanges,
    ) -> Vec<String> {
        let table = quote(new_table.name());
        let column = quote(&new.name);
        let alter = |clause: String| format!("ALTER TABLE {table} ALTER COLUMN {column} {clause}");
        let retyped = changes.retyped || changes.values;
        let mut statements = Vec::new();

        if changes.renamed {
            statements.push(format!(
                "ALTER TABLE {table} RENAME COLUMN {} TO {column}",
                quote(&old.name)
            ));
            if old.unique {
                statements.push(rename_constraint(
                    new_table.name(),
                    &unique_name(new_table.name(), &old.name),
                    &unique_name(new_table.name(), &new.name),
                ));
            }
            if old.check.is_some() {
                statements.push(rename_constraint(
                    new_table.name(),
                    &check_name(new_table.name(), &old.name),
                    &check_name(new_table.name(), &new.name),
                ));
            }
            if is_inline_enum(old) {
                statements.push(format!(
                    "ALTER TYPE {} RENAME TO {}",
                    quote(&enum_type_name(new_table.name(), &old.name)),
                    quote(&enum_type_name(new_table.name(), &new.name))
                ));
            }
        }

        if changes.increment && old.increment {
            statements.push(alter("DROP IDENTITY IF EXISTS".to_string()));
            statements.push(alter("DROP DEFAULT".to_string()));
        }

        if retyped && old.default.is_some() {
            statements.push(alter("DROP DEFAULT".to_string()));
        }

        if retyped {
            let target = self.storage_type(new_table, new);
            let inline_type = quote(&enum_type_name(new_table.name(), &new.name));
            let source = if is_set(old) {
                format!("{column}::text[]")
            } else {
                format!("{column}::text")
            };
            let using = if is_inline_enum(new) {
                match (is_set(old), is_set(new)) {
                    (true, true) | (false, false) => format!("{source}::{target}"),
                    (false, true) => format!("ARRAY[{source}]::{target}"),
                    (true, false) => format!("({source})[1]::{target}"),
                }
            } else if matches!(
                classify(new_table.schema, &new.type_name),
                TypeRef::Enumeration(_)
            ) {
                format!("{source}::{target}")
            } else {
                format!("{column}::{target}")
            };

            if is_inline_enum(new) {
                let stale = quote(&format!(
                    "{}__old",
                    enum_type_name(new_table.name(), &new.name)
                ));
                if is_inline_enum(old) {
                    statements.push(format!("ALTER TYPE {inline_type} RENAME TO {stale}"));
                }
                statements.push(self.create_inline_enum(new_table.name(), new));
                statements.push(alter(format!("TYPE {target} USING {using}")));
                if is_inline_enum(old) {
                    statements.push(format!("DROP TYPE {stale}"));
                }
            } else {
                statements.push(alter(format!("TYPE {target} USING {using}")));
                if is_inline_enum(old) {
                    statements.push(format!("DROP TYPE IF EXISTS {inline_type}"));
                }
            }
        }

        let reset_default = changes.default
            || (changes.increment && old.increment)
            || (retyped && old.default.is_some());
        if reset_default {
            match &new.default {
                Some(default) => statements.push(alter(format!(
                    "SET DEFAULT {}",
                    self.default_literal(new_table.schema, new, default)
                ))),
                None if changes.default => statements.push(alter("DROP DEFAULT".to_string())),
                None => {}
            }
        }

        if changes.nullability {
            let clause = if new.not_null {
                "SET NOT NULL"
            } else {
                "DROP NOT NULL"
            };
            statements.push(alter(clause.to_string()));
        }

        if changes.increment && new.increment {
            statements.push(alter("ADD GENERATED BY DEFAULT AS IDENTITY".to_string()));
        }

        // Constraints already carry the current table and column names.
        let key = quote(&unique_name(new_table.name(), &new.name));
        if changes.unique {
            if old.unique {
                statements.push(format!("ALTER TABLE {table} DROP CONSTRAINT IF EXISTS {key}"));
            }
            if new.unique {
                statements.push(format!("ALTER TABLE {table} ADD CONSTRAINT {key} UNIQUE({column})"));
            }
        }

        let constraint = quote(&check_name(new_table.name(), &new.name));
        if changes.check {
            if old.check.is_some() {
                statements.push(format!(
                    "ALTER TABLE {table} DROP CONSTRAINT IF EXISTS {constraint}"
                ));
            }
            if let Some(check) = &new.check {
                statements.push(format!(
                    "ALTER TABLE {table} ADD CONSTRAINT {constraint} CHECK({check})"
                ));
            }
        }

        if changes.comment {
            statements.push(format!(
                "COMMENT ON COLUMN {table}.{column} IS {}",
                comment_literal(&new.comment)
            ));
        }

        statements
    }
}

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn column_type(&self, schema: &Schema, table: &Table, field: &Field) -> ColumnType {
        self.resolve(schema, Some(&table.name), field, field.increment)
    }

    fn identity_clause(&self) -> Option<&'static str> {
        None
    }

    fn native_named_types(&self) -> bool {
        true
    }

    fn index_if_not_exists(&self) -> bool {
        true
    }

    fn table_options(&self, table: &Table) -> String {
        if table.inherits.is_empty() {
            String::new()
        } else {
            let parents: Vec<&str> = table.inherits.iter().map(String::as_str).collect();
            format!(" INHERITS({})", self.quote_list(&parents))
        }
    }

    fn table_prelude(&self, _schema: &Schema, table: &Table) -> Vec<String> {
        table
            .fields
            .iter()
            .filter(|f| is_inline_enum(f))
            .map(|f| self.create_inline_enum(&table.name, f))
            .collect()
    }

    fn table_postlude(&self, table: &Table) -> Vec<String> {
        let mut statements = Vec::new();
        if !table.comment.is_empty() {
            statements.push(format!(
                "COMMENT ON TABLE {} IS {}",
                quote(&table.name),
                comment_literal(&table.comment)
            ));
        }
        for field in table.fields.iter().filter(|f| !f.comment.is_empty()) {
            statements.push(format!(
                "COMMENT ON COLUMN {}.{} IS {}",
                quote(&table.name),
                quote(&field.name),
                comment_literal(&field.comment)
            ));
        }
        statements
    }

    fn schema_types(&self, schema: &Schema) -> Vec<String> {
        let mut statements: Vec<String> = schema.enums.iter().map(|e| self.create_enum(e)).collect();
        for ty in &schema.types {
            statements.extend(self.create_composite(schema, ty));
        }
        statements
    }

    fn drop_index(&self, _table: &Table, index: &Index) -> String {
        format!("DROP INDEX IF EXISTS {}", quote(&index.name))
    }

    fn generate_sql(&self, operation: &MigrationOperation) -> Result<Vec<String>> {
        let statements = match operation {
            MigrationOperation::CreateType { schema, ty } => self.create_composite(schema, ty),

            MigrationOperation::DropType { ty } => {
                vec![format!("DROP TYPE IF EXISTS {}", quote(&ty.name))]
            }

            MigrationOperation::AlterType { schema, old, new } => {
                self.alter_composite(schema, old, new)
            }

            MigrationOperation::CreateEnum { enumeration } => vec![self.create_enum(enumeration)],

            MigrationOperation::DropEnum { enumeration } => {
                vec![format!("DROP TYPE IF EXISTS {}", quote(&enumeration.name))]
            }

            MigrationOperation::AlterEnum { old, new, usages } => {
                self.alter_enum(old, new, usages)
            }

            MigrationOperation::CreateTable { table } => {
                self.create_table(table.schema, table.table)?
            }

            MigrationOperation::DropTable { table } => {
                let mut statements = vec![self.drop_table(table.table)];
                statements.extend(
                    table
                        .table
                        .fields
                        .iter()
                        .filter(|f| is_inline_enum(f))
                        .map(|f| self.drop_inline_enum(table.name(), f)),
                );
                statements
            }

            MigrationOperation::RenameTable { old, new } => {
                let (from, to) = (old.name(), new.name());
                let mut statements = vec![self.rename_table(from, to)];
                if old.table.primary_key().next().is_some() {
                    statements.push(rename_constraint(to, &pkey_name(from), &pkey_name(to)));
                }
                for field in &old.table.fields {
                    if field.unique {
                        statements.push(rename_constraint(
                            to,
                            &unique_name(from, &field.name),
                            &unique_name(to, &field.name),
                        ));
                    }
                    if field.check.is_some() {
                        statements.push(rename_constraint(
                            to,
                            &check_name(from, &field.name),
                            &check_name(to, &field.name),
                        ));
                    }
                }
                for field in old.table.fields.iter().filter(|f| is_inline_enum(f)) {
                    statements.push(format!(
                        "ALTER TYPE {} RENAME TO {}",
                        quote(&enum_type_name(old.name(), &field.name)),
                        quote(&enum_type_name(new.name(), &field.name))
                    ));
                }
                statements
            }

            MigrationOperation::RebuildTable { old, new } => rebuild_table(self, *old, *new)?,

            MigrationOperation::AddColumn { table, field } => {
                let mut statements = Vec::new();
                if is_inline_enum(field) {
                    statements.push(self.create_inline_enum(table.name(), field));
                }
                statements.push(format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    quote(table.name()),
                    self.column_definition(table.schema, table.table, field)
                ));
                if !field.comment.is_empty() {
                    statements.push(format!(
                        "COMMENT ON COLUMN {}.{} IS {}",
                        quote(table.name()),
                        quote(&field.name),
                        comment_literal(&field.comment)
                    ));
                }
                statements
            }

            MigrationOperation::DropColumn { table, field } => {
                let mut statements = vec![format!(
                    "ALTER TABLE {} DROP COLUMN {}",
                    quote(table.name()),
                    quote(&field.name)
                )];
                if is_inline_enum(field) {
                    statements.push(self.drop_inline_enum(table.name(), field));
                }
                statements
            }

            MigrationOperation::AlterColumn {
                old,
                new_table,
                new,
                changes,
                ..
            } => self.alter_column(old, *new_table, new, changes),

            MigrationOperation::SetPrimaryKey { old, new } => {
                let mut statements = Vec::new();
                if old.table.primary_key().next().is_some() {
                    statements.push(format!(
                        "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {}",
                        quote(new.name()),
                        quote(&pkey_name(new.name()))
                    ));
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

            MigrationOperation::SetTableComment { table } => vec![format!(
                "COMMENT ON TABLE {} IS {}",
                quote(table.name()),
                comment_literal(&table.table.comment)
            )],

            MigrationOperation::SetInheritance { old, new } => {
                let table = quote(new.name());
                let mut statements: Vec<String> = old
                    .table
                    .inherits
                    .iter()
                    .filter(|p| !new.table.inherits.contains(p))
                    .map(|p| format!("ALTER TABLE {table} NO INHERIT {}", quote(p)))
                    .collect();
                statements.extend(
                    new.table
                        .inherits
                        .iter()
                        .filter(|p| !old.table.inherits.contains(p))
                        .map(|p| format!("ALTER TABLE {table} INHERIT {}", quote(p))),
                );
                statements
            }

            MigrationOperation::CreateIndex { table, index } => {
                vec![self.create_index(table.table, index)]
            }

            MigrationOperation::DropIndex { table, index } => {
                vec![self.drop_index(table.table, index)]
            }

            MigrationOperation::AddForeignKey { fk } => vec![self.add_foreign_key(fk, true)],

            MigrationOperation::DropForeignKey { fk } => vec![format!(
                "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {}",
                quote(&fk.table.name),
                quote(&fk.constraint_name())
            )],
        };
        Ok(statements)
    }
}
