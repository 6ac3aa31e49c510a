//! Autodetector for generating migration operations from schema changes.
//!
//! The change map of the structural diff decides *what* is in scope: every
//! table, relationship, composite type or enumeration position it touches.
//! Inside that scope, entities are matched across the two snapshots by
//! identity (tables, fields, indices and relationships by id; types and
//! enumerations by name), so an element shifting position in an array is
//! never mistaken for a rename chain.

use std::collections::{BTreeSet, HashSet};

use tracing::debug;

use crate::diff::ChangeMap;
use crate::dialect::Dialect;
use crate::error::Result;
use crate::operations::{FieldChanges, MigrationOperation, TableRef, TypeUsage};
use crate::schema::{EntityId, Field, Relationship, Schema, Table};
use crate::types::{builtin, TypeCategory};

/// Positions of one top-level collection touched by a change map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Positions {
    /// The whole collection changed (added, removed or replaced).
    pub all: bool,
    /// Individual positions that changed.
    pub indices: BTreeSet<usize>,
}

impl Positions {
    /// Returns true if the position is in scope.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.all || self.indices.contains(&index)
    }

    /// Returns true if nothing is in scope.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.all && self.indices.is_empty()
    }
}

/// The parts of a schema a change map touches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    /// Touched table positions.
    pub tables: Positions,
    /// Touched relationship positions.
    pub relationships: Positions,
    /// Touched composite type positions.
    pub types: Positions,
    /// Touched enumeration positions.
    pub enums: Positions,
}

impl Scope {
    /// Classifies every changed path by the collection its prefix names.
    /// Paths outside the four schema collections are ignored.
    #[must_use]
    pub fn from_changes(changes: &ChangeMap) -> Self {
        let mut scope = Self::default();
        for path in changes.keys() {
            let mut parts = path.split('.');
            let target = match parts.next() {
                Some("tables") => &mut scope.tables,
                Some("relationships") => &mut scope.relationships,
                Some("types") => &mut scope.types,
                Some("enums") => &mut scope.enums,
                _ => continue,
            };
            match parts.next().map(str::parse::<usize>) {
                Some(Ok(index)) => {
                    target.indices.insert(index);
                }
                _ => target.all = true,
            }
        }
        scope
    }

    /// Returns true if no schema entity is in scope.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
            && self.relationships.is_empty()
            && self.types.is_empty()
            && self.enums.is_empty()
    }
}

fn positions_of<'a, T, K>(
    from: &'a [T],
    to: &'a [T],
    positions: &Positions,
    key: impl Fn(&'a T) -> K,
) -> HashSet<K>
where
    K: std::hash::Hash + Eq,
{
    from.iter()
        .enumerate()
        .chain(to.iter().enumerate())
        .filter(|(i, _)| positions.contains(*i))
        .map(|(_, item)| key(item))
        .collect()
}

fn uses_any(table: &Table, names: &HashSet<String>) -> bool {
    table
        .fields
        .iter()
        .any(|f| names.contains(&f.type_name.trim().to_ascii_lowercase()))
}

/// Detects schema changes and generates migration operations.
#[derive(Debug, Clone, Copy)]
pub struct Autodetector {
    dialect: Dialect,
}

impl Autodetector {
    /// Creates an autodetector for a dialect.
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// Returns the operations transforming `from` into `to`, restricted to
    /// the entities in `scope`.
    ///
    /// # Errors
    ///
    /// Returns an integrity error if a relationship in scope cannot be
    /// resolved against its snapshot.
    pub fn plan<'a>(
        &self,
        scope: &Scope,
        from: &'a Schema,
        to: &'a Schema,
    ) -> Result<Vec<MigrationOperation<'a>>> {
        let sql = self.dialect.sql();
        let native_types = sql.native_named_types();
        let mut operations = Vec::new();

        // Composite types and enumerations
        let type_names = positions_of(&from.types, &to.types, &scope.types, |t| {
            t.name.to_ascii_lowercase()
        });
        let enum_names = positions_of(&from.enums, &to.enums, &scope.enums, |e| {
            e.name.to_ascii_lowercase()
        });

        let mut changed_named: HashSet<String> = HashSet::new();
        for name in &type_names {
            if from.get_type(name) != to.get_type(name) {
                changed_named.insert(name.clone());
            }
        }
        for name in &enum_names {
            if from.get_enum(name) != to.get_enum(name) {
                changed_named.insert(name.clone());
            }
        }

        let mut altered_named = Vec::new();
        for en in to.enums.iter().filter(|e| enum_names.contains(&e.name.to_ascii_lowercase())) {
            match from.get_enum(&en.name) {
                None => operations.push(MigrationOperation::CreateEnum { enumeration: en }),
                Some(old) if old != en => altered_named.push(MigrationOperation::AlterEnum {
                    old,
                    new: en,
                    usages: enum_usages(from, &en.name),
                }),
                Some(_) => {}
            }
        }
        for ty in to.types.iter().filter(|t| type_names.contains(&t.name.to_ascii_lowercase())) {
            match from.get_type(&ty.name) {
                None => operations.push(MigrationOperation::CreateType { schema: to, ty }),
                Some(old) if old != ty => altered_named.push(MigrationOperation::AlterType {
                    schema: to,
                    old,
                    new: ty,
                }),
                Some(_) => {}
            }
        }
        operations.extend(altered_named);

        // Tables in scope, widened to every table using a changed type when
        // columns embed the type definition.
        let mut table_ids: HashSet<&EntityId> =
            positions_of(&from.tables, &to.tables, &scope.tables, |t| &t.id);
        if !native_types && !changed_named.is_empty() {
            table_ids.extend(
                from.tables
                    .iter()
                    .chain(&to.tables)
                    .filter(|t| uses_any(t, &changed_named))
                    .map(|t| &t.id),
            );
        }

        // Foreign keys
        let rel_ids = positions_of(
            &from.relationships,
            &to.relationships,
            &scope.relationships,
            |r| &r.id,
        );
        let mut dropped_fks: Vec<&'a Relationship> = from
            .relationships
            .iter()
            .filter(|r| rel_ids.contains(&r.id))
            .filter(|r| {
                to.get_relationship(&r.id)
                    .map_or(true, |n| !n.same_constraint(r))
            })
            .collect();
        let mut added_fks: Vec<&'a Relationship> = to
            .relationships
            .iter()
            .filter(|r| rel_ids.contains(&r.id))
            .filter(|r| {
                from.get_relationship(&r.id)
                    .map_or(true, |o| !o.same_constraint(r))
            })
            .collect();

        // Without ALTER TABLE ... ADD CONSTRAINT, a foreign key change on a
        // surviving table means rebuilding that table.
        let mut rebuild: HashSet<&EntityId> = HashSet::new();
        if !sql.supports_add_constraint() {
            for rel in dropped_fks.iter().chain(&added_fks).copied() {
                let id = &rel.start_table_id;
                if from.get_table(id).is_some() && to.get_table(id).is_some() {
                    rebuild.insert(id);
                    table_ids.insert(id);
                }
            }
        }

        // Tables
        let mut table_operations = Vec::new();
        let mut retyped: HashSet<(&EntityId, &EntityId)> = HashSet::new();
        for table in to.tables.iter().filter(|t| table_ids.contains(&t.id)) {
            let new = TableRef::new(to, table);
            match from.get_table(&table.id) {
                Some(old) => {
                    let old = TableRef::new(from, old);
                    let (ops, fields) =
                        self.diff_table(old, new, &changed_named, rebuild.contains(&table.id));
                    table_operations.extend(ops);
                    retyped.extend(fields.into_iter().map(|f| (&table.id, f)));
                }
                None => {
                    table_operations.push(MigrationOperation::CreateTable { table: new });
                    table_operations.extend(
                        table
                            .indices
                            .iter()
                            .map(|index| MigrationOperation::CreateIndex { table: new, index }),
                    );
                }
            }
        }
        for table in from.tables.iter().filter(|t| table_ids.contains(&t.id)) {
            if to.get_table(&table.id).is_none() {
                table_operations.push(MigrationOperation::DropTable {
                    table: TableRef::new(from, table),
                });
            }
        }

        // Constraints on a retyped column must be lifted around the change.
        for rel in &from.relationships {
            let touches = retyped.contains(&(&rel.start_table_id, &rel.start_field_id))
                || retyped.contains(&(&rel.end_table_id, &rel.end_field_id));
            if !touches || dropped_fks.iter().any(|r| r.id == rel.id) {
                continue;
            }
            if let Some(new) = to.get_relationship(&rel.id) {
                dropped_fks.push(rel);
                if !added_fks.iter().any(|r| r.id == new.id) {
                    added_fks.push(new);
                }
            }
        }

        if sql.supports_add_constraint() {
            for rel in dropped_fks.iter().copied() {
                operations.push(MigrationOperation::DropForeignKey {
                    fk: from.resolve_relationship(rel)?,
                });
            }
        }
        operations.extend(table_operations);
        if sql.supports_add_constraint() {
            for rel in added_fks.iter().copied() {
                operations.push(MigrationOperation::AddForeignKey {
                    fk: to.resolve_relationship(rel)?,
                });
            }
        }

        for ty in from.types.iter().filter(|t| type_names.contains(&t.name.to_ascii_lowercase())) {
            if to.get_type(&ty.name).is_none() {
                operations.push(MigrationOperation::DropType { ty });
            }
        }
        for en in from.enums.iter().filter(|e| enum_names.contains(&e.name.to_ascii_lowercase())) {
            if to.get_enum(&en.name).is_none() {
                operations.push(MigrationOperation::DropEnum { enumeration: en });
            }
        }

        debug!(
            dialect = %self.dialect,
            tables = table_ids.len(),
            operations = operations.len(),
            "Planned migration"
        );
        Ok(operations)
    }

    /// Operations for a table present in both snapshots, plus the ids of
    /// fields whose type changed.
    fn diff_table<'a>(
        &self,
        old: TableRef<'a>,
        new: TableRef<'a>,
        changed_named: &HashSet<String>,
        force_rebuild: bool,
    ) -> (Vec<MigrationOperation<'a>>, Vec<&'a EntityId>) {
        let sql = self.dialect.sql();

        let mut altered = Vec::new();
        for field in &new.table.fields {
            if let Some(prev) = old.table.get_field(&field.id) {
                let changes = self.field_changes(prev, field, changed_named);
                if !changes.is_empty() {
                    altered.push((prev, field, changes));
                }
            }
        }
        let added: Vec<&Field> = new
            .table
            .fields
            .iter()
            .filter(|f| old.table.get_field(&f.id).is_none())
            .collect();
        let dropped: Vec<&Field> = old
            .table
            .fields
            .iter()
            .filter(|f| new.table.get_field(&f.id).is_none())
            .collect();
        let retyped: Vec<&EntityId> = altered
            .iter()
            .filter(|(_, _, c)| c.retyped || c.values)
            .map(|(_, f, _)| &f.id)
            .collect();

        let old_pk: HashSet<&EntityId> = old.table.primary_key().map(|f| &f.id).collect();
        let new_pk: HashSet<&EntityId> = new.table.primary_key().map(|f| &f.id).collect();
        let pk_changed = old_pk != new_pk;

        let needs_rebuild = !sql.supports_alter_column()
            && (force_rebuild
                || pk_changed
                || altered
                    .iter()
                    .any(|(_, _, c)| c.alters_definition() || c.unique)
                || added.iter().any(|f| {
                    f.primary || f.unique || f.increment || (f.not_null && f.default.is_none())
                })
                || dropped.iter().any(|f| f.primary || f.unique));
        if needs_rebuild {
            debug!(table = %new.name(), "Table requires recreation");
            return (vec![MigrationOperation::RebuildTable { old, new }], retyped);
        }

        let mut operations = Vec::new();

        if old.name() != new.name() {
            operations.push(MigrationOperation::RenameTable { old, new });
        }

        for index in &old.table.indices {
            if new.table.get_index(&index.id) != Some(index) {
                operations.push(MigrationOperation::DropIndex { table: new, index });
            }
        }

        for field in added {
            operations.push(MigrationOperation::AddColumn { table: new, field });
        }

        for (prev, field, changes) in altered {
            operations.push(MigrationOperation::AlterColumn {
                old_table: old,
                old: prev,
                new_table: new,
                new: field,
                changes,
            });
        }

        if pk_changed {
            operations.push(MigrationOperation::SetPrimaryKey { old, new });
        }

        for field in dropped {
            operations.push(MigrationOperation::DropColumn { table: new, field });
        }

        if old.table.comment != new.table.comment {
            operations.push(MigrationOperation::SetTableComment { table: new });
        }

        if old.table.inherits != new.table.inherits {
            operations.push(MigrationOperation::SetInheritance { old, new });
        }

        for index in &new.table.indices {
            if old.table.get_index(&index.id) != Some(index) {
                operations.push(MigrationOperation::CreateIndex { table: new, index });
            }
        }

        (operations, retyped)
    }

    fn field_changes(
        &self,
        old: &Field,
        new: &Field,
        changed_named: &HashSet<String>,
    ) -> FieldChanges {
        let type_name = new.type_name.trim().to_ascii_lowercase();
        let kind = builtin(&new.type_name);
        let sized = kind.is_some_and(|b| b.sized || b.precision);
        let enumerated =
            kind.is_some_and(|b| matches!(b.category, TypeCategory::Enum | TypeCategory::Set));
        let definition_changed =
            !self.dialect.sql().native_named_types() && changed_named.contains(&type_name);

        FieldChanges {
            renamed: old.name != new.name,
            retyped: !old.type_name.trim().eq_ignore_ascii_case(new.type_name.trim())
                || (sized && old.size != new.size)
                || definition_changed,
            values: enumerated && old.values != new.values,
            nullability: old.not_null != new.not_null,
            default: old.default != new.default,
            unique: old.unique != new.unique,
            check: old.check != new.check,
            comment: old.comment != new.comment,
            increment: old.increment != new.increment,
        }
    }
}

/// Every column of `schema` typed with the named enumeration.
fn enum_usages<'a>(schema: &'a Schema, name: &str) -> Vec<TypeUsage<'a>> {
    schema
        .tables
        .iter()
        .flat_map(|table| {
            table
                .fields
                .iter()
                .filter(|f| f.type_name.trim().eq_ignore_ascii_case(name))
                .map(move |field| TypeUsage { table, field })
        })
        .collect()
}
