//! Schema representation types.
//!
//! These types describe a dialect-neutral database design as produced by the
//! diagram editor: tables with fields and indices, relationships between
//! fields, composite types and enumerations. They deserialize directly from
//! the editor's JSON document (camelCase keys); presentation-only keys such as
//! coordinates and colors are ignored on load.
//!
//! The model is pure data. Emission and migration functions only ever borrow
//! it.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{EntityKind, Result, SchemaError};

/// Identifier of a table, field, index or relationship.
///
/// The editor has used both numeric and string identifiers over time, so
/// both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    /// Numeric identifier (older documents).
    Number(i64),
    /// String identifier.
    Text(String),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i32> for EntityId {
    fn from(value: i32) -> Self {
        Self::Number(i64::from(value))
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Accepts a string, number or boolean and keeps its textual form.
/// Empty strings and `null` become `None`.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

/// Referential action for `ON UPDATE` / `ON DELETE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ConstraintAction {
    /// No action (error if the referenced row changes).
    #[default]
    #[serde(rename = "No action", alias = "NO ACTION", alias = "no_action")]
    NoAction,
    /// Cascade the change to referencing rows.
    #[serde(rename = "Cascade", alias = "CASCADE", alias = "cascade")]
    Cascade,
    /// Restrict (checked immediately).
    #[serde(rename = "Restrict", alias = "RESTRICT", alias = "restrict")]
    Restrict,
    /// Set the referencing column to NULL.
    #[serde(rename = "Set null", alias = "SET NULL", alias = "set_null")]
    SetNull,
    /// Set the referencing column to its default.
    #[serde(rename = "Set default", alias = "SET DEFAULT", alias = "set_default")]
    SetDefault,
}

impl ConstraintAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Cascade => "CASCADE",
            Self::Restrict => "RESTRICT",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

/// Cardinality tag of a relationship. Informational only; it does not
/// change the emitted DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// One to one.
    #[default]
    OneToOne,
    /// One to many.
    OneToMany,
    /// Many to one.
    ManyToOne,
    /// Any tag this version does not know.
    #[serde(other)]
    Unknown,
}

/// A column of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Identifier, unique within the owning table.
    pub id: EntityId,
    /// Column name.
    pub name: String,
    /// Abstract type name (builtin, composite type or enumeration name).
    #[serde(rename = "type")]
    pub type_name: String,
    /// Whether the column rejects NULL.
    #[serde(default)]
    pub not_null: bool,
    /// Whether the column has a UNIQUE constraint.
    #[serde(default)]
    pub unique: bool,
    /// Whether the column is part of the primary key.
    #[serde(default)]
    pub primary: bool,
    /// Whether the column auto-increments.
    #[serde(default)]
    pub increment: bool,
    /// Raw default expression (literal, function call or keyword).
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<String>,
    /// Check constraint expression.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub check: Option<String>,
    /// Free-text comment.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    /// Length, or `precision,scale`, for sized and precision types.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub size: Option<String>,
    /// Values of ENUM/SET typed fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl Field {
    /// Creates a nullable field with no constraints.
    #[must_use]
    pub fn new(
        id: impl Into<EntityId>,
        name: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            type_name: type_name.into(),
            not_null: false,
            unique: false,
            primary: false,
            increment: false,
            default: None,
            check: None,
            comment: String::new(),
            size: None,
            values: Vec::new(),
        }
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Sets the column as unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Adds the column to the primary key.
    #[must_use]
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self.not_null = true; // Primary keys are always NOT NULL
        self
    }

    /// Sets the column to auto-increment.
    #[must_use]
    pub fn increment(mut self) -> Self {
        self.increment = true;
        self
    }

    /// Sets the raw default expression.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets a check constraint.
    #[must_use]
    pub fn check(mut self, expr: impl Into<String>) -> Self {
        self.check = Some(expr.into());
        self
    }

    /// Sets the comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Sets the size (`"255"` or `"10,2"`).
    #[must_use]
    pub fn size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    /// Sets the ENUM/SET values.
    #[must_use]
    pub fn values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }
}

/// An index over one or more columns of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Identifier, unique within the owning table.
    pub id: EntityId,
    /// Index name.
    pub name: String,
    /// Whether this is a UNIQUE index.
    #[serde(default)]
    pub unique: bool,
    /// Names of the covered fields, in order.
    #[serde(default)]
    pub fields: Vec<String>,
}

impl Index {
    /// Creates a non-unique index.
    #[must_use]
    pub fn new<I, S>(id: impl Into<EntityId>, name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            unique: false,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Makes the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// A table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Identifier, unique within the schema.
    pub id: EntityId,
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    #[serde(default)]
    pub fields: Vec<Field>,
    /// Indices in declaration order.
    #[serde(default)]
    pub indices: Vec<Index>,
    /// Free-text comment.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    /// Parent table names (table inheritance, where supported).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inherits: Vec<String>,
}

impl Table {
    /// Creates an empty table.
    #[must_use]
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            fields: Vec::new(),
            indices: Vec::new(),
            comment: String::new(),
            inherits: Vec::new(),
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: Index) -> Self {
        self.indices.push(index);
        self
    }

    /// Sets the comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Adds a parent table.
    #[must_use]
    pub fn inherits(mut self, parent: impl Into<String>) -> Self {
        self.inherits.push(parent.into());
        self
    }

    /// Looks up a field by id.
    #[must_use]
    pub fn get_field(&self, id: &EntityId) -> Option<&Field> {
        self.fields.iter().find(|f| &f.id == id)
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field_named(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Looks up an index by id.
    #[must_use]
    pub fn get_index(&self, id: &EntityId) -> Option<&Index> {
        self.indices.iter().find(|i| &i.id == id)
    }

    /// Returns the primary key fields in field order.
    pub fn primary_key(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.primary)
    }
}

/// A foreign key between two fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    /// Identifier, unique within the schema.
    pub id: EntityId,
    /// Constraint name.
    #[serde(default)]
    pub name: String,
    /// Referencing table.
    pub start_table_id: EntityId,
    /// Referencing field.
    pub start_field_id: EntityId,
    /// Referenced table.
    pub end_table_id: EntityId,
    /// Referenced field.
    pub end_field_id: EntityId,
    /// Cardinality tag.
    #[serde(default)]
    pub cardinality: Cardinality,
    /// ON UPDATE policy.
    #[serde(default)]
    pub update_constraint: ConstraintAction,
    /// ON DELETE policy.
    #[serde(default)]
    pub delete_constraint: ConstraintAction,
}

impl Relationship {
    /// Creates a relationship from `(table, field)` to `(table, field)`.
    #[must_use]
    pub fn new(
        id: impl Into<EntityId>,
        name: impl Into<String>,
        start: (impl Into<EntityId>, impl Into<EntityId>),
        end: (impl Into<EntityId>, impl Into<EntityId>),
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            start_table_id: start.0.into(),
            start_field_id: start.1.into(),
            end_table_id: end.0.into(),
            end_field_id: end.1.into(),
            cardinality: Cardinality::default(),
            update_constraint: ConstraintAction::NoAction,
            delete_constraint: ConstraintAction::NoAction,
        }
    }

    /// Sets the ON UPDATE policy.
    #[must_use]
    pub fn on_update(mut self, action: ConstraintAction) -> Self {
        self.update_constraint = action;
        self
    }

    /// Sets the ON DELETE policy.
    #[must_use]
    pub fn on_delete(mut self, action: ConstraintAction) -> Self {
        self.delete_constraint = action;
        self
    }

    /// Sets the cardinality tag.
    #[must_use]
    pub fn cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    /// Returns `true` if both relationships produce the same constraint.
    /// The cardinality tag is not part of the DDL and is ignored.
    #[must_use]
    pub fn same_constraint(&self, other: &Self) -> bool {
        self.name == other.name
            && self.start_table_id == other.start_table_id
            && self.start_field_id == other.start_field_id
            && self.end_table_id == other.end_table_id
            && self.end_field_id == other.end_field_id
            && self.update_constraint == other.update_constraint
            && self.delete_constraint == other.delete_constraint
    }
}

/// A pseudo-field of a composite type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeField {
    /// Attribute name.
    pub name: String,
    /// Abstract type name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Size for sized/precision types.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub size: Option<String>,
    /// Values for ENUM/SET types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl TypeField {
    /// Creates an attribute.
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            size: None,
            values: Vec::new(),
        }
    }

    /// Sets the size.
    #[must_use]
    pub fn size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    /// Views this attribute as a plain nullable field, for type resolution.
    #[must_use]
    pub fn as_field(&self) -> Field {
        Field {
            size: self.size.clone(),
            values: self.values.clone(),
            ..Field::new(0, self.name.clone(), self.type_name.clone())
        }
    }
}

/// A user-defined composite type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeType {
    /// Type name.
    pub name: String,
    /// Attributes in order.
    #[serde(default)]
    pub fields: Vec<TypeField>,
    /// Free-text comment.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl CompositeType {
    /// Creates an empty composite type.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            comment: String::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn field(mut self, field: TypeField) -> Self {
        self.fields.push(field);
        self
    }
}

/// A named enumeration type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enumeration {
    /// Type name.
    pub name: String,
    /// Values in order.
    #[serde(default)]
    pub values: Vec<String>,
}

impl Enumeration {
    /// Creates an enumeration.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// A relationship with both ends resolved against its snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ForeignKey<'a> {
    /// The relationship itself.
    pub relationship: &'a Relationship,
    /// Referencing table.
    pub table: &'a Table,
    /// Referencing field.
    pub field: &'a Field,
    /// Referenced table.
    pub references_table: &'a Table,
    /// Referenced field.
    pub references_field: &'a Field,
}

impl ForeignKey<'_> {
    /// Constraint name: the relationship name, or a name derived from both
    /// ends when the relationship is unnamed.
    #[must_use]
    pub fn constraint_name(&self) -> String {
        if self.relationship.name.trim().is_empty() {
            format!(
                "fk_{}_{}_{}",
                self.table.name, self.field.name, self.references_table.name
            )
        } else {
            self.relationship.name.clone()
        }
    }
}

/// A complete schema snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schema {
    /// Tables in declaration order.
    pub tables: Vec<Table>,
    /// Relationships in declaration order.
    pub relationships: Vec<Relationship>,
    /// Composite types.
    pub types: Vec<CompositeType>,
    /// Enumerations.
    pub enums: Vec<Enumeration>,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a schema from the editor's JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Serialization`] if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Converts an already parsed JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Serialization`] if the value does not have the
    /// shape of a schema.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Adds a table.
    #[must_use]
    pub fn table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    /// Adds a relationship.
    #[must_use]
    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Adds a composite type.
    #[must_use]
    pub fn composite_type(mut self, ty: CompositeType) -> Self {
        self.types.push(ty);
        self
    }

    /// Adds an enumeration.
    #[must_use]
    pub fn enumeration(mut self, enumeration: Enumeration) -> Self {
        self.enums.push(enumeration);
        self
    }

    /// Looks up a table by id.
    #[must_use]
    pub fn get_table(&self, id: &EntityId) -> Option<&Table> {
        self.tables.iter().find(|t| &t.id == id)
    }

    /// Looks up a table by name.
    #[must_use]
    pub fn table_named(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Looks up a composite type by name (case-insensitive, like builtin
    /// type names).
    #[must_use]
    pub fn get_type(&self, name: &str) -> Option<&CompositeType> {
        self.types
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Looks up an enumeration by name (case-insensitive).
    #[must_use]
    pub fn get_enum(&self, name: &str) -> Option<&Enumeration> {
        self.enums.iter().find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Looks up a relationship by id.
    #[must_use]
    pub fn get_relationship(&self, id: &EntityId) -> Option<&Relationship> {
        self.relationships.iter().find(|r| &r.id == id)
    }

    /// Resolves both ends of a relationship.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DanglingReference`] if a table or field does
    /// not exist in this snapshot.
    pub fn resolve_relationship<'a>(&'a self, rel: &'a Relationship) -> Result<ForeignKey<'a>> {
        let missing = |target, target_id: &EntityId| {
            SchemaError::dangling(EntityKind::Relationship, &rel.id, target, target_id)
        };
        let table = self
            .get_table(&rel.start_table_id)
            .ok_or_else(|| missing(EntityKind::Table, &rel.start_table_id))?;
        let field = table
            .get_field(&rel.start_field_id)
            .ok_or_else(|| missing(EntityKind::Field, &rel.start_field_id))?;
        let references_table = self
            .get_table(&rel.end_table_id)
            .ok_or_else(|| missing(EntityKind::Table, &rel.end_table_id))?;
        let references_field = references_table
            .get_field(&rel.end_field_id)
            .ok_or_else(|| missing(EntityKind::Field, &rel.end_field_id))?;
        Ok(ForeignKey {
            relationship: rel,
            table,
            field,
            references_table,
            references_field,
        })
    }

    /// Foreign keys whose referencing side is the given table, in
    /// declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DanglingReference`] for unresolvable
    /// relationships starting at this table.
    pub fn foreign_keys_of<'a>(&'a self, table: &Table) -> Result<Vec<ForeignKey<'a>>> {
        self.relationships
            .iter()
            .filter(|r| r.start_table_id == table.id)
            .map(|r| self.resolve_relationship(r))
            .collect()
    }

    /// Checks model integrity: names present, identifiers unique, every
    /// reference resolvable.
    ///
    /// # Errors
    ///
    /// Returns the first integrity violation found, with the kind and id of
    /// the offending entity.
    pub fn validate(&self) -> Result<()> {
        let mut table_ids = HashSet::new();
        for table in &self.tables {
            if table.name.trim().is_empty() {
                return Err(SchemaError::empty_name(EntityKind::Table, &table.id));
            }
            if !table_ids.insert(&table.id) {
                return Err(SchemaError::DuplicateId {
                    kind: EntityKind::Table,
                    id: table.id.to_string(),
                    scope: "schema".to_string(),
                });
            }
            validate_table(table)?;
        }

        for rel in &self.relationships {
            self.resolve_relationship(rel)?;
        }

        for ty in &self.types {
            if ty.name.trim().is_empty() {
                return Err(SchemaError::EmptyName {
                    kind: EntityKind::CompositeType,
                    id: ty.name.clone(),
                });
            }
        }
        for en in &self.enums {
            if en.name.trim().is_empty() {
                return Err(SchemaError::EmptyName {
                    kind: EntityKind::Enumeration,
                    id: en.name.clone(),
                });
            }
        }
        Ok(())
    }
}

fn validate_table(table: &Table) -> Result<()> {
    let mut field_ids = HashSet::new();
    for field in &table.fields {
        if field.name.trim().is_empty() {
            return Err(SchemaError::empty_name(EntityKind::Field, &field.id));
        }
        if !field_ids.insert(&field.id) {
            return Err(SchemaError::DuplicateId {
                kind: EntityKind::Field,
                id: field.id.to_string(),
                scope: table.name.clone(),
            });
        }
    }

    let mut index_ids = HashSet::new();
    for index in &table.indices {
        if index.name.trim().is_empty() {
            return Err(SchemaError::empty_name(EntityKind::Index, &index.id));
        }
        if !index_ids.insert(&index.id) {
            return Err(SchemaError::DuplicateId {
                kind: EntityKind::Index,
                id: index.id.to_string(),
                scope: table.name.clone(),
            });
        }
        if let Some(missing) = index
            .fields
            .iter()
            .find(|name| table.field_named(name).is_none())
        {
            return Err(SchemaError::dangling(
                EntityKind::Index,
                &index.name,
                EntityKind::Field,
                missing,
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shop() -> Schema {
        Schema::new()
            .table(
                Table::new(0, "customers")
                    .field(Field::new(0, "id", "INT").primary().increment())
                    .field(Field::new(1, "email", "VARCHAR").size("255").unique()),
            )
            .table(
                Table::new(1, "orders")
                    .field(Field::new(0, "id", "INT").primary())
                    .field(Field::new(1, "customer_id", "INT").not_null())
                    .index(Index::new(0, "idx_orders_customer", ["customer_id"])),
            )
            .relationship(
                Relationship::new(0, "fk_orders_customer", (1, 1), (0, 0))
                    .on_delete(ConstraintAction::Cascade),
            )
    }

    #[test]
    fn test_field_builder() {
        let field = Field::new(0, "id", "BIGINT").primary().increment();
        assert!(field.primary);
        assert!(field.increment);
        assert!(field.not_null); // Primary keys are NOT NULL
    }

    #[test]
    fn test_deserialize_editor_document() {
        let doc = json!({
            "title": "Shop",
            "tables": [{
                "id": 0, "name": "items", "x": 10, "y": 20, "color": "#175e7a",
                "comment": "",
                "fields": [
                    {"id": 0, "name": "id", "type": "INT", "primary": true,
                     "notNull": true, "increment": true, "unique": false,
                     "default": "", "check": "", "comment": ""},
                    {"id": 1, "name": "price", "type": "DECIMAL", "size": "10,2",
                     "default": 0, "notNull": false},
                    {"id": 2, "name": "code", "type": "CHAR", "size": 8}
                ],
                "indices": [{"id": 0, "name": "idx_code", "unique": true, "fields": ["code"]}]
            }],
            "relationships": [],
            "notes": [],
            "subjectAreas": []
        });
        let schema = Schema::from_value(doc).unwrap();
        let table = &schema.tables[0];
        assert_eq!(table.name, "items");
        assert!(table.fields[0].increment);
        assert_eq!(table.fields[0].default, None);
        assert_eq!(table.fields[0].check, None);
        assert_eq!(table.fields[1].size.as_deref(), Some("10,2"));
        assert_eq!(table.fields[1].default.as_deref(), Some("0"));
        assert_eq!(table.fields[2].size.as_deref(), Some("8"));
        assert!(table.indices[0].unique);
    }

    #[test]
    fn test_deserialize_relationship_policies() {
        let rel: Relationship = serde_json::from_value(json!({
            "id": "r1", "name": "fk", "startTableId": "a", "startFieldId": "b",
            "endTableId": "c", "endFieldId": "d", "cardinality": "many_to_one",
            "updateConstraint": "No action", "deleteConstraint": "Set null"
        }))
        .unwrap();
        assert_eq!(rel.id, EntityId::from("r1"));
        assert_eq!(rel.cardinality, Cardinality::ManyToOne);
        assert_eq!(rel.update_constraint, ConstraintAction::NoAction);
        assert_eq!(rel.delete_constraint, ConstraintAction::SetNull);
        assert_eq!(rel.delete_constraint.as_sql(), "SET NULL");
    }

    #[test]
    fn test_unknown_cardinality_is_tolerated() {
        let card: Cardinality = serde_json::from_value(json!("many_to_many")).unwrap();
        assert_eq!(card, Cardinality::Unknown);
    }

    #[test]
    fn test_resolve_relationship() {
        let schema = shop();
        let fk = schema
            .resolve_relationship(&schema.relationships[0])
            .unwrap();
        assert_eq!(fk.table.name, "orders");
        assert_eq!(fk.field.name, "customer_id");
        assert_eq!(fk.references_table.name, "customers");
        assert_eq!(fk.references_field.name, "id");
        assert_eq!(fk.constraint_name(), "fk_orders_customer");
    }

    #[test]
    fn test_unnamed_relationship_gets_derived_name() {
        let mut schema = shop();
        schema.relationships[0].name = String::new();
        let fk = schema
            .resolve_relationship(&schema.relationships[0])
            .unwrap();
        assert_eq!(fk.constraint_name(), "fk_orders_customer_id_customers");
    }

    #[test]
    fn test_validate_accepts_consistent_schema() {
        assert!(shop().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_dangling_relationship() {
        let schema = shop().relationship(Relationship::new(9, "fk_ghost", (1, 1), (42, 0)));
        let err = schema.validate().unwrap_err();
        match err {
            SchemaError::DanglingReference {
                kind, id, target, ..
            } => {
                assert_eq!(kind, EntityKind::Relationship);
                assert_eq!(id, "9");
                assert_eq!(target, EntityKind::Table);
            }
            other => panic!("Expected DanglingReference, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_index_on_missing_field() {
        let schema = Schema::new().table(
            Table::new(0, "t")
                .field(Field::new(0, "a", "INT"))
                .index(Index::new(0, "idx_b", ["b"])),
        );
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::DanglingReference {
                kind: EntityKind::Index,
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_field_ids() {
        let schema = Schema::new().table(
            Table::new(0, "t")
                .field(Field::new(0, "a", "INT"))
                .field(Field::new(0, "b", "INT")),
        );
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::DuplicateId {
                kind: EntityKind::Field,
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_empty_table_name() {
        let schema = Schema::new().table(Table::new(3, " "));
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::EmptyName {
                kind: EntityKind::Table,
                ..
            })
        ));
    }

    #[test]
    fn test_primary_key_in_field_order() {
        let table = Table::new(0, "pairs")
            .field(Field::new(0, "b", "INT").primary())
            .field(Field::new(1, "x", "INT"))
            .field(Field::new(2, "a", "INT").primary());
        let pk: Vec<&str> = table.primary_key().map(|f| f.name.as_str()).collect();
        assert_eq!(pk, vec!["b", "a"]);
    }
}
