//! Abstract type catalogue.
//!
//! Field types in a schema are plain names. This module classifies a name as
//! one of the builtin types, a composite type, an enumeration, or unknown, and
//! holds the dialect-independent pieces of type resolution: sizing, default
//! literal quoting and JSON-Schema generation for composite types.
//! Dialect-specific spelling lives in [`crate::dialect`].

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use crate::schema::{CompositeType, Enumeration, Field, Schema, TypeField};

/// Broad family a builtin type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    /// Whole numbers.
    Integer,
    /// Exact numerics with precision and scale.
    Decimal,
    /// Approximate numerics.
    Float,
    /// Fixed or variable length character strings.
    Character,
    /// Unbounded text.
    Text,
    /// Fixed or variable length byte strings.
    Binary,
    /// Unbounded binary data.
    Blob,
    /// Dates and times.
    Temporal,
    /// True/false.
    Boolean,
    /// JSON documents.
    Json,
    /// UUIDs.
    Uuid,
    /// One value out of a list.
    Enum,
    /// Any subset of a list.
    Set,
}

/// A builtin abstract type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinType {
    /// Canonical (upper-case) name.
    pub name: &'static str,
    /// Type family.
    pub category: TypeCategory,
    /// Rendered as `TYPE(size)`, falling back to `default_size`.
    pub sized: bool,
    /// Rendered as `TYPE(precision,scale)` when a size is given.
    pub precision: bool,
    /// Size used when a sized type has none.
    pub default_size: Option<u32>,
    /// Whether literal defaults need quoting.
    pub quoted_default: bool,
}

const fn plain(name: &'static str, category: TypeCategory, quoted_default: bool) -> BuiltinType {
    BuiltinType {
        name,
        category,
        sized: false,
        precision: false,
        default_size: None,
        quoted_default,
    }
}

const fn sized(name: &'static str, category: TypeCategory, default_size: u32) -> BuiltinType {
    BuiltinType {
        name,
        category,
        sized: true,
        precision: false,
        default_size: Some(default_size),
        quoted_default: true,
    }
}

const fn precision(name: &'static str, category: TypeCategory) -> BuiltinType {
    BuiltinType {
        name,
        category,
        sized: false,
        precision: true,
        default_size: None,
        quoted_default: false,
    }
}

/// Every builtin type the editor offers.
pub const BUILTIN_TYPES: &[BuiltinType] = &[
    plain("INT", TypeCategory::Integer, false),
    plain("INTEGER", TypeCategory::Integer, false),
    plain("TINYINT", TypeCategory::Integer, false),
    plain("SMALLINT", TypeCategory::Integer, false),
    plain("MEDIUMINT", TypeCategory::Integer, false),
    plain("BIGINT", TypeCategory::Integer, false),
    precision("DECIMAL", TypeCategory::Decimal),
    precision("NUMERIC", TypeCategory::Decimal),
    precision("FLOAT", TypeCategory::Float),
    precision("DOUBLE", TypeCategory::Float),
    precision("REAL", TypeCategory::Float),
    sized("CHAR", TypeCategory::Character, 1),
    sized("VARCHAR", TypeCategory::Character, 255),
    plain("TINYTEXT", TypeCategory::Text, true),
    plain("TEXT", TypeCategory::Text, true),
    plain("MEDIUMTEXT", TypeCategory::Text, true),
    plain("LONGTEXT", TypeCategory::Text, true),
    sized("BINARY", TypeCategory::Binary, 1),
    sized("VARBINARY", TypeCategory::Binary, 255),
    plain("TINYBLOB", TypeCategory::Blob, false),
    plain("BLOB", TypeCategory::Blob, false),
    plain("MEDIUMBLOB", TypeCategory::Blob, false),
    plain("LONGBLOB", TypeCategory::Blob, false),
    plain("DATE", TypeCategory::Temporal, true),
    plain("TIME", TypeCategory::Temporal, true),
    plain("DATETIME", TypeCategory::Temporal, true),
    plain("TIMESTAMP", TypeCategory::Temporal, true),
    plain("BOOLEAN", TypeCategory::Boolean, false),
    plain("JSON", TypeCategory::Json, true),
    plain("UUID", TypeCategory::Uuid, true),
    plain("ENUM", TypeCategory::Enum, true),
    plain("SET", TypeCategory::Set, true),
];

/// Looks up a builtin type by name, ignoring case.
#[must_use]
pub fn builtin(name: &str) -> Option<&'static BuiltinType> {
    let name = name.trim();
    BUILTIN_TYPES
        .iter()
        .find(|t| t.name.eq_ignore_ascii_case(name))
}

/// What an abstract type name refers to in a given schema.
#[derive(Debug, Clone, Copy)]
pub enum TypeRef<'a> {
    /// A builtin type.
    Builtin(&'static BuiltinType),
    /// A composite type declared in the schema.
    Composite(&'a CompositeType),
    /// An enumeration declared in the schema.
    Enumeration(&'a Enumeration),
    /// Nothing known by this name.
    Unknown,
}

impl TypeRef<'_> {
    /// Returns the builtin category, if any.
    #[must_use]
    pub fn category(&self) -> Option<TypeCategory> {
        match self {
            Self::Builtin(b) => Some(b.category),
            _ => None,
        }
    }

    /// Whether literal defaults of this type are quoted.
    #[must_use]
    pub fn quoted_default(&self) -> bool {
        match self {
            Self::Builtin(b) => b.quoted_default,
            Self::Composite(_) | Self::Enumeration(_) => true,
            Self::Unknown => false,
        }
    }
}

/// Classifies a type name. Builtins take precedence over schema types.
#[must_use]
pub fn classify<'a>(schema: &'a Schema, type_name: &str) -> TypeRef<'a> {
    if let Some(b) = builtin(type_name) {
        return TypeRef::Builtin(b);
    }
    if let Some(ty) = schema.get_type(type_name) {
        return TypeRef::Composite(ty);
    }
    if let Some(en) = schema.get_enum(type_name) {
        return TypeRef::Enumeration(en);
    }
    TypeRef::Unknown
}

/// A resolved column type for one dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnType {
    /// Type text as it appears in the column clause.
    pub sql: String,
    /// Check constraint the type needs (enum lists, JSON validation).
    pub check: Option<String>,
    /// The identity/auto-increment form is already part of `sql`.
    pub identity_in_type: bool,
    /// The type maps to a permissive fallback that does not enforce its
    /// values (unknown types, unvalidated sets).
    pub lossy: bool,
}

impl ColumnType {
    /// A plain type with no extra constraint.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            check: None,
            identity_in_type: false,
            lossy: false,
        }
    }

    /// Attaches a check constraint.
    #[must_use]
    pub fn with_check(mut self, check: impl Into<String>) -> Self {
        self.check = Some(check.into());
        self
    }

    /// Marks the identity form as embedded in the type.
    #[must_use]
    pub fn identity(mut self) -> Self {
        self.identity_in_type = true;
        self
    }

    /// Marks the type as a lossy fallback.
    #[must_use]
    pub fn lossy(mut self) -> Self {
        self.lossy = true;
        self
    }
}

/// Applies the sizing rules of `builtin` to `sql_name`.
///
/// Sized types always get a size (the field's, or the default). Precision
/// types keep the stored size verbatim when present and are bare otherwise.
#[must_use]
pub fn apply_size(sql_name: &str, builtin: &BuiltinType, size: Option<&str>) -> String {
    let size = size.map(str::trim).filter(|s| !s.is_empty());
    if builtin.sized {
        match (size, builtin.default_size) {
            (Some(size), _) => format!("{sql_name}({size})"),
            (None, Some(default)) => format!("{sql_name}({default})"),
            (None, None) => sql_name.to_string(),
        }
    } else if builtin.precision {
        size.map_or_else(|| sql_name.to_string(), |size| format!("{sql_name}({size})"))
    } else {
        sql_name.to_string()
    }
}

/// Escapes a string for use inside a single-quoted SQL literal.
#[must_use]
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Renders values as a comma separated list of SQL string literals.
#[must_use]
pub fn quoted_values(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("'{}'", escape_literal(v)))
        .collect::<Vec<_>>()
        .join(", ")
}

static FUNCTION_CALL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\w+\s*\(.*\)$").ok());

const DEFAULT_KEYWORDS: &[&str] = &[
    "NULL",
    "TRUE",
    "FALSE",
    "CURRENT_TIMESTAMP",
    "CURRENT_DATE",
    "CURRENT_TIME",
    "LOCALTIME",
    "LOCALTIMESTAMP",
    "CURRENT_USER",
];

/// Whether a raw default is a keyword, function call or quoted literal,
/// all of which are emitted verbatim.
#[must_use]
pub fn is_verbatim_default(raw: &str) -> bool {
    let raw = raw.trim();
    if DEFAULT_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(raw)) {
        return true;
    }
    let quoted = raw.len() >= 2
        && ((raw.starts_with('\'') && raw.ends_with('\''))
            || (raw.starts_with('"') && raw.ends_with('"')));
    let grouped = raw.starts_with('(') && raw.ends_with(')');
    quoted || grouped || function_name(raw).is_some()
}

/// The name of the function a raw default calls, such as `lower` for
/// `lower('X')`.
#[must_use]
pub fn function_name(raw: &str) -> Option<&str> {
    let raw = raw.trim();
    let is_call = FUNCTION_CALL.as_ref().is_some_and(|re| re.is_match(raw));
    if is_call {
        raw.split('(').next().map(str::trim)
    } else {
        None
    }
}

/// Wraps a rendered function-call default as `(expr)`, for engines that
/// only accept expression defaults in parentheses. `keep_bare` exempts the
/// calls the engine takes verbatim.
#[must_use]
pub fn group_call(rendered: String, keep_bare: impl Fn(&str) -> bool) -> String {
    let wrap = function_name(&rendered).is_some_and(|name| !keep_bare(name));
    if wrap {
        format!("({rendered})")
    } else {
        rendered
    }
}

/// Renders a raw default expression, quoting it when the type requires it.
#[must_use]
pub fn render_default(raw: &str, quoted: bool) -> String {
    let raw = raw.trim();
    if quoted && !is_verbatim_default(raw) {
        format!("'{}'", escape_literal(raw))
    } else {
        raw.to_string()
    }
}

/// Whether the field's type is a builtin integer type.
#[must_use]
pub fn is_integer(field: &Field) -> bool {
    builtin(&field.type_name).is_some_and(|b| b.category == TypeCategory::Integer)
}

/// Generates the JSON Schema (draft-04) document validating values of a
/// composite type.
#[must_use]
pub fn json_schema(schema: &Schema, ty: &CompositeType) -> Value {
    let mut visiting = HashSet::new();
    let mut doc = object_schema(schema, ty, &mut visiting);
    if let Value::Object(map) = &mut doc {
        map.insert(
            "$schema".to_string(),
            Value::String("http://json-schema.org/draft-04/schema#".to_string()),
        );
    }
    doc
}

fn object_schema(schema: &Schema, ty: &CompositeType, visiting: &mut HashSet<String>) -> Value {
    visiting.insert(ty.name.to_ascii_lowercase());
    let mut properties = Map::new();
    for field in &ty.fields {
        properties.insert(field.name.clone(), attribute_schema(schema, field, visiting));
    }
    visiting.remove(&ty.name.to_ascii_lowercase());
    let required: Vec<&str> = ty.fields.iter().map(|f| f.name.as_str()).collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

fn attribute_schema(schema: &Schema, field: &TypeField, visiting: &mut HashSet<String>) -> Value {
    match classify(schema, &field.type_name) {
        TypeRef::Builtin(b) => match b.category {
            TypeCategory::Integer => json!({ "type": "integer" }),
            TypeCategory::Decimal | TypeCategory::Float => json!({ "type": "number" }),
            TypeCategory::Boolean => json!({ "type": "boolean" }),
            TypeCategory::Json => json!({ "type": ["object", "array"] }),
            TypeCategory::Enum => json!({ "type": "string", "enum": field.values }),
            TypeCategory::Set => json!({
                "type": "array",
                "items": { "type": "string", "enum": field.values },
            }),
            _ => json!({ "type": "string" }),
        },
        TypeRef::Enumeration(en) => json!({ "type": "string", "enum": en.values }),
        // Recursive types cannot be expanded; accept any object at the cycle.
        TypeRef::Composite(nested) if visiting.contains(&nested.name.to_ascii_lowercase()) => {
            json!({ "type": "object" })
        }
        TypeRef::Composite(nested) => object_schema(schema, nested, visiting),
        TypeRef::Unknown => json!({}),
    }
}
