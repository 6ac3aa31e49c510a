//! Migration operations.
//!
//! An operation is one schema change between two snapshots. Operations
//! borrow the entities they describe from the snapshots, so rendering an
//! operation always sees the full definition (type, size, constraints) of
//! what is being created or restored.

use crate::schema::{
    CompositeType, Enumeration, Field, ForeignKey, Index, Schema, Table,
};

/// A table together with the snapshot it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct TableRef<'a> {
    /// Snapshot containing the table (for type resolution).
    pub schema: &'a Schema,
    /// The table.
    pub table: &'a Table,
}

impl<'a> TableRef<'a> {
    /// Creates a table reference.
    #[must_use]
    pub const fn new(schema: &'a Schema, table: &'a Table) -> Self {
        Self { schema, table }
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        &self.table.name
    }
}

/// A field using a named type, with the names it currently has in the
/// database.
#[derive(Debug, Clone, Copy)]
pub struct TypeUsage<'a> {
    /// Table holding the field.
    pub table: &'a Table,
    /// The field.
    pub field: &'a Field,
}

/// What changed on a field that exists on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldChanges {
    /// Name changed.
    pub renamed: bool,
    /// Type name, size, or the definition of the referenced type changed.
    pub retyped: bool,
    /// ENUM/SET value list changed.
    pub values: bool,
    /// NOT NULL flag changed.
    pub nullability: bool,
    /// Default expression changed.
    pub default: bool,
    /// UNIQUE flag changed.
    pub unique: bool,
    /// Check expression changed.
    pub check: bool,
    /// Comment changed.
    pub comment: bool,
    /// Auto-increment flag changed.
    pub increment: bool,
}

impl FieldChanges {
    /// Creates empty field changes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Returns true if the column definition itself changed (anything but
    /// the name, the comment or uniqueness).
    #[must_use]
    pub fn alters_definition(&self) -> bool {
        self.retyped
            || self.values
            || self.nullability
            || self.default
            || self.check
            || self.increment
    }
}

/// A single migration operation.
#[derive(Debug, Clone)]
pub enum MigrationOperation<'a> {
    /// Declare a composite type.
    CreateType {
        /// Snapshot declaring the type.
        schema: &'a Schema,
        /// The type.
        ty: &'a CompositeType,
    },

    /// Drop a composite type.
    DropType {
        /// The type.
        ty: &'a CompositeType,
    },

    /// Change the attributes of a composite type.
    AlterType {
        /// Snapshot declaring the new definition.
        schema: &'a Schema,
        /// Current definition.
        old: &'a CompositeType,
        /// Target definition.
        new: &'a CompositeType,
    },

    /// Declare an enumeration.
    CreateEnum {
        /// The enumeration.
        enumeration: &'a Enumeration,
    },

    /// Drop an enumeration.
    DropEnum {
        /// The enumeration.
        enumeration: &'a Enumeration,
    },

    /// Change the values of an enumeration.
    AlterEnum {
        /// Current definition.
        old: &'a Enumeration,
        /// Target definition.
        new: &'a Enumeration,
        /// Columns currently typed with the enumeration.
        usages: Vec<TypeUsage<'a>>,
    },

    /// Create a table.
    CreateTable {
        /// The table.
        table: TableRef<'a>,
    },

    /// Drop a table.
    DropTable {
        /// The table.
        table: TableRef<'a>,
    },

    /// Rename a table.
    RenameTable {
        /// Current definition.
        old: TableRef<'a>,
        /// Target definition.
        new: TableRef<'a>,
    },

    /// Recreate a table and copy its rows (for engines that cannot alter
    /// columns or constraints in place).
    RebuildTable {
        /// Current definition.
        old: TableRef<'a>,
        /// Target definition.
        new: TableRef<'a>,
    },

    /// Add a column.
    AddColumn {
        /// Table (already carrying its target name).
        table: TableRef<'a>,
        /// The new field.
        field: &'a Field,
    },

    /// Drop a column.
    DropColumn {
        /// Table (already carrying its target name).
        table: TableRef<'a>,
        /// The dropped field.
        field: &'a Field,
    },

    /// Alter a column.
    AlterColumn {
        /// Table as it was.
        old_table: TableRef<'a>,
        /// Field as it was.
        old: &'a Field,
        /// Table as it becomes.
        new_table: TableRef<'a>,
        /// Field as it becomes.
        new: &'a Field,
        /// What changed.
        changes: FieldChanges,
    },

    /// Replace the primary key.
    SetPrimaryKey {
        /// Table as it was.
        old: TableRef<'a>,
        /// Table as it becomes.
        new: TableRef<'a>,
    },

    /// Change a table comment.
    SetTableComment {
        /// Table as it becomes.
        table: TableRef<'a>,
    },

    /// Change the parent tables.
    SetInheritance {
        /// Table as it was.
        old: TableRef<'a>,
        /// Table as it becomes.
        new: TableRef<'a>,
    },

    /// Create an index.
    CreateIndex {
        /// Table the index belongs to.
        table: TableRef<'a>,
        /// The index.
        index: &'a Index,
    },

    /// Drop an index.
    DropIndex {
        /// Table the index belongs to (target name).
        table: TableRef<'a>,
        /// The index.
        index: &'a Index,
    },

    /// Add a named foreign key constraint.
    AddForeignKey {
        /// The resolved relationship.
        fk: ForeignKey<'a>,
    },

    /// Drop a named foreign key constraint.
    DropForeignKey {
        /// The resolved relationship.
        fk: ForeignKey<'a>,
    },
}

impl MigrationOperation<'_> {
    /// Short name of the operation, for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CreateType { .. } => "create_type",
            Self::DropType { .. } => "drop_type",
            Self::AlterType { .. } => "alter_type",
            Self::CreateEnum { .. } => "create_enum",
            Self::DropEnum { .. } => "drop_enum",
            Self::AlterEnum { .. } => "alter_enum",
            Self::CreateTable { .. } => "create_table",
            Self::DropTable { .. } => "drop_table",
            Self::RenameTable { .. } => "rename_table",
            Self::RebuildTable { .. } => "rebuild_table",
            Self::AddColumn { .. } => "add_column",
            Self::DropColumn { .. } => "drop_column",
            Self::AlterColumn { .. } => "alter_column",
            Self::SetPrimaryKey { .. } => "set_primary_key",
            Self::SetTableComment { .. } => "set_table_comment",
            Self::SetInheritance { .. } => "set_inheritance",
            Self::CreateIndex { .. } => "create_index",
            Self::DropIndex { .. } => "drop_index",
            Self::AddForeignKey { .. } => "add_foreign_key",
            Self::DropForeignKey { .. } => "drop_foreign_key",
        }
    }
}
