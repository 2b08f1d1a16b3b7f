//! Schema data structures
//!
//! These types are the resolved intermediate representation produced by the
//! loader and consumed by code generation. They are plain values: built once
//! per run and read-only afterwards.

pub mod types;

use serde::Serialize;

pub use types::{FieldType, Package};

/// A complete database schema
#[derive(Debug, Clone, Default, Serialize)]
pub struct Schema {
    /// Sorted by `Type::name`
    pub types: Vec<Type>,
}

impl Schema {
    pub fn type_by_table(&self, table_name: &str) -> Option<&Type> {
        self.types.iter().find(|t| t.table_name == table_name)
    }
}

/// One Spanner table
#[derive(Debug, Clone, Serialize)]
pub struct Type {
    /// Singularized CamelCase table name
    pub name: String,
    pub table_name: String,
    /// Set for interleaved child tables
    pub parent_table_name: Option<String>,
    /// Primary key fields in PRIMARY KEY clause order
    pub primary_key_fields: Vec<Field>,
    pub fields: Vec<Field>,
    /// Sorted by `Index::index_name`
    pub indexes: Vec<Index>,
}

impl Type {
    pub fn field_by_column(&self, column_name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.column_name == column_name)
    }

    /// Fields that are not part of the primary key (for update mutations)
    pub fn non_primary_key_fields(&self) -> Vec<&Field> {
        self.fields.iter().filter(|f| !f.is_primary_key).collect()
    }

    /// Fields the database computes
    pub fn generated_fields(&self) -> Vec<&Field> {
        self.fields.iter().filter(|f| f.is_generated).collect()
    }
}

/// One column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    /// CamelCase column name
    pub name: String,
    pub column_name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Declared length, -1 for MAX or types without a length
    pub len: i64,
    pub spanner_data_type: String,
    pub is_not_null: bool,
    pub is_primary_key: bool,
    pub is_generated: bool,
}

/// A secondary index
#[derive(Debug, Clone, Serialize)]
pub struct Index {
    pub index_name: String,
    /// CamelCase index name
    pub name: String,
    /// Name of the generated finder
    pub func_name: String,
    /// Finder name used by earlier generated code, derived from the key
    /// field names
    pub legacy_func_name: String,
    pub is_unique: bool,
    pub is_primary: bool,
    /// Key fields in declaration order
    pub fields: Vec<Field>,
    pub storing_fields: Vec<Field>,
    /// Key and storing fields whose column is nullable
    pub nullable_fields: Vec<Field>,
    /// `Type::name` of the indexed table
    pub type_name: String,
}
