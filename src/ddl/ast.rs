//! Syntax tree for Spanner DDL
//!
//! Only the statement kinds the schema loader consumes are modelled in
//! detail. Everything else is kept as raw SQL so callers can decide whether
//! to ignore it or fail.

use std::fmt;

/// A parsed DDL document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ddl {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable(CreateTable),
    CreateIndex(CreateIndex),
    AlterTable(AlterTable),
    CreateChangeStream { name: String },
    /// Any statement kind not modelled above, as written
    Other { sql: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub foreign_keys: Vec<ForeignKey>,
    pub primary_key: Vec<KeyPart>,
    pub interleave: Option<Interleave>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub not_null: bool,
    /// `AS (expr) [STORED]`
    pub generated: Option<Generated>,
    pub has_default: bool,
    pub hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generated {
    pub stored: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    Scalar { name: String, length: Option<Length> },
    Array(Box<DataType>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    Max,
    Value(i64),
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Length::Max => write!(f, "MAX"),
            Length::Value(n) => write!(f, "{n}"),
        }
    }
}

/// Renders the type the way INFORMATION_SCHEMA.COLUMNS.SPANNER_TYPE does,
/// e.g. `STRING(32)` or `ARRAY<BYTES(MAX)>`.
impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Scalar { name, length: None } => write!(f, "{name}"),
            DataType::Scalar {
                name,
                length: Some(length),
            } => write!(f, "{name}({length})"),
            DataType::Array(inner) => write!(f, "ARRAY<{inner}>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPart {
    pub column: String,
    pub descending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnDelete {
    #[default]
    NoAction,
    Cascade,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interleave {
    pub parent: String,
    pub on_delete: OnDelete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateIndex {
    pub name: String,
    pub table: String,
    pub unique: bool,
    pub null_filtered: bool,
    pub keys: Vec<KeyPart>,
    pub storing: Vec<String>,
    pub interleave_in: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterTable {
    pub table: String,
    pub alteration: TableAlteration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableAlteration {
    AddForeignKey(ForeignKey),
    Other { sql: String },
}
