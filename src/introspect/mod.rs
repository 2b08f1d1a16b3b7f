//! Schema introspection
//!
//! A [`SchemaSource`] gives a uniform, row-level view of a Spanner schema.
//! Two sources are provided: one reading the INFORMATION_SCHEMA catalog of a
//! live database and one reading parsed DDL. Both must produce identical rows
//! for the same schema.

use std::collections::HashSet;

use crate::error::SpangenError;

pub mod catalog;
pub mod ddl;
pub mod gcloud;

pub use catalog::{CatalogClient, CatalogSource};
pub use ddl::DdlSource;
pub use gcloud::GcloudClient;

/// Name of the synthetic index over a table's primary key
pub const PRIMARY_KEY_INDEX: &str = "PRIMARY_KEY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub table_name: String,
    pub parent_table_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// 1-based position in the table
    pub field_ordinal: i64,
    pub column_name: String,
    /// Raw Spanner type, e.g. `STRING(MAX)`
    pub data_type: String,
    pub not_null: bool,
    pub is_primary_key: bool,
    pub is_generated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub index_name: String,
    pub is_unique: bool,
    pub is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexColumn {
    /// 1-based key position; 0 for STORING columns
    pub seq_no: i64,
    pub column_name: String,
    pub storing: bool,
}

/// Row-level access to a schema
pub trait SchemaSource {
    /// All tables, ordered by name
    fn table_list(&mut self) -> Result<Vec<Table>, SpangenError>;

    /// Columns of `table` in ordinal order
    fn column_list(&mut self, table: &str) -> Result<Vec<Column>, SpangenError>;

    /// Secondary indexes of `table`, excluding `PRIMARY_KEY`
    fn index_list(&mut self, table: &str) -> Result<Vec<Index>, SpangenError>;

    /// Columns of `index`: storing columns first with `seq_no` 0, then key
    /// columns in order. `PRIMARY_KEY` yields the primary key columns.
    fn index_column_list(
        &mut self,
        table: &str,
        index: &str,
    ) -> Result<Vec<IndexColumn>, SpangenError>;
}

/// Tables and columns to leave out of generation
#[derive(Debug, Default, Clone)]
pub struct TableFilter {
    /// Table names to skip
    pub ignore_tables: HashSet<String>,
    /// Column names to skip, either bare (`Column`) or qualified (`Table.Column`)
    pub ignore_fields: HashSet<String>,
}

impl TableFilter {
    /// Check if a table should be included
    pub fn should_include_table(&self, table_name: &str) -> bool {
        !self.ignore_tables.contains(table_name)
    }

    /// Check if a column should be included
    pub fn should_include_column(&self, table_name: &str, column_name: &str) -> bool {
        !self.ignore_fields.contains(column_name)
            && !self
                .ignore_fields
                .contains(&format!("{table_name}.{column_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_filter() {
        let filter = TableFilter {
            ignore_tables: HashSet::from(["Secrets".to_string()]),
            ignore_fields: HashSet::from(["UpdatedAt".to_string(), "Users.Password".to_string()]),
        };

        assert!(!filter.should_include_table("Secrets"));
        assert!(filter.should_include_table("Users"));
        assert!(!filter.should_include_column("Users", "UpdatedAt"));
        assert!(!filter.should_include_column("Items", "UpdatedAt"));
        assert!(!filter.should_include_column("Users", "Password"));
        assert!(filter.should_include_column("Items", "Password"));
    }

    #[test]
    fn test_empty_filter_includes_everything() {
        let filter = TableFilter::default();
        assert!(filter.should_include_table("Anything"));
        assert!(filter.should_include_column("Anything", "Id"));
    }
}
