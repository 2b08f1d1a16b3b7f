use tracing::{debug, error, trace};

use super::{Column, Index, IndexColumn, SchemaSource, Table, PRIMARY_KEY_INDEX};
use crate::error::SpangenError;

/// The four fixed catalog queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogQuery {
    Tables,
    Columns,
    Indexes,
    IndexColumns,
}

impl CatalogQuery {
    pub fn name(&self) -> &'static str {
        match self {
            CatalogQuery::Tables => "tables",
            CatalogQuery::Columns => "columns",
            CatalogQuery::Indexes => "indexes",
            CatalogQuery::IndexColumns => "index columns",
        }
    }
}

/// A parameterized catalog query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub query: CatalogQuery,
    pub sql: &'static str,
    /// Named parameters, bound as `@name`
    pub params: Vec<(&'static str, String)>,
}

/// A single cell of a catalog result row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogValue {
    Null,
    Bool(bool),
    Int(i64),
    String(String),
}

/// A catalog result row, cells in SELECT order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row(pub Vec<CatalogValue>);

impl Row {
    fn cell(&self, index: usize) -> Result<&CatalogValue, String> {
        self.0
            .get(index)
            .ok_or_else(|| format!("row has {} cells, expected at least {}", self.0.len(), index + 1))
    }

    fn opt_string(&self, index: usize) -> Result<Option<String>, String> {
        match self.cell(index)? {
            CatalogValue::Null => Ok(None),
            CatalogValue::String(s) => Ok(Some(s.clone())),
            other => Err(format!("cell {index}: expected a string, got {other:?}")),
        }
    }

    fn string(&self, index: usize) -> Result<String, String> {
        self.opt_string(index)?
            .ok_or_else(|| format!("cell {index}: unexpected NULL"))
    }

    fn bool(&self, index: usize) -> Result<bool, String> {
        match self.cell(index)? {
            CatalogValue::Bool(b) => Ok(*b),
            CatalogValue::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            CatalogValue::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            other => Err(format!("cell {index}: expected a bool, got {other:?}")),
        }
    }

    /// INT64 values may arrive as JSON strings
    fn opt_int(&self, index: usize) -> Result<Option<i64>, String> {
        match self.cell(index)? {
            CatalogValue::Null => Ok(None),
            CatalogValue::Int(n) => Ok(Some(*n)),
            CatalogValue::String(s) => s
                .parse()
                .map(Some)
                .map_err(|e| format!("cell {index}: invalid integer '{s}': {e}")),
            other => Err(format!("cell {index}: expected an integer, got {other:?}")),
        }
    }
}

/// Executes catalog queries against a live database
pub trait CatalogClient {
    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>, SpangenError>;
}

const TABLES_SQL: &str = r#"
    SELECT TABLE_NAME, PARENT_TABLE_NAME
    FROM INFORMATION_SCHEMA.TABLES
    WHERE TABLE_SCHEMA = ""
    ORDER BY TABLE_NAME
"#;

const COLUMNS_SQL: &str = r#"
    SELECT
        c.COLUMN_NAME,
        c.ORDINAL_POSITION,
        c.IS_NULLABLE = "NO" AS NOT_NULL,
        c.SPANNER_TYPE,
        EXISTS (
            SELECT 1 FROM INFORMATION_SCHEMA.INDEX_COLUMNS ic
            WHERE ic.TABLE_SCHEMA = ""
                AND ic.TABLE_NAME = c.TABLE_NAME
                AND ic.COLUMN_NAME = c.COLUMN_NAME
                AND ic.INDEX_NAME = "PRIMARY_KEY"
        ) AS IS_PRIMARY_KEY,
        c.IS_GENERATED = "ALWAYS" AS IS_GENERATED
    FROM INFORMATION_SCHEMA.COLUMNS c
    WHERE c.TABLE_SCHEMA = "" AND c.TABLE_NAME = @table
    ORDER BY c.ORDINAL_POSITION
"#;

const INDEXES_SQL: &str = r#"
    SELECT INDEX_NAME, IS_UNIQUE
    FROM INFORMATION_SCHEMA.INDEXES
    WHERE TABLE_SCHEMA = ""
        AND INDEX_NAME != "PRIMARY_KEY"
        AND TABLE_NAME = @table
        AND SPANNER_IS_MANAGED = FALSE
    ORDER BY INDEX_NAME
"#;

const INDEX_COLUMNS_SQL: &str = r#"
    SELECT ORDINAL_POSITION, COLUMN_NAME
    FROM INFORMATION_SCHEMA.INDEX_COLUMNS
    WHERE TABLE_SCHEMA = "" AND INDEX_NAME = @index AND TABLE_NAME = @table
    ORDER BY ORDINAL_POSITION
"#;

/// Schema source reading INFORMATION_SCHEMA through a [`CatalogClient`]
pub struct CatalogSource<'a> {
    client: &'a mut dyn CatalogClient,
}

impl<'a> CatalogSource<'a> {
    pub fn new(client: &'a mut dyn CatalogClient) -> Self {
        Self { client }
    }

    fn run(&mut self, statement: Statement) -> Result<Vec<Row>, SpangenError> {
        trace!(query = ?statement.query, params = ?statement.params, "Running catalog query");
        let rows = self.client.query(&statement).map_err(|e| {
            error!(query = ?statement.query, error = ?e, "Catalog query failed");
            e
        })?;
        trace!(query = ?statement.query, rows = ?rows.len(), "Catalog query returned");
        Ok(rows)
    }
}

fn decode_error(query: CatalogQuery, message: String) -> SpangenError {
    SpangenError::Catalog {
        query: query.name().to_string(),
        message,
    }
}

impl SchemaSource for CatalogSource<'_> {
    fn table_list(&mut self) -> Result<Vec<Table>, SpangenError> {
        let rows = self.run(Statement {
            query: CatalogQuery::Tables,
            sql: TABLES_SQL,
            params: vec![],
        })?;

        let decode = |row: &Row| -> Result<Table, String> {
            Ok(Table {
                table_name: row.string(0)?,
                parent_table_name: row.opt_string(1)?.filter(|p| !p.is_empty()),
            })
        };
        let tables = rows
            .iter()
            .map(decode)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| decode_error(CatalogQuery::Tables, e))?;

        debug!(count = ?tables.len(), "Found tables");
        Ok(tables)
    }

    fn column_list(&mut self, table: &str) -> Result<Vec<Column>, SpangenError> {
        let rows = self.run(Statement {
            query: CatalogQuery::Columns,
            sql: COLUMNS_SQL,
            params: vec![("table", table.to_string())],
        })?;

        let decode = |row: &Row| -> Result<Column, String> {
            Ok(Column {
                column_name: row.string(0)?,
                field_ordinal: row.opt_int(1)?.unwrap_or_default(),
                not_null: row.bool(2)?,
                data_type: row.string(3)?,
                is_primary_key: row.bool(4)?,
                is_generated: row.bool(5)?,
            })
        };
        rows.iter()
            .map(decode)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| decode_error(CatalogQuery::Columns, format!("table '{table}': {e}")))
    }

    fn index_list(&mut self, table: &str) -> Result<Vec<Index>, SpangenError> {
        let rows = self.run(Statement {
            query: CatalogQuery::Indexes,
            sql: INDEXES_SQL,
            params: vec![("table", table.to_string())],
        })?;

        let decode = |row: &Row| -> Result<Index, String> {
            Ok(Index {
                index_name: row.string(0)?,
                is_unique: row.bool(1)?,
                is_primary: false,
            })
        };
        rows.iter()
            .map(decode)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| decode_error(CatalogQuery::Indexes, format!("table '{table}': {e}")))
    }

    fn index_column_list(
        &mut self,
        table: &str,
        index: &str,
    ) -> Result<Vec<IndexColumn>, SpangenError> {
        let rows = self.run(Statement {
            query: CatalogQuery::IndexColumns,
            sql: INDEX_COLUMNS_SQL,
            params: vec![("index", index.to_string()), ("table", table.to_string())],
        })?;

        // A NULL ordinal position marks a STORING column
        let decode = |row: &Row| -> Result<IndexColumn, String> {
            let ordinal = row.opt_int(0)?;
            Ok(IndexColumn {
                seq_no: ordinal.unwrap_or(0),
                column_name: row.string(1)?,
                storing: ordinal.is_none(),
            })
        };
        let mut columns = rows
            .iter()
            .map(decode)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                decode_error(
                    CatalogQuery::IndexColumns,
                    format!("table '{table}', index '{index}': {e}"),
                )
            })?;

        // The primary key has no storing columns; elsewhere keep them first
        // even if the backend sorts NULL ordinals last.
        if index != PRIMARY_KEY_INDEX {
            columns.sort_by_key(|c| !c.storing);
        }
        Ok(columns)
    }
}
