use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info, trace};

use super::{Column, Index, IndexColumn, SchemaSource, Table, PRIMARY_KEY_INDEX};
use crate::ddl::ast::{CreateIndex, CreateTable, Ddl, Statement, TableAlteration};
use crate::ddl::parse_ddl;
use crate::error::SpangenError;

struct TableDef {
    table: CreateTable,
    indexes: Vec<CreateIndex>,
}

/// Schema source reading parsed DDL
pub struct DdlSource {
    /// Keyed by table name, so iteration is name ordered
    tables: BTreeMap<String, TableDef>,
}

impl DdlSource {
    /// Build from parsed statements. Foreign keys and change streams are
    /// accepted and dropped; any other statement kind is an error.
    pub fn new(ddl: Ddl) -> Result<Self, SpangenError> {
        let mut tables: BTreeMap<String, TableDef> = BTreeMap::new();
        let mut indexes = Vec::new();

        for statement in ddl.statements {
            match statement {
                Statement::CreateTable(table) => {
                    trace!(table = ?table.name, "DDL table");
                    tables.insert(
                        table.name.clone(),
                        TableDef {
                            table,
                            indexes: Vec::new(),
                        },
                    );
                }
                Statement::CreateIndex(index) => indexes.push(index),
                Statement::AlterTable(alter) => match alter.alteration {
                    TableAlteration::AddForeignKey(_) => {
                        trace!(table = ?alter.table, "Ignoring foreign key");
                    }
                    TableAlteration::Other { sql } => {
                        return Err(SpangenError::UnsupportedStatement(sql));
                    }
                },
                Statement::CreateChangeStream { name } => {
                    trace!(change_stream = ?name, "Ignoring change stream");
                }
                Statement::Other { sql } => return Err(SpangenError::UnsupportedStatement(sql)),
            }
        }

        // indexes may be declared before their table
        for index in indexes {
            let def = tables.get_mut(&index.table).ok_or_else(|| {
                SpangenError::schema(
                    &index.table,
                    "",
                    format!("index '{}' is declared on an unknown table", index.name),
                )
            })?;
            def.indexes.push(index);
        }
        for def in tables.values_mut() {
            def.indexes.sort_by(|a, b| a.name.cmp(&b.name));
        }

        debug!(tables = ?tables.len(), "Loaded DDL schema");
        Ok(Self { tables })
    }

    /// Parse DDL text
    pub fn parse(sql: &str) -> Result<Self, SpangenError> {
        Self::new(parse_ddl(sql)?)
    }

    /// Read and parse a DDL file
    pub fn from_file(path: &Path) -> Result<Self, SpangenError> {
        info!(path = ?path, "Reading DDL file");
        let sql = std::fs::read_to_string(path).map_err(|e| SpangenError::Config {
            path: path.display().to_string(),
            message: format!("failed to read DDL file: {e}"),
        })?;
        Self::parse(&sql)
    }
}

impl SchemaSource for DdlSource {
    fn table_list(&mut self) -> Result<Vec<Table>, SpangenError> {
        Ok(self
            .tables
            .values()
            .map(|def| Table {
                table_name: def.table.name.clone(),
                parent_table_name: def.table.interleave.as_ref().map(|i| i.parent.clone()),
            })
            .collect())
    }

    fn column_list(&mut self, table: &str) -> Result<Vec<Column>, SpangenError> {
        let Some(def) = self.tables.get(table) else {
            return Ok(Vec::new());
        };

        Ok(def
            .table
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| Column {
                field_ordinal: i as i64 + 1,
                column_name: column.name.clone(),
                data_type: column.data_type.to_string(),
                not_null: column.not_null,
                is_primary_key: def
                    .table
                    .primary_key
                    .iter()
                    .any(|key| key.column == column.name),
                is_generated: column.generated.is_some(),
            })
            .collect())
    }

    fn index_list(&mut self, table: &str) -> Result<Vec<Index>, SpangenError> {
        let Some(def) = self.tables.get(table) else {
            return Ok(Vec::new());
        };

        Ok(def
            .indexes
            .iter()
            .map(|index| Index {
                index_name: index.name.clone(),
                is_unique: index.unique,
                is_primary: false,
            })
            .collect())
    }

    fn index_column_list(
        &mut self,
        table: &str,
        index: &str,
    ) -> Result<Vec<IndexColumn>, SpangenError> {
        let Some(def) = self.tables.get(table) else {
            return Ok(Vec::new());
        };

        let key_columns = |keys: &mut dyn Iterator<Item = &String>| -> Vec<IndexColumn> {
            keys.enumerate()
                .map(|(i, column)| IndexColumn {
                    seq_no: i as i64 + 1,
                    column_name: column.clone(),
                    storing: false,
                })
                .collect()
        };

        if index == PRIMARY_KEY_INDEX {
            return Ok(key_columns(
                &mut def.table.primary_key.iter().map(|k| &k.column),
            ));
        }

        let Some(index) = def.indexes.iter().find(|i| i.name == index) else {
            return Ok(Vec::new());
        };

        let mut columns: Vec<IndexColumn> = index
            .storing
            .iter()
            .map(|column| IndexColumn {
                seq_no: 0,
                column_name: column.clone(),
                storing: true,
            })
            .collect();
        columns.extend(key_columns(&mut index.keys.iter().map(|k| &k.column)));
        Ok(columns)
    }
}
