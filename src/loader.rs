//! Schema loading
//!
//! Turns the row-level view of a [`SchemaSource`] into the resolved
//! [`Schema`] used by code generation.

use tracing::{debug, info, trace, warn};

use crate::config::CustomTypes;
use crate::error::SpangenError;
use crate::introspect::{self, SchemaSource, TableFilter, PRIMARY_KEY_INDEX};
use crate::naming::{snake_to_camel, Inflector};
use crate::schema::types::{map_spanner_type, validate_custom_type};
use crate::schema::{Field, Index, Schema, Type};

/// Compatibility check between a Spanner type and a custom type
pub type CustomTypeValidator = fn(data_type: &str, custom_type: &str) -> bool;

/// Builds a [`Schema`] from a [`SchemaSource`]
pub struct SchemaLoader<'a> {
    source: &'a mut dyn SchemaSource,
    inflector: &'a Inflector,
    filter: TableFilter,
    custom_types: CustomTypes,
    validator: CustomTypeValidator,
}

impl<'a> SchemaLoader<'a> {
    pub fn new(source: &'a mut dyn SchemaSource, inflector: &'a Inflector) -> Self {
        Self {
            source,
            inflector,
            filter: TableFilter::default(),
            custom_types: CustomTypes::default(),
            validator: validate_custom_type,
        }
    }

    pub fn with_filter(mut self, filter: TableFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_custom_types(mut self, custom_types: CustomTypes) -> Self {
        self.custom_types = custom_types;
        self
    }

    /// Replace the default (accept everything) custom type check
    pub fn with_custom_type_validator(mut self, validator: CustomTypeValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Load every included table
    pub fn load_schema(&mut self) -> Result<Schema, SpangenError> {
        let tables = self.source.table_list()?;
        info!(tables = ?tables.len(), "Loading schema");

        let mut types = Vec::with_capacity(tables.len());
        for table in tables {
            if !self.filter.should_include_table(&table.table_name) {
                debug!(table = ?table.table_name, "Skipping ignored table");
                continue;
            }
            types.push(self.load_type(table)?);
        }

        // indexes are attached last so every type is complete first
        for typ in &mut types {
            let indexes = self.load_indexes(typ)?;
            typ.indexes = indexes;
        }

        types.sort_by(|a, b| a.name.cmp(&b.name));
        info!(types = ?types.len(), "Schema loaded");
        Ok(Schema { types })
    }

    fn load_type(&mut self, table: introspect::Table) -> Result<Type, SpangenError> {
        let table_name = table.table_name;
        let name = snake_to_camel(&self.inflector.singularize(&table_name));
        debug!(table = ?table_name, type_name = ?name, "Loading table");

        let columns = self.source.column_list(&table_name)?;
        let mut fields = Vec::with_capacity(columns.len());
        for column in &columns {
            if !self.filter.should_include_column(&table_name, &column.column_name) {
                trace!(table = ?table_name, column = ?column.column_name, "Skipping ignored column");
                continue;
            }
            fields.push(self.load_field(&table_name, column)?);
        }

        let mut primary_key_fields = Vec::new();
        for key in self.source.index_column_list(&table_name, PRIMARY_KEY_INDEX)? {
            match fields.iter().find(|f: &&Field| f.column_name == key.column_name) {
                Some(field) => primary_key_fields.push(field.clone()),
                None if columns.iter().any(|c| c.column_name == key.column_name) => {
                    // removed by the ignore list; the output will not be usable
                    warn!(table = ?table_name, column = ?key.column_name, "Primary key column is ignored");
                }
                None => {
                    return Err(SpangenError::schema(
                        &table_name,
                        &key.column_name,
                        "primary key column does not exist",
                    ));
                }
            }
        }

        Ok(Type {
            name,
            table_name,
            parent_table_name: table.parent_table_name,
            primary_key_fields,
            fields,
            indexes: Vec::new(),
        })
    }

    fn load_field(
        &self,
        table_name: &str,
        column: &introspect::Column,
    ) -> Result<Field, SpangenError> {
        let mapped = map_spanner_type(&column.data_type, !column.not_null)
            .map_err(|e| SpangenError::schema(table_name, &column.column_name, e.to_string()))?;
        let mut field_type = mapped.field_type;

        if let Some(custom) = self.custom_types.lookup(table_name, &column.column_name) {
            if !(self.validator)(&column.data_type, custom) {
                return Err(SpangenError::schema(
                    table_name,
                    &column.column_name,
                    format!(
                        "custom type '{custom}' is not compatible with {}",
                        column.data_type
                    ),
                ));
            }
            trace!(table = ?table_name, column = ?column.column_name, custom_type = ?custom, "Custom type");
            field_type.set_custom_type(custom.to_string());
        }

        trace!(
            table = ?table_name,
            column = ?column.column_name,
            data_type = ?column.data_type,
            go_type = ?field_type.type_expr(),
            "Column"
        );

        Ok(Field {
            name: snake_to_camel(&column.column_name),
            column_name: column.column_name.clone(),
            field_type,
            len: mapped.len,
            spanner_data_type: column.data_type.clone(),
            is_not_null: column.not_null,
            is_primary_key: column.is_primary_key,
            is_generated: column.is_generated,
        })
    }

    fn load_indexes(&mut self, typ: &Type) -> Result<Vec<Index>, SpangenError> {
        let mut indexes = Vec::new();

        for index in self.source.index_list(&typ.table_name)? {
            let mut fields = Vec::new();
            let mut storing_fields = Vec::new();

            for column in self
                .source
                .index_column_list(&typ.table_name, &index.index_name)?
            {
                // may be in the ignore list
                let Some(field) = typ.field_by_column(&column.column_name) else {
                    trace!(index = ?index.index_name, column = ?column.column_name, "Skipping unknown index column");
                    continue;
                };
                if column.storing {
                    storing_fields.push(field.clone());
                } else {
                    fields.push(field.clone());
                }
            }

            let nullable_fields = fields
                .iter()
                .chain(&storing_fields)
                .filter(|f| !f.is_not_null)
                .cloned()
                .collect();

            let name = snake_to_camel(&index.index_name);
            let prefix = if index.is_unique {
                typ.name.clone()
            } else {
                self.inflector.pluralize(&typ.name)
            };
            let func_name = format!("{prefix}By{name}");
            let legacy_func_name = format!(
                "{prefix}By{}",
                fields.iter().map(|f| f.name.as_str()).collect::<String>()
            );
            debug!(table = ?typ.table_name, index = ?index.index_name, func_name = ?func_name, "Index");

            indexes.push(Index {
                index_name: index.index_name,
                name,
                func_name,
                legacy_func_name,
                is_unique: index.is_unique,
                is_primary: index.is_primary,
                fields,
                storing_fields,
                nullable_fields,
                type_name: typ.name.clone(),
            });
        }

        indexes.sort_by(|a, b| a.index_name.cmp(&b.index_name));
        Ok(indexes)
    }
}
