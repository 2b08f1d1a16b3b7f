//! # spangen
//!
//! Generate a Go data access layer from Cloud Spanner schemas
//!
//! This crate provides a CLI tool and library for reading a Spanner schema,
//! either from a live database's INFORMATION_SCHEMA or from DDL, and
//! rendering typed Go code for it through replaceable templates.

pub mod codegen;
pub mod config;
pub mod ddl;
pub mod error;
pub mod introspect;
pub mod loader;
pub mod naming;
pub mod schema;

pub mod prelude {
    pub use crate::codegen::{
        CodeGenConfig, CodeGenerator, CommandFormatter, Formatter, GoGenerator, ModuleRegistry,
        NoopFormatter, OutputMode,
    };
    pub use crate::config::{CatalogConfig, CustomTypes};
    pub use crate::error::SpangenError;
    pub use crate::introspect::{CatalogSource, DdlSource, GcloudClient, SchemaSource, TableFilter};
    pub use crate::loader::SchemaLoader;
    pub use crate::naming::{InflectionRule, Inflector};
    pub use crate::schema::{Field, FieldType, Index, Schema, Type};
}
