use thiserror::Error;

/// spangen errors
#[derive(Error, Debug)]
pub enum SpangenError {
    #[error("Configuration error in '{path}': {message}")]
    Config { path: String, message: String },

    #[error("Catalog query '{query}' failed: {message}")]
    Catalog { query: String, message: String },

    #[error("Failed to parse DDL statement '{statement}': {message}")]
    Ddl { statement: String, message: String },

    #[error("Unsupported DDL statement: {0}")]
    UnsupportedStatement(String),

    #[error("Invalid Spanner type '{data_type}': {message}")]
    InvalidType { data_type: String, message: String },

    #[error("Schema error in table '{table}', column '{column}': {message}")]
    Schema {
        table: String,
        column: String,
        message: String,
    },

    #[error("Template '{module}' failed: {message}")]
    Template { module: String, message: String },

    #[error("Package conflict in '{file}': {message}")]
    PackageConflict { file: String, message: String },

    #[error("Invalid package '{path}': {message}")]
    InvalidPackage { path: String, message: String },

    #[error("Failed to emit '{file}': {message}")]
    Emission { file: String, message: String },

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

impl SpangenError {
    pub(crate) fn schema(table: &str, column: &str, message: impl Into<String>) -> Self {
        Self::Schema {
            table: table.to_string(),
            column: column.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn emission(file: &str, message: impl Into<String>) -> Self {
        Self::Emission {
            file: file.to_string(),
            message: message.into(),
        }
    }
}
