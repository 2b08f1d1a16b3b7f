//! Catalog client backed by the `gcloud` CLI
//!
//! Queries run through `gcloud spanner databases execute-sql`, which has no
//! way to pass query parameters, so parameters are inlined as escaped
//! string literals.

use std::process::Command;

use regex::{Captures, Regex};
use serde::Deserialize;
use tracing::{debug, error};

use super::catalog::{CatalogClient, CatalogValue, Row, Statement};
use crate::config::CatalogConfig;
use crate::error::SpangenError;

/// `--format=json` output of `execute-sql`
#[derive(Debug, Deserialize)]
struct ResultSet {
    #[serde(default)]
    rows: Vec<Vec<serde_json::Value>>,
}

pub struct GcloudClient {
    config: CatalogConfig,
    program: String,
}

impl GcloudClient {
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            config,
            program: "gcloud".to_string(),
        }
    }

    /// Use a different executable, e.g. a wrapper script
    pub fn with_program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }
}

impl CatalogClient for GcloudClient {
    fn query(&mut self, statement: &Statement) -> Result<Vec<Row>, SpangenError> {
        let sql = bind_params(statement);
        debug!(
            query = ?statement.query,
            database = ?self.config.database_path(),
            "Executing catalog query via gcloud"
        );

        let output = Command::new(&self.program)
            .args(["spanner", "databases", "execute-sql"])
            .arg(&self.config.database)
            .arg(format!("--instance={}", self.config.instance))
            .arg(format!("--project={}", self.config.project))
            .arg(format!("--sql={sql}"))
            .arg("--format=json")
            .output()
            .map_err(|e| catalog_error(statement, format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(query = ?statement.query, status = ?output.status, "gcloud failed");
            return Err(catalog_error(statement, stderr.trim().to_string()));
        }

        parse_result_set(&output.stdout).map_err(|e| catalog_error(statement, e))
    }
}

fn catalog_error(statement: &Statement, message: String) -> SpangenError {
    SpangenError::Catalog {
        query: statement.query.name().to_string(),
        message,
    }
}

/// Replace `@name` placeholders with quoted string literals
fn bind_params(statement: &Statement) -> String {
    let placeholder = Regex::new(r"@(\w+)").expect("valid placeholder pattern");
    placeholder
        .replace_all(statement.sql, |caps: &Captures| {
            statement
                .params
                .iter()
                .find(|(name, _)| *name == &caps[1])
                .map(|(_, value)| quote_literal(value))
                .unwrap_or_else(|| caps[0].to_string())
        })
        .trim()
        .to_string()
}

fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn parse_result_set(stdout: &[u8]) -> Result<Vec<Row>, String> {
    // an empty result set can print nothing at all
    if stdout.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let result: ResultSet =
        serde_json::from_slice(stdout).map_err(|e| format!("invalid gcloud output: {e}"))?;

    Ok(result
        .rows
        .into_iter()
        .map(|cells| Row(cells.into_iter().map(to_catalog_value).collect()))
        .collect())
}

fn to_catalog_value(value: serde_json::Value) -> CatalogValue {
    match value {
        serde_json::Value::Null => CatalogValue::Null,
        serde_json::Value::Bool(b) => CatalogValue::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => CatalogValue::Int(i),
            None => CatalogValue::String(n.to_string()),
        },
        serde_json::Value::String(s) => CatalogValue::String(s),
        other => CatalogValue::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::catalog::CatalogQuery;

    #[test]
    fn test_bind_params() {
        let statement = Statement {
            query: CatalogQuery::IndexColumns,
            sql: "SELECT 1 WHERE INDEX_NAME = @index AND TABLE_NAME = @table AND X = @other",
            params: vec![("table", "Us\"ers".to_string()), ("index", "ByName".to_string())],
        };
        assert_eq!(
            bind_params(&statement),
            r#"SELECT 1 WHERE INDEX_NAME = "ByName" AND TABLE_NAME = "Us\"ers" AND X = @other"#
        );
    }

    #[test]
    fn test_parse_result_set() {
        let json = br#"{
            "metadata": {"rowType": {"fields": []}},
            "rows": [["Albums", "Singers"], ["Singers", null]]
        }"#;
        let rows = parse_result_set(json).unwrap();
        assert_eq!(
            rows,
            vec![
                Row(vec![
                    CatalogValue::String("Albums".into()),
                    CatalogValue::String("Singers".into())
                ]),
                Row(vec![CatalogValue::String("Singers".into()), CatalogValue::Null]),
            ]
        );
    }

    #[test]
    fn test_parse_empty_result_set() {
        assert!(parse_result_set(b"").unwrap().is_empty());
        assert!(parse_result_set(br#"{"metadata": {}}"#).unwrap().is_empty());
        assert!(parse_result_set(b"not json").is_err());
    }
}
