//! Configuration loading
//!
//! Loads the live database coordinates from arguments or environment
//! variables (optionally read from a .env file first), and the YAML
//! documents for custom field types and inflection rules.

use std::collections::HashMap;
use std::{env, fs, path::Path};

use serde::Deserialize;
use tracing::{debug, error, trace, warn};

use crate::error::SpangenError;
use crate::naming::InflectionRule;

pub const PROJECT_ENV: &str = "SPANNER_PROJECT_NAME";
pub const INSTANCE_ENV: &str = "SPANNER_INSTANCE_NAME";
pub const DATABASE_ENV: &str = "SPANNER_DATABASE_NAME";

/// Location of a live Spanner database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    pub project: String,
    pub instance: String,
    pub database: String,
}

impl CatalogConfig {
    pub fn new(project: &str, instance: &str, database: &str) -> Self {
        Self {
            project: project.to_string(),
            instance: instance.to_string(),
            database: database.to_string(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// Expected variables (all required):
    /// - SPANNER_PROJECT_NAME
    /// - SPANNER_INSTANCE_NAME
    /// - SPANNER_DATABASE_NAME
    pub fn from_env() -> Result<Self, SpangenError> {
        debug!("Loading Spanner configuration from environment");

        let required = |name: &str| {
            env::var(name).map_err(|_| {
                error!(variable = ?name, "Environment variable is not set");
                SpangenError::Config {
                    path: "environment".to_string(),
                    message: format!("{name} environment variable is required"),
                }
            })
        };

        let config = Self {
            project: required(PROJECT_ENV)?,
            instance: required(INSTANCE_ENV)?,
            database: required(DATABASE_ENV)?,
        };
        debug!(database = ?config.database_path(), "Configuration loaded");
        Ok(config)
    }

    /// Load a .env file and then read configuration from environment
    pub fn load(env_file: &Path) -> Result<Self, SpangenError> {
        load_env_file(env_file)?;
        Self::from_env()
    }

    /// Positional `project instance database` take precedence; with none
    /// given the environment (and `env_file`) is used.
    pub fn resolve(positionals: &[String], env_file: &Path) -> Result<Self, SpangenError> {
        match positionals {
            [project, instance, database] => {
                trace!("Using database coordinates from arguments");
                Ok(Self::new(project, instance, database))
            }
            [] => Self::load(env_file),
            other => Err(SpangenError::Config {
                path: "arguments".to_string(),
                message: format!(
                    "expected PROJECT INSTANCE DATABASE, got {} argument(s)",
                    other.len()
                ),
            }),
        }
    }

    /// Fully qualified database name
    pub fn database_path(&self) -> String {
        format!(
            "projects/{}/instances/{}/databases/{}",
            self.project, self.instance, self.database
        )
    }
}

/// Read a .env file into the process environment. A missing file is not an
/// error.
pub fn load_env_file(env_file: &Path) -> Result<(), SpangenError> {
    if env_file.exists() {
        debug!(path = ?env_file, "Loading environment file");
        dotenvy::from_path(env_file).map_err(|e| {
            error!(path = ?env_file, error = ?e, "Failed to load environment file");
            config_error(env_file, format!("failed to load environment file: {e}"))
        })?;
    } else {
        warn!(path = ?env_file, "Environment file not found, using existing environment");
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct CustomTypesDocument {
    #[serde(default)]
    tables: Vec<CustomTypesTable>,
}

#[derive(Debug, Deserialize)]
struct CustomTypesTable {
    name: String,
    #[serde(default)]
    columns: HashMap<String, String>,
}

/// Per-column Go type overrides, keyed by table then column
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomTypes {
    tables: HashMap<String, HashMap<String, String>>,
}

impl CustomTypes {
    /// Parse the YAML document
    ///
    /// ```yaml
    /// tables:
    ///   - name: Users
    ///     columns:
    ///       Status: models.UserStatus
    /// ```
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        // an empty document is an empty mapping
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let document: CustomTypesDocument = serde_yaml::from_str(yaml)?;

        let mut tables: HashMap<String, HashMap<String, String>> = HashMap::new();
        for table in document.tables {
            tables.entry(table.name).or_default().extend(table.columns);
        }
        Ok(Self { tables })
    }

    pub fn load(path: &Path) -> Result<Self, SpangenError> {
        debug!(path = ?path, "Loading custom types");
        let yaml = read_config(path)?;
        let custom_types = Self::from_yaml(&yaml).map_err(|e| {
            error!(path = ?path, error = ?e, "Invalid custom types file");
            config_error(path, e.to_string())
        })?;
        debug!(tables = ?custom_types.tables.len(), "Custom types loaded");
        Ok(custom_types)
    }

    pub fn insert(&mut self, table: &str, column: &str, custom_type: &str) {
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(column.to_string(), custom_type.to_string());
    }

    pub fn lookup(&self, table: &str, column: &str) -> Option<&str> {
        self.tables
            .get(table)
            .and_then(|columns| columns.get(column))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Load extra irregular inflections from a YAML list of
/// `{singular, plural}` records
pub fn load_inflection_rules(path: &Path) -> Result<Vec<InflectionRule>, SpangenError> {
    debug!(path = ?path, "Loading inflection rules");
    let yaml = read_config(path)?;
    if yaml.trim().is_empty() {
        return Ok(Vec::new());
    }
    let rules: Vec<InflectionRule> = serde_yaml::from_str(&yaml).map_err(|e| {
        error!(path = ?path, error = ?e, "Invalid inflection rule file");
        config_error(path, e.to_string())
    })?;
    debug!(rules = ?rules.len(), "Inflection rules loaded");
    Ok(rules)
}

fn read_config(path: &Path) -> Result<String, SpangenError> {
    fs::read_to_string(path).map_err(|e| {
        error!(path = ?path, error = ?e, "Failed to read configuration file");
        config_error(path, format!("failed to read: {e}"))
    })
}

fn config_error(path: &Path, message: String) -> SpangenError {
    SpangenError::Config {
        path: path.display().to_string(),
        message,
    }
}
