//! Spanner type mapping
//!
//! Maps a Spanner column type such as `STRING(32)` or `ARRAY<INT64>` to the
//! Go type used in generated code, together with the expression that
//! represents "no value" for that type.

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::error::SpangenError;
use crate::naming::snake_to_camel;

/// An importable Go package
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct Package {
    pub path: String,
    pub name: Option<String>,
    pub alias: Option<String>,
}

impl Package {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            name: None,
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    /// Identifier the package is referred to by inside a file
    pub fn local_name(&self) -> &str {
        self.alias
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or_else(|| self.path.rsplit('/').next().unwrap_or(&self.path))
    }

    /// Standard library packages have no dot in their path
    pub fn is_standard(&self) -> bool {
        !self.path.contains('.')
    }

    /// Import line, e.g. `"time"` or `yo "example.com/yo"`
    pub fn import_spec(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{alias} \"{}\"", self.path),
            None => format!("\"{}\"", self.path),
        }
    }
}

pub fn spanner_package() -> Package {
    Package::new("cloud.google.com/go/spanner")
}

pub fn civil_package() -> Package {
    Package::new("cloud.google.com/go/civil")
}

pub fn time_package() -> Package {
    Package::new("time")
}

pub fn big_package() -> Package {
    Package::new("math/big")
}

/// Go type of a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Plain {
        package: Option<Package>,
        type_expr: String,
        null_value: String,
        custom_type: Option<String>,
    },
    Array {
        element: Box<FieldType>,
        nullable: bool,
        custom_type: Option<String>,
    },
}

impl FieldType {
    fn plain(package: Option<Package>, type_expr: &str, null_value: &str) -> Self {
        FieldType::Plain {
            package,
            type_expr: type_expr.to_string(),
            null_value: null_value.to_string(),
            custom_type: None,
        }
    }

    /// Type expression derived from the Spanner type, ignoring any custom type
    pub fn base_type_expr(&self) -> String {
        match self {
            FieldType::Plain { type_expr, .. } => type_expr.clone(),
            FieldType::Array { element, .. } => format!("[]{}", element.type_expr()),
        }
    }

    /// Type expression used in generated code. A custom type shadows the
    /// derived one.
    pub fn type_expr(&self) -> String {
        match self.custom_type() {
            Some(custom) => custom.to_string(),
            None => self.base_type_expr(),
        }
    }

    /// Expression that writes "this field has no value"
    pub fn null_value(&self) -> String {
        match self {
            FieldType::Plain { null_value, .. } => null_value.clone(),
            FieldType::Array { nullable: true, .. } => "nil".to_string(),
            FieldType::Array { nullable: false, .. } => format!("{}{{}}", self.base_type_expr()),
        }
    }

    pub fn custom_type(&self) -> Option<&str> {
        match self {
            FieldType::Plain { custom_type, .. } | FieldType::Array { custom_type, .. } => {
                custom_type.as_deref()
            }
        }
    }

    pub fn set_custom_type(&mut self, custom: String) {
        match self {
            FieldType::Plain { custom_type, .. } | FieldType::Array { custom_type, .. } => {
                *custom_type = Some(custom);
            }
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, FieldType::Array { .. })
    }

    /// True for the `spanner.NullXxx` wrapper types, which carry a `Valid` flag
    pub fn is_null_wrapper(&self) -> bool {
        matches!(self, FieldType::Plain { type_expr, .. } if type_expr.starts_with("spanner.Null"))
    }

    /// Packages the type expression refers to
    pub fn packages(&self) -> Vec<&Package> {
        match self {
            FieldType::Plain { package, .. } => package.iter().collect(),
            FieldType::Array { element, .. } => element.packages(),
        }
    }
}

impl Serialize for FieldType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("FieldType", 7)?;
        state.serialize_field("name", &self.type_expr())?;
        state.serialize_field("base_name", &self.base_type_expr())?;
        state.serialize_field("null_value", &self.null_value())?;
        state.serialize_field("custom", &self.custom_type())?;
        state.serialize_field("is_array", &self.is_array())?;
        state.serialize_field("is_null_wrapper", &self.is_null_wrapper())?;
        let element = match self {
            FieldType::Array { element, .. } => Some(element.type_expr()),
            FieldType::Plain { .. } => None,
        };
        state.serialize_field("element", &element)?;
        state.end()
    }
}

/// Result of mapping a Spanner type
#[derive(Debug, Clone, PartialEq)]
pub struct SpannerType {
    /// Declared length, -1 for MAX or types without a length
    pub len: i64,
    pub field_type: FieldType,
}

/// Map a Spanner type string to its Go representation.
pub fn map_spanner_type(data_type: &str, nullable: bool) -> Result<SpannerType, SpangenError> {
    let data_type = data_type.trim();
    let upper = data_type.to_ascii_uppercase();

    if upper.starts_with("ARRAY<") {
        let inner = upper
            .strip_prefix("ARRAY<")
            .and_then(|rest| rest.strip_suffix('>'))
            .ok_or_else(|| invalid(data_type, "unterminated ARRAY type"))?;
        // keep the original casing of the element for user types
        let inner = &data_type[6..6 + inner.len()];
        let element = map_spanner_type(inner, false)?.field_type;
        return Ok(SpannerType {
            len: -1,
            field_type: FieldType::Array {
                element: Box::new(element),
                nullable,
                custom_type: None,
            },
        });
    }

    let (base, len) = split_length(data_type)?;
    let spanner = Some(spanner_package());

    let field_type = match (base.to_ascii_uppercase().as_str(), nullable) {
        ("BOOL", false) => FieldType::plain(None, "bool", "false"),
        ("BOOL", true) => FieldType::plain(spanner, "spanner.NullBool", "spanner.NullBool{}"),
        ("STRING", false) => FieldType::plain(None, "string", "\"\""),
        ("STRING", true) => {
            FieldType::plain(spanner, "spanner.NullString", "spanner.NullString{}")
        }
        ("INT64", false) => FieldType::plain(None, "int64", "0"),
        ("INT64", true) => FieldType::plain(spanner, "spanner.NullInt64", "spanner.NullInt64{}"),
        ("FLOAT32", false) => FieldType::plain(None, "float32", "0.0"),
        ("FLOAT32", true) => {
            FieldType::plain(spanner, "spanner.NullFloat32", "spanner.NullFloat32{}")
        }
        ("FLOAT64", false) => FieldType::plain(None, "float64", "0.0"),
        ("FLOAT64", true) => {
            FieldType::plain(spanner, "spanner.NullFloat64", "spanner.NullFloat64{}")
        }
        ("NUMERIC", false) => FieldType::plain(Some(big_package()), "big.Rat", "big.Rat{}"),
        ("NUMERIC", true) => {
            FieldType::plain(spanner, "spanner.NullNumeric", "spanner.NullNumeric{}")
        }
        ("BYTES", _) => FieldType::plain(None, "[]byte", "nil"),
        ("TIMESTAMP", false) => FieldType::plain(Some(time_package()), "time.Time", "time.Time{}"),
        ("TIMESTAMP", true) => FieldType::plain(spanner, "spanner.NullTime", "spanner.NullTime{}"),
        ("DATE", false) => FieldType::plain(Some(civil_package()), "civil.Date", "civil.Date{}"),
        ("DATE", true) => FieldType::plain(spanner, "spanner.NullDate", "spanner.NullDate{}"),
        ("JSON", _) => FieldType::plain(spanner, "spanner.NullJSON", "spanner.NullJSON{}"),
        _ => {
            let name = snake_to_camel(base);
            let null_value = format!("{name}{{}}");
            FieldType::plain(None, &name, &null_value)
        }
    };

    Ok(SpannerType { len, field_type })
}

/// Flattened form of [`map_spanner_type`]: `(len, null value, type)`
pub fn parse_spanner_type(
    data_type: &str,
    nullable: bool,
) -> Result<(i64, String, String), SpangenError> {
    let mapped = map_spanner_type(data_type, nullable)?;
    Ok((
        mapped.len,
        mapped.field_type.null_value(),
        mapped.field_type.type_expr(),
    ))
}

/// Compatibility check between a Spanner type and a configured custom
/// type. Every combination is accepted; callers can install a stricter
/// check on the loader.
pub fn validate_custom_type(_data_type: &str, _custom_type: &str) -> bool {
    true
}

/// Split `STRING(32)` into (`STRING`, 32); `MAX` and no length give -1
fn split_length(data_type: &str) -> Result<(&str, i64), SpangenError> {
    let Some(open) = data_type.find('(') else {
        return Ok((data_type, -1));
    };
    let arg = data_type[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| invalid(data_type, "unterminated length"))?
        .trim();
    let base = data_type[..open].trim();

    if arg.eq_ignore_ascii_case("MAX") {
        return Ok((base, -1));
    }
    let len = arg
        .parse::<i64>()
        .map_err(|e| invalid(data_type, &format!("invalid length '{arg}': {e}")))?;
    Ok((base, len))
}

fn invalid(data_type: &str, message: &str) -> SpangenError {
    SpangenError::InvalidType {
        data_type: data_type.to_string(),
        message: message.to_string(),
    }
}
