//! Functions available to every template
//!
//! Field arguments are the serialized [`Field`](crate::schema::Field)
//! values the templates iterate over. Trailing "ignore" arguments accept
//! names or field lists; a field is ignored when its `name` matches.

use std::collections::HashSet;
use std::sync::Arc;

use minijinja::value::{Rest, Value, ValueKind};
use minijinja::{Environment, Error, ErrorKind};

use crate::naming::{self, Inflector};

/// Go predeclared types that never take the custom type package prefix
const BUILTIN_TYPES: &[&str] = &[
    "bool",
    "byte",
    "complex64",
    "complex128",
    "error",
    "float32",
    "float64",
    "int",
    "int8",
    "int16",
    "int32",
    "int64",
    "rune",
    "string",
    "uint",
    "uint8",
    "uint16",
    "uint32",
    "uint64",
    "uintptr",
    "interface{}",
    "any",
];

/// The parts of a serialized field the functions read
#[derive(Debug, Clone, PartialEq)]
struct FieldArg {
    name: String,
    column_name: String,
    type_name: String,
    base_type_name: String,
    is_not_null: bool,
    is_array: bool,
    is_null_wrapper: bool,
    is_custom: bool,
}

fn attr_str(value: &Value, attr: &str) -> Result<String, Error> {
    let v = value.get_attr(attr)?;
    v.as_str().map(str::to_string).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("expected a field with a string '{attr}', got {value}"),
        )
    })
}

fn field_arg(value: &Value) -> Result<FieldArg, Error> {
    let field_type = value.get_attr("type")?;
    Ok(FieldArg {
        name: attr_str(value, "name")?,
        column_name: attr_str(value, "column_name")?,
        type_name: attr_str(&field_type, "name")?,
        base_type_name: attr_str(&field_type, "base_name")?,
        is_not_null: value.get_attr("is_not_null")?.is_true(),
        is_array: field_type.get_attr("is_array")?.is_true(),
        is_null_wrapper: field_type.get_attr("is_null_wrapper")?.is_true(),
        is_custom: !field_type.get_attr("custom")?.is_none()
            && !field_type.get_attr("custom")?.is_undefined(),
    })
}

fn field_args(value: &Value) -> Result<Vec<FieldArg>, Error> {
    value.try_iter()?.map(|v| field_arg(&v)).collect()
}

/// Names to leave out: strings are taken as-is, fields by their `name`
fn ignore_names(ignore: &[Value]) -> Result<HashSet<String>, Error> {
    let mut names = HashSet::new();
    for value in ignore {
        collect_names(value, &mut names)?;
    }
    Ok(names)
}

fn collect_names(value: &Value, names: &mut HashSet<String>) -> Result<(), Error> {
    match value.kind() {
        ValueKind::Undefined | ValueKind::None => {}
        ValueKind::String => {
            names.insert(value.as_str().unwrap_or_default().to_string());
        }
        ValueKind::Seq | ValueKind::Iterable => {
            for item in value.try_iter()? {
                collect_names(&item, names)?;
            }
        }
        ValueKind::Map => {
            names.insert(attr_str(value, "name")?);
        }
        _ => {
            return Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("cannot ignore {value}: expected a name or fields"),
            ))
        }
    }
    Ok(())
}

fn kept(fields: &Value, ignore: &[Value]) -> Result<Vec<FieldArg>, Error> {
    let ignore = ignore_names(ignore)?;
    Ok(field_args(fields)?
        .into_iter()
        .filter(|f| !ignore.contains(&f.name))
        .collect())
}

/// `Id, Value`
fn colnames(fields: Value, ignore: Rest<Value>) -> Result<String, Error> {
    Ok(kept(&fields, &ignore)?
        .iter()
        .map(|f| f.column_name.as_str())
        .collect::<Vec<_>>()
        .join(", "))
}

/// Like `colnames`, quoting reserved words
fn escapedcolnames(fields: Value, ignore: Rest<Value>) -> Result<String, Error> {
    Ok(kept(&fields, &ignore)?
        .iter()
        .map(|f| naming::escape_column_name(&f.column_name))
        .collect::<Vec<_>>()
        .join(", "))
}

/// `@param0, @param1`
fn colvals(fields: Value, ignore: Rest<Value>) -> Result<String, Error> {
    let count = kept(&fields, &ignore)?.len();
    Ok((0..count)
        .map(|i| format!("@param{i}"))
        .collect::<Vec<_>>()
        .join(", "))
}

/// `Id = @param0 AND Value = @param1`
fn colnamesquery(fields: Value, sep: String, ignore: Rest<Value>) -> Result<String, Error> {
    Ok(kept(&fields, &ignore)?
        .iter()
        .enumerate()
        .map(|(i, f)| format!("{} = @param{i}", naming::escape_column_name(&f.column_name)))
        .collect::<Vec<_>>()
        .join(&sep))
}

/// `t.Id, t.Value` using column names
fn colprefixnames(fields: Value, prefix: String, ignore: Rest<Value>) -> Result<String, Error> {
    Ok(kept(&fields, &ignore)?
        .iter()
        .map(|f| format!("{prefix}.{}", naming::escape_column_name(&f.column_name)))
        .collect::<Vec<_>>()
        .join(", "))
}

/// `u.Id, u.Value` using field names
fn fieldnames(fields: Value, prefix: String, ignore: Rest<Value>) -> Result<String, Error> {
    Ok(kept(&fields, &ignore)?
        .iter()
        .map(|f| format!("{prefix}.{}", f.name))
        .collect::<Vec<_>>()
        .join(", "))
}

fn colcount(fields: Value, ignore: Rest<Value>) -> Result<usize, Error> {
    Ok(kept(&fields, &ignore)?.len())
}

fn columncount(fields: Value) -> Result<usize, Error> {
    Ok(field_args(&fields)?.len())
}

/// Fields that carry a configured custom type
fn customfieldcount(fields: Value) -> Result<usize, Error> {
    Ok(field_args(&fields)?.iter().filter(|f| f.is_custom).count())
}

/// First parameter index after the non-key fields
fn getstartcount(fields: Value, primary_key_fields: Value) -> Result<usize, Error> {
    let total = field_args(&fields)?.len();
    let keys = field_args(&primary_key_fields)?.len();
    Ok(total.saturating_sub(keys))
}

fn hascolumn(fields: Value, column: String) -> Result<bool, Error> {
    Ok(field_args(&fields)?.iter().any(|f| f.column_name == column))
}

fn hasfield(fields: Value, name: String) -> Result<bool, Error> {
    Ok(field_args(&fields)?.iter().any(|f| f.name == name))
}

fn paramname(name: String) -> String {
    naming::param_name(&name)
}

fn escapedcolname(column: String) -> String {
    naming::escape_column_name(&column)
}

/// Go expression that is true when the parameter for `field` holds NULL.
///
/// Decided by the type the Spanner column maps to, so a custom type defined
/// over `spanner.NullString` still exposes `Valid`.
fn nullcheck(field: Value) -> Result<String, Error> {
    let field = field_arg(&field)?;
    let param = naming::param_name(&field.name);
    Ok(if field.is_null_wrapper {
        format!("!{param}.Valid")
    } else if (field.is_array && !field.is_not_null) || field.base_type_name == "[]byte" {
        format!("{param} == nil")
    } else {
        "false".to_string()
    })
}

/// Parameter list for `fields`, e.g. `userID int64, name string`
fn goparamlist(
    custom_type_package: &str,
    fields: Value,
    add_leading_comma: bool,
    with_types: bool,
    ignore: Rest<Value>,
) -> Result<String, Error> {
    let params: Vec<String> = kept(&fields, &ignore)?
        .iter()
        .map(|f| {
            let name = naming::param_name(&f.name);
            if with_types {
                format!("{name} {}", retype(custom_type_package, &f.type_name))
            } else {
                name
            }
        })
        .collect();

    if params.is_empty() {
        return Ok(String::new());
    }
    let list = params.join(", ");
    Ok(if add_leading_comma {
        format!(", {list}")
    } else {
        list
    })
}

/// Split leading `[]` and `*` off a type expression
fn split_type_prefix(expr: &str) -> (&str, &str) {
    let base = expr.trim_start_matches(|c: char| c == '[' || c == ']' || c == '*');
    (&expr[..expr.len() - base.len()], base)
}

/// Qualify a bare, non-builtin type with the custom type package
pub fn retype(custom_type_package: &str, type_expr: &str) -> String {
    if custom_type_package.is_empty() || type_expr.contains('.') {
        return type_expr.to_string();
    }
    let (prefix, base) = split_type_prefix(type_expr);
    if base.is_empty() || BUILTIN_TYPES.contains(&base) {
        return type_expr.to_string();
    }
    format!("{prefix}{custom_type_package}.{base}")
}

/// `retype` for a null value expression such as `Status{}`
pub fn reniltype(custom_type_package: &str, null_value: &str) -> String {
    match null_value.strip_suffix("{}") {
        Some(type_expr) => format!("{}{{}}", retype(custom_type_package, type_expr)),
        None => null_value.to_string(),
    }
}

/// Register every function on `env`
pub fn register(
    env: &mut Environment<'static>,
    inflector: Arc<Inflector>,
    custom_type_package: &str,
) {
    env.add_function("colnames", colnames);
    env.add_function("escapedcolnames", escapedcolnames);
    env.add_function("colvals", colvals);
    env.add_function("colnamesquery", colnamesquery);
    env.add_function("colprefixnames", colprefixnames);
    env.add_function("fieldnames", fieldnames);
    env.add_function("colcount", colcount);
    env.add_function("columncount", columncount);
    env.add_function("customfieldcount", customfieldcount);
    env.add_function("getstartcount", getstartcount);
    env.add_function("hascolumn", hascolumn);
    env.add_function("hasfield", hasfield);
    env.add_function("paramname", paramname);
    env.add_function("escapedcolname", escapedcolname);
    env.add_function("nullcheck", nullcheck);

    let package = custom_type_package.to_string();
    env.add_function(
        "goparamlist",
        move |fields: Value, add_leading_comma: bool, with_types: bool, ignore: Rest<Value>| {
            goparamlist(&package, fields, add_leading_comma, with_types, ignore)
        },
    );
    let package = custom_type_package.to_string();
    env.add_function("retype", move |type_expr: String| retype(&package, &type_expr));
    let package = custom_type_package.to_string();
    env.add_function("reniltype", move |null_value: String| {
        reniltype(&package, &null_value)
    });

    env.add_function("shortname", |type_name: String, scope: Rest<Value>| {
        shortname(&type_name, &scope)
    });
    env.add_function("pluralize", move |word: String| inflector.pluralize(&word));
}

/// Scope strings are taken as-is; fields contribute their parameter names
fn shortname(type_name: &str, scope: &[Value]) -> Result<String, Error> {
    let mut names = Vec::new();
    for value in scope {
        match value.kind() {
            ValueKind::String => names.push(value.as_str().unwrap_or_default().to_string()),
            ValueKind::Seq | ValueKind::Iterable => {
                for field in field_args(value)? {
                    names.push(naming::param_name(&field.name));
                }
            }
            ValueKind::Undefined | ValueKind::None => {}
            _ => {
                return Err(Error::new(
                    ErrorKind::InvalidOperation,
                    format!("invalid shortname scope {value}"),
                ))
            }
        }
    }
    Ok(naming::short_name(type_name, &names))
}
