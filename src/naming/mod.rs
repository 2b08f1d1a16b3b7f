//! Identifier derivation
//!
//! Case conversion, column-name escaping, Go reserved-name avoidance and
//! short-name synthesis. Everything here is a pure function of its input,
//! so generated identifiers are stable across runs.

pub mod inflector;

pub use inflector::{InflectionRule, Inflector};

use std::collections::HashSet;

/// Suffix appended to a short name that collides with something in scope
pub const NAME_CONFLICT_SUFFIX: &str = "z";

/// Spanner GoogleSQL reserved keywords. Columns with these names must be
/// quoted with backticks in generated queries.
const RESERVED_KEYWORDS: &[&str] = &[
    "ALL",
    "AND",
    "ANY",
    "ARRAY",
    "AS",
    "ASC",
    "ASSERT_ROWS_MODIFIED",
    "AT",
    "BETWEEN",
    "BY",
    "CASE",
    "CAST",
    "COLLATE",
    "CONTAINS",
    "CREATE",
    "CROSS",
    "CUBE",
    "CURRENT",
    "DEFAULT",
    "DEFINE",
    "DESC",
    "DISTINCT",
    "ELSE",
    "END",
    "ENUM",
    "ESCAPE",
    "EXCEPT",
    "EXCLUDE",
    "EXISTS",
    "EXTRACT",
    "FALSE",
    "FETCH",
    "FOLLOWING",
    "FOR",
    "FROM",
    "FULL",
    "GROUP",
    "GROUPING",
    "GROUPS",
    "HASH",
    "HAVING",
    "IF",
    "IGNORE",
    "IN",
    "INNER",
    "INTERSECT",
    "INTERVAL",
    "INTO",
    "IS",
    "JOIN",
    "LATERAL",
    "LEFT",
    "LIKE",
    "LIMIT",
    "LOOKUP",
    "MERGE",
    "NATURAL",
    "NEW",
    "NO",
    "NOT",
    "NULL",
    "NULLS",
    "OF",
    "ON",
    "OR",
    "ORDER",
    "OUTER",
    "OVER",
    "PARTITION",
    "PRECEDING",
    "PROTO",
    "RANGE",
    "RECURSIVE",
    "RESPECT",
    "RIGHT",
    "ROLLUP",
    "ROWS",
    "SELECT",
    "SET",
    "SOME",
    "STRUCT",
    "TABLESAMPLE",
    "THEN",
    "TO",
    "TREAT",
    "TRUE",
    "UNBOUNDED",
    "UNION",
    "UNNEST",
    "USING",
    "WHEN",
    "WHERE",
    "WINDOW",
    "WITH",
    "WITHIN",
];

/// Go keywords
const GO_KEYWORDS: &[&str] = &[
    "break",
    "case",
    "chan",
    "const",
    "continue",
    "default",
    "defer",
    "else",
    "fallthrough",
    "for",
    "func",
    "go",
    "goto",
    "if",
    "import",
    "interface",
    "map",
    "package",
    "range",
    "return",
    "select",
    "struct",
    "switch",
    "type",
    "var",
];

/// Package local names imported by the generated code. A short name equal
/// to one of these would shadow the import.
const IMPORTED_NAMES: &[&str] = &[
    "big", "civil", "codes", "context", "errors", "fmt", "iterator", "regexp", "spanner", "status",
    "strings", "time",
];

/// Replacements for parameter names that would collide with Go keywords
/// or predeclared identifiers.
const GO_RESERVED_NAMES: &[(&str, &str)] = &[
    ("break", "brk"),
    ("case", "cs"),
    ("chan", "chn"),
    ("const", "cnst"),
    ("continue", "cnt"),
    ("default", "def"),
    ("defer", "dfr"),
    ("else", "els"),
    ("fallthrough", "flthrough"),
    ("for", "fr"),
    ("func", "fn"),
    ("go", "goVal"),
    ("goto", "gt"),
    ("if", "ifVal"),
    ("import", "imp"),
    ("interface", "iface"),
    ("map", "mp"),
    ("package", "pkg"),
    ("range", "rnge"),
    ("return", "ret"),
    ("select", "slct"),
    ("struct", "strct"),
    ("switch", "swtch"),
    ("type", "typ"),
    ("var", "vr"),
    // predeclared types
    ("bool", "b"),
    ("byte", "byt"),
    ("error", "e"),
    ("float32", "f32"),
    ("float64", "f64"),
    ("int", "i"),
    ("int64", "i64"),
    ("rune", "r"),
    ("string", "str"),
    ("uint", "u"),
    ("uint64", "u64"),
];

/// Convert snake_case to CamelCase.
///
/// Only the first letter of each underscore separated word is touched, so
/// names that are already CamelCase pass through unchanged.
pub fn snake_to_camel(s: &str) -> String {
    s.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            }
        })
        .collect()
}

/// Convert CamelCase to snake_case.
///
/// Runs of capitals are kept together as one word: `UserID` becomes
/// `user_id` and `HTTPServer` becomes `http_server`.
pub fn camel_to_snake(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let boundary = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower);
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }

    out
}

/// Whether `name` is a GoogleSQL reserved keyword (case-insensitive)
pub fn is_reserved_keyword(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    RESERVED_KEYWORDS.contains(&upper.as_str())
}

/// Quote a column name with backticks when it is a reserved keyword
pub fn escape_column_name(name: &str) -> String {
    if is_reserved_keyword(name) {
        format!("`{name}`")
    } else {
        name.to_string()
    }
}

/// Substitute a Go keyword or predeclared identifier with a safe name.
pub fn safe_go_name(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    GO_RESERVED_NAMES
        .iter()
        .find(|(reserved, _)| *reserved == lower)
        .map(|(_, replacement)| (*replacement).to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Lower-camel parameter name for a CamelCase field name.
///
/// The first snake word is lowercased and the rest kept, so `UserID`
/// becomes `userID`. Reserved names are substituted.
pub fn param_name(field_name: &str) -> String {
    let snake = camel_to_snake(field_name);
    let first = snake.split('_').next().unwrap_or_default();
    let rest = field_name.get(first.len()..).unwrap_or_default();
    safe_go_name(&format!("{first}{rest}"))
}

/// Build a short variable name for a type.
///
/// Takes the first letter of each word of the snake form of `type_name`,
/// skipping `id`. If the result collides with a Go keyword, an imported
/// package name or any name in `scope`, [`NAME_CONFLICT_SUFFIX`] is added.
pub fn short_name(type_name: &str, scope: &[String]) -> String {
    let mut short: String = camel_to_snake(type_name)
        .split('_')
        .filter(|word| !word.is_empty() && *word != "id")
        .filter_map(|word| word.chars().next())
        .collect();

    if short.is_empty() {
        short = type_name
            .chars()
            .next()
            .map(|c| c.to_ascii_lowercase().to_string())
            .unwrap_or_else(|| "v".to_string());
    }

    let conflicts: HashSet<&str> = GO_KEYWORDS
        .iter()
        .chain(IMPORTED_NAMES.iter())
        .copied()
        .chain(scope.iter().map(String::as_str))
        .collect();

    if conflicts.contains(short.as_str()) {
        short.push_str(NAME_CONFLICT_SUFFIX);
    }

    short
}
