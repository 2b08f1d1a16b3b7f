//! Per-file import bookkeeping

use std::collections::{BTreeMap, HashMap};

use regex::Regex;
use serde::Serialize;
use tracing::trace;

use crate::error::SpangenError;
use crate::schema::Package;

/// Packages the built-in templates may refer to
pub const CANDIDATE_PACKAGES: &[&str] = &[
    "context",
    "errors",
    "fmt",
    "strings",
    "time",
    "math/big",
    "cloud.google.com/go/civil",
    "cloud.google.com/go/spanner",
    "google.golang.org/api/iterator",
    "google.golang.org/grpc/codes",
    "google.golang.org/grpc/status",
];

/// Rendered import lines, passed to the header template
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Imports {
    pub standard: Vec<String>,
    pub third_party: Vec<String>,
}

/// The packages imported by one output file.
///
/// A path is registered under exactly one local name and a local name
/// refers to exactly one path.
#[derive(Debug)]
pub struct PackageRegistry {
    file: String,
    by_path: BTreeMap<String, Package>,
    by_name: HashMap<String, String>,
}

impl PackageRegistry {
    pub fn new(file: &str) -> Self {
        Self {
            file: file.to_string(),
            by_path: BTreeMap::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn register(&mut self, package: &Package) -> Result<(), SpangenError> {
        let name = package.local_name();

        if let Some(existing) = self.by_path.get(&package.path) {
            if existing.local_name() != name {
                return Err(self.conflict(format!(
                    "package \"{}\" is imported as both '{}' and '{name}'",
                    package.path,
                    existing.local_name()
                )));
            }
            return Ok(());
        }
        if let Some(path) = self.by_name.get(name) {
            return Err(self.conflict(format!(
                "'{name}' refers to both \"{path}\" and \"{}\"",
                package.path
            )));
        }

        trace!(file = ?self.file, package = ?package.path, "Registered import");
        self.by_name.insert(name.to_string(), package.path.clone());
        self.by_path.insert(package.path.clone(), package.clone());
        Ok(())
    }

    /// Standard library imports first, each group ordered by path
    pub fn imports(&self) -> Imports {
        let (standard, third_party): (Vec<&Package>, Vec<&Package>) =
            self.by_path.values().partition(|p| p.is_standard());
        Imports {
            standard: standard.iter().map(|p| p.import_spec()).collect(),
            third_party: third_party.iter().map(|p| p.import_spec()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    fn conflict(&self, message: String) -> SpangenError {
        SpangenError::PackageConflict {
            file: self.file.clone(),
            message,
        }
    }
}

/// A package that may need importing, with the pattern that detects its
/// use as a qualifier, e.g. `spanner.Key`
#[derive(Debug, Clone)]
pub struct ImportCandidate {
    pub package: Package,
    qualifier: Regex,
}

impl ImportCandidate {
    /// Fails when the local name can never appear as a qualifier
    pub fn new(package: Package) -> Result<Self, SpangenError> {
        let name = package.local_name();
        let invalid = |message: String| SpangenError::InvalidPackage {
            path: package.path.clone(),
            message,
        };

        if !is_identifier(name) {
            return Err(invalid(format!(
                "local name '{name}' is not a Go identifier; set an alias"
            )));
        }
        let qualifier = Regex::new(&format!(r"(^|[^\w.]){}\.[A-Z]", regex::escape(name)))
            .map_err(|e| invalid(e.to_string()))?;

        Ok(Self { package, qualifier })
    }

    pub fn is_referenced(&self, source: &str) -> bool {
        self.qualifier.is_match(source)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imports_sorted_and_grouped() {
        let mut registry = PackageRegistry::new("user.yo.go");
        for path in [
            "google.golang.org/grpc/codes",
            "time",
            "cloud.google.com/go/spanner",
            "context",
        ] {
            registry.register(&Package::new(path)).unwrap();
        }
        // registering twice is harmless
        registry.register(&Package::new("time")).unwrap();

        assert_eq!(
            registry.imports(),
            Imports {
                standard: vec!["\"context\"".into(), "\"time\"".into()],
                third_party: vec![
                    "\"cloud.google.com/go/spanner\"".into(),
                    "\"google.golang.org/grpc/codes\"".into()
                ],
            }
        );
    }

    #[test]
    fn test_conflicting_local_name() {
        let mut registry = PackageRegistry::new("user.yo.go");
        registry.register(&Package::new("google.golang.org/grpc/status")).unwrap();
        let err = registry
            .register(&Package::new("example.com/other/status"))
            .unwrap_err();
        assert!(matches!(err, SpangenError::PackageConflict { file, .. } if file == "user.yo.go"));
    }

    #[test]
    fn test_conflicting_alias() {
        let mut registry = PackageRegistry::new("f.go");
        registry.register(&Package::new("math/big")).unwrap();
        assert!(registry
            .register(&Package::new("math/big").with_alias("bigmath"))
            .is_err());
    }

    #[test]
    fn test_is_referenced() {
        let spanner = ImportCandidate::new(Package::new("cloud.google.com/go/spanner")).unwrap();
        assert!(spanner.is_referenced("key := spanner.Key{id}"));
        assert!(spanner.is_referenced("[]spanner.NullString"));
        assert!(!spanner.is_referenced("// reads from spanner."));
        assert!(!spanner.is_referenced("myspanner.Key"));

        let time = ImportCandidate::new(Package::new("time")).unwrap();
        assert!(time.is_referenced("\tUpdatedAt time.Time"));
        assert!(!time.is_referenced("one row at a time.\n"));
    }

    #[test]
    fn test_aliased_candidate() {
        let big = ImportCandidate::new(Package::new("math/big").with_alias("bigmath")).unwrap();
        assert!(big.is_referenced("var n bigmath.Rat"));
        assert!(!big.is_referenced("var n big.Rat"));
    }

    #[test]
    fn test_unusable_local_name_is_an_error() {
        // the last path segment of a versioned module is not its package name
        let err = ImportCandidate::new(Package::new("gopkg.in/yaml.v3")).unwrap_err();
        assert!(
            matches!(&err, SpangenError::InvalidPackage { path, .. } if path == "gopkg.in/yaml.v3")
        );
        assert!(err.to_string().contains("yaml.v3"));

        assert!(ImportCandidate::new(Package::new("gopkg.in/yaml.v3").with_alias("yaml")).is_ok());
        assert!(ImportCandidate::new(Package::new("example.com/x").with_alias("")).is_err());
    }
}
