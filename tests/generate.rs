//! End-to-end generation with the built-in templates

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use spangen::codegen::{
    write_templates, CodeGenConfig, CodeGenerator, GoGenerator, ModuleRegistry, NoopFormatter,
};
use spangen::config::CustomTypes;
use spangen::error::SpangenError;
use spangen::introspect::DdlSource;
use spangen::loader::SchemaLoader;
use spangen::naming::Inflector;
use spangen::schema::Schema;

const DDL: &str = r#"
CREATE TABLE Singers (
    SingerId INT64 NOT NULL,
    FirstName STRING(1024),
    LastName STRING(1024) NOT NULL,
    Status INT64 NOT NULL,
    Tags ARRAY<STRING(16)>,
    Birthday DATE,
    UpdatedAt TIMESTAMP NOT NULL OPTIONS (allow_commit_timestamp = true),
) PRIMARY KEY(SingerId);

CREATE TABLE Albums (
    SingerId INT64 NOT NULL,
    AlbumId INT64 NOT NULL,
    Title STRING(MAX) NOT NULL,
    Price NUMERIC NOT NULL,
) PRIMARY KEY(SingerId, AlbumId),
  INTERLEAVE IN PARENT Singers ON DELETE CASCADE;

CREATE UNIQUE INDEX SingersByName ON Singers(LastName, FirstName);
CREATE INDEX AlbumsByTitle ON Albums(Title) STORING (Price);
"#;

fn load(inflector: &Inflector) -> Schema {
    let mut source = DdlSource::parse(DDL).unwrap();
    let mut custom_types = CustomTypes::default();
    custom_types.insert("Singers", "Status", "SingerStatus");
    SchemaLoader::new(&mut source, inflector)
        .with_custom_types(custom_types)
        .load_schema()
        .unwrap()
}

fn generate(out: &Path, modules: ModuleRegistry) -> Result<Vec<PathBuf>, SpangenError> {
    let inflector = Arc::new(Inflector::default());
    let schema = load(&inflector);
    let config = CodeGenConfig::new(out.to_path_buf())
        .with_package("models")
        .with_custom_type_package("custom");
    GoGenerator::new(modules, inflector)
        .with_formatter(Box::new(NoopFormatter))
        .generate(&schema, &config)
}

fn read(dir: &Path, name: &str) -> String {
    fs::read_to_string(dir.join(name)).unwrap()
}

#[test]
fn library_mode_writes_one_file_per_type_and_global() {
    let dir = TempDir::new().unwrap();
    let written = generate(dir.path(), ModuleRegistry::builtin()).unwrap();

    let mut names: Vec<_> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["album.yo.go", "singer.yo.go", "yo_db.yo.go", "yo_package.yo.go"]
    );

    // no workspace left behind
    let entries: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries.len(), 4, "{entries:?}");
}

#[test]
fn type_file_content() {
    let dir = TempDir::new().unwrap();
    generate(dir.path(), ModuleRegistry::builtin()).unwrap();
    let singer = read(dir.path(), "singer.yo.go");

    assert!(singer.starts_with("// Code generated by spangen. DO NOT EDIT.\n"));
    assert!(singer.contains("package models\n"));
    assert!(singer.contains("type Singer struct {"));
    assert!(singer.contains("SingerId int64 `spanner:\"SingerId\""));
    assert!(singer.contains("FirstName spanner.NullString `spanner:\"FirstName\""));
    assert!(singer.contains("Tags []string `spanner:\"Tags\""));
    assert!(singer.contains("Status custom.SingerStatus `spanner:\"Status\""));
    assert!(singer.contains("func FindSinger(ctx context.Context, db YORODB, singerId int64) (*Singer, error) {"));

    // unique index finder returns one row; nullable key columns may be NULL
    assert!(singer.contains(
        "func FindSingerBySingersByName(ctx context.Context, db YORODB, lastName string, firstName spanner.NullString) (*Singer, error) {"
    ));
    assert!(singer.contains("@{FORCE_INDEX=SingersByName}"));
    assert!(singer.contains("WHERE LastName = @param0 AND FirstName = @param1"));
    assert!(singer.contains("if !firstName.Valid {"));
    assert!(singer.contains("func ReadSingerBySingersByName(ctx context.Context, db YORODB, keys spanner.KeySet) ([]*Singer, error) {"));

    // index chunks sort ahead of the type chunk
    let index_at = singer.find("func FindSingerBySingersByName").unwrap();
    let type_at = singer.find("type Singer struct").unwrap();
    assert!(index_at < type_at);
}

#[test]
fn imports_follow_usage() {
    let dir = TempDir::new().unwrap();
    generate(dir.path(), ModuleRegistry::builtin()).unwrap();

    let singer = read(dir.path(), "singer.yo.go");
    let imports = &singer[singer.find("import (").unwrap()..singer.find(")\n").unwrap()];
    assert_eq!(
        imports,
        "import (\n\t\"context\"\n\t\"fmt\"\n\t\"strings\"\n\t\"time\"\n\n\t\"cloud.google.com/go/spanner\"\n\t\"google.golang.org/api/iterator\"\n\t\"google.golang.org/grpc/codes\"\n"
    );

    // no index with nullable keys, no strings; NUMERIC pulls in math/big
    let album = read(dir.path(), "album.yo.go");
    assert!(album.contains("\t\"math/big\"\n"));
    assert!(!album.contains("\"strings\""));
    assert!(album.contains("func FindAlbumsByAlbumsByTitle(ctx context.Context, db YORODB, title string) ([]*Album, error) {"));

    let package = read(dir.path(), "yo_package.yo.go");
    assert!(package.contains("\t\"errors\"\n"));
    assert!(package.contains("\t\"google.golang.org/grpc/status\"\n"));

    let db = read(dir.path(), "yo_db.yo.go");
    assert!(db.contains("type YORODB interface {"));
}

#[test]
fn runs_are_deterministic() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    generate(first.path(), ModuleRegistry::builtin()).unwrap();
    generate(second.path(), ModuleRegistry::builtin()).unwrap();

    for name in ["album.yo.go", "singer.yo.go", "yo_db.yo.go", "yo_package.yo.go"] {
        assert_eq!(read(first.path(), name), read(second.path(), name), "{name}");
    }
}

#[test]
fn single_file_mode() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("models.go");
    let written = generate(&out, ModuleRegistry::builtin()).unwrap();
    assert_eq!(written, vec![out.clone()]);

    let source = fs::read_to_string(&out).unwrap();
    assert_eq!(source.matches("// Code generated by spangen").count(), 1);
    assert_eq!(source.matches("\npackage models\n").count(), 1);
    assert!(source.contains("type Album struct {"));
    assert!(source.contains("type Singer struct {"));
    assert!(source.contains("type YODB interface {"));
    assert!(source.find("type Album struct").unwrap() < source.find("type Singer struct").unwrap());
}

#[test]
fn template_overrides() {
    let templates = TempDir::new().unwrap();
    write_templates(templates.path()).unwrap();
    fs::write(
        templates.path().join("type.go.jinja"),
        "// {{ type.name }} has {{ columncount(type.fields) }} columns\n",
    )
    .unwrap();

    let dir = TempDir::new().unwrap();
    let modules = ModuleRegistry::with_overrides(templates.path()).unwrap();
    generate(dir.path(), modules).unwrap();

    let album = read(dir.path(), "album.yo.go");
    assert!(album.contains("// Album has 4 columns\n"));
    assert!(!album.contains("type Album struct"));
}

#[test]
fn broken_template_leaves_output_untouched() {
    let templates = TempDir::new().unwrap();
    fs::write(templates.path().join("index.go.jinja"), "{{ type.no_such_attribute }}").unwrap();

    let dir = TempDir::new().unwrap();
    let modules = ModuleRegistry::with_overrides(templates.path()).unwrap();
    let err = generate(dir.path(), modules).unwrap_err();
    assert!(matches!(err, SpangenError::Template { module, .. } if module == "index"));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}
