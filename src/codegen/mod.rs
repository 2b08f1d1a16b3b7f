//! Code generation
//!
//! Renders the template modules against a loaded [`Schema`] and writes
//! the results as Go source files. Rendered chunks are buffered per output
//! file, written into a temporary workspace inside the output directory,
//! formatted, and only then renamed into place; a failed run leaves the
//! output directory untouched.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use minijinja::{Environment, UndefinedBehavior, Value};
use serde::Serialize;
use tracing::{debug, error, info, trace};

use crate::error::SpangenError;
use crate::naming::Inflector;
use crate::schema::{Package, Schema, Type};

pub mod format;
pub mod funcs;
pub mod module;
pub mod package;

pub use format::{CommandFormatter, Formatter, NoopFormatter};
pub use module::{write_templates, Module, ModuleKind, ModuleRegistry};
pub use package::{ImportCandidate, Imports, PackageRegistry};

pub const DEFAULT_SUFFIX: &str = ".yo.go";
pub const DEFAULT_FILE_MODE: u32 = 0o666;

/// Layout of the generated files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// One file per type plus one per global module
    #[default]
    Library,
    /// Everything in a single file
    SingleFile,
}

impl OutputMode {
    /// A path ending in `.go` names a single output file
    pub fn for_path(path: &Path) -> Self {
        match path.extension() {
            Some(ext) if ext == "go" => OutputMode::SingleFile,
            _ => OutputMode::Library,
        }
    }
}

/// Configuration for code generation
#[derive(Debug, Clone)]
pub struct CodeGenConfig {
    /// Output directory, or file in single file mode
    pub output_path: PathBuf,
    pub output_mode: OutputMode,
    /// Appended to the lowercased type or module name
    pub suffix: String,
    /// Go package clause
    pub package: String,
    /// Emitted as a `//go:build` constraint when not empty
    pub build_tag: String,
    /// Package that bare custom type names live in
    pub custom_type_package: String,
    /// Permission bits of the written files
    pub file_mode: u32,
}

impl CodeGenConfig {
    pub fn new(output_path: PathBuf) -> Self {
        let output_mode = OutputMode::for_path(&output_path);
        let package = default_package(&output_path, output_mode);
        Self {
            output_path,
            output_mode,
            suffix: DEFAULT_SUFFIX.to_string(),
            package,
            build_tag: String::new(),
            custom_type_package: String::new(),
            file_mode: DEFAULT_FILE_MODE,
        }
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.suffix = suffix.to_string();
        self
    }

    pub fn with_package(mut self, package: &str) -> Self {
        self.package = package.to_string();
        self
    }

    pub fn with_build_tag(mut self, build_tag: &str) -> Self {
        self.build_tag = build_tag.to_string();
        self
    }

    pub fn with_custom_type_package(mut self, package: &str) -> Self {
        self.custom_type_package = package.to_string();
        self
    }

    pub fn with_file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }

    /// Directory the files are written to
    pub fn output_dir(&self) -> PathBuf {
        match self.output_mode {
            OutputMode::Library => self.output_path.clone(),
            OutputMode::SingleFile => match self.output_path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            },
        }
    }

    /// Output file for a type or global module named `name`
    pub fn file_name_for(&self, name: &str) -> String {
        match self.output_mode {
            OutputMode::Library => format!("{}{}", name.to_lowercase(), self.suffix),
            OutputMode::SingleFile => self
                .output_path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("models{}", self.suffix)),
        }
    }
}

/// Last directory component, as a Go package name
fn default_package(output_path: &Path, mode: OutputMode) -> String {
    let dir = match mode {
        OutputMode::Library => Some(output_path),
        OutputMode::SingleFile => output_path.parent(),
    };
    let name: String = dir
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        "models".to_string()
    } else {
        name
    }
}

/// Trait for code generators
pub trait CodeGenerator {
    /// Generate code for the given schema, returning the written paths
    fn generate(&self, schema: &Schema, config: &CodeGenConfig)
        -> Result<Vec<PathBuf>, SpangenError>;
}

/// One rendered template body
#[derive(Debug, Clone, PartialEq, Eq)]
struct TBuf {
    name: String,
    subname: String,
    body: String,
}

/// Everything that goes into one output file
#[derive(Debug, Default)]
struct FileBuffer {
    chunks: Vec<TBuf>,
    header: String,
    temp_path: PathBuf,
}

/// Context of global and header modules
#[derive(Serialize)]
struct DataSet<'a> {
    build_tag: &'a str,
    package: &'a str,
    schema: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    imports: Option<&'a Imports>,
}

/// Context of per-type modules
#[derive(Serialize)]
struct TypeData<'a> {
    build_tag: &'a str,
    package: &'a str,
    schema: &'a Value,
    #[serde(rename = "type")]
    typ: &'a Type,
}

/// Go generator driven by a [`ModuleRegistry`]
pub struct GoGenerator {
    modules: ModuleRegistry,
    inflector: Arc<Inflector>,
    formatter: Box<dyn Formatter>,
}

impl GoGenerator {
    /// Formats with `gofmt` unless another formatter is set
    pub fn new(modules: ModuleRegistry, inflector: Arc<Inflector>) -> Self {
        Self {
            modules,
            inflector,
            formatter: Box::new(CommandFormatter::gofmt()),
        }
    }

    pub fn with_formatter(mut self, formatter: Box<dyn Formatter>) -> Self {
        self.formatter = formatter;
        self
    }

    fn environment(&self, config: &CodeGenConfig) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        funcs::register(&mut env, self.inflector.clone(), &config.custom_type_package);
        env
    }

    /// Render every module into per-file chunks
    fn render_chunks(
        &self,
        env: &Environment<'static>,
        schema: &Schema,
        schema_value: &Value,
        config: &CodeGenConfig,
    ) -> Result<BTreeMap<String, FileBuffer>, SpangenError> {
        let mut buffers: BTreeMap<String, FileBuffer> = BTreeMap::new();

        for module in self.modules.of_kind(ModuleKind::PerType) {
            let source = load_source(module)?;
            for typ in &schema.types {
                let ctx = TypeData {
                    build_tag: &config.build_tag,
                    package: &config.package,
                    schema: schema_value,
                    typ,
                };
                let body = render(env, module.name(), &source, ctx)?;
                trace!(module = ?module.name(), type_name = ?typ.name, bytes = ?body.len(), "Rendered");
                buffers
                    .entry(config.file_name_for(&typ.name))
                    .or_default()
                    .chunks
                    .push(TBuf {
                        name: typ.name.clone(),
                        subname: module.name().to_string(),
                        body,
                    });
            }
        }

        for module in self.modules.of_kind(ModuleKind::Global) {
            let source = load_source(module)?;
            let ctx = DataSet {
                build_tag: &config.build_tag,
                package: &config.package,
                schema: schema_value,
                file_name: None,
                imports: None,
            };
            let body = render(env, module.name(), &source, ctx)?;
            trace!(module = ?module.name(), bytes = ?body.len(), "Rendered");
            buffers
                .entry(config.file_name_for(module.name()))
                .or_default()
                .chunks
                .push(TBuf {
                    name: module.name().to_string(),
                    subname: String::new(),
                    body,
                });
        }

        Ok(buffers)
    }
}

impl CodeGenerator for GoGenerator {
    fn generate(
        &self,
        schema: &Schema,
        config: &CodeGenConfig,
    ) -> Result<Vec<PathBuf>, SpangenError> {
        let output_dir = config.output_dir();
        info!(
            output = ?config.output_path,
            mode = ?config.output_mode,
            package = ?config.package,
            types = ?schema.types.len(),
            "Generating Go code"
        );

        let candidates = candidate_packages(schema)?;

        // a failed run removes whatever directories it created
        let created = outermost_missing(&output_dir);
        fs::create_dir_all(&output_dir)?;
        let result = self.emit(schema, config, &output_dir, &candidates);
        if let (Err(_), Some(created)) = (&result, &created) {
            debug!(path = ?created, "Removing output directory after failed run");
            if let Err(e) = fs::remove_dir_all(created) {
                error!(path = ?created, error = ?e, "Failed to remove output directory");
            }
        }
        result
    }
}

impl GoGenerator {
    /// Render, format and move every file into `output_dir`
    fn emit(
        &self,
        schema: &Schema,
        config: &CodeGenConfig,
        output_dir: &Path,
        candidates: &[ImportCandidate],
    ) -> Result<Vec<PathBuf>, SpangenError> {
        // inside the output directory so the final rename stays on one filesystem
        let workspace = tempfile::Builder::new()
            .prefix(".spangen-")
            .tempdir_in(output_dir)?;
        debug!(workspace = ?workspace.path(), "Created workspace");

        let env = self.environment(config);
        let schema_value = Value::from_serialize(schema);
        let mut buffers = self.render_chunks(&env, schema, &schema_value, config)?;

        let header = self.modules.header();
        let header_source = load_source(header)?;

        for (file_name, buffer) in &mut buffers {
            buffer
                .chunks
                .sort_by(|a, b| (&a.name, &a.subname).cmp(&(&b.name, &b.subname)));
            buffer.chunks.retain(|c| !c.body.trim().is_empty());

            let imports = resolve_imports(file_name, candidates, &buffer.chunks)?;
            let ctx = DataSet {
                build_tag: &config.build_tag,
                package: &config.package,
                schema: &schema_value,
                file_name: Some(file_name.as_str()),
                imports: Some(&imports),
            };
            buffer.header = render(&env, header.name(), &header_source, ctx)?;

            buffer.temp_path = workspace.path().join(file_name);
            fs::write(&buffer.temp_path, assemble(buffer))
                .map_err(|e| SpangenError::emission(file_name, format!("failed to write temp file: {e}")))?;
            debug!(file = ?file_name, chunks = ?buffer.chunks.len(), "Buffered file");
        }

        for (file_name, buffer) in &buffers {
            let source = fs::read(&buffer.temp_path)
                .map_err(|e| SpangenError::emission(file_name, format!("failed to read temp file: {e}")))?;
            let formatted = self.formatter.format(&buffer.temp_path, &source)?;
            fs::write(&buffer.temp_path, formatted)
                .map_err(|e| SpangenError::emission(file_name, format!("failed to write temp file: {e}")))?;
            set_mode(&buffer.temp_path, config.file_mode)
                .map_err(|e| SpangenError::emission(file_name, format!("failed to set permissions: {e}")))?;
        }

        let mut written = Vec::with_capacity(buffers.len());
        for (file_name, buffer) in &buffers {
            let destination = output_dir.join(file_name);
            fs::rename(&buffer.temp_path, &destination)
                .map_err(|e| SpangenError::emission(file_name, format!("failed to rename: {e}")))?;
            debug!(path = ?destination, "Wrote file");
            written.push(destination);
        }

        workspace
            .close()
            .map_err(|e| SpangenError::emission(".spangen workspace", e.to_string()))?;
        info!(files = ?written.len(), "Code generation complete");
        Ok(written)
    }
}

fn load_source(module: &dyn Module) -> Result<String, SpangenError> {
    String::from_utf8(module.load()?).map_err(|e| SpangenError::Template {
        module: module.name().to_string(),
        message: format!("template is not valid UTF-8: {e}"),
    })
}

fn render<S: Serialize>(
    env: &Environment<'static>,
    module: &str,
    source: &str,
    ctx: S,
) -> Result<String, SpangenError> {
    env.render_named_str(module, source, ctx)
        .map_err(|e| SpangenError::Template {
            module: module.to_string(),
            message: format!("{e:#}"),
        })
}

/// Candidate imports: the packages the built-in templates use plus every
/// package a field type refers to, ordered by path
fn candidate_packages(schema: &Schema) -> Result<Vec<ImportCandidate>, SpangenError> {
    let mut packages: BTreeMap<String, Package> = package::CANDIDATE_PACKAGES
        .iter()
        .map(|path| (path.to_string(), Package::new(path)))
        .collect();

    for typ in &schema.types {
        for field in &typ.fields {
            for package in field.field_type.packages() {
                packages
                    .entry(package.path.clone())
                    .or_insert_with(|| package.clone());
            }
        }
    }
    packages.into_values().map(ImportCandidate::new).collect()
}

fn resolve_imports(
    file_name: &str,
    candidates: &[ImportCandidate],
    chunks: &[TBuf],
) -> Result<Imports, SpangenError> {
    let mut registry = PackageRegistry::new(file_name);
    for candidate in candidates {
        if chunks.iter().any(|chunk| candidate.is_referenced(&chunk.body)) {
            registry.register(&candidate.package)?;
        }
    }
    Ok(registry.imports())
}

/// The outermost directory `fs::create_dir_all(dir)` would create
fn outermost_missing(dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .take_while(|p| !p.as_os_str().is_empty() && !p.exists())
        .last()
        .map(Path::to_path_buf)
}

/// Header followed by the chunks, one blank line apart
fn assemble(buffer: &FileBuffer) -> String {
    let mut out = String::with_capacity(
        buffer.header.len() + buffer.chunks.iter().map(|c| c.body.len() + 2).sum::<usize>(),
    );
    out.push_str(buffer.header.trim_end());
    out.push('\n');
    for chunk in &buffer.chunks {
        out.push('\n');
        out.push_str(chunk.body.trim());
        out.push('\n');
    }
    out
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::DdlSource;
    use crate::loader::SchemaLoader;
    use tempfile::TempDir;

    fn schema(ddl: &str) -> Schema {
        let mut source = DdlSource::parse(ddl).unwrap();
        let inflector = Inflector::default();
        SchemaLoader::new(&mut source, &inflector).load_schema().unwrap()
    }

    fn generator(modules: ModuleRegistry) -> GoGenerator {
        GoGenerator::new(modules, Arc::new(Inflector::default()))
            .with_formatter(Box::new(NoopFormatter))
    }

    struct TestModule {
        name: &'static str,
        kind: ModuleKind,
        body: &'static str,
    }

    impl Module for TestModule {
        fn name(&self) -> &str {
            self.name
        }
        fn kind(&self) -> ModuleKind {
            self.kind
        }
        fn load(&self) -> Result<Vec<u8>, SpangenError> {
            Ok(self.body.as_bytes().to_vec())
        }
    }

    fn module(name: &'static str, kind: ModuleKind, body: &'static str) -> Box<dyn Module> {
        Box::new(TestModule { name, kind, body })
    }

    const DDL: &str = "CREATE TABLE Users(Id INT64 NOT NULL, CreatedAt TIMESTAMP NOT NULL) PRIMARY KEY(Id);
                       CREATE TABLE Items(Id INT64 NOT NULL) PRIMARY KEY(Id);";

    #[test]
    fn test_output_mode_for_path() {
        assert_eq!(OutputMode::for_path(Path::new("models")), OutputMode::Library);
        assert_eq!(OutputMode::for_path(Path::new("out/models.go")), OutputMode::SingleFile);
    }

    #[test]
    fn test_config_defaults() {
        let config = CodeGenConfig::new(PathBuf::from("gen/my-models"));
        assert_eq!(config.package, "my_models");
        assert_eq!(config.file_name_for("UserAccount"), "useraccount.yo.go");
        assert_eq!(config.output_dir(), PathBuf::from("gen/my-models"));

        let single = CodeGenConfig::new(PathBuf::from("db.go"));
        assert_eq!(single.output_mode, OutputMode::SingleFile);
        assert_eq!(single.output_dir(), PathBuf::from("."));
        assert_eq!(single.file_name_for("UserAccount"), "db.go");
        assert_eq!(single.package, "models");
    }

    #[test]
    fn test_chunks_sorted_and_empty_dropped() {
        let modules = ModuleRegistry::new(
            module("header", ModuleKind::Header, "package {{ package }}\n"),
            vec![
                module("b", ModuleKind::PerType, "// b {{ type.name }}\n"),
                module("a", ModuleKind::PerType, "// a {{ type.name }}\n"),
                module("empty", ModuleKind::PerType, "  \n"),
            ],
        );
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("all.go");
        let config = CodeGenConfig::new(out.clone()).with_package("db");

        let written = generator(modules).generate(&schema(DDL), &config).unwrap();
        assert_eq!(written, vec![out.clone()]);
        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            "package db\n\n// a Item\n\n// b Item\n\n// a User\n\n// b User\n"
        );
    }

    #[test]
    fn test_header_receives_used_imports() {
        let modules = ModuleRegistry::new(
            module(
                "header",
                ModuleKind::Header,
                "{{ file_name }}:{% for i in imports.standard %} {{ i }}{% endfor %} |{% for i in imports.third_party %} {{ i }}{% endfor %}\n",
            ),
            vec![
                module(
                    "type",
                    ModuleKind::PerType,
                    "{% for f in type.fields %}{{ f.type.name }}\n{% endfor %}",
                ),
                module("yo_db", ModuleKind::Global, "var _ = spanner.Key{}\n"),
            ],
        );
        let dir = TempDir::new().unwrap();
        let config = CodeGenConfig::new(dir.path().to_path_buf());
        generator(modules).generate(&schema(DDL), &config).unwrap();

        let user = fs::read_to_string(dir.path().join("user.yo.go")).unwrap();
        assert!(user.starts_with("user.yo.go: \"time\" |\n"));
        let item = fs::read_to_string(dir.path().join("item.yo.go")).unwrap();
        assert!(item.starts_with("item.yo.go: |\n"));
        let db = fs::read_to_string(dir.path().join("yo_db.yo.go")).unwrap();
        assert!(db.starts_with("yo_db.yo.go: | \"cloud.google.com/go/spanner\"\n"));
    }

    #[test]
    fn test_template_error_leaves_output_untouched() {
        let modules = ModuleRegistry::new(
            module("header", ModuleKind::Header, "package x\n"),
            vec![module("broken", ModuleKind::PerType, "{{ type.missing }}")],
        );
        let dir = TempDir::new().unwrap();
        let config = CodeGenConfig::new(dir.path().to_path_buf());

        let err = generator(modules).generate(&schema(DDL), &config).unwrap_err();
        assert!(matches!(err, SpangenError::Template { module, .. } if module == "broken"));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_formatter_error_leaves_output_untouched() {
        let modules = ModuleRegistry::new(
            module("header", ModuleKind::Header, "package x\n"),
            vec![module("type", ModuleKind::PerType, "type {{ type.name }} struct{}\n")],
        );
        let failing = |path: &Path, _: &[u8]| -> Result<Vec<u8>, SpangenError> {
            Err(SpangenError::emission(&path.display().to_string(), "syntax error"))
        };
        let dir = TempDir::new().unwrap();
        let config = CodeGenConfig::new(dir.path().to_path_buf());

        let result = generator(modules)
            .with_formatter(Box::new(failing))
            .generate(&schema(DDL), &config);
        assert!(matches!(result, Err(SpangenError::Emission { .. })));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_run_removes_directories_it_created() {
        let modules = ModuleRegistry::new(
            module("header", ModuleKind::Header, "package x\n"),
            vec![module("type", ModuleKind::PerType, "type {{ type.name }} struct{}\n")],
        );
        let failing = |path: &Path, _: &[u8]| -> Result<Vec<u8>, SpangenError> {
            Err(SpangenError::emission(&path.display().to_string(), "syntax error"))
        };
        let dir = TempDir::new().unwrap();
        let config = CodeGenConfig::new(dir.path().join("gen").join("models"));

        let result = generator(modules)
            .with_formatter(Box::new(failing))
            .generate(&schema(DDL), &config);
        assert!(result.is_err());
        assert!(!dir.path().join("gen").exists());
        assert!(dir.path().exists());
    }

    #[test]
    fn test_successful_run_creates_missing_directories() {
        let modules = ModuleRegistry::new(
            module("header", ModuleKind::Header, "package x\n"),
            vec![module("type", ModuleKind::PerType, "type {{ type.name }} struct{}\n")],
        );
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("gen").join("models");
        let written = generator(modules)
            .generate(&schema(DDL), &CodeGenConfig::new(out.clone()))
            .unwrap();

        assert_eq!(written.len(), 2);
        assert!(out.join("user.yo.go").exists());
    }

    #[test]
    fn test_outermost_missing() {
        let dir = TempDir::new().unwrap();
        assert_eq!(outermost_missing(dir.path()), None);
        assert_eq!(
            outermost_missing(&dir.path().join("a").join("b")),
            Some(dir.path().join("a"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let modules = ModuleRegistry::new(
            module("header", ModuleKind::Header, "package x\n"),
            vec![module("type", ModuleKind::PerType, "type {{ type.name }} struct{}\n")],
        );
        let dir = TempDir::new().unwrap();
        let config = CodeGenConfig::new(dir.path().to_path_buf()).with_file_mode(0o640);
        let written = generator(modules).generate(&schema(DDL), &config).unwrap();

        for path in written {
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o640);
        }
    }
}
