//! Template modules
//!
//! A module is one named template with a scope: the file header, a global
//! body rendered once per run, or a body rendered once per type. The
//! built-in modules are embedded in the binary and can be overridden file
//! by file from a template directory.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::SpangenError;

/// Where a module's output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Rendered once per output file, ahead of its chunks
    Header,
    /// Rendered once per run
    Global,
    /// Rendered once per type
    PerType,
}

pub trait Module {
    fn name(&self) -> &str;
    fn kind(&self) -> ModuleKind;
    /// Template source
    fn load(&self) -> Result<Vec<u8>, SpangenError>;
}

/// A module compiled into the binary
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedModule {
    pub name: &'static str,
    pub kind: ModuleKind,
    pub file_name: &'static str,
    pub body: &'static str,
}

impl Module for EmbeddedModule {
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

/// A module read from disk on every load
#[derive(Debug, Clone)]
pub struct FileModule {
    name: String,
    kind: ModuleKind,
    path: PathBuf,
}

impl FileModule {
    pub fn new(name: &str, kind: ModuleKind, path: PathBuf) -> Self {
        Self {
            name: name.to_string(),
            kind,
            path,
        }
    }
}

impl Module for FileModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ModuleKind {
        self.kind
    }

    fn load(&self) -> Result<Vec<u8>, SpangenError> {
        fs::read(&self.path).map_err(|e| SpangenError::Template {
            module: self.name.clone(),
            message: format!("failed to read {}: {e}", self.path.display()),
        })
    }
}

pub const BUILTIN_MODULES: &[EmbeddedModule] = &[
    EmbeddedModule {
        name: "header",
        kind: ModuleKind::Header,
        file_name: "header.go.jinja",
        body: include_str!("templates/header.go.jinja"),
    },
    EmbeddedModule {
        name: "yo_db",
        kind: ModuleKind::Global,
        file_name: "yo_db.go.jinja",
        body: include_str!("templates/yo_db.go.jinja"),
    },
    EmbeddedModule {
        name: "yo_package",
        kind: ModuleKind::Global,
        file_name: "yo_package.go.jinja",
        body: include_str!("templates/yo_package.go.jinja"),
    },
    EmbeddedModule {
        name: "type",
        kind: ModuleKind::PerType,
        file_name: "type.go.jinja",
        body: include_str!("templates/type.go.jinja"),
    },
    EmbeddedModule {
        name: "index",
        kind: ModuleKind::PerType,
        file_name: "index.go.jinja",
        body: include_str!("templates/index.go.jinja"),
    },
];

/// The modules of one run: exactly one header plus any number of global
/// and per-type modules
pub struct ModuleRegistry {
    header: Box<dyn Module>,
    modules: Vec<Box<dyn Module>>,
}

impl ModuleRegistry {
    pub fn new(header: Box<dyn Module>, modules: Vec<Box<dyn Module>>) -> Self {
        Self { header, modules }
    }

    pub fn builtin() -> Self {
        Self::assemble(BUILTIN_MODULES.iter().map(|m| Box::new(*m) as Box<dyn Module>))
    }

    /// The built-in modules, replaced by same-named files in `dir`
    pub fn with_overrides(dir: &Path) -> Result<Self, SpangenError> {
        if !dir.is_dir() {
            return Err(SpangenError::Config {
                path: dir.display().to_string(),
                message: "template path is not a directory".to_string(),
            });
        }

        let modules = BUILTIN_MODULES.iter().map(|m| {
            let path = dir.join(m.file_name);
            if path.is_file() {
                debug!(module = ?m.name, path = ?path, "Using template override");
                Box::new(FileModule::new(m.name, m.kind, path)) as Box<dyn Module>
            } else {
                Box::new(*m) as Box<dyn Module>
            }
        });
        Ok(Self::assemble(modules))
    }

    fn assemble(modules: impl Iterator<Item = Box<dyn Module>>) -> Self {
        let mut header = None;
        let mut rest = Vec::new();
        for module in modules {
            if module.kind() == ModuleKind::Header && header.is_none() {
                header = Some(module);
            } else {
                rest.push(module);
            }
        }
        Self {
            header: header.unwrap_or_else(|| Box::new(BUILTIN_MODULES[0])),
            modules: rest,
        }
    }

    pub fn header(&self) -> &dyn Module {
        &*self.header
    }

    pub fn of_kind(&self, kind: ModuleKind) -> impl Iterator<Item = &dyn Module> {
        self.modules
            .iter()
            .filter(move |m| m.kind() == kind)
            .map(|m| m.as_ref() as &dyn Module)
    }
}

/// Write every built-in template into `dir` for editing
pub fn write_templates(dir: &Path) -> Result<Vec<PathBuf>, SpangenError> {
    fs::create_dir_all(dir).map_err(|e| SpangenError::Config {
        path: dir.display().to_string(),
        message: format!("failed to create template directory: {e}"),
    })?;

    let mut written = Vec::with_capacity(BUILTIN_MODULES.len());
    for module in BUILTIN_MODULES {
        let path = dir.join(module.file_name);
        fs::write(&path, module.body)?;
        debug!(path = ?path, "Wrote template");
        written.push(path);
    }
    info!(dir = ?dir, count = ?written.len(), "Templates written");
    Ok(written)
}
