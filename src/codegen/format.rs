//! Source formatting
//!
//! Generated files pass through a [`Formatter`] before they are moved into
//! place. The default runs `gofmt`, reading the source on stdin.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use tracing::{debug, error};

use crate::error::SpangenError;

pub trait Formatter {
    /// Format the contents of the file at `path`
    fn format(&self, path: &Path, source: &[u8]) -> Result<Vec<u8>, SpangenError>;
}

impl<F> Formatter for F
where
    F: Fn(&Path, &[u8]) -> Result<Vec<u8>, SpangenError>,
{
    fn format(&self, path: &Path, source: &[u8]) -> Result<Vec<u8>, SpangenError> {
        self(path, source)
    }
}

/// Leaves the source unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFormatter;

impl Formatter for NoopFormatter {
    fn format(&self, _path: &Path, source: &[u8]) -> Result<Vec<u8>, SpangenError> {
        Ok(source.to_vec())
    }
}

/// Pipes the source through an external command
#[derive(Debug, Clone)]
pub struct CommandFormatter {
    program: String,
    args: Vec<String>,
}

impl CommandFormatter {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
        }
    }

    pub fn gofmt() -> Self {
        Self::new("gofmt")
    }

    pub fn with_args(mut self, args: &[&str]) -> Self {
        self.args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Parse a command line such as `goimports -local example.com`.
    /// `none` disables formatting.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut words = command.split_whitespace();
        let program = words.next()?;
        if program == "none" {
            return None;
        }
        Some(Self {
            program: program.to_string(),
            args: words.map(str::to_string).collect(),
        })
    }
}

impl Formatter for CommandFormatter {
    fn format(&self, path: &Path, source: &[u8]) -> Result<Vec<u8>, SpangenError> {
        let file = path.display().to_string();
        debug!(program = ?self.program, file = ?file, "Formatting");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SpangenError::emission(&file, format!("failed to run {}: {e}", self.program)))?;

        // written from another thread so a full stdout pipe cannot block us
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SpangenError::emission(&file, "formatter stdin unavailable"))?;
        let input = source.to_vec();
        let writer = thread::spawn(move || stdin.write_all(&input));

        let output = child
            .wait_with_output()
            .map_err(|e| SpangenError::emission(&file, format!("formatter failed: {e}")))?;
        match writer.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(SpangenError::emission(&file, format!("failed to write to formatter: {e}")))
            }
            Err(_) => return Err(SpangenError::emission(&file, "formatter writer panicked")),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(file = ?file, status = ?output.status, "Formatter rejected generated source");
            return Err(SpangenError::emission(&file, stderr.trim().to_string()));
        }
        Ok(output.stdout)
    }
}
