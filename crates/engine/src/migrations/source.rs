//! Migration Sources - Where raw migration files come from
//!
//! A source only yields `(identifier, content)` pairs. Parsing happens in
//! [`parser`](super::parser) so directory and embedded sources share it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{MigrationError, MigrationResult};

/// A migration file as read from a source, before parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMigration {
    /// Locator used in error messages (a path for directory sources)
    pub source: String,
    /// Bare file name, matched against the filename grammar
    pub file_name: String,
    /// Full file content
    pub content: String,
}

/// Anything that can list raw migration files
pub trait MigrationSource: Send + Sync {
    /// Whether the source exists at all. A missing source is empty, not an
    /// error, but failing to find out is.
    fn exists(&self) -> MigrationResult<bool>;

    /// All raw migrations carrying the given extension, in no particular order
    fn load(&self, extension: &str) -> MigrationResult<Vec<RawMigration>>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Recursive directory walk
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl MigrationSource for DirectorySource {
    fn exists(&self) -> MigrationResult<bool> {
        self.root
            .try_exists()
            .map_err(|e| MigrationError::io(&self.root, e))
    }

    fn load(&self, extension: &str) -> MigrationResult<Vec<RawMigration>> {
        if !self.exists()? {
            return Ok(Vec::new());
        }

        let metadata = fs::metadata(&self.root).map_err(|e| MigrationError::io(&self.root, e))?;
        if !metadata.is_dir() {
            return Err(MigrationError::io(
                &self.root,
                io::Error::new(io::ErrorKind::Other, "migrations path is not a directory"),
            ));
        }

        let mut raws = Vec::new();
        // Symlinked files and directories are migrations like any other
        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.root.clone());
                MigrationError::io(path, e.into())
            })?;

            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }
            if path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
                continue;
            }

            let content = fs::read_to_string(path).map_err(|e| MigrationError::io(path, e))?;
            raws.push(RawMigration {
                source: path.display().to_string(),
                file_name: entry.file_name().to_string_lossy().into_owned(),
                content,
            });
        }

        Ok(raws)
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// Migrations bundled into the binary or built in memory
#[derive(Debug, Clone, Default)]
pub struct EmbeddedSource {
    files: Vec<RawMigration>,
}

impl EmbeddedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file; `path` is split on `/` to find the file name.
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        let source = path.into();
        let file_name = source.rsplit('/').next().unwrap_or(&source).to_string();
        self.files.push(RawMigration {
            source,
            file_name,
            content: content.into(),
        });
        self
    }
}

impl MigrationSource for EmbeddedSource {
    fn exists(&self) -> MigrationResult<bool> {
        Ok(true)
    }

    fn load(&self, extension: &str) -> MigrationResult<Vec<RawMigration>> {
        let suffix = format!(".{}", extension);
        Ok(self
            .files
            .iter()
            .filter(|raw| raw.file_name.ends_with(&suffix))
            .cloned()
            .collect())
    }

    fn describe(&self) -> String {
        format!("embedded ({} files)", self.files.len())
    }
}
