//! Drives the full pipeline for one source file or a directory tree:
//! parse, infer, read the existing declaration file, merge, serialize,
//! and commit the result with a one-generation backup.

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::diagnostics::{Diagnostics, Event};
use crate::error::Result;
use crate::infer::infer_from_tree;
use crate::parser::Parser;
use crate::reader::read_declarations;
use crate::utils::{declaration_path_for, find_python_files};
use crate::writer::{module_to_string, HEADER};

/// What happened to one declaration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// No declaration file existed; one was written.
    Created,
    /// The content changed; the previous file was rotated to `.bak`.
    Updated,
    /// Identical content past the header; nothing touched.
    Unchanged,
}

/// Per-file result handed back to the caller for rendering.
#[derive(Debug, Serialize)]
pub struct Report {
    /// Input source path.
    pub source: String,
    /// Declaration file path.
    pub output: String,
    /// What the run did to the output file.
    pub outcome: Outcome,
    /// Diagnostics gathered while inferring, reading and merging.
    pub events: Vec<Event>,
}

/// The main generator that maintains declaration files.
pub struct Generator {
    /// Report outcomes without touching the filesystem.
    dry_run: bool,
}

impl Generator {
    /// Creates a generator.
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Processes a single Python file or every Python file under a
    /// directory. An explicit output path only applies to single-file
    /// input; in directory mode each source maps to its sibling `.pxd`.
    pub fn generate_path(&self, path: &Path, output: Option<&Path>) -> Result<Vec<Report>> {
        if path.is_dir() {
            let mut reports = Vec::new();
            for file in find_python_files(path) {
                reports.push(self.generate_file(&file, None)?);
            }
            Ok(reports)
        } else {
            Ok(vec![self.generate_file(path, output)?])
        }
    }

    /// Processes a single source file.
    pub fn generate_file(&self, input: &Path, output: Option<&Path>) -> Result<Report> {
        let out_path = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| declaration_path_for(input));
        log::info!("{} --> {}", input.display(), out_path.display());

        let mut parser = Parser::new()?;
        let (tree, source) = parser.parse_file(input)?;

        let mut diag = Diagnostics::new();
        let mut fresh = infer_from_tree(&tree, source.as_bytes(), &mut diag);

        match fs::File::open(&out_path) {
            Ok(file) => {
                let persisted = read_declarations(BufReader::new(file), &mut diag)?;
                fresh.merge(&persisted, &mut diag);
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => return Err(e.into()),
        }

        let rendered = module_to_string(&fresh);
        let outcome = self.commit(&out_path, &rendered)?;
        Ok(Report {
            source: input.display().to_string(),
            output: out_path.display().to_string(),
            outcome,
            events: diag.events().to_vec(),
        })
    }

    /// Compares the rendered text with the file on disk, ignoring the
    /// header prefix, and commits it when it differs. The previous file
    /// survives one generation as `<name>.bak`.
    fn commit(&self, out_path: &Path, rendered: &str) -> Result<Outcome> {
        let existing = match fs::read(out_path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        match existing {
            Some(old) if content_matches(&old, rendered.as_bytes()) => Ok(Outcome::Unchanged),
            Some(_) => {
                if !self.dry_run {
                    let backup = backup_path(out_path);
                    if backup.exists() {
                        fs::remove_file(&backup)?;
                    }
                    fs::rename(out_path, &backup)?;
                    fs::write(out_path, rendered)?;
                    log::info!(" --> updating {}", out_path.display());
                }
                Ok(Outcome::Updated)
            },
            None => {
                if !self.dry_run {
                    fs::write(out_path, rendered)?;
                    log::info!(" --> creating {}", out_path.display());
                }
                Ok(Outcome::Created)
            },
        }
    }
}

/// Content comparison excluding the fixed-length header.
fn content_matches(old: &[u8], new: &[u8]) -> bool {
    let skip = HEADER.len();
    old.get(skip..) == new.get(skip..)
}

fn backup_path(out_path: &Path) -> PathBuf {
    let name = out_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    out_path.with_file_name(format!("{}.bak", name))
}
