//! Module path resolution
//!
//! Handles resolving import specifiers to normalized file paths.

use crate::frontend::FrontEnd;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Source file extension tried for extensionless specifiers
pub const SOURCE_EXTENSION: &str = "ts";

/// Errors that can occur during module resolution
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Specifier does not name a file
    #[error("Module not found: {specifier} (tried: {})", format_tried(.tried))]
    ModuleNotFound {
        /// Specifier as written
        specifier: String,
        /// Candidate paths, in resolution order
        tried: Vec<PathBuf>,
    },

    /// Specifier is not `./` or `../` relative
    #[error("Only relative imports are supported: `{0}`")]
    NonRelative(String),
}

fn format_tried(tried: &[PathBuf]) -> String {
    tried
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whether a specifier is `./` or `../` relative
pub fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// Lexically normalize a path, folding `.` and `..` components
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Module resolver for import specifiers
pub struct ModuleResolver<'a> {
    front_end: &'a dyn FrontEnd,
}

impl<'a> ModuleResolver<'a> {
    /// Create a resolver that asks `front_end` which files exist
    pub fn new(front_end: &'a dyn FrontEnd) -> Self {
        Self { front_end }
    }

    /// Resolve an import specifier to a normalized path
    ///
    /// # Resolution Order
    /// For `import { x } from "./utils"`:
    /// 1. Try `./utils` as written
    /// 2. Try `./utils.ts`
    /// 3. Try `./utils/index.ts`
    pub fn resolve(&self, specifier: &str, from_file: &Path) -> Result<PathBuf, ResolveError> {
        if !is_relative(specifier) {
            return Err(ResolveError::NonRelative(specifier.to_string()));
        }
        let from_dir = from_file.parent().unwrap_or_else(|| Path::new(""));
        let base = normalize_path(&from_dir.join(specifier));

        let mut with_ext = base.clone().into_os_string();
        with_ext.push(".");
        with_ext.push(SOURCE_EXTENSION);
        let candidates = [
            base.clone(),
            PathBuf::from(with_ext),
            base.join(format!("index.{}", SOURCE_EXTENSION)),
        ];

        for candidate in &candidates {
            if self.front_end.exists(candidate) {
                return Ok(candidate.clone());
            }
        }
        Err(ResolveError::ModuleNotFound {
            specifier: specifier.to_string(),
            tried: candidates.to_vec(),
        })
    }
}
