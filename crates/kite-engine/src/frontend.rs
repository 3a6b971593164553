//! Front-end boundary
//!
//! The compiler never parses source text. A [`FrontEnd`] turns a source path
//! into a normalized [`Program`]; the runtime crate provides adapters that
//! read sidecar payloads or run an external parser command, and
//! [`StaticFrontEnd`] serves programs held in memory.

use crate::ast::{decode_payload, PayloadError, Program};
use crate::compiler::error::{CompileError, CompileResult, DiagnosticCode};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

/// Source of normalized programs
pub trait FrontEnd {
    /// Produce the normalized program of a source file
    fn load(&self, path: &Path) -> CompileResult<Program>;

    /// Whether `path` names a source file this front end can load
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Decode a front-end payload for `path`, mapping contract failures to
/// diagnostics
pub fn program_from_payload(text: &str, path: &Path) -> CompileResult<Program> {
    decode_payload(text).map_err(|error| payload_error(error).in_file(path))
}

fn payload_error(error: PayloadError) -> CompileError {
    match error {
        PayloadError::Diagnostic(diagnostic) => CompileError::new(
            DiagnosticCode::FrontEnd,
            if diagnostic.code.is_empty() {
                diagnostic.message
            } else {
                format!("{} [{}]", diagnostic.message, diagnostic.code)
            },
        )
        .at(diagnostic.line, diagnostic.column),
        other => CompileError::new(DiagnosticCode::AstSchema, other.to_string()),
    }
}

/// In-memory front end keyed by path
#[derive(Debug, Clone, Default)]
pub struct StaticFrontEnd {
    programs: FxHashMap<PathBuf, Program>,
}

impl StaticFrontEnd {
    /// Create an empty front end
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a program under `path`
    pub fn insert(&mut self, path: impl Into<PathBuf>, program: Program) {
        self.programs.insert(path.into(), program);
    }

    /// Builder form of [`StaticFrontEnd::insert`]
    pub fn with(mut self, path: impl Into<PathBuf>, program: Program) -> Self {
        self.insert(path, program);
        self
    }
}

impl FrontEnd for StaticFrontEnd {
    fn load(&self, path: &Path) -> CompileResult<Program> {
        self.programs.get(path).cloned().ok_or_else(|| {
            CompileError::new(
                DiagnosticCode::Io,
                format!("no program registered for {}", path.display()),
            )
            .in_file(path)
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.programs.contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{build::*, Payload};

    #[test]
    fn test_payload_diagnostic_becomes_frontend_error() {
        let text = r#"{"schemaVersion":"kite-ast-v1","diagnostics":[{"code":"TS1005","message":"';' expected","line":2,"column":7}],"normalizedProgram":null}"#;
        let err = program_from_payload(text, Path::new("/src/main.ts")).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::FrontEnd);
        assert_eq!((err.line, err.column), (2, 7));
        assert_eq!(err.file, "/src/main.ts");
    }

    #[test]
    fn test_schema_mismatch_is_ast_schema() {
        let text = r#"{"schemaVersion":"other","diagnostics":[],"normalizedProgram":{"kind":"Program","statements":[]}}"#;
        let err = program_from_payload(text, Path::new("m.ts")).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::AstSchema);
    }

    #[test]
    fn test_static_front_end_serves_registered_programs() {
        let program = Program::new(vec![log(num(1.0))]);
        let fe = StaticFrontEnd::new().with("/p/main.ts", program.clone());
        assert!(fe.exists(Path::new("/p/main.ts")));
        assert!(!fe.exists(Path::new("/p/other.ts")));
        assert_eq!(fe.load(Path::new("/p/main.ts")).unwrap(), program);

        let json = Payload::new(program.clone()).to_json();
        assert_eq!(program_from_payload(&json, Path::new("/p/main.ts")).unwrap(), program);
    }
}
