//! Front-end adapters
//!
//! Both adapters hand the compiler a normalized program decoded from a
//! front-end payload: [`SidecarFrontEnd`] reads a `<file>.ast.json` written
//! next to each source file, [`CommandFrontEnd`] runs an external parser and
//! reads the payload from its standard output.

use kite_engine::compiler::{CompileError, CompileResult, DiagnosticCode};
use kite_engine::{ast::Program, program_from_payload, FrontEnd};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Suffix appended to a source file name to find its payload
pub const SIDECAR_SUFFIX: &str = ".ast.json";

/// Payload path for a source file: `main.ts` -> `main.ts.ast.json`
pub fn sidecar_path(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_owned();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

/// Reads pre-generated payloads stored beside the sources
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarFrontEnd;

impl FrontEnd for SidecarFrontEnd {
    fn load(&self, path: &Path) -> CompileResult<Program> {
        let sidecar = sidecar_path(path);
        let text = std::fs::read_to_string(&sidecar).map_err(|e| {
            CompileError::new(
                DiagnosticCode::Io,
                format!("cannot read front-end payload {}: {}", sidecar.display(), e),
            )
            .in_file(path)
        })?;
        log::trace!("read payload {} ({} bytes)", sidecar.display(), text.len());
        program_from_payload(&text, path)
    }

    fn exists(&self, path: &Path) -> bool {
        sidecar_path(path).is_file()
    }
}

/// Runs `command... <source>` and decodes its standard output
#[derive(Debug, Clone)]
pub struct CommandFrontEnd {
    command: Vec<String>,
}

impl CommandFrontEnd {
    /// Front end running `command` (program first, then leading arguments)
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl FrontEnd for CommandFrontEnd {
    fn load(&self, path: &Path) -> CompileResult<Program> {
        let frontend_error = |message: String| CompileError::new(DiagnosticCode::FrontEnd, message).in_file(path);
        let Some((program, args)) = self.command.split_first() else {
            return Err(frontend_error("no front-end command configured".to_string()));
        };
        log::debug!("running front end `{}` on {}", self.command.join(" "), path.display());
        let output = Command::new(program)
            .args(args)
            .arg(path)
            .output()
            .map_err(|e| frontend_error(format!("failed to run front end `{}`: {}", program, e)))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.trim().is_empty() { stdout.trim() } else { stderr.trim() };
            return Err(frontend_error(format!("front end failed ({}): {}", output.status, detail)));
        }
        program_from_payload(&stdout, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kite_engine::ast::{build::*, Payload};

    #[test]
    fn test_sidecar_path_appends_suffix() {
        assert_eq!(sidecar_path(Path::new("/a/main.ts")), PathBuf::from("/a/main.ts.ast.json"));
    }

    #[test]
    fn test_sidecar_front_end_reads_payload() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("main.ts");
        let program = Program::new(vec![log(str_lit("hi"))]);
        std::fs::write(sidecar_path(&source), Payload::new(program.clone()).to_json()).unwrap();

        assert!(SidecarFrontEnd.exists(&source));
        assert!(!SidecarFrontEnd.exists(&dir.path().join("other.ts")));
        assert_eq!(SidecarFrontEnd.load(&source).unwrap(), program);
    }

    #[test]
    fn test_missing_sidecar_is_io_error() {
        let err = SidecarFrontEnd.load(Path::new("/nowhere/main.ts")).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::Io);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_front_end_failure_is_reported() {
        let fe = CommandFrontEnd::new(vec!["sh".into(), "-c".into(), "echo broken >&2; exit 3".into(), "sh".into()]);
        let err = fe.load(Path::new("/tmp/main.ts")).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::FrontEnd);
        assert!(err.message.contains("broken"));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_front_end_decodes_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let payload = dir.path().join("payload.json");
        let program = Program::new(vec![log(num(1.0))]);
        std::fs::write(&payload, Payload::new(program.clone()).to_json()).unwrap();
        let fe = CommandFrontEnd::new(vec![
            "sh".into(),
            "-c".into(),
            format!("cat {}", payload.display()),
            "sh".into(),
        ]);
        assert_eq!(fe.load(&dir.path().join("main.ts")).unwrap(), program);
    }
}
