//! Test harness for end-to-end compilation and execution
//!
//! Programs are written as front-end payload sidecars into a temporary
//! project directory, compiled through the runtime's `compile` entry point
//! and run with output captured.

use kite_engine::ast::{Payload, Program};
use kite_runtime::{compile, run, sidecar_path, CompiledArtifact, RuntimeError};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Result type for harness operations
pub type E2EResult<T> = Result<T, RuntimeError>;

/// Captured output of one run
#[derive(Debug)]
pub struct RunOutput {
    /// Program stdout
    pub stdout: String,
    /// Program stderr
    pub stderr: String,
    /// Outcome of the run
    pub result: E2EResult<()>,
}

/// A temporary project directory holding sidecar payloads
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create project dir"),
        }
    }

    /// Add a source file given its normalized program
    pub fn file(self, name: &str, program: Program) -> Self {
        let source = self.path(name);
        if let Some(parent) = source.parent() {
            std::fs::create_dir_all(parent).expect("create source dir");
        }
        std::fs::write(sidecar_path(&source), Payload::new(program).to_json()).expect("write payload");
        self
    }

    /// Write `kite.toml` at the project root
    pub fn config(self, text: &str) -> Self {
        std::fs::write(self.path("kite.toml"), text).expect("write kite.toml");
        self
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn out_dir(&self) -> PathBuf {
        self.path("out")
    }

    pub fn compile(&self, entry: &str) -> E2EResult<CompiledArtifact> {
        compile(&self.path(entry), &self.out_dir())
    }

    pub fn run_artifact(&self, artifact: &CompiledArtifact, classpath: &[PathBuf]) -> RunOutput {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let result = run(artifact, &mut stdout, &mut stderr, classpath).map(|_| ());
        RunOutput {
            stdout: String::from_utf8(stdout).expect("utf-8 stdout"),
            stderr: String::from_utf8(stderr).expect("utf-8 stderr"),
            result,
        }
    }

    /// Compile and run `entry`
    pub fn run(&self, entry: &str) -> RunOutput {
        let artifact = match self.compile(entry) {
            Ok(artifact) => artifact,
            Err(e) => panic!("compilation of {} failed: {}", entry, e),
        };
        self.run_artifact(&artifact, &[])
    }
}

/// Compile and run a one-file program, asserting on its stdout
pub fn expect_output(program: Program, expected: &str) {
    expect_project_output(Project::new().file("main.ts", program), expected);
}

/// Run `main.ts` of a project, asserting success and its stdout
pub fn expect_project_output(project: Project, expected: &str) {
    let output = project.run("main.ts");
    if let Err(e) = &output.result {
        panic!("run failed: {}\nstdout so far:\n{}", e, output.stdout);
    }
    assert_eq!(output.stdout, expected);
}

/// Assert that compiling a one-file program fails with `code`
pub fn expect_compile_error(program: Program, code: &str) {
    let project = Project::new().file("main.ts", program);
    match project.compile("main.ts") {
        Ok(_) => panic!("expected compile error {}, but compilation succeeded", code),
        Err(e) => assert_eq!(e.code(), code, "unexpected error: {}", e),
    }
}

/// Assert that running a one-file program fails with `code`, returning
/// what it printed before failing
pub fn expect_runtime_error(program: Program, code: &str) -> RunOutput {
    let output = Project::new().file("main.ts", program).run("main.ts");
    match &output.result {
        Ok(()) => panic!("expected runtime error {}, but the run succeeded", code),
        Err(e) => assert_eq!(e.code(), code, "unexpected error: {}", e),
    }
    output
}

/// Whether a unit file exists in a directory
pub fn has_unit(dir: &Path, unit: &str) -> bool {
    dir.join(format!("{}.kbc", unit)).is_file()
}
