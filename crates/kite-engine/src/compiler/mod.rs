//! Kite compiler
//!
//! Pipeline for one entry file:
//!
//! 1. load the module graph through a [`FrontEnd`](crate::frontend::FrontEnd)
//! 2. lower every module into one [`ir::IrProgram`] (scopes, captures,
//!    classes, import links, reflective dispatchers)
//! 3. optimize (constant folding, dead code elimination)
//! 4. rewrite async functions into state machines
//! 5. number property access sites
//! 6. generate and verify the units
//! 7. write `<Entry>.kbc`, the auxiliary units and `<Entry>.kmap`

pub mod async_transform;
pub mod bytecode;
pub mod codegen;
pub mod error;
pub mod ir;
pub mod lower;
pub mod module;
pub mod optimize;
pub mod property_cache;
pub mod scope;

pub use codegen::GeneratedProgram;
pub use error::{CompileError, CompileResult, DiagnosticCode};
pub use optimize::{OptLevel, OptStats, OptimizationOptions, Optimizer};

use crate::frontend::FrontEnd;
use std::path::{Path, PathBuf};

/// Options of one compile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Optimizer switches
    pub optimization: OptimizationOptions,
}

/// Compiled program on disk, handed to the runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    /// Name of the designated entry unit (`MainProgram`)
    pub entry_unit: String,
    /// Every written unit file, entry first
    pub units: Vec<PathBuf>,
    /// Directory holding the units
    pub output_dir: PathBuf,
    /// Written source map
    pub source_map: PathBuf,
}

impl CompiledArtifact {
    /// Path of the entry unit file
    pub fn entry_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", self.entry_unit, bytecode::unit::UNIT_EXTENSION))
    }
}

/// Entry unit name derived from the entry file: `main.ts` -> `MainProgram`,
/// `order-service.ts` -> `OrderServiceProgram`
pub fn entry_unit_name(entry: &Path) -> String {
    let stem = entry
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name: String = stem
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, "Main");
    }
    name.push_str("Program");
    name
}

/// Main compiler entry point
pub struct Compiler<'f> {
    front_end: &'f dyn FrontEnd,
    options: CompileOptions,
}

impl<'f> Compiler<'f> {
    /// Create a compiler reading programs through `front_end`
    pub fn new(front_end: &'f dyn FrontEnd) -> Self {
        Self {
            front_end,
            options: CompileOptions::default(),
        }
    }

    /// Replace the compile options
    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    /// Compile `entry` and its imports into verified units held in memory
    pub fn compile_program(&self, entry: &Path) -> CompileResult<GeneratedProgram> {
        let entry = module::normalize_path(entry);
        let set = module::load_modules(&entry, self.front_end)?;
        let mut program = lower::lower_program(&set, &entry_unit_name(&entry))?;
        Optimizer::from_options(&self.options.optimization).optimize(&mut program);
        async_transform::transform_async(&mut program)?;
        property_cache::plan_property_sites(&mut program);
        codegen::generate(&program)
    }

    /// Compile `entry` and write the units into `output_dir`
    pub fn compile(&self, entry: &Path, output_dir: &Path) -> CompileResult<CompiledArtifact> {
        let generated = self.compile_program(entry)?;
        write_program(&generated, output_dir)
    }
}

/// Write generated units and the source map into `output_dir`
pub fn write_program(generated: &GeneratedProgram, output_dir: &Path) -> CompileResult<CompiledArtifact> {
    let io_error = |path: &Path, error: std::io::Error| {
        CompileError::new(
            DiagnosticCode::Io,
            format!("cannot write {}: {}", path.display(), error),
        )
    };
    let entry = generated
        .entry()
        .ok_or_else(|| CompileError::new(DiagnosticCode::Verify, "no entry unit was generated"))?;

    std::fs::create_dir_all(output_dir).map_err(|e| io_error(output_dir, e))?;
    let mut units = Vec::with_capacity(generated.units.len());
    for unit in &generated.units {
        let path = output_dir.join(unit.file_name());
        std::fs::write(&path, unit.encode()).map_err(|e| io_error(&path, e))?;
        units.push(path);
    }
    let source_map = output_dir.join(format!("{}.{}", entry.name, codegen::SOURCE_MAP_EXTENSION));
    std::fs::write(&source_map, &generated.source_map).map_err(|e| io_error(&source_map, e))?;

    log::debug!("wrote {} unit(s) to {}", units.len(), output_dir.display());
    Ok(CompiledArtifact {
        entry_unit: entry.name.clone(),
        units,
        output_dir: output_dir.to_path_buf(),
        source_map,
    })
}

/// Compile `entry` into `output_dir` with default options
pub fn compile(entry: &Path, output_dir: &Path, front_end: &dyn FrontEnd) -> CompileResult<CompiledArtifact> {
    Compiler::new(front_end).compile(entry, output_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::ast::Program;
    use crate::compiler::bytecode::{Unit, UnitKind};
    use crate::frontend::StaticFrontEnd;

    #[test]
    fn test_entry_unit_names() {
        assert_eq!(entry_unit_name(Path::new("/a/main.ts")), "MainProgram");
        assert_eq!(entry_unit_name(Path::new("order-service.ts")), "OrderServiceProgram");
        assert_eq!(entry_unit_name(Path::new("1st.ts")), "Main1stProgram");
    }

    #[test]
    fn test_compile_writes_units_and_source_map() {
        let fe = StaticFrontEnd::new().with(
            "/app/main.ts",
            Program::new(vec![
                function(
                    "add",
                    &["a", "b"],
                    vec![ret(binary(var("a"), "+", var("b")))],
                ),
                const_("total", binary(call(var("add"), vec![num(2.0), num(3.0)]), "*", num(4.0))),
                log(binary(str_lit("total="), "+", var("total"))),
                expr_stmt(call(arrow(&[], vec![log(str_lit("inline"))]), vec![])),
            ]),
        );
        let dir = tempfile::tempdir().unwrap();
        let artifact = compile(Path::new("/app/main.ts"), dir.path(), &fe).unwrap();
        assert_eq!(artifact.entry_unit, "MainProgram");
        assert_eq!(artifact.units.len(), 2);
        assert!(artifact.entry_path().is_file());
        assert!(artifact.source_map.ends_with("MainProgram.kmap"));

        let bytes = std::fs::read(artifact.entry_path()).unwrap();
        let entry = Unit::decode(&bytes).unwrap();
        assert_eq!(entry.kind, UnitKind::Entry);
        assert_eq!(entry.metadata.nested_units, vec!["MainProgram$Closure1".to_string()]);
        assert!(entry.metadata.total_functions >= 3);
        let map = std::fs::read_to_string(&artifact.source_map).unwrap();
        assert!(map.starts_with("KITE-SOURCE-MAP\t1\n"));
    }

    #[test]
    fn test_disabled_optimizer_still_compiles() {
        let fe = StaticFrontEnd::new().with(
            "/app/main.ts",
            Program::new(vec![
                if_(boolean(false), vec![log(num(1.0))], vec![]),
                log(binary(num(1.0), "+", num(2.0))),
            ]),
        );
        let options = CompileOptions {
            optimization: OptimizationOptions {
                constant_folding: false,
                dead_code_elimination: false,
            },
        };
        let generated = Compiler::new(&fe)
            .with_options(options)
            .compile_program(Path::new("/app/main.ts"))
            .unwrap();
        assert_eq!(generated.units.len(), 1);
    }

    #[test]
    fn test_rejections_surface_as_compile_errors() {
        let fe = StaticFrontEnd::new().with("/app/main.ts", Program::new(vec![for_loop()]));
        let err = Compiler::new(&fe)
            .compile_program(Path::new("/app/main.ts"))
            .unwrap_err();
        assert_eq!(err.code, DiagnosticCode::UnsupportedFor);
        assert_eq!(err.file, "/app/main.ts");
    }
}
