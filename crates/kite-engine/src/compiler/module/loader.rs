//! Module collection
//!
//! Loads the entry module and, transitively, everything it imports through
//! the front end, validating import forms on the way, then orders the
//! modules for initialization.

use super::graph::{GraphError, ModuleGraph};
use super::resolver::{is_relative, ModuleResolver, ResolveError};
use crate::ast::{Program, StmtKind};
use crate::compiler::error::{CompileError, CompileResult, DiagnosticCode};
use crate::frontend::FrontEnd;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// One `import` edge of a module
#[derive(Debug, Clone)]
pub struct ModuleImport {
    /// Resolved path of the imported module
    pub path: PathBuf,
    /// Imported names (equal to their local names)
    pub names: Vec<String>,
    /// Source line of the declaration
    pub line: u32,
    /// Source column of the declaration
    pub column: u32,
}

/// A loaded source module
#[derive(Debug, Clone)]
pub struct SourceModule {
    /// Normalized path
    pub path: PathBuf,
    /// Normalized program
    pub program: Program,
    /// Import edges, in source order
    pub imports: Vec<ModuleImport>,
}

/// Every module reachable from an entry file, in initialization order
#[derive(Debug, Clone)]
pub struct ModuleSet {
    /// Modules, dependencies first; the entry module is last
    pub modules: Vec<SourceModule>,
}

impl ModuleSet {
    /// The entry module
    pub fn entry(&self) -> Option<&SourceModule> {
        self.modules.last()
    }
}

/// Load `entry` and its transitive imports
pub fn load_modules(entry: &Path, front_end: &dyn FrontEnd) -> CompileResult<ModuleSet> {
    let resolver = ModuleResolver::new(front_end);
    let entry = super::resolver::normalize_path(entry);
    let mut graph = ModuleGraph::new();
    let mut loaded: FxHashMap<PathBuf, SourceModule> = FxHashMap::default();
    let mut queue = VecDeque::from([entry.clone()]);
    graph.add_module(entry.clone());

    while let Some(path) = queue.pop_front() {
        if loaded.contains_key(&path) {
            continue;
        }
        let program = front_end.load(&path)?;
        let imports = collect_imports(&program, &path, &resolver)?;
        for import in &imports {
            graph.add_dependency(path.clone(), import.path.clone());
            if !loaded.contains_key(&import.path) {
                queue.push_back(import.path.clone());
            }
        }
        loaded.insert(
            path.clone(),
            SourceModule {
                path,
                program,
                imports,
            },
        );
    }

    let order = graph.init_order(&entry).map_err(|error| match &error {
        GraphError::CircularDependency(cycle) => {
            let file = cycle.first().cloned().unwrap_or_else(|| entry.clone());
            let (line, column) = cycle
                .get(1)
                .and_then(|next| {
                    loaded
                        .get(&file)
                        .and_then(|m| m.imports.iter().find(|i| &i.path == next))
                })
                .map(|i| (i.line, i.column))
                .unwrap_or((0, 0));
            CompileError::new(DiagnosticCode::ImportCycle, error.to_string())
                .at(line, column)
                .in_file(&file)
        }
        GraphError::ModuleNotFound(path) => {
            CompileError::new(DiagnosticCode::ModuleNotFound, error.to_string()).in_file(path)
        }
    })?;

    let modules = order
        .into_iter()
        .filter_map(|path| loaded.remove(&path))
        .collect::<Vec<_>>();
    log::debug!(
        "module graph built: {} module(s), entry {}",
        modules.len(),
        entry.display()
    );
    Ok(ModuleSet { modules })
}

fn collect_imports(
    program: &Program,
    path: &Path,
    resolver: &ModuleResolver<'_>,
) -> CompileResult<Vec<ModuleImport>> {
    let mut imports = Vec::new();
    for stmt in &program.statements {
        let StmtKind::Import {
            source,
            named_bindings,
            default_binding,
            namespace_binding,
        } = &stmt.kind
        else {
            continue;
        };
        let fail = |code: DiagnosticCode, message: String| {
            CompileError::new(code, message)
                .at(stmt.line, stmt.column)
                .in_file(path)
        };

        if !is_relative(source) {
            return Err(fail(
                DiagnosticCode::ImportNonRelative,
                format!("import of `{}` is not relative", source),
            )
            .with_guidance("Import other source files with a `./` or `../` path"));
        }
        if let Some(name) = default_binding {
            return Err(fail(
                DiagnosticCode::ImportDefault,
                format!("default import `{}` from `{}`", name, source),
            )
            .with_guidance("Use a named import: import { name } from \"...\""));
        }
        if let Some(name) = namespace_binding {
            return Err(fail(
                DiagnosticCode::ImportNamespace,
                format!("namespace import `* as {}` from `{}`", name, source),
            )
            .with_guidance("Import the needed names individually"));
        }
        if let Some(binding) = named_bindings.iter().find(|b| b.imported != b.local) {
            return Err(fail(
                DiagnosticCode::ImportAlias,
                format!(
                    "aliased import `{} as {}` from `{}`",
                    binding.imported, binding.local, source
                ),
            )
            .with_guidance("Import the name as exported, or alias it on the export side"));
        }

        let resolved = resolver.resolve(source, path).map_err(|e| match e {
            ResolveError::NonRelative(_) => fail(DiagnosticCode::ImportNonRelative, e.to_string()),
            ResolveError::ModuleNotFound { .. } => {
                fail(DiagnosticCode::ModuleNotFound, e.to_string())
            }
        })?;
        imports.push(ModuleImport {
            path: resolved,
            names: named_bindings.iter().map(|b| b.imported.clone()).collect(),
            line: stmt.line,
            column: stmt.column,
        });
    }
    Ok(imports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::frontend::StaticFrontEnd;

    fn code_of(fe: &StaticFrontEnd) -> DiagnosticCode {
        load_modules(Path::new("/p/main.ts"), fe).unwrap_err().code
    }

    #[test]
    fn test_loads_in_init_order() {
        let fe = StaticFrontEnd::new()
            .with(
                "/p/main.ts",
                Program::new(vec![import("./a", &["x"]), import("./b", &["y"])]),
            )
            .with(
                "/p/a.ts",
                Program::new(vec![export(const_("x", num(1.0)))]),
            )
            .with(
                "/p/b.ts",
                Program::new(vec![import("./a", &["x"]), export(const_("y", var("x")))]),
            );
        let set = load_modules(Path::new("/p/main.ts"), &fe).unwrap();
        let paths: Vec<_> = set.modules.iter().map(|m| m.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/p/a.ts"),
                PathBuf::from("/p/b.ts"),
                PathBuf::from("/p/main.ts")
            ]
        );
        assert_eq!(set.entry().unwrap().imports.len(), 2);
    }

    #[test]
    fn test_rejected_import_forms_have_distinct_codes() {
        let with = |stmt| {
            StaticFrontEnd::new()
                .with("/p/main.ts", Program::new(vec![stmt]))
                .with("/p/m.ts", Program::default())
        };
        assert_eq!(code_of(&with(import("lodash", &["x"]))), DiagnosticCode::ImportNonRelative);
        assert_eq!(code_of(&with(import_as("./m", "x", "y"))), DiagnosticCode::ImportAlias);
        assert_eq!(code_of(&with(import_default("./m", "d"))), DiagnosticCode::ImportDefault);
        assert_eq!(code_of(&with(import_namespace("./m", "ns"))), DiagnosticCode::ImportNamespace);
        assert_eq!(code_of(&with(import("./nope", &["x"]))), DiagnosticCode::ModuleNotFound);
    }

    #[test]
    fn test_cycle_is_fatal() {
        let fe = StaticFrontEnd::new()
            .with("/p/main.ts", Program::new(vec![import_side_effect("./a")]))
            .with("/p/a.ts", Program::new(vec![import_side_effect("./b")]))
            .with("/p/b.ts", Program::new(vec![import_side_effect("./a")]));
        let err = load_modules(Path::new("/p/main.ts"), &fe).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::ImportCycle);
        assert!(err.message.contains("a.ts -> b.ts -> a.ts"), "{}", err.message);
    }
}
