//! Module linking
//!
//! Gives every module-level declaration a program-wide global slot, builds
//! each module's export table and binds named imports to the exporter's
//! slot, so an importer observes later writes (live bindings).

use super::loader::{ModuleSet, SourceModule};
use crate::ast::{Stmt, StmtKind};
use crate::compiler::error::{CompileError, CompileResult, DiagnosticCode};
use crate::compiler::ir::{BindingKind, GlobalId, IrProgram};
use rustc_hash::FxHashMap;
use std::path::Path;

/// A module-level name visible inside one module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleBinding {
    /// Program-wide slot
    pub global: GlobalId,
    /// What introduced the name in this module
    pub kind: BindingKind,
}

/// Names visible at the top level of one module
#[derive(Debug, Clone, Default)]
pub struct ModuleScope {
    /// Local name to binding (declarations and imports)
    pub names: FxHashMap<String, ModuleBinding>,
    /// Exported name to slot
    pub exports: FxHashMap<String, GlobalId>,
}

impl ModuleScope {
    /// Look up a top-level name
    pub fn get(&self, name: &str) -> Option<ModuleBinding> {
        self.names.get(name).copied()
    }
}

/// Link every module of `set`, returning one scope per module (same order)
pub fn link_modules(set: &ModuleSet, program: &mut IrProgram) -> CompileResult<Vec<ModuleScope>> {
    let mut scopes: Vec<ModuleScope> = Vec::with_capacity(set.modules.len());
    let mut index_of: FxHashMap<&Path, usize> = FxHashMap::default();

    for (index, module) in set.modules.iter().enumerate() {
        let scope = link_module(module, program, &scopes, &index_of)?;
        scopes.push(scope);
        index_of.insert(module.path.as_path(), index);
    }
    Ok(scopes)
}

fn link_module(
    module: &SourceModule,
    program: &mut IrProgram,
    linked: &[ModuleScope],
    index_of: &FxHashMap<&Path, usize>,
) -> CompileResult<ModuleScope> {
    let path = module.path.as_path();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut scope = ModuleScope::default();

    // Imports first: exporters are linked already
    for import in &module.imports {
        let Some(&exporter) = index_of.get(import.path.as_path()) else {
            continue;
        };
        for name in &import.names {
            let global = linked[exporter].exports.get(name).copied().ok_or_else(|| {
                CompileError::new(
                    DiagnosticCode::ImportMissingExport,
                    format!("`{}` is not exported by {}", name, import.path.display()),
                )
                .at(import.line, import.column)
                .in_file(path)
            })?;
            define(
                &mut scope,
                name,
                ModuleBinding {
                    global,
                    kind: BindingKind::Import,
                },
                import.line,
                import.column,
                path,
            )?;
        }
    }

    for stmt in &module.program.statements {
        let (inner, exported) = match &stmt.kind {
            StmtKind::Export { declaration } => (declaration.as_ref(), true),
            _ => (stmt, false),
        };
        let Some((name, kind)) = declared_name(inner) else {
            if exported {
                return Err(CompileError::new(
                    DiagnosticCode::UnsupportedStatement,
                    format!("cannot export a {}", inner.kind_name()),
                )
                .at(stmt.line, stmt.column)
                .in_file(path));
            }
            continue;
        };
        let global = program.new_global(format!("{}:{}", stem, name), kind);
        define(
            &mut scope,
            name,
            ModuleBinding { global, kind },
            inner.line,
            inner.column,
            path,
        )?;
        if exported {
            export(&mut scope, name, global, stmt, path)?;
        }
    }

    for stmt in &module.program.statements {
        let StmtKind::ExportNamed { specifiers } = &stmt.kind else {
            continue;
        };
        for spec in specifiers {
            let binding = scope.get(&spec.local).ok_or_else(|| {
                CompileError::new(
                    DiagnosticCode::Unresolved,
                    format!("exported name `{}` is not declared", spec.local),
                )
                .at(stmt.line, stmt.column)
                .in_file(path)
            })?;
            export(&mut scope, &spec.exported, binding.global, stmt, path)?;
        }
    }
    Ok(scope)
}

/// Name and kind introduced by a top-level declaration
pub fn declared_name(stmt: &Stmt) -> Option<(&str, BindingKind)> {
    match &stmt.kind {
        StmtKind::Variable {
            name,
            declaration_kind,
            ..
        } => Some((name, BindingKind::from(*declaration_kind))),
        StmtKind::Function { declaration } => Some((&declaration.name, BindingKind::Function)),
        StmtKind::Class { declaration } => Some((&declaration.name, BindingKind::Class)),
        _ => None,
    }
}

fn define(
    scope: &mut ModuleScope,
    name: &str,
    binding: ModuleBinding,
    line: u32,
    column: u32,
    path: &Path,
) -> CompileResult<()> {
    if scope.names.insert(name.to_string(), binding).is_some() {
        return Err(CompileError::new(
            DiagnosticCode::DuplicateDeclaration,
            format!("`{}` is declared more than once at module level", name),
        )
        .at(line, column)
        .in_file(path));
    }
    Ok(())
}

fn export(
    scope: &mut ModuleScope,
    name: &str,
    global: GlobalId,
    stmt: &Stmt,
    path: &Path,
) -> CompileResult<()> {
    if scope.exports.insert(name.to_string(), global).is_some() {
        return Err(CompileError::new(
            DiagnosticCode::DuplicateExport,
            format!("`{}` is exported more than once", name),
        )
        .at(stmt.line, stmt.column)
        .in_file(path));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{build::*, Program};
    use crate::ast::build::export;
    use crate::compiler::module::load_modules;
    use crate::frontend::StaticFrontEnd;

    fn link(fe: &StaticFrontEnd) -> CompileResult<(IrProgram, Vec<ModuleScope>)> {
        let set = load_modules(Path::new("/p/main.ts"), fe)?;
        let mut program = IrProgram::new("MainProgram");
        let scopes = link_modules(&set, &mut program)?;
        Ok((program, scopes))
    }

    #[test]
    fn test_import_shares_exporter_slot() {
        let fe = StaticFrontEnd::new()
            .with("/p/main.ts", Program::new(vec![import("./counter", &["value"])]))
            .with(
                "/p/counter.ts",
                Program::new(vec![export(let_("value", num(0.0)))]),
            );
        let (program, scopes) = link(&fe).unwrap();
        let exported = scopes[0].exports["value"];
        let imported = scopes[1].get("value").unwrap();
        assert_eq!(imported.global, exported);
        assert_eq!(imported.kind, BindingKind::Import);
        assert_eq!(program.globals[exported.index()].name, "counter:value");
    }

    #[test]
    fn test_export_alias() {
        let fe = StaticFrontEnd::new()
            .with("/p/main.ts", Program::new(vec![import("./m", &["shown"])]))
            .with(
                "/p/m.ts",
                Program::new(vec![const_("hidden", num(1.0)), export_named(&[("hidden", "shown")])]),
            );
        let (_, scopes) = link(&fe).unwrap();
        assert_eq!(scopes[1].get("shown").unwrap().global, scopes[0].get("hidden").unwrap().global);
    }

    #[test]
    fn test_missing_export() {
        let fe = StaticFrontEnd::new()
            .with("/p/main.ts", Program::new(vec![import("./m", &["nope"])]))
            .with("/p/m.ts", Program::new(vec![const_("x", num(1.0))]));
        let err = link(&fe).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::ImportMissingExport);
        assert_eq!(err.file, "/p/main.ts");
    }

    #[test]
    fn test_duplicate_export_and_declaration() {
        let fe = StaticFrontEnd::new().with(
            "/p/main.ts",
            Program::new(vec![
                export(const_("a", num(1.0))),
                export_named(&[("a", "a")]),
            ]),
        );
        assert_eq!(link(&fe).unwrap_err().code, DiagnosticCode::DuplicateExport);

        let fe = StaticFrontEnd::new().with(
            "/p/main.ts",
            Program::new(vec![let_("a", num(1.0)), function("a", &[], vec![])]),
        );
        assert_eq!(link(&fe).unwrap_err().code, DiagnosticCode::DuplicateDeclaration);
    }
}
