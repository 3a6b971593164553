//! AST to IR Lowering
//!
//! Converts the linked modules' normalized trees into one `IrProgram`.
//! Every module's top-level code is concatenated, in initialization order,
//! into the program's entry function; top-level function declarations of all
//! modules are instantiated before any module body runs.

mod class;
mod dispatch;
mod expr;
mod stmt;

pub use class::ClassRegistry;

use crate::ast::{Decorator, Param, Stmt, StmtKind};
use crate::compiler::error::{CompileError, CompileResult, DiagnosticCode};
use crate::compiler::ir::{
    BindingId, BindingKind, ClassId, DeclarationInfo, FunctionId, FunctionKind, GlobalId,
    IrExpr, IrFunction, IrProgram, IrStmt, IrStmtKind, ModuleInfo, SourcePos, Var,
};
use crate::compiler::bytecode::DeclarationKind;
use crate::compiler::module::{link_modules, ModuleScope, ModuleSet};
use crate::compiler::scope::ScopeStack;
use rustc_hash::FxHashSet;
use std::path::Path;

/// Lower every module of `set` into one program named `name`
pub fn lower_program(set: &ModuleSet, name: &str) -> CompileResult<IrProgram> {
    let mut program = IrProgram::new(name);
    program.source_files = set
        .modules
        .iter()
        .map(|m| m.path.display().to_string())
        .collect();
    let scopes = link_modules(set, &mut program)?;

    let main = program.next_function_id();
    let main_this = program.new_binding("this", BindingKind::This, main);
    program.add_function(IrFunction::new(main, "main", FunctionKind::Entry, main_this));
    program.entry = Some(main);

    let registry = class::register_classes(set, &scopes, &mut program)?;

    let mut prelude = Vec::new();
    let mut body = Vec::new();
    let last = set.modules.len().saturating_sub(1);
    for (index, module) in set.modules.iter().enumerate() {
        program.modules.push(ModuleInfo {
            path: module.path.display().to_string(),
            file: index as u32,
        });
        let mut lowerer = Lowerer {
            program: &mut program,
            scopes: ScopeStack::new(),
            module: &scopes[index],
            registry: &registry,
            path: &module.path,
            file: index as u32,
            is_entry_module: index == last,
        };
        lowerer.lower_module(&module.program.statements, main, main_this, &mut prelude, &mut body)?;
    }
    prelude.append(&mut body);
    program.function_mut(main).body = prelude;

    class::resolve_method_tables(&mut program);

    if let Some(entry) = set.entry() {
        let scope = &scopes[last];
        let mut functions = Vec::new();
        let mut classes = Vec::new();
        for stmt in &entry.program.statements {
            let inner = match &stmt.kind {
                StmtKind::Export { declaration } => declaration.as_ref(),
                _ => stmt,
            };
            match &inner.kind {
                StmtKind::Function { declaration } => {
                    if let Some(b) = scope.get(&declaration.name) {
                        functions.push((declaration.name.clone(), b.global));
                    }
                }
                StmtKind::Class { declaration } => {
                    if let Some(b) = scope.get(&declaration.name) {
                        classes.push((declaration.name.clone(), b.global));
                    }
                }
                _ => {}
            }
        }
        let pos = SourcePos {
            file: last as u32,
            line: 0,
            column: 0,
        };
        program.invoke = Some(dispatch::build_invoke(&mut program, &functions, pos));
        program.invoke_class = Some(dispatch::build_invoke_class(&mut program, &classes, pos));
    }

    log::debug!(
        "lowered {} function(s), {} class(es), {} global(s)",
        program.functions.len(),
        program.classes.len(),
        program.globals.len()
    );
    Ok(program)
}

/// What a function lowering needs to know about its source
pub(super) struct FunctionSpec<'n> {
    pub name: String,
    pub params: &'n [Param],
    pub is_async: bool,
    pub lexical_this: bool,
    pub kind: FunctionKind,
    pub decorators: &'n [Decorator],
    pub class: Option<ClassId>,
    pub line: u32,
    pub column: u32,
}

/// Lowers the statements of one module
pub(super) struct Lowerer<'a> {
    program: &'a mut IrProgram,
    scopes: ScopeStack,
    module: &'a ModuleScope,
    registry: &'a ClassRegistry,
    path: &'a Path,
    file: u32,
    is_entry_module: bool,
}

impl<'a> Lowerer<'a> {
    fn lower_module(
        &mut self,
        statements: &[Stmt],
        main: FunctionId,
        main_this: BindingId,
        prelude: &mut Vec<IrStmt>,
        body: &mut Vec<IrStmt>,
    ) -> CompileResult<()> {
        // Top-level `await` is allowed; the async transform decides whether
        // the entry function really suspends
        self.scopes.push_function(main, main_this, false, true);
        for stmt in statements {
            let (inner, exported) = match &stmt.kind {
                StmtKind::Export { declaration } => (declaration.as_ref(), true),
                _ => (stmt, false),
            };
            if let StmtKind::Function { declaration } = &inner.kind {
                let Some(binding) = self.module.get(&declaration.name) else {
                    continue;
                };
                self.check_decorators(
                    &declaration.name,
                    &declaration.decorators,
                    &declaration.parameters,
                    inner.line,
                    inner.column,
                )?;
                let id = self.lower_function(
                    FunctionSpec {
                        name: declaration.name.clone(),
                        params: &declaration.parameters,
                        is_async: declaration.is_async,
                        lexical_this: false,
                        kind: FunctionKind::Declaration,
                        decorators: &declaration.decorators,
                        class: None,
                        line: inner.line,
                        column: inner.column,
                    },
                    &declaration.body,
                )?;
                let pos = self.pos(inner.line, inner.column);
                prelude.push(IrStmt::new(
                    IrStmtKind::Expr(IrExpr::Store(
                        Var::Global(binding.global),
                        IrExpr::Closure(id).boxed(),
                    )),
                    pos,
                ));
                if self.is_entry_module {
                    self.program.declarations.push(DeclarationInfo {
                        kind: DeclarationKind::Function,
                        name: declaration.name.clone(),
                        owner: None,
                        function: Some(id),
                        class: None,
                        exported: exported || self.is_exported(binding.global),
                    });
                }
                continue;
            }
            body.extend(self.lower_top_level(inner)?);
        }
        self.scopes.pop_function();
        Ok(())
    }

    /// Whether the module exports the binding under any name
    fn is_exported(&self, global: GlobalId) -> bool {
        self.module.exports.values().any(|g| *g == global)
    }

    // ========================================================================
    // Functions
    // ========================================================================

    /// Create a function, enter its scope and declare its parameters
    fn begin_function(&mut self, spec: &FunctionSpec<'_>) -> CompileResult<FunctionId> {
        let id = self.program.next_function_id();
        let this = self.program.new_binding("this", BindingKind::This, id);
        let mut function = IrFunction::new(id, spec.name.clone(), spec.kind, this);
        function.is_async = spec.is_async;
        function.lexical_this = spec.lexical_this;
        function.parent = self.scopes.current_function();
        function.class = spec.class;
        function.pos = self.pos(spec.line, spec.column);
        function.decorators = spec.decorators.to_vec();
        function.param_names = spec.params.iter().map(|p| p.name.clone()).collect();
        function.param_decorators = spec.params.iter().map(|p| p.decorators.clone()).collect();
        self.program.add_function(function);

        self.scopes
            .push_function(id, this, spec.lexical_this, spec.is_async);
        self.scopes.push_block();
        for param in spec.params {
            let binding = self.program.new_binding(&param.name, BindingKind::Param, id);
            if !self.scopes.declare(&param.name, binding) {
                return Err(self.error(
                    DiagnosticCode::DuplicateDeclaration,
                    format!("duplicate parameter `{}` in `{}`", param.name, spec.name),
                    spec.line,
                    spec.column,
                ));
            }
            self.program.function_mut(id).params.push(binding);
        }
        Ok(id)
    }

    /// Leave the function scope and attach its body
    fn end_function(&mut self, id: FunctionId, body: Vec<IrStmt>) {
        self.scopes.pop_block();
        self.scopes.pop_function();
        self.program.function_mut(id).body = body;
    }

    fn lower_function(&mut self, spec: FunctionSpec<'_>, body: &[Stmt]) -> CompileResult<FunctionId> {
        let id = self.begin_function(&spec)?;
        let body = self.lower_scoped(body, Vec::new())?;
        self.end_function(id, body);
        Ok(id)
    }

    // ========================================================================
    // Blocks
    // ========================================================================

    /// Lower a statement list in a fresh block scope. `prefix` runs first,
    /// inside the scope.
    fn lower_scoped(&mut self, stmts: &[Stmt], prefix: Vec<IrStmt>) -> CompileResult<Vec<IrStmt>> {
        self.scopes.push_block();
        let result = self.lower_block_body(stmts, prefix);
        self.scopes.pop_block();
        let (bindings, body) = result?;
        if bindings.is_empty() {
            return Ok(body);
        }
        let pos = body.first().map(|s| s.pos).unwrap_or(SourcePos {
            file: self.file,
            line: 0,
            column: 0,
        });
        Ok(vec![IrStmt::new(IrStmtKind::Block { bindings, body }, pos)])
    }

    fn lower_block_body(
        &mut self,
        stmts: &[Stmt],
        prefix: Vec<IrStmt>,
    ) -> CompileResult<(Vec<BindingId>, Vec<IrStmt>)> {
        let mut bindings = Vec::new();
        for stmt in stmts {
            let (name, kind) = match &stmt.kind {
                StmtKind::Variable {
                    name,
                    declaration_kind,
                    ..
                } => (name.as_str(), BindingKind::from(*declaration_kind)),
                StmtKind::Function { declaration } => {
                    (declaration.name.as_str(), BindingKind::Function)
                }
                _ => continue,
            };
            let binding = self.new_local(name, kind);
            if !self.scopes.declare(name, binding) {
                return Err(self.error(
                    DiagnosticCode::DuplicateDeclaration,
                    format!("`{}` is declared more than once in this block", name),
                    stmt.line,
                    stmt.column,
                ));
            }
            bindings.push(binding);
        }

        let mut body = prefix;
        // Function declarations are hoisted to the top of their block
        for stmt in stmts {
            let StmtKind::Function { declaration } = &stmt.kind else {
                continue;
            };
            let id = self.lower_function(
                FunctionSpec {
                    name: declaration.name.clone(),
                    params: &declaration.parameters,
                    is_async: declaration.is_async,
                    lexical_this: false,
                    kind: FunctionKind::Declaration,
                    decorators: &declaration.decorators,
                    class: None,
                    line: stmt.line,
                    column: stmt.column,
                },
                &declaration.body,
            )?;
            let binding = self.scopes.resolve(self.program, &declaration.name);
            if let Some(binding) = binding {
                body.push(IrStmt::new(
                    IrStmtKind::Let {
                        binding,
                        value: Some(IrExpr::Closure(id)),
                    },
                    self.pos(stmt.line, stmt.column),
                ));
            }
        }
        for stmt in stmts {
            body.extend(self.lower_stmt(stmt)?);
        }
        Ok((bindings, body))
    }

    /// Create a binding owned by the current function
    fn new_local(&mut self, name: &str, kind: BindingKind) -> BindingId {
        let owner = self.scopes.current_function().unwrap_or(FunctionId(0));
        let binding = self.program.new_binding(name, kind, owner);
        self.program.function_mut(owner).locals.push(binding);
        binding
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn pos(&self, line: u32, column: u32) -> SourcePos {
        SourcePos {
            file: self.file,
            line,
            column,
        }
    }

    fn error(
        &self,
        code: DiagnosticCode,
        message: impl Into<String>,
        line: u32,
        column: u32,
    ) -> CompileError {
        CompileError::new(code, message)
            .at(line, column)
            .in_file(self.path)
    }

    /// Reject repeated markers on a declaration and multiple markers on one
    /// parameter
    fn check_decorators(
        &self,
        owner: &str,
        decorators: &[Decorator],
        params: &[Param],
        line: u32,
        column: u32,
    ) -> CompileResult<()> {
        let mut seen = FxHashSet::default();
        for decorator in decorators {
            if !seen.insert(decorator.name.as_str()) {
                return Err(self.error(
                    DiagnosticCode::DecoratorMultiple,
                    format!("decorator `@{}` is applied more than once to `{}`", decorator.name, owner),
                    line,
                    column,
                ));
            }
        }
        if let Some(param) = params.iter().find(|p| p.decorators.len() > 1) {
            return Err(self.error(
                DiagnosticCode::DecoratorMultiple,
                format!("parameter `{}` of `{}` has more than one decorator", param.name, owner),
                line,
                column,
            ));
        }
        Ok(())
    }
}
