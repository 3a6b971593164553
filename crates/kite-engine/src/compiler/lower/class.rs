//! Class Lowering
//!
//! Classes are registered program-wide before any body is lowered, so a
//! subclass can name a parent imported from another module. Registration
//! fixes each class's parent, its instance layout (inherited fields first)
//! and the parameter list a synthesized constructor forwards to `super`.

use super::{FunctionSpec, Lowerer};
use crate::ast::{ClassNode, Param, Stmt, StmtKind};
use crate::compiler::bytecode::DeclarationKind;
use crate::compiler::error::{CompileError, CompileResult, DiagnosticCode};
use crate::compiler::ir::{
    ClassId, DeclarationInfo, FunctionId, FunctionKind, GlobalId, IrClass, IrExpr, IrProgram,
    IrStmt, IrStmtKind, SiteId, SourcePos, Var,
};
use crate::compiler::module::{ModuleScope, ModuleSet};
use rustc_hash::{FxHashMap, FxHashSet};

/// Program-wide class table built before lowering
#[derive(Debug, Default)]
pub struct ClassRegistry {
    by_global: FxHashMap<GlobalId, ClassId>,
    ctor_params: Vec<Vec<String>>,
}

impl ClassRegistry {
    /// Class held by a module global
    pub fn class_of(&self, global: GlobalId) -> Option<ClassId> {
        self.by_global.get(&global).copied()
    }

    /// Parameters of the class's constructor (explicit or inherited)
    pub fn constructor_params(&self, class: ClassId) -> &[String] {
        self.ctor_params
            .get(class.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

struct Pending<'n> {
    class: ClassId,
    module: usize,
    node: &'n ClassNode,
    line: u32,
    column: u32,
}

/// Create the skeleton of every top-level class, resolve parents and
/// compute layouts
pub(super) fn register_classes(
    set: &ModuleSet,
    scopes: &[ModuleScope],
    program: &mut IrProgram,
) -> CompileResult<ClassRegistry> {
    let mut registry = ClassRegistry::default();
    let mut pending = Vec::new();

    for (index, module) in set.modules.iter().enumerate() {
        for stmt in &module.program.statements {
            let inner = match &stmt.kind {
                StmtKind::Export { declaration } => declaration.as_ref(),
                _ => stmt,
            };
            let StmtKind::Class { declaration } = &inner.kind else {
                continue;
            };
            let Some(binding) = scopes[index].get(&declaration.name) else {
                continue;
            };
            let error = |code, message: String| {
                CompileError::new(code, message)
                    .at(inner.line, inner.column)
                    .in_file(&module.path)
            };

            let mut own_fields: Vec<String> = Vec::new();
            for field in &declaration.fields {
                if own_fields.contains(&field.name) {
                    return Err(error(
                        DiagnosticCode::DuplicateDeclaration,
                        format!("field `{}` is declared more than once in `{}`", field.name, declaration.name),
                    ));
                }
                own_fields.push(field.name.clone());
            }

            let id = ClassId(program.classes.len() as u32);
            program.classes.push(IrClass {
                id,
                name: declaration.name.clone(),
                parent: None,
                own_fields,
                fields: Vec::new(),
                constructor: FunctionId(u32::MAX),
                own_methods: Vec::new(),
                methods: Vec::new(),
                global: binding.global,
                decorators: declaration.decorators.clone(),
                pos: SourcePos {
                    file: index as u32,
                    line: inner.line,
                    column: inner.column,
                },
            });
            registry.by_global.insert(binding.global, id);
            pending.push(Pending {
                class: id,
                module: index,
                node: declaration,
                line: inner.line,
                column: inner.column,
            });
        }
    }

    for item in &pending {
        let Some(parent_name) = &item.node.super_class_name else {
            continue;
        };
        let parent = scopes[item.module]
            .get(parent_name)
            .and_then(|b| registry.class_of(b.global));
        match parent {
            Some(parent) => program.classes[item.class.index()].parent = Some(parent),
            None => {
                return Err(CompileError::new(
                    DiagnosticCode::MissingSuperclass,
                    format!(
                        "superclass `{}` of `{}` is not a class declared at module level",
                        parent_name, item.node.name
                    ),
                )
                .at(item.line, item.column)
                .in_file(&set.modules[item.module].path))
            }
        }
    }

    let explicit: Vec<Option<Vec<String>>> = pending
        .iter()
        .map(|p| {
            p.node
                .constructor_method
                .as_ref()
                .map(|c| c.parameters.iter().map(|param| param.name.clone()).collect())
        })
        .collect();
    registry.ctor_params = vec![Vec::new(); pending.len()];
    let mut state = vec![Mark::Unvisited; pending.len()];
    for item in &pending {
        layout(program, &mut registry, &explicit, &mut state, item.class).map_err(|name| {
            CompileError::new(
                DiagnosticCode::MissingSuperclass,
                format!("class hierarchy of `{}` is cyclic", name),
            )
            .at(item.line, item.column)
            .in_file(&set.modules[item.module].path)
        })?;
    }
    Ok(registry)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Compute fields and constructor parameters of `class`, parents first.
/// Fails with the class name when the hierarchy is cyclic.
fn layout(
    program: &mut IrProgram,
    registry: &mut ClassRegistry,
    explicit: &[Option<Vec<String>>],
    state: &mut [Mark],
    class: ClassId,
) -> Result<(), String> {
    match state[class.index()] {
        Mark::Done => return Ok(()),
        Mark::Visiting => return Err(program.class(class).name.clone()),
        Mark::Unvisited => {}
    }
    state[class.index()] = Mark::Visiting;

    let (mut fields, inherited_params) = match program.class(class).parent {
        Some(parent) => {
            layout(program, registry, explicit, state, parent)?;
            (
                program.class(parent).fields.clone(),
                registry.ctor_params[parent.index()].clone(),
            )
        }
        None => (Vec::new(), Vec::new()),
    };
    for field in &program.class(class).own_fields {
        if !fields.contains(field) {
            fields.push(field.clone());
        }
    }
    program.classes[class.index()].fields = fields;
    registry.ctor_params[class.index()] = explicit[class.index()]
        .clone()
        .unwrap_or(inherited_params);
    state[class.index()] = Mark::Done;
    Ok(())
}

/// Fill every class's method table: inherited entries first, overridden in
/// place by the class's own methods
pub(super) fn resolve_method_tables(program: &mut IrProgram) {
    let mut done = vec![false; program.classes.len()];
    for index in 0..program.classes.len() {
        resolve_methods(program, &mut done, ClassId(index as u32));
    }
}

fn resolve_methods(program: &mut IrProgram, done: &mut [bool], class: ClassId) {
    if done[class.index()] {
        return;
    }
    done[class.index()] = true;
    let mut methods = match program.class(class).parent {
        Some(parent) => {
            resolve_methods(program, done, parent);
            program.class(parent).methods.clone()
        }
        None => Vec::new(),
    };
    for (name, function) in &program.class(class).own_methods {
        match methods.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = *function,
            None => methods.push((name.clone(), *function)),
        }
    }
    program.classes[class.index()].methods = methods;
}

impl<'a> Lowerer<'a> {
    /// Lower a top-level class declaration into its constructor and method
    /// functions, returning the statement that binds the class value
    pub(super) fn lower_class(&mut self, stmt: &Stmt, node: &ClassNode) -> CompileResult<Vec<IrStmt>> {
        let (line, column) = (stmt.line, stmt.column);
        if !self.scopes.at_module_level() {
            return Err(self
                .error(
                    DiagnosticCode::ClassNested,
                    format!("class `{}` must be declared at module top level", node.name),
                    line,
                    column,
                )
                .with_guidance("Move the class declaration to the top level of the module"));
        }
        let Some(class) = self
            .module
            .get(&node.name)
            .and_then(|b| self.registry.class_of(b.global))
        else {
            return Err(self.error(
                DiagnosticCode::Unresolved,
                format!("class `{}` is not registered", node.name),
                line,
                column,
            ));
        };
        let global = self.program.class(class).global;
        let parent = self.program.class(class).parent;

        self.check_decorators(&node.name, &node.decorators, &[], line, column)?;

        // Constructor
        let synthesized: Vec<Param> = self
            .registry
            .constructor_params(class)
            .iter()
            .map(|name| Param::from(name.as_str()))
            .collect();
        let (params, ctor_body, ctor_decorators) = match &node.constructor_method {
            Some(ctor) => {
                self.check_decorators(&node.name, &ctor.decorators, &ctor.parameters, line, column)?;
                (&ctor.parameters[..], &ctor.body[..], &ctor.decorators[..])
            }
            None => (&synthesized[..], &[][..], &[][..]),
        };
        let constructor = self.begin_function(&FunctionSpec {
            name: format!("{}.constructor", node.name),
            params,
            is_async: false,
            lexical_this: false,
            kind: FunctionKind::Constructor,
            decorators: ctor_decorators,
            class: Some(class),
            line,
            column,
        })?;
        let body = self.lower_constructor_body(node, parent, params, ctor_body, line, column);
        let body = match body {
            Ok(body) => body,
            Err(e) => {
                self.end_function(constructor, Vec::new());
                return Err(e);
            }
        };
        self.end_function(constructor, body);

        // Methods
        let mut own_methods: Vec<(String, FunctionId)> = Vec::new();
        let mut seen = FxHashSet::default();
        for method in &node.methods {
            if !seen.insert(method.name.as_str()) {
                return Err(self.error(
                    DiagnosticCode::DuplicateDeclaration,
                    format!("method `{}` is declared more than once in `{}`", method.name, node.name),
                    line,
                    column,
                ));
            }
            let qualified = format!("{}.{}", node.name, method.name);
            self.check_decorators(&qualified, &method.decorators, &method.parameters, line, column)?;
            let id = self.lower_function(
                FunctionSpec {
                    name: qualified,
                    params: &method.parameters,
                    is_async: method.is_async,
                    lexical_this: false,
                    kind: FunctionKind::Method,
                    decorators: &method.decorators,
                    class: Some(class),
                    line,
                    column,
                },
                &method.body,
            )?;
            own_methods.push((method.name.clone(), id));
        }

        if self.is_entry_module {
            let exported = self.is_exported(global);
            let declarations = &mut self.program.declarations;
            declarations.push(DeclarationInfo {
                kind: DeclarationKind::Class,
                name: node.name.clone(),
                owner: None,
                function: None,
                class: Some(class),
                exported,
            });
            declarations.push(DeclarationInfo {
                kind: DeclarationKind::Constructor,
                name: "constructor".to_string(),
                owner: Some(node.name.clone()),
                function: Some(constructor),
                class: Some(class),
                exported,
            });
            for (name, id) in &own_methods {
                declarations.push(DeclarationInfo {
                    kind: DeclarationKind::Method,
                    name: name.clone(),
                    owner: Some(node.name.clone()),
                    function: Some(*id),
                    class: Some(class),
                    exported,
                });
            }
        }

        let info = &mut self.program.classes[class.index()];
        info.constructor = constructor;
        info.own_methods = own_methods;

        Ok(vec![IrStmt::new(
            IrStmtKind::Expr(IrExpr::Store(Var::Global(global), IrExpr::Class(class).boxed())),
            self.pos(line, column),
        )])
    }

    /// Parent construction, then field initializers on `this`, then the
    /// written body
    fn lower_constructor_body(
        &mut self,
        node: &ClassNode,
        parent: Option<ClassId>,
        params: &[Param],
        body: &[Stmt],
        line: u32,
        column: u32,
    ) -> CompileResult<Vec<IrStmt>> {
        let mut prefix = Vec::new();
        let mut rest = body;
        if let Some(parent) = parent {
            let args = if node.constructor_method.is_some() {
                let Some((first, tail)) = body.split_first() else {
                    return Err(self.super_missing(node, line, column));
                };
                let StmtKind::SuperCall { arguments } = &first.kind else {
                    return Err(self.super_missing(node, line, column));
                };
                rest = tail;
                self.lower_args(arguments)?
            } else {
                let mut args = Vec::with_capacity(params.len());
                for param in params {
                    if let Some(binding) = self.scopes.resolve(self.program, &param.name) {
                        args.push(IrExpr::Load(Var::Binding(binding)));
                    }
                }
                args
            };
            prefix.push(IrStmt::new(
                IrStmtKind::SuperCall {
                    class: parent,
                    args,
                },
                self.pos(line, column),
            ));
        }

        for field in &node.fields {
            let Some(initializer) = &field.initializer else {
                continue;
            };
            let value = self.lower_expr(initializer)?;
            let this = match self.scopes.resolve_this(self.program) {
                Some(binding) => IrExpr::Load(Var::Binding(binding)),
                None => IrExpr::Undefined,
            };
            prefix.push(IrStmt::new(
                IrStmtKind::Expr(IrExpr::SetProp {
                    object: this.boxed(),
                    name: field.name.clone(),
                    site: SiteId::UNPLANNED,
                    value: value.boxed(),
                }),
                self.pos(initializer.line, initializer.column),
            ));
        }
        self.lower_scoped(rest, prefix)
    }

    fn super_missing(&self, node: &ClassNode, line: u32, column: u32) -> CompileError {
        self.error(
            DiagnosticCode::SuperMissing,
            format!("constructor of derived class `{}` must start with `super(..)`", node.name),
            line,
            column,
        )
        .with_guidance("Call `super(..)` as the first statement of the constructor")
    }
}
