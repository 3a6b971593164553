//! Code Generation
//!
//! Turns the lowered program into binary units. The entry unit holds the
//! initialization function, the reflective dispatchers, top-level function
//! declarations, class members and the class table. Each async function
//! gets its own `<Entry>$Async<n>` unit and each other closure its own
//! `<Entry>$Closure<n>` unit. Function ids are program-wide: entry unit
//! functions first, then every auxiliary unit in order.
//!
//! Every generated function is verified before the program is returned.

mod context;
mod control_flow;
mod emit;

use context::FunctionContext;

use crate::ast::Decorator;
use crate::compiler::bytecode::{
    verify_function, ClassDef, ConstantPool, Declaration, DecoratorEntry, Function, MethodEntry,
    Opcode, ProgramLimits, Unit, UnitKind,
};
use crate::compiler::error::{CompileError, CompileResult, DiagnosticCode};
use crate::compiler::ir::{FunctionId, FunctionKind, IrProgram};
use std::fmt::Write as _;
use std::path::Path;

/// Header line of the `.kmap` source map
pub const SOURCE_MAP_HEADER: &str = "KITE-SOURCE-MAP\t1";

/// File extension of the source map
pub const SOURCE_MAP_EXTENSION: &str = "kmap";

/// Units produced for one program
#[derive(Debug, Clone)]
pub struct GeneratedProgram {
    /// Entry unit first, then auxiliary units in function-id order
    pub units: Vec<Unit>,
    /// Text of the `<Entry>.kmap` source map
    pub source_map: String,
}

impl GeneratedProgram {
    /// The designated entry unit
    pub fn entry(&self) -> Option<&Unit> {
        self.units.first()
    }
}

struct PlannedUnit {
    name: String,
    kind: UnitKind,
    functions: Vec<FunctionId>,
}

/// Assignment of IR functions to units and final ids
pub(crate) struct UnitLayout {
    final_ids: Vec<u32>,
    units: Vec<PlannedUnit>,
}

impl UnitLayout {
    fn plan(program: &IrProgram) -> Self {
        let mut entry = PlannedUnit {
            name: program.name.clone(),
            kind: UnitKind::Entry,
            functions: Vec::new(),
        };
        let mut aux = Vec::new();
        let (mut closures, mut asyncs) = (0, 0);
        for function in &program.functions {
            let kind = match function.kind {
                FunctionKind::Entry | FunctionKind::Invoke => UnitKind::Entry,
                _ if function.is_async => UnitKind::Async,
                FunctionKind::Expression => UnitKind::Closure,
                _ => UnitKind::Entry,
            };
            let counter = match kind {
                UnitKind::Entry => {
                    entry.functions.push(function.id);
                    continue;
                }
                UnitKind::Closure => &mut closures,
                UnitKind::Async => &mut asyncs,
            };
            *counter += 1;
            aux.push(PlannedUnit {
                name: format!("{}${}{}", program.name, kind.suffix(), counter),
                kind,
                functions: vec![function.id],
            });
        }

        let mut units = vec![entry];
        units.extend(aux);
        let mut final_ids = vec![0; program.functions.len()];
        let mut next = 0u32;
        for unit in &units {
            for id in &unit.functions {
                final_ids[id.index()] = next;
                next += 1;
            }
        }
        Self { final_ids, units }
    }

    /// Program-wide id of an IR function in the emitted units
    pub fn final_id(&self, id: FunctionId) -> u32 {
        self.final_ids[id.index()]
    }
}

/// Generate and verify every unit of `program`
pub fn generate(program: &IrProgram) -> CompileResult<GeneratedProgram> {
    let layout = UnitLayout::plan(program);
    let limits = ProgramLimits {
        function_count: program.functions.len() as u32,
        class_count: program.classes.len() as u32,
        global_count: program.globals.len() as u32,
        site_count: program.sites.len() as u32,
    };

    let mut units = Vec::with_capacity(layout.units.len());
    for planned in &layout.units {
        let mut unit = Unit::new(planned.name.clone(), planned.kind);
        for &id in &planned.functions {
            let function = generate_function(program, id, &layout, &mut unit.constants)?;
            verify_function(&function, &unit.constants, &limits).map_err(|error| {
                CompileError::new(
                    DiagnosticCode::Verify,
                    format!("`{}::{}` rejected by the verifier: {}", unit.name, function.name, error),
                )
                .in_file(Path::new(source_file(program, id)))
            })?;
            unit.functions.push(function);
        }
        unit.metadata.source_files = program.source_files.clone();
        unit.metadata.function_base = planned
            .functions
            .first()
            .map(|&id| layout.final_id(id))
            .unwrap_or_default();
        units.push(unit);
    }

    if let Some(entry) = units.first_mut() {
        fill_entry_tables(program, &layout, entry)?;
        entry.metadata.nested_units = layout.units[1..].iter().map(|u| u.name.clone()).collect();
    }

    let source_map = source_map(program, &units);
    log::debug!(
        "generated {} unit(s), {} function(s)",
        units.len(),
        program.functions.len()
    );
    Ok(GeneratedProgram { units, source_map })
}

fn source_file(program: &IrProgram, id: FunctionId) -> &str {
    program
        .source_files
        .get(program.function(id).pos.file as usize)
        .map(String::as_str)
        .unwrap_or_default()
}

fn generate_function(
    program: &IrProgram,
    id: FunctionId,
    layout: &UnitLayout,
    constants: &mut ConstantPool,
) -> CompileResult<Function> {
    let function = program.function(id);
    let mut ctx = FunctionContext::new(program, function, layout, constants)?;
    ctx.mark(function.pos);
    if function.is_async {
        let states: Vec<_> = (0..function.state_count.max(1)).map(|_| ctx.new_label()).collect();
        ctx.dispatch(&states)?;
        ctx.bind(states[0]);
        ctx.states = states;
    }
    ctx.emit_prologue()?;
    ctx.emit_block(&function.body)?;
    ctx.op(Opcode::ConstUndefined);
    ctx.op(Opcode::Return);
    ctx.finish()
}

fn decorator_entries(decorators: &[Decorator]) -> Vec<DecoratorEntry> {
    decorators
        .iter()
        .map(|d| DecoratorEntry {
            name: d.name.clone(),
            arguments: d.arguments.clone(),
        })
        .collect()
}

/// Class table, declarations and program-wide ids of the entry unit
fn fill_entry_tables(program: &IrProgram, layout: &UnitLayout, entry: &mut Unit) -> CompileResult<()> {
    for class in &program.classes {
        entry.classes.push(ClassDef {
            name: class.name.clone(),
            parent: class.parent.map(|p| p.0),
            own_fields: class.own_fields.clone(),
            fields: class.fields.clone(),
            constructor: layout.final_id(class.constructor),
            methods: class
                .methods
                .iter()
                .map(|(name, function)| MethodEntry {
                    name: name.clone(),
                    function: layout.final_id(*function),
                })
                .collect(),
        });
    }

    for info in &program.declarations {
        let declaration = match (info.function, info.class) {
            (Some(id), _) => {
                let function = program.function(id);
                Declaration {
                    kind: info.kind,
                    name: info.name.clone(),
                    owner: info.owner.clone(),
                    target: layout.final_id(id),
                    param_names: function.param_names.clone(),
                    decorators: decorator_entries(&function.decorators),
                    param_decorators: function
                        .param_decorators
                        .iter()
                        .map(|d| decorator_entries(d))
                        .collect(),
                    is_async: function.is_async,
                    exported: info.exported,
                }
            }
            (None, Some(class_id)) => {
                let class = program.class(class_id);
                let constructor = program.function(class.constructor);
                Declaration {
                    kind: info.kind,
                    name: info.name.clone(),
                    owner: None,
                    target: class_id.0,
                    param_names: constructor.param_names.clone(),
                    decorators: decorator_entries(&class.decorators),
                    param_decorators: constructor
                        .param_decorators
                        .iter()
                        .map(|d| decorator_entries(d))
                        .collect(),
                    is_async: false,
                    exported: info.exported,
                }
            }
            (None, None) => {
                return Err(CompileError::new(
                    DiagnosticCode::Verify,
                    format!("declaration `{}` has no target", info.name),
                ))
            }
        };
        entry.metadata.declarations.push(declaration);
    }

    let id_of = |id: Option<FunctionId>| id.map(|id| layout.final_id(id)).unwrap_or(u32::MAX);
    let metadata = &mut entry.metadata;
    metadata.globals = program.globals.iter().map(|g| g.name.clone()).collect();
    metadata.sites = program.sites.clone();
    metadata.entry_function = id_of(program.entry);
    metadata.invoke_function = id_of(program.invoke);
    metadata.invoke_class_function = id_of(program.invoke_class);
    metadata.total_functions = program.functions.len() as u32;
    Ok(())
}

/// One line per line-table entry: `unit function pc file line column`
fn source_map(program: &IrProgram, units: &[Unit]) -> String {
    let mut out = String::from(SOURCE_MAP_HEADER);
    out.push('\n');
    for unit in units {
        for function in &unit.functions {
            for entry in &function.lines {
                let file = program
                    .source_files
                    .get(entry.file as usize)
                    .map(String::as_str)
                    .unwrap_or("?");
                let _ = writeln!(
                    out,
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    unit.name, function.name, entry.offset, file, entry.line, entry.column
                );
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::bytecode::decode_all;
    use crate::compiler::ir::{
        BinaryOp, BindingKind, CatchClause, IrExpr, IrFunction, IrStmt, IrStmtKind, SourcePos,
        Var,
    };

    fn at(kind: IrStmtKind) -> IrStmt {
        IrStmt::new(kind, SourcePos { file: 0, line: 1, column: 1 })
    }

    fn program_with_main(body: Vec<IrStmt>) -> IrProgram {
        let mut program = IrProgram::new("MainProgram");
        program.source_files.push("main.ts".to_string());
        let id = program.next_function_id();
        let this = program.new_binding("this", BindingKind::This, id);
        let mut main = IrFunction::new(id, "main", FunctionKind::Entry, this);
        main.body = body;
        program.add_function(main);
        program.entry = Some(id);
        program
    }

    fn opcodes(function: &Function) -> Vec<Opcode> {
        decode_all(&function.code)
            .unwrap()
            .into_iter()
            .map(|i| i.opcode)
            .collect()
    }

    #[test]
    fn test_print_concat_generates_verified_entry() {
        let program = program_with_main(vec![at(IrStmtKind::Print(vec![IrExpr::Binary(
            BinaryOp::Add,
            IrExpr::String("total=".into()).boxed(),
            IrExpr::Number(20.0).boxed(),
        )]))]);
        let generated = generate(&program).unwrap();
        assert_eq!(generated.units.len(), 1);
        let main = &generated.units[0].functions[0];
        assert_eq!(
            opcodes(main),
            vec![
                Opcode::ConstString,
                Opcode::ConstNumber,
                Opcode::Add,
                Opcode::Print,
                Opcode::ConstUndefined,
                Opcode::Return
            ]
        );
        assert_eq!(main.max_stack, 2);
        assert!(generated.source_map.starts_with(SOURCE_MAP_HEADER));
        assert!(generated.source_map.contains("MainProgram\tmain\t0\tmain.ts\t1\t1"));
    }

    #[test]
    fn test_closures_get_their_own_units_and_capture_cells() {
        let mut program = program_with_main(Vec::new());
        let main = FunctionId(0);
        let counter = program.new_binding("count", BindingKind::Let, main);
        program.bindings[counter.index()].captured = true;
        program.function_mut(main).locals.push(counter);

        let inner = program.next_function_id();
        let inner_this = program.new_binding("this", BindingKind::This, inner);
        let mut closure = IrFunction::new(inner, "", FunctionKind::Expression, inner_this);
        closure.captures = vec![counter];
        closure.parent = Some(main);
        closure.body = vec![at(IrStmtKind::Return(Some(IrExpr::Load(Var::Binding(counter)))))];
        program.add_function(closure);

        program.function_mut(main).body = vec![at(IrStmtKind::Block {
            bindings: vec![counter],
            body: vec![
                at(IrStmtKind::Let {
                    binding: counter,
                    value: Some(IrExpr::Number(1.0)),
                }),
                at(IrStmtKind::Expr(IrExpr::Closure(inner))),
            ],
        })];

        let generated = generate(&program).unwrap();
        let names: Vec<_> = generated.units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["MainProgram", "MainProgram$Closure1"]);
        assert_eq!(generated.units[1].metadata.function_base, 1);
        assert_eq!(
            generated.units[0].metadata.nested_units,
            vec!["MainProgram$Closure1".to_string()]
        );
        let main_ops = opcodes(&generated.units[0].functions[0]);
        assert!(main_ops.starts_with(&[
            Opcode::NewCell,
            Opcode::ConstNumber,
            Opcode::StoreCell,
            Opcode::CaptureLocal,
            Opcode::MakeClosure
        ]));
        assert_eq!(opcodes(&generated.units[1].functions[0])[0], Opcode::LoadEnv);
    }

    #[test]
    fn test_async_function_starts_with_dispatch() {
        let mut program = program_with_main(Vec::new());
        let id = program.next_function_id();
        let this = program.new_binding("this", BindingKind::This, id);
        let mut f = IrFunction::new(id, "work", FunctionKind::Declaration, this);
        f.is_async = true;
        f.state_count = 2;
        program.add_function(f);
        let temp = program.new_temp(id);
        program.function_mut(id).body = vec![
            at(IrStmtKind::Await {
                target: temp,
                operand: IrExpr::Number(1.0),
                state: 1,
            }),
            at(IrStmtKind::Return(Some(IrExpr::Load(Var::Binding(temp))))),
        ];

        let generated = generate(&program).unwrap();
        assert_eq!(generated.units[1].name, "MainProgram$Async1");
        assert_eq!(generated.units[1].kind, UnitKind::Async);
        let work = &generated.units[1].functions[0];
        assert!(work.is_async());
        let ops = opcodes(work);
        assert_eq!(ops[0], Opcode::AsyncDispatch);
        assert!(ops.contains(&Opcode::Await));
        assert!(ops.contains(&Opcode::Resume));
    }

    #[test]
    fn test_try_finally_registers_innermost_handler_first() {
        let mut program = program_with_main(Vec::new());
        let e = program.new_binding("e", BindingKind::Catch, FunctionId(0));
        program.function_mut(FunctionId(0)).locals.push(e);
        program.function_mut(FunctionId(0)).body = vec![at(IrStmtKind::Try {
            body: vec![at(IrStmtKind::Throw(IrExpr::String("boom".into())))],
            catch: Some(CatchClause {
                binding: Some(e),
                body: vec![at(IrStmtKind::Print(vec![IrExpr::Load(Var::Binding(e))]))],
            }),
            finally: Some(vec![at(IrStmtKind::Print(vec![IrExpr::String("done".into())]))]),
        })];

        let generated = generate(&program).unwrap();
        let main = &generated.units[0].functions[0];
        assert_eq!(main.handlers.len(), 2);
        let (catch, rethrow) = (main.handlers[0], main.handlers[1]);
        assert!(rethrow.start <= catch.start && catch.end <= rethrow.end);
        assert!(catch.target < rethrow.target);
    }

    #[test]
    fn test_return_inside_try_finally_runs_finalizer_outside_region() {
        let mut program = program_with_main(Vec::new());
        let id = program.next_function_id();
        let this = program.new_binding("this", BindingKind::This, id);
        let mut f = IrFunction::new(id, "f", FunctionKind::Declaration, this);
        f.body = vec![at(IrStmtKind::Try {
            body: vec![at(IrStmtKind::Return(Some(IrExpr::Number(1.0))))],
            catch: None,
            finally: Some(vec![at(IrStmtKind::Print(vec![IrExpr::String("f".into())]))]),
        })];
        program.add_function(f);

        let generated = generate(&program).unwrap();
        let f = &generated.units[0].functions[1];
        let instructions = decode_all(&f.code).unwrap();
        let first_print = instructions
            .iter()
            .find(|i| i.opcode == Opcode::Print)
            .unwrap();
        assert!(f
            .handlers
            .iter()
            .all(|h| (first_print.offset as u32) < h.start || (first_print.offset as u32) >= h.end));
    }
}
