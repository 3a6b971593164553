//! Reflective dispatchers
//!
//! `$invoke(name, args)` calls a top-level function of the entry module by
//! name; `$invokeClass(className, methodName, ctorArgs, args)` constructs a
//! class of the entry module and calls one of its methods. Both throw a
//! `TypeError` for unknown names.

use crate::compiler::bytecode::Builtin;
use crate::compiler::ir::{
    BinaryOp, BindingId, BindingKind, FunctionId, FunctionKind, GlobalId, IrExpr, IrFunction,
    IrProgram, IrStmt, IrStmtKind, SourcePos, Var,
};

/// Build `$invoke` over `functions` (name, global)
pub(super) fn build_invoke(
    program: &mut IrProgram,
    functions: &[(String, GlobalId)],
    pos: SourcePos,
) -> FunctionId {
    let (id, params) = dispatcher(program, "$invoke", &["name", "args"], pos);
    let (name, args) = (params[0], params[1]);

    let mut body = Vec::with_capacity(functions.len() + 1);
    for (function, global) in functions {
        let call = IrExpr::Call {
            callee: IrExpr::Load(Var::Global(*global)).boxed(),
            args: vec![IrExpr::Spread(load(args).boxed())],
            optional: false,
        };
        body.push(dispatch_arm(name, function, call, pos));
    }
    body.push(unknown(name, "Unknown function: ", pos));
    program.function_mut(id).body = body;
    id
}

/// Build `$invokeClass` over `classes` (name, global)
pub(super) fn build_invoke_class(
    program: &mut IrProgram,
    classes: &[(String, GlobalId)],
    pos: SourcePos,
) -> FunctionId {
    let (id, params) = dispatcher(
        program,
        "$invokeClass",
        &["className", "methodName", "ctorArgs", "args"],
        pos,
    );
    let (class_name, method_name, ctor_args, args) = (params[0], params[1], params[2], params[3]);

    let mut body = Vec::with_capacity(classes.len() + 1);
    for (class, global) in classes {
        let instance = IrExpr::New {
            constructor: IrExpr::Load(Var::Global(*global)).boxed(),
            args: vec![IrExpr::Spread(load(ctor_args).boxed())],
        };
        let call = IrExpr::CallIndex {
            receiver: instance.boxed(),
            key: load(method_name).boxed(),
            args: vec![IrExpr::Spread(load(args).boxed())],
        };
        body.push(dispatch_arm(class_name, class, call, pos));
    }
    body.push(unknown(class_name, "Unknown class: ", pos));
    program.function_mut(id).body = body;
    id
}

fn dispatcher(
    program: &mut IrProgram,
    name: &str,
    params: &[&str],
    pos: SourcePos,
) -> (FunctionId, Vec<BindingId>) {
    let id = program.next_function_id();
    let this = program.new_binding("this", BindingKind::This, id);
    let mut function = IrFunction::new(id, name, FunctionKind::Invoke, this);
    function.pos = pos;
    for param in params {
        let binding = program.new_binding(*param, BindingKind::Param, id);
        function.params.push(binding);
        function.param_names.push(param.to_string());
        function.param_decorators.push(Vec::new());
    }
    let bindings = function.params.clone();
    program.add_function(function);
    (id, bindings)
}

fn load(binding: BindingId) -> IrExpr {
    IrExpr::Load(Var::Binding(binding))
}

/// `if (selector === "name") return call;`
fn dispatch_arm(selector: BindingId, name: &str, call: IrExpr, pos: SourcePos) -> IrStmt {
    IrStmt::new(
        IrStmtKind::If {
            condition: IrExpr::Binary(
                BinaryOp::StrictEq,
                load(selector).boxed(),
                IrExpr::String(name.to_string()).boxed(),
            ),
            then_branch: vec![IrStmt::new(IrStmtKind::Return(Some(call)), pos)],
            else_branch: Vec::new(),
        },
        pos,
    )
}

/// `throw new TypeError(prefix + selector);`
fn unknown(selector: BindingId, prefix: &str, pos: SourcePos) -> IrStmt {
    IrStmt::new(
        IrStmtKind::Throw(IrExpr::New {
            constructor: IrExpr::Builtin(Builtin::TypeError).boxed(),
            args: vec![IrExpr::Binary(
                BinaryOp::Add,
                IrExpr::String(prefix.to_string()).boxed(),
                load(selector).boxed(),
            )],
        }),
        pos,
    )
}
