//! Host builtins
//!
//! `console`, `Promise`, `queueMicrotask`, the error constructors and the
//! primitive conversion functions, plus the few methods arrays and
//! promises expose.

use crate::compiler::bytecode::Builtin;
use crate::vm::interpreter::{Abrupt, Completion, Vm};
use crate::vm::object::{Object, ObjectKind, Resolver};
use crate::vm::promise::{PromiseData, Reaction, Settled};
use crate::vm::runtime::to_number;
use crate::vm::scheduler::Microtask;
use crate::vm::value::{ObjRef, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Which builtin methods a receiver exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NativeReceiver {
    Console,
    PromiseConstructor,
    Promise,
    Array,
}

fn native_receiver(receiver: &Value) -> Option<NativeReceiver> {
    let object = receiver.as_object()?;
    let object = object.borrow();
    Some(match &object.kind {
        ObjectKind::Builtin(Builtin::Console) => NativeReceiver::Console,
        ObjectKind::Builtin(Builtin::Promise) => NativeReceiver::PromiseConstructor,
        ObjectKind::Promise(_) => NativeReceiver::Promise,
        ObjectKind::Array(_) => NativeReceiver::Array,
        _ => return None,
    })
}

fn native_methods(receiver: NativeReceiver) -> &'static [&'static str] {
    match receiver {
        NativeReceiver::Console => &["log", "info", "debug", "error", "warn"],
        NativeReceiver::PromiseConstructor => &["resolve", "reject"],
        NativeReceiver::Promise => &["then", "catch", "finally"],
        NativeReceiver::Array => &["push"],
    }
}

impl<'o> Vm<'o> {
    /// Create an error object with `name` and `message` properties
    pub(crate) fn make_error(&mut self, name: &str, message: &str) -> Value {
        let shape = self.shapes.with_property(crate::vm::object::ShapeId::ROOT, "name");
        let shape = self.shapes.with_property(shape, "message");
        let mut error = Object::with_shape(ObjectKind::Error, shape, 0);
        error.slots = vec![Value::from(name), Value::from(message)];
        Value::object(error)
    }

    /// Whether `receiver.name` is a builtin method
    pub(crate) fn has_native_method(&self, receiver: &Value, name: &str) -> bool {
        native_receiver(receiver).is_some_and(|kind| native_methods(kind).contains(&name))
    }

    /// Call a builtin method
    pub(crate) fn call_native_method(&mut self, receiver: &Value, name: &str, args: Vec<Value>) -> Completion {
        let Some(kind) = native_receiver(receiver).filter(|kind| native_methods(*kind).contains(&name)) else {
            return Err(self.type_error(format!("{} is not a function", name)));
        };
        match (kind, name) {
            (NativeReceiver::Console, "error" | "warn") => {
                let line = self.join_display(&args);
                writeln!(self.output.stderr, "{}", line)?;
                Ok(Value::Undefined)
            }
            (NativeReceiver::Console, _) => {
                let line = self.join_display(&args);
                writeln!(self.output.stdout, "{}", line)?;
                Ok(Value::Undefined)
            }
            (NativeReceiver::PromiseConstructor, "resolve") => {
                let value = args.into_iter().next().unwrap_or_default();
                if value.is_promise() {
                    return Ok(value);
                }
                let promise = self.new_promise();
                self.resolve_promise(&promise, value)?;
                Ok(Value::Object(promise))
            }
            (NativeReceiver::PromiseConstructor, _) => {
                let reason = args.into_iter().next().unwrap_or_default();
                let promise = self.new_promise();
                self.settle_promise(&promise, Settled::Rejected(reason))?;
                Ok(Value::Object(promise))
            }
            (NativeReceiver::Promise, method) => {
                let source = receiver.as_object().cloned().ok_or_else(|| self.type_error("not a promise"))?;
                let mut args = args.into_iter();
                let first = args.next().unwrap_or_default();
                let derived = self.new_promise();
                let reaction = match method {
                    "then" => Reaction::Then {
                        on_fulfilled: first,
                        on_rejected: args.next().unwrap_or_default(),
                        derived: derived.clone(),
                    },
                    "catch" => Reaction::Then {
                        on_fulfilled: Value::Undefined,
                        on_rejected: first,
                        derived: derived.clone(),
                    },
                    _ => Reaction::Finally {
                        callback: first,
                        derived: derived.clone(),
                    },
                };
                self.subscribe(&source, reaction)?;
                Ok(Value::Object(derived))
            }
            (NativeReceiver::Array, _) => {
                let Some(array) = receiver.as_object() else {
                    return Ok(Value::Undefined);
                };
                let mut array = array.borrow_mut();
                let ObjectKind::Array(items) = &mut array.kind else {
                    return Ok(Value::Undefined);
                };
                items.extend(args);
                Ok(Value::Number(items.len() as f64))
            }
        }
    }

    /// Call a builtin as a plain function
    pub(crate) fn call_builtin(&mut self, builtin: Builtin, args: Vec<Value>) -> Completion {
        let first = args.first().cloned().unwrap_or_default();
        match builtin {
            Builtin::QueueMicrotask => {
                if !first.is_callable() {
                    return Err(self.type_error(format!(
                        "The callback provided as parameter 1 is not a function: {}",
                        self.display(&first)
                    )));
                }
                self.scheduler.schedule(Microtask::Callback(first));
                Ok(Value::Undefined)
            }
            Builtin::Error | Builtin::TypeError => self.construct_builtin(builtin, args),
            Builtin::String => Ok(Value::from(self.display(&first))),
            Builtin::Number => Ok(Value::Number(if args.is_empty() { 0.0 } else { to_number(&first) })),
            Builtin::Boolean => Ok(Value::Bool(first.is_truthy())),
            Builtin::Promise => Err(self.type_error("Promise constructor cannot be invoked without 'new'")),
            Builtin::Console | Builtin::NaN | Builtin::Infinity => {
                Err(self.type_error(format!("{} is not a function", builtin.name())))
            }
        }
    }

    /// `new Builtin(args)`
    pub(crate) fn construct_builtin(&mut self, builtin: Builtin, args: Vec<Value>) -> Completion {
        let first = args.into_iter().next().unwrap_or_default();
        match builtin {
            Builtin::Promise => self.construct_promise(first),
            Builtin::Error | Builtin::TypeError => {
                let message = if first.is_nullish() {
                    String::new()
                } else {
                    self.display(&first)
                };
                Ok(self.make_error(builtin.name(), &message))
            }
            Builtin::String => Ok(Value::from(self.display(&first))),
            Builtin::Number => Ok(Value::Number(to_number(&first))),
            Builtin::Boolean => Ok(Value::Bool(first.is_truthy())),
            Builtin::Console | Builtin::QueueMicrotask | Builtin::NaN | Builtin::Infinity => {
                Err(self.type_error(format!("{} is not a constructor", builtin.name())))
            }
        }
    }

    /// `new Promise(executor)`: the executor runs synchronously with a
    /// `resolve`/`reject` pair; a throw from it rejects the promise
    fn construct_promise(&mut self, executor: Value) -> Completion {
        if !executor.is_callable() {
            return Err(self.type_error(format!(
                "Promise resolver {} is not a function",
                self.display(&executor)
            )));
        }
        let promise = Rc::new(RefCell::new(Object::new(ObjectKind::Promise(PromiseData::new()))));
        let done = Rc::new(Cell::new(false));
        let resolve = resolver(&promise, false, &done);
        let reject = resolver(&promise, true, &done);
        match self.call_value(&executor, Value::Undefined, vec![resolve, reject]) {
            Ok(_) => {}
            Err(Abrupt::Throw(thrown)) => {
                if !done.replace(true) {
                    self.settle_promise(&promise, Settled::Rejected(thrown))?;
                }
            }
            Err(error) => return Err(error),
        }
        Ok(Value::Object(promise))
    }

    fn join_display(&self, values: &[Value]) -> String {
        values
            .iter()
            .map(|v| self.display(v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn resolver(promise: &ObjRef, reject: bool, done: &Rc<Cell<bool>>) -> Value {
    Value::object(Object::new(ObjectKind::Resolver(Resolver {
        promise: promise.clone(),
        reject,
        done: done.clone(),
    })))
}

#[cfg(test)]
mod tests {
    use crate::ast::build::*;
    use crate::ast::Program;
    use crate::compiler::Compiler;
    use crate::frontend::StaticFrontEnd;
    use crate::vm::{LoadedProgram, Vm, VmError};
    use std::path::Path;

    fn run(program: Program) -> (Result<(), VmError>, String, String) {
        let fe = StaticFrontEnd::new().with("/app/main.ts", program);
        let generated = Compiler::new(&fe).compile_program(Path::new("/app/main.ts")).unwrap();
        let loaded = LoadedProgram::from_units(generated.units).unwrap();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let result = Vm::new(loaded, &mut out, &mut err).run_entry().map(|_| ());
        (
            result,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn test_console_streams() {
        let (result, out, err) = run(Program::new(vec![
            expr_stmt(method_call(var("console"), "error", vec![str_lit("bad"), num(1.0)])),
            expr_stmt(method_call(var("console"), "info", vec![str_lit("fine")])),
        ]));
        result.unwrap();
        assert_eq!(out, "fine\n");
        assert_eq!(err, "bad 1\n");
    }

    #[test]
    fn test_promise_executor_and_then_chain() {
        let (result, out, _) = run(Program::new(vec![
            const_(
                "p",
                new_(
                    var("Promise"),
                    vec![arrow(&["resolve"], vec![expr_stmt(call(var("resolve"), vec![num(2.0)]))])],
                ),
            ),
            expr_stmt(method_call(
                method_call(
                    var("p"),
                    "then",
                    vec![arrow(&["v"], vec![ret(binary(var("v"), "*", num(10.0)))])],
                ),
                "then",
                vec![arrow(&["v"], vec![log(binary(str_lit("v="), "+", var("v")))])],
            )),
            log(str_lit("sync")),
        ]));
        result.unwrap();
        assert_eq!(out, "sync\nv=20\n");
    }

    #[test]
    fn test_catch_and_finally() {
        let (result, out, _) = run(Program::new(vec![expr_stmt(method_call(
            method_call(
                method_call(var("Promise"), "reject", vec![new_(var("Error"), vec![str_lit("nope")])]),
                "catch",
                vec![arrow(&["e"], vec![log(member(var("e"), "message"))])],
            ),
            "finally",
            vec![arrow(&[], vec![log(str_lit("finally"))])],
        ))]));
        result.unwrap();
        assert_eq!(out, "nope\nfinally\n");
    }

    #[test]
    fn test_queue_microtask_runs_after_sync_code() {
        let (result, out, _) = run(Program::new(vec![
            expr_stmt(call(
                var("queueMicrotask"),
                vec![arrow(&[], vec![log(str_lit("task"))])],
            )),
            log(str_lit("sync")),
        ]));
        result.unwrap();
        assert_eq!(out, "sync\ntask\n");
    }

    #[test]
    fn test_unhandled_rejection_fails_the_run() {
        let (result, _, _) = run(Program::new(vec![expr_stmt(method_call(
            var("Promise"),
            "reject",
            vec![str_lit("lost")],
        ))]));
        assert!(matches!(result, Err(VmError::UnhandledRejection(ref m)) if m == "lost"));
    }

    #[test]
    fn test_array_push_and_length() {
        let (result, out, _) = run(Program::new(vec![
            const_("xs", array(vec![num(1.0)])),
            expr_stmt(method_call(var("xs"), "push", vec![num(2.0), num(3.0)])),
            log(binary(str_lit("len="), "+", member(var("xs"), "length"))),
            log(binary(str_lit("xs="), "+", var("xs"))),
        ]));
        result.unwrap();
        assert_eq!(out, "len=3\nxs=1,2,3\n");
    }

    #[test]
    fn test_conversions() {
        let (result, out, _) = run(Program::new(vec![
            log(call(var("String"), vec![num(1.5)])),
            log(binary(call(var("Number"), vec![str_lit(" 42 ")]), "+", num(1.0))),
            log(call(var("Boolean"), vec![str_lit("")])),
        ]));
        result.unwrap();
        assert_eq!(out, "1.5\n43\nfalse\n");
    }

    #[test]
    fn test_uncaught_error_reports_location() {
        let (result, _, _) = run(Program::new(vec![throw(new_(
            var("TypeError"),
            vec![str_lit("broken")],
        ))]));
        match result {
            Err(VmError::Uncaught { message, location }) => {
                assert_eq!(message, "TypeError: broken");
                assert!(location.unwrap().starts_with("/app/main.ts:"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
