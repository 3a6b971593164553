//! Bytecode interpreter
//!
//! Frames run on the host stack: a script call is a recursive call of
//! [`Vm::execute`]. An async function's frame is an explicit state machine.
//! At `AWAIT` the frame records its next state, detaches from the host stack
//! and parks itself on the awaited promise; a microtask later re-runs it from
//! offset 0, where `ASYNC_DISPATCH` jumps to the state's resume point.

mod execution;
mod opcodes;

pub use execution::{Abrupt, Completion, ControlFlow, ExecutionResult};

use crate::compiler::bytecode::{BytecodeReader, ConstantPool, Function, Opcode};
use crate::vm::loader::LoadedProgram;
use crate::vm::object::{Object, ObjectKind, ShapeId, ShapeTable};
use crate::vm::promise::{PromiseData, Reaction, Settled};
use crate::vm::runtime::{to_display_string, PropertySites, SiteStats};
use crate::vm::scheduler::{Microtask, Scheduler, SchedulerStats};
use crate::vm::value::{CellRef, ObjRef, Value};
use crate::vm::{VmError, VmResult};
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// Nested script calls allowed before a `RangeError` is thrown
pub const MAX_CALL_DEPTH: usize = 200;

/// Content of a local slot
#[derive(Debug, Clone)]
pub enum Local {
    /// Plain value
    Value(Value),
    /// Capture cell of a captured binding
    Cell(CellRef),
}

/// Activation of one function
#[derive(Debug)]
pub struct Frame {
    /// Program-wide function id
    pub function: u32,
    /// Offset of the next instruction
    pub pc: usize,
    /// Operand stack
    pub stack: Vec<Value>,
    /// Local slots: `this`, parameters, locals, scratch
    pub locals: Vec<Local>,
    /// Capture cells of the closure
    pub env: Rc<[CellRef]>,
    /// Receiver the frame was called with
    pub this: Value,
    /// Next async state to dispatch to
    pub state: u16,
    /// Promise returned by an async function
    pub promise: Option<ObjRef>,
    /// Outcome delivered to `RESUME`
    pub resume: Option<Settled>,
    /// Cells pushed by `CAPTURE_*` waiting for `MAKE_CLOSURE`
    captures: Vec<CellRef>,
}

impl Frame {
    fn pop(&mut self) -> Result<Value, VmError> {
        self.stack
            .pop()
            .ok_or_else(|| VmError::InvalidProgram("operand stack underflow".to_string()))
    }

    fn pop_n(&mut self, count: usize) -> Result<Vec<Value>, VmError> {
        if count > self.stack.len() {
            return Err(VmError::InvalidProgram("operand stack underflow".to_string()));
        }
        Ok(self.stack.split_off(self.stack.len() - count))
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn local(&self, slot: u16) -> Result<&Local, VmError> {
        self.locals
            .get(slot as usize)
            .ok_or_else(|| VmError::InvalidProgram(format!("local slot {} out of range", slot)))
    }

    fn local_mut(&mut self, slot: u16) -> Result<&mut Local, VmError> {
        self.locals
            .get_mut(slot as usize)
            .ok_or_else(|| VmError::InvalidProgram(format!("local slot {} out of range", slot)))
    }

    fn env_cell(&self, index: u16) -> Result<&CellRef, VmError> {
        self.env
            .get(index as usize)
            .ok_or_else(|| VmError::InvalidProgram(format!("environment index {} out of range", index)))
    }
}

/// Program output sinks
pub(crate) struct Output<'o> {
    /// `console.log` and `PRINT`
    pub(crate) stdout: &'o mut dyn Write,
    /// `console.error` / `console.warn`
    pub(crate) stderr: &'o mut dyn Write,
}

/// The virtual machine
pub struct Vm<'o> {
    pub(crate) program: Rc<LoadedProgram>,
    pub(crate) globals: Vec<Value>,
    pub(crate) shapes: ShapeTable,
    pub(crate) sites: PropertySites,
    pub(crate) scheduler: Scheduler,
    pub(crate) output: Output<'o>,
    class_shapes: Vec<ShapeId>,
    class_values: Vec<Option<Value>>,
    pub(crate) builtin_values: Vec<Option<Value>>,
    /// Promises rejected while nobody was subscribed
    pub(crate) rejected: Vec<ObjRef>,
    depth: usize,
    throw_location: Option<String>,
    initialized: bool,
}

impl<'o> Vm<'o> {
    /// Create a VM for a loaded program writing to the given sinks
    pub fn new(program: LoadedProgram, stdout: &'o mut dyn Write, stderr: &'o mut dyn Write) -> Self {
        let metadata = program.metadata();
        let globals = vec![Value::Undefined; metadata.globals.len()];
        let sites = PropertySites::new(metadata.sites.len());
        let mut shapes = ShapeTable::new();
        let class_shapes: Vec<ShapeId> = program
            .entry_unit()
            .classes
            .iter()
            .map(|class| shapes.for_fields(&class.fields))
            .collect();
        let class_values = vec![None; class_shapes.len()];
        Self {
            program: Rc::new(program),
            globals,
            shapes,
            sites,
            scheduler: Scheduler::new(),
            output: Output { stdout, stderr },
            class_shapes,
            class_values,
            builtin_values: vec![None; crate::compiler::bytecode::Builtin::COUNT as usize],
            rejected: Vec::new(),
            depth: 0,
            throw_location: None,
            initialized: false,
        }
    }

    /// The loaded program
    pub fn program(&self) -> &LoadedProgram {
        &self.program
    }

    /// Property cache counters
    pub fn site_stats(&self) -> SiteStats {
        self.sites.stats()
    }

    /// Property caches
    pub fn sites(&self) -> &PropertySites {
        &self.sites
    }

    /// Scheduler counters
    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// Current value of a module-level binding
    pub fn global(&self, name: &str) -> Option<&Value> {
        let index = self.program.metadata().globals.iter().position(|g| g == name)?;
        self.globals.get(index)
    }

    /// Display string of a value
    pub fn display(&self, value: &Value) -> String {
        to_display_string(value, &self.shapes)
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Run module initialization, then drain the microtask queue. Fails on
    /// an uncaught exception, a rejected top-level await or a rejection that
    /// is still unhandled after the drain.
    pub fn run_entry(&mut self) -> VmResult<Value> {
        let entry = self.program.metadata().entry_function;
        if self.program.function(entry).is_none() {
            return Err(VmError::InvalidProgram("entry unit has no entry function".to_string()));
        }
        let result = self.call_function(entry, empty_env(), Value::Undefined, Vec::new());
        self.initialized = true;
        let value = self.finish_host_call(result)?;
        self.check_unhandled()?;
        Ok(value)
    }

    /// Call a top-level function of the entry module by name through the
    /// generated `$invoke` dispatcher, then drain the microtask queue
    pub fn invoke_function(&mut self, name: &str, args: Vec<Value>) -> VmResult<Value> {
        let invoke = self.program.metadata().invoke_function;
        self.call_dispatcher(invoke, vec![Value::from(name), Value::object(Object::array(args))])
    }

    /// Construct a top-level class with `ctor_args` and call `method` with
    /// `args` through the generated `$invokeClass` dispatcher
    pub fn invoke_class_method(
        &mut self,
        class: &str,
        method: &str,
        ctor_args: Vec<Value>,
        args: Vec<Value>,
    ) -> VmResult<Value> {
        let invoke = self.program.metadata().invoke_class_function;
        self.call_dispatcher(
            invoke,
            vec![
                Value::from(class),
                Value::from(method),
                Value::object(Object::array(ctor_args)),
                Value::object(Object::array(args)),
            ],
        )
    }

    fn call_dispatcher(&mut self, function: u32, args: Vec<Value>) -> VmResult<Value> {
        if self.program.function(function).is_none() {
            return Err(VmError::InvalidProgram("entry unit has no dispatcher".to_string()));
        }
        if !self.initialized {
            self.run_entry()?;
        }
        let result = self.call_function(function, empty_env(), Value::Undefined, args);
        let value = self.finish_host_call(result)?;
        self.check_unhandled()?;
        Ok(value)
    }

    /// Turn the outcome of a host-initiated call into a result: drain the
    /// queue, then unwrap a returned promise if it settled
    fn finish_host_call(&mut self, result: Completion) -> VmResult<Value> {
        let value = match result {
            Ok(value) => value,
            Err(Abrupt::Throw(thrown)) => return Err(self.uncaught(&thrown)),
            Err(Abrupt::Error(error)) => return Err(error),
        };
        let promise = match &value {
            Value::Object(object) => match &mut object.borrow_mut().kind {
                ObjectKind::Promise(data) => {
                    data.handled = true;
                    Some(object.clone())
                }
                _ => None,
            },
            _ => None,
        };
        self.drain()?;
        let Some(promise) = promise else {
            return Ok(value);
        };
        let outcome = match &promise.borrow().kind {
            ObjectKind::Promise(data) => data.outcome().cloned(),
            _ => None,
        };
        match outcome {
            Some(Settled::Fulfilled(result)) => Ok(result),
            Some(Settled::Rejected(reason)) => Err(self.uncaught(&reason)),
            None => Ok(value),
        }
    }

    fn uncaught(&mut self, thrown: &Value) -> VmError {
        VmError::Uncaught {
            message: self.display(thrown),
            location: self.throw_location.take(),
        }
    }

    fn check_unhandled(&mut self) -> VmResult<()> {
        for promise in std::mem::take(&mut self.rejected) {
            let reason = match &promise.borrow().kind {
                ObjectKind::Promise(data) if data.is_unhandled_rejection() => match data.outcome() {
                    Some(Settled::Rejected(reason)) => Some(reason.clone()),
                    _ => None,
                },
                _ => None,
            };
            if let Some(reason) = reason {
                return Err(VmError::UnhandledRejection(self.display(&reason)));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Microtasks
    // ========================================================================

    /// Run queued microtasks until the queue is empty
    pub fn drain(&mut self) -> VmResult<()> {
        let before = self.scheduler.stats().executed;
        while let Some(task) = self.scheduler.next_task() {
            self.run_microtask(task)?;
        }
        let stats = self.scheduler.stats();
        log::debug!(
            "microtask drain: {} job(s) run, {} total, peak queue {}",
            stats.executed - before,
            stats.executed,
            stats.peak_len
        );
        Ok(())
    }

    fn run_microtask(&mut self, task: Microtask) -> VmResult<()> {
        match task {
            Microtask::Callback(callback) => {
                match self.call_value(&callback, Value::Undefined, Vec::new()) {
                    Ok(_) => Ok(()),
                    Err(Abrupt::Throw(thrown)) => Err(self.uncaught(&thrown)),
                    Err(Abrupt::Error(error)) => Err(error),
                }
            }
            Microtask::Reaction { reaction, outcome } => self.run_reaction(reaction, outcome),
        }
    }

    fn run_reaction(&mut self, reaction: Reaction, outcome: Settled) -> VmResult<()> {
        match reaction {
            Reaction::Then {
                on_fulfilled,
                on_rejected,
                derived,
            } => {
                let (handler, value) = match &outcome {
                    Settled::Fulfilled(value) => (on_fulfilled, value.clone()),
                    Settled::Rejected(reason) => (on_rejected, reason.clone()),
                };
                // a missing handler passes the outcome through unchanged
                if !handler.is_callable() {
                    return self.settle_promise(&derived, outcome);
                }
                match self.call_value(&handler, Value::Undefined, vec![value]) {
                    Ok(result) => self.resolve_promise(&derived, result),
                    Err(Abrupt::Throw(thrown)) => self.settle_promise(&derived, Settled::Rejected(thrown)),
                    Err(Abrupt::Error(error)) => Err(error),
                }
            }
            Reaction::Finally { callback, derived } => {
                if !callback.is_callable() {
                    return self.settle_promise(&derived, outcome);
                }
                match self.call_value(&callback, Value::Undefined, Vec::new()) {
                    Ok(_) => self.settle_promise(&derived, outcome),
                    Err(Abrupt::Throw(thrown)) => self.settle_promise(&derived, Settled::Rejected(thrown)),
                    Err(Abrupt::Error(error)) => Err(error),
                }
            }
            Reaction::Adopt { target } => self.settle_promise(&target, outcome),
            Reaction::Resume(mut frame) => {
                frame.resume = Some(outcome);
                let promise = frame.promise.clone();
                let result = self.execute(*frame);
                self.finish_async(promise, result).map(|_| ())
            }
        }
    }

    // ========================================================================
    // Promises
    // ========================================================================

    /// Allocate a pending promise
    pub(crate) fn new_promise(&self) -> ObjRef {
        Rc::new(RefCell::new(Object::new(ObjectKind::Promise(PromiseData::new()))))
    }

    /// Resolve `promise` with `value`, adopting the state of a promise value
    pub(crate) fn resolve_promise(&mut self, promise: &ObjRef, value: Value) -> VmResult<()> {
        if let Value::Object(object) = &value {
            if matches!(object.borrow().kind, ObjectKind::Promise(_)) {
                if Rc::ptr_eq(object, promise) {
                    let error = self.make_error("TypeError", "Chaining cycle detected for promise");
                    return self.settle_promise(promise, Settled::Rejected(error));
                }
                let source = object.clone();
                return self.subscribe(
                    &source,
                    Reaction::Adopt {
                        target: promise.clone(),
                    },
                );
            }
        }
        self.settle_promise(promise, Settled::Fulfilled(value))
    }

    /// Settle `promise` and queue its reactions
    pub(crate) fn settle_promise(&mut self, promise: &ObjRef, outcome: Settled) -> VmResult<()> {
        let (reactions, unhandled) = match &mut promise.borrow_mut().kind {
            ObjectKind::Promise(data) => {
                let reactions = data.settle(outcome.clone());
                (reactions, data.is_unhandled_rejection())
            }
            _ => return Err(VmError::InvalidProgram("settling a non-promise".to_string())),
        };
        if unhandled {
            self.rejected.push(promise.clone());
        }
        for reaction in reactions {
            self.scheduler.schedule(Microtask::Reaction {
                reaction,
                outcome: outcome.clone(),
            });
        }
        Ok(())
    }

    /// Attach a reaction to a promise, queueing it at once if settled
    pub(crate) fn subscribe(&mut self, promise: &ObjRef, reaction: Reaction) -> VmResult<()> {
        let queued = match &mut promise.borrow_mut().kind {
            ObjectKind::Promise(data) => data.subscribe(reaction),
            _ => return Err(VmError::InvalidProgram("subscribing to a non-promise".to_string())),
        };
        if let Some((reaction, outcome)) = queued {
            self.scheduler.schedule(Microtask::Reaction { reaction, outcome });
        }
        Ok(())
    }

    /// The value itself when it is a promise, otherwise a promise already
    /// fulfilled with it
    pub(crate) fn to_promise(&mut self, value: Value) -> ObjRef {
        if let Value::Object(object) = &value {
            if matches!(object.borrow().kind, ObjectKind::Promise(_)) {
                return object.clone();
            }
        }
        Rc::new(RefCell::new(Object::new(ObjectKind::Promise(PromiseData::settled(
            Settled::Fulfilled(value),
        )))))
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Call any callable value
    pub(crate) fn call_value(&mut self, callee: &Value, this: Value, args: Vec<Value>) -> Completion {
        let Value::Object(object) = callee else {
            return Err(self.type_error(format!("{} is not a function", self.display(callee))));
        };
        let kind = {
            let object = object.borrow();
            match &object.kind {
                ObjectKind::Closure(closure) => Callee::Closure(closure.function, closure.env.clone()),
                ObjectKind::Class(class) => Callee::Class(*class),
                ObjectKind::Builtin(builtin) => Callee::Builtin(*builtin),
                ObjectKind::NativeMethod { receiver, name } => {
                    Callee::Native(receiver.clone(), name.clone())
                }
                ObjectKind::Resolver(resolver) => Callee::Resolver(resolver.clone()),
                _ => Callee::None,
            }
        };
        match kind {
            Callee::Closure(function, env) => self.call_function(function, env, this, args),
            Callee::Class(class) => {
                let name = self.program.class(class).map(|c| c.name.clone()).unwrap_or_default();
                Err(self.type_error(format!(
                    "Class constructor {} cannot be invoked without 'new'",
                    name
                )))
            }
            Callee::Builtin(builtin) => self.call_builtin(builtin, args),
            Callee::Native(receiver, name) => self.call_native_method(&receiver, &name, args),
            Callee::Resolver(resolver) => {
                if resolver.done.replace(true) {
                    return Ok(Value::Undefined);
                }
                let value = args.into_iter().next().unwrap_or_default();
                if resolver.reject {
                    self.settle_promise(&resolver.promise, Settled::Rejected(value))?;
                } else {
                    self.resolve_promise(&resolver.promise, value)?;
                }
                Ok(Value::Undefined)
            }
            Callee::None => Err(self.type_error(format!("{} is not a function", self.display(callee)))),
        }
    }

    /// Call a compiled function. Async functions return their promise.
    pub(crate) fn call_function(
        &mut self,
        id: u32,
        env: Rc<[CellRef]>,
        this: Value,
        args: Vec<Value>,
    ) -> Completion {
        let program = Rc::clone(&self.program);
        let Some((function, _)) = program.function(id) else {
            return Err(VmError::InvalidProgram(format!("function {} does not exist", id)).into());
        };
        if self.depth >= MAX_CALL_DEPTH {
            let error = self.make_error("RangeError", "Maximum call stack size exceeded");
            return Err(Abrupt::Throw(error));
        }

        let mut locals = vec![Local::Value(Value::Undefined); function.local_count.max(1) as usize];
        locals[0] = Local::Value(this.clone());
        let params = function.param_names.len();
        for (slot, arg) in locals[1..].iter_mut().zip(args.into_iter().take(params)) {
            *slot = Local::Value(arg);
        }
        let promise = function.is_async().then(|| self.new_promise());
        let frame = Frame {
            function: id,
            pc: 0,
            stack: Vec::with_capacity(function.max_stack as usize),
            locals,
            env,
            this,
            state: 0,
            promise: promise.clone(),
            resume: None,
            captures: Vec::new(),
        };

        self.depth += 1;
        let result = self.execute(frame);
        self.depth -= 1;

        if promise.is_some() {
            return self.finish_async(promise, result).map_err(Abrupt::Error);
        }
        match result {
            ExecutionResult::Completed(value) => Ok(value),
            ExecutionResult::Threw(thrown) => Err(Abrupt::Throw(thrown)),
            ExecutionResult::Failed(error) => Err(Abrupt::Error(error)),
            ExecutionResult::Suspended => Err(VmError::InvalidProgram(format!(
                "`{}` suspended but is not async",
                function.name
            ))
            .into()),
        }
    }

    /// Settle an async function's promise from the result of running its
    /// frame; a suspended frame leaves it pending
    fn finish_async(&mut self, promise: Option<ObjRef>, result: ExecutionResult) -> VmResult<Value> {
        let Some(promise) = promise else {
            return Err(VmError::InvalidProgram("async frame without a promise".to_string()));
        };
        match result {
            ExecutionResult::Completed(value) => self.resolve_promise(&promise, value)?,
            ExecutionResult::Threw(thrown) => {
                self.throw_location = None;
                self.settle_promise(&promise, Settled::Rejected(thrown))?;
            }
            ExecutionResult::Suspended => {}
            ExecutionResult::Failed(error) => return Err(error),
        }
        Ok(Value::Object(promise))
    }

    // ========================================================================
    // Execution loop
    // ========================================================================

    /// Run a frame until it returns, throws past its handlers or suspends
    fn execute(&mut self, mut frame: Frame) -> ExecutionResult {
        let program = Rc::clone(&self.program);
        let Some((function, constants)) = program.function(frame.function) else {
            return ExecutionResult::Failed(VmError::InvalidProgram(format!(
                "function {} does not exist",
                frame.function
            )));
        };
        let code = function.code.as_slice();

        loop {
            let instr_pc = frame.pc;
            let mut reader = BytecodeReader::new(code);
            reader.seek(instr_pc);
            let step = match reader.read_opcode() {
                Ok(opcode) => self.step(&mut frame, &mut reader, function, constants, opcode, instr_pc),
                Err(error) => Err(Abrupt::from(error)),
            };
            match step {
                Ok(ControlFlow::Continue) => frame.pc = reader.position(),
                Ok(ControlFlow::Return(value)) => return ExecutionResult::Completed(value),
                Ok(ControlFlow::Suspend(awaited)) => {
                    frame.pc = 0;
                    return match self.suspend(frame, awaited) {
                        Ok(()) => ExecutionResult::Suspended,
                        Err(error) => ExecutionResult::Failed(error),
                    };
                }
                Err(Abrupt::Throw(thrown)) => {
                    if self.throw_location.is_none() {
                        self.throw_location = Some(self.location(function, instr_pc));
                    }
                    match handler_for(function, instr_pc) {
                        Some(target) => {
                            self.throw_location = None;
                            frame.stack.clear();
                            frame.captures.clear();
                            frame.push(thrown);
                            frame.pc = target;
                        }
                        None => return ExecutionResult::Threw(thrown),
                    }
                }
                Err(Abrupt::Error(error)) => return ExecutionResult::Failed(error),
            }
        }
    }

    fn suspend(&mut self, frame: Frame, awaited: Value) -> VmResult<()> {
        let promise = self.to_promise(awaited);
        self.subscribe(&promise, Reaction::Resume(Box::new(frame)))
    }

    fn step(
        &mut self,
        frame: &mut Frame,
        reader: &mut BytecodeReader<'_>,
        function: &Function,
        constants: &ConstantPool,
        opcode: Opcode,
        instr_pc: usize,
    ) -> Completion<ControlFlow> {
        use Opcode::*;
        match opcode {
            Nop => Ok(ControlFlow::Continue),
            ConstUndefined | ConstNull | ConstTrue | ConstFalse | ConstNumber | ConstString | Pop
            | Dup | Swap | LoadLocal | StoreLocal | NewCell | BoxLocal | LoadCell | StoreCell
            | LoadEnv | StoreEnv | CaptureLocal | CaptureEnv | LoadGlobal | StoreGlobal
            | LoadBuiltin => self.exec_variable_ops(frame, reader, constants, opcode),
            Add | Sub | Mul | Div | Mod | Neg | ToNumber | Not | TypeOf | Lt | Le | Gt | Ge
            | LooseEq | LooseNe | StrictEq | StrictNe | IsNullish => {
                self.exec_arithmetic_ops(frame, opcode)
            }
            Jmp | JmpIfFalse | JmpIfTrue | Return | Throw | AsyncDispatch | Await | Resume => {
                self.exec_control_ops(frame, reader, function, opcode, instr_pc)
            }
            Call | CallMethod | New | SuperCall | CallSpread | NewSpread | InvokeDynamic
            | CallMethodSpread | MakeClosure => self.exec_call_ops(frame, reader, constants, opcode),
            NewObject | NewArray | ArrayPush | ArraySpread | GetProp | SetProp | GetIndex
            | SetIndex | DefineField | DeleteProp | LoadClass | Print => {
                self.exec_object_ops(frame, reader, constants, opcode)
            }
        }
    }

    /// `file:line` of a code offset
    fn location(&self, function: &Function, pc: usize) -> String {
        match function.line_at(pc) {
            Some(entry) => format!("{}:{}", self.program.source_file(entry.file), entry.line),
            None => format!("{}:?", self.program.source_file(function.source_file)),
        }
    }

    // ========================================================================
    // Classes
    // ========================================================================

    /// Class value for a class id
    pub(crate) fn class_value(&mut self, class: u32) -> Completion {
        let Some(slot) = self.class_values.get_mut(class as usize) else {
            return Err(VmError::InvalidProgram(format!("class {} does not exist", class)).into());
        };
        Ok(slot
            .get_or_insert_with(|| Value::object(Object::new(ObjectKind::Class(class))))
            .clone())
    }

    /// `new Class(args)`: allocate the instance with every field present,
    /// then run the constructor on it
    pub(crate) fn instantiate(&mut self, class: u32, args: Vec<Value>) -> Completion {
        let (Some(def), Some(&shape)) = (self.program.class(class), self.class_shapes.get(class as usize)) else {
            return Err(VmError::InvalidProgram(format!("class {} does not exist", class)).into());
        };
        let constructor = def.constructor;
        let instance = Value::object(Object::with_shape(
            ObjectKind::Instance(class),
            shape,
            def.fields.len(),
        ));
        self.call_function(constructor, empty_env(), instance.clone(), args)?;
        Ok(instance)
    }

    /// Run the constructor of `class` on an existing receiver
    pub(crate) fn run_constructor(&mut self, class: u32, this: Value, args: Vec<Value>) -> Completion {
        let Some(def) = self.program.class(class) else {
            return Err(VmError::InvalidProgram(format!("class {} does not exist", class)).into());
        };
        let constructor = def.constructor;
        self.call_function(constructor, empty_env(), this, args)
    }

    // ========================================================================
    // Errors
    // ========================================================================

    /// `TypeError` exception
    pub(crate) fn type_error(&mut self, message: impl Into<String>) -> Abrupt {
        Abrupt::Throw(self.make_error("TypeError", &message.into()))
    }
}

enum Callee {
    Closure(u32, Rc<[CellRef]>),
    Class(u32),
    Builtin(crate::compiler::bytecode::Builtin),
    Native(Value, Rc<str>),
    Resolver(crate::vm::object::Resolver),
    None,
}

fn empty_env() -> Rc<[CellRef]> {
    Rc::from(Vec::new())
}

/// Target of the innermost handler covering `pc`
fn handler_for(function: &Function, pc: usize) -> Option<usize> {
    function
        .handlers
        .iter()
        .find(|h| (h.start as usize) <= pc && pc < h.end as usize)
        .map(|h| h.target as usize)
}
