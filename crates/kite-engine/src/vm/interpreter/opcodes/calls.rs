use crate::compiler::bytecode::{BytecodeReader, ConstantPool, Opcode};
use crate::vm::interpreter::{empty_env, Completion, ControlFlow, Frame, Vm};
use crate::vm::object::{Closure, Object, ObjectKind};
use crate::vm::value::Value;
use crate::vm::VmError;
use std::rc::Rc;

use super::objects::array_index;
use super::variables::string_constant;

impl<'o> Vm<'o> {
    pub(in crate::vm::interpreter) fn exec_call_ops(
        &mut self,
        frame: &mut Frame,
        reader: &mut BytecodeReader<'_>,
        constants: &ConstantPool,
        opcode: Opcode,
    ) -> Completion<ControlFlow> {
        let result = match opcode {
            Opcode::Call => {
                let argc = reader.read_u8()?;
                let args = frame.pop_n(argc as usize)?;
                let callee = frame.pop()?;
                self.call_value(&callee, Value::Undefined, args)?
            }
            Opcode::CallSpread => {
                let args = self.spread_args(frame.pop()?)?;
                let callee = frame.pop()?;
                self.call_value(&callee, Value::Undefined, args)?
            }
            Opcode::CallMethod => {
                let name = reader.read_u32()?;
                let site = reader.read_u32()?;
                let argc = reader.read_u8()?;
                let args = frame.pop_n(argc as usize)?;
                let receiver = frame.pop()?;
                let name = string_constant(constants, name)?;
                self.call_method(receiver, name, Some(site), args)?
            }
            Opcode::CallMethodSpread => {
                let name = reader.read_u32()?;
                let site = reader.read_u32()?;
                let args = self.spread_args(frame.pop()?)?;
                let receiver = frame.pop()?;
                let name = string_constant(constants, name)?;
                self.call_method(receiver, name, Some(site), args)?
            }
            Opcode::InvokeDynamic => {
                let args = self.spread_args(frame.pop()?)?;
                let key = frame.pop()?;
                let receiver = frame.pop()?;
                if array_index(&key).is_some() && is_indexed(&receiver) {
                    let callee = self.get_index(&receiver, &key)?;
                    self.call_value(&callee, receiver, args)?
                } else {
                    let name = self.display(&key);
                    self.call_method(receiver, &name, None, args)?
                }
            }
            Opcode::New => {
                let argc = reader.read_u8()?;
                let args = frame.pop_n(argc as usize)?;
                let constructor = frame.pop()?;
                self.construct(&constructor, args)?
            }
            Opcode::NewSpread => {
                let args = self.spread_args(frame.pop()?)?;
                let constructor = frame.pop()?;
                self.construct(&constructor, args)?
            }
            Opcode::SuperCall => {
                let parent = reader.read_u32()?;
                let argc = reader.read_u8()?;
                let args = frame.pop_n(argc as usize)?;
                self.run_constructor(parent, frame.this.clone(), args)?
            }
            Opcode::MakeClosure => {
                let function = reader.read_u32()?;
                let count = reader.read_u16()? as usize;
                frame.pop_n(count)?;
                if count > frame.captures.len() {
                    return Err(VmError::InvalidProgram("capture cells underflow".to_string()).into());
                }
                let cells = frame.captures.split_off(frame.captures.len() - count);
                let env = if cells.is_empty() { empty_env() } else { Rc::from(cells) };
                Value::object(Object::new(ObjectKind::Closure(Closure { function, env })))
            }
            _ => {
                return Err(VmError::InvalidProgram(format!("{} is not a call opcode", opcode.name())).into())
            }
        };
        frame.push(result);
        Ok(ControlFlow::Continue)
    }

    /// Call `receiver.name(args)` with `this = receiver`. Own properties go
    /// through the property site; class methods and builtin methods are
    /// found after that.
    pub(crate) fn call_method(
        &mut self,
        receiver: Value,
        name: &str,
        site: Option<u32>,
        args: Vec<Value>,
    ) -> Completion {
        if receiver.is_nullish() {
            return Err(self.type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                self.display(&receiver),
                name
            )));
        }
        if let Value::Object(object) = &receiver {
            let (own, class) = {
                let object = object.borrow();
                let slot = match site {
                    Some(site) => self.sites.lookup(site, &self.shapes, object.shape, name),
                    None => self.shapes.lookup(object.shape, name),
                };
                let class = match object.kind {
                    ObjectKind::Instance(class) => Some(class),
                    _ => None,
                };
                (slot.and_then(|slot| object.slots.get(slot).cloned()), class)
            };
            if let Some(method) = own {
                if !method.is_callable() {
                    return Err(self.type_error(format!("{} is not a function", name)));
                }
                return self.call_value(&method, receiver, args);
            }
            if let Some(function) = class.and_then(|class| self.program.method(class, name)) {
                return self.call_function(function, empty_env(), receiver, args);
            }
        }
        if self.has_native_method(&receiver, name) {
            return self.call_native_method(&receiver, name, args);
        }
        Err(self.type_error(format!("{}.{} is not a function", self.display(&receiver), name)))
    }

    /// `new constructor(args)`
    pub(crate) fn construct(&mut self, constructor: &Value, args: Vec<Value>) -> Completion {
        let kind = constructor.as_object().map(|object| match &object.borrow().kind {
            ObjectKind::Class(class) => Some(Ok(*class)),
            ObjectKind::Builtin(builtin) => Some(Err(*builtin)),
            _ => None,
        });
        match kind.flatten() {
            Some(Ok(class)) => self.instantiate(class, args),
            Some(Err(builtin)) => self.construct_builtin(builtin, args),
            None => Err(self.type_error(format!("{} is not a constructor", self.display(constructor)))),
        }
    }

    /// Elements of a spread argument array
    fn spread_args(&mut self, args: Value) -> Completion<Vec<Value>> {
        if let Some(object) = args.as_object() {
            if let ObjectKind::Array(items) = &object.borrow().kind {
                return Ok(items.clone());
            }
        }
        Err(self.type_error(format!("{} is not iterable", self.display(&args))))
    }
}

/// Whether `receiver[index]` reads an element rather than a property
fn is_indexed(receiver: &Value) -> bool {
    match receiver {
        Value::String(_) => true,
        Value::Object(object) => matches!(object.borrow().kind, ObjectKind::Array(_)),
        _ => false,
    }
}
