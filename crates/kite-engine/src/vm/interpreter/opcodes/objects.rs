use crate::compiler::bytecode::{BytecodeReader, ConstantPool, Opcode};
use crate::vm::interpreter::{empty_env, Abrupt, Completion, ControlFlow, Frame, Vm};
use crate::vm::object::{Closure, Object, ObjectKind};
use crate::vm::runtime::to_number;
use crate::vm::value::Value;
use crate::vm::VmError;

use super::variables::string_constant;

impl<'o> Vm<'o> {
    pub(in crate::vm::interpreter) fn exec_object_ops(
        &mut self,
        frame: &mut Frame,
        reader: &mut BytecodeReader<'_>,
        constants: &ConstantPool,
        opcode: Opcode,
    ) -> Completion<ControlFlow> {
        match opcode {
            // =========================================================
            // Literals
            // =========================================================
            Opcode::NewObject => frame.push(Value::object(Object::new(ObjectKind::Plain))),
            Opcode::NewArray => {
                let count = reader.read_u16()?;
                let items = frame.pop_n(count as usize)?;
                frame.push(Value::object(Object::array(items)));
            }
            Opcode::ArrayPush => {
                let item = frame.pop()?;
                let array = frame.pop()?;
                self.with_array(&array, |items| items.push(item))?;
                frame.push(array);
            }
            Opcode::ArraySpread => {
                let source = frame.pop()?;
                let array = frame.pop()?;
                let items = self.spread_items(&source)?;
                self.with_array(&array, |target| target.extend(items))?;
                frame.push(array);
            }
            Opcode::DefineField => {
                let name = reader.read_u32()?;
                let value = frame.pop()?;
                let object = frame.pop()?;
                let name = string_constant(constants, name)?;
                self.set_property(&object, name, value, None)?;
                frame.push(object);
            }
            Opcode::LoadClass => {
                let class = reader.read_u32()?;
                let value = self.class_value(class)?;
                frame.push(value);
            }

            // =========================================================
            // Property access
            // =========================================================
            Opcode::GetProp => {
                let name = reader.read_u32()?;
                let site = reader.read_u32()?;
                let object = frame.pop()?;
                let name = string_constant(constants, name)?;
                let value = self.get_property(&object, name, Some(site))?;
                frame.push(value);
            }
            Opcode::SetProp => {
                let name = reader.read_u32()?;
                let site = reader.read_u32()?;
                let value = frame.pop()?;
                let object = frame.pop()?;
                let name = string_constant(constants, name)?;
                self.set_property(&object, name, value.clone(), Some(site))?;
                frame.push(value);
            }
            Opcode::GetIndex => {
                let key = frame.pop()?;
                let object = frame.pop()?;
                let value = self.get_index(&object, &key)?;
                frame.push(value);
            }
            Opcode::SetIndex => {
                let value = frame.pop()?;
                let key = frame.pop()?;
                let object = frame.pop()?;
                self.set_index(&object, &key, value.clone())?;
                frame.push(value);
            }
            Opcode::DeleteProp => {
                let name = reader.read_u32()?;
                let object = frame.pop()?;
                let name = string_constant(constants, name)?;
                let deleted = self.delete_property(&object, name)?;
                frame.push(Value::Bool(deleted));
            }

            // =========================================================
            // Output
            // =========================================================
            Opcode::Print => {
                let count = reader.read_u8()?;
                let values = frame.pop_n(count as usize)?;
                let line = values
                    .iter()
                    .map(|v| self.display(v))
                    .collect::<Vec<_>>()
                    .join(" ");
                writeln!(self.output.stdout, "{}", line)?;
            }

            _ => {
                return Err(VmError::InvalidProgram(format!(
                    "{} is not an object opcode",
                    opcode.name()
                ))
                .into())
            }
        }
        Ok(ControlFlow::Continue)
    }

    /// Read `object.name`. Only objects go through the property site.
    pub(crate) fn get_property(&mut self, object: &Value, name: &str, site: Option<u32>) -> Completion {
        match object {
            Value::Undefined | Value::Null => Err(self.type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                self.display(object),
                name
            ))),
            Value::String(text) if name == "length" => Ok(Value::Number(text.encode_utf16().count() as f64)),
            Value::Object(target) => {
                let (own, class) = {
                    let target = target.borrow();
                    let slot = match site {
                        Some(site) => self.sites.lookup(site, &self.shapes, target.shape, name),
                        None => self.shapes.lookup(target.shape, name),
                    };
                    if let Some(value) = slot.and_then(|slot| target.slots.get(slot)) {
                        return Ok(value.clone());
                    }
                    let own = match &target.kind {
                        ObjectKind::Array(items) if name == "length" => Some(Value::Number(items.len() as f64)),
                        _ => None,
                    };
                    let class = match target.kind {
                        ObjectKind::Instance(class) => Some(class),
                        _ => None,
                    };
                    (own, class)
                };
                if let Some(value) = own {
                    return Ok(value);
                }
                if let Some(function) = class.and_then(|class| self.program.method(class, name)) {
                    return Ok(Value::object(Object::new(ObjectKind::Closure(Closure {
                        function,
                        env: empty_env(),
                    }))));
                }
                if self.has_native_method(object, name) {
                    return Ok(Value::object(Object::new(ObjectKind::NativeMethod {
                        receiver: object.clone(),
                        name: name.into(),
                    })));
                }
                Ok(Value::Undefined)
            }
            _ => Ok(Value::Undefined),
        }
    }

    /// Write `object.name = value`, adding the property when missing
    pub(crate) fn set_property(&mut self, object: &Value, name: &str, value: Value, site: Option<u32>) -> Completion<()> {
        let target = match object {
            Value::Undefined | Value::Null => {
                return Err(self.type_error(format!(
                    "Cannot set properties of {} (setting '{}')",
                    self.display(object),
                    name
                )))
            }
            Value::Object(target) => target,
            _ => return Ok(()),
        };
        let mut target = target.borrow_mut();
        if let ObjectKind::Array(items) = &mut target.kind {
            if name == "length" {
                let length = to_number(&value);
                if length >= 0.0 && length.fract() == 0.0 && length <= MAX_ARRAY_LENGTH as f64 {
                    items.resize(length as usize, Value::Undefined);
                    return Ok(());
                }
                return Err(Abrupt::Throw(self.make_error("RangeError", "Invalid array length")));
            }
        }
        let slot = match site {
            Some(site) => self.sites.lookup(site, &self.shapes, target.shape, name),
            None => self.shapes.lookup(target.shape, name),
        };
        match slot.and_then(|slot| target.slots.get_mut(slot)) {
            Some(existing) => *existing = value,
            None => {
                target.shape = self.shapes.with_property(target.shape, name);
                target.slots.push(value);
            }
        }
        Ok(())
    }

    fn delete_property(&mut self, object: &Value, name: &str) -> Completion<bool> {
        let target = match object {
            Value::Undefined | Value::Null => {
                return Err(self.type_error(format!(
                    "Cannot convert {} to object",
                    self.display(object)
                )))
            }
            Value::Object(target) => target,
            _ => return Ok(true),
        };
        let mut target = target.borrow_mut();
        if let Some(slot) = self.shapes.lookup(target.shape, name) {
            target.shape = self.shapes.without_property(target.shape, name);
            target.slots.remove(slot);
        }
        Ok(true)
    }

    /// Read `object[key]`
    pub(in crate::vm::interpreter) fn get_index(&mut self, object: &Value, key: &Value) -> Completion {
        if let Some(index) = array_index(key) {
            match object {
                Value::Object(target) => {
                    if let ObjectKind::Array(items) = &target.borrow().kind {
                        return Ok(items.get(index).cloned().unwrap_or_default());
                    }
                }
                Value::String(text) => {
                    return Ok(text
                        .chars()
                        .nth(index)
                        .map(|c| Value::from(c.to_string()))
                        .unwrap_or_default())
                }
                _ => {}
            }
        }
        let name = self.display(key);
        self.get_property(object, &name, None)
    }

    /// Write `object[key] = value`; arrays grow to fit the index. Keys at
    /// or past [`MAX_ARRAY_LENGTH`] are stored as ordinary properties.
    fn set_index(&mut self, object: &Value, key: &Value, value: Value) -> Completion<()> {
        if let (Some(index), Value::Object(target)) = (array_index(key), object) {
            if let ObjectKind::Array(items) = &mut target.borrow_mut().kind {
                if index >= items.len() {
                    items.resize(index + 1, Value::Undefined);
                }
                items[index] = value;
                return Ok(());
            }
        }
        let name = self.display(key);
        self.set_property(object, &name, value, None)
    }

    fn with_array(&mut self, array: &Value, f: impl FnOnce(&mut Vec<Value>)) -> Completion<()> {
        if let Some(object) = array.as_object() {
            if let ObjectKind::Array(items) = &mut object.borrow_mut().kind {
                f(items);
                return Ok(());
            }
        }
        Err(VmError::InvalidProgram("array operation on a non-array".to_string()).into())
    }

    /// Elements produced by spreading `source`
    fn spread_items(&mut self, source: &Value) -> Completion<Vec<Value>> {
        match source {
            Value::String(text) => Ok(text.chars().map(|c| Value::from(c.to_string())).collect()),
            Value::Object(object) => match &object.borrow().kind {
                ObjectKind::Array(items) => Ok(items.clone()),
                _ => Err(self.type_error(format!("{} is not iterable", self.display(source)))),
            },
            _ => Err(self.type_error(format!("{} is not iterable", self.display(source)))),
        }
    }
}

/// Longest dense array a single write may produce
const MAX_ARRAY_LENGTH: usize = 1 << 20;

/// Dense array index named by a key, if it is one
pub(in crate::vm::interpreter) fn array_index(key: &Value) -> Option<usize> {
    let index = match key {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n < MAX_ARRAY_LENGTH as f64 => *n as usize,
        Value::String(text) => {
            let index: usize = text.parse().ok()?;
            if index.to_string() != **text {
                return None;
            }
            index
        }
        _ => return None,
    };
    (index < MAX_ARRAY_LENGTH).then_some(index)
}
