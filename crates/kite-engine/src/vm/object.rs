//! Heap objects and shapes
//!
//! Every heap object carries named properties stored as a shape plus a slot
//! vector. A shape is the ordered list of property names; adding a property
//! follows (or creates) a transition from the current shape, so objects
//! built the same way share one shape id. Property sites cache on that id.

use super::promise::PromiseData;
use super::value::{CellRef, ObjRef, Value};
use crate::compiler::bytecode::Builtin;
use rustc_hash::FxHashMap;
use std::cell::Cell;
use std::rc::Rc;

/// Index into the shape table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeId(pub u32);

impl ShapeId {
    /// Shape without properties
    pub const ROOT: ShapeId = ShapeId(0);
}

#[derive(Debug, Default)]
struct Shape {
    keys: Vec<Rc<str>>,
    index: FxHashMap<Rc<str>, usize>,
    transitions: FxHashMap<Rc<str>, ShapeId>,
}

/// Program-wide shape table
#[derive(Debug)]
pub struct ShapeTable {
    shapes: Vec<Shape>,
}

impl Default for ShapeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ShapeTable {
    /// Create a table holding only the root shape
    pub fn new() -> Self {
        Self {
            shapes: vec![Shape::default()],
        }
    }

    /// Number of distinct shapes created so far
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Whether only the root shape exists
    pub fn is_empty(&self) -> bool {
        self.shapes.len() <= 1
    }

    /// Slot of `name` in `shape`
    pub fn lookup(&self, shape: ShapeId, name: &str) -> Option<usize> {
        self.shapes
            .get(shape.0 as usize)
            .and_then(|s| s.index.get(name).copied())
    }

    /// Property names of `shape`, in insertion order
    pub fn keys(&self, shape: ShapeId) -> &[Rc<str>] {
        self.shapes
            .get(shape.0 as usize)
            .map(|s| s.keys.as_slice())
            .unwrap_or(&[])
    }

    /// Shape reached by appending `name` to `shape`
    pub fn with_property(&mut self, shape: ShapeId, name: &str) -> ShapeId {
        if let Some(&next) = self
            .shapes
            .get(shape.0 as usize)
            .and_then(|s| s.transitions.get(name))
        {
            return next;
        }
        let mut keys = self.keys(shape).to_vec();
        let key: Rc<str> = name.into();
        keys.push(key.clone());
        let index = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), i))
            .collect();
        let id = ShapeId(self.shapes.len() as u32);
        self.shapes.push(Shape {
            keys,
            index,
            transitions: FxHashMap::default(),
        });
        if let Some(parent) = self.shapes.get_mut(shape.0 as usize) {
            parent.transitions.insert(key, id);
        }
        id
    }

    /// Shape of `shape` with `name` removed, rebuilt from the root
    pub fn without_property(&mut self, shape: ShapeId, name: &str) -> ShapeId {
        let keys: Vec<Rc<str>> = self
            .keys(shape)
            .iter()
            .filter(|k| &***k != name)
            .cloned()
            .collect();
        keys.iter()
            .fold(ShapeId::ROOT, |current, key| self.with_property(current, key))
    }

    /// Shape holding `names` in order
    pub fn for_fields(&mut self, names: &[String]) -> ShapeId {
        names
            .iter()
            .fold(ShapeId::ROOT, |current, name| self.with_property(current, name))
    }
}

/// A script function instance
#[derive(Debug, Clone)]
pub struct Closure {
    /// Program-wide function id
    pub function: u32,
    /// Capture cells, in the function's environment order
    pub env: Rc<[CellRef]>,
}

/// `resolve`/`reject` pair handed to a promise executor
#[derive(Debug, Clone)]
pub struct Resolver {
    /// Promise settled by the function
    pub promise: ObjRef,
    /// Whether this is the `reject` half
    pub reject: bool,
    /// Shared by both halves; set once either ran
    pub done: Rc<Cell<bool>>,
}

/// What kind of heap object this is
#[derive(Debug)]
pub enum ObjectKind {
    /// Object literal
    Plain,
    /// Class instance
    Instance(u32),
    /// Array
    Array(Vec<Value>),
    /// Script function
    Closure(Closure),
    /// Class value
    Class(u32),
    /// Host value reached through `LoadBuiltin`
    Builtin(Builtin),
    /// Builtin method read as a value (`console.log`, `p.then`, `a.push`)
    NativeMethod {
        /// Receiver the method is bound to
        receiver: Value,
        /// Method name
        name: Rc<str>,
    },
    /// Promise executor capability
    Resolver(Resolver),
    /// Promise
    Promise(PromiseData),
    /// `Error` / `TypeError` / `RangeError` instance
    Error,
}

impl ObjectKind {
    /// Whether objects of this kind can be called
    pub fn is_callable(&self) -> bool {
        match self {
            ObjectKind::Closure(_)
            | ObjectKind::Class(_)
            | ObjectKind::NativeMethod { .. }
            | ObjectKind::Resolver(_) => true,
            ObjectKind::Builtin(builtin) => !matches!(
                builtin,
                Builtin::Console | Builtin::NaN | Builtin::Infinity
            ),
            _ => false,
        }
    }

    /// Short label for debugging output
    pub fn label(&self) -> &'static str {
        match self {
            ObjectKind::Plain | ObjectKind::Instance(_) => "object",
            ObjectKind::Array(_) => "array",
            ObjectKind::Closure(_) | ObjectKind::NativeMethod { .. } | ObjectKind::Resolver(_) => {
                "function"
            }
            ObjectKind::Class(_) => "class",
            ObjectKind::Builtin(_) => "builtin",
            ObjectKind::Promise(_) => "promise",
            ObjectKind::Error => "error",
        }
    }
}

/// A heap object
#[derive(Debug)]
pub struct Object {
    /// Current shape
    pub shape: ShapeId,
    /// Property values, indexed by the shape's slots
    pub slots: Vec<Value>,
    /// Object kind
    pub kind: ObjectKind,
}

impl Object {
    /// Object of `kind` without properties
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            shape: ShapeId::ROOT,
            slots: Vec::new(),
            kind,
        }
    }

    /// Object of `kind` with every slot of `shape` set to `undefined`
    pub fn with_shape(kind: ObjectKind, shape: ShapeId, slot_count: usize) -> Self {
        Self {
            shape,
            slots: vec![Value::Undefined; slot_count],
            kind,
        }
    }

    /// Array object
    pub fn array(items: Vec<Value>) -> Self {
        Self::new(ObjectKind::Array(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_construction_order_shares_shapes() {
        let mut shapes = ShapeTable::new();
        let a = shapes.with_property(ShapeId::ROOT, "x");
        let a = shapes.with_property(a, "y");
        let b = shapes.with_property(ShapeId::ROOT, "x");
        let b = shapes.with_property(b, "y");
        assert_eq!(a, b);
        assert_eq!(shapes.lookup(a, "y"), Some(1));

        let c = shapes.with_property(ShapeId::ROOT, "y");
        let c = shapes.with_property(c, "x");
        assert_ne!(a, c);
    }

    #[test]
    fn test_removing_a_property_rebuilds_the_shape() {
        let mut shapes = ShapeTable::new();
        let full = shapes.for_fields(&["a".into(), "b".into(), "c".into()]);
        let without = shapes.without_property(full, "b");
        assert_eq!(shapes.keys(without).len(), 2);
        assert_eq!(shapes.lookup(without, "c"), Some(1));
        assert_eq!(without, shapes.for_fields(&["a".into(), "c".into()]));
    }
}
