//! IR expressions

use super::{BindingId, ClassId, FunctionId, GlobalId, SiteId};
use crate::compiler::bytecode::Builtin;

/// Resolved variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Var {
    /// Function-owned binding (stack slot, capture cell or environment entry)
    Binding(BindingId),
    /// Module-level binding
    Global(GlobalId),
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `+x`
    Plus,
    /// `!x`
    Not,
    /// `typeof x`
    TypeOf,
}

/// Binary operators evaluating both operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    LooseEq,
    /// `!=`
    LooseNe,
    /// `===`
    StrictEq,
    /// `!==`
    StrictNe,
}

impl BinaryOp {
    /// Parse an operator token
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "%" => Self::Mod,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "==" => Self::LooseEq,
            "!=" => Self::LooseNe,
            "===" => Self::StrictEq,
            "!==" => Self::StrictNe,
            _ => return None,
        })
    }
}

/// Short-circuit operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// `&&`
    And,
    /// `||`
    Or,
    /// `??`
    Nullish,
}

impl LogicalOp {
    /// Parse an operator token
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "&&" => Self::And,
            "||" => Self::Or,
            "??" => Self::Nullish,
            _ => return None,
        })
    }
}

/// IR expression
#[derive(Debug, Clone, PartialEq)]
pub enum IrExpr {
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// Boolean constant
    Bool(bool),
    /// Number constant
    Number(f64),
    /// String constant
    String(String),
    /// Read a variable
    Load(Var),
    /// Write a variable, yielding the value
    Store(Var, Box<IrExpr>),
    /// Host value
    Builtin(Builtin),
    /// Class value
    Class(ClassId),
    /// Instantiate a closure over the current environment
    Closure(FunctionId),
    /// Unary operator
    Unary(UnaryOp, Box<IrExpr>),
    /// Binary operator
    Binary(BinaryOp, Box<IrExpr>, Box<IrExpr>),
    /// Short-circuit operator
    Logical(LogicalOp, Box<IrExpr>, Box<IrExpr>),
    /// `c ? a : b`
    Conditional(Box<IrExpr>, Box<IrExpr>, Box<IrExpr>),
    /// Plain call (`this` is undefined)
    Call {
        /// Callee
        callee: Box<IrExpr>,
        /// Arguments, possibly `Spread`
        args: Vec<IrExpr>,
        /// `f?.()`: skip the call when the callee is nullish
        optional: bool,
    },
    /// `receiver.name(args)`
    CallMethod {
        /// Receiver, passed as `this`
        receiver: Box<IrExpr>,
        /// Method name
        name: String,
        /// Property site of the lookup
        site: SiteId,
        /// Arguments, possibly `Spread`
        args: Vec<IrExpr>,
        /// `o?.m()`: skip when the receiver is nullish
        optional: bool,
    },
    /// `receiver[key](args)`
    CallIndex {
        /// Receiver, passed as `this`
        receiver: Box<IrExpr>,
        /// Computed key
        key: Box<IrExpr>,
        /// Arguments, possibly `Spread`
        args: Vec<IrExpr>,
    },
    /// `new constructor(args)`
    New {
        /// Constructor
        constructor: Box<IrExpr>,
        /// Arguments, possibly `Spread`
        args: Vec<IrExpr>,
    },
    /// `object.name`
    GetProp {
        /// Receiver
        object: Box<IrExpr>,
        /// Property name
        name: String,
        /// Property site
        site: SiteId,
        /// `o?.p`: yield undefined when the receiver is nullish
        optional: bool,
    },
    /// `object.name = value`, yielding the value
    SetProp {
        /// Receiver
        object: Box<IrExpr>,
        /// Property name
        name: String,
        /// Property site
        site: SiteId,
        /// Stored value
        value: Box<IrExpr>,
    },
    /// `object.name op= value`, evaluating `object` once
    UpdateProp {
        /// Receiver
        object: Box<IrExpr>,
        /// Property name
        name: String,
        /// Property site (shared by the read and the write)
        site: SiteId,
        /// Combining operator
        op: BinaryOp,
        /// Right-hand side
        value: Box<IrExpr>,
    },
    /// `object[index]`
    GetIndex {
        /// Receiver
        object: Box<IrExpr>,
        /// Key
        index: Box<IrExpr>,
    },
    /// `object[index] = value`, yielding the value
    SetIndex {
        /// Receiver
        object: Box<IrExpr>,
        /// Key
        index: Box<IrExpr>,
        /// Stored value
        value: Box<IrExpr>,
    },
    /// `delete object.name`
    Delete {
        /// Receiver
        object: Box<IrExpr>,
        /// Property name
        name: String,
    },
    /// Array literal, elements possibly `Spread`
    Array(Vec<IrExpr>),
    /// Object literal
    Object(Vec<(String, IrExpr)>),
    /// `...e` inside argument lists and array literals
    Spread(Box<IrExpr>),
    /// `await e` (removed by the async transform)
    Await(Box<IrExpr>),
}

impl IrExpr {
    /// Boxed helper
    pub fn boxed(self) -> Box<IrExpr> {
        Box::new(self)
    }

    /// Whether the expression is a literal constant
    pub fn is_constant(&self) -> bool {
        matches!(
            self,
            IrExpr::Undefined
                | IrExpr::Null
                | IrExpr::Bool(_)
                | IrExpr::Number(_)
                | IrExpr::String(_)
        )
    }

    /// Whether evaluating the expression has no observable effect and its
    /// value cannot change between evaluations
    pub fn is_stable(&self) -> bool {
        self.is_constant() || matches!(self, IrExpr::Builtin(_) | IrExpr::Class(_))
    }

    /// Direct sub-expressions in evaluation order
    pub fn children(&self) -> Vec<&IrExpr> {
        match self {
            IrExpr::Store(_, v)
            | IrExpr::Unary(_, v)
            | IrExpr::Spread(v)
            | IrExpr::Await(v) => vec![&**v],
            IrExpr::Binary(_, a, b) | IrExpr::Logical(_, a, b) => vec![&**a, &**b],
            IrExpr::Conditional(c, a, b) => vec![&**c, &**a, &**b],
            IrExpr::Call { callee, args, .. } => {
                std::iter::once(&**callee).chain(args.iter()).collect()
            }
            IrExpr::CallMethod { receiver, args, .. } => {
                std::iter::once(&**receiver).chain(args.iter()).collect()
            }
            IrExpr::CallIndex {
                receiver,
                key,
                args,
            } => [&**receiver, &**key].into_iter().chain(args.iter()).collect(),
            IrExpr::New { constructor, args } => {
                std::iter::once(&**constructor).chain(args.iter()).collect()
            }
            IrExpr::GetProp { object, .. } | IrExpr::Delete { object, .. } => vec![&**object],
            IrExpr::SetProp { object, value, .. } | IrExpr::UpdateProp { object, value, .. } => {
                vec![&**object, &**value]
            }
            IrExpr::GetIndex { object, index } => vec![&**object, &**index],
            IrExpr::SetIndex {
                object,
                index,
                value,
            } => vec![&**object, &**index, &**value],
            IrExpr::Array(items) => items.iter().collect(),
            IrExpr::Object(entries) => entries.iter().map(|(_, v)| v).collect(),
            _ => Vec::new(),
        }
    }

    /// Direct sub-expressions in evaluation order, mutably
    pub fn children_mut(&mut self) -> Vec<&mut IrExpr> {
        match self {
            IrExpr::Store(_, v)
            | IrExpr::Unary(_, v)
            | IrExpr::Spread(v)
            | IrExpr::Await(v) => vec![&mut **v],
            IrExpr::Binary(_, a, b) | IrExpr::Logical(_, a, b) => vec![&mut **a, &mut **b],
            IrExpr::Conditional(c, a, b) => vec![&mut **c, &mut **a, &mut **b],
            IrExpr::Call { callee, args, .. } => {
                std::iter::once(&mut **callee).chain(args.iter_mut()).collect()
            }
            IrExpr::CallMethod { receiver, args, .. } => {
                std::iter::once(&mut **receiver).chain(args.iter_mut()).collect()
            }
            IrExpr::CallIndex {
                receiver,
                key,
                args,
            } => [&mut **receiver, &mut **key]
                .into_iter()
                .chain(args.iter_mut())
                .collect(),
            IrExpr::New { constructor, args } => {
                std::iter::once(&mut **constructor).chain(args.iter_mut()).collect()
            }
            IrExpr::GetProp { object, .. } | IrExpr::Delete { object, .. } => vec![&mut **object],
            IrExpr::SetProp { object, value, .. } | IrExpr::UpdateProp { object, value, .. } => {
                vec![&mut **object, &mut **value]
            }
            IrExpr::GetIndex { object, index } => vec![&mut **object, &mut **index],
            IrExpr::SetIndex {
                object,
                index,
                value,
            } => vec![&mut **object, &mut **index, &mut **value],
            IrExpr::Array(items) => items.iter_mut().collect(),
            IrExpr::Object(entries) => entries.iter_mut().map(|(_, v)| v).collect(),
            _ => Vec::new(),
        }
    }

    /// Whether an `await` occurs anywhere in the expression
    pub fn contains_await(&self) -> bool {
        matches!(self, IrExpr::Await(_)) || self.children().into_iter().any(|c| c.contains_await())
    }
}
