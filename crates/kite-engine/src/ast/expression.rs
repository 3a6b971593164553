//! Expression nodes

use super::FunctionNode;
use serde::{Deserialize, Serialize};

/// An expression with its source position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expr {
    /// Expression kind and payload
    #[serde(flatten)]
    pub kind: ExprKind,
    /// Source line (1-based)
    pub line: u32,
    /// Source column (1-based)
    pub column: u32,
}

impl Expr {
    /// Create an expression without position
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            line: 0,
            column: 0,
        }
    }

    /// Set the source position
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    /// Wire name of the expression kind, used in diagnostics
    pub fn kind_name(&self) -> &str {
        match &self.kind {
            ExprKind::Number { .. } => "NumberLiteral",
            ExprKind::String { .. } => "StringLiteral",
            ExprKind::Boolean { .. } => "BooleanLiteral",
            ExprKind::Null => "NullLiteral",
            ExprKind::Undefined => "UndefinedLiteral",
            ExprKind::Template { .. } => "TemplateLiteral",
            ExprKind::Variable { .. } => "VariableExpression",
            ExprKind::This => "ThisExpression",
            ExprKind::Unary { .. } => "UnaryExpression",
            ExprKind::Await { .. } => "AwaitExpression",
            ExprKind::Function(_) => "FunctionExpression",
            ExprKind::Binary { .. } => "BinaryExpression",
            ExprKind::Assign { .. } => "AssignmentExpression",
            ExprKind::Conditional { .. } => "ConditionalExpression",
            ExprKind::Call { .. } => "CallExpression",
            ExprKind::OptionalCall { .. } => "OptionalCallExpression",
            ExprKind::Member { .. } => "MemberAccessExpression",
            ExprKind::OptionalMember { .. } => "OptionalMemberAccessExpression",
            ExprKind::Element { .. } => "ElementAccessExpression",
            ExprKind::New { .. } => "NewExpression",
            ExprKind::Array { .. } => "ArrayLiteralExpression",
            ExprKind::Object { .. } => "ObjectLiteralExpression",
            ExprKind::Spread { .. } => "SpreadElement",
            ExprKind::ImportCall { .. } => "ImportCallExpression",
            ExprKind::Unsupported { name } => name,
            ExprKind::Unknown => "Unknown",
        }
    }

    /// Whether this expression or any sub-expression outside nested
    /// functions is an `await`
    pub fn contains_await(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if matches!(e.kind, ExprKind::Await { .. }) {
                found = true;
            }
        });
        found
    }

    /// Visit this expression and its sub-expressions in evaluation order,
    /// without descending into function bodies
    pub fn walk(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        match &self.kind {
            ExprKind::Template { expressions, .. } => {
                expressions.iter().for_each(|e| e.walk(f));
            }
            ExprKind::Unary { expression, .. }
            | ExprKind::Await { expression }
            | ExprKind::Spread { expression } => expression.walk(f),
            ExprKind::Binary { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            ExprKind::Assign {
                target, expression, ..
            } => {
                target.walk(f);
                expression.walk(f);
            }
            ExprKind::Conditional {
                condition,
                when_true,
                when_false,
            } => {
                condition.walk(f);
                when_true.walk(f);
                when_false.walk(f);
            }
            ExprKind::Call { callee, arguments } | ExprKind::OptionalCall { callee, arguments } => {
                callee.walk(f);
                arguments.iter().for_each(|e| e.walk(f));
            }
            ExprKind::New {
                constructor,
                arguments,
            } => {
                constructor.walk(f);
                arguments.iter().for_each(|e| e.walk(f));
            }
            ExprKind::Member { receiver, .. } | ExprKind::OptionalMember { receiver, .. } => {
                receiver.walk(f)
            }
            ExprKind::Element { receiver, index } => {
                receiver.walk(f);
                index.walk(f);
            }
            ExprKind::Array { elements } => elements.iter().for_each(|e| e.walk(f)),
            ExprKind::Object { entries } => entries.iter().for_each(|e| e.value.walk(f)),
            ExprKind::ImportCall { source } => {
                if let Some(source) = source {
                    source.walk(f);
                }
            }
            _ => {}
        }
    }
}

/// `key: value` entry of an object literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Property name
    pub key: String,
    /// Property value
    pub value: Expr,
}

fn default_assign_operator() -> String {
    "=".to_string()
}

/// Expression kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all_fields = "camelCase")]
pub enum ExprKind {
    /// Numeric literal, as written
    #[serde(rename = "NumberLiteral")]
    Number {
        /// Source text
        text: String,
    },

    /// String literal (already unescaped)
    #[serde(rename = "StringLiteral")]
    String {
        /// Literal value
        text: String,
    },

    /// `true` / `false`
    #[serde(rename = "BooleanLiteral")]
    Boolean {
        /// Literal value
        value: bool,
    },

    /// `null`
    #[serde(rename = "NullLiteral")]
    Null,

    /// `undefined`
    #[serde(rename = "UndefinedLiteral")]
    Undefined,

    /// `` `a${b}c` ``
    #[serde(rename = "TemplateLiteral")]
    Template {
        /// Literal chunks, one more than `expressions`
        #[serde(default)]
        quasis: Vec<String>,
        /// Interpolated expressions
        #[serde(default)]
        expressions: Vec<Expr>,
    },

    /// Identifier reference
    #[serde(rename = "VariableExpression")]
    Variable {
        /// Referenced name
        name: String,
    },

    /// `this`
    #[serde(rename = "ThisExpression")]
    This,

    /// `-e`, `+e`, `!e`, `typeof e`, `delete o.p`
    #[serde(rename = "UnaryExpression")]
    Unary {
        /// Operator text
        operator: String,
        /// Operand
        expression: Box<Expr>,
    },

    /// `await e`
    #[serde(rename = "AwaitExpression")]
    Await {
        /// Awaited operand
        expression: Box<Expr>,
    },

    /// `function (..) {}` or `(..) => {}`
    #[serde(rename = "FunctionExpression")]
    Function(FunctionNode),

    /// `a op b`
    #[serde(rename = "BinaryExpression")]
    Binary {
        /// Left operand
        left: Box<Expr>,
        /// Operator text
        operator: String,
        /// Right operand
        right: Box<Expr>,
    },

    /// `t = e`, `t += e`
    #[serde(rename = "AssignmentExpression")]
    Assign {
        /// Variable, member or element target
        target: Box<Expr>,
        /// Operator text
        #[serde(default = "default_assign_operator")]
        operator: String,
        /// Assigned value
        expression: Box<Expr>,
    },

    /// `c ? a : b`
    #[serde(rename = "ConditionalExpression")]
    Conditional {
        /// Condition
        condition: Box<Expr>,
        /// Value when truthy
        when_true: Box<Expr>,
        /// Value when falsy
        when_false: Box<Expr>,
    },

    /// `f(..)`
    #[serde(rename = "CallExpression")]
    Call {
        /// Callee
        callee: Box<Expr>,
        /// Arguments, possibly spread
        #[serde(default)]
        arguments: Vec<Expr>,
    },

    /// `f?.(..)`
    #[serde(rename = "OptionalCallExpression")]
    OptionalCall {
        /// Callee
        callee: Box<Expr>,
        /// Arguments, possibly spread
        #[serde(default)]
        arguments: Vec<Expr>,
    },

    /// `o.p`
    #[serde(rename = "MemberAccessExpression")]
    Member {
        /// Receiver
        receiver: Box<Expr>,
        /// Property name
        member: String,
    },

    /// `o?.p`
    #[serde(rename = "OptionalMemberAccessExpression")]
    OptionalMember {
        /// Receiver
        receiver: Box<Expr>,
        /// Property name
        member: String,
    },

    /// `o[k]`
    #[serde(rename = "ElementAccessExpression")]
    Element {
        /// Receiver
        receiver: Box<Expr>,
        /// Key
        index: Box<Expr>,
    },

    /// `new C(..)`
    #[serde(rename = "NewExpression")]
    New {
        /// Constructor expression
        constructor: Box<Expr>,
        /// Arguments, possibly spread
        #[serde(default)]
        arguments: Vec<Expr>,
    },

    /// `[a, ...b]`
    #[serde(rename = "ArrayLiteralExpression")]
    Array {
        /// Elements, possibly spread
        #[serde(default)]
        elements: Vec<Expr>,
    },

    /// `{ k: v }`
    #[serde(rename = "ObjectLiteralExpression")]
    Object {
        /// Entries in source order
        #[serde(default)]
        entries: Vec<ObjectEntry>,
    },

    /// `...e` in calls and array literals
    #[serde(rename = "SpreadElement")]
    Spread {
        /// Spread operand
        expression: Box<Expr>,
    },

    /// `import(..)`
    #[serde(rename = "ImportCallExpression")]
    ImportCall {
        /// Specifier expression
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<Box<Expr>>,
    },

    /// Expression kind outside the supported subset
    #[serde(rename = "Unsupported")]
    Unsupported {
        /// Original node kind
        #[serde(rename = "unsupportedKind")]
        name: String,
    },

    /// Placeholder produced while decoding an unknown kind
    #[serde(other, skip_serializing)]
    Unknown,
}
