//! Normalized program model
//!
//! The tree handed over by the external front end. It is pure data:
//! statements and expressions tagged by `kind`, each carrying the 1-based
//! source position it came from. Node kinds the compiler does not know are
//! kept as `Unsupported` nodes so the lowering passes can reject them with a
//! positioned diagnostic instead of failing the whole payload.

pub mod build;
pub mod expression;
pub mod payload;
pub mod statement;

pub use expression::*;
pub use payload::{decode_payload, FrontEndDiagnostic, Payload, PayloadError, SCHEMA_VERSION};
pub use statement::*;

use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Source position of a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Position {
    /// Line (1-based, 0 when unknown)
    pub line: u32,
    /// Column (1-based, 0 when unknown)
    pub column: u32,
}

impl Position {
    /// Create a position
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Root of a normalized program (one source file)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Top-level statements
    #[serde(default)]
    pub statements: Vec<Stmt>,
}

impl Program {
    /// Create a program
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }
}

/// Decorator marker applied to a declaration or parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decorator {
    /// Marker name, without `@`
    pub name: String,
    /// Raw argument source texts
    #[serde(default)]
    pub arguments: Vec<String>,
}

/// Function parameter
///
/// The payload may spell a parameter as a bare name or as
/// `{ "name": .., "decorators": [..] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ParamRepr")]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Markers applied to the parameter
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<Decorator>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ParamRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        decorators: Vec<Decorator>,
    },
}

impl From<ParamRepr> for Param {
    fn from(repr: ParamRepr) -> Self {
        match repr {
            ParamRepr::Name(name) => Param {
                name,
                decorators: Vec::new(),
            },
            ParamRepr::Full { name, decorators } => Param { name, decorators },
        }
    }
}

impl From<&str> for Param {
    fn from(name: &str) -> Self {
        Param {
            name: name.to_string(),
            decorators: Vec::new(),
        }
    }
}

/// How a function expression binds `this`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThisMode {
    /// `function` expressions: `this` comes from the call
    #[default]
    Dynamic,
    /// Arrow functions: `this` comes from the defining scope
    Lexical,
}

/// Function declaration or expression body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionNode {
    /// Declared name (empty for anonymous expressions)
    #[serde(default)]
    pub name: String,
    /// Parameters
    #[serde(default)]
    pub parameters: Vec<Param>,
    /// Body statements
    #[serde(default)]
    pub body: Vec<Stmt>,
    /// `async` function
    #[serde(default, rename = "async")]
    pub is_async: bool,
    /// `this` binding mode
    #[serde(default)]
    pub this_mode: ThisMode,
    /// Markers applied to the declaration
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<Decorator>,
}

/// Class field declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldNode {
    /// Field name
    pub name: String,
    /// Initializer, evaluated at construction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer: Option<Expr>,
}

/// Class method (or constructor)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodNode {
    /// Method name (`constructor` for constructors)
    pub name: String,
    /// Parameters
    #[serde(default)]
    pub parameters: Vec<Param>,
    /// Body statements
    #[serde(default)]
    pub body: Vec<Stmt>,
    /// `async` method
    #[serde(default, rename = "async")]
    pub is_async: bool,
    /// Markers applied to the method
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<Decorator>,
}

/// Class declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassNode {
    /// Class name
    pub name: String,
    /// Name of the superclass, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_class_name: Option<String>,
    /// Field declarations, in source order
    #[serde(default)]
    pub fields: Vec<FieldNode>,
    /// Explicit constructor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constructor_method: Option<MethodNode>,
    /// Methods, in source order
    #[serde(default)]
    pub methods: Vec<MethodNode>,
    /// Markers applied to the class
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<Decorator>,
}

/// Read `kind`, `line` and `column` of a raw node
fn node_header<E: serde::de::Error>(value: &Value, what: &str) -> Result<(String, Position), E> {
    let kind = value
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| E::custom(format!("{what} node without `kind`")))?
        .to_string();
    let coord = |key: &str| value.get(key).and_then(Value::as_u64).unwrap_or(0) as u32;
    Ok((kind, Position::new(coord("line"), coord("column"))))
}

impl<'de> Deserialize<'de> for Stmt {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let (name, position) = node_header::<D::Error>(&value, "statement")?;
        let kind = match StmtKind::deserialize(value) {
            Ok(StmtKind::Unknown) => StmtKind::Unsupported { name },
            Ok(kind) => kind,
            Err(e) => {
                return Err(D::Error::custom(format!(
                    "malformed {name} at line {}: {e}",
                    position.line
                )))
            }
        };
        Ok(Stmt {
            kind,
            line: position.line,
            column: position.column,
        })
    }
}

impl<'de> Deserialize<'de> for Expr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let (name, position) = node_header::<D::Error>(&value, "expression")?;
        let kind = match ExprKind::deserialize(value) {
            Ok(ExprKind::Unknown) => ExprKind::Unsupported { name },
            Ok(kind) => kind,
            Err(e) => {
                return Err(D::Error::custom(format!(
                    "malformed {name} at line {}: {e}",
                    position.line
                )))
            }
        };
        Ok(Expr {
            kind,
            line: position.line,
            column: position.column,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_and_decorated_params() {
        let params: Vec<Param> = serde_json::from_str(
            r#"["a", {"name": "b", "decorators": [{"name": "Body"}]}]"#,
        )
        .unwrap();
        assert_eq!(params[0].name, "a");
        assert!(params[0].decorators.is_empty());
        assert_eq!(params[1].decorators[0].name, "Body");
    }

    #[test]
    fn test_unknown_kinds_become_unsupported_nodes() {
        let stmt: Stmt =
            serde_json::from_str(r#"{"kind": "LabeledStatement", "line": 4, "column": 2}"#)
                .unwrap();
        assert_eq!(
            stmt.kind,
            StmtKind::Unsupported {
                name: "LabeledStatement".to_string()
            }
        );
        assert_eq!((stmt.line, stmt.column), (4, 2));

        let expr: Expr = serde_json::from_str(r#"{"kind": "YieldExpression"}"#).unwrap();
        assert!(matches!(expr.kind, ExprKind::Unsupported { ref name } if name == "YieldExpression"));
    }

    #[test]
    fn test_malformed_node_names_kind_and_line() {
        let err = serde_json::from_str::<Stmt>(r#"{"kind": "ReturnStatement", "line": 9, "expression": 3}"#)
            .unwrap_err()
            .to_string();
        assert!(err.contains("ReturnStatement"), "{err}");
        assert!(err.contains("line 9"), "{err}");
    }

    #[test]
    fn test_built_tree_survives_json() {
        use super::build::*;
        let program = Program::new(vec![
            function("add", &["a", "b"], vec![ret(binary(var("a"), "+", var("b")))]),
            log(call(var("add"), vec![num(2.0), num(3.0)])),
        ]);
        let text = serde_json::to_string(&program).unwrap();
        let back: Program = serde_json::from_str(&text).unwrap();
        assert_eq!(back, program);
    }
}
