//! Front-end payload envelope
//!
//! ```text
//! { "schemaVersion": "kite-ast-v1",
//!   "diagnostics": [ { "code", "message", "line", "column" } ],
//!   "normalizedProgram": { "kind": "Program", "statements": [ .. ] } }
//! ```

use super::Program;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Schema version this compiler accepts
pub const SCHEMA_VERSION: &str = "kite-ast-v1";

/// Diagnostic reported by the front end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontEndDiagnostic {
    /// Front-end specific code
    #[serde(default)]
    pub code: String,
    /// Message
    pub message: String,
    /// Line (1-based)
    #[serde(default)]
    pub line: u32,
    /// Column (1-based)
    #[serde(default)]
    pub column: u32,
}

/// Complete front-end response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    /// Schema version of the tree
    pub schema_version: String,
    /// Front-end diagnostics; any entry fails the compile
    #[serde(default)]
    pub diagnostics: Vec<FrontEndDiagnostic>,
    /// The tree
    pub normalized_program: Option<Program>,
}

impl Payload {
    /// Wrap a program in a current-schema payload
    pub fn new(program: Program) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            diagnostics: Vec::new(),
            normalized_program: Some(program),
        }
    }

    /// Render as JSON text
    pub fn to_json(&self) -> String {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(program) = value
            .get_mut("normalizedProgram")
            .and_then(Value::as_object_mut)
        {
            program.insert("kind".to_string(), Value::String("Program".to_string()));
        }
        value.to_string()
    }
}

/// Payload contract failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Not JSON, or a node does not match its kind
    #[error("Malformed front-end payload: {0}")]
    Malformed(String),

    /// Unexpected schema version
    #[error("Unexpected schema version `{found}` (expected `{SCHEMA_VERSION}`)")]
    SchemaMismatch {
        /// Version found in the payload
        found: String,
    },

    /// `normalizedProgram` absent or null
    #[error("Front-end payload has no normalizedProgram")]
    MissingProgram,

    /// Front end reported a problem
    #[error("{}", .0.message)]
    Diagnostic(FrontEndDiagnostic),
}

/// Decode and validate a payload, returning its program
pub fn decode_payload(text: &str) -> Result<Program, PayloadError> {
    let root: Value =
        serde_json::from_str(text).map_err(|e| PayloadError::Malformed(e.to_string()))?;
    let found = root
        .get("schemaVersion")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if found != SCHEMA_VERSION {
        return Err(PayloadError::SchemaMismatch {
            found: found.to_string(),
        });
    }
    if let Some(first) = root
        .get("diagnostics")
        .and_then(Value::as_array)
        .and_then(|list| list.first())
    {
        let diagnostic: FrontEndDiagnostic = serde_json::from_value(first.clone())
            .map_err(|e| PayloadError::Malformed(e.to_string()))?;
        return Err(PayloadError::Diagnostic(diagnostic));
    }
    let program = match root.get("normalizedProgram") {
        None | Some(Value::Null) => return Err(PayloadError::MissingProgram),
        Some(program) => program.clone(),
    };
    serde_json::from_value(program).map_err(|e| PayloadError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;

    #[test]
    fn test_payload_round_trip() {
        let program = Program::new(vec![log(str_lit("hi"))]);
        let text = Payload::new(program.clone()).to_json();
        assert!(text.contains("\"kind\":\"Program\""));
        assert_eq!(decode_payload(&text).unwrap(), program);
    }

    #[test]
    fn test_schema_mismatch() {
        let err = decode_payload(r#"{"schemaVersion": "other-v9", "normalizedProgram": {}}"#)
            .unwrap_err();
        assert_eq!(
            err,
            PayloadError::SchemaMismatch {
                found: "other-v9".to_string()
            }
        );
    }

    #[test]
    fn test_missing_program() {
        let err = decode_payload(r#"{"schemaVersion": "kite-ast-v1", "normalizedProgram": null}"#)
            .unwrap_err();
        assert_eq!(err, PayloadError::MissingProgram);
    }

    #[test]
    fn test_first_diagnostic_is_reported() {
        let err = decode_payload(
            r#"{"schemaVersion": "kite-ast-v1",
                "diagnostics": [{"code": "TS1005", "message": "';' expected", "line": 3, "column": 7}],
                "normalizedProgram": null}"#,
        )
        .unwrap_err();
        match err {
            PayloadError::Diagnostic(d) => {
                assert_eq!(d.message, "';' expected");
                assert_eq!((d.line, d.column), (3, 7));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
