//! Compilation errors
//!
//! Every compile-time failure carries a stable code, the offending source
//! position and, for rejected language features, a hint on what to use
//! instead. Failures are fatal: the first one aborts the compile.

use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Result alias for the compiler
pub type CompileResult<T> = Result<T, CompileError>;

/// Stable diagnostic codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    /// Payload schema mismatch, missing program or malformed node
    AstSchema,
    /// Front end reported diagnostics or could not run
    FrontEnd,
    /// Reading sources or writing units failed
    Io,
    /// Statement kind outside the subset
    UnsupportedStatement,
    /// Expression kind or operator outside the subset
    UnsupportedExpression,
    /// `for`, `for..of`, `for..in`
    UnsupportedFor,
    /// `await` in an `if`/`while` condition
    AwaitCondition,
    /// `await` in a non-async function
    AwaitOutsideAsync,
    /// Bare module specifier
    ImportNonRelative,
    /// `import { a as b }`
    ImportAlias,
    /// `import d from`
    ImportDefault,
    /// `import * as ns from`
    ImportNamespace,
    /// Imported name is not exported
    ImportMissingExport,
    /// Specifier does not resolve to a file
    ModuleNotFound,
    /// Cyclic imports
    ImportCycle,
    /// `super(..)` outside a derived constructor's first statement
    SuperMisuse,
    /// Derived constructor without leading `super(..)`
    SuperMissing,
    /// Superclass is not a known class
    MissingSuperclass,
    /// Class declared outside module top level
    ClassNested,
    /// Repeated marker on a declaration or several on a parameter
    DecoratorMultiple,
    /// Unknown identifier
    Unresolved,
    /// Name declared twice in one scope
    DuplicateDeclaration,
    /// Assignment to a `const` binding or import
    ConstAssign,
    /// Assignment to something that is not a variable, member or element
    AssignTarget,
    /// `break`/`continue` outside a loop
    BreakOutsideLoop,
    /// Name exported twice
    DuplicateExport,
    /// `import(..)`
    DynamicImport,
    /// `eval`
    Eval,
    /// `Function(..)` / `new Function(..)`
    FunctionConstructor,
    /// `Proxy`
    Proxy,
    /// Generated unit rejected by the verifier
    Verify,
    /// Encoding limits exceeded
    Limit,
}

impl DiagnosticCode {
    /// Stable textual code
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AstSchema => "KITE-AST-SCHEMA",
            Self::FrontEnd => "KITE-FRONTEND",
            Self::Io => "KITE-IO",
            Self::UnsupportedStatement => "KITE-UNSUPPORTED-STATEMENT",
            Self::UnsupportedExpression => "KITE-UNSUPPORTED-EXPRESSION",
            Self::UnsupportedFor => "KITE-UNSUPPORTED-FOR",
            Self::AwaitCondition => "KITE-AWAIT-CONDITION",
            Self::AwaitOutsideAsync => "KITE-AWAIT-OUTSIDE-ASYNC",
            Self::ImportNonRelative => "KITE-IMPORT-NON-RELATIVE",
            Self::ImportAlias => "KITE-IMPORT-ALIAS",
            Self::ImportDefault => "KITE-IMPORT-DEFAULT",
            Self::ImportNamespace => "KITE-IMPORT-NAMESPACE",
            Self::ImportMissingExport => "KITE-IMPORT-MISSING-EXPORT",
            Self::ModuleNotFound => "KITE-MODULE-NOT-FOUND",
            Self::ImportCycle => "KITE-IMPORT-CYCLE",
            Self::SuperMisuse => "KITE-SUPER-MISUSE",
            Self::SuperMissing => "KITE-SUPER-MISSING",
            Self::MissingSuperclass => "KITE-MISSING-SUPERCLASS",
            Self::ClassNested => "KITE-CLASS-NESTED",
            Self::DecoratorMultiple => "KITE-DECORATOR-MULTIPLE",
            Self::Unresolved => "KITE-UNRESOLVED",
            Self::DuplicateDeclaration => "KITE-DUPLICATE-DECLARATION",
            Self::ConstAssign => "KITE-CONST-ASSIGN",
            Self::AssignTarget => "KITE-ASSIGN-TARGET",
            Self::BreakOutsideLoop => "KITE-BREAK-OUTSIDE-LOOP",
            Self::DuplicateExport => "KITE-DUPLICATE-EXPORT",
            Self::DynamicImport => "KITE-DYNAMIC-IMPORT",
            Self::Eval => "KITE-EVAL",
            Self::FunctionConstructor => "KITE-FUNCTION-CONSTRUCTOR",
            Self::Proxy => "KITE-PROXY",
            Self::Verify => "KITE-VERIFY",
            Self::Limit => "KITE-LIMIT",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fatal compile-time diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message} ({file}:{line}:{column})")]
pub struct CompileError {
    /// Stable code
    pub code: DiagnosticCode,
    /// Human-readable detail naming the offending construct
    pub message: String,
    /// Source file
    pub file: String,
    /// Line (1-based, 0 when unknown)
    pub line: u32,
    /// Column (1-based, 0 when unknown)
    pub column: u32,
    /// What to use instead, for rejected features
    pub guidance: Option<String>,
}

impl CompileError {
    /// Create a diagnostic without position
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            file: String::new(),
            line: 0,
            column: 0,
            guidance: None,
        }
    }

    /// Attach a position
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    /// Attach the source file, unless one is already set
    pub fn in_file(mut self, file: &Path) -> Self {
        if self.file.is_empty() {
            self.file = file.display().to_string();
        }
        self
    }

    /// Attach guidance text
    pub fn with_guidance(mut self, guidance: impl Into<String>) -> Self {
        self.guidance = Some(guidance.into());
        self
    }

    /// Stable code text
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendering_includes_code_and_position() {
        let err = CompileError::new(DiagnosticCode::UnsupportedFor, "`for` loops are not supported")
            .at(3, 5)
            .in_file(Path::new("/src/main.ts"));
        assert_eq!(
            err.to_string(),
            "KITE-UNSUPPORTED-FOR: `for` loops are not supported (/src/main.ts:3:5)"
        );
    }

    #[test]
    fn test_first_file_wins() {
        let err = CompileError::new(DiagnosticCode::Unresolved, "x")
            .in_file(Path::new("a.ts"))
            .in_file(Path::new("b.ts"));
        assert_eq!(err.file, "a.ts");
    }
}
