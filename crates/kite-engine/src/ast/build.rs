//! Shorthand constructors for normalized trees
//!
//! Used by tests and by tools that synthesize programs without a front end.

use super::*;

fn stmt(kind: StmtKind) -> Stmt {
    Stmt::new(kind)
}

fn expr(kind: ExprKind) -> Expr {
    Expr::new(kind)
}

fn params(names: &[&str]) -> Vec<Param> {
    names.iter().map(|n| Param::from(*n)).collect()
}

// ============================================================================
// Statements
// ============================================================================

/// `let name = value;`
pub fn let_(name: &str, value: Expr) -> Stmt {
    stmt(StmtKind::Variable {
        name: name.to_string(),
        expression: Some(value),
        declaration_kind: DeclKind::Let,
    })
}

/// `const name = value;`
pub fn const_(name: &str, value: Expr) -> Stmt {
    stmt(StmtKind::Variable {
        name: name.to_string(),
        expression: Some(value),
        declaration_kind: DeclKind::Const,
    })
}

/// `let name;`
pub fn declare(name: &str) -> Stmt {
    stmt(StmtKind::Variable {
        name: name.to_string(),
        expression: None,
        declaration_kind: DeclKind::Let,
    })
}

/// `target = value;`
pub fn assign(target: Expr, value: Expr) -> Stmt {
    stmt(StmtKind::Assign {
        target,
        expression: value,
    })
}

/// `function name(params) { body }`
pub fn function(name: &str, parameters: &[&str], body: Vec<Stmt>) -> Stmt {
    stmt(StmtKind::Function {
        declaration: FunctionNode {
            name: name.to_string(),
            parameters: params(parameters),
            body,
            ..FunctionNode::default()
        },
    })
}

/// `async function name(params) { body }`
pub fn async_function(name: &str, parameters: &[&str], body: Vec<Stmt>) -> Stmt {
    stmt(StmtKind::Function {
        declaration: FunctionNode {
            name: name.to_string(),
            parameters: params(parameters),
            body,
            is_async: true,
            ..FunctionNode::default()
        },
    })
}

/// Function declaration from a prepared node
pub fn function_decl(declaration: FunctionNode) -> Stmt {
    stmt(StmtKind::Function { declaration })
}

/// `class ..`
pub fn class_decl(declaration: ClassNode) -> Stmt {
    stmt(StmtKind::Class { declaration })
}

/// `if (condition) { then } else { otherwise }`
pub fn if_(condition: Expr, then_block: Vec<Stmt>, else_block: Vec<Stmt>) -> Stmt {
    stmt(StmtKind::If {
        condition,
        then_block,
        else_block,
    })
}

/// `while (condition) { body }`
pub fn while_(condition: Expr, body: Vec<Stmt>) -> Stmt {
    stmt(StmtKind::While { condition, body })
}

/// `for (;;) {}`
pub fn for_loop() -> Stmt {
    stmt(StmtKind::For)
}

/// `for (.. of ..) {}`
pub fn for_of() -> Stmt {
    stmt(StmtKind::ForOf)
}

/// `for (.. in ..) {}`
pub fn for_in() -> Stmt {
    stmt(StmtKind::ForIn)
}

/// `try { .. } catch (binding) { .. }`
pub fn try_catch(try_block: Vec<Stmt>, binding: &str, catch_block: Vec<Stmt>) -> Stmt {
    stmt(StmtKind::Try {
        try_block,
        catch_binding: Some(binding.to_string()),
        catch_block: Some(catch_block),
        finally_block: None,
    })
}

/// `try { .. } finally { .. }`
pub fn try_finally(try_block: Vec<Stmt>, finally_block: Vec<Stmt>) -> Stmt {
    stmt(StmtKind::Try {
        try_block,
        catch_binding: None,
        catch_block: None,
        finally_block: Some(finally_block),
    })
}

/// `try { .. } catch (binding) { .. } finally { .. }`
pub fn try_catch_finally(
    try_block: Vec<Stmt>,
    binding: &str,
    catch_block: Vec<Stmt>,
    finally_block: Vec<Stmt>,
) -> Stmt {
    stmt(StmtKind::Try {
        try_block,
        catch_binding: Some(binding.to_string()),
        catch_block: Some(catch_block),
        finally_block: Some(finally_block),
    })
}

/// `break;`
pub fn break_() -> Stmt {
    stmt(StmtKind::Break)
}

/// `continue;`
pub fn continue_() -> Stmt {
    stmt(StmtKind::Continue)
}

/// `{ statements }`
pub fn block(statements: Vec<Stmt>) -> Stmt {
    stmt(StmtKind::Block { statements })
}

/// `super(arguments);`
pub fn super_call(arguments: Vec<Expr>) -> Stmt {
    stmt(StmtKind::SuperCall { arguments })
}

/// `return value;`
pub fn ret(value: Expr) -> Stmt {
    stmt(StmtKind::Return {
        expression: Some(value),
    })
}

/// `return;`
pub fn ret_void() -> Stmt {
    stmt(StmtKind::Return { expression: None })
}

/// `throw value;`
pub fn throw(value: Expr) -> Stmt {
    stmt(StmtKind::Throw { expression: value })
}

/// `console.log(value);`
pub fn log(value: Expr) -> Stmt {
    stmt(StmtKind::ConsoleLog { expression: value })
}

/// `value;`
pub fn expr_stmt(value: Expr) -> Stmt {
    stmt(StmtKind::Expression { expression: value })
}

/// `import { names } from source;`
pub fn import(source: &str, names: &[&str]) -> Stmt {
    stmt(StmtKind::Import {
        source: source.to_string(),
        named_bindings: names
            .iter()
            .map(|n| ImportBinding {
                imported: n.to_string(),
                local: n.to_string(),
            })
            .collect(),
        default_binding: None,
        namespace_binding: None,
    })
}

/// `import { imported as local } from source;`
pub fn import_as(source: &str, imported: &str, local: &str) -> Stmt {
    stmt(StmtKind::Import {
        source: source.to_string(),
        named_bindings: vec![ImportBinding {
            imported: imported.to_string(),
            local: local.to_string(),
        }],
        default_binding: None,
        namespace_binding: None,
    })
}

/// `import name from source;`
pub fn import_default(source: &str, name: &str) -> Stmt {
    stmt(StmtKind::Import {
        source: source.to_string(),
        named_bindings: Vec::new(),
        default_binding: Some(name.to_string()),
        namespace_binding: None,
    })
}

/// `import * as name from source;`
pub fn import_namespace(source: &str, name: &str) -> Stmt {
    stmt(StmtKind::Import {
        source: source.to_string(),
        named_bindings: Vec::new(),
        default_binding: None,
        namespace_binding: Some(name.to_string()),
    })
}

/// `import source;`
pub fn import_side_effect(source: &str) -> Stmt {
    import(source, &[])
}

/// `export <declaration>`
pub fn export(declaration: Stmt) -> Stmt {
    stmt(StmtKind::Export {
        declaration: Box::new(declaration),
    })
}

/// `export { local as exported, .. };`
pub fn export_named(pairs: &[(&str, &str)]) -> Stmt {
    stmt(StmtKind::ExportNamed {
        specifiers: pairs
            .iter()
            .map(|(local, exported)| ExportSpecifier {
                local: local.to_string(),
                exported: exported.to_string(),
            })
            .collect(),
    })
}

/// Statement of a kind outside the supported subset
pub fn unsupported_stmt(kind: &str) -> Stmt {
    stmt(StmtKind::Unsupported {
        name: kind.to_string(),
    })
}

// ============================================================================
// Expressions
// ============================================================================

/// Numeric literal
pub fn num(value: f64) -> Expr {
    expr(ExprKind::Number {
        text: value.to_string(),
    })
}

/// Numeric literal with explicit source text
pub fn num_text(text: &str) -> Expr {
    expr(ExprKind::Number {
        text: text.to_string(),
    })
}

/// String literal
pub fn str_lit(text: &str) -> Expr {
    expr(ExprKind::String {
        text: text.to_string(),
    })
}

/// Boolean literal
pub fn boolean(value: bool) -> Expr {
    expr(ExprKind::Boolean { value })
}

/// `null`
pub fn null() -> Expr {
    expr(ExprKind::Null)
}

/// `undefined`
pub fn undefined() -> Expr {
    expr(ExprKind::Undefined)
}

/// Template literal
pub fn template(quasis: &[&str], expressions: Vec<Expr>) -> Expr {
    expr(ExprKind::Template {
        quasis: quasis.iter().map(|q| q.to_string()).collect(),
        expressions,
    })
}

/// Identifier reference
pub fn var(name: &str) -> Expr {
    expr(ExprKind::Variable {
        name: name.to_string(),
    })
}

/// `this`
pub fn this() -> Expr {
    expr(ExprKind::This)
}

/// Unary operator
pub fn unary(operator: &str, operand: Expr) -> Expr {
    expr(ExprKind::Unary {
        operator: operator.to_string(),
        expression: Box::new(operand),
    })
}

/// `await operand`
pub fn await_(operand: Expr) -> Expr {
    expr(ExprKind::Await {
        expression: Box::new(operand),
    })
}

fn function_expr(parameters: &[&str], body: Vec<Stmt>, is_async: bool, this_mode: ThisMode) -> Expr {
    expr(ExprKind::Function(FunctionNode {
        name: String::new(),
        parameters: params(parameters),
        body,
        is_async,
        this_mode,
        decorators: Vec::new(),
    }))
}

/// `function (params) { body }`
pub fn func(parameters: &[&str], body: Vec<Stmt>) -> Expr {
    function_expr(parameters, body, false, ThisMode::Dynamic)
}

/// `(params) => { body }`
pub fn arrow(parameters: &[&str], body: Vec<Stmt>) -> Expr {
    function_expr(parameters, body, false, ThisMode::Lexical)
}

/// `async (params) => { body }`
pub fn async_arrow(parameters: &[&str], body: Vec<Stmt>) -> Expr {
    function_expr(parameters, body, true, ThisMode::Lexical)
}

/// Binary operator
pub fn binary(left: Expr, operator: &str, right: Expr) -> Expr {
    expr(ExprKind::Binary {
        left: Box::new(left),
        operator: operator.to_string(),
        right: Box::new(right),
    })
}

/// Assignment expression
pub fn assign_expr(target: Expr, operator: &str, value: Expr) -> Expr {
    expr(ExprKind::Assign {
        target: Box::new(target),
        operator: operator.to_string(),
        expression: Box::new(value),
    })
}

/// `condition ? when_true : when_false`
pub fn cond(condition: Expr, when_true: Expr, when_false: Expr) -> Expr {
    expr(ExprKind::Conditional {
        condition: Box::new(condition),
        when_true: Box::new(when_true),
        when_false: Box::new(when_false),
    })
}

/// `callee(arguments)`
pub fn call(callee: Expr, arguments: Vec<Expr>) -> Expr {
    expr(ExprKind::Call {
        callee: Box::new(callee),
        arguments,
    })
}

/// `callee?.(arguments)`
pub fn opt_call(callee: Expr, arguments: Vec<Expr>) -> Expr {
    expr(ExprKind::OptionalCall {
        callee: Box::new(callee),
        arguments,
    })
}

/// `receiver.name(arguments)`
pub fn method_call(receiver: Expr, name: &str, arguments: Vec<Expr>) -> Expr {
    call(member(receiver, name), arguments)
}

/// `receiver.name`
pub fn member(receiver: Expr, name: &str) -> Expr {
    expr(ExprKind::Member {
        receiver: Box::new(receiver),
        member: name.to_string(),
    })
}

/// `receiver?.name`
pub fn opt_member(receiver: Expr, name: &str) -> Expr {
    expr(ExprKind::OptionalMember {
        receiver: Box::new(receiver),
        member: name.to_string(),
    })
}

/// `receiver[index]`
pub fn element(receiver: Expr, index: Expr) -> Expr {
    expr(ExprKind::Element {
        receiver: Box::new(receiver),
        index: Box::new(index),
    })
}

/// `new constructor(arguments)`
pub fn new_(constructor: Expr, arguments: Vec<Expr>) -> Expr {
    expr(ExprKind::New {
        constructor: Box::new(constructor),
        arguments,
    })
}

/// `[elements]`
pub fn array(elements: Vec<Expr>) -> Expr {
    expr(ExprKind::Array { elements })
}

/// `{ key: value, .. }`
pub fn object(entries: Vec<(&str, Expr)>) -> Expr {
    expr(ExprKind::Object {
        entries: entries
            .into_iter()
            .map(|(key, value)| ObjectEntry {
                key: key.to_string(),
                value,
            })
            .collect(),
    })
}

/// `...operand`
pub fn spread(operand: Expr) -> Expr {
    expr(ExprKind::Spread {
        expression: Box::new(operand),
    })
}

/// `import(source)`
pub fn import_call(source: Expr) -> Expr {
    expr(ExprKind::ImportCall {
        source: Some(Box::new(source)),
    })
}

/// Expression of a kind outside the supported subset
pub fn unsupported_expr(kind: &str) -> Expr {
    expr(ExprKind::Unsupported {
        name: kind.to_string(),
    })
}

// ============================================================================
// Classes
// ============================================================================

/// Start a class declaration
pub fn class(name: &str) -> ClassNode {
    ClassNode {
        name: name.to_string(),
        ..ClassNode::default()
    }
}

impl ClassNode {
    /// Set the superclass
    pub fn extends(mut self, parent: &str) -> Self {
        self.super_class_name = Some(parent.to_string());
        self
    }

    /// Add a field without initializer
    pub fn field(mut self, name: &str) -> Self {
        self.fields.push(FieldNode {
            name: name.to_string(),
            initializer: None,
        });
        self
    }

    /// Add a field with initializer
    pub fn field_init(mut self, name: &str, initializer: Expr) -> Self {
        self.fields.push(FieldNode {
            name: name.to_string(),
            initializer: Some(initializer),
        });
        self
    }

    /// Set the constructor
    pub fn constructor(mut self, parameters: &[&str], body: Vec<Stmt>) -> Self {
        self.constructor_method = Some(MethodNode {
            name: "constructor".to_string(),
            parameters: params(parameters),
            body,
            ..MethodNode::default()
        });
        self
    }

    /// Add a method
    pub fn method(mut self, name: &str, parameters: &[&str], body: Vec<Stmt>) -> Self {
        self.methods.push(MethodNode {
            name: name.to_string(),
            parameters: params(parameters),
            body,
            ..MethodNode::default()
        });
        self
    }

    /// Add an async method
    pub fn async_method(mut self, name: &str, parameters: &[&str], body: Vec<Stmt>) -> Self {
        self.methods.push(MethodNode {
            name: name.to_string(),
            parameters: params(parameters),
            body,
            is_async: true,
            ..MethodNode::default()
        });
        self
    }

    /// Add a marker to the class
    pub fn decorated(mut self, name: &str, arguments: &[&str]) -> Self {
        self.decorators.push(Decorator {
            name: name.to_string(),
            arguments: arguments.iter().map(|a| a.to_string()).collect(),
        });
        self
    }
}

/// Build a marker
pub fn decorator(name: &str, arguments: &[&str]) -> Decorator {
    Decorator {
        name: name.to_string(),
        arguments: arguments.iter().map(|a| a.to_string()).collect(),
    }
}
