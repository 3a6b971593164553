//! Scope & closure resolution
//!
//! A stack of function frames, each holding a stack of block scopes. A name
//! resolves to the nearest enclosing binding. When that binding belongs to an
//! outer function it is marked captured (stored in a capture cell) and added
//! to the environment record of every function between its owner and the
//! reference, so each closure can forward the cell to the closures it
//! creates.

use crate::compiler::ir::{BindingId, FunctionId, IrProgram};
use rustc_hash::FxHashMap;

#[derive(Debug)]
struct Frame {
    function: FunctionId,
    this_binding: BindingId,
    lexical_this: bool,
    is_async: bool,
    blocks: Vec<FxHashMap<String, BindingId>>,
    loop_depth: u32,
}

/// Lexical scopes of the functions currently being lowered
#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a function body
    pub fn push_function(
        &mut self,
        function: FunctionId,
        this_binding: BindingId,
        lexical_this: bool,
        is_async: bool,
    ) {
        self.frames.push(Frame {
            function,
            this_binding,
            lexical_this,
            is_async,
            blocks: Vec::new(),
            loop_depth: 0,
        });
    }

    /// Leave the innermost function
    pub fn pop_function(&mut self) {
        self.frames.pop();
    }

    /// Enter a block of the innermost function
    pub fn push_block(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.blocks.push(FxHashMap::default());
        }
    }

    /// Leave the innermost block
    pub fn pop_block(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.blocks.pop();
        }
    }

    /// Declare `name` in the innermost block; false when it is already
    /// declared there
    pub fn declare(&mut self, name: &str, binding: BindingId) -> bool {
        let Some(block) = self.frames.last_mut().and_then(|f| f.blocks.last_mut()) else {
            return false;
        };
        if block.contains_key(name) {
            return false;
        }
        block.insert(name.to_string(), binding);
        true
    }

    /// Function whose body is being lowered
    pub fn current_function(&self) -> Option<FunctionId> {
        self.frames.last().map(|f| f.function)
    }

    /// Number of open function frames
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Whether the innermost function may contain `await`
    pub fn is_async(&self) -> bool {
        self.frames.last().is_some_and(|f| f.is_async)
    }

    /// Whether the innermost function is the outermost one and no block is
    /// open, i.e. declarations land at module level
    pub fn at_module_level(&self) -> bool {
        self.frames.len() == 1 && self.frames[0].blocks.is_empty()
    }

    /// Whether a `while` loop of the innermost function is open
    pub fn in_loop(&self) -> bool {
        self.frames.last().is_some_and(|f| f.loop_depth > 0)
    }

    /// Enter a loop body
    pub fn enter_loop(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.loop_depth += 1;
        }
    }

    /// Leave a loop body
    pub fn exit_loop(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.loop_depth = frame.loop_depth.saturating_sub(1);
        }
    }

    /// Resolve a name to a function-owned binding, recording captures
    pub fn resolve(&self, program: &mut IrProgram, name: &str) -> Option<BindingId> {
        for (depth, frame) in self.frames.iter().enumerate().rev() {
            let found = frame.blocks.iter().rev().find_map(|b| b.get(name).copied());
            if let Some(binding) = found {
                self.capture(program, depth, binding);
                return Some(binding);
            }
        }
        None
    }

    /// Resolve `this`: the nearest function that does not inherit it
    pub fn resolve_this(&self, program: &mut IrProgram) -> Option<BindingId> {
        let (depth, frame) = self
            .frames
            .iter()
            .enumerate()
            .rev()
            .find(|(_, f)| !f.lexical_this)?;
        self.capture(program, depth, frame.this_binding);
        Some(frame.this_binding)
    }

    fn capture(&self, program: &mut IrProgram, owner_depth: usize, binding: BindingId) {
        if owner_depth + 1 >= self.frames.len() {
            return;
        }
        program.bindings[binding.index()].captured = true;
        for frame in &self.frames[owner_depth + 1..] {
            let captures = &mut program.function_mut(frame.function).captures;
            if !captures.contains(&binding) {
                captures.push(binding);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{BindingKind, FunctionKind, IrFunction};

    fn add_function(program: &mut IrProgram, name: &str) -> (FunctionId, BindingId) {
        let id = program.next_function_id();
        let this = program.new_binding("this", BindingKind::This, id);
        program.add_function(IrFunction::new(id, name, FunctionKind::Expression, this));
        (id, this)
    }

    #[test]
    fn test_nested_reference_captures_through_intermediate_frames() {
        let mut program = IrProgram::new("Test");
        let (outer, outer_this) = add_function(&mut program, "outer");
        let (middle, middle_this) = add_function(&mut program, "middle");
        let (inner, inner_this) = add_function(&mut program, "inner");

        let mut scopes = ScopeStack::new();
        scopes.push_function(outer, outer_this, false, false);
        scopes.push_block();
        let count = program.new_binding("count", BindingKind::Let, outer);
        assert!(scopes.declare("count", count));
        assert!(!scopes.declare("count", count));

        scopes.push_function(middle, middle_this, false, false);
        scopes.push_block();
        scopes.push_function(inner, inner_this, false, false);
        scopes.push_block();

        assert_eq!(scopes.resolve(&mut program, "count"), Some(count));
        assert!(program.binding(count).captured);
        assert_eq!(program.function(middle).captures, vec![count]);
        assert_eq!(program.function(inner).captures, vec![count]);
        assert!(program.function(outer).captures.is_empty());
        assert_eq!(scopes.resolve(&mut program, "missing"), None);
    }

    #[test]
    fn test_own_binding_is_not_captured() {
        let mut program = IrProgram::new("Test");
        let (f, this) = add_function(&mut program, "f");
        let mut scopes = ScopeStack::new();
        scopes.push_function(f, this, false, false);
        scopes.push_block();
        let x = program.new_binding("x", BindingKind::Let, f);
        scopes.declare("x", x);
        scopes.push_block();
        assert_eq!(scopes.resolve(&mut program, "x"), Some(x));
        assert!(!program.binding(x).captured);
    }

    #[test]
    fn test_lexical_this_resolves_to_enclosing_function() {
        let mut program = IrProgram::new("Test");
        let (method, method_this) = add_function(&mut program, "method");
        let (arrow, arrow_this) = add_function(&mut program, "arrow");
        let mut scopes = ScopeStack::new();
        scopes.push_function(method, method_this, false, false);
        scopes.push_function(arrow, arrow_this, true, false);

        assert_eq!(scopes.resolve_this(&mut program), Some(method_this));
        assert!(program.binding(method_this).captured);
        assert_eq!(program.function(arrow).captures, vec![method_this]);
    }

    #[test]
    fn test_loop_depth_is_per_function() {
        let mut program = IrProgram::new("Test");
        let (outer, outer_this) = add_function(&mut program, "outer");
        let (inner, inner_this) = add_function(&mut program, "inner");
        let mut scopes = ScopeStack::new();
        scopes.push_function(outer, outer_this, false, false);
        scopes.enter_loop();
        assert!(scopes.in_loop());
        scopes.push_function(inner, inner_this, false, false);
        assert!(!scopes.in_loop());
        scopes.pop_function();
        scopes.exit_loop();
        assert!(!scopes.in_loop());
    }
}
