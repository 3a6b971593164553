//! Code Generator Context
//!
//! Per-function state during bytecode generation: the code buffer, labels
//! with pending jump fixups, local slot assignment, operand stack depth
//! bookkeeping, exception regions and the line table.

use super::UnitLayout;
use crate::compiler::bytecode::{
    function_flags, BytecodeWriter, ConstantPool, Function, Handler, Instruction, LineEntry,
    Opcode,
};
use crate::compiler::error::{CompileError, CompileResult, DiagnosticCode};
use crate::compiler::ir::{BindingId, FunctionKind, IrFunction, IrProgram, IrStmt, SourcePos};
use rustc_hash::FxHashMap;
use std::path::Path;

/// Jump target inside the function being generated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Label(usize);

/// Fixed instruction operand
#[derive(Debug, Clone, Copy)]
pub(super) enum Operand {
    U8(u8),
    U16(u16),
    U32(u32),
}

/// Jump operand waiting for its label
struct Fixup {
    /// Offset of the jumping instruction
    instr: usize,
    /// Offset of the i32 operand
    operand: usize,
    label: Label,
}

/// Targets of `break` / `continue` for one loop
#[derive(Debug, Clone, Copy)]
pub(super) struct LoopLabels {
    pub continue_to: Label,
    pub break_to: Label,
    /// Protected regions active when the loop was entered
    pub try_depth: usize,
}

/// A protected code range, possibly split into several segments when
/// finally code is inlined for an early exit
pub(super) struct TryRegion<'a> {
    segments: Vec<(u32, u32)>,
    open: Option<u32>,
    /// Finalizer run by exits leaving the region
    pub finally: Option<&'a [IrStmt]>,
}

impl<'a> TryRegion<'a> {
    pub fn new(start: usize, finally: Option<&'a [IrStmt]>) -> Self {
        Self {
            segments: Vec::new(),
            open: Some(start as u32),
            finally,
        }
    }

    pub fn close(&mut self, at: usize) {
        if let Some(start) = self.open.take() {
            if at as u32 > start {
                self.segments.push((start, at as u32));
            }
        }
    }

    pub fn reopen(&mut self, at: usize) {
        if self.open.is_none() {
            self.open = Some(at as u32);
        }
    }

    /// Close the region and return its non-empty segments
    pub fn finish(mut self, at: usize) -> Vec<(u32, u32)> {
        self.close(at);
        self.segments
    }
}

/// Context for compiling a single function
pub(super) struct FunctionContext<'a, 'u> {
    pub program: &'a IrProgram,
    pub function: &'a IrFunction,
    pub layout: &'a UnitLayout,
    constants: &'u mut ConstantPool,
    code: BytecodeWriter,
    depth: usize,
    max_depth: usize,
    reachable: bool,
    labels: Vec<Option<usize>>,
    label_depths: Vec<Option<usize>>,
    fixups: Vec<Fixup>,
    slots: FxHashMap<BindingId, u16>,
    next_slot: u32,
    handlers: Vec<Handler>,
    lines: Vec<LineEntry>,
    /// Position of the statement being generated
    pub pos: SourcePos,
    pub loops: Vec<LoopLabels>,
    pub tries: Vec<TryRegion<'a>>,
    /// Resume label of every async state
    pub states: Vec<Label>,
}

impl<'a, 'u> FunctionContext<'a, 'u> {
    pub fn new(
        program: &'a IrProgram,
        function: &'a IrFunction,
        layout: &'a UnitLayout,
        constants: &'u mut ConstantPool,
    ) -> CompileResult<Self> {
        let mut slots = FxHashMap::default();
        let ordered = std::iter::once(&function.this_binding)
            .chain(function.params.iter())
            .chain(function.locals.iter());
        for (slot, &binding) in ordered.enumerate() {
            slots.insert(binding, slot as u16);
        }
        let next_slot = 1 + function.params.len() + function.locals.len();
        let ctx = Self {
            program,
            function,
            layout,
            constants,
            code: BytecodeWriter::new(),
            depth: 0,
            max_depth: 0,
            reachable: true,
            labels: Vec::new(),
            label_depths: Vec::new(),
            fixups: Vec::new(),
            slots,
            next_slot: next_slot as u32,
            handlers: Vec::new(),
            lines: Vec::new(),
            pos: function.pos,
            loops: Vec::new(),
            tries: Vec::new(),
            states: Vec::new(),
        };
        if next_slot > u16::MAX as usize {
            return Err(ctx.error(
                DiagnosticCode::Limit,
                format!("`{}` has too many locals", function.display_name()),
            ));
        }
        Ok(ctx)
    }

    // ===== Diagnostics =====

    /// Error at the current statement
    pub fn error(&self, code: DiagnosticCode, message: impl Into<String>) -> CompileError {
        let file = self
            .program
            .source_files
            .get(self.pos.file as usize)
            .map(String::as_str)
            .unwrap_or_default();
        CompileError::new(code, message)
            .at(self.pos.line, self.pos.column)
            .in_file(Path::new(file))
    }

    /// Narrow a count to a u8 operand
    pub fn count_u8(&self, count: usize, what: &str) -> CompileResult<u8> {
        u8::try_from(count)
            .map_err(|_| self.error(DiagnosticCode::Limit, format!("too many {} ({})", what, count)))
    }

    /// Narrow a count to a u16 operand
    pub fn count_u16(&self, count: usize, what: &str) -> CompileResult<u16> {
        u16::try_from(count)
            .map_err(|_| self.error(DiagnosticCode::Limit, format!("too many {} ({})", what, count)))
    }

    // ===== Slots and constants =====

    /// Local slot of a binding owned by this function
    pub fn slot(&self, binding: BindingId) -> Option<u16> {
        self.slots.get(&binding).copied()
    }

    /// Allocate an extra slot for codegen-private values
    pub fn scratch_slot(&mut self) -> CompileResult<u16> {
        if self.next_slot >= u16::MAX as u32 {
            return Err(self.error(
                DiagnosticCode::Limit,
                format!("`{}` has too many locals", self.function.display_name()),
            ));
        }
        let slot = self.next_slot as u16;
        self.next_slot += 1;
        Ok(slot)
    }

    pub fn string(&mut self, value: &str) -> u32 {
        self.constants.add_string(value)
    }

    pub fn number(&mut self, value: f64) -> u32 {
        self.constants.add_number(value)
    }

    // ===== Emission =====

    /// Current code offset
    pub fn offset(&self) -> usize {
        self.code.offset()
    }

    /// Emit an instruction and account for its stack effect
    pub fn emit(&mut self, opcode: Opcode, operands: &[Operand]) {
        let offset = self.offset();
        self.code.emit_opcode(opcode);
        let mut decoded = Vec::with_capacity(operands.len());
        for operand in operands {
            match *operand {
                Operand::U8(v) => {
                    self.code.emit_u8(v);
                    decoded.push(v as i64);
                }
                Operand::U16(v) => {
                    self.code.emit_u16(v);
                    decoded.push(v as i64);
                }
                Operand::U32(v) => {
                    self.code.emit_u32(v);
                    decoded.push(v as i64);
                }
            }
        }
        self.account(offset, opcode, decoded);
    }

    /// Emit an instruction without operands
    pub fn op(&mut self, opcode: Opcode) {
        self.emit(opcode, &[]);
    }

    /// Emit a jump to `label`
    pub fn jump(&mut self, opcode: Opcode, label: Label) {
        let instr = self.offset();
        self.code.emit_opcode(opcode);
        let operand = self.code.reserve_i32();
        self.fixups.push(Fixup {
            instr,
            operand,
            label,
        });
        self.account(instr, opcode, vec![0]);
        self.note_label_depth(label);
    }

    /// Emit the async dispatch table; must be the first instruction
    pub fn dispatch(&mut self, states: &[Label]) -> CompileResult<()> {
        let instr = self.offset();
        let count = self.count_u16(states.len(), "async states")?;
        self.code.emit_opcode(Opcode::AsyncDispatch);
        self.code.emit_u16(count);
        for &label in states {
            let operand = self.code.reserve_i32();
            self.fixups.push(Fixup {
                instr,
                operand,
                label,
            });
            self.label_depths[label.0] = Some(0);
        }
        self.account(instr, Opcode::AsyncDispatch, vec![count as i64]);
        Ok(())
    }

    fn account(&mut self, offset: usize, opcode: Opcode, operands: Vec<i64>) {
        let instr = Instruction {
            offset,
            opcode,
            operands,
            targets: Vec::new(),
            size: self.offset() - offset,
        };
        let (pops, pushes) = instr.stack_effect();
        self.depth = self.depth.saturating_sub(pops) + pushes;
        self.max_depth = self.max_depth.max(self.depth);
        if opcode.is_terminator() {
            self.reachable = false;
        }
    }

    fn note_label_depth(&mut self, label: Label) {
        if self.label_depths[label.0].is_none() {
            self.label_depths[label.0] = Some(self.depth);
        }
    }

    // ===== Labels =====

    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        self.label_depths.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind `label` to the current offset. Code after a terminator continues
    /// at the depth the jumps to `label` left.
    pub fn bind(&mut self, label: Label) {
        self.labels[label.0] = Some(self.offset());
        if !self.reachable {
            if let Some(depth) = self.label_depths[label.0] {
                self.depth = depth;
            }
        }
        self.reachable = true;
    }

    /// Bind an exception handler entry, where the thrown value is on the stack
    pub fn bind_handler(&mut self, label: Label) {
        self.labels[label.0] = Some(self.offset());
        self.depth = 1;
        self.max_depth = self.max_depth.max(1);
        self.reachable = true;
    }

    // ===== Tables =====

    /// Register a handler for every segment of a protected region
    pub fn add_handler(&mut self, segments: &[(u32, u32)], target: usize) {
        for &(start, end) in segments {
            self.handlers.push(Handler {
                start,
                end,
                target: target as u32,
            });
        }
    }

    /// Record the source position of the code that follows
    pub fn mark(&mut self, pos: SourcePos) {
        self.pos = pos;
        if pos.line == 0 {
            return;
        }
        let offset = self.offset() as u32;
        let entry = LineEntry {
            offset,
            file: pos.file,
            line: pos.line,
            column: pos.column,
        };
        match self.lines.last_mut() {
            Some(last) if last.offset == offset => *last = entry,
            Some(last) if last.file == pos.file && last.line == pos.line && last.column == pos.column => {}
            _ => self.lines.push(entry),
        }
    }

    // ===== Build =====

    /// Patch jumps and build the final function
    pub fn finish(mut self) -> CompileResult<Function> {
        for fixup in std::mem::take(&mut self.fixups) {
            let Some(target) = self.labels[fixup.label.0] else {
                return Err(self.error(
                    DiagnosticCode::Verify,
                    format!("unbound jump label in `{}`", self.function.display_name()),
                ));
            };
            let relative = target as i64 - fixup.instr as i64;
            let relative = i32::try_from(relative).map_err(|_| {
                self.error(DiagnosticCode::Limit, "jump distance exceeds the encoding")
            })?;
            self.code.patch_i32(fixup.operand, relative);
        }

        let function = self.function;
        let mut flags = 0;
        if function.is_async {
            flags |= function_flags::ASYNC;
        }
        if function.lexical_this {
            flags |= function_flags::LEXICAL_THIS;
        }
        match function.kind {
            FunctionKind::Constructor => flags |= function_flags::CONSTRUCTOR,
            FunctionKind::Entry => flags |= function_flags::ENTRY,
            _ => {}
        }
        let max_stack = self.count_u16(self.max_depth, "operand stack entries")?;
        let env_size = self.count_u16(function.captures.len(), "captured variables")?;
        Ok(Function {
            name: function.display_name(),
            param_names: function.param_names.clone(),
            local_count: self.next_slot as u16,
            max_stack,
            env_size,
            state_count: if function.is_async { function.state_count.max(1) } else { 0 },
            flags,
            source_file: function.pos.file,
            code: self.code.into_bytes(),
            handlers: self.handlers,
            lines: self.lines,
        })
    }
}
