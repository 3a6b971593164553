//! Binary compilation unit format (`.kbc`)

use super::constants::ConstantPool;
use super::encoder::{BytecodeReader, BytecodeWriter, DecodeError};
use thiserror::Error;

/// Magic number for Kite units: "KITE"
pub const MAGIC: [u8; 4] = *b"KITE";

/// Current unit format version
pub const VERSION: u32 = 1;

/// File extension of encoded units
pub const UNIT_EXTENSION: &str = "kbc";

/// Size of the fixed header (magic + version + flags + crc32)
pub const HEADER_SIZE: usize = 16;

/// Unit encoding/decoding errors
#[derive(Debug, Error)]
pub enum UnitError {
    /// Decode error
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Invalid magic number
    #[error("Invalid magic number: expected KITE, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported version
    #[error("Unsupported version: {0} (current: {VERSION})")]
    UnsupportedVersion(u32),

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Stored checksum
        expected: u32,
        /// Computed checksum
        actual: u32,
    },
}

/// Unit flags
pub mod flags {
    /// Unit carries line tables
    pub const HAS_LINE_TABLES: u32 = 1 << 0;
}

/// Function flags
pub mod function_flags {
    /// Body is an async state machine
    pub const ASYNC: u8 = 1 << 0;
    /// `this` is taken from the defining scope
    pub const LEXICAL_THIS: u8 = 1 << 1;
    /// Class constructor
    pub const CONSTRUCTOR: u8 = 1 << 2;
    /// Program initialization entry point
    pub const ENTRY: u8 = 1 << 3;
}

/// What a unit holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// Designated entry unit: top-level code, declarations and classes
    Entry,
    /// One closure body
    Closure,
    /// One async state machine
    Async,
}

impl UnitKind {
    fn tag(self) -> u8 {
        match self {
            Self::Entry => 0,
            Self::Closure => 1,
            Self::Async => 2,
        }
    }

    fn from_tag(tag: u8, offset: usize) -> Result<Self, DecodeError> {
        match tag {
            0 => Ok(Self::Entry),
            1 => Ok(Self::Closure),
            2 => Ok(Self::Async),
            _ => Err(DecodeError::InvalidTag {
                what: "unit kind",
                tag,
                offset,
            }),
        }
    }

    /// Suffix used by the `<Outer>$<kind><n>` naming convention
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Entry => "",
            Self::Closure => "Closure",
            Self::Async => "Async",
        }
    }
}

/// Exception handler covering `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handler {
    /// First protected code offset
    pub start: u32,
    /// End of the protected range (exclusive)
    pub end: u32,
    /// Handler entry offset; the thrown value is on the stack
    pub target: u32,
}

/// Maps a code offset to a source position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineEntry {
    /// First code offset of the entry
    pub offset: u32,
    /// Index into `Metadata::source_files`
    pub file: u32,
    /// Source line (1-based)
    pub line: u32,
    /// Source column (1-based)
    pub column: u32,
}

/// Function definition
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Function name
    pub name: String,
    /// Declared parameter names
    pub param_names: Vec<String>,
    /// Local slots, including `this` (slot 0) and parameters
    pub local_count: u16,
    /// Maximum operand stack depth
    pub max_stack: u16,
    /// Number of environment cells the closure carries
    pub env_size: u16,
    /// Async state count (0 for ordinary functions)
    pub state_count: u16,
    /// `function_flags` bits
    pub flags: u8,
    /// Index into `Metadata::source_files`
    pub source_file: u32,
    /// Bytecode
    pub code: Vec<u8>,
    /// Exception handlers, innermost first
    pub handlers: Vec<Handler>,
    /// Line table, sorted by offset
    pub lines: Vec<LineEntry>,
}

impl Function {
    /// Whether the function body is an async state machine
    pub fn is_async(&self) -> bool {
        self.flags & function_flags::ASYNC != 0
    }

    /// Source line of a code offset
    pub fn line_at(&self, offset: usize) -> Option<&LineEntry> {
        let index = self.lines.partition_point(|entry| entry.offset as usize <= offset);
        index.checked_sub(1).map(|i| &self.lines[i])
    }

    fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_string(&self.name);
        writer.emit_strings(&self.param_names);
        writer.emit_u16(self.local_count);
        writer.emit_u16(self.max_stack);
        writer.emit_u16(self.env_size);
        writer.emit_u16(self.state_count);
        writer.emit_u8(self.flags);
        writer.emit_u32(self.source_file);
        writer.emit_blob(&self.code);
        writer.emit_u32(self.handlers.len() as u32);
        for h in &self.handlers {
            writer.emit_u32(h.start);
            writer.emit_u32(h.end);
            writer.emit_u32(h.target);
        }
        writer.emit_u32(self.lines.len() as u32);
        for entry in &self.lines {
            writer.emit_u32(entry.offset);
            writer.emit_u32(entry.file);
            writer.emit_u32(entry.line);
            writer.emit_u32(entry.column);
        }
    }

    fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_string()?;
        let param_names = reader.read_strings()?;
        let local_count = reader.read_u16()?;
        let max_stack = reader.read_u16()?;
        let env_size = reader.read_u16()?;
        let state_count = reader.read_u16()?;
        let flags = reader.read_u8()?;
        let source_file = reader.read_u32()?;
        let code = reader.read_blob()?;
        let handler_count = reader.read_u32()? as usize;
        let mut handlers = Vec::with_capacity(handler_count.min(256));
        for _ in 0..handler_count {
            handlers.push(Handler {
                start: reader.read_u32()?,
                end: reader.read_u32()?,
                target: reader.read_u32()?,
            });
        }
        let line_count = reader.read_u32()? as usize;
        let mut lines = Vec::with_capacity(line_count.min(4096));
        for _ in 0..line_count {
            lines.push(LineEntry {
                offset: reader.read_u32()?,
                file: reader.read_u32()?,
                line: reader.read_u32()?,
                column: reader.read_u32()?,
            });
        }
        Ok(Self {
            name,
            param_names,
            local_count,
            max_stack,
            env_size,
            state_count,
            flags,
            source_file,
            code,
            handlers,
            lines,
        })
    }
}

/// Entry of a resolved method table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodEntry {
    /// Method name
    pub name: String,
    /// Program-wide function id of the most derived implementation
    pub function: u32,
}

/// Class definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    /// Class name
    pub name: String,
    /// Parent class id
    pub parent: Option<u32>,
    /// Fields declared by this class only
    pub own_fields: Vec<String>,
    /// Instance layout: inherited fields first, then own fields
    pub fields: Vec<String>,
    /// Program-wide function id of the constructor
    pub constructor: u32,
    /// Resolved method table (most derived override wins)
    pub methods: Vec<MethodEntry>,
}

impl ClassDef {
    fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_string(&self.name);
        writer.emit_u32(self.parent.unwrap_or(u32::MAX));
        writer.emit_strings(&self.own_fields);
        writer.emit_strings(&self.fields);
        writer.emit_u32(self.constructor);
        writer.emit_u32(self.methods.len() as u32);
        for m in &self.methods {
            writer.emit_string(&m.name);
            writer.emit_u32(m.function);
        }
    }

    fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_string()?;
        let parent = match reader.read_u32()? {
            u32::MAX => None,
            id => Some(id),
        };
        let own_fields = reader.read_strings()?;
        let fields = reader.read_strings()?;
        let constructor = reader.read_u32()?;
        let count = reader.read_u32()? as usize;
        let mut methods = Vec::with_capacity(count.min(256));
        for _ in 0..count {
            methods.push(MethodEntry {
                name: reader.read_string()?,
                function: reader.read_u32()?,
            });
        }
        Ok(Self {
            name,
            parent,
            own_fields,
            fields,
            constructor,
            methods,
        })
    }
}

/// Applied decorator marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoratorEntry {
    /// Marker name
    pub name: String,
    /// Raw argument texts
    pub arguments: Vec<String>,
}

/// Kind of a reflective declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    /// Top-level function
    Function,
    /// Top-level class
    Class,
    /// Class method
    Method,
    /// Class constructor
    Constructor,
}

impl DeclarationKind {
    fn tag(self) -> u8 {
        match self {
            Self::Function => 0,
            Self::Class => 1,
            Self::Method => 2,
            Self::Constructor => 3,
        }
    }

    fn from_tag(tag: u8, offset: usize) -> Result<Self, DecodeError> {
        match tag {
            0 => Ok(Self::Function),
            1 => Ok(Self::Class),
            2 => Ok(Self::Method),
            3 => Ok(Self::Constructor),
            _ => Err(DecodeError::InvalidTag {
                what: "declaration kind",
                tag,
                offset,
            }),
        }
    }

    /// Lowercase label
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Method => "method",
            Self::Constructor => "constructor",
        }
    }
}

/// Reflection-visible declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Declaration kind
    pub kind: DeclarationKind,
    /// Declared name
    pub name: String,
    /// Owning class for methods and constructors
    pub owner: Option<String>,
    /// Program-wide function id (class id for classes)
    pub target: u32,
    /// Declared parameter names
    pub param_names: Vec<String>,
    /// Markers applied to the declaration
    pub decorators: Vec<DecoratorEntry>,
    /// Markers applied to each parameter
    pub param_decorators: Vec<Vec<DecoratorEntry>>,
    /// Declared `async`
    pub is_async: bool,
    /// Exported from the entry module
    pub exported: bool,
}

fn encode_decorators(writer: &mut BytecodeWriter, decorators: &[DecoratorEntry]) {
    writer.emit_u32(decorators.len() as u32);
    for d in decorators {
        writer.emit_string(&d.name);
        writer.emit_strings(&d.arguments);
    }
}

fn decode_decorators(reader: &mut BytecodeReader<'_>) -> Result<Vec<DecoratorEntry>, DecodeError> {
    let count = reader.read_u32()? as usize;
    let mut out = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        out.push(DecoratorEntry {
            name: reader.read_string()?,
            arguments: reader.read_strings()?,
        });
    }
    Ok(out)
}

impl Declaration {
    fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_u8(self.kind.tag());
        writer.emit_string(&self.name);
        match &self.owner {
            Some(owner) => {
                writer.emit_u8(1);
                writer.emit_string(owner);
            }
            None => writer.emit_u8(0),
        }
        writer.emit_u32(self.target);
        writer.emit_strings(&self.param_names);
        encode_decorators(writer, &self.decorators);
        writer.emit_u32(self.param_decorators.len() as u32);
        for list in &self.param_decorators {
            encode_decorators(writer, list);
        }
        writer.emit_u8(self.is_async as u8);
        writer.emit_u8(self.exported as u8);
    }

    fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let offset = reader.position();
        let kind = DeclarationKind::from_tag(reader.read_u8()?, offset)?;
        let name = reader.read_string()?;
        let owner = match reader.read_u8()? {
            0 => None,
            _ => Some(reader.read_string()?),
        };
        let target = reader.read_u32()?;
        let param_names = reader.read_strings()?;
        let decorators = decode_decorators(reader)?;
        let count = reader.read_u32()? as usize;
        let mut param_decorators = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            param_decorators.push(decode_decorators(reader)?);
        }
        let is_async = reader.read_u8()? != 0;
        let exported = reader.read_u8()? != 0;
        Ok(Self {
            kind,
            name,
            owner,
            target,
            param_names,
            decorators,
            param_decorators,
            is_async,
            exported,
        })
    }
}

/// Property access site descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteEntry {
    /// Accessed property name
    pub name: String,
    /// Source line of the access
    pub line: u32,
}

/// Unit metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Source files referenced by `Function::source_file`
    pub source_files: Vec<String>,
    /// Program-wide id of this unit's first function
    pub function_base: u32,
    /// Module-level binding names (entry unit)
    pub globals: Vec<String>,
    /// Property access sites (entry unit)
    pub sites: Vec<SiteEntry>,
    /// Auxiliary units, in function-id order (entry unit)
    pub nested_units: Vec<String>,
    /// Reflective declaration table (entry unit)
    pub declarations: Vec<Declaration>,
    /// Program-wide id of the initialization function (entry unit)
    pub entry_function: u32,
    /// Program-wide id of `$invoke` (entry unit)
    pub invoke_function: u32,
    /// Program-wide id of `$invokeClass` (entry unit)
    pub invoke_class_function: u32,
    /// Total number of functions in the program (entry unit)
    pub total_functions: u32,
}

impl Metadata {
    fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_strings(&self.source_files);
        writer.emit_u32(self.function_base);
        writer.emit_strings(&self.globals);
        writer.emit_u32(self.sites.len() as u32);
        for site in &self.sites {
            writer.emit_string(&site.name);
            writer.emit_u32(site.line);
        }
        writer.emit_strings(&self.nested_units);
        writer.emit_u32(self.declarations.len() as u32);
        for d in &self.declarations {
            d.encode(writer);
        }
        writer.emit_u32(self.entry_function);
        writer.emit_u32(self.invoke_function);
        writer.emit_u32(self.invoke_class_function);
        writer.emit_u32(self.total_functions);
    }

    fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let source_files = reader.read_strings()?;
        let function_base = reader.read_u32()?;
        let globals = reader.read_strings()?;
        let site_count = reader.read_u32()? as usize;
        let mut sites = Vec::with_capacity(site_count.min(4096));
        for _ in 0..site_count {
            sites.push(SiteEntry {
                name: reader.read_string()?,
                line: reader.read_u32()?,
            });
        }
        let nested_units = reader.read_strings()?;
        let decl_count = reader.read_u32()? as usize;
        let mut declarations = Vec::with_capacity(decl_count.min(1024));
        for _ in 0..decl_count {
            declarations.push(Declaration::decode(reader)?);
        }
        Ok(Self {
            source_files,
            function_base,
            globals,
            sites,
            nested_units,
            declarations,
            entry_function: reader.read_u32()?,
            invoke_function: reader.read_u32()?,
            invoke_class_function: reader.read_u32()?,
            total_functions: reader.read_u32()?,
        })
    }
}

/// A compiled unit
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    /// Unit name (`MainProgram`, `MainProgram$Closure1`, ...)
    pub name: String,
    /// Unit kind
    pub kind: UnitKind,
    /// Unit flags
    pub flags: u32,
    /// Constant pool shared by the unit's functions
    pub constants: ConstantPool,
    /// Function definitions
    pub functions: Vec<Function>,
    /// Class definitions (entry unit only)
    pub classes: Vec<ClassDef>,
    /// Unit metadata
    pub metadata: Metadata,
}

impl Unit {
    /// Create an empty unit
    pub fn new(name: impl Into<String>, kind: UnitKind) -> Self {
        Self {
            name: name.into(),
            kind,
            flags: flags::HAS_LINE_TABLES,
            constants: ConstantPool::new(),
            functions: Vec::new(),
            classes: Vec::new(),
            metadata: Metadata::default(),
        }
    }

    /// File name of the encoded unit
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, UNIT_EXTENSION)
    }

    /// Encode the unit
    ///
    /// Format:
    /// - Header: magic (4 bytes) + version (u32) + flags (u32) + crc32 (u32)
    /// - Name, kind
    /// - Constant pool
    /// - Function table
    /// - Class table
    /// - Metadata
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BytecodeWriter::new();
        writer.buffer.extend_from_slice(&MAGIC);
        writer.emit_u32(VERSION);
        writer.emit_u32(self.flags);
        let crc_offset = writer.offset();
        writer.emit_u32(0);

        writer.emit_string(&self.name);
        writer.emit_u8(self.kind.tag());
        self.constants.encode(&mut writer);
        writer.emit_u32(self.functions.len() as u32);
        for func in &self.functions {
            func.encode(&mut writer);
        }
        writer.emit_u32(self.classes.len() as u32);
        for class in &self.classes {
            class.encode(&mut writer);
        }
        self.metadata.encode(&mut writer);

        let crc = crc32fast::hash(&writer.buffer[HEADER_SIZE..]);
        writer.patch_u32(crc_offset, crc);
        writer.into_bytes()
    }

    /// Decode a unit, validating magic, version and checksum
    pub fn decode(data: &[u8]) -> Result<Self, UnitError> {
        let mut reader = BytecodeReader::new(data);
        let magic_bytes = reader.read_bytes(4)?;
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&magic_bytes);
        if magic != MAGIC {
            return Err(UnitError::InvalidMagic(magic));
        }
        let version = reader.read_u32()?;
        if version != VERSION {
            return Err(UnitError::UnsupportedVersion(version));
        }
        let flags = reader.read_u32()?;
        let stored = reader.read_u32()?;
        let actual = crc32fast::hash(&data[HEADER_SIZE..]);
        if stored != actual {
            return Err(UnitError::ChecksumMismatch {
                expected: stored,
                actual,
            });
        }

        let name = reader.read_string()?;
        let kind_offset = reader.position();
        let kind = UnitKind::from_tag(reader.read_u8()?, kind_offset)?;
        let constants = ConstantPool::decode(&mut reader)?;
        let func_count = reader.read_u32()? as usize;
        let mut functions = Vec::with_capacity(func_count.min(4096));
        for _ in 0..func_count {
            functions.push(Function::decode(&mut reader)?);
        }
        let class_count = reader.read_u32()? as usize;
        let mut classes = Vec::with_capacity(class_count.min(1024));
        for _ in 0..class_count {
            classes.push(ClassDef::decode(&mut reader)?);
        }
        let metadata = Metadata::decode(&mut reader)?;
        Ok(Self {
            name,
            kind,
            flags,
            constants,
            functions,
            classes,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::bytecode::opcode::Opcode;

    fn sample_unit() -> Unit {
        let mut unit = Unit::new("MainProgram", UnitKind::Entry);
        unit.constants.add_string("total=");
        unit.functions.push(Function {
            name: "main".to_string(),
            param_names: vec![],
            local_count: 1,
            max_stack: 1,
            env_size: 0,
            state_count: 0,
            flags: function_flags::ENTRY,
            source_file: 0,
            code: vec![Opcode::ConstUndefined as u8, Opcode::Return as u8],
            handlers: vec![Handler {
                start: 0,
                end: 1,
                target: 1,
            }],
            lines: vec![LineEntry {
                offset: 0,
                file: 0,
                line: 1,
                column: 1,
            }],
        });
        unit.classes.push(ClassDef {
            name: "Point".to_string(),
            parent: None,
            own_fields: vec!["x".to_string()],
            fields: vec!["x".to_string()],
            constructor: 0,
            methods: vec![MethodEntry {
                name: "norm".to_string(),
                function: 0,
            }],
        });
        unit.metadata.source_files.push("/tmp/main.ts".to_string());
        unit.metadata.declarations.push(Declaration {
            kind: DeclarationKind::Method,
            name: "norm".to_string(),
            owner: Some("Point".to_string()),
            target: 0,
            param_names: vec!["scale".to_string()],
            decorators: vec![DecoratorEntry {
                name: "Get".to_string(),
                arguments: vec!["\"/norm\"".to_string()],
            }],
            param_decorators: vec![vec![]],
            is_async: false,
            exported: true,
        });
        unit
    }

    #[test]
    fn test_encoded_unit_decodes_to_same_unit() {
        let unit = sample_unit();
        let bytes = unit.encode();
        assert_eq!(&bytes[0..4], b"KITE");
        assert_eq!(Unit::decode(&bytes).unwrap(), unit);
    }

    #[test]
    fn test_corrupted_payload_fails_checksum() {
        let mut bytes = sample_unit().encode();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(matches!(
            Unit::decode(&bytes),
            Err(UnitError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_wrong_magic_is_rejected() {
        let mut bytes = sample_unit().encode();
        bytes[0] = b'X';
        assert!(matches!(Unit::decode(&bytes), Err(UnitError::InvalidMagic(_))));
    }

    #[test]
    fn test_line_lookup_picks_preceding_entry() {
        let mut func = sample_unit().functions.remove(0);
        func.lines.push(LineEntry {
            offset: 5,
            file: 0,
            line: 3,
            column: 2,
        });
        assert_eq!(func.line_at(0).unwrap().line, 1);
        assert_eq!(func.line_at(4).unwrap().line, 1);
        assert_eq!(func.line_at(9).unwrap().line, 3);
    }
}
