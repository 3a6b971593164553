//! Unit loader
//!
//! Reads the entry unit and every auxiliary unit it names, checks the
//! program-wide function numbering and re-runs the verifier on every
//! function before anything executes.

use crate::compiler::bytecode::{
    verify_unit, ClassDef, ConstantPool, Function, Metadata, ProgramLimits, Unit, UnitError,
    UnitKind, VerifyError,
};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure to load a compiled program
#[derive(Debug, Error)]
pub enum LoadError {
    /// No unit file in any search directory
    #[error("unit `{unit}` not found (searched {searched})")]
    NotFound {
        /// Unit name
        unit: String,
        /// Directories searched
        searched: String,
    },

    /// Reading a unit file failed
    #[error("cannot read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Unit file is malformed
    #[error("unit `{unit}`: {source}")]
    Unit {
        /// Unit name
        unit: String,
        /// Underlying error
        source: UnitError,
    },

    /// Unit rejected by the verifier
    #[error("verification failed: {0}")]
    Verify(#[from] VerifyError),

    /// Units do not form one program
    #[error("invalid program layout: {0}")]
    Layout(String),
}

/// A verified program ready to execute
#[derive(Debug)]
pub struct LoadedProgram {
    units: Vec<Unit>,
    /// (unit, index in unit) of every program-wide function id
    functions: Vec<(usize, usize)>,
    methods: Vec<FxHashMap<String, u32>>,
}

impl LoadedProgram {
    /// Assemble a program from decoded units, entry unit first
    pub fn from_units(units: Vec<Unit>) -> Result<Self, LoadError> {
        let Some(entry) = units.first() else {
            return Err(LoadError::Layout("no units".to_string()));
        };
        if entry.kind != UnitKind::Entry {
            return Err(LoadError::Layout(format!("`{}` is not an entry unit", entry.name)));
        }
        let metadata = &entry.metadata;

        let mut functions = Vec::with_capacity(metadata.total_functions as usize);
        for (unit_index, unit) in units.iter().enumerate() {
            if unit.metadata.function_base as usize != functions.len() && !unit.functions.is_empty() {
                return Err(LoadError::Layout(format!(
                    "unit `{}` starts at function {} but {} precede it",
                    unit.name,
                    unit.metadata.function_base,
                    functions.len()
                )));
            }
            functions.extend((0..unit.functions.len()).map(|i| (unit_index, i)));
        }
        if functions.len() != metadata.total_functions as usize {
            return Err(LoadError::Layout(format!(
                "expected {} functions, found {}",
                metadata.total_functions,
                functions.len()
            )));
        }

        let limits = ProgramLimits {
            function_count: metadata.total_functions,
            class_count: entry.classes.len() as u32,
            global_count: metadata.globals.len() as u32,
            site_count: metadata.sites.len() as u32,
        };
        for unit in &units {
            verify_unit(unit, &limits)?;
        }

        let methods = entry
            .classes
            .iter()
            .map(|class| {
                class
                    .methods
                    .iter()
                    .map(|m| (m.name.clone(), m.function))
                    .collect()
            })
            .collect();

        log::debug!(
            "loaded {} unit(s), {} function(s), {} class(es)",
            units.len(),
            functions.len(),
            entry.classes.len()
        );
        Ok(Self {
            units,
            functions,
            methods,
        })
    }

    /// The entry unit
    pub fn entry_unit(&self) -> &Unit {
        &self.units[0]
    }

    /// Entry unit metadata
    pub fn metadata(&self) -> &Metadata {
        &self.units[0].metadata
    }

    /// Every unit, entry first
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Function and its constant pool by program-wide id
    pub fn function(&self, id: u32) -> Option<(&Function, &ConstantPool)> {
        let &(unit, index) = self.functions.get(id as usize)?;
        let unit = &self.units[unit];
        Some((&unit.functions[index], &unit.constants))
    }

    /// Class definition by id
    pub fn class(&self, id: u32) -> Option<&ClassDef> {
        self.entry_unit().classes.get(id as usize)
    }

    /// Most derived implementation of `name` for instances of `class`
    pub fn method(&self, class: u32, name: &str) -> Option<u32> {
        self.methods.get(class as usize)?.get(name).copied()
    }

    /// Id of a top-level class by name
    pub fn class_by_name(&self, name: &str) -> Option<u32> {
        self.entry_unit()
            .classes
            .iter()
            .position(|c| c.name == name)
            .map(|i| i as u32)
    }

    /// Source file name by index
    pub fn source_file(&self, index: u32) -> &str {
        self.metadata()
            .source_files
            .get(index as usize)
            .map(String::as_str)
            .unwrap_or("?")
    }
}

/// Load `<entry_unit>.kbc` and its auxiliary units. Units are looked up in
/// `dir` first, then in each `classpath` directory.
pub fn load_program(dir: &Path, entry_unit: &str, classpath: &[PathBuf]) -> Result<LoadedProgram, LoadError> {
    let search: Vec<&Path> = std::iter::once(dir)
        .chain(classpath.iter().map(PathBuf::as_path))
        .collect();
    let entry = read_unit(entry_unit, &search)?;
    let nested = entry.metadata.nested_units.clone();
    let mut units = Vec::with_capacity(nested.len() + 1);
    units.push(entry);
    for name in &nested {
        units.push(read_unit(name, &search)?);
    }
    LoadedProgram::from_units(units)
}

fn read_unit(name: &str, search: &[&Path]) -> Result<Unit, LoadError> {
    let file = format!("{}.{}", name, crate::compiler::bytecode::unit::UNIT_EXTENSION);
    let Some(path) = search.iter().map(|dir| dir.join(&file)).find(|p| p.is_file()) else {
        return Err(LoadError::NotFound {
            unit: name.to_string(),
            searched: search
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        });
    };
    let bytes = std::fs::read(&path).map_err(|source| LoadError::Io {
        path: path.clone(),
        source,
    })?;
    log::trace!("read {} ({} bytes)", path.display(), bytes.len());
    Unit::decode(&bytes).map_err(|source| LoadError::Unit {
        unit: name.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::bytecode::Opcode;

    fn unit_with_return(name: &str, kind: UnitKind, base: u32) -> Unit {
        let mut unit = Unit::new(name, kind);
        unit.functions.push(Function {
            name: "f".into(),
            param_names: vec![],
            local_count: 1,
            max_stack: 1,
            env_size: 0,
            state_count: 0,
            flags: 0,
            source_file: 0,
            code: vec![Opcode::ConstUndefined as u8, Opcode::Return as u8],
            handlers: vec![],
            lines: vec![],
        });
        unit.metadata.function_base = base;
        unit
    }

    #[test]
    fn test_load_from_directory_with_classpath_fallback() {
        let out = tempfile::tempdir().unwrap();
        let extra = tempfile::tempdir().unwrap();
        let mut entry = unit_with_return("MainProgram", UnitKind::Entry, 0);
        entry.metadata.nested_units = vec!["MainProgram$Closure1".into()];
        entry.metadata.total_functions = 2;
        let closure = unit_with_return("MainProgram$Closure1", UnitKind::Closure, 1);
        std::fs::write(out.path().join(entry.file_name()), entry.encode()).unwrap();
        std::fs::write(extra.path().join(closure.file_name()), closure.encode()).unwrap();

        let program = load_program(out.path(), "MainProgram", &[extra.path().to_path_buf()]).unwrap();
        assert_eq!(program.units().len(), 2);
        assert!(program.function(1).is_some());
        assert!(program.function(2).is_none());

        let err = load_program(out.path(), "MainProgram", &[]).unwrap_err();
        assert!(matches!(err, LoadError::NotFound { ref unit, .. } if unit == "MainProgram$Closure1"));
    }

    #[test]
    fn test_misnumbered_units_are_rejected() {
        let mut entry = unit_with_return("MainProgram", UnitKind::Entry, 0);
        entry.metadata.total_functions = 2;
        let closure = unit_with_return("MainProgram$Closure1", UnitKind::Closure, 5);
        let err = LoadedProgram::from_units(vec![entry, closure]).unwrap_err();
        assert!(matches!(err, LoadError::Layout(_)));
    }

    #[test]
    fn test_corrupted_unit_fails_to_load() {
        let out = tempfile::tempdir().unwrap();
        let mut entry = unit_with_return("MainProgram", UnitKind::Entry, 0);
        entry.metadata.total_functions = 1;
        let mut bytes = entry.encode();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(out.path().join(entry.file_name()), bytes).unwrap();
        let err = load_program(out.path(), "MainProgram", &[]).unwrap_err();
        assert!(matches!(err, LoadError::Unit { .. }));
    }
}
