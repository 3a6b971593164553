//! Constant pool for binary units

use super::encoder::{BytecodeReader, BytecodeWriter, DecodeError};
use rustc_hash::FxHashMap;

/// Constant pool containing literal values
///
/// Strings and numbers are interned, so emitting the same literal twice
/// yields the same index.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    /// String constants
    pub strings: Vec<String>,
    /// Number constants
    pub numbers: Vec<f64>,
    string_index: FxHashMap<String, u32>,
    number_index: FxHashMap<u64, u32>,
}

impl PartialEq for ConstantPool {
    fn eq(&self, other: &Self) -> bool {
        self.strings == other.strings
            && self.numbers.len() == other.numbers.len()
            && self
                .numbers
                .iter()
                .zip(&other.numbers)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl ConstantPool {
    /// Create a new empty constant pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string constant and return its index
    pub fn add_string(&mut self, value: &str) -> u32 {
        if let Some(&index) = self.string_index.get(value) {
            return index;
        }
        let index = self.strings.len() as u32;
        self.strings.push(value.to_string());
        self.string_index.insert(value.to_string(), index);
        index
    }

    /// Intern a number constant and return its index
    ///
    /// Numbers are keyed by bit pattern so `-0` and `NaN` survive.
    pub fn add_number(&mut self, value: f64) -> u32 {
        let bits = value.to_bits();
        if let Some(&index) = self.number_index.get(&bits) {
            return index;
        }
        let index = self.numbers.len() as u32;
        self.numbers.push(value);
        self.number_index.insert(bits, index);
        index
    }

    /// Get a string constant by index
    pub fn get_string(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).map(|s| s.as_str())
    }

    /// Get a number constant by index
    pub fn get_number(&self, index: u32) -> Option<f64> {
        self.numbers.get(index as usize).copied()
    }

    /// Encode the constant pool
    ///
    /// Format: string count (u32), strings, number count (u32), f64 numbers.
    pub fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_strings(&self.strings);
        writer.emit_u32(self.numbers.len() as u32);
        for &n in &self.numbers {
            writer.emit_f64(n);
        }
    }

    /// Decode a constant pool
    pub fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let mut pool = Self::new();
        for s in reader.read_strings()? {
            let index = pool.strings.len() as u32;
            pool.string_index.entry(s.clone()).or_insert(index);
            pool.strings.push(s);
        }
        let number_count = reader.read_u32()? as usize;
        for _ in 0..number_count {
            let n = reader.read_f64()?;
            let index = pool.numbers.len() as u32;
            pool.number_index.entry(n.to_bits()).or_insert(index);
            pool.numbers.push(n);
        }
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_reuses_indices() {
        let mut pool = ConstantPool::new();
        let a = pool.add_string("total=");
        let b = pool.add_string("x");
        assert_eq!(pool.add_string("total="), a);
        assert_ne!(a, b);
        assert_eq!(pool.add_number(20.0), pool.add_number(20.0));
        assert_ne!(pool.add_number(0.0), pool.add_number(-0.0));
    }

    #[test]
    fn test_decoded_pool_keeps_interning() {
        let mut pool = ConstantPool::new();
        pool.add_string("hello");
        pool.add_number(f64::NAN);

        let mut writer = BytecodeWriter::new();
        pool.encode(&mut writer);
        let mut decoded = ConstantPool::decode(&mut BytecodeReader::new(writer.buffer())).unwrap();

        assert_eq!(decoded, pool);
        assert_eq!(decoded.add_string("hello"), 0);
        assert!(decoded.get_number(0).unwrap().is_nan());
    }
}
