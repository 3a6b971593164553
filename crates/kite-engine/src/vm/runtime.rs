//! Runtime support library
//!
//! The fixed primitives generated code relies on: equality, arithmetic
//! coercions, display strings and the per-site property caches.

use super::object::{ObjectKind, ShapeId, ShapeTable};
use super::value::{number_to_string, string_to_number, Value};
use std::rc::Rc;

const DISPLAY_DEPTH: usize = 16;

// ============================================================================
// Coercions
// ============================================================================

/// Numeric value of a script value
pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Undefined => f64::NAN,
        Value::Null => 0.0,
        Value::Bool(b) => *b as u8 as f64,
        Value::Number(n) => *n,
        Value::String(s) => string_to_number(s),
        Value::Object(_) => f64::NAN,
    }
}

/// Text used for concatenation and console output
pub fn to_display_string(value: &Value, shapes: &ShapeTable) -> String {
    display(value, shapes, 0)
}

fn display(value: &Value, shapes: &ShapeTable, depth: usize) -> String {
    match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_to_string(*n),
        Value::String(s) => s.to_string(),
        Value::Object(object) => {
            if depth > DISPLAY_DEPTH {
                return "...".to_string();
            }
            let Ok(object) = object.try_borrow() else {
                return "[object Object]".to_string();
            };
            match &object.kind {
                ObjectKind::Array(items) => items
                    .iter()
                    .map(|item| {
                        if item.is_nullish() {
                            String::new()
                        } else {
                            display(item, shapes, depth + 1)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(","),
                ObjectKind::Error => {
                    let field = |name: &str| {
                        shapes
                            .lookup(object.shape, name)
                            .and_then(|slot| object.slots.get(slot))
                            .map(|v| display(v, shapes, depth + 1))
                    };
                    let name = field("name").unwrap_or_else(|| "Error".to_string());
                    match field("message") {
                        Some(message) if !message.is_empty() => format!("{}: {}", name, message),
                        _ => name,
                    }
                }
                ObjectKind::Closure(_) | ObjectKind::NativeMethod { .. } | ObjectKind::Resolver(_) => {
                    "[Function]".to_string()
                }
                ObjectKind::Class(_) => "[class]".to_string(),
                ObjectKind::Builtin(builtin) => format!("[{}]", builtin.name()),
                ObjectKind::Promise(_) => "[object Promise]".to_string(),
                ObjectKind::Plain | ObjectKind::Instance(_) => "[object Object]".to_string(),
            }
        }
    }
}

// ============================================================================
// Equality
// ============================================================================

/// `===`
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

/// `==`. An object compared with a primitive compares by display string.
pub fn loose_equals(a: &Value, b: &Value, shapes: &ShapeTable) -> bool {
    match (a, b) {
        (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
        (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
        (Value::Object(_), Value::Object(_)) => strict_equals(a, b),
        (Value::Object(_), _) | (_, Value::Object(_)) => {
            to_display_string(a, shapes) == to_display_string(b, shapes)
        }
        (Value::String(x), Value::String(y)) => x == y,
        // booleans, numbers and numeric strings meet as numbers
        _ => to_number(a) == to_number(b),
    }
}

// ============================================================================
// Operators
// ============================================================================

/// `+`: concatenation when either side is a string or an object
pub fn add(a: &Value, b: &Value, shapes: &ShapeTable) -> Value {
    let textual = |v: &Value| matches!(v, Value::String(_) | Value::Object(_));
    if textual(a) || textual(b) {
        let mut text = to_display_string(a, shapes);
        text.push_str(&to_display_string(b, shapes));
        Value::from(text)
    } else {
        Value::Number(to_number(a) + to_number(b))
    }
}

/// Relational operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
}

/// Relational comparison: strings compare lexicographically, everything
/// else numerically (`NaN` compares false)
pub fn compare(a: &Value, b: &Value, relation: Relation) -> bool {
    let ordering = match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => to_number(a).partial_cmp(&to_number(b)),
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match relation {
        Relation::Less => ordering.is_lt(),
        Relation::LessEqual => ordering.is_le(),
        Relation::Greater => ordering.is_gt(),
        Relation::GreaterEqual => ordering.is_ge(),
    }
}

// ============================================================================
// Property sites
// ============================================================================

/// Inline cache state of one property access site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteState {
    /// Never executed on an object
    Uninitialized,
    /// Saw one shape; `slot` is where the property lives in it (if at all)
    Monomorphic {
        /// Cached shape
        shape: ShapeId,
        /// Slot of the property in that shape
        slot: Option<usize>,
    },
    /// Saw a second shape; generic lookup from now on
    Megamorphic,
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiteStats {
    /// Accesses answered from the cache
    pub hits: u64,
    /// Accesses that needed a shape lookup
    pub misses: u64,
    /// Sites demoted to generic lookup
    pub demotions: u64,
}

/// Property caches of every site of the program
#[derive(Debug, Clone)]
pub struct PropertySites {
    sites: Vec<SiteState>,
    stats: SiteStats,
}

impl PropertySites {
    /// `count` uninitialized sites
    pub fn new(count: usize) -> Self {
        Self {
            sites: vec![SiteState::Uninitialized; count],
            stats: SiteStats::default(),
        }
    }

    /// Current state of a site
    pub fn state(&self, site: u32) -> Option<SiteState> {
        self.sites.get(site as usize).copied()
    }

    /// Counters so far
    pub fn stats(&self) -> SiteStats {
        self.stats
    }

    /// Slot of `name` in an object of `shape`, going through the cache of
    /// `site`. A second shape demotes the site permanently.
    pub fn lookup(&mut self, site: u32, shapes: &ShapeTable, shape: ShapeId, name: &str) -> Option<usize> {
        let Some(state) = self.sites.get_mut(site as usize) else {
            self.stats.misses += 1;
            return shapes.lookup(shape, name);
        };
        match *state {
            SiteState::Monomorphic { shape: cached, slot } if cached == shape => {
                self.stats.hits += 1;
                slot
            }
            SiteState::Uninitialized => {
                self.stats.misses += 1;
                let slot = shapes.lookup(shape, name);
                *state = SiteState::Monomorphic { shape, slot };
                slot
            }
            SiteState::Monomorphic { .. } => {
                self.stats.misses += 1;
                self.stats.demotions += 1;
                *state = SiteState::Megamorphic;
                shapes.lookup(shape, name)
            }
            SiteState::Megamorphic => {
                self.stats.misses += 1;
                shapes.lookup(shape, name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::object::Object;

    #[test]
    fn test_loose_and_strict_equality_table() {
        let shapes = ShapeTable::new();
        let one = Value::Number(1.0);
        let one_text = Value::from("1");
        assert!(loose_equals(&one, &one_text, &shapes));
        assert!(!strict_equals(&one, &one_text));
        assert!(loose_equals(&Value::Undefined, &Value::Null, &shapes));
        assert!(!strict_equals(&Value::Undefined, &Value::Null));
        assert!(loose_equals(&Value::Bool(false), &Value::Number(0.0), &shapes));
        assert!(!strict_equals(&Value::Bool(false), &Value::Number(0.0)));
        assert!(!loose_equals(&Value::Null, &Value::Number(0.0), &shapes));
        assert!(!loose_equals(&Value::Number(f64::NAN), &Value::Number(f64::NAN), &shapes));
    }

    #[test]
    fn test_objects_compare_by_identity_or_display() {
        let shapes = ShapeTable::new();
        let a = Value::object(Object::array(vec![Value::Number(1.0), Value::Number(2.0)]));
        let b = Value::object(Object::array(vec![Value::Number(1.0), Value::Number(2.0)]));
        assert!(loose_equals(&a, &a.clone(), &shapes));
        assert!(!loose_equals(&a, &b, &shapes));
        assert!(loose_equals(&a, &Value::from("1,2"), &shapes));
    }

    #[test]
    fn test_add_and_display() {
        let shapes = ShapeTable::new();
        let total = add(&Value::from("total="), &Value::Number(20.0), &shapes);
        assert_eq!(to_display_string(&total, &shapes), "total=20");
        let sum = add(&Value::Bool(true), &Value::Null, &shapes);
        assert!(strict_equals(&sum, &Value::Number(1.0)));
        let array = Value::object(Object::array(vec![Value::Number(1.0), Value::Undefined, Value::from("x")]));
        assert_eq!(to_display_string(&array, &shapes), "1,,x");
    }

    #[test]
    fn test_relational_comparison() {
        assert!(compare(&Value::from("apple"), &Value::from("banana"), Relation::Less));
        assert!(compare(&Value::from("10"), &Value::Number(9.0), Relation::Greater));
        assert!(!compare(&Value::Undefined, &Value::Number(0.0), Relation::LessEqual));
    }

    #[test]
    fn test_site_goes_monomorphic_then_megamorphic() {
        let mut shapes = ShapeTable::new();
        let xy = shapes.for_fields(&["x".into(), "y".into()]);
        let yx = shapes.for_fields(&["y".into(), "x".into()]);
        let mut sites = PropertySites::new(1);

        assert_eq!(sites.lookup(0, &shapes, xy, "y"), Some(1));
        assert_eq!(sites.state(0), Some(SiteState::Monomorphic { shape: xy, slot: Some(1) }));
        assert_eq!(sites.lookup(0, &shapes, xy, "y"), Some(1));
        assert_eq!(sites.stats().hits, 1);

        assert_eq!(sites.lookup(0, &shapes, yx, "y"), Some(0));
        assert_eq!(sites.state(0), Some(SiteState::Megamorphic));
        // never returns to the cached shape
        assert_eq!(sites.lookup(0, &shapes, xy, "y"), Some(1));
        assert_eq!(sites.state(0), Some(SiteState::Megamorphic));
        assert_eq!(sites.stats().demotions, 1);
    }

    #[test]
    fn test_absent_property_is_cached_as_absent() {
        let mut shapes = ShapeTable::new();
        let x = shapes.for_fields(&["x".into()]);
        let mut sites = PropertySites::new(1);
        assert_eq!(sites.lookup(0, &shapes, x, "missing"), None);
        assert_eq!(sites.lookup(0, &shapes, x, "missing"), None);
        assert_eq!(sites.stats().hits, 1);
    }
}
