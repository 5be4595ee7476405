//! Typed dynamic value tree (spec §4.6), ported from `value.c`.
//!
//! Used for component parameters, environment entries, and trace-class
//! user attributes. `Map` is insertion-ordered, matching the original's
//! combination of a key array and a hash table.

use indexmap::IndexMap;
use std::cell::Cell;

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    UnsignedInteger(u64),
    SignedInteger(i64),
    Real(f64),
    String(String),
    Array(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_unsigned_integer(&self) -> Option<u64> {
        match self {
            Value::UnsignedInteger(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_signed_integer(&self) -> Option<i64> {
        match self {
            Value::SignedInteger(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Structural equality: same variant, recursively equal contents.
    /// `Real` compares bit-exact (no epsilon), matching the invariant that
    /// `copy(v) == v` must hold exactly (spec §8, value round-trip).
    pub fn is_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::UnsignedInteger(a), Value::UnsignedInteger(b)) => a == b,
            (Value::SignedInteger(a), Value::SignedInteger(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.is_equal(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|bv| v.is_equal(bv)))
            }
            _ => false,
        }
    }

    /// Deep copy. Since `Value` owns all of its data (no shared subtrees),
    /// `Clone` already performs a deep copy; this method exists to mirror
    /// the original's explicit `bt_value_copy` entry point.
    pub fn deep_copy(&self) -> Value {
        self.clone()
    }

    /// Overwrites entries of `self` (must be a `Map`) with deep copies of
    /// `extension`'s entries (must also be a `Map`). Ported from
    /// `bt_value_map_extend`/`extend_map_element`.
    pub fn map_extend(&mut self, extension: &Value) -> crate::Result<()> {
        let ext_map = extension
            .as_map()
            .ok_or_else(|| crate::Error::Other("map_extend: extension is not a map".to_string()))?
            .clone();
        let base_map = self
            .as_map_mut()
            .ok_or_else(|| crate::Error::Other("map_extend: base is not a map".to_string()))?;
        for (k, v) in ext_map {
            base_map.insert(k, v.deep_copy());
        }
        Ok(())
    }

    /// Freezes this value and, recursively, every value it contains.
    pub fn freeze(&self) {
        match self {
            Value::Array(items) => items.iter().for_each(Value::freeze),
            Value::Map(m) => m.values().for_each(Value::freeze),
            _ => {}
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

/// Wraps a `Value` with an independent freeze bit, for contexts (like
/// component configuration) where the value tree itself should become
/// contract-immutable once handed to a component.
#[derive(Debug, Clone, Default)]
pub struct FrozenValue {
    value: Value,
    frozen: Cell<bool>,
}

impl FrozenValue {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            frozen: Cell::new(false),
        }
    }

    pub fn get(&self) -> &Value {
        &self.value
    }

    pub fn freeze(&self) {
        self.value.freeze();
        self.frozen.set(true);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, Value)]) -> Value {
        let mut m = IndexMap::new();
        for (k, v) in pairs {
            m.insert(k.to_string(), v.clone());
        }
        Value::Map(m)
    }

    #[test]
    fn copy_round_trips_under_is_equal() {
        let v = map(&[
            ("a", Value::UnsignedInteger(1)),
            ("b", Value::Array(vec![Value::Bool(true), Value::Null])),
            ("c", Value::Real(1.5)),
        ]);
        let copy = v.deep_copy();
        assert!(v.is_equal(&copy));
    }

    #[test]
    fn map_extend_overwrites_and_adds() {
        let mut base = map(&[
            ("a", Value::UnsignedInteger(1)),
            ("b", Value::UnsignedInteger(2)),
        ]);
        let ext = map(&[
            ("b", Value::UnsignedInteger(20)),
            ("c", Value::UnsignedInteger(3)),
        ]);
        base.map_extend(&ext).unwrap();

        let m = base.as_map().unwrap();
        assert_eq!(m["a"].as_unsigned_integer(), Some(1));
        assert_eq!(m["b"].as_unsigned_integer(), Some(20));
        assert_eq!(m["c"].as_unsigned_integer(), Some(3));
    }

    #[test]
    fn real_equality_is_bit_exact() {
        let a = Value::Real(f64::NAN);
        let b = Value::Real(f64::NAN);
        // NaN != NaN under IEEE-754 `==`, but bit patterns match here.
        assert!(a.is_equal(&b));
    }

    #[test]
    fn different_variants_are_not_equal() {
        assert!(!Value::Null.is_equal(&Value::Bool(false)));
    }
}
