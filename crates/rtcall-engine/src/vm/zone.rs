//! Call-scoped handle arenas
//!
//! A zone holds the handles created while generating one stub or running one
//! invocation. Everything a zone roots becomes collectable when the zone
//! closes, unless it was promoted elsewhere (for example into the object pool
//! of finalized code).

use crate::vm::value::Value;

/// Handle arena for one generation or invocation
#[derive(Debug, Default)]
pub struct Zone {
    handles: Vec<Value>,
}

impl Zone {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root `value` for the lifetime of this zone
    pub fn add(&mut self, value: Value) -> Value {
        if value.is_collectable() {
            self.handles.push(value);
        }
        value
    }

    pub fn handles(&self) -> &[Value] {
        &self.handles
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_roots_only_collectable_values() {
        let mut zone = Zone::new();
        assert_eq!(zone.add(Value::smi(1)), Value::smi(1));
        zone.add(Value::null());
        assert!(zone.is_empty());

        zone.add(Value::heap(5));
        assert_eq!(zone.handles(), &[Value::heap(5)]);
    }
}
