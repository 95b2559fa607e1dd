//! Value representation using a one-bit tag (64-bit)
//!
//! Every value that crosses a stub boundary is a single machine word. Small
//! integers ("Smis") are stored inline; everything else is a reference into
//! the isolate heap's object table.
//!
//! # Encoding Strategy
//!
//! ```text
//! Smi:   iiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiiii0
//! Heap:  xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx1
//! null:  0000000000000000000000000000000000000000000000000000000000000001
//! ```
//!
//! A Smi is its integer shifted left by one, so two Smis can be added or
//! subtracted without untagging. A heap reference carries the object table
//! index above the tag bit; index 0 is reserved for `null`.

use std::fmt;

/// Tagged value representation
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Value(u64);

impl Value {
    const TAG_MASK: u64 = 0b1;
    const TAG_SMI: u64 = 0b0;
    const TAG_HEAP: u64 = 0b1;

    const NULL: u64 = Self::TAG_HEAP;

    /// Number of payload bits in a Smi
    pub const SMI_BITS: u32 = 63;
    /// Smallest integer representable as a Smi
    pub const SMI_MIN: i64 = -(1 << (Self::SMI_BITS - 1));
    /// Largest integer representable as a Smi
    pub const SMI_MAX: i64 = (1 << (Self::SMI_BITS - 1)) - 1;

    /// The null object
    #[inline]
    pub const fn null() -> Self {
        Value(Self::NULL)
    }

    /// Check whether `value` fits in a Smi
    #[inline]
    pub const fn is_valid_smi(value: i64) -> bool {
        value >= Self::SMI_MIN && value <= Self::SMI_MAX
    }

    /// Create a Smi.
    ///
    /// # Panics
    ///
    /// Panics if `value` is outside the Smi range.
    #[inline]
    pub fn smi(value: i64) -> Self {
        assert!(Self::is_valid_smi(value), "{} is out of Smi range", value);
        Value(((value as u64) << 1) | Self::TAG_SMI)
    }

    /// Create a Smi if `value` fits, `None` otherwise
    #[inline]
    pub fn try_smi(value: i64) -> Option<Self> {
        Self::is_valid_smi(value).then(|| Value((value as u64) << 1))
    }

    /// Reference to the heap object at `index`
    #[inline]
    pub(crate) const fn heap(index: u32) -> Self {
        Value(((index as u64) << 1) | Self::TAG_HEAP)
    }

    /// Reinterpret raw bits as a value
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Value(bits)
    }

    /// Raw bits, as seen by generated code
    #[inline]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_smi(self) -> bool {
        (self.0 & Self::TAG_MASK) == Self::TAG_SMI
    }

    /// Check whether this value refers to a heap object (including `null`)
    #[inline]
    pub const fn is_heap_object(self) -> bool {
        (self.0 & Self::TAG_MASK) == Self::TAG_HEAP
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == Self::NULL
    }

    /// Extract a Smi payload
    #[inline]
    pub const fn as_smi(self) -> Option<i64> {
        if self.is_smi() {
            Some((self.0 as i64) >> 1)
        } else {
            None
        }
    }

    /// Object table index of a heap reference
    #[inline]
    pub const fn heap_index(self) -> Option<u32> {
        if self.is_heap_object() {
            Some((self.0 >> 1) as u32)
        } else {
            None
        }
    }

    /// Check whether the collector must trace this value
    #[inline]
    pub const fn is_collectable(self) -> bool {
        self.is_heap_object() && !self.is_null()
    }

    pub const fn type_name(self) -> &'static str {
        if self.is_smi() {
            "smi"
        } else if self.is_null() {
            "null"
        } else {
            "object"
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::null()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.as_smi(), self.heap_index()) {
            (Some(v), _) => write!(f, "smi({})", v),
            (_, Some(0)) => write!(f, "null"),
            (_, Some(idx)) => write!(f, "object#{}", idx),
            _ => write!(f, "Value({:#x})", self.0),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.as_smi(), self.heap_index()) {
            (Some(v), _) => write!(f, "{}", v),
            (_, Some(0)) => write!(f, "null"),
            (_, Some(idx)) => write!(f, "[object#{}]", idx),
            _ => write!(f, "<??>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smi_encoding() {
        let v = Value::smi(21);
        assert!(v.is_smi());
        assert!(!v.is_heap_object());
        assert_eq!(v.to_bits(), 42);
        assert_eq!(v.as_smi(), Some(21));

        let neg = Value::smi(-10);
        assert_eq!(neg.as_smi(), Some(-10));
    }

    #[test]
    fn test_smi_range() {
        assert!(Value::is_valid_smi(Value::SMI_MAX));
        assert!(Value::is_valid_smi(Value::SMI_MIN));
        assert!(!Value::is_valid_smi(i64::MAX));
        assert!(!Value::is_valid_smi(i64::MIN));
        assert_eq!(Value::try_smi(i64::MAX), None);
        assert_eq!(Value::smi(Value::SMI_MIN).as_smi(), Some(Value::SMI_MIN));
    }

    #[test]
    #[should_panic(expected = "out of Smi range")]
    fn test_smi_out_of_range_panics() {
        Value::smi(i64::MAX);
    }

    #[test]
    fn test_tagged_add_matches_untagged() {
        // Two Smis add without untagging
        let a = Value::smi(10);
        let b = Value::smi(20);
        let sum = Value::from_bits(a.to_bits().wrapping_add(b.to_bits()));
        assert_eq!(sum.as_smi(), Some(30));
    }

    #[test]
    fn test_null_and_heap() {
        let null = Value::null();
        assert!(null.is_null());
        assert!(null.is_heap_object());
        assert!(!null.is_collectable());
        assert_eq!(null.heap_index(), Some(0));
        assert_eq!(null.as_smi(), None);

        let obj = Value::heap(7);
        assert!(obj.is_collectable());
        assert_eq!(obj.heap_index(), Some(7));
        assert_eq!(format!("{:?}", obj), "object#7");
        assert_eq!(Value::default(), Value::null());
    }
}
