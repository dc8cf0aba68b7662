//! Observability trait for inspecting component state.
//!
//! Machines expose their live state through dotted query paths so hosts and
//! tests can watch anything without reaching into device internals. Queries
//! never affect emulation state; they read the same data `peek` would.

use std::fmt;

/// A dynamically-typed value returned by state queries.
///
/// Integer widths mirror the registers they come from, so a host can render
/// an 8-bit counter and a 16-bit address with the right number of digits.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    /// Cycle and frame counters; displayed in decimal.
    U64(u64),
    /// Uniform register banks, one element per unit (timers, channels).
    Array(Vec<Value>),
}

impl Value {
    /// Widen any integer variant to `u64`; `None` for non-numeric values.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Bool(v) => Some(u64::from(*v)),
            Value::U8(v) => Some(u64::from(*v)),
            Value::U16(v) => Some(u64::from(*v)),
            Value::U32(v) => Some(u64::from(*v)),
            Value::U64(v) => Some(*v),
            Value::Array(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v:#04X}"),
            Value::U16(v) => write!(f, "{v:#06X}"),
            Value::U32(v) => write!(f, "{v:#010X}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::Array(items) => {
                f.write_str("[")?;
                let mut sep = "";
                for item in items {
                    write!(f, "{sep}{item}")?;
                    sep = ", ";
                }
                f.write_str("]")
            }
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }
    )*};
}

value_from! {
    bool => Bool,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

/// A component whose state can be inspected.
///
/// Paths are hierarchical, separated by dots:
/// - `cpu.pc` - program counter
/// - `mikey.timer0.count` - a timer's current count
/// - `memory.0x0200` - a byte of CPU-visible memory
///
/// Queries never affect emulation state.
pub trait Observable {
    /// Query a specific property by path.
    ///
    /// Returns `None` if the path is not recognised.
    fn query(&self, path: &str) -> Option<Value>;

    /// List the fixed query paths.
    ///
    /// Parameterised paths (like `memory.<addr>`) are documented on the
    /// implementation and not enumerated here.
    fn query_paths(&self) -> &'static [&'static str];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_integers_as_hex() {
        assert_eq!(Value::U8(0x0F).to_string(), "0x0F");
        assert_eq!(Value::U16(0xFE00).to_string(), "0xFE00");
        assert_eq!(Value::U64(53_333).to_string(), "53333");
        let bank = Value::Array(vec![Value::U8(1), Value::U8(0xFF)]);
        assert_eq!(bank.to_string(), "[0x01, 0xFF]");
    }

    #[test]
    fn as_u64_widens_integers() {
        assert_eq!(Value::U8(7).as_u64(), Some(7));
        assert_eq!(Value::Bool(true).as_u64(), Some(1));
        assert_eq!(Value::Array(Vec::new()).as_u64(), None);
    }
}
