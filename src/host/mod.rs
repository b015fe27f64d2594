//! Host Value Model
//!
//! The minimal view of the scripting host's values that the core needs:
//! scalars, byte strings, the associative table container and opaque
//! handles to managed objects.

mod table;

pub use table::{HostTable, TableKey, DECLARED_LEN_FIELD};

use std::fmt;

use crate::registry::Handle;
use crate::status::{CoreError, CoreResult};

/// A value as seen by the scripting host
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HostValue {
    #[default]
    Nil,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    /// Text string
    String(String),
    /// Byte string that is not valid UTF-8 (or not meant as text)
    Bytes(Vec<u8>),
    Table(HostTable),
    /// Managed object handle (host userdata)
    Object(Handle),
}

impl HostValue {
    /// Host-side type name, as the scripting language reports it
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Nil => "nil",
            HostValue::Boolean(_) => "boolean",
            HostValue::Integer(_) | HostValue::Number(_) => "number",
            HostValue::String(_) | HostValue::Bytes(_) => "string",
            HostValue::Table(_) => "table",
            HostValue::Object(_) => "userdata",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, HostValue::Nil)
    }

    /// Integer view; numbers with an exact integral value convert too
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            HostValue::Integer(v) => Some(*v),
            HostValue::Number(v) if v.is_finite() && v.fract() == 0.0 => {
                // i64 spans [-2^63, 2^63); the upper bound is not representable
                let bound = 2f64.powi(63);
                if *v >= -bound && *v < bound {
                    Some(*v as i64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            HostValue::Integer(v) => Some(*v as f64),
            HostValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Raw bytes of either string flavour
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            HostValue::String(s) => Some(s.as_bytes()),
            HostValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&HostTable> {
        match self {
            HostValue::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<Handle> {
        match self {
            HostValue::Object(h) => Some(*h),
            _ => None,
        }
    }

    /// Checked integer conversion for argument `what`
    pub fn to_int<T: TryFrom<i64>>(&self, what: &str) -> CoreResult<T> {
        let v = self.as_integer().ok_or_else(|| {
            CoreError::invalid(format!(
                "{}: expected integer, got {}",
                what,
                self.type_name()
            ))
        })?;
        T::try_from(v).map_err(|_| CoreError::range(format!("{}: {} out of range", what, v)))
    }

    /// Non-negative size argument
    pub fn to_size(&self, what: &str) -> CoreResult<usize> {
        self.to_int::<usize>(what)
    }

    pub fn to_handle(&self, what: &str) -> CoreResult<Handle> {
        self.as_handle().ok_or_else(|| {
            CoreError::invalid(format!(
                "{}: expected userdata, got {}",
                what,
                self.type_name()
            ))
        })
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Nil => write!(f, "nil"),
            HostValue::Boolean(b) => write!(f, "{}", b),
            HostValue::Integer(v) => write!(f, "{}", v),
            HostValue::Number(v) => write!(f, "{}", v),
            HostValue::String(s) => write!(f, "{}", s),
            HostValue::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            HostValue::Table(t) => write!(f, "table({} entries)", t.entry_count()),
            HostValue::Object(h) => write!(f, "userdata: {}", h),
        }
    }
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        HostValue::Boolean(v)
    }
}

impl From<i64> for HostValue {
    fn from(v: i64) -> Self {
        HostValue::Integer(v)
    }
}

impl From<i32> for HostValue {
    fn from(v: i32) -> Self {
        HostValue::Integer(i64::from(v))
    }
}

impl From<i16> for HostValue {
    fn from(v: i16) -> Self {
        HostValue::Integer(i64::from(v))
    }
}

impl From<usize> for HostValue {
    fn from(v: usize) -> Self {
        // Sizes beyond i64 cannot exist on supported targets
        HostValue::Integer(v as i64)
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        HostValue::Number(v)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::String(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::String(s)
    }
}

impl From<Vec<u8>> for HostValue {
    fn from(b: Vec<u8>) -> Self {
        match String::from_utf8(b) {
            Ok(s) => HostValue::String(s),
            Err(e) => HostValue::Bytes(e.into_bytes()),
        }
    }
}

impl From<HostTable> for HostValue {
    fn from(t: HostTable) -> Self {
        HostValue::Table(t)
    }
}

impl From<Handle> for HostValue {
    fn from(h: Handle) -> Self {
        HostValue::Object(h)
    }
}

impl From<()> for HostValue {
    fn from(_: ()) -> Self {
        HostValue::Nil
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(HostValue::Nil, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(HostValue::Nil.type_name(), "nil");
        assert_eq!(HostValue::Integer(1).type_name(), "number");
        assert_eq!(HostValue::Number(1.5).type_name(), "number");
        assert_eq!(HostValue::Bytes(vec![0xff]).type_name(), "string");
        assert_eq!(HostValue::Table(HostTable::new()).type_name(), "table");
    }

    #[test]
    fn test_integer_views() {
        assert_eq!(HostValue::Number(3.0).as_integer(), Some(3));
        assert_eq!(HostValue::Number(3.5).as_integer(), None);
        assert_eq!(HostValue::Number(f64::NAN).as_integer(), None);
        assert_eq!(HostValue::from("3").as_integer(), None);
    }

    #[test]
    fn test_integer_view_bounds() {
        let top = 2f64.powi(63);
        assert_eq!(HostValue::Number(top).as_integer(), None);
        assert_eq!(HostValue::Number(9.223372036854776e18).as_integer(), None);
        assert_eq!(HostValue::Number(-top).as_integer(), Some(i64::MIN));
        assert_eq!(HostValue::Number(-top * 2.0).as_integer(), None);
        assert!(HostValue::Number(top).to_int::<i64>("n").is_err());
    }

    #[test]
    fn test_checked_conversions() {
        assert_eq!(HostValue::Integer(300).to_int::<i16>("events"), Ok(300));
        assert!(matches!(
            HostValue::Integer(70_000).to_int::<i16>("events"),
            Err(CoreError::RangeError(_))
        ));
        assert!(matches!(
            HostValue::Integer(-1).to_size("length"),
            Err(CoreError::RangeError(_))
        ));
        assert!(matches!(
            HostValue::from("x").to_size("length"),
            Err(CoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_bytes_conversion() {
        assert_eq!(HostValue::from(b"abc".to_vec()), HostValue::from("abc"));
        assert_eq!(
            HostValue::from(vec![0xff, 0x00]),
            HostValue::Bytes(vec![0xff, 0x00])
        );
    }
}
