//! Conversions from database values into Rust types.

use crate::db::Value;
use crate::error::{Result, SpannerError};

/// Types a single column can be scanned into.
///
/// NULL only scans into `Option<T>` (or [`Value`]); scanning it into any other
/// type is an error rather than a silent default.
pub trait FromValue: Sized {
    /// Converts a value, or fails with a scan error.
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch(value: &Value, target: &str) -> SpannerError {
    match value {
        Value::Null => SpannerError::scan(format!("cannot scan NULL into {target}")),
        other => SpannerError::scan(format!("cannot scan {other:?} into {target}")),
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(mismatch(other, "String")),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(i) => Ok(*i),
            other => Err(mismatch(other, "i64")),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(i) => i32::try_from(*i)
                .map_err(|_| SpannerError::scan(format!("value {i} overflows i32"))),
            other => Err(mismatch(other, "i32")),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            other => Err(mismatch(other, "f64")),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch(other, "bool")),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            other => Err(mismatch(other, "Vec<u8>")),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Types a whole row can be scanned into: tuples of up to eight columns.
///
/// The tuple arity must equal the row width.
pub trait FromRow: Sized {
    fn from_row(row: &[Value]) -> Result<Self>;
}

macro_rules! impl_from_row_tuple {
    ($len:expr => $($idx:tt $T:ident),+) => {
        impl<$($T: FromValue),+> FromRow for ($($T,)+) {
            fn from_row(row: &[Value]) -> Result<Self> {
                if row.len() != $len {
                    return Err(SpannerError::scan(format!(
                        "expected {} destination arguments, row has {} columns",
                        $len,
                        row.len()
                    )));
                }
                Ok(($(
                    $T::from_value(&row[$idx])
                        .map_err(|e| SpannerError::scan(format!("column {}: {}", $idx, scan_message(e))))?,
                )+))
            }
        }
    };
}

fn scan_message(error: SpannerError) -> String {
    match error {
        SpannerError::Scan(msg) => msg,
        other => other.to_string(),
    }
}

impl_from_row_tuple!(1 => 0 A);
impl_from_row_tuple!(2 => 0 A, 1 B);
impl_from_row_tuple!(3 => 0 A, 1 B, 2 C);
impl_from_row_tuple!(4 => 0 A, 1 B, 2 C, 3 D);
impl_from_row_tuple!(5 => 0 A, 1 B, 2 C, 3 D, 4 E);
impl_from_row_tuple!(6 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F);
impl_from_row_tuple!(7 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G);
impl_from_row_tuple!(8 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H);
