//! In-memory representations of DICOM element values.

use std::borrow::Cow;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use smallvec::SmallVec;
use snafu::Snafu;

use crate::header::Tag;

/// Error produced when a [`PrimitiveValue`] cannot be converted into the
/// requested shape.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ConvertValueError {
    #[snafu(display("value is not convertible to a string"))]
    NotAString,
    #[snafu(display("value is not convertible to an integer"))]
    NotAnInteger,
    #[snafu(display("value is not convertible to a floating point number"))]
    NotAFloat,
    #[snafu(display("value is not a sequence of tags"))]
    NotATag,
    #[snafu(display("value has no elements"))]
    Empty,
    #[snafu(display("invalid date/time text `{}`", text))]
    InvalidDateTime { text: String },
}

/// The in-memory shape of a primitive (non-sequence) element value.
///
/// Multi-valued elements are represented as a [`SmallVec`] holding each
/// value, optimized for the common case of a handful of inline values
/// without a heap allocation.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveValue {
    /// No value (zero-length element).
    Empty,
    /// One or more textual values (`\`-separated on the wire).
    Strs(SmallVec<[String; 2]>),
    /// Attribute-tag (`AT`) values.
    Tags(SmallVec<[Tag; 2]>),
    /// Opaque byte buffer (`OB`, `UN`, or undecoded `OW`).
    U8(SmallVec<[u8; 2]>),
    /// 16-bit unsigned integers (`US`).
    U16(SmallVec<[u16; 2]>),
    /// 16-bit signed integers (`SS`).
    I16(SmallVec<[i16; 2]>),
    /// 32-bit unsigned integers (`UL`).
    U32(SmallVec<[u32; 2]>),
    /// 32-bit signed integers (`SL`).
    I32(SmallVec<[i32; 2]>),
    /// 64-bit unsigned integers (`UV`).
    U64(SmallVec<[u64; 2]>),
    /// 64-bit signed integers (`SV`).
    I64(SmallVec<[i64; 2]>),
    /// 32-bit floats (`FL`).
    F32(SmallVec<[f32; 2]>),
    /// 64-bit floats (`FD`).
    F64(SmallVec<[f64; 2]>),
    /// Date values (`DA`).
    Date(SmallVec<[NaiveDate; 2]>),
    /// Time values (`TM`).
    Time(SmallVec<[NaiveTime; 2]>),
    /// Combined date-time values (`DT`).
    DateTime(SmallVec<[NaiveDateTime; 2]>),
}

impl Default for PrimitiveValue {
    fn default() -> Self {
        PrimitiveValue::Empty
    }
}

impl PrimitiveValue {
    /// The number of individual values held (the value multiplicity).
    pub fn multiplicity(&self) -> u32 {
        match self {
            PrimitiveValue::Empty => 0,
            PrimitiveValue::Strs(v) => v.len() as u32,
            PrimitiveValue::Tags(v) => v.len() as u32,
            PrimitiveValue::U8(v) => {
                if v.is_empty() {
                    0
                } else {
                    1
                }
            }
            PrimitiveValue::U16(v) => v.len() as u32,
            PrimitiveValue::I16(v) => v.len() as u32,
            PrimitiveValue::U32(v) => v.len() as u32,
            PrimitiveValue::I32(v) => v.len() as u32,
            PrimitiveValue::U64(v) => v.len() as u32,
            PrimitiveValue::I64(v) => v.len() as u32,
            PrimitiveValue::F32(v) => v.len() as u32,
            PrimitiveValue::F64(v) => v.len() as u32,
            PrimitiveValue::Date(v) => v.len() as u32,
            PrimitiveValue::Time(v) => v.len() as u32,
            PrimitiveValue::DateTime(v) => v.len() as u32,
        }
    }

    /// Whether this value holds nothing at all.
    pub fn is_empty(&self) -> bool {
        self.multiplicity() == 0
    }

    /// Retrieve the value as a single string, joining multiple values with
    /// `\`.
    pub fn to_str(&self) -> Result<Cow<'_, str>, ConvertValueError> {
        match self {
            PrimitiveValue::Strs(v) if v.len() == 1 => Ok(Cow::Borrowed(v[0].as_str())),
            PrimitiveValue::Strs(v) => Ok(Cow::Owned(v.join("\\"))),
            _ => Err(ConvertValueError::NotAString),
        }
    }

    /// Retrieve the first value as a plain string slice.
    pub fn string(&self) -> Result<&str, ConvertValueError> {
        match self {
            PrimitiveValue::Strs(v) => v.first().map(|s| s.as_str()).context_empty(),
            _ => Err(ConvertValueError::NotAString),
        }
    }

    /// Retrieve the first value, interpreted as a 32-bit signed integer.
    pub fn to_int(&self) -> Result<i32, ConvertValueError> {
        Ok(match self {
            PrimitiveValue::U16(v) => *v.first().ok_or(ConvertValueError::Empty)? as i32,
            PrimitiveValue::I16(v) => *v.first().ok_or(ConvertValueError::Empty)? as i32,
            PrimitiveValue::U32(v) => *v.first().ok_or(ConvertValueError::Empty)? as i32,
            PrimitiveValue::I32(v) => *v.first().ok_or(ConvertValueError::Empty)?,
            PrimitiveValue::Strs(v) => v
                .first()
                .ok_or(ConvertValueError::Empty)?
                .trim()
                .parse()
                .map_err(|_| ConvertValueError::NotAnInteger)?,
            _ => return Err(ConvertValueError::NotAnInteger),
        })
    }

    /// Retrieve the first value, interpreted as an unsigned 16-bit integer.
    pub fn uint16(&self) -> Result<u16, ConvertValueError> {
        match self {
            PrimitiveValue::U16(v) => v.first().copied().ok_or(ConvertValueError::Empty),
            PrimitiveValue::I16(v) => Ok(*v.first().ok_or(ConvertValueError::Empty)? as u16),
            _ => Err(ConvertValueError::NotAnInteger),
        }
    }

    /// Retrieve this value as a contiguous byte buffer, reinterpreting
    /// numeric values in native DICOM little-endian order where needed.
    pub fn to_bytes(&self) -> Cow<'_, [u8]> {
        match self {
            PrimitiveValue::U8(v) => Cow::Borrowed(v.as_slice()),
            PrimitiveValue::Strs(v) => Cow::Owned(v.join("\\").into_bytes()),
            PrimitiveValue::U16(v) => {
                let mut out = Vec::with_capacity(v.len() * 2);
                for x in v {
                    out.extend_from_slice(&x.to_le_bytes());
                }
                Cow::Owned(out)
            }
            _ => Cow::Owned(Vec::new()),
        }
    }

    /// Calculate the encoded byte length of this value (before any final
    /// padding is applied by the caller).
    pub fn calculate_byte_len(&self) -> usize {
        match self {
            PrimitiveValue::Empty => 0,
            PrimitiveValue::Strs(v) => {
                if v.is_empty() {
                    0
                } else {
                    v.iter().map(|s| s.len()).sum::<usize>() + (v.len() - 1)
                }
            }
            PrimitiveValue::Tags(v) => v.len() * 4,
            PrimitiveValue::U8(v) => v.len(),
            PrimitiveValue::U16(v) | PrimitiveValue::I16(v) => v.len() * 2,
            PrimitiveValue::U32(v) | PrimitiveValue::I32(v) | PrimitiveValue::F32(v) => v.len() * 4,
            PrimitiveValue::U64(v) | PrimitiveValue::I64(v) | PrimitiveValue::F64(v) => v.len() * 8,
            PrimitiveValue::Date(v) => v.len() * 8,
            PrimitiveValue::Time(v) => v.len() * 6,
            PrimitiveValue::DateTime(v) => v.len() * 26,
        }
    }
}

trait OptionExtHelper<T> {
    fn context_empty(self) -> Result<T, ConvertValueError>;
}

impl<T> OptionExtHelper<T> for Option<T> {
    fn context_empty(self) -> Result<T, ConvertValueError> {
        self.ok_or(ConvertValueError::Empty)
    }
}

impl From<&str> for PrimitiveValue {
    fn from(s: &str) -> Self {
        PrimitiveValue::Strs(smallvec::smallvec![s.to_string()])
    }
}

impl From<String> for PrimitiveValue {
    fn from(s: String) -> Self {
        PrimitiveValue::Strs(smallvec::smallvec![s])
    }
}

impl From<i32> for PrimitiveValue {
    fn from(v: i32) -> Self {
        PrimitiveValue::Strs(smallvec::smallvec![v.to_string()])
    }
}

impl From<u16> for PrimitiveValue {
    fn from(v: u16) -> Self {
        PrimitiveValue::U16(smallvec::smallvec![v])
    }
}

impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_str() {
            Ok(s) => write!(f, "{}", s),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

/// A sequence of opaque pixel-data fragments, as produced by an encapsulated
/// (compressed) transfer syntax. Fragment 0, if a basic offset table is
/// present, gives byte offsets of each subsequent frame; this is kept
/// separate here as `offset_table`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PixelFragmentSequence {
    offset_table: SmallVec<[u32; 2]>,
    fragments: SmallVec<[Vec<u8>; 2]>,
}

impl PixelFragmentSequence {
    pub fn new(offset_table: SmallVec<[u32; 2]>, fragments: SmallVec<[Vec<u8>; 2]>) -> Self {
        PixelFragmentSequence {
            offset_table,
            fragments,
        }
    }

    pub fn offset_table(&self) -> &[u32] {
        &self.offset_table
    }

    pub fn fragments(&self) -> &[Vec<u8>] {
        &self.fragments
    }

    pub fn into_parts(self) -> (SmallVec<[u32; 2]>, SmallVec<[Vec<u8>; 2]>) {
        (self.offset_table, self.fragments)
    }
}

/// The value held by a data element: either a primitive value, a nested
/// sequence of sub-datasets (item type `I`), or an encapsulated pixel-data
/// fragment sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum DicomValue<I> {
    Primitive(PrimitiveValue),
    Sequence(Vec<I>),
    PixelSequence(PixelFragmentSequence),
}

impl<I> DicomValue<I> {
    pub fn primitive(&self) -> Option<&PrimitiveValue> {
        match self {
            DicomValue::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn items(&self) -> Option<&[I]> {
        match self {
            DicomValue::Sequence(items) => Some(items),
            _ => None,
        }
    }
}

impl<I> From<PrimitiveValue> for DicomValue<I> {
    fn from(p: PrimitiveValue) -> Self {
        DicomValue::Primitive(p)
    }
}

/// Build a [`PrimitiveValue`] from a variant tag and its inline values,
/// mirroring how command sets and literal datasets are constructed
/// throughout the codebase.
#[macro_export]
macro_rules! dicom_value {
    (Str, $e:expr) => {
        $crate::value::PrimitiveValue::Strs(smallvec::smallvec![$e.to_string()])
    };
    (Strs, [$($e:expr),* $(,)?]) => {
        $crate::value::PrimitiveValue::Strs(smallvec::smallvec![$($e.to_string()),*])
    };
    (U16, [$($e:expr),* $(,)?]) => {
        $crate::value::PrimitiveValue::U16(smallvec::smallvec![$($e),*])
    };
    (I16, [$($e:expr),* $(,)?]) => {
        $crate::value::PrimitiveValue::I16(smallvec::smallvec![$($e),*])
    };
    (U32, [$($e:expr),* $(,)?]) => {
        $crate::value::PrimitiveValue::U32(smallvec::smallvec![$($e),*])
    };
    (I32, [$($e:expr),* $(,)?]) => {
        $crate::value::PrimitiveValue::I32(smallvec::smallvec![$($e),*])
    };
    (F32, [$($e:expr),* $(,)?]) => {
        $crate::value::PrimitiveValue::F32(smallvec::smallvec![$($e),*])
    };
    (F64, [$($e:expr),* $(,)?]) => {
        $crate::value::PrimitiveValue::F64(smallvec::smallvec![$($e),*])
    };
    (U8, [$($e:expr),* $(,)?]) => {
        $crate::value::PrimitiveValue::U8(smallvec::smallvec![$($e),*])
    };
    (Tags, [$($e:expr),* $(,)?]) => {
        $crate::value::PrimitiveValue::Tags(smallvec::smallvec![$($e),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strs_join_with_backslash() {
        let v = dicom_value!(Strs, ["a", "b", "c"]);
        assert_eq!(v.to_str().unwrap(), "a\\b\\c");
        assert_eq!(v.multiplicity(), 3);
    }

    #[test]
    fn single_str_roundtrips_without_separator() {
        let v = PrimitiveValue::from("Doe^John");
        assert_eq!(v.to_str().unwrap(), "Doe^John");
    }

    #[test]
    fn uint16_from_u16_variant() {
        let v = dicom_value!(U16, [0x8001]);
        assert_eq!(v.uint16().unwrap(), 0x8001);
    }

    #[test]
    fn empty_value_has_zero_multiplicity() {
        assert_eq!(PrimitiveValue::Empty.multiplicity(), 0);
        assert!(PrimitiveValue::Empty.is_empty());
    }
}
