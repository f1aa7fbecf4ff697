//! The [`DataElement`] type: a tag/VR/value triple.

use crate::header::{DataElementHeader, Header, Length, Tag};
use crate::value::{DicomValue, PrimitiveValue};
use crate::vr::VR;

/// A single DICOM data element: a (tag, VR, value) triple. Generic over the
/// item type `I` used to represent nested sequence items.
#[derive(Debug, Clone, PartialEq)]
pub struct DataElement<I> {
    header: DataElementHeader,
    value: DicomValue<I>,
}

impl<I> DataElement<I> {
    /// Build a primitive-valued data element. The declared length is
    /// computed from the value; callers needing a specific on-wire length
    /// (e.g. undefined-length sequences) should use [`DataElement::new_with_len`].
    pub fn new<T: Into<Tag>, V: Into<PrimitiveValue>>(tag: T, vr: VR, value: V) -> Self {
        let value: PrimitiveValue = value.into();
        let len = Length(value.calculate_byte_len() as u32);
        DataElement {
            header: DataElementHeader::new(tag, vr, len),
            value: DicomValue::Primitive(value),
        }
    }

    /// Build a sequence-valued data element from its items.
    pub fn new_sequence<T: Into<Tag>>(tag: T, items: Vec<I>, len: Length) -> Self {
        DataElement {
            header: DataElementHeader::new(tag, VR::SQ, len),
            value: DicomValue::Sequence(items),
        }
    }

    /// Build a data element with a fully specified header and value.
    pub fn new_with_len<T: Into<Tag>>(tag: T, vr: VR, len: Length, value: DicomValue<I>) -> Self {
        DataElement {
            header: DataElementHeader::new(tag, vr, len),
            value,
        }
    }

    pub fn header(&self) -> &DataElementHeader {
        &self.header
    }

    pub fn value(&self) -> &DicomValue<I> {
        &self.value
    }

    pub fn into_value(self) -> DicomValue<I> {
        self.value
    }
}

impl<I> Header for DataElement<I> {
    fn tag(&self) -> Tag {
        self.header.tag
    }
    fn vr(&self) -> VR {
        self.header.vr
    }
    fn length(&self) -> Length {
        self.header.len
    }
}

// Convenience forwarding so callers can call value-level accessors directly
// on an element without going through `.value().primitive()...`.
impl<I> DataElement<I> {
    pub fn to_str(&self) -> Result<std::borrow::Cow<'_, str>, crate::value::ConvertValueError> {
        self.value
            .primitive()
            .ok_or(crate::value::ConvertValueError::NotAString)?
            .to_str()
    }

    pub fn to_int(&self) -> Result<i32, crate::value::ConvertValueError> {
        self.value
            .primitive()
            .ok_or(crate::value::ConvertValueError::NotAnInteger)?
            .to_int()
    }

    pub fn uint16(&self) -> Result<u16, crate::value::ConvertValueError> {
        self.value
            .primitive()
            .ok_or(crate::value::ConvertValueError::NotAnInteger)?
            .uint16()
    }
}
