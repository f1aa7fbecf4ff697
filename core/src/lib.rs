//! Core data types shared by every layer of the DICOM stack: tags, value
//! representations, value multiplicity, primitive values, and data
//! elements.
//!
//! This crate has no knowledge of the wire format, the dictionary, or the
//! network protocol; those live in `dicom-encoding`, `dicom-dictionary-std`,
//! and `dicom-ul` respectively.

pub mod dictionary;
pub mod element;
pub mod header;
pub mod value;
pub mod vr;

pub use dictionary::{DataDictionary, DictionaryEntryRef};
pub use element::DataElement;
pub use header::{
    DataElementHeader, ElementNumber, GroupNumber, Header, Length, Tag, ITEM_DELIMITER_TAG,
    ITEM_TAG, SEQUENCE_DELIMITER_TAG,
};
pub use value::{ConvertValueError, DicomValue, PixelFragmentSequence, PrimitiveValue};
pub use vr::{UnknownVRError, VM, VR};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_parity_distinguishes_private_groups() {
        assert!(!Tag(0x0008, 0x0018).is_private());
        assert!(Tag(0x0009, 0x0010).is_private());
    }

    #[test]
    fn length_undefined_sentinel() {
        assert!(Length::UNDEFINED.is_undefined());
        assert_eq!(Length(4).get(), Some(4));
        assert_eq!(Length::UNDEFINED.get(), None);
    }

    #[test]
    fn vr_round_trips_mnemonic() {
        use std::str::FromStr;
        assert_eq!(VR::from_str("PN").unwrap(), VR::PN);
        assert_eq!(VR::PN.to_string(), "PN");
    }

    #[test]
    fn vr_extended_length_classification() {
        assert!(VR::OB.has_explicit_4byte_length());
        assert!(VR::SQ.has_explicit_4byte_length());
        assert!(!VR::US.has_explicit_4byte_length());
    }

    #[test]
    fn data_element_computes_length_from_value() {
        let el: DataElement<()> = DataElement::new(Tag(0x0010, 0x0010), VR::PN, "Doe^John");
        assert_eq!(el.length(), Length(8));
        assert_eq!(el.to_str().unwrap(), "Doe^John");
    }
}
