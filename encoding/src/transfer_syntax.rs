//! Transfer syntax descriptors: the pairing of a UID with the codec it
//! selects.

use byteordered::Endianness;

use crate::decode::{Decode, ExplicitVRDecoder, ImplicitVRLittleEndianDecoder};
use crate::encode::{Encode, ExplicitVREncoder, ImplicitVRLittleEndianEncoder};

/// Whether a transfer syntax's pixel data is stored natively (uncompressed,
/// directly addressable) or encapsulated in a compressed codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// No pixel data, or native (uncompressed) pixel data.
    None,
    /// Pixel data is encapsulated and would require an external codec to
    /// decompress; this crate only transports the compressed fragments.
    EncapsulatedUnsupported,
}

/// A concrete byte-level encoding: implicit or explicit VR, and the byte
/// order of multi-byte fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Codec3 {
    ImplicitVRLittleEndian,
    ExplicitVRLittleEndian,
    ExplicitVRBigEndian,
}

/// A transfer syntax: a UID paired with the codec it selects, per PS3.5
/// chapter 10 and annex A.
#[derive(Debug, Clone)]
pub struct TransferSyntax {
    uid: &'static str,
    name: &'static str,
    codec: Codec3,
    pixel_data: Codec,
}

impl TransferSyntax {
    pub const fn implicit_vr_little_endian(uid: &'static str, name: &'static str) -> Self {
        TransferSyntax {
            uid,
            name,
            codec: Codec3::ImplicitVRLittleEndian,
            pixel_data: Codec::None,
        }
    }

    pub const fn explicit_vr_little_endian(uid: &'static str, name: &'static str) -> Self {
        TransferSyntax {
            uid,
            name,
            codec: Codec3::ExplicitVRLittleEndian,
            pixel_data: Codec::None,
        }
    }

    pub const fn explicit_vr_big_endian(uid: &'static str, name: &'static str) -> Self {
        TransferSyntax {
            uid,
            name,
            codec: Codec3::ExplicitVRBigEndian,
            pixel_data: Codec::None,
        }
    }

    /// A transfer syntax whose pixel data is encapsulated; this crate can
    /// still parse its dataset structure (explicit VR little endian framing
    /// applies to everything but pixel data) but treats the compressed
    /// fragments as opaque bytes.
    pub const fn encapsulated(uid: &'static str, name: &'static str) -> Self {
        TransferSyntax {
            uid,
            name,
            codec: Codec3::ExplicitVRLittleEndian,
            pixel_data: Codec::EncapsulatedUnsupported,
        }
    }

    pub fn uid(&self) -> &'static str {
        self.uid
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_explicit_vr(&self) -> bool {
        !matches!(self.codec, Codec3::ImplicitVRLittleEndian)
    }

    pub fn endianness(&self) -> Endianness {
        match self.codec {
            Codec3::ExplicitVRBigEndian => Endianness::Big,
            _ => Endianness::Little,
        }
    }

    /// Whether this transfer syntax's pixel data is encapsulated rather than
    /// stored as a flat native array.
    pub fn is_encapsulated(&self) -> bool {
        matches!(self.pixel_data, Codec::EncapsulatedUnsupported)
    }

    /// Construct a decoder for this transfer syntax's byte-level encoding.
    pub fn decoder(&self) -> Box<dyn Decode> {
        match self.codec {
            Codec3::ImplicitVRLittleEndian => Box::new(ImplicitVRLittleEndianDecoder),
            Codec3::ExplicitVRLittleEndian => Box::new(ExplicitVRDecoder::little_endian()),
            Codec3::ExplicitVRBigEndian => Box::new(ExplicitVRDecoder::big_endian()),
        }
    }

    /// Construct an encoder for this transfer syntax's byte-level encoding.
    pub fn encoder(&self) -> Box<dyn Encode> {
        match self.codec {
            Codec3::ImplicitVRLittleEndian => Box::new(ImplicitVRLittleEndianEncoder),
            Codec3::ExplicitVRLittleEndian => Box::new(ExplicitVREncoder::little_endian()),
            Codec3::ExplicitVRBigEndian => Box::new(ExplicitVREncoder::big_endian()),
        }
    }
}

/// A lookup table from transfer syntax UID to its [`TransferSyntax`]
/// descriptor. Implemented by the process-wide registry in
/// `dicom-transfer-syntax-registry`; kept as a trait here so this crate does
/// not need to depend on that one.
pub trait TransferSyntaxIndex {
    /// Look up a transfer syntax by UID. Trailing padding (NUL or space) is
    /// trimmed by the caller before the lookup.
    fn get(&self, uid: &str) -> Option<&TransferSyntax>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implicit_vr_le_is_not_explicit() {
        let ts = TransferSyntax::implicit_vr_little_endian("1.2.840.10008.1.2", "Implicit VR Little Endian");
        assert!(!ts.is_explicit_vr());
        assert_eq!(ts.endianness(), Endianness::Little);
    }

    #[test]
    fn explicit_vr_be_reports_big_endian() {
        let ts = TransferSyntax::explicit_vr_big_endian("1.2.840.10008.1.2.2", "Explicit VR Big Endian");
        assert!(ts.is_explicit_vr());
        assert_eq!(ts.endianness(), Endianness::Big);
    }
}
