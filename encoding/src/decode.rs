//! Decoding of data element headers and primitive values from a byte
//! window, for each of the concrete transfer syntax encodings.
//!
//! Implementations never read past the slice they are given: callers are
//! expected to have already delimited the relevant byte range (the whole
//! file, one item, or one PDV's worth of data).

use byteordered::Endianness;
use dicom_core::dictionary::DataDictionary;
use dicom_core::header::{
    DataElementHeader, Length, Tag, ITEM_DELIMITER_TAG, ITEM_TAG, SEQUENCE_DELIMITER_TAG,
};
use dicom_core::value::{PixelFragmentSequence, PrimitiveValue};
use dicom_core::VR;
use smallvec::SmallVec;
use std::str::FromStr;

use crate::error::{DecodeError, Result};

fn need(bytes: &[u8], n: usize) -> Result<()> {
    if bytes.len() < n {
        return Err(DecodeError::Truncated {
            needed: n,
            available: bytes.len(),
        });
    }
    Ok(())
}

fn read_u16(bytes: &[u8], endianness: Endianness) -> u16 {
    let arr = [bytes[0], bytes[1]];
    match endianness {
        Endianness::Little => u16::from_le_bytes(arr),
        Endianness::Big => u16::from_be_bytes(arr),
    }
}

fn read_u32(bytes: &[u8], endianness: Endianness) -> u32 {
    let arr = [bytes[0], bytes[1], bytes[2], bytes[3]];
    match endianness {
        Endianness::Little => u32::from_le_bytes(arr),
        Endianness::Big => u32::from_be_bytes(arr),
    }
}

fn read_tag(bytes: &[u8], endianness: Endianness) -> Tag {
    Tag(
        read_u16(&bytes[0..2], endianness),
        read_u16(&bytes[2..4], endianness),
    )
}

/// Decodes data element headers and primitive values for one concrete
/// transfer syntax encoding.
pub trait Decode {
    fn is_explicit_vr(&self) -> bool;
    fn endianness(&self) -> Endianness;

    /// Decode one data element header. For implicit VR, `dict` is consulted
    /// to resolve the VR; unknown tags decode as `UN`. Returns the header
    /// plus the number of bytes consumed.
    fn decode_header(
        &self,
        bytes: &[u8],
        dict: &dyn DataDictionary,
    ) -> Result<(DataElementHeader, usize)>;

    /// Decode an item, item-delimiter, or sequence-delimiter header
    /// (always plain tag + 4-byte length, regardless of transfer syntax).
    fn decode_item_header(&self, bytes: &[u8]) -> Result<(Tag, Length, usize)> {
        need(bytes, 8)?;
        let tag = read_tag(bytes, self.endianness());
        let len = read_u32(&bytes[4..8], self.endianness());
        Ok((tag, Length(len), 8))
    }

    /// Decode the primitive value occupying exactly `bytes`, given its VR.
    fn decode_primitive(&self, bytes: &[u8], vr: VR) -> Result<PrimitiveValue> {
        decode_primitive_generic(bytes, vr, self.endianness())
    }
}

fn decode_primitive_generic(bytes: &[u8], vr: VR, endianness: Endianness) -> Result<PrimitiveValue> {
    if bytes.is_empty() {
        return Ok(PrimitiveValue::Empty);
    }
    if let Some(width) = vr.byte_width() {
        if bytes.len() % width as usize != 0 {
            return Err(DecodeError::OddLength {
                len: bytes.len() as u32,
                vr,
            });
        }
        return Ok(decode_numeric(bytes, vr, endianness));
    }
    if vr.is_string() {
        let text = trim_padding(bytes, vr);
        let parts: SmallVec<[String; 2]> = text.split('\\').map(|s| s.to_string()).collect();
        return Ok(PrimitiveValue::Strs(parts));
    }
    // OB / OW / UN / OD / OF / OL / OV and any other opaque VR: raw bytes.
    Ok(PrimitiveValue::U8(SmallVec::from_slice(bytes)))
}

fn trim_padding(bytes: &[u8], vr: VR) -> std::borrow::Cow<'_, str> {
    let mut end = bytes.len();
    let pad = vr.padding_byte();
    while end > 0 && bytes[end - 1] == pad {
        end -= 1;
    }
    String::from_utf8_lossy(&bytes[..end])
}

fn decode_numeric(bytes: &[u8], vr: VR, endianness: Endianness) -> PrimitiveValue {
    match vr {
        VR::US => PrimitiveValue::U16(
            bytes
                .chunks_exact(2)
                .map(|c| read_u16(c, endianness))
                .collect(),
        ),
        VR::SS => PrimitiveValue::I16(
            bytes
                .chunks_exact(2)
                .map(|c| read_u16(c, endianness) as i16)
                .collect(),
        ),
        VR::UL => PrimitiveValue::U32(
            bytes
                .chunks_exact(4)
                .map(|c| read_u32(c, endianness))
                .collect(),
        ),
        VR::SL => PrimitiveValue::I32(
            bytes
                .chunks_exact(4)
                .map(|c| read_u32(c, endianness) as i32)
                .collect(),
        ),
        VR::FL => PrimitiveValue::F32(
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_bits(read_u32(c, endianness)))
                .collect(),
        ),
        VR::FD => PrimitiveValue::F64(
            bytes
                .chunks_exact(8)
                .map(|c| {
                    let mut arr = [0u8; 8];
                    arr.copy_from_slice(c);
                    let bits = match endianness {
                        Endianness::Little => u64::from_le_bytes(arr),
                        Endianness::Big => u64::from_be_bytes(arr),
                    };
                    f64::from_bits(bits)
                })
                .collect(),
        ),
        VR::AT => PrimitiveValue::Tags(bytes.chunks_exact(4).map(|c| read_tag(c, endianness)).collect()),
        VR::UV => PrimitiveValue::U64(
            bytes
                .chunks_exact(8)
                .map(|c| {
                    let mut arr = [0u8; 8];
                    arr.copy_from_slice(c);
                    match endianness {
                        Endianness::Little => u64::from_le_bytes(arr),
                        Endianness::Big => u64::from_be_bytes(arr),
                    }
                })
                .collect(),
        ),
        VR::SV => PrimitiveValue::I64(
            bytes
                .chunks_exact(8)
                .map(|c| {
                    let mut arr = [0u8; 8];
                    arr.copy_from_slice(c);
                    match endianness {
                        Endianness::Little => i64::from_le_bytes(arr),
                        Endianness::Big => i64::from_be_bytes(arr),
                    }
                })
                .collect(),
        ),
        _ => PrimitiveValue::U8(SmallVec::from_slice(bytes)),
    }
}

/// Decode an encapsulated (compressed) pixel-data value: an undefined
/// length followed by an optional basic offset table item and then one
/// item per compressed frame, terminated by a sequence delimiter. `body`
/// must start right after the `(7FE0,0010)` element's own undefined-length
/// header.
pub fn decode_pixel_sequence(body: &[u8], endianness: Endianness) -> Result<(PixelFragmentSequence, usize)> {
    let mut pos = 0;
    let mut fragments: SmallVec<[Vec<u8>; 2]> = SmallVec::new();
    let mut offset_table: SmallVec<[u32; 2]> = SmallVec::new();
    let mut first = true;
    loop {
        need(&body[pos..], 8)?;
        let tag = read_tag(&body[pos..pos + 4], endianness);
        let len = read_u32(&body[pos + 4..pos + 8], endianness);
        pos += 8;
        if tag == SEQUENCE_DELIMITER_TAG {
            break;
        }
        if tag != ITEM_TAG {
            return Err(DecodeError::UnexpectedDelimiter);
        }
        need(&body[pos..], len as usize)?;
        let item = &body[pos..pos + len as usize];
        pos += len as usize;
        if first {
            first = false;
            if !item.is_empty() {
                offset_table = item.chunks_exact(4).map(|c| read_u32(c, endianness)).collect();
            }
            continue;
        }
        fragments.push(item.to_vec());
    }
    Ok((PixelFragmentSequence::new(offset_table, fragments), pos))
}

/// Implicit VR Little Endian: tag (4 bytes) + 4-byte length; VR is always
/// resolved from the dictionary.
pub struct ImplicitVRLittleEndianDecoder;

impl Decode for ImplicitVRLittleEndianDecoder {
    fn is_explicit_vr(&self) -> bool {
        false
    }
    fn endianness(&self) -> Endianness {
        Endianness::Little
    }

    fn decode_header(
        &self,
        bytes: &[u8],
        dict: &dyn DataDictionary,
    ) -> Result<(DataElementHeader, usize)> {
        need(bytes, 8)?;
        let tag = read_tag(bytes, Endianness::Little);
        let len = read_u32(&bytes[4..8], Endianness::Little);
        let vr = if tag.is_item_or_delimiter() {
            VR::UN
        } else {
            dict.by_tag(tag).map(|e| e.vr).unwrap_or(VR::UN)
        };
        Ok((DataElementHeader::new(tag, vr, Length(len)), 8))
    }
}

/// Explicit VR, either byte order: tag (4 bytes) + 2-letter VR mnemonic,
/// then either a 2-byte length or (for the extended VRs) 2 reserved bytes
/// and a 4-byte length.
pub struct ExplicitVRDecoder {
    endianness: Endianness,
}

impl ExplicitVRDecoder {
    pub fn little_endian() -> Self {
        ExplicitVRDecoder {
            endianness: Endianness::Little,
        }
    }
    pub fn big_endian() -> Self {
        ExplicitVRDecoder {
            endianness: Endianness::Big,
        }
    }
}

impl Decode for ExplicitVRDecoder {
    fn is_explicit_vr(&self) -> bool {
        true
    }
    fn endianness(&self) -> Endianness {
        self.endianness
    }

    fn decode_header(
        &self,
        bytes: &[u8],
        _dict: &dyn DataDictionary,
    ) -> Result<(DataElementHeader, usize)> {
        need(bytes, 8)?;
        let tag = read_tag(bytes, self.endianness);
        if tag == ITEM_TAG || tag == ITEM_DELIMITER_TAG || tag == SEQUENCE_DELIMITER_TAG {
            let len = read_u32(&bytes[4..8], self.endianness);
            return Ok((DataElementHeader::new(tag, VR::UN, Length(len)), 8));
        }
        let vr_mnemonic = std::str::from_utf8(&bytes[4..6]).map_err(|_| DecodeError::UnknownVr {
            b0: bytes[4] as char,
            b1: bytes[5] as char,
        })?;
        let vr = VR::from_str(vr_mnemonic).map_err(|_| DecodeError::UnknownVr {
            b0: bytes[4] as char,
            b1: bytes[5] as char,
        })?;
        if vr.has_explicit_4byte_length() {
            need(bytes, 12)?;
            let len = read_u32(&bytes[8..12], self.endianness);
            Ok((DataElementHeader::new(tag, vr, Length(len)), 12))
        } else {
            let len = read_u16(&bytes[6..8], self.endianness);
            Ok((DataElementHeader::new(tag, vr, Length(len as u32)), 8))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_dictionary_std::StandardDataDictionary;

    #[test]
    fn implicit_decodes_known_tag_vr_from_dictionary() {
        let dict = StandardDataDictionary;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0x0010u16.to_le_bytes());
        bytes.extend_from_slice(&0x0010u16.to_le_bytes());
        bytes.extend_from_slice(&8u32.to_le_bytes());
        bytes.extend_from_slice(b"Doe^John");
        let dec = ImplicitVRLittleEndianDecoder;
        let (header, consumed) = dec.decode_header(&bytes, &dict).unwrap();
        assert_eq!(consumed, 8);
        assert_eq!(header.vr, VR::PN);
        assert_eq!(header.len, Length(8));
    }

    #[test]
    fn explicit_le_uses_2byte_length_for_short_vr() {
        let dict = StandardDataDictionary;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0x0010u16.to_le_bytes());
        bytes.extend_from_slice(&0x0010u16.to_le_bytes());
        bytes.extend_from_slice(b"PN");
        bytes.extend_from_slice(&8u16.to_le_bytes());
        let dec = ExplicitVRDecoder::little_endian();
        let (header, consumed) = dec.decode_header(&bytes, &dict).unwrap();
        assert_eq!(consumed, 8);
        assert_eq!(header.vr, VR::PN);
    }

    #[test]
    fn explicit_le_uses_4byte_length_for_extended_vr() {
        let dict = StandardDataDictionary;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0x7FE0u16.to_le_bytes());
        bytes.extend_from_slice(&0x0010u16.to_le_bytes());
        bytes.extend_from_slice(b"OW");
        bytes.extend_from_slice(&[0u8, 0u8]); // reserved
        bytes.extend_from_slice(&100u32.to_le_bytes());
        let dec = ExplicitVRDecoder::little_endian();
        let (header, consumed) = dec.decode_header(&bytes, &dict).unwrap();
        assert_eq!(consumed, 12);
        assert_eq!(header.vr, VR::OW);
        assert_eq!(header.len, Length(100));
    }

    #[test]
    fn decode_primitive_trims_string_padding() {
        let val = decode_primitive_generic(b"ABC ", VR::CS, Endianness::Little).unwrap();
        assert_eq!(val.to_str().unwrap(), "ABC");
    }
}
