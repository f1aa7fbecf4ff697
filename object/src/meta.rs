//! The file meta information group: the 128-byte preamble, `DICM` magic
//! code, and group `0002` elements that precede every Part-10 DICOM file,
//! per PS3.10 chapter 7.

use std::io::{Read, Write};

use dicom_core::header::{DataElementHeader, Length, Tag};
use dicom_core::VR;
use dicom_encoding::decode::{Decode, ExplicitVRDecoder};
use dicom_encoding::encode::{Encode, ExplicitVREncoder};

pub use crate::error::MetaTableError as Error;

const PREAMBLE_LEN: usize = 128;
const MAGIC: &[u8; 4] = b"DICM";

/// Group `0002` (File Meta Information) parsed out of a Part-10 file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetaTable {
    pub media_storage_sop_class_uid: String,
    pub media_storage_sop_instance_uid: String,
    pub transfer_syntax: String,
    pub implementation_class_uid: String,
    pub implementation_version_name: Option<String>,
    pub source_application_entity_title: Option<String>,
    pub information_version: [u8; 2],
}

impl FileMetaTable {
    /// Read the preamble, magic code, and file meta group from `from`. The
    /// group is always Explicit VR Little Endian, regardless of the
    /// transfer syntax it names for the remainder of the file.
    pub fn from_reader<R: Read>(mut from: R) -> Result<Self, Error> {
        let mut preamble = [0u8; PREAMBLE_LEN];
        from.read_exact(&mut preamble)?;
        let mut magic = [0u8; 4];
        from.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(Error::NotDicom);
        }

        let decoder = ExplicitVRDecoder::little_endian();
        let dict = dicom_dictionary_std::StandardDataDictionary;

        // group length element: (0002,0000) UL 4
        let mut header_buf = [0u8; 8];
        from.read_exact(&mut header_buf)?;
        let (header, _) = decoder
            .decode_header(&header_buf, &dict)
            .map_err(|source| Error::Decode { source })?;
        let mut group_len_buf = vec![0u8; header.len.0 as usize];
        from.read_exact(&mut group_len_buf)?;
        let group_length = decoder
            .decode_primitive(&group_len_buf, header.vr)
            .map_err(|source| Error::Decode { source })?
            .to_int()
            .unwrap_or(0) as usize;

        let mut group_bytes = vec![0u8; group_length];
        from.read_exact(&mut group_bytes)?;

        let mut builder = FileMetaTableBuilder::new();
        let mut pos = 0;
        while pos + 8 <= group_bytes.len() {
            let (header, consumed) = decoder
                .decode_header(&group_bytes[pos..], &dict)
                .map_err(|source| Error::Decode { source })?;
            pos += consumed;
            let len = header.len.0 as usize;
            if pos + len > group_bytes.len() {
                break;
            }
            let value = decoder
                .decode_primitive(&group_bytes[pos..pos + len], header.vr)
                .map_err(|source| Error::Decode { source })?;
            pos += len;

            match header.tag {
                Tag(0x0002, 0x0002) => {
                    builder.media_storage_sop_class_uid =
                        value.to_str().ok().map(|s| s.trim_end_matches('\0').to_string());
                }
                Tag(0x0002, 0x0003) => {
                    builder.media_storage_sop_instance_uid =
                        value.to_str().ok().map(|s| s.trim_end_matches('\0').to_string());
                }
                Tag(0x0002, 0x0010) => {
                    builder.transfer_syntax =
                        value.to_str().ok().map(|s| s.trim_end_matches('\0').to_string());
                }
                Tag(0x0002, 0x0012) => {
                    builder.implementation_class_uid =
                        value.to_str().ok().map(|s| s.trim_end_matches('\0').to_string());
                }
                Tag(0x0002, 0x0013) => {
                    builder.implementation_version_name =
                        value.to_str().ok().map(|s| s.trim_end_matches('\0').to_string());
                }
                Tag(0x0002, 0x0016) => {
                    builder.source_application_entity_title =
                        value.to_str().ok().map(|s| s.trim_end_matches('\0').to_string());
                }
                _ => {}
            }
        }

        builder.build()
    }

    /// Write the preamble, magic code, and file meta group to `to`.
    pub fn write_to<W: Write>(&self, mut to: W) -> Result<(), Error> {
        to.write_all(&[0u8; PREAMBLE_LEN])?;
        to.write_all(MAGIC)?;

        let encoder = ExplicitVREncoder::little_endian();
        let mut group_bytes = Vec::new();

        write_str_element(
            &encoder,
            &mut group_bytes,
            Tag(0x0002, 0x0002),
            VR::UI,
            &self.media_storage_sop_class_uid,
        )?;
        write_str_element(
            &encoder,
            &mut group_bytes,
            Tag(0x0002, 0x0003),
            VR::UI,
            &self.media_storage_sop_instance_uid,
        )?;
        write_str_element(
            &encoder,
            &mut group_bytes,
            Tag(0x0002, 0x0010),
            VR::UI,
            &self.transfer_syntax,
        )?;
        write_str_element(
            &encoder,
            &mut group_bytes,
            Tag(0x0002, 0x0012),
            VR::UI,
            &self.implementation_class_uid,
        )?;
        if let Some(v) = &self.implementation_version_name {
            write_str_element(&encoder, &mut group_bytes, Tag(0x0002, 0x0013), VR::SH, v)?;
        }
        if let Some(v) = &self.source_application_entity_title {
            write_str_element(&encoder, &mut group_bytes, Tag(0x0002, 0x0016), VR::AE, v)?;
        }

        let group_len_header =
            DataElementHeader::new(Tag(0x0002, 0x0000), VR::UL, Length(4));
        encoder
            .encode_header(&mut to, &group_len_header)
            .map_err(|source| Error::Encode { source })?;
        let len = group_bytes.len() as u32;
        to.write_all(&len.to_le_bytes())?;
        to.write_all(&group_bytes)?;
        Ok(())
    }
}

fn write_str_element(
    encoder: &ExplicitVREncoder,
    to: &mut Vec<u8>,
    tag: Tag,
    vr: VR,
    value: &str,
) -> Result<(), Error> {
    let mut padded = value.to_string();
    if padded.len() % 2 != 0 {
        padded.push(if vr == VR::UI { '\0' } else { ' ' });
    }
    let header = DataElementHeader::new(tag, vr, Length(padded.len() as u32));
    encoder
        .encode_header(to, &header)
        .map_err(|source| Error::Encode { source })?;
    to.extend_from_slice(padded.as_bytes());
    Ok(())
}

/// Builder for a [`FileMetaTable`], mirroring the handful of fields that
/// `storescp`-style services must fill in for every stored instance.
#[derive(Debug, Clone, Default)]
pub struct FileMetaTableBuilder {
    media_storage_sop_class_uid: Option<String>,
    media_storage_sop_instance_uid: Option<String>,
    transfer_syntax: Option<String>,
    implementation_class_uid: Option<String>,
    implementation_version_name: Option<String>,
    source_application_entity_title: Option<String>,
}

/// This workspace's PACS implementation class UID, distinct from any
/// vendor's real registration -- used only to identify the writer of files
/// this workspace produces.
pub const IMPLEMENTATION_CLASS_UID: &str = "1.2.826.0.1.3680043.9.9999.1";
pub const IMPLEMENTATION_VERSION_NAME: &str = "PACSRS_001";

impl FileMetaTableBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn media_storage_sop_class_uid(mut self, uid: impl Into<String>) -> Self {
        self.media_storage_sop_class_uid = Some(uid.into());
        self
    }

    pub fn media_storage_sop_instance_uid(mut self, uid: impl Into<String>) -> Self {
        self.media_storage_sop_instance_uid = Some(uid.into());
        self
    }

    pub fn transfer_syntax(mut self, uid: impl Into<String>) -> Self {
        self.transfer_syntax = Some(uid.into());
        self
    }

    pub fn build(self) -> Result<FileMetaTable, Error> {
        Ok(FileMetaTable {
            media_storage_sop_class_uid: self
                .media_storage_sop_class_uid
                .ok_or(Error::MissingElement {
                    keyword: "MediaStorageSOPClassUID",
                })?,
            media_storage_sop_instance_uid: self.media_storage_sop_instance_uid.ok_or(
                Error::MissingElement {
                    keyword: "MediaStorageSOPInstanceUID",
                },
            )?,
            transfer_syntax: self.transfer_syntax.ok_or(Error::MissingElement {
                keyword: "TransferSyntaxUID",
            })?,
            implementation_class_uid: self
                .implementation_class_uid
                .unwrap_or_else(|| IMPLEMENTATION_CLASS_UID.to_string()),
            implementation_version_name: self
                .implementation_version_name
                .or_else(|| Some(IMPLEMENTATION_VERSION_NAME.to_string())),
            source_application_entity_title: self.source_application_entity_title,
            information_version: [0, 1],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let table = FileMetaTableBuilder::new()
            .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.7")
            .media_storage_sop_instance_uid("1.2.3.4.5")
            .transfer_syntax("1.2.840.10008.1.2.1")
            .build()
            .unwrap();

        let mut buf = Vec::new();
        table.write_to(&mut buf).unwrap();

        let read_back = FileMetaTable::from_reader(buf.as_slice()).unwrap();
        assert_eq!(read_back.media_storage_sop_class_uid, "1.2.840.10008.5.1.4.1.1.7");
        assert_eq!(read_back.transfer_syntax, "1.2.840.10008.1.2.1");
        assert_eq!(read_back.implementation_class_uid, IMPLEMENTATION_CLASS_UID);
    }

    #[test]
    fn missing_magic_code_is_rejected() {
        let bytes = vec![0u8; 132];
        let err = FileMetaTable::from_reader(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, Error::NotDicom));
    }
}
