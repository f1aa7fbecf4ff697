//! Whole-file (preamble + meta group + data set) reading and writing.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use dicom_dictionary_std::StandardDataDictionary;
use dicom_transfer_syntax_registry::TransferSyntaxRegistry;

use crate::error::{ReadError, WriteError};
use crate::mem::InMemDicomObject;
use crate::meta::FileMetaTable;

/// A DICOM object paired with the file meta information that must precede
/// it on disk: the result of reading, or the input to writing, a Part-10
/// file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileDicomObject<O> {
    meta: FileMetaTable,
    obj: O,
}

/// The default, fully in-memory DICOM object produced by reading a file.
pub type DefaultDicomObject = FileDicomObject<InMemDicomObject<StandardDataDictionary>>;

impl<O> FileDicomObject<O> {
    pub fn meta(&self) -> &FileMetaTable {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut FileMetaTable {
        &mut self.meta
    }

    pub fn into_inner(self) -> O {
        self.obj
    }

    pub fn inner(&self) -> &O {
        &self.obj
    }
}

impl std::ops::Deref for DefaultDicomObject {
    type Target = InMemDicomObject<StandardDataDictionary>;

    fn deref(&self) -> &Self::Target {
        &self.obj
    }
}

impl std::ops::DerefMut for DefaultDicomObject {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.obj
    }
}

impl InMemDicomObject<StandardDataDictionary> {
    /// Pair this object with an already-built file meta table, without
    /// re-deriving it from the object's own elements.
    pub fn with_exact_meta(self, meta: FileMetaTable) -> DefaultDicomObject {
        FileDicomObject { meta, obj: self }
    }

    /// Read a whole Part-10 file: preamble, magic code, file meta group, and
    /// data set, resolving the transfer syntax from the meta group.
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<DefaultDicomObject, ReadError> {
        let file = File::open(path)?;
        DefaultDicomObject::from_reader(BufReader::new(file))
    }
}

impl DefaultDicomObject {
    /// Read a whole Part-10 stream: preamble, magic code, file meta group,
    /// and data set.
    pub fn from_reader<R: Read>(mut from: R) -> Result<Self, ReadError> {
        let meta = FileMetaTable::from_reader(&mut from)
            .map_err(|source| ReadError::ReadFileMeta { source })?;
        let ts = TransferSyntaxRegistry
            .get(&meta.transfer_syntax)
            .ok_or_else(|| ReadError::UnsupportedTransferSyntax {
                uid: meta.transfer_syntax.clone(),
            })?;
        let obj = if meta.transfer_syntax == dicom_dictionary_std::uids::DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN
        {
            let mut inflater = flate2::read::DeflateDecoder::new(from);
            InMemDicomObject::read_dataset_with_ts(&mut inflater, ts)?
        } else {
            InMemDicomObject::read_dataset_with_ts(from, ts)?
        };
        Ok(FileDicomObject { meta, obj })
    }

    /// Write the preamble, magic code, file meta group, and data set to
    /// `to`.
    pub fn write_all<W: Write>(&self, mut to: W) -> Result<(), WriteError> {
        self.write_meta(&mut to)?;
        self.write_dataset(&mut to)
    }

    /// Write only the preamble, magic code, and file meta group.
    pub fn write_meta<W: Write>(&self, to: W) -> Result<(), WriteError> {
        self.meta
            .write_to(to)
            .map_err(|source| WriteError::WriteFileMeta { source })
    }

    /// Write only the data set, using the transfer syntax named by this
    /// object's own meta group.
    pub fn write_dataset<W: Write>(&self, to: W) -> Result<(), WriteError> {
        let ts = TransferSyntaxRegistry
            .get(&self.meta.transfer_syntax)
            .expect("meta group carries a transfer syntax accepted at read time");
        self.obj.write_dataset_with_ts(to, ts)
    }

    /// Write the whole file to a path, truncating/creating as needed.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), WriteError> {
        let file = File::create(path)?;
        self.write_all(BufWriter::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::FileMetaTableBuilder;
    use dicom_core::{dicom_value, DataElement, VR};
    use dicom_dictionary_std::tags;

    #[test]
    fn writes_and_reads_back_a_minimal_object() {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(DataElement::new(
            tags::PATIENT_NAME,
            VR::PN,
            dicom_value!(Str, "Doe^John"),
        ));
        let meta = FileMetaTableBuilder::new()
            .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.7")
            .media_storage_sop_instance_uid("1.2.3.4.5.6")
            .transfer_syntax("1.2.840.10008.1.2.1")
            .build()
            .unwrap();
        let file_obj = obj.with_exact_meta(meta);

        let mut buf = Vec::new();
        file_obj.write_all(&mut buf).unwrap();

        let read_back = DefaultDicomObject::from_reader(buf.as_slice()).unwrap();
        assert_eq!(
            read_back.element(tags::PATIENT_NAME).unwrap().to_str().unwrap(),
            "Doe^John"
        );
    }
}
