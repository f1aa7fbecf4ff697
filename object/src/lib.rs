//! In-memory DICOM objects: the tree-shaped representation of a data set,
//! file meta information handling, and whole-file (Part-10) reading and
//! writing.
//!
//! This crate absorbs what the wider DICOM ecosystem usually splits into a
//! separate mid-level "parser" crate: [`mem`] walks the object tree itself,
//! calling into `dicom-encoding`'s stateless header/value codecs one
//! element at a time. That keeps `dicom-encoding` free of any dependency on
//! the object model it ultimately serializes.

pub mod error;
pub mod file;
pub mod mem;
pub mod meta;

pub use dicom_dictionary_std::StandardDataDictionary;

pub use error::{AccessError, MetaTableError, PrivateElementError, ReadError, WriteError};
pub use file::{DefaultDicomObject, FileDicomObject};
pub use mem::{InMemDicomObject, InMemElement};
pub use meta::{FileMetaTable, FileMetaTableBuilder, IMPLEMENTATION_CLASS_UID, IMPLEMENTATION_VERSION_NAME};
