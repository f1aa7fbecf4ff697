//! Errors produced while reading, writing, or accessing DICOM objects.

use snafu::Snafu;

use dicom_core::Tag;

/// Errors that can occur when reading a data set or a Part-10 file.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ReadError {
    #[snafu(display("could not read file meta group"))]
    ReadFileMeta { source: MetaTableError },
    #[snafu(display("unsupported transfer syntax `{}`", uid))]
    UnsupportedTransferSyntax { uid: String },
    #[snafu(display("could not decode data element header"))]
    DecodeHeader {
        source: dicom_encoding::DecodeError,
    },
    #[snafu(display("could not decode value for tag {}", tag))]
    DecodeValue {
        tag: Tag,
        source: dicom_encoding::DecodeError,
    },
    #[snafu(display("premature end of data set"))]
    PrematureEnd,
    #[snafu(display("I/O error while reading data set"))]
    Io { source: std::io::Error },
}

impl From<std::io::Error> for ReadError {
    fn from(source: std::io::Error) -> Self {
        ReadError::Io { source }
    }
}

/// Errors that can occur when writing a data set or a Part-10 file.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum WriteError {
    #[snafu(display("could not write file meta group"))]
    WriteFileMeta { source: MetaTableError },
    #[snafu(display("could not encode value for tag {}", tag))]
    EncodeValue {
        tag: Tag,
        source: dicom_encoding::EncodeError,
    },
    #[snafu(display("I/O error while writing data set"))]
    Io { source: std::io::Error },
}

impl From<std::io::Error> for WriteError {
    fn from(source: std::io::Error) -> Self {
        WriteError::Io { source }
    }
}

impl From<dicom_encoding::EncodeError> for WriteError {
    fn from(source: dicom_encoding::EncodeError) -> Self {
        match source {
            dicom_encoding::EncodeError::Io { source } => WriteError::Io { source },
            other => WriteError::EncodeValue {
                tag: Tag(0, 0),
                source: other,
            },
        }
    }
}

/// Error returned when a private attribute cannot be resolved.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum PrivateElementError {
    #[snafu(display("no private creator registered under group {:04X}", group))]
    NoPrivateCreator { group: u16 },
}

/// Errors produced by element accessors (`element`, `element_by_name`, ...).
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum AccessError {
    #[snafu(display("no such element {}", tag))]
    NoSuchElement { tag: Tag },
    #[snafu(display("no such element with keyword `{}`", name))]
    NoSuchElementByName { name: String },
    #[snafu(display("could not convert value of {}", tag))]
    ConvertValue {
        tag: Tag,
        source: dicom_core::ConvertValueError,
    },
}

/// Errors produced when building or validating a [`crate::meta::FileMetaTable`].
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum MetaTableError {
    #[snafu(display("missing required file meta element `{}`", keyword))]
    MissingElement { keyword: &'static str },
    #[snafu(display("`DICM` magic code not found at byte offset 128"))]
    NotDicom,
    #[snafu(display("I/O error while reading/writing file meta group"))]
    Io { source: std::io::Error },
    #[snafu(display("could not decode file meta group element"))]
    Decode {
        source: dicom_encoding::DecodeError,
    },
    #[snafu(display("could not encode file meta group element"))]
    Encode {
        source: dicom_encoding::EncodeError,
    },
}

impl From<std::io::Error> for MetaTableError {
    fn from(source: std::io::Error) -> Self {
        MetaTableError::Io { source }
    }
}
