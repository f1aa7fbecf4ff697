//! Errors produced while decoding or encoding DICOM data elements.

use snafu::Snafu;

/// Errors produced by a [`crate::decode::Decode`] implementation.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum DecodeError {
    #[snafu(display("could not read {} more byte(s)", needed))]
    Io {
        needed: usize,
        source: std::io::Error,
    },
    #[snafu(display("truncated element: needed {} byte(s), window has {}", needed, available))]
    Truncated { needed: usize, available: usize },
    #[snafu(display("odd length {} for fixed-width VR {:?}", len, vr))]
    OddLength { len: u32, vr: dicom_core::VR },
    #[snafu(display("unrecognized value representation mnemonic `{}{}` ", b0, b1))]
    UnknownVr { b0: char, b1: char },
    #[snafu(display("sequence delimiter appeared where an item header was expected"))]
    UnexpectedDelimiter,
    #[snafu(display("text could not be decoded as {}", charset))]
    TextDecode { charset: &'static str },
}

pub type Result<T, E = DecodeError> = std::result::Result<T, E>;

/// Errors produced by a [`crate::encode::Encode`] implementation.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum EncodeError {
    #[snafu(display("I/O error while encoding"))]
    Io { source: std::io::Error },
    #[snafu(display(
        "value multiplicity {} outside of allowed range for this tag",
        count
    ))]
    ValueMultiplicity { count: u32 },
}

pub type EncodeResult<T, E = EncodeError> = std::result::Result<T, E>;

impl From<std::io::Error> for EncodeError {
    fn from(source: std::io::Error) -> Self {
        EncodeError::Io { source }
    }
}
