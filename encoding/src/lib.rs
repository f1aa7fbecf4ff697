//! Low-level, stateless codecs for DICOM data element headers, primitive
//! values, and transfer syntax dispatch.
//!
//! This crate deliberately does not know about datasets or sequences: a
//! [`decode::Decode`] only ever reads one header or one primitive value from
//! a byte window handed to it by the caller. Walking a dataset tree
//! (recursing into sequence items) is the responsibility of the `object`
//! crate, which avoids a dependency cycle between encoding and the
//! in-memory object model.

pub mod decode;
pub mod encode;
pub mod error;
pub mod text;
pub mod transfer_syntax;

#[cfg(feature = "inventory-registry")]
pub mod registry;

pub use decode::Decode;
pub use encode::Encode;
pub use error::{DecodeError, EncodeError, EncodeResult, Result};
pub use text::SpecificCharacterSet;
pub use transfer_syntax::{TransferSyntax, TransferSyntaxIndex};
