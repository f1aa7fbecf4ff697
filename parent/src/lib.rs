//! # DICOM-rs library
//!
//! This crate serves as a parent for the library crates making up a PACS
//! protocol stack.
//!
//! This library aggregates the key modules you are likely to need when
//! building DICOM-compliant network software. Each module is also available
//! as its own crate, which can be fetched independently of this facade; the
//! umbrella crates generally carry the `dicom-` prefix (e.g. the [`object`]
//! module lives in `dicom-object`).
//!
//! ## Basic
//!
//! - For an idiomatic API to reading and writing DICOM data from files or
//!   other sources, see the [`object`] module.
//! - To print human-readable summaries of a DICOM object, see the [`dump`]
//!   module.
//! - The [`core`] crate contains most of the data types the other crates
//!   rely on, including DICOM tags ([`Tag`](dicom_core::Tag)), value
//!   representations ([`VR`](dicom_core::VR)), and in-memory value
//!   representations ([`DicomValue`](dicom_core::DicomValue)). The
//!   [`dicom_value!`] macro is re-exported here as well.
//! - The standard data dictionary is in [`dictionary_std`], which provides
//!   a queryable tag index and constants for known tags in its
//!   [`tags`][dictionary_std::tags] module.
//! - [`transfer_syntax`] re-exports the transfer syntax registry.
//!
//! ## Advanced
//!
//! - To write DICOM network application-entity software, see the [`ul`]
//!   module for PDU reading/writing and the association state machine, and
//!   [`dimse`] for the message-service layer built on top of it.
//! - [`pacs`] wires those together into a complete storage/query-retrieve
//!   node: association-serving runtime, client convenience API, file
//!   archive, and metadata index.
//! - If you are writing or declaring your own transfer syntax, take the
//!   [`encoding`] module and build your own
//!   [`TransferSyntax`](dicom_encoding::TransferSyntax) implementation.

pub use dicom_core as core;
pub use dicom_dictionary_std as dictionary_std;
pub use dicom_dump as dump;
pub use dicom_encoding as encoding;
pub use dicom_object as object;
pub use dicom_transfer_syntax_registry as transfer_syntax;

#[cfg(feature = "ul")]
pub use dicom_ul as ul;
#[cfg(feature = "dimse")]
pub use dicom_dimse as dimse;
#[cfg(feature = "pacs")]
pub use dicom_pacs as pacs;

pub use dicom_core::dicom_value;
