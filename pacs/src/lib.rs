//! A complete PACS node built on top of [`dicom_ul`] (association
//! negotiation) and [`dicom_dimse`] (the message-service layer):
//!
//! - [`runtime`] accepts incoming associations and runs one worker per
//!   live association against a set of registered service handlers.
//! - [`client`] is the requestor-side counterpart, with one convenience
//!   method per DIMSE-C operation.
//! - [`archive`] stores and retrieves DICOM Part-10 files under a
//!   configurable naming scheme.
//! - [`index`] keeps a patient/study/series/instance metadata index over
//!   an archive, searchable with PS3.4 matching rules.
//! - [`qr`] wires an [`index::Index`] and [`archive::Archive`] together
//!   into C-FIND/C-MOVE/C-GET [`dicom_dimse::ServiceHandler`]s.

pub mod archive;
pub mod client;
pub mod index;
pub mod qr;
pub mod runtime;

pub use archive::Archive;
pub use client::{ClientError, PacsClient};
pub use index::{Index, QueryLevel};
pub use qr::{FindHandler, GetHandler, MoveHandler, StorageHandler};
pub use runtime::{Server, ServerConfig, ServerStatsSnapshot};
