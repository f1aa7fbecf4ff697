//! The DICOM upper layer protocol (PS3.8): PDU definitions and codec,
//! DIMSE command field vocabulary, and the association state machine used
//! by both association-requestor and association-acceptor roles.

pub mod address;
pub mod association;
pub mod pdu;

pub use address::{AeAddr, FullAeAddr};
pub use association::client::{ClientAssociation, ClientAssociationOptions};
pub use association::server::{ServerAssociation, ServerAssociationOptions};
pub use association::State;
pub use pdu::{read_pdu, write_pdu, Pdu};

/// This workspace's upper-layer implementation class UID, distinct from
/// any vendor's real registration -- used only to identify associations
/// negotiated by this implementation.
pub const IMPLEMENTATION_CLASS_UID: &str = "1.2.826.0.1.3680043.9.9999.2";
pub const IMPLEMENTATION_VERSION_NAME: &str = "PACSRS_001";
