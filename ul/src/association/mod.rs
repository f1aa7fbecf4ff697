//! Association establishment and lifecycle: the upper layer state machine
//! built on top of [`crate::pdu`].

pub mod client;
pub mod server;

pub use client::{ClientAssociation, ClientAssociationOptions};
pub use server::{AcceptAny, AcceptCalledAeTitle, AccessControl, ServerAssociation, ServerAssociationOptions};

/// The lifecycle state of an association, from either side.
///
/// The reference upper-layer implementation distinguishes states only by
/// which Rust type a caller happens to hold (a `ClientAssociationOptions`
/// versus an established `ClientAssociation`, say); this workspace instead
/// keeps an explicit, inspectable `State` alongside each association value
/// so that a caller -- or a test -- can assert on it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// The TCP transport is open but no association has been negotiated.
    Idle,
    /// (Requestor) An A-ASSOCIATE-RQ has been sent; its A-ASSOCIATE-AC/RJ
    /// is awaited. Negotiation currently runs to completion inside
    /// [`client::ClientAssociationOptions::establish`], so no requestor
    /// ever observes this state from the outside -- it exists so the
    /// full PS3.8 state machine stays representable.
    AwaitingAssociateAC,
    /// (Acceptor) A TCP connection has arrived; its A-ASSOCIATE-RQ is
    /// awaited. Negotiation currently runs to completion inside
    /// [`server::ServerAssociationOptions::establish`], so no acceptor
    /// ever observes this state from the outside, for the same reason.
    AwaitingAssociateRQ,
    /// An A-ASSOCIATE-RQ has been sent (client) or an A-ASSOCIATE-AC sent
    /// back (server); the association is ready for data transfer.
    Established,
    /// An A-RELEASE-RQ has been sent or received; only the matching
    /// release reply is expected before the transport closes.
    Releasing,
    /// (Requestor) An A-RELEASE-RQ has been sent; the acceptor's
    /// A-RELEASE-RP is awaited.
    AwaitingReleaseRP,
    /// (Acceptor) An A-RELEASE-RQ has been received and an A-RELEASE-RP
    /// sent back; the requestor's transport close is awaited.
    AwaitingReleaseRQResponse,
    /// The association ended by A-ABORT, sent or received.
    Aborted,
    /// The association ended gracefully (A-RELEASE).
    Closed,
}
