//! The association-requestor (typically SCU) side of the state machine.

use std::borrow::Cow;
use std::net::{TcpStream, ToSocketAddrs};

use snafu::{ensure, OptionExt, ResultExt, Snafu};

use crate::pdu::{
    read_pdu, write_pdu, AssociationRJResult, AssociationRJSource, Pdu,
    PresentationContextProposed, PresentationContextResultReason, RoleSelection, UserVariableItem,
    DEFAULT_MAX_PDU,
};

use super::State;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("missing abstract syntax to begin negotiation"))]
    MissingAbstractSyntax,
    #[snafu(display("could not connect to {}", address))]
    Connect { address: String, source: std::io::Error },
    #[snafu(display("failed to send association request"))]
    SendRequest { source: crate::pdu::WriteError },
    #[snafu(display("failed to receive association response"))]
    ReceiveResponse { source: crate::pdu::ReadError },
    #[snafu(display("unexpected response from acceptor: {:?}", pdu))]
    UnexpectedResponse { pdu: Pdu },
    #[snafu(display("protocol version mismatch: expected {}, got {}", expected, got))]
    ProtocolVersionMismatch { expected: u16, got: u16 },
    #[snafu(display("association rejected"))]
    Rejected {
        result: AssociationRJResult,
        source_: AssociationRJSource,
    },
    #[snafu(display("no presentation context was accepted by the acceptor"))]
    NoAcceptedPresentationContexts,
    #[snafu(display("failed to send PDU"))]
    Send { source: crate::pdu::WriteError },
    #[snafu(display("failed to receive PDU"))]
    Receive { source: crate::pdu::ReadError },
    #[snafu(display("association is not established (state = {:?})", state))]
    NotEstablished { state: State },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// One abstract syntax requested for negotiation, with the transfer
/// syntaxes offered for it and (for C-GET, where this node also acts as
/// the storage SCP) whether the SCP role is requested too.
#[derive(Debug, Clone)]
struct RequestedContext {
    abstract_syntax: Cow<'static, str>,
    request_scp_role: bool,
}

/// Builder for a requestor-side association. See [`ClientAssociation`] for
/// the value produced once negotiation succeeds.
#[derive(Debug, Clone)]
pub struct ClientAssociationOptions {
    calling_ae_title: Cow<'static, str>,
    called_ae_title: Cow<'static, str>,
    application_context_name: Cow<'static, str>,
    abstract_syntaxes: Vec<RequestedContext>,
    transfer_syntax_uids: Vec<Cow<'static, str>>,
    protocol_version: u16,
    max_pdu_length: u32,
}

impl Default for ClientAssociationOptions {
    fn default() -> Self {
        ClientAssociationOptions {
            calling_ae_title: "THIS-SCU".into(),
            called_ae_title: "ANY-SCP".into(),
            application_context_name: "1.2.840.10008.3.1.1.1".into(),
            abstract_syntaxes: Vec::new(),
            transfer_syntax_uids: Vec::new(),
            protocol_version: 1,
            max_pdu_length: DEFAULT_MAX_PDU,
        }
    }
}

impl ClientAssociationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calling_ae_title<T: Into<Cow<'static, str>>>(mut self, title: T) -> Self {
        self.calling_ae_title = title.into();
        self
    }

    pub fn called_ae_title<T: Into<Cow<'static, str>>>(mut self, title: T) -> Self {
        self.called_ae_title = title.into();
        self
    }

    pub fn with_abstract_syntax<T: Into<Cow<'static, str>>>(mut self, uid: T) -> Self {
        self.abstract_syntaxes.push(RequestedContext {
            abstract_syntax: uid.into(),
            request_scp_role: false,
        });
        self
    }

    /// Propose this abstract syntax, additionally requesting that this
    /// node be granted the SCP role for it -- required for the C-GET
    /// service, where the requestor also receives C-STORE sub-operations
    /// over the same association.
    pub fn with_abstract_syntax_as_scp<T: Into<Cow<'static, str>>>(mut self, uid: T) -> Self {
        self.abstract_syntaxes.push(RequestedContext {
            abstract_syntax: uid.into(),
            request_scp_role: true,
        });
        self
    }

    pub fn with_transfer_syntax<T: Into<Cow<'static, str>>>(mut self, uid: T) -> Self {
        self.transfer_syntax_uids.push(uid.into());
        self
    }

    pub fn max_pdu_length(mut self, value: u32) -> Self {
        self.max_pdu_length = value;
        self
    }

    /// Connect to `address` and negotiate an association.
    pub fn establish<A: ToSocketAddrs + ToString>(self, address: A) -> Result<ClientAssociation> {
        ensure!(!self.abstract_syntaxes.is_empty(), MissingAbstractSyntaxSnafu);

        let mut transfer_syntax_uids = self.transfer_syntax_uids.clone();
        if transfer_syntax_uids.is_empty() {
            transfer_syntax_uids.push("1.2.840.10008.1.2.1".into());
            transfer_syntax_uids.push("1.2.840.10008.1.2".into());
        }

        let presentation_contexts: Vec<_> = self
            .abstract_syntaxes
            .iter()
            .enumerate()
            .map(|(i, ctx)| PresentationContextProposed {
                id: (i * 2 + 1) as u8,
                abstract_syntax: ctx.abstract_syntax.to_string(),
                transfer_syntaxes: transfer_syntax_uids.iter().map(|s| s.to_string()).collect(),
            })
            .collect();

        let mut user_variables = vec![crate::pdu::UserVariableItem::MaxLength(self.max_pdu_length)];
        for ctx in &self.abstract_syntaxes {
            if ctx.request_scp_role {
                user_variables.push(UserVariableItem::SopClassRoleSelection {
                    uid: ctx.abstract_syntax.to_string(),
                    role: RoleSelection {
                        scu_role_supported: true,
                        scp_role_supported: true,
                    },
                });
            }
        }

        let request = Pdu::AssociationRQ {
            protocol_version: self.protocol_version,
            calling_ae_title: self.calling_ae_title.to_string(),
            called_ae_title: self.called_ae_title.to_string(),
            application_context_name: self.application_context_name.to_string(),
            presentation_contexts: presentation_contexts.clone(),
            user_variables,
        };

        let address_string = address.to_string();
        let mut socket = TcpStream::connect(address).context(ConnectSnafu {
            address: address_string,
        })?;

        write_pdu(&mut socket, &request).context(SendRequestSnafu)?;
        let response = read_pdu(&mut socket, self.max_pdu_length).context(ReceiveResponseSnafu)?;

        match response {
            Pdu::AssociationAC {
                protocol_version,
                presentation_contexts: accorded,
                ref user_variables,
                ..
            } => {
                ensure!(
                    protocol_version == self.protocol_version,
                    ProtocolVersionMismatchSnafu {
                        expected: self.protocol_version,
                        got: protocol_version,
                    }
                );

                let accepted = accorded
                    .into_iter()
                    .find(|c| c.reason == PresentationContextResultReason::Acceptance)
                    .context(NoAcceptedPresentationContextsSnafu)?;

                let proposed = presentation_contexts
                    .into_iter()
                    .find(|c| c.id == accepted.id)
                    .context(NoAcceptedPresentationContextsSnafu)?;

                let peer_max_pdu_length = user_variables
                    .iter()
                    .find_map(|v| match v {
                        UserVariableItem::MaxLength(length) => Some(*length),
                        _ => None,
                    })
                    .unwrap_or(DEFAULT_MAX_PDU);

                Ok(ClientAssociation {
                    state: State::Established,
                    presentation_context_id: accepted.id,
                    abstract_syntax_uid: proposed.abstract_syntax,
                    transfer_syntax_uid: accepted.transfer_syntax,
                    max_pdu_length: self.max_pdu_length,
                    peer_max_pdu_length,
                    socket,
                })
            }
            Pdu::AssociationRJ { result, source } => RejectedSnafu {
                result,
                source_: source,
            }
            .fail(),
            pdu => UnexpectedResponseSnafu { pdu }.fail(),
        }
    }
}

/// A negotiated association from the requestor's perspective.
#[derive(Debug)]
pub struct ClientAssociation {
    state: State,
    abstract_syntax_uid: String,
    transfer_syntax_uid: String,
    presentation_context_id: u8,
    max_pdu_length: u32,
    /// The acceptor's advertised maximum PDU length, read from its
    /// A-ASSOCIATE-AC user information (falls back to
    /// [`DEFAULT_MAX_PDU`] if the acceptor did not declare one).
    peer_max_pdu_length: u32,
    socket: TcpStream,
}

impl ClientAssociation {
    pub fn state(&self) -> State {
        self.state
    }

    pub fn presentation_context_id(&self) -> u8 {
        self.presentation_context_id
    }

    pub fn abstract_syntax_uid(&self) -> &str {
        &self.abstract_syntax_uid
    }

    pub fn transfer_syntax_uid(&self) -> &str {
        &self.transfer_syntax_uid
    }

    /// The acceptor's advertised maximum PDU length, i.e. the largest
    /// PDU this requestor may send it.
    pub fn peer_max_pdu_length(&self) -> u32 {
        self.peer_max_pdu_length
    }

    pub fn send(&mut self, pdu: &Pdu) -> Result<()> {
        ensure!(self.state == State::Established, NotEstablishedSnafu { state: self.state });
        write_pdu(&mut self.socket, pdu).context(SendSnafu)
    }

    pub fn receive(&mut self) -> Result<Pdu> {
        ensure!(self.state == State::Established, NotEstablishedSnafu { state: self.state });
        read_pdu(&mut self.socket, self.max_pdu_length).context(ReceiveSnafu)
    }

    /// Gracefully release the association.
    pub fn release(&mut self) -> Result<()> {
        if self.state != State::Established {
            return Ok(());
        }
        self.state = State::Releasing;
        write_pdu(&mut self.socket, &Pdu::ReleaseRQ).context(SendSnafu)?;
        let pdu = read_pdu(&mut self.socket, self.max_pdu_length).context(ReceiveSnafu)?;
        self.state = State::Closed;
        match pdu {
            Pdu::ReleaseRP => {
                let _ = self.socket.shutdown(std::net::Shutdown::Both);
                Ok(())
            }
            pdu => UnexpectedResponseSnafu { pdu }.fail(),
        }
    }

    /// Abort the association on this node's own initiative, e.g. after a
    /// per-message deadline elapses. Sends an A-ABORT and closes the
    /// transport.
    pub fn abort(&mut self, source: crate::pdu::AbortRQSource) -> Result<()> {
        if matches!(self.state, State::Aborted | State::Closed) {
            return Ok(());
        }
        self.state = State::Aborted;
        let result = write_pdu(&mut self.socket, &Pdu::AbortRQ { source }).context(SendSnafu);
        let _ = self.socket.shutdown(std::net::Shutdown::Both);
        result
    }

    /// Record that the peer aborted the association (A-ABORT received).
    /// No reply is sent, per PS3.8 Section 9.3.8; the transport is closed.
    pub fn note_peer_abort(&mut self) {
        self.state = State::Aborted;
        let _ = self.socket.shutdown(std::net::Shutdown::Both);
    }
}

impl Drop for ClientAssociation {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
