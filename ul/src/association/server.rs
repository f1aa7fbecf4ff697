//! The association-acceptor (typically SCP) side of the state machine.

use std::borrow::Cow;
use std::io::Write;
use std::net::TcpStream;

use snafu::{ensure, ResultExt, Snafu};

use crate::pdu::{
    read_pdu, write_pdu, AbortRQSource, AssociationRJResult, AssociationRJServiceUserReason,
    AssociationRJSource, Pdu, PresentationContextResult, PresentationContextResultReason,
    RoleSelection, UserIdentity, UserVariableItem, DEFAULT_MAX_PDU, MAXIMUM_PDU_SIZE,
};

use super::State;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("at least one abstract syntax must be registered, or promiscuous mode enabled"))]
    MissingAbstractSyntax,
    #[snafu(display("failed to receive association request"))]
    ReceiveRequest { source: crate::pdu::ReadError },
    #[snafu(display("failed to send association response"))]
    SendResponse { source: crate::pdu::WriteError },
    #[snafu(display("failed to send PDU over the wire"))]
    WireSend { source: std::io::Error },
    #[snafu(display("failed to send PDU"))]
    Send { source: crate::pdu::WriteError },
    #[snafu(display("failed to receive PDU"))]
    Receive { source: crate::pdu::ReadError },
    #[snafu(display("unexpected request from requestor: {:?}", pdu))]
    UnexpectedRequest { pdu: Pdu },
    #[snafu(display("association rejected during negotiation"))]
    Rejected,
    #[snafu(display("association is not established (state = {:?})", state))]
    NotEstablished { state: State },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A policy deciding whether to accept an incoming association request.
pub trait AccessControl {
    fn check_access(
        &self,
        this_ae_title: &str,
        calling_ae_title: &str,
        called_ae_title: &str,
        user_identity: Option<&UserIdentity>,
    ) -> std::result::Result<(), AssociationRJServiceUserReason>;
}

/// Accepts every incoming association request.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub struct AcceptAny;

impl AccessControl for AcceptAny {
    fn check_access(
        &self,
        _this: &str,
        _calling: &str,
        _called: &str,
        _identity: Option<&UserIdentity>,
    ) -> std::result::Result<(), AssociationRJServiceUserReason> {
        Ok(())
    }
}

/// Accepts only requests whose called AE title matches this node's own.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub struct AcceptCalledAeTitle;

impl AccessControl for AcceptCalledAeTitle {
    fn check_access(
        &self,
        this_ae_title: &str,
        _calling: &str,
        called_ae_title: &str,
        _identity: Option<&UserIdentity>,
    ) -> std::result::Result<(), AssociationRJServiceUserReason> {
        if this_ae_title == called_ae_title {
            Ok(())
        } else {
            Err(AssociationRJServiceUserReason::CalledAETitleNotRecognized)
        }
    }
}

/// Builder for an acceptor-side association, reusable across connections.
#[derive(Debug, Clone)]
pub struct ServerAssociationOptions<'a, A = AcceptAny> {
    ae_access_control: A,
    ae_title: Cow<'a, str>,
    application_context_name: Cow<'a, str>,
    abstract_syntax_uids: Vec<Cow<'a, str>>,
    transfer_syntax_uids: Vec<Cow<'a, str>>,
    protocol_version: u16,
    max_pdu_length: u32,
    promiscuous: bool,
}

impl<'a> Default for ServerAssociationOptions<'a, AcceptAny> {
    fn default() -> Self {
        ServerAssociationOptions {
            ae_access_control: AcceptAny,
            ae_title: "THIS-SCP".into(),
            application_context_name: "1.2.840.10008.3.1.1.1".into(),
            abstract_syntax_uids: Vec::new(),
            transfer_syntax_uids: Vec::new(),
            protocol_version: 1,
            max_pdu_length: DEFAULT_MAX_PDU,
            promiscuous: false,
        }
    }
}

impl<'a> ServerAssociationOptions<'a, AcceptAny> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<'a, A: AccessControl> ServerAssociationOptions<'a, A> {
    pub fn ae_access_control<P: AccessControl>(self, access_control: P) -> ServerAssociationOptions<'a, P> {
        ServerAssociationOptions {
            ae_access_control: access_control,
            ae_title: self.ae_title,
            application_context_name: self.application_context_name,
            abstract_syntax_uids: self.abstract_syntax_uids,
            transfer_syntax_uids: self.transfer_syntax_uids,
            protocol_version: self.protocol_version,
            max_pdu_length: self.max_pdu_length,
            promiscuous: self.promiscuous,
        }
    }

    pub fn accept_any(self) -> ServerAssociationOptions<'a, AcceptAny> {
        self.ae_access_control(AcceptAny)
    }

    pub fn accept_called_ae_title(self) -> ServerAssociationOptions<'a, AcceptCalledAeTitle> {
        self.ae_access_control(AcceptCalledAeTitle)
    }

    pub fn ae_title<T: Into<Cow<'a, str>>>(mut self, ae_title: T) -> Self {
        self.ae_title = ae_title.into();
        self
    }

    pub fn with_abstract_syntax<T: Into<Cow<'a, str>>>(mut self, uid: T) -> Self {
        self.abstract_syntax_uids.push(uid.into());
        self
    }

    pub fn with_transfer_syntax<T: Into<Cow<'a, str>>>(mut self, uid: T) -> Self {
        self.transfer_syntax_uids.push(uid.into());
        self
    }

    pub fn max_pdu_length(mut self, value: u32) -> Self {
        self.max_pdu_length = value;
        self
    }

    pub fn promiscuous(mut self, promiscuous: bool) -> Self {
        self.promiscuous = promiscuous;
        self
    }

    fn choose_ts(&self, offered: &[String]) -> Option<String> {
        if self.transfer_syntax_uids.is_empty() {
            // accept anything this node's transfer syntax registry knows
            return offered
                .iter()
                .find(|uid| {
                    dicom_transfer_syntax_registry::TransferSyntaxRegistry
                        .get(uid)
                        .is_some()
                })
                .cloned();
        }
        offered
            .iter()
            .find(|uid| {
                self.transfer_syntax_uids
                    .iter()
                    .any(|ts| ts.as_ref() == uid.as_str())
            })
            .cloned()
    }

    /// Negotiate an association over an already-accepted TCP stream.
    pub fn establish(&self, mut socket: TcpStream) -> Result<ServerAssociation> {
        ensure!(
            !self.abstract_syntax_uids.is_empty() || self.promiscuous,
            MissingAbstractSyntaxSnafu
        );

        let pdu = read_pdu(&mut socket, self.max_pdu_length).context(ReceiveRequestSnafu)?;
        let mut buffer = Vec::with_capacity(self.max_pdu_length as usize);

        let (
            calling_ae_title,
            called_ae_title,
            application_context_name,
            presentation_contexts,
            user_variables,
        ) = match pdu {
            Pdu::AssociationRQ {
                protocol_version,
                calling_ae_title,
                called_ae_title,
                application_context_name,
                presentation_contexts,
                user_variables,
            } => {
                if protocol_version != self.protocol_version {
                    self.reject(
                        &mut socket,
                        &mut buffer,
                        AssociationRJSource::ServiceUser(AssociationRJServiceUserReason::NoReasonGiven),
                    )?;
                    return RejectedSnafu.fail();
                }
                if application_context_name != self.application_context_name {
                    self.reject(
                        &mut socket,
                        &mut buffer,
                        AssociationRJSource::ServiceUser(
                            AssociationRJServiceUserReason::ApplicationContextNameNotSupported,
                        ),
                    )?;
                    return RejectedSnafu.fail();
                }
                (
                    calling_ae_title,
                    called_ae_title,
                    application_context_name,
                    presentation_contexts,
                    user_variables,
                )
            }
            pdu => return UnexpectedRequestSnafu { pdu }.fail(),
        };

        let user_identity = user_variables.iter().find_map(|v| match v {
            UserVariableItem::UserIdentity(identity) => Some(identity),
            _ => None,
        });
        if let Err(reason) = self.ae_access_control.check_access(
            &self.ae_title,
            &calling_ae_title,
            &called_ae_title,
            user_identity,
        ) {
            self.reject(&mut socket, &mut buffer, AssociationRJSource::ServiceUser(reason))?;
            return RejectedSnafu.fail();
        }

        let requestor_max_pdu_length = user_variables
            .iter()
            .find_map(|v| match v {
                UserVariableItem::MaxLength(len) => Some(*len),
                _ => None,
            })
            .unwrap_or(DEFAULT_MAX_PDU);
        let requestor_max_pdu_length = if requestor_max_pdu_length == 0 {
            MAXIMUM_PDU_SIZE
        } else {
            requestor_max_pdu_length
        };

        let granted_roles: Vec<_> = user_variables
            .iter()
            .filter_map(|v| match v {
                UserVariableItem::SopClassRoleSelection { uid, role } => Some((uid.clone(), *role)),
                _ => None,
            })
            .collect();

        let accepted_abstract_syntaxes: Vec<(u8, String)> = presentation_contexts
            .iter()
            .map(|pc| (pc.id, pc.abstract_syntax.clone()))
            .collect();

        let accorded: Vec<_> = presentation_contexts
            .into_iter()
            .map(|pc| {
                if !self.promiscuous && !self.abstract_syntax_uids.iter().any(|u| u == &pc.abstract_syntax) {
                    return PresentationContextResult {
                        id: pc.id,
                        reason: PresentationContextResultReason::AbstractSyntaxNotSupported,
                        transfer_syntax: "1.2.840.10008.1.2".to_string(),
                    };
                }
                match self.choose_ts(&pc.transfer_syntaxes) {
                    Some(ts) => PresentationContextResult {
                        id: pc.id,
                        reason: PresentationContextResultReason::Acceptance,
                        transfer_syntax: ts,
                    },
                    None => PresentationContextResult {
                        id: pc.id,
                        reason: PresentationContextResultReason::TransferSyntaxesNotSupported,
                        transfer_syntax: "1.2.840.10008.1.2".to_string(),
                    },
                }
            })
            .collect();

        let mut response_variables = vec![
            UserVariableItem::MaxLength(self.max_pdu_length),
            UserVariableItem::ImplementationClassUID(
                crate::IMPLEMENTATION_CLASS_UID.to_string(),
            ),
            UserVariableItem::ImplementationVersionName(
                crate::IMPLEMENTATION_VERSION_NAME.to_string(),
            ),
        ];
        response_variables.extend(granted_roles.iter().map(|(uid, role)| {
            UserVariableItem::SopClassRoleSelection {
                uid: uid.clone(),
                role: *role,
            }
        }));

        write_pdu(
            &mut buffer,
            &Pdu::AssociationAC {
                protocol_version: self.protocol_version,
                application_context_name,
                presentation_contexts: accorded.clone(),
                user_variables: response_variables,
            },
        )
        .context(SendResponseSnafu)?;
        socket.write_all(&buffer).context(WireSendSnafu)?;

        Ok(ServerAssociation {
            state: State::Established,
            presentation_contexts: accorded,
            accepted_abstract_syntaxes,
            requestor_max_pdu_length,
            acceptor_max_pdu_length: self.max_pdu_length,
            calling_ae_title,
            socket,
        })
    }

    fn reject(&self, socket: &mut TcpStream, buffer: &mut Vec<u8>, source: AssociationRJSource) -> Result<()> {
        buffer.clear();
        write_pdu(
            buffer,
            &Pdu::AssociationRJ {
                result: AssociationRJResult::Permanent,
                source,
            },
        )
        .context(SendResponseSnafu)?;
        socket.write_all(buffer).context(WireSendSnafu)
    }
}

/// A negotiated association from the acceptor's perspective.
#[derive(Debug)]
pub struct ServerAssociation {
    state: State,
    presentation_contexts: Vec<PresentationContextResult>,
    /// The abstract syntax each presentation context id was proposed
    /// with, regardless of whether it was accorded -- kept separately
    /// since [`PresentationContextResult`] only records the outcome.
    accepted_abstract_syntaxes: Vec<(u8, String)>,
    requestor_max_pdu_length: u32,
    acceptor_max_pdu_length: u32,
    calling_ae_title: String,
    socket: TcpStream,
}

impl ServerAssociation {
    pub fn state(&self) -> State {
        self.state
    }

    pub fn calling_ae_title(&self) -> &str {
        &self.calling_ae_title
    }

    /// The requestor's advertised maximum PDU length, i.e. the largest
    /// PDU this acceptor may send it (PS3.8 Annex D.1).
    pub fn peer_max_pdu_length(&self) -> u32 {
        self.requestor_max_pdu_length
    }

    pub fn presentation_contexts(&self) -> &[PresentationContextResult] {
        &self.presentation_contexts
    }

    /// The abstract syntax proposed for `presentation_context_id`, if
    /// that id was part of this association's negotiation.
    pub fn abstract_syntax_uid(&self, presentation_context_id: u8) -> Option<&str> {
        self.accepted_abstract_syntaxes
            .iter()
            .find(|(id, _)| *id == presentation_context_id)
            .map(|(_, uid)| uid.as_str())
    }

    pub fn send(&mut self, pdu: &Pdu) -> Result<()> {
        ensure!(
            matches!(self.state, State::Established | State::Releasing),
            NotEstablishedSnafu { state: self.state }
        );
        write_pdu(&mut self.socket, pdu).context(SendSnafu)
    }

    pub fn receive(&mut self) -> Result<Pdu> {
        ensure!(
            matches!(self.state, State::Established | State::Releasing),
            NotEstablishedSnafu { state: self.state }
        );
        read_pdu(&mut self.socket, self.requestor_max_pdu_length.min(self.acceptor_max_pdu_length))
            .context(ReceiveSnafu)
    }

    /// Respond to a peer-initiated release request.
    pub fn release(&mut self) -> Result<()> {
        if self.state != State::Established {
            return Ok(());
        }
        self.state = State::Releasing;
        write_pdu(&mut self.socket, &Pdu::ReleaseRP).context(SendSnafu)?;
        self.state = State::Closed;
        let _ = self.socket.shutdown(std::net::Shutdown::Both);
        Ok(())
    }

    /// Initiate a release on this node's own initiative (e.g. on
    /// shutdown). The peer's A-RELEASE-RP is then awaited via
    /// [`ServerAssociation::receive`]; call [`ServerAssociation::finish_release`]
    /// once it arrives.
    pub fn request_release(&mut self) -> Result<()> {
        if self.state != State::Established {
            return Ok(());
        }
        self.state = State::Releasing;
        write_pdu(&mut self.socket, &Pdu::ReleaseRQ).context(SendSnafu)
    }

    /// Complete a self-initiated release after the peer's A-RELEASE-RP
    /// has arrived, closing the transport.
    pub fn finish_release(&mut self) {
        self.state = State::Closed;
        let _ = self.socket.shutdown(std::net::Shutdown::Both);
    }

    /// Abort the association on this node's own initiative -- a protocol
    /// violation, a timeout, or a shutdown request that the peer did not
    /// confirm in time. Sends an A-ABORT and closes the transport.
    pub fn abort(&mut self, source: AbortRQSource) -> Result<()> {
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
