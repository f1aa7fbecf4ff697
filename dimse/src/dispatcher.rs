//! The service registry and dispatch loop: reassembles inbound P-DATA-TF
//! fragments into [`Message`]s, routes each to the handler registered for
//! its presentation context's abstract syntax, and drives the worker's
//! receive loop until release or abort.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use snafu::{OptionExt, ResultExt, Snafu};

use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use dicom_transfer_syntax_registry::{entries, TransferSyntaxRegistry};
use dicom_ul::pdu::{AbortRQServiceProviderReason, AbortRQSource, PDataValue, PDataValueType};
use dicom_ul::{Pdu, ServerAssociation};

use crate::message::{self, Message};
use crate::status::Status;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("association error while dispatching"))]
    Association {
        source: dicom_ul::association::server::Error,
    },
    #[snafu(display("presentation context {} was not negotiated", id))]
    UnknownPresentationContext { id: u8 },
    #[snafu(display("transfer syntax `{}` is not registered", uid))]
    UnknownTransferSyntax { uid: String },
    #[snafu(display("could not decode inbound message"))]
    Decode { source: message::Error },
    #[snafu(display("could not encode outbound message"))]
    Encode { source: message::Error },
    #[snafu(display("peer released or aborted the association before a final response"))]
    PeerClosedDuringExchange,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An application-level handler for one or more abstract syntaxes.
///
/// Handlers run synchronously on the association's worker (SPEC_FULL
/// Section 4.8/5): a handler that streams responses (C-FIND, C-MOVE,
/// C-GET) sends each one itself via `assoc.send`, in the order they are
/// produced, before returning.
pub trait ServiceHandler: Send + Sync {
    /// The abstract syntax UIDs this handler claims.
    fn abstract_syntaxes(&self) -> &[String];

    /// Handle one fully reassembled request, sending zero or more
    /// response messages over `assoc` on `presentation_context_id`
    /// before returning.
    fn handle(
        &self,
        assoc: &mut ServerAssociation,
        presentation_context_id: u8,
        dataset_ts: &dicom_encoding::TransferSyntax,
        request: Message,
    ) -> Result<()>;
}

/// A sealed set of service handlers, dispatching inbound requests by
/// abstract syntax.
pub struct Dispatcher {
    handlers: Vec<Box<dyn ServiceHandler>>,
    messages_processed: AtomicU64,
}

impl Dispatcher {
    pub fn new(handlers: Vec<Box<dyn ServiceHandler>>) -> Self {
        Dispatcher {
            handlers,
            messages_processed: AtomicU64::new(0),
        }
    }

    /// Total number of requests dispatched across every association this
    /// dispatcher has served, for coarse server-level statistics.
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    fn handler_for(&self, abstract_syntax: &str) -> Option<&dyn ServiceHandler> {
        self.handlers
            .iter()
            .find(|h| h.abstract_syntaxes().iter().any(|uid| uid == abstract_syntax))
            .map(|h| h.as_ref())
    }

    /// Run the receive loop for one established association until it is
    /// released, aborted, a transport error occurs, or `shutdown` is
    /// observed.
    ///
    /// `assoc`'s socket is expected to carry a bounded read timeout (set
    /// by the caller) so this loop wakes periodically to recheck
    /// `shutdown` even while otherwise idle; `idle_timeout`, if given, is
    /// the real inactivity ceiling past which the association is
    /// considered stale and is torn down with an A-ABORT. On shutdown,
    /// the worker attempts a graceful A-RELEASE, falling back to
    /// A-ABORT if the peer does not confirm within `release_deadline`.
    pub fn run(
        &self,
        assoc: &mut ServerAssociation,
        shutdown: &AtomicBool,
        idle_timeout: Option<Duration>,
        release_deadline: Duration,
    ) -> Result<()> {
        let mut pending: HashMap<u8, PendingContext> = HashMap::new();
        let mut last_activity = Instant::now();

        loop {
            if shutdown.load(Ordering::SeqCst) {
                tracing::info!("shutdown requested, attempting graceful release");
                self.attempt_release(assoc, release_deadline);
                break;
            }

            let pdu = match assoc.receive() {
                Ok(pdu) => pdu,
                Err(e) => {
                    if is_timeout(&e) {
                        if idle_timeout.map(|t| last_activity.elapsed() >= t).unwrap_or(false) {
                            tracing::warn!(
                                idle_for = ?last_activity.elapsed(),
                                "association idle timeout, sending A-ABORT"
                            );
                            send_timeout_abort(assoc);
                            break;
                        }
                        continue;
                    }
                    tracing::debug!("association worker stopping: receive failed or peer closed");
                    break;
                }
            };
            last_activity = Instant::now();

            match pdu {
                Pdu::PData { data } => {
                    for value in data {
                        let presentation_context_id = value.presentation_context_id;
                        let entry = pending.entry(presentation_context_id).or_default();
                        entry.feed(value);
                        if entry.is_ready() {
                            let PendingContext { fragments, .. } =
                                pending.remove(&presentation_context_id).unwrap();
                            self.dispatch_one(assoc, presentation_context_id, fragments)?;
                        }
                    }
                }
                Pdu::ReleaseRQ => {
                    tracing::info!("received A-RELEASE-RQ, releasing association");
                    assoc.release().context(AssociationSnafu)?;
                    break;
                }
                Pdu::AbortRQ { source } => {
                    tracing::info!(?source, "received A-ABORT");
                    assoc.note_peer_abort();
                    break;
                }
                other => {
                    tracing::warn!(?other, "ignoring unexpected PDU during message exchange");
                }
            }
        }

        Ok(())
    }

    fn dispatch_one(
        &self,
        assoc: &mut ServerAssociation,
        presentation_context_id: u8,
        fragments: Vec<PDataValue>,
    ) -> Result<()> {
        let transfer_syntax_uid = assoc
            .presentation_contexts()
            .iter()
            .find(|pc| pc.id == presentation_context_id)
            .map(|pc| pc.transfer_syntax.clone())
            .context(UnknownPresentationContextSnafu {
                id: presentation_context_id,
            })?;
        let dataset_ts = TransferSyntaxRegistry
            .get(&transfer_syntax_uid)
            .context(UnknownTransferSyntaxSnafu {
                uid: transfer_syntax_uid.clone(),
            })?;

        let request = Message::decode(&fragments, dataset_ts).context(DecodeSnafu)?;
        self.messages_processed.fetch_add(1, Ordering::Relaxed);

        let abstract_syntax = assoc
            .abstract_syntax_uid(presentation_context_id)
            .map(|s| s.to_string())
            .context(UnknownPresentationContextSnafu {
                id: presentation_context_id,
            })?;

        tracing::debug!(
            presentation_context_id,
            abstract_syntax = %abstract_syntax,
            command_field = ?request.command_field(),
            "dispatching DIMSE request"
        );

        match self.handler_for(&abstract_syntax) {
            Some(handler) => handler.handle(assoc, presentation_context_id, dataset_ts, request),
            None => self.respond_sop_class_not_supported(
                assoc,
                presentation_context_id,
                dataset_ts,
                &request,
            ),
        }
    }

    fn respond_sop_class_not_supported(
        &self,
        assoc: &mut ServerAssociation,
        presentation_context_id: u8,
        dataset_ts: &dicom_encoding::TransferSyntax,
        request: &Message,
    ) -> Result<()> {
        let Ok(command_field) = request.command_field() else {
            return Ok(());
        };
        let Some(response_field) = command_field.response() else {
            return Ok(());
        };

        let mut response = Message::new(response_field);
        if let Some(message_id) = request.message_id() {
            response.set_message_id_being_responded_to(message_id);
        }
        if let Some(uid) = request.affected_sop_class_uid() {
            response.set_affected_sop_class_uid(&uid);
        }
        response.set_status(Status::SOP_CLASS_NOT_SUPPORTED);

        let pdus = response
            .encode(presentation_context_id, dataset_ts, assoc.peer_max_pdu_length())
            .map_err(|source| Error::Encode { source })?;
        for pdu in pdus {
            assoc.send(&pdu).context(AssociationSnafu)?;
        }
        Ok(())
    }

    /// Initiate a release on shutdown, waiting up to `deadline` for the
    /// peer's A-RELEASE-RP before giving up and sending an A-ABORT
    /// instead. Stray PDUs arriving while awaiting confirmation are
    /// ignored.
    fn attempt_release(&self, assoc: &mut ServerAssociation, deadline: Duration) {
        if assoc.request_release().is_err() {
            return;
        }

        let started = Instant::now();
        loop {
            if started.elapsed() >= deadline {
                tracing::warn!("peer did not confirm release in time, sending A-ABORT");
                send_timeout_abort(assoc);
                return;
            }
            match assoc.receive() {
                Ok(Pdu::ReleaseRP) => {
                    tracing::info!("peer confirmed release");
                    assoc.finish_release();
                    return;
                }
                Ok(_) => continue,
                Err(e) if is_timeout(&e) => continue,
                Err(_) => return,
            }
        }
    }
}

/// Whether `error` was a read timing out, as opposed to the peer closing
/// the connection or sending malformed data.
fn is_timeout(error: &dicom_ul::association::server::Error) -> bool {
    matches!(error, dicom_ul::association::server::Error::Receive { source } if source.is_timeout())
}

/// Send an A-ABORT (source: service-provider) best-effort, for a worker
/// tearing an association down on its own initiative.
fn send_timeout_abort(assoc: &mut ServerAssociation) {
    let _ = assoc.abort(AbortRQSource::ServiceProvider(
        AbortRQServiceProviderReason::ReasonNotSpecifiedUnrecognizedPdu,
    ));
}

/// Fragments collected so far for one presentation context, tracking
/// whether the command stream and (if any) the data stream have reached
/// their last fragment.
#[derive(Default)]
struct PendingContext {
    fragments: Vec<PDataValue>,
    command_done: bool,
    /// `None` until the command set has been reassembled and its
    /// `CommandDataSetType` inspected.
    expects_dataset: Option<bool>,
    data_done: bool,
}

impl PendingContext {
    fn feed(&mut self, value: PDataValue) {
        match value.value_type {
            PDataValueType::Command if value.is_last => self.command_done = true,
            PDataValueType::Data if value.is_last => self.data_done = true,
            _ => {}
        }
        self.fragments.push(value);
    }

    fn is_ready(&mut self) -> bool {
        if !self.command_done {
            return false;
        }
        if self.expects_dataset.is_none() {
            self.expects_dataset = self.peek_command_dataset_type();
        }
        match self.expects_dataset {
            Some(true) => self.data_done,
            Some(false) => true,
            None => false,
        }
    }

    /// Decode just the reassembled command bytes to read
    /// `CommandDataSetType`, without touching the (possibly still
    /// incomplete) data fragments.
    fn peek_command_dataset_type(&self) -> Option<bool> {
        let command_bytes: Vec<u8> = self
            .fragments
            .iter()
            .filter(|f| f.value_type == PDataValueType::Command)
            .flat_map(|f| f.data.iter().copied())
            .collect();
        let command_set = InMemDicomObject::read_dataset_with_ts(
            command_bytes.as_slice(),
            &entries::IMPLICIT_VR_LITTLE_ENDIAN,
        )
        .ok()?;
        let code = command_set
            .element(tags::COMMAND_DATA_SET_TYPE)
            .ok()?
            .uint16()
            .ok()?;
        Some(code != 0x0101)
    }
}
