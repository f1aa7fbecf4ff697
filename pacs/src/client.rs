//! A client-association convenience wrapper: one connect, then one
//! method per DIMSE-C operation, each opening (or reusing) the
//! negotiated association and driving the request/response exchange to
//! completion.

use std::net::ToSocketAddrs;
use std::time::{Duration, Instant};

use snafu::{ResultExt, Snafu};

use dicom_dimse::{commands, status::Status, Message};
use dicom_object::InMemDicomObject;
use dicom_transfer_syntax_registry::TransferSyntaxRegistry;
use dicom_ul::association::client::{ClientAssociation, ClientAssociationOptions};
use dicom_ul::pdu::commands::{CommandDatasetType, Priority};
use dicom_ul::pdu::{PDataValue, PDataValueType};
use dicom_ul::Pdu;

use crate::index::QueryLevel;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ClientError {
    #[snafu(display("could not establish association"))]
    Establish { source: dicom_ul::association::client::Error },
    #[snafu(display("could not send request"))]
    Send { source: dicom_ul::association::client::Error },
    #[snafu(display("could not receive response"))]
    Receive { source: dicom_ul::association::client::Error },
    #[snafu(display("could not encode request message"))]
    Encode { source: dicom_dimse::message::Error },
    #[snafu(display("could not decode response message"))]
    Decode { source: dicom_dimse::message::Error },
    #[snafu(display("transfer syntax `{}` is not registered", uid))]
    UnknownTransferSyntax { uid: String },
    #[snafu(display("peer closed the association without a final response"))]
    NoFinalResponse,
    #[snafu(display("call exceeded its per-message deadline of {:?}", deadline))]
    DeadlineExceeded { deadline: Duration },
    #[snafu(display("operation failed with status 0x{:04X}", status.0))]
    Failed { status: Status },
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Outcome of a C-MOVE or C-GET request: the final status plus the
/// sub-operation counters accumulated along the way.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubOpCounters {
    pub remaining: u16,
    pub completed: u16,
    pub failed: u16,
    pub warning: u16,
}

/// A negotiated client association plus bookkeeping for the
/// requestor-assigned message ID sequence.
pub struct PacsClient {
    association: ClientAssociation,
    next_message_id: u16,
    per_message_timeout: Option<Duration>,
}

impl PacsClient {
    /// Connect to `address` and negotiate an association proposing
    /// `abstract_syntax` over `transfer_syntaxes` (falling back to the
    /// registry's default preference order if empty).
    pub fn connect<A: ToSocketAddrs + ToString>(
        address: A,
        calling_ae_title: &str,
        called_ae_title: &str,
        abstract_syntax: &str,
        transfer_syntaxes: &[&str],
    ) -> Result<Self> {
        let mut options = ClientAssociationOptions::new()
            .calling_ae_title(calling_ae_title.to_string())
            .called_ae_title(called_ae_title.to_string())
            .with_abstract_syntax(abstract_syntax.to_string());
        for ts in transfer_syntaxes {
            options = options.with_transfer_syntax(ts.to_string());
        }
        let association = options.establish(address).context(EstablishSnafu)?;
        Ok(PacsClient {
            association,
            next_message_id: 1,
            per_message_timeout: None,
        })
    }

    /// Bound every subsequent receive by `timeout`, aborting (not merely
    /// abandoning) the association if it elapses.
    pub fn with_per_message_timeout(mut self, timeout: Duration) -> Self {
        self.per_message_timeout = Some(timeout);
        self
    }

    fn take_message_id(&mut self) -> u16 {
        let id = self.next_message_id;
        self.next_message_id += 1;
        id
    }

    fn dataset_ts(&self) -> Result<&'static dicom_encoding::TransferSyntax> {
        let uid = self.association.transfer_syntax_uid().to_string();
        TransferSyntaxRegistry
            .get(&uid)
            .context(UnknownTransferSyntaxSnafu { uid })
    }

    fn send_message(&mut self, mut message: Message) -> Result<()> {
        let ts = self.dataset_ts()?;
        let pdus = message
            .encode(
                self.association.presentation_context_id(),
                ts,
                self.association.peer_max_pdu_length(),
            )
            .context(EncodeSnafu)?;
        for pdu in pdus {
            self.association.send(&pdu).context(SendSnafu)?;
        }
        Ok(())
    }

    /// Receive and reassemble the next complete DIMSE message on this
    /// association, aborting if [`PacsClient::with_per_message_timeout`]'s
    /// deadline elapses first.
    fn receive_message(&mut self) -> Result<Message> {
        let deadline = self.per_message_timeout.map(|d| (Instant::now(), d));
        let ts = self.dataset_ts()?;
        let mut fragments: Vec<PDataValue> = Vec::new();
        let mut command_done = false;
        let mut expects_dataset: Option<bool> = None;

        loop {
            if let Some((start, timeout)) = deadline {
                if start.elapsed() > timeout {
                    let _ = self.association.abort(dicom_ul::pdu::AbortRQSource::ServiceUser);
                    return DeadlineExceededSnafu { deadline: timeout }.fail();
                }
            }

            let pdu = self.association.receive().context(ReceiveSnafu)?;
            match pdu {
                Pdu::PData { data } => {
                    for value in data {
                        if value.value_type == PDataValueType::Command && value.is_last {
                            command_done = true;
                        }
                        if value.value_type == PDataValueType::Data && value.is_last {
                            expects_dataset = Some(true);
                        }
                        fragments.push(value);
                    }
                    if command_done && expects_dataset.is_none() {
                        expects_dataset = peek_command_dataset_type(&fragments);
                    }
                    let ready = match expects_dataset {
                        Some(true) => fragments.iter().any(|f| f.value_type == PDataValueType::Data && f.is_last),
                        Some(false) => command_done,
                        None => false,
                    };
                    if ready {
                        return Message::decode(&fragments, ts).context(DecodeSnafu);
                    }
                }
                Pdu::AbortRQ { .. } => {
                    self.association.note_peer_abort();
                    return NoFinalResponseSnafu.fail();
                }
                Pdu::ReleaseRP => return NoFinalResponseSnafu.fail(),
                _ => {}
            }
        }
    }

    /// C-ECHO: verify connectivity with the peer.
    pub fn echo(&mut self, sop_class_uid: &str) -> Result<Status> {
        let message_id = self.take_message_id();
        self.send_message(commands::c_echo_rq(message_id, sop_class_uid))?;
        let response = self.receive_message()?;
        Ok(response.status().unwrap_or(Status::PROCESSING_FAILURE))
    }

    /// C-STORE: send one instance.
    pub fn store(&mut self, sop_class_uid: &str, sop_instance_uid: &str, dataset: InMemDicomObject) -> Result<Status> {
        let message_id = self.take_message_id();
        self.send_message(commands::c_store_rq(
            message_id,
            sop_class_uid,
            sop_instance_uid,
            Priority::Medium,
            dataset,
        ))?;
        let response = self.receive_message()?;
        Ok(response.status().unwrap_or(Status::PROCESSING_FAILURE))
    }

    /// C-FIND: stream matches to `on_match`, returning the final status.
    /// This does not materialize the whole response sequence -- `on_match`
    /// is invoked once per arriving identifier, in arrival order.
    pub fn find_each(
        &mut self,
        sop_class_uid: &str,
        level: QueryLevel,
        mut identifier: InMemDicomObject,
        mut on_match: impl FnMut(InMemDicomObject),
    ) -> Result<Status> {
        put_query_level(&mut identifier, level);
        let message_id = self.take_message_id();
        self.send_message(commands::c_find_rq(message_id, sop_class_uid, identifier))?;

        loop {
            let response = self.receive_message()?;
            let status = response.status().unwrap_or(Status::PROCESSING_FAILURE);
            if status.is_pending() {
                if let Some(dataset) = response.dataset() {
                    on_match(dataset.clone());
                }
                continue;
            }
            return Ok(status);
        }
    }

    /// C-FIND, collecting every match into a `Vec` for callers that do
    /// not need streaming semantics.
    pub fn find(
        &mut self,
        sop_class_uid: &str,
        level: QueryLevel,
        identifier: InMemDicomObject,
    ) -> Result<(Status, Vec<InMemDicomObject>)> {
        let mut matches = Vec::new();
        let status = self.find_each(sop_class_uid, level, identifier, |obj| matches.push(obj))?;
        Ok((status, matches))
    }

    /// C-MOVE: request that the peer send matching instances to
    /// `destination_ae_title`. `on_progress` is invoked after each
    /// C-MOVE-RSP (pending or final) with the counters reported so far.
    pub fn move_to(
        &mut self,
        sop_class_uid: &str,
        level: QueryLevel,
        mut identifier: InMemDicomObject,
        destination_ae_title: &str,
        mut on_progress: impl FnMut(SubOpCounters),
    ) -> Result<(Status, SubOpCounters)> {
        put_query_level(&mut identifier, level);
        let message_id = self.take_message_id();
        self.send_message(commands::c_move_rq(
            message_id,
            sop_class_uid,
            destination_ae_title,
            identifier,
        ))?;

        loop {
            let response = self.receive_message()?;
            let status = response.status().unwrap_or(Status::PROCESSING_FAILURE);
            let counters = SubOpCounters {
                remaining: response.remaining_subops().unwrap_or(0),
                completed: response.completed_subops().unwrap_or(0),
                failed: response.failed_subops().unwrap_or(0),
                warning: response.warning_subops().unwrap_or(0),
            };
            on_progress(counters);
            if !status.is_pending() {
                return Ok((status, counters));
            }
        }
    }

    /// C-GET: like [`PacsClient::move_to`], but sub-operations arrive as
    /// C-STORE-RQ messages over this same association -- `on_store` is
    /// called for each one and must return the status to report back.
    pub fn get(
        &mut self,
        sop_class_uid: &str,
        level: QueryLevel,
        mut identifier: InMemDicomObject,
        mut on_store: impl FnMut(InMemDicomObject) -> Status,
    ) -> Result<(Status, SubOpCounters)> {
        put_query_level(&mut identifier, level);
        let message_id = self.take_message_id();
        self.send_message(commands::c_get_rq(message_id, sop_class_uid, identifier))?;

        let mut counters = SubOpCounters::default();
        loop {
            let request = self.receive_message()?;
            match request.command_field() {
                Ok(dicom_ul::pdu::commands::CommandField::CStoreRq) => {
                    let store_sop_class = request.affected_sop_class_uid().unwrap_or_default();
                    let store_sop_instance = request.affected_sop_instance_uid().unwrap_or_default();
                    let store_message_id = request.message_id().unwrap_or(0);
                    let status = match request.dataset() {
                        Some(dataset) => on_store(dataset.clone()),
                        None => Status::CANNOT_UNDERSTAND,
                    };
                    self.send_message(commands::c_store_rsp(
                        store_message_id,
                        &store_sop_class,
                        &store_sop_instance,
                        status,
                    ))?;
                    continue;
                }
                _ => {
                    let status = request.status().unwrap_or(Status::PROCESSING_FAILURE);
                    counters = SubOpCounters {
                        remaining: request.remaining_subops().unwrap_or(0),
                        completed: request.completed_subops().unwrap_or(0),
                        failed: request.failed_subops().unwrap_or(0),
                        warning: request.warning_subops().unwrap_or(0),
                    };
                    if !status.is_pending() {
                        return Ok((status, counters));
                    }
                }
            }
        }
    }

    /// Gracefully release the association.
    pub fn release(mut self) -> Result<()> {
        self.association.release().context(SendSnafu)
    }
}

fn put_query_level(identifier: &mut InMemDicomObject, level: QueryLevel) {
    use dicom_core::{dicom_value, DataElement, VR};
    use dicom_dictionary_std::tags;
    identifier.put(DataElement::new(
        tags::QUERY_RETRIEVE_LEVEL,
        VR::CS,
        dicom_value!(Str, level.as_str()),
    ));
}

fn peek_command_dataset_type(fragments: &[PDataValue]) -> Option<bool> {
    let command_bytes: Vec<u8> = fragments
        .iter()
        .filter(|f| f.value_type == PDataValueType::Command)
        .flat_map(|f| f.data.iter().copied())
        .collect();
    let command_set = dicom_object::InMemDicomObject::read_dataset_with_ts(
        command_bytes.as_slice(),
        &dicom_transfer_syntax_registry::entries::IMPLICIT_VR_LITTLE_ENDIAN,
    )
    .ok()?;
    let code = command_set
        .element(dicom_dictionary_std::tags::COMMAND_DATA_SET_TYPE)
        .ok()?
        .uint16()
        .ok()?;
    Some(code != CommandDatasetType::Absent.code())
}
