//! Service handlers wiring an [`Index`] and [`Archive`] into the DIMSE
//! Query/Retrieve Service Class (PS3.4 Section C): C-STORE to accept
//! incoming instances, C-FIND to answer queries, and C-MOVE/C-GET to
//! resolve a query to concrete instances and forward them.

use std::collections::HashMap;
use std::sync::Arc;

use snafu::{OptionExt, ResultExt, Snafu};

use dicom_dictionary_std::tags;
use dicom_dimse::dispatcher::{self, ServiceHandler};
use dicom_dimse::{commands, status::Status, Message};
use dicom_object::{FileMetaTableBuilder, InMemDicomObject};
use dicom_transfer_syntax_registry::entries;
use dicom_ul::pdu::commands::{CommandDatasetType, Priority};
use dicom_ul::pdu::{PDataValue, PDataValueType};
use dicom_ul::{Pdu, ServerAssociation};

use crate::archive::Archive;
use crate::client::PacsClient;
use crate::index::{Index, QueryLevel};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("request carried no Query/Retrieve Level"))]
    MissingQueryLevel,
    #[snafu(display("Query/Retrieve Level `{}` is not recognized", value))]
    UnknownQueryLevel { value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

fn query_level(identifier: &InMemDicomObject) -> Result<QueryLevel> {
    let value = identifier
        .element(tags::QUERY_RETRIEVE_LEVEL)
        .ok()
        .and_then(|e| e.to_str().ok())
        .context(MissingQueryLevelSnafu)?;
    QueryLevel::from_str(value.trim_end_matches('\0'))
        .context(UnknownQueryLevelSnafu { value: value.to_string() })
}

fn send_response(
    assoc: &mut ServerAssociation,
    presentation_context_id: u8,
    dataset_ts: &dicom_encoding::TransferSyntax,
    mut message: Message,
) -> dispatcher::Result<()> {
    let pdus = message
        .encode(presentation_context_id, dataset_ts, assoc.peer_max_pdu_length())
        .context(dispatcher::EncodeSnafu)?;
    for pdu in pdus {
        assoc.send(&pdu).context(dispatcher::AssociationSnafu)?;
    }
    Ok(())
}

/// Reassemble the next complete DIMSE message arriving on `assoc`, used by
/// [`GetHandler`] to read the C-STORE-RSP for each sub-operation it sends
/// over the same association it received the C-GET-RQ on.
fn receive_message(
    assoc: &mut ServerAssociation,
    dataset_ts: &dicom_encoding::TransferSyntax,
) -> dispatcher::Result<Message> {
    let mut fragments: Vec<PDataValue> = Vec::new();
    let mut command_done = false;
    let mut expects_dataset: Option<bool> = None;

    loop {
        let pdu = assoc.receive().context(dispatcher::AssociationSnafu)?;
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
                    Some(true) => fragments
                        .iter()
                        .any(|f| f.value_type == PDataValueType::Data && f.is_last),
                    Some(false) => command_done,
                    None => false,
                };
                if ready {
                    return Message::decode(&fragments, dataset_ts).context(dispatcher::DecodeSnafu);
                }
            }
            Pdu::ReleaseRQ | Pdu::AbortRQ { .. } => {
                return dispatcher::PeerClosedDuringExchangeSnafu.fail()
            }
            _ => {}
        }
    }
}

fn peek_command_dataset_type(fragments: &[PDataValue]) -> Option<bool> {
    let command_bytes: Vec<u8> = fragments
        .iter()
        .filter(|f| f.value_type == PDataValueType::Command)
        .flat_map(|f| f.data.iter().copied())
        .collect();
    let command_set = InMemDicomObject::read_dataset_with_ts(
        command_bytes.as_slice(),
        &entries::IMPLICIT_VR_LITTLE_ENDIAN,
    )
    .ok()?;
    let code = command_set.element(tags::COMMAND_DATA_SET_TYPE).ok()?.uint16().ok()?;
    Some(code != CommandDatasetType::Absent.code())
}

/// Build a [`crate::archive::Archive`]-storable object from a bare dataset,
/// deriving the file meta group from the dataset's own SOP class/instance
/// UIDs and the transfer syntax it arrived on.
fn into_storable(
    dataset: InMemDicomObject,
    dataset_ts: &dicom_encoding::TransferSyntax,
) -> Option<dicom_object::DefaultDicomObject> {
    let sop_class_uid = dataset
        .element(tags::SOP_CLASS_UID)
        .ok()?
        .to_str()
        .ok()?
        .into_owned();
    let sop_instance_uid = dataset
        .element(tags::SOP_INSTANCE_UID)
        .ok()?
        .to_str()
        .ok()?
        .into_owned();
    let meta = FileMetaTableBuilder::new()
        .media_storage_sop_class_uid(sop_class_uid)
        .media_storage_sop_instance_uid(sop_instance_uid)
        .transfer_syntax(dataset_ts.uid().to_string())
        .build()
        .ok()?;
    Some(dataset.with_exact_meta(meta))
}

/// Accepts incoming C-STORE-RQ, writing each instance to the archive and
/// indexing it.
pub struct StorageHandler {
    abstract_syntaxes: Vec<String>,
    archive: Arc<Archive>,
    index: Arc<Index>,
}

impl StorageHandler {
    pub fn new(abstract_syntaxes: Vec<String>, archive: Arc<Archive>, index: Arc<Index>) -> Self {
        StorageHandler { abstract_syntaxes, archive, index }
    }
}

impl ServiceHandler for StorageHandler {
    fn abstract_syntaxes(&self) -> &[String] {
        &self.abstract_syntaxes
    }

    fn handle(
        &self,
        assoc: &mut ServerAssociation,
        presentation_context_id: u8,
        dataset_ts: &dicom_encoding::TransferSyntax,
        request: Message,
    ) -> dispatcher::Result<()> {
        let message_id = request.message_id().unwrap_or(0);
        let sop_class_uid = request.affected_sop_class_uid().unwrap_or_default();
        let sop_instance_uid = request.affected_sop_instance_uid().unwrap_or_default();

        let status = match request.dataset() {
            Some(dataset) => self.store(dataset.clone(), dataset_ts),
            None => Status::CANNOT_UNDERSTAND,
        };

        let response = commands::c_store_rsp(message_id, &sop_class_uid, &sop_instance_uid, status);
        send_response(assoc, presentation_context_id, dataset_ts, response)
    }
}

impl StorageHandler {
    fn store(&self, dataset: InMemDicomObject, dataset_ts: &dicom_encoding::TransferSyntax) -> Status {
        let Some(file_obj) = into_storable(dataset, dataset_ts) else {
            return Status::CANNOT_UNDERSTAND;
        };
        match self.archive.store(&file_obj) {
            Ok(_) => {
                self.index.index_object(&file_obj);
                Status::SUCCESS
            }
            Err(crate::archive::Error::Duplicate { .. }) => Status::DUPLICATE_SOP_INSTANCE,
            Err(e) => {
                tracing::warn!(error = %e, "failed to store incoming instance");
                Status::PROCESSING_FAILURE
            }
        }
    }
}

/// Answers C-FIND-RQ against an [`Index`].
pub struct FindHandler {
    abstract_syntaxes: Vec<String>,
    index: Arc<Index>,
}

impl FindHandler {
    pub fn new(abstract_syntaxes: Vec<String>, index: Arc<Index>) -> Self {
        FindHandler { abstract_syntaxes, index }
    }
}

impl ServiceHandler for FindHandler {
    fn abstract_syntaxes(&self) -> &[String] {
        &self.abstract_syntaxes
    }

    fn handle(
        &self,
        assoc: &mut ServerAssociation,
        presentation_context_id: u8,
        dataset_ts: &dicom_encoding::TransferSyntax,
        request: Message,
    ) -> dispatcher::Result<()> {
        let message_id = request.message_id().unwrap_or(0);
        let sop_class_uid = request.affected_sop_class_uid().unwrap_or_default();

        let Some(identifier) = request.dataset() else {
            let response = commands::c_find_rsp(message_id, &sop_class_uid, Status::CANNOT_UNDERSTAND, None);
            return send_response(assoc, presentation_context_id, dataset_ts, response);
        };

        let level = match query_level(identifier) {
            Ok(level) => level,
            Err(_) => {
                let response = commands::c_find_rsp(
                    message_id,
                    &sop_class_uid,
                    Status::IDENTIFIER_DOES_NOT_MATCH_SOP_CLASS,
                    None,
                );
                return send_response(assoc, presentation_context_id, dataset_ts, response);
            }
        };

        for result in self.index.find(level, identifier) {
            let response = commands::c_find_rsp(message_id, &sop_class_uid, Status::PENDING, Some(result));
            send_response(assoc, presentation_context_id, dataset_ts, response)?;
        }
        let final_response = commands::c_find_rsp(message_id, &sop_class_uid, Status::SUCCESS, None);
        send_response(assoc, presentation_context_id, dataset_ts, final_response)
    }
}

/// Resolves C-MOVE-RQ against an [`Index`] and forwards each instance to
/// the named destination over a fresh client association (PS3.4 Section
/// C.4.2). Destinations are looked up by AE title in a fixed table; an
/// unknown destination is refused without touching the archive.
pub struct MoveHandler {
    abstract_syntaxes: Vec<String>,
    index: Arc<Index>,
    archive: Arc<Archive>,
    own_ae_title: String,
    destinations: HashMap<String, (String, u16)>,
}

impl MoveHandler {
    pub fn new(
        abstract_syntaxes: Vec<String>,
        index: Arc<Index>,
        archive: Arc<Archive>,
        own_ae_title: impl Into<String>,
        destinations: HashMap<String, (String, u16)>,
    ) -> Self {
        MoveHandler {
            abstract_syntaxes,
            index,
            archive,
            own_ae_title: own_ae_title.into(),
            destinations,
        }
    }
}

impl ServiceHandler for MoveHandler {
    fn abstract_syntaxes(&self) -> &[String] {
        &self.abstract_syntaxes
    }

    fn handle(
        &self,
        assoc: &mut ServerAssociation,
        presentation_context_id: u8,
        dataset_ts: &dicom_encoding::TransferSyntax,
        request: Message,
    ) -> dispatcher::Result<()> {
        let message_id = request.message_id().unwrap_or(0);
        let sop_class_uid = request.affected_sop_class_uid().unwrap_or_default();
        let move_destination = request.move_destination().unwrap_or_default();

        let Some((host, port)) = self.destinations.get(move_destination.trim_end_matches('\0')) else {
            let response =
                commands::c_move_rsp(message_id, &sop_class_uid, Status::REFUSED_MOVE_DESTINATION_UNKNOWN, 0, 0, 0, 0);
            return send_response(assoc, presentation_context_id, dataset_ts, response);
        };

        let Some(identifier) = request.dataset() else {
            let response = commands::c_move_rsp(message_id, &sop_class_uid, Status::CANNOT_UNDERSTAND, 0, 0, 0, 0);
            return send_response(assoc, presentation_context_id, dataset_ts, response);
        };
        let level = match query_level(identifier) {
            Ok(level) => level,
            Err(_) => {
                let response = commands::c_move_rsp(
                    message_id,
                    &sop_class_uid,
                    Status::IDENTIFIER_DOES_NOT_MATCH_SOP_CLASS,
                    0,
                    0,
                    0,
                    0,
                );
                return send_response(assoc, presentation_context_id, dataset_ts, response);
            }
        };

        let instances = self.index.resolve_instances(level, identifier);
        let total = instances.len() as u16;
        let mut completed = 0u16;
        let mut failed = 0u16;

        let address = format!("{}:{}", host, port);
        let mut client =
            PacsClient::connect(address.as_str(), &self.own_ae_title, &move_destination, &sop_class_uid, &[]).ok();

        for instance in &instances {
            let remaining = total.saturating_sub(completed + failed + 1);
            let outcome = client.as_mut().and_then(|client| {
                self.archive
                    .retrieve(&instance.sop_instance_uid)
                    .ok()
                    .and_then(|obj| {
                        client
                            .store(&instance.sop_class_uid, &instance.sop_instance_uid, obj.into_inner())
                            .ok()
                    })
            });
            match outcome {
                Some(status) if status.is_success() => completed += 1,
                _ => failed += 1,
            }
            let progress = commands::c_move_rsp(message_id, &sop_class_uid, Status::PENDING, remaining, completed, failed, 0);
            send_response(assoc, presentation_context_id, dataset_ts, progress)?;
        }

        if let Some(client) = client {
            let _ = client.release();
        }

        let final_status = if failed == 0 {
            Status::SUCCESS
        } else if completed == 0 {
            Status::UNABLE_TO_PERFORM_SUB_OPERATIONS
        } else {
            // PS3.7 Annex C: sub-operations complete, one or more failures.
            Status(0xB000)
        };
        let final_response = commands::c_move_rsp(message_id, &sop_class_uid, final_status, 0, completed, failed, 0);
        send_response(assoc, presentation_context_id, dataset_ts, final_response)
    }
}

/// Resolves C-GET-RQ against an [`Index`] and forwards each instance as a
/// C-STORE-RQ sub-operation over the *same* association, per PS3.4 Section
/// C.4.3. Sub-operations are sent on the C-GET request's own presentation
/// context rather than a separately negotiated storage context, a
/// simplification matching [`crate::client::PacsClient::get`] on the
/// requestor side.
pub struct GetHandler {
    abstract_syntaxes: Vec<String>,
    index: Arc<Index>,
    archive: Arc<Archive>,
}

impl GetHandler {
    pub fn new(abstract_syntaxes: Vec<String>, index: Arc<Index>, archive: Arc<Archive>) -> Self {
        GetHandler { abstract_syntaxes, index, archive }
    }
}

impl ServiceHandler for GetHandler {
    fn abstract_syntaxes(&self) -> &[String] {
        &self.abstract_syntaxes
    }

    fn handle(
        &self,
        assoc: &mut ServerAssociation,
        presentation_context_id: u8,
        dataset_ts: &dicom_encoding::TransferSyntax,
        request: Message,
    ) -> dispatcher::Result<()> {
        let message_id = request.message_id().unwrap_or(0);
        let sop_class_uid = request.affected_sop_class_uid().unwrap_or_default();

        let Some(identifier) = request.dataset() else {
            let response = commands::c_get_rsp(message_id, &sop_class_uid, Status::CANNOT_UNDERSTAND, 0, 0, 0, 0);
            return send_response(assoc, presentation_context_id, dataset_ts, response);
        };
        let level = match query_level(identifier) {
            Ok(level) => level,
            Err(_) => {
                let response = commands::c_get_rsp(
                    message_id,
                    &sop_class_uid,
                    Status::IDENTIFIER_DOES_NOT_MATCH_SOP_CLASS,
                    0,
                    0,
                    0,
                    0,
                );
                return send_response(assoc, presentation_context_id, dataset_ts, response);
            }
        };

        let instances = self.index.resolve_instances(level, identifier);
        let total = instances.len() as u16;
        let mut completed = 0u16;
        let mut failed = 0u16;
        let mut sub_message_id = message_id;

        for instance in &instances {
            let remaining = total.saturating_sub(completed + failed + 1);
            let Ok(obj) = self.archive.retrieve(&instance.sop_instance_uid) else {
                failed += 1;
                let progress =
                    commands::c_get_rsp(message_id, &sop_class_uid, Status::PENDING, remaining, completed, failed, 0);
                send_response(assoc, presentation_context_id, dataset_ts, progress)?;
                continue;
            };

            sub_message_id = sub_message_id.wrapping_add(1);
            let store_rq = commands::c_store_rq(
                sub_message_id,
                &instance.sop_class_uid,
                &instance.sop_instance_uid,
                Priority::Medium,
                obj.into_inner(),
            );
            send_response(assoc, presentation_context_id, dataset_ts, store_rq)?;

            match receive_message(assoc, dataset_ts) {
                Ok(rsp) if rsp.status().map(|s| s.is_success()).unwrap_or(false) => completed += 1,
                _ => failed += 1,
            }
            let progress =
                commands::c_get_rsp(message_id, &sop_class_uid, Status::PENDING, remaining, completed, failed, 0);
            send_response(assoc, presentation_context_id, dataset_ts, progress)?;
        }

        let final_status = if failed == 0 {
            Status::SUCCESS
        } else if completed == 0 {
            Status::UNABLE_TO_PERFORM_SUB_OPERATIONS
        } else {
            Status(0xB000)
        };
        let final_response = commands::c_get_rsp(message_id, &sop_class_uid, final_status, 0, completed, failed, 0);
        send_response(assoc, presentation_context_id, dataset_ts, final_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::{dicom_value, DataElement, VR};
    use dicom_transfer_syntax_registry::entries::IMPLICIT_VR_LITTLE_ENDIAN;

    use crate::archive::{Archive, DuplicatePolicy, NamingScheme};

    fn instance(sop_class_uid: &str, sop_instance_uid: &str) -> InMemDicomObject {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(DataElement::new(tags::SOP_CLASS_UID, VR::UI, dicom_value!(Str, sop_class_uid)));
        obj.put(DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, dicom_value!(Str, sop_instance_uid)));
        obj
    }

    fn query_with_level(level: &str) -> InMemDicomObject {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(DataElement::new(tags::QUERY_RETRIEVE_LEVEL, VR::CS, dicom_value!(Str, level)));
        obj
    }

    #[test]
    fn query_level_reads_the_requested_tag() {
        let identifier = query_with_level("STUDY");
        assert!(matches!(query_level(&identifier), Ok(QueryLevel::Study)));
    }

    #[test]
    fn query_level_errors_when_tag_is_absent() {
        let identifier = InMemDicomObject::new_empty();
        assert!(matches!(query_level(&identifier), Err(Error::MissingQueryLevel)));
    }

    #[test]
    fn query_level_errors_on_unrecognized_value() {
        let identifier = query_with_level("FRAME");
        assert!(matches!(query_level(&identifier), Err(Error::UnknownQueryLevel { .. })));
    }

    #[test]
    fn into_storable_derives_meta_from_the_dataset() {
        let dataset = instance("1.2.840.10008.5.1.4.1.1.7", "1.2.3.4.5");
        let file_obj = into_storable(dataset, &IMPLICIT_VR_LITTLE_ENDIAN).unwrap();
        assert_eq!(file_obj.meta().media_storage_sop_class_uid, "1.2.840.10008.5.1.4.1.1.7");
        assert_eq!(file_obj.meta().media_storage_sop_instance_uid, "1.2.3.4.5");
    }

    #[test]
    fn storage_handler_accepts_and_indexes_a_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Arc::new(Archive::new(dir.path(), NamingScheme::Flat, DuplicatePolicy::Reject));
        let index = Arc::new(Index::new());
        let handler = StorageHandler::new(vec!["1.2.840.10008.5.1.4.1.1.7".to_string()], archive.clone(), index.clone());

        let dataset = instance("1.2.840.10008.5.1.4.1.1.7", "1.2.3.4.5");
        let status = handler.store(dataset, &IMPLICIT_VR_LITTLE_ENDIAN);

        assert_eq!(status, Status::SUCCESS);
        assert!(archive.exists("1.2.3.4.5"));
    }

    #[test]
    fn storage_handler_reports_duplicates_under_the_reject_policy() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Arc::new(Archive::new(dir.path(), NamingScheme::Flat, DuplicatePolicy::Reject));
        let index = Arc::new(Index::new());
        let handler = StorageHandler::new(vec!["1.2.840.10008.5.1.4.1.1.7".to_string()], archive, index);

        let first = instance("1.2.840.10008.5.1.4.1.1.7", "1.2.3.4.5");
        assert_eq!(handler.store(first, &IMPLICIT_VR_LITTLE_ENDIAN), Status::SUCCESS);

        let duplicate = instance("1.2.840.10008.5.1.4.1.1.7", "1.2.3.4.5");
        assert_eq!(handler.store(duplicate, &IMPLICIT_VR_LITTLE_ENDIAN), Status::DUPLICATE_SOP_INSTANCE);
    }
}
