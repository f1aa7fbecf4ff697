//! [`Message`]: a DIMSE command set plus an optional data set, the unit
//! exchanged between a [`crate::dispatcher::Dispatcher`] (or a client
//! association) and a [`crate::ServiceHandler`].

use std::convert::TryFrom;

use snafu::{OptionExt, ResultExt, Snafu};

use dicom_core::header::Tag;
use dicom_core::{DataElement, VR};
use dicom_dictionary_std::tags;
use dicom_encoding::TransferSyntax;
use dicom_object::InMemDicomObject;
use dicom_transfer_syntax_registry::entries;
use dicom_ul::pdu::commands::{CommandDatasetType, CommandField, Priority};
use dicom_ul::pdu::{PDataValue, PDataValueType};
use dicom_ul::Pdu;

use crate::status::Status;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("command set is missing a Command Field element"))]
    MissingCommandField { source: dicom_object::AccessError },
    #[snafu(display("command set carries an unrecognized Command Field 0x{:04X}", code))]
    UnrecognizedCommandField { code: u16 },
    #[snafu(display("could not decode command set"))]
    DecodeCommandSet { source: dicom_object::ReadError },
    #[snafu(display("could not decode data set"))]
    DecodeDataSet { source: dicom_object::ReadError },
    #[snafu(display("could not encode command set"))]
    EncodeCommandSet { source: dicom_object::WriteError },
    #[snafu(display("could not encode data set"))]
    EncodeDataSet { source: dicom_object::WriteError },
    #[snafu(display("no command fragment was received before the final P-DATA-TF"))]
    MissingCommandFragment,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Each presentation-data-value item costs 4 bytes of item length plus 1
/// byte of presentation-context-id plus 1 byte of message control header
/// on top of its data (PS3.8 Section 9.3.1.1); a one-item P-DATA-TF PDU's
/// body is therefore 6 bytes larger than the data it carries.
const PDV_ITEM_OVERHEAD: u32 = 6;

/// The largest single PDV payload a P-DATA-TF PDU bounded by
/// `max_pdu_length` can carry, for a PDU holding exactly one item.
fn fragment_capacity(max_pdu_length: u32) -> usize {
    max_pdu_length.saturating_sub(PDV_ITEM_OVERHEAD).max(1) as usize
}

/// Split `bytes` into one-item P-DATA-TF PDUs of at most
/// `max_fragment_len` bytes each, marking only the last as `is_last`.
fn fragment_into_pdus(
    presentation_context_id: u8,
    value_type: PDataValueType,
    bytes: Vec<u8>,
    max_fragment_len: usize,
) -> Vec<Pdu> {
    if bytes.is_empty() {
        return vec![Pdu::PData {
            data: vec![PDataValue {
                presentation_context_id,
                value_type,
                is_last: true,
                data: bytes,
            }],
        }];
    }

    let mut pdus = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let end = (offset + max_fragment_len).min(bytes.len());
        pdus.push(Pdu::PData {
            data: vec![PDataValue {
                presentation_context_id,
                value_type,
                is_last: end == bytes.len(),
                data: bytes[offset..end].to_vec(),
            }],
        });
        offset = end;
    }
    pdus
}

/// A DIMSE command set plus an optional data set. The command set is
/// always implicit-VR little-endian on the wire, regardless of the
/// presentation context's negotiated transfer syntax, which applies only
/// to the data set (PS3.7 Section 6.3.1).
#[derive(Debug, Clone)]
pub struct Message {
    command_set: InMemDicomObject,
    dataset: Option<InMemDicomObject>,
}

impl Message {
    /// Start building a message carrying the given opcode and message ID.
    /// `message_id` is the requestor-chosen ID for a request, or the ID
    /// being responded to for a response -- callers set the matching tag
    /// explicitly via [`Message::set_message_id`] /
    /// [`Message::set_message_id_being_responded_to`].
    pub fn new(command_field: CommandField) -> Self {
        let mut command_set = InMemDicomObject::new_empty();
        command_set.put(DataElement::new(
            tags::COMMAND_FIELD,
            VR::US,
            dicom_core::dicom_value!(U16, [command_field.code()]),
        ));
        Message {
            command_set,
            dataset: None,
        }
    }

    pub fn command_set(&self) -> &InMemDicomObject {
        &self.command_set
    }

    pub fn command_set_mut(&mut self) -> &mut InMemDicomObject {
        &mut self.command_set
    }

    pub fn command_field(&self) -> Result<CommandField> {
        let code = self
            .command_set
            .element(tags::COMMAND_FIELD)
            .context(MissingCommandFieldSnafu)?
            .uint16()
            .map_err(|_| Error::UnrecognizedCommandField { code: 0 })?;
        CommandField::try_from(code).map_err(|code| Error::UnrecognizedCommandField { code })
    }

    pub fn has_dataset(&self) -> bool {
        self.dataset.is_some()
    }

    pub fn dataset(&self) -> Option<&InMemDicomObject> {
        self.dataset.as_ref()
    }

    pub fn dataset_mut(&mut self) -> Option<&mut InMemDicomObject> {
        self.dataset.as_mut()
    }

    pub fn set_dataset(&mut self, dataset: InMemDicomObject) {
        self.dataset = Some(dataset);
    }

    pub fn clear_dataset(&mut self) {
        self.dataset = None;
    }

    fn put_u16(&mut self, tag: Tag, vr: VR, value: u16) {
        self.command_set
            .put(DataElement::new(tag, vr, dicom_core::dicom_value!(U16, [value])));
    }

    fn put_str(&mut self, tag: Tag, vr: VR, value: &str) {
        self.command_set
            .put(DataElement::new(tag, vr, dicom_core::dicom_value!(Str, value)));
    }

    fn get_str(&self, tag: Tag) -> Option<String> {
        self.command_set
            .element(tag)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.into_owned())
    }

    fn get_u16(&self, tag: Tag) -> Option<u16> {
        self.command_set.element(tag).ok().and_then(|e| e.uint16().ok())
    }

    pub fn message_id(&self) -> Option<u16> {
        self.get_u16(tags::MESSAGE_ID)
    }

    pub fn set_message_id(&mut self, id: u16) {
        self.put_u16(tags::MESSAGE_ID, VR::US, id);
    }

    pub fn message_id_being_responded_to(&self) -> Option<u16> {
        self.get_u16(tags::MESSAGE_ID_BEING_RESPONDED_TO)
    }

    pub fn set_message_id_being_responded_to(&mut self, id: u16) {
        self.put_u16(tags::MESSAGE_ID_BEING_RESPONDED_TO, VR::US, id);
    }

    pub fn affected_sop_class_uid(&self) -> Option<String> {
        self.get_str(tags::AFFECTED_SOP_CLASS_UID)
    }

    pub fn set_affected_sop_class_uid(&mut self, uid: &str) {
        self.put_str(tags::AFFECTED_SOP_CLASS_UID, VR::UI, uid);
    }

    pub fn affected_sop_instance_uid(&self) -> Option<String> {
        self.get_str(tags::AFFECTED_SOP_INSTANCE_UID)
    }

    pub fn set_affected_sop_instance_uid(&mut self, uid: &str) {
        self.put_str(tags::AFFECTED_SOP_INSTANCE_UID, VR::UI, uid);
    }

    pub fn requested_sop_class_uid(&self) -> Option<String> {
        self.get_str(tags::REQUESTED_SOP_CLASS_UID)
    }

    pub fn set_requested_sop_class_uid(&mut self, uid: &str) {
        self.put_str(tags::REQUESTED_SOP_CLASS_UID, VR::UI, uid);
    }

    pub fn requested_sop_instance_uid(&self) -> Option<String> {
        self.get_str(tags::REQUESTED_SOP_INSTANCE_UID)
    }

    pub fn set_requested_sop_instance_uid(&mut self, uid: &str) {
        self.put_str(tags::REQUESTED_SOP_INSTANCE_UID, VR::UI, uid);
    }

    pub fn priority(&self) -> Option<Priority> {
        self.get_u16(tags::PRIORITY).map(|code| match code {
            0x0001 => Priority::High,
            0x0002 => Priority::Low,
            _ => Priority::Medium,
        })
    }

    pub fn set_priority(&mut self, priority: Priority) {
        let code = match priority {
            Priority::Medium => 0x0000,
            Priority::High => 0x0001,
            Priority::Low => 0x0002,
        };
        self.put_u16(tags::PRIORITY, VR::US, code);
    }

    pub fn status(&self) -> Option<Status> {
        self.get_u16(tags::STATUS).map(Status::from)
    }

    pub fn set_status(&mut self, status: Status) {
        self.put_u16(tags::STATUS, VR::US, status.0);
    }

    pub fn move_destination(&self) -> Option<String> {
        self.get_str(tags::MOVE_DESTINATION)
    }

    pub fn set_move_destination(&mut self, ae_title: &str) {
        self.put_str(tags::MOVE_DESTINATION, VR::AE, ae_title);
    }

    pub fn event_type_id(&self) -> Option<u16> {
        self.get_u16(tags::EVENT_TYPE_ID)
    }

    pub fn set_event_type_id(&mut self, id: u16) {
        self.put_u16(tags::EVENT_TYPE_ID, VR::US, id);
    }

    pub fn action_type_id(&self) -> Option<u16> {
        self.get_u16(tags::ACTION_TYPE_ID)
    }

    pub fn set_action_type_id(&mut self, id: u16) {
        self.put_u16(tags::ACTION_TYPE_ID, VR::US, id);
    }

    /// The Attribute Identifier List (0000,1005), as used by N-GET to
    /// select which attributes the SCP should return.
    pub fn attribute_identifier_list(&self) -> Vec<Tag> {
        match self.command_set.element(tags::ATTRIBUTE_IDENTIFIER_LIST) {
            Ok(element) => match element.value().primitive() {
                Some(dicom_core::PrimitiveValue::Tags(tags)) => tags.to_vec(),
                _ => Vec::new(),
            },
            Err(_) => Vec::new(),
        }
    }

    pub fn set_attribute_identifier_list(&mut self, tag_list: &[Tag]) {
        self.command_set.put(DataElement::new(
            tags::ATTRIBUTE_IDENTIFIER_LIST,
            VR::AT,
            dicom_core::PrimitiveValue::Tags(tag_list.iter().copied().collect()),
        ));
    }

    pub fn remaining_subops(&self) -> Option<u16> {
        self.get_u16(tags::NUMBER_OF_REMAINING_SUBOPERATIONS)
    }

    pub fn set_remaining_subops(&mut self, count: u16) {
        self.put_u16(tags::NUMBER_OF_REMAINING_SUBOPERATIONS, VR::US, count);
    }

    pub fn completed_subops(&self) -> Option<u16> {
        self.get_u16(tags::NUMBER_OF_COMPLETED_SUBOPERATIONS)
    }

    pub fn set_completed_subops(&mut self, count: u16) {
        self.put_u16(tags::NUMBER_OF_COMPLETED_SUBOPERATIONS, VR::US, count);
    }

    pub fn failed_subops(&self) -> Option<u16> {
        self.get_u16(tags::NUMBER_OF_FAILED_SUBOPERATIONS)
    }

    pub fn set_failed_subops(&mut self, count: u16) {
        self.put_u16(tags::NUMBER_OF_FAILED_SUBOPERATIONS, VR::US, count);
    }

    pub fn warning_subops(&self) -> Option<u16> {
        self.get_u16(tags::NUMBER_OF_WARNING_SUBOPERATIONS)
    }

    pub fn set_warning_subops(&mut self, count: u16) {
        self.put_u16(tags::NUMBER_OF_WARNING_SUBOPERATIONS, VR::US, count);
    }

    /// Encode this message as one or more [`Pdu::PData`] PDUs, command
    /// PDVs always in PDUs separate from data PDVs (PS3.7 Section 9.3.1,
    /// SPEC_FULL Section 4.6/8). Each stream is fragmented into PDVs no
    /// larger than `max_pdu_length` (the peer's negotiated maximum PDU
    /// length) permits, so a single command set or data set that would
    /// otherwise overflow the peer's receive buffer is split across
    /// several P-DATA-TF PDUs instead of one oversized PDU. `CommandGroupLength`
    /// and `CommandDataSetType` are (re)computed here, just before encoding.
    pub fn encode(
        &mut self,
        presentation_context_id: u8,
        dataset_ts: &TransferSyntax,
        max_pdu_length: u32,
    ) -> Result<Vec<Pdu>> {
        self.put_u16(
            tags::COMMAND_DATA_SET_TYPE,
            VR::US,
            if self.dataset.is_some() {
                CommandDatasetType::Present.code()
            } else {
                CommandDatasetType::Absent.code()
            },
        );

        let mut probe = Vec::new();
        self.command_set
            .write_dataset_with_ts(&mut probe, &entries::IMPLICIT_VR_LITTLE_ENDIAN)
            .context(EncodeCommandSetSnafu)?;
        self.command_set.put(DataElement::new(
            tags::COMMAND_GROUP_LENGTH,
            VR::UL,
            dicom_core::dicom_value!(U32, [probe.len() as u32]),
        ));

        let mut command_bytes = Vec::new();
        self.command_set
            .write_dataset_with_ts(&mut command_bytes, &entries::IMPLICIT_VR_LITTLE_ENDIAN)
            .context(EncodeCommandSetSnafu)?;

        let max_fragment_len = fragment_capacity(max_pdu_length);

        let mut pdus = fragment_into_pdus(
            presentation_context_id,
            PDataValueType::Command,
            command_bytes,
            max_fragment_len,
        );

        if let Some(dataset) = &self.dataset {
            let mut data_bytes = Vec::new();
            dataset
                .write_dataset_with_ts(&mut data_bytes, dataset_ts)
                .context(EncodeDataSetSnafu)?;
            pdus.extend(fragment_into_pdus(
                presentation_context_id,
                PDataValueType::Data,
                data_bytes,
                max_fragment_len,
            ));
        }

        Ok(pdus)
    }

    /// Reassemble a message from the presentation-data-values collected
    /// for one presentation context across one or more P-DATA-TF PDUs.
    /// `fragments` must be in arrival order; fragments are concatenated
    /// by [`PDataValueType`] before decoding.
    pub fn decode(fragments: &[PDataValue], dataset_ts: &TransferSyntax) -> Result<Self> {
        let mut command_bytes = Vec::new();
        let mut data_bytes = Vec::new();
        let mut saw_command = false;
        for fragment in fragments {
            match fragment.value_type {
                PDataValueType::Command => {
                    saw_command = true;
                    command_bytes.extend_from_slice(&fragment.data);
                }
                PDataValueType::Data => data_bytes.extend_from_slice(&fragment.data),
            }
        }
        if !saw_command {
            return MissingCommandFragmentSnafu.fail();
        }

        let command_set = InMemDicomObject::read_dataset_with_ts(
            command_bytes.as_slice(),
            &entries::IMPLICIT_VR_LITTLE_ENDIAN,
        )
        .context(DecodeCommandSetSnafu)?;

        let dataset = if data_bytes.is_empty() {
            None
        } else {
            Some(
                InMemDicomObject::read_dataset_with_ts(data_bytes.as_slice(), dataset_ts)
                    .context(DecodeDataSetSnafu)?,
            )
        };

        Ok(Message { command_set, dataset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::dicom_value;
    use dicom_transfer_syntax_registry::entries::IMPLICIT_VR_LITTLE_ENDIAN;

    fn message_with_dataset(tag_count: usize) -> Message {
        let mut message = Message::new(CommandField::CStoreRq);
        message.set_message_id(1);
        message.set_affected_sop_class_uid("1.2.840.10008.5.1.4.1.1.7");
        let mut dataset = InMemDicomObject::new_empty();
        for i in 0..tag_count {
            dataset.put(DataElement::new(
                Tag(0x0009, 0x0001 + i as u16),
                VR::LO,
                dicom_value!(Str, "x".repeat(64)),
            ));
        }
        message.set_dataset(dataset);
        message
    }

    #[test]
    fn never_mixes_command_and_data_pdvs_in_one_pdu() {
        let mut message = message_with_dataset(4);
        let pdus = message.encode(1, &IMPLICIT_VR_LITTLE_ENDIAN, 16384).unwrap();
        for pdu in &pdus {
            let Pdu::PData { data } = pdu else {
                panic!("expected a P-DATA-TF PDU");
            };
            let types: std::collections::HashSet<_> = data.iter().map(|v| v.value_type).collect();
            assert_eq!(types.len(), 1, "a single PDU mixed command and data PDVs");
        }
    }

    #[test]
    fn fragments_a_dataset_larger_than_the_peer_max_pdu() {
        let mut message = message_with_dataset(64);
        let max_pdu_length = 256;
        let pdus = message.encode(1, &IMPLICIT_VR_LITTLE_ENDIAN, max_pdu_length).unwrap();
        assert!(pdus.len() > 2, "expected the data set to split across multiple PDUs");

        let mut last_data_seen = false;
        for pdu in &pdus {
            let Pdu::PData { data } = pdu else {
                panic!("expected a P-DATA-TF PDU");
            };
            assert_eq!(data.len(), 1);
            let value = &data[0];
            let body_len = 6 + value.data.len();
            assert!(body_len as u32 <= max_pdu_length, "PDU body exceeded the negotiated max-pdu");
            if value.value_type == PDataValueType::Data && value.is_last {
                last_data_seen = true;
            }
        }
        assert!(last_data_seen, "no data fragment was marked as the last");
    }

    #[test]
    fn round_trips_through_encode_and_decode_when_fragmented() {
        let mut message = message_with_dataset(64);
        let pdus = message.encode(1, &IMPLICIT_VR_LITTLE_ENDIAN, 256).unwrap();

        let fragments: Vec<PDataValue> = pdus
            .into_iter()
            .flat_map(|pdu| match pdu {
                Pdu::PData { data } => data,
                _ => unreachable!(),
            })
            .collect();

        let decoded = Message::decode(&fragments, &IMPLICIT_VR_LITTLE_ENDIAN).unwrap();
        assert_eq!(decoded.affected_sop_class_uid(), message.affected_sop_class_uid());
        assert!(decoded.has_dataset());
    }
}
