//! DIMSE command field vocabulary and the PDU-building traits that turn a
//! command plus an optional data set into one or two P-DATA-TF fragments.

use std::convert::TryFrom;

use dicom_core::dicom_value;
use dicom_core::header::Tag;
use dicom_core::{DataElement, VR};
use dicom_dictionary_std::tags;
use dicom_object::{InMemDicomObject, WriteError};
use dicom_transfer_syntax_registry::entries;

use super::{PDataValue, PDataValueType, Pdu};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    fn code(self) -> u16 {
        match self {
            Priority::Medium => 0x0000,
            Priority::High => 0x0001,
            Priority::Low => 0x0002,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandDatasetType {
    Present,
    Absent,
}

impl CommandDatasetType {
    pub fn code(self) -> u16 {
        match self {
            CommandDatasetType::Present => 0x0001,
            CommandDatasetType::Absent => 0x0101,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CommandField {
    CStoreRq,
    CStoreRsp,
    CGetRq,
    CGetRsp,
    CFindRq,
    CFindRsp,
    CMoveRq,
    CMoveRsp,
    CEchoRq,
    CEchoRsp,
    CCancelRq,
    NEventReportRq,
    NEventReportRsp,
    NGetRq,
    NGetRsp,
    NSetRq,
    NSetRsp,
    NActionRq,
    NActionRsp,
    NCreateRq,
    NCreateRsp,
    NDeleteRq,
    NDeleteRsp,
}

impl CommandField {
    pub fn code(self) -> u16 {
        match self {
            CommandField::CStoreRq => 0x0001,
            CommandField::CStoreRsp => 0x8001,
            CommandField::CGetRq => 0x0010,
            CommandField::CGetRsp => 0x8010,
            CommandField::CFindRq => 0x0020,
            CommandField::CFindRsp => 0x8020,
            CommandField::CMoveRq => 0x0021,
            CommandField::CMoveRsp => 0x8021,
            CommandField::CEchoRq => 0x0030,
            CommandField::CEchoRsp => 0x8030,
            CommandField::CCancelRq => 0x0FFF,
            CommandField::NEventReportRq => 0x0100,
            CommandField::NEventReportRsp => 0x8100,
            CommandField::NGetRq => 0x0110,
            CommandField::NGetRsp => 0x8110,
            CommandField::NSetRq => 0x0120,
            CommandField::NSetRsp => 0x8120,
            CommandField::NActionRq => 0x0130,
            CommandField::NActionRsp => 0x8130,
            CommandField::NCreateRq => 0x0140,
            CommandField::NCreateRsp => 0x8140,
            CommandField::NDeleteRq => 0x0150,
            CommandField::NDeleteRsp => 0x8150,
        }
    }

    /// The response opcode paired with this request opcode, if this is a
    /// request at all (`C-CANCEL-RQ` has no response of its own).
    pub fn response(self) -> Option<CommandField> {
        Some(match self {
            CommandField::CStoreRq => CommandField::CStoreRsp,
            CommandField::CGetRq => CommandField::CGetRsp,
            CommandField::CFindRq => CommandField::CFindRsp,
            CommandField::CMoveRq => CommandField::CMoveRsp,
            CommandField::CEchoRq => CommandField::CEchoRsp,
            CommandField::NEventReportRq => CommandField::NEventReportRsp,
            CommandField::NGetRq => CommandField::NGetRsp,
            CommandField::NSetRq => CommandField::NSetRsp,
            CommandField::NActionRq => CommandField::NActionRsp,
            CommandField::NCreateRq => CommandField::NCreateRsp,
            CommandField::NDeleteRq => CommandField::NDeleteRsp,
            CommandField::CCancelRq => return None,
            _ => return None,
        })
    }

    /// Whether this opcode's bit 0x8000 is set, i.e. it is a response
    /// rather than a request.
    pub fn is_response(self) -> bool {
        self.code() & 0x8000 != 0
    }
}

impl TryFrom<u16> for CommandField {
    type Error = u16;

    fn try_from(code: u16) -> Result<Self, u16> {
        Ok(match code {
            0x0001 => CommandField::CStoreRq,
            0x8001 => CommandField::CStoreRsp,
            0x0010 => CommandField::CGetRq,
            0x8010 => CommandField::CGetRsp,
            0x0020 => CommandField::CFindRq,
            0x8020 => CommandField::CFindRsp,
            0x0021 => CommandField::CMoveRq,
            0x8021 => CommandField::CMoveRsp,
            0x0030 => CommandField::CEchoRq,
            0x8030 => CommandField::CEchoRsp,
            0x0FFF => CommandField::CCancelRq,
            0x0100 => CommandField::NEventReportRq,
            0x8100 => CommandField::NEventReportRsp,
            0x0110 => CommandField::NGetRq,
            0x8110 => CommandField::NGetRsp,
            0x0120 => CommandField::NSetRq,
            0x8120 => CommandField::NSetRsp,
            0x0130 => CommandField::NActionRq,
            0x8130 => CommandField::NActionRsp,
            0x0140 => CommandField::NCreateRq,
            0x8140 => CommandField::NCreateRsp,
            0x0150 => CommandField::NDeleteRq,
            0x8150 => CommandField::NDeleteRsp,
            other => return Err(other),
        })
    }
}

/// A DIMSE message: a command set, and (depending on the command) an
/// associated data set to carry alongside it in a second P-DATA-TF
/// fragment.
pub trait Command {
    fn command_field(&self) -> CommandField;
    fn command_set(&self) -> InMemDicomObject;

    /// Encode the command set (and, if `dataset` is given, the data set
    /// too) as one [`Pdu::PData`] addressed to `presentation_context_id`.
    fn encode(
        &self,
        presentation_context_id: u8,
        dataset: Option<(&InMemDicomObject, u32)>,
    ) -> Result<Pdu, WriteError> {
        let mut command_set = self.command_set();
        command_set.put(DataElement::new(
            tags::COMMAND_DATA_SET_TYPE,
            VR::US,
            dicom_value!(U16, [if dataset.is_some() {
                CommandDatasetType::Present.code()
            } else {
                CommandDatasetType::Absent.code()
            }]),
        ));

        let mut command_bytes = Vec::new();
        command_set.write_dataset_with_ts(
            &mut command_bytes,
            &entries::IMPLICIT_VR_LITTLE_ENDIAN,
        )?;

        let mut values = vec![PDataValue {
            presentation_context_id,
            value_type: PDataValueType::Command,
            is_last: true,
            data: command_bytes,
        }];

        if let Some((ds, _max_fragment)) = dataset {
            let mut data_bytes = Vec::new();
            ds.write_dataset_with_ts(&mut data_bytes, &entries::IMPLICIT_VR_LITTLE_ENDIAN)?;
            values.push(PDataValue {
                presentation_context_id,
                value_type: PDataValueType::Data,
                is_last: true,
                data: data_bytes,
            });
        }

        Ok(Pdu::PData { data: values })
    }
}

/// A command that always carries a data set (C-STORE, C-GET response with
/// identifier, C-FIND response with identifier).
pub trait DatasetRequiredCommand: Command {
    fn dataset(&self) -> &InMemDicomObject;

    fn pdu_with_dataset(&self, presentation_context_id: u8) -> Result<Pdu, WriteError> {
        self.encode(presentation_context_id, Some((self.dataset(), 0)))
    }
}

/// A command whose data set is present only conditionally (C-FIND/C-GET/
/// C-MOVE request identifiers, final responses with no identifier).
pub trait DatasetConditionalCommand: Command {
    fn dataset(&self) -> Option<&InMemDicomObject>;

    fn pdu(&self, presentation_context_id: u8) -> Result<Pdu, WriteError> {
        self.encode(presentation_context_id, self.dataset().map(|ds| (ds, 0)))
    }
}

/// A command that never carries a data set (C-ECHO, C-CANCEL).
pub trait DatasetForbiddenCommand: Command {
    fn pdu(&self, presentation_context_id: u8) -> Result<Pdu, WriteError> {
        self.encode(presentation_context_id, None)
    }
}

/// Build the minimal command set shared by every DIMSE-C request:
/// group length, affected SOP class, command field, message ID, and
/// priority.
pub fn base_command_set(
    affected_sop_class_uid: &str,
    command_field: CommandField,
    message_id: u16,
    priority: Priority,
) -> InMemDicomObject {
    let mut obj = InMemDicomObject::new_empty();
    obj.put(DataElement::new(
        tags::AFFECTED_SOP_CLASS_UID,
        VR::UI,
        dicom_value!(Str, affected_sop_class_uid),
    ));
    obj.put(DataElement::new(
        tags::COMMAND_FIELD,
        VR::US,
        dicom_value!(U16, [command_field.code()]),
    ));
    obj.put(DataElement::new(
        tags::MESSAGE_ID,
        VR::US,
        dicom_value!(U16, [message_id]),
    ));
    obj.put(DataElement::new(
        Tag(0x0000, 0x0700),
        VR::US,
        dicom_value!(U16, [priority.code()]),
    ));
    obj
}
