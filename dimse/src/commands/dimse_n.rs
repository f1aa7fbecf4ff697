//! DIMSE-N builders (PS3.7 Section 10): N-CREATE, N-SET, N-GET, N-ACTION,
//! N-DELETE, N-EVENT-REPORT.

use dicom_core::header::Tag;
use dicom_object::InMemDicomObject;
use dicom_ul::pdu::commands::CommandField;

use crate::message::Message;
use crate::status::Status;

pub fn n_create_rq(
    message_id: u16,
    sop_class_uid: &str,
    sop_instance_uid: Option<&str>,
    attributes: InMemDicomObject,
) -> Message {
    let mut msg = Message::new(CommandField::NCreateRq);
    msg.set_message_id(message_id);
    msg.set_affected_sop_class_uid(sop_class_uid);
    if let Some(uid) = sop_instance_uid {
        msg.set_affected_sop_instance_uid(uid);
    }
    msg.set_dataset(attributes);
    msg
}

pub fn n_create_rsp(
    message_id: u16,
    sop_class_uid: &str,
    sop_instance_uid: &str,
    status: Status,
    attributes: Option<InMemDicomObject>,
) -> Message {
    let mut msg = Message::new(CommandField::NCreateRsp);
    msg.set_message_id_being_responded_to(message_id);
    msg.set_affected_sop_class_uid(sop_class_uid);
    msg.set_affected_sop_instance_uid(sop_instance_uid);
    msg.set_status(status);
    if let Some(attributes) = attributes {
        msg.set_dataset(attributes);
    }
    msg
}

pub fn n_set_rq(
    message_id: u16,
    sop_class_uid: &str,
    sop_instance_uid: &str,
    modification: InMemDicomObject,
) -> Message {
    let mut msg = Message::new(CommandField::NSetRq);
    msg.set_message_id(message_id);
    msg.set_requested_sop_class_uid(sop_class_uid);
    msg.set_requested_sop_instance_uid(sop_instance_uid);
    msg.set_dataset(modification);
    msg
}

pub fn n_set_rsp(
    message_id: u16,
    sop_class_uid: &str,
    sop_instance_uid: &str,
    status: Status,
) -> Message {
    let mut msg = Message::new(CommandField::NSetRsp);
    msg.set_message_id_being_responded_to(message_id);
    msg.set_affected_sop_class_uid(sop_class_uid);
    msg.set_affected_sop_instance_uid(sop_instance_uid);
    msg.set_status(status);
    msg
}

/// `attribute_identifier_list` empty means "return all attributes"
/// (PS3.7 Section 10.1.2).
pub fn n_get_rq(
    message_id: u16,
    sop_class_uid: &str,
    sop_instance_uid: &str,
    attribute_identifier_list: &[Tag],
) -> Message {
    let mut msg = Message::new(CommandField::NGetRq);
    msg.set_message_id(message_id);
    msg.set_requested_sop_class_uid(sop_class_uid);
    msg.set_requested_sop_instance_uid(sop_instance_uid);
    if !attribute_identifier_list.is_empty() {
        msg.set_attribute_identifier_list(attribute_identifier_list);
    }
    msg
}

pub fn n_get_rsp(
    message_id: u16,
    sop_class_uid: &str,
    sop_instance_uid: &str,
    status: Status,
    attributes: Option<InMemDicomObject>,
) -> Message {
    let mut msg = Message::new(CommandField::NGetRsp);
    msg.set_message_id_being_responded_to(message_id);
    msg.set_affected_sop_class_uid(sop_class_uid);
    msg.set_affected_sop_instance_uid(sop_instance_uid);
    msg.set_status(status);
    if let Some(attributes) = attributes {
        msg.set_dataset(attributes);
    }
    msg
}

pub fn n_action_rq(
    message_id: u16,
    sop_class_uid: &str,
    sop_instance_uid: &str,
    action_type_id: u16,
    action_information: Option<InMemDicomObject>,
) -> Message {
    let mut msg = Message::new(CommandField::NActionRq);
    msg.set_message_id(message_id);
    msg.set_requested_sop_class_uid(sop_class_uid);
    msg.set_requested_sop_instance_uid(sop_instance_uid);
    msg.set_action_type_id(action_type_id);
    if let Some(information) = action_information {
        msg.set_dataset(information);
    }
    msg
}

pub fn n_action_rsp(
    message_id: u16,
    sop_class_uid: &str,
    sop_instance_uid: &str,
    action_type_id: u16,
    status: Status,
) -> Message {
    let mut msg = Message::new(CommandField::NActionRsp);
    msg.set_message_id_being_responded_to(message_id);
    msg.set_affected_sop_class_uid(sop_class_uid);
    msg.set_affected_sop_instance_uid(sop_instance_uid);
    msg.set_action_type_id(action_type_id);
    msg.set_status(status);
    msg
}

pub fn n_delete_rq(message_id: u16, sop_class_uid: &str, sop_instance_uid: &str) -> Message {
    let mut msg = Message::new(CommandField::NDeleteRq);
    msg.set_message_id(message_id);
    msg.set_requested_sop_class_uid(sop_class_uid);
    msg.set_requested_sop_instance_uid(sop_instance_uid);
    msg
}

pub fn n_delete_rsp(
    message_id: u16,
    sop_class_uid: &str,
    sop_instance_uid: &str,
    status: Status,
) -> Message {
    let mut msg = Message::new(CommandField::NDeleteRsp);
    msg.set_message_id_being_responded_to(message_id);
    msg.set_affected_sop_class_uid(sop_class_uid);
    msg.set_affected_sop_instance_uid(sop_instance_uid);
    msg.set_status(status);
    msg
}

/// Storage commitment is the only registered user of N-EVENT-REPORT in
/// this workspace; event type 1 is "request successful", 2 is "request
/// complete, failures exist" (PS3.4 Annex J).
pub fn n_event_report_rq(
    message_id: u16,
    sop_class_uid: &str,
    sop_instance_uid: &str,
    event_type_id: u16,
    event_information: InMemDicomObject,
) -> Message {
    let mut msg = Message::new(CommandField::NEventReportRq);
    msg.set_message_id(message_id);
    msg.set_affected_sop_class_uid(sop_class_uid);
    msg.set_affected_sop_instance_uid(sop_instance_uid);
    msg.set_event_type_id(event_type_id);
    msg.set_dataset(event_information);
    msg
}

pub fn n_event_report_rsp(
    message_id: u16,
    sop_class_uid: &str,
    sop_instance_uid: &str,
    event_type_id: u16,
    status: Status,
) -> Message {
    let mut msg = Message::new(CommandField::NEventReportRsp);
    msg.set_message_id_being_responded_to(message_id);
    msg.set_affected_sop_class_uid(sop_class_uid);
    msg.set_affected_sop_instance_uid(sop_instance_uid);
    msg.set_event_type_id(event_type_id);
    msg.set_status(status);
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn n_delete_rq_has_no_dataset() {
        let rq = n_delete_rq(1, "1.2.840.10008.5.1.1.40", "1.2.3.4");
        assert!(!rq.has_dataset());
        assert_eq!(rq.requested_sop_class_uid().as_deref(), Some("1.2.840.10008.5.1.1.40"));
    }

    #[test]
    fn n_get_rq_omits_empty_attribute_list() {
        let rq = n_get_rq(1, "1.2.840.10008.5.1.1.40", "1.2.3.4", &[]);
        assert!(rq.attribute_identifier_list().is_empty());
    }
}
