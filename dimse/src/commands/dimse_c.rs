//! DIMSE-C builders (PS3.7 Section 9): C-ECHO, C-STORE, C-FIND, C-MOVE,
//! C-GET.

use dicom_object::InMemDicomObject;
use dicom_ul::pdu::commands::{CommandField, Priority};

use crate::message::Message;
use crate::status::Status;

pub fn c_echo_rq(message_id: u16, sop_class_uid: &str) -> Message {
    let mut msg = Message::new(CommandField::CEchoRq);
    msg.set_message_id(message_id);
    msg.set_affected_sop_class_uid(sop_class_uid);
    msg.set_priority(Priority::Medium);
    msg
}

pub fn c_echo_rsp(message_id: u16, sop_class_uid: &str, status: Status) -> Message {
    let mut msg = Message::new(CommandField::CEchoRsp);
    msg.set_message_id_being_responded_to(message_id);
    msg.set_affected_sop_class_uid(sop_class_uid);
    msg.set_status(status);
    msg
}

pub fn c_store_rq(
    message_id: u16,
    sop_class_uid: &str,
    sop_instance_uid: &str,
    priority: Priority,
    dataset: InMemDicomObject,
) -> Message {
    let mut msg = Message::new(CommandField::CStoreRq);
    msg.set_message_id(message_id);
    msg.set_affected_sop_class_uid(sop_class_uid);
    msg.set_affected_sop_instance_uid(sop_instance_uid);
    msg.set_priority(priority);
    msg.set_dataset(dataset);
    msg
}

pub fn c_store_rsp(
    message_id: u16,
    sop_class_uid: &str,
    sop_instance_uid: &str,
    status: Status,
) -> Message {
    let mut msg = Message::new(CommandField::CStoreRsp);
    msg.set_message_id_being_responded_to(message_id);
    msg.set_affected_sop_class_uid(sop_class_uid);
    msg.set_affected_sop_instance_uid(sop_instance_uid);
    msg.set_status(status);
    msg
}

/// A C-FIND-RQ carries the query level and matching keys in its data set,
/// which the caller attaches via the returned message's `set_dataset`.
pub fn c_find_rq(message_id: u16, sop_class_uid: &str, identifier: InMemDicomObject) -> Message {
    let mut msg = Message::new(CommandField::CFindRq);
    msg.set_message_id(message_id);
    msg.set_affected_sop_class_uid(sop_class_uid);
    msg.set_priority(Priority::Medium);
    msg.set_dataset(identifier);
    msg
}

/// One response in the C-FIND response stream. `status` should be
/// [`Status::PENDING`] for every response but the last, which carries
/// [`Status::SUCCESS`] (or a failure/cancel status) and no identifier.
pub fn c_find_rsp(
    message_id: u16,
    sop_class_uid: &str,
    status: Status,
    identifier: Option<InMemDicomObject>,
) -> Message {
    let mut msg = Message::new(CommandField::CFindRsp);
    msg.set_message_id_being_responded_to(message_id);
    msg.set_affected_sop_class_uid(sop_class_uid);
    msg.set_status(status);
    if let Some(identifier) = identifier {
        msg.set_dataset(identifier);
    }
    msg
}

pub fn c_move_rq(
    message_id: u16,
    sop_class_uid: &str,
    move_destination: &str,
    identifier: InMemDicomObject,
) -> Message {
    let mut msg = Message::new(CommandField::CMoveRq);
    msg.set_message_id(message_id);
    msg.set_affected_sop_class_uid(sop_class_uid);
    msg.set_priority(Priority::Medium);
    msg.set_move_destination(move_destination);
    msg.set_dataset(identifier);
    msg
}

#[allow(clippy::too_many_arguments)]
pub fn c_move_rsp(
    message_id: u16,
    sop_class_uid: &str,
    status: Status,
    remaining: u16,
    completed: u16,
    failed: u16,
    warning: u16,
) -> Message {
    let mut msg = Message::new(CommandField::CMoveRsp);
    msg.set_message_id_being_responded_to(message_id);
    msg.set_affected_sop_class_uid(sop_class_uid);
    msg.set_status(status);
    msg.set_remaining_subops(remaining);
    msg.set_completed_subops(completed);
    msg.set_failed_subops(failed);
    msg.set_warning_subops(warning);
    msg
}

pub fn c_get_rq(message_id: u16, sop_class_uid: &str, identifier: InMemDicomObject) -> Message {
    let mut msg = Message::new(CommandField::CGetRq);
    msg.set_message_id(message_id);
    msg.set_affected_sop_class_uid(sop_class_uid);
    msg.set_priority(Priority::Medium);
    msg.set_dataset(identifier);
    msg
}

#[allow(clippy::too_many_arguments)]
pub fn c_get_rsp(
    message_id: u16,
    sop_class_uid: &str,
    status: Status,
    remaining: u16,
    completed: u16,
    failed: u16,
    warning: u16,
) -> Message {
    let mut msg = Message::new(CommandField::CGetRsp);
    msg.set_message_id_being_responded_to(message_id);
    msg.set_affected_sop_class_uid(sop_class_uid);
    msg.set_status(status);
    msg.set_remaining_subops(remaining);
    msg.set_completed_subops(completed);
    msg.set_failed_subops(failed);
    msg.set_warning_subops(warning);
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_echo_round_trips_through_message_accessors() {
        let rq = c_echo_rq(7, "1.2.840.10008.1.1");
        assert_eq!(rq.message_id(), Some(7));
        assert_eq!(rq.affected_sop_class_uid().as_deref(), Some("1.2.840.10008.1.1"));
        assert!(!rq.has_dataset());

        let rsp = c_echo_rsp(7, "1.2.840.10008.1.1", Status::SUCCESS);
        assert_eq!(rsp.message_id_being_responded_to(), Some(7));
        assert_eq!(rsp.status(), Some(Status::SUCCESS));
    }

    #[test]
    fn c_move_rsp_carries_suboperation_counters() {
        let rsp = c_move_rsp(3, "1.2.840.10008.5.1.4.1.2.1.2", Status::PENDING, 4, 1, 0, 0);
        assert_eq!(rsp.remaining_subops(), Some(4));
        assert_eq!(rsp.completed_subops(), Some(1));
    }
}
