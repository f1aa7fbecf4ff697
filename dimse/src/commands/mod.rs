//! Typed builders for the thirteen DIMSE-C/DIMSE-N request and response
//! shapes (PS3.7 Sections 9 and 10), on top of the generic [`crate::Message`].

mod dimse_c;
mod dimse_n;

pub use dimse_c::{
    c_echo_rq, c_echo_rsp, c_find_rq, c_find_rsp, c_get_rq, c_get_rsp, c_move_rq, c_move_rsp,
    c_store_rq, c_store_rsp,
};
pub use dimse_n::{
    n_action_rq, n_action_rsp, n_create_rq, n_create_rsp, n_delete_rq, n_delete_rsp,
    n_event_report_rq, n_event_report_rsp, n_get_rq, n_get_rsp, n_set_rq, n_set_rsp,
};
