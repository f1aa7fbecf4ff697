//! The DIMSE message-service layer (PS3.7): typed request/response
//! builders for the DIMSE-C and DIMSE-N opcodes, generic message
//! encode/decode, and the service dispatcher that routes inbound
//! requests to registered handlers by abstract syntax.

pub mod commands;
pub mod dispatcher;
pub mod message;
pub mod status;

pub use commands::*;
pub use dispatcher::{Dispatcher, ServiceHandler};
pub use message::Message;
pub use status::Status;
