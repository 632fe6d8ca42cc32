//! HL7 v2.5 decoding and ACK synthesis (spec.md §4.2, component C3).

pub mod ack;
pub mod parser;
pub mod segments;
pub mod types;

pub use parser::parse_frame;
pub use types::{InboundMessage, InternalErrorData, MessageData, ParseErrorKind};
