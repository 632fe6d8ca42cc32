//! MLLP transport (spec.md §4.1, component C7): byte framing plus the
//! per-connection state machine built on top of it.

pub mod connection;
pub mod framing;
