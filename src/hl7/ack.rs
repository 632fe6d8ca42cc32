//! HL7 v2.5 ACK synthesis (spec.md §4.2).
//!
//! We hand-roll ACK construction rather than depend on `hl7-parser` for it:
//! the crate is a structural parser, not a HAPI-style message-model
//! toolkit with a `generateACK` helper, and an ACK is simple enough
//! (two segments, a handful of swapped header fields) to build directly.

use crate::hl7::segments::field_of;
use chrono::Local;

/// Acknowledgment codes used by this gateway (spec.md GLOSSARY).
pub const CA: &str = "CA";
pub const CE: &str = "CE";

#[derive(Debug, Clone, Default)]
pub struct MshHeader {
    pub sending_app: String,
    pub sending_facility: String,
    pub receiving_app: String,
    pub receiving_facility: String,
    pub control_id: String,
    pub version: String,
}

const UNKNOWN: &str = "UNKNOWN";

/// Extracts the handful of MSH fields an ACK needs from a raw `MSH` segment
/// line. Missing fields default to `"UNKNOWN"` rather than failing — a
/// malformed header is exactly the case that needs an ACK back.
///
/// `MSH-1` is the field separator itself, so `field_of`'s 1-based,
/// post-segment-name split is one behind the MSH field numbering: `MSH-n`
/// lives at `field_of(raw_msh, n - 1)`.
pub fn parse_msh_header(raw_msh: &str) -> MshHeader {
    MshHeader {
        sending_app: field_of(raw_msh, 2).unwrap_or(UNKNOWN).to_string(),
        sending_facility: field_of(raw_msh, 3).unwrap_or(UNKNOWN).to_string(),
        receiving_app: field_of(raw_msh, 4).unwrap_or(UNKNOWN).to_string(),
        receiving_facility: field_of(raw_msh, 5).unwrap_or(UNKNOWN).to_string(),
        control_id: field_of(raw_msh, 9).unwrap_or(UNKNOWN).to_string(),
        version: field_of(raw_msh, 11).unwrap_or("2.5").to_string(),
    }
}

/// Finds the first line of `payload` that is (or contains) an `MSH`
/// segment and parses just its header fields (spec.md §4.2, "ACK synthesis
/// on header-only failure").
pub fn find_and_parse_msh(payload: &str) -> Option<MshHeader> {
    payload
        .split(['\r', '\n'])
        .map(str::trim)
        .find(|line| line.starts_with("MSH"))
        .map(parse_msh_header)
}

/// Builds an MLLP-ready (unframed) ACK. The original sender/receiver are
/// swapped, since we are now replying to them.
pub fn build_ack(header: &MshHeader, code: &str, text: Option<&str>) -> String {
    let now = Local::now().format("%Y%m%d%H%M%S");
    let msh = format!(
        "MSH|^~\\&|{}|{}|{}|{}|{}||ACK|{}|P|{}",
        header.receiving_app,
        header.receiving_facility,
        header.sending_app,
        header.sending_facility,
        now,
        header.control_id,
        header.version,
    );
    let msa = match text {
        Some(text) => format!("MSA|{}|{}|{}", code, header.control_id, text),
        None => format!("MSA|{}|{}", code, header.control_id),
    };
    format!("{msh}\r{msa}\r")
}

/// Builds a `CE` ACK straight from the failing payload's MSH line (or
/// `UNKNOWN` placeholders if even that can't be found), carrying
/// `error_message` in `MSA-3`.
pub fn build_error_ack(payload: &str, error_message: &str) -> String {
    let header = find_and_parse_msh(payload).unwrap_or_default();
    build_ack(&header, CE, Some(error_message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_accept_ack_with_swapped_header() {
        let header = MshHeader {
            sending_app: "ORBIS".into(),
            sending_facility: "KH".into(),
            receiving_app: "WEBEPA".into(),
            receiving_facility: "KH".into(),
            control_id: "MSG0001".into(),
            version: "2.5".into(),
        };
        let ack = build_ack(&header, CA, None);
        assert!(ack.starts_with("MSH|^~\\&|WEBEPA|KH|ORBIS|KH|"));
        assert!(ack.contains("MSA|CA|MSG0001"));
    }

    #[test]
    fn finds_msh_even_when_payload_starts_with_other_segments() {
        let payload = "PID|1||123\rMSH|^~\\&|A|B|C|D|20240101000000||ADT^A28|MSG1|P|2.5\r";
        let header = find_and_parse_msh(payload).unwrap();
        assert_eq!(header.control_id, "MSG1");
    }

    #[test]
    fn falls_back_to_unknown_when_no_msh_present() {
        let ack = build_error_ack("PID|1||123\r", "missing MSH");
        assert!(ack.contains("MSA|CE|UNKNOWN|missing MSH"));
    }
}
