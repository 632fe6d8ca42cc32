//! HL7 v2 parsing and ACK synthesis (spec.md §4.2, component C3).

use crate::dispatch::message_type::MessageType;
use crate::hl7::ack::{build_ack, build_error_ack, find_and_parse_msh, CA};
use crate::hl7::segments::{field_of, raw_segments};
use crate::hl7::types::{InboundMessage, InternalErrorData, MessageData, ParseErrorKind};
use std::str::FromStr;

/// Attempts to turn a decoded MLLP frame into an [`InboundMessage`]. On any
/// recognized failure mode, returns the [`InternalErrorData`] that should
/// be ACKed and published to the exceptions topic instead (spec.md §4.2).
pub fn parse_frame(decoded: &str) -> Result<InboundMessage, InternalErrorData> {
    let msg = match hl7_parser::parse_message_with_lenient_newlines(decoded) {
        Ok(msg) => msg,
        Err(e) => {
            let ack = build_error_ack(decoded, &e.to_string());
            return Err(InternalErrorData::new(
                ParseErrorKind::ParseException,
                ack,
                decoded,
            ));
        }
    };

    let msh = match msg.segment("MSH") {
        Some(msh) => msh,
        None => {
            let ack = build_error_ack(decoded, "missing MSH segment");
            return Err(InternalErrorData::new(
                ParseErrorKind::ParseException,
                ack,
                decoded,
            ));
        }
    };

    let message_type_field = msh
        .field(9)
        .map(|f| f.raw_value().to_string())
        .unwrap_or_default();
    let trigger_event = message_type_field
        .split('^')
        .nth(1)
        .unwrap_or("")
        .to_string();
    let message_code = message_type_field
        .split('^')
        .next()
        .unwrap_or("")
        .to_string();

    let control_id = msh
        .field(10)
        .map(|f| f.raw_value().to_string())
        .unwrap_or_default();

    // Incoming ACK acknowledging one of our prior outbound messages: parse
    // it into an InboundMessage carrying the original payload so the
    // connection handler can log it without replying (spec.md §4.1 case a,
    // §4.2 step 4).
    if message_code.eq_ignore_ascii_case("ACK") {
        let msa_code = raw_segments(decoded, "MSA")
            .first()
            .and_then(|seg| field_of(seg, 1))
            .map(str::to_string);
        let msa_control_id = raw_segments(decoded, "MSA")
            .first()
            .and_then(|seg| field_of(seg, 2))
            .unwrap_or(&control_id)
            .to_string();
        let sequential_number = raw_segments(decoded, "MSA")
            .first()
            .and_then(|seg| field_of(seg, 4))
            .map(str::to_string);

        return Ok(InboundMessage {
            bundle_id: msa_control_id,
            ack_msg: decoded.to_string(),
            msg: Some(decoded.to_string()),
            trigger_event: "ACK".to_string(),
            action_code: msa_code,
            activity_area: None,
            sequential_number,
        });
    }

    // Unrecognized trigger event: the structural parse succeeded but we
    // don't know what to do with it at all (spec.md §4.2 step 3).
    if MessageType::from_str(&trigger_event).is_err() {
        let ack = build_error_ack(decoded, &format!("Unknown event {trigger_event}"));
        return Err(InternalErrorData::new(
            ParseErrorKind::ParseException,
            ack,
            decoded,
        ));
    }

    let header = find_and_parse_msh(decoded).unwrap_or_default();
    let ack_msg = build_ack(&header, CA, None);

    let action_code = raw_segments(decoded, "EVN")
        .first()
        .and_then(|seg| field_of(seg, 4))
        .map(str::to_string);
    let activity_area = raw_segments(decoded, "PV1")
        .first()
        .and_then(|seg| field_of(seg, 2))
        .map(str::to_string);
    let sequential_number = raw_segments(decoded, "MSA")
        .first()
        .and_then(|seg| field_of(seg, 4))
        .map(str::to_string);

    Ok(InboundMessage {
        bundle_id: control_id,
        ack_msg,
        msg: None,
        trigger_event,
        action_code,
        activity_area,
        sequential_number,
    })
}

/// Re-parses the stored original message into a typed [`Message`] for the
/// operation dispatcher (spec.md §4.2 "Second-pass parse for dispatch",
/// §3 `MessageData`). `raw` is the decoded frame text stashed on the
/// [`InboundMessage`] path; this runs once routing has already decided the
/// frame is worth projecting.
pub fn second_pass(raw: &str) -> Result<MessageData<'_>, hl7_parser::parser::ParseError> {
    let parsed_data = hl7_parser::parse_message_with_lenient_newlines(raw)?;

    let acknowledgment_code = parsed_data
        .segment("MSA")
        .and_then(|msa| msa.field(1))
        .map(|f| f.raw_value().to_string());
    let message_event = parsed_data
        .segment("MSH")
        .and_then(|msh| msh.field(9))
        .map(|f| f.raw_value().to_string())
        .unwrap_or_default();

    Ok(MessageData {
        acknowledgment_code,
        message_event,
        parsed_data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const A28: &str = "MSH|^~\\&|ORBIS|KH|WEBEPA|KH|20240101120000||ADT^A28^ADT_A05|MSG0001|P|2.5\rEVN|A28|20240101120000\rPID|1||12345^^^SONHO^NS||DOE^JOHN^M||19800101|M|||Rua A^^Lisboa^^1000-001^PT^C^^110503\r";

    #[test]
    fn happy_path_a28_produces_ca_ack() {
        let inbound = parse_frame(A28).unwrap();
        assert_eq!(inbound.trigger_event, "A28");
        assert_eq!(inbound.bundle_id, "MSG0001");
        assert!(inbound.ack_msg.contains("MSA|CA|MSG0001"));
        // EVN|A28|20240101120000 has no EVN-4 (that's EVN-2, the recorded
        // date/time); action_code is only populated when EVN-4 is present.
        assert_eq!(inbound.action_code.as_deref(), None);
        assert!(!inbound.is_ack());
    }

    #[test]
    fn unknown_trigger_event_is_a_parse_error() {
        let payload = "MSH|^~\\&|A|B|C|D|20240101120000||ADT^Z99^ADT_A05|1|P|2.5\r";
        let err = parse_frame(payload).unwrap_err();
        assert_eq!(err.error, ParseErrorKind::ParseException);
        assert!(err.exception_ack_msg.contains("MSA|CE"));
    }

    #[test]
    fn malformed_header_is_a_parse_error() {
        let payload = "PID|1||12345\r";
        let err = parse_frame(payload).unwrap_err();
        assert_eq!(err.error, ParseErrorKind::ParseException);
    }

    #[test]
    fn incoming_ack_is_flagged_and_not_reacknowledged() {
        let payload = "MSH|^~\\&|WEBEPA|KH|ORBIS|KH|20240101120000||ACK|MSG0001|P|2.5\rMSA|AA|MSG0001\r";
        let inbound = parse_frame(payload).unwrap();
        assert!(inbound.is_ack());
        assert_eq!(inbound.msg, Some(payload.to_string()));
    }
}
