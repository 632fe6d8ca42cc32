use uuid::Uuid;

/// The parser's success output for a single MLLP frame (spec.md §3).
///
/// Lives only while the frame is being processed; built once and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Control ID the Bundle/ACK should key on — the inbound `MSH-10`.
    pub bundle_id: String,
    /// The encoded ACK, ready to be MLLP-framed and written back.
    pub ack_msg: String,
    /// Present when the inbound frame was itself an ACK: the original
    /// payload, so the handler can log/echo it without replying.
    pub msg: Option<String>,
    /// `MSH-9.2`, e.g. `A28`.
    pub trigger_event: String,
    /// `EVN-4`, when present.
    pub action_code: Option<String>,
    /// `PV1-2`, when present.
    pub activity_area: Option<String>,
    /// `MSA-4`, when present.
    pub sequential_number: Option<String>,
}

impl InboundMessage {
    /// True when the inbound frame is itself an ACK acknowledging a prior
    /// outbound message (spec.md §4.1, case (a)): no publish, no reply.
    pub fn is_ack(&self) -> bool {
        self.trigger_event.eq_ignore_ascii_case("ACK")
    }
}

/// Why a frame failed to become an [`InboundMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    ParseException,
    NotSupported,
}

/// The parser's failure output (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalErrorData {
    pub exception_id: Uuid,
    pub error: ParseErrorKind,
    /// MLLP-ready (unframed) CE ACK built from the MSH segment alone.
    pub exception_ack_msg: String,
    /// Sanitized source text: CR/LF stripped.
    pub original_msg: String,
}

impl InternalErrorData {
    pub fn new(error: ParseErrorKind, exception_ack_msg: String, original: &str) -> Self {
        InternalErrorData {
            exception_id: Uuid::new_v4(),
            error,
            exception_ack_msg,
            original_msg: sanitize(original),
        }
    }
}

fn sanitize(input: &str) -> String {
    input.replace(['\r', '\n'], "")
}

/// The second-pass, post-dispatch parse used by operations (spec.md §3).
#[derive(Debug, Clone)]
pub struct MessageData<'a> {
    pub acknowledgment_code: Option<String>,
    pub message_event: String,
    pub parsed_data: hl7_parser::Message<'a>,
}
