//! MLLP byte framing: start/end markers, ISO-8859-1 decoding, escape
//! expansion, and the watermarked receive buffer (spec.md §4.1).

use regex::Regex;
use std::collections::VecDeque;
use std::sync::OnceLock;

pub const START_BLOCK: u8 = 0x0B;
pub const END_BLOCK: u8 = 0x1C;
pub const CARRIAGE_RETURN: u8 = 0x0D;

/// Absolute ceiling on unacknowledged bytes before the connection is
/// dropped as misbehaving.
pub const MAX_STORED: usize = 100_000_000;
/// Crossing this backlog pauses reads.
pub const HIGH_WATERMARK: usize = MAX_STORED / 2;
/// Backlog must fall back below this to resume reads.
pub const LOW_WATERMARK: usize = MAX_STORED * 3 / 10;

/// Wraps a decoded, unframed ACK/payload string in the `0x0B .. 0x1C 0x0D`
/// MLLP envelope, ready to write to the socket.
pub fn frame(payload: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 3);
    out.push(START_BLOCK);
    out.extend_from_slice(payload.as_bytes());
    out.push(END_BLOCK);
    out.push(CARRIAGE_RETURN);
    out
}

/// ISO-8859-1 decode: every byte maps 1:1 onto the Unicode code point of
/// the same ordinal (Latin-1 is, by construction, the first 256 Unicode
/// code points), so this can never fail.
pub fn decode_iso_8859_1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn escape_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\\X([0-9A-Fa-f]+)\\").unwrap())
}

/// Expands HL7 `\Xhh..\` hex-escape sequences into their raw bytes,
/// decoded the same way as the surrounding text (ISO-8859-1).
pub fn expand_escapes(input: &str) -> String {
    escape_pattern()
        .replace_all(input, |caps: &regex::Captures| {
            let hex = &caps[1];
            let bytes: Vec<u8> = hex
                .as_bytes()
                .chunks(2)
                .filter_map(|pair| {
                    let s = std::str::from_utf8(pair).ok()?;
                    u8::from_str_radix(s, 16).ok()
                })
                .collect();
            decode_iso_8859_1(&bytes)
        })
        .into_owned()
}

/// Decodes a raw frame payload per spec.md §4.1: ISO-8859-1, then
/// `\Xhh..\` escape expansion.
pub fn decode_payload(bytes: &[u8]) -> String {
    expand_escapes(&decode_iso_8859_1(bytes))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted,
    Suspend,
    Overrun,
}

/// An extracted, still-unacknowledged frame: its decoded text plus the raw
/// byte length it occupied, needed later to settle the backlog accounting
/// once the ACK has been written (spec.md §4.1 "On successful ACK-write
/// completion, pop the oldest chunk, decrement stored").
#[derive(Debug, Clone)]
pub struct ExtractedFrame {
    pub text: String,
    pub byte_len: usize,
}

/// The per-connection receive buffer: an ordered sequence of received
/// chunks plus the watermarked backlog counter from spec.md §4.1.
///
/// The physical chunk queue (`chunks`) and the backlog counter (`stored`)
/// are deliberately decoupled: bytes leave `chunks` as soon as a complete
/// frame is extracted (so memory for in-flight reassembly doesn't grow
/// unboundedly), but `stored` — which gates the high/low watermark — is
/// only decremented once the frame's ACK has actually been written back,
/// per spec.md §4.1's explicit "on successful ACK-write completion" timing.
#[derive(Debug, Default)]
pub struct RecvBuffer {
    chunks: VecDeque<Vec<u8>>,
    pub stored: usize,
    pub suspended: bool,
}

impl RecvBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_fresh(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Appends a newly received chunk and updates backpressure state.
    /// Returns [`PushOutcome::Overrun`] if `stored` now exceeds
    /// [`MAX_STORED`] — the caller must close the connection in that case.
    pub fn push(&mut self, chunk: Vec<u8>) -> PushOutcome {
        self.stored += chunk.len();
        self.chunks.push_back(chunk);

        if self.stored > MAX_STORED {
            return PushOutcome::Overrun;
        }
        if self.stored > HIGH_WATERMARK && !self.suspended {
            self.suspended = true;
            return PushOutcome::Suspend;
        }
        PushOutcome::Accepted
    }

    /// Validates the start-of-frame invariant: the first byte of the first
    /// chunk of a fresh frame must be [`START_BLOCK`].
    pub fn first_chunk_has_start_block(&self, chunk: &[u8]) -> bool {
        !self.is_fresh() || chunk.first() == Some(&START_BLOCK)
    }

    /// Scans the queued chunks for a complete `0x0B .. 0x1C [0x0D]` frame.
    /// On a match, removes exactly the consumed bytes (leading garbage,
    /// start marker, payload, end marker, and the trailing CR if present)
    /// from the front of the queue, leaving any bytes belonging to the
    /// *next* frame in place, and returns the decoded payload plus how
    /// many bytes it consumed.
    pub fn try_extract_frame(&mut self) -> Option<ExtractedFrame> {
        let flat: Vec<u8> = self.chunks.iter().flatten().copied().collect();
        let start = flat.iter().position(|&b| b == START_BLOCK)?;
        let end = flat[start..].iter().position(|&b| b == END_BLOCK)? + start;

        let mut consumed = end + 1;
        if flat.get(consumed) == Some(&CARRIAGE_RETURN) {
            consumed += 1;
        }

        let payload = &flat[start + 1..end];
        let text = decode_payload(payload);

        self.drain_front(consumed);

        Some(ExtractedFrame {
            text,
            byte_len: consumed,
        })
    }

    fn drain_front(&mut self, mut n: usize) {
        while n > 0 {
            let Some(front) = self.chunks.front_mut() else {
                break;
            };
            if front.len() <= n {
                n -= front.len();
                self.chunks.pop_front();
            } else {
                front.drain(0..n);
                n = 0;
            }
        }
    }

    /// Settles the backlog once a frame's ACK has been fully written back
    /// (spec.md §4.1). Resumes reads if we were suspended and have fallen
    /// back below [`LOW_WATERMARK`].
    pub fn ack_written(&mut self, byte_len: usize) -> bool {
        self.stored = self.stored.saturating_sub(byte_len);
        if self.suspended && self.stored < LOW_WATERMARK {
            self.suspended = false;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_a_payload() {
        let framed = frame("MSA|CA|1");
        assert_eq!(framed.first(), Some(&START_BLOCK));
        assert_eq!(framed[framed.len() - 2], END_BLOCK);
        assert_eq!(framed[framed.len() - 1], CARRIAGE_RETURN);
    }

    #[test]
    fn iso_8859_1_roundtrips_high_bytes() {
        let bytes = [0xE7u8, 0x20, 0x41]; // ç, space, A
        let decoded = decode_iso_8859_1(&bytes);
        assert_eq!(decoded.chars().next().unwrap() as u32, 0xE7);
    }

    #[test]
    fn expands_hex_escape_sequences() {
        let input = r"Rua A\X0D\Linha 2";
        let expanded = expand_escapes(input);
        assert_eq!(expanded, "Rua A\rLinha 2");
    }

    #[test]
    fn extracts_a_complete_frame_across_chunks() {
        let mut buf = RecvBuffer::new();
        buf.push(vec![START_BLOCK]);
        buf.push(b"MSH|^~\\&|A|B|C|D|20240101000000||ADT^A28|1|P|2.5\r".to_vec());
        buf.push(vec![END_BLOCK, CARRIAGE_RETURN]);

        let extracted = buf.try_extract_frame().unwrap();
        assert!(extracted.text.starts_with("MSH|"));
        assert_eq!(extracted.byte_len, buf.stored);
    }

    #[test]
    fn leaves_a_following_frame_untouched() {
        let mut buf = RecvBuffer::new();
        let mut data = vec![START_BLOCK];
        data.extend_from_slice(b"MSH|1\r");
        data.push(END_BLOCK);
        data.push(CARRIAGE_RETURN);
        data.push(START_BLOCK);
        data.extend_from_slice(b"MSH|2\r");
        buf.push(data);

        let first = buf.try_extract_frame().unwrap();
        assert!(first.text.contains("MSH|1"));
        assert!(buf.try_extract_frame().is_none());
    }

    #[test]
    fn rejects_a_fresh_frame_not_starting_with_start_block() {
        let buf = RecvBuffer::new();
        assert!(!buf.first_chunk_has_start_block(b"MSH|"));
    }

    #[test]
    fn overrun_is_reported_past_max_stored() {
        let mut buf = RecvBuffer::new();
        let outcome = buf.push(vec![0u8; MAX_STORED + 1]);
        assert_eq!(outcome, PushOutcome::Overrun);
    }

    #[test]
    fn resumes_once_below_low_watermark() {
        let mut buf = RecvBuffer::new();
        buf.push(vec![0u8; HIGH_WATERMARK + 1]);
        assert!(buf.suspended);
        let resumed = buf.ack_written(HIGH_WATERMARK + 1 - (LOW_WATERMARK - 1));
        assert!(resumed);
        assert!(!buf.suspended);
    }
}
