//! Raw segment/field/repeat access used where the structured parser only
//! gives us the first occurrence of a segment or field.
//!
//! `hl7_parser::Message` (as used for the primary parse and single-valued
//! field access, the way the teacher's mapper does it) hands back the
//! *first* matching segment for a given name and does not split repeating
//! fields (`~`) on its own — mirroring spec.md §4.2's own note that some
//! fields ("`EVN-4`", "`PV1-2`") are string-extracted straight from the
//! original payload. We generalize that into small helpers here: segment
//! repetition (multiple `NK1`, `OBX`, `ROL`, `IN1` segments) and field
//! repetition (`~`-separated repeats within `PID-3`, `PID-5`, `PID-11`,
//! `PID-13`, `PID-14`, `PID-26`) both need more than a single lookup.
//!
//! Component/subcomponent access below is plain delimiter splitting
//! (`^` then `&`), the same std-`split`-based style `field_of`/`repeats_of`
//! already use for segments (`\r`) and fields (`|`) — this gateway's field
//! text never carries an escaped delimiter that would need
//! `hl7_parser`'s own encoding-aware field parser to resolve correctly.

/// All segments with the given 3-letter name, in message order, as their
/// raw pipe-delimited text (including the segment name).
pub fn raw_segments<'a>(message_text: &'a str, name: &str) -> Vec<&'a str> {
    message_text
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| {
            line.len() > name.len()
                && &line[..name.len()] == name
                && !line.as_bytes()[name.len()].is_ascii_alphanumeric()
        })
        .collect()
}

/// Raw text of field `n` (1-based, post segment-name) of a raw segment
/// line, e.g. `field_of("PID|1||123^^^SONHO^NS", 3) == Some("123^^^SONHO^NS")`.
/// Returns `None` for an absent or empty field.
pub fn field_of(raw_segment: &str, n: usize) -> Option<&str> {
    let parts: Vec<&str> = raw_segment.split('|').collect();
    parts.get(n).copied().filter(|s| !s.is_empty())
}

/// Splits a raw field value into its `~`-separated repeats. A field with no
/// `~` yields a single-element vec; an empty field yields an empty vec.
pub fn repeats_of(raw_field: &str) -> Vec<&str> {
    if raw_field.is_empty() {
        vec![]
    } else {
        raw_field.split('~').filter(|s| !s.is_empty()).collect()
    }
}

/// Component `n` (1-based) of one repeat's raw text.
pub fn component(raw_repeat: &str, n: usize) -> Option<String> {
    raw_repeat
        .split('^')
        .nth(n - 1)
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

/// Subcomponents of component `n` (1-based) of one repeat's raw text.
pub fn subcomponents(raw_repeat: &str, n: usize) -> Vec<String> {
    raw_repeat
        .split('^')
        .nth(n - 1)
        .map(|comp| {
            comp.split('&')
                .map(str::to_string)
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// All repeats of field `n` of the first segment named `name`, split and
/// ready for per-repeat component access.
pub fn repeating_field<'a>(message_text: &'a str, name: &str, n: usize) -> Vec<&'a str> {
    raw_segments(message_text, name)
        .first()
        .and_then(|seg| field_of(seg, n))
        .map(repeats_of)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NK1_MULTI: &str = "MSH|^~\\&|A|B|C|D|20240101120000||ADT^A28^ADT_A05|1|P|2.5\r\
PID|1||12345^^^SONHO^NS\r\
NK1|1|DOE^JANE||SPO\r\
NK1|2|DOE^JUNIOR||SEL\r";

    #[test]
    fn finds_every_repeating_segment() {
        let segs = raw_segments(NK1_MULTI, "NK1");
        assert_eq!(segs.len(), 2);
        assert!(segs[0].starts_with("NK1|1"));
        assert!(segs[1].starts_with("NK1|2"));
    }

    #[test]
    fn does_not_confuse_prefixed_segment_names() {
        // PID must not match a hypothetical PIDX segment.
        let text = "PIDX|1|foo";
        assert!(raw_segments(text, "PID").is_empty());
    }

    #[test]
    fn splits_repeats_within_a_field() {
        let reps = repeats_of("1234^^^SONHO^NS~5678^^^SONHO^SNS");
        assert_eq!(reps, vec!["1234^^^SONHO^NS", "5678^^^SONHO^SNS"]);
    }

    #[test]
    fn reads_component_of_a_repeat() {
        let comp = component("1234^^^SONHO^NS", 4);
        assert_eq!(comp, Some("SONHO".to_string()));
    }
}
