use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::StreamFailure;
use crate::event::StreamEvent;
use crate::suggestion::SuggestionKind;

const FRAME_PREFIX: &str = "data:";

/// Incremental line-frame decoder.
///
/// Chunks arrive at arbitrary byte boundaries; the decoder appends each chunk
/// to a carry-over buffer, emits one event per complete prefixed line, and
/// retains the trailing partial line for the next chunk. Lines without the
/// frame prefix (keep-alives, comments) are ignored. The decoded event
/// sequence is identical for every split of the same feed into chunks.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns the events decoded from every complete line.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(idx) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf[..idx].to_vec();
            self.buf.drain(..=idx);
            if let Some(event) = decode_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes the final unterminated line at end-of-stream.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.buf.is_empty() {
            return Vec::new();
        }
        let line = std::mem::take(&mut self.buf);
        decode_line(&line).into_iter().collect()
    }
}

fn decode_line(bytes: &[u8]) -> Option<StreamEvent> {
    let text = String::from_utf8_lossy(bytes);
    let line = text.trim_end_matches('\r');
    let payload = line.strip_prefix(FRAME_PREFIX)?.trim_start();
    if payload.is_empty() {
        return None;
    }
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "skipping malformed frame payload");
            return None;
        }
    };
    classify_payload(&value)
}

/// Classifies one parsed frame payload into a stream event.
///
/// Unknown-but-parseable shapes yield `None` and are ignored by callers.
pub(crate) fn classify_payload(value: &Value) -> Option<StreamEvent> {
    if let Some(status) = value.get("status").and_then(|v| v.as_str()) {
        return match status {
            "started" => Some(StreamEvent::Started {
                message: message_of(value),
            }),
            "progress" => Some(StreamEvent::Progress {
                step: value.get("step").and_then(|v| v.as_u64()),
                message: message_of(value),
            }),
            "completed" => Some(StreamEvent::Completed {
                message: message_of(value),
                totals: totals_of(value),
            }),
            "error" => {
                let message = value
                    .get("error")
                    .and_then(|v| v.as_str())
                    .unwrap_or("upstream stream error")
                    .to_string();
                Some(StreamEvent::Failed {
                    error: StreamFailure::Upstream { message },
                })
            }
            other => {
                debug!(status = other, "ignoring unrecognized status frame");
                None
            }
        };
    }

    for (key, payload) in value.as_object()? {
        if let Some(kind) = SuggestionKind::from_wire_key(key) {
            return Some(StreamEvent::Unit {
                kind,
                payload: payload.clone(),
            });
        }
    }
    debug!("ignoring unrecognized frame shape");
    None
}

fn message_of(value: &Value) -> String {
    value
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn totals_of(value: &Value) -> BTreeMap<String, u64> {
    let mut totals = BTreeMap::new();
    if let Some(object) = value.as_object() {
        for (key, v) in object {
            if let Some(count) = key.starts_with("total_").then(|| v.as_u64()).flatten() {
                totals.insert(key.clone(), count);
            }
        }
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed() -> &'static str {
        concat!(
            "data: {\"status\":\"started\",\"message\":\"go\"}\n",
            ": keep-alive\n",
            "data: {\"risk\":{\"id\":\"r1\",\"original_text\":\"30 days\",\"suggested_text\":\"60 days\"}}\n",
            "data: {\"status\":\"progress\",\"message\":\"page done\",\"step\":2}\n",
            "data: not-json\n",
            "data: {\"status\":\"completed\",\"message\":\"done\",\"total_risks\":1}\n",
        )
    }

    fn decode_all(chunks: &[&[u8]]) -> Vec<StreamEvent> {
        let mut decoder = FrameDecoder::new();
        let mut events = Vec::new();
        for chunk in chunks {
            events.extend(decoder.push_chunk(chunk));
        }
        events.extend(decoder.finish());
        events
    }

    #[test]
    fn yields_identical_events_for_any_chunk_split() {
        let bytes = feed().as_bytes();
        let whole = decode_all(&[bytes]);
        assert_eq!(whole.len(), 4);

        for at in 1..bytes.len() {
            let parts = decode_all(&[&bytes[..at], &bytes[at..]]);
            assert_eq!(parts, whole, "split at byte {at} diverged");
        }
    }

    #[test]
    fn three_raw_chunks_yield_exactly_two_events() {
        let mut decoder = FrameDecoder::new();
        let mut events = Vec::new();
        events.extend(decoder.push_chunk(b"data: {\"status\":"));
        events.extend(decoder.push_chunk(b"\"started\",\"message\":\"go\"}\n"));
        events.extend(decoder.push_chunk(b"data: {\"status\":\"completed\"}\n"));
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], StreamEvent::Started { .. }));
        assert!(matches!(events[1], StreamEvent::Completed { .. }));
    }

    #[test]
    fn non_prefixed_lines_are_silently_ignored() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.push_chunk(b": ping\n\nretry: 3000\n");
        assert!(events.is_empty());
    }

    #[test]
    fn malformed_payload_is_skipped_without_aborting() {
        let mut decoder = FrameDecoder::new();
        let events = decoder
            .push_chunk(b"data: {broken\ndata: {\"status\":\"started\",\"message\":\"ok\"}\n");
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StreamEvent::Started { .. }));
    }

    #[test]
    fn finish_flushes_trailing_unterminated_line() {
        let mut decoder = FrameDecoder::new();
        assert!(
            decoder
                .push_chunk(b"data: {\"status\":\"completed\",\"message\":\"done\"}")
                .is_empty()
        );
        let events = decoder.finish();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StreamEvent::Completed { .. }));
    }

    #[test]
    fn crlf_line_endings_decode_like_lf() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.push_chunk(b"data: {\"status\":\"started\",\"message\":\"go\"}\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            StreamEvent::Started {
                message: "go".into()
            }
        );
    }

    #[test]
    fn completed_collects_total_counters() {
        let value: Value = serde_json::from_str(
            "{\"status\":\"completed\",\"message\":\"done\",\"total_risks\":3,\"total_questions\":1}",
        )
        .expect("json");
        let event = classify_payload(&value).expect("completed event");
        match event {
            StreamEvent::Completed { totals, .. } => {
                assert_eq!(totals.get("total_risks"), Some(&3));
                assert_eq!(totals.get("total_questions"), Some(&1));
            }
            other => panic!("expected completed, got {other:?}"),
        }
    }

    #[test]
    fn error_status_maps_to_upstream_failure() {
        let value: Value =
            serde_json::from_str("{\"status\":\"error\",\"error\":\"model overloaded\"}")
                .expect("json");
        assert_eq!(
            classify_payload(&value),
            Some(StreamEvent::Failed {
                error: StreamFailure::Upstream {
                    message: "model overloaded".into()
                }
            })
        );
    }

    #[test]
    fn unit_frames_carry_kind_and_payload() {
        let value: Value =
            serde_json::from_str("{\"change\":{\"id\":\"c1\",\"original_text\":\"NY\"}}")
                .expect("json");
        match classify_payload(&value).expect("unit event") {
            StreamEvent::Unit { kind, payload } => {
                assert_eq!(kind, SuggestionKind::JurisdictionChange);
                assert_eq!(payload.get("id").and_then(|v| v.as_str()), Some("c1"));
            }
            other => panic!("expected unit, got {other:?}"),
        }
    }
}
