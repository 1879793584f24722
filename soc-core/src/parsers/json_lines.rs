use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{Parser, ParserCategory, ParserMetadata};
use crate::error::Result;
use crate::models::{EventKind, ParsedEvent};

/// Generic newline-delimited JSON parser, used when no more specific
/// built-in recognizes the evidence (spec §4.1: registry falls back to
/// whatever matches by extension/MIME when no magic-byte parser claims it).
pub struct JsonLinesParser;

impl Parser for JsonLinesParser {
    fn metadata(&self) -> ParserMetadata {
        ParserMetadata {
            name: "json_lines",
            category: ParserCategory::Logs,
            description: "Newline-delimited JSON log records",
            supported_extensions: &[".json", ".jsonl", ".ndjson"],
            supported_mime_types: &["application/json", "application/x-ndjson"],
            priority: 10,
        }
    }

    fn can_parse(&self, path: Option<&str>, head_bytes: Option<&[u8]>, mime: Option<&str>) -> bool {
        let ext_match = path
            .map(|p| {
                let lower = p.to_ascii_lowercase();
                [".json", ".jsonl", ".ndjson"].iter().any(|e| lower.ends_with(e))
            })
            .unwrap_or(false);
        let mime_match = mime.map(|m| m.contains("json")).unwrap_or(false);
        let content_match = head_bytes
            .and_then(|b| std::str::from_utf8(b).ok())
            .map(|s| s.trim_start().starts_with('{'))
            .unwrap_or(false);
        ext_match || mime_match || content_match
    }

    fn parse(&self, source: &[u8], source_name: &str) -> Result<Vec<ParsedEvent>> {
        let text = String::from_utf8_lossy(source);
        let mut events = Vec::new();
        let mut failures = 0u32;
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            if failures >= super::DEFAULT_FAILURE_CEILING {
                break;
            }
            match serde_json::from_str::<Value>(line) {
                Ok(value) => events.push(record_to_event(&value, source_name, idx as u64)),
                Err(_) => failures += 1,
            }
        }
        Ok(events)
    }
}

fn record_to_event(value: &Value, source_file: &str, line: u64) -> ParsedEvent {
    let timestamp = value
        .get("timestamp")
        .or_else(|| value.get("@timestamp"))
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let mut event = ParsedEvent::new(timestamp, "json_lines", source_file);
    event.source_line = Some(line);
    event.kind = EventKind::Event;
    event.message = value.get("message").and_then(|v| v.as_str()).map(str::to_string);
    if let Value::Object(obj) = value {
        event.raw = obj.clone().into_iter().collect();
    }
    event
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_one_event_per_line_and_skips_malformed() {
        let parser = JsonLinesParser;
        let body = r#"{"message":"a","timestamp":"2026-01-01T00:00:00Z"}
not json
{"message":"b","timestamp":"2026-01-01T00:01:00Z"}"#;
        let events = parser.parse(body.as_bytes(), "records.jsonl").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message.as_deref(), Some("a"));
    }
}
