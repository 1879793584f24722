use chrono::Utc;

use super::{Parser, ParserCategory, ParserMetadata};
use crate::error::{Result, SocError};
use crate::models::{EventKind, ParsedEvent};

/// Generic CSV parser for tabular evidence exports (e.g. timeline CSVs).
/// The header row supplies field names; every other column lands in
/// `labels` so the normalizer can surface it without a bespoke schema.
pub struct CsvParser;

impl Parser for CsvParser {
    fn metadata(&self) -> ParserMetadata {
        ParserMetadata {
            name: "csv",
            category: ParserCategory::Logs,
            description: "Generic delimited timeline export",
            supported_extensions: &[".csv"],
            supported_mime_types: &["text/csv"],
            priority: 5,
        }
    }

    fn can_parse(&self, path: Option<&str>, _head_bytes: Option<&[u8]>, mime: Option<&str>) -> bool {
        path.map(|p| p.to_ascii_lowercase().ends_with(".csv")).unwrap_or(false)
            || mime.map(|m| m == "text/csv").unwrap_or(false)
    }

    fn parse(&self, source: &[u8], source_name: &str) -> Result<Vec<ParsedEvent>> {
        let mut reader = ::csv::ReaderBuilder::new().has_headers(true).from_reader(source);
        let headers = reader.headers().map_err(|e| SocError::parser(e.to_string()))?.clone();

        let mut events = Vec::new();
        let mut failures = 0u32;
        for (idx, record) in reader.records().enumerate() {
            if failures >= super::DEFAULT_FAILURE_CEILING {
                break;
            }
            let record = match record {
                Ok(r) => r,
                Err(_) => {
                    failures += 1;
                    continue;
                }
            };

            let mut event = ParsedEvent::new(Utc::now(), "csv", source_name);
            event.source_line = Some(idx as u64 + 1);
            event.kind = EventKind::Event;
            for (field, value) in headers.iter().zip(record.iter()) {
                if field.eq_ignore_ascii_case("message") {
                    event.message = Some(value.to_string());
                } else if field.eq_ignore_ascii_case("timestamp") {
                    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(value) {
                        event.timestamp = ts.with_timezone(&Utc);
                    }
                } else {
                    event.labels.insert(field.to_string(), value.to_string());
                }
            }
            events.push(event);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_row_drives_field_extraction() {
        let parser = CsvParser;
        let body = "timestamp,message,host\n2026-01-01T00:00:00Z,hello,WORK-01\n";
        let events = parser.parse(body.as_bytes(), "export.csv").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message.as_deref(), Some("hello"));
        assert_eq!(events[0].labels.get("host"), Some(&"WORK-01".to_string()));
    }
}
