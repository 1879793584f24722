pub mod csv;
pub mod evtx;
pub mod json_lines;
pub mod linux_auth;
pub mod timestamps;

use crate::error::{Result, SocError};
use crate::models::ParsedEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserCategory {
    Logs,
    Network,
    Disk,
    Memory,
    Registry,
}

pub struct ParserMetadata {
    pub name: &'static str,
    pub category: ParserCategory,
    pub description: &'static str,
    pub supported_extensions: &'static [&'static str],
    pub supported_mime_types: &'static [&'static str],
    pub priority: i32,
}

/// A parser dissects one evidence source into a stream of `ParsedEvent`s
/// (spec §4.1). Implementations must not block on network I/O and must
/// tolerate truncated trailing records.
pub trait Parser: Send + Sync {
    fn metadata(&self) -> ParserMetadata;

    /// Cheap pre-check using magic bytes / extension / MIME before a full parse.
    fn can_parse(&self, path: Option<&str>, head_bytes: Option<&[u8]>, mime: Option<&str>) -> bool;

    /// Streams events from `source`, naming the evidence `source_name` in
    /// each event's source triple. Per-record failures are counted and
    /// logged, not propagated, unless the cumulative cap is exceeded.
    fn parse(&self, source: &[u8], source_name: &str) -> Result<Vec<ParsedEvent>>;
}

/// Cumulative per-record failure ceiling before a parser aborts its
/// stream (spec §4.1: "recommended: 100 before stop").
pub const DEFAULT_FAILURE_CEILING: u32 = 100;

struct RankedParser {
    parser: Box<dyn Parser>,
    priority: i32,
}

/// Process-wide, read-mostly registry of built-in parsers (spec §4.1, §9:
/// "static table" rather than decorator-driven dynamic registration).
/// Safe for concurrent reads; mutation only happens at startup.
pub struct ParserRegistry {
    parsers: Vec<RankedParser>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        ParserRegistry { parsers: Vec::new() }
    }

    /// Assembles the registry with the shipped built-in parsers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(evtx::EvtxParser)).unwrap();
        registry.register(Box::new(linux_auth::LinuxAuthParser)).unwrap();
        registry.register(Box::new(json_lines::JsonLinesParser)).unwrap();
        registry.register(Box::new(csv::CsvParser)).unwrap();
        registry
    }

    pub fn register(&mut self, parser: Box<dyn Parser>) -> Result<()> {
        let meta = parser.metadata();
        if self.parsers.iter().any(|p| p.parser.metadata().name == meta.name) {
            return Err(SocError::conflict(format!("parser '{}' already registered", meta.name)));
        }
        let priority = meta.priority;
        self.parsers.push(RankedParser { parser, priority });
        Ok(())
    }

    /// Resolution order (spec §4.1): explicit hint by name, then highest
    /// declared priority among `can_parse` matches (magic-byte matches are
    /// expected to rank above extension-only matches via priority), else
    /// `NoParserMatched`.
    pub fn resolve(
        &self,
        path: Option<&str>,
        mime: Option<&str>,
        head_bytes: Option<&[u8]>,
        hint: Option<&str>,
    ) -> Result<&dyn Parser> {
        if let Some(hint) = hint {
            return self
                .parsers
                .iter()
                .find(|p| p.parser.metadata().name == hint)
                .map(|p| p.parser.as_ref())
                .ok_or_else(|| SocError::not_found(format!("no parser named '{hint}'")));
        }

        self.parsers
            .iter()
            .filter(|p| p.parser.can_parse(path, head_bytes, mime))
            .max_by_key(|p| p.priority)
            .map(|p| p.parser.as_ref())
            .ok_or_else(|| SocError::not_found("NoParserMatched"))
    }

    pub fn list(&self) -> Vec<ParserMetadata> {
        self.parsers.iter().map(|p| p.parser.metadata()).collect()
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_wins_over_probing() {
        let registry = ParserRegistry::with_builtins();
        let parser = registry.resolve(None, None, None, Some("linux_auth")).unwrap();
        assert_eq!(parser.metadata().name, "linux_auth");
    }

    #[test]
    fn unmatched_input_reports_no_parser_matched() {
        let registry = ParserRegistry::with_builtins();
        let err = match registry.resolve(Some("evidence.bin"), None, Some(b"\x00\x00\x00\x00"), None) {
            Err(e) => e,
            Ok(_) => panic!("expected resolve to fail"),
        };
        assert!(err.to_string().contains("NoParserMatched"));
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = ParserRegistry::new();
        registry.register(Box::new(evtx::EvtxParser)).unwrap();
        assert!(registry.register(Box::new(evtx::EvtxParser)).is_err());
    }
}
