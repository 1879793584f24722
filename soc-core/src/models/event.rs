use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level classification of a parsed record (spec §3: `kind`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Alert,
    Event,
    Metric,
    State,
    Signal,
    PipelineError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    Success,
    Failure,
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostFacets {
    pub name: Option<String>,
    pub ips: Vec<String>,
    pub macs: Vec<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserFacets {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessFacets {
    pub name: Option<String>,
    pub pid: Option<i64>,
    pub ppid: Option<i64>,
    pub executable: Option<String>,
    pub command_line: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileFacets {
    pub name: Option<String>,
    pub path: Option<String>,
    pub sha256: Option<String>,
    pub sha1: Option<String>,
    pub md5: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkFacets {
    pub source_ip: Option<String>,
    pub source_port: Option<u16>,
    pub destination_ip: Option<String>,
    pub destination_port: Option<u16>,
    pub protocol: Option<String>,
    pub direction: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UrlFacets {
    pub full: Option<String>,
    pub scheme: Option<String>,
    pub domain: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub query: Option<String>,
}

/// Canonical in-memory record emitted by parsers (spec §3). Immutable once
/// yielded; a parser's streamed loop produces these in source-file order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedEvent {
    pub timestamp: DateTime<Utc>,
    pub message: Option<String>,

    pub source_type: String,
    pub source_file: String,
    pub source_line: Option<u64>,

    pub kind: EventKind,
    pub category: Vec<String>,
    pub event_type: Vec<String>,
    pub action: Option<String>,
    pub outcome: Option<EventOutcome>,
    pub severity: Option<u8>,

    pub host: HostFacets,
    pub user: UserFacets,
    pub process: ProcessFacets,
    pub file: FileFacets,
    pub network: NetworkFacets,
    pub url: UrlFacets,

    pub raw: HashMap<String, serde_json::Value>,
    pub labels: HashMap<String, String>,
    pub tags: Vec<String>,
}

impl ParsedEvent {
    pub fn new(timestamp: DateTime<Utc>, source_type: impl Into<String>, source_file: impl Into<String>) -> Self {
        ParsedEvent {
            timestamp,
            message: None,
            source_type: source_type.into(),
            source_file: source_file.into(),
            source_line: None,
            kind: EventKind::Event,
            category: Vec::new(),
            event_type: Vec::new(),
            action: None,
            outcome: None,
            severity: None,
            host: HostFacets::default(),
            user: UserFacets::default(),
            process: ProcessFacets::default(),
            file: FileFacets::default(),
            network: NetworkFacets::default(),
            url: UrlFacets::default(),
            raw: HashMap::new(),
            labels: HashMap::new(),
            tags: Vec::new(),
        }
    }
}
