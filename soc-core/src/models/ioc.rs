use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IocType {
    Ipv4,
    Ipv6,
    Domain,
    Url,
    Email,
    Md5,
    Sha1,
    Sha256,
    Sha512,
    Filepath,
    Cve,
    MitreTechnique,
    RegistryKey,
    Bitcoin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IocMatch {
    pub value: String,
    pub ioc_type: IocType,
    pub start: usize,
    pub end: usize,
    pub context: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cached,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Clean,
    Unknown,
    Suspicious,
    Malicious,
}

impl Verdict {
    /// Highest-precedence verdict wins when merging provider payloads
    /// (spec §3: malicious > suspicious > unknown > clean).
    pub fn merge(a: Verdict, b: Verdict) -> Verdict {
        a.max(b)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub indicator: String,
    pub indicator_type: IocType,
    pub status: EnrichmentStatus,
    pub sources: HashMap<String, serde_json::Value>,
    pub score: Option<u8>,
    pub verdict: Option<Verdict>,
    pub tags: Vec<String>,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub enriched_at: Option<DateTime<Utc>>,
    pub cache_hit: bool,
    pub errors: Vec<String>,
}

impl EnrichmentResult {
    pub fn pending(indicator: impl Into<String>, indicator_type: IocType) -> Self {
        EnrichmentResult {
            indicator: indicator.into(),
            indicator_type,
            status: EnrichmentStatus::Pending,
            sources: HashMap::new(),
            score: None,
            verdict: None,
            tags: Vec::new(),
            first_seen: None,
            last_seen: None,
            enriched_at: None,
            cache_hit: false,
            errors: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_merge_follows_precedence() {
        assert_eq!(Verdict::merge(Verdict::Clean, Verdict::Malicious), Verdict::Malicious);
        assert_eq!(Verdict::merge(Verdict::Suspicious, Verdict::Unknown), Verdict::Suspicious);
        assert_eq!(Verdict::merge(Verdict::Clean, Verdict::Unknown), Verdict::Unknown);
    }
}
