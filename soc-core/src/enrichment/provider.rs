use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::models::{EnrichmentResult, IocType};

/// One threat-intel backend. Implementations return `EnrichmentStatus::NotFound`
/// rather than erroring when an indicator is simply unknown to them (spec §4.5).
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    fn name(&self) -> &str;
    fn supports(&self, ioc_type: IocType) -> bool;
    async fn lookup(&self, indicator: &str, ioc_type: IocType) -> Result<EnrichmentResult>;
}

/// In-process provider backed by a curated indicator list, grounded in the
/// bundled threat-intel feed format: a flat map of indicator to verdict/score/tags.
pub struct LocalListProvider {
    name: String,
    entries: std::collections::HashMap<String, Value>,
}

impl LocalListProvider {
    pub fn new(name: impl Into<String>, entries: std::collections::HashMap<String, Value>) -> Self {
        LocalListProvider { name: name.into(), entries }
    }
}

#[async_trait]
impl EnrichmentProvider for LocalListProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, _ioc_type: IocType) -> bool {
        true
    }

    async fn lookup(&self, indicator: &str, ioc_type: IocType) -> Result<EnrichmentResult> {
        let mut result = EnrichmentResult::pending(indicator, ioc_type);
        match self.entries.get(indicator) {
            Some(entry) => {
                result.status = crate::models::EnrichmentStatus::Completed;
                result.score = entry.get("score").and_then(|v| v.as_u64()).map(|v| v as u8);
                result.verdict = entry.get("verdict").and_then(|v| v.as_str()).and_then(parse_verdict);
                result.tags = entry
                    .get("tags")
                    .and_then(|v| v.as_array())
                    .map(|arr| arr.iter().filter_map(|t| t.as_str().map(str::to_string)).collect())
                    .unwrap_or_default();
                result.sources.insert(self.name.clone(), entry.clone());
            }
            None => {
                result.status = crate::models::EnrichmentStatus::NotFound;
            }
        }
        Ok(result)
    }
}

fn parse_verdict(s: &str) -> Option<crate::models::ioc::Verdict> {
    use crate::models::ioc::Verdict;
    match s {
        "clean" => Some(Verdict::Clean),
        "unknown" => Some(Verdict::Unknown),
        "suspicious" => Some(Verdict::Suspicious),
        "malicious" => Some(Verdict::Malicious),
        _ => None,
    }
}

/// Generic JSON-over-HTTP provider for externally hosted threat-intel APIs.
/// The wire shape (`{"data": {"score":..,"verdict":..,"tags":[..]}}`) proves
/// the integration surface; it is not bound to any specific vendor protocol.
pub struct HttpJsonProvider {
    name: String,
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpJsonProvider {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, api_key: Option<String>, timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder().timeout(timeout).build().unwrap_or_default();
        HttpJsonProvider { name: name.into(), client, base_url: base_url.into(), api_key }
    }
}

#[async_trait]
impl EnrichmentProvider for HttpJsonProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, ioc_type: IocType) -> bool {
        matches!(ioc_type, IocType::Ipv4 | IocType::Ipv6 | IocType::Domain | IocType::Url | IocType::Md5 | IocType::Sha1 | IocType::Sha256)
    }

    async fn lookup(&self, indicator: &str, ioc_type: IocType) -> Result<EnrichmentResult> {
        let mut result = EnrichmentResult::pending(indicator, ioc_type);
        let mut req = self.client.get(format!("{}/indicators/{indicator}", self.base_url));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let response = req.send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            result.status = crate::models::EnrichmentStatus::NotFound;
            return Ok(result);
        }
        let body: Value = response.json().await?;
        let data = body.get("data").cloned().unwrap_or(Value::Null);
        result.status = crate::models::EnrichmentStatus::Completed;
        result.score = data.get("score").and_then(|v| v.as_u64()).map(|v| v as u8);
        result.verdict = data.get("verdict").and_then(|v| v.as_str()).and_then(parse_verdict);
        result.tags = data
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|t| t.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        result.sources.insert(self.name.clone(), data);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_list_provider_reports_not_found_for_unknown_indicator() {
        let provider = LocalListProvider::new("internal-list", std::collections::HashMap::new());
        let result = provider.lookup("1.2.3.4", IocType::Ipv4).await.unwrap();
        assert_eq!(result.status, crate::models::EnrichmentStatus::NotFound);
    }

    #[tokio::test]
    async fn local_list_provider_returns_verdict_for_known_indicator() {
        let mut entries = std::collections::HashMap::new();
        entries.insert("evil.example".to_string(), serde_json::json!({"score": 95, "verdict": "malicious", "tags": ["c2"]}));
        let provider = LocalListProvider::new("internal-list", entries);
        let result = provider.lookup("evil.example", IocType::Domain).await.unwrap();
        assert_eq!(result.verdict, Some(crate::models::ioc::Verdict::Malicious));
        assert_eq!(result.score, Some(95));
    }
}
