pub mod cache;
pub mod extractor;
pub mod provider;

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::metrics;
use crate::models::ioc::Verdict;
use crate::models::{EnrichmentResult, EnrichmentStatus, IocType, ParsedEvent};

use cache::EnrichmentCache;
use provider::EnrichmentProvider;

fn type_label(ioc_type: IocType) -> &'static str {
    match ioc_type {
        IocType::Ipv4 => "ipv4",
        IocType::Ipv6 => "ipv6",
        IocType::Domain => "domain",
        IocType::Url => "url",
        IocType::Email => "email",
        IocType::Md5 => "md5",
        IocType::Sha1 => "sha1",
        IocType::Sha256 => "sha256",
        IocType::Sha512 => "sha512",
        IocType::Filepath => "filepath",
        IocType::Cve => "cve",
        IocType::MitreTechnique => "mitre_technique",
        IocType::RegistryKey => "registry_key",
        IocType::Bitcoin => "bitcoin",
    }
}

/// Fans an indicator out to every provider that supports its type, bounded
/// by `max_concurrent` (spec §4.5), merging verdicts by severity precedence
/// and unioning tags/sources. Cache is checked first and populated with the
/// merged result.
pub struct EnrichmentPipeline {
    providers: Vec<Arc<dyn EnrichmentProvider>>,
    cache: Arc<EnrichmentCache>,
    semaphore: Arc<Semaphore>,
}

impl EnrichmentPipeline {
    pub fn new(providers: Vec<Arc<dyn EnrichmentProvider>>, cache: Arc<EnrichmentCache>, max_concurrent: usize) -> Self {
        EnrichmentPipeline { providers, cache, semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))) }
    }

    /// Enriches a single already-extracted indicator.
    pub async fn enrich(&self, indicator: &str, ioc_type: IocType) -> EnrichmentResult {
        let label = type_label(ioc_type);
        if let Some(cached) = self.cache.get(indicator, label) {
            metrics::inc_enrichment_cache("hit");
            return cached;
        }
        metrics::inc_enrichment_cache("miss");

        let _permit = self.semaphore.acquire().await;
        let mut merged = EnrichmentResult::pending(indicator, ioc_type);
        merged.status = EnrichmentStatus::NotFound;
        merged.enriched_at = Some(chrono::Utc::now());

        for provider in self.providers.iter().filter(|p| p.supports(ioc_type)) {
            match provider.lookup(indicator, ioc_type).await {
                Ok(result) => {
                    if result.status == EnrichmentStatus::Completed {
                        merged.status = EnrichmentStatus::Completed;
                    }
                    if let Some(v) = result.verdict {
                        merged.verdict = Some(match merged.verdict {
                            Some(existing) => Verdict::merge(existing, v),
                            None => v,
                        });
                    }
                    merged.score = merged.score.max(result.score);
                    for tag in result.tags {
                        if !merged.tags.contains(&tag) {
                            merged.tags.push(tag);
                        }
                    }
                    merged.sources.extend(result.sources);
                }
                Err(e) => merged.errors.push(format!("{}: {e}", provider.name())),
            }
        }

        self.cache.put(indicator, label, merged.clone());
        merged
    }

    /// Extracts indicators from an event's message/raw text and enriches each.
    pub async fn enrich_event(&self, event: &ParsedEvent) -> Vec<EnrichmentResult> {
        let matches = extractor::extract(event.message.as_deref().unwrap_or(""));
        let mut results = Vec::with_capacity(matches.len());
        for m in matches {
            results.push(self.enrich(&m.value, m.ioc_type).await);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provider::LocalListProvider;
    use std::time::Duration;

    #[tokio::test]
    async fn enrichment_merges_malicious_verdict_and_caches_result() {
        let mut entries = std::collections::HashMap::new();
        entries.insert("evil.example".to_string(), serde_json::json!({"score": 90, "verdict": "malicious", "tags": ["c2"]}));
        let provider: Arc<dyn EnrichmentProvider> = Arc::new(LocalListProvider::new("feed-a", entries));
        let cache = Arc::new(EnrichmentCache::new(Duration::from_secs(3600), Duration::from_secs(60)));
        let pipeline = EnrichmentPipeline::new(vec![provider], cache.clone(), 4);

        let first = pipeline.enrich("evil.example", IocType::Domain).await;
        assert_eq!(first.verdict, Some(Verdict::Malicious));
        assert!(!first.cache_hit);

        let second = pipeline.enrich("evil.example", IocType::Domain).await;
        assert!(second.cache_hit);
        assert_eq!(cache.len(), 1);
    }
}
