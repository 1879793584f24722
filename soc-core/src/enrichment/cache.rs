use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::models::{EnrichmentResult, EnrichmentStatus};

struct Entry {
    result: EnrichmentResult,
    expires_at: Instant,
}

/// TTL cache for enrichment lookups (spec §4.5): positive hits (`Completed`)
/// and negative hits (`NotFound`) expire independently, since a
/// miss-and-recheck cadence is usually much faster than re-fetching a
/// confirmed verdict.
pub struct EnrichmentCache {
    entries: DashMap<(String, &'static str), Entry>,
    positive_ttl: Duration,
    negative_ttl: Duration,
}

impl EnrichmentCache {
    pub fn new(positive_ttl: Duration, negative_ttl: Duration) -> Self {
        EnrichmentCache { entries: DashMap::new(), positive_ttl, negative_ttl }
    }

    fn key(indicator: &str, indicator_type_label: &'static str) -> (String, &'static str) {
        (indicator.to_string(), indicator_type_label)
    }

    pub fn get(&self, indicator: &str, indicator_type_label: &'static str) -> Option<EnrichmentResult> {
        let key = Self::key(indicator, indicator_type_label);
        let entry = self.entries.get(&key)?;
        if entry.expires_at <= Instant::now() {
            drop(entry);
            self.entries.remove(&key);
            return None;
        }
        let mut result = entry.result.clone();
        result.cache_hit = true;
        Some(result)
    }

    pub fn put(&self, indicator: &str, indicator_type_label: &'static str, result: EnrichmentResult) {
        let ttl = match result.status {
            EnrichmentStatus::NotFound => self.negative_ttl,
            _ => self.positive_ttl,
        };
        let key = Self::key(indicator, indicator_type_label);
        self.entries.insert(key, Entry { result, expires_at: Instant::now() + ttl });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IocType;

    #[test]
    fn negative_entry_expires_independently_of_positive_ttl() {
        let cache = EnrichmentCache::new(Duration::from_secs(3600), Duration::from_millis(0));
        let mut miss = EnrichmentResult::pending("1.2.3.4", IocType::Ipv4);
        miss.status = EnrichmentStatus::NotFound;
        cache.put("1.2.3.4", "ipv4", miss);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("1.2.3.4", "ipv4").is_none());
    }

    #[test]
    fn positive_hit_is_served_with_cache_hit_flag() {
        let cache = EnrichmentCache::new(Duration::from_secs(3600), Duration::from_secs(300));
        let mut hit = EnrichmentResult::pending("evil.example", IocType::Domain);
        hit.status = EnrichmentStatus::Completed;
        cache.put("evil.example", "domain", hit);
        let fetched = cache.get("evil.example", "domain").unwrap();
        assert!(fetched.cache_hit);
    }
}
