use std::collections::BTreeMap;

use serde_json::Value;

// Phase outputs keyed by "<phase>:<fingerprint>". Values are JSON so any
// provider (memory, disk, remote) can hold them.
pub trait CacheProvider {
    fn get(&mut self, key: &str) -> Option<Value>;
    fn put(&mut self, key: &str, value: Value);
    fn get_all_cache_keys(&self) -> Vec<String>;
    fn stats(&self) -> &CacheStats;
}

fn prefix_of(key: &str) -> &str {
    key.split(':').next().unwrap_or(key)
}

#[must_use]
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    counters: BTreeMap<String, (u64, u64)>,
}

impl CacheStats {
    fn record(&mut self, key: &str, hit: bool) {
        let entry = self.counters.entry(prefix_of(key).to_string()).or_insert((0, 0));
        if hit {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    // (hits, misses) for a phase prefix.
    #[must_use]
    pub fn for_prefix(&self, prefix: &str) -> (u64, u64) {
        self.counters.get(prefix).copied().unwrap_or((0, 0))
    }
}

#[must_use]
#[derive(Debug, Default, Clone)]
pub struct InMemoryCache {
    values: BTreeMap<String, Value>,
    stats: CacheStats,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheProvider for InMemoryCache {
    fn get(&mut self, key: &str) -> Option<Value> {
        let value = self.values.get(key).cloned();
        self.stats.record(key, value.is_some());
        value
    }

    fn put(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    fn get_all_cache_keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

// Stable fingerprint of a serializable input, used in cache keys.
pub fn fingerprint(value: &impl serde::Serialize) -> String {
    let json = serde_json::to_string(value).unwrap_or_default();
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in json.bytes() {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    format!("{hash:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hit_miss_counters_per_prefix() {
        let mut cache = InMemoryCache::new();
        assert!(cache.get("mesh:abc").is_none());
        cache.put("mesh:abc", json!({"nodes": 3}));
        assert!(cache.get("mesh:abc").is_some());
        assert!(cache.get("pathing:abc").is_none());
        assert_eq!(cache.stats().for_prefix("mesh"), (1, 1));
        assert_eq!(cache.stats().for_prefix("pathing"), (0, 1));
        assert_eq!(cache.get_all_cache_keys(), vec!["mesh:abc".to_string()]);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = fingerprint(&json!({"x": 1}));
        let b = fingerprint(&json!({"x": 1}));
        let c = fingerprint(&json!({"x": 2}));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
