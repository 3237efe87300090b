//! 埋め込みベクトルのキャッシュ
//!
//! 正規化したクエリ文のSHA-256をキーにして、同じ明細の再問い合わせを省く。
//! 件数上限（`lru::LruCache` で追い出し）と有効期限を持つ。

use boq_matcher_common::EmbeddingProvider;
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    vector: Vec<f32>,
    inserted_at: Instant,
}

pub struct EmbeddingCache {
    /// 容量0のときは何も保持しない
    entries: Option<Mutex<LruCache<String, CacheEntry>>>,
    ttl: Duration,
}

/// 前後の空白除去・空白の圧縮・小文字化
pub fn normalize_query(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// プロバイダ名前空間付きのキャッシュキー
pub fn cache_key(provider: EmbeddingProvider, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_query(text).as_bytes());
    format!("{}:{}", provider.cache_prefix(), hex::encode(hasher.finalize()))
}

impl EmbeddingCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            ttl,
        }
    }

    fn lock(&self) -> Option<MutexGuard<'_, LruCache<String, CacheEntry>>> {
        self.entries
            .as_ref()
            .map(|m| m.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn get(&self, provider: EmbeddingProvider, text: &str) -> Option<Vec<f32>> {
        self.get_at(provider, text, Instant::now())
    }

    pub fn insert(&self, provider: EmbeddingProvider, text: &str, vector: Vec<f32>) {
        self.insert_at(provider, text, vector, Instant::now())
    }

    /// 時刻を指定して取得する（期限切れは削除して None）
    pub fn get_at(&self, provider: EmbeddingProvider, text: &str, now: Instant) -> Option<Vec<f32>> {
        let key = cache_key(provider, text);
        let mut cache = self.lock()?;

        let entry = cache.get(&key)?;
        if now.saturating_duration_since(entry.inserted_at) < self.ttl {
            return Some(entry.vector.clone());
        }
        cache.pop(&key);
        None
    }

    pub fn insert_at(&self, provider: EmbeddingProvider, text: &str, vector: Vec<f32>, now: Instant) {
        let Some(mut cache) = self.lock() else {
            return;
        };
        cache.put(
            cache_key(provider, text),
            CacheEntry {
                vector,
                inserted_at: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.lock().map_or(0, |cache| cache.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Some(mut cache) = self.lock() {
            cache.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V1: EmbeddingProvider = EmbeddingProvider::V1;

    #[test]
    fn test_cache_key_normalizes_text() {
        assert_eq!(cache_key(V1, "  Steel   POST "), cache_key(V1, "steel post"));
        assert_ne!(cache_key(V1, "steel post"), cache_key(EmbeddingProvider::V2, "steel post"));
        assert!(cache_key(V1, "x").starts_with("v1:"));
        // "v1:" + 64桁の16進
        assert_eq!(cache_key(V1, "x").len(), 3 + 64);
    }

    #[test]
    fn test_get_after_insert() {
        let cache = EmbeddingCache::new(10, Duration::from_secs(60));
        cache.insert(V1, "Steel post", vec![0.1, 0.2]);
        assert_eq!(cache.get(V1, "steel  post"), Some(vec![0.1, 0.2]));
        assert_eq!(cache.get(EmbeddingProvider::V2, "steel post"), None);
    }

    #[test]
    fn test_expired_entry_is_dropped() {
        let cache = EmbeddingCache::new(10, Duration::from_secs(60));
        let start = Instant::now();
        cache.insert_at(V1, "a", vec![1.0], start);

        assert!(cache.get_at(V1, "a", start + Duration::from_secs(59)).is_some());
        assert!(cache.get_at(V1, "a", start + Duration::from_secs(60)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lru_eviction() {
        let cache = EmbeddingCache::new(2, Duration::from_secs(60));
        let now = Instant::now();
        cache.insert_at(V1, "a", vec![1.0], now);
        cache.insert_at(V1, "b", vec![2.0], now);
        // a を使ったので b が最も古い
        assert!(cache.get_at(V1, "a", now).is_some());
        cache.insert_at(V1, "c", vec![3.0], now);

        assert_eq!(cache.len(), 2);
        assert!(cache.get_at(V1, "b", now).is_none());
        assert!(cache.get_at(V1, "a", now).is_some());
        assert!(cache.get_at(V1, "c", now).is_some());
    }

    #[test]
    fn test_reinsert_replaces_value() {
        let cache = EmbeddingCache::new(2, Duration::from_secs(60));
        cache.insert(V1, "a", vec![1.0]);
        cache.insert(V1, "a", vec![9.0]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(V1, "a"), Some(vec![9.0]));
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = EmbeddingCache::new(0, Duration::from_secs(60));
        cache.insert(V1, "a", vec![1.0]);
        assert!(cache.is_empty());
    }
}
