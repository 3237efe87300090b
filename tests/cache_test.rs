//! キャッシュ機能テスト
//!
//! 埋め込みキャッシュと単価表キャッシュの動作を検証

use async_trait::async_trait;
use boq_matcher::cache::embedding::cache_key;
use boq_matcher::cache::{CatalogCache, CatalogSource, EmbeddingCache, JsonFileCatalog};
use boq_matcher::error::Result;
use boq_matcher_common::{CatalogItem, EmbeddingProvider};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::tempdir;

/// 呼び出し回数を数える取得元
struct CountingSource {
    calls: AtomicUsize,
}

#[async_trait]
impl CatalogSource for CountingSource {
    async fn fetch_active(&self) -> Result<Vec<CatalogItem>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![CatalogItem {
            key: format!("fetch-{}", n),
            name: Some("Steel Post".into()),
            ..Default::default()
        }])
    }
}

/// プロバイダごとにキーが分かれる
#[test]
fn test_embedding_cache_namespaced_by_provider() {
    let cache = EmbeddingCache::new(100, Duration::from_secs(7200));
    cache.insert(EmbeddingProvider::V1, "Barbed wire", vec![0.1; 4]);

    assert!(cache.get(EmbeddingProvider::V1, "barbed wire").is_some());
    assert!(cache.get(EmbeddingProvider::V2, "barbed wire").is_none());
    assert!(cache_key(EmbeddingProvider::V2, "x").starts_with("v2:"));
}

/// 期限切れの読み出しで件数が減る
#[test]
fn test_embedding_cache_ttl() {
    let cache = EmbeddingCache::new(100, Duration::from_secs(7200));
    let start = Instant::now();
    cache.insert_at(EmbeddingProvider::V2, "a", vec![1.0], start);
    cache.insert_at(EmbeddingProvider::V2, "b", vec![1.0], start + Duration::from_secs(3600));

    let later = start + Duration::from_secs(7200);
    assert!(cache.get_at(EmbeddingProvider::V2, "a", later).is_none());
    assert!(cache.get_at(EmbeddingProvider::V2, "b", later).is_some());
    assert_eq!(cache.len(), 1);
}

/// 容量を超えた分は最も使われていないものから消える
#[test]
fn test_embedding_cache_capacity() {
    let cache = EmbeddingCache::new(3, Duration::from_secs(60));
    for text in ["a", "b", "c", "d", "e"] {
        cache.insert(EmbeddingProvider::V1, text, vec![0.0]);
    }
    assert_eq!(cache.len(), 3);
    assert!(cache.get(EmbeddingProvider::V1, "a").is_none());
    assert!(cache.get(EmbeddingProvider::V1, "e").is_some());

    cache.clear();
    assert!(cache.is_empty());
}

/// 期限内は取得元を呼ばない
#[tokio::test(start_paused = true)]
async fn test_catalog_cache_refresh_after_ttl() {
    let source = Arc::new(CountingSource {
        calls: AtomicUsize::new(0),
    });
    let cache = CatalogCache::new(source.clone(), Duration::from_secs(300));

    let first = cache.get().await.expect("取得失敗");
    let second = cache.get().await.expect("取得失敗");
    assert_eq!(first[0].key, "fetch-0");
    assert_eq!(second[0].key, "fetch-0");

    tokio::time::advance(Duration::from_secs(301)).await;
    let third = cache.get().await.expect("取得失敗");
    assert_eq!(third[0].key, "fetch-1");
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
}

/// JSONファイルの単価表をキャッシュ経由で読む
#[tokio::test]
async fn test_catalog_cache_with_json_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("catalog.json");
    std::fs::write(
        &path,
        r#"[{"_id": "a", "name": "Wire Mesh Panel", "unit": "M2", "rate": 12.0}]"#,
    )
    .unwrap();

    let cache = CatalogCache::new(Arc::new(JsonFileCatalog::new(&path)), Duration::from_secs(300));
    let items = cache.get().await.expect("取得失敗");
    assert_eq!(items.len(), 1);

    // ファイルを変えても期限内はキャッシュのまま
    std::fs::write(&path, "[]").unwrap();
    assert_eq!(cache.get().await.unwrap().len(), 1);

    // 無効化すると空になったファイルを読みに行きエラーになる
    cache.invalidate().await;
    assert!(cache.get().await.is_err());
}
