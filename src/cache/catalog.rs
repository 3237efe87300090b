//! 単価表の取得とキャッシュ

use crate::error::{BoqMatchError, Result};
use async_trait::async_trait;
use boq_matcher_common::{CatalogItem, Error as CommonError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// 有効な品目の取得元
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_active(&self) -> Result<Vec<CatalogItem>>;
}

/// メモリ上の単価表
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    items: Vec<CatalogItem>,
}

impl StaticCatalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn fetch_active(&self) -> Result<Vec<CatalogItem>> {
        Ok(self.items.iter().filter(|i| i.is_active).cloned().collect())
    }
}

/// JSON配列ファイルの単価表
#[derive(Debug, Clone)]
pub struct JsonFileCatalog {
    path: PathBuf,
}

impl JsonFileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 無効な品目も含めて読み込む（埋め込みの書き戻し用）
    pub async fn load_all(&self) -> Result<Vec<CatalogItem>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BoqMatchError::FileNotFound(self.path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content)
            .map_err(|e| BoqMatchError::InvalidCatalog(format!("{}: {}", self.path.display(), e)))
    }
}

#[async_trait]
impl CatalogSource for JsonFileCatalog {
    async fn fetch_active(&self) -> Result<Vec<CatalogItem>> {
        let mut items = self.load_all().await?;
        items.retain(|i| i.is_active);
        Ok(items)
    }
}

struct Slot {
    fetched_at: Instant,
    items: Arc<Vec<CatalogItem>>,
}

/// 単価表を1件だけ保持するキャッシュ
pub struct CatalogCache {
    source: Arc<dyn CatalogSource>,
    ttl: Duration,
    slot: Mutex<Option<Slot>>,
}

impl CatalogCache {
    pub fn new(source: Arc<dyn CatalogSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// 期限内ならキャッシュを返し、切れていれば取り直す
    ///
    /// 取得結果が空の場合はエラーにしてキャッシュしない。
    pub async fn get(&self) -> Result<Arc<Vec<CatalogItem>>> {
        let mut slot = self.slot.lock().await;

        if let Some(cached) = slot.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(cached.items.clone());
            }
        }

        let items = self.source.fetch_active().await?;
        if items.is_empty() {
            *slot = None;
            return Err(CommonError::EmptyCatalog.into());
        }

        tracing::debug!("catalog refreshed: {} active items", items.len());
        let items = Arc::new(items);
        *slot = Some(Slot {
            fetched_at: Instant::now(),
            items: items.clone(),
        });
        Ok(items)
    }

    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        items: Vec<CatalogItem>,
    }

    #[async_trait]
    impl CatalogSource for CountingSource {
        async fn fetch_active(&self) -> Result<Vec<CatalogItem>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.items.clone())
        }
    }

    fn item(key: &str, active: bool) -> CatalogItem {
        CatalogItem {
            key: key.into(),
            name: Some(key.into()),
            is_active: active,
            ..Default::default()
        }
    }

    fn counting(items: Vec<CatalogItem>) -> Arc<CountingSource> {
        Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            items,
        })
    }

    #[tokio::test]
    async fn test_static_catalog_filters_inactive() {
        let source = StaticCatalog::new(vec![item("a", true), item("b", false)]);
        let items = source.fetch_active().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].key, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_within_ttl() {
        let source = counting(vec![item("a", true)]);
        let cache = CatalogCache::new(source.clone(), Duration::from_secs(300));

        cache.get().await.unwrap();
        tokio::time::advance(Duration::from_secs(299)).await;
        cache.get().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        cache.get().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let source = counting(vec![item("a", true)]);
        let cache = CatalogCache::new(source.clone(), Duration::from_secs(300));

        cache.get().await.unwrap();
        cache.invalidate().await;
        cache.get().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_fetch_is_error_and_not_cached() {
        let source = counting(Vec::new());
        let cache = CatalogCache::new(source.clone(), Duration::from_secs(300));

        let err = cache.get().await.unwrap_err();
        assert!(matches!(err, BoqMatchError::Common(CommonError::EmptyCatalog)));
        assert!(cache.get().await.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_json_file_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[
                {"_id": "1", "name": "Steel Post", "uom_id": "NOS", "operation_cost": 25.0},
                {"_id": "2", "name": "Old Post", "isActive": false}
            ]"#,
        )
        .unwrap();

        let catalog = JsonFileCatalog::new(&path);
        assert_eq!(catalog.load_all().await.unwrap().len(), 2);

        let active = catalog.fetch_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].rate, Some(25.0));
    }

    #[tokio::test]
    async fn test_json_file_catalog_errors() {
        let missing = JsonFileCatalog::new("/nonexistent/catalog.json");
        assert!(matches!(missing.fetch_active().await, Err(BoqMatchError::FileNotFound(_))));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let bad = JsonFileCatalog::new(&path);
        assert!(matches!(bad.fetch_active().await, Err(BoqMatchError::InvalidCatalog(_))));
    }
}
