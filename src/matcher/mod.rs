//! 照合サービス
//!
//! 照合方式（LOCAL / V1 / V2）を受け取り、埋め込み照合を試して
//! 使えない場合はLOCAL照合に切り替える。切り替えは [`MatchStep`] の遷移で表す。
//!
//! ```text
//! TryEmbedding ──▶ Done
//!      │
//!      ▼
//!   Fallback ──▶ Done
//! ```

pub mod batch;

pub use batch::{match_lines, BatchOptions, BatchReport, BatchSummary};

use crate::cache::{CatalogCache, CatalogSource, EmbeddingCache, JsonFileCatalog};
use crate::config::Config;
use crate::embedding::{backend_from_config, with_retry, EmbeddingBackend, InputKind, RetryPolicy};
use crate::error::{BoqMatchError, Result};
use boq_matcher_common::{
    embedding_match, local_match, query_text_with_context, CatalogItem, EmbeddingProvider,
    Error as CommonError, MatchMethod, MatchResult, ScoreWeights,
};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// 単価表の埋め込みを一度に送る件数
const DOCUMENT_CHUNK_SIZE: usize = 96;

/// LOCAL照合に切り替えた理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// LOCALが指定された
    Requested,
    /// プロバイダのAPIキーがない
    NoClient,
    /// 埋め込みAPIがリトライ後も失敗した
    EmbeddingFailed,
    /// このプロバイダの埋め込みを持つ品目がない
    NoCandidateEmbeddings,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::Requested => write!(f, "local method requested"),
            FallbackReason::NoClient => write!(f, "no embedding client configured"),
            FallbackReason::EmbeddingFailed => write!(f, "embedding request failed"),
            FallbackReason::NoCandidateEmbeddings => write!(f, "no catalog items with embeddings"),
        }
    }
}

/// 照合の状態
#[derive(Debug, Clone, PartialEq)]
pub enum MatchStep {
    TryEmbedding(EmbeddingProvider),
    Fallback(FallbackReason),
    Done(MatchResult),
}

impl MatchStep {
    fn start(method: MatchMethod) -> Self {
        match method.embedding_provider() {
            Some(provider) => MatchStep::TryEmbedding(provider),
            None => MatchStep::Fallback(FallbackReason::Requested),
        }
    }
}

/// 照合サービス（`Arc` で共有して使う）
pub struct MatchingService {
    backends: HashMap<EmbeddingProvider, Arc<dyn EmbeddingBackend>>,
    catalog: Option<CatalogCache>,
    cache: EmbeddingCache,
    retry: RetryPolicy,
    weights: ScoreWeights,
}

impl MatchingService {
    pub fn new(weights: ScoreWeights, retry: RetryPolicy, cache: EmbeddingCache) -> Self {
        Self {
            backends: HashMap::new(),
            catalog: None,
            cache,
            retry,
            weights,
        }
    }

    /// 設定からサービスを組み立てる（APIキーのあるプロバイダだけ有効）
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut service = Self::new(
            config.weights.clone(),
            RetryPolicy::from_config(config),
            EmbeddingCache::new(config.embedding_cache_capacity, config.embedding_cache_ttl()),
        );

        for provider in [EmbeddingProvider::V1, EmbeddingProvider::V2] {
            if let Some(backend) = backend_from_config(config, provider)? {
                service = service.with_backend(backend);
            }
        }
        Ok(service)
    }

    /// 設定とJSON単価表ファイルから組み立てる
    ///
    /// 単価表は `catalogCacheTtlSeconds` の間キャッシュする。
    pub fn from_config_with_catalog(config: &Config, catalog: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::from_config(config)?.with_catalog_source(
            Arc::new(JsonFileCatalog::new(catalog)),
            config.catalog_cache_ttl(),
        ))
    }

    pub fn with_backend(mut self, backend: Arc<dyn EmbeddingBackend>) -> Self {
        self.backends.insert(backend.provider(), backend);
        self
    }

    pub fn with_catalog_source(
        mut self,
        source: Arc<dyn CatalogSource>,
        ttl: std::time::Duration,
    ) -> Self {
        self.catalog = Some(CatalogCache::new(source, ttl));
        self
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    pub fn embedding_cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn has_backend(&self, provider: EmbeddingProvider) -> bool {
        self.backends.contains_key(&provider)
    }

    /// キャッシュ経由で単価表を取得する
    pub async fn load_catalog(&self) -> Result<Arc<Vec<CatalogItem>>> {
        match &self.catalog {
            Some(cache) => cache.get().await,
            None => Err(BoqMatchError::Config("単価表の取得元が設定されていません".into())),
        }
    }

    pub async fn invalidate_catalog(&self) {
        if let Some(cache) = &self.catalog {
            cache.invalidate().await;
        }
    }

    /// 1件の明細を照合する
    ///
    /// `catalog` を省略するとサービスの単価表キャッシュを使う。
    /// 単価表が空でなければ必ず1件返す。
    pub async fn match_item(
        &self,
        description: &str,
        method: MatchMethod,
        catalog: Option<&[CatalogItem]>,
        context_headers: &[String],
    ) -> Result<MatchResult> {
        let loaded;
        let items: &[CatalogItem] = match catalog {
            Some(items) => items,
            None => {
                loaded = self.load_catalog().await?;
                loaded.as_slice()
            }
        };
        if items.is_empty() {
            return Err(CommonError::EmptyCatalog.into());
        }

        let mut step = MatchStep::start(method);
        loop {
            step = match step {
                MatchStep::TryEmbedding(provider) => {
                    self.try_embedding(provider, description, items, context_headers)
                        .await
                }
                MatchStep::Fallback(reason) => {
                    log_fallback(method, reason);
                    MatchStep::Done(local_match(description, items, context_headers, &self.weights)?)
                }
                MatchStep::Done(result) => return Ok(result),
            };
        }
    }

    async fn try_embedding(
        &self,
        provider: EmbeddingProvider,
        description: &str,
        items: &[CatalogItem],
        context_headers: &[String],
    ) -> MatchStep {
        let Some(backend) = self.backends.get(&provider) else {
            return MatchStep::Fallback(FallbackReason::NoClient);
        };

        // APIを呼ぶ前に候補の有無を確認する
        if !items.iter().any(|i| i.embedding_for(provider).is_some()) {
            return MatchStep::Fallback(FallbackReason::NoCandidateEmbeddings);
        }

        let query_text = query_text_with_context(description, context_headers);
        let vector = match self.query_vector(backend.as_ref(), &query_text).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!("{} embedding failed: {}", provider, e);
                return MatchStep::Fallback(FallbackReason::EmbeddingFailed);
            }
        };

        match embedding_match(description, &vector, items, provider, &self.weights) {
            Some(result) => MatchStep::Done(result),
            None => MatchStep::Fallback(FallbackReason::NoCandidateEmbeddings),
        }
    }

    /// クエリ文のベクトル（キャッシュ → API）
    async fn query_vector(&self, backend: &dyn EmbeddingBackend, text: &str) -> Result<Vec<f32>> {
        let provider = backend.provider();
        if let Some(vector) = self.cache.get(provider, text) {
            tracing::debug!("{} embedding cache hit", provider);
            return Ok(vector);
        }

        let texts = vec![text.to_string()];
        let label = format!("{} embed", provider);
        let vector = with_retry(&self.retry, &label, || backend.embed(&texts, InputKind::Query))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BoqMatchError::EmbeddingParse("空のレスポンス".into()))?;

        self.cache.insert(provider, text, vector.clone());
        Ok(vector)
    }

    /// 事前に計算したクエリベクトルで照合する
    ///
    /// 候補がなければLOCAL照合に切り替える。
    pub async fn match_with_embedding(
        &self,
        description: &str,
        provider: EmbeddingProvider,
        query_vector: &[f32],
        catalog: Option<&[CatalogItem]>,
        context_headers: &[String],
    ) -> Result<MatchResult> {
        let loaded;
        let items: &[CatalogItem] = match catalog {
            Some(items) => items,
            None => {
                loaded = self.load_catalog().await?;
                loaded.as_slice()
            }
        };
        if items.is_empty() {
            return Err(CommonError::EmptyCatalog.into());
        }

        if let Some(result) = embedding_match(description, query_vector, items, provider, &self.weights) {
            return Ok(result);
        }

        log_fallback(provider.method(), FallbackReason::NoCandidateEmbeddings);
        Ok(local_match(description, items, context_headers, &self.weights)?)
    }

    /// 複数のクエリ文をまとめて埋め込む
    ///
    /// キャッシュ済みの文はAPIに送らず、新しく得たベクトルはキャッシュに入れる。
    pub async fn generate_batch_embeddings(
        &self,
        texts: &[String],
        provider: EmbeddingProvider,
    ) -> Result<Vec<Vec<f32>>> {
        let backend = self.backend(provider)?;

        let mut vectors: Vec<Option<Vec<f32>>> =
            texts.iter().map(|t| self.cache.get(provider, t)).collect();
        let missing: Vec<usize> = (0..texts.len()).filter(|&i| vectors[i].is_none()).collect();

        if !missing.is_empty() {
            let pending: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let label = format!("{} batch embed", provider);
            let fetched = with_retry(&self.retry, &label, || {
                backend.embed(&pending, InputKind::Query)
            })
            .await?;

            for (idx, vector) in missing.into_iter().zip(fetched) {
                self.cache.insert(provider, &texts[idx], vector.clone());
                vectors[idx] = Some(vector);
            }
        }

        vectors
            .into_iter()
            .map(|v| v.ok_or_else(|| BoqMatchError::EmbeddingParse("ベクトルが不足しています".into())))
            .collect()
    }

    /// 単価表の品目に埋め込みを付ける
    ///
    /// 件数を返す。各品目の `embedding_provider` も書き換える。
    pub async fn generate_catalog_embeddings(
        &self,
        items: &mut [CatalogItem],
        provider: EmbeddingProvider,
    ) -> Result<usize> {
        let backend = self.backend(provider)?;
        let total = items.len();
        let mut embedded = 0;

        for chunk in items.chunks_mut(DOCUMENT_CHUNK_SIZE) {
            let documents: Vec<String> = chunk.iter().map(CatalogItem::document_text).collect();
            let label = format!("{} document embed", provider);
            let vectors = with_retry(&self.retry, &label, || {
                backend.embed(&documents, InputKind::Document)
            })
            .await?;

            for (item, vector) in chunk.iter_mut().zip(vectors) {
                item.embedding = Some(vector);
                item.embedding_provider = Some(provider);
                embedded += 1;
            }
            tracing::info!("{} catalog embeddings: {}/{}", provider, embedded, total);
        }

        Ok(embedded)
    }

    fn backend(&self, provider: EmbeddingProvider) -> Result<&Arc<dyn EmbeddingBackend>> {
        self.backends
            .get(&provider)
            .ok_or_else(|| BoqMatchError::MissingApiKey(provider.setting_key().to_string()))
    }
}

fn log_fallback(method: MatchMethod, reason: FallbackReason) {
    match reason {
        FallbackReason::Requested => {}
        FallbackReason::EmbeddingFailed => {
            tracing::warn!("{} matching fell back to LOCAL: {}", method, reason)
        }
        FallbackReason::NoClient | FallbackReason::NoCandidateEmbeddings => {
            tracing::info!("{} matching fell back to LOCAL: {}", method, reason)
        }
    }
}
