//! 埋め込みベクトル生成
//!
//! プロバイダごとの差分（エンドポイント・リクエスト形式）は
//! [`EmbeddingBackend`] の実装に閉じ込め、照合側は1種類のコードで扱う。

pub mod cohere;
pub mod openai;
pub mod retry;

pub use cohere::CohereEmbeddings;
pub use openai::OpenAiEmbeddings;
pub use retry::{with_retry, RetryPolicy};

use crate::config::Config;
use crate::error::Result;
use async_trait::async_trait;
use boq_matcher_common::EmbeddingProvider;
use std::sync::Arc;

/// 埋め込む文の用途（Cohere系は検索側と文書側でモデルの扱いが変わる）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// BOQ明細（検索クエリ）
    Query,
    /// 単価表の品目
    Document,
}

#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    fn provider(&self) -> EmbeddingProvider;

    fn model(&self) -> &str;

    /// 入力と同じ順序・同じ件数のベクトルを返す
    async fn embed(&self, texts: &[String], kind: InputKind) -> Result<Vec<Vec<f32>>>;
}

/// 設定からバックエンドを作る。APIキーがなければ None。
pub fn backend_from_config(
    config: &Config,
    provider: EmbeddingProvider,
) -> Result<Option<Arc<dyn EmbeddingBackend>>> {
    let Some(api_key) = config.get_setting(provider.setting_key()) else {
        tracing::info!("{} is not set; {} matching will fall back to LOCAL", provider.setting_key(), provider);
        return Ok(None);
    };

    let model = config.model(provider).to_string();
    let base_url = config.base_url(provider).to_string();
    let timeout = config.timeout();

    let backend: Arc<dyn EmbeddingBackend> = match provider {
        EmbeddingProvider::V1 => Arc::new(OpenAiEmbeddings::new(api_key, model, base_url, timeout)?),
        EmbeddingProvider::V2 => Arc::new(CohereEmbeddings::new(api_key, model, base_url, timeout)?),
    };
    Ok(Some(backend))
}

/// 件数チェック
pub(crate) fn ensure_count(vectors: Vec<Vec<f32>>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if vectors.len() != expected {
        return Err(crate::error::BoqMatchError::EmbeddingParse(format!(
            "{}件の入力に対して{}件のベクトルが返されました",
            expected,
            vectors.len()
        )));
    }
    Ok(vectors)
}
