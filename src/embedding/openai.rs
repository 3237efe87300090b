//! V1: OpenAI互換の埋め込みAPI（`POST {base}/embeddings`）

use super::{ensure_count, EmbeddingBackend, InputKind};
use crate::error::{BoqMatchError, Result};
use async_trait::async_trait;
use boq_matcher_common::EmbeddingProvider;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OpenAiEmbeddings {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl OpenAiEmbeddings {
    pub fn new(api_key: String, model: String, base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }
}

/// レスポンス本文をベクトル列に変換（index順に並べ直す）
fn parse_response(body: &str, expected: usize) -> Result<Vec<Vec<f32>>> {
    let mut response: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| BoqMatchError::EmbeddingParse(format!("{}", e)))?;
    response.data.sort_by_key(|d| d.index);
    ensure_count(response.data.into_iter().map(|d| d.embedding).collect(), expected)
}

#[async_trait]
impl EmbeddingBackend for OpenAiEmbeddings {
    fn provider(&self) -> EmbeddingProvider {
        EmbeddingProvider::V1
    }

    fn model(&self) -> &str {
        &self.model
    }

    // OpenAIは用途の区別を持たない
    async fn embed(&self, texts: &[String], _kind: InputKind) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BoqMatchError::EmbeddingApi(format!("V1 {}: {}", status, body)));
        }

        parse_response(&body, texts.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body() {
        let input = vec!["Steel post".to_string()];
        let request = EmbeddingRequest {
            model: "text-embedding-3-small",
            input: &input,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "text-embedding-3-small");
        assert_eq!(json["input"][0], "Steel post");
    }

    #[test]
    fn test_parse_response_reorders_by_index() {
        let body = r#"{"object":"list","data":[
            {"object":"embedding","index":1,"embedding":[0.0,1.0]},
            {"object":"embedding","index":0,"embedding":[1.0,0.0]}
        ],"model":"text-embedding-3-small"}"#;
        let vectors = parse_response(body, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_response_count_mismatch() {
        let body = r#"{"data":[{"index":0,"embedding":[1.0]}]}"#;
        assert!(matches!(parse_response(body, 2), Err(BoqMatchError::EmbeddingParse(_))));
    }

    #[test]
    fn test_parse_response_invalid_json() {
        assert!(matches!(parse_response("oops", 1), Err(BoqMatchError::EmbeddingParse(_))));
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let backend = OpenAiEmbeddings::new(
            "k".into(),
            "m".into(),
            "https://api.openai.com/v1/".into(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(backend.endpoint(), "https://api.openai.com/v1/embeddings");
        assert_eq!(backend.provider(), EmbeddingProvider::V1);
    }
}
