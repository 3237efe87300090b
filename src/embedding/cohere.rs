//! V2: Cohere互換の埋め込みAPI（`POST {base}/embed`）

use super::{ensure_count, EmbeddingBackend, InputKind};
use crate::error::{BoqMatchError, Result};
use async_trait::async_trait;
use boq_matcher_common::EmbeddingProvider;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CohereEmbeddings {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
    model: &'a str,
    input_type: &'static str,
    truncate: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

fn input_type(kind: InputKind) -> &'static str {
    match kind {
        InputKind::Query => "search_query",
        InputKind::Document => "search_document",
    }
}

impl CohereEmbeddings {
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
        format!("{}/embed", self.base_url)
    }
}

fn parse_response(body: &str, expected: usize) -> Result<Vec<Vec<f32>>> {
    let response: EmbedResponse = serde_json::from_str(body)
        .map_err(|e| BoqMatchError::EmbeddingParse(format!("{}", e)))?;
    ensure_count(response.embeddings, expected)
}

#[async_trait]
impl EmbeddingBackend for CohereEmbeddings {
    fn provider(&self) -> EmbeddingProvider {
        EmbeddingProvider::V2
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String], kind: InputKind) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            texts,
            model: &self.model,
            input_type: input_type(kind),
            truncate: "END",
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
            return Err(BoqMatchError::EmbeddingApi(format!("V2 {}: {}", status, body)));
        }

        parse_response(&body, texts.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_input_type() {
        let texts = vec!["Barbed wire".to_string()];
        let request = EmbedRequest {
            texts: &texts,
            model: "embed-english-v3.0",
            input_type: input_type(InputKind::Document),
            truncate: "END",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["input_type"], "search_document");
        assert_eq!(json["texts"][0], "Barbed wire");
        assert_eq!(input_type(InputKind::Query), "search_query");
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{"id":"x","embeddings":[[0.5,0.5],[1.0,0.0]],"texts":["a","b"]}"#;
        let vectors = parse_response(body, 2).unwrap();
        assert_eq!(vectors[1], vec![1.0, 0.0]);
    }

    #[test]
    fn test_parse_response_count_mismatch() {
        let body = r#"{"embeddings":[]}"#;
        assert!(matches!(parse_response(body, 1), Err(BoqMatchError::EmbeddingParse(_))));
    }
}
