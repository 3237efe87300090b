use boq_matcher::embedding::{EmbeddingBackend, InputKind, OpenAiEmbeddings};
use boq_matcher_common::cosine_similarity;
use std::time::Duration;

#[tokio::test]
async fn openai_embedding_integration() {
    let api_key = match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            eprintln!("OPENAI_API_KEY not set; skipping integration test");
            return;
        }
    };

    let backend = OpenAiEmbeddings::new(
        api_key,
        "text-embedding-3-small".into(),
        "https://api.openai.com/v1".into(),
        Duration::from_secs(30),
    )
    .expect("client build failed");

    let texts = vec![
        "Galvanized steel fence post".to_string(),
        "Galvanised steel post for fencing".to_string(),
        "Topsoil supply and spread".to_string(),
    ];
    let vectors = backend
        .embed(&texts, InputKind::Query)
        .await
        .expect("embedding request failed");

    assert_eq!(vectors.len(), 3);
    assert!(vectors.iter().all(|v| v.len() == vectors[0].len() && !v.is_empty()));

    let close = cosine_similarity(&vectors[0], &vectors[1]);
    let far = cosine_similarity(&vectors[0], &vectors[2]);
    assert!(close > far, "close={} far={}", close, far);
}
