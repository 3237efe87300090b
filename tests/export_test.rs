//! JSON/Excel出力の統合テスト

use boq_matcher::cache::EmbeddingCache;
use boq_matcher::embedding::RetryPolicy;
use boq_matcher::export::{export_report, write_json, ExportFormat};
use boq_matcher::matcher::{match_lines, BatchOptions, BatchReport};
use boq_matcher::MatchingService;
use boq_matcher_common::{BoqLine, CatalogItem, MatchMethod, ScoreWeights};
use std::time::Duration;
use tempfile::tempdir;

fn catalog() -> Vec<CatalogItem> {
    vec![
        CatalogItem {
            key: "gate".into(),
            name: Some("Mesh Gate 4ft".into()),
            code: Some("MG-4".into()),
            unit: Some("NOS".into()),
            rate: Some(180.0),
            ..Default::default()
        },
        CatalogItem {
            key: "wire".into(),
            name: Some("Barbed wire".into()),
            unit: Some("ROLL".into()),
            rate: Some(35.0),
            ..Default::default()
        },
    ]
}

async fn create_report() -> BatchReport {
    let service = MatchingService::new(
        ScoreWeights::default(),
        RetryPolicy::default(),
        EmbeddingCache::new(10, Duration::from_secs(60)),
    );
    let lines = vec![
        BoqLine {
            row_number: 4,
            description: "MG-4 Mesh gate 4ft (nos)".into(),
            quantity: Some(2.0),
            unit: Some("nos".into()),
            context_headers: vec!["Gates".into()],
        },
        BoqLine {
            row_number: 5,
            description: "Barbed wire (rolls)".into(),
            quantity: Some(10.0),
            unit: Some("rolls".into()),
            context_headers: Vec::new(),
        },
    ];

    match_lines(
        &service,
        &lines,
        &catalog(),
        MatchMethod::Local,
        BatchOptions::default(),
        |_| {},
    )
    .await
    .expect("一括照合に失敗")
}

#[tokio::test]
async fn test_json_export_roundtrip() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("report.json");
    let report = create_report().await;

    write_json(&report, &path).expect("JSON出力に失敗");

    let content = std::fs::read_to_string(&path).unwrap();
    let loaded: BatchReport = serde_json::from_str(&content).unwrap();
    assert_eq!(loaded.lines.len(), 2);
    assert_eq!(loaded.summary.matched_lines, report.summary.matched_lines);
    assert!(content.contains("\"totalPrice\""));
    assert!(content.contains("\"matchedItemId\""));
}

#[tokio::test]
async fn test_report_totals() {
    let report = create_report().await;
    assert_eq!(report.summary.matched_lines, 2);
    assert!((report.summary.total_value - (2.0 * 180.0 + 10.0 * 35.0)).abs() < 1e-9);
}

#[tokio::test]
async fn test_export_both_formats() {
    let dir = tempdir().expect("Failed to create temp dir");
    let report = create_report().await;

    let written = export_report(&report, ExportFormat::Both, dir.path(), "priced-boq")
        .expect("出力に失敗");

    assert_eq!(written.len(), 2);
    for path in &written {
        assert!(path.exists(), "ファイルが作成されていない: {}", path.display());
        let metadata = std::fs::metadata(path).expect("ファイルメタデータ取得失敗");
        assert!(metadata.len() > 0, "ファイルが空: {}", path.display());
    }
    assert!(written[1].extension().is_some_and(|e| e == "xlsx"));
}
