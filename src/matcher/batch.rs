//! BOQ明細の一括照合
//!
//! 明細を `batch_size` 件ずつのグループに分け、グループ内は並行に照合する。
//! 埋め込み方式ではグループ単位でクエリ文をまとめて埋め込む。
//! まとめての埋め込みが失敗したグループは、明細ごとに再試行せずLOCALで照合する。

use super::MatchingService;
use crate::error::Result;
use boq_matcher_common::{
    query_text_with_context, BoqLine, CatalogItem, EmbeddingProvider, MatchMethod, PricedLine,
};
use chrono::{DateTime, Local};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchOptions {
    pub batch_size: usize,
    /// これ未満の信頼度は不採用
    pub threshold: f64,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 5,
            threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total_lines: usize,
    pub matched_lines: usize,
    pub unmatched_lines: usize,
    pub total_value: f64,
    pub method: MatchMethod,
    pub threshold: f64,
    pub generated_at: DateTime<Local>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub summary: BatchSummary,
    pub lines: Vec<PricedLine>,
}

fn unmatched(line: &BoqLine) -> PricedLine {
    PricedLine {
        row_number: line.row_number,
        description: line.description.clone(),
        quantity: line.quantity,
        unit: line.unit.clone(),
        matched: None,
        confidence: 0.0,
        total_price: 0.0,
    }
}

/// グループ単位の事前埋め込みの結果
enum Prepared {
    /// 事前埋め込みなし（各明細は `match_item` に任せる）
    Skipped,
    /// 明細ごとのクエリベクトル（空行は None）
    Vectors(EmbeddingProvider, Vec<Option<Vec<f32>>>),
    /// 事前埋め込みが失敗した（グループ全体をLOCALで照合）
    Failed,
}

async fn prepare_group(
    service: &MatchingService,
    group: &[BoqLine],
    catalog: &[CatalogItem],
    method: MatchMethod,
) -> Prepared {
    let Some(provider) = method.embedding_provider() else {
        return Prepared::Skipped;
    };
    if !service.has_backend(provider) || !catalog.iter().any(|i| i.embedding_for(provider).is_some()) {
        return Prepared::Skipped;
    }

    let indices: Vec<usize> = group
        .iter()
        .enumerate()
        .filter(|(_, l)| !l.description.trim().is_empty())
        .map(|(i, _)| i)
        .collect();
    if indices.is_empty() {
        return Prepared::Skipped;
    }

    let texts: Vec<String> = indices
        .iter()
        .map(|&i| query_text_with_context(&group[i].description, &group[i].context_headers))
        .collect();

    match service.generate_batch_embeddings(&texts, provider).await {
        Ok(vectors) => {
            let mut per_line = vec![None; group.len()];
            for (i, vector) in indices.into_iter().zip(vectors) {
                per_line[i] = Some(vector);
            }
            Prepared::Vectors(provider, per_line)
        }
        Err(e) => {
            tracing::warn!("{} batch pre-embedding failed, matching group with LOCAL: {}", provider, e);
            Prepared::Failed
        }
    }
}

/// 明細をまとめて照合し、価格を付ける
///
/// `on_progress` には処理済みの件数を渡す。
pub async fn match_lines<F>(
    service: &MatchingService,
    lines: &[BoqLine],
    catalog: &[CatalogItem],
    method: MatchMethod,
    options: BatchOptions,
    mut on_progress: F,
) -> Result<BatchReport>
where
    F: FnMut(usize),
{
    let batch_size = options.batch_size.max(1);
    let mut priced = Vec::with_capacity(lines.len());

    for group in lines.chunks(batch_size) {
        let prepared = prepare_group(service, group, catalog, method).await;
        let prepared = &prepared;

        let results = join_all(group.iter().enumerate().map(|(i, line)| async move {
            if line.description.trim().is_empty() {
                return Ok(None);
            }
            let description = line.description.as_str();
            let headers = line.context_headers.as_slice();
            let result = match prepared {
                Prepared::Vectors(provider, vectors) => match &vectors[i] {
                    Some(vector) => {
                        service
                            .match_with_embedding(description, *provider, vector, Some(catalog), headers)
                            .await
                    }
                    None => service.match_item(description, method, Some(catalog), headers).await,
                },
                Prepared::Failed => {
                    service
                        .match_item(description, MatchMethod::Local, Some(catalog), headers)
                        .await
                }
                Prepared::Skipped => service.match_item(description, method, Some(catalog), headers).await,
            };
            result.map(Some)
        }))
        .await;

        for (line, result) in group.iter().zip(results) {
            let priced_line = match result? {
                Some(result) => PricedLine::from_match(line, result, options.threshold),
                None => unmatched(line),
            };
            priced.push(priced_line);
        }

        on_progress(priced.len());
    }

    let matched_lines = priced.iter().filter(|l| l.matched.is_some()).count();
    let total_value: f64 = priced.iter().map(|l| l.total_price).sum();
    tracing::info!(
        "batch matched {}/{} lines, total value {:.2}",
        matched_lines,
        priced.len(),
        total_value
    );

    Ok(BatchReport {
        summary: BatchSummary {
            total_lines: priced.len(),
            matched_lines,
            unmatched_lines: priced.len() - matched_lines,
            total_value,
            method,
            threshold: options.threshold,
            generated_at: Local::now(),
        },
        lines: priced,
    })
}
