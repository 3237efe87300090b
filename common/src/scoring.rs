//! 照合スコアリング
//!
//! - LOCAL: あいまい一致 + 単位・見出し・ID・種別のボーナス
//! - 埋め込み: コサイン類似度 + 単位一致の補正
//!
//! ボーナスの大きさは [`ScoreWeights`] にまとめ、設定ファイルから変更できる。

use crate::error::{Error, Result};
use crate::fuzzy::{expand_abbreviations, token_set_ratio};
use crate::product_type::{detect_types, is_size_tag};
use crate::types::{CatalogItem, EmbeddingProvider, MatchMethod, MatchResult};
use crate::units::{extract_unit, normalize_unit};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// スコアの重み表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoreWeights {
    /// 単位が正規形で一致
    pub unit_match: f64,
    /// 明細に単位があるのに品目に単位がない
    pub item_missing_unit: f64,
    /// 品目に単位があるのに明細に単位がない
    pub query_missing_unit: f64,
    /// 見出し語1語あたり
    pub context_word: f64,
    /// 品目コードが明細に含まれる
    pub id_match: f64,
    /// 共通の種別タグ1つあたり
    pub type_match: f64,
    /// 寸法タグが一致
    pub size_match: f64,
    /// LOCALのスコア → 信頼度の換算値
    pub score_normalizer: f64,
    /// LOCALの信頼度の上限（埋め込み方式の余地を残す）
    pub max_lexical_confidence: f64,
    /// 単位一致を優先するスコア差
    pub tie_margin: f64,
    /// 埋め込み: 単位一致で加算
    pub embedding_unit_boost: f64,
    /// 埋め込み: 加算後の上限
    pub embedding_boost_cap: f64,
    /// 埋め込み: 品目に単位がない場合の倍率
    pub embedding_missing_unit_factor: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            unit_match: 50.0,
            item_missing_unit: -25.0,
            query_missing_unit: -5.0,
            context_word: 8.0,
            id_match: 20.0,
            type_match: 15.0,
            size_match: 20.0,
            score_normalizer: 180.0,
            max_lexical_confidence: 0.95,
            tie_margin: 10.0,
            embedding_unit_boost: 0.3,
            embedding_boost_cap: 0.99,
            embedding_missing_unit_factor: 0.7,
        }
    }
}

impl ScoreWeights {
    /// 値の範囲チェック
    pub fn validate(&self) -> Result<()> {
        if self.score_normalizer <= 0.0 {
            return Err(Error::Config("scoreNormalizer must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.max_lexical_confidence) {
            return Err(Error::Config("maxLexicalConfidence must be within 0..=1".into()));
        }
        if !(0.0..=1.0).contains(&self.embedding_boost_cap) {
            return Err(Error::Config("embeddingBoostCap must be within 0..=1".into()));
        }
        if !(0.0..=1.0).contains(&self.embedding_missing_unit_factor) {
            return Err(Error::Config(
                "embeddingMissingUnitFactor must be within 0..=1".into(),
            ));
        }
        if self.tie_margin < 0.0 {
            return Err(Error::Config("tieMargin must not be negative".into()));
        }
        Ok(())
    }
}

/// 見出しを明細の前に付けたクエリ文
pub fn query_text_with_context(description: &str, context_headers: &[String]) -> String {
    let headers: Vec<&str> = context_headers
        .iter()
        .map(|h| h.trim())
        .filter(|h| !h.is_empty())
        .collect();

    if headers.is_empty() {
        description.to_string()
    } else {
        format!("{} {}", headers.join(" "), description)
    }
}

/// 前処理済みのLOCAL照合クエリ
#[derive(Debug, Clone)]
pub struct LexicalQuery {
    pub raw: String,
    pub raw_lower: String,
    pub expanded: String,
    /// 抽出した単位の正規形（なければ空）
    pub unit: String,
    pub types: BTreeSet<String>,
    pub context_words: Vec<String>,
}

impl LexicalQuery {
    pub fn new(description: &str, context_headers: &[String]) -> Self {
        let raw_unit = extract_unit(description);
        let unit = if raw_unit.is_empty() {
            String::new()
        } else {
            normalize_unit(&raw_unit)
        };

        let context_words = context_headers
            .join(" ")
            .to_lowercase()
            .split_whitespace()
            .filter(|w| w.chars().count() > 3)
            .map(str::to_string)
            .collect();

        Self {
            raw: description.to_string(),
            raw_lower: description.to_lowercase(),
            expanded: expand_abbreviations(description),
            unit,
            types: detect_types(description),
            context_words,
        }
    }

    pub fn has_unit(&self) -> bool {
        !self.unit.is_empty()
    }

    /// 品目の単位が明細の単位と一致するか
    pub fn unit_matches(&self, item: &CatalogItem) -> bool {
        self.has_unit() && item.unit().is_some_and(|u| normalize_unit(u) == self.unit)
    }
}

/// 1品目のスコア内訳
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreBreakdown {
    pub fuzzy: f64,
    pub unit: f64,
    pub context: f64,
    pub id: f64,
    pub types: f64,
    pub unit_matches: bool,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.fuzzy + self.unit + self.context + self.id + self.types
    }
}

/// 1品目を採点する
pub fn score_candidate(
    query: &LexicalQuery,
    item: &CatalogItem,
    weights: &ScoreWeights,
) -> ScoreBreakdown {
    let item_text = item.comparison_text();
    let item_lower = item_text.to_lowercase();

    let fuzzy = token_set_ratio(&query.raw, &item_text)
        .max(token_set_ratio(&query.expanded, &item_text));

    let unit_matches = query.unit_matches(item);
    let unit = match (query.has_unit(), item.unit().is_some()) {
        (true, true) if unit_matches => weights.unit_match,
        (true, true) => 0.0,
        (true, false) => weights.item_missing_unit,
        (false, true) => weights.query_missing_unit,
        (false, false) => 0.0,
    };

    let context = query
        .context_words
        .iter()
        .filter(|w| item_lower.contains(w.as_str()))
        .count() as f64
        * weights.context_word;

    let id = match item.code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() && query.raw_lower.contains(&code.to_lowercase()) => {
            weights.id_match
        }
        _ => 0.0,
    };

    let types = if query.types.is_empty() {
        0.0
    } else {
        let item_types = detect_types(&item_text);
        let shared = query.types.intersection(&item_types).count() as f64;
        let size_bonus = if query.types.iter().any(|t| is_size_tag(t) && item_types.contains(t)) {
            weights.size_match
        } else {
            0.0
        };
        shared * weights.type_match + size_bonus
    };

    ScoreBreakdown {
        fuzzy,
        unit,
        context,
        id,
        types,
        unit_matches,
    }
}

/// 単位一致による同点付近の選び直し
///
/// `ranked` はスコア降順の (スコア, 単位一致)。先頭が単位不一致で、
/// 先頭との差が `margin` 未満の単位一致候補があればそれを選ぶ。
pub fn tie_break_index(ranked: &[(f64, bool)], query_has_unit: bool, margin: f64) -> usize {
    let Some(&(top, top_matches)) = ranked.first() else {
        return 0;
    };
    if !query_has_unit || top_matches {
        return 0;
    }
    ranked
        .iter()
        .position(|&(score, matches)| matches && top - score < margin)
        .unwrap_or(0)
}

/// LOCAL照合
///
/// カタログが空でなければ必ず1件返す（信頼度が低くても返す）。
pub fn local_match(
    description: &str,
    catalog: &[CatalogItem],
    context_headers: &[String],
    weights: &ScoreWeights,
) -> Result<MatchResult> {
    if catalog.is_empty() {
        return Err(Error::EmptyCatalog);
    }

    let query = LexicalQuery::new(description, context_headers);

    let mut scored: Vec<(usize, ScoreBreakdown)> = catalog
        .par_iter()
        .enumerate()
        .map(|(idx, item)| (idx, score_candidate(&query, item, weights)))
        .collect();

    scored.sort_by(|a, b| b.1.total().partial_cmp(&a.1.total()).unwrap_or(Ordering::Equal));

    let ranked: Vec<(f64, bool)> = scored
        .iter()
        .map(|(_, s)| (s.total(), s.unit_matches))
        .collect();
    let pick = tie_break_index(&ranked, query.has_unit(), weights.tie_margin);

    for (rank, (idx, score)) in scored.iter().take(3).enumerate() {
        let item = &catalog[*idx];
        tracing::debug!(
            rank = rank + 1,
            score = score.total(),
            fuzzy = score.fuzzy,
            unit = score.unit,
            types = score.types,
            item = item.display_text(),
            item_unit = item.unit().unwrap_or("N/A"),
            "local match candidate"
        );
    }

    let (best_idx, best_score) = scored[pick];
    let confidence =
        (best_score.total() / weights.score_normalizer).clamp(0.0, weights.max_lexical_confidence);

    Ok(MatchResult::from_item(
        &catalog[best_idx],
        confidence,
        MatchMethod::Local,
    ))
}

/// コサイン類似度
///
/// 次元が異なる・どちらかのノルムが0の場合は 0（比較不能として扱う）。
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b.iter()).fold(
        (0.0f64, 0.0f64, 0.0f64),
        |(dot, na, nb), (&x, &y)| {
            let (x, y) = (x as f64, y as f64);
            (dot + x * y, na + x * x, nb + y * y)
        },
    );

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 {
        0.0
    } else {
        dot / denominator
    }
}

/// 埋め込み類似度を単位で補正する
pub fn adjust_for_unit(
    similarity: f64,
    query_unit: &str,
    item_unit: Option<&str>,
    weights: &ScoreWeights,
) -> f64 {
    if query_unit.is_empty() {
        return similarity;
    }
    match item_unit {
        Some(unit) if normalize_unit(unit) == query_unit => (similarity
            + weights.embedding_unit_boost)
            .min(weights.embedding_boost_cap)
            .max(similarity),
        Some(_) => similarity,
        None => similarity * weights.embedding_missing_unit_factor,
    }
}

/// 埋め込み照合（クエリベクトルは呼び出し側で用意）
///
/// 同じプロバイダの埋め込みを持つ品目がなければ None。
pub fn embedding_match(
    description: &str,
    query_vector: &[f32],
    catalog: &[CatalogItem],
    provider: EmbeddingProvider,
    weights: &ScoreWeights,
) -> Option<MatchResult> {
    let raw_unit = extract_unit(description);
    let query_unit = if raw_unit.is_empty() {
        String::new()
    } else {
        normalize_unit(&raw_unit)
    };

    let best = catalog
        .iter()
        .filter_map(|item| item.embedding_for(provider).map(|v| (item, v)))
        .map(|(item, vector)| {
            let similarity = cosine_similarity(query_vector, vector);
            let score = adjust_for_unit(similarity, &query_unit, item.unit(), weights);
            (item, score)
        })
        .fold(None::<(&CatalogItem, f64)>, |best, (item, score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((item, score)),
        })?;

    tracing::debug!(
        provider = %provider,
        score = best.1,
        item = best.0.display_text(),
        "embedding match"
    );

    Some(MatchResult::from_item(best.0, best.1, provider.method()))
}
