//! 照合処理の型定義
//!
//! - CatalogItem: 単価表（価格リスト）の1品目
//! - MatchResult: 1件のBOQ明細に対する照合結果
//! - BoqLine / PricedLine: 一括照合の入力と出力

use serde::{Deserialize, Serialize};
use std::fmt;

/// 照合方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchMethod {
    /// 文字列のあいまい一致
    #[serde(rename = "LOCAL", alias = "local")]
    Local,
    /// 埋め込み V1（OpenAI互換）
    #[serde(rename = "V1", alias = "v1")]
    V1,
    /// 埋め込み V2（Cohere互換）
    #[serde(rename = "V2", alias = "v2")]
    V2,
}

impl MatchMethod {
    /// 埋め込み方式ならプロバイダを返す
    pub fn embedding_provider(&self) -> Option<EmbeddingProvider> {
        match self {
            MatchMethod::Local => None,
            MatchMethod::V1 => Some(EmbeddingProvider::V1),
            MatchMethod::V2 => Some(EmbeddingProvider::V2),
        }
    }
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMethod::Local => write!(f, "LOCAL"),
            MatchMethod::V1 => write!(f, "V1"),
            MatchMethod::V2 => write!(f, "V2"),
        }
    }
}

impl std::str::FromStr for MatchMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "lexical" => Ok(MatchMethod::Local),
            "v1" | "openai" => Ok(MatchMethod::V1),
            "v2" | "cohere" => Ok(MatchMethod::V2),
            _ => Err(format!("Unknown method: {}. Use local, v1, or v2", s)),
        }
    }
}

/// 埋め込みベクトルを生成したプロバイダ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmbeddingProvider {
    #[serde(rename = "V1", alias = "v1", alias = "openai")]
    V1,
    #[serde(rename = "V2", alias = "v2", alias = "cohere")]
    V2,
}

impl EmbeddingProvider {
    /// キャッシュキーの名前空間
    pub fn cache_prefix(&self) -> &'static str {
        match self {
            EmbeddingProvider::V1 => "v1",
            EmbeddingProvider::V2 => "v2",
        }
    }

    /// 対応する照合方式
    pub fn method(&self) -> MatchMethod {
        match self {
            EmbeddingProvider::V1 => MatchMethod::V1,
            EmbeddingProvider::V2 => MatchMethod::V2,
        }
    }

    /// APIキーの設定キー名
    pub fn setting_key(&self) -> &'static str {
        match self {
            EmbeddingProvider::V1 => "V1_API_KEY",
            EmbeddingProvider::V2 => "V2_API_KEY",
        }
    }
}

impl fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.method())
    }
}

/// 単価表の品目
///
/// 元データのフィールド名（`_id`, `uom_id`, `operation_cost` など）も
/// エイリアスで受け付ける。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    #[serde(default, rename = "_id", alias = "key")]
    pub key: String,

    /// 品目コード（ID一致ボーナスに使用）
    #[serde(default, alias = "id", skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// バリエーション（サイズ・色など）
    #[serde(
        default,
        alias = "product_template_variant_value_ids",
        skip_serializing_if = "Option::is_none"
    )]
    pub variant: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, alias = "sub_category", skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,

    #[serde(default, alias = "uom_id", skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    #[serde(default, alias = "operation_cost", skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_provider: Option<EmbeddingProvider>,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl CatalogItem {
    /// 名称（nameを優先、なければdescription）
    pub fn display_text(&self) -> &str {
        self.name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.description.as_deref())
            .unwrap_or("")
    }

    /// あいまい一致の比較対象テキスト
    pub fn comparison_text(&self) -> String {
        let mut parts = vec![self.display_text()];
        for extra in [&self.variant, &self.subcategory] {
            if let Some(text) = extra.as_deref().filter(|s| !s.is_empty()) {
                parts.push(text);
            }
        }
        parts.retain(|p| !p.is_empty());
        parts.join(" ")
    }

    /// 埋め込み生成用テキスト（カテゴリ・サブカテゴリを強調）
    pub fn document_text(&self) -> String {
        let mut parts = vec![self.display_text().to_string()];
        if let Some(variant) = self.variant.as_deref().filter(|s| !s.is_empty()) {
            parts.push(variant.to_string());
        }
        match (self.category.as_deref(), self.subcategory.as_deref()) {
            (Some(cat), Some(sub)) => {
                parts.push(format!("{} {}", cat, sub));
                parts.push(format!("{} {}", sub, cat));
            }
            (Some(cat), None) => parts.push(cat.to_string()),
            (None, Some(sub)) => parts.push(sub.to_string()),
            (None, None) => {}
        }
        if let Some(unit) = self.unit() {
            parts.push(unit.to_string());
        }
        parts.retain(|p| !p.trim().is_empty());
        parts.join(" ")
    }

    /// 単位（空文字はNone扱い）
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    /// 指定プロバイダの埋め込みを持っていれば返す
    pub fn embedding_for(&self, provider: EmbeddingProvider) -> Option<&[f32]> {
        match (&self.embedding, self.embedding_provider) {
            (Some(vector), Some(tag)) if tag == provider && !vector.is_empty() => {
                Some(vector.as_slice())
            }
            _ => None,
        }
    }
}

/// 照合結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub matched_item_id: String,
    pub matched_description: String,
    pub matched_code: String,
    pub matched_unit: String,
    pub matched_rate: f64,
    /// 0.0〜1.0（方式ごとにスケールが異なる）
    pub confidence: f64,
    pub method: MatchMethod,
}

impl MatchResult {
    /// 品目と信頼度から結果を組み立てる
    pub fn from_item(item: &CatalogItem, confidence: f64, method: MatchMethod) -> Self {
        Self {
            matched_item_id: item.key.clone(),
            matched_description: item.display_text().to_string(),
            matched_code: item.code.clone().unwrap_or_default(),
            matched_unit: item.unit().unwrap_or_default().to_string(),
            matched_rate: item.rate.unwrap_or(0.0),
            confidence: confidence.clamp(0.0, 1.0),
            method,
        }
    }
}

/// BOQの1明細（一括照合の入力）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoqLine {
    #[serde(default)]
    pub row_number: u32,

    pub description: String,

    #[serde(default)]
    pub quantity: Option<f64>,

    #[serde(default)]
    pub unit: Option<String>,

    /// シート上の見出し（カテゴリ列など）
    #[serde(default)]
    pub context_headers: Vec<String>,
}

/// 価格付けされたBOQ明細（一括照合の出力）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    pub row_number: u32,
    pub description: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    /// 閾値以上の照合結果のみ採用
    pub matched: Option<MatchResult>,
    /// 閾値に関係なく得られた信頼度
    pub confidence: f64,
    pub total_price: f64,
}

impl PricedLine {
    /// 照合結果を閾値で判定して価格を計算する
    pub fn from_match(line: &BoqLine, result: MatchResult, threshold: f64) -> Self {
        let confidence = result.confidence;
        let matched = (confidence >= threshold).then_some(result);
        let total_price = match (&matched, line.quantity) {
            (Some(m), Some(qty)) => qty * m.matched_rate,
            _ => 0.0,
        };

        Self {
            row_number: line.row_number,
            description: line.description.clone(),
            quantity: line.quantity,
            unit: line.unit.clone(),
            matched,
            confidence,
            total_price,
        }
    }
}
