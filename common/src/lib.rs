//! BOQ Matcher Common Library
//!
//! CLIと将来のフロントエンドで共有される型と照合ロジック（同期・純粋関数）

pub mod types;
pub mod error;
pub mod units;
pub mod product_type;
pub mod fuzzy;
pub mod scoring;
pub mod export;

pub use types::{BoqLine, CatalogItem, EmbeddingProvider, MatchMethod, MatchResult, PricedLine};
pub use error::{Error, Result};
pub use units::{extract_unit, normalize_unit, units_match};
pub use product_type::detect_types;
pub use fuzzy::{expand_abbreviations, token_set_ratio};
pub use scoring::{
    cosine_similarity, embedding_match, local_match, query_text_with_context, ScoreWeights,
};
