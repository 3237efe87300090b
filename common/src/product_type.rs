//! 品目種別の検出（LOCAL照合専用）
//!
//! 柵・門扉などの名詞と材質、寸法トークンをタグとして取り出す。

use regex::Regex;
use std::collections::BTreeSet;

/// (部分一致させる語, タグ)
const TYPE_VOCABULARY: &[(&[&str], &str)] = &[
    // 製品
    (&["post"], "post"),
    (&["gate"], "gate"),
    (&["mesh"], "mesh"),
    (&["wire"], "wire"),
    (&["palisade"], "palisade"),
    (&["fence", "fencing"], "fence"),
    (&["rail"], "rail"),
    (&["panel"], "panel"),
    (&["bolt"], "bolt"),
    (&["clamp"], "clamp"),
    (&["bracket"], "bracket"),
    // 材質
    (&["steel"], "steel"),
    (&["galv"], "galvanized"),
    (&["concrete"], "concrete"),
    (&["composite"], "composite"),
];

/// 寸法タグの接頭辞
pub const SIZE_TAG_PREFIX: &str = "size:";

lazy_static::lazy_static! {
    static ref SIZE_RE: Regex = Regex::new(r#"(\d+(?:\.\d+)?)\s*(?:m|mm|cm|ft|inch|")"#).unwrap();
}

/// テキストから種別タグを検出する
pub fn detect_types(text: &str) -> BTreeSet<String> {
    let lower = text.to_lowercase();

    let mut types: BTreeSet<String> = TYPE_VOCABULARY
        .iter()
        .filter(|(needles, _)| needles.iter().any(|n| lower.contains(n)))
        .map(|(_, tag)| tag.to_string())
        .collect();

    if let Some(cap) = SIZE_RE.captures(&lower) {
        types.insert(format!("{}{}", SIZE_TAG_PREFIX, &cap[1]));
    }

    types
}

/// 寸法タグかどうか
pub fn is_size_tag(tag: &str) -> bool {
    tag.starts_with(SIZE_TAG_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_detect_types_products_and_materials() {
        assert_eq!(
            detect_types("Galvanised Steel Palisade Fencing"),
            tags(&["fence", "galvanized", "palisade", "steel"])
        );
    }

    #[test]
    fn test_detect_types_size_tag() {
        let types = detect_types("Steel wire mesh 50mm x 50mm");
        assert!(types.contains("size:50"));
        assert!(types.contains("mesh"));
        assert!(types.contains("wire"));
        assert!(types.contains("steel"));
    }

    #[test]
    fn test_detect_types_decimal_size() {
        let types = detect_types("Concrete post 2.4 m");
        assert!(types.contains("size:2.4"));
        assert!(types.contains("concrete"));
    }

    #[test]
    fn test_detect_types_gate_plural() {
        assert!(detect_types("4ft D9 Gates").contains("gate"));
    }

    #[test]
    fn test_detect_types_none() {
        assert!(detect_types("Site clearance").is_empty());
    }

    #[test]
    fn test_is_size_tag() {
        assert!(is_size_tag("size:1.8"));
        assert!(!is_size_tag("steel"));
    }
}
