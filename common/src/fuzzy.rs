//! あいまい文字列一致
//!
//! - token_set_ratio: 語順に依存しないトークン集合の類似度（0〜100）
//! - expand_abbreviations: BOQ記述によくある略語の展開

use regex::Regex;
use std::collections::BTreeSet;
use strsim::normalized_levenshtein;

lazy_static::lazy_static! {
    static ref ABBREVIATIONS: Vec<(Regex, &'static str)> = vec![
        (Regex::new(r"(?i)\bft\b").unwrap(), "feet"),
        (Regex::new(r"\b(\d+)m\b").unwrap(), "${1} meter"),
        (Regex::new(r"\b(\d+)mm\b").unwrap(), "${1} millimeter"),
        (Regex::new(r"\bD(\d+)\b").unwrap(), "diameter ${1}"),
        (Regex::new(r"(?i)\bgalv\b").unwrap(), "galvanized"),
        (Regex::new(r"(?i)\bstl\b").unwrap(), "steel"),
        (Regex::new(r"(?i)\bconc\b").unwrap(), "concrete"),
        (Regex::new(r"(?i)\bno\.\s*").unwrap(), "number "),
    ];
}

/// 略語を展開する
pub fn expand_abbreviations(text: &str) -> String {
    ABBREVIATIONS
        .iter()
        .fold(text.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}

/// 小文字化して英数字の連続をトークンとして取り出す（重複なし・ソート済み）
fn tokenize(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// 2文字列の類似度（0〜100）
pub fn ratio(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b) * 100.0
}

fn join_parts(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => head.to_string(),
        _ => format!("{} {}", head, tail),
    }
}

/// トークン集合の類似度（0〜100）
///
/// 共通トークン `t0` と、それに各側の差分を付け足した `t1` / `t2` の
/// 3通りの組み合わせの最大値。どちらかにトークンがなければ 0。
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let join = |set: Vec<&String>| {
        set.into_iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    };

    let t0 = join(tokens_a.intersection(&tokens_b).collect());
    let diff_a = join(tokens_a.difference(&tokens_b).collect());
    let diff_b = join(tokens_b.difference(&tokens_a).collect());

    let t1 = join_parts(&t0, &diff_a);
    let t2 = join_parts(&t0, &diff_b);

    let mut best = ratio(&t1, &t2);
    if !t0.is_empty() {
        best = best.max(ratio(&t0, &t1)).max(ratio(&t0, &t2));
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_abbreviations_diameter() {
        let expanded = expand_abbreviations("4ft D9 Gates");
        assert!(expanded.contains("diameter 9"), "got {:?}", expanded);
    }

    #[test]
    fn test_expand_abbreviations_words() {
        assert_eq!(
            expand_abbreviations("10 ft galv stl post"),
            "10 feet galvanized steel post"
        );
        assert_eq!(expand_abbreviations("conc base No.4"), "concrete base number 4");
    }

    #[test]
    fn test_expand_abbreviations_lengths() {
        assert_eq!(expand_abbreviations("2m rail"), "2 meter rail");
        assert_eq!(expand_abbreviations("50mm mesh"), "50 millimeter mesh");
    }

    #[test]
    fn test_token_set_ratio_order_independent() {
        let a = token_set_ratio("wire mesh panel", "panel mesh wire");
        assert!((a - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_token_set_ratio_subset_scores_full() {
        // 片方がもう片方のトークンを全て含む場合は満点
        let score = token_set_ratio("Galvanized steel post", "galvanized steel post 2.4m");
        assert!((score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_token_set_ratio_partial_overlap() {
        let high = token_set_ratio("Steel wire mesh 50mm x 50mm", "Wire Mesh Panel");
        let low = token_set_ratio("Steel wire mesh 50mm x 50mm", "Steel Post");
        assert!(high > low, "high={} low={}", high, low);
    }

    #[test]
    fn test_token_set_ratio_empty() {
        assert_eq!(token_set_ratio("", "steel"), 0.0);
        assert_eq!(token_set_ratio("---", "steel"), 0.0);
    }

    #[test]
    fn test_ratio_bounds() {
        assert!((ratio("abc", "abc") - 100.0).abs() < 1e-9);
        assert!(ratio("abc", "xyz") < 1e-9);
    }
}
