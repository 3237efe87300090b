//! 単位の抽出と正規化
//!
//! BOQ明細の自由記述から単位を取り出し、表記揺れ（PCS / EACH / NOS など）を
//! 1つの正規形にまとめる。照合スコアの単位一致判定はすべてここを通る。

use regex::Regex;
use std::collections::HashMap;

/// 括弧内・数値直後の候補として認める単位
const COMMON_UNITS: &[&str] = &[
    "m2", "sqm", "m3", "cum", "kg", "kgs", "l", "ltr", "nos", "no", "nr", "pcs", "pc", "m", "mt",
    "mtr", "mm", "cm", "rm", "lm", "ft", "in", "hr", "hrs", "day", "days", "set", "sets", "pair",
    "pairs", "ea", "each", "unit", "units", "roll", "rolls", "bag", "bags", "ls",
];

/// 同義語テーブル（正規化済みの表記 → 正規形）
///
/// 正規形自身をキーにしないこと（冪等性が崩れる）。
const UNIT_SYNONYMS: &[(&str, &str)] = &[
    // 面積
    ("SQM", "M2"), ("SQ M", "M2"), ("SQMT", "M2"), ("SQ MT", "M2"), ("SQ MTR", "M2"),
    ("SQUARE METER", "M2"), ("SQUARE METERS", "M2"), ("SQUARE METRE", "M2"),
    ("SQUARE METRES", "M2"), ("SQ METER", "M2"), ("SQ METRE", "M2"), ("SQ METERS", "M2"),
    ("SQ METRES", "M2"), ("SQ MTRS", "M2"), ("METER SQUARE", "M2"), ("METRE SQUARE", "M2"),
    ("SQFT", "FT2"), ("SQ FT", "FT2"), ("SQUARE FOOT", "FT2"), ("SQUARE FEET", "FT2"),
    ("SF", "FT2"),
    // 体積
    ("CUM", "M3"), ("CU M", "M3"), ("CBM", "M3"), ("CUBIC METER", "M3"), ("CUBIC METERS", "M3"),
    ("CUBIC METRE", "M3"), ("CUBIC METRES", "M3"), ("CU METER", "M3"), ("CU METRE", "M3"),
    ("CU METERS", "M3"), ("CU METRES", "M3"), ("CU MTR", "M3"), ("CU MTRS", "M3"),
    ("CUFT", "FT3"), ("CU FT", "FT3"), ("CUBIC FOOT", "FT3"), ("CUBIC FEET", "FT3"),
    // 重量
    ("KGS", "KG"), ("KILOGRAM", "KG"), ("KILOGRAMS", "KG"), ("KILO", "KG"), ("KILOS", "KG"),
    ("TON", "T"), ("TONS", "T"), ("TONNE", "T"), ("TONNES", "T"), ("METRIC TON", "T"),
    ("METRIC TONS", "T"),
    ("LBS", "LB"), ("POUND", "LB"), ("POUNDS", "LB"),
    // 液量
    ("LTR", "L"), ("LTRS", "L"), ("LIT", "L"), ("LITER", "L"), ("LITERS", "L"), ("LITRE", "L"),
    ("LITRES", "L"),
    ("GAL", "GALLON"), ("GALS", "GALLON"), ("GALLONS", "GALLON"),
    // 個数
    ("NO", "UNIT"), ("NOS", "UNIT"), ("NR", "UNIT"), ("NRS", "UNIT"), ("NUM", "UNIT"),
    ("NUMBER", "UNIT"), ("NUMBERS", "UNIT"), ("PC", "UNIT"), ("PCS", "UNIT"),
    ("PIECE", "UNIT"), ("PIECES", "UNIT"), ("EA", "UNIT"), ("EACH", "UNIT"),
    ("UNITS", "UNIT"), ("ITEM", "UNIT"), ("ITEMS", "UNIT"),
    // 長さ
    ("MT", "M"), ("MTR", "M"), ("MTRS", "M"), ("MTS", "M"), ("METER", "M"), ("METERS", "M"),
    ("METRE", "M"), ("METRES", "M"),
    ("RM", "M"), ("RMT", "M"), ("LM", "M"), ("RUNNING METER", "M"), ("RUNNING METERS", "M"),
    ("RUNNING METRE", "M"), ("RUNNING METRES", "M"), ("RUNNING MTR", "M"), ("RUNNING MTRS", "M"),
    ("RUNNING MT", "M"), ("LINEAR METER", "M"), ("LINEAR MTR", "M"),
    ("LINEAR METERS", "M"), ("LINEAR METRE", "M"), ("LINEAR METRES", "M"),
    ("MILLIMETER", "MM"), ("MILLIMETERS", "MM"), ("MILLIMETRE", "MM"), ("MILLIMETRES", "MM"),
    ("CENTIMETER", "CM"), ("CENTIMETERS", "CM"), ("CENTIMETRE", "CM"), ("CENTIMETRES", "CM"),
    ("FEET", "FT"), ("FOOT", "FT"),
    ("INCH", "IN"), ("INCHES", "IN"),
    // 時間
    ("HR", "HOUR"), ("HRS", "HOUR"), ("HOURS", "HOUR"),
    ("DAYS", "DAY"), ("WEEKS", "WEEK"), ("WK", "WEEK"), ("MONTHS", "MONTH"),
    // 荷姿・その他
    ("SETS", "SET"), ("PAIRS", "PAIR"), ("PR", "PAIR"), ("BAGS", "BAG"), ("ROLLS", "ROLL"),
    ("SHEETS", "SHEET"), ("SHT", "SHEET"), ("BUNDLES", "BUNDLE"), ("BDL", "BUNDLE"),
    ("LUMP SUM", "LS"), ("LUMPSUM", "LS"),
];

lazy_static::lazy_static! {
    static ref UNIT_MAP: HashMap<&'static str, &'static str> =
        UNIT_SYNONYMS.iter().copied().collect();

    /// 空白を詰めたキーで引く表（"Sq.Mtr" → "SQMTR" のような記号区切りの表記用）
    static ref COMPACT_UNIT_MAP: HashMap<String, &'static str> = UNIT_SYNONYMS
        .iter()
        .map(|(key, canonical)| (key.replace(' ', ""), *canonical))
        .collect();

    static ref PAREN_RE: Regex = Regex::new(r"\(([^)]+)\)").unwrap();
    static ref AFTER_NUMBER_RE: Regex =
        Regex::new(r"\d+\.?\d*\s*([a-zA-Z][a-zA-Z0-9.]*)").unwrap();

    // 面積 → 体積 → 重量 → 液量 → 個数 → 長さ → 時間 → 荷姿 の順で試す
    static ref UNIT_PATTERNS: Vec<Regex> = [
        r"(?i)\b(m2|sqm|sq\.?\s*m|square\s*met(?:er|re)s?|sq\.?\s*met(?:er|re)s?)\b",
        r"(?i)\b(ft2|sqft|sq\.?\s*ft|square\s*f(?:ee|oo)t)\b",
        r"(?i)\b(m3|cum|cu\.?\s*m|cubic\s*met(?:er|re)s?|cu\.?\s*met(?:er|re)s?)\b",
        r"(?i)\b(ft3|cuft|cu\.?\s*ft|cubic\s*f(?:ee|oo)t)\b",
        r"(?i)\b(kg|kgs?|kilograms?|kilo)\b",
        r"(?i)\b(ton|tonnes?|t|metric\s*ton)\b",
        r"(?i)\b(lbs?|pounds?)\b",
        r"(?i)\b(ltr|lit(?:er|re)s?|l)\b",
        r"(?i)\b(gal|gallons?)\b",
        r"(?i)\b(nos?|numbers?|num)\b",
        r"(?i)\b(pcs?|pieces?|pc)\b",
        r"(?i)\b(each|ea|units?)\b",
        r"(?i)\b(mt|mtr|met(?:er|re)s?|m)\b",
        r"(?i)\b(mm|millimet(?:er|re)s?)\b",
        r"(?i)\b(cm|centimet(?:er|re)s?)\b",
        r"(?i)\b(rm|rmt|running\s*met(?:er|re)s?)\b",
        r"(?i)\b(ft|feet|foot)\b",
        r"(?i)\b(in|inch|inches)\b",
        r"(?i)\b(hrs?|hours?)\b",
        r"(?i)\b(days?)\b",
        r"(?i)\b(weeks?)\b",
        r"(?i)\b(months?)\b",
        r"(?i)\b(sets?)\b",
        r"(?i)\b(pairs?)\b",
        r"(?i)\b(bags?)\b",
        r"(?i)\b(rolls?)\b",
        r"(?i)\b(sheets?)\b",
        r"(?i)\b(bundles?)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect();
}

/// テキストから単位を抽出する
///
/// 優先順位: 括弧内 → 数値直後 → パターン表（先勝ち）。
/// 見つからなければ空文字（エラーではない）。
pub fn extract_unit(text: &str) -> String {
    if let Some(cap) = PAREN_RE.captures(text) {
        if let Some(unit) = check_for_unit(&cap[1]) {
            return unit;
        }
    }

    if let Some(cap) = AFTER_NUMBER_RE.captures(text) {
        if let Some(unit) = check_for_unit(&cap[1]) {
            return unit;
        }
    }

    UNIT_PATTERNS
        .iter()
        .find_map(|re| re.find(text))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// 既知の単位なら前後の空白を除いて返す
fn check_for_unit(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim();
    let lower = trimmed.to_lowercase();
    COMMON_UNITS.contains(&lower.as_str()).then(|| trimmed.to_string())
}

/// 単位を正規形に変換する
///
/// 大文字化・記号除去・空白の圧縮の後、同義語テーブルを引く。
/// 未知の単位はそのまま（それ自体を正規形として扱う）。
pub fn normalize_unit(unit: &str) -> String {
    let upper = unit.trim().to_uppercase().replace('²', "2").replace('³', "3");

    let cleaned: String = upper
        .chars()
        .map(|c| if matches!(c, '-' | '_' | '/') { ' ' } else { c })
        .filter(|c| !c.is_ascii_punctuation())
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    if let Some(canonical) = UNIT_MAP.get(collapsed.as_str()) {
        return canonical.to_string();
    }

    let compact = collapsed.replace(' ', "");
    if let Some(canonical) = COMPACT_UNIT_MAP.get(compact.as_str()) {
        return canonical.to_string();
    }

    collapsed
}

/// 2つの単位が同じ正規形か（どちらかが空なら false）
pub fn units_match(a: &str, b: &str) -> bool {
    if a.trim().is_empty() || b.trim().is_empty() {
        return false;
    }
    normalize_unit(a) == normalize_unit(b)
}
