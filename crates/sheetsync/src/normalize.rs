//! 🧹 Value normalizers: raw cells in, canonical scalars out.
//!
//! Every function here is pure and total. No I/O, no panics, no opinions about
//! which brand exported the cell. A cell that cannot be interpreted becomes
//! `None` (or `false` for the boolean readers) and the mapper moves on.
//!
//! ⚠️ `normalize_decimal` carries the one heuristic everything else leans on:
//! the RIGHTMOST of `,` / `.` is the decimal separator. That is what lets
//! `"1.234,56"` (Greek/European) and `"1,234.56"` (US) agree on `1234.56`.
//! Do not get clever with it.

use std::sync::LazyLock;

use regex::Regex;

use crate::common::CellValue;

/// 💀 Tokens spreadsheets emit when a formula gave up on life.
const INVALID_TEXT_TOKENS: &[&str] = &[
    "#REF!", "#VALUE!", "#N/A", "#DIV/0!", "#NAME?", "N/A", "NULL", "undefined",
];

const TRUE_TOKENS: &[&str] = &["true", "yes", "1", "y"];

// -- ✅ "checked" in toggle columns. letter grades count, so does the Greek "yes".
const ACTIVE_TOKENS: &[&str] = &["x", "a", "b", "c", "yes", "true", "1", "on", "ok", "ναι"];

static IMAGE_FORMULA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^=?\s*image\s*\(\s*"([^"]+)""#).expect("🐛 hardcoded pattern compiles")
});

static HTTP_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://\S+$").expect("🐛 hardcoded pattern compiles"));

/// 🔤 Trimmed text, or `None` for blanks and formula-error sentinels.
pub fn normalize_text(cell: &CellValue) -> Option<String> {
    let text = cell.as_text();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if INVALID_TEXT_TOKENS
        .iter()
        .any(|token| trimmed.eq_ignore_ascii_case(token))
    {
        return None;
    }
    Some(trimmed.to_string())
}

/// 🔢 Parses currency-ish cells in either European or US notation.
///
/// Numbers pass through (non-finite rejected). Strings keep only digits, `,`,
/// `.` and a leading minus; the rightmost separator is the decimal point and
/// every other separator is grouping noise.
pub fn normalize_decimal(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Number(number) => number.is_finite().then_some(*number),
        CellValue::Text(text) => parse_decimal_text(text),
        CellValue::Empty | CellValue::Bool(_) => None,
    }
}

fn parse_decimal_text(text: &str) -> Option<f64> {
    // -- a minus only counts if it shows up before the first digit
    let negative = text
        .chars()
        .take_while(|c| !c.is_ascii_digit())
        .any(|c| c == '-');

    let kept: Vec<char> = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    if !kept.iter().any(char::is_ascii_digit) {
        return None;
    }

    let (integer, fraction): (String, String) =
        match kept.iter().rposition(|c| *c == ',' || *c == '.') {
            Some(split) => (
                kept[..split].iter().filter(|c| c.is_ascii_digit()).collect(),
                kept[split + 1..].iter().collect(),
            ),
            None => (kept.iter().collect(), String::new()),
        };

    let integer = if integer.is_empty() { "0".to_string() } else { integer };
    let fraction = if fraction.is_empty() { "0".to_string() } else { fraction };
    let sign = if negative { "-" } else { "" };
    let parsed: f64 = format!("{sign}{integer}.{fraction}").parse().ok()?;
    parsed.is_finite().then_some(parsed)
}

/// 💶 Decimal normalization plus half-up rounding to cents.
pub fn round_currency(cell: &CellValue) -> Option<f64> {
    normalize_decimal(cell).map(round_cents)
}

/// 💶 Half-up rounding to two decimals.
///
/// `4.015` is stored as `4.01499999...`; the scaled value is nudged by a
/// tolerance relative to its own magnitude before flooring.
pub fn round_cents(value: f64) -> f64 {
    let scaled = value * 100.0;
    (scaled + scaled.abs() * CENT_TOLERANCE + 0.5).floor() / 100.0
}

/// Relative slack for half-cent detection.
const CENT_TOLERANCE: f64 = 1e-12;

/// ✅ Total boolean reader: `true`, `yes`, `1`, `y` (any case). Everything else,
/// including empty cells, is `false`. Never `None`. Never.
pub fn normalize_boolean(cell: &CellValue) -> bool {
    match cell {
        CellValue::Bool(flag) => *flag,
        CellValue::Number(number) => *number == 1.0,
        CellValue::Text(text) => {
            let lowered = text.trim().to_lowercase();
            TRUE_TOKENS.contains(&lowered.as_str())
        }
        CellValue::Empty => false,
    }
}

/// 🖼️ Unwraps `=IMAGE("url")`, otherwise accepts only `http(s)://` strings.
pub fn normalize_url(cell: &CellValue) -> Option<String> {
    let text = normalize_text(cell)?;
    if let Some(captures) = IMAGE_FORMULA.captures(&text) {
        let inner = captures.get(1)?.as_str().trim();
        return (!inner.is_empty()).then(|| inner.to_string());
    }
    HTTP_URL.is_match(&text).then_some(text)
}

/// ☑️ Reads toggle-style columns: `x`, letter grades, `yes`, `ok`, `ναι`...
pub fn is_active_flag(cell: &CellValue) -> bool {
    match cell {
        CellValue::Bool(flag) => *flag,
        CellValue::Empty => false,
        CellValue::Text(_) | CellValue::Number(_) => {
            let folded = strip_diacritics(cell.as_text().trim());
            ACTIVE_TOKENS.contains(&folded.as_str())
        }
    }
}

/// 🪶 Lowercases and removes accents (Latin and Greek tonos/dialytika) plus any
/// stray combining marks. Letters stay letters: Greek stays Greek here.
pub fn strip_diacritics(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| !is_combining_mark(*c))
        .map(base_letter)
        .collect()
}

fn is_combining_mark(c: char) -> bool {
    matches!(c, '\u{0300}'..='\u{036F}')
}

fn base_letter(c: char) -> char {
    match c {
        'ά' => 'α',
        'έ' => 'ε',
        'ή' => 'η',
        'ί' | 'ϊ' | 'ΐ' => 'ι',
        'ό' => 'ο',
        'ύ' | 'ϋ' | 'ΰ' => 'υ',
        'ώ' => 'ω',
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> CellValue {
        CellValue::from(value)
    }

    #[test]
    fn the_one_where_europe_and_america_agree_on_a_price() {
        assert_eq!(normalize_decimal(&text("1.234,56")), Some(1234.56));
        assert_eq!(normalize_decimal(&text("1,234.56")), Some(1234.56));
        assert_eq!(normalize_decimal(&text("12,50")), Some(12.5));
        assert_eq!(normalize_decimal(&text("12.50")), Some(12.5));
        assert_eq!(normalize_decimal(&text("€ 1.000.000,5")), Some(1_000_000.5));
    }

    #[test]
    fn the_one_where_garbage_in_means_none_out() {
        assert_eq!(normalize_decimal(&text("")), None);
        assert_eq!(normalize_decimal(&text("abc")), None);
        assert_eq!(normalize_decimal(&text(",.")), None);
        assert_eq!(normalize_decimal(&CellValue::Empty), None);
        assert_eq!(normalize_decimal(&CellValue::Number(f64::NAN)), None);
        assert_eq!(normalize_decimal(&CellValue::Number(f64::INFINITY)), None);
    }

    #[test]
    fn the_one_where_only_a_leading_minus_counts() {
        assert_eq!(normalize_decimal(&text("-12,5")), Some(-12.5));
        assert_eq!(normalize_decimal(&text("€ -3.20")), Some(-3.2));
        assert_eq!(normalize_decimal(&text("12-50")), Some(1250.0));
        assert_eq!(normalize_decimal(&CellValue::Number(-4.25)), Some(-4.25));
    }

    #[test]
    fn the_one_where_cents_round_half_up() {
        assert_eq!(round_currency(&text("1,005")), Some(1.01));
        assert_eq!(round_currency(&text("4,015")), Some(4.02));
        assert_eq!(round_currency(&text("2.135")), Some(2.14));
        assert_eq!(round_currency(&CellValue::Number(4.185)), Some(4.19));
        assert_eq!(round_currency(&text("-1,005")), Some(-1.0));
        assert_eq!(round_currency(&text("2.344")), Some(2.34));
        assert_eq!(round_currency(&CellValue::Number(9.999)), Some(10.0));
        assert_eq!(round_currency(&text("nope")), None);
    }

    #[test]
    fn the_one_where_every_half_cent_goes_up() {
        for cents in 0..20_000u32 {
            let raw = format!("{}.{:02}5", cents / 100, cents % 100);
            let expected = f64::from(cents + 1) / 100.0;
            assert_eq!(round_currency(&text(&raw)), Some(expected), "{raw}");
        }
    }

    #[test]
    fn the_one_where_formula_errors_are_not_text() {
        for sentinel in ["#REF!", "#VALUE!", "N/A", "NULL", "undefined", "  ", ""] {
            assert_eq!(normalize_text(&text(sentinel)), None, "{sentinel:?}");
        }
        assert_eq!(normalize_text(&text("  Lego Set ")), Some("Lego Set".into()));
        assert_eq!(normalize_text(&CellValue::Number(1042.0)), Some("1042".into()));
    }

    #[test]
    fn the_one_where_booleans_are_never_a_maybe() {
        let inputs = [
            CellValue::Empty,
            text(""),
            text("{}"),
            text("[]"),
            text("no"),
            CellValue::Number(0.0),
            CellValue::Number(2.0),
            CellValue::Bool(false),
        ];
        for input in &inputs {
            assert!(!normalize_boolean(input), "{input:?} should be false");
        }
        for input in [text("TRUE"), text(" yes "), text("Y"), text("1"), CellValue::Number(1.0), CellValue::Bool(true)] {
            assert!(normalize_boolean(&input), "{input:?} should be true");
        }
    }

    #[test]
    fn the_one_where_image_formulas_give_up_their_urls() {
        assert_eq!(
            normalize_url(&text(r#"=IMAGE("https://cdn.example.com/a.jpg")"#)),
            Some("https://cdn.example.com/a.jpg".into())
        );
        assert_eq!(
            normalize_url(&text(r#"=image( "http://x.test/b.png" , 1)"#)),
            Some("http://x.test/b.png".into())
        );
        assert_eq!(
            normalize_url(&text("HTTPS://example.com/c.png")),
            Some("HTTPS://example.com/c.png".into())
        );
        assert_eq!(normalize_url(&text("ftp://example.com/c.png")), None);
        assert_eq!(normalize_url(&text("see attachment")), None);
        assert_eq!(normalize_url(&CellValue::Empty), None);
    }

    #[test]
    fn the_one_where_toggle_columns_speak_many_languages() {
        for checked in ["x", "X", "a", "B", "c", "yes", "TRUE", "1", "on", "OK", "ΝΑΙ", "ναί"] {
            assert!(is_active_flag(&text(checked)), "{checked:?}");
        }
        assert!(is_active_flag(&CellValue::Number(1.0)));
        for unchecked in ["", "d", "no", "όχι", "0", "off"] {
            assert!(!is_active_flag(&text(unchecked)), "{unchecked:?}");
        }
    }

    #[test]
    fn the_one_where_accents_fall_off_but_letters_stay() {
        assert_eq!(strip_diacritics("Κωδικός Προϊόντος"), "κωδικος προιοντος");
        assert_eq!(strip_diacritics("Crème Brûlée"), "creme brulee");
    }
}
