//! 🗺️ Header resolution: which column is "product code" in THIS sheet?
//!
//! Brand back-offices rename columns between revisions, translate them, and
//! occasionally re-encode them into Latin-1 soup. Mappers ask for a logical
//! field by an ordered alias list and this module finds the column.
//!
//! 🧠 Knowledge graph:
//! - [`HeaderRow`] is built ONCE per sheet and shared by every [`Row`] via `Arc`.
//!   It carries two indexes: literal header names, and folded header tokens.
//! - [`resolve_field`] tries the literal index first (cheap, exact), then the
//!   folded one (diacritics, case, punctuation, Greek script all erased).
//! - [`find_column_index`] is the same matching for positional sheets where
//!   all you have is the header row itself.

use std::collections::HashMap;
use std::sync::Arc;

use crate::common::CellValue;
use crate::normalize::strip_diacritics;

static EMPTY_CELL: CellValue = CellValue::Empty;

/// 🔡 Folds a header into its comparison token.
///
/// Lowercase, accents stripped, Greek transliterated to Latin, and everything
/// that is not a letter or digit dropped. `"Κωδικός Προϊόντος"`,
/// `"κωδικοσ  προϊοντοσ"` and `"KODIKOS-PROIONTOS"` all land on
/// `"kodikosproiontos"`.
pub fn fold_header(header: &str) -> String {
    let mut folded = String::with_capacity(header.len());
    for c in strip_diacritics(header).chars() {
        match transliterate(c) {
            Some(latin) => folded.push_str(latin),
            None if c.is_alphanumeric() => folded.push(c),
            None => {}
        }
    }
    folded
}

fn transliterate(c: char) -> Option<&'static str> {
    let latin = match c {
        'α' => "a",
        'β' => "v",
        'γ' => "g",
        'δ' => "d",
        'ε' => "e",
        'ζ' => "z",
        'η' => "i",
        'θ' => "th",
        'ι' => "i",
        'κ' => "k",
        'λ' => "l",
        'μ' => "m",
        'ν' => "n",
        'ξ' => "x",
        'ο' => "o",
        'π' => "p",
        'ρ' => "r",
        'σ' | 'ς' => "s",
        'τ' => "t",
        'υ' => "y",
        'φ' => "f",
        'χ' => "ch",
        'ψ' => "ps",
        'ω' => "o",
        _ => return None,
    };
    Some(latin)
}

/// 📋 A sheet's header row plus its lookup indexes.
///
/// Duplicate headers: the first occurrence wins in both indexes.
#[derive(Debug, Clone, Default)]
pub struct HeaderRow {
    names: Vec<String>,
    literal: HashMap<String, usize>,
    folded: HashMap<String, usize>,
}

impl HeaderRow {
    pub fn new(names: Vec<String>) -> Self {
        let mut literal = HashMap::new();
        let mut folded = HashMap::new();
        for (column, name) in names.iter().enumerate() {
            literal.entry(name.clone()).or_insert(column);
            let token = fold_header(name);
            if !token.is_empty() {
                folded.entry(token).or_insert(column);
            }
        }
        Self {
            names,
            literal,
            folded,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn literal_column(&self, alias: &str) -> Option<usize> {
        self.literal.get(alias).copied()
    }

    fn folded_column(&self, alias: &str) -> Option<usize> {
        self.folded.get(&fold_header(alias)).copied()
    }

    /// 🔎 First column matching any candidate: literal pass, then folded pass.
    pub fn column_of<S: AsRef<str>>(&self, candidates: &[S]) -> Option<usize> {
        candidates
            .iter()
            .find_map(|alias| self.literal_column(alias.as_ref()))
            .or_else(|| {
                candidates
                    .iter()
                    .find_map(|alias| self.folded_column(alias.as_ref()))
            })
    }
}

/// 📄 One data row: its cells plus a shared handle on the sheet's headers.
#[derive(Debug, Clone)]
pub struct Row {
    header: Arc<HeaderRow>,
    cells: Vec<CellValue>,
    /// 1-based line in the source sheet, for log messages humans can act on.
    pub line: usize,
}

impl Row {
    pub fn new(header: Arc<HeaderRow>, cells: Vec<CellValue>, line: usize) -> Self {
        Self {
            header,
            cells,
            line,
        }
    }

    pub fn header(&self) -> &HeaderRow {
        &self.header
    }

    pub fn cells(&self) -> &[CellValue] {
        &self.cells
    }

    /// 📦 Cell at `column`, or an empty cell for ragged rows.
    pub fn cell(&self, column: usize) -> &CellValue {
        self.cells.get(column).unwrap_or(&EMPTY_CELL)
    }

    /// 🏷️ Cell under an exact header name.
    pub fn get(&self, header: &str) -> Option<&CellValue> {
        self.header.literal_column(header).map(|column| self.cell(column))
    }
}

/// 🎯 Resolves a logical field on `row` through an ordered alias list.
///
/// 1. literal pass: each alias as an exact header name;
/// 2. folded pass: each alias folded and matched against folded headers.
///
/// A blank cell under a matching header counts as absent and the next alias
/// gets its turn. First non-blank value wins, no further aliases consulted.
pub fn resolve_field<'row, S: AsRef<str>>(
    row: &'row Row,
    aliases: &[S],
) -> Option<&'row CellValue> {
    let header = row.header();
    let literal_hit = aliases.iter().find_map(|alias| {
        header
            .literal_column(alias.as_ref())
            .map(|column| row.cell(column))
            .filter(|cell| !cell.is_blank())
    });
    if literal_hit.is_some() {
        return literal_hit;
    }
    aliases.iter().find_map(|alias| {
        header
            .folded_column(alias.as_ref())
            .map(|column| row.cell(column))
            .filter(|cell| !cell.is_blank())
    })
}

/// 🧭 Column index for positional sheets, `None` when nothing matches.
pub fn find_column_index<S: AsRef<str>, C: AsRef<str>>(
    header_row: &[S],
    candidates: &[C],
) -> Option<usize> {
    let header = HeaderRow::new(header_row.iter().map(|h| h.as_ref().to_string()).collect());
    header.column_of(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(headers: &[&str], cells: &[&str]) -> Row {
        let header = Arc::new(HeaderRow::new(
            headers.iter().map(|h| h.to_string()).collect(),
        ));
        Row::new(header, cells.iter().map(|c| CellValue::from(*c)).collect(), 2)
    }

    #[test]
    fn the_one_where_the_first_alias_always_wins() {
        let the_row = row(&["B", "A"], &["from-b", "from-a"]);
        assert_eq!(
            resolve_field(&the_row, &["A", "B"]),
            Some(&CellValue::from("from-a"))
        );
    }

    #[test]
    fn the_one_where_greek_accents_and_case_do_not_matter() {
        let the_row = row(&["Κωδικός Προϊόντος", "Τιμή"], &["P-100", "12,50"]);
        assert_eq!(
            resolve_field(&the_row, &["κωδικοσ προϊοντοσ"]),
            Some(&CellValue::from("P-100"))
        );
        assert_eq!(
            resolve_field(&the_row, &["KODIKOS PROIONTOS"]),
            Some(&CellValue::from("P-100"))
        );
    }

    #[test]
    fn the_one_where_a_blank_cell_passes_the_baton() {
        let the_row = row(&["Code", "SKU"], &["   ", "SKU-9"]);
        assert_eq!(
            resolve_field(&the_row, &["Code", "SKU"]),
            Some(&CellValue::from("SKU-9"))
        );
        assert_eq!(resolve_field(&the_row, &["Code"]), None);
    }

    #[test]
    fn the_one_where_punctuation_and_spacing_are_ignored() {
        let the_row = row(&["  Retail-Price (€) "], &["9.90"]);
        assert_eq!(
            resolve_field(&the_row, &["retail price"]),
            Some(&CellValue::from("9.90"))
        );
    }

    #[test]
    fn the_one_where_nothing_matches_and_that_is_fine() {
        let the_row = row(&["Name"], &["Lego"]);
        assert_eq!(resolve_field(&the_row, &["Code", "SKU"]), None);
    }

    #[test]
    fn the_one_where_ragged_rows_read_as_empty() {
        let the_row = row(&["Code", "Name"], &["A1"]);
        assert_eq!(resolve_field(&the_row, &["Name"]), None);
        assert_eq!(the_row.cell(7), &CellValue::Empty);
    }

    #[test]
    fn the_one_where_positional_sheets_find_their_columns() {
        let header = ["Α/Α", "Κωδικός", "Ενεργό"];
        assert_eq!(find_column_index(&header, &["code", "κωδικος"]), Some(1));
        assert_eq!(find_column_index(&header, &["ενεργο"]), Some(2));
        assert_eq!(find_column_index(&header, &["barcode"]), None);
    }

    #[test]
    fn the_one_where_greek_becomes_latin() {
        assert_eq!(fold_header("Κωδικός Προϊόντος"), "kodikosproiontos");
        assert_eq!(fold_header("Ψυχή & Θάλασσα"), "psychithalassa");
        assert_eq!(fold_header("E-mail"), "email");
    }
}
