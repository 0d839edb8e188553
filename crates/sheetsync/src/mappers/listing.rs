//! 📋 The listing overlay: a positional sheet that says which products are on
//! the brand's list, with a few toggle columns ("Active", "New", ...).
//!
//! Columns are located with [`find_column_index`] because these sheets change
//! layout more often than they change headers. No code column is fatal;
//! a missing toggle column just means nobody is toggled.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::app_config::ListingConfig;
use crate::common::{FieldValue, Record};
use crate::errors::SourceError;
use crate::headers::find_column_index;
use crate::mappers::key_text;
use crate::normalize::is_active_flag;
use crate::sources::Sheet;

#[derive(Debug, Clone, PartialEq)]
pub struct ListingOverlay {
    /// Destination boolean fields, in column order of `listed` values.
    toggles: Vec<String>,
    /// Product code → flag per toggle.
    listed: HashMap<String, Vec<bool>>,
}

impl ListingOverlay {
    pub fn from_sheet(sheet: &Sheet, config: &ListingConfig) -> Result<Self, SourceError> {
        let headers = sheet.header.names();
        let code_column = find_column_index(headers, &config.code_aliases).ok_or_else(|| {
            SourceError::MissingColumn {
                sheet: sheet.name.clone(),
                field: "productCode".to_string(),
                aliases: config.code_aliases.clone(),
            }
        })?;

        let mut toggles = Vec::with_capacity(config.toggles.len());
        let mut columns = Vec::with_capacity(config.toggles.len());
        for (dest, aliases) in &config.toggles {
            let column = find_column_index(headers, aliases);
            if column.is_none() {
                warn!(
                    "📋 listing sheet '{}' has no column for toggle '{dest}', every product reads false",
                    sheet.name
                );
            }
            toggles.push(dest.clone());
            columns.push(column);
        }

        let listed: HashMap<String, Vec<bool>> = sheet
            .rows
            .iter()
            .filter_map(|row| {
                let code = key_text(row.cell(code_column))?;
                let flags = columns
                    .iter()
                    .map(|column| column.is_some_and(|c| is_active_flag(row.cell(c))))
                    .collect();
                Some((code, flags))
            })
            .collect();
        debug!("📋 listing '{}' knows {} products", sheet.name, listed.len());

        Ok(Self { toggles, listed })
    }

    /// 🔘 Sets every toggle on the record. Unlisted products read `false` across the board.
    pub fn apply(&self, record: &mut Record) {
        let flags = self.listed.get(&record.key);
        for (index, dest) in self.toggles.iter().enumerate() {
            let on = flags
                .and_then(|flags| flags.get(index))
                .copied()
                .unwrap_or(false);
            record.set(dest.clone(), FieldValue::Bool(on));
        }
    }

    pub fn len(&self) -> usize {
        self.listed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::app_config::SourceConfig;
    use crate::common::CellValue;

    fn config(toggles: &[(&str, &[&str])]) -> ListingConfig {
        ListingConfig {
            source: SourceConfig {
                url: None,
                path: Some("listing.xlsx".into()),
                format: Default::default(),
            },
            code_aliases: vec!["Κωδικός".into(), "Code".into()],
            toggles: toggles
                .iter()
                .map(|(dest, aliases)| {
                    (dest.to_string(), aliases.iter().map(|a| a.to_string()).collect())
                })
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn sheet() -> Sheet {
        Sheet::from_grid(
            "Listing",
            vec!["ΚΩΔΙΚΟΣ".into(), "Ενεργό".into(), "New".into()],
            vec![
                vec![CellValue::from("A1"), CellValue::from("x"), CellValue::Empty],
                vec![CellValue::Number(1042.0), CellValue::from("ναι"), CellValue::from("ok")],
            ],
            2,
        )
    }

    #[test]
    fn the_one_where_listed_products_get_their_toggles() -> anyhow::Result<()> {
        let overlay = ListingOverlay::from_sheet(
            &sheet(),
            &config(&[("listed", &["Ενεργο"]), ("featured", &["New"]), ("clearance", &["Outlet"])]),
        )?;
        assert_eq!(overlay.len(), 2);

        let mut numeric = Record::new("1042");
        overlay.apply(&mut numeric);
        assert_eq!(numeric.get("listed"), Some(&FieldValue::Bool(true)));
        assert_eq!(numeric.get("featured"), Some(&FieldValue::Bool(true)));
        assert_eq!(numeric.get("clearance"), Some(&FieldValue::Bool(false)));

        let mut unlisted = Record::new("Z9");
        overlay.apply(&mut unlisted);
        assert_eq!(unlisted.get("listed"), Some(&FieldValue::Bool(false)));
        Ok(())
    }

    #[test]
    fn the_one_where_the_listing_has_no_code_column() {
        let mut cfg = config(&[]);
        cfg.code_aliases = vec!["SKU".into()];
        let err = ListingOverlay::from_sheet(&sheet(), &cfg).expect_err("💀 no code column must fail");
        assert!(matches!(err, SourceError::MissingColumn { .. }));
    }
}
