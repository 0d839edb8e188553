//! 🗺️ Record mappers: one raw row in, one canonical record out (or a reason not to).
//!
//! A mapper is mostly data. An [`AliasTable`] lists, per destination field,
//! the headers that may carry it and how to normalize what is found there.
//! The mapper walks that table against a row and adds the few bits of
//! composition no table can express: `packaging` from box/carton counts,
//! a default discount, the offer price that follows from both.
//!
//! 🔑 The business key is resolved FIRST. No key, no record: trailing blank
//! rows and half-filled lines become a [`SkipReason`] before any other field is
//! looked at.
//!
//! Tables are built once per (brand, entity) from a [`BrandPreset`] plus the
//! brand's extra aliases, and never change afterwards.

use std::collections::BTreeMap;

use tracing::warn;

use crate::common::{CellValue, FieldValue, Fields, Record};
use crate::errors::{SkipReason, SourceError};
use crate::headers::{Row, resolve_field};
use crate::normalize::{
    is_active_flag, normalize_boolean, normalize_decimal, normalize_text, normalize_url,
    round_cents, round_currency,
};
use crate::sources::Sheet;

pub mod listing;
pub mod presets;

pub use listing::ListingOverlay;
pub use presets::BrandPreset;

/// 🏷️ What kind of thing a sheet describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Product,
    Customer,
}

impl EntityKind {
    /// 🔑 The field holding the business key, which is also the document id.
    pub fn key_field(self) -> &'static str {
        match self {
            EntityKind::Product => "productCode",
            EntityKind::Customer => "customerCode",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Product => "products",
            EntityKind::Customer => "customers",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 🧹 Which normalizer a field runs through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Decimal,
    /// Decimal, then rounded half-up to cents.
    Currency,
    /// Always present; `false` when missing.
    Boolean,
    Url,
    /// Toggle-column semantics (`x`, `ναι`, ...). Always present.
    ActiveFlag,
}

/// 📝 One destination field: where it goes, where it may come from, how to clean it.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub dest: String,
    pub aliases: Vec<String>,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(dest: &str, aliases: &[&str], kind: FieldKind) -> Self {
        Self {
            dest: dest.to_string(),
            aliases: aliases.iter().map(|alias| alias.to_string()).collect(),
            kind,
        }
    }

    /// 🎯 Resolves and normalizes. `None` means "omit this field".
    fn extract(&self, row: &Row) -> Option<FieldValue> {
        let cell = resolve_field(row, &self.aliases);
        match self.kind {
            FieldKind::Text => cell.and_then(normalize_text).map(FieldValue::Text),
            FieldKind::Decimal => cell.and_then(normalize_decimal).map(FieldValue::Number),
            FieldKind::Currency => cell.and_then(round_currency).map(FieldValue::Number),
            FieldKind::Url => cell.and_then(normalize_url).map(FieldValue::Text),
            FieldKind::Boolean => Some(FieldValue::Bool(cell.is_some_and(normalize_boolean))),
            FieldKind::ActiveFlag => Some(FieldValue::Bool(cell.is_some_and(is_active_flag))),
        }
    }
}

/// 📦 A structured group (`address`, `contact`, `vatInfo`). Always present;
/// members that normalize to nothing are stored as `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpec {
    pub dest: String,
    pub fields: Vec<FieldSpec>,
}

impl GroupSpec {
    pub fn new(dest: &str, fields: Vec<FieldSpec>) -> Self {
        Self {
            dest: dest.to_string(),
            fields,
        }
    }
}

/// 📚 Everything a mapper knows about one (brand, entity) sheet dialect.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasTable {
    entity: EntityKind,
    key_aliases: Vec<String>,
    fields: Vec<FieldSpec>,
    groups: Vec<GroupSpec>,
}

impl AliasTable {
    pub fn new(
        entity: EntityKind,
        key_aliases: &[&str],
        fields: Vec<FieldSpec>,
        groups: Vec<GroupSpec>,
    ) -> Self {
        Self {
            entity,
            key_aliases: key_aliases.iter().map(|alias| alias.to_string()).collect(),
            fields,
            groups,
        }
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    pub fn key_aliases(&self) -> &[String] {
        &self.key_aliases
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn groups(&self) -> &[GroupSpec] {
        &self.groups
    }

    /// ➕ Appends configured aliases after the built-in ones.
    ///
    /// Keys are destination fields: the key field (`productCode`), a plain
    /// field (`price`) or a group member (`address.city`). Unknown keys are
    /// logged and ignored, since they usually mean a typo in the config.
    pub fn with_extra_aliases(mut self, extra: &BTreeMap<String, Vec<String>>) -> Self {
        for (dest, aliases) in extra {
            let target = if dest == self.entity.key_field() {
                Some(&mut self.key_aliases)
            } else if let Some((group, member)) = dest.split_once('.') {
                self.groups
                    .iter_mut()
                    .find(|g| g.dest == group)
                    .and_then(|g| g.fields.iter_mut().find(|f| f.dest == member))
                    .map(|spec| &mut spec.aliases)
            } else {
                self.fields
                    .iter_mut()
                    .find(|f| &f.dest == dest)
                    .map(|spec| &mut spec.aliases)
            };
            match target {
                Some(list) => list.extend(aliases.iter().cloned()),
                None => warn!(
                    "🤷 extra aliases for unknown {} field '{dest}' ignored",
                    self.entity
                ),
            }
        }
        self
    }
}

/// 🗺️ Turns rows of one sheet into canonical records for one brand.
#[derive(Debug, Clone)]
pub struct RecordMapper {
    brand: String,
    table: AliasTable,
    default_discount_percent: Option<f64>,
    listing: Option<ListingOverlay>,
}

impl RecordMapper {
    pub fn new(brand: impl Into<String>, table: AliasTable) -> Self {
        Self {
            brand: brand.into(),
            table,
            default_discount_percent: None,
            listing: None,
        }
    }

    /// 💸 Discount used when a product row carries none of its own.
    pub fn with_default_discount(mut self, percent: Option<f64>) -> Self {
        self.default_discount_percent = percent;
        self
    }

    pub fn with_listing(mut self, listing: ListingOverlay) -> Self {
        self.listing = Some(listing);
        self
    }

    pub fn entity(&self) -> EntityKind {
        self.table.entity
    }

    /// 🚧 Source-level guard: the sheet must have SOME column for the key.
    ///
    /// Without it every row would be skipped one by one, which looks like a
    /// successful import of nothing. Better to stop before writing anything.
    pub fn require_key_column(&self, sheet: &Sheet) -> Result<(), SourceError> {
        match sheet.header.column_of(&self.table.key_aliases) {
            Some(_) => Ok(()),
            None => Err(SourceError::MissingColumn {
                sheet: sheet.name.clone(),
                field: self.table.entity.key_field().to_string(),
                aliases: self.table.key_aliases.clone(),
            }),
        }
    }

    /// 🎯 Maps one row, or explains why it cannot be a record.
    pub fn map(&self, row: &Row) -> Result<Record, SkipReason> {
        let key = resolve_field(row, &self.table.key_aliases)
            .and_then(normalize_text)
            .ok_or(SkipReason::MissingBusinessKey { line: row.line })?;
        if key.contains('/') {
            return Err(SkipReason::InvalidBusinessKey {
                line: row.line,
                key,
            });
        }

        let mut record = Record::new(key.clone());
        record.set(self.table.entity.key_field(), FieldValue::Text(key));

        for spec in &self.table.fields {
            if let Some(value) = spec.extract(row) {
                record.set(spec.dest.clone(), value);
            }
        }
        for group in &self.table.groups {
            let members: Fields = group
                .fields
                .iter()
                .map(|spec| (spec.dest.clone(), spec.extract(row).unwrap_or(FieldValue::Null)))
                .collect();
            record.set(group.dest.clone(), FieldValue::Map(members));
        }

        if self.table.entity == EntityKind::Product {
            self.compose_product(&mut record);
        }
        record.set("brand", FieldValue::Text(self.brand.clone()));
        if let Some(listing) = &self.listing {
            listing.apply(&mut record);
        }
        Ok(record)
    }

    /// 🧩 The bits of a product no single column gives us.
    fn compose_product(&self, record: &mut Record) {
        if record.get("packaging").is_none() {
            let box_count = record.get("piecesPerBox").and_then(FieldValue::as_text);
            let carton_count = record.get("piecesPerCarton").and_then(FieldValue::as_text);
            let packaging = match (box_count, carton_count) {
                (Some(per_box), Some(per_carton)) => Some(format!("{per_box}/{per_carton}")),
                (Some(single), None) | (None, Some(single)) => Some(single.to_string()),
                (None, None) => None,
            };
            if let Some(packaging) = packaging {
                record.set("packaging", FieldValue::Text(packaging));
            }
        }

        if record.get("discountPercent").is_none()
            && let Some(percent) = self.default_discount_percent
        {
            record.set("discountPercent", FieldValue::Number(percent));
        }

        if record.get("offerPrice").is_none() {
            let price = record.get("price").and_then(FieldValue::as_number);
            let discount = record.get("discountPercent").and_then(FieldValue::as_number);
            if let (Some(price), Some(discount)) = (price, discount) {
                record.set(
                    "offerPrice",
                    FieldValue::Number(round_cents(price * (1.0 - discount / 100.0))),
                );
            }
        }
    }
}

/// 🧾 Key text for a cell, as the mapper would see it. Shared with the listing overlay.
pub(crate) fn key_text(cell: &CellValue) -> Option<String> {
    normalize_text(cell)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::headers::HeaderRow;

    fn row(headers: &[&str], cells: &[&str]) -> Row {
        let header = Arc::new(HeaderRow::new(headers.iter().map(|h| h.to_string()).collect()));
        let cells = cells
            .iter()
            .map(|&cell| if cell.is_empty() { CellValue::Empty } else { CellValue::from(cell) })
            .collect();
        Row::new(header, cells, 7)
    }

    fn helios_products() -> RecordMapper {
        RecordMapper::new("helios", BrandPreset::Helios.alias_table(EntityKind::Product))
    }

    #[test]
    fn the_one_where_a_blank_key_never_gets_past_the_door() {
        let mapper = helios_products();
        let skipped = mapper.map(&row(&["Κωδικός", "Τιμή"], &["   ", "12,50"]));
        assert_eq!(skipped, Err(SkipReason::MissingBusinessKey { line: 7 }));

        let slashed = mapper.map(&row(&["Κωδικός"], &["A/1"]));
        assert_eq!(
            slashed,
            Err(SkipReason::InvalidBusinessKey {
                line: 7,
                key: "A/1".into()
            })
        );
    }

    #[test]
    fn the_one_where_a_greek_row_becomes_a_product() -> Result<(), SkipReason> {
        let mapper = helios_products().with_default_discount(Some(10.0));
        let record = mapper.map(&row(
            &["κωδικος", "Περιγραφή", "Τιμή Χονδρικής", "Τεμ/Κουτί", "Τεμ/Κιβ", "Ενεργό", "Εικόνα"],
            &[" A1 ", "Καράβι", "1.234,56", "12", "48", "Ναι", "=IMAGE(\"https://cdn.example/a1.png\")"],
        ))?;

        assert_eq!(record.key, "A1");
        assert_eq!(record.get("productCode"), Some(&FieldValue::Text("A1".into())));
        assert_eq!(record.get("price"), Some(&FieldValue::Number(1234.56)));
        assert_eq!(record.get("packaging"), Some(&FieldValue::Text("12/48".into())));
        assert_eq!(record.get("discountPercent"), Some(&FieldValue::Number(10.0)));
        assert_eq!(record.get("offerPrice"), Some(&FieldValue::Number(1111.1)));
        assert_eq!(record.get("active"), Some(&FieldValue::Bool(true)));
        assert_eq!(record.get("isNew"), Some(&FieldValue::Bool(false)));
        assert_eq!(
            record.get("imageUrl"),
            Some(&FieldValue::Text("https://cdn.example/a1.png".into()))
        );
        assert_eq!(record.get("brand"), Some(&FieldValue::Text("helios".into())));
        assert_eq!(record.get("stock"), None, "missing non-boolean fields are omitted");
        Ok(())
    }

    #[test]
    fn the_one_where_explicit_columns_beat_the_math() -> Result<(), SkipReason> {
        let mapper = helios_products().with_default_discount(Some(10.0));
        let record = mapper.map(&row(
            &["Κωδικός", "Τιμή", "Συσκευασία", "Τεμ/Κουτί", "Έκπτωση", "Τιμή Προσφοράς"],
            &["B2", "20", "σακί 25kg", "12", "5", "18,99"],
        ))?;
        assert_eq!(record.get("packaging"), Some(&FieldValue::Text("σακί 25kg".into())));
        assert_eq!(record.get("discountPercent"), Some(&FieldValue::Number(5.0)));
        assert_eq!(record.get("offerPrice"), Some(&FieldValue::Number(18.99)));
        Ok(())
    }

    #[test]
    fn the_one_where_groups_show_up_even_when_empty() -> Result<(), SkipReason> {
        let mapper = RecordMapper::new("orion", BrandPreset::Orion.alias_table(EntityKind::Customer));
        let record = mapper.map(&row(&["Account", "Company", "Town"], &["C-9", "Acme", "Leeds"]))?;

        let Some(FieldValue::Map(address)) = record.get("address") else {
            panic!("💀 address group missing");
        };
        assert_eq!(address["city"], FieldValue::Text("Leeds".into()));
        assert_eq!(address["zip"], FieldValue::Null);
        let Some(FieldValue::Map(vat)) = record.get("vatInfo") else {
            panic!("💀 vatInfo group missing");
        };
        assert!(vat.values().all(|v| *v == FieldValue::Null));
        assert_eq!(record.get("blocked"), Some(&FieldValue::Bool(false)));
        assert_eq!(record.get("customerCode"), Some(&FieldValue::Text("C-9".into())));
        Ok(())
    }

    #[test]
    fn the_one_where_config_teaches_the_table_new_words() -> Result<(), SkipReason> {
        let extra = BTreeMap::from([
            ("productCode".to_string(), vec!["Artikel".to_string()]),
            ("price".to_string(), vec!["Preis".to_string()]),
            ("nonsense".to_string(), vec!["Whatever".to_string()]),
        ]);
        let table = BrandPreset::Orion
            .alias_table(EntityKind::Product)
            .with_extra_aliases(&extra);
        assert_eq!(table.key_aliases().last().map(String::as_str), Some("Artikel"));

        let record = RecordMapper::new("orion", table).map(&row(&["Artikel", "Preis"], &["X1", "3,5"]))?;
        assert_eq!(record.get("price"), Some(&FieldValue::Number(3.5)));
        Ok(())
    }

    #[test]
    fn the_one_where_a_sheet_without_any_key_column_is_refused() {
        let mapper = helios_products();
        let sheet = Sheet::from_grid("prices.csv", vec!["Τιμή".into()], vec![vec![CellValue::from("1")]], 2);
        match mapper.require_key_column(&sheet) {
            Err(SourceError::MissingColumn { field, .. }) => assert_eq!(field, "productCode"),
            other => panic!("💀 expected MissingColumn, got {other:?}"),
        }
    }
}
