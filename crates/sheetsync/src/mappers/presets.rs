//! 📚 Built-in alias tables, one per brand back-office and entity.
//!
//! Each list is ordered by precedence: the header the back-office uses today
//! comes first, historical and localized spellings after it. The odd-looking
//! entries like `"Êùäéêüò"` are real: they are Greek headers that an old
//! cp1253 export produced and that got decoded as Latin-1 somewhere along
//! the way. They match literally, so they stay literal.

use serde::Deserialize;

use crate::mappers::FieldKind::{ActiveFlag, Boolean, Currency, Decimal, Text, Url};
use crate::mappers::{AliasTable, EntityKind, FieldKind, FieldSpec, GroupSpec};

/// 🏷️ Which built-in alias table a brand speaks.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BrandPreset {
    /// Greek ERP export, with a long tail of legacy-encoded headers.
    Helios,
    /// English-language wholesaler export.
    Orion,
    /// Greeklish abbreviations from a hand-maintained sheet.
    Zephyr,
}

impl BrandPreset {
    pub fn alias_table(self, entity: EntityKind) -> AliasTable {
        match (self, entity) {
            (BrandPreset::Helios, EntityKind::Product) => helios_products(),
            (BrandPreset::Helios, EntityKind::Customer) => helios_customers(),
            (BrandPreset::Orion, EntityKind::Product) => orion_products(),
            (BrandPreset::Orion, EntityKind::Customer) => orion_customers(),
            (BrandPreset::Zephyr, EntityKind::Product) => zephyr_products(),
            (BrandPreset::Zephyr, EntityKind::Customer) => zephyr_customers(),
        }
    }
}

fn f(dest: &str, aliases: &[&str], kind: FieldKind) -> FieldSpec {
    FieldSpec::new(dest, aliases, kind)
}

fn helios_products() -> AliasTable {
    AliasTable::new(
        EntityKind::Product,
        &["Κωδικός", "Κωδικός Είδους", "Κωδικός Προϊόντος", "Êùäéêüò", "Êùäéêüò Åßäïõò", "Code"],
        vec![
            f("name", &["Περιγραφή", "Περιγραφή Είδους", "ÐåñéãñáöÞ", "Description"], Text),
            f("category", &["Κατηγορία", "Êáôçãïñßá", "Category"], Text),
            f("subcategory", &["Υποκατηγορία", "Subcategory"], Text),
            f("barcode", &["Barcode", "EAN", "Γραμμωτός Κωδικός"], Text),
            f("unit", &["Μονάδα", "ÌïíÜäá", "Unit"], Text),
            f("price", &["Τιμή Χονδρικής", "Τιμή", "ÔéìÞ ×ïíäñéêÞò", "ÔéìÞ", "Wholesale"], Currency),
            f("retailPrice", &["Λιανική", "Τιμή Λιανικής", "ËéáíéêÞ", "Retail"], Currency),
            f("vatPercent", &["ΦΠΑ", "ΦΠΑ %", "ÖÐÁ", "VAT"], Decimal),
            f("piecesPerBox", &["Τεμάχια ανά Κουτί", "Τεμ/Κουτί", "ÔåìÜ÷éá áíÜ Êïõôß"], Text),
            f("piecesPerCarton", &["Τεμάχια ανά Κιβώτιο", "Τεμ/Κιβ", "ÔåìÜ÷éá áíÜ Êéâþôéï"], Text),
            f("packaging", &["Συσκευασία", "Óõóêåõáóßá"], Text),
            f("stock", &["Απόθεμα", "Áðüèåìá", "Stock"], Decimal),
            f("discountPercent", &["Έκπτωση", "Έκπτωση %", "¸êðôùóç"], Decimal),
            f("offerPrice", &["Τιμή Προσφοράς", "ÔéìÞ ÐñïóöïñÜò"], Currency),
            f("imageUrl", &["Εικόνα", "Φωτογραφία", "Åéêüíá", "Image"], Url),
            f("active", &["Ενεργό", "Åíåñãü", "Active"], ActiveFlag),
            f("isNew", &["Νέο", "ÍÝï", "New"], Boolean),
        ],
        vec![],
    )
}

fn helios_customers() -> AliasTable {
    AliasTable::new(
        EntityKind::Customer,
        &["Κωδικός Πελάτη", "Κωδικός", "Êùäéêüò ÐåëÜôç", "Êùäéêüò", "Customer Code"],
        vec![
            f("name", &["Επωνυμία", "Åðùíõìßá", "Name"], Text),
            f("tradeName", &["Διακριτικός Τίτλος", "Trade Name"], Text),
            f("profession", &["Επάγγελμα", "ÅðÜããåëìá"], Text),
            f("salesman", &["Πωλητής", "ÐùëçôÞò", "Salesman"], Text),
            f("customerGroup", &["Ομάδα", "ÏìÜäá"], Text),
            f("balance", &["Υπόλοιπο", "Õðüëïéðï", "Balance"], Currency),
            f("creditLimit", &["Πιστωτικό Όριο", "Ðéóôùôéêü ¼ñéï"], Currency),
            f("discountPercent", &["Έκπτωση", "¸êðôùóç"], Decimal),
            f("blocked", &["Δεσμευμένος", "Blocked"], Boolean),
        ],
        vec![
            GroupSpec::new(
                "address",
                vec![
                    f("street", &["Διεύθυνση", "Äéåýèõíóç", "Address"], Text),
                    f("city", &["Πόλη", "Ðüëç", "City"], Text),
                    f("zip", &["ΤΚ", "Τ.Κ.", "ÔÊ", "Zip"], Text),
                    f("region", &["Περιοχή", "Ðåñéï÷Þ", "Region"], Text),
                ],
            ),
            GroupSpec::new(
                "contact",
                vec![
                    f("phone", &["Τηλέφωνο", "ÔçëÝöùíï", "Phone"], Text),
                    f("mobile", &["Κινητό", "Êéíçôü", "Mobile"], Text),
                    f("email", &["Email", "E-mail"], Text),
                ],
            ),
            GroupSpec::new(
                "vatInfo",
                vec![
                    f("vatNumber", &["ΑΦΜ", "Α.Φ.Μ.", "ÁÖÌ", "VAT Number"], Text),
                    f("taxOffice", &["ΔΟΥ", "Δ.Ο.Υ.", "ÄÏÕ", "Tax Office"], Text),
                ],
            ),
        ],
    )
}

fn orion_products() -> AliasTable {
    AliasTable::new(
        EntityKind::Product,
        &["Item Code", "SKU", "Code", "Product Code"],
        vec![
            f("name", &["Item Name", "Description", "Name"], Text),
            f("category", &["Category", "Family"], Text),
            f("subcategory", &["Subcategory", "Sub Family"], Text),
            f("barcode", &["EAN", "Barcode", "UPC"], Text),
            f("unit", &["UOM", "Unit"], Text),
            f("price", &["Wholesale Price", "Price", "Net Price"], Currency),
            f("retailPrice", &["Retail Price", "RRP", "MSRP"], Currency),
            f("vatPercent", &["VAT %", "VAT", "Tax Rate"], Decimal),
            f("piecesPerBox", &["Pcs/Box", "Inner Pack", "Box Qty"], Text),
            f("piecesPerCarton", &["Pcs/Carton", "Outer Pack", "Carton Qty"], Text),
            f("packaging", &["Packaging", "Pack"], Text),
            f("stock", &["Stock", "Qty On Hand", "Available"], Decimal),
            f("discountPercent", &["Discount %", "Discount", "Offer %"], Decimal),
            f("offerPrice", &["Offer Price", "Promo Price"], Currency),
            f("imageUrl", &["Image URL", "Image", "Photo"], Url),
            f("active", &["Active", "Listed", "Status"], ActiveFlag),
            f("isNew", &["New", "New Arrival"], Boolean),
        ],
        vec![],
    )
}

fn orion_customers() -> AliasTable {
    AliasTable::new(
        EntityKind::Customer,
        &["Account", "Account Code", "Customer Code", "Code"],
        vec![
            f("name", &["Company", "Customer Name", "Name"], Text),
            f("tradeName", &["Trading As", "Trade Name"], Text),
            f("profession", &["Business Type", "Activity"], Text),
            f("salesman", &["Sales Rep", "Salesman", "Account Manager"], Text),
            f("customerGroup", &["Segment", "Group"], Text),
            f("balance", &["Balance", "Open Balance"], Currency),
            f("creditLimit", &["Credit Limit"], Currency),
            f("discountPercent", &["Discount %", "Discount"], Decimal),
            f("blocked", &["On Hold", "Blocked"], Boolean),
        ],
        vec![
            GroupSpec::new(
                "address",
                vec![
                    f("street", &["Address 1", "Street", "Address"], Text),
                    f("city", &["Town", "City"], Text),
                    f("zip", &["Postcode", "Zip", "Postal Code"], Text),
                    f("region", &["County", "Region", "State"], Text),
                ],
            ),
            GroupSpec::new(
                "contact",
                vec![
                    f("phone", &["Telephone", "Phone"], Text),
                    f("mobile", &["Mobile", "Cell"], Text),
                    f("email", &["Email", "E-mail"], Text),
                ],
            ),
            GroupSpec::new(
                "vatInfo",
                vec![
                    f("vatNumber", &["VAT Reg No", "VAT Number", "Tax ID"], Text),
                    f("taxOffice", &["Tax Office"], Text),
                ],
            ),
        ],
    )
}

fn zephyr_products() -> AliasTable {
    AliasTable::new(
        EntityKind::Product,
        &["KODIKOS", "Kod", "Κωδ.", "Code"],
        vec![
            f("name", &["PERIGRAFI", "Περιγραφή", "Descr"], Text),
            f("category", &["KATHGORIA", "Κατηγορία"], Text),
            f("subcategory", &["YPOKATHGORIA", "Υποκατηγορία"], Text),
            f("barcode", &["BARCODE", "EAN13"], Text),
            f("unit", &["MM", "Μ.Μ."], Text),
            f("price", &["TIMH", "Τιμή", "TIMH XONDRIKHS"], Currency),
            f("retailPrice", &["LIANIKH", "Λιανική"], Currency),
            f("vatPercent", &["FPA", "ΦΠΑ"], Decimal),
            f("piecesPerBox", &["TEM/KOYTI", "Τεμ/Κουτί"], Text),
            f("piecesPerCarton", &["TEM/KIBOTIO", "Τεμ/Κιβ"], Text),
            f("packaging", &["SYSKEYASIA", "Συσκευασία"], Text),
            f("stock", &["YPOLOIPO", "Απόθεμα"], Decimal),
            f("discountPercent", &["EKPTOSH", "Έκπτωση"], Decimal),
            f("offerPrice", &["PROSFORA", "Προσφορά"], Currency),
            f("imageUrl", &["FOTO", "Εικόνα", "IMG"], Url),
            f("active", &["ENERGO", "Ενεργό"], ActiveFlag),
            f("isNew", &["NEO", "Νέο"], Boolean),
        ],
        vec![],
    )
}

fn zephyr_customers() -> AliasTable {
    AliasTable::new(
        EntityKind::Customer,
        &["KOD_PELATH", "KODIKOS", "Κωδ. Πελάτη", "Code"],
        vec![
            f("name", &["EPONYMIA", "Επωνυμία"], Text),
            f("tradeName", &["TITLOS", "Τίτλος"], Text),
            f("profession", &["EPAGGELMA", "Επάγγελμα"], Text),
            f("salesman", &["POLHTHS", "Πωλητής"], Text),
            f("customerGroup", &["OMADA", "Ομάδα"], Text),
            f("balance", &["YPOLOIPO", "Υπόλοιπο"], Currency),
            f("creditLimit", &["PISTOTIKO", "Πιστωτικό Όριο"], Currency),
            f("discountPercent", &["EKPTOSH", "Έκπτωση"], Decimal),
            f("blocked", &["DESMEYMENOS"], Boolean),
        ],
        vec![
            GroupSpec::new(
                "address",
                vec![
                    f("street", &["DIEYTHYNSH", "Διεύθυνση"], Text),
                    f("city", &["POLH", "Πόλη"], Text),
                    f("zip", &["TK", "ΤΚ"], Text),
                    f("region", &["NOMOS", "Νομός", "Περιοχή"], Text),
                ],
            ),
            GroupSpec::new(
                "contact",
                vec![
                    f("phone", &["THL", "ΤΗΛ", "Τηλέφωνο"], Text),
                    f("mobile", &["KINHTO", "Κινητό"], Text),
                    f("email", &["EMAIL"], Text),
                ],
            ),
            GroupSpec::new(
                "vatInfo",
                vec![
                    f("vatNumber", &["AFM", "ΑΦΜ"], Text),
                    f("taxOffice", &["DOY", "ΔΟΥ"], Text),
                ],
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRESETS: [BrandPreset; 3] = [BrandPreset::Helios, BrandPreset::Orion, BrandPreset::Zephyr];

    #[test]
    fn the_one_where_every_preset_knows_both_entities() {
        for preset in PRESETS {
            let products = preset.alias_table(EntityKind::Product);
            let customers = preset.alias_table(EntityKind::Customer);
            assert_eq!(products.entity(), EntityKind::Product);
            assert_eq!(customers.entity(), EntityKind::Customer);
            assert!(!products.key_aliases().is_empty(), "{preset:?} products need a key");
            assert!(
                customers.groups().iter().map(|g| g.dest.as_str()).eq(["address", "contact", "vatInfo"]),
                "{preset:?} customers need all three groups"
            );
        }
    }

    #[test]
    fn the_one_where_mojibake_aliases_really_are_cp1253_read_as_latin1() {
        let table = BrandPreset::Helios.alias_table(EntityKind::Product);
        // -- "Κωδικός" byte for byte, cp1253 → Latin-1
        let legacy: String = [0xCAu8, 0xF9, 0xE4, 0xE9, 0xEA, 0xFC, 0xF2]
            .iter()
            .map(|&b| b as char)
            .collect();
        assert!(table.key_aliases().contains(&legacy));
    }
}
