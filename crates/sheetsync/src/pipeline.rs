//! 🚰 The pipeline: config in, one operation out.
//!
//! Owns the store, the configuration and the progress observer, and wires the
//! pieces together for each operation:
//!
//! ```text
//! source → Sheet → RecordMapper (+ listing overlay) → UpsertEngine → store
//! ```
//!
//! Every import is sequential and holds its own rows. Nothing is shared
//! between imports except the store client.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::app_config::{AppConfig, BrandConfig};
use crate::common::FieldValue;
use crate::mappers::{EntityKind, ListingOverlay, RecordMapper};
use crate::maintenance::Maintenance;
use crate::progress::{ProgressObserver, SilentProgress, TerminalProgress};
use crate::salesmen::{RebuildSummary, SalesmenRebuilder};
use crate::sources::{Source, SourceBackend};
use crate::store::StoreBackend;
use crate::upsert::{SyncSummary, UpsertEngine};

/// 📋 One finished import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub brand: String,
    pub entity: String,
    pub collection: String,
    pub summary: SyncSummary,
}

#[derive(Debug)]
pub struct Pipeline {
    store: StoreBackend,
    config: AppConfig,
    progress: Box<dyn ProgressObserver>,
}

impl Pipeline {
    pub fn new(store: StoreBackend, config: AppConfig, progress: Box<dyn ProgressObserver>) -> Self {
        Self {
            store,
            config,
            progress,
        }
    }

    /// 🏗️ Store and progress display as the config asks.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let store = StoreBackend::from_config(&config.store)?;
        let progress: Box<dyn ProgressObserver> = if config.runtime.progress {
            Box::new(TerminalProgress::new())
        } else {
            Box::new(SilentProgress)
        };
        Ok(Self::new(store, config, progress))
    }

    pub fn store(&self) -> &StoreBackend {
        &self.store
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 📥 Imports one entity of one brand from its configured source.
    pub async fn import(&self, brand: &str, entity: EntityKind) -> Result<SyncSummary> {
        let brand_config = self.config.brand(brand)?;
        let source_config = match entity {
            EntityKind::Product => brand_config.products.as_ref(),
            EntityKind::Customer => brand_config.customers.as_ref(),
        }
        .with_context(|| format!("💀 brand '{brand}' has no {entity} source configured"))?;

        let source = SourceBackend::from_config(source_config)?;
        let listing = match (entity, &brand_config.listing) {
            (EntityKind::Product, Some(listing)) => Some(SourceBackend::from_config(&listing.source)?),
            _ => None,
        };
        self.import_from(brand_config, entity, &source, listing.as_ref().map(|l| l as &dyn Source))
            .await
    }

    /// 📥 Same as [`Pipeline::import`], from sources the caller already built.
    pub async fn import_from(
        &self,
        brand: &BrandConfig,
        entity: EntityKind,
        source: &dyn Source,
        listing: Option<&dyn Source>,
    ) -> Result<SyncSummary> {
        let label = format!("{} {entity}", brand.name);
        let collection = match entity {
            EntityKind::Product => &brand.product_collection,
            EntityKind::Customer => &brand.customer_collection,
        };

        // -- everything source-level is checked before the first write
        let sheet = source
            .read_sheet()
            .await
            .with_context(|| format!("💀 could not load the {label} sheet"))?;
        let table = brand
            .preset
            .alias_table(entity)
            .with_extra_aliases(&brand.extra_aliases);
        let mut mapper = RecordMapper::new(&brand.name, table)
            .with_default_discount(brand.default_discount_percent);
        mapper.require_key_column(&sheet)?;

        if let (Some(listing_source), Some(listing_config)) = (listing, &brand.listing) {
            let listing_sheet = listing_source
                .read_sheet()
                .await
                .with_context(|| format!("💀 could not load the {} listing sheet", brand.name))?;
            let overlay = ListingOverlay::from_sheet(&listing_sheet, listing_config)?;
            info!("📋 {} listing covers {} products", brand.name, overlay.len());
            mapper = mapper.with_listing(overlay);
        }

        let records = sheet.rows.iter().map(|row| mapper.map(row)).collect();
        UpsertEngine::new(&self.store, self.config.runtime.batch_ceiling, self.progress.as_ref())
            .sync_records(records, collection, &label)
            .await
    }

    /// 🏷️ Products, then customers, whichever the brand has configured.
    pub async fn import_brand(&self, brand: &str) -> Result<Vec<ImportReport>> {
        let brand_config = self.config.brand(brand)?;
        let mut reports = Vec::new();
        for (entity, configured, collection) in [
            (
                EntityKind::Product,
                brand_config.products.is_some(),
                &brand_config.product_collection,
            ),
            (
                EntityKind::Customer,
                brand_config.customers.is_some(),
                &brand_config.customer_collection,
            ),
        ] {
            if !configured {
                continue;
            }
            let summary = self.import(brand, entity).await?;
            reports.push(ImportReport {
                brand: brand.to_string(),
                entity: entity.to_string(),
                collection: collection.clone(),
                summary,
            });
        }
        Ok(reports)
    }

    /// 🌍 Every configured brand, one after the other.
    pub async fn import_all(&self) -> Result<Vec<ImportReport>> {
        let mut reports = Vec::new();
        for brand in &self.config.brands {
            reports.extend(self.import_brand(&brand.name).await?);
        }
        Ok(reports)
    }

    /// 🧑‍💼 Rebuilds the brand's salesmen from its customer and product collections.
    pub async fn rebuild_salesmen(&self, brand: &str) -> Result<RebuildSummary> {
        let brand_config = self.config.brand(brand)?;
        let sources = [
            brand_config.customer_collection.clone(),
            brand_config.product_collection.clone(),
        ];
        SalesmenRebuilder::new(
            &self.store,
            &self.config.salesmen,
            self.config.runtime.page_size,
            self.config.runtime.batch_ceiling,
        )
        .rebuild(brand, &sources)
        .await
    }

    /// 🗑️ Empties a collection.
    pub async fn wipe(&self, collection: &str) -> Result<usize> {
        self.maintenance().delete_all_in_collection(collection).await
    }

    /// 🎯 Deletes the documents whose `field` equals the text `value`.
    pub async fn delete_by(&self, collection: &str, field: &str, value: &str) -> Result<usize> {
        self.maintenance()
            .delete_filtered_by(collection, field, FieldValue::Text(value.to_string()))
            .await
    }

    fn maintenance(&self) -> Maintenance<'_> {
        Maintenance::new(
            &self.store,
            self.config.runtime.page_size,
            self.config.runtime.batch_ceiling,
        )
    }
}
