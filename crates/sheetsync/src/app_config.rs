//! 🔧 App Configuration: the sacred TOML-to-struct pipeline, now with brands.
//!
//! 📡 Every brand back-office publishes its own sheets in its own dialect, so
//! the config is mostly a list of brands: where their sheets live, which alias
//! preset understands them, and which collections they land in.
//!
//! 🏗️ Powered by Figment. `SHEETSYNC_*` env vars form the base layer (nested
//! keys separated by `__`, e.g. `SHEETSYNC_RUNTIME__BATCH_CEILING=200`), and an
//! optional TOML file goes on top. TOML wins on conflicts.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::mappers::BrandPreset;
use crate::sources::{SheetFormat, SourceLocation};
use crate::store::FirestoreConfig;

/// 🔒 Firestore refuses batches above this many writes. So do we.
pub const MAX_BATCH_CEILING: usize = 500;

/// 📦 The AppConfig: one struct to rule them all.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub brands: Vec<BrandConfig>,
    #[serde(default)]
    pub salesmen: SalesmenConfig,
}

impl AppConfig {
    /// 🔍 Finds a brand by name, or explains which ones do exist.
    pub fn brand(&self, name: &str) -> Result<&BrandConfig> {
        self.brands
            .iter()
            .find(|brand| brand.name == name)
            .with_context(|| {
                let known: Vec<&str> = self.brands.iter().map(|b| b.name.as_str()).collect();
                format!("💀 No brand named '{name}' in the config. Known brands: {known:?}")
            })
    }

    /// ✅ Rejects configs that would parse fine and then misbehave at 3am.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_BATCH_CEILING).contains(&self.runtime.batch_ceiling) {
            bail!(
                "💀 runtime.batch_ceiling must be between 1 and {MAX_BATCH_CEILING}, got {}",
                self.runtime.batch_ceiling
            );
        }
        if self.runtime.page_size == 0 {
            bail!("💀 runtime.page_size must be at least 1. Zero-sized pages never end.");
        }

        let mut seen = HashSet::new();
        for brand in &self.brands {
            if !seen.insert(brand.name.as_str()) {
                bail!("💀 Brand '{}' is configured twice. Pick one.", brand.name);
            }
            let sources = [
                ("products", brand.products.as_ref()),
                ("customers", brand.customers.as_ref()),
                ("listing", brand.listing.as_ref().map(|l| &l.source)),
            ];
            for (what, source) in sources {
                if let Some(source) = source {
                    source
                        .location()
                        .with_context(|| format!("💀 brand '{}', {what} source", brand.name))?;
                }
            }
        }
        Ok(())
    }
}

/// 🗄️ Which document store to write into. `store = "InMemory"` for dry runs,
/// `[store.Firestore]` for the real thing.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub enum StoreConfig {
    #[default]
    InMemory,
    Firestore(FirestoreConfig),
}

/// ⚙️ Knobs that shape how hard we lean on the store.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// 📦 Max writes per atomic commit.
    #[serde(default = "default_batch_ceiling")]
    pub batch_ceiling: usize,
    /// 📄 Documents per query page during scans and bulk deletes.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// 📊 Draw the terminal progress bar.
    #[serde(default = "default_progress")]
    pub progress: bool,
}

fn default_batch_ceiling() -> usize {
    MAX_BATCH_CEILING
}

fn default_page_size() -> usize {
    500
}

fn default_progress() -> bool {
    true
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            batch_ceiling: default_batch_ceiling(),
            page_size: default_page_size(),
            progress: default_progress(),
        }
    }
}

/// 🏷️ One brand back-office and everything needed to import it.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrandConfig {
    pub name: String,
    pub preset: BrandPreset,
    pub product_collection: String,
    pub customer_collection: String,
    #[serde(default)]
    pub products: Option<SourceConfig>,
    #[serde(default)]
    pub customers: Option<SourceConfig>,
    #[serde(default)]
    pub listing: Option<ListingConfig>,
    /// 💸 Used when a product row has no discount column of its own.
    #[serde(default)]
    pub default_discount_percent: Option<f64>,
    /// ➕ Extra header aliases, keyed by destination field (`address.city` for
    /// group members). Tried after the built-in ones.
    #[serde(default)]
    pub extra_aliases: BTreeMap<String, Vec<String>>,
}

/// 📡 Where a sheet lives and how it is shaped. Exactly one of `url`/`path`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SourceConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub format: SheetFormat,
}

impl SourceConfig {
    pub fn location(&self) -> Result<SourceLocation> {
        match (&self.url, &self.path) {
            (Some(url), None) => Ok(SourceLocation::Url(url.clone())),
            (None, Some(path)) => Ok(SourceLocation::File(path.clone())),
            (Some(_), Some(_)) => bail!("💀 a source needs a url OR a path, not both"),
            (None, None) => bail!("💀 a source needs a url or a path, it has neither"),
        }
    }
}

/// 📋 The positional "which products are listed" sheet.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ListingConfig {
    pub source: SourceConfig,
    /// 🔑 Header candidates for the product code column.
    #[serde(default = "default_listing_code_aliases")]
    pub code_aliases: Vec<String>,
    /// 🔘 Destination boolean field → header candidates of its toggle column.
    #[serde(default)]
    pub toggles: BTreeMap<String, Vec<String>>,
}

fn default_listing_code_aliases() -> Vec<String> {
    ["Code", "Product Code", "Κωδικός", "Κωδικός Προϊόντος"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// 🧑‍💼 Where the salesmen directory lives and where names are found.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SalesmenConfig {
    #[serde(default = "default_salesmen_collection")]
    pub collection: String,
    /// 🔍 Field paths probed in order on every scanned document.
    #[serde(default = "default_salesmen_field_paths")]
    pub field_paths: Vec<String>,
}

fn default_salesmen_collection() -> String {
    "salesmen".to_string()
}

fn default_salesmen_field_paths() -> Vec<String> {
    [
        "salesman",
        "salesmanName",
        "salesRep",
        "representative",
        "contact.salesman",
        "Πωλητής",
        "Εκπρόσωπος",
        // -- cp1253 "Πωλητής" read back as Latin-1 by an old import
        "ÐùëçôÞò",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for SalesmenConfig {
    fn default() -> Self {
        Self {
            collection: default_salesmen_collection(),
            field_paths: default_salesmen_field_paths(),
        }
    }
}

/// 🚀 Load the config from env vars, plus a TOML file when one is given.
///
/// - `None` → env vars only.
/// - `Some(path)` → env vars + TOML file, merged. TOML wins on conflicts.
///
/// The result is validated before it is returned.
pub fn load_config(config_file_name: Option<&Path>) -> Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("SHEETSYNC_").split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (SHEETSYNC_*).",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (SHEETSYNC_*). \
                 No file was provided, so this one's all on the environment."
            .to_string(),
    };

    let app_config: AppConfig = config.extract().context(context_msg)?;
    app_config.validate()?;
    Ok(app_config)
}
