//! 🚀 sheetsync-cli: the front door.
//!
//! Loads config, sets up logging, runs exactly one operation and prints what
//! happened. No prompts, no menus. Cron-friendly, human-tolerable.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{Cell, CellAlignment, Table, presets::UTF8_FULL_CONDENSED};
use sheetsync::{EntityKind, ImportReport, Pipeline};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sheetsync", version, about = "📊 Sync brand spreadsheets into a document store")]
struct Cli {
    /// TOML config file. Without one, only SHEETSYNC_* env vars are read.
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import spreadsheets: every brand, one brand, or one entity of one brand.
    Sync {
        #[arg(long)]
        brand: Option<String>,
        /// Requires --brand.
        #[arg(long, value_enum, requires = "brand")]
        entity: Option<EntityArg>,
    },
    /// Rebuild a brand's slice of the salesmen directory.
    RebuildSalesmen {
        #[arg(long)]
        brand: String,
    },
    /// Delete every document in a collection.
    Wipe {
        #[arg(long)]
        collection: String,
    },
    /// Delete the documents of a collection whose field equals a text value.
    DeleteBy {
        #[arg(long)]
        collection: String,
        #[arg(long)]
        field: String,
        #[arg(long)]
        value: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EntityArg {
    Products,
    Customers,
}

impl From<EntityArg> for EntityKind {
    fn from(arg: EntityArg) -> Self {
        match arg {
            EntityArg::Products => EntityKind::Product,
            EntityArg::Customers => EntityKind::Customer,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        let exists = path.try_exists().with_context(|| {
            format!(
                "💀 Could not check whether the config file exists. If it is a relative path, \
                 try an absolute one. Was checking here: '{}'",
                path.display()
            )
        })?;
        if !exists {
            anyhow::bail!("💀 Config file '{}' does not exist.", path.display());
        }
    }

    let app_config = sheetsync::load_config(cli.config.as_deref())
        .context("💀 Couldn't load the configuration. Check the file and the SHEETSYNC_* variables.")?;

    if let Err(err) = run(app_config, cli.command).await {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion, one layer at a time
        let mut looks_like_connection_trouble = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            let cause_str = cause.to_string();
            if cause_str.contains("error sending request")
                || cause_str.contains("connection refused")
                || cause_str.contains("Connection refused")
                || cause_str.contains("tcp connect error")
                || cause_str.contains("dns error")
            {
                looks_like_connection_trouble = true;
            }
        }
        if looks_like_connection_trouble {
            error!(
                "🔧 hint: something isn't reachable. Check that the spreadsheet URL opens in a \
                 browser and that Firestore (or the emulator at base_url) is up. Re-running is \
                 always safe: unchanged records are skipped."
            );
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(app_config: sheetsync::AppConfig, command: Command) -> Result<()> {
    let pipeline = Pipeline::from_config(app_config)?;
    match command {
        Command::Sync { brand, entity } => {
            let reports = match (brand, entity) {
                (Some(brand), Some(entity)) => {
                    let entity = EntityKind::from(entity);
                    let brand_config = pipeline.config().brand(&brand)?;
                    let collection = match entity {
                        EntityKind::Product => brand_config.product_collection.clone(),
                        EntityKind::Customer => brand_config.customer_collection.clone(),
                    };
                    let summary = pipeline.import(&brand, entity).await?;
                    vec![ImportReport {
                        brand,
                        entity: entity.to_string(),
                        collection,
                        summary,
                    }]
                }
                (Some(brand), None) => pipeline.import_brand(&brand).await?,
                (None, _) => pipeline.import_all().await?,
            };
            print_reports(&reports);
        }
        Command::RebuildSalesmen { brand } => {
            let summary = pipeline.rebuild_salesmen(&brand).await?;
            info!(
                "🧑‍💼 {brand}: {} old entries removed, {} documents scanned, {} salesmen written",
                summary.deleted, summary.scanned, summary.inserted
            );
        }
        Command::Wipe { collection } => {
            let deleted = pipeline.wipe(&collection).await?;
            info!("🗑️ '{collection}' wiped: {deleted} documents deleted");
        }
        Command::DeleteBy {
            collection,
            field,
            value,
        } => {
            let deleted = pipeline.delete_by(&collection, &field, &value).await?;
            info!("🎯 '{collection}': {deleted} documents with {field} = {value:?} deleted");
        }
    }
    Ok(())
}

/// 🍽️ One row per import. The table everybody screenshots.
fn print_reports(reports: &[ImportReport]) {
    if reports.is_empty() {
        info!("📭 nothing configured to import");
        return;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["brand", "entity", "collection", "written", "skipped"]);
    for report in reports {
        table.add_row(vec![
            Cell::new(&report.brand),
            Cell::new(&report.entity),
            Cell::new(&report.collection),
            Cell::new(report.summary.processed).set_alignment(CellAlignment::Right),
            Cell::new(report.summary.skipped).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");
}
