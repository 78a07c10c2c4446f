use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use dex_catalog::{Catalog, CatalogConfig, CatalogError, LogNotifier, SearchFilter};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dex-catalog")]
#[command(about = "Searches, exports and notifies entities from the PokeAPI catalog")]
struct Cli {
    #[command(flatten)]
    upstream: UpstreamArgs,

    /// Tracing log level
    #[arg(long, env = "DEX_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct UpstreamArgs {
    /// Root URL of the upstream API
    #[arg(long, env = "DEX_BASE_URL", default_value = dex_catalog::config::DEFAULT_BASE_URL, global = true)]
    base_url: String,

    /// Per-request timeout (e.g. "20s")
    #[arg(long, env = "DEX_TIMEOUT", default_value = "20s", value_parser = humantime::parse_duration, global = true)]
    timeout: Duration,

    /// Rows per listing page when building the index
    #[arg(long, env = "DEX_LISTING_PAGE_SIZE", default_value_t = 500, value_parser = clap::value_parser!(u32).range(1..), global = true)]
    listing_page_size: u32,

    /// Lifetime of the catalog index
    #[arg(long, env = "DEX_INDEX_TTL", default_value = "1h", value_parser = humantime::parse_duration, global = true)]
    index_ttl: Duration,

    /// Lifetime of category labels
    #[arg(long, env = "DEX_LABEL_TTL", default_value = "6h", value_parser = humantime::parse_duration, global = true)]
    label_ttl: Duration,

    /// Lifetime of category memberships and the category list
    #[arg(long, env = "DEX_CATEGORY_TTL", default_value = "1h", value_parser = humantime::parse_duration, global = true)]
    category_ttl: Duration,

    /// Preferred locale for category labels
    #[arg(long, env = "DEX_LOCALE", default_value = "es", global = true)]
    locale: String,

    /// Locale used when the preferred one is missing
    #[arg(long, env = "DEX_FALLBACK_LOCALE", default_value = "en", global = true)]
    fallback_locale: String,

    /// Prefix for entity image URLs
    #[arg(long, env = "DEX_SPRITE_BASE_URL", default_value = dex_catalog::config::DEFAULT_SPRITE_BASE_URL, global = true)]
    sprite_base_url: String,
}

impl UpstreamArgs {
    fn into_config(self) -> CatalogConfig {
        CatalogConfig {
            base_url: self.base_url,
            request_timeout: self.timeout,
            listing_page_size: self.listing_page_size,
            index_ttl: self.index_ttl,
            label_ttl: self.label_ttl,
            members_ttl: self.category_ttl,
            categories_ttl: self.category_ttl,
            primary_locale: self.locale,
            fallback_locale: self.fallback_locale,
            sprite_base_url: self.sprite_base_url,
            ..Default::default()
        }
    }
}

#[derive(Args)]
struct FilterArgs {
    /// Name fragment; diacritics, case and separators are ignored
    #[arg(long)]
    name: Option<String>,

    /// Category id to restrict results to
    #[arg(long)]
    category: Option<u32>,

    /// 1-based page number
    #[arg(long, default_value_t = 1)]
    page: u32,

    /// Results per page (capped at 100)
    #[arg(long, default_value_t = dex_catalog::model::DEFAULT_PAGE_SIZE)]
    page_size: u32,
}

impl From<FilterArgs> for SearchFilter {
    fn from(args: FilterArgs) -> Self {
        SearchFilter {
            name: args.name,
            category_id: args.category,
            page: args.page,
            page_size: args.page_size,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Search and enrich one page of entities
    Search(FilterArgs),
    /// Show one entity
    Details {
        id: u32,
    },
    /// List categories with a display label
    Categories,
    /// Flat rows of one search page
    Export(FilterArgs),
    /// Resolve one entity and log a notification for it
    NotifyOne {
        id: u32,
        #[arg(long, env = "DEX_RECIPIENT")]
        recipient: String,
    },
    /// Resolve several entities and log one bulk notification
    NotifyBulk {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<u32>,
        #[arg(long, env = "DEX_RECIPIENT")]
        recipient: String,
    },
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{out}");
    Ok(())
}

async fn run(catalog: Catalog, command: Command, cancel: CancellationToken) -> anyhow::Result<()> {
    match command {
        Command::Search(args) => {
            let page = catalog.search(&args.into(), &cancel).await?;
            print_json(&page)
        }
        Command::Details { id } => match catalog.get_details(id, &cancel).await? {
            Some(detail) => print_json(&detail),
            None => anyhow::bail!("entity {id} not found"),
        },
        Command::Categories => {
            let categories = catalog.get_categories(&cancel).await?;
            print_json(&*categories)
        }
        Command::Export(args) => {
            let rows = catalog.export_rows(&args.into(), &cancel).await?;
            print_json(&rows)
        }
        Command::NotifyOne { id, recipient } => {
            let notifier = LogNotifier::new(recipient);
            let detail = catalog.send_one(id, &notifier, &cancel).await?;
            print_json(&detail)
        }
        Command::NotifyBulk { ids, recipient } => {
            let notifier = LogNotifier::new(recipient);
            let report = catalog.send_bulk(&ids, &notifier, &cancel).await?;
            print_json(&report)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = cli.upstream.into_config();
    info!(base_url = %config.base_url, "dex-catalog starting");
    let catalog = Catalog::connect(config).context("failed to build upstream client")?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            ctrl_c.cancel();
        }
    });

    match run(catalog, cli.command, cancel).await {
        Err(e) if matches!(e.downcast_ref::<CatalogError>(), Some(CatalogError::Cancelled)) => {
            eprintln!("cancelled");
            std::process::exit(130);
        }
        result => result,
    }
}
