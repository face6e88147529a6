//! Command-line entry point.
//!
//! Two subcommands mirror the two library entry points:
//!   placescrape scrape <product_type> <location> [max_results]
//!   placescrape backfill <column> [product_type]

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use placescrape::store::BackfillColumn;
use placescrape::{ProductType, ScrapeConfig};

fn usage() -> String {
    let types = ProductType::ALL
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join("|");
    format!(
        "Usage:\n  placescrape scrape <{types}> <location> [max_results]\n  placescrape backfill <column> [{types}]\n\nEnvironment:\n  PLACESCRAPE_DB    database file (default: products.db)\n  PLACESCRAPE_HEADED  set to any value to show the browser window"
    )
}

fn db_path() -> PathBuf {
    std::env::var("PLACESCRAPE_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("products.db"))
}

fn headless() -> bool {
    std::env::var("PLACESCRAPE_HEADED").is_err()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let summary = match args.first().map(String::as_str) {
        Some("scrape") => {
            let [_, product_type, location, rest @ ..] = args.as_slice() else {
                bail!("{}", usage());
            };
            let product_type: ProductType = product_type
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            let max_results = rest
                .first()
                .map(|v| v.parse::<usize>().context("max_results must be a number"))
                .transpose()?;

            let mut builder = ScrapeConfig::builder()
                .db_path(db_path())
                .headless(headless())
                .product_type(product_type)
                .location(location.clone());
            if let Some(limit) = max_results {
                builder = builder.max_results(limit);
            }
            let config = builder.build()?;

            placescrape::scrape(config).await?
        }
        Some("backfill") => {
            let [_, column, rest @ ..] = args.as_slice() else {
                bail!("{}", usage());
            };
            let column: BackfillColumn =
                column.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            let product_type = rest
                .first()
                .map(|v| v.parse::<ProductType>().map_err(|e| anyhow::anyhow!(e)))
                .transpose()?;

            placescrape::backfill(&db_path(), column, product_type, headless()).await?
        }
        _ => bail!("{}", usage()),
    };

    println!(
        "{} items processed: {} inserted, {} updated, {} failed",
        summary.items_processed, summary.inserted, summary.updated, summary.failed
    );
    if let Some(fatal) = summary.fatal {
        bail!("run stopped early: {fatal}");
    }
    Ok(())
}
