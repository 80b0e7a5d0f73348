use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use ebook_drm_sync::assets::AssetStore;
use ebook_drm_sync::config::Config;
use ebook_drm_sync::editionguard::EditionGuardClient;
use ebook_drm_sync::notify::notify_orders;
use ebook_drm_sync::reconcile::Reconciler;
use ebook_drm_sync::shopify::ShopifyClient;

#[derive(Parser, Debug)]
#[command(name = "drmsync", version, about = "Ebook DRM registration sync")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Reconcile catalog products against the DRM provider
    Reconcile {
        /// Skip the S3 -> local mirror (assets already staged)
        #[arg(long, default_value_t = false)]
        skip_sync: bool,
    },
    /// Request delivery-link emails for a list of past orders
    NotifyOrders {
        /// Order names, e.g. "#1001"
        orders: Vec<String>,
        /// Newline-delimited file of order names
        #[arg(long)]
        from_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before the subscriber so RUST_LOG from the file applies,
    // but install the subscriber before the bootstrap marker is emitted.
    ebook_drm_sync::util::env::init_env();
    ebook_drm_sync::logging::init_tracing("info")?;
    ebook_drm_sync::util::env::bootstrap_cli("drmsync");

    let cli = Cli::parse();
    let cfg = Config::from_env()?;

    match cli.command {
        Commands::Reconcile { skip_sync } => {
            let catalog = ShopifyClient::new(&cfg)?;
            let drm = EditionGuardClient::new(&cfg)?;
            let assets = AssetStore::new(&cfg);

            if skip_sync {
                info!("skipping S3 sync (assets staged locally)");
            } else {
                assets.sync_from_s3().await?;
            }

            let summary = Reconciler::new(&catalog, &drm, &assets).run().await?;
            println!(
                "[reconcile] products={} ebook_variants={} created={} verified={} drift={} unconfirmed={} no_isbn={} create_failures={} elapsed_ms={}",
                summary.products_total,
                summary.ebook_variants,
                summary.created,
                summary.verified,
                summary.drift,
                summary.unconfirmed,
                summary.skipped_no_isbn,
                summary.create_failures,
                summary.elapsed_ms
            );
        }
        Commands::NotifyOrders { orders, from_file } => {
            let mut names = orders;
            if let Some(path) = from_file {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                names.extend(
                    contents
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(str::to_string),
                );
            }
            if names.is_empty() {
                bail!("no order names given (pass them as arguments or via --from-file)");
            }

            let catalog = ShopifyClient::new(&cfg)?;
            let drm = EditionGuardClient::new(&cfg)?;
            let summary = notify_orders(&catalog, &drm, &names).await?;
            println!(
                "[notify-orders] orders_processed={} orders_missing={} emails_sent={} items_skipped={} send_failures={}",
                summary.orders_processed,
                summary.orders_missing,
                summary.emails_sent,
                summary.items_skipped,
                summary.send_failures
            );
        }
    }

    Ok(())
}
