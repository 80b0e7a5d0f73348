//! Catalog reconciliation: converge every product that sells an ebook onto a
//! registered DRM resource, and flag stored linkage the provider no longer
//! knows about.
//!
//! Per product the decision is a small state machine:
//! no stored resource id -> extract ISBN, upload, persist the returned id;
//! stored resource id -> existence check only. One DRM resource per product,
//! never per variant; ebook variants are enumerated for the run counter only.

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::assets::AssetStore;
use crate::editionguard::{EditionGuardClient, ResourceStatus};
use crate::extract::{extract_ebook_isbn, strip_html};
use crate::shopify::{
    metafield_value, Product, ShopifyClient, METAFIELD_KEY, METAFIELD_NAMESPACE,
};

/// Per-run counters, reported once at the end of the pass.
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub products_total: usize,
    /// Ebook variants processed (those with a product back-reference).
    pub ebook_variants: usize,
    pub created: usize,
    pub verified: usize,
    /// Stored linkage present but the provider reports the resource absent.
    pub drift: usize,
    /// Existence could not be confirmed either way; not counted as drift.
    pub unconfirmed: usize,
    pub skipped_no_isbn: usize,
    pub create_failures: usize,
    pub elapsed_ms: i64,
}

pub struct Reconciler<'a> {
    catalog: &'a ShopifyClient,
    drm: &'a EditionGuardClient,
    assets: &'a AssetStore,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        catalog: &'a ShopifyClient,
        drm: &'a EditionGuardClient,
        assets: &'a AssetStore,
    ) -> Self {
        Self {
            catalog,
            drm,
            assets,
        }
    }

    /// One full sequential pass over the catalog, in API order.
    ///
    /// Pagination and metafield reads abort the run (the linkage state is
    /// untrustworthy without them); everything else is logged per product
    /// and the pass moves on.
    pub async fn run(&self) -> Result<RunSummary> {
        let start = Utc::now();
        let mut summary = RunSummary::default();

        info!("fetching products from catalog");
        let products = self.catalog.list_products().await?;
        summary.products_total = products.len();
        info!(total = products.len(), "products fetched");

        for product in &products {
            self.reconcile_product(product, &mut summary).await?;
        }

        summary.elapsed_ms = (Utc::now() - start).num_milliseconds();
        Ok(summary)
    }

    async fn reconcile_product(
        &self,
        product: &Product,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let ebook_variants: Vec<_> = product.variants.iter().filter(|v| v.is_ebook()).collect();
        if ebook_variants.is_empty() {
            // No ebook variant: no metafield or DRM traffic at all.
            return Ok(());
        }

        for variant in &ebook_variants {
            if variant.product_id.is_none() {
                warn!(
                    product = %product.title,
                    variant_id = variant.id,
                    "variant has no product back-reference; skipping"
                );
                continue;
            }
            summary.ebook_variants += 1;
        }

        let metafields = self.catalog.get_metafields(product.id).await?;
        match metafield_value(&metafields, METAFIELD_NAMESPACE, METAFIELD_KEY) {
            None => self.create_resource(product, summary).await,
            Some(resource_id) => self.verify_resource(product, resource_id, summary).await,
        }
        Ok(())
    }

    /// CREATE path: no stored resource id yet. Creation failure writes no
    /// metafield, so the next run retries instead of skipping.
    async fn create_resource(&self, product: &Product, summary: &mut RunSummary) {
        let description = product.body_html.as_deref().unwrap_or_default();
        let Some(isbn) = extract_ebook_isbn(&strip_html(description)) else {
            warn!(product = %product.title, "could not extract ISBN (eBook) from description");
            summary.skipped_no_isbn += 1;
            return;
        };

        let path = self.assets.local_path(&isbn);
        match self.drm.create_book(&product.title, &isbn, &path).await {
            Ok(created) => {
                info!(
                    product = %product.title,
                    resource_id = %created.resource_id,
                    "DRM resource created"
                );
                summary.created += 1;
                if let Err(e) = self
                    .catalog
                    .set_metafield(product.id, &created.resource_id)
                    .await
                {
                    warn!(
                        product_id = product.id,
                        error = %e,
                        "failed to save resource_id metafield"
                    );
                }
            }
            Err(e) => {
                warn!(
                    product = %product.title,
                    isbn = %isbn,
                    error = %e,
                    "DRM resource creation failed"
                );
                summary.create_failures += 1;
            }
        }
    }

    /// VERIFY path: a resource id is already stored, so never create.
    /// Absent is drift, surfaced as a warning only; no auto-repair.
    async fn verify_resource(
        &self,
        product: &Product,
        resource_id: &str,
        summary: &mut RunSummary,
    ) {
        match self.drm.resource_status(resource_id).await {
            ResourceStatus::Exists => {
                debug!(product_id = product.id, resource_id, "DRM resource confirmed");
                summary.verified += 1;
            }
            ResourceStatus::Absent => {
                warn!(
                    product_id = product.id,
                    resource_id,
                    "DRM resource MISSING for stored linkage - check for sync issues"
                );
                summary.drift += 1;
            }
            ResourceStatus::Unknown => {
                warn!(
                    product_id = product.id,
                    resource_id,
                    "could not confirm DRM resource; leaving linkage as-is"
                );
                summary.unconfirmed += 1;
            }
        }
    }
}
