//! Delivery-link emails for past orders: map each eBook line item back to
//! its product's stored DRM resource and ask the provider to email a link
//! to the order's customer.

use anyhow::Result;
use tracing::{info, warn};

use crate::editionguard::EditionGuardClient;
use crate::shopify::{
    metafield_value, ShopifyClient, EBOOK_TOKEN, METAFIELD_KEY, METAFIELD_NAMESPACE,
};

#[derive(Debug, Default, Clone)]
pub struct NotifySummary {
    pub orders_processed: usize,
    pub orders_missing: usize,
    pub emails_sent: usize,
    pub items_skipped: usize,
    pub send_failures: usize,
}

/// Request delivery emails for every eBook line item across the given order
/// names. One order's failure never aborts the rest: lookups that miss or
/// error are logged and the loop continues.
///
/// Line items are matched on `variant_title == "eBook"` exactly (not the
/// substring rule the reconciliation uses for variant rows).
pub async fn notify_orders(
    catalog: &ShopifyClient,
    drm: &EditionGuardClient,
    order_names: &[String],
) -> Result<NotifySummary> {
    let mut summary = NotifySummary::default();

    for name in order_names {
        let order = match catalog.find_order(name).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                info!(order = %name, "order not found");
                summary.orders_missing += 1;
                continue;
            }
            Err(e) => {
                warn!(order = %name, error = %e, "order lookup failed");
                summary.orders_missing += 1;
                continue;
            }
        };
        summary.orders_processed += 1;

        let Some(email) = order.customer.as_ref().and_then(|c| c.email.clone()) else {
            warn!(order = %name, "order has no customer email; skipping");
            continue;
        };

        for item in &order.line_items {
            if item.variant_title.as_deref() != Some(EBOOK_TOKEN) {
                continue;
            }

            let Some(product_id) = item.product_id else {
                warn!(order = %name, item = %item.title, "line item has no product id; skipping");
                summary.items_skipped += 1;
                continue;
            };

            let resource_id = match catalog.get_metafields(product_id).await {
                Ok(metafields) => {
                    metafield_value(&metafields, METAFIELD_NAMESPACE, METAFIELD_KEY)
                        .map(str::to_string)
                }
                Err(e) => {
                    warn!(
                        order = %name,
                        product_id,
                        error = %e,
                        "metafield lookup failed; skipping line item"
                    );
                    summary.items_skipped += 1;
                    continue;
                }
            };
            let Some(resource_id) = resource_id else {
                warn!(
                    order = %name,
                    product_id,
                    "resource id not found for product; skipping line item"
                );
                summary.items_skipped += 1;
                continue;
            };

            match drm.deliver_book_link(&resource_id, &email, &item.title).await {
                Ok(receipt) => {
                    info!(
                        order = %name,
                        email = %receipt.email,
                        title = %receipt.title,
                        status = receipt.status,
                        "delivery email requested"
                    );
                    summary.emails_sent += 1;
                }
                Err(e) => {
                    warn!(order = %name, email = %email, error = %e, "delivery email failed");
                    summary.send_failures += 1;
                }
            }
        }
    }

    Ok(summary)
}
