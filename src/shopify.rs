use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::header::{HeaderMap, HeaderValue, LINK};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::Config;

fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        // Back off to a char boundary; error bodies aren't ASCII-only.
        let mut end = max_len;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
        s.push_str("…");
    }
    s
}

/// Shopify admin REST client (products, metafields, orders).
///
/// Key endpoints:
/// - GET /products.json?limit=250 - Product listing, cursor pagination via
///   the `Link: <...>; rel="next"` response header
/// - GET /products/{id}/metafields.json - Per-product metafields
/// - POST /products/{id}/metafields.json - Metafield create
/// - GET /orders.json?name=...&status=any - Order lookup by name
#[derive(Debug, Clone)]
pub struct ShopifyClient {
    base_url: String,
    http: Client,
}

const API_VERSION: &str = "2024-04";
const PAGE_LIMIT: u32 = 250;

/// Variant-title token marking the downloadable-ebook purchase option.
pub const EBOOK_TOKEN: &str = "eBook";

pub const METAFIELD_NAMESPACE: &str = "editionguard";
pub const METAFIELD_KEY: &str = "resource_id";
const METAFIELD_TYPE: &str = "single_line_text_field";

#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub body_html: Option<String>,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Variant {
    pub id: u64,
    pub title: String,
    /// Back-reference to the owning product; the API can omit it on
    /// partially-populated rows.
    #[serde(default)]
    pub product_id: Option<u64>,
}

impl Variant {
    /// Substring match on the variant title, case-sensitive.
    pub fn is_ebook(&self) -> bool {
        self.title.contains(EBOOK_TOKEN)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Metafield {
    pub namespace: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub customer: Option<Customer>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineItem {
    pub title: String,
    #[serde(default)]
    pub variant_title: Option<String>,
    #[serde(default)]
    pub product_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ProductsPage {
    #[serde(default)]
    products: Vec<Product>,
}

#[derive(Debug, Deserialize)]
struct MetafieldsPage {
    #[serde(default)]
    metafields: Vec<Metafield>,
}

#[derive(Debug, Deserialize)]
struct OrdersPage {
    #[serde(default)]
    orders: Vec<Order>,
}

/// First matching metafield value for (namespace, key), in API order.
pub fn metafield_value<'a>(
    metafields: &'a [Metafield],
    namespace: &str,
    key: &str,
) -> Option<&'a str> {
    metafields
        .iter()
        .find(|m| m.namespace == namespace && m.key == key)
        .map(|m| m.value.as_str())
}

/// Pull the `rel="next"` continuation URL out of a `Link` response header.
fn parse_next_link(link_header: &str) -> Option<String> {
    for segment in link_header.split(',') {
        if !segment.contains(r#"rel="next""#) {
            continue;
        }
        let start = segment.find('<')?;
        let end = segment.find('>')?;
        if start + 1 < end {
            return Some(segment[start + 1..end].to_string());
        }
    }
    None
}

impl ShopifyClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let base_url = format!(
            "https://{}.myshopify.com/admin/api/{}",
            cfg.shop_name, API_VERSION
        );
        let mut headers = HeaderMap::new();
        let mut token = HeaderValue::from_str(&cfg.shopify_token)
            .map_err(|e| anyhow!("invalid Shopify access token: {e}"))?;
        token.set_sensitive(true);
        headers.insert("X-Shopify-Access-Token", token);

        let http = Client::builder()
            .user_agent("ebook-drm-sync/0.1")
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self { base_url, http })
    }

    /// Point the client at a different base URL (tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Fetch every product, following cursor pagination until the `Link`
    /// header carries no `rel="next"` entry.
    ///
    /// Any non-2xx page fetch is an error: a partial product list would make
    /// the reconciliation silently skip work, so the whole run aborts.
    pub async fn list_products(&self) -> Result<Vec<Product>> {
        let mut products = Vec::new();
        let mut url = format!("{}/products.json?limit={}", self.base_url, PAGE_LIMIT);

        loop {
            let resp = self.http.get(&url).send().await?;
            let status = resp.status();
            if !status.is_success() {
                let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
                return Err(anyhow!(
                    "product page fetch failed: {status} url={url} body={body}"
                ));
            }

            let next = resp
                .headers()
                .get(LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_next_link);

            let page: ProductsPage = resp.json().await?;
            debug!(count = page.products.len(), "fetched product page");
            products.extend(page.products);

            match next {
                Some(next) => {
                    Url::parse(&next)
                        .map_err(|e| anyhow!("bad continuation link {next}: {e}"))?;
                    url = next;
                }
                None => break,
            }
        }

        Ok(products)
    }

    /// All metafields for a product. Non-2xx is an error; callers on the
    /// reconciliation path treat it as fatal (untrustworthy linkage state).
    pub async fn get_metafields(&self, product_id: u64) -> Result<Vec<Metafield>> {
        let url = format!("{}/products/{}/metafields.json", self.base_url, product_id);
        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
            return Err(anyhow!(
                "metafields fetch failed: {status} product_id={product_id} body={body}"
            ));
        }
        let page: MetafieldsPage = resp.json().await?;
        Ok(page.metafields)
    }

    /// Persist the DRM resource linkage as a product metafield.
    ///
    /// The underlying API only has create semantics, so this re-reads first
    /// and skips the POST when the (namespace, key) pair already exists;
    /// repeated runs can't pile up duplicate entries.
    pub async fn set_metafield(&self, product_id: u64, value: &str) -> Result<()> {
        let existing = self.get_metafields(product_id).await?;
        if metafield_value(&existing, METAFIELD_NAMESPACE, METAFIELD_KEY).is_some() {
            debug!(product_id, "resource_id metafield already present; not rewriting");
            return Ok(());
        }

        let url = format!("{}/products/{}/metafields.json", self.base_url, product_id);
        let body = serde_json::json!({
            "metafield": {
                "namespace": METAFIELD_NAMESPACE,
                "key": METAFIELD_KEY,
                "type": METAFIELD_TYPE,
                "value": value,
            }
        });
        let resp = self.http.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
            return Err(anyhow!(
                "metafield create failed: {status} product_id={product_id} body={body}"
            ));
        }
        Ok(())
    }

    /// Look an order up by its display name (e.g. `#1001`), any status.
    /// Returns the first hit or `None`.
    pub async fn find_order(&self, name: &str) -> Result<Option<Order>> {
        let url = format!("{}/orders.json", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("name", name), ("status", "any")])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
            return Err(anyhow!(
                "order lookup failed: {status} name={name} body={body}"
            ));
        }
        let page: OrdersPage = resp.json().await?;
        Ok(page.orders.into_iter().next())
    }
}
