use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::warn;

use crate::config::Config;

fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        // Back off to a char boundary; provider error bodies aren't ASCII-only.
        let mut end = max_len;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
        s.push_str("…");
    }
    s
}

/// EditionGuard DRM provider client.
///
/// Key endpoints:
/// - GET /book/{resource_id} - Existence check (200 = exists)
/// - POST /book - Multipart upload (resource file, title, publisher, isbn13)
/// - POST /deliver-book-link - Email a time-limited access link
#[derive(Debug, Clone)]
pub struct EditionGuardClient {
    base_url: String,
    http: Client,
    api_key: String,
}

const DEFAULT_BASE_URL: &str = "https://app.editionguard.com/api/v2";
const PUBLISHER: &str = "Ethics International Press";

/// Outcome of an existence check.
///
/// `Unknown` covers transport failures and any status other than 200/404,
/// so callers can tell "confirmed absent" apart from "could not confirm"
/// instead of flagging drift on an auth or availability blip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceStatus {
    Exists,
    Absent,
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedBook {
    pub resource_id: String,
}

/// What the provider was asked to do, echoed back for per-recipient logs.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub status: &'static str,
    pub email: String,
    pub title: String,
}

impl EditionGuardClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let http = Client::builder()
            .user_agent("ebook-drm-sync/0.1")
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .build()?;
        Ok(Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            http,
            api_key: cfg.editionguard_api_key.clone(),
        })
    }

    /// Point the client at a different base URL (tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Check whether a resource exists on the provider.
    ///
    /// Never returns an error: anything that isn't a clean 200 or 404 is
    /// reported as `Unknown` and logged here, leaving policy to the caller.
    pub async fn resource_status(&self, resource_id: &str) -> ResourceStatus {
        let url = format!("{}/book/{}", self.base_url, resource_id);
        let resp = match self.http.get(&url).bearer_auth(&self.api_key).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(resource_id, error = %e, "existence check failed at transport level");
                return ResourceStatus::Unknown;
            }
        };
        match resp.status() {
            StatusCode::OK => ResourceStatus::Exists,
            StatusCode::NOT_FOUND => ResourceStatus::Absent,
            other => {
                warn!(resource_id, status = %other, "existence check returned unexpected status");
                ResourceStatus::Unknown
            }
        }
    }

    /// Register a book with the provider by uploading the asset file.
    ///
    /// Fails fast with no network call when the file is missing at
    /// `file_path`; there is no point uploading a payload we don't have.
    /// On failure no partial value is returned.
    pub async fn create_book(
        &self,
        title: &str,
        isbn: &str,
        file_path: &Path,
    ) -> Result<CreatedBook> {
        if !file_path.exists() {
            return Err(anyhow!(
                "ebook file missing: {} (title {title:?})",
                file_path.display()
            ));
        }

        let bytes = tokio::fs::read(file_path).await?;
        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("ebook.pdf")
            .to_string();
        let resource = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        let form = Form::new()
            .part("resource", resource)
            .text("title", title.to_string())
            .text("publisher", PUBLISHER)
            .text("isbn13", isbn.to_string());

        let url = format!("{}/book", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
            return Err(anyhow!(
                "book create failed: {status} title={title:?} isbn={isbn} body={body}"
            ));
        }
        Ok(resp.json().await?)
    }

    /// Ask the provider to email a time-limited access link for a resource.
    pub async fn deliver_book_link(
        &self,
        resource_id: &str,
        email: &str,
        title: &str,
    ) -> Result<DeliveryReceipt> {
        let url = format!("{}/deliver-book-link", self.base_url);
        let payload = serde_json::json!({
            "resource_id": resource_id,
            "email": email,
        });
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
            return Err(anyhow!(
                "delivery email failed: {status} resource_id={resource_id} email={email} body={body}"
            ));
        }
        Ok(DeliveryReceipt {
            status: "sent",
            email: email.to_string(),
            title: title.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        let mut body = "a".repeat(1999);
        body.push_str("é and more");
        let cut = truncate_for_log(body, 2000);
        // Byte 2000 lands inside the two-byte 'é'; the cut backs off to 1999.
        assert_eq!(cut, format!("{}…", "a".repeat(1999)));

        assert_eq!(truncate_for_log("short".to_string(), 2000), "short");
    }
}
