//! Locates purchasable ebook assets, keyed by ISBN as `{isbn}.pdf`.
//!
//! The bulk path mirrors the bucket prefix to a local staging directory with
//! the AWS CLI before any creation call resolves a local path. `remote_url`
//! gives the direct object address for operators who stage assets some other
//! way.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use tokio::process::Command;
use tracing::info;

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct AssetStore {
    bucket: String,
    region: String,
    prefix: String,
    local_dir: PathBuf,
    aws_access_key: Option<String>,
    aws_secret_key: Option<String>,
}

impl AssetStore {
    pub fn new(cfg: &Config) -> Self {
        Self {
            bucket: cfg.s3_bucket.clone(),
            region: cfg.s3_region.clone(),
            prefix: cfg.s3_prefix.trim_matches('/').to_string(),
            local_dir: PathBuf::from(&cfg.local_ebooks_dir),
            aws_access_key: cfg.aws_access_key.clone(),
            aws_secret_key: cfg.aws_secret_key.clone(),
        }
    }

    fn source_uri(&self) -> String {
        if self.prefix.is_empty() {
            format!("s3://{}/", self.bucket)
        } else {
            format!("s3://{}/{}/", self.bucket, self.prefix)
        }
    }

    /// Mirror the ebook prefix of the bucket into the local staging
    /// directory. Blocks until the sync finishes; non-zero exit is fatal
    /// since every creation call afterwards depends on the mirrored files.
    ///
    /// Credentials and region go to the child process env instead of
    /// mutating shared AWS CLI configuration.
    pub async fn sync_from_s3(&self) -> Result<()> {
        let source = self.source_uri();
        info!(source = %source, dest = %self.local_dir.display(), "syncing ebooks from S3");

        let mut cmd = Command::new("aws");
        cmd.arg("s3")
            .arg("sync")
            .arg(&source)
            .arg(&self.local_dir)
            .arg("--only-show-errors")
            .env("AWS_DEFAULT_REGION", &self.region);
        if let Some(key) = &self.aws_access_key {
            cmd.env("AWS_ACCESS_KEY_ID", key);
        }
        if let Some(secret) = &self.aws_secret_key {
            cmd.env("AWS_SECRET_ACCESS_KEY", secret);
        }

        let status = cmd
            .status()
            .await
            .context("failed to spawn `aws s3 sync` (is the AWS CLI installed?)")?;
        if !status.success() {
            return Err(anyhow!("aws s3 sync exited with {status}"));
        }
        Ok(())
    }

    /// Local path of the mirrored asset for an ISBN.
    pub fn local_path(&self, isbn: &str) -> PathBuf {
        self.local_dir.join(format!("{isbn}.pdf"))
    }

    /// Direct object URL for an ISBN, for setups that skip the bulk sync.
    pub fn remote_url(&self, isbn: &str) -> String {
        if self.prefix.is_empty() {
            format!(
                "https://{}.s3.{}.amazonaws.com/{}.pdf",
                self.bucket, self.region, isbn
            )
        } else {
            format!(
                "https://{}.s3.{}.amazonaws.com/{}/{}.pdf",
                self.bucket, self.region, self.prefix, isbn
            )
        }
    }
}
