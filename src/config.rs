//! Process-wide configuration, collected once at entry and passed by
//! reference into each client constructor. Library code never reads ambient
//! env on its own.

use anyhow::Result;

use crate::util::env::{env_opt, env_parse, env_req};

#[derive(Debug, Clone)]
pub struct Config {
    /// Shopify shop identifier, i.e. `{shop_name}.myshopify.com`.
    pub shop_name: String,
    /// Static admin-API access token (sent as `X-Shopify-Access-Token`).
    pub shopify_token: String,
    /// EditionGuard bearer token.
    pub editionguard_api_key: String,
    /// AWS credentials for the bulk sync; optional when the ambient
    /// environment or instance profile already provides them.
    pub aws_access_key: Option<String>,
    pub aws_secret_key: Option<String>,
    pub s3_bucket: String,
    pub s3_region: String,
    /// Key prefix under the bucket where ebook PDFs live; may be empty.
    pub s3_prefix: String,
    /// Local staging directory the S3 sync mirrors into.
    pub local_ebooks_dir: String,
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            shop_name: env_req("SHOPIFY_SHOP_NAME")?,
            shopify_token: env_req("SHOPIFY_ACCESS_TOKEN")?,
            editionguard_api_key: env_req("EDITIONGUARD_API_KEY")?,
            aws_access_key: env_opt("AWS_ACCESS_KEY"),
            aws_secret_key: env_opt("AWS_SECRET_KEY"),
            s3_bucket: env_req("S3_BUCKET_NAME")?,
            s3_region: env_req("S3_BUCKET_REGION")?,
            s3_prefix: env_opt("S3_EBOOKS_PATH").unwrap_or_default(),
            local_ebooks_dir: env_req("LOCAL_EBOOKS_PATH")?,
            http_timeout_secs: env_parse("HTTP_TIMEOUT_SECS", 30),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_reads_the_full_variable_set() {
        std::env::set_var("SHOPIFY_SHOP_NAME", "testshop");
        std::env::set_var("SHOPIFY_ACCESS_TOKEN", "shpat_x");
        std::env::set_var("EDITIONGUARD_API_KEY", "eg_x");
        std::env::set_var("S3_BUCKET_NAME", "ebooks-bucket");
        std::env::set_var("S3_BUCKET_REGION", "eu-west-1");
        std::env::set_var("S3_EBOOKS_PATH", "ebooks");
        std::env::set_var("LOCAL_EBOOKS_PATH", "/tmp/ebooks");

        let cfg = Config::from_env().expect("config");
        assert_eq!(cfg.shop_name, "testshop");
        assert_eq!(cfg.s3_prefix, "ebooks");
        assert_eq!(cfg.http_timeout_secs, 30);
    }
}
