//! R2 client implementation.

use std::path::Path;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Configuration for R2 client.
#[derive(Debug, Clone)]
pub struct R2Config {
    /// R2 endpoint URL (S3 API endpoint)
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Base URL objects are publicly served from
    pub public_base_url: String,
    /// Region (usually "auto" for R2)
    pub region: String,
}

impl R2Config {
    /// Create config from environment variables.
    ///
    /// Returns the names of the missing variables when storage is not fully
    /// configured; callers treat that as "storage disabled", not a failure.
    pub fn from_env() -> Result<Self, Vec<&'static str>> {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()))
    }

    /// Build config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Vec<&'static str>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();

        let endpoint_url = lookup("R2_ENDPOINT_URL").or_else(|| {
            lookup("R2_ACCOUNT_ID")
                .map(|account| format!("https://{}.r2.cloudflarestorage.com", account))
        });
        if endpoint_url.is_none() {
            missing.push("R2_ACCOUNT_ID");
        }

        let mut require = |key: &'static str| {
            let value = lookup(key);
            if value.is_none() {
                missing.push(key);
            }
            value
        };

        let access_key_id = require("R2_ACCESS_KEY_ID");
        let secret_access_key = require("R2_SECRET_ACCESS_KEY");
        let bucket_name = require("R2_BUCKET_NAME");
        let public_base_url = require("R2_PUBLIC_BASE_URL");

        match (
            endpoint_url,
            access_key_id,
            secret_access_key,
            bucket_name,
            public_base_url,
        ) {
            (Some(endpoint_url), Some(access_key_id), Some(secret_access_key), Some(bucket_name), Some(public_base_url)) => {
                Ok(Self {
                    endpoint_url,
                    access_key_id,
                    secret_access_key,
                    bucket_name,
                    public_base_url,
                    region: lookup("R2_REGION").unwrap_or_else(|| "auto".to_string()),
                })
            }
            _ => Err(missing),
        }
    }
}

/// Cloudflare R2 storage client.
#[derive(Clone)]
pub struct R2Client {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl R2Client {
    /// Create a new R2 client from configuration.
    pub fn new(config: R2Config) -> StorageResult<Self> {
        if config.bucket_name.is_empty() {
            return Err(StorageError::config_error("bucket name is empty"));
        }

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let client = Client::from_conf(sdk_config);

        Ok(Self {
            client,
            bucket: config.bucket_name,
            public_base_url: config.public_base_url,
        })
    }

    /// Public URL for an object key.
    pub fn public_url(&self, key: &str) -> String {
        public_url(&self.public_base_url, key)
    }

    /// Upload a file to R2.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        let path = path.as_ref();
        if key.is_empty() || key.starts_with('/') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to {}", path.display(), key);
        Ok(())
    }

    /// Check connectivity to R2 by performing a head bucket operation.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("R2 connectivity check failed: {}", e)))?;
        Ok(())
    }
}

/// Join a base URL and object key with exactly one slash.
pub(crate) fn public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_from_account_id() {
        let config = R2Config::from_lookup(lookup_from(&[
            ("R2_ACCOUNT_ID", "acct"),
            ("R2_ACCESS_KEY_ID", "key"),
            ("R2_SECRET_ACCESS_KEY", "secret"),
            ("R2_BUCKET_NAME", "renders"),
            ("R2_PUBLIC_BASE_URL", "https://cdn.example.com/"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint_url, "https://acct.r2.cloudflarestorage.com");
        assert_eq!(config.region, "auto");
    }

    #[test]
    fn test_config_reports_missing_vars() {
        let missing = R2Config::from_lookup(lookup_from(&[("R2_ACCESS_KEY_ID", "key")]))
            .unwrap_err();

        assert!(missing.contains(&"R2_ACCOUNT_ID"));
        assert!(missing.contains(&"R2_BUCKET_NAME"));
        assert!(missing.contains(&"R2_PUBLIC_BASE_URL"));
        assert!(!missing.contains(&"R2_ACCESS_KEY_ID"));
    }

    #[test]
    fn test_public_url_strips_trailing_slash() {
        assert_eq!(
            public_url("https://cdn.example.com/", "renders/a.mp4"),
            "https://cdn.example.com/renders/a.mp4"
        );
        assert_eq!(
            public_url("https://cdn.example.com", "/renders/a.mp4"),
            "https://cdn.example.com/renders/a.mp4"
        );
    }
}
