//! Content-addressed file storage over S3/MinIO
//!
//! Files are keyed by the hex SHA-256 of their content. The worker uses this
//! to materialize task inputs, judge files and scripts into the sandbox-visible
//! roots before evaluation.

use std::path::Path;

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use sha2::{Digest, Sha256};
use tracing::info;

#[derive(Clone)]
pub struct FileStorage {
    client: Client,
    bucket: String,
}

impl FileStorage {
    /// Create a new storage client from environment variables
    pub async fn from_env() -> Result<Self> {
        let endpoint = std::env::var("MINIO_ENDPOINT").unwrap_or_else(|_| "localhost".into());
        let port = std::env::var("MINIO_PORT").unwrap_or_else(|_| "9000".into());
        let access_key = std::env::var("MINIO_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".into());
        let secret_key = std::env::var("MINIO_SECRET_KEY").unwrap_or_else(|_| "minioadmin".into());
        let bucket = std::env::var("MINIO_BUCKET").unwrap_or_else(|_| "arbiter-storage".into());
        let use_ssl = std::env::var("MINIO_USE_SSL")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let protocol = if use_ssl { "https" } else { "http" };
        let endpoint_url = format!("{}://{}:{}", protocol, endpoint, port);

        info!("Connecting to file storage at {}", endpoint_url);

        let credentials = Credentials::new(access_key, secret_key, None, None, "minio");

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(&endpoint_url)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let client = Client::from_conf(config);

        Ok(Self { client, bucket })
    }

    /// Upload a blob under its content hash
    #[allow(dead_code)]
    pub async fn upload_from_buffer(&self, hash: &str, bytes: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(hash)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .with_context(|| format!("Failed to upload {}", hash))?;
        Ok(())
    }

    /// Download a blob by content hash
    pub async fn download_to_buffer(&self, hash: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(hash)
            .send()
            .await
            .with_context(|| format!("Failed to download {}", hash))?;

        let data = response.body.collect().await?;
        Ok(data.into_bytes().to_vec())
    }

    /// Download a blob by content hash into a local file
    pub async fn download_to_file(&self, hash: &str, dest: &Path) -> Result<()> {
        let bytes = self.download_to_buffer(hash).await?;
        tokio::fs::write(dest, bytes)
            .await
            .with_context(|| format!("Failed to write {} to {:?}", hash, dest))?;
        Ok(())
    }
}

/// Hex SHA-256 of a blob, the storage addressing scheme.
#[allow(dead_code)]
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_hex_sha256() {
        let hash = content_hash(b"hello world");
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_content_hash_distinguishes_content() {
        assert_ne!(content_hash(b"a"), content_hash(b"b"));
    }
}
