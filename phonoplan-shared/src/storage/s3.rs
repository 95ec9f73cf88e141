/// S3-compatible storage provider
///
/// Delegates URL signing to S3 presigned requests. Works against AWS S3 or any
/// S3-compatible service: when `S3_ENDPOINT` is set the client switches to
/// path-style addressing.
///
/// # Configuration
///
/// | variable | fallback |
/// |---|---|
/// | `S3_BUCKET` | required |
/// | `S3_REGION` | required |
/// | `S3_ENDPOINT` | AWS default endpoint |
/// | `S3_ACCESS_KEY_ID` | `AWS_ACCESS_KEY_ID` |
/// | `S3_SECRET_ACCESS_KEY` | `AWS_SECRET_ACCESS_KEY` |

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;

use super::{SignedDownload, SignedUpload, StorageError, StorageProvider};
use crate::media::AudioMimeType;

/// Lifetime of presigned URLs
pub const S3_URL_EXPIRATION: Duration = Duration::from_secs(900);

/// S3 connection settings
#[derive(Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl S3Config {
    /// Reads the S3 variables
    ///
    /// # Errors
    ///
    /// Returns `StorageError::MissingConfig` naming the first missing variable
    pub fn from_env() -> Result<Self, StorageError> {
        fn get_env(keys: &[&str]) -> Result<String, StorageError> {
            keys.iter()
                .find_map(|key| env::var(key).ok().filter(|v| !v.trim().is_empty()))
                .ok_or_else(|| StorageError::MissingConfig(format!("{} is not set", keys.join(" or "))))
        }

        Ok(Self {
            bucket: get_env(&["S3_BUCKET"])?,
            region: get_env(&["S3_REGION"])?,
            endpoint: env::var("S3_ENDPOINT").ok().filter(|v| !v.trim().is_empty()),
            access_key_id: get_env(&["S3_ACCESS_KEY_ID", "AWS_ACCESS_KEY_ID"])?,
            secret_access_key: get_env(&["S3_SECRET_ACCESS_KEY", "AWS_SECRET_ACCESS_KEY"])?,
        })
    }
}

/// Presigned-URL provider for S3-compatible storage
#[derive(Clone)]
pub struct S3Provider {
    client: Client,
    bucket: String,
}

impl S3Provider {
    pub async fn new(config: S3Config) -> Self {
        let credentials = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None,
            None,
            "phonoplan",
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials);

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let aws_config = loader.load().await;

        let client = Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(config.endpoint.is_some())
                .build(),
        );

        Self {
            client,
            bucket: config.bucket,
        }
    }

    fn presigning_config() -> Result<PresigningConfig, StorageError> {
        PresigningConfig::expires_in(S3_URL_EXPIRATION).map_err(|e| StorageError::Signing(e.to_string()))
    }
}

#[async_trait]
impl StorageProvider for S3Provider {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn signed_upload_url(
        &self,
        key: &str,
        mime_type: AudioMimeType,
    ) -> Result<SignedUpload, StorageError> {
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(mime_type.as_str())
            .presigned(Self::presigning_config()?)
            .await
            .map_err(|e| StorageError::Signing(aws_sdk_s3::error::DisplayErrorContext(e).to_string()))?;

        let headers: HashMap<String, String> = request
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        Ok(SignedUpload {
            url: request.uri().to_string(),
            headers: (!headers.is_empty()).then_some(headers),
        })
    }

    async fn signed_download_url(&self, key: &str) -> Result<SignedDownload, StorageError> {
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(Self::presigning_config()?)
            .await
            .map_err(|e| StorageError::Signing(aws_sdk_s3::error::DisplayErrorContext(e).to_string()))?;

        Ok(SignedDownload {
            url: request.uri().to_string(),
        })
    }
}
