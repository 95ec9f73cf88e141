/// Storage access broker
///
/// The API never moves audio bytes through its own handlers in production.
/// Instead it hands out short-lived signed URLs that let the browser talk to
/// object storage directly. Two providers implement [`StorageProvider`]:
///
/// - [`s3::S3Provider`]: presigned S3 URLs (any S3-compatible service), valid 900 s
/// - [`local::LocalProvider`]: HMAC-signed URLs served by the API's own
///   `/storage` route, valid 300 s, **development only**
///
/// The provider is chosen once at startup by [`select_provider`] and shared as
/// `Arc<dyn StorageProvider>`.
///
/// # Example
///
/// ```no_run
/// use phonoplan_shared::media::AudioMimeType;
/// use phonoplan_shared::storage::StorageProvider;
///
/// # async fn example(storage: &dyn StorageProvider) -> Result<(), Box<dyn std::error::Error>> {
/// let upload = storage.signed_upload_url("org/o/students/s/recordings/1_a.webm", AudioMimeType::Webm).await?;
/// println!("PUT {}", upload.url);
/// # Ok(())
/// # }
/// ```

pub mod key;
pub mod local;
pub mod s3;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::Environment;
use crate::media::AudioMimeType;

use self::local::{LocalProvider, LocalUrlSigner};
use self::s3::{S3Config, S3Provider};

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The local provider was requested outside development
    #[error("Local storage driver is only available in development (current environment: {0})")]
    LocalDriverDisabled(Environment),

    /// Provider configuration is incomplete
    #[error("Storage configuration missing: {0}")]
    MissingConfig(String),

    /// Provider configuration is present but unusable
    #[error("Invalid storage configuration: {0}")]
    InvalidConfig(String),

    /// The provider failed to sign a URL
    #[error("Failed to sign storage URL: {0}")]
    Signing(String),
}

/// Signed upload target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedUpload {
    /// URL to `PUT` the object to
    pub url: String,

    /// Headers the client must send with the upload, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

/// Signed download target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedDownload {
    /// URL to `GET` the object from
    pub url: String,
}

/// Issues time-limited URLs scoped to one object key
///
/// Implementations do not check tenancy: callers must verify the key belongs
/// to the session's organization first.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &'static str;

    /// Signs an upload of `mime_type` content to `key`
    async fn signed_upload_url(
        &self,
        key: &str,
        mime_type: AudioMimeType,
    ) -> Result<SignedUpload, StorageError>;

    /// Signs a download of `key`
    async fn signed_download_url(&self, key: &str) -> Result<SignedDownload, StorageError>;
}

/// Which provider `STORAGE_DRIVER` asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageDriver {
    Local,
    S3,
}

impl FromStr for StorageDriver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(StorageDriver::Local),
            "s3" | "" => Ok(StorageDriver::S3),
            other => Err(format!("Unknown STORAGE_DRIVER value: {}", other)),
        }
    }
}

/// Settings needed to build any provider
#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub driver: StorageDriver,

    /// `None` when the S3 variables are incomplete
    pub s3: Option<S3Config>,

    /// Public URL of the API's `/storage` route
    pub local_base_url: String,
}

/// A selected provider, plus the signer when the local driver is active
///
/// The signer is needed to mount the `/storage` routes that verify local URLs.
pub struct SelectedStorage {
    pub provider: Arc<dyn StorageProvider>,
    pub local_signer: Option<LocalUrlSigner>,
}

/// Builds the storage provider for this process
///
/// - `STORAGE_DRIVER=local` selects the local provider.
/// - Otherwise S3 is used. If the S3 settings are incomplete, development
///   falls back to the local provider with a warning; other environments fail.
///
/// The local provider itself refuses to start outside development.
pub async fn select_provider(
    settings: &StorageSettings,
    environment: Environment,
    secret: &str,
) -> Result<SelectedStorage, StorageError> {
    let local = || -> Result<SelectedStorage, StorageError> {
        let signer = LocalUrlSigner::new(secret);
        let provider = LocalProvider::new(&settings.local_base_url, signer.clone(), environment)?;
        Ok(SelectedStorage {
            provider: Arc::new(provider),
            local_signer: Some(signer),
        })
    };

    match (settings.driver, &settings.s3) {
        (StorageDriver::Local, _) => local(),
        (StorageDriver::S3, Some(s3_config)) => {
            let provider = S3Provider::new(s3_config.clone()).await;
            Ok(SelectedStorage {
                provider: Arc::new(provider),
                local_signer: None,
            })
        }
        (StorageDriver::S3, None) if environment.is_development() => {
            tracing::warn!("S3 configuration incomplete, falling back to local storage driver");
            local()
        }
        (StorageDriver::S3, None) => Err(StorageError::MissingConfig(
            "S3_BUCKET, S3_REGION and access credentials are required".to_string(),
        )),
    }
}
