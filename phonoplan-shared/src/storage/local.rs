/// Local development storage
///
/// Stands in for S3 when developing without object storage. URLs point at the
/// API's own `/storage` route and carry three query parameters:
///
/// ```text
/// {base_url}?key={key}&expires={unix_seconds}&signature={hex(HMAC-SHA256(secret, "{key}:{expires}"))}
/// ```
///
/// The route verifies the signature with [`LocalUrlSigner::verify`] and keeps
/// the bytes in a [`LocalObjectStore`] held in memory.
///
/// # Security
///
/// - Signatures are compared in constant time
/// - URLs expire after 300 seconds
/// - [`LocalProvider::new`] refuses to build outside the development environment
///
/// # Example
///
/// ```
/// use phonoplan_shared::storage::local::LocalUrlSigner;
///
/// let signer = LocalUrlSigner::new("test-secret-key-at-least-32-bytes-long");
/// let signature = signer.sign("org/o/a.webm", 2_000_000_000);
/// assert!(signer.verify("org/o/a.webm", 2_000_000_000, &signature, 1_900_000_000));
/// assert!(!signer.verify("org/o/b.webm", 2_000_000_000, &signature, 1_900_000_000));
/// ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::Sha256;

use super::{SignedDownload, SignedUpload, StorageError, StorageProvider};
use crate::config::Environment;
use crate::media::AudioMimeType;

type HmacSha256 = Hmac<Sha256>;

/// Lifetime of locally signed URLs
pub const LOCAL_URL_EXPIRATION_SECONDS: i64 = 300;

/// Signs and verifies local storage URLs
#[derive(Clone)]
pub struct LocalUrlSigner {
    secret: Arc<Vec<u8>>,
}

impl std::fmt::Debug for LocalUrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalUrlSigner").finish_non_exhaustive()
    }
}

impl LocalUrlSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: Arc::new(secret.as_bytes().to_vec()),
        }
    }

    fn mac(&self, key: &str, expires: i64) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(format!("{}:{}", key, expires).as_bytes());
        mac
    }

    /// Hex HMAC-SHA256 of `"{key}:{expires}"`
    pub fn sign(&self, key: &str, expires: i64) -> String {
        hex::encode(self.mac(key, expires).finalize().into_bytes())
    }

    /// Accepts iff `expires >= now` and the signature matches
    pub fn verify(&self, key: &str, expires: i64, signature: &str, now: i64) -> bool {
        if expires < now {
            return false;
        }

        let Ok(provided) = hex::decode(signature) else {
            return false;
        };

        self.mac(key, expires).verify_slice(&provided).is_ok()
    }
}

/// Storage provider backed by the API's `/storage` route
#[derive(Debug)]
pub struct LocalProvider {
    base_url: Url,
    signer: LocalUrlSigner,
}

impl LocalProvider {
    /// Builds the provider
    ///
    /// # Errors
    ///
    /// - `StorageError::LocalDriverDisabled` outside development
    /// - `StorageError::InvalidConfig` if `base_url` does not parse
    pub fn new(
        base_url: &str,
        signer: LocalUrlSigner,
        environment: Environment,
    ) -> Result<Self, StorageError> {
        if !environment.is_development() {
            return Err(StorageError::LocalDriverDisabled(environment));
        }

        let base_url = Url::parse(base_url)
            .map_err(|e| StorageError::InvalidConfig(format!("LOCAL_STORAGE_BASE_URL: {}", e)))?;

        Ok(Self { base_url, signer })
    }

    /// Builds a signed URL for `key` that expires at `expires` (unix seconds)
    pub fn signed_url(&self, key: &str, expires: i64) -> String {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("key", key)
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &self.signer.sign(key, expires));
        url.to_string()
    }

    fn expires_from_now(&self) -> i64 {
        chrono::Utc::now().timestamp() + LOCAL_URL_EXPIRATION_SECONDS
    }
}

#[async_trait]
impl StorageProvider for LocalProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn signed_upload_url(
        &self,
        key: &str,
        mime_type: AudioMimeType,
    ) -> Result<SignedUpload, StorageError> {
        let headers = HashMap::from([("Content-Type".to_string(), mime_type.as_str().to_string())]);

        Ok(SignedUpload {
            url: self.signed_url(key, self.expires_from_now()),
            headers: Some(headers),
        })
    }

    async fn signed_download_url(&self, key: &str) -> Result<SignedDownload, StorageError> {
        Ok(SignedDownload {
            url: self.signed_url(key, self.expires_from_now()),
        })
    }
}

/// An object held by the local store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub content_type: String,
}

/// In-memory object store behind the local `/storage` route
#[derive(Debug, Clone, Default)]
pub struct LocalObjectStore {
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
}

impl LocalObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores (or replaces) an object
    pub fn put(&self, key: &str, object: StoredObject) {
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects.insert(key.to_string(), object);
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every object
    pub fn clear(&self) {
        self.objects.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn query(url: &str) -> HashMap<String, String> {
        Url::parse(url).unwrap().query_pairs().into_owned().collect()
    }

    #[test]
    fn test_sign_is_hex_sha256() {
        let signer = LocalUrlSigner::new(SECRET);
        let signature = signer.sign("org/a/key.webm", 1_700_000_000);

        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(signature, signer.sign("org/a/key.webm", 1_700_000_000));
    }

    #[test]
    fn test_verify_accepts_valid_signature() {
        let signer = LocalUrlSigner::new(SECRET);
        let signature = signer.sign("k", 1000);

        assert!(signer.verify("k", 1000, &signature, 999));
        assert!(signer.verify("k", 1000, &signature, 1000));
    }

    #[test]
    fn test_verify_rejects_expired() {
        let signer = LocalUrlSigner::new(SECRET);
        let signature = signer.sign("k", 1000);

        assert!(!signer.verify("k", 1000, &signature, 1001));
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let signer = LocalUrlSigner::new(SECRET);
        let signature = signer.sign("k", 1000);

        assert!(!signer.verify("other", 1000, &signature, 0));
        assert!(!signer.verify("k", 2000, &signature, 0));
        assert!(!signer.verify("k", 1000, "not-hex", 0));
        assert!(!signer.verify("k", 1000, &signature[..10], 0));
        assert!(!LocalUrlSigner::new("another-secret-key-at-least-32-bytes").verify("k", 1000, &signature, 0));
    }

    #[test]
    fn test_provider_requires_development() {
        let signer = LocalUrlSigner::new(SECRET);

        assert!(LocalProvider::new("http://localhost:8080/storage", signer.clone(), Environment::Development).is_ok());
        assert!(matches!(
            LocalProvider::new("http://localhost:8080/storage", signer.clone(), Environment::Test),
            Err(StorageError::LocalDriverDisabled(Environment::Test))
        ));
        assert!(matches!(
            LocalProvider::new("not a url", signer, Environment::Development),
            Err(StorageError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_signed_urls_verify() {
        let signer = LocalUrlSigner::new(SECRET);
        let provider =
            LocalProvider::new("http://localhost:8080/storage", signer.clone(), Environment::Development).unwrap();
        let key = "org/o/students/s/recordings/1_abc.webm";

        let upload = provider.signed_upload_url(key, AudioMimeType::Webm).await.unwrap();
        assert!(upload.url.starts_with("http://localhost:8080/storage?"));
        assert_eq!(
            upload.headers.as_ref().and_then(|h| h.get("Content-Type")).map(String::as_str),
            Some("audio/webm")
        );

        let params = query(&upload.url);
        assert_eq!(params["key"], key);
        let expires: i64 = params["expires"].parse().unwrap();
        let now = chrono::Utc::now().timestamp();
        assert!(expires > now && expires <= now + LOCAL_URL_EXPIRATION_SECONDS);
        assert!(signer.verify(key, expires, &params["signature"], now));

        let download = provider.signed_download_url(key).await.unwrap();
        let params = query(&download.url);
        assert!(signer.verify(key, params["expires"].parse().unwrap(), &params["signature"], now));
    }

    #[test]
    fn test_object_store_put_get_clear() {
        let store = LocalObjectStore::new();
        assert!(store.is_empty());

        store.put(
            "k",
            StoredObject {
                bytes: Bytes::from_static(b"RIFF"),
                content_type: "audio/wav".to_string(),
            },
        );

        let object = store.get("k").unwrap();
        assert_eq!(object.bytes, Bytes::from_static(b"RIFF"));
        assert_eq!(object.content_type, "audio/wav");
        assert!(store.get("missing").is_none());

        let shared = store.clone();
        shared.clear();
        assert!(store.is_empty());
    }
}
