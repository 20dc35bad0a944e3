use crate::common::{GateError, Result};
use crate::core::validation::sanitize_external_id;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Storage for probe images nobody matched, shared through expiring URLs.
pub trait ArtifactStore: Send + Sync {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;
    fn presign(&self, key: &str, ttl: Duration) -> Result<String>;
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UrlError {
    #[error("malformed artifact URL")]
    Malformed,

    #[error("artifact URL expired")]
    Expired,

    #[error("artifact URL signature mismatch")]
    BadSignature,
}

/// Signs `bucket/key` together with an absolute expiry.
#[derive(Clone)]
pub struct UrlSigner {
    key: Vec<u8>,
}

impl UrlSigner {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    pub fn random() -> Self {
        let mut key = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        Self { key }
    }

    fn mac(&self, resource: &str, expires: i64) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| GateError::Other(anyhow::anyhow!("Invalid signing key: {}", e)))?;
        mac.update(resource.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    pub fn sign(&self, resource: &str, expires: i64) -> Result<String> {
        Ok(hex::encode(self.mac(resource, expires)?.finalize().into_bytes()))
    }

    pub fn verify(&self, resource: &str, expires: i64, signature: &str) -> bool {
        match (hex::decode(signature).ok(), self.mac(resource, expires)) {
            (Some(bytes), Ok(mac)) => mac.verify_slice(&bytes).is_ok(),
            _ => false,
        }
    }
}

/// Artifacts as files under `<root>/<bucket>/`.
pub struct FileArtifactStore {
    bucket: String,
    bucket_dir: PathBuf,
    url_base: String,
    signer: UrlSigner,
}

impl FileArtifactStore {
    pub fn new(root: PathBuf, bucket: &str, url_base: &str, signer: UrlSigner) -> Result<Self> {
        let bucket_dir = root.join(bucket);
        fs::create_dir_all(&bucket_dir)?;

        Ok(Self {
            bucket: bucket.to_string(),
            bucket_dir,
            url_base: url_base.trim_end_matches('/').to_string(),
            signer,
        })
    }

    fn artifact_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.starts_with('.') || sanitize_external_id(key) != key {
            return Err(GateError::Storage(format!("Invalid artifact key: {:?}", key)));
        }
        Ok(self.bucket_dir.join(key))
    }

    fn resource(&self, key: &str) -> String {
        format!("{}/{}", self.bucket, key)
    }

    /// Checks a URL produced by `presign` at `now` (unix seconds) and returns the artifact path.
    pub fn resolve(&self, url: &str, now: i64) -> std::result::Result<PathBuf, UrlError> {
        let prefix = format!("{}/{}/", self.url_base, self.bucket);
        let rest = url.strip_prefix(&prefix).ok_or(UrlError::Malformed)?;
        let (key, query) = rest.split_once('?').ok_or(UrlError::Malformed)?;

        let mut expires = None;
        let mut signature = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("expires", v)) => expires = v.parse::<i64>().ok(),
                Some(("signature", v)) => signature = Some(v),
                _ => {}
            }
        }
        let (expires, signature) = match (expires, signature) {
            (Some(e), Some(s)) => (e, s),
            _ => return Err(UrlError::Malformed),
        };

        if !self.signer.verify(&self.resource(key), expires, signature) {
            return Err(UrlError::BadSignature);
        }
        if now >= expires {
            return Err(UrlError::Expired);
        }

        self.artifact_path(key).map_err(|_| UrlError::Malformed)
    }
}

impl ArtifactStore for FileArtifactStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.artifact_path(key)?;
        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        file.write_all(bytes)?;
        tracing::debug!("Stored artifact {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    fn presign(&self, key: &str, ttl: Duration) -> Result<String> {
        self.artifact_path(key)?;
        let expires = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
        let signature = self.signer.sign(&self.resource(key), expires)?;
        Ok(format!(
            "{}/{}/{}?expires={}&signature={}",
            self.url_base, self.bucket, key, expires, signature
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> FileArtifactStore {
        FileArtifactStore::new(
            tmp.path().to_path_buf(),
            "unknown-faces",
            "https://gate.example/artifacts/",
            UrlSigner::new(b"test-key".to_vec()),
        )
        .unwrap()
    }

    #[test]
    fn presigned_url_resolves_until_expiry() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.put("unknown_1.jpg", b"jpeg").unwrap();

        let url = store.presign("unknown_1.jpg", Duration::from_secs(3600)).unwrap();
        assert!(url.starts_with("https://gate.example/artifacts/unknown-faces/unknown_1.jpg?expires="));

        let now = chrono::Utc::now().timestamp();
        let path = store.resolve(&url, now).unwrap();
        assert_eq!(fs::read(path).unwrap(), b"jpeg");

        assert_eq!(store.resolve(&url, now + 3601), Err(UrlError::Expired));
    }

    #[test]
    fn tampered_url_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let url = store.presign("unknown_1.jpg", Duration::from_secs(60)).unwrap();
        let now = chrono::Utc::now().timestamp();

        let other_key = url.replace("unknown_1.jpg", "unknown_2.jpg");
        assert_eq!(store.resolve(&other_key, now), Err(UrlError::BadSignature));

        assert_eq!(store.resolve("https://elsewhere/x", now), Err(UrlError::Malformed));
    }

    #[test]
    fn artifacts_are_never_overwritten() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.put("unknown_1.jpg", b"first").unwrap();
        assert!(store.put("unknown_1.jpg", b"second").is_err());
        assert!(store.put("../escape.jpg", b"x").is_err());
    }

    #[test]
    fn signature_is_lowercase_hex_of_the_mac() {
        let signer = UrlSigner::new(b"test-key".to_vec());
        let signature = signer.sign("unknown-faces/unknown_1.jpg", 1_700_000_000).unwrap();

        assert_eq!(signature.len(), 64);
        assert_eq!(hex::decode(&signature).unwrap().len(), 32);
        assert!(signer.verify("unknown-faces/unknown_1.jpg", 1_700_000_000, &signature));
        assert!(!signer.verify("unknown-faces/unknown_1.jpg", 1_700_000_000, "zz"));
        assert!(!signer.verify("unknown-faces/unknown_1.jpg", 1_700_000_000, &signature[1..]));
    }
}
