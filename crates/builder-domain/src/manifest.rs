//! Build manifest (§3 `Manifest`): written once to the artifact store
//! during a successful build, enumerating every artifact and its hash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestPage {
    pub path: String,
    pub artifact_key: String,
    pub title: String,
    pub hash: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ManifestAsset {
    pub key: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub site_id: Uuid,
    pub tenant_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub pages: Vec<ManifestPage>,
    #[serde(default)]
    pub assets: Vec<ManifestAsset>,
    pub total_size: u64,
    pub checksum: String,
}

/// `checksum = SHA-256(concat(p.hash for p in pages in order))` (§3).
pub fn compute_checksum(pages: &[ManifestPage]) -> String {
    let mut hasher = Sha256::new();
    for page in pages {
        hasher.update(page.hash.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Minimal local hex encoder so the manifest crate doesn't need to pull in
/// the `hex` crate for one call site; kept private to this module.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

impl Manifest {
    pub fn new(
        version: u32,
        site_id: Uuid,
        tenant_id: Uuid,
        pages: Vec<ManifestPage>,
        assets: Vec<ManifestAsset>,
    ) -> Self {
        let checksum = compute_checksum(&pages);
        let total_size = pages.iter().map(|p| p.size).sum::<u64>()
            + assets.iter().map(|a| a.size).sum::<u64>();
        Self {
            version,
            site_id,
            tenant_id,
            generated_at: Utc::now(),
            pages,
            assets,
            total_size,
            checksum,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_order_sensitive() {
        let a = ManifestPage {
            path: "/".into(),
            artifact_key: "index.html".into(),
            title: "Home".into(),
            hash: "aaa".into(),
            size: 10,
        };
        let b = ManifestPage {
            path: "/about".into(),
            artifact_key: "about/index.html".into(),
            title: "About".into(),
            hash: "bbb".into(),
            size: 20,
        };
        let forward = compute_checksum(&[a.clone(), b.clone()]);
        let backward = compute_checksum(&[b, a]);
        assert_ne!(forward, backward);
    }

    #[test]
    fn checksum_is_deterministic() {
        let page = ManifestPage {
            path: "/".into(),
            artifact_key: "index.html".into(),
            title: "Home".into(),
            hash: "aaa".into(),
            size: 10,
        };
        assert_eq!(
            compute_checksum(&[page.clone()]),
            compute_checksum(&[page])
        );
    }

    #[test]
    fn sha256_hex_is_stable() {
        assert_eq!(sha256_hex(b"hello"), sha256_hex(b"hello"));
        assert_ne!(sha256_hex(b"hello"), sha256_hex(b"world"));
    }
}
