// Blob store backends for mirrored media.
//
// Two implementations sit behind `BlobStore`:
//   LocalBlobStore: a directory tree, `{root}/{bucket}/{path}`
//   HttpObjectStore: the hosted storage REST API, authenticated with the
//                     service key
//
// Writes are upserts: putting the same path twice leaves one object holding
// the latest bytes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::asset::{AssetType, SizeClass};

/// Content type of every encoded variant.
pub const VARIANT_CONTENT_TYPE: &str = "image/webp";

/// Page size used when listing the hosted store.
const LIST_PAGE_SIZE: usize = 1000;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Object names directly under `prefix` in `bucket` (`""` is the bucket
    /// root). Folders are not returned. `search` keeps names containing it.
    async fn list(&self, bucket: &str, prefix: &str, search: Option<&str>) -> Result<Vec<String>>;

    /// Download one object.
    async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>>;

    /// Upload one object, replacing any existing object at `path`.
    async fn put(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Public URL of an object. Does not check that it exists.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Write one encoded variant to `{bucket}/{size}/{entity_id}.webp` and return
/// the full object path.
pub async fn write_variant(
    store: &dyn BlobStore,
    asset_type: AssetType,
    entity_id: i64,
    size: SizeClass,
    bytes: Vec<u8>,
) -> Result<String> {
    let key = asset_type.variant_key(size, entity_id);
    store
        .put(asset_type.bucket(), &key, bytes, VARIANT_CONTENT_TYPE)
        .await
        .with_context(|| format!("Failed to upload {}/{key}", asset_type.bucket()))?;
    Ok(asset_type.variant_path(size, entity_id))
}

/// Split a full object path (`teams/md/33.webp`) into bucket and key.
pub fn split_object_path(object_path: &str) -> Option<(&str, &str)> {
    object_path
        .split_once('/')
        .filter(|(bucket, key)| !bucket.is_empty() && !key.is_empty())
}

// --- Local directory tree ---

pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    /// Store objects under `root`. Public URLs are `{public_base_url}/{bucket}/{path}`.
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, path: &str) -> Result<PathBuf> {
        let mut full = self.root.join(bucket);
        for part in path.split('/').filter(|p| !p.is_empty()) {
            if part == ".." || part == "." {
                anyhow::bail!("Invalid object path: {bucket}/{path}");
            }
            full.push(part);
        }
        Ok(full)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn list(&self, bucket: &str, prefix: &str, search: Option<&str>) -> Result<Vec<String>> {
        let dir = self.object_path(bucket, prefix)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to list {}", dir.display()));
            }
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if search.map_or(true, |s| name.contains(s)) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        let full = self.object_path(bucket, path)?;
        tokio::fs::read(&full)
            .await
            .with_context(|| format!("Failed to read {}", full.display()))
    }

    async fn put(&self, bucket: &str, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<()> {
        let full = self.object_path(bucket, path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&full, bytes)
            .await
            .with_context(|| format!("Failed to write {}", full.display()))?;
        debug!(path = %full.display(), "Stored object");
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{bucket}/{path}", self.public_base_url)
    }
}

// --- Hosted storage REST API ---

/// One entry of a storage list response. Folders come back with a null id.
#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
    #[serde(default)]
    id: Option<String>,
}

pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl HttpObjectStore {
    /// `base_url` is the project URL; requests go to `{base_url}/storage/v1/...`.
    pub fn new(base_url: &str, service_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pitchside/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        })
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/{bucket}/{path}", self.base_url)
    }
}

#[async_trait]
impl BlobStore for HttpObjectStore {
    async fn list(&self, bucket: &str, prefix: &str, search: Option<&str>) -> Result<Vec<String>> {
        let url = format!("{}/storage/v1/object/list/{bucket}", self.base_url);
        let mut names = Vec::new();
        let mut offset = 0;

        loop {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.service_key)
                .json(&serde_json::json!({
                    "prefix": prefix,
                    "search": search.unwrap_or(""),
                    "limit": LIST_PAGE_SIZE,
                    "offset": offset,
                    "sortBy": { "column": "name", "order": "asc" },
                }))
                .send()
                .await
                .with_context(|| format!("Storage list request failed for {bucket}/{prefix}"))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("Storage list {bucket}/{prefix} returned {status}: {body}");
            }

            let page: Vec<ListedObject> = response
                .json()
                .await
                .context("Failed to parse storage list response")?;
            let page_len = page.len();
            names.extend(page.into_iter().filter(|o| o.id.is_some()).map(|o| o.name));

            if page_len < LIST_PAGE_SIZE {
                break;
            }
            offset += page_len;
        }

        debug!(bucket, prefix, count = names.len(), "Listed storage objects");
        Ok(names)
    }

    async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.object_url(bucket, path))
            .bearer_auth(&self.service_key)
            .send()
            .await
            .with_context(|| format!("Storage download failed for {bucket}/{path}"))?;

        if !response.status().is_success() {
            let status = response.status();
            anyhow::bail!("Storage download {bucket}/{path} returned {status}");
        }

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read {bucket}/{path}"))?;
        Ok(bytes.to_vec())
    }

    async fn put(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let response = self
            .client
            .post(self.object_url(bucket, path))
            .bearer_auth(&self.service_key)
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .with_context(|| format!("Storage upload failed for {bucket}/{path}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Storage upload {bucket}/{path} returned {status}: {body}");
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{bucket}/{path}", self.base_url)
    }
}
