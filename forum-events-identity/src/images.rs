//! Avatar image storage.
//!
//! Images are stored under a key derived from the SHA-256 of their source
//! URI, so hydrating the same avatar twice finds the stored object and skips
//! the fetch. NFT-derived images live under a separate `nft/` prefix.
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use forum_events_shared::types::Image;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{FetchProxy, FetchedContent, ResolveError};

const AVATAR_PREFIX: &str = "avatars";
const CONTENT_TYPE_SUFFIX: &str = ".content-type";

#[async_trait]
pub trait ImagePipeline: Send + Sync {
    /// Describes the stored image for `uri`, if one exists.
    async fn cached_avatar(
        &self,
        uri: &str,
        is_token: bool,
    ) -> Result<Option<Image>, ResolveError>;

    /// Stores already fetched content as the image for `uri`.
    async fn store_avatar(
        &self,
        uri: &str,
        is_token: bool,
        content: FetchedContent,
    ) -> Result<Image, ResolveError>;

    /// Returns the stored image for `uri`, fetching and storing it on a miss.
    async fn upload_avatar(&self, uri: &str, is_token: bool) -> Result<Image, ResolveError>;
}

/// Keyed blob storage for avatar images.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns the stored content type if an object exists at `key`.
    async fn head(&self, key: &str) -> Result<Option<String>, ResolveError>;

    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), ResolveError>;

    fn public_url(&self, key: &str) -> String;
}

/// Storage key for an avatar sourced from `uri`.
pub fn avatar_key(uri: &str, is_token: bool) -> String {
    let digest = hex::encode(Sha256::digest(uri.as_bytes()));
    if is_token {
        format!("{AVATAR_PREFIX}/nft/{digest}")
    } else {
        format!("{AVATAR_PREFIX}/{digest}")
    }
}

/// Detects the image type from magic bytes.
pub fn sniff_image_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some("image/png");
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }

    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]);
    let head = head.trim_start_matches('\u{feff}').trim_start();
    if head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg")) {
        return Some("image/svg+xml");
    }
    None
}

/// [`ImagePipeline`] that fetches through a [`FetchProxy`] and stores into an
/// [`ObjectStore`].
///
/// Images are stored as fetched. The content type is taken from the magic
/// bytes when recognised, otherwise from the declared `image/*` type;
/// anything else is rejected.
pub struct AvatarImagePipeline {
    fetcher: Arc<dyn FetchProxy>,
    store: Arc<dyn ObjectStore>,
}

impl AvatarImagePipeline {
    pub fn new(fetcher: Arc<dyn FetchProxy>, store: Arc<dyn ObjectStore>) -> Self {
        Self { fetcher, store }
    }

    fn describe(&self, key: String, uri: &str, original: String, formatted: String) -> Image {
        Image {
            formatted_url: self.store.public_url(&key),
            file_name: key,
            original_url: uri.to_string(),
            original_content_type: original,
            formatted_content_type: formatted,
        }
    }
}

#[async_trait]
impl ImagePipeline for AvatarImagePipeline {
    async fn cached_avatar(
        &self,
        uri: &str,
        is_token: bool,
    ) -> Result<Option<Image>, ResolveError> {
        let key = avatar_key(uri, is_token);
        let Some(content_type) = self.store.head(&key).await? else {
            return Ok(None);
        };

        debug!(uri, key = %key, "Avatar already stored");
        Ok(Some(self.describe(key, uri, content_type.clone(), content_type)))
    }

    async fn store_avatar(
        &self,
        uri: &str,
        is_token: bool,
        content: FetchedContent,
    ) -> Result<Image, ResolveError> {
        let key = avatar_key(uri, is_token);
        let declared = content.media_type();

        let formatted = match (sniff_image_type(&content.bytes), declared.as_deref()) {
            (Some(sniffed), _) => sniffed.to_string(),
            (None, Some(declared)) if declared.starts_with("image/") => declared.to_string(),
            _ => return Err(ResolveError::NotAnImage(uri.to_string())),
        };

        self.store.put(&key, &content.bytes, &formatted).await?;
        debug!(uri, key = %key, content_type = %formatted, "Stored avatar");

        let original = declared.unwrap_or_else(|| formatted.clone());
        Ok(self.describe(key, uri, original, formatted))
    }

    async fn upload_avatar(&self, uri: &str, is_token: bool) -> Result<Image, ResolveError> {
        if let Some(image) = self.cached_avatar(uri, is_token).await? {
            return Ok(image);
        }

        let content = self.fetcher.fetch(uri).await?;
        self.store_avatar(uri, is_token, content).await
    }
}

/// [`ObjectStore`] on the local filesystem, served under a public base URL.
///
/// The content type of each object is kept in a sibling file.
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn content_type_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}{CONTENT_TYPE_SUFFIX}"))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn head(&self, key: &str) -> Result<Option<String>, ResolveError> {
        match tokio::fs::read_to_string(self.content_type_path(key)).await {
            Ok(content_type) => {
                if tokio::fs::try_exists(self.object_path(key)).await? {
                    Ok(Some(content_type.trim().to_string()))
                } else {
                    Ok(None)
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), ResolveError> {
        let path = self.object_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        tokio::fs::write(self.content_type_path(key), content_type).await?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        let base = self.public_base_url.trim_end_matches('/');
        let key = key.strip_prefix(&format!("{AVATAR_PREFIX}/")).unwrap_or(key);
        format!("{base}/{key}")
    }
}

/// In-memory [`ObjectStore`].
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &str) -> Option<(Vec<u8>, String)> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn head(&self, key: &str) -> Result<Option<String>, ResolveError> {
        Ok(self.get(key).map(|(_, content_type)| content_type))
    }

    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), ResolveError> {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), (bytes.to_vec(), content_type.to_string()));
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("memory://{key}")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    struct MockFetcher {
        content: FetchedContent,
        calls: AtomicUsize,
    }

    impl MockFetcher {
        fn new(bytes: &[u8], content_type: Option<&str>) -> Self {
            Self {
                content: FetchedContent {
                    bytes: bytes.to_vec(),
                    content_type: content_type.map(str::to_string),
                },
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl FetchProxy for MockFetcher {
        async fn fetch(&self, _uri: &str) -> Result<FetchedContent, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.content.clone())
        }
    }

    #[test]
    fn test_avatar_key_prefixes() {
        let plain = avatar_key("https://example.com/a.png", false);
        let token = avatar_key("https://example.com/a.png", true);

        assert!(plain.starts_with("avatars/"));
        assert!(!plain.starts_with("avatars/nft/"));
        assert!(token.starts_with("avatars/nft/"));
        assert_eq!(plain.len(), "avatars/".len() + 64);
        assert_eq!(plain, avatar_key("https://example.com/a.png", false));
    }

    #[test]
    fn test_sniff_image_type() {
        assert_eq!(sniff_image_type(PNG), Some("image/png"));
        assert_eq!(sniff_image_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_image_type(b"GIF89a...."), Some("image/gif"));
        assert_eq!(sniff_image_type(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(
            sniff_image_type(b"<?xml version=\"1.0\"?>\n<svg xmlns=\"http://www.w3.org/2000/svg\"/>"),
            Some("image/svg+xml")
        );
        assert_eq!(sniff_image_type(b"<html></html>"), None);
        assert_eq!(sniff_image_type(b"{}"), None);
    }

    #[tokio::test]
    async fn test_upload_stores_then_hits_cache() {
        let fetcher = Arc::new(MockFetcher::new(PNG, Some("image/png")));
        let store = Arc::new(MemoryObjectStore::new());
        let pipeline = AvatarImagePipeline::new(fetcher.clone(), store.clone());

        let first = pipeline
            .upload_avatar("ipfs://QmAvatar", false)
            .await
            .unwrap();
        let second = pipeline
            .upload_avatar("ipfs://QmAvatar", false)
            .await
            .unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(first, second);
        assert_eq!(first.original_url, "ipfs://QmAvatar");
        assert_eq!(first.formatted_content_type, "image/png");
        assert_eq!(first.formatted_url, format!("memory://{}", first.file_name));
    }

    #[tokio::test]
    async fn test_store_avatar_then_cached_without_fetching() {
        let fetcher = Arc::new(MockFetcher::new(PNG, None));
        let store = Arc::new(MemoryObjectStore::new());
        let pipeline = AvatarImagePipeline::new(fetcher.clone(), store.clone());
        let uri = "https://example.com/a.png";

        assert_eq!(pipeline.cached_avatar(uri, false).await.unwrap(), None);

        let content = FetchedContent {
            bytes: PNG.to_vec(),
            content_type: Some("application/octet-stream".to_string()),
        };
        let stored = pipeline.store_avatar(uri, false, content).await.unwrap();
        let cached = pipeline.cached_avatar(uri, false).await.unwrap();

        assert_eq!(stored.formatted_content_type, "image/png");
        assert_eq!(cached.map(|image| image.file_name), Some(stored.file_name));
        assert_eq!(pipeline.cached_avatar(uri, true).await.unwrap(), None);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upload_token_avatar_uses_nft_prefix() {
        let fetcher = Arc::new(MockFetcher::new(PNG, None));
        let store = Arc::new(MemoryObjectStore::new());
        let pipeline = AvatarImagePipeline::new(fetcher, store);

        let image = pipeline
            .upload_avatar("https://nft.example.com/1.png", true)
            .await
            .unwrap();

        assert!(image.file_name.starts_with("avatars/nft/"));
        assert_eq!(image.original_content_type, "image/png");
    }

    #[tokio::test]
    async fn test_upload_trusts_declared_image_type() {
        let fetcher = Arc::new(MockFetcher::new(b"\0\0\0 ftypavif", Some("image/avif")));
        let store = Arc::new(MemoryObjectStore::new());
        let pipeline = AvatarImagePipeline::new(fetcher, store);

        let image = pipeline
            .upload_avatar("https://example.com/a.avif", false)
            .await
            .unwrap();

        assert_eq!(image.formatted_content_type, "image/avif");
    }

    #[tokio::test]
    async fn test_upload_rejects_non_images() {
        let fetcher = Arc::new(MockFetcher::new(b"<html></html>", Some("text/html")));
        let store = Arc::new(MemoryObjectStore::new());
        let pipeline = AvatarImagePipeline::new(fetcher, store.clone());

        let result = pipeline.upload_avatar("https://example.com/", false).await;

        assert!(matches!(result, Err(ResolveError::NotAnImage(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_local_object_store_round_trip() {
        let root = std::env::temp_dir().join(format!("avatars-{}", uuid::Uuid::new_v4()));
        let store = LocalObjectStore::new(&root, "http://localhost:8080/avatars/");
        let key = avatar_key("https://example.com/a.png", true);

        assert_eq!(store.head(&key).await.unwrap(), None);

        store.put(&key, PNG, "image/png").await.unwrap();

        assert_eq!(store.head(&key).await.unwrap().as_deref(), Some("image/png"));
        assert_eq!(tokio::fs::read(root.join(&key)).await.unwrap(), PNG);
        assert_eq!(
            store.public_url(&key),
            format!("http://localhost:8080/avatars/{}", key.trim_start_matches("avatars/"))
        );

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}
