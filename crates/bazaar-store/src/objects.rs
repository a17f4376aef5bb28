use std::path::PathBuf;

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

use crate::StoreError;

/// 5 MB upload limit for product images
const MAX_MEDIA_SIZE: usize = 5 * 1024 * 1024;

/// Object storage for product media. Blobs land under a path scoped to the
/// uploading user and named by content hash, so re-uploading the same
/// image is a no-op and the returned URL is stable.
pub struct MediaStore {
    dir: PathBuf,
    base_url: String,
}

impl MediaStore {
    pub async fn new(dir: PathBuf, base_url: impl Into<String>) -> Result<Self, StoreError> {
        fs::create_dir_all(&dir).await?;
        info!("Media storage directory: {}", dir.display());
        Ok(Self {
            dir,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Store a blob under `{owner}/{sha256-prefix}.{ext}` and return its
    /// public URL.
    pub async fn upload(
        &self,
        owner_id: Uuid,
        ext: &str,
        bytes: Bytes,
    ) -> Result<String, StoreError> {
        if bytes.is_empty() {
            return Err(StoreError::Invalid("empty upload"));
        }
        if bytes.len() > MAX_MEDIA_SIZE {
            return Err(StoreError::Invalid("upload too large"));
        }
        // Extension feeds into a filesystem path; keep it boring.
        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(StoreError::Invalid("file extension"));
        }

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let rel = format!("{}/{}.{}", owner_id, &digest[..16], ext.to_ascii_lowercase());
        let path = self.dir.join(&rel);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&path).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;

        Ok(self.public_url(&rel))
    }

    pub fn public_url(&self, rel: &str) -> String {
        format!("{}/{}", self.base_url, rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn media() -> MediaStore {
        let dir = std::env::temp_dir().join(format!("bazaar-media-{}", Uuid::new_v4()));
        MediaStore::new(dir, "https://media.localbazaar.test")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn upload_is_content_addressed() {
        let media = media().await;
        let owner = Uuid::new_v4();

        let url1 = media
            .upload(owner, "jpg", Bytes::from_static(b"image-bytes"))
            .await
            .unwrap();
        let url2 = media
            .upload(owner, "jpg", Bytes::from_static(b"image-bytes"))
            .await
            .unwrap();
        assert_eq!(url1, url2);
        assert!(url1.starts_with("https://media.localbazaar.test/"));
        assert!(url1.contains(&owner.to_string()));

        let url3 = media
            .upload(owner, "jpg", Bytes::from_static(b"other-bytes"))
            .await
            .unwrap();
        assert_ne!(url1, url3);
    }

    #[tokio::test]
    async fn hostile_extension_rejected() {
        let media = media().await;
        let owner = Uuid::new_v4();

        for ext in ["", "../../etc", "jp g"] {
            let err = media
                .upload(owner, ext, Bytes::from_static(b"x"))
                .await
                .unwrap_err();
            assert!(matches!(err, StoreError::Invalid("file extension")));
        }

        assert!(matches!(
            media.upload(owner, "jpg", Bytes::new()).await.unwrap_err(),
            StoreError::Invalid("empty upload")
        ));
    }
}
