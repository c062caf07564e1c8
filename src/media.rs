//! Media objects: image sniffing, content-addressed keys, and the object store.
//!
//! Objects are addressed by a key derived from the SHA-256 of their bytes, so
//! re-uploading identical content is a no-op and a changed image always gets
//! a fresh key.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),
}

/// Blob storage for avatars and product media.
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key`. Idempotent: an existing key is left alone.
    fn upload(&self, key: &str, bytes: &[u8]) -> Result<(), MediaError>;

    /// Remove `key`. A missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), MediaError>;

    fn exists(&self, key: &str) -> Result<bool, MediaError>;
}

/// Object store rooted in a local directory.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key onto a path under the root, rejecting anything that could
    /// escape it.
    fn path_for(&self, key: &str) -> Result<PathBuf, MediaError> {
        let rel = Path::new(key);
        if key.is_empty()
            || !rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(MediaError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

impl ObjectStore for FsObjectStore {
    fn upload(&self, key: &str, bytes: &[u8]) -> Result<(), MediaError> {
        let path = self.path_for(key)?;
        if path.exists() {
            return Ok(());
        }
        let dir = path
            .parent()
            .ok_or_else(|| MediaError::InvalidKey(key.to_string()))?;
        std::fs::create_dir_all(dir)?;

        // Write to a sibling temp file, then rename into place.
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| MediaError::Io(e.error))?;
        log::debug!("Stored object {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), MediaError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, key: &str) -> Result<bool, MediaError> {
        Ok(self.path_for(key)?.exists())
    }
}

/// A file received with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Image formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Gif,
    Png,
    Jpeg,
}

/// Identify an image by its magic bytes.
pub fn sniff_image(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some(ImageFormat::Gif)
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some(ImageFormat::Png)
    } else if bytes.len() > 3 && bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(ImageFormat::Jpeg)
    } else {
        None
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// `brand/{id}/{sha}_avatar_full.jpg` and friends.
pub fn avatar_key(prefix: &str, entity_id: i64, bytes: &[u8]) -> String {
    format!("{}/{}/{}_avatar_full.jpg", prefix, entity_id, sha256_hex(bytes))
}

/// `product/{id}/{sha}_media_full.jpg`.
pub fn product_media_key(product_id: i64, bytes: &[u8]) -> String {
    format!("product/{}/{}_media_full.jpg", product_id, sha256_hex(bytes))
}
