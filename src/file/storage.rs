//! File storage for Dropgate.
//!
//! Blobs are stored under UUID-based names, sharded by the first two
//! characters. Downloads are read back as a chunked stream so large files
//! never have to fit in memory.

use std::io;
use std::path::{Path, PathBuf};

use axum::body::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::fs;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use crate::{DropgateError, Result};

/// Size of the chunks yielded by [`FileStorage::open_stream`].
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Chunked byte stream of a stored blob.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// File storage service for managing physical files.
///
/// Files are stored in a sharded directory structure:
/// ```text
/// {base_path}/
/// ├── ab/
/// │   └── ab12cd34-5678-90ab-cdef-123456789012.txt
/// └── cd/
///     └── cd90ab12-3456-7890-abcd-ef1234567890.bin
/// ```
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new FileStorage with the given base path.
    ///
    /// The base directory will be created if it doesn't exist.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;

        Ok(Self { base_path })
    }

    /// Get the base path of this storage.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Save content under a new UUID-based name and return that name.
    pub async fn save(&self, content: &[u8], original_name: &str) -> Result<String> {
        let stored_name = Self::generate_stored_name(original_name);
        let file_path = self.get_file_path(&stored_name);

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&file_path, content).await?;

        Ok(stored_name)
    }

    /// Load the whole blob into memory.
    pub async fn load(&self, stored_name: &str) -> Result<Vec<u8>> {
        let file_path = self.get_file_path(stored_name);

        match fs::read(&file_path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(DropgateError::NotFound(format!("blob {stored_name}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Open a blob for streaming.
    ///
    /// The file is opened eagerly so a missing blob surfaces as an error here
    /// rather than halfway through a response.
    pub async fn open_stream(&self, stored_name: &str) -> Result<ByteStream> {
        let file_path = self.get_file_path(stored_name);

        let file = match fs::File::open(&file_path).await {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(DropgateError::NotFound(format!("blob {stored_name}")))
            }
            Err(e) => return Err(e.into()),
        };

        let stream = stream::unfold(Some(file), |state| async move {
            let mut file = state?;
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            match file.read(&mut buf).await {
                Ok(0) => None,
                Ok(n) => {
                    buf.truncate(n);
                    Some((Ok(Bytes::from(buf)), Some(file)))
                }
                Err(e) => Some((Err(e), None)),
            }
        });

        Ok(stream.boxed())
    }

    /// Delete a blob.
    ///
    /// Returns `true` if the file was deleted, `false` if it didn't exist.
    pub async fn delete(&self, stored_name: &str) -> Result<bool> {
        let file_path = self.get_file_path(stored_name);

        match fs::remove_file(&file_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Get the full file path for a stored name.
    ///
    /// The path is constructed as: {base_path}/{shard}/{stored_name}
    pub fn get_file_path(&self, stored_name: &str) -> PathBuf {
        let shard = Self::get_shard(stored_name);
        self.base_path.join(shard).join(stored_name)
    }

    fn get_shard(stored_name: &str) -> &str {
        stored_name.get(..2).unwrap_or(stored_name)
    }

    /// Extract a safe file extension from a filename.
    ///
    /// Returns "bin" if there is none or it contains anything but ASCII
    /// alphanumerics.
    fn extract_extension(filename: &str) -> String {
        Path::new(filename)
            .extension()
            .and_then(|s| s.to_str())
            .filter(|ext| {
                !ext.is_empty() && ext.len() <= 16 && ext.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_else(|| "bin".to_string())
    }

    /// Generate a new UUID-based stored name with the given extension.
    pub fn generate_stored_name(original_name: &str) -> String {
        let uuid = Uuid::new_v4();
        let ext = Self::extract_extension(original_name);
        format!("{uuid}.{ext}")
    }
}
