//! File management module for Dropgate.
//!
//! This module provides:
//! - File records with expiration and quota settings
//! - The access policy evaluator and the quota ledger
//! - File storage with UUID naming
//! - Owner-side upload and settings management

mod policy;
mod quota;
pub(crate) mod record;
mod repository;
mod service;
mod storage;

pub use policy::{evaluate, Availability};
pub use quota::{DownloadCounters, QuotaError, QuotaLedger};
pub use record::{FileRecord, FileSettings, NewFileRecord};
pub use repository::{generate_file_id, FileRepository, FILE_ID_LENGTH};
pub use service::{validate_settings, FileService, UploadRequest};
pub use storage::{ByteStream, FileStorage, STREAM_CHUNK_SIZE};

/// Maximum length for filename (in characters).
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Default maximum file size (1GB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024 * 1024;
