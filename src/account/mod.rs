//! Download accounts: identities used only to satisfy a file's
//! authentication gate.

mod directory;
mod repository;
mod types;

pub use directory::DownloadAccountDirectory;
pub use repository::DownloadAccountRepository;
pub use types::{anonymized_email, AccountDownload, DownloadAccount, ANONYMIZED_NAME};
