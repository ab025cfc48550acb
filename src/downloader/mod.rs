pub mod engine;
pub mod signer;
pub mod storage;

pub use engine::{DownloadError, DownloadOutcome, Downloader};
pub use signer::{PrivateUrlSigner, PublicUrlSigner, SignError, UrlSigner};
pub use storage::{content_path, EMPTY_KEY_FILE_NAME};
