//! Fetching paks, resource templates, and repository indexes for kupak.
//!
//! Addresses come in three families: local paths, `http(s)://` URLs, and the
//! `github.com/<owner>/<repo>/<path>` shorthand, which is rewritten to a
//! raw-content URL. This crate classifies and joins addresses (`address`),
//! fetches them with a blocking HTTP agent or a file read (`http`), and holds
//! the client configuration (`config`).

pub mod address;
pub mod config;
pub mod http;

pub use address::{is_relative, resolve, rewrite_shorthand, Location};
pub use config::ClientConfig;
pub use http::UrlFetcher;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("failed to read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP error for {url}: {message}")]
    Http { url: String, message: String },
    #[error("HTTP {code} for {url}")]
    Status { url: String, code: u16 },
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
}

/// Something that turns an address into bytes.
///
/// Every call is a fresh read: implementations must not cache or retry.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, address: &str) -> Result<Vec<u8>, RemoteError>;
}
