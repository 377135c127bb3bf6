use crate::address::{locate, Location};
use crate::{Fetcher, RemoteError};
use std::io::Read;
use tracing::debug;

/// Fetches local paths with a file read and everything else with a blocking
/// HTTP GET. Shorthand addresses are rewritten before the request.
pub struct UrlFetcher {
    agent: ureq::Agent,
}

impl Default for UrlFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlFetcher {
    pub fn new() -> Self {
        let agent = ureq::Agent::new_with_defaults();
        Self { agent }
    }

    fn do_get(&self, url: &str) -> Result<Vec<u8>, RemoteError> {
        debug!("GET {url}");
        let resp = match self.agent.get(url).call() {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(code)) => {
                return Err(RemoteError::Status {
                    url: url.to_owned(),
                    code,
                });
            }
            Err(e) => {
                return Err(RemoteError::Http {
                    url: url.to_owned(),
                    message: e.to_string(),
                });
            }
        };

        let code = resp.status().as_u16();
        if !(200..300).contains(&code) {
            return Err(RemoteError::Status {
                url: url.to_owned(),
                code,
            });
        }

        let mut reader = resp.into_body().into_reader();
        let mut body = Vec::new();
        reader
            .read_to_end(&mut body)
            .map_err(|e| RemoteError::Http {
                url: url.to_owned(),
                message: e.to_string(),
            })?;
        debug!("GET {url}: {} bytes", body.len());
        Ok(body)
    }

    fn do_read(path: &std::path::Path) -> Result<Vec<u8>, RemoteError> {
        debug!("read {}", path.display());
        std::fs::read(path).map_err(|source| RemoteError::Read {
            path: path.display().to_string(),
            source,
        })
    }
}

impl Fetcher for UrlFetcher {
    fn fetch(&self, address: &str) -> Result<Vec<u8>, RemoteError> {
        match locate(address)? {
            Location::Http(url) => self.do_get(&url),
            Location::Local(path) => Self::do_read(&path),
        }
    }
}
