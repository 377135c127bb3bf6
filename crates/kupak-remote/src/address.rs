//! Address classification, shorthand rewriting, and the relative join rule.

use crate::RemoteError;
use std::path::{Path, PathBuf};

const SHORTHAND_HOST: &str = "github.com";
const RAW_CONTENT_BASE: &str = "https://raw.githubusercontent.com";
const DEFAULT_BRANCH: &str = "master";

/// Where an address is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Http(String),
    Local(PathBuf),
}

fn has_http_scheme(address: &str) -> bool {
    let lower = address.get(..8).unwrap_or(address).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

pub fn is_shorthand(address: &str) -> bool {
    address == SHORTHAND_HOST
        || address
            .strip_prefix(SHORTHAND_HOST)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// An address is relative when it is empty, starts with `.`, or is neither a
/// URL, a shorthand reference, nor an absolute local path.
pub fn is_relative(address: &str) -> bool {
    address.is_empty()
        || address.starts_with('.')
        || !(has_http_scheme(address) || is_shorthand(address) || Path::new(address).is_absolute())
}

/// Rewrite `github.com/<owner>/<repo>/<path...>` to the raw-content URL of
/// that file on the repository's default branch.
pub fn rewrite_shorthand(address: &str) -> Result<String, RemoteError> {
    let rest = address.strip_prefix(SHORTHAND_HOST).unwrap_or_default();
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 3 {
        return Err(RemoteError::InvalidAddress {
            address: address.to_owned(),
            reason: format!("expected {SHORTHAND_HOST}/<owner>/<repo>/<path>"),
        });
    }
    Ok(format!(
        "{RAW_CONTENT_BASE}/{}/{}/{DEFAULT_BRANCH}/{}",
        segments[0],
        segments[1],
        segments[2..].join("/")
    ))
}

/// Decide how an address is fetched.
pub fn locate(address: &str) -> Result<Location, RemoteError> {
    if has_http_scheme(address) {
        Ok(Location::Http(address.to_owned()))
    } else if is_shorthand(address) {
        Ok(Location::Http(rewrite_shorthand(address)?))
    } else {
        Ok(Location::Local(PathBuf::from(address)))
    }
}

/// Resolve `reference` against the directory of `base`. Non-relative
/// references are returned verbatim.
pub fn resolve(base: &str, reference: &str) -> Result<String, RemoteError> {
    if !is_relative(reference) {
        return Ok(reference.to_owned());
    }
    if has_http_scheme(base) {
        let mut url = url::Url::parse(base).map_err(|e| RemoteError::InvalidAddress {
            address: base.to_owned(),
            reason: e.to_string(),
        })?;
        if reference.contains(['?', '#']) {
            // the reference brings its own query, which replaces the base's
            let joined = url.join(reference).map_err(|e| RemoteError::InvalidAddress {
                address: reference.to_owned(),
                reason: e.to_string(),
            })?;
            return Ok(joined.to_string());
        }
        let joined = clean_path(&format!("{}/{reference}", dir_of(url.path())));
        url.set_path(&joined);
        Ok(url.to_string())
    } else {
        let joined = clean_path(&format!("{}/{reference}", dir_of(base)));
        if is_shorthand(base) {
            check_shorthand_root(base, reference, &joined)?;
        }
        Ok(joined)
    }
}

/// A reference resolved against `github.com/<owner>/<repo>/...` must stay
/// inside that repository.
fn check_shorthand_root(base: &str, reference: &str, joined: &str) -> Result<(), RemoteError> {
    let root: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).take(3).collect();
    let segments: Vec<&str> = joined.split('/').collect();
    if root.len() == 3 && segments.len() > 3 && segments[..3] == root[..] {
        return Ok(());
    }
    Err(RemoteError::InvalidAddress {
        address: reference.to_owned(),
        reason: format!("resolves outside {} (relative to {base})", root.join("/")),
    })
}

/// The directory portion of a slash-separated path.
pub fn dir_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(i) => &path[..i],
        None => ".",
    }
}

/// Lexically clean a slash-separated path: collapse repeated separators and
/// resolve `.` and `..` segments.
pub fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            s => parts.push(s),
        }
    }
    let joined = parts.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_owned()
    } else {
        joined
    }
}
