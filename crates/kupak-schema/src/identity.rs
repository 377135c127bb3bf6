use crate::types::{PakId, ShortId};
use serde::Serialize;

/// Stable identity for a pak, derived from the address it was resolved from.
///
/// Two loads of the same address always produce the same identity, regardless
/// of what the descriptor declares as its name or version.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PakIdentity {
    pub pak_id: PakId,
    pub short_id: ShortId,
}

pub fn compute_pak_id(source_url: &str) -> PakIdentity {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"pak-source:");
    hasher.update(source_url.as_bytes());

    let hex = hasher.finalize().to_hex().to_string();
    let short = hex[..12].to_owned();

    PakIdentity {
        pak_id: PakId::new(hex),
        short_id: ShortId::new(short),
    }
}
