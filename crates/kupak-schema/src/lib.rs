//! Pak descriptors, property schemas, typed values, and repository indexes for kupak.
//!
//! This crate defines the schema layer: YAML descriptor parsing (`DescriptorV1`),
//! the validated form every other layer consumes (`PakDescriptor`), the tagged
//! `Value` type with default filling, normalization and validation against a
//! property schema, the repository index format (`RepoIndex`), and the stable
//! pak identity derived from its source address (`compute_pak_id`).

pub mod descriptor;
pub mod identity;
pub mod index;
pub mod types;
pub mod values;

pub use descriptor::{
    parse_descriptor, parse_descriptor_str, DescriptorError, DescriptorV1, PakDescriptor,
    Property, PropertyDecl, PropertyType, SchemaError,
};
pub use identity::{compute_pak_id, PakIdentity};
pub use index::{is_bare_name, parse_pak_ref, IndexEntry, IndexError, RepoIndex};
pub use types::{GroupId, PakId, ShortId};
pub use values::{parse_values_str, prepare_values, Value, ValueError, ValueMap};
