//! Content-addressed TAF store (C7): rUID resolution, sidecar descriptors,
//! and enumeration, plus the catalog lookup trait the HTTP layer uses to
//! enrich what it serves.

pub mod catalog;
pub mod descriptor;
pub mod enumerate;
pub mod error;
pub mod ruid;

pub use catalog::{NullCatalog, ToniesAudioIdInfo, ToniesCatalog};
pub use descriptor::{read_descriptor, write_descriptor, ContentDescriptor};
pub use enumerate::{walk, ContentEntry};
pub use error::{Result, StoreError};
pub use ruid::{data_path, descriptor_path, from_halves, normalize, resolve_path, RUID_LEN};
