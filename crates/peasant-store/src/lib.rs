//! The durable record store: a typed facade over a [`peasant_types::BlobCache`],
//! plus the one concrete cache implementation this workspace ships, a
//! filesystem-backed cache using atomic (write-temp, rename) writes.

mod build_store;
mod file_cache;

pub use build_store::BuildStore;
pub use file_cache::FileBlobCache;
