//! Bundle cache: submission id → extracted source tree.
//!
//! The [`BundleCache`] trait is the seam between the pipeline and the storage
//! medium. Two implementations ship here:
//! - [`DiskCache`]: one directory per submission under a cache root
//! - [`MemoryCache`]: process-local map, for tests and embedding
//!
//! **Staleness:** entries never expire. Published arXiv source is immutable
//! per id+version, and a differently versioned id is a different key. Use
//! [`BundleCache::purge`] to force a re-fetch.

mod disk;
mod memory;

use arxivflat_shared::{Result, SourceBundle, SubmissionId};

pub use disk::DiskCache;
pub use memory::MemoryCache;

/// Key-value store of extracted bundles.
///
/// Implementations must make `store` an idempotent overwrite and must return
/// a content-identical bundle from a `lookup` that follows a `store`.
pub trait BundleCache: Send + Sync {
    /// The cached bundle for `id`, if any.
    fn lookup(&self, id: &SubmissionId) -> Result<Option<SourceBundle>>;

    /// Persist `bundle` for `id`, replacing any previous entry.
    fn store(&self, id: &SubmissionId, bundle: &SourceBundle) -> Result<()>;

    /// Remove the entry for `id`. Returns whether one existed.
    fn purge(&self, id: &SubmissionId) -> Result<bool>;
}
