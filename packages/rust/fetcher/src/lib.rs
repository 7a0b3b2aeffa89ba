//! Source bundle acquisition for arxivflat.
//!
//! - [`BundleFetcher`]: downloads `<base_url>/<id>` with per-attempt timeouts
//!   and exponential-backoff retries for transient failures
//! - [`archive`]: payload sniffing and safe extraction into a [`SourceBundle`]
//!
//! [`SourceBundle`]: arxivflat_shared::SourceBundle

pub mod archive;
pub mod fetch;

pub use archive::{PayloadKind, extract_bundle};
pub use fetch::BundleFetcher;
