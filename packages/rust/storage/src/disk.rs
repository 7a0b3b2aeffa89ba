//! On-disk bundle cache.
//!
//! Layout:
//! ```text
//! <root>/
//! ├── 2301.12003/
//! │   ├── manifest.json
//! │   └── files/
//! │       ├── main.tex
//! │       └── sections/intro.tex
//! ├── hep-th_9901001v2/
//! └── .staging-<uuid>/        (in-flight writes, never read)
//! ```
//!
//! Writes go to a staging directory that is renamed into place, so `lookup`
//! only ever sees complete entries. An entry without `manifest.json` is
//! treated as absent.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use arxivflat_shared::{ArxivFlatError, CacheManifest, Result, SourceBundle, SubmissionId};

use crate::BundleCache;

const MANIFEST_FILE: &str = "manifest.json";
const FILES_DIR: &str = "files";
const STAGING_PREFIX: &str = ".staging-";
const TRASH_PREFIX: &str = ".trash-";

/// Filesystem-backed [`BundleCache`].
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    /// Open (creating if needed) a cache rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| cache_io(&root, e))?;
        debug!(root = %root.display(), "opened disk cache");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(&self, id: &SubmissionId) -> PathBuf {
        self.root.join(id.cache_key())
    }

    /// Manifests of every complete entry, sorted by id.
    pub fn entries(&self) -> Result<Vec<CacheManifest>> {
        let mut manifests = Vec::new();
        let dir = fs::read_dir(&self.root).map_err(|e| cache_io(&self.root, e))?;

        for entry in dir {
            let entry = entry.map_err(|e| cache_io(&self.root, e))?;
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            match read_manifest(&entry.path()) {
                Ok(Some(manifest)) => manifests.push(manifest),
                Ok(None) => {}
                Err(e) => warn!(path = %entry.path().display(), error = %e, "skipping unreadable cache entry"),
            }
        }

        manifests.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(manifests)
    }
}

impl BundleCache for DiskCache {
    #[instrument(skip_all, fields(id = %id))]
    fn lookup(&self, id: &SubmissionId) -> Result<Option<SourceBundle>> {
        let dir = self.entry_dir(id);
        let Some(manifest) = read_manifest(&dir)? else {
            debug!("cache miss");
            return Ok(None);
        };

        if manifest.id != *id {
            return Err(ArxivFlatError::cache(format!(
                "{}: manifest belongs to {}",
                dir.display(),
                manifest.id
            )));
        }

        let files = dir.join(FILES_DIR);
        let bundle = if files.is_dir() {
            SourceBundle::from_dir(&files).map_err(|e| ArxivFlatError::cache(e.to_string()))?
        } else {
            SourceBundle::new()
        };

        if bundle.digest() != manifest.digest {
            return Err(ArxivFlatError::cache(format!(
                "{}: contents do not match manifest digest",
                dir.display()
            )));
        }

        debug!(files = bundle.len(), "cache hit");
        Ok(Some(bundle))
    }

    #[instrument(skip_all, fields(id = %id, files = bundle.len()))]
    fn store(&self, id: &SubmissionId, bundle: &SourceBundle) -> Result<()> {
        let staging = self.root.join(format!("{STAGING_PREFIX}{}", Uuid::now_v7()));
        let target = self.entry_dir(id);

        let result = write_entry(&staging, id, bundle).and_then(|()| self.swap_in(&staging, &target));
        if result.is_err() && staging.exists() {
            if let Err(e) = fs::remove_dir_all(&staging) {
                warn!(path = %staging.display(), error = %e, "failed to remove staging directory");
            }
        }
        result?;

        info!(path = %target.display(), "stored bundle in cache");
        Ok(())
    }

    #[instrument(skip_all, fields(id = %id))]
    fn purge(&self, id: &SubmissionId) -> Result<bool> {
        let dir = self.entry_dir(id);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir).map_err(|e| cache_io(&dir, e))?;
        info!(path = %dir.display(), "purged cache entry");
        Ok(true)
    }
}

impl DiskCache {
    /// Replace `target` with `staging`, moving any old entry aside first.
    fn swap_in(&self, staging: &Path, target: &Path) -> Result<()> {
        let trash = if target.exists() {
            let trash = self.root.join(format!("{TRASH_PREFIX}{}", Uuid::now_v7()));
            fs::rename(target, &trash).map_err(|e| cache_io(target, e))?;
            Some(trash)
        } else {
            None
        };

        if let Err(e) = fs::rename(staging, target) {
            // Put the previous entry back so a failed refresh does not lose it.
            if let Some(trash) = &trash {
                if let Err(restore) = fs::rename(trash, target) {
                    warn!(
                        path = %trash.display(),
                        error = %restore,
                        "failed to restore previous cache entry"
                    );
                }
            }
            return Err(cache_io(target, e));
        }

        if let Some(trash) = trash {
            if let Err(e) = fs::remove_dir_all(&trash) {
                warn!(path = %trash.display(), error = %e, "failed to remove replaced cache entry");
            }
        }
        Ok(())
    }
}

fn write_entry(dir: &Path, id: &SubmissionId, bundle: &SourceBundle) -> Result<()> {
    let files = dir.join(FILES_DIR);
    fs::create_dir_all(&files).map_err(|e| cache_io(&files, e))?;
    bundle
        .write_to_dir(&files)
        .map_err(|e| ArxivFlatError::cache(e.to_string()))?;

    let manifest = CacheManifest::for_bundle(id, bundle);
    let json = serde_json::to_string_pretty(&manifest)
        .map_err(|e| ArxivFlatError::cache(format!("serialize manifest: {e}")))?;
    let path = dir.join(MANIFEST_FILE);
    fs::write(&path, json).map_err(|e| cache_io(&path, e))
}

fn read_manifest(dir: &Path) -> Result<Option<CacheManifest>> {
    let path = dir.join(MANIFEST_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(cache_io(&path, e)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| ArxivFlatError::cache(format!("{}: {e}", path.display())))
}

fn cache_io(path: &Path, e: std::io::Error) -> ArxivFlatError {
    ArxivFlatError::cache(format!("{}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> SubmissionId {
        SubmissionId::parse(s).unwrap()
    }

    fn sample() -> SourceBundle {
        let mut bundle = SourceBundle::new();
        bundle.insert("main.tex", "\\input{sec/a}").unwrap();
        bundle.insert("sec/a.tex", "A").unwrap();
        bundle
    }

    #[test]
    fn writes_documented_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(tmp.path()).unwrap();
        cache.store(&id("hep-th/9901001v2"), &sample()).unwrap();

        let entry = tmp.path().join("hep-th_9901001v2");
        assert!(entry.join("manifest.json").is_file());
        assert!(entry.join("files/sec/a.tex").is_file());

        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with('.'))
            .collect();
        assert!(leftovers.is_empty(), "staging dirs left behind: {leftovers:?}");
    }

    #[test]
    fn entry_without_manifest_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(tmp.path()).unwrap();
        let partial = tmp.path().join("2301.12003").join("files");
        fs::create_dir_all(&partial).unwrap();
        fs::write(partial.join("main.tex"), "half written").unwrap();

        assert!(cache.lookup(&id("2301.12003")).unwrap().is_none());
    }

    #[test]
    fn tampered_entry_is_a_cache_error() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(tmp.path()).unwrap();
        cache.store(&id("2301.12003"), &sample()).unwrap();
        fs::write(tmp.path().join("2301.12003/files/sec/a.tex"), "changed").unwrap();

        let err = cache.lookup(&id("2301.12003")).unwrap_err();
        assert!(matches!(err, ArxivFlatError::Cache(_)));
        assert!(err.to_string().contains("digest"));
    }

    #[test]
    fn lists_entries_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(tmp.path()).unwrap();
        cache.store(&id("2402.00002"), &sample()).unwrap();
        cache.store(&id("2301.12003"), &SourceBundle::new()).unwrap();
        fs::create_dir_all(tmp.path().join("stray")).unwrap();

        let entries = cache.entries().unwrap();
        let ids: Vec<String> = entries.iter().map(|m| m.id.to_string()).collect();
        assert_eq!(ids, vec!["2301.12003", "2402.00002"]);
        assert_eq!(entries[1].file_count, 2);
        assert_eq!(entries[1].digest, sample().digest());
    }

    #[test]
    fn failed_replace_keeps_previous_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(tmp.path()).unwrap();
        let key = id("2301.12003v1");
        cache.store(&key, &sample()).unwrap();

        let missing_staging = tmp.path().join(format!("{STAGING_PREFIX}gone"));
        let err = cache
            .swap_in(&missing_staging, &cache.entry_dir(&key))
            .unwrap_err();
        assert!(matches!(err, ArxivFlatError::Cache(_)));

        assert_eq!(cache.lookup(&key).unwrap(), Some(sample()));
        let trash: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(TRASH_PREFIX))
            .collect();
        assert!(trash.is_empty(), "replaced entry left aside: {trash:?}");
    }

    #[test]
    fn empty_bundle_roundtrips() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(tmp.path()).unwrap();
        cache.store(&id("2301.12003"), &SourceBundle::new()).unwrap();
        assert_eq!(cache.lookup(&id("2301.12003")).unwrap(), Some(SourceBundle::new()));
    }
}
