//! Core domain types shared by the fetcher, cache, and assembler.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Component, Path};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ArxivFlatError, Result};
use crate::identifier::SubmissionId;

/// Current schema version for cache manifests.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// File extensions treated as non-text assets by [`SourceBundle::without_assets`].
const ASSET_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "pdf", "gif", "bmp", "svg", "eps", "ps", "tif", "tiff",
];

// ---------------------------------------------------------------------------
// SourceBundle
// ---------------------------------------------------------------------------

/// The files of one extracted source archive, keyed by relative POSIX path.
///
/// Paths are normalized on insert: no leading `./`, no empty or `.` segments,
/// `/` as separator. Iteration order is lexicographic by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceBundle {
    files: BTreeMap<String, Vec<u8>>,
}

impl SourceBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a file. Returns an error for paths that are absolute
    /// or climb out of the bundle root.
    pub fn insert(&mut self, path: &str, contents: impl Into<Vec<u8>>) -> Result<()> {
        let key = normalize_relative(path).ok_or_else(|| {
            ArxivFlatError::archive(format!("path '{path}' escapes the bundle root"))
        })?;
        self.files.insert(key, contents.into());
        Ok(())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn bytes(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// File contents decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self, path: &str) -> Option<Cow<'_, str>> {
        self.files.get(path).map(|b| String::from_utf8_lossy(b))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// All `.tex` paths, in lexicographic order.
    pub fn tex_files(&self) -> Vec<&str> {
        self.paths().filter(|p| has_extension(p, "tex")).collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total size of all file contents in bytes.
    pub fn total_bytes(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    /// SHA-256 over every path and its contents, in path order.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (path, contents) in &self.files {
            hasher.update((path.len() as u64).to_le_bytes());
            hasher.update(path.as_bytes());
            hasher.update((contents.len() as u64).to_le_bytes());
            hasher.update(contents);
        }
        format!("{:x}", hasher.finalize())
    }

    /// A copy without image and PDF assets, which assembly never reads.
    pub fn without_assets(&self) -> Self {
        let files = self
            .files
            .iter()
            .filter(|(path, _)| !is_asset(path))
            .map(|(p, c)| (p.clone(), c.clone()))
            .collect();
        Self { files }
    }

    /// Read every regular file under `root` into a bundle.
    pub fn from_dir(root: &Path) -> Result<Self> {
        let mut bundle = Self::new();
        visit_dir(root, root, &mut bundle)?;
        Ok(bundle)
    }

    /// Write every file under `root`, creating parent directories.
    pub fn write_to_dir(&self, root: &Path) -> Result<()> {
        for (rel, contents) in &self.files {
            let path = root.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| ArxivFlatError::io(parent, e))?;
            }
            std::fs::write(&path, contents).map_err(|e| ArxivFlatError::io(&path, e))?;
        }
        Ok(())
    }
}

fn visit_dir(dir: &Path, root: &Path, bundle: &mut SourceBundle) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| ArxivFlatError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ArxivFlatError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| ArxivFlatError::io(&path, e))?;

        if file_type.is_dir() {
            visit_dir(&path, root, bundle)?;
        } else if file_type.is_file() {
            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let contents = std::fs::read(&path).map_err(|e| ArxivFlatError::io(&path, e))?;
            bundle.insert(&rel, contents)?;
        }
    }
    Ok(())
}

/// Lexically normalize a relative POSIX path. `None` if it is absolute or
/// climbs above the root.
pub fn normalize_relative(path: &str) -> Option<String> {
    if path.starts_with('/') || path.starts_with('\\') {
        return None;
    }
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            s => parts.push(s),
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Whether a filesystem path stays inside its root when joined to it.
pub fn is_contained(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn has_extension(path: &str, ext: &str) -> bool {
    Path::new(path)
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn is_asset(path: &str) -> bool {
    ASSET_EXTENSIONS.iter().any(|ext| has_extension(path, ext))
}

// ---------------------------------------------------------------------------
// CacheManifest
// ---------------------------------------------------------------------------

/// The `manifest.json` stored beside each cached bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheManifest {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// Submission the bundle belongs to.
    pub id: SubmissionId,
    /// Number of files in the bundle.
    pub file_count: usize,
    /// Total size of the bundle's files in bytes.
    pub total_bytes: usize,
    /// [`SourceBundle::digest`] at store time.
    pub digest: String,
    /// When the entry was written.
    pub stored_at: DateTime<Utc>,
}

impl CacheManifest {
    pub fn for_bundle(id: &SubmissionId, bundle: &SourceBundle) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            id: id.clone(),
            file_count: bundle.len(),
            total_bytes: bundle.total_bytes(),
            digest: bundle.digest(),
            stored_at: Utc::now(),
        }
    }
}
