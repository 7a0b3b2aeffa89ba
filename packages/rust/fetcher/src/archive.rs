//! Payload sniffing and extraction.
//!
//! arXiv serves a submission's source as one of:
//! - gzip-compressed tar (multi-file submissions)
//! - gzip-compressed single `.tex` file
//! - plain tar
//! - the PDF itself, when the authors withheld their source
//!
//! Extraction always happens in a fresh temporary directory that is removed
//! before [`extract_bundle`] returns, whether it succeeds or not.

use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use tracing::{debug, instrument, warn};

use arxivflat_shared::{ArxivFlatError, Result, SourceBundle, is_contained};

/// File name given to a single-file (gzip without tar) submission.
pub const SINGLE_FILE_NAME: &str = "main.tex";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const PDF_MAGIC: &[u8] = b"%PDF-";
const TAR_MAGIC: &[u8] = b"ustar";
const TAR_MAGIC_OFFSET: usize = 257;

/// What a downloaded payload looks like, from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Gzip,
    Tar,
    Pdf,
    Unknown,
}

impl PayloadKind {
    pub fn sniff(payload: &[u8]) -> Self {
        if payload.starts_with(&GZIP_MAGIC) {
            Self::Gzip
        } else if is_tar(payload) {
            Self::Tar
        } else if payload.starts_with(PDF_MAGIC) {
            Self::Pdf
        } else {
            Self::Unknown
        }
    }
}

fn is_tar(bytes: &[u8]) -> bool {
    bytes
        .get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + TAR_MAGIC.len())
        .is_some_and(|magic| magic == TAR_MAGIC)
}

/// Extract `payload` in a scratch directory and read it back as a bundle.
///
/// The scratch directory is created under `work_root` when given, otherwise
/// under the system temp dir. `limit` caps the decompressed size.
#[instrument(skip_all, fields(bytes = payload.len()))]
pub fn extract_bundle(payload: &[u8], work_root: Option<&Path>, limit: u64) -> Result<SourceBundle> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("arxivflat-");
    let scratch = match work_root {
        Some(root) => {
            fs::create_dir_all(root).map_err(|e| {
                ArxivFlatError::archive(format!("{}: {e}", root.display()))
            })?;
            builder.tempdir_in(root)
        }
        None => builder.tempdir(),
    }
    .map_err(|e| ArxivFlatError::archive(format!("failed to create working directory: {e}")))?;

    let result = extract(payload, scratch.path(), limit).and_then(|()| SourceBundle::from_dir(scratch.path()));

    let path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        warn!(path = %path.display(), error = %e, "failed to remove working directory");
    }

    result.map_err(|e| match e {
        ArxivFlatError::Io { path, source } => {
            ArxivFlatError::archive(format!("{}: {source}", path.display()))
        }
        other => other,
    })
}

/// Unpack `payload` into `dest`.
pub fn extract(payload: &[u8], dest: &Path, limit: u64) -> Result<()> {
    match PayloadKind::sniff(payload) {
        PayloadKind::Gzip => {
            let inner = gunzip(payload, limit)?;
            if is_tar(&inner) {
                debug!(bytes = inner.len(), "gzip payload contains a tar archive");
                unpack_tar(&inner, dest, limit)
            } else {
                debug!(bytes = inner.len(), "gzip payload is a single file");
                let path = dest.join(SINGLE_FILE_NAME);
                fs::write(&path, inner).map_err(|e| ArxivFlatError::io(&path, e))
            }
        }
        PayloadKind::Tar => unpack_tar(payload, dest, limit),
        PayloadKind::Pdf => Err(ArxivFlatError::NotFound(
            "only a PDF is available for this submission, no source".into(),
        )),
        PayloadKind::Unknown => Err(ArxivFlatError::archive("unrecognized payload format")),
    }
}

fn gunzip(payload: &[u8], limit: u64) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    MultiGzDecoder::new(payload)
        .take(limit.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|e| ArxivFlatError::archive(format!("corrupt gzip stream: {e}")))?;
    if out.len() as u64 > limit {
        return Err(ArxivFlatError::archive(format!(
            "decompressed payload exceeds {limit} bytes"
        )));
    }
    Ok(out)
}

fn unpack_tar(bytes: &[u8], dest: &Path, limit: u64) -> Result<()> {
    let corrupt = |e: io::Error| ArxivFlatError::archive(format!("corrupt tar archive: {e}"));

    let mut archive = tar::Archive::new(Cursor::new(bytes));
    let mut total: u64 = 0;

    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        let rel = entry.path().map_err(corrupt)?.into_owned();

        if !is_contained(&rel) {
            return Err(ArxivFlatError::archive(format!(
                "entry '{}' escapes the extraction directory",
                rel.display()
            )));
        }
        if rel.components().next().is_none() {
            continue;
        }

        let kind = entry.header().entry_type();
        let target = dest.join(&rel);

        if kind.is_dir() {
            fs::create_dir_all(&target).map_err(|e| ArxivFlatError::io(&target, e))?;
            continue;
        }
        if !kind.is_file() {
            debug!(path = %rel.display(), ?kind, "skipping non-regular entry");
            continue;
        }

        total = total.saturating_add(entry.size());
        if total > limit {
            return Err(ArxivFlatError::archive(format!(
                "extracted contents exceed {limit} bytes"
            )));
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| ArxivFlatError::io(parent, e))?;
        }
        let mut file = File::create(&target).map_err(|e| ArxivFlatError::io(&target, e))?;
        io::copy(&mut entry, &mut file).map_err(corrupt)?;
    }
    Ok(())
}
