//! End-to-end request: reference → id → cache or fetch → entry → merged text.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use arxivflat_fetcher::BundleFetcher;
use arxivflat_latex::{assemble, resolve_entry};
use arxivflat_shared::{
    AppConfig, ArxivFlatError, AssemblyConfig, ErrorKind, FetchConfig, SourceBundle, SubmissionId,
};
use arxivflat_storage::BundleCache;

use crate::locks::KeyedLocks;

/// Configuration for a [`Pipeline`].
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub fetch: FetchConfig,
    pub assembly: AssemblyConfig,
    /// Drop images and PDFs before caching.
    pub prune_assets: bool,
    /// Parent directory for extraction scratch space (system temp dir if unset).
    pub work_root: Option<PathBuf>,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            fetch: FetchConfig::from(config),
            assembly: AssemblyConfig::from(config),
            prune_assets: config.cache.prune_assets,
            work_root: None,
        }
    }
}

/// One assembly request.
#[derive(Debug, Clone)]
pub struct AssembleRequest {
    /// URL, `arXiv:` reference, or bare identifier.
    pub reference: String,
    /// Purge the cached bundle before looking it up.
    pub refresh: bool,
}

impl AssembleRequest {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            refresh: false,
        }
    }

    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }
}

/// A merged document and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledDocument {
    pub id: SubmissionId,
    /// Bundle path of the entry file.
    pub entry: String,
    /// The merged LaTeX source.
    pub text: String,
    /// Whether the bundle was served from the cache.
    pub from_cache: bool,
    /// Inlined files in pre-order, once per occurrence.
    pub inlined: Vec<String>,
    /// Include targets not present in the bundle.
    pub missing: Vec<String>,
    /// Includes skipped because they would recurse.
    pub cycles: Vec<String>,
    /// Includes left verbatim at the nesting limit.
    pub depth_limited: Vec<String>,
    /// Includes left verbatim once the output size limit was reached.
    pub size_limited: Vec<String>,
}

/// A failed request, classified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct PipelineError {
    pub kind: ErrorKind,
    pub message: String,
}

impl PipelineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<ArxivFlatError> for PipelineError {
    fn from(e: ArxivFlatError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

/// Outcome of [`Pipeline::assemble`]. No partial results.
pub type PipelineResult<T = AssembledDocument> = std::result::Result<T, PipelineError>;

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a request succeeds.
    fn done(&self, document: &AssembledDocument);
    /// Called when a request fails.
    fn failed(&self, _error: &PipelineError) {}
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _document: &AssembledDocument) {}
}

/// Fetch-and-assemble orchestrator. Share one instance across requests.
pub struct Pipeline {
    fetcher: BundleFetcher,
    cache: Arc<dyn BundleCache>,
    assembly: AssemblyConfig,
    locks: KeyedLocks<SubmissionId>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, cache: Arc<dyn BundleCache>) -> PipelineResult<Self> {
        let mut fetcher = BundleFetcher::new(config.fetch)?.prune_assets(config.prune_assets);
        if let Some(root) = config.work_root {
            fetcher = fetcher.with_work_root(root);
        }
        Ok(Self {
            fetcher,
            cache,
            assembly: config.assembly,
            locks: KeyedLocks::new(),
        })
    }

    /// Resolve `request.reference` to a single merged document.
    #[instrument(skip_all, fields(reference = %request.reference, refresh = request.refresh))]
    pub async fn assemble(
        &self,
        request: &AssembleRequest,
        progress: &dyn ProgressReporter,
    ) -> PipelineResult {
        let start = Instant::now();
        let result = self.run(request, progress).await.map_err(PipelineError::from);

        match &result {
            Ok(document) => {
                progress.done(document);
                info!(
                    id = %document.id,
                    entry = %document.entry,
                    from_cache = document.from_cache,
                    bytes = document.text.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "assembly pipeline complete"
                );
            }
            Err(e) => {
                progress.failed(e);
                warn!(kind = %e.kind, message = %e.message, "assembly pipeline failed");
            }
        }
        result
    }

    /// [`assemble`](Self::assemble) for synchronous callers.
    ///
    /// Drives the request on a private current-thread runtime. Must not be
    /// called from within an async runtime; that case returns an error.
    pub fn assemble_blocking(
        &self,
        request: &AssembleRequest,
        progress: &dyn ProgressReporter,
    ) -> PipelineResult {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(PipelineError::new(
                ErrorKind::NetworkError,
                "assemble_blocking called from within an async runtime",
            ));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                PipelineError::new(ErrorKind::NetworkError, format!("failed to start runtime: {e}"))
            })?;
        runtime.block_on(self.assemble(request, progress))
    }

    /// Drop the cached bundle for `reference`. Returns whether one existed.
    #[instrument(skip_all, fields(reference = %reference))]
    pub async fn purge(&self, reference: &str) -> PipelineResult<bool> {
        let id = SubmissionId::parse(reference)?;
        let _guard = self.locks.acquire(&id).await;
        Ok(self.cache.purge(&id)?)
    }

    async fn run(
        &self,
        request: &AssembleRequest,
        progress: &dyn ProgressReporter,
    ) -> arxivflat_shared::Result<AssembledDocument> {
        progress.phase("Parsing reference");
        let id = SubmissionId::parse(&request.reference)?;
        debug!(id = %id, "parsed reference");

        let (bundle, from_cache) = {
            let _guard = self.locks.acquire(&id).await;
            self.load_bundle(&id, request.refresh, progress).await?
        };

        progress.phase("Resolving entry file");
        let entry = resolve_entry(&bundle)?;

        progress.phase("Inlining includes");
        let assembly = assemble(&bundle, &entry, &self.assembly)?;

        Ok(AssembledDocument {
            id,
            entry: assembly.entry,
            text: assembly.text,
            from_cache,
            inlined: assembly.inlined,
            missing: assembly.missing,
            cycles: assembly.cycles,
            depth_limited: assembly.depth_limited,
            size_limited: assembly.size_limited,
        })
    }

    /// Cache lookup, falling back to fetch-and-store. Caller holds the id lock.
    async fn load_bundle(
        &self,
        id: &SubmissionId,
        refresh: bool,
        progress: &dyn ProgressReporter,
    ) -> arxivflat_shared::Result<(SourceBundle, bool)> {
        progress.phase("Checking cache");
        if refresh {
            match self.cache.purge(id) {
                Ok(existed) => debug!(existed, "purged cache entry for refresh"),
                Err(e) => warn!(error = %e, "failed to purge cache entry for refresh"),
            }
        }

        match self.cache.lookup(id) {
            Ok(Some(bundle)) => {
                info!(id = %id, files = bundle.len(), "serving bundle from cache");
                return Ok((bundle, true));
            }
            Ok(None) => {}
            Err(e) => warn!(id = %id, error = %e, "cache read failed, treating as miss"),
        }

        progress.phase("Downloading source");
        let bundle = self.fetcher.fetch_and_store(id, self.cache.as_ref()).await?;
        Ok((bundle, false))
    }
}
