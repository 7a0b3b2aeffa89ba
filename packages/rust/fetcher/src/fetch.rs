//! HTTP download of submission source payloads.

use std::path::PathBuf;

use reqwest::{Client, StatusCode};
use tracing::{debug, info, instrument, warn};

use arxivflat_shared::{ArxivFlatError, FetchConfig, Result, SourceBundle, SubmissionId};
use arxivflat_storage::BundleCache;

use crate::archive::extract_bundle;

/// User-Agent string for source requests.
const USER_AGENT: &str = concat!("arxivflat/", env!("CARGO_PKG_VERSION"));

/// Downloads and extracts source bundles.
#[derive(Debug, Clone)]
pub struct BundleFetcher {
    config: FetchConfig,
    client: Client,
    work_root: Option<PathBuf>,
    prune_assets: bool,
}

impl BundleFetcher {
    /// Create a fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(config.timeout)
            .build()
            .map_err(|e| ArxivFlatError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            work_root: None,
            prune_assets: false,
        })
    }

    /// Create extraction directories under `root` instead of the system temp dir.
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = Some(root.into());
        self
    }

    /// Drop images and PDFs from fetched bundles.
    pub fn prune_assets(mut self, prune: bool) -> Self {
        self.prune_assets = prune;
        self
    }

    /// The URL a submission's source is requested from.
    pub fn source_url(&self, id: &SubmissionId) -> String {
        format!("{}/{id}", self.config.base_url)
    }

    /// Download and extract the source bundle of `id`.
    #[instrument(skip_all, fields(id = %id))]
    pub async fn fetch(&self, id: &SubmissionId) -> Result<SourceBundle> {
        let payload = self.download(id).await?;

        let work_root = self.work_root.clone();
        let limit = self.config.max_archive_bytes;
        let bundle = tokio::task::spawn_blocking(move || {
            extract_bundle(&payload, work_root.as_deref(), limit)
        })
        .await
        .map_err(|e| ArxivFlatError::archive(format!("extraction task failed: {e}")))??;

        let bundle = if self.prune_assets {
            bundle.without_assets()
        } else {
            bundle
        };

        info!(
            files = bundle.len(),
            bytes = bundle.total_bytes(),
            "fetched source bundle"
        );
        Ok(bundle)
    }

    /// [`fetch`](Self::fetch), then hand the bundle to `cache`.
    ///
    /// A failed store is logged; the bundle is still returned.
    pub async fn fetch_and_store(
        &self,
        id: &SubmissionId,
        cache: &dyn BundleCache,
    ) -> Result<SourceBundle> {
        let bundle = self.fetch(id).await?;
        if let Err(e) = cache.store(id, &bundle) {
            warn!(id = %id, error = %e, "failed to populate cache");
        }
        Ok(bundle)
    }

    async fn download(&self, id: &SubmissionId) -> Result<Vec<u8>> {
        let url = self.source_url(id);
        let mut attempt: u32 = 0;

        loop {
            match self.download_once(&url).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = self
                        .config
                        .retry_backoff
                        .saturating_mul(2u32.saturating_pow(attempt));
                    attempt += 1;
                    warn!(
                        %url,
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn download_once(&self, url: &str) -> Result<Vec<u8>> {
        debug!(%url, "requesting source");
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ArxivFlatError::Network(format!("GET {url}: {e}")))?;

        classify_status(response.status(), url)?;

        let limit = self.config.max_archive_bytes;
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(too_large(url, limit));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ArxivFlatError::Network(format!("reading body of {url}: {e}")))?
        {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > limit {
                return Err(too_large(url, limit));
            }
        }

        if body.is_empty() {
            return Err(ArxivFlatError::NotFound(format!("{url}: empty response")));
        }
        debug!(%url, bytes = body.len(), "downloaded payload");
        Ok(body)
    }
}

/// Map a non-success status onto the error taxonomy.
fn classify_status(status: StatusCode, url: &str) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        return Err(ArxivFlatError::Network(format!("{url}: HTTP {status}")));
    }
    Err(ArxivFlatError::NotFound(format!("{url}: HTTP {status}")))
}

fn too_large(url: &str, limit: u64) -> ArxivFlatError {
    ArxivFlatError::archive(format!("{url}: payload exceeds {limit} bytes"))
}
