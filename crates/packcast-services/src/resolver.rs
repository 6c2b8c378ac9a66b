//! Pack resolver: downloads a pack, hashes it, and reads its metadata.
//!
//! Every call is independent: no memoization, no deduplication of
//! concurrent calls for the same url. The download and the archive scan
//! both run on the runtime's worker threads, so callers on a latency
//! sensitive thread only ever await the result.

use std::io::{Cursor, Read};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use packcast_core::config::ResolverSettings;
use packcast_core::digest::PackHasher;
use packcast_core::{PackHash, PackMeta};
use thiserror::Error;

/// Largest `pack.mcmeta` entry we bother reading.
const MAX_META_BYTES: u64 = 64 * 1024;

/// Outcome of one resolve call. The error's `Display` is meant for the
/// administrator who asked for the registration.
pub type DownloadResult = Result<ResolvedPack, ResolveError>;

/// A downloaded and hashed pack.
#[derive(Debug, Clone)]
pub struct ResolvedPack {
    pub url: String,
    pub hash: PackHash,
    /// Empty/default if the archive carried no readable metadata.
    pub meta: PackMeta,
    pub size: u64,
}

#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("timed out fetching {0}")]
    Timeout(String),
    #[error("{0}")]
    Request(String),
    #[error("server responded with status {0}")]
    Status(u16),
    #[error("pack is larger than {limit} bytes")]
    TooLarge { limit: u64 },
    #[error("resolver task failed: {0}")]
    Worker(String),
}

impl From<reqwest::Error> for ResolveError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            let url = e.url().map(|u| u.to_string()).unwrap_or_default();
            return ResolveError::Timeout(url);
        }
        if let Some(status) = e.status() {
            return ResolveError::Status(status.as_u16());
        }
        ResolveError::Request(describe(&e))
    }
}

/// Flatten an error and its sources into one line.
fn describe(e: &dyn std::error::Error) -> String {
    let mut text = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}

#[derive(Debug, Error)]
enum MetaError {
    #[error("archive has no {}", PackMeta::ENTRY_NAME)]
    Missing,
    #[error("not a zip archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("failed to read {}: {0}", PackMeta::ENTRY_NAME)]
    Io(#[from] std::io::Error),
    #[error("malformed {}: {0}", PackMeta::ENTRY_NAME)]
    Json(#[from] serde_json::Error),
}

/// Downloads and hashes packs.
#[derive(Clone)]
pub struct PackResolver {
    client: reqwest::Client,
    max_bytes: u64,
}

impl PackResolver {
    pub fn new(settings: &ResolverSettings) -> Result<Self, ResolveError> {
        let mut builder = reqwest::Client::builder().user_agent(settings.user_agent.clone());
        if settings.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(settings.timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| ResolveError::Request(describe(&e)))?;
        Ok(Self {
            client,
            max_bytes: settings.max_pack_bytes,
        })
    }

    /// Fetch `url`, hash the body, and read its metadata.
    ///
    /// Never panics past this boundary: a dead worker task is reported as
    /// [`ResolveError::Worker`].
    pub async fn resolve(&self, url: &str) -> DownloadResult {
        let this = self.clone();
        let url = url.to_string();
        match tokio::spawn(async move { this.fetch_and_hash(url).await }).await {
            Ok(result) => result,
            Err(e) => Err(ResolveError::Worker(e.to_string())),
        }
    }

    async fn fetch_and_hash(&self, url: String) -> DownloadResult {
        let (hash, body) = match self.fetch(&url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "pack download failed");
                return Err(e);
            }
        };
        let size = body.len() as u64;

        let meta = match tokio::task::spawn_blocking(move || read_pack_meta(&body)).await {
            Ok(Ok(meta)) => meta,
            Ok(Err(e)) => {
                tracing::debug!(url = %url, error = %e, "pack metadata unreadable");
                PackMeta::default()
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "pack metadata task failed");
                PackMeta::default()
            }
        };

        tracing::info!(url = %url, hash = %hash, size, "pack resolved");
        Ok(ResolvedPack {
            url,
            hash,
            meta,
            size,
        })
    }

    /// Download the body, hashing it as it streams in.
    async fn fetch(&self, url: &str) -> Result<(PackHash, Bytes), ResolveError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| ResolveError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let mut response = self.client.get(parsed).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status(status.as_u16()));
        }

        let limit = self.max_bytes;
        if limit > 0 && response.content_length().is_some_and(|len| len > limit) {
            return Err(ResolveError::TooLarge { limit });
        }

        let mut body = BytesMut::new();
        let mut hasher = PackHasher::new();
        while let Some(chunk) = response.chunk().await? {
            if limit > 0 && (body.len() + chunk.len()) as u64 > limit {
                return Err(ResolveError::TooLarge { limit });
            }
            hasher.update(&chunk);
            body.extend_from_slice(&chunk);
        }

        Ok((hasher.finalize(), body.freeze()))
    }
}

/// Read `pack.mcmeta` from the root of a pack archive.
fn read_pack_meta(body: &Bytes) -> Result<PackMeta, MetaError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(body.clone()))?;
    let entry = match archive.by_name(PackMeta::ENTRY_NAME) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Err(MetaError::Missing),
        Err(e) => return Err(e.into()),
    };
    let mut raw = Vec::new();
    entry.take(MAX_META_BYTES).read_to_end(&mut raw)?;
    Ok(PackMeta::from_mcmeta(&raw)?)
}
