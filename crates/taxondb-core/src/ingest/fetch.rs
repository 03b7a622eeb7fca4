use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::IngestConfig;

use super::error::IngestError;

/// Largest buffer reserved up front from a server's Content-Length.
const MAX_PREALLOC: u64 = 64 << 20;

/// Source of taxdump archive bytes.
///
/// Swapping the fetcher lets ingestion run against a local file or a test
/// server without touching the rest of the pipeline.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Human readable location, recorded in the database metadata.
    fn source(&self) -> &str;

    /// Downloads the whole archive.
    async fn fetch(&self) -> Result<Vec<u8>, IngestError>;
}

/// Downloads an archive over HTTP(S) with a bounded number of retries.
pub struct HttpFetcher {
    client: Client,
    url: String,
    retries: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher using the timeout and retry settings of `config`.
    pub fn new(url: impl Into<String>, config: &IngestConfig) -> Result<Self, IngestError> {
        let url = url.into();
        let client = Client::builder()
            .connect_timeout(config.fetch_timeout())
            .build()
            .map_err(|e| IngestError::Fetch {
                url: url.clone(),
                attempts: 0,
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            url,
            retries: config.fetch_retries,
            retry_delay: config.retry_delay(),
        })
    }

    /// Sets the number of retries after the first failed attempt.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the pause between attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn attempt(&self) -> Result<Vec<u8>, String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("server returned {}", status));
        }

        // Content-Length is only a hint; a bogus value must not size the buffer.
        let hint = response.content_length().unwrap_or(0).min(MAX_PREALLOC);
        let mut body = Vec::with_capacity(hint as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| e.to_string())?;
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn source(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<Vec<u8>, IngestError> {
        let attempts = self.retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.attempt().await {
                Ok(body) => {
                    debug!("Downloaded {} bytes from {}", body.len(), self.url);
                    return Ok(body);
                }
                Err(e) => {
                    warn!(
                        "Download of {} failed (attempt {}/{}): {}",
                        self.url, attempt, attempts, e
                    );
                    last_error = e;
                    if attempt < attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Err(IngestError::Fetch {
            url: self.url.clone(),
            attempts,
            message: last_error,
        })
    }
}

/// Reads an archive from the local filesystem.
pub struct FileFetcher {
    path: PathBuf,
    source: String,
}

impl FileFetcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let source = path.display().to_string();
        Self { path, source }
    }
}

#[async_trait]
impl Fetcher for FileFetcher {
    fn source(&self) -> &str {
        &self.source
    }

    async fn fetch(&self) -> Result<Vec<u8>, IngestError> {
        let body = tokio::fs::read(&self.path)
            .await
            .map_err(|e| IngestError::Fetch {
                url: self.source.clone(),
                attempts: 1,
                message: e.to_string(),
            })?;
        debug!("Read {} bytes from {}", body.len(), self.source);
        Ok(body)
    }
}

/// Picks a fetcher for `source`: `http(s)://` URLs are downloaded, `file://`
/// URLs and bare paths are read from disk.
pub fn fetcher_for(source: &str, config: &IngestConfig) -> Result<Box<dyn Fetcher>, IngestError> {
    if source.starts_with("http://") || source.starts_with("https://") {
        return Ok(Box::new(HttpFetcher::new(source, config)?));
    }
    if let Some(path) = source.strip_prefix("file://") {
        return Ok(Box::new(FileFetcher::new(path)));
    }
    if source.contains("://") {
        return Err(IngestError::UnsupportedSource(source.to_string()));
    }
    Ok(Box::new(FileFetcher::new(source)))
}
