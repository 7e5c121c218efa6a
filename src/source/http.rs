// src/source/http.rs

//! HTTP access for network mirrors and remote archives
//!
//! Sources and the installer talk to the network through [`Fetcher`] so that
//! tests can substitute canned responses.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use tracing::{debug, warn};
use url::Url;

use crate::cancel::Cancellation;
use crate::error::{Error, Result};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts for requests failing with a transient error
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// How often a retry delay wakes up to look at the cancellation token
const CANCEL_POLL: Duration = Duration::from_millis(100);

/// Download buffer size
const CHUNK_SIZE: usize = 64 * 1024;

/// Minimal HTTP capability needed by mirrors and materialization
///
/// Implementations return `Err(Cancelled)` once `cancel` fires instead of
/// finishing or retrying the request.
pub trait Fetcher: Send + Sync {
    /// GET a document; `Ok(None)` when the server answers 404
    fn get(&self, url: &Url, cancel: &Cancellation) -> Result<Option<Vec<u8>>>;

    /// Download `url` into `dest`
    fn download(&self, url: &Url, dest: &Path, cancel: &Cancellation) -> Result<()> {
        let body = self
            .get(url, cancel)?
            .ok_or_else(|| Error::DownloadError(format!("{} not found", url)))?;
        cancel.check()?;
        fs::write(dest, body)?;
        Ok(())
    }
}

/// Blocking reqwest client with timeout and retries
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(HTTP_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("provider-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::DownloadError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Send a GET, retrying connection failures and 5xx answers
    fn send(&self, url: &Url, cancel: &Cancellation) -> Result<Option<reqwest::blocking::Response>> {
        let mut attempt = 0;
        loop {
            cancel.check()?;
            attempt += 1;
            let outcome = self.client.get(url.clone()).send();
            let retry_reason = match outcome {
                Ok(response) if response.status() == StatusCode::NOT_FOUND => return Ok(None),
                Ok(response) if response.status().is_success() => return Ok(Some(response)),
                Ok(response) if response.status().is_server_error() => {
                    format!("HTTP {}", response.status())
                }
                Ok(response) => {
                    return Err(Error::DownloadError(format!(
                        "GET {} failed: HTTP {}",
                        url,
                        response.status()
                    )));
                }
                Err(e) if e.is_timeout() || e.is_connect() => e.to_string(),
                Err(e) => {
                    return Err(Error::DownloadError(format!("GET {} failed: {}", url, e)));
                }
            };

            if attempt >= MAX_RETRIES {
                return Err(Error::DownloadError(format!(
                    "GET {} failed after {} attempts: {}",
                    url, attempt, retry_reason
                )));
            }
            warn!(
                "GET {} failed ({}), retrying ({}/{})",
                url, retry_reason, attempt, MAX_RETRIES
            );
            wait_for_retry(cancel)?;
        }
    }
}

/// Sleep out the retry delay, returning early once cancelled
fn wait_for_retry(cancel: &Cancellation) -> Result<()> {
    let mut remaining = Duration::from_millis(RETRY_DELAY_MS);
    while !remaining.is_zero() {
        cancel.check()?;
        let step = remaining.min(CANCEL_POLL);
        thread::sleep(step);
        remaining -= step;
    }
    cancel.check()
}

impl Fetcher for HttpFetcher {
    fn get(&self, url: &Url, cancel: &Cancellation) -> Result<Option<Vec<u8>>> {
        debug!("Fetching {}", url);
        match self.send(url, cancel)? {
            Some(response) => {
                let body = response
                    .bytes()
                    .map_err(|e| Error::DownloadError(format!("Failed to read {}: {}", url, e)))?;
                Ok(Some(body.to_vec()))
            }
            None => Ok(None),
        }
    }

    fn download(&self, url: &Url, dest: &Path, cancel: &Cancellation) -> Result<()> {
        debug!("Downloading {} to {}", url, dest.display());
        let mut response = self
            .send(url, cancel)?
            .ok_or_else(|| Error::DownloadError(format!("{} not found", url)))?;
        let mut file = File::create(dest)?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            cancel.check()?;
            let n = response
                .read(&mut buf)
                .map_err(|e| Error::DownloadError(format!("Failed to download {}: {}", url, e)))?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])?;
        }
        Ok(())
    }
}
