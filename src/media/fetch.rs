// Bounded origin fetches.
//
// A timeout is not an error: callers fall back to serving the origin URL
// directly. HTTP failures, oversize payloads and transport errors are errors.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Default request timeout for origin fetches.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Default payload ceiling (10 MiB).
pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug)]
pub enum FetchOutcome {
    Fetched(Vec<u8>),
    TimedOut,
}

pub struct Fetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl Fetcher {
    pub fn new(timeout: Duration, max_bytes: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pitchside/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, max_bytes })
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// GET `url` and return its body, or `TimedOut` if the request ran past
    /// the timeout at any point (connect, headers, or body).
    pub async fn fetch(&self, url: &str) -> Result<FetchOutcome> {
        let mut response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                warn!(url, "Origin fetch timed out");
                return Ok(FetchOutcome::TimedOut);
            }
            Err(e) => return Err(e).with_context(|| format!("Origin fetch failed: {url}")),
        };

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Origin returned {status} for {url}");
        }

        if let Some(len) = response.content_length() {
            if len > self.max_bytes {
                anyhow::bail!(
                    "Origin payload for {url} is {len} bytes (limit {})",
                    self.max_bytes
                );
            }
        }

        let mut body = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if (body.len() + chunk.len()) as u64 > self.max_bytes {
                        anyhow::bail!(
                            "Origin payload for {url} exceeded {} bytes",
                            self.max_bytes
                        );
                    }
                    body.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(e) if e.is_timeout() => {
                    warn!(url, received = body.len(), "Origin body timed out");
                    return Ok(FetchOutcome::TimedOut);
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to read origin body: {url}"));
                }
            }
        }

        debug!(url, bytes = body.len(), "Fetched origin media");
        Ok(FetchOutcome::Fetched(body))
    }
}
