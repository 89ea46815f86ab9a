// HTTP agent setup and range requests

use std::io::Read;
use std::time::Duration;
use tempo_core::{AudioError, Result};

const USER_AGENT: &str = "tempo/0.2 (audio player)";

/// Retries for a single range request before giving up.
const MAX_ATTEMPTS: u32 = 3;

pub fn create_http_agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(15))
        .timeout_read(Duration::from_secs(30))
        .user_agent(USER_AGENT)
        .redirects(10)
        .build()
}

/// Thin wrapper over a `ureq` agent speaking byte ranges.
#[derive(Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            agent: create_http_agent(),
        }
    }

    /// Total resource length, from HEAD or a one-byte range request.
    pub fn content_length(&self, url: &str) -> Result<Option<u64>> {
        if let Ok(response) = self.agent.head(url).call() {
            if let Some(len) = response
                .header("Content-Length")
                .and_then(|s| s.parse::<u64>().ok())
            {
                return Ok(Some(len));
            }
        }

        let response = self
            .agent
            .get(url)
            .set("Range", "bytes=0-0")
            .call()
            .map_err(|e| AudioError::NetworkError(format!("probe of {} failed: {}", url, e)))?;

        if let Some(total) = response
            .header("Content-Range")
            .and_then(parse_content_range_total)
        {
            return Ok(Some(total));
        }
        // A server ignoring Range answers 200 with the full length
        if response.status() == 200 {
            return Ok(response
                .header("Content-Length")
                .and_then(|s| s.parse::<u64>().ok()));
        }
        Ok(None)
    }

    /// Fetch `bytes=start..=end`, retrying transient failures with backoff.
    pub fn fetch_range(&self, url: &str, start: u64, end: u64) -> Result<Vec<u8>> {
        let range = format!("bytes={}-{}", start, end);
        let mut last_error = String::new();

        for attempt in 0..MAX_ATTEMPTS {
            match self.agent.get(url).set("Range", &range).call() {
                Ok(response) => {
                    let mut data = Vec::with_capacity((end - start + 1) as usize);
                    response
                        .into_reader()
                        .take(end - start + 1)
                        .read_to_end(&mut data)
                        .map_err(|e| AudioError::NetworkError(format!("read failed: {}", e)))?;
                    return Ok(data);
                }
                Err(ureq::Error::Status(416, _)) => return Ok(Vec::new()),
                Err(e) => {
                    last_error = e.to_string();
                    if attempt + 1 < MAX_ATTEMPTS {
                        let delay = Duration::from_millis(250 * 2u64.pow(attempt));
                        log::warn!(
                            "[http] Range {} failed (attempt {}): {}, retrying in {:?}",
                            range,
                            attempt + 1,
                            last_error,
                            delay
                        );
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        Err(AudioError::NetworkError(format!(
            "range {} failed after {} attempts: {}",
            range, MAX_ATTEMPTS, last_error
        )))
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Total length from a `Content-Range: bytes a-b/total` header.
pub fn parse_content_range_total(header: &str) -> Option<u64> {
    let total = header.rsplit('/').next()?.trim();
    if total == "*" {
        return None;
    }
    total.parse::<u64>().ok()
}
