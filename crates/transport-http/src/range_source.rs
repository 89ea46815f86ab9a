// Seekable byte source over HTTP range requests

use crate::client::HttpClient;
use std::collections::VecDeque;
use std::io::{Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempo_core::Result;

/// Bytes requested per range fetch (256KB)
const CHUNK_SIZE: u64 = 256 * 1024;

/// Chunks kept in memory before the oldest is dropped (8MB)
const MAX_CACHED_CHUNKS: usize = 32;

/// Anything that can serve an inclusive byte range.
pub trait RangeFetch: Send + Sync {
    fn fetch(&self, start: u64, end: u64) -> Result<Vec<u8>>;
}

struct UrlFetch {
    client: HttpClient,
    url: String,
}

impl RangeFetch for UrlFetch {
    fn fetch(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        self.client.fetch_range(&self.url, start, end)
    }
}

/// Shared view of how far the download has progressed.
#[derive(Clone, Default)]
pub struct DownloadProgress {
    fetched_end: Arc<AtomicU64>,
    total: Arc<AtomicU64>,
}

impl DownloadProgress {
    fn record(&self, end_exclusive: u64) {
        self.fetched_end.fetch_max(end_exclusive, Ordering::Relaxed);
    }

    /// Highest fetched byte as a percentage of the total, `None` when the length is unknown.
    pub fn percent(&self) -> Option<u8> {
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            return None;
        }
        let fetched = self.fetched_end.load(Ordering::Relaxed).min(total);
        Some((fetched * 100 / total) as u8)
    }
}

struct Chunk {
    offset: u64,
    data: Vec<u8>,
}

impl Chunk {
    fn covers(&self, pos: u64) -> bool {
        pos >= self.offset && pos < self.offset + self.data.len() as u64
    }
}

pub struct HttpRangeSource {
    fetcher: Box<dyn RangeFetch>,
    total_size: Option<u64>,
    position: u64,
    chunks: VecDeque<Chunk>,
    progress: DownloadProgress,
}

impl HttpRangeSource {
    pub fn open(url: &str) -> Result<Self> {
        let client = HttpClient::new();
        let total = client.content_length(url)?;
        match total {
            Some(size) => log::info!(
                "[http] Opened {} ({:.2} MB)",
                url,
                size as f64 / 1024.0 / 1024.0
            ),
            None => log::warn!("[http] Opened {} with unknown length", url),
        }
        let fetcher = UrlFetch {
            client,
            url: url.to_string(),
        };
        Ok(Self::from_fetcher(Box::new(fetcher), total))
    }

    pub fn from_fetcher(fetcher: Box<dyn RangeFetch>, total_size: Option<u64>) -> Self {
        let progress = DownloadProgress::default();
        progress
            .total
            .store(total_size.unwrap_or(0), Ordering::Relaxed);
        Self {
            fetcher,
            total_size,
            position: 0,
            chunks: VecDeque::new(),
            progress,
        }
    }

    pub fn progress(&self) -> DownloadProgress {
        self.progress.clone()
    }

    fn load_chunk(&mut self, pos: u64) -> Result<Option<usize>> {
        if let Some(i) = self.chunks.iter().position(|c| c.covers(pos)) {
            return Ok(Some(i));
        }
        let mut end = pos + CHUNK_SIZE - 1;
        if let Some(total) = self.total_size {
            if pos >= total {
                return Ok(None);
            }
            end = end.min(total - 1);
        }

        log::debug!("[http] Fetching bytes={}-{}", pos, end);
        let data = self.fetcher.fetch(pos, end)?;
        if data.is_empty() {
            return Ok(None);
        }
        self.progress.record(pos + data.len() as u64);

        if self.chunks.len() >= MAX_CACHED_CHUNKS {
            self.chunks.pop_front();
        }
        self.chunks.push_back(Chunk { offset: pos, data });
        Ok(Some(self.chunks.len() - 1))
    }
}

impl Read for HttpRangeSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let index = match self.load_chunk(self.position) {
            Ok(Some(i)) => i,
            Ok(None) => return Ok(0),
            Err(e) => return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())),
        };
        let chunk = &self.chunks[index];
        let start = (self.position - chunk.offset) as usize;
        let n = buf.len().min(chunk.data.len() - start);
        buf[..n].copy_from_slice(&chunk.data[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for HttpRangeSource {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(delta) => match self.total_size {
                Some(total) => total.checked_add_signed(delta),
                None => {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::Unsupported,
                        "cannot seek from end: length unknown",
                    ))
                }
            },
        };
        let target = target.ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "seek before start")
        })?;
        self.position = target;
        Ok(target)
    }
}

impl symphonia::core::io::MediaSource for HttpRangeSource {
    fn is_seekable(&self) -> bool {
        self.total_size.is_some()
    }

    fn byte_len(&self) -> Option<u64> {
        self.total_size
    }
}
