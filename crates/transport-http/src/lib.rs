// HTTP transport for streaming sources

pub mod client;
pub mod range_source;

pub use client::HttpClient;
pub use range_source::{DownloadProgress, HttpRangeSource};

/// True for URIs this crate can open.
pub fn is_http_uri(uri: &str) -> bool {
    let lower = uri.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
