// Media source selection

use std::fmt;
use std::path::{Path, PathBuf};

/// Where the audio comes from. Exactly one of a local path or a URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Path(PathBuf),
    Uri(String),
}

impl MediaSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        MediaSource::Path(path.into())
    }

    pub fn uri(uri: impl Into<String>) -> Self {
        MediaSource::Uri(uri.into())
    }

    /// Stable identity used to detect that the source changed under an async operation.
    pub fn identity(&self) -> String {
        match self {
            MediaSource::Path(path) => path.to_string_lossy().into_owned(),
            MediaSource::Uri(uri) => uri.clone(),
        }
    }

    /// URI sources may block on the network, so their seeks run off the caller's thread.
    pub fn is_uri(&self) -> bool {
        matches!(self, MediaSource::Uri(_))
    }

    /// Local file behind this source, if any (`file://` URIs included).
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            MediaSource::Path(path) => Some(path.as_path()),
            MediaSource::Uri(uri) => uri.strip_prefix("file://").map(Path::new),
        }
    }

    /// Lowercase file extension, used as a probe hint.
    pub fn extension(&self) -> Option<String> {
        let name = match self {
            MediaSource::Path(path) => path.to_string_lossy().into_owned(),
            MediaSource::Uri(uri) => uri
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
        };
        let file = name.rsplit('/').next()?;
        let (_, ext) = file.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_ascii_lowercase())
        }
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaSource::Path(path) => write!(f, "file {}", path.display()),
            MediaSource::Uri(uri) => write!(f, "uri {}", uri),
        }
    }
}
