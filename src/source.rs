//! Media source handles.
//!
//! Callers identify a video either by a local path, a `file://` URI, or an
//! opaque URL that is handed to FFmpeg verbatim (`http://`, `rtsp://`, ...).

use std::fmt;
use std::path::{Path, PathBuf};

const FILE_SCHEME: &str = "file://";

/// Where frames are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// A file on the local filesystem.
    Path(PathBuf),
    /// Any other URL understood by the demuxer.
    Url(String),
}

impl MediaSource {
    /// Classify a caller-supplied source string.
    ///
    /// `file://` prefixes are stripped; other strings containing `://` are
    /// kept as URLs; everything else is a path.
    pub fn parse(input: &str) -> Self {
        if let Some(path) = input.strip_prefix(FILE_SCHEME) {
            MediaSource::Path(PathBuf::from(path))
        } else if input.contains("://") {
            MediaSource::Url(input.to_string())
        } else {
            MediaSource::Path(PathBuf::from(input))
        }
    }

    /// The string passed to the demuxer.
    pub fn as_input(&self) -> &Path {
        match self {
            MediaSource::Path(path) => path,
            MediaSource::Url(url) => Path::new(url),
        }
    }

    /// Final path component, used as the source part of cache keys.
    ///
    /// For URLs the query string and fragment are ignored.
    pub fn base_name(&self) -> String {
        match self {
            MediaSource::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string_lossy().into_owned()),
            MediaSource::Url(url) => {
                let trimmed = url.split(['?', '#']).next().unwrap_or(url);
                trimmed
                    .trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .unwrap_or(trimmed)
                    .to_string()
            }
        }
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaSource::Path(path) => write!(f, "{}", path.display()),
            MediaSource::Url(url) => f.write_str(url),
        }
    }
}

impl From<&str> for MediaSource {
    fn from(input: &str) -> Self {
        MediaSource::parse(input)
    }
}

impl From<PathBuf> for MediaSource {
    fn from(path: PathBuf) -> Self {
        MediaSource::Path(path)
    }
}
