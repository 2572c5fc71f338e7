//! On-disk frame cache.
//!
//! Files are named after everything that affects their content, so a file's
//! existence is enough to reuse it. There is no eviction: files live until
//! something outside this crate removes them.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::FrameOptions;
use crate::error::ExtractorError;
use crate::source::MediaSource;

/// Subdirectory of the platform cache root used when no directory is given.
pub const CACHE_DIR_NAME: &str = "video_frame_extractor";

/// What to do when a cache file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CachePolicy {
    /// Return the existing file without decoding.
    #[default]
    Use,
    /// Decode again and overwrite.
    Refresh,
}

impl CachePolicy {
    /// `use` (any case) selects [`CachePolicy::Use`]; anything else refreshes.
    pub fn from_label(label: &str) -> Self {
        if label.eq_ignore_ascii_case("use") {
            CachePolicy::Use
        } else {
            CachePolicy::Refresh
        }
    }
}

/// Where cache files go and whether existing ones are reused.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[must_use]
pub struct CacheOptions {
    /// Directory override. `None` means [`default_cache_dir`].
    pub directory: Option<PathBuf>,
    /// Reuse policy.
    pub policy: CachePolicy,
}

impl CacheOptions {
    /// Default directory, [`CachePolicy::Use`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Write cache files to `directory` instead of the default location.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Set the reuse policy.
    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The directory files are written to.
    pub fn resolved_directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(default_cache_dir)
    }
}

/// `<platform cache dir>/video_frame_extractor`, or the system temp
/// directory when the platform has no cache dir.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_DIR_NAME)
}

/// The inputs that determine a cache file's content.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheKey {
    base_name: String,
    seconds: f64,
    width: u32,
    height: u32,
    format_label: String,
    quality: u8,
    apply_rotation: bool,
    extension: &'static str,
}

impl CacheKey {
    /// Build the key for one frame of `source` at `seconds`.
    pub fn new(source: &MediaSource, seconds: f64, options: &FrameOptions) -> Self {
        Self {
            base_name: source.base_name(),
            seconds,
            width: options.width.unwrap_or(0),
            height: options.height.unwrap_or(0),
            format_label: options.format_label.clone(),
            quality: options.quality,
            apply_rotation: options.apply_rotation,
            extension: options.format.extension(),
        }
    }

    /// `vf_{base}_{seconds}_{w}x{h}_{format}_{quality}_{rotate}.{ext}`
    ///
    /// ```
    /// use video_frame_extractor::{CacheKey, FrameOptions, MediaSource};
    ///
    /// let key = CacheKey::new(
    ///     &MediaSource::parse("/videos/clip.mp4"),
    ///     1.0,
    ///     &FrameOptions::default().with_width(320),
    /// );
    /// assert_eq!(key.file_name(), "vf_clip.mp4_1.0_320x0_jpeg_85_1.jpg");
    /// ```
    pub fn file_name(&self) -> String {
        format!(
            "vf_{}_{:?}_{}x{}_{}_{}_{}.{}",
            self.base_name,
            self.seconds,
            self.width,
            self.height,
            self.format_label,
            self.quality,
            u8::from(self.apply_rotation),
            self.extension,
        )
    }
}

/// A cache directory plus its reuse policy.
#[derive(Debug, Clone)]
pub struct FrameCache {
    directory: PathBuf,
    policy: CachePolicy,
}

impl FrameCache {
    pub fn new(options: &CacheOptions) -> Self {
        Self {
            directory: options.resolved_directory(),
            policy: options.policy,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.directory.join(key.file_name())
    }

    /// The existing file for `key`, if the policy allows reuse.
    pub fn lookup(&self, key: &CacheKey) -> Option<PathBuf> {
        if self.policy != CachePolicy::Use {
            return None;
        }
        let path = self.path_for(key);
        path.is_file().then_some(path)
    }

    /// Write `bytes` under `key`, creating the directory if needed.
    ///
    /// Concurrent writers of the same key race; the last write wins.
    pub fn store(&self, key: &CacheKey, bytes: &[u8]) -> Result<PathBuf, ExtractorError> {
        fs::create_dir_all(&self.directory)?;
        let path = self.path_for(key);
        fs::write(&path, bytes)?;
        log::debug!("Cached {} bytes at {}", bytes.len(), path.display());
        Ok(path)
    }
}
