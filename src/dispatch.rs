//! Method-call dispatch.
//!
//! A caller names an operation and passes a JSON argument map. The
//! [`Dispatcher`] validates the arguments on the calling thread, runs the
//! matching workflow on a background thread, and posts exactly one
//! [`MethodResponse`] back through the reply callback.
//!
//! | method               | result                         |
//! |----------------------|--------------------------------|
//! | `getPlatformVersion` | [`MethodValue::Text`]          |
//! | `getFrame`           | [`MethodValue::Bytes`]         |
//! | `getFrames`          | [`MethodValue::BytesList`]     |
//! | `getFramesBytes`     | [`MethodValue::BytesList`]     |
//! | `getFramesToFiles`   | [`MethodValue::PathList`]      |
//!
//! Unknown methods answer [`MethodResponse::NotImplemented`].
//!
//! # Example
//!
//! ```no_run
//! use serde_json::json;
//! use video_frame_extractor::{Dispatcher, MethodCall};
//!
//! let dispatcher = Dispatcher::new();
//! let call = MethodCall::new(
//!     "getFrames",
//!     json!({ "filePath": "input.mp4", "seconds": [1.0, 2.5], "width": 320 }),
//! );
//! dispatcher.dispatch(call, |response| println!("{response:?}"));
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::{CacheOptions, CachePolicy};
use crate::config::{BATCH_QUALITY, ExtractionConfig, FrameOptions, SINGLE_FRAME_QUALITY, SeekMode};
use crate::decoder::DecoderBackend;
use crate::error::{ErrorCode, ExtractorError, MethodError};
use crate::progress::{CancellationToken, ProgressCallback};
use crate::source::MediaSource;
use crate::strategy::DecodeMode;
use crate::video::FfmpegBackend;
use crate::workflow::FrameExtractor;

/// An operation name plus its argument map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// A successful result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MethodValue {
    Text(String),
    Bytes(Vec<u8>),
    /// One entry per requested timestamp; `None` where nothing was produced.
    BytesList(Vec<Option<Vec<u8>>>),
    /// One entry per requested timestamp; `None` where nothing was produced.
    PathList(Vec<Option<PathBuf>>),
}

/// The single reply to a [`MethodCall`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum MethodResponse {
    Success(MethodValue),
    Error(MethodError),
    /// The method name is not recognised. Not an error.
    NotImplemented,
}

impl MethodResponse {
    pub fn value(&self) -> Option<&MethodValue> {
        match self {
            MethodResponse::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&MethodError> {
        match self {
            MethodResponse::Error(error) => Some(error),
            _ => None,
        }
    }
}

/// Dispatcher settings.
#[derive(Clone, Default)]
#[must_use]
pub struct DispatcherConfig {
    timeout: Option<Duration>,
    cache_root: Option<PathBuf>,
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl Debug for DispatcherConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DispatcherConfig")
            .field("timeout", &self.timeout)
            .field("cache_root", &self.cache_root)
            .field("has_progress", &self.progress.is_some())
            .finish()
    }
}

impl DispatcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop waiting after `timeout`. The call is cancelled and answers
    /// `internal_error`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Cache directory used when a call passes no `cacheDir`.
    pub fn with_cache_root(mut self, directory: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(directory.into());
        self
    }

    /// Observe batch progress of every dispatched call.
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }
}

/// Routes method calls to the extraction workflows.
pub struct Dispatcher<B: DecoderBackend = FfmpegBackend> {
    extractor: Arc<FrameExtractor<B>>,
    config: DispatcherConfig,
}

impl Dispatcher<FfmpegBackend> {
    /// A dispatcher backed by FFmpeg.
    pub fn new() -> Self {
        Self::with_backend(FfmpegBackend)
    }
}

impl Default for Dispatcher<FfmpegBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: DecoderBackend + 'static> Dispatcher<B> {
    /// A dispatcher backed by a custom decoder.
    pub fn with_backend(backend: B) -> Self {
        Self {
            extractor: Arc::new(FrameExtractor::with_backend(backend)),
            config: DispatcherConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn extractor(&self) -> &FrameExtractor<B> {
        &self.extractor
    }

    /// Run `call` to completion on the current thread.
    pub fn handle(&self, call: &MethodCall) -> MethodResponse {
        match parse_operation(call, self.config.cache_root.as_ref()) {
            Parsed::Operation(operation) => {
                execute(Arc::clone(&self.extractor), operation, self.config.clone())
            }
            Parsed::Invalid(error) => MethodResponse::Error(error),
            Parsed::Unknown => MethodResponse::NotImplemented,
        }
    }

    /// Validate `call`, then run it on its own background thread.
    ///
    /// `reply` is invoked exactly once: on the calling thread for invalid
    /// arguments and unknown methods, on the worker thread otherwise.
    pub fn dispatch<F>(&self, call: MethodCall, reply: F)
    where
        F: FnOnce(MethodResponse) + Send + 'static,
    {
        let operation = match parse_operation(&call, self.config.cache_root.as_ref()) {
            Parsed::Operation(operation) => operation,
            Parsed::Invalid(error) => {
                log::debug!("Rejected {}: {error}", call.method);
                return reply(MethodResponse::Error(error));
            }
            Parsed::Unknown => {
                log::debug!("Unknown method {}", call.method);
                return reply(MethodResponse::NotImplemented);
            }
        };

        let slot = Arc::new(Mutex::new(Some(reply)));
        let worker_slot = Arc::clone(&slot);
        let extractor = Arc::clone(&self.extractor);
        let config = self.config.clone();

        let spawned = thread::Builder::new()
            .name(format!("frame-extractor-{}", call.method))
            .spawn(move || deliver(worker_slot.as_ref(), execute(extractor, operation, config)));

        if let Err(error) = spawned {
            log::warn!("Could not start worker for {}: {error}", call.method);
            deliver(
                slot.as_ref(),
                MethodResponse::Error(ExtractorError::IoError(error).into_method_error()),
            );
        }
    }

    /// Run `call` on tokio's blocking pool.
    ///
    /// Argument errors and unknown methods resolve immediately.
    #[cfg(feature = "async")]
    pub async fn dispatch_async(&self, call: MethodCall) -> MethodResponse {
        let operation = match parse_operation(&call, self.config.cache_root.as_ref()) {
            Parsed::Operation(operation) => operation,
            Parsed::Invalid(error) => return MethodResponse::Error(error),
            Parsed::Unknown => return MethodResponse::NotImplemented,
        };

        let token = CancellationToken::new();
        let extraction = extraction_config(&self.config, &token);
        let extractor = Arc::clone(&self.extractor);
        let task =
            tokio::task::spawn_blocking(move || run_operation(&extractor, operation, &extraction));

        let joined = match self.config.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    token.cancel();
                    log::warn!("{} timed out after {timeout:?}", call.method);
                    return error_response(ExtractorError::TimedOut(timeout));
                }
            },
            None => task.await,
        };

        joined.unwrap_or_else(|error| error_response(ExtractorError::WorkerFailed(error.to_string())))
    }
}

fn deliver<F: FnOnce(MethodResponse)>(slot: &Mutex<Option<F>>, response: MethodResponse) {
    let reply = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(reply) = reply {
        reply(response);
    }
}

fn error_response(error: ExtractorError) -> MethodResponse {
    MethodResponse::Error(error.into_method_error())
}

fn extraction_config(config: &DispatcherConfig, token: &CancellationToken) -> ExtractionConfig {
    let extraction = ExtractionConfig::new().with_cancellation(token.clone());
    match &config.progress {
        Some(progress) => extraction.with_progress(Arc::clone(progress)),
        None => extraction,
    }
}

/// Run an operation, enforcing the configured timeout.
fn execute<B: DecoderBackend + 'static>(
    extractor: Arc<FrameExtractor<B>>,
    operation: Operation,
    config: DispatcherConfig,
) -> MethodResponse {
    let token = CancellationToken::new();
    let extraction = extraction_config(&config, &token);

    let Some(timeout) = config.timeout else {
        return run_operation(&extractor, operation, &extraction);
    };

    let (sender, receiver) = crossbeam_channel::bounded(1);
    let spawned = thread::Builder::new()
        .name("frame-extractor-decode".to_string())
        .spawn(move || {
            let _ = sender.send(run_operation(&extractor, operation, &extraction));
        });
    if let Err(error) = spawned {
        return error_response(ExtractorError::IoError(error));
    }

    match receiver.recv_timeout(timeout) {
        Ok(response) => response,
        Err(RecvTimeoutError::Timeout) => {
            token.cancel();
            log::warn!("Call timed out after {timeout:?}; cancelling");
            error_response(ExtractorError::TimedOut(timeout))
        }
        Err(RecvTimeoutError::Disconnected) => error_response(ExtractorError::WorkerFailed(
            "decode worker exited without a result".to_string(),
        )),
    }
}

fn run_operation<B: DecoderBackend>(
    extractor: &FrameExtractor<B>,
    operation: Operation,
    extraction: &ExtractionConfig,
) -> MethodResponse {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match operation {
        Operation::PlatformVersion => MethodResponse::Success(MethodValue::Text(platform_version())),
        Operation::Frame(request) => {
            match extractor.frame(&request.source, request.second, &request.options) {
                Ok(bytes) => MethodResponse::Success(MethodValue::Bytes(bytes)),
                Err(error) => error_response(error),
            }
        }
        Operation::Frames(request) => {
            let config = extraction.clone().with_decode_mode(request.mode);
            match extractor.frames_with_config(
                &request.source,
                &request.seconds,
                &request.options,
                &config,
            ) {
                Ok(frames) => MethodResponse::Success(MethodValue::BytesList(frames)),
                Err(error) => batch_error_response(error),
            }
        }
        Operation::FramesToFiles(request) => {
            let config = extraction.clone().with_decode_mode(request.mode);
            match extractor.frames_to_files_with_config(
                &request.source,
                &request.seconds,
                &request.options,
                &request.cache,
                &config,
            ) {
                Ok(paths) => MethodResponse::Success(MethodValue::PathList(paths)),
                Err(error) => batch_error_response(error),
            }
        }
    }));

    outcome.unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "worker panicked".to_string());
        error_response(ExtractorError::WorkerFailed(message))
    })
}

/// Batch calls only report `invalid_args` or `internal_error`.
fn batch_error_response(error: ExtractorError) -> MethodResponse {
    let mut method_error = error.into_method_error();
    if method_error.code != ErrorCode::InvalidArgs {
        method_error.code = ErrorCode::InternalError;
    }
    MethodResponse::Error(method_error)
}

/// The value answered to `getPlatformVersion`.
pub fn platform_version() -> String {
    format!(
        "{} {} ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}

struct FrameRequest {
    source: MediaSource,
    second: f64,
    options: FrameOptions,
}

struct BatchRequest {
    source: MediaSource,
    seconds: Vec<f64>,
    options: FrameOptions,
    mode: DecodeMode,
    cache: CacheOptions,
}

enum Operation {
    PlatformVersion,
    Frame(FrameRequest),
    /// `getFrames` and `getFramesBytes`; the former always decodes sequentially.
    Frames(BatchRequest),
    FramesToFiles(BatchRequest),
}

enum Parsed {
    Operation(Operation),
    Invalid(MethodError),
    Unknown,
}

impl From<Result<Operation, MethodError>> for Parsed {
    fn from(result: Result<Operation, MethodError>) -> Self {
        match result {
            Ok(operation) => Parsed::Operation(operation),
            Err(error) => Parsed::Invalid(error),
        }
    }
}

fn parse_operation(call: &MethodCall, cache_root: Option<&PathBuf>) -> Parsed {
    match call.method.as_str() {
        "getPlatformVersion" => Parsed::Operation(Operation::PlatformVersion),
        "getFrame" => parse_frame(&call.arguments).map(Operation::Frame).into(),
        "getFrames" => parse_batch(&call.arguments, false, cache_root)
            .map(|request| {
                Operation::Frames(BatchRequest {
                    mode: DecodeMode::Sequential,
                    ..request
                })
            })
            .into(),
        "getFramesBytes" => parse_batch(&call.arguments, true, cache_root)
            .map(Operation::Frames)
            .into(),
        "getFramesToFiles" => parse_batch(&call.arguments, true, cache_root)
            .map(Operation::FramesToFiles)
            .into(),
        _ => Parsed::Unknown,
    }
}

fn parse_frame(arguments: &Value) -> Result<FrameRequest, MethodError> {
    const INVALID: &str = "filePath or second is invalid";

    let arguments = Arguments::new(arguments)?;
    let source = arguments
        .string("filePath")?
        .filter(|path| !path.is_empty())
        .ok_or_else(|| MethodError::invalid_args(INVALID))?;
    let second = arguments
        .number("second")?
        .filter(|second| second.is_finite() && *second >= 0.0)
        .ok_or_else(|| MethodError::invalid_args(INVALID))?;

    let options = frame_options(
        &arguments,
        FrameOptions::single_frame(),
        SINGLE_FRAME_QUALITY,
    )?;

    Ok(FrameRequest {
        source: MediaSource::parse(source),
        second,
        options,
    })
}

fn parse_batch(
    arguments: &Value,
    accepts_mode: bool,
    cache_root: Option<&PathBuf>,
) -> Result<BatchRequest, MethodError> {
    const INVALID: &str = "filePath or seconds is invalid";

    let arguments = Arguments::new(arguments)?;
    let source = arguments
        .string("filePath")?
        .filter(|path| !path.is_empty())
        .ok_or_else(|| MethodError::invalid_args(INVALID))?;
    let seconds = arguments
        .seconds("seconds")?
        .filter(|seconds| !seconds.is_empty())
        .ok_or_else(|| MethodError::invalid_args(INVALID))?;

    let mut options = frame_options(&arguments, FrameOptions::default(), BATCH_QUALITY)?;
    if let Some(apply) = arguments.boolean("applyRotation")? {
        options = options.with_apply_rotation(apply);
    }

    let mode = if accepts_mode {
        ["mode", "modeAndroid", "modeIOS"]
            .into_iter()
            .map(|key| arguments.string(key))
            .find_map(Result::transpose)
            .transpose()?
            .map(DecodeMode::from_label)
            .unwrap_or_default()
    } else {
        DecodeMode::Sequential
    };

    let mut cache = CacheOptions::new();
    if let Some(directory) = arguments.string("cacheDir")?.filter(|dir| !dir.is_empty()) {
        cache = cache.with_directory(directory);
    } else if let Some(root) = cache_root {
        cache = cache.with_directory(root.clone());
    }
    if let Some(policy) = arguments.string("cachePolicy")? {
        cache = cache.with_policy(CachePolicy::from_label(policy));
    }

    Ok(BatchRequest {
        source: MediaSource::parse(source),
        seconds,
        options,
        mode,
        cache,
    })
}

/// Optional fields shared by every frame-producing method.
fn frame_options(
    arguments: &Arguments<'_>,
    defaults: FrameOptions,
    default_quality: u8,
) -> Result<FrameOptions, MethodError> {
    let mut options = defaults.with_size(
        arguments.dimension("width")?,
        arguments.dimension("height")?,
    );
    if let Some(format) = arguments.string("format")? {
        options = options.with_format(format);
    }
    options = options.with_quality(
        arguments
            .integer("quality")?
            .unwrap_or(i64::from(default_quality)),
    );
    if let Some(exact) = arguments.boolean("exactTime")? {
        options = options.with_seek(SeekMode::from_exact(exact));
    }
    Ok(options)
}

/// Typed access to the argument map. `null` values count as absent; any
/// other value of the wrong type is `invalid_args`.
struct Arguments<'a> {
    map: Option<&'a Map<String, Value>>,
}

impl<'a> Arguments<'a> {
    fn new(value: &'a Value) -> Result<Self, MethodError> {
        match value {
            Value::Null => Ok(Self { map: None }),
            Value::Object(map) => Ok(Self { map: Some(map) }),
            _ => Err(MethodError::invalid_args("arguments must be a map")),
        }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map
            .and_then(|map| map.get(key))
            .filter(|value| !value.is_null())
    }

    fn wrong_type(key: &str, expected: &str) -> MethodError {
        MethodError::invalid_args(format!("{key} must be {expected}"))
    }

    fn string(&self, key: &str) -> Result<Option<&'a str>, MethodError> {
        self.get(key)
            .map(|value| value.as_str().ok_or_else(|| Self::wrong_type(key, "a string")))
            .transpose()
    }

    fn number(&self, key: &str) -> Result<Option<f64>, MethodError> {
        self.get(key)
            .map(|value| value.as_f64().ok_or_else(|| Self::wrong_type(key, "a number")))
            .transpose()
    }

    fn boolean(&self, key: &str) -> Result<Option<bool>, MethodError> {
        self.get(key)
            .map(|value| value.as_bool().ok_or_else(|| Self::wrong_type(key, "a boolean")))
            .transpose()
    }

    /// Integers; integral floats such as `320.0` are accepted too.
    fn integer(&self, key: &str) -> Result<Option<i64>, MethodError> {
        self.get(key)
            .map(|value| {
                value
                    .as_i64()
                    .or_else(|| {
                        value
                            .as_f64()
                            .filter(|float| float.fract() == 0.0 && float.abs() < 9.0e15)
                            .map(|float| float as i64)
                    })
                    .ok_or_else(|| Self::wrong_type(key, "an integer"))
            })
            .transpose()
    }

    fn dimension(&self, key: &str) -> Result<Option<u32>, MethodError> {
        self.integer(key)?
            .map(|value| {
                u32::try_from(value)
                    .ok()
                    .filter(|&dimension| dimension > 0)
                    .ok_or_else(|| Self::wrong_type(key, "a positive integer"))
            })
            .transpose()
    }

    /// A list of timestamps. `null` entries become NaN and are treated as
    /// invalid slots.
    fn seconds(&self, key: &str) -> Result<Option<Vec<f64>>, MethodError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        let items = value
            .as_array()
            .ok_or_else(|| Self::wrong_type(key, "a list of numbers"))?;
        items
            .iter()
            .map(|item| match item {
                Value::Null => Ok(f64::NAN),
                other => other
                    .as_f64()
                    .ok_or_else(|| Self::wrong_type(key, "a list of numbers")),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::ImageFormat;

    fn frame(arguments: Value) -> Result<FrameRequest, MethodError> {
        parse_frame(&arguments)
    }

    fn batch(arguments: Value) -> Result<BatchRequest, MethodError> {
        parse_batch(&arguments, true, None)
    }

    #[test]
    fn frame_requires_path_and_second() {
        assert!(frame(json!({ "second": 1.0 })).is_err());
        assert!(frame(json!({ "filePath": "a.mp4" })).is_err());
        assert!(frame(json!({ "filePath": "a.mp4", "second": -0.5 })).is_err());
        assert!(frame(json!({ "filePath": "", "second": 1 })).is_err());
        let error = frame(json!(null)).err().unwrap();
        assert_eq!(error.code, ErrorCode::InvalidArgs);
    }

    #[test]
    fn frame_defaults() {
        let request = frame(json!({ "filePath": "a.mp4", "second": 2 })).unwrap();
        assert_eq!(request.second, 2.0);
        assert_eq!(request.options.format, ImageFormat::Png);
        assert_eq!(request.options.quality, 90);
        assert_eq!(request.options.seek, SeekMode::Keyframe);
        assert_eq!(request.options.width, None);
    }

    #[test]
    fn batch_defaults() {
        let request = batch(json!({ "filePath": "a.mp4", "seconds": [1.0] })).unwrap();
        assert_eq!(request.options.format, ImageFormat::Jpeg);
        assert_eq!(request.options.quality, 85);
        assert!(request.options.apply_rotation);
        assert_eq!(request.mode, DecodeMode::Sequential);
        assert_eq!(request.cache.policy, CachePolicy::Use);
        assert_eq!(request.cache.directory, None);
    }

    #[test]
    fn empty_seconds_are_invalid() {
        let error = batch(json!({ "filePath": "a.mp4", "seconds": [] }))
            .err()
            .unwrap();
        assert_eq!(error.message, "filePath or seconds is invalid");
    }

    #[test]
    fn null_entries_become_invalid_slots() {
        let request = batch(json!({ "filePath": "a.mp4", "seconds": [1.0, null, 3] })).unwrap();
        assert_eq!(request.seconds[0], 1.0);
        assert!(request.seconds[1].is_nan());
        assert_eq!(request.seconds[2], 3.0);
    }

    #[test]
    fn wrong_optional_types_are_rejected() {
        for arguments in [
            json!({ "filePath": "a.mp4", "seconds": [1], "width": "wide" }),
            json!({ "filePath": "a.mp4", "seconds": [1], "width": 0 }),
            json!({ "filePath": "a.mp4", "seconds": [1], "quality": 1.5 }),
            json!({ "filePath": "a.mp4", "seconds": [1], "exactTime": "yes" }),
            json!({ "filePath": "a.mp4", "seconds": [1, "two"] }),
        ] {
            let error = batch(arguments).err().unwrap();
            assert_eq!(error.code, ErrorCode::InvalidArgs);
        }
    }

    #[test]
    fn null_optionals_are_absent() {
        let request = batch(json!({
            "filePath": "a.mp4",
            "seconds": [1],
            "width": null,
            "format": null,
        }))
        .unwrap();
        assert_eq!(request.options.width, None);
        assert_eq!(request.options.format, ImageFormat::Jpeg);
    }

    #[test]
    fn mode_keys_and_aliases() {
        let request =
            batch(json!({ "filePath": "a.mp4", "seconds": [1], "modeAndroid": "codec" })).unwrap();
        assert_eq!(request.mode, DecodeMode::Batched);
        let request =
            batch(json!({ "filePath": "a.mp4", "seconds": [1], "modeIOS": "sync" })).unwrap();
        assert_eq!(request.mode, DecodeMode::Sequential);
        let request =
            batch(json!({ "filePath": "a.mp4", "seconds": [1], "mode": "batched" })).unwrap();
        assert_eq!(request.mode, DecodeMode::Batched);
    }

    #[test]
    fn cache_options_from_arguments() {
        let request = batch(json!({
            "filePath": "a.mp4",
            "seconds": [1],
            "cacheDir": "/tmp/frames",
            "cachePolicy": "refresh",
        }))
        .unwrap();
        assert_eq!(request.cache.directory, Some(PathBuf::from("/tmp/frames")));
        assert_eq!(request.cache.policy, CachePolicy::Refresh);
    }

    #[test]
    fn quality_is_clamped_not_rejected() {
        let request =
            batch(json!({ "filePath": "a.mp4", "seconds": [1], "quality": 400 })).unwrap();
        assert_eq!(request.options.quality, 100);
    }

    #[test]
    fn response_serializes_with_status() {
        let json = serde_json::to_value(MethodResponse::NotImplemented).unwrap();
        assert_eq!(json, json!({ "status": "not_implemented" }));
        let json = serde_json::to_value(MethodResponse::Error(MethodError::invalid_args("x")))
            .unwrap();
        assert_eq!(
            json,
            json!({ "status": "error", "value": { "code": "invalid_args", "message": "x" } })
        );
    }
}
