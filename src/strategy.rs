//! Decode strategies for batch extraction.
//!
//! [`DecodeMode::Sequential`] opens one decoder and seeks for every
//! timestamp in request order. [`DecodeMode::Batched`] sorts the timestamps,
//! groups nearby ones into runs, and lets a small pool of scoped workers
//! decode the runs on their own decoder handles. Completions arrive in
//! arbitrary order and are mapped back to request indices by a
//! [`Reindexer`].

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use image::DynamicImage;

use crate::config::{ExtractionConfig, SeekMode};
use crate::decoder::{DecoderBackend, FrameDecoder};
use crate::error::ExtractorError;
use crate::metadata::VideoMetadata;
use crate::source::MediaSource;

/// Timestamps closer than this many seconds share a run.
pub(crate) const RUN_GAP_SECONDS: f64 = 2.0;

/// How batch timestamps are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DecodeMode {
    /// One decoder, one seek per timestamp, request order.
    #[default]
    Sequential,
    /// Runs of nearby timestamps decoded concurrently, results re-indexed.
    Batched,
}

impl DecodeMode {
    /// Parse a mode label.
    ///
    /// `batched`, `codec` and `async` select [`DecodeMode::Batched`]; every
    /// other label (including `sequential`, `default` and `sync`) selects
    /// [`DecodeMode::Sequential`].
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "batched" | "codec" | "async" => DecodeMode::Batched,
            _ => DecodeMode::Sequential,
        }
    }

    /// Canonical label.
    pub fn label(self) -> &'static str {
        match self {
            DecodeMode::Sequential => "sequential",
            DecodeMode::Batched => "batched",
        }
    }
}

/// One valid timestamp waiting to be decoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DecodeJob {
    /// Index in the caller's request.
    pub(crate) index: usize,
    /// Requested time in seconds. Always finite and non-negative.
    pub(crate) seconds: f64,
}

/// A decoded (or missing) frame for one request slot.
#[derive(Debug)]
pub(crate) struct DecodedFrame {
    pub(crate) index: usize,
    pub(crate) seconds: f64,
    pub(crate) frame: Option<DynamicImage>,
}

/// Receives decoded frames. Returning `Err` aborts the batch.
pub(crate) type FrameSink<'s> =
    dyn FnMut(&VideoMetadata, DecodedFrame) -> Result<(), ExtractorError> + 's;

/// Turns a set of decode jobs into decoded frames.
pub(crate) trait DecodeStrategy {
    /// Decode every job and pass each result to `sink` exactly once.
    ///
    /// The source is opened even when `jobs` is empty, so an unreadable
    /// source fails the call in every mode.
    fn decode<B: DecoderBackend>(
        &self,
        backend: &B,
        source: &MediaSource,
        jobs: &[DecodeJob],
        seek: SeekMode,
        config: &ExtractionConfig,
        sink: &mut FrameSink<'_>,
    ) -> Result<(), ExtractorError>;
}

/// Seek and decode each job in request order on a single handle.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SequentialDecode;

impl DecodeStrategy for SequentialDecode {
    fn decode<B: DecoderBackend>(
        &self,
        backend: &B,
        source: &MediaSource,
        jobs: &[DecodeJob],
        seek: SeekMode,
        config: &ExtractionConfig,
        sink: &mut FrameSink<'_>,
    ) -> Result<(), ExtractorError> {
        let mut decoder = backend.open(source)?;

        for job in jobs {
            if config.is_cancelled() {
                return Err(ExtractorError::Cancelled);
            }
            let frame = decoder.decode_at(job.seconds, seek)?;
            sink(
                decoder.metadata(),
                DecodedFrame {
                    index: job.index,
                    seconds: job.seconds,
                    frame,
                },
            )?;
        }

        Ok(())
    }
}

/// Decode runs of nearby timestamps on concurrent worker handles.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BatchedDecode {
    /// Maximum distance between neighbouring timestamps in one run.
    pub(crate) run_gap: f64,
    /// Upper bound on concurrent decoder handles.
    pub(crate) max_workers: usize,
}

impl Default for BatchedDecode {
    fn default() -> Self {
        Self {
            run_gap: RUN_GAP_SECONDS,
            max_workers: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }
}

enum WorkerEvent {
    Opened(VideoMetadata),
    Completed { requested: f64, frame: Option<DynamicImage> },
    Failed(ExtractorError),
}

impl DecodeStrategy for BatchedDecode {
    fn decode<B: DecoderBackend>(
        &self,
        backend: &B,
        source: &MediaSource,
        jobs: &[DecodeJob],
        seek: SeekMode,
        config: &ExtractionConfig,
        sink: &mut FrameSink<'_>,
    ) -> Result<(), ExtractorError> {
        let runs = plan_runs(jobs, self.run_gap);
        if runs.is_empty() {
            backend.open(source)?;
            return Ok(());
        }

        let workers = runs.len().min(self.max_workers.max(1));
        log::debug!(
            "Batched decode of {} timestamps in {} runs on {workers} workers",
            jobs.len(),
            runs.len()
        );

        let (run_sender, run_receiver) = crossbeam_channel::unbounded::<Vec<f64>>();
        for run in runs {
            // The receiver is alive in this scope, so sending cannot fail.
            let _ = run_sender.send(run);
        }
        drop(run_sender);

        // Workers block once a few decoded frames are waiting, so the number
        // of frames in flight stays proportional to the worker count.
        let (event_sender, event_receiver) = crossbeam_channel::bounded::<WorkerEvent>(workers);
        let stop = AtomicBool::new(false);

        thread::scope(|scope| {
            let mut failure: Option<ExtractorError> = None;

            for worker in 0..workers {
                let runs = run_receiver.clone();
                let events = event_sender.clone();
                let stop = &stop;
                let spawned = thread::Builder::new()
                    .name(format!("frame-decode-{worker}"))
                    .spawn_scoped(scope, move || {
                        decode_worker(backend, source, seek, config, stop, runs, events)
                    });
                if let Err(error) = spawned {
                    // Remaining workers drain the run queue.
                    if worker == 0 {
                        failure = Some(ExtractorError::IoError(error));
                    } else {
                        log::warn!("Could not start decode worker {worker}: {error}");
                    }
                    break;
                }
            }
            drop(event_sender);

            let mut reindexer = Reindexer::new(jobs);
            let mut metadata: Option<VideoMetadata> = None;

            for event in event_receiver.iter() {
                match event {
                    WorkerEvent::Opened(opened) => {
                        metadata.get_or_insert(opened);
                    }
                    WorkerEvent::Completed { requested, frame } => {
                        if failure.is_some() {
                            continue;
                        }
                        let Some(position) = reindexer.assign(requested) else {
                            log::warn!("Discarding completion for unrequested time {requested}s");
                            continue;
                        };
                        let Some(metadata) = metadata.as_ref() else {
                            failure = Some(ExtractorError::WorkerFailed(
                                "completion arrived before the decoder opened".to_string(),
                            ));
                            stop.store(true, Ordering::Release);
                            continue;
                        };
                        let job = jobs[position];
                        let delivered = sink(
                            metadata,
                            DecodedFrame {
                                index: job.index,
                                seconds: job.seconds,
                                frame,
                            },
                        );
                        if let Err(error) = delivered {
                            failure = Some(error);
                            stop.store(true, Ordering::Release);
                        } else if reindexer.is_complete() {
                            break;
                        }
                    }
                    WorkerEvent::Failed(error) => {
                        failure.get_or_insert(error);
                        stop.store(true, Ordering::Release);
                    }
                }
            }

            if let Some(error) = failure {
                return Err(error);
            }
            if !reindexer.is_complete() && config.is_cancelled() {
                return Err(ExtractorError::Cancelled);
            }
            Ok(())
        })
    }
}

fn decode_worker<B: DecoderBackend>(
    backend: &B,
    source: &MediaSource,
    seek: SeekMode,
    config: &ExtractionConfig,
    stop: &AtomicBool,
    runs: Receiver<Vec<f64>>,
    events: Sender<WorkerEvent>,
) {
    let mut decoder: Option<B::Decoder> = None;

    for run in runs.iter() {
        if stop.load(Ordering::Acquire) || config.is_cancelled() {
            return;
        }

        if decoder.is_none() {
            match backend.open(source) {
                Ok(opened) => {
                    let _ = events.send(WorkerEvent::Opened(opened.metadata().clone()));
                    decoder = Some(opened);
                }
                Err(error) => {
                    let _ = events.send(WorkerEvent::Failed(error));
                    return;
                }
            }
        }
        let Some(active) = decoder.as_mut() else {
            return;
        };

        match active.decode_run(&run, seek) {
            Ok(frames) => {
                for (requested, frame) in run.iter().copied().zip(frames) {
                    if events
                        .send(WorkerEvent::Completed { requested, frame })
                        .is_err()
                    {
                        return;
                    }
                }
            }
            Err(error) => {
                let _ = events.send(WorkerEvent::Failed(error));
                return;
            }
        }
    }
}

/// Sort job timestamps and split them wherever neighbours are more than
/// `gap` seconds apart. Duplicates are kept.
pub(crate) fn plan_runs(jobs: &[DecodeJob], gap: f64) -> Vec<Vec<f64>> {
    let mut sorted: Vec<f64> = jobs.iter().map(|job| job.seconds).collect();
    sorted.sort_by(f64::total_cmp);

    let mut runs = Vec::new();
    let mut current: Vec<f64> = Vec::new();
    for seconds in sorted {
        if current.last().is_some_and(|&last| seconds - last > gap) {
            runs.push(std::mem::take(&mut current));
        }
        current.push(seconds);
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

/// Maps out-of-order completions back to request positions.
///
/// Each completion claims the first still-open job whose timestamp equals
/// the completion's requested timestamp, so duplicate timestamps fill their
/// slots left to right.
pub(crate) struct Reindexer<'j> {
    jobs: &'j [DecodeJob],
    open: Vec<bool>,
    remaining: usize,
}

impl<'j> Reindexer<'j> {
    pub(crate) fn new(jobs: &'j [DecodeJob]) -> Self {
        Self {
            jobs,
            open: vec![true; jobs.len()],
            remaining: jobs.len(),
        }
    }

    /// Claim the slot for a completion. Returns the position in `jobs`.
    pub(crate) fn assign(&mut self, requested: f64) -> Option<usize> {
        let position = self
            .jobs
            .iter()
            .zip(&self.open)
            .position(|(job, &open)| open && job.seconds == requested)?;
        self.open[position] = false;
        self.remaining -= 1;
        Some(position)
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.remaining == 0
    }
}
