//! Video recording of the composited output.
//!
//! A recorder owns a draw loop that, at its own frame rate, copies the video
//! frame and the overlay layer into a recording frame and hands it to a
//! [`FrameSink`]. The loop is independent of the detection loop.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::{capture_timestamp, composite, LensFilter};
use crate::driver::{FramePacer, IntervalPacer};
use crate::frame::VideoSource;
use crate::surface::OverlaySurface;

/// Container formats tried in order; the last one is used when nothing else is.
const MIME_PREFERENCE: [&str; 2] = ["video/webm;codecs=vp9", "video/webm;codecs=vp8"];
const MIME_FALLBACK: &str = "video/webm";

/// Receives recorded frames.
pub trait FrameSink: Send {
    /// Whether the sink can produce the given container type.
    fn supports(&self, mime_type: &str) -> bool;
    fn push_frame(&mut self, frame: &RgbaImage, elapsed: Duration) -> Result<()>;
    /// Flush and close. Returns where the recording ended up, if anywhere.
    fn finish(&mut self) -> Result<Option<PathBuf>>;
}

/// Writes each frame as `frame_NNNNNN.png` into a directory.
pub struct PngSequenceSink {
    dir: PathBuf,
    written: u64,
}

impl PngSequenceSink {
    pub fn create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create recording directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.written
    }
}

impl FrameSink for PngSequenceSink {
    /// Frames stay uncompressed; no container is produced.
    fn supports(&self, _mime_type: &str) -> bool {
        false
    }

    fn push_frame(&mut self, frame: &RgbaImage, _elapsed: Duration) -> Result<()> {
        let path = self.dir.join(format!("frame_{:06}.png", self.written));
        frame
            .save(&path)
            .with_context(|| format!("write frame {}", path.display()))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<PathBuf>> {
        if self.written == 0 {
            return Ok(None);
        }
        Ok(Some(self.dir.clone()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordOptions {
    pub fps: u32,
    pub mirrored: bool,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            fps: 30,
            mirrored: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordingSummary {
    pub frames: u64,
    pub duration: Duration,
    /// Container type chosen from what the sink supports.
    pub mime_type: &'static str,
    /// `video_<timestamp>.webm`, from the recording's start time.
    pub file_name: String,
    pub output: Option<PathBuf>,
}

struct DrawLoop {
    source: Arc<dyn VideoSource>,
    surface: Arc<OverlaySurface>,
    sink: Box<dyn FrameSink>,
    options: RecordOptions,
    recording: Arc<AtomicBool>,
    started: Instant,
    mime_type: &'static str,
    file_name: String,
}

impl DrawLoop {
    /// Draw until stopped or failed. The sink is finished either way.
    fn run(mut self) -> Result<RecordingSummary> {
        let mut frames = 0u64;
        let drawn = self.draw_frames(&mut frames);
        self.recording.store(false, Ordering::SeqCst);
        let finished = self.sink.finish();
        drawn.context("recording stopped")?;
        Ok(RecordingSummary {
            frames,
            duration: self.started.elapsed(),
            mime_type: self.mime_type,
            file_name: self.file_name,
            output: finished?,
        })
    }

    fn draw_frames(&mut self, frames: &mut u64) -> Result<()> {
        let mut pacer = IntervalPacer::new(self.options.fps);
        while self.recording.load(Ordering::SeqCst) {
            if let Some(frame) = self.source.current_frame() {
                let overlay = self.surface.snapshot()?;
                let composed = composite(
                    frame.pixels(),
                    &overlay,
                    1,
                    self.options.mirrored,
                    LensFilter::None,
                );
                self.sink.push_frame(&composed, self.started.elapsed())?;
                *frames += 1;
            }
            pacer.wait_for_refresh();
        }
        Ok(())
    }
}

/// A running recording. Dropping it stops the draw loop and discards the result.
pub struct Recorder {
    recording: Arc<AtomicBool>,
    started: Instant,
    mime_type: &'static str,
    file_name: String,
    worker: Option<JoinHandle<Result<RecordingSummary>>>,
}

impl Recorder {
    pub fn start(
        source: Arc<dyn VideoSource>,
        surface: Arc<OverlaySurface>,
        sink: Box<dyn FrameSink>,
        options: RecordOptions,
    ) -> Result<Self> {
        Self::start_at(source, surface, sink, options, Utc::now())
    }

    /// Start a recording whose file is named after `started_at`.
    pub fn start_at(
        source: Arc<dyn VideoSource>,
        surface: Arc<OverlaySurface>,
        sink: Box<dyn FrameSink>,
        options: RecordOptions,
        started_at: DateTime<Utc>,
    ) -> Result<Self> {
        let mime_type = choose_mime_type(|mime| sink.supports(mime));
        let file_name = video_filename(started_at);
        let recording = Arc::new(AtomicBool::new(true));
        let started = Instant::now();
        let draw = DrawLoop {
            source,
            surface,
            sink,
            options,
            recording: Arc::clone(&recording),
            started,
            mime_type,
            file_name: file_name.clone(),
        };
        let worker = std::thread::Builder::new()
            .name("pumpkin-record".to_string())
            .spawn(move || draw.run())
            .context("spawn recording thread")?;
        log::info!(
            "recording {} as {} at {} fps",
            file_name,
            mime_type,
            options.fps
        );
        Ok(Self {
            recording,
            started,
            mime_type,
            file_name,
            worker: Some(worker),
        })
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// False once stopped, or once the sink has failed.
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// Time since the recording started, as `HH:MM:SS`.
    pub fn elapsed_label(&self) -> String {
        format_time(self.started.elapsed())
    }

    /// Stop the draw loop and finish the sink.
    pub fn stop(mut self) -> Result<RecordingSummary> {
        self.recording.store(false, Ordering::SeqCst);
        let worker = self
            .worker
            .take()
            .context("recording already stopped")?;
        let summary = worker
            .join()
            .map_err(|_| anyhow::anyhow!("recording thread panicked"))??;
        log::info!(
            "recording finished: {} frames in {}",
            summary.frames,
            format_time(summary.duration)
        );
        Ok(summary)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.recording.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => log::warn!("recording ended with error: {:#}", e),
                Err(_) => log::error!("recording thread panicked"),
            }
        }
    }
}

/// `HH:MM:SS`, hours not wrapped.
pub fn format_time(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// First supported container type, falling back to plain webm.
pub fn choose_mime_type(is_supported: impl Fn(&str) -> bool) -> &'static str {
    MIME_PREFERENCE
        .into_iter()
        .find(|mime| is_supported(mime))
        .unwrap_or(MIME_FALLBACK)
}

pub fn video_filename(at: DateTime<Utc>) -> String {
    format!("video_{}.webm", capture_timestamp(at))
}
