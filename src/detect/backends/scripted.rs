use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::detect::backend::FaceDetector;
use crate::detect::result::{FaceLandmarks, FrameResult};
use crate::frame::VideoFrame;

/// One scripted detector response.
///
/// JSON form: `"no_face"`, `{"face": [{"x":..,"y":..}, ...]}` or `{"fail": "reason"}`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptStep {
    NoFace,
    Face(FaceLandmarks),
    Fail(String),
}

/// Shared counters for a scripted detector that has been moved into a session.
#[derive(Clone, Debug, Default)]
pub struct DetectorProbe {
    submissions: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl DetectorProbe {
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Detector that replays a fixed sequence of responses.
///
/// Once the script is exhausted it either starts over (`cycle`) or reports
/// `NoFace` forever.
pub struct ScriptedDetector {
    script: Vec<ScriptStep>,
    pending: VecDeque<ScriptStep>,
    cycle: bool,
    latency: Duration,
    probe: DetectorProbe,
}

impl ScriptedDetector {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            pending: script.iter().cloned().collect(),
            script,
            cycle: false,
            latency: Duration::ZERO,
            probe: DetectorProbe::default(),
        }
    }

    /// Load a script from a JSON array of steps.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read landmark script {}", path.display()))?;
        let script: Vec<ScriptStep> = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid landmark script {}: {}", path.display(), e))?;
        Ok(Self::new(script))
    }

    pub fn cycling(mut self) -> Self {
        self.cycle = true;
        self
    }

    /// Block every submission for `latency`, simulating a slow model.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn probe(&self) -> DetectorProbe {
        self.probe.clone()
    }

    fn next_step(&mut self) -> ScriptStep {
        if self.pending.is_empty() && self.cycle {
            self.pending.extend(self.script.iter().cloned());
        }
        self.pending.pop_front().unwrap_or(ScriptStep::NoFace)
    }
}

impl FaceDetector for ScriptedDetector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn submit(&mut self, _frame: &VideoFrame) -> Result<FrameResult> {
        self.probe.submissions.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        match self.next_step() {
            ScriptStep::NoFace => Ok(FrameResult::NoFace),
            ScriptStep::Face(landmarks) => Ok(FrameResult::Face(landmarks)),
            ScriptStep::Fail(reason) => Err(anyhow!("scripted failure: {}", reason)),
        }
    }

    fn close(&mut self) {
        self.probe.closed.store(true, Ordering::SeqCst);
    }
}
