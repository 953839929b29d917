//! Shared overlay layer: the canvas the renderer paints and the state it
//! publishes alongside, both read by the capture path.
//!
//! The renderer and the recorder run on different loops. A reader sees the
//! latest completed paint, which is at most one tick behind the video frame
//! it is composited over.

use anyhow::{anyhow, Result};
use image::RgbaImage;
use std::sync::{Mutex, MutexGuard, RwLock};

use crate::canvas::Canvas;
use crate::placement::Placement;

/// What the renderer did on its most recent frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverlayState {
    /// Frames rendered so far.
    pub sequence: u64,
    pub filter_enabled: bool,
    pub face_present: bool,
    pub placement: Option<Placement>,
    pub intensity: f32,
    /// Open/closed state the renderer used (confirmed state in debounced mode).
    pub open: bool,
    /// Crossfade blend, 0 for modes without one.
    pub blend: f32,
    /// Whether any overlay pixels were painted.
    pub drawn: bool,
}

#[derive(Default)]
pub struct OverlaySurface {
    canvas: Mutex<Canvas>,
    state: RwLock<OverlayState>,
}

impl OverlaySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock_canvas(&self) -> Result<MutexGuard<'_, Canvas>> {
        self.canvas
            .lock()
            .map_err(|_| anyhow!("overlay canvas lock poisoned"))
    }

    pub(crate) fn publish(&self, state: OverlayState) -> Result<()> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| anyhow!("overlay state lock poisoned"))?;
        *guard = state;
        Ok(())
    }

    /// Latest published overlay state.
    pub fn state(&self) -> OverlayState {
        match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Copy of the overlay layer as last painted.
    pub fn snapshot(&self) -> Result<RgbaImage> {
        Ok(self.lock_canvas()?.snapshot())
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.lock_canvas()
            .map(|canvas| (canvas.width(), canvas.height()))
            .unwrap_or((0, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publishes_and_reads_state() {
        let surface = OverlaySurface::new();
        assert_eq!(surface.state(), OverlayState::default());
        surface
            .publish(OverlayState {
                sequence: 3,
                drawn: true,
                ..OverlayState::default()
            })
            .unwrap();
        assert_eq!(surface.state().sequence, 3);
        assert!(surface.state().drawn);
    }

    #[test]
    fn snapshot_tracks_canvas_size() {
        let surface = OverlaySurface::new();
        surface.lock_canvas().unwrap().resize(5, 4);
        assert_eq!(surface.dimensions(), (5, 4));
        assert_eq!(surface.snapshot().unwrap().dimensions(), (5, 4));
    }
}
