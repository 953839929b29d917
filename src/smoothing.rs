//! Frame-to-frame smoothing of the expression signal.
//!
//! - `Debouncer`: accepts an open/closed change only after it has held for a
//!   full window. Any sample that disagrees with the pending target restarts
//!   the window, so oscillation never confirms.
//! - `Crossfade`: a blend value that walks toward 0 or 1 by a fixed step per
//!   frame.

use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DebouncePhase {
    Settled,
    Pending { target: bool, deadline: Instant },
}

/// Debounce state machine: `Settled(confirmed)` ⇄ `Pending { target, deadline }`.
#[derive(Clone, Debug)]
pub struct Debouncer {
    window: Duration,
    confirmed: bool,
    phase: DebouncePhase,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            confirmed: false,
            phase: DebouncePhase::Settled,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Feed one raw sample observed at `now`. Returns the confirmed state.
    pub fn sample(&mut self, raw: bool, now: Instant) -> bool {
        self.phase = match self.phase {
            _ if raw == self.confirmed => DebouncePhase::Settled,
            DebouncePhase::Pending { target, deadline } if target == raw => {
                DebouncePhase::Pending { target, deadline }
            }
            _ => DebouncePhase::Pending {
                target: raw,
                deadline: now + self.window,
            },
        };
        self.poll(now)
    }

    /// Commit a pending change whose deadline has passed. Returns the confirmed state.
    pub fn poll(&mut self, now: Instant) -> bool {
        if let DebouncePhase::Pending { target, deadline } = self.phase {
            if now >= deadline {
                log::debug!("debounce confirmed mouth {}", open_label(target));
                self.confirmed = target;
                self.phase = DebouncePhase::Settled;
            }
        }
        self.confirmed
    }

    pub fn confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.phase, DebouncePhase::Pending { .. })
    }

    pub fn reset(&mut self) {
        self.confirmed = false;
        self.phase = DebouncePhase::Settled;
    }
}

fn open_label(open: bool) -> &'static str {
    if open {
        "open"
    } else {
        "closed"
    }
}

/// Blend between the closed (0) and open (1) overlay.
#[derive(Clone, Debug, PartialEq)]
pub struct Crossfade {
    step: f32,
    blend: f32,
}

impl Crossfade {
    pub fn new(step: f32) -> Self {
        Self {
            step: step.clamp(0.0, 1.0),
            blend: 0.0,
        }
    }

    /// Move one step toward `open ? 1 : 0`. Returns the new blend.
    pub fn approach(&mut self, open: bool) -> f32 {
        self.blend = if open {
            (self.blend + self.step).min(1.0)
        } else {
            (self.blend - self.step).max(0.0)
        };
        self.blend
    }

    pub fn blend(&self) -> f32 {
        self.blend
    }

    pub fn reset(&mut self) {
        self.blend = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(200);

    #[test]
    fn oscillation_inside_window_never_confirms() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);
        let samples = [false, true, false, true, false];
        for (i, raw) in samples.into_iter().enumerate() {
            let now = start + Duration::from_millis(50 * i as u64);
            assert!(!debouncer.sample(raw, now));
        }
        assert!(!debouncer.poll(start + Duration::from_secs(5)));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn sustained_change_confirms_once_after_window() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);
        let mut switches = 0;
        let mut last = debouncer.confirmed();
        for ms in (0..=600).step_by(20) {
            let now = start + Duration::from_millis(ms);
            let confirmed = debouncer.sample(true, now);
            if confirmed != last {
                switches += 1;
                assert!(ms >= 200, "confirmed early at {ms}ms");
                last = confirmed;
            }
        }
        assert_eq!(switches, 1);
        assert!(debouncer.confirmed());
    }

    #[test]
    fn interrupted_change_restarts_window() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);
        debouncer.sample(true, start);
        debouncer.sample(false, start + Duration::from_millis(150));
        debouncer.sample(true, start + Duration::from_millis(160));
        assert!(!debouncer.poll(start + Duration::from_millis(300)));
        assert!(debouncer.poll(start + Duration::from_millis(360)));
    }

    #[test]
    fn reset_returns_to_closed() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::ZERO);
        assert!(debouncer.sample(true, start));
        debouncer.reset();
        assert!(!debouncer.confirmed());
    }

    #[test]
    fn crossfade_walks_toward_target() {
        let step = 0.3;
        let mut fade = Crossfade::new(step);
        let mut previous = fade.blend();
        for n in 1..=6 {
            let blend = fade.approach(true);
            let expected = (n as f32 * step).min(1.0);
            assert!((blend - expected).abs() < 1e-5, "tick {n}: {blend}");
            assert!(blend >= previous);
            assert!((0.0..=1.0).contains(&blend));
            previous = blend;
        }
        assert_eq!(fade.blend(), 1.0);

        for _ in 0..6 {
            let blend = fade.approach(false);
            assert!(blend <= previous);
            previous = blend;
        }
        assert_eq!(fade.blend(), 0.0);
    }

    #[test]
    fn crossfade_reset() {
        let mut fade = Crossfade::new(0.3);
        fade.approach(true);
        fade.reset();
        assert_eq!(fade.blend(), 0.0);
    }
}
