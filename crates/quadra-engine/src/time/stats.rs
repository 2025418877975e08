use std::time::Duration;

use super::FrameTime;

/// Frame rate figures averaged over one reporting window.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameReport {
    pub fps: f32,
    /// Mean frame time in milliseconds.
    pub frame_ms: f32,
}

impl std::fmt::Display for FrameReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3} ms/frame ({:.1} FPS)", self.frame_ms, self.fps)
    }
}

/// Accumulates frame times and produces a [`FrameReport`] once per
/// `interval`.
#[derive(Debug, Clone)]
pub struct FrameStats {
    interval: Duration,
    elapsed: Duration,
    frames: u32,
    latest: Option<FrameReport>,
}

impl FrameStats {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            elapsed: Duration::ZERO,
            frames: 0,
            latest: None,
        }
    }

    /// Adds one frame. Returns a fresh report when the interval has elapsed
    /// and some time has actually passed.
    pub fn record(&mut self, time: &FrameTime) -> Option<FrameReport> {
        self.elapsed += time.raw_dt;
        self.frames += 1;

        let secs = self.elapsed.as_secs_f32();
        if self.elapsed < self.interval || secs <= 0.0 {
            return None;
        }

        let report = FrameReport {
            fps: self.frames as f32 / secs,
            frame_ms: secs * 1000.0 / self.frames as f32,
        };

        self.elapsed = Duration::ZERO;
        self.frames = 0;
        self.latest = Some(report);
        Some(report)
    }

    /// Most recent report, if a full interval has passed.
    pub fn latest(&self) -> Option<FrameReport> {
        self.latest
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
