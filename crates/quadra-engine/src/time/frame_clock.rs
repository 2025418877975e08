use std::time::{Duration, Instant};

/// Timing of one frame.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Seconds since the previous tick, clamped.
    pub dt: f32,
    /// Unclamped wall time since the previous tick.
    pub raw_dt: Duration,
    pub now: Instant,
    /// Starts at 0 and counts every tick.
    pub frame_index: u64,
}

/// Produces one [`FrameTime`] per presented frame.
///
/// `dt` is clamped so a stall (debugger, minimized window) does not hand the
/// app a huge step; `raw_dt` keeps the real value for statistics.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    pub const DEFAULT_DT_MIN: Duration = Duration::from_micros(100);
    pub const DEFAULT_DT_MAX: Duration = Duration::from_millis(250);

    pub fn new() -> Self {
        Self::with_clamps(Self::DEFAULT_DT_MIN, Self::DEFAULT_DT_MAX)
    }

    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        Self {
            last: Instant::now(),
            frame_index: 0,
            dt_min,
            dt_max,
        }
    }

    /// Restarts delta measurement from now, e.g. after the window was
    /// hidden.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> FrameTime {
        let raw_dt = now.saturating_duration_since(self.last);
        self.last = now;

        let ft = FrameTime {
            dt: raw_dt.clamp(self.dt_min, self.dt_max).as_secs_f32(),
            raw_dt,
            now,
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_index_counts_ticks() {
        let mut clock = FrameClock::new();
        let start = Instant::now();

        let indices: Vec<u64> = (1..=3)
            .map(|i| clock.tick_at(start + Duration::from_millis(16 * i)).frame_index)
            .collect();
        assert_eq!(indices, [0, 1, 2]);
    }

    #[test]
    fn dt_is_clamped_but_raw_dt_is_not() {
        let mut clock = FrameClock::with_clamps(Duration::from_millis(1), Duration::from_millis(100));
        let start = clock.last;

        let stalled = clock.tick_at(start + Duration::from_secs(2));
        assert_eq!(stalled.dt, 0.1);
        assert_eq!(stalled.raw_dt, Duration::from_secs(2));

        let instant = clock.tick_at(start + Duration::from_secs(2));
        assert_eq!(instant.dt, 0.001);
        assert_eq!(instant.raw_dt, Duration::ZERO);
    }
}
