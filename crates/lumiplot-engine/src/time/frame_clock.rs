use std::time::{Duration, Instant};

/// Frame timing snapshot handed to `Frame` handlers.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Seconds since the previous tick, clamped.
    pub dt: f32,

    /// Seconds since the clock started (or was last reset).
    pub elapsed: f32,

    /// Monotonic timestamp taken at the tick.
    pub now: Instant,

    pub frame_index: u64,
}

/// Frame clock producing `FrameTime` snapshots. One per canvas.
///
/// Delta time is clamped so a stalled or paused loop does not produce a huge
/// step on resume.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
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
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            frame_index: 0,
            dt_min,
            dt_max,
        }
    }

    /// Restarts elapsed time and the delta baseline. The frame counter keeps
    /// counting.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last = now;
    }

    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now.saturating_duration_since(self.last).clamp(self.dt_min, self.dt_max);
        self.last = now;

        let ft = FrameTime {
            dt: dt.as_secs_f32(),
            elapsed: now.saturating_duration_since(self.start).as_secs_f32(),
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
        let mut c = FrameClock::new();
        assert_eq!(c.tick().frame_index, 0);
        assert_eq!(c.tick().frame_index, 1);
        assert_eq!(c.frame_index(), 2);
    }

    #[test]
    fn dt_is_clamped() {
        let mut c = FrameClock::with_clamps(Duration::from_millis(1), Duration::from_millis(50));
        let t0 = c.last;

        // Same instant: raised to the minimum.
        let ft = c.tick_at(t0);
        assert!((ft.dt - 0.001).abs() < 1e-6);

        // Long stall: capped.
        let ft = c.tick_at(t0 + Duration::from_secs(3));
        assert!((ft.dt - 0.05).abs() < 1e-6);
        assert!((ft.elapsed - 3.0).abs() < 1e-3);
    }

    #[test]
    fn reset_restarts_elapsed() {
        let mut c = FrameClock::new();
        let later = c.start + Duration::from_secs(2);
        assert!(c.tick_at(later).elapsed >= 2.0);

        c.reset();
        let ft = c.tick_at(c.start);
        assert_eq!(ft.elapsed, 0.0);
        assert_eq!(ft.frame_index, 1);
    }
}
