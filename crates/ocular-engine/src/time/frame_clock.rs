use std::time::{Duration, Instant};

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Seconds since the previous tick, clamped.
    pub dt: f32,

    pub now: Instant,

    /// Monotonic frame counter.
    pub frame_index: u64,
}

/// Per-window clock producing [`FrameTime`] snapshots.
///
/// Delta time is clamped so a stalled or minimized window does not hand a
/// huge step to animation code.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::with_clamps(Duration::from_micros(100), Duration::from_millis(250))
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

    /// Restarts delta time from now, e.g. after the window was hidden.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max);
        self.last = now;

        let time = FrameTime {
            dt: dt.as_secs_f32(),
            now,
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        time
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
    fn ticks_count_frames_and_clamp_dt() {
        let start = Instant::now();
        let mut clock = FrameClock::new();
        clock.last = start;

        let first = clock.tick_at(start + Duration::from_millis(16));
        assert_eq!(first.frame_index, 0);
        assert!((first.dt - 0.016).abs() < 1e-6);

        let stalled = clock.tick_at(start + Duration::from_secs(10));
        assert_eq!(stalled.frame_index, 1);
        assert_eq!(stalled.dt, 0.25);
    }
}
