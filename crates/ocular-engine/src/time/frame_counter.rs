use std::time::{Duration, Instant};

/// Counts presented frames and reports the rate once per interval.
#[derive(Debug, Clone)]
pub struct FrameCounter {
    interval: Duration,
    started: Option<Instant>,
    frames: u32,
    last_fps: Option<f32>,
}

impl FrameCounter {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            started: None,
            frames: 0,
            last_fps: None,
        }
    }

    /// Most recent report.
    pub fn fps(&self) -> Option<f32> {
        self.last_fps
    }

    /// Counts one frame presented at `now`. Returns the frames per second
    /// of the interval that just ended, if one did.
    pub fn tick(&mut self, now: Instant) -> Option<f32> {
        let Some(started) = self.started else {
            self.started = Some(now);
            return None;
        };

        self.frames += 1;
        let elapsed = now.saturating_duration_since(started);
        if elapsed < self.interval {
            return None;
        }

        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.started = Some(now);
        self.frames = 0;
        self.last_fps = Some(fps);
        Some(fps)
    }
}

impl Default for FrameCounter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

/// Caps the frame rate by sleeping out the rest of each frame period.
#[derive(Debug, Clone)]
pub struct FrameLimiter {
    period: Duration,
    last: Option<Instant>,
}

impl FrameLimiter {
    /// Limits to `fps` frames per second. Non-positive rates are treated as
    /// one frame per second.
    pub fn new(fps: f32) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / fps.max(1.0) as f64),
            last: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Time left in the current period at `now`; starts the next period.
    pub fn delay(&mut self, now: Instant) -> Duration {
        let wait = match self.last {
            Some(last) => self.period.saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        };
        self.last = Some(now + wait);
        wait
    }

    /// Sleeps until the current period is over.
    pub fn wait(&mut self) {
        let wait = self.delay(Instant::now());
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
    }
}
