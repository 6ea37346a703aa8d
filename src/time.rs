use std::time::{Duration, Instant};

/// Largest step handed to timelines and the scene in one frame.
pub const MAX_FRAME_DELTA: f32 = 0.1;

enum Source {
    Wall { last: Instant },
    Fixed { step: f32 },
}

/// Frame clock feeding [`Stage::frame`](crate::stage::Stage::frame).
pub struct FrameClock {
    source: Source,
    elapsed: f32,
    pub delta: Duration,
}

impl FrameClock {
    pub fn wall() -> Self {
        Self { source: Source::Wall { last: Instant::now() }, elapsed: 0.0, delta: Duration::ZERO }
    }

    /// Deterministic clock advancing `step` seconds per tick.
    pub fn fixed(step: f32) -> Self {
        let step = if step.is_finite() { step.max(0.0) } else { 0.0 };
        Self { source: Source::Fixed { step }, elapsed: 0.0, delta: Duration::ZERO }
    }

    /// Returns the clamped delta for this frame, in seconds.
    pub fn tick(&mut self) -> f32 {
        let raw = match &mut self.source {
            Source::Wall { last } => {
                let now = Instant::now();
                let raw = now.duration_since(*last).as_secs_f32();
                *last = now;
                raw
            }
            Source::Fixed { step } => *step,
        };
        let delta = raw.min(MAX_FRAME_DELTA);
        self.delta = Duration::from_secs_f32(delta);
        self.elapsed += delta;
        delta
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed
    }
}
