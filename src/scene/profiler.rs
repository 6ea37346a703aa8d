use bevy_ecs::prelude::Resource;
use std::collections::BTreeMap;
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScopeSummary {
    pub name: &'static str,
    pub last_ms: f32,
    pub average_ms: f32,
    pub max_ms: f32,
    pub samples: u64,
}

#[derive(Default)]
struct ScopeTiming {
    last_ms: f32,
    total_ms: f32,
    max_ms: f32,
    samples: u64,
}

/// Per-system timings for the scene schedule.
#[derive(Resource, Default)]
pub struct FrameProfiler {
    timings: BTreeMap<&'static str, ScopeTiming>,
    frames: u64,
}

impl FrameProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_frame(&mut self) {
        self.frames += 1;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn scope(&mut self, name: &'static str) -> ProfileScope<'_> {
        ProfileScope { name, profiler: self, start: Instant::now() }
    }

    fn record(&mut self, name: &'static str, elapsed_ms: f32) {
        let timing = self.timings.entry(name).or_default();
        timing.last_ms = elapsed_ms;
        timing.max_ms = timing.max_ms.max(elapsed_ms);
        timing.total_ms += elapsed_ms;
        timing.samples += 1;
    }

    /// Slowest scope (by last sample) first.
    pub fn summaries(&self) -> Vec<ScopeSummary> {
        let mut out: Vec<ScopeSummary> = self
            .timings
            .iter()
            .map(|(&name, timing)| ScopeSummary {
                name,
                last_ms: timing.last_ms,
                average_ms: if timing.samples == 0 { 0.0 } else { timing.total_ms / timing.samples as f32 },
                max_ms: timing.max_ms,
                samples: timing.samples,
            })
            .collect();
        out.sort_by(|a, b| b.last_ms.total_cmp(&a.last_ms));
        out
    }
}

pub struct ProfileScope<'a> {
    name: &'static str,
    profiler: &'a mut FrameProfiler,
    start: Instant,
}

impl Drop for ProfileScope<'_> {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_secs_f32() * 1000.0;
        self.profiler.record(self.name, elapsed_ms);
    }
}
