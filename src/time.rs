use std::time::{Duration, Instant};

/// Frame clock. `Wall` reads the OS clock, `Fixed` advances by a constant step per tick.
#[derive(Debug, Clone, Copy)]
enum Source {
    Wall { start: Instant, last: Instant },
    Fixed { step: Duration },
}

#[derive(Debug, Clone)]
pub struct Time {
    source: Source,
    elapsed: Duration,
    pub delta: Duration,
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

impl Time {
    pub fn new() -> Self {
        let now = Instant::now();
        Self { source: Source::Wall { start: now, last: now }, elapsed: Duration::ZERO, delta: Duration::ZERO }
    }

    /// Deterministic clock for headless runs and tests.
    pub fn fixed(step: Duration) -> Self {
        Self { source: Source::Fixed { step }, elapsed: Duration::ZERO, delta: Duration::ZERO }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self.source, Source::Fixed { .. })
    }

    pub fn tick(&mut self) {
        match &mut self.source {
            Source::Wall { start, last } => {
                let now = Instant::now();
                self.delta = now - *last;
                *last = now;
                self.elapsed = now - *start;
            }
            Source::Fixed { step } => {
                self.delta = *step;
                self.elapsed += *step;
            }
        }
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances_by_step() {
        let mut time = Time::fixed(Duration::from_millis(20));
        time.tick();
        time.tick();
        assert_eq!(time.delta, Duration::from_millis(20));
        assert!((time.elapsed_seconds() - 0.04).abs() < 1e-6);
    }

    #[test]
    fn wall_clock_is_monotonic() {
        let mut time = Time::new();
        time.tick();
        let first = time.elapsed_seconds();
        time.tick();
        assert!(time.elapsed_seconds() >= first);
    }
}
