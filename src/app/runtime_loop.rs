use crate::time::Time;

/// Longest delta handed to logic; anything longer (a debugger pause, a dragged window) is clamped.
pub const DEFAULT_MAX_FRAME_DELTA: f32 = 0.25;

pub(crate) struct RuntimeLoop {
    time: Time,
    max_delta: f32,
    clamped_frames: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RuntimeTick {
    pub dt: f32,
    pub dropped_time: Option<f32>,
}

impl RuntimeLoop {
    pub(crate) fn new(time: Time, max_delta: f32) -> Self {
        Self { time, max_delta: max_delta.max(f32::EPSILON), clamped_frames: 0 }
    }

    pub(crate) fn time(&self) -> &Time {
        &self.time
    }

    pub(crate) fn clamped_frames(&self) -> u64 {
        self.clamped_frames
    }

    pub(crate) fn tick(&mut self) -> RuntimeTick {
        self.time.tick();
        let raw = self.time.delta_seconds();
        if raw > self.max_delta {
            self.clamped_frames += 1;
            log::debug!("frame delta {raw:.3}s clamped to {:.3}s", self.max_delta);
            return RuntimeTick { dt: self.max_delta, dropped_time: Some(raw - self.max_delta) };
        }
        RuntimeTick { dt: raw, dropped_time: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn long_frames_are_clamped() {
        let mut runtime = RuntimeLoop::new(Time::fixed(Duration::from_millis(500)), 0.1);
        let tick = runtime.tick();
        assert!((tick.dt - 0.1).abs() < 1e-6);
        assert!((tick.dropped_time.expect("dropped") - 0.4).abs() < 1e-5);
        assert_eq!(runtime.clamped_frames(), 1);
    }

    #[test]
    fn short_frames_pass_through() {
        let mut runtime = RuntimeLoop::new(Time::fixed(Duration::from_millis(16)), DEFAULT_MAX_FRAME_DELTA);
        let tick = runtime.tick();
        assert!((tick.dt - 0.016).abs() < 1e-6);
        assert_eq!(tick.dropped_time, None);
        assert!((runtime.time().elapsed_seconds() - 0.016).abs() < 1e-6);
    }
}
