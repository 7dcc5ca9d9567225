use std::time::Duration;

/// Frame clock advanced by the caller's delta time.
///
/// The sync engine never reads wall-clock time; animation timestamps come
/// from the accumulated deltas so replays are deterministic.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    /// Time since last tick
    pub delta: Duration,
    /// Total elapsed time since creation
    pub elapsed: Duration,
    /// Total number of ticks
    pub frame_count: u64,
}

impl FrameClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock by `dt` seconds. Negative or non-finite deltas
    /// count as zero.
    pub fn tick(&mut self, dt: f32) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.delta = Duration::from_secs_f32(dt);
        self.elapsed += self.delta;
        self.frame_count += 1;
    }

    #[must_use]
    pub fn dt_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    #[must_use]
    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_deltas() {
        let mut c = FrameClock::new();
        c.tick(0.5);
        c.tick(0.25);
        c.tick(f32::NAN);
        assert_eq!(c.frame_count, 3);
        assert!((c.elapsed_seconds() - 0.75).abs() < 1e-6);
        assert_eq!(c.dt_seconds(), 0.0);
    }
}
