use std::time::Instant;

use crate::error::StreamError;

/// Converts elapsed wall-clock time into a count of samples that should be
/// consumed now, so live reads match the acquisition rate and playback
/// advances at `sampling_rate * speed` regardless of how often the caller
/// ticks. The fractional remainder carries over between ticks, so the
/// long-run average rate has no drift.
pub struct SamplePacer {
    sampling_rate: f64,
    speed: f64,
    prev_tick: Option<Instant>,
    carry_ms: f64,
}

impl SamplePacer {
    pub fn new(sampling_rate: f64, speed: f64) -> Result<Self, StreamError> {
        if sampling_rate <= 0.0 {
            return Err(StreamError::InvalidSampleRate);
        }
        if speed <= 0.0 {
            return Err(StreamError::InvalidSpeed(speed));
        }
        Ok(Self {
            sampling_rate,
            speed,
            prev_tick: None,
            carry_ms: 0.0,
        })
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f64) -> Result<(), StreamError> {
        if speed <= 0.0 {
            return Err(StreamError::InvalidSpeed(speed));
        }
        self.speed = speed;
        Ok(())
    }

    /// Number of samples due at `now`. The first call after a reset only
    /// records the time and returns 0, so a pause is never mistaken for
    /// backlog.
    pub fn due(&mut self, now: Instant) -> usize {
        let Some(prev) = self.prev_tick.replace(now) else {
            return 0;
        };
        self.carry_ms += now.saturating_duration_since(prev).as_secs_f64() * 1000.0;
        let time_per_sample_ms = 1000.0 / (self.sampling_rate * self.speed);
        let n = (self.carry_ms / time_per_sample_ms).floor();
        self.carry_ms -= n * time_per_sample_ms;
        n as usize
    }

    /// Forget the previous tick. Call on session (re)start and on resume, so
    /// the next `due` starts a fresh measurement.
    pub fn reset(&mut self) {
        self.prev_tick = None;
        self.carry_ms = 0.0;
    }
}
