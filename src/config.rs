use serde::{Deserialize, Serialize};

use crate::error::StreamError;

/// Which mains frequencies the environmental-noise stage notches out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MainsNoise {
    Fifty,
    Sixty,
    FiftyAndSixty,
}

/// Band edges and orders for the per-channel filter chain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilterSettings {
    pub bandpass_low_hz: f64,
    pub bandpass_high_hz: f64,
    pub bandpass_order: usize,
    /// (low, high) edges of the fixed band-stop notches, applied in order.
    pub bandstops_hz: Vec<(f64, f64)>,
    pub bandstop_order: usize,
    pub mains: MainsNoise,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            bandpass_low_hz: 3.0,
            bandpass_high_hz: 45.0,
            bandpass_order: 2,
            bandstops_hz: vec![(48.0, 52.0), (58.0, 62.0)],
            bandstop_order: 2,
            mains: MainsNoise::FiftyAndSixty,
        }
    }
}

/// Physical constants of the impedance-check drive plus display thresholds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImpedanceSettings {
    /// Lead-off drive current injected by the amplifier (amps).
    pub drive_amps: f64,
    /// Series resistor subtracted from the raw estimate (ohms).
    pub base_impedance_ohms: f64,
    pub good_below_kohms: f64,
    pub fair_below_kohms: f64,
}

impl Default for ImpedanceSettings {
    fn default() -> Self {
        Self {
            drive_amps: 6.0e-9,
            base_impedance_ohms: 2200.0,
            good_below_kohms: 750.0,
            fair_below_kohms: 2500.0,
        }
    }
}

/// Everything the session pipeline can be tuned with.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Seconds of history retained and displayed for the waveform view.
    pub window_seconds: f64,
    /// Extra lead-in kept only as filter context, trimmed before output.
    pub filter_margin_seconds: f64,
    /// Initial playback speed multiplier, must be strictly positive.
    pub speed: f64,
    pub filters: FilterSettings,
    pub impedance: ImpedanceSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_seconds: 4.0,
            filter_margin_seconds: 1.0,
            speed: 1.0,
            filters: FilterSettings::default(),
            impedance: ImpedanceSettings::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, StreamError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        if self.window_seconds <= 0.0 {
            return Err(StreamError::InvalidWindow);
        }
        if self.filter_margin_seconds < 0.0 {
            return Err(StreamError::InvalidWindow);
        }
        if self.speed <= 0.0 {
            return Err(StreamError::InvalidSpeed(self.speed));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.filters.bandstops_hz.len(), 2);
    }

    #[test]
    fn json_round_trip_and_validation() {
        let json = serde_json::to_string(&PipelineConfig::default()).unwrap();
        let parsed = PipelineConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed.window_seconds, 4.0);

        let mut bad = PipelineConfig::default();
        bad.speed = 0.0;
        let json = serde_json::to_string(&bad).unwrap();
        assert!(matches!(
            PipelineConfig::from_json_str(&json),
            Err(StreamError::InvalidSpeed(_))
        ));
    }
}
