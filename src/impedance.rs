//! Electrode contact-quality estimation.
//!
//! The amplifier injects a known lead-off drive current; the voltage response
//! shows up as extra variance on the channel. The impedance estimate is
//! `sqrt(2) * stddev_uV * 1e-6 / drive_amps - base_impedance_ohms`, floored
//! at zero since a negative impedance is physical nonsense.

use crate::config::ImpedanceSettings;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactQuality {
    Good,
    Fair,
    Poor,
}

/// Population standard deviation over the window.
pub fn std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mean = data.iter().sum::<f64>() / data.len() as f64;
    let variance = data
        .iter()
        .map(|v| {
            let delta = v - mean;
            delta * delta
        })
        .sum::<f64>()
        / data.len() as f64;
    variance.sqrt()
}

/// Impedance estimate (ohms) from a channel's recent raw samples (microvolts).
pub fn impedance_from_series(series: &[f64], settings: &ImpedanceSettings) -> f64 {
    let std_uv = std_dev(series);
    let mut impedance_ohms =
        (std::f64::consts::SQRT_2 * std_uv * 1.0e-6) / settings.drive_amps
            - settings.base_impedance_ohms;
    if impedance_ohms.is_nan() || impedance_ohms < 0.0 {
        impedance_ohms = 0.0;
    }
    impedance_ohms
}

/// Classifies an impedance (ohms) against the configured display thresholds.
pub fn classify(impedance_ohms: f64, settings: &ImpedanceSettings) -> ContactQuality {
    let kohms = impedance_ohms / 1000.0;
    if kohms < settings.good_below_kohms {
        ContactQuality::Good
    } else if kohms < settings.fair_below_kohms {
        ContactQuality::Fair
    } else {
        ContactQuality::Poor
    }
}
