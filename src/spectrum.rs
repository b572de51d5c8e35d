use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::StreamError;
use crate::pipeline::Function;

/// Largest power of two not exceeding `value`.
pub fn nearest_power_of_two_below(value: f64) -> usize {
    let mut n = 1usize;
    while (n * 2) as f64 <= value {
        n *= 2;
    }
    n
}

/// Welch power-spectral-density estimator for one channel.
///
/// The FFT size is the largest power of two that fits into the sampling
/// rate, segments overlap by 75% and are shaped with a Hamming window. The
/// result is one-sided: `nfft / 2 + 1` (frequency, amplitude) pairs.
pub struct SpectrumBuilder {
    sampling_rate: f64,
    nfft: usize,
    overlap: usize,
    fft: Arc<dyn Fft<f64>>,
    window: Vec<f64>,
}

impl SpectrumBuilder {
    pub fn for_sampling_rate(sampling_rate: f64) -> Result<Self, StreamError> {
        if sampling_rate < 2.0 {
            return Err(StreamError::InvalidSampleRate);
        }
        let nfft = nearest_power_of_two_below(sampling_rate);
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(nfft);
        let window = hamming(nfft);
        Ok(Self {
            sampling_rate,
            nfft,
            overlap: (0.75 * nfft as f64) as usize,
            fft,
            window,
        })
    }

    pub fn nfft(&self) -> usize {
        self.nfft
    }

    /// Frequency resolution of the one-sided spectrum (Hz per bin).
    pub fn resolution_hz(&self) -> f64 {
        self.sampling_rate / self.nfft as f64
    }

    /// PSD of the trailing `nfft` samples of `series`, mean removed first.
    /// Returns `None` when fewer than `nfft` samples are available; an
    /// underfull buffer skips the spectrum for that tick instead of failing.
    pub fn compute(&self, series: &[f64]) -> Option<Function> {
        if series.len() < self.nfft {
            return None;
        }
        let tail = &series[series.len() - self.nfft..];
        let mean = tail.iter().sum::<f64>() / self.nfft as f64;
        let centered: Vec<f64> = tail.iter().map(|v| v - mean).collect();

        let step = (self.nfft - self.overlap).max(1);
        let window_power: f64 = self.window.iter().map(|w| w * w).sum();
        let bins = self.nfft / 2 + 1;
        let mut psd = vec![0.0; bins];
        let mut segments = 0usize;
        let mut start = 0usize;
        while start + self.nfft <= centered.len() {
            let mut buffer: Vec<Complex<f64>> = centered[start..start + self.nfft]
                .iter()
                .zip(&self.window)
                .map(|(v, w)| Complex::new(v * w, 0.0))
                .collect();
            self.fft.process(&mut buffer);
            for (k, bin) in psd.iter_mut().enumerate() {
                let mut power = buffer[k].norm_sqr() / (self.sampling_rate * window_power);
                if k != 0 && k != self.nfft / 2 {
                    power *= 2.0;
                }
                *bin += power;
            }
            segments += 1;
            start += step;
        }
        for bin in &mut psd {
            *bin /= segments as f64;
        }

        let frequencies = (0..bins).map(|k| k as f64 * self.resolution_hz()).collect();
        Some(Function::new(frequencies, psd))
    }
}

fn hamming(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            0.54 - 0.46 * (2.0 * std::f64::consts::PI * i as f64 / (n - 1) as f64).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_of_two_fits_under_rate() {
        assert_eq!(nearest_power_of_two_below(125.0), 64);
        assert_eq!(nearest_power_of_two_below(250.0), 128);
        assert_eq!(nearest_power_of_two_below(256.0), 256);
    }

    #[test]
    fn underfull_series_is_skipped() {
        let builder = SpectrumBuilder::for_sampling_rate(125.0).unwrap();
        assert!(builder.compute(&vec![0.0; builder.nfft() - 1]).is_none());
    }

    #[test]
    fn peak_lands_on_the_injected_frequency() {
        let rate = 125.0;
        let builder = SpectrumBuilder::for_sampling_rate(rate).unwrap();
        // Put the tone exactly on bin 8: 8 * 125 / 64 = 15.625 Hz.
        let tone_hz = 8.0 * builder.resolution_hz();
        let series: Vec<f64> = (0..500)
            .map(|i| (2.0 * std::f64::consts::PI * tone_hz * i as f64 / rate).sin())
            .collect();
        let spectrum = builder.compute(&series).unwrap();
        let peak = spectrum
            .y
            .iter()
            .enumerate()
            .skip(1)
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        let peak_hz = spectrum.x[peak];
        assert!(
            (peak_hz - tone_hz).abs() <= builder.resolution_hz(),
            "peak at {peak_hz} Hz, tone at {tone_hz} Hz"
        );
    }

    #[test]
    fn dc_offset_does_not_dominate() {
        let rate = 125.0;
        let builder = SpectrumBuilder::for_sampling_rate(rate).unwrap();
        let tone_hz = 4.0 * builder.resolution_hz();
        let series: Vec<f64> = (0..200)
            .map(|i| 100.0 + (2.0 * std::f64::consts::PI * tone_hz * i as f64 / rate).sin())
            .collect();
        let spectrum = builder.compute(&series).unwrap();
        assert!(spectrum.y[0] < spectrum.y[4]);
    }
}
