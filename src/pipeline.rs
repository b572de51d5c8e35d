use std::time::Instant;

use crate::board::BoardDescriptor;
use crate::config::PipelineConfig;
use crate::error::StreamError;
use crate::filters::FilterChain;
use crate::impedance::impedance_from_series;
use crate::pacing::SamplePacer;
use crate::source::DataSource;
use crate::spectrum::SpectrumBuilder;
use crate::window::SlidingWindow;

/// Paired x/y series ready for a plot: a waveform over time or a spectrum
/// over frequency. Recomputed every tick, never persisted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Function {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Function {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Self {
        Self { x, y }
    }

    /// Placeholder for an output that was skipped this tick.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// One tick's worth of processed output, one entry per EXG channel, in
/// channel order across all three sequences.
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutput {
    pub impedances: Vec<f64>,
    pub waves: Vec<Function>,
    pub spectra: Vec<Function>,
}

/// Ties pacer, data source, sliding window and the per-channel processing
/// into a single `forward` step driven by the caller's refresh timer.
pub struct SessionPipeline {
    source: Box<dyn DataSource>,
    descriptor: BoardDescriptor,
    config: PipelineConfig,
    pacer: SamplePacer,
    window: SlidingWindow,
    chain: FilterChain,
    spectrum: SpectrumBuilder,
    /// Rows shown in the waveform view; the window holds this plus the
    /// filter lead-in margin.
    num_points: usize,
    wave_x: Vec<f64>,
    active: bool,
}

impl SessionPipeline {
    /// Binds a data source, reads its fixed board identity and sizes all
    /// session state from it.
    pub fn start(
        mut source: Box<dyn DataSource>,
        config: PipelineConfig,
    ) -> Result<Self, StreamError> {
        config.validate()?;
        source.start()?;
        let descriptor = source.descriptor().clone();
        let rate = descriptor.sampling_rate;
        let num_points = (config.window_seconds * rate).round() as usize;
        let capacity =
            ((config.window_seconds + config.filter_margin_seconds) * rate).round() as usize;
        let pacer = SamplePacer::new(rate, config.speed)?;
        let window = SlidingWindow::new(capacity)?;
        let chain = FilterChain::new(&config.filters, rate);
        let spectrum = SpectrumBuilder::for_sampling_rate(rate)?;
        let wave_x = linspace(-config.window_seconds, 0.0, num_points);
        log::info!(
            "session started: {:?}, {} Hz, {} channels, window {} rows (+{} margin)",
            descriptor.kind,
            rate,
            descriptor.channel_count(),
            num_points,
            capacity - num_points,
        );
        Ok(Self {
            source,
            descriptor,
            config,
            pacer,
            window,
            chain,
            spectrum,
            num_points,
            wave_x,
            active: true,
        })
    }

    pub fn descriptor(&self) -> &BoardDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// True once a playback source has been fully replayed; the caller
    /// should stop ticking. Always false for live sessions.
    pub fn is_finished(&self) -> bool {
        self.source.is_finished()
    }

    pub fn set_speed(&mut self, speed: f64) -> Result<(), StreamError> {
        self.pacer.set_speed(speed)
    }

    /// One orchestration tick. `Ok(None)` is a no-update tick: nothing was
    /// due, the source had nothing, or a transient read failure occurred.
    pub fn forward(&mut self) -> Result<Option<StepOutput>, StreamError> {
        self.forward_at(Instant::now())
    }

    pub fn forward_at(&mut self, now: Instant) -> Result<Option<StepOutput>, StreamError> {
        if !self.active {
            return Ok(None);
        }
        let due = self.pacer.due(now);
        if due == 0 {
            return Ok(None);
        }
        let rows = match self.source.read(due) {
            Ok(rows) => rows,
            Err(err) => {
                log::warn!("data source read failed, skipping tick: {err}");
                return Ok(None);
            }
        };
        if rows.is_empty() {
            return Ok(None);
        }
        self.window.append(&rows)?;

        let channels = self.descriptor.exg_rows.clone();
        let mut impedances = Vec::with_capacity(channels.len());
        let mut waves = Vec::with_capacity(channels.len());
        let mut spectra = Vec::with_capacity(channels.len());
        for row in channels {
            let mut series = self.window.channel_series(row)?;
            // Impedance comes from the unfiltered signal; filtering would
            // strip the variance the estimate is built on.
            impedances.push(impedance_from_series(&series, &self.config.impedance));
            self.chain.apply(&mut series);
            let trimmed = series[series.len() - self.num_points..].to_vec();
            waves.push(Function::new(self.wave_x.clone(), trimmed));
            spectra.push(self.spectrum.compute(&series).unwrap_or_else(Function::empty));
        }
        Ok(Some(StepOutput {
            impedances,
            waves,
            spectra,
        }))
    }

    /// Rewinds a playback source to its start and re-arms the session state,
    /// so replaying reproduces the original outputs.
    pub fn reset(&mut self) -> Result<(), StreamError> {
        self.source.rewind()?;
        self.source.start()?;
        self.window.clear();
        self.pacer.reset();
        self.active = true;
        Ok(())
    }

    /// Ends the session. Safe to call at any time and more than once; any
    /// later `forward` is a no-op instead of touching torn-down state.
    pub fn stop(&mut self) -> Result<(), StreamError> {
        if self.active {
            self.active = false;
            self.source.stop()?;
            self.window.clear();
            self.pacer.reset();
            log::info!("session stopped");
        }
        Ok(())
    }
}

fn linspace(start: f64, end: f64, points: usize) -> Vec<f64> {
    if points < 2 {
        return vec![end; points];
    }
    let step = (end - start) / (points - 1) as f64;
    (0..points).map(|i| start + step * i as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardKind;
    use crate::config::MainsNoise;
    use crate::source::ManualSource;
    use std::time::Duration;

    /// 125 Hz boards put the default 58-62 Hz notch right at Nyquist; keep
    /// the deterministic tests away from that edge.
    fn daisy_config() -> PipelineConfig {
        let mut config = PipelineConfig {
            window_seconds: 2.0,
            filter_margin_seconds: 0.0,
            ..PipelineConfig::default()
        };
        config.filters.bandstops_hz = vec![(48.0, 52.0)];
        config.filters.mains = MainsNoise::Fifty;
        config
    }

    fn sine_rows(kind: BoardKind, count: usize, tone_hz: f64) -> Vec<Vec<f64>> {
        let descriptor = kind.descriptor();
        (0..count)
            .map(|i| {
                let mut row = vec![0.0; descriptor.row_width];
                row[descriptor.packet_row] = i as f64;
                let phase = 2.0 * std::f64::consts::PI * tone_hz * i as f64
                    / descriptor.sampling_rate;
                for &exg in &descriptor.exg_rows {
                    row[exg] = 40.0 * (phase + exg as f64).sin();
                }
                row
            })
            .collect()
    }

    fn start_daisy(rows: Vec<Vec<f64>>) -> SessionPipeline {
        let source = ManualSource::new(BoardKind::CytonDaisy, rows);
        SessionPipeline::start(Box::new(source), daisy_config()).unwrap()
    }

    #[test]
    fn first_tick_is_a_no_op() {
        let mut pipeline = start_daisy(sine_rows(BoardKind::CytonDaisy, 100, 10.0));
        let t0 = Instant::now();
        assert!(pipeline.forward_at(t0).unwrap().is_none());
    }

    #[test]
    fn exhausted_source_gives_no_update() {
        let mut pipeline = start_daisy(Vec::new());
        let t0 = Instant::now();
        pipeline.forward_at(t0).unwrap();
        let out = pipeline.forward_at(t0 + Duration::from_millis(200)).unwrap();
        assert!(out.is_none());
        assert!(pipeline.is_finished());
    }

    #[test]
    fn outputs_are_parallel_and_window_shaped() {
        let mut pipeline = start_daisy(sine_rows(BoardKind::CytonDaisy, 500, 10.0));
        let t0 = Instant::now();
        pipeline.forward_at(t0).unwrap();
        let out = pipeline
            .forward_at(t0 + Duration::from_secs(4))
            .unwrap()
            .expect("a full batch was due");

        let channels = pipeline.descriptor().channel_count();
        assert_eq!(out.impedances.len(), channels);
        assert_eq!(out.waves.len(), channels);
        assert_eq!(out.spectra.len(), channels);
        let num_points = (2.0 * 125.0) as usize;
        for wave in &out.waves {
            assert_eq!(wave.y.len(), num_points);
            assert!((wave.x[0] + 2.0).abs() < 1e-9);
            assert!(wave.x[num_points - 1].abs() < 1e-9);
        }
        for imp in &out.impedances {
            assert!(*imp >= 0.0);
        }
    }

    #[test]
    fn spectrum_peaks_at_the_injected_tone() {
        // Bin 8 of a 64-point FFT at 125 Hz: 15.625 Hz, inside the passband.
        let tone_hz = 15.625;
        let mut pipeline = start_daisy(sine_rows(BoardKind::CytonDaisy, 500, tone_hz));
        let t0 = Instant::now();
        pipeline.forward_at(t0).unwrap();
        let out = pipeline
            .forward_at(t0 + Duration::from_secs(4))
            .unwrap()
            .unwrap();

        let resolution = 125.0 / 64.0;
        for spectrum in &out.spectra {
            assert!(!spectrum.is_empty());
            let peak = spectrum
                .y
                .iter()
                .enumerate()
                .skip(1)
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
                .map(|(i, _)| i)
                .unwrap();
            assert!(
                (spectrum.x[peak] - tone_hz).abs() <= resolution,
                "peak at {} Hz",
                spectrum.x[peak]
            );
        }
    }

    #[test]
    fn replay_after_reset_reproduces_outputs() {
        let rows = sine_rows(BoardKind::CytonDaisy, 300, 12.0);
        let mut pipeline = start_daisy(rows);

        let run = |pipeline: &mut SessionPipeline| {
            let t0 = Instant::now();
            pipeline.forward_at(t0).unwrap();
            let mut outputs = Vec::new();
            for i in 1..=6u64 {
                if let Some(out) = pipeline
                    .forward_at(t0 + Duration::from_millis(400 * i))
                    .unwrap()
                {
                    outputs.push(out);
                }
            }
            outputs
        };

        let first = run(&mut pipeline);
        assert!(!first.is_empty());
        pipeline.reset().unwrap();
        let second = run(&mut pipeline);
        assert_eq!(first, second);
    }

    #[test]
    fn stop_is_final_and_idempotent() {
        let mut pipeline = start_daisy(sine_rows(BoardKind::CytonDaisy, 200, 10.0));
        let t0 = Instant::now();
        pipeline.forward_at(t0).unwrap();
        pipeline.stop().unwrap();
        pipeline.stop().unwrap();
        let out = pipeline.forward_at(t0 + Duration::from_secs(2)).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn speed_must_stay_positive() {
        let mut pipeline = start_daisy(Vec::new());
        assert!(pipeline.set_speed(2.0).is_ok());
        assert!(matches!(
            pipeline.set_speed(0.0),
            Err(StreamError::InvalidSpeed(_))
        ));
    }
}
