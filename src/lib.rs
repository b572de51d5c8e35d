//! Acquisition, playback and processing backend for a multi-channel EXG
//! (EEG/ECG) viewer. The rendering layer consumes the per-channel
//! impedance/waveform/spectrum outputs of [`SessionPipeline::forward`];
//! real hardware plugs in behind the [`BoardDriver`] trait.

pub mod board;
pub mod commands;
pub mod config;
pub mod error;
pub mod filters;
pub mod impedance;
pub mod pacing;
pub mod pipeline;
pub mod plot;
pub mod recording;
pub mod source;
pub mod spectrum;
pub mod window;

pub use board::{BoardDescriptor, BoardDriver, BoardKind, BOARD_NAMES};
pub use commands::{BoardCommand, CommandDispatcher, CommandPort};
pub use config::{FilterSettings, ImpedanceSettings, MainsNoise, PipelineConfig};
pub use error::StreamError;
pub use filters::FilterChain;
pub use impedance::ContactQuality;
pub use pacing::SamplePacer;
pub use pipeline::{Function, SessionPipeline, StepOutput};
pub use plot::{render_spectrum_png, render_waveform_png, PlotStyle};
pub use recording::{RecordingReader, RecordingWriter, SessionMetadata};
pub use source::{DataSource, LiveSource, ManualSource, PlaybackSource};
pub use spectrum::SpectrumBuilder;
pub use window::SlidingWindow;
