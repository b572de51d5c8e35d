//! Replays a recorded session through the full pipeline and prints a
//! per-channel summary; optionally dumps the final waveform/spectrum PNGs.
//!
//! Usage: replay <record.csv> [--speed N] [--png-dir DIR]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use exgscope::{
    impedance, plot, PipelineConfig, PlaybackSource, SessionPipeline, StepOutput,
};

struct Args {
    record: PathBuf,
    speed: f64,
    png_dir: Option<PathBuf>,
}

fn parse_args() -> Option<Args> {
    let mut args = std::env::args().skip(1);
    let record = PathBuf::from(args.next()?);
    let mut speed = 1.0;
    let mut png_dir = None;
    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--speed" => speed = args.next()?.parse().ok()?,
            "--png-dir" => png_dir = Some(PathBuf::from(args.next()?)),
            _ => return None,
        }
    }
    Some(Args {
        record,
        speed,
        png_dir,
    })
}

fn main() -> ExitCode {
    env_logger::init();
    let Some(args) = parse_args() else {
        eprintln!("usage: replay <record.csv> [--speed N] [--png-dir DIR]");
        return ExitCode::FAILURE;
    };
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("replay failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), exgscope::StreamError> {
    let source = PlaybackSource::open(&args.record)?;
    if let Some(meta) = source.metadata() {
        println!("patient: {} {} - {}", meta.name, meta.surname, meta.description);
    }
    let config = PipelineConfig {
        speed: args.speed,
        ..PipelineConfig::default()
    };
    let mut pipeline = SessionPipeline::start(Box::new(source), config)?;
    println!(
        "replaying {:?} at {} Hz, speed x{}",
        pipeline.descriptor().kind,
        pipeline.descriptor().sampling_rate,
        args.speed
    );

    let mut ticks = 0usize;
    let mut last = None;
    while !pipeline.is_finished() {
        if let Some(output) = pipeline.forward()? {
            ticks += 1;
            last = Some(output);
        }
        // Tick at display rate; the pacer turns wall time into samples.
        std::thread::sleep(Duration::from_millis(1000 / 60));
    }
    pipeline.stop()?;

    let Some(output) = last else {
        println!("recording contained no samples");
        return Ok(());
    };
    print_summary(&pipeline, &output, ticks);
    if let Some(dir) = &args.png_dir {
        write_pngs(&pipeline, &output, dir)?;
    }
    Ok(())
}

fn print_summary(pipeline: &SessionPipeline, output: &StepOutput, ticks: usize) {
    println!("{} update ticks", ticks);
    let settings = &pipeline.config().impedance;
    for (i, imp) in output.impedances.iter().enumerate() {
        let quality = impedance::classify(*imp, settings);
        let role = if pipeline.descriptor().is_ecg_position(i) {
            " (ECG)"
        } else {
            ""
        };
        println!(
            "channel {:>2}{role}: {:>8.1} kOhm  {:?}",
            i + 1,
            imp / 1000.0,
            quality
        );
    }
}

fn write_pngs(
    pipeline: &SessionPipeline,
    output: &StepOutput,
    dir: &Path,
) -> Result<(), exgscope::StreamError> {
    std::fs::create_dir_all(dir)?;
    let labels: Vec<String> = (1..=pipeline.descriptor().channel_count())
        .map(|ch| format!("Ch {ch}"))
        .collect();
    let style = plot::PlotStyle::default();
    let wave = plot::render_waveform_png(&output.waves, &labels, &style)?;
    std::fs::write(dir.join("waveform.png"), wave)?;
    let spectrum = plot::render_spectrum_png(&output.spectra, &labels, &style)?;
    std::fs::write(dir.join("spectrum.png"), spectrum)?;
    println!("wrote waveform.png and spectrum.png to {}", dir.display());
    Ok(())
}
