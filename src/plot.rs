use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::*;

use crate::error::StreamError;
use crate::pipeline::Function;

#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub palette: Vec<RGBColor>,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 900,
            height: 400,
            background: RGBColor(10, 10, 10),
            palette: vec![BLUE, RED, GREEN, CYAN, MAGENTA, YELLOW, WHITE],
        }
    }
}

/// Renders per-channel waveforms (time on x, amplitude on y) to a PNG.
pub fn render_waveform_png(
    waves: &[Function],
    labels: &[String],
    style: &PlotStyle,
) -> Result<Vec<u8>, StreamError> {
    render_functions(waves, labels, style, "Waveform", "s", "uV")
}

/// Renders per-channel spectra (frequency on x, amplitude on y) to a PNG.
pub fn render_spectrum_png(
    spectra: &[Function],
    labels: &[String],
    style: &PlotStyle,
) -> Result<Vec<u8>, StreamError> {
    render_functions(spectra, labels, style, "Power Spectral Density", "Hz", "uV^2/Hz")
}

fn render_functions(
    functions: &[Function],
    labels: &[String],
    style: &PlotStyle,
    caption: &str,
    x_unit: &str,
    y_unit: &str,
) -> Result<Vec<u8>, StreamError> {
    let drawn: Vec<&Function> = functions.iter().filter(|f| !f.is_empty()).collect();
    if drawn.is_empty() {
        return Err(StreamError::Plot("nothing to draw".into()));
    }
    let (x_range, y_range) = bounds(&drawn);

    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(caption, ("sans-serif", 20).into_font().color(&WHITE))
            .set_label_area_size(LabelAreaPosition::Left, 55)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .build_cartesian_2d(x_range, y_range)?;
        chart
            .configure_mesh()
            .x_desc(x_unit)
            .y_desc(y_unit)
            .light_line_style(&WHITE.mix(0.1))
            .draw()?;
        for (idx, function) in drawn.iter().enumerate() {
            let color = style.palette[idx % style.palette.len()];
            let series = function
                .x
                .iter()
                .zip(&function.y)
                .map(|(&x, &y)| (x, y));
            chart
                .draw_series(LineSeries::new(series, &color))?
                .label(
                    labels
                        .get(idx)
                        .cloned()
                        .unwrap_or_else(|| format!("Ch {}", idx + 1)),
                )
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
        }
        chart
            .configure_series_labels()
            .border_style(&WHITE.mix(0.2))
            .background_style(&style.background)
            .draw()?;
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}

fn bounds(functions: &[&Function]) -> (std::ops::Range<f64>, std::ops::Range<f64>) {
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for function in functions {
        for &x in &function.x {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
        }
        for &y in &function.y {
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
    }
    if (x_max - x_min).abs() < f64::EPSILON {
        x_max = x_min + 1.0;
    }
    if (y_max - y_min).abs() < f64::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }
    (x_min..x_max, y_min..y_max)
}

fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, StreamError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| StreamError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    DynamicImage::ImageRgb8(image).write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
