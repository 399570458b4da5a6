//! Scatter chart rendering into an embeddable PNG.
//!
//! Every chart is drawn into an in-memory RGB buffer with plotters, encoded
//! as PNG, and returned as a base64 `data:` URI. The buffer is dropped before
//! the function returns, so only one chart is ever held in memory.

use std::f64::consts::TAU;
use std::io::Cursor;

use base64::Engine as _;
use palette::Srgb;
use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

/// Errors that can occur while rendering a chart.
#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Encoding error: {0}")]
    Encoding(#[from] image::ImageError),

    #[error("Bitmap buffer does not match {0}x{0}")]
    BufferSize(u32),
}

pub type Result<T> = std::result::Result<T, ChartError>;

/// Side length of grid cells, in pixels.
pub const GRID_SIZE: u32 = 200;

/// Side length of sequential charts, in pixels.
pub const SEQUENTIAL_SIZE: u32 = 300;

const GRAY: RGBColor = RGBColor(128, 128, 128);
const CIRCLE_SEGMENTS: usize = 180;
const POINT_SIZE: u32 = 1;

/// One colour-coded set of points.
#[derive(Debug, Clone)]
pub struct Series {
    pub color: Srgb<u8>,
    pub points: Vec<(f64, f64)>,
}

/// Everything needed to draw one chart.
#[derive(Debug, Clone)]
pub struct ChartSpec {
    pub size: u32,
    /// Both axes span `[-axis_limit, axis_limit]`.
    pub axis_limit: f64,
    pub series: Vec<Series>,
    /// Solid black circle radius; skipped when `None` or not finite.
    pub density_radius: Option<f64>,
    /// Dotted blue circle radius; skipped when `None`.
    pub tolerance_radius: Option<f64>,
}

fn plot_err<E: std::fmt::Display>(e: E) -> ChartError {
    ChartError::PlottingError(e.to_string())
}

fn rgb(c: Srgb<u8>) -> RGBColor {
    RGBColor(c.red, c.green, c.blue)
}

/// Points on a circle of `radius` around the origin, closed.
fn circle_path(radius: f64) -> Vec<(f64, f64)> {
    (0..=CIRCLE_SEGMENTS)
        .map(|i| {
            let a = TAU * i as f64 / CIRCLE_SEGMENTS as f64;
            (radius * a.cos(), radius * a.sin())
        })
        .collect()
}

/// Split a polyline into alternating drawn pieces of `on` segments
/// separated by `off` segments.
fn dashes(path: &[(f64, f64)], on: usize, off: usize) -> Vec<Vec<(f64, f64)>> {
    let period = on + off;
    path.windows(2)
        .enumerate()
        .filter(|(i, _)| i % period < on)
        .map(|(_, w)| w.to_vec())
        .collect()
}

fn inside(p: (f64, f64), lim: f64) -> bool {
    p.0.abs() <= lim && p.1.abs() <= lim
}

/// Where the segment from `a` (inside) to `b` (outside) leaves the box.
fn exit_point(a: (f64, f64), b: (f64, f64), lim: f64) -> (f64, f64) {
    let mut t: f64 = 1.0;
    for (from, to) in [(a.0, b.0), (a.1, b.1)] {
        if to.abs() > lim {
            t = t.min((lim.copysign(to) - from) / (to - from));
        }
    }
    (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t)
}

/// Cut a polyline into the pieces that lie within `[-lim, lim]²`.
fn clip_to_box(path: &[(f64, f64)], lim: f64) -> Vec<Vec<(f64, f64)>> {
    let mut pieces = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    for w in path.windows(2) {
        let (a, b) = (w[0], w[1]);
        match (inside(a, lim), inside(b, lim)) {
            (true, true) => {
                if current.is_empty() {
                    current.push(a);
                }
                current.push(b);
            }
            (true, false) => {
                if current.is_empty() {
                    current.push(a);
                }
                current.push(exit_point(a, b, lim));
                pieces.push(std::mem::take(&mut current));
            }
            (false, true) => {
                current.push(exit_point(b, a, lim));
                current.push(b);
            }
            (false, false) => {}
        }
    }
    if current.len() > 1 {
        pieces.push(current);
    }
    pieces
}

fn dashed_line(from: (f64, f64), to: (f64, f64), pieces: usize) -> Vec<(f64, f64)> {
    (0..=pieces)
        .map(|i| {
            let t = i as f64 / pieces as f64;
            (from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t)
        })
        .collect()
}

/// Draw the chart and return the raw RGB buffer.
fn draw(spec: &ChartSpec) -> Result<Vec<u8>> {
    let size = spec.size;
    let mut buf = vec![0u8; (size * size * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (size, size)).into_drawing_area();
        root.fill(&WHITE).map_err(plot_err)?;

        let lim = spec.axis_limit;
        let mut chart = ChartBuilder::on(&root)
            .margin(4)
            .build_cartesian_2d(-lim..lim, -lim..lim)
            .map_err(plot_err)?;

        // Frame
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(-lim, -lim), (lim, -lim), (lim, lim), (-lim, lim), (-lim, -lim)],
                BLACK.stroke_width(1),
            )))
            .map_err(plot_err)?;

        // Cross-hairs through the origin
        for (from, to) in [((-lim, 0.0), (lim, 0.0)), ((0.0, -lim), (0.0, lim))] {
            let line = dashed_line(from, to, 60);
            chart
                .draw_series(
                    dashes(&line, 2, 1)
                        .into_iter()
                        .map(|seg| PathElement::new(seg, GRAY.stroke_width(1))),
                )
                .map_err(plot_err)?;
        }

        for series in &spec.series {
            let color = rgb(series.color);
            chart
                .draw_series(
                    series
                        .points
                        .iter()
                        .filter(|&&p| inside(p, lim))
                        .map(|&(x, y)| Circle::new((x, y), POINT_SIZE, color.filled())),
                )
                .map_err(plot_err)?;
        }

        // Tolerance circle under the density circle
        if let Some(r) = spec.tolerance_radius {
            let pieces = clip_to_box(&circle_path(r), lim);
            chart
                .draw_series(
                    pieces
                        .iter()
                        .flat_map(|piece| dashes(piece, 1, 1))
                        .map(|seg| PathElement::new(seg, BLUE.mix(0.7).stroke_width(1))),
                )
                .map_err(plot_err)?;
        }

        if let Some(r) = spec.density_radius.filter(|r| r.is_finite()) {
            chart
                .draw_series(
                    clip_to_box(&circle_path(r), lim)
                        .into_iter()
                        .map(|piece| PathElement::new(piece, BLACK.stroke_width(3))),
                )
                .map_err(plot_err)?;
        }

        root.present().map_err(plot_err)?;
    }
    Ok(buf)
}

/// Render a chart to PNG bytes.
pub fn render_png(spec: &ChartSpec) -> Result<Vec<u8>> {
    let buf = draw(spec)?;
    let img = image::RgbImage::from_raw(spec.size, spec.size, buf)
        .ok_or(ChartError::BufferSize(spec.size))?;
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
    Ok(bytes)
}

/// Render a chart to a `data:image/png;base64,...` URI.
pub fn render_data_uri(spec: &ChartSpec) -> Result<String> {
    let png = render_png(spec)?;
    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    ))
}
