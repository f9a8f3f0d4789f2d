use anyhow::{bail, Context, Result};
use image::ImageEncoder;
use plotters::chart::SeriesLabelPosition;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::element::Polygon;
use plotters::prelude::*;
use plotters::style::RGBAColor;
use std::ops::Range;
use std::str::FromStr;

use crate::RenderOptions;

/// Stroke width lines are drawn with when no size mapping applies. The
/// default size range is derived from this value.
pub const DEFAULT_LINE_WIDTH: f64 = 2.0;

/// Pixels per dash-pattern unit.
const DASH_UNIT_PX: f64 = 3.0;

/// Marker shapes assignable to style levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Circle,
    Square,
    Diamond,
    TriangleDown,
    TriangleUp,
    Pentagon,
}

impl Marker {
    /// The ordered default list zipped against style levels.
    pub fn defaults() -> [Marker; 6] {
        [
            Marker::Circle,
            Marker::Square,
            Marker::Diamond,
            Marker::TriangleDown,
            Marker::TriangleUp,
            Marker::Pentagon,
        ]
    }

    /// Relative size correction so the shapes read as equally heavy.
    pub fn scale(self) -> f64 {
        match self {
            Marker::Circle => 1.0,
            Marker::Square => 0.85,
            Marker::Diamond => 0.9,
            Marker::TriangleDown | Marker::TriangleUp => 1.3,
            Marker::Pentagon => 1.25,
        }
    }
}

/// A dash pattern as alternating on/off run lengths; an empty pattern is a
/// solid line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DashPattern(pub Vec<f64>);

impl DashPattern {
    pub fn solid() -> Self {
        Self(Vec::new())
    }

    pub fn is_solid(&self) -> bool {
        self.0.is_empty()
    }

    /// The ordered default list zipped against style levels.
    pub fn defaults() -> [DashPattern; 6] {
        [
            DashPattern::solid(),
            DashPattern(vec![4.0, 1.5]),
            DashPattern(vec![1.0, 1.0]),
            DashPattern(vec![3.0, 1.0, 1.5, 1.0]),
            DashPattern(vec![5.0, 1.0, 1.0, 1.0]),
            DashPattern(vec![5.0, 1.0, 2.0, 1.0, 2.0, 1.0]),
        ]
    }
}

/// The fully resolved visual attributes of one drawn series. Built once
/// per subset and passed by value; nothing mutates it afterwards.
#[derive(Debug, Clone)]
pub struct SeriesAttrs {
    pub color: RGBColor,
    pub alpha: f64,
    pub width: f64,
    pub dashes: DashPattern,
    pub marker: Option<Marker>,
}

impl Default for SeriesAttrs {
    fn default() -> Self {
        Self {
            color: RGBColor(31, 119, 180),
            alpha: 1.0,
            width: DEFAULT_LINE_WIDTH,
            dashes: DashPattern::solid(),
            marker: None,
        }
    }
}

/// One subset ready to draw: points in draw order plus an optional
/// (x, low, high) interval.
#[derive(Debug, Clone)]
pub struct SeriesData {
    pub points: Vec<(f64, f64)>,
    pub interval: Option<Vec<(f64, f64, f64)>>,
    pub attrs: SeriesAttrs,
}

/// A proxy legend entry: a label plus the attributes its glyph is drawn
/// with.
#[derive(Debug, Clone)]
pub struct LegendEntry {
    pub label: String,
    pub attrs: SeriesAttrs,
}

/// How confidence intervals are displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrStyle {
    /// Shaded region between low and high
    Band,
    /// One vertical segment per aggregated point
    Bars,
}

impl FromStr for ErrStyle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "band" => Ok(ErrStyle::Band),
            "bars" => Ok(ErrStyle::Bars),
            _ => bail!("`err_style` must be 'band' or 'bars', got '{}'", s),
        }
    }
}

type Chart2d<'a, 'b> =
    ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// Raster drawing surface backed by plotters.
#[derive(Debug)]
pub struct Canvas {
    buffer: Vec<u8>,
    width: u32,
    height: u32,
    title: Option<String>,
    x_label: Option<String>,
    y_label: Option<String>,
}

impl Canvas {
    pub fn new(options: &RenderOptions) -> Self {
        let buffer = vec![0u8; (options.width * options.height * 3) as usize];
        Canvas {
            buffer,
            width: options.width,
            height: options.height,
            title: None,
            x_label: None,
            y_label: None,
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn x_label(&self) -> Option<&str> {
        self.x_label.as_deref()
    }

    pub fn y_label(&self) -> Option<&str> {
        self.y_label.as_deref()
    }

    pub fn set_x_label(&mut self, label: &str) {
        self.x_label = Some(label.to_string());
    }

    pub fn set_y_label(&mut self, label: &str) {
        self.y_label = Some(label.to_string());
    }

    /// Draw a prepared set of series plus legend entries in one chart
    /// pass.
    pub fn draw(
        &mut self,
        series: &[SeriesData],
        err_style: ErrStyle,
        legend: &[LegendEntry],
    ) -> Result<()> {
        // Global ranges over every point and interval bound
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for s in series {
            for &(x, y) in &s.points {
                xs.push(x);
                ys.push(y);
            }
            if let Some(interval) = &s.interval {
                for &(x, low, high) in interval {
                    xs.push(x);
                    ys.push(low);
                    ys.push(high);
                }
            }
        }
        let x_range = padded_range(&xs);
        let y_range = padded_range(&ys);

        // Approximate pixels per data unit inside the plot area; dash
        // patterns are cut by pixel arc length
        let sx = (self.width.saturating_sub(70)).max(1) as f64
            / (x_range.end - x_range.start);
        let sy = (self.height.saturating_sub(60)).max(1) as f64
            / (y_range.end - y_range.start);

        let root = BitMapBackend::with_buffer(&mut self.buffer, (self.width, self.height))
            .into_drawing_area();
        root.fill(&WHITE).context("failed to fill background")?;

        let mut builder = ChartBuilder::on(&root);
        builder
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50);
        if let Some(title) = &self.title {
            builder.caption(title, ("sans-serif", 20));
        }
        let mut chart = builder
            .build_cartesian_2d(x_range, y_range)
            .context("failed to build chart")?;

        let mut mesh = chart.configure_mesh();
        if let Some(label) = &self.x_label {
            mesh.x_desc(label);
        }
        if let Some(label) = &self.y_label {
            mesh.y_desc(label);
        }
        mesh.draw().context("failed to draw axes")?;

        for s in series {
            let stroke = s
                .attrs
                .color
                .mix(s.attrs.alpha)
                .stroke_width(px_width(s.attrs.width));

            if err_style == ErrStyle::Band {
                if let Some(interval) = &s.interval {
                    draw_band(&mut chart, interval, s.attrs.color)?;
                }
            }

            if s.attrs.dashes.is_solid() {
                chart
                    .draw_series(LineSeries::new(s.points.iter().copied(), stroke))
                    .context("failed to draw line series")?;
            } else {
                for piece in dash_polyline(&s.points, &s.attrs.dashes.0, sx, sy) {
                    chart
                        .draw_series(LineSeries::new(piece, stroke))
                        .context("failed to draw line series")?;
                }
            }

            if let Some(marker) = s.attrs.marker {
                draw_markers(
                    &mut chart,
                    &s.points,
                    marker,
                    s.attrs.color.mix(s.attrs.alpha),
                )?;
            }

            if err_style == ErrStyle::Bars {
                if let Some(interval) = &s.interval {
                    let bar_stroke = s
                        .attrs
                        .color
                        .mix(s.attrs.alpha)
                        .stroke_width(px_width(s.attrs.width));
                    chart
                        .draw_series(interval.iter().map(|&(x, low, high)| {
                            PathElement::new(vec![(x, low), (x, high)], bar_stroke)
                        }))
                        .context("failed to draw error bars")?;
                }
            }
        }

        if !legend.is_empty() {
            for entry in legend {
                add_legend_entry(&mut chart, entry)?;
            }
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()
                .context("failed to draw legend")?;
        }

        root.present().context("failed to present drawing")?;
        Ok(())
    }

    /// Finalize and encode the canvas as PNG.
    pub fn render(self) -> Result<Vec<u8>> {
        let mut png_bytes = Vec::new();
        {
            let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
            encoder
                .write_image(
                    &self.buffer,
                    self.width,
                    self.height,
                    image::ColorType::Rgb8,
                )
                .context("failed to encode PNG")?;
        }

        Ok(png_bytes)
    }
}

fn draw_band(
    chart: &mut Chart2d,
    interval: &[(f64, f64, f64)],
    color: RGBColor,
) -> Result<()> {
    if interval.len() < 2 {
        return Ok(());
    }
    // Trace the high bound forward, then the low bound backward
    let mut points = Vec::with_capacity(interval.len() * 2);
    for &(x, _, high) in interval {
        points.push((x, high));
    }
    for &(x, low, _) in interval.iter().rev() {
        points.push((x, low));
    }
    chart
        .draw_series(std::iter::once(Polygon::new(points, color.mix(0.2).filled())))
        .context("failed to draw interval band")?;
    Ok(())
}

fn draw_markers(
    chart: &mut Chart2d,
    points: &[(f64, f64)],
    marker: Marker,
    color: RGBAColor,
) -> Result<()> {
    let r = (4.0 * marker.scale()).round() as i32;
    let style = color.filled();
    match marker {
        Marker::Circle => {
            chart
                .draw_series(points.iter().map(|&(x, y)| Circle::new((x, y), r, style)))
                .context("failed to draw markers")?;
        }
        Marker::Square => {
            chart
                .draw_series(points.iter().map(|&(x, y)| {
                    EmptyElement::at((x, y)) + Rectangle::new([(-r, -r), (r, r)], style)
                }))
                .context("failed to draw markers")?;
        }
        _ => {
            let shape = marker_polygon(marker, r);
            chart
                .draw_series(points.iter().map(move |&(x, y)| {
                    EmptyElement::at((x, y)) + Polygon::new(shape.clone(), style)
                }))
                .context("failed to draw markers")?;
        }
    }
    Ok(())
}

/// Pixel-offset vertices for the polygonal markers. Backend y grows
/// downward.
fn marker_polygon(marker: Marker, r: i32) -> Vec<(i32, i32)> {
    match marker {
        Marker::Diamond => vec![(0, -r), (r, 0), (0, r), (-r, 0)],
        Marker::TriangleDown => vec![(-r, -r), (r, -r), (0, r)],
        Marker::TriangleUp => vec![(-r, r), (r, r), (0, -r)],
        Marker::Pentagon => (0..5)
            .map(|k| {
                let a = std::f64::consts::PI * (2.0 * k as f64 / 5.0 - 0.5);
                (
                    (r as f64 * a.cos()).round() as i32,
                    (r as f64 * a.sin()).round() as i32,
                )
            })
            .collect(),
        Marker::Circle | Marker::Square => Vec::new(),
    }
}

fn add_legend_entry<'a, 'b: 'a>(
    chart: &mut Chart2d<'a, 'b>,
    entry: &LegendEntry,
) -> Result<()> {
    let color = entry.attrs.color.mix(entry.attrs.alpha);
    let width = px_width(entry.attrs.width);

    // Proxy series: an empty path draws nothing but registers the label
    let anno = chart
        .draw_series(std::iter::once(PathElement::new(
            Vec::<(f64, f64)>::new(),
            color.stroke_width(width),
        )))
        .context("failed to add legend entry")?;
    anno.label(&entry.label);

    if let Some(marker) = entry.attrs.marker {
        let r = (4.0 * marker.scale()).round() as i32;
        // Each arm hands `legend` a distinct concrete element type; a shared
        // `DynElement` return is rejected here because the buffer-backed
        // backend is not `'static`.
        match marker {
            Marker::Circle => {
                anno.legend(move |(x, y)| {
                    let style = color.filled();
                    Circle::new((x + 10, y), r, style)
                });
            }
            Marker::Square => {
                anno.legend(move |(x, y)| {
                    let style = color.filled();
                    EmptyElement::at((x + 10, y))
                        + Rectangle::new([(-r, -r), (r, r)], style)
                });
            }
            _ => {
                anno.legend(move |(x, y)| {
                    let style = color.filled();
                    EmptyElement::at((x + 10, y))
                        + Polygon::new(marker_polygon(marker, r), style)
                });
            }
        }
    } else if entry.attrs.dashes.is_solid() {
        anno.legend(move |(x, y)| {
            PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(width))
        });
    } else {
        // Broken glyph standing in for the dash pattern
        anno.legend(move |(x, y)| {
            let stroke = color.stroke_width(width);
            EmptyElement::at((x, y))
                + PathElement::new(vec![(0, 0), (7, 0)], stroke)
                + PathElement::new(vec![(12, 0), (20, 0)], stroke)
        });
    }
    Ok(())
}

fn px_width(width: f64) -> u32 {
    width.round().max(1.0) as u32
}

fn padded_range(values: &[f64]) -> Range<f64> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in values {
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    if min == max {
        (min - 1.0)..(max + 1.0)
    } else {
        let padding = (max - min) * 0.05;
        (min - padding)..(max + padding)
    }
}

/// Cut a polyline into dash pieces by walking its approximate pixel arc
/// length through the repeating on/off pattern.
fn dash_polyline(
    points: &[(f64, f64)],
    pattern: &[f64],
    sx: f64,
    sy: f64,
) -> Vec<Vec<(f64, f64)>> {
    if points.len() < 2 || pattern.is_empty() {
        return vec![points.to_vec()];
    }

    let run = |i: usize| (pattern[i] * DASH_UNIT_PX).max(0.1);

    let mut pieces = Vec::new();
    let mut current: Vec<(f64, f64)> = vec![points[0]];
    let mut pattern_idx = 0usize;
    let mut remaining = run(0);
    let mut on = true;

    for window in points.windows(2) {
        let (x0, y0) = window[0];
        let (x1, y1) = window[1];
        let px = (x1 - x0) * sx;
        let py = (y1 - y0) * sy;
        let len = (px * px + py * py).sqrt();
        if len <= f64::EPSILON {
            if on {
                current.push((x1, y1));
            }
            continue;
        }

        let mut travelled = 0.0;
        while travelled < len {
            let step = remaining.min(len - travelled);
            travelled += step;
            remaining -= step;
            let t = travelled / len;
            let xi = x0 + (x1 - x0) * t;
            let yi = y0 + (y1 - y0) * t;
            if on {
                current.push((xi, yi));
            }
            if remaining <= 1e-9 {
                pattern_idx = (pattern_idx + 1) % pattern.len();
                remaining = run(pattern_idx);
                if on {
                    if current.len() > 1 {
                        pieces.push(std::mem::take(&mut current));
                    } else {
                        current.clear();
                    }
                } else {
                    current = vec![(xi, yi)];
                }
                on = !on;
            }
        }
    }

    if on && current.len() > 1 {
        pieces.push(current);
    }
    pieces
}
