use anyhow::{bail, Result};
use plotters::style::RGBColor;

/// A fixed list of qualitative colors cycled over categorical levels.
#[derive(Debug, Clone)]
pub struct ColorPalette {
    colors: Vec<RGBColor>,
}

impl ColorPalette {
    /// The default 10-color qualitative cycle.
    pub fn category10() -> Self {
        Self {
            colors: vec![
                RGBColor(31, 119, 180),
                RGBColor(255, 127, 14),
                RGBColor(44, 160, 44),
                RGBColor(214, 39, 40),
                RGBColor(148, 103, 189),
                RGBColor(140, 86, 75),
                RGBColor(227, 119, 194),
                RGBColor(127, 127, 127),
                RGBColor(188, 189, 34),
                RGBColor(23, 190, 207),
            ],
        }
    }

    /// `n` evenly spaced hues at fixed saturation and lightness. Scales to
    /// any level count, so it backs categorical mappings with more levels
    /// than the default cycle provides.
    pub fn husl(n: usize) -> Self {
        let colors = (0..n.max(1))
            .map(|i| hsl_to_rgb(360.0 * i as f64 / n.max(1) as f64, 0.65, 0.6))
            .collect();
        Self { colors }
    }

    pub fn colors(&self) -> &[RGBColor] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Take `n` colors, cycling when the palette is shorter.
    pub fn cycle(&self, n: usize) -> Vec<RGBColor> {
        (0..n).map(|i| self.colors[i % self.colors.len()]).collect()
    }
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> RGBColor {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = (h.rem_euclid(360.0)) / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    RGBColor(
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
    )
}

/// A continuous colormap: ordered color stops sampled by linear
/// interpolation over a clamped [0, 1] position.
#[derive(Debug, Clone)]
pub struct Colormap {
    stops: Vec<RGBColor>,
}

impl Colormap {
    pub fn new(stops: Vec<RGBColor>) -> Result<Self> {
        if stops.len() < 2 {
            bail!("a colormap requires at least two color stops");
        }
        Ok(Self { stops })
    }

    /// Resolve a colormap by name. Unknown names are a validation error.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "viridis" => Ok(Self::viridis()),
            "magma" => Ok(Self::magma()),
            "plasma" => Ok(Self::plasma()),
            "greys" => Ok(Self::greys()),
            _ => bail!("palette '{}' not understood", name),
        }
    }

    /// Perceptually uniform default for numeric mappings.
    pub fn viridis() -> Self {
        Self {
            stops: vec![
                RGBColor(68, 1, 84),
                RGBColor(72, 40, 120),
                RGBColor(62, 74, 137),
                RGBColor(49, 104, 142),
                RGBColor(38, 130, 142),
                RGBColor(31, 158, 137),
                RGBColor(53, 183, 121),
                RGBColor(109, 205, 89),
                RGBColor(180, 222, 44),
                RGBColor(253, 231, 37),
            ],
        }
    }

    pub fn magma() -> Self {
        Self {
            stops: vec![
                RGBColor(0, 0, 4),
                RGBColor(40, 11, 84),
                RGBColor(101, 21, 110),
                RGBColor(159, 42, 99),
                RGBColor(212, 72, 66),
                RGBColor(245, 125, 21),
                RGBColor(250, 193, 39),
                RGBColor(252, 253, 191),
            ],
        }
    }

    pub fn plasma() -> Self {
        Self {
            stops: vec![
                RGBColor(13, 8, 135),
                RGBColor(126, 3, 168),
                RGBColor(204, 71, 120),
                RGBColor(248, 149, 64),
                RGBColor(240, 249, 33),
            ],
        }
    }

    pub fn greys() -> Self {
        Self {
            stops: vec![RGBColor(250, 250, 250), RGBColor(20, 20, 20)],
        }
    }

    /// Sample the map at position `t`, clamped to [0, 1].
    pub fn sample(&self, t: f64) -> RGBColor {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let segments = self.stops.len() - 1;
        let scaled = t * segments as f64;
        let idx = (scaled.floor() as usize).min(segments - 1);
        let local = scaled - idx as f64;
        lerp(self.stops[idx], self.stops[idx + 1], local)
    }

    /// `n` evenly spaced samples across the full map.
    pub fn take(&self, n: usize) -> Vec<RGBColor> {
        if n == 1 {
            return vec![self.sample(0.5)];
        }
        (0..n)
            .map(|i| self.sample(i as f64 / (n - 1) as f64))
            .collect()
    }
}

fn lerp(a: RGBColor, b: RGBColor, t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0);
    let mix = |x: u8, y: u8| (f64::from(x) * (1.0 - t) + f64::from(y) * t).round() as u8;
    RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

/// Map `value` into [0, 1] over the given bounds, clipping out-of-range
/// values. A degenerate domain maps everything to 0.
pub fn clip_normalize(value: f64, min: f64, max: f64) -> f64 {
    if max <= min {
        return 0.0;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

/// Parse a color given by name or as a `#rrggbb` hex string.
pub fn parse_color(spec: &str) -> Result<RGBColor> {
    if let Some(hex) = spec.strip_prefix('#') {
        if hex.len() != 6 {
            bail!("unrecognized color '{}'", spec);
        }
        let r = u8::from_str_radix(&hex[0..2], 16);
        let g = u8::from_str_radix(&hex[2..4], 16);
        let b = u8::from_str_radix(&hex[4..6], 16);
        return match (r, g, b) {
            (Ok(r), Ok(g), Ok(b)) => Ok(RGBColor(r, g, b)),
            _ => bail!("unrecognized color '{}'", spec),
        };
    }
    match spec.to_ascii_lowercase().as_str() {
        "red" => Ok(RGBColor(255, 0, 0)),
        "green" => Ok(RGBColor(0, 128, 0)),
        "blue" => Ok(RGBColor(0, 0, 255)),
        "black" => Ok(RGBColor(0, 0, 0)),
        "white" => Ok(RGBColor(255, 255, 255)),
        "yellow" => Ok(RGBColor(255, 255, 0)),
        "cyan" => Ok(RGBColor(0, 255, 255)),
        "magenta" => Ok(RGBColor(255, 0, 255)),
        "orange" => Ok(RGBColor(255, 165, 0)),
        "purple" => Ok(RGBColor(128, 0, 128)),
        "gray" | "grey" => Ok(RGBColor(128, 128, 128)),
        _ => bail!("unrecognized color '{}'", spec),
    }
}
