use anyhow::{anyhow, bail, Result};
use plotters::style::RGBColor;
use std::collections::HashMap;

use crate::classify::{categorical_order, classify, numeric_levels, VarKind};
use crate::data::InputFormat;
use crate::graph::{DashPattern, Marker, DEFAULT_LINE_WIDTH};
use crate::palette::{clip_normalize, ColorPalette, Colormap};

/// How colors for the hue role are specified.
#[derive(Debug, Clone, Default)]
pub enum PaletteSpec {
    /// Qualitative cycle for categorical data, viridis for numeric
    #[default]
    Default,
    /// A named palette or colormap, resolved at parse time
    Named(String),
    /// Colors matched positionally to levels
    List(Vec<RGBColor>),
    /// An explicit level -> color mapping; must cover every level
    Map(HashMap<String, RGBColor>),
    /// An explicit continuous colormap (numeric data only)
    Cmap(Colormap),
}

/// How markers or dash patterns for the style role are specified.
#[derive(Debug, Clone, Default)]
pub enum AttrSpec<T> {
    /// No mapping; the draw-time default attribute applies
    #[default]
    Off,
    /// Zip levels against the built-in ordered default list
    FromDefaults,
    /// Attributes matched positionally to levels
    List(Vec<T>),
    /// An explicit level -> attribute mapping; must cover every level
    Map(HashMap<String, T>),
}

/// Level -> color assignment for the hue role.
#[derive(Debug, Clone)]
pub struct HueMapping {
    pub kind: VarKind,
    /// Levels in mapping order; the single null entry means the role is
    /// unused and matches every row.
    pub levels: Vec<Option<String>>,
    pub palette: HashMap<String, RGBColor>,
    pub cmap: Option<Colormap>,
    pub limits: Option<(f64, f64)>,
}

impl HueMapping {
    pub fn parse(
        cells: &[Option<String>],
        format: InputFormat,
        order: Option<&[String]>,
        palette: &PaletteSpec,
        limits: (Option<f64>, Option<f64>),
    ) -> Result<Self> {
        let kind = classify(cells, format);
        match kind {
            VarKind::Unused => Ok(Self {
                kind,
                levels: vec![None],
                palette: HashMap::new(),
                cmap: None,
                limits: None,
            }),
            VarKind::Categorical => Self::parse_categorical(cells, order, palette),
            VarKind::Numeric => Self::parse_numeric(cells, palette, limits),
        }
    }

    fn parse_categorical(
        cells: &[Option<String>],
        order: Option<&[String]>,
        palette: &PaletteSpec,
    ) -> Result<Self> {
        let levels = match order {
            Some(order) => order.to_vec(),
            None => categorical_order(cells),
        };
        let n = levels.len();

        let colors: HashMap<String, RGBColor> = match palette {
            PaletteSpec::Map(map) => {
                check_missing_levels(&levels, map, "palette")?;
                map.clone()
            }
            PaletteSpec::Default => {
                let generated = if n <= ColorPalette::category10().len() {
                    ColorPalette::category10().cycle(n)
                } else {
                    // More levels than the default cycle provides
                    ColorPalette::husl(n).colors().to_vec()
                };
                levels.iter().cloned().zip(generated).collect()
            }
            PaletteSpec::Named(name) => {
                let generated = named_palette(name, n)?;
                levels.iter().cloned().zip(generated).collect()
            }
            PaletteSpec::List(colors) => {
                if colors.is_empty() {
                    bail!("palette list must not be empty");
                }
                let cycled: Vec<RGBColor> =
                    (0..n).map(|i| colors[i % colors.len()]).collect();
                levels.iter().cloned().zip(cycled).collect()
            }
            PaletteSpec::Cmap(cmap) => levels.iter().cloned().zip(cmap.take(n)).collect(),
        };

        Ok(Self {
            kind: VarKind::Categorical,
            levels: levels.into_iter().map(Some).collect(),
            palette: colors,
            cmap: None,
            limits: None,
        })
    }

    fn parse_numeric(
        cells: &[Option<String>],
        palette: &PaletteSpec,
        limits: (Option<f64>, Option<f64>),
    ) -> Result<Self> {
        let levels = numeric_levels(cells);

        // An explicit mapping or list bypasses the colormap entirely
        match palette {
            PaletteSpec::Map(map) => {
                let names: Vec<String> = levels.iter().map(|(l, _)| l.clone()).collect();
                check_missing_levels(&names, map, "palette")?;
                return Ok(Self {
                    kind: VarKind::Numeric,
                    levels: names.into_iter().map(Some).collect(),
                    palette: map.clone(),
                    cmap: None,
                    limits: None,
                });
            }
            PaletteSpec::List(colors) => {
                if colors.len() != levels.len() {
                    bail!(
                        "palette has the wrong number of colors: expected {}, got {}",
                        levels.len(),
                        colors.len()
                    );
                }
                let palette = levels
                    .iter()
                    .map(|(l, _)| l.clone())
                    .zip(colors.iter().copied())
                    .collect();
                return Ok(Self {
                    kind: VarKind::Numeric,
                    levels: levels.into_iter().map(|(l, _)| Some(l)).collect(),
                    palette,
                    cmap: None,
                    limits: None,
                });
            }
            _ => {}
        }

        let cmap = match palette {
            PaletteSpec::Default => Colormap::viridis(),
            PaletteSpec::Named(name) => Colormap::from_name(name)?,
            PaletteSpec::Cmap(cmap) => cmap.clone(),
            PaletteSpec::Map(_) | PaletteSpec::List(_) => unreachable!(),
        };

        let values: Vec<f64> = levels.iter().map(|(_, v)| *v).collect();
        let (min, max) = resolve_limits(&values, limits);

        let palette = levels
            .iter()
            .map(|(l, v)| (l.clone(), cmap.sample(clip_normalize(*v, min, max))))
            .collect();

        Ok(Self {
            kind: VarKind::Numeric,
            levels: levels.into_iter().map(|(l, _)| Some(l)).collect(),
            palette,
            cmap: Some(cmap),
            limits: Some((min, max)),
        })
    }

    pub fn color_for(&self, level: &str) -> Option<RGBColor> {
        self.palette.get(level).copied()
    }

    pub fn is_unused(&self) -> bool {
        self.kind == VarKind::Unused
    }
}

/// Level -> line width assignment for the size role. Size variables must
/// be numeric.
#[derive(Debug, Clone)]
pub struct SizeMapping {
    pub levels: Vec<Option<String>>,
    pub widths: HashMap<String, f64>,
    pub limits: Option<(f64, f64)>,
    pub range: Option<(f64, f64)>,
}

impl SizeMapping {
    pub fn parse(
        cells: &[Option<String>],
        format: InputFormat,
        limits: (Option<f64>, Option<f64>),
        range: Option<(f64, f64)>,
        order: Option<&[String]>,
    ) -> Result<Self> {
        match classify(cells, format) {
            VarKind::Unused => {
                return Ok(Self {
                    levels: vec![None],
                    widths: HashMap::new(),
                    limits: None,
                    range: None,
                })
            }
            VarKind::Categorical => {
                bail!("the variable that determines size must be numeric")
            }
            VarKind::Numeric => {}
        }

        let levels = match order {
            Some(order) => order.to_vec(),
            None => categorical_order(cells),
        };

        let mut level_values = Vec::with_capacity(levels.len());
        for level in &levels {
            let v: f64 = level.parse().map_err(|_| {
                anyhow!("could not parse size level '{}' as a number", level)
            })?;
            level_values.push(v);
        }

        let (min_width, max_width) =
            range.unwrap_or((DEFAULT_LINE_WIDTH * 0.5, DEFAULT_LINE_WIDTH * 2.0));

        let data_values: Vec<f64> = numeric_levels(cells).iter().map(|(_, v)| *v).collect();
        let (min, max) = resolve_limits(&data_values, limits);

        // Note the asymmetry: max_width scales the normalized position and
        // is added to min_width, it is not the upper end of the result.
        let widths = levels
            .iter()
            .zip(&level_values)
            .map(|(l, &v)| (l.clone(), min_width + clip_normalize(v, min, max) * max_width))
            .collect();

        Ok(Self {
            levels: levels.into_iter().map(Some).collect(),
            widths,
            limits: Some((min, max)),
            range: Some((min_width, max_width)),
        })
    }

    pub fn width_for(&self, level: &str) -> Option<f64> {
        self.widths.get(level).copied()
    }
}

/// Level -> marker and dash assignments for the style role.
#[derive(Debug, Clone)]
pub struct StyleMapping {
    pub levels: Vec<Option<String>>,
    pub markers: HashMap<String, Marker>,
    pub dashes: HashMap<String, DashPattern>,
}

impl StyleMapping {
    pub fn parse(
        cells: &[Option<String>],
        format: InputFormat,
        markers: &AttrSpec<Marker>,
        dashes: &AttrSpec<DashPattern>,
        order: Option<&[String]>,
    ) -> Result<Self> {
        if classify(cells, format) == VarKind::Unused {
            return Ok(Self {
                levels: vec![None],
                markers: HashMap::new(),
                dashes: HashMap::new(),
            });
        }

        let levels = match order {
            Some(order) => order.to_vec(),
            None => categorical_order(cells),
        };

        let markers = attr_map(&levels, markers, &Marker::defaults(), "markers")?;
        let dashes = attr_map(&levels, dashes, &DashPattern::defaults(), "dashes")?;

        Ok(Self {
            levels: levels.into_iter().map(Some).collect(),
            markers,
            dashes,
        })
    }

    pub fn marker_for(&self, level: &str) -> Option<Marker> {
        self.markers.get(level).copied()
    }

    pub fn dashes_for(&self, level: &str) -> Option<DashPattern> {
        self.dashes.get(level).cloned()
    }
}

fn attr_map<T: Clone>(
    levels: &[String],
    spec: &AttrSpec<T>,
    defaults: &[T],
    what: &str,
) -> Result<HashMap<String, T>> {
    let map: HashMap<String, T> = match spec {
        AttrSpec::Off => HashMap::new(),
        AttrSpec::FromDefaults => levels
            .iter()
            .cloned()
            .zip(defaults.iter().cloned())
            .collect(),
        AttrSpec::List(attrs) => levels.iter().cloned().zip(attrs.iter().cloned()).collect(),
        AttrSpec::Map(map) => map.clone(),
    };

    if !map.is_empty() {
        check_missing_levels(levels, &map, what)?;
    }
    Ok(map)
}

fn check_missing_levels<T>(
    levels: &[String],
    map: &HashMap<String, T>,
    what: &str,
) -> Result<()> {
    let mut missing: Vec<&str> = levels
        .iter()
        .filter(|l| !map.contains_key(*l))
        .map(|l| l.as_str())
        .collect();
    if !missing.is_empty() {
        missing.sort_unstable();
        bail!(
            "these `{}` levels are missing: {}",
            what,
            missing.join(", ")
        );
    }
    Ok(())
}

fn named_palette(name: &str, n: usize) -> Result<Vec<RGBColor>> {
    match name.to_ascii_lowercase().as_str() {
        "category10" | "tab10" => Ok(ColorPalette::category10().cycle(n)),
        "husl" => Ok(ColorPalette::husl(n).colors().to_vec()),
        _ => Ok(Colormap::from_name(name)?.take(n)),
    }
}

/// Resolve normalization bounds: each side falls back to the data extreme
/// when unspecified.
fn resolve_limits(values: &[f64], limits: (Option<f64>, Option<f64>)) -> (f64, f64) {
    let data_min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let data_max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (limits.0.unwrap_or(data_min), limits.1.unwrap_or(data_max))
}
