use anyhow::{bail, Result};
use plotters::style::RGBColor;
use std::str::FromStr;

use crate::aggregate::{aggregate, Ci, Estimator};
use crate::data::{Assign, DataSource, PlotTable};
use crate::graph::{
    Canvas, DashPattern, ErrStyle, LegendEntry, Marker, SeriesAttrs, SeriesData,
};
use crate::mapping::{AttrSpec, HueMapping, PaletteSpec, SizeMapping, StyleMapping};
use crate::resolve::{resolve, Roles};
use crate::RenderOptions;

/// Gray used for size and style legend glyphs, which carry no hue.
const LEGEND_GRAY: RGBColor = RGBColor(51, 51, 51);

/// Legend construction mode. Brief currently renders the same item list
/// as Full; subsampling many levels into representative ticks is an
/// unimplemented enhancement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegendMode {
    Brief,
    Full,
    Off,
}

impl FromStr for LegendMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "brief" => Ok(LegendMode::Brief),
            "full" => Ok(LegendMode::Full),
            "none" | "off" => Ok(LegendMode::Off),
            _ => bail!("`legend` must be 'brief', 'full', or 'none', got '{}'", s),
        }
    }
}

/// Configuration for one line plot, built up fluently and validated as a
/// whole by [`LinePlot::build`].
pub struct LinePlot {
    data: DataSource,
    roles: Roles,
    palette: PaletteSpec,
    hue_order: Option<Vec<String>>,
    hue_limits: (Option<f64>, Option<f64>),
    size_order: Option<Vec<String>>,
    size_limits: (Option<f64>, Option<f64>),
    size_range: Option<(f64, f64)>,
    style_order: Option<Vec<String>>,
    markers: AttrSpec<Marker>,
    dashes: AttrSpec<DashPattern>,
    estimator: Option<Estimator>,
    ci: Ci,
    n_boot: usize,
    seed: Option<u64>,
    sort: bool,
    err_style: ErrStyle,
    legend: LegendMode,
    defaults: SeriesAttrs,
}

impl Default for LinePlot {
    fn default() -> Self {
        Self {
            data: DataSource::None,
            roles: Roles::default(),
            palette: PaletteSpec::Default,
            hue_order: None,
            hue_limits: (None, None),
            size_order: None,
            size_limits: (None, None),
            size_range: None,
            style_order: None,
            markers: AttrSpec::Off,
            dashes: AttrSpec::FromDefaults,
            estimator: Some(Estimator::Mean),
            ci: Ci::Percent(95.0),
            n_boot: 1000,
            seed: None,
            sort: true,
            err_style: ErrStyle::Band,
            legend: LegendMode::Brief,
            defaults: SeriesAttrs::default(),
        }
    }
}

impl LinePlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(mut self, data: DataSource) -> Self {
        self.data = data;
        self
    }

    pub fn x(mut self, assign: impl Into<Assign>) -> Self {
        self.roles.x = Some(assign.into());
        self
    }

    pub fn y(mut self, assign: impl Into<Assign>) -> Self {
        self.roles.y = Some(assign.into());
        self
    }

    pub fn hue(mut self, assign: impl Into<Assign>) -> Self {
        self.roles.hue = Some(assign.into());
        self
    }

    pub fn size(mut self, assign: impl Into<Assign>) -> Self {
        self.roles.size = Some(assign.into());
        self
    }

    pub fn style(mut self, assign: impl Into<Assign>) -> Self {
        self.roles.style = Some(assign.into());
        self
    }

    pub fn palette(mut self, palette: PaletteSpec) -> Self {
        self.palette = palette;
        self
    }

    pub fn hue_order(mut self, order: &[&str]) -> Self {
        self.hue_order = Some(order.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn hue_limits(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.hue_limits = (min, max);
        self
    }

    pub fn size_order(mut self, order: &[&str]) -> Self {
        self.size_order = Some(order.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn size_limits(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.size_limits = (min, max);
        self
    }

    pub fn size_range(mut self, min_width: f64, max_width: f64) -> Self {
        self.size_range = Some((min_width, max_width));
        self
    }

    pub fn style_order(mut self, order: &[&str]) -> Self {
        self.style_order = Some(order.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn markers(mut self, spec: AttrSpec<Marker>) -> Self {
        self.markers = spec;
        self
    }

    pub fn dashes(mut self, spec: AttrSpec<DashPattern>) -> Self {
        self.dashes = spec;
        self
    }

    pub fn estimator(mut self, estimator: Estimator) -> Self {
        self.estimator = Some(estimator);
        self
    }

    /// Plot raw observations instead of aggregating per x value.
    pub fn no_estimator(mut self) -> Self {
        self.estimator = None;
        self
    }

    pub fn ci(mut self, ci: Ci) -> Self {
        self.ci = ci;
        self
    }

    pub fn n_boot(mut self, n_boot: usize) -> Self {
        self.n_boot = n_boot;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn sort(mut self, sort: bool) -> Self {
        self.sort = sort;
        self
    }

    pub fn err_style(mut self, err_style: ErrStyle) -> Self {
        self.err_style = err_style;
        self
    }

    pub fn legend(mut self, legend: LegendMode) -> Self {
        self.legend = legend;
        self
    }

    /// Default color for subsets without a hue level.
    pub fn color(mut self, color: RGBColor) -> Self {
        self.defaults.color = color;
        self
    }

    pub fn alpha(mut self, alpha: f64) -> Self {
        self.defaults.alpha = alpha;
        self
    }

    /// Resolve the data and every attribute map, validating the whole
    /// configuration before anything is drawn.
    pub fn build(self) -> Result<LinePlotter> {
        LinePlotter::new(self)
    }
}

/// A fully validated plot: canonical table plus the three attribute maps.
#[derive(Debug)]
pub struct LinePlotter {
    table: PlotTable,
    hue: HueMapping,
    sizes: SizeMapping,
    styles: StyleMapping,
    estimator: Option<Estimator>,
    ci: Ci,
    n_boot: usize,
    seed: Option<u64>,
    sort: bool,
    err_style: ErrStyle,
    legend: LegendMode,
    defaults: SeriesAttrs,
}

impl LinePlotter {
    pub fn new(spec: LinePlot) -> Result<Self> {
        if let Ci::Percent(level) = spec.ci {
            if !(0.0..=100.0).contains(&level) {
                bail!(
                    "`ci` must be 'sd', 'none', or a percentage between 0 and 100, got {}",
                    level
                );
            }
            if spec.estimator.is_some() && spec.n_boot == 0 {
                bail!("`n_boot` must be at least 1 for bootstrap intervals");
            }
        }

        let table = resolve(&spec.roles, &spec.data)?;
        let format = table.input_format;

        let hue = HueMapping::parse(
            &table.hue_column(),
            format,
            spec.hue_order.as_deref(),
            &spec.palette,
            spec.hue_limits,
        )?;
        let sizes = SizeMapping::parse(
            &table.size_column(),
            format,
            spec.size_limits,
            spec.size_range,
            spec.size_order.as_deref(),
        )?;
        let styles = StyleMapping::parse(
            &table.style_column(),
            format,
            &spec.markers,
            &spec.dashes,
            spec.style_order.as_deref(),
        )?;

        Ok(Self {
            table,
            hue,
            sizes,
            styles,
            estimator: spec.estimator,
            ci: spec.ci,
            n_boot: spec.n_boot,
            seed: spec.seed,
            sort: spec.sort,
            err_style: spec.err_style,
            legend: spec.legend,
            defaults: spec.defaults,
        })
    }

    pub fn table(&self) -> &PlotTable {
        &self.table
    }

    /// Iterate the (hue, size, style) cross product and collect each
    /// subset's rows. A null level matches every row; empty subsets are
    /// skipped.
    fn subsets(&self) -> Vec<Subset> {
        let mut subsets = Vec::new();
        for hue_level in &self.hue.levels {
            for size_level in &self.sizes.levels {
                for style_level in &self.styles.levels {
                    let points: Vec<(f64, f64)> = self
                        .table
                        .rows
                        .iter()
                        .filter(|row| {
                            matches_level(&row.hue, hue_level)
                                && matches_level(&row.size, size_level)
                                && matches_level(&row.style, style_level)
                        })
                        .map(|row| (row.x, row.y))
                        .collect();
                    if points.is_empty() {
                        continue;
                    }
                    subsets.push(Subset {
                        hue: hue_level.clone(),
                        size: size_level.clone(),
                        style: style_level.clone(),
                        points,
                    });
                }
            }
        }
        subsets
    }

    /// The immutable attribute record for one subset; absent map entries
    /// fall back to the configured defaults.
    fn series_attrs(&self, subset: &Subset) -> SeriesAttrs {
        let color = subset
            .hue
            .as_deref()
            .and_then(|level| self.hue.color_for(level))
            .unwrap_or(self.defaults.color);
        let width = subset
            .size
            .as_deref()
            .and_then(|level| self.sizes.width_for(level))
            .unwrap_or(self.defaults.width);
        let dashes = subset
            .style
            .as_deref()
            .and_then(|level| self.styles.dashes_for(level))
            .unwrap_or_else(|| self.defaults.dashes.clone());
        let marker = subset
            .style
            .as_deref()
            .and_then(|level| self.styles.marker_for(level))
            .or(self.defaults.marker);
        SeriesAttrs {
            color,
            alpha: self.defaults.alpha,
            width,
            dashes,
            marker,
        }
    }

    pub(crate) fn prepare_series(&self) -> Vec<SeriesData> {
        let mut out = Vec::new();
        for subset in self.subsets() {
            let mut points = subset.points.clone();
            if self.sort {
                points.sort_by(|a, b| {
                    a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
                });
            }

            let (points, interval) = match &self.estimator {
                Some(estimator) => {
                    let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
                    let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
                    let agg = aggregate(
                        &xs,
                        &ys,
                        estimator,
                        &self.ci,
                        self.n_boot,
                        self.seed,
                        self.sort,
                    );
                    let line: Vec<(f64, f64)> =
                        agg.x.iter().copied().zip(agg.estimate.iter().copied()).collect();
                    let interval = agg.interval.map(|bounds| {
                        agg.x
                            .iter()
                            .zip(bounds)
                            .filter_map(|(&x, b)| b.map(|(low, high)| (x, low, high)))
                            .collect::<Vec<_>>()
                    });
                    (line, interval.filter(|iv: &Vec<_>| !iv.is_empty()))
                }
                None => (points, None),
            };

            out.push(SeriesData {
                points,
                interval,
                attrs: self.series_attrs(&subset),
            });
        }
        out
    }

    /// Proxy legend entries for every non-null level across the three
    /// roles. A value appearing as both a hue and a style level yields
    /// two entries.
    pub(crate) fn legend_entries(&self) -> Vec<LegendEntry> {
        let mut entries = Vec::new();

        for level in self.hue.levels.iter().flatten() {
            entries.push(LegendEntry {
                label: level.clone(),
                attrs: SeriesAttrs {
                    color: self.hue.color_for(level).unwrap_or(self.defaults.color),
                    ..SeriesAttrs::default()
                },
            });
        }

        for level in self.sizes.levels.iter().flatten() {
            entries.push(LegendEntry {
                label: level.clone(),
                attrs: SeriesAttrs {
                    color: LEGEND_GRAY,
                    width: self.sizes.width_for(level).unwrap_or(self.defaults.width),
                    ..SeriesAttrs::default()
                },
            });
        }

        for level in self.styles.levels.iter().flatten() {
            entries.push(LegendEntry {
                label: level.clone(),
                attrs: SeriesAttrs {
                    color: LEGEND_GRAY,
                    marker: self.styles.marker_for(level),
                    dashes: self.styles.dashes_for(level).unwrap_or_default(),
                    ..SeriesAttrs::default()
                },
            });
        }

        entries
    }

    /// Draw every subset onto the canvas, then labels and legend.
    pub fn draw_on(&self, canvas: &mut Canvas) -> Result<()> {
        let series = self.prepare_series();

        if canvas.x_label().is_none() {
            if let Some(label) = &self.table.x_label {
                canvas.set_x_label(label);
            }
        }
        if canvas.y_label().is_none() {
            if let Some(label) = &self.table.y_label {
                canvas.set_y_label(label);
            }
        }

        let entries = match self.legend {
            LegendMode::Brief | LegendMode::Full => self.legend_entries(),
            LegendMode::Off => Vec::new(),
        };

        canvas.draw(&series, self.err_style, &entries)
    }
}

struct Subset {
    hue: Option<String>,
    size: Option<String>,
    style: Option<String>,
    points: Vec<(f64, f64)>,
}

fn matches_level(cell: &Option<String>, level: &Option<String>) -> bool {
    match level {
        None => true,
        Some(level) => cell.as_deref() == Some(level.as_str()),
    }
}

/// Draw a line plot onto `canvas`, creating a default-sized one when none
/// is supplied. The configuration is validated in full before the canvas
/// is touched.
pub fn lineplot(spec: LinePlot, canvas: Option<Canvas>) -> Result<Canvas> {
    let plotter = spec.build()?;
    let mut canvas = canvas.unwrap_or_else(|| Canvas::new(&RenderOptions::default()));
    plotter.draw_on(&mut canvas)?;
    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Series;

    fn long_plot() -> LinePlot {
        LinePlot::new()
            .x(Series::from_f64(&[1.0, 1.0, 2.0, 2.0]))
            .y(Series::from_f64(&[3.0, 5.0, 4.0, 6.0]))
    }

    #[test]
    fn test_legend_mode_parse_rejects_unknown() {
        assert_eq!("brief".parse::<LegendMode>().unwrap(), LegendMode::Brief);
        assert_eq!("full".parse::<LegendMode>().unwrap(), LegendMode::Full);
        assert_eq!("none".parse::<LegendMode>().unwrap(), LegendMode::Off);
        let err = "maybe".parse::<LegendMode>().unwrap_err();
        assert!(err.to_string().contains("`legend` must be"));
    }

    #[test]
    fn test_aggregation_pools_groups_without_hue() {
        let plotter = long_plot().ci(Ci::Sd).build().unwrap();
        let series = plotter.prepare_series();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].points, vec![(1.0, 4.0), (2.0, 5.0)]);
        let interval = series[0].interval.as_ref().unwrap();
        let sd = 2.0_f64.sqrt();
        assert!((interval[0].1 - (4.0 - sd)).abs() < 1e-12);
        assert!((interval[0].2 - (4.0 + sd)).abs() < 1e-12);
    }

    #[test]
    fn test_subsets_are_split_before_aggregation() {
        // pooled, the x groups would be {1: [3,5], 2: [4,6]} with real sd
        // intervals; split by hue first, every group holds one observation
        // and no interval survives
        let plotter = long_plot()
            .hue(Series::from_strs(&["a", "b", "a", "b"]))
            .ci(Ci::Sd)
            .build()
            .unwrap();
        let series = plotter.prepare_series();
        assert_eq!(series.len(), 2);
        for s in &series {
            assert_eq!(s.points.len(), 2);
            assert!(s.interval.is_none());
        }
        assert_eq!(series[0].points, vec![(1.0, 3.0), (2.0, 4.0)]);
    }

    #[test]
    fn test_two_observation_groups_keep_sd_intervals_after_split() {
        let plotter = long_plot()
            .hue(Series::from_strs(&["a", "a", "b", "b"]))
            .ci(Ci::Sd)
            .build()
            .unwrap();
        let series = plotter.prepare_series();
        assert_eq!(series.len(), 2);
        // each subset collapses to one aggregated point whose group still
        // has two observations
        let sd = 2.0_f64.sqrt();
        assert_eq!(series[0].points, vec![(1.0, 4.0)]);
        let interval = series[0].interval.as_ref().unwrap();
        assert!((interval[0].1 - (4.0 - sd)).abs() < 1e-12);
        assert!((interval[0].2 - (4.0 + sd)).abs() < 1e-12);
    }

    #[test]
    fn test_unused_roles_give_single_subset() {
        let plotter = long_plot().no_estimator().build().unwrap();
        let series = plotter.prepare_series();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].points.len(), 4);
        assert_eq!(series[0].attrs.color, SeriesAttrs::default().color);
    }

    #[test]
    fn test_sort_orders_points_by_x_then_y() {
        let plotter = LinePlot::new()
            .x(Series::from_f64(&[2.0, 1.0, 1.0]))
            .y(Series::from_f64(&[9.0, 5.0, 3.0]))
            .no_estimator()
            .build()
            .unwrap();
        let series = plotter.prepare_series();
        assert_eq!(series[0].points, vec![(1.0, 3.0), (1.0, 5.0), (2.0, 9.0)]);
    }

    #[test]
    fn test_hue_and_style_levels_both_get_legend_entries() {
        let plotter = long_plot()
            .hue(Series::from_strs(&["a", "a", "b", "b"]))
            .style(Series::from_strs(&["a", "a", "b", "b"]))
            .build()
            .unwrap();
        let entries = plotter.legend_entries();
        // no deduplication across roles: a, b from hue plus a, b from style
        assert_eq!(entries.len(), 4);
        let labels: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["a", "b", "a", "b"]);
    }

    #[test]
    fn test_invalid_ci_rejected_before_drawing() {
        let err = long_plot().ci(Ci::Percent(250.0)).build().unwrap_err();
        assert!(err.to_string().contains("`ci` must be"));
        let err = long_plot().n_boot(0).build().unwrap_err();
        assert!(err.to_string().contains("`n_boot`"));
    }

    #[test]
    fn test_size_mapping_drives_line_width() {
        let plotter = long_plot()
            .size(Series::from_f64(&[1.0, 1.0, 2.0, 2.0]))
            .size_range(1.0, 4.0)
            .no_estimator()
            .build()
            .unwrap();
        let series = plotter.prepare_series();
        assert_eq!(series.len(), 2);
        let widths: Vec<f64> = series.iter().map(|s| s.attrs.width).collect();
        // additive formula: min + normalized * max
        assert!(widths.contains(&1.0));
        assert!(widths.contains(&5.0));
    }

    #[test]
    fn test_style_defaults_assign_dashes_per_subset() {
        let plotter = long_plot()
            .style(Series::from_strs(&["a", "a", "b", "b"]))
            .no_estimator()
            .build()
            .unwrap();
        let series = plotter.prepare_series();
        assert_eq!(series.len(), 2);
        assert!(series[0].attrs.dashes.is_solid());
        assert_eq!(series[1].attrs.dashes, DashPattern(vec![4.0, 1.5]));
    }

    #[test]
    fn test_draw_on_sets_labels_only_if_unset() {
        let plotter = LinePlot::new()
            .x(Series::named_f64("hour", &[1.0, 2.0]))
            .y(Series::named_f64("load", &[3.0, 4.0]))
            .build()
            .unwrap();

        let mut canvas = Canvas::new(&RenderOptions::default());
        canvas.set_x_label("existing");
        plotter.draw_on(&mut canvas).unwrap();
        assert_eq!(canvas.x_label(), Some("existing"));
        assert_eq!(canvas.y_label(), Some("load"));
    }
}
