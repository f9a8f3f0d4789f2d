// Statistical line plotting for tabular and array-like data

pub mod aggregate;
pub mod classify;
pub mod csv_reader;
pub mod data;
pub mod graph;
pub mod mapping;
pub mod palette;
pub mod plot;
pub mod resolve;

pub use aggregate::{aggregate, Aggregated, Ci, Estimator};
pub use classify::{categorical_order, classify, VarKind};
pub use data::{Assign, DataSource, Frame, InputFormat, Observation, PlotTable, Series};
pub use graph::{
    Canvas, DashPattern, ErrStyle, LegendEntry, Marker, SeriesAttrs, SeriesData,
    DEFAULT_LINE_WIDTH,
};
pub use mapping::{AttrSpec, HueMapping, PaletteSpec, SizeMapping, StyleMapping};
pub use palette::{clip_normalize, ColorPalette, Colormap};
pub use plot::{lineplot, LegendMode, LinePlot, LinePlotter};
pub use resolve::{resolve, Roles};

// The color type attribute maps are built from
pub use plotters::style::RGBColor;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RenderOptions {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}
