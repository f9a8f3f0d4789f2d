use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;

use relplot::{
    lineplot, AttrSpec, Canvas, Ci, DataSource, Estimator, ErrStyle, LegendMode, LinePlot,
    PaletteSpec, RenderOptions,
};

#[derive(Parser, Debug)]
#[command(name = "relplot")]
#[command(about = "Draw statistical line plots from CSV data", long_about = None)]
struct Args {
    /// Column for the x axis; omit together with --y for wide-form input
    #[arg(long)]
    x: Option<String>,

    /// Column for the y axis
    #[arg(long)]
    y: Option<String>,

    /// Column mapped to line color
    #[arg(long)]
    hue: Option<String>,

    /// Column mapped to line width (numeric only)
    #[arg(long)]
    size: Option<String>,

    /// Column mapped to marker and dash style
    #[arg(long)]
    style: Option<String>,

    /// Named palette or colormap for the hue mapping
    #[arg(long)]
    palette: Option<String>,

    /// Default line color (name or #rrggbb) when no hue mapping applies
    #[arg(long)]
    color: Option<String>,

    /// Statistic pooling repeated observations per x ('none' to plot raw)
    #[arg(long, default_value = "mean")]
    estimator: String,

    /// Confidence interval: a percentage, 'sd', or 'none'
    #[arg(long, default_value = "95")]
    ci: String,

    /// Bootstrap resample count
    #[arg(long, default_value_t = 1000)]
    n_boot: usize,

    /// Seed for reproducible bootstrap resampling
    #[arg(long)]
    seed: Option<u64>,

    /// Interval display: 'band' or 'bars'
    #[arg(long, default_value = "band")]
    err_style: String,

    /// Legend mode: 'brief', 'full', or 'none'
    #[arg(long, default_value = "brief")]
    legend: String,

    /// Assign default markers to style levels
    #[arg(long)]
    markers: bool,

    /// Keep input order instead of sorting by x
    #[arg(long)]
    no_sort: bool,

    #[arg(long)]
    title: Option<String>,

    #[arg(long, default_value_t = 800)]
    width: u32,

    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Output file; PNG goes to stdout when omitted
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let frame = relplot::csv_reader::read_frame_from_stdin()
        .context("failed to read CSV from stdin")?;

    let mut plot = LinePlot::new().data(DataSource::Table(frame));

    if let Some(x) = &args.x {
        plot = plot.x(x.as_str());
    }
    if let Some(y) = &args.y {
        plot = plot.y(y.as_str());
    }
    if let Some(hue) = &args.hue {
        plot = plot.hue(hue.as_str());
    }
    if let Some(size) = &args.size {
        plot = plot.size(size.as_str());
    }
    if let Some(style) = &args.style {
        plot = plot.style(style.as_str());
    }
    if let Some(palette) = &args.palette {
        plot = plot.palette(PaletteSpec::Named(palette.clone()));
    }
    if let Some(color) = &args.color {
        plot = plot.color(relplot::palette::parse_color(color)?);
    }

    plot = match args.estimator.as_str() {
        "none" => plot.no_estimator(),
        name => plot.estimator(name.parse::<Estimator>()?),
    };
    plot = plot.ci(args.ci.parse::<Ci>()?);
    plot = plot.n_boot(args.n_boot);
    if let Some(seed) = args.seed {
        plot = plot.seed(seed);
    }
    plot = plot.err_style(args.err_style.parse::<ErrStyle>()?);
    plot = plot.legend(args.legend.parse::<LegendMode>()?);
    if args.markers {
        plot = plot.markers(AttrSpec::FromDefaults);
    }
    plot = plot.sort(!args.no_sort);

    let options = RenderOptions {
        width: args.width,
        height: args.height,
    };
    let mut canvas = Canvas::new(&options);
    if let Some(title) = &args.title {
        canvas = canvas.with_title(title);
    }

    let canvas = lineplot(plot, Some(canvas)).context("failed to render plot")?;
    let png_bytes = canvas.render()?;

    match &args.out {
        Some(path) => {
            std::fs::write(path, &png_bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(&png_bytes)
                .context("failed to write PNG to stdout")?;
            handle.flush().context("failed to flush stdout")?;
        }
    }

    Ok(())
}
