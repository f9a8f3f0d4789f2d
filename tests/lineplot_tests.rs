use relplot::{
    lineplot, AttrSpec, Canvas, Ci, DataSource, ErrStyle, Frame, LegendMode, LinePlot,
    PaletteSpec, RenderOptions, Series,
};

/// Check if bytes are a valid PNG
fn is_valid_png(bytes: &[u8]) -> bool {
    bytes.len() > 8 && &bytes[0..8] == &[137, 80, 78, 71, 13, 10, 26, 10]
}

fn sales_frame() -> Frame {
    let csv = "\
quarter,revenue,region
1,10,east
1,14,east
2,12,east
2,16,east
1,8,west
1,6,west
2,9,west
2,11,west
";
    relplot::csv_reader::read_frame(csv.as_bytes()).unwrap()
}

#[test]
fn test_end_to_end_long_form() {
    let plot = LinePlot::new()
        .data(DataSource::Table(sales_frame()))
        .x("quarter")
        .y("revenue")
        .hue("region")
        .ci(Ci::Sd);

    let canvas = lineplot(plot, None).unwrap();
    let png = canvas.render().unwrap();
    assert!(is_valid_png(&png), "output is not a valid PNG");
}

#[test]
fn test_end_to_end_bootstrap_bars() {
    let plot = LinePlot::new()
        .data(DataSource::Table(sales_frame()))
        .x("quarter")
        .y("revenue")
        .hue("region")
        .style("region")
        .markers(AttrSpec::FromDefaults)
        .seed(42)
        .n_boot(200)
        .err_style(ErrStyle::Bars)
        .legend(LegendMode::Full);

    let canvas = lineplot(plot, None).unwrap();
    assert!(is_valid_png(&canvas.render().unwrap()));
}

#[test]
fn test_end_to_end_wide_form() {
    let frame = Frame::new(
        vec!["north".to_string(), "south".to_string()],
        vec![
            vec!["3.0".to_string(), "5.5".to_string()],
            vec!["4.0".to_string(), "6.5".to_string()],
            vec!["3.5".to_string(), "7.0".to_string()],
        ],
    )
    .unwrap();

    // no x/y: every column becomes its own line keyed by hue and style
    let plot = LinePlot::new().data(DataSource::Table(frame));
    let canvas = lineplot(plot, None).unwrap();
    assert!(is_valid_png(&canvas.render().unwrap()));
}

#[test]
fn test_end_to_end_flat_sequence() {
    let plot = LinePlot::new()
        .data(DataSource::Flat(vec![1.0, 3.0, 2.0, 5.0]))
        .legend(LegendMode::Off);
    let canvas = lineplot(plot, None).unwrap();
    assert!(is_valid_png(&canvas.render().unwrap()));
}

#[test]
fn test_end_to_end_nested_sequences() {
    let plot = LinePlot::new().data(DataSource::Nested(vec![
        vec![1.0, 2.0, 3.0],
        vec![4.0, 5.0],
    ]));
    let canvas = lineplot(plot, None).unwrap();
    assert!(is_valid_png(&canvas.render().unwrap()));
}

#[test]
fn test_end_to_end_literal_series_with_size() {
    let plot = LinePlot::new()
        .x(Series::named_f64("day", &[1.0, 2.0, 3.0, 4.0]))
        .y(Series::named_f64("visits", &[10.0, 12.0, 9.0, 14.0]))
        .size(Series::from_f64(&[1.0, 1.0, 2.0, 2.0]))
        .no_estimator();

    let options = RenderOptions {
        width: 400,
        height: 300,
    };
    let canvas = lineplot(plot, Some(Canvas::new(&options).with_title("traffic"))).unwrap();
    assert_eq!(canvas.size(), (400, 300));
    assert_eq!(canvas.x_label(), Some("day"));
    assert_eq!(canvas.y_label(), Some("visits"));
    assert!(is_valid_png(&canvas.render().unwrap()));
}

#[test]
fn test_only_one_position_is_an_error() {
    let plot = LinePlot::new()
        .data(DataSource::Table(sales_frame()))
        .x("quarter");
    let err = lineplot(plot, None).unwrap_err();
    assert!(err.to_string().contains("both or neither"));
}

#[test]
fn test_unresolvable_column_is_an_error() {
    let plot = LinePlot::new()
        .data(DataSource::Table(sales_frame()))
        .x("quarter")
        .y("profit");
    let err = lineplot(plot, None).unwrap_err();
    assert!(err.to_string().contains("could not interpret input 'profit'"));
}

#[test]
fn test_partial_palette_map_is_an_error() {
    let mut map = std::collections::HashMap::new();
    map.insert("east".to_string(), relplot::RGBColor(200, 0, 0));

    let plot = LinePlot::new()
        .data(DataSource::Table(sales_frame()))
        .x("quarter")
        .y("revenue")
        .hue("region")
        .palette(PaletteSpec::Map(map));

    let err = lineplot(plot, None).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("missing"));
    assert!(msg.contains("west"));
}

#[test]
fn test_categorical_size_is_an_error() {
    let plot = LinePlot::new()
        .data(DataSource::Table(sales_frame()))
        .x("quarter")
        .y("revenue")
        .size("region");
    let err = lineplot(plot, None).unwrap_err();
    assert!(err.to_string().contains("must be numeric"));
}

#[test]
fn test_legend_mode_maybe_is_an_error() {
    let err = "maybe".parse::<LegendMode>().unwrap_err();
    assert!(err.to_string().contains("`legend` must be"));
}

#[test]
fn test_wide_form_row_count_and_roles() {
    // N columns x M rows melt into N*M observations with hue == style
    let frame = Frame::new(
        vec!["a".to_string(), "b".to_string(), "c".to_string()],
        vec![
            vec!["1".to_string(), "2".to_string(), "3".to_string()],
            vec!["4".to_string(), "5".to_string(), "6".to_string()],
        ],
    )
    .unwrap();
    let plotter = LinePlot::new()
        .data(DataSource::Table(frame))
        .build()
        .unwrap();
    let table = plotter.table();
    assert_eq!(table.len(), 6);
    assert!(table.rows.iter().all(|r| r.hue == r.style));
}

#[test]
fn test_empty_input_draws_empty_axes() {
    let plot = LinePlot::new().data(DataSource::Flat(vec![]));
    let canvas = lineplot(plot, None).unwrap();
    assert!(is_valid_png(&canvas.render().unwrap()));
}
