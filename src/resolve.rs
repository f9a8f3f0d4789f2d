use anyhow::{anyhow, bail, Result};

use crate::data::{
    Assign, DataSource, Frame, InputFormat, Observation, PlotTable,
};

/// The five semantic roles a variable can be assigned to. x and y must be
/// given together (long-form) or not at all (wide-form).
#[derive(Debug, Clone, Default)]
pub struct Roles {
    pub x: Option<Assign>,
    pub y: Option<Assign>,
    pub hue: Option<Assign>,
    pub size: Option<Assign>,
    pub style: Option<Assign>,
}

/// Normalize any supported input shape into the canonical observation
/// table. Rows with a null x or y cell are dropped here, so downstream
/// components never see missing positions.
pub fn resolve(roles: &Roles, data: &DataSource) -> Result<PlotTable> {
    match (&roles.x, &roles.y) {
        (None, None) => resolve_wide(data),
        (Some(x), Some(y)) => resolve_long(x, y, roles, data),
        _ => bail!("either both or neither of `x` and `y` must be specified"),
    }
}

fn resolve_wide(data: &DataSource) -> Result<PlotTable> {
    let mut table = PlotTable {
        rows: Vec::new(),
        x_label: None,
        y_label: None,
        input_format: InputFormat::Wide,
    };

    match data {
        DataSource::None => {}

        DataSource::Flat(values) => {
            for (i, &v) in values.iter().enumerate() {
                if v.is_nan() {
                    continue;
                }
                table.rows.push(Observation {
                    x: i as f64,
                    y: v,
                    hue: None,
                    size: None,
                    style: None,
                });
            }
        }

        DataSource::Table(frame) => {
            melt_frame(frame, &mut table)?;
        }

        DataSource::Matrix(rows) => {
            let width = rows.first().map(|r| r.len()).unwrap_or(0);
            if rows.iter().any(|r| r.len() != width) {
                bail!("a 2D array input must have rows of equal length");
            }
            // Melt column by column, like the labeled case
            for col in 0..width {
                let id = col.to_string();
                for (i, row) in rows.iter().enumerate() {
                    let v = row[col];
                    if v.is_nan() {
                        continue;
                    }
                    table.rows.push(Observation {
                        x: i as f64,
                        y: v,
                        hue: Some(id.clone()),
                        size: None,
                        style: Some(id.clone()),
                    });
                }
            }
        }

        DataSource::Nested(groups) => {
            // Ragged input: every inner sequence restarts x at 0 and gets
            // its own integer group id
            for (g, inner) in groups.iter().enumerate() {
                let id = g.to_string();
                for (i, &v) in inner.iter().enumerate() {
                    if v.is_nan() {
                        continue;
                    }
                    table.rows.push(Observation {
                        x: i as f64,
                        y: v,
                        hue: Some(id.clone()),
                        size: None,
                        style: Some(id.clone()),
                    });
                }
            }
        }
    }

    Ok(table)
}

fn melt_frame(frame: &Frame, table: &mut PlotTable) -> Result<()> {
    table.x_label = frame.index_label().map(|s| s.to_string());

    let index = frame.index_values();
    let mut index_parsed = Vec::with_capacity(index.len());
    for raw in &index {
        if raw.is_empty() {
            index_parsed.push(None);
        } else {
            let v: f64 = raw
                .parse()
                .map_err(|_| anyhow!("a wide-form index must be numeric, got '{}'", raw))?;
            index_parsed.push(Some(v));
        }
    }

    for (col, header) in frame.headers.iter().enumerate() {
        for (i, row) in frame.rows.iter().enumerate() {
            let cell = &row[col];
            if cell.is_empty() {
                continue;
            }
            let y: f64 = cell
                .parse()
                .map_err(|_| anyhow!("a wide-form input must have only numeric values"))?;
            let x = match index_parsed[i] {
                Some(x) => x,
                None => continue,
            };
            if y.is_nan() {
                continue;
            }
            table.rows.push(Observation {
                x,
                y,
                hue: Some(header.clone()),
                size: None,
                style: Some(header.clone()),
            });
        }
    }

    Ok(())
}

fn resolve_long(
    x: &Assign,
    y: &Assign,
    roles: &Roles,
    data: &DataSource,
) -> Result<PlotTable> {
    let (x_label, x_cells) = resolve_assign(x, data)?;
    let (y_label, y_cells) = resolve_assign(y, data)?;

    let hue_cells = resolve_optional(&roles.hue, data)?;
    let size_cells = resolve_optional(&roles.size, data)?;
    let style_cells = resolve_optional(&roles.style, data)?;

    let n = x_cells.len();
    for (name, cells) in [
        ("y", Some(&y_cells)),
        ("hue", hue_cells.as_ref()),
        ("size", size_cells.as_ref()),
        ("style", style_cells.as_ref()),
    ] {
        if let Some(cells) = cells {
            if cells.len() != n {
                bail!(
                    "role columns must have equal lengths: `x` has {} values, `{}` has {}",
                    n,
                    name,
                    cells.len()
                );
            }
        }
    }

    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        let (x_cell, y_cell) = (&x_cells[i], &y_cells[i]);
        let (x_cell, y_cell) = match (x_cell, y_cell) {
            (Some(x), Some(y)) => (x, y),
            // null positions are dropped
            _ => continue,
        };
        let x = parse_position(x_cell, "x")?;
        let y = parse_position(y_cell, "y")?;
        if x.is_nan() || y.is_nan() {
            continue;
        }
        rows.push(Observation {
            x,
            y,
            hue: hue_cells.as_ref().map(|c| c[i].clone()).unwrap_or(None),
            size: size_cells.as_ref().map(|c| c[i].clone()).unwrap_or(None),
            style: style_cells.as_ref().map(|c| c[i].clone()).unwrap_or(None),
        });
    }

    Ok(PlotTable {
        rows,
        x_label,
        y_label,
        input_format: InputFormat::Long,
    })
}

fn parse_position(cell: &str, role: &str) -> Result<f64> {
    cell.parse::<f64>()
        .map_err(|_| anyhow!("could not parse value '{}' for `{}` as a number", cell, role))
}

/// Resolve one role argument into (label, cells). A column name that does
/// not resolve through the data table is a validation error.
fn resolve_assign(
    assign: &Assign,
    data: &DataSource,
) -> Result<(Option<String>, Vec<Option<String>>)> {
    match assign {
        Assign::Col(name) => {
            if let DataSource::Table(frame) = data {
                if let Some(cells) = frame.column(name) {
                    return Ok((Some(name.clone()), cells));
                }
            }
            bail!("could not interpret input '{}'", name)
        }
        Assign::Vals(series) => Ok((series.name.clone(), series.values.clone())),
    }
}

fn resolve_optional(
    assign: &Option<Assign>,
    data: &DataSource,
) -> Result<Option<Vec<Option<String>>>> {
    match assign {
        Some(a) => {
            let (_, cells) = resolve_assign(a, data)?;
            Ok(Some(cells))
        }
        None => Ok(None),
    }
}
