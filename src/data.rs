use anyhow::{anyhow, bail, Result};
use serde_json::Value;

/// How the raw input was shaped. Decided once by the resolver; the
/// classifier needs it because wide-form grouping columns are always
/// categorical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Wide,
    Long,
}

/// A labeled table of string cells (CSV or JSON input). Empty cells are
/// null markers.
#[derive(Debug, Clone)]
pub struct Frame {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    index_name: Option<String>,
    index: Option<Vec<String>>,
}

impl Frame {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        for (i, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                bail!(
                    "row {} has {} cells but the table has {} columns",
                    i,
                    row.len(),
                    headers.len()
                );
            }
        }
        Ok(Self {
            headers,
            rows,
            index_name: None,
            index: None,
        })
    }

    /// Attach a named row index, used as the x axis in wide-form mode.
    pub fn with_index(mut self, name: Option<&str>, values: Vec<String>) -> Result<Self> {
        if values.len() != self.rows.len() {
            bail!(
                "index has {} values but the table has {} rows",
                values.len(),
                self.rows.len()
            );
        }
        self.index_name = name.map(|s| s.to_string());
        self.index = Some(values);
        Ok(self)
    }

    /// Create a Frame from a JSON array of objects.
    pub fn from_json(value: &Value) -> Result<Self> {
        let array = value
            .as_array()
            .ok_or_else(|| anyhow!("input data must be a JSON array of objects"))?;

        if array.is_empty() {
            bail!("input data array is empty");
        }

        // Headers come from the first object
        let first_obj = array[0]
            .as_object()
            .ok_or_else(|| anyhow!("items in array must be objects"))?;

        let headers: Vec<String> = first_obj.keys().cloned().collect();

        let mut rows = Vec::new();
        for item in array {
            let obj = item
                .as_object()
                .ok_or_else(|| anyhow!("items in array must be objects"))?;

            let mut row = Vec::new();
            for header in &headers {
                let val_str = match obj.get(header) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Number(n)) => n.to_string(),
                    Some(Value::Bool(b)) => b.to_string(),
                    Some(Value::Null) | None => String::new(),
                    _ => bail!("unsupported value type for field '{}'", header),
                };
                row.push(val_str);
            }
            rows.push(row);
        }

        Frame::new(headers, rows)
    }

    /// Look up a column by header, case-insensitively.
    pub fn column(&self, name: &str) -> Option<Vec<Option<String>>> {
        let idx = self
            .headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))?;
        Some(self.rows.iter().map(|r| cell_value(&r[idx])).collect())
    }

    pub fn index_label(&self) -> Option<&str> {
        self.index_name.as_deref()
    }

    /// Row index values; defaults to the 0-based row position.
    pub fn index_values(&self) -> Vec<String> {
        match &self.index {
            Some(values) => values.clone(),
            None => (0..self.rows.len()).map(|i| i.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Normalize a raw string cell: empty means null.
pub(crate) fn cell_value(raw: &str) -> Option<String> {
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

/// A literal column of values passed directly to a role, with an optional
/// name used for axis labeling.
#[derive(Debug, Clone, Default)]
pub struct Series {
    pub name: Option<String>,
    pub values: Vec<Option<String>>,
}

impl Series {
    pub fn new(values: Vec<Option<String>>) -> Self {
        Self { name: None, values }
    }

    pub fn named(name: &str, values: Vec<Option<String>>) -> Self {
        Self {
            name: Some(name.to_string()),
            values,
        }
    }

    pub fn from_f64(values: &[f64]) -> Self {
        Self::new(
            values
                .iter()
                .map(|v| if v.is_nan() { None } else { Some(v.to_string()) })
                .collect(),
        )
    }

    pub fn named_f64(name: &str, values: &[f64]) -> Self {
        let mut s = Self::from_f64(values);
        s.name = Some(name.to_string());
        s
    }

    pub fn from_strs(values: &[&str]) -> Self {
        Self::new(values.iter().map(|v| cell_value(v)).collect())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A role assignment in long-form mode: either a key resolved against the
/// data table, or a literal column.
#[derive(Debug, Clone)]
pub enum Assign {
    Col(String),
    Vals(Series),
}

impl From<&str> for Assign {
    fn from(name: &str) -> Self {
        Assign::Col(name.to_string())
    }
}

impl From<String> for Assign {
    fn from(name: String) -> Self {
        Assign::Col(name)
    }
}

impl From<Series> for Assign {
    fn from(series: Series) -> Self {
        Assign::Vals(series)
    }
}

/// The supported input shapes, resolved exactly once at the entry point.
/// Everything downstream of the resolver sees only the canonical table.
#[derive(Debug, Clone, Default)]
pub enum DataSource {
    #[default]
    None,
    /// A labeled 2D table; wide-form melts every column.
    Table(Frame),
    /// A flat sequence of scalars; the positional index becomes x.
    Flat(Vec<f64>),
    /// An unlabeled rectangular 2D array; columns are melted like the
    /// labeled case with the column position as the group id.
    Matrix(Vec<Vec<f64>>),
    /// A ragged sequence of sequences; each inner sequence gets its own
    /// integer group id and a fresh positional x.
    Nested(Vec<Vec<f64>>),
}

/// One row of the canonical observation table. The resolver guarantees x
/// and y are present; role cells stay null when the role is unused.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub x: f64,
    pub y: f64,
    pub hue: Option<String>,
    pub size: Option<String>,
    pub style: Option<String>,
}

/// Canonical long-form table plus the axis-label metadata captured while
/// resolving.
#[derive(Debug, Clone)]
pub struct PlotTable {
    pub rows: Vec<Observation>,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    pub input_format: InputFormat,
}

impl PlotTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn hue_column(&self) -> Vec<Option<String>> {
        self.rows.iter().map(|r| r.hue.clone()).collect()
    }

    pub fn size_column(&self) -> Vec<Option<String>> {
        self.rows.iter().map(|r| r.size.clone()).collect()
    }

    pub fn style_column(&self) -> Vec<Option<String>> {
        self.rows.iter().map(|r| r.style.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rejects_ragged_rows() {
        let res = Frame::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec!["1".to_string()]],
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_frame_column_lookup_is_case_insensitive() {
        let frame = Frame::new(
            vec!["Temp".to_string()],
            vec![vec!["1".to_string()], vec!["".to_string()]],
        )
        .unwrap();
        let col = frame.column("temp").unwrap();
        assert_eq!(col, vec![Some("1".to_string()), None]);
        assert!(frame.column("missing").is_none());
    }

    #[test]
    fn test_frame_default_index_is_positional() {
        let frame = Frame::new(
            vec!["a".to_string()],
            vec![vec!["1".to_string()], vec!["2".to_string()]],
        )
        .unwrap();
        assert_eq!(frame.index_values(), vec!["0", "1"]);
        assert_eq!(frame.index_label(), None);
    }

    #[test]
    fn test_frame_with_index_length_mismatch() {
        let frame = Frame::new(vec!["a".to_string()], vec![vec!["1".to_string()]]).unwrap();
        assert!(frame.with_index(Some("t"), vec![]).is_err());
    }

    #[test]
    fn test_from_json_object_array() {
        let value: Value = serde_json::from_str(
            r#"[{"x": 1, "y": 2.5, "g": "a"}, {"x": 2, "y": null, "g": "b"}]"#,
        )
        .unwrap();
        let frame = Frame::from_json(&value).unwrap();
        assert_eq!(frame.len(), 2);
        let y = frame.column("y").unwrap();
        assert_eq!(y[0], Some("2.5".to_string()));
        assert_eq!(y[1], None);
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        let value: Value = serde_json::from_str("[1, 2, 3]").unwrap();
        assert!(Frame::from_json(&value).is_err());
    }

    #[test]
    fn test_series_from_f64_maps_nan_to_null() {
        let s = Series::from_f64(&[1.0, f64::NAN]);
        assert_eq!(s.values, vec![Some("1".to_string()), None]);
    }
}
