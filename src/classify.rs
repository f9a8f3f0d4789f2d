use crate::data::InputFormat;

/// How a role column participates in attribute mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Categorical,
    Numeric,
    Unused,
}

/// Decide whether a role column is categorical or numeric.
///
/// Wide-form grouping columns always come from discrete source-column
/// identifiers, so they are categorical regardless of content. Long-form
/// columns are numeric iff every non-null cell parses as a float. An
/// entirely null column means the role is unused.
pub fn classify(cells: &[Option<String>], format: InputFormat) -> VarKind {
    if cells.iter().all(|c| c.is_none()) {
        return VarKind::Unused;
    }
    match format {
        InputFormat::Wide => VarKind::Categorical,
        InputFormat::Long => {
            let numeric = cells
                .iter()
                .flatten()
                .all(|c| c.parse::<f64>().is_ok());
            if numeric {
                VarKind::Numeric
            } else {
                VarKind::Categorical
            }
        }
    }
}

/// Distinct non-null values in first-appearance order.
pub fn categorical_order(cells: &[Option<String>]) -> Vec<String> {
    let mut levels: Vec<String> = Vec::new();
    for cell in cells.iter().flatten() {
        if !levels.iter().any(|l| l == cell) {
            levels.push(cell.clone());
        }
    }
    levels
}

/// Distinct non-null values with their numeric interpretation, sorted
/// ascending. Used to build normalization domains for numeric roles;
/// callers must have classified the column as numeric first.
pub(crate) fn numeric_levels(cells: &[Option<String>]) -> Vec<(String, f64)> {
    let mut levels: Vec<(String, f64)> = Vec::new();
    for cell in cells.iter().flatten() {
        if levels.iter().any(|(l, _)| l == cell) {
            continue;
        }
        if let Ok(v) = cell.parse::<f64>() {
            levels.push((cell.clone(), v));
        }
    }
    levels.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<Option<String>> {
        values
            .iter()
            .map(|v| {
                if v.is_empty() {
                    None
                } else {
                    Some(v.to_string())
                }
            })
            .collect()
    }

    #[test]
    fn test_all_null_is_unused() {
        assert_eq!(classify(&[None, None], InputFormat::Long), VarKind::Unused);
        assert_eq!(classify(&[], InputFormat::Long), VarKind::Unused);
    }

    #[test]
    fn test_wide_is_always_categorical() {
        assert_eq!(
            classify(&cells(&["1", "2"]), InputFormat::Wide),
            VarKind::Categorical
        );
    }

    #[test]
    fn test_long_numeric_coercion() {
        assert_eq!(
            classify(&cells(&["1", "2.5", ""]), InputFormat::Long),
            VarKind::Numeric
        );
        assert_eq!(
            classify(&cells(&["1", "two"]), InputFormat::Long),
            VarKind::Categorical
        );
    }

    #[test]
    fn test_categorical_order_is_first_appearance() {
        assert_eq!(
            categorical_order(&cells(&["b", "a", "b", "", "c", "a"])),
            vec!["b", "a", "c"]
        );
    }

    #[test]
    fn test_numeric_levels_sorted_by_value() {
        let levels = numeric_levels(&cells(&["10", "2", "10", "1"]));
        let names: Vec<&str> = levels.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(names, vec!["1", "2", "10"]);
    }
}
