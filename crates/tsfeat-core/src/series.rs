//! Nullable series primitives.
//!
//! A series is a `&[Option<f64>]` aligned with table rows. `None` is a null;
//! `Some(NaN)` is a defined slot holding an undefined value.

/// True when a value is missing or NaN.
pub fn is_undefined(value: Option<f64>) -> bool {
    match value {
        Some(x) => x.is_nan(),
        None => true,
    }
}

/// Elementwise natural logarithm.
///
/// Zero maps to `-inf` and negative values to `NaN`. Nulls stay null.
pub fn log(values: &[Option<f64>]) -> Vec<Option<f64>> {
    values.iter().map(|v| v.map(f64::ln)).collect()
}

/// First difference aligned with the input rows.
///
/// Row 0 is always null; row `i` is `values[i] - values[i - 1]`, or null
/// when either operand is null.
pub fn diff(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(values.len());
    if values.is_empty() {
        return result;
    }

    result.push(None);
    result.extend(values.windows(2).map(|w| match (w[0], w[1]) {
        (Some(prev), Some(curr)) => Some(curr - prev),
        _ => None,
    }));
    result
}

/// Remove null and NaN entries, keeping infinities.
pub fn drop_undefined(values: &[Option<f64>]) -> Vec<f64> {
    values
        .iter()
        .filter(|v| !is_undefined(**v))
        .filter_map(|v| *v)
        .collect()
}

/// Check if a series is constant (all values are the same).
pub fn is_constant(values: &[f64]) -> bool {
    match values.first() {
        Some(&first) => values.iter().all(|&v| v == first),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_diff() {
        let values = vec![Some(1.0), Some(2.0), Some(4.0), Some(7.0)];
        assert_eq!(diff(&values), vec![None, Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_diff_propagates_nulls() {
        let values = vec![Some(1.0), None, Some(4.0), Some(7.0)];
        assert_eq!(diff(&values), vec![None, None, None, Some(3.0)]);
    }

    #[test]
    fn test_diff_edge_lengths() {
        assert!(diff(&[]).is_empty());
        assert_eq!(diff(&[Some(3.0)]), vec![None]);
    }

    #[test]
    fn test_log() {
        let result = log(&[Some(1.0), Some(std::f64::consts::E), None]);
        assert_relative_eq!(result[0].unwrap(), 0.0);
        assert_relative_eq!(result[1].unwrap(), 1.0);
        assert_eq!(result[2], None);
    }

    #[test]
    fn test_log_non_positive() {
        let result = log(&[Some(0.0), Some(-1.0)]);
        assert_eq!(result[0], Some(f64::NEG_INFINITY));
        assert!(result[1].unwrap().is_nan());
    }

    #[test]
    fn test_drop_undefined() {
        let values = vec![
            None,
            Some(1.0),
            Some(f64::NAN),
            Some(f64::NEG_INFINITY),
            Some(2.0),
        ];
        let kept = drop_undefined(&values);
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0], 1.0);
        assert!(kept[1].is_infinite());
    }

    #[test]
    fn test_is_constant() {
        assert!(is_constant(&[1.0, 1.0, 1.0]));
        assert!(!is_constant(&[1.0, 2.0, 1.0]));
        assert!(is_constant(&[]));
        assert!(!is_constant(&[1e-17, 2e-17, 1.5e-17]));
    }
}
