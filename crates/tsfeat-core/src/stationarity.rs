//! Stationarity-inducing transforms with optional ADF diagnostics.
//!
//! For each requested column `c` the output table gains `c_log`, `c_diff`
//! and `c_log_diff`. Diagnostics run the ADF test on the original series and
//! the three derived ones after dropping undefined values.

use crate::error::Result;
use crate::series::{diff, drop_undefined, log};
use crate::table::{Column, Table};
use crate::unit_root::{adf_test, AdfOptions, AdfResult};
use std::fmt;
use std::io::{self, Write};

/// One of the four series tested per column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesVariant {
    Original,
    Log,
    Diff,
    LogDiff,
}

impl SeriesVariant {
    /// All variants in report order.
    pub const ALL: [SeriesVariant; 4] = [
        SeriesVariant::Original,
        SeriesVariant::Log,
        SeriesVariant::Diff,
        SeriesVariant::LogDiff,
    ];

    /// Column-name suffix appended to the source column.
    pub fn suffix(self) -> &'static str {
        match self {
            SeriesVariant::Original => "",
            SeriesVariant::Log => "_log",
            SeriesVariant::Diff => "_diff",
            SeriesVariant::LogDiff => "_log_diff",
        }
    }

    /// Heading used in the text report.
    pub fn label(self) -> &'static str {
        match self {
            SeriesVariant::Original => "Original Series",
            SeriesVariant::Log => "Log Series",
            SeriesVariant::Diff => "Differenced Series",
            SeriesVariant::LogDiff => "Log-Differenced Series",
        }
    }

    pub fn column_name(self, source: &str) -> String {
        format!("{}{}", source, self.suffix())
    }
}

/// Options for diagnostic mode.
#[derive(Debug, Clone, Default)]
pub struct StationarityOptions {
    pub adf: AdfOptions,
}

/// ADF outcome for one series variant.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantDiagnostic {
    pub variant: SeriesVariant,
    /// Rows removed as null or NaN before testing
    pub n_dropped: usize,
    pub result: AdfResult,
}

/// All four ADF outcomes for one source column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDiagnostics {
    pub column: String,
    pub tests: Vec<VariantDiagnostic>,
}

impl ColumnDiagnostics {
    pub fn get(&self, variant: SeriesVariant) -> Option<&AdfResult> {
        self.tests
            .iter()
            .find(|t| t.variant == variant)
            .map(|t| &t.result)
    }
}

/// Diagnostic report, keyed by column in request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationarityReport {
    pub columns: Vec<ColumnDiagnostics>,
}

impl StationarityReport {
    pub fn column(&self, name: &str) -> Option<&ColumnDiagnostics> {
        self.columns.iter().find(|c| c.column == name)
    }
}

impl fmt::Display for StationarityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostics in &self.columns {
            writeln!(f, "========== ADF Tests for '{}' ==========", diagnostics.column)?;
            let last = diagnostics.tests.len().saturating_sub(1);
            for (i, test) in diagnostics.tests.iter().enumerate() {
                writeln!(f, "=== {} ===", test.variant.label())?;
                writeln!(f, "ADF Statistic: {:?}", test.result.statistic)?;
                writeln!(f, "p-value: {:?}", test.result.p_value)?;
                writeln!(f, "Critical Values: {}", test.result.critical_values)?;
                if i == last {
                    writeln!(f, "------------------------------------")?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

/// Derived series for one source column, indexed like `SeriesVariant::ALL`.
struct Derived {
    column: String,
    series: [Vec<Option<f64>>; 4],
}

/// Add log, difference and log-difference columns for every entry in `columns`.
///
/// With `run_diagnostics`, the ADF report is written to stdout and logged at
/// `info`. The returned table is the same either way.
pub fn make_stationary(table: &Table, columns: &[&str], run_diagnostics: bool) -> Result<Table> {
    if !run_diagnostics {
        let derived = derive(table, columns)?;
        return assemble(table, &derived);
    }

    let (out, report) = make_stationary_with_report(table, columns, &StationarityOptions::default())?;
    tracing::info!("stationarity diagnostics\n{}", report);
    write_report(&report, &mut io::stdout().lock())?;
    Ok(out)
}

/// Like [`make_stationary`] with diagnostics, returning the report instead of printing it.
pub fn make_stationary_with_report(
    table: &Table,
    columns: &[&str],
    options: &StationarityOptions,
) -> Result<(Table, StationarityReport)> {
    let derived = derive(table, columns)?;
    let out = assemble(table, &derived)?;

    let mut report = StationarityReport::default();
    for entry in &derived {
        let mut tests = Vec::with_capacity(SeriesVariant::ALL.len());
        for (variant, series) in SeriesVariant::ALL.iter().zip(entry.series.iter()) {
            let defined = drop_undefined(series);
            let result = adf_test(&defined, &options.adf)?;
            tests.push(VariantDiagnostic {
                variant: *variant,
                n_dropped: series.len() - defined.len(),
                result,
            });
        }
        report.columns.push(ColumnDiagnostics {
            column: entry.column.clone(),
            tests,
        });
    }

    Ok((out, report))
}

/// Render a report to any writer.
pub fn write_report<W: Write>(report: &StationarityReport, out: &mut W) -> Result<()> {
    write!(out, "{}", report)?;
    out.flush()?;
    Ok(())
}

/// Compute every derived series up front so a bad column fails before any output.
fn derive(table: &Table, columns: &[&str]) -> Result<Vec<Derived>> {
    tracing::debug!(?columns, rows = table.n_rows(), "make_stationary");

    columns
        .iter()
        .map(|&name| {
            let original = table.float_values(name)?;
            let logged = log(&original);
            let non_finite = logged
                .iter()
                .zip(&original)
                .filter(|(l, o)| matches!((l, o), (Some(l), Some(o)) if !l.is_finite() && o.is_finite()))
                .count();
            if non_finite > 0 {
                tracing::warn!(
                    column = name,
                    non_finite,
                    "log transform produced non-finite values"
                );
            }

            let differenced = diff(&original);
            let log_differenced = diff(&logged);
            Ok(Derived {
                column: name.to_string(),
                series: [original, logged, differenced, log_differenced],
            })
        })
        .collect()
}

fn assemble(table: &Table, derived: &[Derived]) -> Result<Table> {
    let mut out = table.clone();
    for entry in derived {
        for (variant, series) in SeriesVariant::ALL.iter().zip(entry.series.iter()).skip(1) {
            out.with_column(variant.column_name(&entry.column), Column::Float(series.clone()))?;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeatureError;
    use crate::unit_root::AutoLag;
    use approx::assert_abs_diff_eq;

    fn price_table() -> Table {
        Table::from_columns([("price", Column::from(vec![100.0, 105.0, 110.0]))]).unwrap()
    }

    /// Upward drift plus deterministic uniform noise, strictly positive.
    fn trending(n: usize) -> Vec<f64> {
        let mut state: u64 = 17;
        (0..n)
            .map(|i| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                let eps = (state >> 11) as f64 / (1u64 << 53) as f64;
                50.0 + 0.5 * i as f64 + 3.0 * eps
            })
            .collect()
    }

    fn float_col<'a>(table: &'a Table, name: &str) -> &'a [Option<f64>] {
        table.column(name).unwrap().as_float().unwrap()
    }

    #[test]
    fn test_price_example() {
        let out = make_stationary(&price_table(), &["price"], false).unwrap();

        let diff = float_col(&out, "price_diff");
        assert_eq!(diff, &[None, Some(5.0), Some(5.0)]);

        let logged = float_col(&out, "price_log");
        assert_abs_diff_eq!(logged[0].unwrap(), 4.6052, epsilon = 1e-4);
        assert_abs_diff_eq!(logged[1].unwrap(), 4.6540, epsilon = 1e-4);
        assert_abs_diff_eq!(logged[2].unwrap(), 4.7005, epsilon = 1e-4);

        let log_diff = float_col(&out, "price_log_diff");
        assert_eq!(log_diff[0], None);
        assert_abs_diff_eq!(log_diff[1].unwrap(), (105.0_f64 / 100.0).ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_output_shape_and_names() {
        let table = Table::from_columns([
            ("a", Column::from(vec![1.0, 2.0, 3.0, 5.0])),
            ("b", Column::from(vec![4_i64, 3, 2, 1])),
            ("label", Column::from(vec!["w", "x", "y", "z"])),
        ])
        .unwrap();

        let out = make_stationary(&table, &["a", "b"], false).unwrap();
        assert_eq!(out.n_rows(), 4);
        assert_eq!(out.n_columns(), table.n_columns() + 6);
        let names: Vec<&str> = out.column_names().collect();
        assert_eq!(
            names,
            vec!["a", "b", "label", "a_log", "a_diff", "a_log_diff", "b_log", "b_diff", "b_log_diff"]
        );
    }

    #[test]
    fn test_input_unchanged() {
        let table = price_table();
        let before = table.clone();
        let _ = make_stationary(&table, &["price"], false).unwrap();
        assert_eq!(table, before);
    }

    #[test]
    fn test_no_recursive_transform() {
        let out = make_stationary(&price_table(), &["price"], false).unwrap();
        assert!(!out.contains("price_log_log"));
        assert!(!out.contains("price_diff_log"));
        assert_eq!(out.n_columns(), 4);
    }

    #[test]
    fn test_missing_column() {
        let result = make_stationary(&price_table(), &["nonexistent"], false);
        assert!(matches!(result, Err(FeatureError::MissingColumn(name)) if name == "nonexistent"));
    }

    #[test]
    fn test_missing_column_after_valid_one() {
        let result = make_stationary(&price_table(), &["price", "nonexistent"], true);
        assert!(matches!(result, Err(FeatureError::MissingColumn(_))));
    }

    #[test]
    fn test_non_numeric_column() {
        let table = Table::from_columns([("name", Column::from(vec!["a", "b"]))]).unwrap();
        let result = make_stationary(&table, &["name"], false);
        assert!(matches!(result, Err(FeatureError::TypeMismatch { .. })));
    }

    #[test]
    fn test_non_positive_values_propagate() {
        let table =
            Table::from_columns([("x", Column::from(vec![1.0, 0.0, -1.0, 2.0]))]).unwrap();
        let out = make_stationary(&table, &["x"], false).unwrap();

        let logged = float_col(&out, "x_log");
        assert_eq!(logged[1], Some(f64::NEG_INFINITY));
        assert!(logged[2].unwrap().is_nan());

        let log_diff = float_col(&out, "x_log_diff");
        assert_eq!(log_diff[1], Some(f64::NEG_INFINITY));
        assert!(log_diff[2].unwrap().is_nan());
        assert!(log_diff[3].unwrap().is_nan());
    }

    #[test]
    fn test_nulls_propagate() {
        let table = Table::from_columns([(
            "x",
            Column::Float(vec![Some(1.0), None, Some(4.0), Some(8.0)]),
        )])
        .unwrap();
        let out = make_stationary(&table, &["x"], false).unwrap();
        assert_eq!(float_col(&out, "x_diff"), &[None, None, None, Some(4.0)]);
        assert_eq!(float_col(&out, "x_log")[1], None);
    }

    #[test]
    fn test_report_covers_all_variants() {
        let table = Table::from_columns([("y", Column::from(trending(80)))]).unwrap();
        let (out, report) =
            make_stationary_with_report(&table, &["y"], &StationarityOptions::default()).unwrap();

        assert_eq!(out, make_stationary(&table, &["y"], false).unwrap());
        let diagnostics = report.column("y").unwrap();
        assert_eq!(diagnostics.tests.len(), 4);
        for variant in SeriesVariant::ALL {
            let result = diagnostics.get(variant).unwrap();
            assert!((0.0..=1.0).contains(&result.p_value));
        }
        assert_eq!(diagnostics.tests[0].n_dropped, 0);
        assert_eq!(diagnostics.tests[2].n_dropped, 1);
        assert_eq!(diagnostics.tests[3].n_dropped, 1);
    }

    #[test]
    fn test_report_text_layout() {
        let table = Table::from_columns([("y", Column::from(trending(60)))]).unwrap();
        let options = StationarityOptions {
            adf: AdfOptions {
                max_lag: Some(1),
                autolag: AutoLag::Fixed,
                ..Default::default()
            },
        };
        let (_, report) = make_stationary_with_report(&table, &["y"], &options).unwrap();

        let mut buf = Vec::new();
        write_report(&report, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.starts_with("========== ADF Tests for 'y' ==========\n=== Original Series ===\n"));
        for heading in [
            "=== Log Series ===",
            "=== Differenced Series ===",
            "=== Log-Differenced Series ===",
        ] {
            assert!(text.contains(heading));
        }
        assert_eq!(text.matches("ADF Statistic: ").count(), 4);
        assert_eq!(text.matches("Critical Values: {'1%': ").count(), 4);
        assert!(text.ends_with("------------------------------------\n\n"));
        for line in text.lines().filter(|l| l.starts_with("p-value: ")) {
            let value = &line["p-value: ".len()..];
            assert!(value.contains('.') || value.contains('e'), "{}", line);
        }
    }

    #[test]
    fn test_printed_diagnostics_return_same_table() {
        let table = Table::from_columns([("y", Column::from(trending(80)))]).unwrap();
        let printed = make_stationary(&table, &["y"], true).unwrap();
        assert_eq!(printed, make_stationary(&table, &["y"], false).unwrap());
    }

    #[test]
    fn test_report_on_quadratic_trend() {
        let values: Vec<f64> = (0..40).map(|i| 100.0 + (i * i) as f64).collect();
        let table = Table::from_columns([("price", Column::from(values))]).unwrap();
        let (out, report) =
            make_stationary_with_report(&table, &["price"], &StationarityOptions::default())
                .unwrap();

        assert_eq!(out.n_columns(), 4);
        let diagnostics = report.column("price").unwrap();
        assert_eq!(diagnostics.tests.len(), SeriesVariant::ALL.len());
        assert!(diagnostics.get(SeriesVariant::Diff).is_some());
    }

    #[test]
    fn test_diagnostics_fail_on_short_table() {
        let result =
            make_stationary_with_report(&price_table(), &["price"], &StationarityOptions::default());
        assert!(matches!(result, Err(FeatureError::InsufficientData { .. })));
    }

    #[test]
    fn test_diagnostics_fail_on_infinite_log() {
        let mut values = trending(40);
        values[10] = 0.0;
        let table = Table::from_columns([("y", Column::from(values))]).unwrap();
        let result = make_stationary_with_report(&table, &["y"], &StationarityOptions::default());
        assert!(matches!(result, Err(FeatureError::NonFinite(_))));
    }
}
