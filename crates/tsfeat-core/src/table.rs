//! In-memory table of named, row-aligned, nullable columns.

use crate::error::{FeatureError, Result};
use chrono::{DateTime, FixedOffset};

/// A typed, nullable column.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Float(Vec<Option<f64>>),
    Int(Vec<Option<i64>>),
    Utf8(Vec<Option<String>>),
    Bool(Vec<Option<bool>>),
    /// Parsed timestamps, each carrying the offset it was read with.
    Datetime(Vec<Option<DateTime<FixedOffset>>>),
}

impl Column {
    /// Number of rows in the column.
    pub fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Utf8(v) => v.len(),
            Column::Bool(v) => v.len(),
            Column::Datetime(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short type name used in error messages.
    pub fn dtype(&self) -> &'static str {
        match self {
            Column::Float(_) => "float64",
            Column::Int(_) => "int64",
            Column::Utf8(_) => "utf8",
            Column::Bool(_) => "bool",
            Column::Datetime(_) => "datetime",
        }
    }

    /// Number of null entries. NaN floats are not counted.
    pub fn null_count(&self) -> usize {
        match self {
            Column::Float(v) => v.iter().filter(|x| x.is_none()).count(),
            Column::Int(v) => v.iter().filter(|x| x.is_none()).count(),
            Column::Utf8(v) => v.iter().filter(|x| x.is_none()).count(),
            Column::Bool(v) => v.iter().filter(|x| x.is_none()).count(),
            Column::Datetime(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    pub fn as_float(&self) -> Option<&[Option<f64>]> {
        match self {
            Column::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<&[Option<i64>]> {
        match self {
            Column::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_utf8(&self) -> Option<&[Option<String>]> {
        match self {
            Column::Utf8(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&[Option<DateTime<FixedOffset>>]> {
        match self {
            Column::Datetime(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Vec<f64>> for Column {
    fn from(values: Vec<f64>) -> Self {
        Column::Float(values.into_iter().map(Some).collect())
    }
}

impl From<Vec<Option<f64>>> for Column {
    fn from(values: Vec<Option<f64>>) -> Self {
        Column::Float(values)
    }
}

impl From<Vec<i64>> for Column {
    fn from(values: Vec<i64>) -> Self {
        Column::Int(values.into_iter().map(Some).collect())
    }
}

impl From<Vec<Option<i64>>> for Column {
    fn from(values: Vec<Option<i64>>) -> Self {
        Column::Int(values)
    }
}

impl From<Vec<&str>> for Column {
    fn from(values: Vec<&str>) -> Self {
        Column::Utf8(values.into_iter().map(|s| Some(s.to_string())).collect())
    }
}

impl From<Vec<Option<String>>> for Column {
    fn from(values: Vec<Option<String>>) -> Self {
        Column::Utf8(values)
    }
}

/// Ordered collection of uniquely named columns of equal length.
///
/// Operations in this crate take `&Table` and return a new table, so the
/// caller's table is never modified.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(name, column)` pairs, in order.
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Column)>,
        S: Into<String>,
    {
        let mut table = Table::new();
        for (name, column) in columns {
            let name = name.into();
            if table.contains(&name) {
                return Err(FeatureError::DuplicateColumn(name));
            }
            table.with_column(name, column)?;
        }
        Ok(table)
    }

    /// Number of rows; zero for a table without columns.
    pub fn n_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.position(name)
            .map(|i| &self.columns[i])
            .ok_or_else(|| FeatureError::MissingColumn(name.to_string()))
    }

    /// Insert a column, replacing an existing one with the same name in place.
    pub fn with_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if !self.columns.is_empty() && column.len() != self.n_rows() {
            return Err(FeatureError::LengthMismatch {
                column: name,
                expected: self.n_rows(),
                got: column.len(),
            });
        }

        match self.position(&name) {
            Some(i) => self.columns[i] = column,
            None => {
                self.names.push(name);
                self.columns.push(column);
            }
        }
        Ok(())
    }

    /// Numeric view of a column. Integers and booleans are widened to `f64`.
    pub fn float_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        match self.column(name)? {
            Column::Float(v) => Ok(v.clone()),
            Column::Int(v) => Ok(v.iter().map(|x| x.map(|i| i as f64)).collect()),
            Column::Bool(v) => Ok(v
                .iter()
                .map(|x| x.map(|b| if b { 1.0 } else { 0.0 }))
                .collect()),
            other => Err(FeatureError::TypeMismatch {
                column: name.to_string(),
                expected: "numeric",
                found: other.dtype(),
            }),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}
