//! Feature engineering helpers for time series tables.
//!
//! This crate provides stationarity transforms with Augmented Dickey-Fuller
//! diagnostics and calendar/cyclical time features over an in-memory table.

pub mod error;
pub mod series;
pub mod stationarity;
pub mod table;
pub mod time_features;
pub mod unit_root;

// Re-exports for convenience
pub use error::{FeatureError, Result};
pub use series::{diff, drop_undefined, is_constant, is_undefined, log};
pub use stationarity::{
    make_stationary, make_stationary_with_report, write_report, ColumnDiagnostics,
    SeriesVariant, StationarityOptions, StationarityReport, VariantDiagnostic,
};
pub use table::{Column, Table};
pub use time_features::{
    add_time_features, add_time_features_with, cyclical_encode, parse_timestamp, to_datetime,
    DateParseMode, EpochUnit, TimeFeatureOptions, TIME_FEATURE_COLUMNS,
};
pub use unit_root::{
    adf_test, default_max_lag, mackinnon_crit, mackinnon_p, AdfOptions, AdfRegression, AdfResult,
    AutoLag, CriticalValues,
};
