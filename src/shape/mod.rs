//! Result shaping: field trimming, then rendering into the requested view.

mod render;

pub use render::{hls_to_rgb, random_color, to_chart, to_count, to_datatable, to_objects};

use crate::config::ModelDescriptor;
use crate::store::Row;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Visibility rule shared by every output mode.
#[derive(Clone, Copy, Debug)]
pub struct FieldFilter<'a> {
    pub restricted: &'a HashSet<String>,
    pub include: &'a [String],
    pub exclude: &'a [String],
}

impl<'a> FieldFilter<'a> {
    pub fn new(model: &'a ModelDescriptor, include: &'a [String], exclude: &'a [String]) -> Self {
        FieldFilter {
            restricted: &model.restricted,
            include,
            exclude,
        }
    }

    pub fn keeps(&self, field: &str) -> bool {
        !self.restricted.contains(field)
            && !self.exclude.iter().any(|f| f == field)
            && (self.include.is_empty() || self.include.iter().any(|f| f == field))
    }
}

/// Visible column names in model order.
pub fn visible_columns(model: &ModelDescriptor, filter: &FieldFilter<'_>) -> Vec<String> {
    model
        .column_names()
        .filter(|c| filter.keeps(c))
        .map(String::from)
        .collect()
}

/// Trim one row. Tuples are first named by `columns` (the query's output columns).
pub fn trim_row(row: &Row, columns: &[String], filter: &FieldFilter<'_>) -> Map<String, Value> {
    match row {
        Row::Entity(m) => m
            .iter()
            .filter(|(k, _)| filter.keeps(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        Row::Tuple(values) => columns
            .iter()
            .zip(values)
            .filter(|(k, _)| filter.keeps(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    }
}

pub fn trim(rows: &[Row], columns: &[String], filter: &FieldFilter<'_>) -> Vec<Map<String, Value>> {
    rows.iter().map(|r| trim_row(r, columns, filter)).collect()
}
