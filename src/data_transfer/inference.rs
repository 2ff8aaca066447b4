//! Column type inference for delimited files.
//!
//! Inference looks at a bounded sample only, so a value past the sample may
//! still disagree with the inferred type. Nothing downstream re-checks it.

use crate::db_types::{parse_number, Column, Schema, TypeTag};
use crate::error::Result;
use regex::Regex;
use std::sync::LazyLock;

/// Rows examined per file, shared with the preview size.
pub const SAMPLE_ROW_LIMIT: usize = 100;

static DATETIME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}").unwrap());
static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// First matching rule wins: numeric, timestamp, date, then string.
pub fn infer_type(values: &[Option<&str>]) -> TypeTag {
    let present = values.iter().flatten().copied().collect::<Vec<&str>>();
    if present.is_empty() {
        return TypeTag::String;
    }

    let numbers = present
        .iter()
        .map(|value| parse_number(value))
        .collect::<Option<Vec<f64>>>();
    if let Some(numbers) = numbers {
        return if numbers.iter().all(|value| value.fract() == 0.0) {
            TypeTag::Integer64
        } else {
            TypeTag::Float64
        };
    }

    if present.iter().all(|value| DATETIME_PATTERN.is_match(value)) {
        return TypeTag::DateTime;
    }

    if present.iter().all(|value| DATE_PATTERN.is_match(value)) {
        return TypeTag::Date;
    }

    TypeTag::String
}

/// Builds a schema from a header row and sampled records. Empty cells count
/// as null, and so do cells past the end of a short record. `CsvSource`
/// rejects ragged files before sampling, so only direct callers pass those.
pub fn infer_schema(headers: &[String], sample: &[Vec<String>]) -> Result<Schema> {
    let sample = &sample[..sample.len().min(SAMPLE_ROW_LIMIT)];

    let columns = headers
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let values = sample
                .iter()
                .map(|record| {
                    record
                        .get(index)
                        .map(String::as_str)
                        .filter(|value| !value.is_empty())
                })
                .collect::<Vec<_>>();
            let sample = values.iter().flatten().next().map(|value| value.to_string());
            Column::inferred(name.clone(), infer_type(&values)).with_sample(sample)
        })
        .collect::<Vec<_>>();

    Schema::new(columns)
}

#[cfg(test)]
mod tests;
