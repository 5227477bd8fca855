//! Columnar dataset source (Arrow/Parquet)
//!
//! Float and integer columns become continuous features, Utf8 columns become
//! discrete ones. The class column is factorized in order of first
//! appearance whatever its Arrow type.

use super::{Column, Dataset, Feature};
use crate::{Error, Result};
use arrow::array::{
    Array, ArrayRef, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::compute;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use rustc_hash::FxHashMap;
use std::path::Path;

/// Load a Parquet file into a dataset.
///
/// # Errors
///
/// Returns [`Error::DatasetNotFound`] if the file does not exist and
/// [`Error::Schema`] if it cannot be parsed or converted.
pub fn load_parquet(path: &Path, name: &str, class_name: Option<&str>) -> Result<Dataset> {
    use ::parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::fs::File;

    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::DatasetNotFound(path.display().to_string()),
        _ => Error::Schema(format!("Failed to open Parquet file: {e}")),
    })?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::Schema(format!("Failed to parse Parquet file: {e}")))?;

    let reader = builder
        .build()
        .map_err(|e| Error::Schema(format!("Failed to create Parquet reader: {e}")))?;

    // Read all batches into memory
    let mut batches = Vec::new();
    for batch in reader {
        let batch =
            batch.map_err(|e| Error::Schema(format!("Failed to read record batch: {e}")))?;
        batches.push(batch);
    }
    let first = batches
        .first()
        .ok_or_else(|| Error::Schema(format!("{name}: Parquet file has no record batches")))?;
    let combined = compute::concat_batches(&first.schema(), &batches)?;

    from_record_batch(name, &combined, class_name)
}

/// Convert a record batch into a dataset.
///
/// # Errors
///
/// Returns [`Error::Schema`] for unsupported column types or null values.
pub fn from_record_batch(name: &str, batch: &RecordBatch, class_name: Option<&str>) -> Result<Dataset> {
    let schema = batch.schema();
    if schema.fields().len() < 2 {
        return Err(Error::Schema(format!(
            "{name}: need at least one feature and a class column"
        )));
    }
    let class_index = match class_name {
        Some(class) => schema
            .fields()
            .iter()
            .position(|f| f.name() == class)
            .ok_or_else(|| Error::Schema(format!("{name}: class column {class} not in schema")))?,
        None => schema.fields().len() - 1,
    };

    let mut features = Vec::with_capacity(schema.fields().len() - 1);
    for (index, field) in schema.fields().iter().enumerate() {
        let array = batch.column(index);
        if array.null_count() > 0 {
            return Err(Error::Schema(format!(
                "{name}: column {} contains nulls",
                field.name()
            )));
        }
        if index == class_index {
            continue;
        }
        let column = match field.data_type() {
            DataType::Utf8 => {
                let (states, codes) = factorize(&string_values(name, array)?);
                Column::Discrete { codes, states }
            }
            _ => Column::Continuous(numeric_values(name, field.name(), array)?),
        };
        features.push(Feature::new(field.name().clone(), column));
    }

    let class_field = schema.field(class_index);
    let class_array = batch.column(class_index);
    let raw_labels = match class_field.data_type() {
        DataType::Utf8 => string_values(name, class_array)?,
        _ => numeric_values(name, class_field.name(), class_array)?
            .into_iter()
            .map(|v| v.to_string())
            .collect(),
    };
    let (class_states, labels) = factorize(&raw_labels);

    Dataset::new(name, features, class_field.name().clone(), class_states, labels)
}

fn numeric_values(name: &str, column: &str, array: &ArrayRef) -> Result<Vec<f64>> {
    let downcast_error = || Error::Other(format!("Failed to downcast column {column}"));
    match array.data_type() {
        DataType::Float64 => Ok(array
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(downcast_error)?
            .values()
            .to_vec()),
        DataType::Float32 => Ok(array
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(downcast_error)?
            .values()
            .iter()
            .map(|&v| f64::from(v))
            .collect()),
        DataType::Int32 => Ok(array
            .as_any()
            .downcast_ref::<Int32Array>()
            .ok_or_else(downcast_error)?
            .values()
            .iter()
            .map(|&v| f64::from(v))
            .collect()),
        #[allow(clippy::cast_precision_loss)]
        DataType::Int64 => Ok(array
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(downcast_error)?
            .values()
            .iter()
            .map(|&v| v as f64)
            .collect()),
        dt => Err(Error::Schema(format!(
            "{name}: column {column} has unsupported type {dt:?}"
        ))),
    }
}

fn string_values(name: &str, array: &ArrayRef) -> Result<Vec<String>> {
    let strings = array
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::Schema(format!("{name}: expected a Utf8 column")))?;
    Ok(strings.iter().map(|v| v.unwrap_or_default().to_string()).collect())
}

fn factorize(values: &[String]) -> (Vec<String>, Vec<u32>) {
    let mut index: FxHashMap<&str, u32> = FxHashMap::default();
    let mut states = Vec::new();
    let mut codes = Vec::with_capacity(values.len());
    for value in values {
        #[allow(clippy::cast_possible_truncation)]
        let next = states.len() as u32;
        let code = *index.entry(value.as_str()).or_insert_with(|| {
            states.push(value.clone());
            next
        });
        codes.push(code);
    }
    (states, codes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::FeatureKind;
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    fn create_test_batch() -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("width", DataType::Float32, false),
            Field::new("count", DataType::Int32, false),
            Field::new("shape", DataType::Utf8, false),
            Field::new("class", DataType::Utf8, false),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(Float32Array::from(vec![0.5, 1.5, 2.5])),
                Arc::new(Int32Array::from(vec![1, 2, 3])),
                Arc::new(StringArray::from(vec!["round", "square", "round"])),
                Arc::new(StringArray::from(vec!["pos", "neg", "pos"])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_from_record_batch() {
        let dataset = from_record_batch("shapes", &create_test_batch(), None).unwrap();
        assert_eq!(dataset.n_samples(), 3);
        assert_eq!(dataset.n_features(), 3);
        assert_eq!(dataset.feature(0).kind(), FeatureKind::Continuous);
        assert_eq!(dataset.feature(2).kind(), FeatureKind::Discrete);
        assert_eq!(dataset.class_name(), "class");
        assert_eq!(dataset.labels(), &[0, 1, 0]);
    }

    #[test]
    fn test_from_record_batch_unknown_class() {
        let result = from_record_batch("shapes", &create_test_batch(), Some("missing"));
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn test_load_parquet_missing_file() {
        let result = load_parquet(Path::new("/nonexistent/data.parquet"), "data", None);
        assert!(matches!(result, Err(Error::DatasetNotFound(_))));
    }
}
