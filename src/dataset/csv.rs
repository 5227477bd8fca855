//! CSV dataset reader
//!
//! First line is the header. A column whose every value parses as a number
//! becomes continuous; any other column is discrete with states in order of
//! first appearance. The class column is the named one or the last one.

use super::{Column, Dataset, Feature};
use crate::{Error, Result};
use rustc_hash::FxHashMap;
use std::path::Path;

/// Load a CSV file from disk.
///
/// # Errors
///
/// Returns [`Error::DatasetNotFound`] if the file does not exist and
/// [`Error::Schema`] if it is malformed.
pub fn load_csv(path: &Path, name: &str, class_name: Option<&str>) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::DatasetNotFound(path.display().to_string()),
        _ => Error::Io(e),
    })?;
    read_csv(name, &text, class_name)
}

/// Parse CSV text into a dataset.
///
/// # Errors
///
/// Returns [`Error::Schema`] on an empty file, ragged rows or an unknown class
/// column.
pub fn read_csv(name: &str, text: &str, class_name: Option<&str>) -> Result<Dataset> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty() && !l.trim_start().starts_with('#'));

    let (_, header) = lines
        .next()
        .ok_or_else(|| Error::Schema(format!("{name}: empty CSV file")))?;
    let header: Vec<String> = header.split(',').map(|h| h.trim().to_string()).collect();
    if header.len() < 2 {
        return Err(Error::Schema(format!(
            "{name}: need at least one feature and a class column"
        )));
    }

    let class_index = match class_name {
        Some(class) => header
            .iter()
            .position(|h| h == class)
            .ok_or_else(|| Error::Schema(format!("{name}: class column {class} not in header")))?,
        None => header.len() - 1,
    };

    let mut raw: Vec<Vec<&str>> = vec![Vec::new(); header.len()];
    for (line_no, line) in lines {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != header.len() {
            return Err(Error::Schema(format!(
                "{name}:{}: expected {} values, found {}",
                line_no + 1,
                header.len(),
                fields.len()
            )));
        }
        for (column, field) in raw.iter_mut().zip(fields) {
            column.push(field);
        }
    }

    let mut features = Vec::with_capacity(header.len() - 1);
    let mut class = None;
    for (index, (column_name, values)) in header.into_iter().zip(&raw).enumerate() {
        if index == class_index {
            let (states, codes) = factorize(values);
            class = Some((column_name, states, codes));
            continue;
        }
        let numeric: Option<Vec<f64>> = values.iter().map(|v| v.parse::<f64>().ok()).collect();
        let column = match numeric {
            Some(values) => Column::Continuous(values),
            None => {
                let (states, codes) = factorize(values);
                Column::Discrete { codes, states }
            }
        };
        features.push(Feature::new(column_name, column));
    }

    let (class_name, class_states, labels) =
        class.ok_or_else(|| Error::Schema(format!("{name}: class column missing")))?;
    Dataset::new(name, features, class_name, class_states, labels)
}

fn factorize(values: &[&str]) -> (Vec<String>, Vec<u32>) {
    let mut index: FxHashMap<&str, u32> = FxHashMap::default();
    let mut states = Vec::new();
    let mut codes = Vec::with_capacity(values.len());
    for &value in values {
        #[allow(clippy::cast_possible_truncation)]
        let next = states.len() as u32;
        let code = *index.entry(value).or_insert_with(|| {
            states.push(value.to_string());
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

    #[test]
    fn test_read_csv_types() {
        let text = "x,color,label\n1.5,red,a\n2.5,blue,b\n# comment\n3.0,red,a\n";
        let dataset = read_csv("toy", text, None).unwrap();
        assert_eq!(dataset.n_samples(), 3);
        assert_eq!(dataset.feature(0).kind(), FeatureKind::Continuous);
        assert_eq!(dataset.feature(1).kind(), FeatureKind::Discrete);
        assert_eq!(dataset.class_states(), &["a".to_string(), "b".to_string()]);
        assert_eq!(dataset.labels(), &[0, 1, 0]);
    }

    #[test]
    fn test_read_csv_named_class() {
        let text = "label,x\nyes,1\nno,2\n";
        let dataset = read_csv("toy", text, Some("label")).unwrap();
        assert_eq!(dataset.class_name(), "label");
        assert_eq!(dataset.n_features(), 1);
    }

    #[test]
    fn test_read_csv_ragged_row() {
        let text = "x,label\n1,a\n2\n";
        assert!(matches!(read_csv("toy", text, None), Err(Error::Schema(_))));
    }

    #[test]
    fn test_read_csv_empty() {
        assert!(matches!(read_csv("toy", "", None), Err(Error::Schema(_))));
    }
}
