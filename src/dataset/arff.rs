//! ARFF dataset reader
//!
//! Supports `@relation`, `@attribute <name> numeric|real|integer|{a,b,...}`,
//! `@data` with comma-separated rows and `%` comments. Missing values (`?`)
//! are rejected: the harness never imputes.

use super::{Column, Dataset, Feature};
use crate::{Error, Result};
use rustc_hash::FxHashMap;
use std::path::Path;

#[derive(Debug)]
enum AttributeType {
    Numeric,
    Nominal(Vec<String>),
}

#[derive(Debug)]
struct Attribute {
    name: String,
    kind: AttributeType,
}

/// Load an ARFF file from disk.
///
/// # Errors
///
/// Returns [`Error::DatasetNotFound`] if the file does not exist and
/// [`Error::Schema`] if it is malformed.
pub fn load_arff(path: &Path, name: &str, class_name: Option<&str>) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::DatasetNotFound(path.display().to_string()),
        _ => Error::Io(e),
    })?;
    read_arff(name, &text, class_name)
}

/// Parse ARFF text into a dataset.
///
/// The class attribute is `class_name` when given, otherwise the last
/// attribute.
///
/// # Errors
///
/// Returns [`Error::Schema`] on malformed headers, rows or values.
pub fn read_arff(name: &str, text: &str, class_name: Option<&str>) -> Result<Dataset> {
    let mut attributes: Vec<Attribute> = Vec::new();
    let mut rows: Vec<(usize, Vec<String>)> = Vec::new();
    let mut in_data = false;

    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('%') {
            continue;
        }
        if in_data {
            rows.push((line_no + 1, split_fields(line)));
            continue;
        }
        let lower = line.to_ascii_lowercase();
        if lower.starts_with("@relation") {
            continue;
        } else if lower.starts_with("@attribute") {
            attributes.push(parse_attribute(&line["@attribute".len()..], line_no + 1)?);
        } else if lower.starts_with("@data") {
            in_data = true;
        } else {
            return Err(Error::Schema(format!(
                "{name}:{}: unexpected header line {line:?}",
                line_no + 1
            )));
        }
    }

    if attributes.len() < 2 {
        return Err(Error::Schema(format!(
            "{name}: need at least one feature and a class attribute"
        )));
    }

    let class_index = match class_name {
        Some(class) => attributes
            .iter()
            .position(|a| a.name == class)
            .ok_or_else(|| Error::Schema(format!("{name}: class attribute {class} not declared")))?,
        None => attributes.len() - 1,
    };

    let mut raw_columns: Vec<Vec<&str>> = vec![Vec::with_capacity(rows.len()); attributes.len()];
    for (line_no, fields) in &rows {
        if fields.len() != attributes.len() {
            return Err(Error::Schema(format!(
                "{name}:{line_no}: expected {} values, found {}",
                attributes.len(),
                fields.len()
            )));
        }
        for (column, field) in raw_columns.iter_mut().zip(fields) {
            if field == "?" {
                return Err(Error::Schema(format!(
                    "{name}:{line_no}: missing values are not supported"
                )));
            }
            column.push(field.as_str());
        }
    }

    let mut features = Vec::with_capacity(attributes.len() - 1);
    let mut class = None;
    for (index, (attribute, values)) in attributes.into_iter().zip(raw_columns).enumerate() {
        if index == class_index {
            class = Some(build_class(name, attribute, &values)?);
        } else {
            let column = build_column(name, &attribute, &values)?;
            features.push(Feature::new(attribute.name, column));
        }
    }
    let (class_name, class_states, labels) =
        class.ok_or_else(|| Error::Schema(format!("{name}: class attribute missing")))?;

    Dataset::new(name, features, class_name, class_states, labels)
}

fn parse_attribute(rest: &str, line_no: usize) -> Result<Attribute> {
    let rest = rest.trim();
    let (name, kind) = split_name(rest)
        .ok_or_else(|| Error::Schema(format!("line {line_no}: malformed @attribute")))?;
    let kind = kind.trim();
    let kind = if kind.starts_with('{') {
        let body = kind
            .strip_prefix('{')
            .and_then(|k| k.strip_suffix('}'))
            .ok_or_else(|| Error::Schema(format!("line {line_no}: unterminated nominal list")))?;
        AttributeType::Nominal(split_fields(body))
    } else {
        match kind.to_ascii_lowercase().as_str() {
            "numeric" | "real" | "integer" => AttributeType::Numeric,
            other => {
                return Err(Error::Schema(format!(
                    "line {line_no}: unsupported attribute type {other}"
                )))
            }
        }
    };
    Ok(Attribute { name, kind })
}

fn split_name(rest: &str) -> Option<(String, &str)> {
    let mut chars = rest.char_indices();
    let (_, first) = chars.next()?;
    if first == '\'' || first == '"' {
        let end = rest[1..].find(first)? + 1;
        Some((rest[1..end].to_string(), &rest[end + 1..]))
    } else {
        let end = rest.find(char::is_whitespace)?;
        Some((rest[..end].to_string(), &rest[end..]))
    }
}

/// Split a comma-separated line, honouring single and double quotes.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in line.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => quote = Some(c),
            (None, ',') => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            (None, c) => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

fn build_column(name: &str, attribute: &Attribute, values: &[&str]) -> Result<Column> {
    match &attribute.kind {
        AttributeType::Numeric => values
            .iter()
            .map(|v| {
                v.parse::<f64>().map_err(|_| {
                    Error::Schema(format!(
                        "{name}: attribute {} has non-numeric value {v:?}",
                        attribute.name
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Column::Continuous),
        AttributeType::Nominal(states) => {
            let codes = encode_nominal(name, &attribute.name, states, values)?;
            Ok(Column::Discrete {
                codes,
                states: states.clone(),
            })
        }
    }
}

fn build_class(
    name: &str,
    attribute: Attribute,
    values: &[&str],
) -> Result<(String, Vec<String>, Vec<u32>)> {
    match attribute.kind {
        AttributeType::Nominal(states) => {
            let labels = encode_nominal(name, &attribute.name, &states, values)?;
            Ok((attribute.name, states, labels))
        }
        AttributeType::Numeric => {
            // Numeric class columns are factorized in order of appearance.
            let mut index: FxHashMap<&str, u32> = FxHashMap::default();
            let mut states = Vec::new();
            let mut labels = Vec::with_capacity(values.len());
            for &value in values {
                let next = u32::try_from(states.len())
                    .map_err(|_| Error::Schema(format!("{name}: too many classes")))?;
                let code = *index.entry(value).or_insert_with(|| {
                    states.push(value.to_string());
                    next
                });
                labels.push(code);
            }
            Ok((attribute.name, states, labels))
        }
    }
}

fn encode_nominal(name: &str, attribute: &str, states: &[String], values: &[&str]) -> Result<Vec<u32>> {
    let lookup: FxHashMap<&str, u32> = states
        .iter()
        .enumerate()
        .filter_map(|(i, s)| u32::try_from(i).ok().map(|code| (s.as_str(), code)))
        .collect();
    values
        .iter()
        .map(|v| {
            lookup.get(v).copied().ok_or_else(|| {
                Error::Schema(format!(
                    "{name}: value {v:?} not declared for attribute {attribute}"
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::FeatureKind;

    const IRIS_SNIPPET: &str = "% toy iris\n\
        @relation iris\n\
        @attribute sepallength numeric\n\
        @attribute 'petal kind' {short,long}\n\
        @attribute class {Iris-setosa,Iris-versicolor}\n\
        @data\n\
        5.1,short,Iris-setosa\n\
        7.0,long,Iris-versicolor\n\
        % trailing comment\n\
        6.4,'long',Iris-versicolor\n";

    #[test]
    fn test_read_arff_basic() {
        let dataset = read_arff("iris", IRIS_SNIPPET, None).unwrap();
        assert_eq!(dataset.n_samples(), 3);
        assert_eq!(dataset.n_features(), 2);
        assert_eq!(dataset.class_name(), "class");
        assert_eq!(dataset.labels(), &[0, 1, 1]);
        assert_eq!(dataset.feature(0).kind(), FeatureKind::Continuous);
        assert_eq!(dataset.feature(1).name(), "petal kind");
        assert_eq!(dataset.feature(1).column().code(2), Some(1));
    }

    #[test]
    fn test_read_arff_named_class() {
        let dataset = read_arff("iris", IRIS_SNIPPET, Some("petal kind")).unwrap();
        assert_eq!(dataset.class_name(), "petal kind");
        assert_eq!(dataset.labels(), &[0, 1, 1]);
        assert_eq!(dataset.n_classes(), 2);
    }

    #[test]
    fn test_read_arff_rejects_missing_values() {
        let text = "@attribute a numeric\n@attribute c {x,y}\n@data\n?,x\n";
        let err = read_arff("m", text, None).unwrap_err();
        assert!(err.to_string().contains("missing values"));
    }

    #[test]
    fn test_read_arff_rejects_undeclared_nominal() {
        let text = "@attribute a numeric\n@attribute c {x,y}\n@data\n1.0,z\n";
        assert!(matches!(read_arff("m", text, None), Err(Error::Schema(_))));
    }

    #[test]
    fn test_load_arff_missing_file() {
        let err = load_arff(Path::new("/nonexistent/none.arff"), "none", None).unwrap_err();
        assert!(matches!(err, Error::DatasetNotFound(_)));
    }

    #[test]
    fn test_split_fields_quotes() {
        assert_eq!(split_fields("a, 'b,c' ,d"), vec!["a", "b,c", "d"]);
    }
}
