use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Column '{0}' does not exist in the uploaded data")]
    UnknownColumn(String),
    #[error("No valid data found for the specified axes")]
    NoDataForAxis,
}

/// Derive the x/y value sequences for a chart from an upload's parsed rows.
///
/// Each axis is projected over every row and null entries are filtered out
/// independently, so the two sequences may end up with different lengths.
/// Empty strings are kept; only null/missing cells are dropped. The x-axis
/// label is validated before the y-axis label.
pub fn extract_axes(
    headers: &[String],
    rows: &[Map<String, Value>],
    x_label: &str,
    y_label: &str,
) -> Result<(Vec<Value>, Vec<Value>), ExtractionError> {
    for label in [x_label, y_label] {
        if !headers.iter().any(|header| header == label) {
            return Err(ExtractionError::UnknownColumn(label.to_string()));
        }
    }

    let x_values = column_values(rows, x_label);
    let y_values = column_values(rows, y_label);

    if x_values.is_empty() || y_values.is_empty() {
        return Err(ExtractionError::NoDataForAxis);
    }

    Ok((x_values, y_values))
}

fn column_values(rows: &[Map<String, Value>], label: &str) -> Vec<Value> {
    rows.iter()
        .filter_map(|row| row.get(label))
        .filter(|value| !value.is_null())
        .cloned()
        .collect()
}

/// Convert an upload's stored `data` payload back into row records.
pub fn rows_from_payload(payload: Option<&Value>) -> Vec<Map<String, Value>> {
    payload
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(Value::as_object)
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// Apply a configuration patch as a shallow merge: new keys are added,
/// existing keys overwritten, untouched keys preserved. Non-object values
/// replace the configuration wholesale.
pub fn merge_configuration(existing: Value, patch: Value) -> Value {
    match (existing, patch) {
        (Value::Object(mut base), Value::Object(patch)) => {
            for (key, value) in patch {
                base.insert(key, value);
            }
            Value::Object(base)
        }
        (_, patch) => patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(value: Value) -> Vec<Map<String, Value>> {
        rows_from_payload(Some(&value))
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_diverging_lengths_when_one_axis_has_nulls() {
        // Axes are filtered independently; a null on one axis does not
        // remove the paired value on the other, so lengths diverge.
        let rows = rows(json!([
            {"Region": "East", "Sales": 10},
            {"Region": "West", "Sales": null},
        ]));

        let (x_values, y_values) =
            extract_axes(&headers(&["Region", "Sales"]), &rows, "Region", "Sales").unwrap();

        assert_eq!(x_values, vec![json!("East"), json!("West")]);
        assert_eq!(y_values, vec![json!(10)]);
    }

    #[test]
    fn test_unknown_column_is_rejected() {
        let rows = rows(json!([{"Region": "East"}]));

        let err = extract_axes(&headers(&["Region"]), &rows, "Region", "Sales").unwrap_err();
        assert!(matches!(err, ExtractionError::UnknownColumn(label) if label == "Sales"));
    }

    #[test]
    fn test_x_label_is_validated_first() {
        let rows = rows(json!([{"Region": "East"}]));

        let err = extract_axes(&headers(&["Region"]), &rows, "Revenue", "Sales").unwrap_err();
        assert!(matches!(err, ExtractionError::UnknownColumn(label) if label == "Revenue"));
    }

    #[test]
    fn test_all_null_axis_is_rejected() {
        let rows = rows(json!([
            {"Region": "East", "Sales": null},
            {"Region": "West", "Sales": null},
        ]));

        let err =
            extract_axes(&headers(&["Region", "Sales"]), &rows, "Region", "Sales").unwrap_err();
        assert!(matches!(err, ExtractionError::NoDataForAxis));
    }

    #[test]
    fn test_empty_strings_are_not_filtered() {
        let rows = rows(json!([
            {"Region": "", "Sales": 3},
        ]));

        let (x_values, _) =
            extract_axes(&headers(&["Region", "Sales"]), &rows, "Region", "Sales").unwrap();
        assert_eq!(x_values, vec![json!("")]);
    }

    #[test]
    fn test_missing_key_counts_as_null() {
        // A row without the column key contributes nothing to that axis.
        let rows = rows(json!([
            {"Region": "East"},
            {"Region": "West", "Sales": 7},
        ]));

        let (x_values, y_values) =
            extract_axes(&headers(&["Region", "Sales"]), &rows, "Region", "Sales").unwrap();
        assert_eq!(x_values.len(), 2);
        assert_eq!(y_values, vec![json!(7)]);
    }

    #[test]
    fn test_merge_configuration_is_shallow() {
        let existing = json!({"colors": ["#4F46E5", "#10B981"], "theme": "light"});
        let patch = json!({"theme": "dark"});

        let merged = merge_configuration(existing, patch);

        assert_eq!(
            merged,
            json!({"colors": ["#4F46E5", "#10B981"], "theme": "dark"})
        );
    }

    #[test]
    fn test_merge_configuration_adds_new_keys() {
        let merged = merge_configuration(json!({"theme": "light"}), json!({"legend": true}));
        assert_eq!(merged, json!({"theme": "light", "legend": true}));
    }
}
