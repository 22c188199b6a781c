use crate::META_TABLE_NAME;
use arrow::array::{
    Array, BooleanArray, Float64Array, Int64Array, ListArray, StringArray, StructArray,
    TimestampMillisecondArray,
};
use arrow::datatypes::{DataType, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, SecondsFormat};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};

/// Render a single cell of a result column
pub fn format_array_value(column: &dyn Array, row_idx: usize) -> String {
    if column.is_null(row_idx) {
        return String::from("NULL");
    }

    match column.data_type() {
        DataType::Utf8 => column
            .as_any()
            .downcast_ref::<StringArray>()
            .map(|arr| arr.value(row_idx).to_string())
            .unwrap_or_else(|| "ERROR".to_string()),
        DataType::Int64 => column
            .as_any()
            .downcast_ref::<Int64Array>()
            .map(|arr| arr.value(row_idx).to_string())
            .unwrap_or_else(|| "ERROR".to_string()),
        DataType::Float64 => column
            .as_any()
            .downcast_ref::<Float64Array>()
            .map(|arr| arr.value(row_idx).to_string())
            .unwrap_or_else(|| "ERROR".to_string()),
        DataType::Boolean => column
            .as_any()
            .downcast_ref::<BooleanArray>()
            .map(|arr| arr.value(row_idx).to_string())
            .unwrap_or_else(|| "ERROR".to_string()),
        DataType::Timestamp(TimeUnit::Millisecond, _) => column
            .as_any()
            .downcast_ref::<TimestampMillisecondArray>()
            .and_then(|arr| DateTime::from_timestamp_millis(arr.value(row_idx)))
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_else(|| "ERROR".to_string()),
        DataType::List(_) => format_key_value_list(column, row_idx),
        _ => format!("{:?}", column.slice(row_idx, 1))
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string(),
    }
}

/// Format a converted serviceTags cell as `key=value` pairs
fn format_key_value_list(column: &dyn Array, row_idx: usize) -> String {
    let list = match column.as_any().downcast_ref::<ListArray>() {
        Some(arr) => arr,
        None => return "ERROR: Not a ListArray".to_string(),
    };

    let entries = list.value(row_idx);
    let entries = match entries.as_any().downcast_ref::<StructArray>() {
        Some(s) => s,
        None => return "ERROR: List entries not a struct".to_string(),
    };

    let keys = entries
        .column_by_name("key")
        .and_then(|c| c.as_any().downcast_ref::<StringArray>());
    let values = entries
        .column_by_name("value")
        .and_then(|c| c.as_any().downcast_ref::<StringArray>());

    let (keys, values) = match (keys, values) {
        (Some(k), Some(v)) => (k, v),
        _ => return "ERROR: Entries are not key/value strings".to_string(),
    };

    (0..entries.len())
        .map(|i| {
            if values.is_null(i) {
                format!("{}=null", keys.value(i))
            } else {
                format!("{}={}", keys.value(i), values.value(i))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Format RecordBatches as tables with terminal width awareness
///
/// Every batch gets its own table under its own header. When there are several,
/// each is titled with its table name.
pub fn format_batches(batches: &[RecordBatch]) -> String {
    let titled = batches.len() > 1;
    batches
        .iter()
        .map(|batch| {
            let table = format_batch(batch);
            match batch.schema().metadata().get(META_TABLE_NAME) {
                Some(name) if titled => format!("{}\n{}", name, table),
                _ => table,
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn format_batch(batch: &RecordBatch) -> String {
    let mut table = Table::new();

    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::DynamicFullWidth);

    let schema = batch.schema();
    let header: Vec<Cell> = schema.fields().iter().map(|f| Cell::new(f.name())).collect();
    table.set_header(header);

    for row_idx in 0..batch.num_rows() {
        let row: Vec<Cell> = batch
            .columns()
            .iter()
            .map(|column| Cell::new(format_array_value(column.as_ref(), row_idx)))
            .collect();
        table.add_row(row);
    }

    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::convert_service_tags;
    use arrow::array::ArrayRef;
    use std::sync::Arc;

    #[test]
    fn test_format_scalars() {
        let strings = StringArray::from(vec![Some("x"), None]);
        assert_eq!(format_array_value(&strings, 0), "x");
        assert_eq!(format_array_value(&strings, 1), "NULL");

        let ts = TimestampMillisecondArray::from(vec![1_622_548_800_500]).with_timezone("UTC");
        assert_eq!(format_array_value(&ts, 0), "2021-06-01T12:00:00.500Z");
    }

    #[test]
    fn test_format_service_tags() {
        let column: ArrayRef = Arc::new(StringArray::from(vec![r#"{"a":"1","b":null}"#]));
        let converted = convert_service_tags(column.as_ref()).unwrap();
        assert_eq!(format_array_value(converted.as_ref(), 0), "a=1, b=null");
    }

    #[test]
    fn test_format_batches_empty() {
        assert_eq!(format_batches(&[]), "");
    }

    #[test]
    fn test_format_batches_renders_each_table() {
        let body = r#"{"tables": [
            {"name": "PrimaryResult",
             "columns": [{"name": "resultCode", "type": "string"}, {"name": "count_", "type": "long"}],
             "rows": [["200", 12]]},
            {"name": "ExtendedProperties",
             "columns": [{"name": "Key", "type": "string"}],
             "rows": [["Visualization"], ["Sampled"]]}
        ]}"#;
        let batches = crate::decode_response(body).unwrap();
        let rendered = format_batches(&batches);

        let (first, second) = rendered
            .split_once("ExtendedProperties\n")
            .expect("second table is titled");
        assert!(first.starts_with("PrimaryResult\n"));
        assert!(first.contains("resultCode") && first.contains("12"));
        assert!(!first.contains("Sampled"));
        assert!(second.contains("Key") && second.contains("Sampled"));
        assert!(!second.contains("resultCode"));
    }
}
