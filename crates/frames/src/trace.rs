use crate::error::{FrameError, Result};
use crate::{with_schema_metadata, META_PREFERRED_VISUALISATION};
use arrow::array::{Array, ArrayRef, ListArray, StringArray, StringBuilder, StructArray};
use arrow::buffer::OffsetBuffer;
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Fields, Schema};
use arrow::record_batch::RecordBatch;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Column holding span attributes
pub const SERVICE_TAGS: &str = "serviceTags";

/// Fields of one `{key, value}` pair
pub fn key_value_fields() -> Fields {
    Fields::from(vec![
        Field::new("key", DataType::Utf8, false),
        Field::new("value", DataType::Utf8, true),
    ])
}

/// Type of the converted serviceTags column: `List<Struct<key, value>>`
pub fn service_tags_type() -> DataType {
    DataType::List(Arc::new(Field::new(
        "item",
        DataType::Struct(key_value_fields()),
        true,
    )))
}

/// Parse every serviceTags value into a list of key/value pairs
///
/// Keys keep the order they have in the JSON text. String values are used as
/// they are; other JSON values are rendered as JSON text. Arrays are keyed by
/// index; null, empty and scalar cells become empty lists. Any malformed cell
/// fails the whole column.
pub fn convert_service_tags(column: &dyn Array) -> Result<ArrayRef> {
    let as_text = cast(column, &DataType::Utf8)?;
    let values = as_text
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| FrameError::InvalidValue {
            column: SERVICE_TAGS.to_string(),
            row: 0,
            expected: "string".to_string(),
            value: column.data_type().to_string(),
        })?;

    let mut keys = StringBuilder::new();
    let mut tag_values = StringBuilder::new();
    let mut offsets: Vec<i32> = Vec::with_capacity(values.len() + 1);
    offsets.push(0);
    let mut pair_count: i32 = 0;

    for row in 0..values.len() {
        if values.is_valid(row) && !values.value(row).is_empty() {
            let parsed: Value = serde_json::from_str(values.value(row))
                .map_err(|source| FrameError::ServiceTags { row, source })?;

            for (key, value) in tag_pairs(parsed) {
                keys.append_value(&key);
                match value {
                    Value::Null => tag_values.append_null(),
                    Value::String(s) => tag_values.append_value(&s),
                    other => tag_values.append_value(other.to_string()),
                }
                pair_count += 1;
            }
        }
        offsets.push(pair_count);
    }

    let pairs = StructArray::try_new(
        key_value_fields(),
        vec![Arc::new(keys.finish()), Arc::new(tag_values.finish())],
        None,
    )?;

    let list = ListArray::try_new(
        Arc::new(Field::new("item", DataType::Struct(key_value_fields()), true)),
        OffsetBuffer::new(offsets.into()),
        Arc::new(pairs),
        None,
    )?;

    Ok(Arc::new(list))
}

/// Enumerate a parsed cell the way property enumeration sees it.
///
/// Objects give their entries, arrays and strings give index-keyed elements,
/// other scalars give nothing.
fn tag_pairs(parsed: Value) -> Vec<(String, Value)> {
    match parsed {
        Value::Object(object) => object.into_iter().collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| (idx.to_string(), item))
            .collect(),
        Value::String(text) => text
            .chars()
            .enumerate()
            .map(|(idx, c)| (idx.to_string(), Value::String(c.to_string())))
            .collect(),
        Value::Null | Value::Bool(_) | Value::Number(_) => Vec::new(),
    }
}

/// Reshape a Log Analytics result into a trace frame
///
/// Only the first frame is kept. Its serviceTags column, when present, is
/// replaced by parsed key/value lists; every other column passes through.
/// The frame is marked for the trace visualization.
pub fn convert_response_to_trace(frames: &[RecordBatch]) -> Result<Vec<RecordBatch>> {
    let trace_frame = match frames.first() {
        Some(frame) => convert_frame(frame)?,
        None => RecordBatch::new_empty(Arc::new(Schema::empty())),
    };

    let trace_frame = with_schema_metadata(&trace_frame, META_PREFERRED_VISUALISATION, "trace")?;
    Ok(vec![trace_frame])
}

fn convert_frame(frame: &RecordBatch) -> Result<RecordBatch> {
    let schema = frame.schema();

    let idx = match schema.index_of(SERVICE_TAGS) {
        Ok(idx) => idx,
        Err(_) => {
            debug!("Trace response has no {} column", SERVICE_TAGS);
            return Ok(frame.clone());
        }
    };

    let converted = convert_service_tags(frame.column(idx).as_ref())?;

    let mut fields: Vec<Arc<Field>> = schema.fields().iter().cloned().collect();
    let replacement = Field::new(SERVICE_TAGS, service_tags_type(), fields[idx].is_nullable())
        .with_metadata(fields[idx].metadata().clone());
    fields[idx] = Arc::new(replacement);

    let mut columns = frame.columns().to_vec();
    columns[idx] = converted;

    let metadata: HashMap<String, String> = schema.metadata().clone();
    let new_schema = Arc::new(Schema::new_with_metadata(fields, metadata));

    debug!("Converted {} trace rows", frame.num_rows());

    Ok(RecordBatch::try_new(new_schema, columns)?)
}
