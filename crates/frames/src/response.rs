use crate::error::{FrameError, Result};
use crate::META_TABLE_NAME;
use arrow::array::{
    ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder,
    TimestampMillisecondBuilder,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Body of a Log Analytics `query` API response
#[derive(Debug, Clone, Deserialize)]
pub struct LogAnalyticsResponse {
    pub tables: Vec<LogAnalyticsTable>,
}

/// One result table, row oriented
#[derive(Debug, Clone, Deserialize)]
pub struct LogAnalyticsTable {
    pub name: String,
    pub columns: Vec<LogAnalyticsColumn>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogAnalyticsColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

/// Arrow type used for a Kusto column type
///
/// Kusto types without a lossless Arrow counterpart (`dynamic`, `guid`,
/// `timespan`) are kept as text.
pub fn kusto_to_arrow_type(column_type: &str) -> DataType {
    match column_type {
        "datetime" => DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into())),
        "real" | "decimal" => DataType::Float64,
        "long" | "int" => DataType::Int64,
        "bool" => DataType::Boolean,
        _ => DataType::Utf8,
    }
}

/// Parse a response body and convert every table to a RecordBatch
pub fn decode_response(body: &str) -> Result<Vec<RecordBatch>> {
    let response: LogAnalyticsResponse = serde_json::from_str(body)?;
    response.tables.iter().map(decode_table).collect()
}

/// Convert one result table into a columnar RecordBatch
pub fn decode_table(table: &LogAnalyticsTable) -> Result<RecordBatch> {
    for (row, cells) in table.rows.iter().enumerate() {
        if cells.len() != table.columns.len() {
            return Err(FrameError::RowWidth {
                row,
                expected: table.columns.len(),
                actual: cells.len(),
            });
        }
    }

    let fields: Vec<Field> = table
        .columns
        .iter()
        .map(|c| Field::new(&c.name, kusto_to_arrow_type(&c.column_type), true))
        .collect();

    let columns = table
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| decode_column(column, idx, &table.rows))
        .collect::<Result<Vec<_>>>()?;

    let metadata = HashMap::from([(META_TABLE_NAME.to_string(), table.name.clone())]);
    let schema = Arc::new(Schema::new_with_metadata(fields, metadata));

    debug!(
        "Decoded table {} ({} columns, {} rows)",
        table.name,
        table.columns.len(),
        table.rows.len()
    );

    let options = RecordBatchOptions::new().with_row_count(Some(table.rows.len()));
    Ok(RecordBatch::try_new_with_options(schema, columns, &options)?)
}

fn invalid(column: &LogAnalyticsColumn, row: usize, value: &Value) -> FrameError {
    FrameError::InvalidValue {
        column: column.name.clone(),
        row,
        expected: column.column_type.clone(),
        value: value.to_string(),
    }
}

fn decode_column(column: &LogAnalyticsColumn, idx: usize, rows: &[Vec<Value>]) -> Result<ArrayRef> {
    let cells = rows.iter().map(|r| &r[idx]).enumerate();

    let array: ArrayRef = match kusto_to_arrow_type(&column.column_type) {
        DataType::Timestamp(_, _) => {
            let mut builder =
                TimestampMillisecondBuilder::with_capacity(rows.len()).with_timezone("UTC");
            for (row, cell) in cells {
                match cell {
                    Value::Null => builder.append_null(),
                    Value::String(s) => {
                        let ts = DateTime::parse_from_rfc3339(s)
                            .map_err(|_| invalid(column, row, cell))?;
                        builder.append_value(ts.timestamp_millis());
                    }
                    _ => return Err(invalid(column, row, cell)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Float64 => {
            let mut builder = Float64Builder::with_capacity(rows.len());
            for (row, cell) in cells {
                match cell {
                    Value::Null => builder.append_null(),
                    Value::Number(n) => {
                        builder.append_value(n.as_f64().ok_or_else(|| invalid(column, row, cell))?)
                    }
                    // Non-finite reals are serialized as strings ("NaN", "Infinity")
                    Value::String(s) => builder.append_value(
                        s.parse::<f64>().map_err(|_| invalid(column, row, cell))?,
                    ),
                    _ => return Err(invalid(column, row, cell)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Int64 => {
            let mut builder = Int64Builder::with_capacity(rows.len());
            for (row, cell) in cells {
                match cell {
                    Value::Null => builder.append_null(),
                    Value::Number(n) => {
                        builder.append_value(n.as_i64().ok_or_else(|| invalid(column, row, cell))?)
                    }
                    Value::String(s) => builder.append_value(
                        s.parse::<i64>().map_err(|_| invalid(column, row, cell))?,
                    ),
                    _ => return Err(invalid(column, row, cell)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Boolean => {
            let mut builder = BooleanBuilder::with_capacity(rows.len());
            for (row, cell) in cells {
                match cell {
                    Value::Null => builder.append_null(),
                    Value::Bool(b) => builder.append_value(*b),
                    _ => return Err(invalid(column, row, cell)),
                }
            }
            Arc::new(builder.finish())
        }
        _ => {
            let mut builder = StringBuilder::with_capacity(rows.len(), rows.len() * 32);
            for (_, cell) in cells {
                match cell {
                    Value::Null => builder.append_null(),
                    Value::String(s) => builder.append_value(s),
                    // dynamic columns may arrive as inline JSON
                    other => builder.append_value(other.to_string()),
                }
            }
            Arc::new(builder.finish())
        }
    };

    Ok(array)
}
