//! Result frames returned by Log Analytics
//!
//! Responses are decoded into Arrow record batches, one per result table.
//! Frame-level metadata (visualization hints, portal query details) lives in
//! the schema metadata; field links live in field metadata.

pub mod display;
pub mod error;
pub mod links;
pub mod response;
pub mod trace;

pub use display::{format_array_value, format_batches};
pub use error::{FrameError, Result};
pub use links::{attach_portal_link, portal_query, with_portal_query, PortalQuery};
pub use response::decode_response;
pub use trace::{convert_response_to_trace, convert_service_tags, SERVICE_TAGS};

use arrow::datatypes::{Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use std::sync::Arc;

/// Name of the Log Analytics table a frame was decoded from
pub const META_TABLE_NAME: &str = "tableName";
/// Visualization the frame is meant for (e.g. `trace`)
pub const META_PREFERRED_VISUALISATION: &str = "preferredVisualisationType";
pub const META_ENCODED_QUERY: &str = "encodedQuery";
pub const META_WORKSPACE: &str = "workspace";
pub const META_SUBSCRIPTION: &str = "subscription";

/// Copy of `batch` with one schema metadata entry set
pub fn with_schema_metadata(batch: &RecordBatch, key: &str, value: &str) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut metadata = schema.metadata().clone();
    metadata.insert(key.to_string(), value.to_string());

    let schema = Arc::new(Schema::new_with_metadata(schema.fields().clone(), metadata));
    with_schema(batch, schema)
}

/// Rebuild `batch` under a new schema, keeping its columns.
///
/// The row count is carried explicitly so frames without columns survive.
pub(crate) fn with_schema(batch: &RecordBatch, schema: SchemaRef) -> Result<RecordBatch> {
    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
    Ok(RecordBatch::try_new_with_options(
        schema,
        batch.columns().to_vec(),
        &options,
    )?)
}
