//! Data links from result fields back to the Azure portal

use crate::error::Result;
use crate::{META_ENCODED_QUERY, META_SUBSCRIPTION, META_WORKSPACE};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use kql::portal::PORTAL_LINK_TITLE;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Field metadata key holding the JSON encoded links
pub const FIELD_LINKS: &str = "links";

/// A link rendered next to field values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldLink {
    pub url: String,
    pub title: String,
    pub target_blank: bool,
}

/// Query details the backend records on a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalQuery {
    /// gzip + base64 encoded query text
    pub encoded_query: String,
    /// Workspace customer id
    pub workspace: String,
    pub subscription: String,
}

/// Read the portal query details from frame metadata.
///
/// Frames without a non-empty encoded query yield `None`.
pub fn portal_query(batch: &RecordBatch) -> Option<PortalQuery> {
    let schema = batch.schema();
    let metadata = schema.metadata();
    let encoded_query = metadata.get(META_ENCODED_QUERY).filter(|q| !q.is_empty())?;

    Some(PortalQuery {
        encoded_query: encoded_query.clone(),
        workspace: metadata.get(META_WORKSPACE).cloned().unwrap_or_default(),
        subscription: metadata.get(META_SUBSCRIPTION).cloned().unwrap_or_default(),
    })
}

/// Record portal query details on a frame
pub fn with_portal_query(batch: &RecordBatch, query: &PortalQuery) -> Result<RecordBatch> {
    let batch = crate::with_schema_metadata(batch, META_ENCODED_QUERY, &query.encoded_query)?;
    let batch = crate::with_schema_metadata(&batch, META_WORKSPACE, &query.workspace)?;
    crate::with_schema_metadata(&batch, META_SUBSCRIPTION, &query.subscription)
}

/// Replace the links of every field with a single portal link
pub fn attach_portal_link(batch: &RecordBatch, url: &str) -> Result<RecordBatch> {
    let links = serde_json::to_string(&[FieldLink {
        url: url.to_string(),
        title: PORTAL_LINK_TITLE.to_string(),
        target_blank: true,
    }])?;

    let schema = batch.schema();
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|field| {
            let mut metadata = field.metadata().clone();
            metadata.insert(FIELD_LINKS.to_string(), links.clone());
            field.as_ref().clone().with_metadata(metadata)
        })
        .collect();

    let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
    crate::with_schema(batch, schema)
}

/// Links attached to a field, if any
pub fn field_links(field: &Field) -> Vec<FieldLink> {
    field
        .metadata()
        .get(FIELD_LINKS)
        .and_then(|json| serde_json::from_str(json).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::StringArray;
    use arrow::datatypes::DataType;

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Utf8, true),
            Field::new("b", DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["x"])),
                Arc::new(StringArray::from(vec!["y"])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_portal_query_roundtrip() {
        assert_eq!(portal_query(&batch()), None);

        let query = PortalQuery {
            encoded_query: "H4sI".to_string(),
            workspace: "ws-1".to_string(),
            subscription: "sub".to_string(),
        };
        let tagged = with_portal_query(&batch(), &query).unwrap();
        assert_eq!(portal_query(&tagged), Some(query));
    }

    #[test]
    fn test_empty_encoded_query_is_ignored() {
        let query = PortalQuery {
            encoded_query: String::new(),
            workspace: "ws-1".to_string(),
            subscription: "sub".to_string(),
        };
        let tagged = with_portal_query(&batch(), &query).unwrap();
        assert_eq!(portal_query(&tagged), None);
    }

    #[test]
    fn test_attach_portal_link_to_every_field() {
        let linked = attach_portal_link(&batch(), "https://portal.azure.com/#x").unwrap();
        for field in linked.schema().fields() {
            assert_eq!(
                field_links(field),
                vec![FieldLink {
                    url: "https://portal.azure.com/#x".to_string(),
                    title: "View in Azure Portal".to_string(),
                    target_blank: true,
                }]
            );
        }
        assert_eq!(linked.num_rows(), 1);
    }
}
