use arrow::array::{Array, ListArray, StringArray, StructArray};
use context::{create_datasource, ResponseFileExecutor};
use frames::{format_batches, META_PREFERRED_VISUALISATION, META_TABLE_NAME, SERVICE_TAGS};
use kql::{build_trace_query, QueryType, ResultFormat};
use tests::{fixture_path, load_target, replay_datasource};

/// Key/value pairs of one serviceTags cell
fn tags_at(list: &ListArray, row: usize) -> Vec<(String, Option<String>)> {
    let entries = list.value(row);
    let entries = entries
        .as_any()
        .downcast_ref::<StructArray>()
        .expect("entries are structs");
    let keys = entries
        .column_by_name("key")
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .expect("key column");
    let values = entries
        .column_by_name("value")
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .expect("value column");

    (0..entries.len())
        .map(|i| {
            let value = (!values.is_null(i)).then(|| values.value(i).to_string());
            (keys.value(i).to_string(), value)
        })
        .collect()
}

#[test]
fn test_trace_target_is_rewritten() {
    let target = load_target("trace_target.json").expect("Failed to load target");
    assert_eq!(target.query_type, QueryType::Traces);

    let built = build_trace_query(&target);
    let la = built.azure_log_analytics.expect("Log Analytics section");
    let query = la.query.expect("query");

    assert_eq!(la.result_format, ResultFormat::Table);
    assert!(query.starts_with("set truncationmaxrecords=10000;"));
    assert!(query.contains("| where (OperationId != '' and OperationId == '4bf92f3577b34da6a3ce929d0e0e4736')"));
    assert_eq!(built.subscription, target.subscription);
}

#[tokio::test]
async fn test_trace_response_end_to_end() {
    let target = load_target("trace_target.json").expect("Failed to load target");
    let ds = replay_datasource("trace_response.json");

    let frames = ds
        .query_traces(&[target])
        .await
        .expect("Failed to run trace query");

    // Secondary tables are dropped
    assert_eq!(frames.len(), 1);
    let frame = &frames[0];
    let schema = frame.schema();
    assert_eq!(
        schema.metadata().get(META_PREFERRED_VISUALISATION).map(String::as_str),
        Some("trace")
    );
    assert_eq!(
        schema.metadata().get(META_TABLE_NAME).map(String::as_str),
        Some("PrimaryResult")
    );
    assert_eq!(frame.num_rows(), 2);

    let tags = frame
        .column_by_name(SERVICE_TAGS)
        .and_then(|c| c.as_any().downcast_ref::<ListArray>())
        .expect("serviceTags is a list column");

    assert_eq!(
        tags_at(tags, 0),
        vec![
            ("service.version".to_string(), Some("1.4.2".to_string())),
            ("ai.cloud.role".to_string(), Some("checkout-api".to_string())),
            ("sampled".to_string(), Some("true".to_string())),
        ]
    );
    assert!(tags_at(tags, 1).is_empty());

    // Other dynamic columns are untouched
    let other = frame
        .column_by_name("tags")
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .expect("tags stays text");
    assert_eq!(other.value(0), r#"{"http.status_code":"200"}"#);
}

#[tokio::test]
async fn test_logs_response_end_to_end() {
    let target = load_target("logs_target.json").expect("Failed to load target");
    let ds = replay_datasource("logs_response.json");

    let frames = ds.query_logs(&target).await.expect("Failed to run logs query");
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].num_rows(), 2);

    let rendered = format_batches(&frames);
    assert!(rendered.contains("resultCode"));
    assert!(rendered.contains("1042"));
    assert!(rendered.contains("false"));
}

#[tokio::test]
async fn test_create_datasource_from_file() {
    let config = fixture_path("azmon.toml");
    let ds = create_datasource(
        config.to_str(),
        ResponseFileExecutor::new(fixture_path("logs_response.json")),
    )
    .expect("Failed to create data source");

    let settings = ds.settings();
    assert_eq!(settings.cloud_name, config::CloudName::GovAzureMonitor);
    assert_eq!(settings.base_url(), Some("/govresourceloganalyticsazure"));
    assert!(settings.is_configured());
}

#[tokio::test]
async fn test_missing_response_file() {
    let target = load_target("logs_target.json").expect("Failed to load target");
    let ds = replay_datasource("does_not_exist.json");
    assert!(ds.query_logs(&target).await.is_err());
}
