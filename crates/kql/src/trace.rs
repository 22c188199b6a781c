//! Distributed trace query for a single operation
//!
//! The query unions the Application Insights tables that carry spans, keeps
//! the rows belonging to one operation, and reshapes them into the columns the
//! trace view expects: `traceID`, `parentSpanID`, `spanID`, `duration`,
//! `startTime`, `serviceName` and `serviceTags`.

use crate::query::{AzureMonitorQuery, LogAnalyticsQuery, ResultFormat};
use tracing::debug;

/// Tables scanned for spans of an operation
pub const TRACE_TABLES: [&str; 6] = [
    "AppEvents",
    "AppPageViews",
    "AppRequests",
    "AppDependencies",
    "AppExceptions",
    "AppAvailabilityResults",
];

/// Render the trace query for an operation id.
///
/// The id is placed inside single-quoted string literals as is. Operation ids
/// come from Application Insights and never contain quotes.
pub fn trace_query(operation_id: &str) -> String {
    format!(
        "set truncationmaxrecords=10000;
    set truncationmaxsize=67108864;
    union isfuzzy=true {tables}
    | where TimeGenerated > $__timeFrom and TimeGenerated < $__timeTo
    | where (OperationId != '' and OperationId == '{id}') or (Properties.ai_legacyRootId != '' and Properties.ai_legacyRootId == '{id}')
    | extend duration = toreal(column_ifexists(\"DurationMs\", 0)), Id = column_ifexists(\"Id\", \"\"), serviceName = column_ifexists(\"Name\", column_ifexists(\"ProblemId\", \"\"))
    | extend duration = iff(isnull(duration), toreal(0), duration)
    | extend spanID = iff(isempty(Id), tostring(new_guid()), Id)
    | project OperationId, ParentId, spanID, duration, TimeGenerated, serviceName, Properties
    | project-rename traceID = OperationId, parentSpanID = ParentId, startTime = TimeGenerated, serviceTags = Properties",
        tables = TRACE_TABLES.join(","),
        id = operation_id,
    )
}

/// Rewrite a target into a trace query.
///
/// Targets without a Log Analytics section or without an operation id are
/// returned unchanged.
pub fn build_trace_query(target: &AzureMonitorQuery) -> AzureMonitorQuery {
    let (log_analytics, operation_id) = match (&target.azure_log_analytics, target.operation_id())
    {
        (Some(la), Some(id)) => (la, id),
        _ => return target.clone(),
    };

    debug!(
        "Building trace query for operation {} (refId {})",
        operation_id, target.ref_id
    );

    AzureMonitorQuery {
        azure_log_analytics: Some(LogAnalyticsQuery {
            query: Some(trace_query(operation_id)),
            result_format: ResultFormat::Table,
            ..log_analytics.clone()
        }),
        ..target.clone()
    }
}
