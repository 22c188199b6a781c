//! Let-statement generation for resource-centric workspaces
//!
//! Classic Application Insights queries refer to tables like `requests` and
//! columns like `operation_Id`. Workspace-based resources store the same data
//! in `AppRequests` with `OperationId`. Prefixing a query with one `let` per
//! telemetry kind lets the classic query run unchanged against either.

use crate::tables::TelemetryKind;
use tracing::debug;

/// Build the let-statement aliasing one classic table onto its resource-centric table
///
/// ```text
/// let requests = AppRequests
///   | project timestamp=TimeGenerated,customDimensions=Properties,...;
/// ```
pub fn let_statement(kind: TelemetryKind) -> String {
    let map = kind.field_map();
    if map.is_empty() {
        return String::new();
    }

    let projection = map
        .iter()
        .map(|(column, expression)| format!("{}={}", column, expression))
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "let {} = {}\n  | project {};",
        kind.alias(),
        kind.source_table(),
        projection
    )
}

/// Same as [`let_statement`], keyed by the classic table alias.
///
/// Unknown aliases contribute nothing.
pub fn let_statement_for(alias: &str) -> String {
    match TelemetryKind::from_alias(alias) {
        Some(kind) => let_statement(kind),
        None => {
            debug!("No resource-centric mapping for table '{}'", alias);
            String::new()
        }
    }
}

/// Prefix a query with the let-statements for every telemetry kind.
///
/// An empty or missing query yields an empty string; the let-statements are
/// never emitted on their own.
pub fn add_converted_rc_kql_tables(query: Option<&str>) -> String {
    let query = match query {
        Some(q) if !q.is_empty() => q,
        _ => return String::new(),
    };

    let mut converted = String::new();
    for kind in TelemetryKind::ALL {
        converted.push_str(&let_statement(kind));
    }
    converted.push_str(query);
    converted
}
