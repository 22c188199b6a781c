//! KQL generation for Azure Monitor queries
//!
//! This crate turns Grafana Azure Monitor targets into the Kusto text sent to
//! Log Analytics.
//!
//! # Architecture
//!
//! 1. **Tables** (`tables.rs`) - Classic to resource-centric column maps per telemetry kind
//! 2. **Convert** (`convert.rs`) - Let-statements and query augmentation
//! 3. **Trace** (`trace.rs`) - Distributed trace query for one operation id
//! 4. **Query** (`query.rs`) - Target model shared with the front end
//! 5. **Resource / Variables / Portal** - Resource ids, template variables, portal links
//!
//! # Usage
//!
//! ```rust,ignore
//! use kql::{add_converted_rc_kql_tables, trace_query};
//!
//! // Make a classic query runnable against a workspace-based resource
//! let kql = add_converted_rc_kql_tables(Some("requests | take 10"));
//!
//! // Fetch every span of an operation
//! let kql = trace_query("4bf92f3577b34da6a3ce929d0e0e4736");
//! ```
pub mod convert;
pub mod portal;
pub mod query;
pub mod resource;
pub mod tables;
pub mod trace;
pub mod variables;

pub use convert::{add_converted_rc_kql_tables, let_statement, let_statement_for};
pub use query::{AzureMonitorQuery, LogAnalyticsQuery, QueryType, ResultFormat};
pub use resource::is_generic_resource_id;
pub use tables::TelemetryKind;
pub use trace::{build_trace_query, trace_query};
pub use variables::{apply_template_variables, TemplateVariable, VariableQuery, VariableValue};

use thiserror::Error;

/// Errors raised while preparing KQL
#[derive(Debug, Error)]
pub enum KqlError {
    /// Table alias with no resource-centric mapping
    #[error("Unknown telemetry table: {0}")]
    UnknownTable(String),

    /// Variable assignment not of the form `name=value`
    #[error("Invalid template variable: {0}")]
    InvalidVariable(String),

    /// Target could not be read
    #[error("Invalid query target: {0}")]
    InvalidTarget(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, KqlError>;

/// Read a target from its JSON form
pub fn parse_target(json: &str) -> Result<AzureMonitorQuery> {
    Ok(serde_json::from_str(json)?)
}

/// Prepare the KQL for a Log Analytics target.
///
/// Queries against generic (non Application Insights) resources are prefixed
/// with the resource-centric let-statements; others pass through as written.
pub fn prepare_log_analytics_query(target: &AzureMonitorQuery) -> Option<String> {
    let la = target.azure_log_analytics.as_ref()?;
    let query = la.query.as_deref()?;

    if is_generic_resource_id(la.resource.as_deref()) {
        Some(add_converted_rc_kql_tables(Some(query)))
    } else {
        Some(query.to_string())
    }
}
