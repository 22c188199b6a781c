//! Query target model shared with the Grafana front end

use serde::{Deserialize, Serialize};

/// Which Azure service a target is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QueryType {
    #[serde(rename = "Azure Monitor")]
    AzureMonitor,
    #[default]
    #[serde(rename = "Azure Log Analytics")]
    LogAnalytics,
    #[serde(rename = "Azure Resource Log Analytics")]
    ResourceLogAnalytics,
    #[serde(rename = "Azure Traces")]
    Traces,
}

/// Shape of the rows returned by Log Analytics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResultFormat {
    #[default]
    TimeSeries,
    Table,
    Logs,
}

/// A single panel query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AzureMonitorQuery {
    pub ref_id: String,

    #[serde(default)]
    pub query_type: QueryType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_log_analytics: Option<LogAnalyticsQuery>,
}

/// Log Analytics section of a target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LogAnalyticsQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    #[serde(default)]
    pub result_format: ResultFormat,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// Operation whose spans a trace query should fetch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
}

impl AzureMonitorQuery {
    /// Operation id of the Log Analytics section, if set and non-empty
    pub fn operation_id(&self) -> Option<&str> {
        self.azure_log_analytics
            .as_ref()
            .and_then(|la| la.operation_id.as_deref())
            .filter(|id| !id.is_empty())
    }
}
