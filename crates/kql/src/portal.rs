//! Links back to the Azure portal Logs blade
//!
//! Log Analytics responses carry the executed query gzip+base64 encoded.
//! The portal accepts it directly, scoped to the workspace that ran it.

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

/// Title shown on links attached to result fields
pub const PORTAL_LINK_TITLE: &str = "View in Azure Portal";

/// `GET .../providers/Microsoft.OperationalInsights/workspaces` response
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceList {
    #[serde(default)]
    pub value: Vec<Workspace>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Workspace {
    /// ARM resource id
    pub id: String,
    pub name: String,
    pub properties: WorkspaceProperties,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceProperties {
    /// Workspace GUID as reported in query metadata
    pub customer_id: String,
}

/// Name and resource group of a workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceDetails {
    pub workspace: String,
    pub resource_group: String,
}

fn resource_group_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r".*resourcegroups/(.*)/providers.*").expect("valid regex"))
}

impl WorkspaceList {
    /// Find the workspace with the given customer id
    pub fn details(&self, customer_id: &str) -> Option<WorkspaceDetails> {
        let workspace = self
            .value
            .iter()
            .find(|w| w.properties.customer_id == customer_id)?;

        let captures = resource_group_regex().captures(&workspace.id)?;
        let resource_group = captures.get(1)?.as_str().to_string();

        Some(WorkspaceDetails {
            workspace: workspace.name.clone(),
            resource_group,
        })
    }
}

/// Build the portal URL opening `encoded_query` against a workspace.
pub fn deep_link(encoded_query: &str, subscription: &str, details: &WorkspaceDetails) -> String {
    format!(
        "https://portal.azure.com/#blade/Microsoft_OperationsManagementSuite_Workspace/\
         AnalyticsBlade/initiator/AnalyticsShareLinkToQuery/isQueryEditorVisible/true/scope/\
         %7B%22resources%22%3A%5B%7B%22resourceId%22%3A%22%2Fsubscriptions%2F{subscription}\
         %2Fresourcegroups%2F{resource_group}%2Fproviders%2Fmicrosoft.operationalinsights%2Fworkspaces%2F{workspace}\
         %22%7D%5D%7D/query/{query}/isQueryBase64Compressed/true/timespanInIsoFormat/P1D",
        subscription = subscription,
        resource_group = details.resource_group,
        workspace = details.workspace,
        query = urlencoding::encode(encoded_query),
    )
}
