use anyhow::{Context, Result};
use config_rs::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Azure Monitor data source settings
    #[serde(default)]
    pub datasource: DatasourceConfig,
}

/// Azure cloud the data source talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CloudName {
    #[default]
    AzureMonitor,
    GovAzureMonitor,
    GermanyAzureMonitor,
    ChinaAzureMonitor,
}

impl CloudName {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloudName::AzureMonitor => "azuremonitor",
            CloudName::GovAzureMonitor => "govazuremonitor",
            CloudName::GermanyAzureMonitor => "germanyazuremonitor",
            CloudName::ChinaAzureMonitor => "chinaazuremonitor",
        }
    }

    /// Route prefix for resource-centric Log Analytics calls.
    ///
    /// Azure Germany has no resource-centric endpoint.
    pub fn log_analytics_route(&self) -> Option<&'static str> {
        match self {
            CloudName::AzureMonitor => Some("/resourceloganalyticsazure"),
            CloudName::GovAzureMonitor => Some("/govresourceloganalyticsazure"),
            CloudName::ChinaAzureMonitor => Some("/chinaresourceloganalyticsazure"),
            CloudName::GermanyAzureMonitor => None,
        }
    }
}

impl fmt::Display for CloudName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instance settings of an Azure Monitor data source
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatasourceConfig {
    #[serde(default)]
    pub cloud_name: CloudName,

    /// Data source proxy URL prepended to every route
    #[serde(default)]
    pub url: String,

    /// Azure Monitor subscription
    #[serde(default)]
    pub subscription_id: String,

    /// Log Analytics credentials, when they differ from Azure Monitor's
    #[serde(default)]
    pub log_analytics_subscription_id: String,

    #[serde(default)]
    pub log_analytics_tenant_id: String,

    #[serde(default)]
    pub log_analytics_client_id: String,

    /// Resource queried when a target names none
    #[serde(default)]
    pub log_analytics_default_resource: String,

    /// Log Analytics reuses the Azure Monitor credentials
    #[serde(default)]
    pub azure_log_analytics_same_as: bool,

    /// Resource Log Analytics reuses the Azure Monitor credentials
    #[serde(default)]
    pub azure_resource_log_analytics_same_as: bool,
}

const WORKSPACES_API_VERSION: &str = "2017-04-26-preview";

impl Config {
    /// Load Config with layered configuration priority:
    /// 1. Default values
    /// 2. TOML file (if provided)
    /// 3. Environment variables (`AZMON_DATASOURCE__CLOUD_NAME=govazuremonitor`)
    pub fn load(config_file: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder()
            .set_default("datasource.cloud_name", "azuremonitor")?
            .set_default("datasource.url", "")?
            .set_default("datasource.subscription_id", "")?
            .set_default("datasource.log_analytics_subscription_id", "")?
            .set_default("datasource.log_analytics_tenant_id", "")?
            .set_default("datasource.log_analytics_client_id", "")?
            .set_default("datasource.log_analytics_default_resource", "")?
            .set_default("datasource.azure_log_analytics_same_as", false)?
            .set_default("datasource.azure_resource_log_analytics_same_as", false)?;

        if let Some(file_path) = config_file {
            let path = Path::new(file_path);
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("AZMON")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Load Config from a TOML file
    ///
    /// Environment variables can still override values from the file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path = path
            .to_str()
            .with_context(|| format!("Configuration path is not UTF-8: {}", path.display()))?;
        Self::load(Some(path))
    }

    /// Create a new Config from environment variables with defaults
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.datasource.validate()
    }
}

impl DatasourceConfig {
    /// Validate the Log Analytics credentials
    pub fn validate(&self) -> Result<()> {
        if self.azure_resource_log_analytics_same_as {
            return Ok(());
        }

        anyhow::ensure!(
            !self.log_analytics_subscription_id.is_empty(),
            "The Subscription Id field is required."
        );
        anyhow::ensure!(
            !self.log_analytics_tenant_id.is_empty(),
            "The Tenant Id field is required."
        );
        anyhow::ensure!(
            !self.log_analytics_client_id.is_empty(),
            "The Client Id field is required."
        );

        Ok(())
    }

    /// True once Log Analytics has credentials of its own or borrows Azure Monitor's
    pub fn is_configured(&self) -> bool {
        !self.log_analytics_subscription_id.is_empty() || self.azure_resource_log_analytics_same_as
    }

    fn uses_azure_monitor_credentials(&self) -> bool {
        !self.subscription_id.is_empty() || self.azure_log_analytics_same_as
    }

    /// Route prefix for resource-centric Log Analytics queries
    pub fn base_url(&self) -> Option<&'static str> {
        self.cloud_name.log_analytics_route()
    }

    /// Subscription used for resource and workspace listings
    pub fn effective_subscription_id(&self) -> &str {
        if self.uses_azure_monitor_credentials() {
            &self.subscription_id
        } else {
            &self.log_analytics_subscription_id
        }
    }

    /// Route prefix for subscription-scoped ARM calls
    pub fn azure_monitor_url(&self) -> Option<String> {
        if self.uses_azure_monitor_credentials() {
            Some(format!("/{}/subscriptions", self.cloud_name))
        } else {
            self.cloud_name
                .log_analytics_route()
                .map(|route| format!("{}/subscriptions", route))
        }
    }

    /// Route listing the Log Analytics workspaces of a subscription
    pub fn workspace_list_url(&self, subscription: Option<&str>) -> Option<String> {
        let subscription = subscription
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.effective_subscription_id());
        self.azure_monitor_url().map(|base| {
            format!(
                "{}/{}/providers/Microsoft.OperationalInsights/workspaces?api-version={}",
                base, subscription, WORKSPACES_API_VERSION
            )
        })
    }

    /// Route returning the table schema of a resource
    pub fn metadata_url(&self, resource: &str) -> Option<String> {
        self.base_url()
            .map(|base| format!("{}{}/metadata", base, resource))
    }

    /// Resource for a target, falling back to the configured default
    pub fn resource_or_default<'a>(&'a self, resource: Option<&'a str>) -> Option<&'a str> {
        resource
            .filter(|r| !r.is_empty())
            .or_else(|| Some(self.log_analytics_default_resource.as_str()).filter(|r| !r.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> DatasourceConfig {
        DatasourceConfig {
            log_analytics_subscription_id: "la-sub".to_string(),
            log_analytics_tenant_id: "tenant".to_string(),
            log_analytics_client_id: "client".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.datasource.cloud_name, CloudName::AzureMonitor);
        assert!(config.datasource.url.is_empty());
        assert!(!config.datasource.is_configured());
    }

    #[test]
    fn test_load_with_defaults() {
        let config = Config::load(None).expect("Failed to load config");
        assert_eq!(config.datasource.cloud_name, CloudName::AzureMonitor);
        assert!(!config.datasource.azure_log_analytics_same_as);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(Config::load(Some("/nonexistent/azmon.toml")).is_err());
    }

    #[test]
    fn test_base_url_per_cloud() {
        let mut ds = DatasourceConfig::default();
        assert_eq!(ds.base_url(), Some("/resourceloganalyticsazure"));

        ds.cloud_name = CloudName::GovAzureMonitor;
        assert_eq!(ds.base_url(), Some("/govresourceloganalyticsazure"));

        ds.cloud_name = CloudName::ChinaAzureMonitor;
        assert_eq!(ds.base_url(), Some("/chinaresourceloganalyticsazure"));

        ds.cloud_name = CloudName::GermanyAzureMonitor;
        assert_eq!(ds.base_url(), None);
        assert_eq!(ds.metadata_url("/subscriptions/s"), None);
    }

    #[test]
    fn test_azure_monitor_url() {
        let mut ds = configured();
        assert_eq!(
            ds.azure_monitor_url().as_deref(),
            Some("/resourceloganalyticsazure/subscriptions")
        );
        assert_eq!(ds.effective_subscription_id(), "la-sub");

        ds.subscription_id = "am-sub".to_string();
        ds.cloud_name = CloudName::GovAzureMonitor;
        assert_eq!(
            ds.azure_monitor_url().as_deref(),
            Some("/govazuremonitor/subscriptions")
        );
        assert_eq!(ds.effective_subscription_id(), "am-sub");
    }

    #[test]
    fn test_workspace_list_url() {
        let ds = configured();
        assert_eq!(
            ds.workspace_list_url(None).as_deref(),
            Some("/resourceloganalyticsazure/subscriptions/la-sub/providers/Microsoft.OperationalInsights/workspaces?api-version=2017-04-26-preview")
        );
        assert!(ds
            .workspace_list_url(Some("other"))
            .unwrap()
            .contains("/subscriptions/other/providers/"));
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(configured().validate().is_ok());
        assert!(configured().is_configured());
    }

    #[test]
    fn test_validate_missing_fields() {
        let mut ds = configured();
        ds.log_analytics_tenant_id = String::new();
        let err = ds.validate().unwrap_err();
        assert_eq!(err.to_string(), "The Tenant Id field is required.");

        let err = DatasourceConfig::default().validate().unwrap_err();
        assert_eq!(err.to_string(), "The Subscription Id field is required.");
    }

    #[test]
    fn test_same_as_skips_validation() {
        let ds = DatasourceConfig {
            azure_resource_log_analytics_same_as: true,
            ..Default::default()
        };
        assert!(ds.validate().is_ok());
        assert!(ds.is_configured());
    }

    #[test]
    fn test_resource_or_default() {
        let mut ds = DatasourceConfig::default();
        assert_eq!(ds.resource_or_default(None), None);

        ds.log_analytics_default_resource = "/subscriptions/s/default".to_string();
        assert_eq!(
            ds.resource_or_default(Some("")),
            Some("/subscriptions/s/default")
        );
        assert_eq!(ds.resource_or_default(Some("/r")), Some("/r"));
    }
}
