use arrow::array::Array;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use config::{Config, DatasourceConfig};
use frames::{
    attach_portal_link, convert_response_to_trace, decode_response, format_array_value,
    portal_query,
};
use kql::portal::{deep_link, WorkspaceList};
use kql::{
    apply_template_variables, build_trace_query, prepare_log_analytics_query, AzureMonitorQuery,
    LogAnalyticsQuery, ResultFormat, TemplateVariable, VariableQuery,
};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while running data source queries
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Target {0} has no Log Analytics query")]
    MissingQuery(String),

    #[error("No targets in request")]
    NoTargets,

    #[error("Query preparation failed: {0}")]
    Kql(#[from] kql::KqlError),

    #[error("Frame processing failed: {0}")]
    Frame(#[from] frames::FrameError),

    #[error("Query execution failed: {0}")]
    Execution(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ContextError>;

/// Runs prepared KQL against Log Analytics
///
/// The target handed to `execute` already carries the final query text.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, target: &AzureMonitorQuery) -> Result<Vec<RecordBatch>>;

    /// Workspaces listed at a subscription-scoped route
    async fn workspaces(&self, _route: &str) -> Result<WorkspaceList> {
        Ok(WorkspaceList { value: Vec::new() })
    }
}

/// Executor replaying a saved Log Analytics response
#[derive(Debug, Clone)]
pub struct ResponseFileExecutor {
    path: PathBuf,
}

impl ResponseFileExecutor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl QueryExecutor for ResponseFileExecutor {
    async fn execute(&self, target: &AzureMonitorQuery) -> Result<Vec<RecordBatch>> {
        debug!(
            "Replaying {} for refId {}",
            self.path.display(),
            target.ref_id
        );
        let body = tokio::fs::read_to_string(&self.path).await?;
        Ok(decode_response(&body)?)
    }
}

/// Azure Monitor data source over a query executor
pub struct Datasource<E> {
    settings: DatasourceConfig,
    executor: E,
    variables: Vec<TemplateVariable>,
}

/// Load and validate configuration, then build a data source
///
/// Parameters:
/// - config_file: Optional path to TOML configuration file. If None, uses environment variables.
pub fn create_datasource<E: QueryExecutor>(
    config_file: Option<&str>,
    executor: E,
) -> Result<Datasource<E>> {
    let app_config = Config::load(config_file)
        .map_err(|e| ContextError::Config(format!("Failed to load configuration: {:#}", e)))?;

    if let Some(file) = config_file {
        info!("Loaded configuration from: {}", file);
    } else {
        info!("Loaded configuration from environment variables");
    }

    app_config
        .validate()
        .map_err(|e| ContextError::Config(format!("Invalid configuration: {}", e)))?;

    info!("Using data source configuration:");
    info!("  Cloud: {}", app_config.datasource.cloud_name);
    info!(
        "  Subscription: {}",
        app_config.datasource.effective_subscription_id()
    );
    if !app_config.datasource.log_analytics_default_resource.is_empty() {
        info!(
            "  Default Resource: {}",
            app_config.datasource.log_analytics_default_resource
        );
    }

    Ok(Datasource::new(app_config.datasource, executor))
}

impl<E: QueryExecutor> Datasource<E> {
    pub fn new(settings: DatasourceConfig, executor: E) -> Self {
        Self {
            settings,
            executor,
            variables: Vec::new(),
        }
    }

    /// Dashboard variables substituted into every Log Analytics query
    pub fn with_variables(mut self, variables: Vec<TemplateVariable>) -> Self {
        self.variables = variables;
        self
    }

    pub fn settings(&self) -> &DatasourceConfig {
        &self.settings
    }

    /// Run a Log Analytics target
    ///
    /// The default resource fills in for targets without one and dashboard
    /// variables are substituted into the query. Queries against
    /// generic resources get the resource-centric let-statements, and frames
    /// that report their encoded query link back to the portal.
    pub async fn query_logs(&self, target: &AzureMonitorQuery) -> Result<Vec<RecordBatch>> {
        let mut target = target.clone();
        if let Some(la) = target.azure_log_analytics.as_mut() {
            la.resource = self
                .settings
                .resource_or_default(la.resource.as_deref())
                .map(str::to_string);
        }

        if let Some(query) = target
            .azure_log_analytics
            .as_mut()
            .and_then(|la| la.query.as_mut())
        {
            *query = apply_template_variables(query, &self.variables);
        }

        let query = prepare_log_analytics_query(&target)
            .ok_or_else(|| ContextError::MissingQuery(target.ref_id.clone()))?;
        debug!("Prepared KQL for {}: {}", target.ref_id, query);

        if let Some(la) = target.azure_log_analytics.as_mut() {
            la.query = Some(query);
        }

        let frames = self.executor.execute(&target).await?;
        self.process_response(frames).await
    }

    /// Run a trace request
    ///
    /// Only the first target is used. Targets with an operation id are
    /// rewritten into the trace query; the result is reshaped for the trace view.
    pub async fn query_traces(&self, targets: &[AzureMonitorQuery]) -> Result<Vec<RecordBatch>> {
        let first = targets.first().ok_or(ContextError::NoTargets)?;
        if targets.len() > 1 {
            debug!("Ignoring {} extra trace targets", targets.len() - 1);
        }

        let target = build_trace_query(first);
        match target.operation_id() {
            Some(id) => info!("Querying trace for operation {}", id),
            None => debug!("No operation id on {}, running query as written", target.ref_id),
        }

        let frames = self.executor.execute(&target).await?;
        Ok(convert_response_to_trace(&frames)?)
    }

    /// Resolve the values of a variable query
    ///
    /// `resources()` lists the workspace ids of a subscription; anything else
    /// runs as KQL against the default resource and yields the first column.
    pub async fn metric_find_query(&self, query: &str) -> Result<Vec<String>> {
        match VariableQuery::parse(query) {
            VariableQuery::Resources { subscription } => {
                let workspaces = self.list_workspaces(subscription.as_deref()).await?;
                Ok(workspaces.value.into_iter().map(|w| w.id).collect())
            }
            VariableQuery::Kql(kql) => {
                let target = AzureMonitorQuery {
                    ref_id: "variable".to_string(),
                    azure_log_analytics: Some(LogAnalyticsQuery {
                        query: Some(kql),
                        result_format: ResultFormat::Table,
                        ..Default::default()
                    }),
                    ..Default::default()
                };
                let frames = self.query_logs(&target).await?;
                Ok(first_column_values(&frames))
            }
        }
    }

    async fn list_workspaces(&self, subscription: Option<&str>) -> Result<WorkspaceList> {
        match self.settings.workspace_list_url(subscription) {
            Some(route) => {
                debug!("Listing workspaces at {}", route);
                self.executor.workspaces(&route).await
            }
            None => {
                warn!("No workspace route for cloud {}", self.settings.cloud_name);
                Ok(WorkspaceList { value: Vec::new() })
            }
        }
    }

    /// Attach portal links to frames that carry their encoded query
    pub async fn process_response(&self, frames: Vec<RecordBatch>) -> Result<Vec<RecordBatch>> {
        let mut processed = Vec::with_capacity(frames.len());

        for frame in frames {
            let portal = match portal_query(&frame) {
                Some(portal) => portal,
                None => {
                    processed.push(frame);
                    continue;
                }
            };

            let workspaces = self.list_workspaces(Some(&portal.subscription)).await?;
            match workspaces.details(&portal.workspace) {
                Some(details) => {
                    let url = deep_link(&portal.encoded_query, &portal.subscription, &details);
                    processed.push(attach_portal_link(&frame, &url)?);
                }
                None => {
                    warn!("Workspace {} not found, skipping portal link", portal.workspace);
                    processed.push(frame);
                }
            }
        }

        Ok(processed)
    }
}

/// Non-null values of the first column of every frame
fn first_column_values(frames: &[RecordBatch]) -> Vec<String> {
    frames
        .iter()
        .filter(|frame| frame.num_columns() > 0)
        .flat_map(|frame| {
            let column = frame.column(0);
            (0..frame.num_rows())
                .filter(|row| column.is_valid(*row))
                .map(|row| format_array_value(column.as_ref(), row))
                .collect::<Vec<_>>()
        })
        .collect()
}
