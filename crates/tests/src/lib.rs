use context::{Datasource, ResponseFileExecutor};
use kql::AzureMonitorQuery;
use std::path::PathBuf;

/// Get the path to a file under `crates/tests/fixtures`
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}

/// Load a JSON target from `crates/tests/targets`
pub fn load_target(name: &str) -> anyhow::Result<AzureMonitorQuery> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("targets")
        .join(name);
    let json = std::fs::read_to_string(&path)?;
    Ok(kql::parse_target(&json)?)
}

/// Data source with default settings replaying a saved response
pub fn replay_datasource(response: &str) -> Datasource<ResponseFileExecutor> {
    Datasource::new(
        config::DatasourceConfig::default(),
        ResponseFileExecutor::new(fixture_path(response)),
    )
}
