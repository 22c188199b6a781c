use kql::{add_converted_rc_kql_tables, let_statement_for, TelemetryKind};
use std::fs;
use std::path::PathBuf;

fn tables_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tables")
}

/// Read the golden let-statement for a table alias
fn golden(alias: &str) -> String {
    let path = tables_dir().join(format!("{}.kql", alias));
    fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e))
        .trim_end_matches('\n')
        .to_string()
}

#[test]
fn test_augmented_query_matches_golden_files() {
    let body = "requests\n| where success == \"False\"\n| summarize count() by bin(timestamp, 5m)";
    let expected: String = TelemetryKind::ALL
        .iter()
        .map(|kind| golden(kind.alias()))
        .collect::<String>()
        + body;

    assert_eq!(add_converted_rc_kql_tables(Some(body)), expected);
}

#[test]
fn test_every_golden_alias_is_a_known_kind() {
    let mut known = 0;
    for entry in fs::read_dir(tables_dir()).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().and_then(|s| s.to_str()) != Some("alias") {
            continue;
        }
        let alias = fs::read_to_string(&path).unwrap().trim().to_string();
        match TelemetryKind::from_alias(&alias) {
            Some(_) => known += 1,
            None => assert_eq!(let_statement_for(&alias), ""),
        }
    }
    assert_eq!(known, TelemetryKind::ALL.len());
}
