use anyhow::{Context, Result};
use kql::let_statement_for;
use std::fs;
use std::path::Path;

fn main() -> Result<()> {
    let tables_dir = Path::new("crates/kql/tables");

    let entries = fs::read_dir(tables_dir)
        .with_context(|| format!("Failed to read {}", tables_dir.display()))?;

    for entry in entries {
        let path = entry?.path();

        if path.extension().and_then(|s| s.to_str()) != Some("alias") {
            continue;
        }

        let alias = fs::read_to_string(&path)?;
        let alias = alias.trim();
        if alias.is_empty() {
            continue;
        }

        let kql_path = path.with_extension("kql");
        fs::write(&kql_path, format!("{}\n", let_statement_for(alias)))
            .with_context(|| format!("Failed to write {}", kql_path.display()))?;
        println!("Generated: {}", kql_path.display());
    }

    Ok(())
}
