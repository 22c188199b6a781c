use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use context::{create_datasource, ResponseFileExecutor};
use frames::{convert_response_to_trace, decode_response, format_batches};
use kql::{
    add_converted_rc_kql_tables, build_trace_query, let_statement, parse_target, trace_query,
    QueryType, TelemetryKind, TemplateVariable,
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::fs;
use std::path::PathBuf;
use tracing::error;

/// KQL tooling for the Azure Monitor data source
#[derive(Parser, Debug)]
#[command(name = "azmon-kql")]
#[command(about = "KQL tooling for Azure Monitor and Application Insights", long_about = None)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the resource-centric let-statements
    Tables {
        /// Classic table alias (e.g. requests); all tables when omitted
        table: Option<String>,
    },

    /// Prefix a query with every let-statement
    Augment {
        /// KQL query body
        query: String,
    },

    /// Print the trace query for an operation
    Trace {
        /// Operation id to fetch spans for
        #[arg(short, long)]
        operation_id: Option<String>,

        /// Rewrite a JSON target instead of printing the bare query
        #[arg(short, long)]
        target: Option<PathBuf>,
    },

    /// Decode a saved Log Analytics response and print it
    Convert {
        /// Response JSON file
        response: PathBuf,

        /// Reshape the first table for the trace view
        #[arg(long)]
        trace: bool,
    },

    /// Run a JSON target against a saved response
    Query {
        /// Target JSON file
        #[arg(short, long)]
        target: PathBuf,

        /// Response JSON file replayed as the query result
        #[arg(short, long)]
        response: PathBuf,

        /// Dashboard variable as name=value (comma separated for multi-value)
        #[arg(long = "var")]
        variables: Vec<TemplateVariable>,
    },

    /// Resolve a variable query (`resources()` or KQL) against a saved response
    Variable {
        /// Variable query text
        query: String,

        /// Response JSON file replayed as the query result
        #[arg(short, long)]
        response: PathBuf,
    },

    /// Print the Log Analytics routes for the configured cloud
    Routes {
        /// Resource id used for the metadata route
        #[arg(long)]
        resource: Option<String>,

        /// Subscription overriding the configured one
        #[arg(long)]
        subscription: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set RUST_LOG environment variable to control log level
    // Example: RUST_LOG=info or RUST_LOG=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
                .add_directive("rustyline=error".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Some(Command::Tables { table }) => print_tables(table.as_deref())?,
        Some(Command::Augment { query }) => println!("{}", add_converted_rc_kql_tables(Some(&query))),
        Some(Command::Trace {
            operation_id,
            target,
        }) => print_trace(operation_id.as_deref(), target)?,
        Some(Command::Convert { response, trace }) => {
            let body = fs::read_to_string(&response)
                .with_context(|| format!("Failed to read {}", response.display()))?;
            let mut batches = decode_response(&body)?;
            if trace {
                batches = convert_response_to_trace(&batches)?;
            }
            println!("{}", format_batches(&batches));
        }
        Some(Command::Query {
            target,
            response,
            variables,
        }) => run_query(args.config.as_deref(), target, response, variables).await?,
        Some(Command::Variable { query, response }) => {
            let datasource =
                create_datasource(args.config.as_deref(), ResponseFileExecutor::new(response))?;
            for value in datasource.metric_find_query(&query).await? {
                println!("{}", value);
            }
        }
        Some(Command::Routes {
            resource,
            subscription,
        }) => print_routes(args.config.as_deref(), resource, subscription)?,
        None => repl()?,
    }

    Ok(())
}

fn print_tables(table: Option<&str>) -> Result<()> {
    println!("{}", render_tables(table)?);
    Ok(())
}

/// Let-statements for one table, or all of them one per line
fn render_tables(table: Option<&str>) -> Result<String> {
    match table {
        Some(alias) => {
            let kind: TelemetryKind = alias.parse()?;
            Ok(let_statement(kind))
        }
        None => Ok(TelemetryKind::ALL
            .into_iter()
            .map(let_statement)
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

fn print_routes(
    config_file: Option<&str>,
    resource: Option<String>,
    subscription: Option<String>,
) -> Result<()> {
    let config = Config::load(config_file)?;
    let settings = &config.datasource;
    let unavailable = || format!("(not available in {})", settings.cloud_name);

    println!("Cloud: {}", settings.cloud_name);
    println!(
        "Base: {}",
        settings.base_url().map(str::to_string).unwrap_or_else(unavailable)
    );
    println!(
        "Workspaces: {}",
        settings
            .workspace_list_url(subscription.as_deref())
            .unwrap_or_else(unavailable)
    );
    if let Some(resource) = settings.resource_or_default(resource.as_deref()) {
        println!(
            "Metadata: {}",
            settings.metadata_url(resource).unwrap_or_else(unavailable)
        );
    }
    Ok(())
}

fn print_trace(operation_id: Option<&str>, target: Option<PathBuf>) -> Result<()> {
    match (target, operation_id) {
        (Some(path), _) => {
            let json = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let mut target = parse_target(&json)?;
            if let (Some(id), Some(la)) = (operation_id, target.azure_log_analytics.as_mut()) {
                la.operation_id = Some(id.to_string());
            }
            let built = build_trace_query(&target);
            println!("{}", serde_json::to_string_pretty(&built)?);
        }
        (None, Some(id)) => println!("{}", trace_query(id)),
        (None, None) => anyhow::bail!("Either --operation-id or --target is required"),
    }
    Ok(())
}

async fn run_query(
    config: Option<&str>,
    target: PathBuf,
    response: PathBuf,
    variables: Vec<TemplateVariable>,
) -> Result<()> {
    let json = fs::read_to_string(&target)
        .with_context(|| format!("Failed to read {}", target.display()))?;
    let target = parse_target(&json)?;

    let datasource = create_datasource(config, ResponseFileExecutor::new(response))?
        .with_variables(variables);

    let batches = match target.query_type {
        QueryType::Traces => datasource.query_traces(&[target]).await?,
        _ => datasource.query_logs(&target).await?,
    };
    println!("{}", format_batches(&batches));
    Ok(())
}

fn repl() -> Result<()> {
    println!("Azure Monitor KQL REPL");
    println!("Type 'exit' or 'quit' to exit, '\\h' for help\n");

    let history_file = get_history_file_path();

    let mut rl = DefaultEditor::new().context("Failed to create readline editor")?;

    if history_file.exists() {
        rl.load_history(&history_file)
            .context("Failed to load history file")?;
    }

    loop {
        let readline = rl.readline("kql> ");
        match readline {
            Ok(line) => {
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
                    save_history(&mut rl, &history_file);
                    println!("Goodbye!");
                    break;
                }

                match repl_command(line) {
                    Ok(output) => println!("{}", output),
                    Err(e) => {
                        error!("Command failed: {}", e);
                        eprintln!("Error: {}", e);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                save_history(&mut rl, &history_file);
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                save_history(&mut rl, &history_file);
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                save_history(&mut rl, &history_file);
                error!("Readline error: {:?}", err);
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

/// Output of one REPL line other than exit/quit
fn repl_command(line: &str) -> Result<String> {
    let (command, rest) = line
        .split_once(char::is_whitespace)
        .map(|(command, rest)| (command, rest.trim()))
        .unwrap_or((line, ""));

    match command {
        "\\h" => Ok(help_text()),
        "\\t" => render_tables((!rest.is_empty()).then_some(rest)),
        "\\trace" if !rest.is_empty() => Ok(trace_query(rest)),
        "\\trace" => anyhow::bail!("Usage: \\trace <operation id>"),
        _ => Ok(add_converted_rc_kql_tables(Some(line))),
    }
}

fn get_history_file_path() -> PathBuf {
    if let Some(home) = dirs::home_dir() {
        home.join(".azmon_kql_history")
    } else {
        PathBuf::from(".azmon_kql_history")
    }
}

fn save_history(rl: &mut DefaultEditor, history_file: &PathBuf) {
    use tracing::warn;
    rl.save_history(history_file)
        .context("Failed to save history file")
        .unwrap_or_else(|e| {
            warn!("Could not save history: {}", e);
            eprintln!("Warning: Could not save history: {}", e);
        });
}

fn help_text() -> String {
    [
        "Azure Monitor KQL REPL Help:",
        "  exit, quit      - Exit the REPL",
        "  \\h              - Show this help message",
        "  \\t [table]      - Print the let-statement for a table (all when omitted)",
        "  \\trace <id>     - Print the trace query for an operation id",
        "  <KQL>           - Print the query prefixed with every let-statement",
        "",
        "Example queries:",
        "  requests | summarize count() by resultCode",
        "  \\t dependencies",
        "  \\trace 4bf92f3577b34da6a3ce929d0e0e4736",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repl_table_command() {
        let output = repl_command("\\t requests").unwrap();
        assert!(output.starts_with("let requests = AppRequests\n"));
        assert_eq!(output, let_statement(TelemetryKind::Requests));

        let all = repl_command("\\t").unwrap();
        assert_eq!(all.lines().filter(|l| l.starts_with("let ")).count(), 10);

        assert!(repl_command("\\t nosuchtable").is_err());
    }

    #[test]
    fn test_repl_trace_command() {
        let output = repl_command("\\trace abc").unwrap();
        assert_eq!(output, trace_query("abc"));
        assert!(output.contains("OperationId == 'abc'"));

        assert!(repl_command("\\trace").is_err());
    }

    #[test]
    fn test_repl_help_and_queries() {
        assert!(repl_command("\\h").unwrap().contains("\\trace <id>"));

        let output = repl_command("requests | take 5").unwrap();
        assert!(output.starts_with("let requests = AppRequests\n"));
        assert!(output.ends_with("requests | take 5"));
    }

    #[test]
    fn test_var_argument_parses() {
        let args = Args::try_parse_from([
            "azmon-kql",
            "query",
            "--target",
            "t.json",
            "--response",
            "r.json",
            "--var",
            "app=checkout",
            "--var",
            "codes=200,500",
        ])
        .unwrap();

        match args.command {
            Some(Command::Query { variables, .. }) => {
                assert_eq!(variables.len(), 2);
                assert_eq!(variables[1].interpolated(), "'200','500'");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
