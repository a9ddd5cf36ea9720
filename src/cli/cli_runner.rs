use clap::Parser;
use colored::*;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::cli::{CliArgs, Commands, FilterArgs, OutputFormatter};
use crate::engine::{FilterSpec, Operation, OrderSpec, QueryRequest};
use crate::storage::JsonStore;
use crate::utils::{
    config::StoreConfig,
    error::{FlatrestError, FlatrestResult},
};

/// Main CLI runner that handles command execution
pub struct CliRunner {
    store: JsonStore,
}

impl CliRunner {
    /// Open the store described by the CLI flags and optional config file
    pub fn new(args: &CliArgs) -> FlatrestResult<Self> {
        let mut config = match &args.config {
            Some(path) => StoreConfig::from_file(path)?,
            None => StoreConfig::default(),
        };
        if let Some(data_dir) = &args.data_dir {
            config.data_dir = data_dir.clone();
        }

        Ok(Self {
            store: JsonStore::open(config)?,
        })
    }

    pub fn with_store(store: JsonStore) -> Self {
        Self { store }
    }

    /// Execute a command and return its formatted output
    pub fn run_command(&self, command: Commands) -> FlatrestResult<String> {
        match command {
            Commands::Select {
                table,
                columns,
                filters,
                order,
                limit,
                range,
                single,
                maybe_single,
                count,
                head,
                format,
            } => {
                let mut request = QueryRequest::new(Operation::Select);
                request.columns = columns;
                request.filters = parse_filter_args(&filters)?;
                request.order = order.iter().map(|o| parse_order_arg(o)).collect();
                request.limit = limit;
                request.range = range.as_deref().map(parse_range_arg).transpose()?;
                request.single = single;
                request.maybe_single = maybe_single;
                request.count = count.then(|| "exact".to_string());
                request.head = head;

                let result = request.execute(&self.store, &table)?;
                Ok(OutputFormatter::format_result(&result, &format))
            }

            Commands::Insert { table, json, format } => {
                let mut request = QueryRequest::new(Operation::Insert);
                request.body = Some(parse_json_arg(&json)?);
                let result = request.execute(&self.store, &table)?;
                Ok(OutputFormatter::format_result(&result, &format))
            }

            Commands::Upsert { table, json, format } => {
                let mut request = QueryRequest::new(Operation::Upsert);
                request.body = Some(parse_json_arg(&json)?);
                let result = request.execute(&self.store, &table)?;
                Ok(OutputFormatter::format_result(&result, &format))
            }

            Commands::Update {
                table,
                json,
                filters,
                format,
            } => {
                let mut request = QueryRequest::new(Operation::Update);
                request.body = Some(parse_json_arg(&json)?);
                request.filters = parse_filter_args(&filters)?;
                let result = request.execute(&self.store, &table)?;
                Ok(OutputFormatter::format_result(&result, &format))
            }

            Commands::Delete { table, filters, format } => {
                let mut request = QueryRequest::new(Operation::Delete);
                request.filters = parse_filter_args(&filters)?;
                let result = request.execute(&self.store, &table)?;
                Ok(OutputFormatter::format_result(&result, &format))
            }

            Commands::Request { table, json, format } => {
                let request = QueryRequest::from_json(&json)?;
                let result = request.execute(&self.store, &table)?;
                Ok(OutputFormatter::format_result(&result, &format))
            }

            Commands::Tables => self.list_tables(),
        }
    }

    /// List tables in the data directory
    pub fn list_tables(&self) -> FlatrestResult<String> {
        let tables = self.store.tables()?;

        if tables.is_empty() {
            return Ok(OutputFormatter::format_info(&format!(
                "No tables in {}",
                self.store.data_dir().display()
            )));
        }

        let mut output = String::new();
        output.push_str(&format!("{}\n", "Tables:".bold()));
        for table in &tables {
            let rows = self.store.load(table)?;
            let detail = if rows.is_corrupt() {
                "unreadable".red()
            } else {
                format!("{} rows", rows.into_rows().len()).dimmed()
            };
            output.push_str(&format!("  {} {} ({})\n", "•".green(), table.cyan(), detail));
        }

        Ok(output)
    }
}

/// Parse a CLI value as JSON, falling back to a plain string
fn parse_value_arg(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn parse_json_arg(raw: &str) -> FlatrestResult<Value> {
    serde_json::from_str(raw)
        .map_err(|e| FlatrestError::Configuration(format!("Invalid JSON argument: {}", e)))
}

/// `COLUMN.OPERATOR.VALUE`
fn parse_filter_arg(raw: &str) -> FlatrestResult<FilterSpec> {
    let mut parts = raw.splitn(3, '.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(column), Some(operator), Some(value)) if !column.is_empty() => {
            Ok(FilterSpec::new(operator, column, parse_value_arg(value)))
        }
        _ => Err(FlatrestError::Configuration(format!(
            "Filter must look like COLUMN.OPERATOR.VALUE, got '{}'",
            raw
        ))),
    }
}

fn parse_filter_args(args: &FilterArgs) -> FlatrestResult<Vec<FilterSpec>> {
    let mut specs = args
        .filters
        .iter()
        .map(|raw| parse_filter_arg(raw))
        .collect::<FlatrestResult<Vec<_>>>()?;

    specs.extend(
        args.or_groups
            .iter()
            .map(|group| FilterSpec::new("or", "", Value::String(group.clone()))),
    );
    Ok(specs)
}

/// `COLUMN`, `COLUMN.asc` or `COLUMN.desc`
fn parse_order_arg(raw: &str) -> OrderSpec {
    match raw.rsplit_once('.') {
        Some((column, "desc")) => OrderSpec {
            column: column.to_string(),
            desc: true,
        },
        Some((column, "asc")) => OrderSpec {
            column: column.to_string(),
            desc: false,
        },
        _ => OrderSpec {
            column: raw.to_string(),
            desc: false,
        },
    }
}

/// `START:END`
fn parse_range_arg(raw: &str) -> FlatrestResult<(usize, usize)> {
    let invalid = || FlatrestError::Configuration(format!("Range must look like START:END, got '{}'", raw));
    let (start, end) = raw.split_once(':').ok_or_else(invalid)?;
    let start = start.trim().parse().map_err(|_| invalid())?;
    let end = end.trim().parse().map_err(|_| invalid())?;
    Ok((start, end))
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Main entry point for CLI execution
pub fn run_cli() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.verbose);

    let runner = match CliRunner::new(&args) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("{}", OutputFormatter::format_error(&e));
            std::process::exit(1);
        }
    };

    match runner.run_command(args.command) {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", OutputFormatter::format_error(&e));
            std::process::exit(1);
        }
    }
}
