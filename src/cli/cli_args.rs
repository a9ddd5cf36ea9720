use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Flatrest CLI - query and mutate flat JSON tables
#[derive(Parser, Debug)]
#[command(name = "flatrest")]
#[command(about = "Embedded REST-style document query engine over flat JSON files")]
#[command(version = "0.1.0")]
pub struct CliArgs {
    /// Directory holding the table files (overrides the config file)
    #[arg(short, long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Store configuration file (JSON)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Select rows from a table
    Select {
        table: String,

        /// Column spec, e.g. "id, status, vendor_requests(vendor_name)"
        #[arg(long, default_value = "*")]
        columns: String,

        #[command(flatten)]
        filters: FilterArgs,

        /// Ordering key, repeatable: COLUMN or COLUMN.desc
        #[arg(long, value_name = "COLUMN[.desc]")]
        order: Vec<String>,

        #[arg(long)]
        limit: Option<usize>,

        /// Inclusive row range after ordering
        #[arg(long, value_name = "START:END")]
        range: Option<String>,

        /// Require exactly one row
        #[arg(long, conflicts_with = "maybe_single")]
        single: bool,

        /// Return the first row or null
        #[arg(long)]
        maybe_single: bool,

        /// Report the number of matching rows
        #[arg(long)]
        count: bool,

        /// Report only the count
        #[arg(long)]
        head: bool,

        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Insert one row (object) or many (array)
    Insert {
        table: String,
        #[arg(value_name = "JSON")]
        json: String,
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Insert rows, merging into existing rows with the same id
    Upsert {
        table: String,
        #[arg(value_name = "JSON")]
        json: String,
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Merge a JSON object into every matching row
    Update {
        table: String,
        #[arg(value_name = "JSON")]
        json: String,
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Delete matching rows
    Delete {
        table: String,
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Run a JSON query request against a table
    Request {
        table: String,
        #[arg(value_name = "JSON")]
        json: String,
        #[arg(long, default_value = "json")]
        format: OutputFormat,
    },

    /// List tables in the data directory
    Tables,
}

/// Row filters shared by select, update and delete
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Filter, repeatable: COLUMN.OPERATOR.VALUE (VALUE parsed as JSON when possible)
    #[arg(long = "filter", value_name = "COLUMN.OP.VALUE")]
    pub filters: Vec<String>,

    /// OR-group, repeatable: "col.eq.a,col.ilike.%b%"
    #[arg(long = "or", value_name = "GROUP")]
    pub or_groups: Vec<String>,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone)]
pub enum OutputFormat {
    /// Formatted table output
    Table,
    /// JSON output
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
