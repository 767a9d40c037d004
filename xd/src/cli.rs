//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::debug;

use crate::domain::ExportKind;
use crate::filters::ExportFilters;

/// exportdesk - export job tracker
#[derive(Parser)]
#[command(
    name = "xd",
    about = "Create, watch and download data exports",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Backend base URL (overrides config)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start an export and follow it until it finishes
    Export {
        /// Export kind (hotel, mapping)
        #[arg(value_name = "KIND")]
        kind: ExportKind,

        #[command(flatten)]
        filters: FilterArgs,

        /// Return as soon as the export is accepted
        #[arg(long)]
        no_wait: bool,

        /// Download the file once the export completes
        #[arg(short, long)]
        download: bool,
    },

    /// Show the server status of an export
    Status {
        /// Export ID
        id: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Download a completed export
    Download {
        /// Export ID
        id: String,

        /// Directory to write into (defaults to config download-dir)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config,
}

/// Filter flags shared by export commands
#[derive(Debug, Clone, Default, clap::Args)]
pub struct FilterArgs {
    /// Supplier to include (repeatable)
    #[arg(short, long = "supplier")]
    pub suppliers: Vec<String>,

    /// Country code to include (repeatable)
    #[arg(long = "country")]
    pub countries: Vec<String>,

    /// City to include (repeatable)
    #[arg(long = "city")]
    pub cities: Vec<String>,

    #[arg(long)]
    pub min_rating: Option<f32>,

    #[arg(long)]
    pub max_rating: Option<f32>,

    /// Only records updated on or after this date (YYYY-MM-DD)
    #[arg(long = "from")]
    pub updated_from: Option<NaiveDate>,

    /// Only records updated on or before this date (YYYY-MM-DD)
    #[arg(long = "to")]
    pub updated_to: Option<NaiveDate>,

    #[arg(long)]
    pub include_inactive: bool,

    /// Raw JSON filter payload; flags override its fields
    #[arg(long = "filters", value_name = "JSON")]
    pub raw: Option<String>,
}

impl FilterArgs {
    /// Combine the raw payload and individual flags
    pub fn to_filters(&self) -> Result<ExportFilters, crate::filters::FilterError> {
        debug!(?self, "FilterArgs::to_filters: called");
        let base = match &self.raw {
            Some(raw) => ExportFilters::from_json(raw)?,
            None => ExportFilters::default(),
        };
        Ok(base.merge(ExportFilters {
            suppliers: self.suppliers.clone(),
            countries: self.countries.clone(),
            cities: self.cities.clone(),
            min_rating: self.min_rating,
            max_rating: self.max_rating,
            updated_from: self.updated_from,
            updated_to: self.updated_to,
            include_inactive: self.include_inactive,
        }))
    }
}

/// Output format for status commands
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use text or json", s)),
        }
    }
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("exportdesk")
        .join("logs")
        .join("exportdesk.log")
}
