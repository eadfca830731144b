use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

/// Popular pages report generator
///
/// Reads the assessed pages of one WikiProject, sums the monthly views of each
/// page and its redirects, and writes the most viewed pages as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// JSON Lines file of page rows, one row per target/redirect pair
    #[arg(long)]
    pub rows: PathBuf,

    /// On-wiki project config, as JSON
    #[arg(long)]
    pub project_config: PathBuf,

    /// Project page the report is for, e.g. "Wikipedia:WikiProject Medicine"
    #[arg(long)]
    pub project: String,

    /// Wiki to query pageviews for
    #[arg(long, default_value = "en.wikipedia")]
    pub wiki: String,

    /// First day of the report; defaults to the start of last month
    #[arg(long, requires = "end")]
    pub start: Option<NaiveDate>,

    /// Last day of the report; defaults to the end of last month
    #[arg(long, requires = "start")]
    pub end: Option<NaiveDate>,

    /// Where to write the report; stdout when unset
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Log formatter to use
    #[arg(long, value_enum, default_value_t = default_tracing_format())]
    pub tracing: TracingFormat,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingFormat {
    /// Use pretty formatter (default in debug mode)
    Pretty,
    /// Use JSON formatter (default in release mode)
    Json,
}

fn default_tracing_format() -> TracingFormat {
    if cfg!(debug_assertions) {
        TracingFormat::Pretty
    } else {
        TracingFormat::Json
    }
}
