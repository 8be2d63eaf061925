use crate::error::CollectorError;
use crate::types::{CollectionKind, CsvVersion, NamespaceAssignment, TimeWindow};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "must-gather-collector")]
#[command(about = "Run oc adm must-gather into per-test output directories")]
pub struct Cli {
    /// Config file (YAML); defaults to ./must-gather.yaml if present
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Base directory for collected data
    #[arg(long, global = true, env = "MUST_GATHER_BASE_DIR")]
    pub base_dir: Option<PathBuf>,

    /// Tests root, as configured for the test runner
    #[arg(long, global = true, env = "MUST_GATHER_TEST_ROOT")]
    pub test_root: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the output directory for a test and print its path
    PrepareDir {
        /// Test source file
        #[arg(long)]
        source: PathBuf,

        #[arg(long)]
        test_name: String,

        /// Enclosing test class, if any
        #[arg(long)]
        class: Option<String>,
    },

    /// Collect must-gather data and print the resulting directory
    Collect {
        #[arg(value_enum)]
        kind: CollectionKind,

        /// Destination; defaults to the test's directory or the base directory
        #[arg(long)]
        target_dir: Option<PathBuf>,

        /// Test source file, to collect into the test's own directory
        #[arg(long, requires = "test_name", conflicts_with = "target_dir")]
        source: Option<PathBuf>,

        #[arg(long, requires = "source")]
        test_name: Option<String>,

        #[arg(long, requires = "source")]
        class: Option<String>,

        /// Time window: seconds for rhoai (60), a duration for ocp (5m, 1h30m)
        #[arg(long)]
        since: Option<String>,

        /// Collect everything since this RFC 3339 timestamp
        #[arg(long, conflicts_with = "since")]
        since_start: Option<DateTime<Utc>>,

        /// Do not write output.log
        #[arg(long)]
        no_save_output: bool,

        /// Installed product version (major.minor); skips the cluster lookup
        #[arg(long)]
        csv_version: Option<CsvVersion>,

        /// Kubeconfig context used to look up the installed version
        #[arg(long)]
        context: Option<String>,
    },

    /// Run an arbitrary must-gather request
    Gather {
        #[arg(long)]
        image: Option<String>,

        #[arg(long)]
        dest_dir: Option<PathBuf>,

        #[arg(long)]
        since: Option<TimeWindow>,

        /// Component passed to the gather script
        #[arg(long, conflicts_with = "namespaces")]
        component: Option<String>,

        /// Namespace assignment, e.g. operator=redhat-ods-operator,auth=auth-ns
        #[arg(long)]
        namespaces: Option<NamespaceAssignment>,

        /// Print the command instead of running it
        #[arg(long)]
        dry_run: bool,
    },
}

/// `rhoai` takes bare numbers as seconds; `ocp` passes the window through.
pub fn parse_since(kind: CollectionKind, value: &str) -> Result<TimeWindow, CollectorError> {
    let value = value.trim();
    if kind == CollectionKind::Rhoai
        && !value.is_empty()
        && value.chars().all(|c| c.is_ascii_digit())
    {
        let secs = value
            .parse::<u64>()
            .map_err(|e| CollectorError::InvalidArgument(format!("bad seconds '{}': {}", value, e)))?;
        return Ok(TimeWindow::from_secs(secs));
    }
    value.parse()
}
