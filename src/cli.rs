use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "revendor",
    about = "Vendor third-party crate sources into the tree and enforce license and size policy",
    version
)]
pub struct Cli {
    /// Project root to vendor into
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Proceed even with uncommitted changes in the working copy
    #[arg(long)]
    pub ignore_modified: bool,

    /// Accept added files above the per-file size limit
    #[arg(long)]
    pub allow_large_files: bool,

    /// Policy config file [default: ./.revendor/policy.toml, fallback ~/.config/revendor/policy.toml]
    #[arg(long)]
    pub policy: Option<PathBuf>,

    /// Report format
    #[arg(long, default_value = "terminal", value_name = "FORMAT")]
    pub report: ReportFormat,

    /// Show all packages in the report (not just rejections)
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print the summary line
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}
