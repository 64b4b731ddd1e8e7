//! `revendor` — vendor third-party crate sources and enforce license policy.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Load the policy config ([`config::load_config`]).
//! 3. Run the vendoring pipeline ([`vendor::Vendorer`]): preconditions,
//!    `cargo update -p` + `cargo vendor` ([`cargo`]), config normalization
//!    ([`cargo_config`]), license scan ([`scanner`], [`license`]), VCS
//!    registration and size checks ([`vcs`]).
//! 4. Render the requested report ([`report`]).
//! 5. Exit `0` (vendored and registered) or `1` (any policy or
//!    configuration failure; the vendored tree is rolled back).

mod cargo;
mod cargo_config;
mod cli;
mod config;
mod license;
mod models;
mod report;
mod scanner;
mod vcs;
mod vendor;

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cargo::CargoTool;
use cli::{Cli, ReportFormat};
use config::load_config;
use models::ScanReport;
use vcs::GitRepo;
use vendor::{VendorError, VendorOptions, Vendorer};

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Resolve project root
    let root = cli.path.canonicalize().unwrap_or_else(|_| cli.path.clone());

    let config = load_config(&root, cli.policy.as_deref())?;
    let tool = CargoTool::locate(config.vendor.cargo.as_deref().map(Path::new))?;
    let vcs = GitRepo::new(&root);

    let options = VendorOptions {
        ignore_modified: cli.ignore_modified,
        allow_large_files: cli.allow_large_files,
    };
    let vendor_dir = root.join(&config.vendor.vendor_dir);

    match Vendorer::new(&root, &config, &tool, &vcs).run(&options) {
        Ok(report) => {
            render_report(&cli, &report, &vendor_dir)?;
            Ok(())
        }
        Err(VendorError::LicenseCheck(report)) => {
            render_report(&cli, &report, &vendor_dir)?;
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            std::process::exit(1);
        }
    }
}

fn render_report(cli: &Cli, report: &ScanReport, vendor_dir: &Path) -> Result<()> {
    match cli.report {
        ReportFormat::Terminal => {
            report::terminal::render(report, vendor_dir, cli.verbose, cli.quiet)
        }
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report.checks)?);
            Ok(())
        }
    }
}
