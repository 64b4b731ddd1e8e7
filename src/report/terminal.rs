use std::path::Path;

use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::models::{PackageCheck, ScanReport};

/// Render a colored terminal report of the license scan.
pub fn render(report: &ScanReport, vendor_dir: &Path, verbose: bool, quiet: bool) -> Result<()> {
    let total = report.checks.len();
    let rejected_count = report.rejected().count();
    let accepted_count = total - rejected_count;

    if quiet {
        println!(
            "Packages: {}  Accepted: {}  Rejected: {}",
            total,
            accepted_count.to_string().green(),
            rejected_count.to_string().red(),
        );
        return Ok(());
    }

    println!("\n {} v{}", "revendor".bold(), env!("CARGO_PKG_VERSION"));
    println!(" Vendored tree: {}\n", vendor_dir.display());
    println!(
        " {} packages checked: {} accepted, {} rejected\n",
        total,
        accepted_count.to_string().green(),
        rejected_count.to_string().red(),
    );

    if rejected_count > 0 {
        println!(" {} Packages blocking the vendor run:\n", "[ERROR]".red().bold());
        render_table(report.rejected());
        println!();
    }

    if verbose && accepted_count > 0 {
        println!(" {} Accepted packages:\n", "[OK]".green().bold());
        render_table(report.checks.iter().filter(|c| c.accepted()));
        println!();
    }

    Ok(())
}

fn render_table<'a>(checks: impl Iterator<Item = &'a PackageCheck>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Package").add_attribute(Attribute::Bold),
            Cell::new("License").add_attribute(Attribute::Bold),
            Cell::new("Decision").add_attribute(Attribute::Bold),
        ]);

    for check in checks {
        let license = check
            .license
            .as_deref()
            .or(check.license_file.as_deref())
            .unwrap_or("(none)");

        let (decision, color) = match &check.decision {
            crate::models::Decision::Accept => ("✓ accepted".to_string(), Color::Green),
            crate::models::Decision::Reject(reason) => (format!("✗ {reason}"), Color::Red),
        };

        table.add_row(vec![
            Cell::new(&check.name),
            Cell::new(license),
            Cell::new(decision).fg(color),
        ]);
    }

    println!("{}", table);
}
