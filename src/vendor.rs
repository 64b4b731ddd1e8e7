use std::collections::BTreeSet;
use std::path::Path;

use thiserror::Error;

use crate::cargo::VendorTool;
use crate::cargo_config::{self, ConfigError};
use crate::config::Config;
use crate::models::ScanReport;
use crate::scanner;
use crate::vcs::{FileStatus, Vcs};

/// Hard per-file limit on newly added files. History has shown that
/// large-ish files typically are not needed at all.
const FILESIZE_LIMIT: u64 = 100 * 1024;

/// Cumulative added size beyond which the run warns. Big code drops happen
/// legitimately from time to time, so this one never fails the run.
const SIZE_WARN_THRESHOLD: u64 = 5 * 1024 * 1024;

const CARGO_LOCK_NOTICE: &str = "\
NOTE: `cargo vendor` may have made changes to your Cargo.lock. To restore
it to the HEAD version, run `git checkout -- Cargo.lock`.";

#[derive(Debug, Error)]
pub enum VendorError {
    #[error("uncommitted changes to {} file(s); commit, stash, or pass --ignore-modified", .0.len())]
    UncommittedChanges(Vec<String>),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("license check failed; the vendored tree was rolled back")]
    LicenseCheck(ScanReport),
    #[error("{} added file(s) exceed the {FILESIZE_LIMIT} byte limit; the vendored tree was rolled back", .0.len())]
    OversizedFiles(Vec<String>),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    External(#[from] anyhow::Error),
}

#[derive(Debug, Default)]
pub struct VendorOptions {
    /// Skip the uncommitted-modifications precondition.
    pub ignore_modified: bool,
    /// Accept added files above [`FILESIZE_LIMIT`].
    pub allow_large_files: bool,
}

/// Sequences one vendoring run:
///
/// preconditions → `cargo update -p <root>` → `cargo vendor` → normalize
/// and write `.cargo/config.in` → license scan → register with the VCS and
/// check sizes.
///
/// Any failure after the vendored tree exists triggers a compensating
/// rollback (clean the vendor directory, revert any registration) so no
/// partial vendoring state is ever left behind. Compensation assumes a
/// single operator; it is not atomic against concurrent mutation of the
/// same tree.
pub struct Vendorer<'a> {
    topsrcdir: &'a Path,
    config: &'a Config,
    tool: &'a dyn VendorTool,
    vcs: &'a dyn Vcs,
}

impl<'a> Vendorer<'a> {
    pub fn new(
        topsrcdir: &'a Path,
        config: &'a Config,
        tool: &'a dyn VendorTool,
        vcs: &'a dyn Vcs,
    ) -> Self {
        Vendorer { topsrcdir, config, tool, vcs }
    }

    pub fn run(&self, options: &VendorOptions) -> Result<ScanReport, VendorError> {
        if !options.ignore_modified {
            self.check_modified_files()?;
        }
        self.tool.ensure_supported()?;

        let vendor_dir = self.topsrcdir.join(&self.config.vendor.vendor_dir);

        // Refresh the root package's lock entry before vendoring; going
        // through a plain `cargo vendor` alone regenerates Cargo.lock with
        // far more churn.
        self.tool.update_package(self.topsrcdir, &self.config.vendor.root_package)?;
        let raw = self.tool.vendor(self.topsrcdir, &vendor_dir)?;

        let rendered = cargo_config::generate(&raw, self.topsrcdir)?;
        let config_path = self.topsrcdir.join(".cargo").join("config.in");
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&config_path, rendered)?;
        tracing::info!(path = %config_path.display(), "wrote vendoring configuration");

        let report = scanner::scan_vendor_tree(&self.config.policy, &vendor_dir)?;
        if !report.ok() {
            tracing::error!(
                "the vendored changes will NOT be added to version control\n{}",
                CARGO_LOCK_NOTICE
            );
            self.vcs.clean_directory(&vendor_dir)?;
            return Err(VendorError::LicenseCheck(report));
        }

        self.vcs.add_remove_files(&vendor_dir)?;

        let mut large_files = BTreeSet::new();
        let mut cumulative_added_size = 0u64;
        for file in self.vcs.get_changed_files(FileStatus::Added)? {
            let size = std::fs::metadata(self.topsrcdir.join(&file))?.len();
            cumulative_added_size += size;
            if size > FILESIZE_LIMIT {
                large_files.insert(file);
            }
        }

        if !large_files.is_empty() && !options.allow_large_files {
            let files: Vec<String> = large_files.into_iter().collect();
            tracing::error!(
                limit = FILESIZE_LIMIT,
                "the following files exceed the file size limit:\n{}\n\n\
                 If their size cannot be reduced, re-run with --allow-large-files.\n\
                 The vendored changes will NOT be added to version control\n{}",
                files.join("\n"),
                CARGO_LOCK_NOTICE
            );
            self.vcs.forget_add_remove_files(&vendor_dir)?;
            self.vcs.clean_directory(&vendor_dir)?;
            return Err(VendorError::OversizedFiles(files));
        }

        if cumulative_added_size >= SIZE_WARN_THRESHOLD {
            tracing::warn!(
                bytes = cumulative_added_size,
                "the vendored changes add a large amount of data; check the \
                 vendored packages for unusually large test or benchmark files \
                 that do not need to be published and get them excluded upstream"
            );
        }

        Ok(report)
    }

    /// The run mutates the working copy, so it must start from a clean one.
    /// Changes to `Cargo.toml`/`Cargo.lock` are expected (bumping a
    /// dependency is the usual reason to vendor) and stay allowed.
    fn check_modified_files(&self) -> Result<(), VendorError> {
        let mut modified: Vec<String> = self
            .vcs
            .get_changed_files(FileStatus::Modified)?
            .into_iter()
            .filter(|file| {
                !matches!(
                    Path::new(file).file_name().and_then(|n| n.to_str()),
                    Some("Cargo.toml") | Some("Cargo.lock")
                )
            })
            .collect();
        if modified.is_empty() {
            return Ok(());
        }
        modified.sort();
        tracing::error!(
            "you have uncommitted changes to the following files:\n{}\n\n\
             Commit or stash them before vendoring, or re-run with --ignore-modified.",
            modified.join("\n")
        );
        Err(VendorError::UncommittedChanges(modified))
    }
}
