use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Result};

/// Change states the pipeline cares about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileStatus {
    /// Tracked file with uncommitted modifications.
    Modified,
    /// File newly registered for addition.
    Added,
}

/// The version-control operations the vendoring pipeline relies on. The
/// pipeline never talks to a VCS directly; rollback and registration go
/// through this interface so tests can substitute a recording fake.
pub trait Vcs {
    /// Paths (relative to the repository root) currently in `status`.
    fn get_changed_files(&self, status: FileStatus) -> Result<Vec<String>>;
    /// Register additions and removals under `dir`.
    fn add_remove_files(&self, dir: &Path) -> Result<()>;
    /// Undo a prior [`Vcs::add_remove_files`] for `dir`.
    fn forget_add_remove_files(&self, dir: &Path) -> Result<()>;
    /// Restore `dir` to its committed state, deleting untracked files.
    fn clean_directory(&self, dir: &Path) -> Result<()>;
}

/// Git-backed implementation, shelling out to the `git` binary.
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    pub fn new(root: &Path) -> Self {
        GitRepo { root: root.to_path_buf() }
    }

    fn git(&self, args: &[&str]) -> Result<std::process::Output> {
        let output = Command::new("git").args(args).current_dir(&self.root).output()?;
        if !output.status.success() {
            bail!(
                "git {} failed:\n{}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(output)
    }
}

impl Vcs for GitRepo {
    fn get_changed_files(&self, status: FileStatus) -> Result<Vec<String>> {
        let output = self.git(&["status", "--porcelain"])?;
        Ok(parse_porcelain(status, &String::from_utf8_lossy(&output.stdout)))
    }

    fn add_remove_files(&self, dir: &Path) -> Result<()> {
        self.git(&["add", "--all", &dir.to_string_lossy()])?;
        Ok(())
    }

    fn forget_add_remove_files(&self, dir: &Path) -> Result<()> {
        self.git(&["reset", "-q", "--", &dir.to_string_lossy()])?;
        Ok(())
    }

    fn clean_directory(&self, dir: &Path) -> Result<()> {
        self.git(&["clean", "-qdfx", "--", &dir.to_string_lossy()])?;
        // Restoring tracked files fails when nothing under `dir` is
        // tracked yet; that leaves nothing to restore, so it is not an
        // error for the rollback.
        let output = Command::new("git")
            .args(["checkout", "-q", "--"])
            .arg(dir)
            .current_dir(&self.root)
            .output()?;
        if !output.status.success() {
            tracing::debug!(
                dir = %dir.display(),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "git checkout during clean had nothing to restore"
            );
        }
        Ok(())
    }
}

/// Extract paths in `status` from `git status --porcelain` output.
fn parse_porcelain(status: FileStatus, porcelain: &str) -> Vec<String> {
    let wanted = match status {
        FileStatus::Modified => 'M',
        FileStatus::Added => 'A',
    };
    porcelain
        .lines()
        .filter_map(|line| {
            let (code, path) = line.split_at_checked(3)?;
            let mut flags = code.chars();
            let index = flags.next()?;
            let worktree = flags.next()?;
            (index == wanted || worktree == wanted).then(|| path.to_string())
        })
        .collect()
}
