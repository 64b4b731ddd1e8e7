use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, bail, Result};

/// `cargo vendor` shipped with cargo 1.37.
const MIN_VERSION: (u32, u32) = (1, 37);

/// The external vendoring tool. Everything the pipeline needs from cargo
/// goes through this trait so the orchestrator can be exercised without
/// spawning real processes.
pub trait VendorTool {
    /// Fail if the tool is missing or too old to vendor.
    fn ensure_supported(&self) -> Result<()>;
    /// Refresh a single package's lock entry (`cargo update -p <package>`).
    fn update_package(&self, root: &Path, package: &str) -> Result<()>;
    /// Vendor into `vendor_dir` and return the raw configuration snippet
    /// printed on stdout.
    fn vendor(&self, root: &Path, vendor_dir: &Path) -> Result<String>;
}

/// A cargo binary on disk.
pub struct CargoTool {
    path: PathBuf,
}

impl CargoTool {
    /// Locate cargo: explicit configuration first, then the `CARGO`
    /// environment variable, then a `PATH` search.
    pub fn locate(configured: Option<&Path>) -> Result<Self> {
        if let Some(path) = configured {
            return Ok(CargoTool { path: path.to_path_buf() });
        }
        if let Some(path) = std::env::var_os("CARGO") {
            return Ok(CargoTool { path: path.into() });
        }
        let path = search_path("cargo")
            .ok_or_else(|| anyhow!("could not find 'cargo' on your $PATH"))?;
        Ok(CargoTool { path })
    }
}

impl VendorTool for CargoTool {
    fn ensure_supported(&self) -> Result<()> {
        let output = Command::new(&self.path).arg("--version").output()?;
        if !output.status.success() {
            bail!("{} --version failed", self.path.display());
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let first_line = stdout.lines().next().unwrap_or_default();
        match parse_version(first_line) {
            Some(version) if version >= MIN_VERSION => {
                tracing::debug!(version = first_line, "cargo is new enough");
                Ok(())
            }
            Some(_) => bail!(
                "cargo >= {}.{} required (install Rust {}.{} or newer)",
                MIN_VERSION.0,
                MIN_VERSION.1,
                MIN_VERSION.0,
                MIN_VERSION.1
            ),
            None => bail!("could not parse cargo version from {:?}", first_line),
        }
    }

    fn update_package(&self, root: &Path, package: &str) -> Result<()> {
        // Inherit stdio so cargo's own error output reaches the user.
        let status = Command::new(&self.path)
            .args(["update", "-p", package])
            .current_dir(root)
            .status()?;
        if !status.success() {
            bail!("cargo update -p {} failed", package);
        }
        Ok(())
    }

    fn vendor(&self, root: &Path, vendor_dir: &Path) -> Result<String> {
        let output = Command::new(&self.path)
            .arg("vendor")
            .arg(vendor_dir)
            .current_dir(root)
            .output()?;
        if !output.status.success() {
            bail!(
                "cargo vendor failed:\n{}",
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn search_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Parse `(major, minor)` out of a `cargo --version` first line, e.g.
/// `cargo 1.78.0 (54d8815d0 2024-03-26)`.
fn parse_version(line: &str) -> Option<(u32, u32)> {
    let mut words = line.split_whitespace();
    if words.next()? != "cargo" {
        return None;
    }
    let mut parts = words.next()?.split(|c: char| !c.is_ascii_digit());
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("cargo 1.78.0 (54d8815d0 2024-03-26)"), Some((1, 78)));
        assert_eq!(parse_version("cargo 1.37.0"), Some((1, 37)));
        assert_eq!(parse_version("cargo 1.80.0-nightly (abc 2024-05-01)"), Some((1, 80)));
        assert_eq!(parse_version("rustc 1.78.0"), None);
        assert_eq!(parse_version(""), None);
    }

    #[test]
    fn test_version_gate() {
        assert!(parse_version("cargo 1.36.0").unwrap() < MIN_VERSION);
        assert!(parse_version("cargo 1.37.0").unwrap() >= MIN_VERSION);
        assert!(parse_version("cargo 2.0.0").unwrap() >= MIN_VERSION);
    }
}
