use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use serde::Deserialize;

/// Root configuration, deserialized from `.revendor/policy.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Vendoring parameters.
    pub vendor: VendorSettings,
    /// License policy tables.
    pub policy: Policy,
}

/// Where and how to vendor.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VendorSettings {
    /// Directory receiving the vendored sources, relative to the project root.
    pub vendor_dir: String,
    /// Package whose lock entry is refreshed (`cargo update -p <name>`)
    /// before vendoring, to keep incidental Cargo.lock churn minimal.
    /// Set this to your workspace's root crate.
    pub root_package: String,
    /// Path to the cargo binary. Falls back to `$CARGO`, then `$PATH`.
    pub cargo: Option<String>,
}

impl Default for VendorSettings {
    fn default() -> Self {
        VendorSettings {
            vendor_dir: "third_party/rust".to_string(),
            root_package: "app".to_string(),
            cargo: None,
        }
    }
}

/// The hand-curated license policy.
///
/// Acceptable identifiers come from <https://spdx.org/licenses/>. Additions
/// to any of these tables must be checked by somebody competent to review
/// licensing minutiae, not merely by a build peer.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Licenses acceptable unconditionally for code used at runtime.
    pub runtime_licenses: Vec<String>,
    /// Licenses acceptable for code only used at build time (e.g. code
    /// generators), keyed by license; the value lists the packages allowed
    /// to use that license as build-time-only dependencies.
    pub buildtime_licenses: HashMap<String, Vec<String>>,
    /// Packages accepted at runtime under a license that is not generally
    /// whitelisted, keyed by license. Used for licenses (BSD-2-Clause,
    /// BSD-3-Clause) whose users must also be recorded in the product's
    /// license attribution page.
    pub runtime_package_exceptions: HashMap<String, Vec<String>>,
    /// Packages that ship a `license-file` instead of a license expression,
    /// mapped to the SHA-256 hex digest of the file contents that were
    /// reviewed. Any content change invalidates the review.
    pub license_file_pins: HashMap<String, String>,
}

impl Default for Policy {
    fn default() -> Self {
        let runtime_licenses = [
            "Apache-2.0",
            "Apache-2.0 WITH LLVM-exception",
            "CC0-1.0",
            "ISC",
            "MIT",
            "MPL-2.0",
            "Unlicense",
            "Zlib",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let mut buildtime_licenses = HashMap::new();
        buildtime_licenses.insert(
            "BSD-3-Clause".to_string(),
            ["bindgen", "fuchsia-zircon", "fuchsia-zircon-sys", "fuchsia-cprng", "glsl"]
                .into_iter()
                .map(String::from)
                .collect(),
        );

        let mut runtime_package_exceptions = HashMap::new();
        runtime_package_exceptions.insert(
            "BSD-2-Clause".to_string(),
            ["arrayref", "cloudabi", "Inflector", "mach"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        runtime_package_exceptions.insert("BSD-3-Clause".to_string(), Vec::new());

        let mut license_file_pins = HashMap::new();
        // MIT
        license_file_pins.insert(
            "deque".to_string(),
            "6485b8ed310d3f0340bf1ad1f47645069ce4069dcc6bb46c7d5c6faf41de1fdb".to_string(),
        );
        // Not built into the final product, but ships a license-file that
        // still needs pinning.
        license_file_pins.insert(
            "fuchsia-cprng".to_string(),
            "03b114f53e6587a398931762ee11e2395bfdba252a329940e2c8c9e81813845b".to_string(),
        );

        Policy {
            runtime_licenses,
            buildtime_licenses,
            runtime_package_exceptions,
            license_file_pins,
        }
    }
}

impl Policy {
    pub fn is_runtime_license(&self, license: &str) -> bool {
        self.runtime_licenses.iter().any(|l| l == license)
    }

    pub fn is_runtime_exception(&self, license: &str, package: &str) -> bool {
        self.runtime_package_exceptions
            .get(license)
            .map(|packages| packages.iter().any(|p| p == package))
            .unwrap_or(false)
    }
}

/// Load the configuration, searching in order:
///
/// 1. `config_override` — path passed via `--policy`
/// 2. `<project_root>/.revendor/policy.toml`
/// 3. `~/.config/revendor/policy.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(project_root: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        let content = std::fs::read_to_string(path)?;
        return Ok(toml::from_str(&content)?);
    }

    let project_config = project_root.join(".revendor").join("policy.toml");
    if project_config.exists() {
        let content = std::fs::read_to_string(&project_config)?;
        return Ok(toml::from_str(&content)?);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".config").join("revendor").join("policy.toml");
        if home_config.exists() {
            let content = std::fs::read_to_string(&home_config)?;
            return Ok(toml::from_str(&content)?);
        }
    }

    Ok(Config::default())
}
