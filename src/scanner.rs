use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::Policy;
use crate::license::classifier;
use crate::models::{Decision, PackageCheck, RejectReason, ScanReport};

/// Check the license of every package under `vendor_dir`.
///
/// Each immediate subdirectory is one vendored package. All packages are
/// checked even after a failure is found, so a single invocation reports
/// every violation instead of discovering them one slow vendoring run at a
/// time. The report passes only if every package does.
pub fn scan_vendor_tree(policy: &Policy, vendor_dir: &Path) -> Result<ScanReport> {
    let mut packages = Vec::new();
    for entry in std::fs::read_dir(vendor_dir)
        .with_context(|| format!("reading vendor directory {}", vendor_dir.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            packages.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    // Deterministic report order.
    packages.sort();

    let mut report = ScanReport::default();
    for package in packages {
        report.checks.push(check_package(policy, vendor_dir, &package)?);
    }
    Ok(report)
}

/// Scan one package's manifest and classify its license declaration.
///
/// The manifest is not parsed as TOML: manifests in the wild contain
/// sections (e.g. `[target.'cfg(...)'.dependencies]`) that have tripped up
/// strict parsers before, and license declarations are always simple
/// `key = "value"` scalar lines. A narrow line match over lines starting
/// with `license` is all the proof this check needs.
fn check_package(policy: &Policy, vendor_dir: &Path, package: &str) -> Result<PackageCheck> {
    tracing::debug!(package, "checking license");

    let package_dir = vendor_dir.join(package);
    let manifest = package_dir.join("Cargo.toml");
    let contents = std::fs::read_to_string(&manifest)
        .with_context(|| format!("reading manifest {}", manifest.display()))?;

    let license_re = Regex::new(r#"^\s*license\s*=\s*"([^"]+)""#)?;
    let license_file_re = Regex::new(r#"^\s*license[-_]file\s*=\s*"([^"]+)""#)?;

    let license_lines: Vec<&str> = contents
        .lines()
        .filter(|l| l.trim_start().starts_with("license"))
        .collect();
    let licenses: Vec<String> = license_lines
        .iter()
        .filter_map(|l| license_re.captures(l))
        .map(|c| c[1].to_string())
        .collect();
    let license_files: Vec<String> = license_lines
        .iter()
        .filter_map(|l| license_file_re.captures(l))
        .map(|c| c[1].to_string())
        .collect();

    let mut check = PackageCheck {
        name: package.to_string(),
        manifest,
        license: licenses.first().cloned(),
        license_file: license_files.first().cloned(),
        decision: Decision::Accept,
    };

    // License information is optional for crates to provide, but this tree
    // requires it.
    if licenses.is_empty() && license_files.is_empty() {
        tracing::error!(package, "package does not provide a license");
        check.decision = Decision::Reject(RejectReason::NoLicense);
        return Ok(check);
    }

    // Crates should declare either `license` or `license-file`, never both
    // and never more than one of each.
    if licenses.len() > 1 || license_files.len() > 1 || (!licenses.is_empty() && !license_files.is_empty()) {
        tracing::error!(package, "package provides too many licenses");
        check.decision = Decision::Reject(RejectReason::TooManyLicenses);
        return Ok(check);
    }

    check.decision = if let Some(license) = &check.license {
        classifier::classify_expression(policy, package, license)?
    } else if let Some(license_file) = &check.license_file {
        classifier::classify_license_file(policy, package, &package_dir, license_file)?
    } else {
        unreachable!("structural checks above guarantee one declaration")
    };

    if let Decision::Reject(reason) = &check.decision {
        tracing::error!(package, %reason, "license check failed");
    }
    Ok(check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn write_package(vendor_dir: &Path, name: &str, manifest: &str) -> PathBuf {
        let dir = vendor_dir.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Cargo.toml"), manifest).unwrap();
        dir
    }

    #[test]
    fn test_clean_tree_passes() {
        let tmp = tempfile::tempdir().unwrap();
        write_package(tmp.path(), "a", "[package]\nname = \"a\"\nlicense = \"MIT\"\n");
        write_package(
            tmp.path(),
            "b",
            "[package]\nname = \"b\"\nlicense = \"MPL-2.0 OR Apache-2.0\"\n",
        );

        let report = scan_vendor_tree(&Policy::default(), tmp.path()).unwrap();
        assert!(report.ok());
        assert_eq!(report.checks.len(), 2);
    }

    #[test]
    fn test_single_bad_package_fails_whole_scan_but_all_are_checked() {
        let tmp = tempfile::tempdir().unwrap();
        write_package(tmp.path(), "a", "[package]\nlicense = \"MIT\"\n");
        write_package(tmp.path(), "d", "[package]\nlicense = \"GPL-3.0\"\n");
        write_package(tmp.path(), "z", "[package]\nlicense = \"ISC\"\n");

        let report = scan_vendor_tree(&Policy::default(), tmp.path()).unwrap();
        assert!(!report.ok());
        // Scanning continued past the failure.
        assert_eq!(report.checks.len(), 3);
        let rejected: Vec<_> = report.rejected().map(|c| c.name.as_str()).collect();
        assert_eq!(rejected, vec!["d"]);
    }

    #[test]
    fn test_no_license_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        write_package(tmp.path(), "bare", "[package]\nname = \"bare\"\nversion = \"0.1.0\"\n");

        let report = scan_vendor_tree(&Policy::default(), tmp.path()).unwrap();
        assert_eq!(report.checks[0].decision, Decision::Reject(RejectReason::NoLicense));
    }

    #[test]
    fn test_both_declarations_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        write_package(
            tmp.path(),
            "greedy",
            "[package]\nlicense = \"MIT\"\nlicense-file = \"LICENSE\"\n",
        );

        let report = scan_vendor_tree(&Policy::default(), tmp.path()).unwrap();
        assert_eq!(
            report.checks[0].decision,
            Decision::Reject(RejectReason::TooManyLicenses)
        );
    }

    #[test]
    fn test_duplicate_license_lines_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        write_package(
            tmp.path(),
            "twice",
            "[package]\nlicense = \"MIT\"\nlicense = \"ISC\"\n",
        );

        let report = scan_vendor_tree(&Policy::default(), tmp.path()).unwrap();
        assert_eq!(
            report.checks[0].decision,
            Decision::Reject(RejectReason::TooManyLicenses)
        );
    }

    #[test]
    fn test_line_scan_tolerates_unparseable_manifest_sections() {
        let tmp = tempfile::tempdir().unwrap();
        write_package(
            tmp.path(),
            "cfgdep",
            concat!(
                "[package]\n",
                "name = \"cfgdep\"\n",
                "license = \"MIT\"\n",
                "\n",
                "[target.'cfg(all(unix, not(target_os = \"macos\")))'.dependencies]\n",
                "libc = \"0.2\"\n",
            ),
        );

        let report = scan_vendor_tree(&Policy::default(), tmp.path()).unwrap();
        assert!(report.ok());
        assert_eq!(report.checks[0].license.as_deref(), Some("MIT"));
    }

    #[test]
    fn test_license_file_pin_is_enforced() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = write_package(
            tmp.path(),
            "pinned",
            "[package]\nname = \"pinned\"\nlicense-file = \"LICENSE\"\n",
        );
        fs::write(dir.join("LICENSE"), "reviewed text").unwrap();

        let mut policy = Policy::default();
        policy.license_file_pins.insert(
            "pinned".to_string(),
            // sha256 of "reviewed text"
            sha256_of(b"reviewed text"),
        );

        let report = scan_vendor_tree(&policy, tmp.path()).unwrap();
        assert!(report.ok());
    }

    #[test]
    fn test_loose_files_in_vendor_dir_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        write_package(tmp.path(), "a", "[package]\nlicense = \"MIT\"\n");
        fs::write(tmp.path().join(".cargo-checksum.json"), "{}").unwrap();

        let report = scan_vendor_tree(&Policy::default(), tmp.path()).unwrap();
        assert_eq!(report.checks.len(), 1);
    }

    fn sha256_of(bytes: &[u8]) -> String {
        use sha2::{Digest, Sha256};
        Sha256::digest(bytes).iter().map(|b| format!("{b:02x}")).collect()
    }
}
