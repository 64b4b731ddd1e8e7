use std::path::Path;

use anyhow::Result;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::config::Policy;
use crate::models::{Decision, RejectReason};

/// Whether `license` is acceptable for runtime code in `package`.
///
/// Cargo describes the `license` field as an SPDX expression, with multiple
/// licenses historically separated by `/` and more recently by `OR`/`AND`
/// operators. There is no meaningful way to AND licenses under this policy,
/// so any conjunctive expression is refused outright. `/` and `OR` are
/// treated as equivalent disjunction: the package is acceptable if any
/// disjunct is.
pub fn runtime_license(policy: &Policy, package: &str, license: &str) -> Result<bool> {
    if Regex::new(r"\s+AND")?.is_match(license) {
        return Ok(false);
    }

    let separators = Regex::new(r"\s*/\s*|\s+OR\s+")?;
    for id in separators.split(license) {
        if policy.is_runtime_license(id) {
            return Ok(true);
        }
        if policy.is_runtime_exception(id, package) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Classify a package's declared `license = "..."` expression.
pub fn classify_expression(policy: &Policy, package: &str, license: &str) -> Result<Decision> {
    tracing::debug!(package, license, "has license");

    if Regex::new(r"\s+AND")?.is_match(license) {
        return Ok(Decision::Reject(RejectReason::ConjunctiveLicense {
            license: license.to_string(),
        }));
    }

    if runtime_license(policy, package, license)? {
        return Ok(Decision::Accept);
    }

    // Not acceptable at runtime. It may still be acceptable for a
    // build-time-only dependency, but only for packages explicitly
    // whitelisted under that license.
    match policy.buildtime_licenses.get(license) {
        None => Ok(Decision::Reject(RejectReason::UnapprovedLicense {
            license: license.to_string(),
        })),
        Some(packages) if !packages.iter().any(|p| p == package) => {
            Ok(Decision::Reject(RejectReason::NotBuildTimePackage {
                license: license.to_string(),
            }))
        }
        Some(_) => Ok(Decision::Accept),
    }
}

/// Classify a package's declared `license-file = "..."` reference.
///
/// A license file is only acceptable once its contents have been reviewed
/// and pinned; the live digest must match the pin exactly. Anything else
/// goes back to manual review.
pub fn classify_license_file(
    policy: &Policy,
    package: &str,
    package_dir: &Path,
    license_file: &str,
) -> Result<Decision> {
    tracing::debug!(package, license_file, "has license-file");

    let Some(pinned) = policy.license_file_pins.get(package) else {
        return Ok(Decision::Reject(RejectReason::UnpinnedLicenseFile {
            license_file: license_file.to_string(),
        }));
    };

    let contents = std::fs::read(package_dir.join(license_file))?;
    let digest = sha256_hex(&contents);
    if digest != *pinned {
        return Ok(Decision::Reject(RejectReason::LicenseFileMismatch {
            license_file: license_file.to_string(),
            digest,
        }));
    }
    Ok(Decision::Accept)
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> Policy {
        Policy::default()
    }

    #[test]
    fn test_and_rejected_even_for_whitelisted_operands() {
        let p = policy();
        assert!(!runtime_license(&p, "foo", "MIT AND Apache-2.0").unwrap());
        assert_eq!(
            classify_expression(&p, "foo", "MIT AND Apache-2.0").unwrap(),
            Decision::Reject(RejectReason::ConjunctiveLicense {
                license: "MIT AND Apache-2.0".to_string()
            })
        );
    }

    #[test]
    fn test_disjunction_accepts_any_whitelisted_operand() {
        let p = policy();
        assert!(runtime_license(&p, "foo", "MIT").unwrap());
        assert!(runtime_license(&p, "foo", "MPL-2.0 OR Apache-2.0").unwrap());
        assert!(runtime_license(&p, "foo", "GPL-3.0 OR MIT").unwrap());
        assert!(runtime_license(&p, "foo", "MIT OR GPL-3.0").unwrap());
    }

    #[test]
    fn test_slash_and_or_are_equivalent() {
        let p = policy();
        assert!(runtime_license(&p, "foo", "MIT/Apache-2.0").unwrap());
        assert!(runtime_license(&p, "foo", "GPL-3.0 / MIT").unwrap());
        assert!(!runtime_license(&p, "foo", "GPL-3.0/LGPL-3.0").unwrap());
    }

    #[test]
    fn test_runtime_package_exception() {
        let p = policy();
        assert!(runtime_license(&p, "arrayref", "BSD-2-Clause").unwrap());
        assert!(!runtime_license(&p, "some-other-crate", "BSD-2-Clause").unwrap());
    }

    #[test]
    fn test_unapproved_license() {
        let p = policy();
        assert_eq!(
            classify_expression(&p, "d", "GPL-3.0").unwrap(),
            Decision::Reject(RejectReason::UnapprovedLicense { license: "GPL-3.0".to_string() })
        );
    }

    #[test]
    fn test_buildtime_pair_must_match_both_ways() {
        let p = policy();
        assert_eq!(classify_expression(&p, "bindgen", "BSD-3-Clause").unwrap(), Decision::Accept);
        // Same license, package not whitelisted as build-time only.
        assert_eq!(
            classify_expression(&p, "serde", "BSD-3-Clause").unwrap(),
            Decision::Reject(RejectReason::NotBuildTimePackage {
                license: "BSD-3-Clause".to_string()
            })
        );
        // Same package, different license.
        assert_eq!(
            classify_expression(&p, "bindgen", "BSD-4-Clause").unwrap(),
            Decision::Reject(RejectReason::UnapprovedLicense {
                license: "BSD-4-Clause".to_string()
            })
        );
    }

    #[test]
    fn test_license_file_pin_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let pkg_dir = dir.path();
        std::fs::write(pkg_dir.join("LICENSE"), "The MIT License\n").unwrap();

        let mut p = policy();
        p.license_file_pins
            .insert("pinned".to_string(), sha256_hex(b"The MIT License\n"));

        assert_eq!(
            classify_license_file(&p, "pinned", pkg_dir, "LICENSE").unwrap(),
            Decision::Accept
        );

        // A single-byte change invalidates the review.
        std::fs::write(pkg_dir.join("LICENSE"), "The MIT license\n").unwrap();
        match classify_license_file(&p, "pinned", pkg_dir, "LICENSE").unwrap() {
            Decision::Reject(RejectReason::LicenseFileMismatch { license_file, digest }) => {
                assert_eq!(license_file, "LICENSE");
                assert_eq!(digest, sha256_hex(b"The MIT license\n"));
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_license_file_without_pin_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("LICENSE"), "whatever").unwrap();

        let p = policy();
        assert_eq!(
            classify_license_file(&p, "unpinned", dir.path(), "LICENSE").unwrap(),
            Decision::Reject(RejectReason::UnpinnedLicenseFile {
                license_file: "LICENSE".to_string()
            })
        );
    }
}
