use std::path::PathBuf;

use serde::Serialize;

/// The outcome of checking a single vendored package.
#[derive(Debug, Clone, Serialize)]
pub struct PackageCheck {
    pub name: String,
    pub manifest: PathBuf,
    /// Declared `license = "..."` expression, if any.
    pub license: Option<String>,
    /// Declared `license-file = "..."` reference, if any.
    pub license_file: Option<String>,
    pub decision: Decision,
}

impl PackageCheck {
    pub fn accepted(&self) -> bool {
        matches!(self.decision, Decision::Accept)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Decision {
    Accept,
    Reject(RejectReason),
}

/// Why a package failed the license check.
///
/// Every variant maps to one diagnostic; nothing is folded together so that
/// the remediation guidance can be specific.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RejectReason {
    /// The expression contains an `AND` operator. Conjunctive license
    /// composition has no meaningful semantics under this policy.
    ConjunctiveLicense { license: String },
    /// No disjunct of the expression is approved for this package.
    UnapprovedLicense { license: String },
    /// The license is approved for build-time dependencies, but the package
    /// is not whitelisted as build-time only.
    NotBuildTimePackage { license: String },
    /// The package declares a license file that has never been reviewed.
    UnpinnedLicenseFile { license_file: String },
    /// The license file's contents no longer match the reviewed digest.
    LicenseFileMismatch { license_file: String, digest: String },
    /// The manifest declares neither `license` nor `license-file`.
    NoLicense,
    /// The manifest declares more than one license source.
    TooManyLicenses,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::ConjunctiveLicense { license } => {
                write!(f, "conjunctive (AND) license: {}", license)
            }
            RejectReason::UnapprovedLicense { license } => {
                write!(f, "non-approved license: {}", license)
            }
            RejectReason::NotBuildTimePackage { license } => {
                write!(
                    f,
                    "license {} is approved for build-time dependencies only; package not whitelisted",
                    license
                )
            }
            RejectReason::UnpinnedLicenseFile { license_file } => {
                write!(f, "unreviewed license file: {}", license_file)
            }
            RejectReason::LicenseFileMismatch { license_file, digest } => {
                write!(f, "license file changed: {} (hash {})", license_file, digest)
            }
            RejectReason::NoLicense => write!(f, "no license declared"),
            RejectReason::TooManyLicenses => write!(f, "too many licenses declared"),
        }
    }
}

/// Aggregate result of scanning a whole vendor tree.
#[derive(Debug, Default, Serialize)]
pub struct ScanReport {
    pub checks: Vec<PackageCheck>,
}

impl ScanReport {
    /// Logical AND of every package's decision.
    pub fn ok(&self) -> bool {
        self.checks.iter().all(PackageCheck::accepted)
    }

    pub fn rejected(&self) -> impl Iterator<Item = &PackageCheck> {
        self.checks.iter().filter(|c| !c.accepted())
    }
}

/// The single `replace-with` target extracted from `cargo vendor` output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplaceSource {
    /// Key of the target entry in the `[source]` table.
    pub name: String,
    /// Vendored directory, rewritten relative to the project root.
    pub directory: String,
}
