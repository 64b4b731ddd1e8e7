use std::collections::BTreeSet;
use std::path::Path;

use thiserror::Error;
use toml::Value;

use crate::models::ReplaceSource;

/// Normalization failures are unrecoverable without human intervention:
/// downstream tooling assumes a single substitution point in the generated
/// file, so an ambiguous or missing one aborts before anything is written.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse cargo vendor output: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize vendoring configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("cargo vendor didn't output a unique replace-with. Found: {0:?}")]
    ReplaceWith(Vec<String>),
    #[error("replace-with target `{0}` is not defined in the source table")]
    MissingTarget(String),
    #[error("replacement source `{0}` has no directory")]
    MissingDirectory(String),
}

/// Transform raw `cargo vendor` output into the final `.cargo/config.in`
/// contents.
pub fn generate(raw: &str, topsrcdir: &Path) -> Result<String, ConfigError> {
    let (doc, replace) = normalize(raw, topsrcdir)?;
    let body = dump(&doc)?;
    Ok(render(&body, &replace))
}

/// Parse and canonicalize the configuration snippet from `cargo vendor`.
///
/// Returns the canonical document with the replacement entry removed, plus
/// the extracted [`ReplaceSource`] whose directory has been rewritten
/// relative to `topsrcdir`.
pub fn normalize(raw: &str, topsrcdir: &Path) -> Result<(Value, ReplaceSource), ConfigError> {
    // cargo may print unrelated progress lines before the snippet; the
    // snippet itself starts at the first section header.
    let snippet = raw
        .lines()
        .skip_while(|l| !l.starts_with('['))
        .collect::<Vec<_>>()
        .join("\n");

    let mut doc: Value = toml::from_str(&snippet)?;

    let targets: BTreeSet<String> = doc
        .get("source")
        .and_then(Value::as_table)
        .map(|sources| {
            sources
                .values()
                .filter_map(|v| v.get("replace-with"))
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    // Exactly one replacement relationship must exist.
    let mut targets = targets.into_iter();
    let name = match (targets.next(), targets.next()) {
        (Some(name), None) => name,
        (first, second) => {
            let found: Vec<String> = first.into_iter().chain(second).chain(targets).collect();
            return Err(ConfigError::ReplaceWith(found));
        }
    };

    let sources = doc
        .get_mut("source")
        .and_then(Value::as_table_mut)
        .ok_or_else(|| ConfigError::MissingTarget(name.clone()))?;
    let mut entry = sources
        .remove(&name)
        .ok_or_else(|| ConfigError::MissingTarget(name.clone()))?;

    let directory = entry
        .get("directory")
        .and_then(Value::as_str)
        .ok_or_else(|| ConfigError::MissingDirectory(name.clone()))?;
    let directory = relative_to(directory, topsrcdir);
    if let Some(table) = entry.as_table_mut() {
        table.insert("directory".to_string(), Value::String(directory.clone()));
    }

    Ok((recursive_sort(doc), ReplaceSource { name, directory }))
}

/// Rewrite `dir` relative to `root`.
///
/// Separators are normalized to `/` and the root prefix is compared
/// case-insensitively, so paths reported by case-insensitive filesystems
/// still produce a stable relative path. The suffix keeps its original
/// spelling.
fn relative_to(dir: &str, root: &Path) -> String {
    let dir = dir.replace('\\', "/");
    let root = root.to_string_lossy().replace('\\', "/");
    let root = root.trim_end_matches('/');

    match strip_prefix_ignore_ascii_case(&dir, root) {
        Some("") | Some("/") => ".".to_string(),
        Some(rest) if rest.starts_with('/') => rest[1..].trim_end_matches('/').to_string(),
        _ => dir,
    }
}

fn strip_prefix_ignore_ascii_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() < prefix.len() || !s.is_char_boundary(prefix.len()) {
        return None;
    }
    let (head, tail) = s.split_at(prefix.len());
    head.eq_ignore_ascii_case(prefix).then_some(tail)
}

/// Recursively sort every mapping by key. List order is preserved; list
/// elements are canonicalized in place. `cargo vendor` does not promise a
/// stable output order, and the generated file must not churn between runs.
fn recursive_sort(value: Value) -> Value {
    match value {
        Value::Table(table) => {
            let mut entries: Vec<(String, Value)> = table.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Table(entries.into_iter().map(|(k, v)| (k, recursive_sort(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(recursive_sort).collect()),
        other => other,
    }
}

/// Serialize the canonical document, dropping section headers whose table
/// holds nothing but sub-tables and trimming blank lines at both ends.
fn dump(doc: &Value) -> Result<String, ConfigError> {
    let mut out = toml::to_string(doc)?;
    if let Value::Table(table) = doc {
        for (key, value) in table {
            if let Value::Table(inner) = value {
                if inner.values().all(Value::is_table) {
                    out = out.replace(&format!("[{key}]"), "");
                }
            }
        }
    }
    Ok(out.trim().to_string())
}

const CONFIG_TEMPLATE: &str = "\
# This file contains vendoring instructions for cargo.
# It was generated by `revendor` and will be overwritten by the next run.
# Please do not edit.

{config}

# cargo treats lines starting with # as comments, which lets this file
# carry preprocessing directives. It can be copied as-is to .cargo/config
# with no preprocessing (for tasks that build the vendored tree on their
# own), or be preprocessed by the build system to produce a .cargo/config
# with the right content.
#define REPLACE_NAME {replace_name}
#define VENDORED_DIRECTORY {directory}
# The section below is explicitly excluded when preprocessing because it
# would overlap with the preprocessed [source.\"@REPLACE_NAME@\"], and
# cargo would fail.
#ifndef REPLACE_NAME
[source.{replace_name}]
directory = \"{directory}\"
#endif

# @REPLACE_NAME@ is not a plausible name for a real source, so cargo
# ignores this section when it appears here verbatim.
#filter substitution
[source.\"@REPLACE_NAME@\"]
directory = \"@top_srcdir@/@VENDORED_DIRECTORY@\"
";

fn render(config: &str, replace: &ReplaceSource) -> String {
    CONFIG_TEMPLATE
        .replace("{config}", config)
        .replace("{replace_name}", &replace.name)
        .replace("{directory}", &replace.directory)
}
