use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;

/// `<output_dir>/<tenant>_<YYYY-MM-DD>.ndjson`, with the tenant label made
/// safe for use in a file name.
pub fn default_output_path(output_dir: &Path, tenant: &str, date: NaiveDate) -> PathBuf {
    let tenant: String = tenant
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    output_dir.join(format!("{}_{}.ndjson", tenant, date.format("%Y-%m-%d")))
}

/// Refuse to write the NDJSON output over the configuration being read.
pub fn ensure_output_not_input(output: &Path, input: &Path) -> Result<()> {
    let out_norm = normalize_for_compare(output)
        .with_context(|| format!("failed to normalize output path {}", output.display()))?;
    let in_norm = normalize_for_compare(input)
        .with_context(|| format!("failed to normalize input path {}", input.display()))?;
    if out_norm == in_norm {
        bail!(
            "refusing to overwrite source file: output {} matches input {}",
            output.display(),
            input.display()
        );
    }
    Ok(())
}

/// Absolute form of `path` without `.` or `..` components. The output file is
/// usually not on disk yet, so only its longest existing prefix is
/// canonicalized and the remaining components are appended as written.
fn normalize_for_compare(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().context("current_dir")?.join(path)
    };

    let mut folded = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                folded.pop();
            }
            other => folded.push(other),
        }
    }

    let mut existing = folded.as_path();
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = if existing.exists() {
        existing
            .canonicalize()
            .with_context(|| format!("canonicalize {}", existing.display()))?
    } else {
        existing.to_path_buf()
    };
    resolved.extend(missing.iter().rev());
    Ok(resolved)
}
