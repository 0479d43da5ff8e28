//! Baseline snapshots: persist findings and re-resolve them across runs.
//!
//! A baseline records the dead declarations of one analysis run, keyed by
//! their external qualified names, together with a SHA-256 of the model
//! file and a timestamp. A later run compares against it by re-resolving
//! each recorded name through the fresh graph: names that resolve but are
//! no longer flagged were fixed, names that no longer resolve belong to
//! deleted declarations, and findings absent from the baseline are new.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use deadref_core::{
    class_from_external_name, field_from_external_name, method_from_external_name,
    AnalysisResult, DeadItem, DeadItemKind, Deadref,
};

/// A persisted findings snapshot.
#[derive(Debug, Serialize, Deserialize)]
pub struct Baseline {
    /// SHA-256 of the model file the baseline was computed from.
    pub model_sha256: String,
    /// RFC 3339 creation timestamp.
    pub created: String,
    /// Dead declarations at baseline time.
    pub items: Vec<DeadItem>,
}

/// Outcome of comparing a run against a baseline.
#[derive(Debug, Default)]
pub struct BaselineDiff {
    /// Findings not present in the baseline.
    pub new_dead: Vec<DeadItem>,
    /// Baseline findings still flagged.
    pub still_dead: Vec<DeadItem>,
    /// Baseline findings whose declarations are alive and no longer flagged.
    pub fixed: Vec<DeadItem>,
    /// Baseline findings whose declarations no longer resolve at all.
    pub stale: Vec<DeadItem>,
    /// The model file changed since the baseline was written.
    pub model_changed: bool,
}

/// SHA-256 of a file's contents, hex encoded.
pub fn file_hash(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mut sha = Sha256::new();
    sha.update(&bytes);
    Ok(format!("{:x}", sha.finalize()))
}

/// Write a baseline snapshot of the current findings.
pub fn write(path: &Path, model_path: &Path, result: &AnalysisResult) -> Result<()> {
    let baseline = Baseline {
        model_sha256: file_hash(model_path)?,
        created: Utc::now().to_rfc3339(),
        items: result.dead.clone(),
    };
    let json = serde_json::to_string_pretty(&baseline).context("Failed to encode baseline")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Compare the current findings against a stored baseline.
pub fn compare(
    path: &Path,
    model_path: &Path,
    deadref: &Deadref,
    result: &AnalysisResult,
) -> Result<BaselineDiff> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let baseline: Baseline = serde_json::from_str(&content)
        .with_context(|| format!("Invalid baseline file {}", path.display()))?;

    let mut diff = BaselineDiff {
        model_changed: file_hash(model_path)? != baseline.model_sha256,
        ..Default::default()
    };

    let current_names: HashSet<&str> = result.dead.iter().map(|d| d.name.as_str()).collect();
    let baseline_names: HashSet<&str> = baseline.items.iter().map(|d| d.name.as_str()).collect();

    // Re-resolve each recorded finding through the fresh graph.
    let g = deadref.graph();
    for item in baseline.items.iter() {
        if current_names.contains(item.name.as_str()) {
            diff.still_dead.push(item.clone());
            continue;
        }
        let resolves = match item.kind {
            DeadItemKind::Class | DeadItemKind::Interface => {
                class_from_external_name(&g, &item.name).is_some()
            }
            DeadItemKind::Method | DeadItemKind::Constructor => {
                method_from_external_name(&g, &item.name).is_some()
            }
            DeadItemKind::Field => field_from_external_name(&g, &item.name).is_some(),
            // Parameter names are not part of the lookup surface.
            DeadItemKind::Parameter => false,
        };
        if resolves {
            diff.fixed.push(item.clone());
        } else {
            diff.stale.push(item.clone());
        }
    }

    for item in &result.dead {
        if !baseline_names.contains(item.name.as_str()) {
            diff.new_dead.push(item.clone());
        }
    }

    Ok(diff)
}
