//! Builder pattern API for deadref analysis.
//!
//! Provides a fluent interface for configuring and running dead
//! declaration analysis over a semantic model:
//!
//! ```rust,ignore
//! use deadref_core::prelude::*;
//!
//! let result = Deadref::from_path("model.json")?
//!     .entry_points(["com.acme.Plugin.activate()"])
//!     .include_parameters(true)
//!     .analyze()?;
//!
//! for item in &result.dead {
//!     println!("Dead {}: {}", item.kind, item.name);
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::DeadrefConfig;
use crate::detect;
use crate::entry::ConventionalEntryPoints;
use crate::error::DeadrefResult;
use crate::manager::GraphManager;
use crate::model::ProgramModel;
use crate::names;
use crate::node::{Node, NodeFlags};

/// Builder for configuring dead declaration analysis.
#[derive(Debug, Clone)]
pub struct Deadref {
    /// The semantic model to analyze.
    model: ProgramModel,

    /// Extra entry-point qualified names (kept alive by configuration).
    entry_points: Vec<String>,

    /// Name patterns excluded from the report.
    ignored_patterns: Vec<String>,

    /// Whether to report unused parameters.
    include_parameters: bool,

    /// Whether to report can-be-static suggestions.
    report_can_be_static: bool,

    /// Whether to report can-be-final suggestions.
    report_can_be_final: bool,
}

impl Deadref {
    /// Create an analysis builder over an already-loaded model.
    pub fn new(model: ProgramModel) -> Self {
        Self {
            model,
            entry_points: Vec::new(),
            ignored_patterns: Vec::new(),
            include_parameters: false,
            report_can_be_static: true,
            report_can_be_final: true,
        }
    }

    /// Load the model from a JSON file and create a builder.
    pub fn from_path(path: impl AsRef<Path>) -> DeadrefResult<Self> {
        Ok(Self::new(ProgramModel::from_path(path)?))
    }

    /// Fold a loaded `deadref.toml` into the builder.
    pub fn with_config(mut self, cfg: &DeadrefConfig) -> Self {
        if let Some(entries) = &cfg.entry_points {
            self.entry_points.extend(entries.iter().cloned());
        }
        if let Some(ignore) = &cfg.ignore {
            self.ignored_patterns.extend(ignore.iter().cloned());
        }
        if let Some(params) = cfg.include_parameters {
            self.include_parameters = params;
        }
        self
    }

    /// Add entry-point qualified names.
    pub fn entry_points(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.entry_points.extend(names.into_iter().map(Into::into));
        self
    }

    /// Add patterns for declarations to ignore in the report.
    pub fn ignore_patterns(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ignored_patterns
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Report unused parameters as findings.
    pub fn include_parameters(mut self, enabled: bool) -> Self {
        self.include_parameters = enabled;
        self
    }

    /// Report can-be-static suggestions.
    pub fn report_can_be_static(mut self, enabled: bool) -> Self {
        self.report_can_be_static = enabled;
        self
    }

    /// Report can-be-final suggestions.
    pub fn report_can_be_final(mut self, enabled: bool) -> Self {
        self.report_can_be_final = enabled;
        self
    }

    /// Build the reference graph without reporting. The returned manager
    /// supports the full per-node query surface and name lookups.
    pub fn graph(&self) -> GraphManager<'_> {
        let policy = ConventionalEntryPoints::new().with_names(self.entry_points.iter().cloned());
        let mut g = GraphManager::new(&self.model);
        g.build(&policy);
        g
    }

    /// Run the analysis and return results.
    pub fn analyze(&self) -> DeadrefResult<AnalysisResult> {
        let g = self.graph();

        let mut stats = DeadrefStats::default();
        for (_, node) in g.iter() {
            if node.is_class() {
                stats.classes += 1;
            } else if node.is_method() {
                stats.methods += 1;
            } else if node.is_field() {
                stats.fields += 1;
            } else if node.is_parameter() {
                stats.parameters += 1;
            }
            if node.is_entry() {
                stats.entry_points += 1;
            }
            if node.flags.contains(NodeFlags::REACHABLE) {
                stats.reachable += 1;
            }
        }
        stats.total_nodes = g.node_count();

        let mut dead: Vec<DeadItem> = detect::find_dead(&g)
            .into_iter()
            .filter_map(|d| {
                let node = g.node(d.id)?;
                if node.is_parameter() && !self.include_parameters {
                    return None;
                }
                let name = names::external_name(&g, d.id)?;
                if self.is_ignored(&name) {
                    return None;
                }
                Some(DeadItem {
                    name,
                    kind: DeadItemKind::of(node),
                    reason: d.reason.to_string(),
                    suspicious_callers: detect::has_suspicious_callers(&g, d.id),
                })
            })
            .collect();
        dead.sort_by(|a, b| a.name.cmp(&b.name));

        let can_be_static = if self.report_can_be_static {
            self.collect_suggestions(&g, NodeFlags::CAN_BE_STATIC, NodeFlags::STATIC)
        } else {
            Vec::new()
        };
        let can_be_final = if self.report_can_be_final {
            self.collect_suggestions(&g, NodeFlags::CAN_BE_FINAL, NodeFlags::FINAL)
        } else {
            Vec::new()
        };

        Ok(AnalysisResult {
            stats,
            dead,
            can_be_static,
            can_be_final,
        })
    }

    /// Modifier suggestions: candidate flag still set, modifier absent,
    /// and the node is live enough to be worth mentioning.
    fn collect_suggestions(
        &self,
        g: &GraphManager,
        candidate: NodeFlags,
        modifier: NodeFlags,
    ) -> Vec<Suggestion> {
        let mut out: Vec<Suggestion> = g
            .iter()
            .filter(|&(id, node)| {
                let suggestible =
                    node.is_field() || node.is_class() || (node.is_method() && !node.is_constructor());
                suggestible
                    && node.flags.contains(candidate)
                    && !node.flags.contains(modifier)
                    && !detect::is_suspicious(g, id)
            })
            .filter_map(|(id, node)| {
                let name = names::external_name(g, id)?;
                if self.is_ignored(&name) {
                    return None;
                }
                Some(Suggestion {
                    name,
                    kind: DeadItemKind::of(node),
                })
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Check if a qualified name matches any ignored pattern.
    fn is_ignored(&self, name: &str) -> bool {
        for pattern in &self.ignored_patterns {
            if pattern.ends_with('*') {
                let prefix = &pattern[..pattern.len() - 1];
                if name.starts_with(prefix) {
                    return true;
                }
            } else if let Some(suffix) = pattern.strip_prefix('*') {
                if name.ends_with(suffix) {
                    return true;
                }
            } else if name == pattern || name.contains(pattern) {
                return true;
            }
        }
        false
    }
}

/// Aggregate counts over the built graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeadrefStats {
    pub total_nodes: usize,
    pub classes: usize,
    pub methods: usize,
    pub fields: usize,
    pub parameters: usize,
    pub entry_points: usize,
    pub reachable: usize,
}

/// Result of running dead declaration analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Graph-wide counts.
    pub stats: DeadrefStats,

    /// Dead declarations, sorted by qualified name.
    pub dead: Vec<DeadItem>,

    /// Declarations that could be made static.
    pub can_be_static: Vec<Suggestion>,

    /// Declarations that could be made final.
    pub can_be_final: Vec<Suggestion>,
}

impl AnalysisResult {
    /// Check if any dead declarations were found.
    pub fn has_dead_code(&self) -> bool {
        !self.dead.is_empty()
    }

    /// Total number of dead declarations.
    pub fn dead_count(&self) -> usize {
        self.dead.len()
    }

    /// Percentage of nodes flagged dead.
    pub fn dead_percentage(&self) -> f64 {
        if self.stats.total_nodes == 0 {
            0.0
        } else {
            (self.dead.len() as f64 / self.stats.total_nodes as f64) * 100.0
        }
    }
}

/// A dead declaration finding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeadItem {
    /// Qualified external name (re-resolvable across runs).
    pub name: String,
    /// Declaration kind.
    pub kind: DeadItemKind,
    /// Human-readable reason.
    pub reason: String,
    /// Whether the only references come from other dead-code candidates.
    pub suspicious_callers: bool,
}

/// A modifier suggestion finding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Suggestion {
    pub name: String,
    pub kind: DeadItemKind,
}

/// Kind of declaration in a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadItemKind {
    Class,
    Interface,
    Constructor,
    Method,
    Field,
    Parameter,
}

impl DeadItemKind {
    fn of(node: &Node) -> Self {
        if node.is_interface() {
            Self::Interface
        } else if node.is_class() {
            Self::Class
        } else if node.is_constructor() {
            Self::Constructor
        } else if node.is_method() {
            Self::Method
        } else if node.is_field() {
            Self::Field
        } else {
            Self::Parameter
        }
    }
}

impl std::fmt::Display for DeadItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Class => write!(f, "class"),
            Self::Interface => write!(f, "interface"),
            Self::Constructor => write!(f, "constructor"),
            Self::Method => write!(f, "method"),
            Self::Field => write!(f, "field"),
            Self::Parameter => write!(f, "parameter"),
        }
    }
}
