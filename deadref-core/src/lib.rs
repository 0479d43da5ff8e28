//! deadref-core: whole-program declaration reference graph and dead
//! declaration analysis.
//!
//! This library takes a semantic model produced by an external front end —
//! declarations, resolved accesses, override tables, lowered control flow —
//! and materializes a node per declaration (package, class, method, field,
//! parameter), linked by a containment tree and a directed reference graph.
//! Derived boolean properties are computed on top: reachability from entry
//! points, "can be made static", "can be made final", and dead-code
//! suspicion including isolated recursive clusters.
//!
//! # Features
//!
//! - **Dual graph structure**: containment tree plus symmetric in/out
//!   reference edges, kept consistent under incremental node removal
//! - **Implicit constructors**: classes without explicit constructors get
//!   synthetic default-constructor nodes chained through the inheritance
//!   hierarchy
//! - **Field finality**: definite single-assignment analysis over lowered
//!   control flow, with redirecting-constructor chains
//! - **Static candidacy**: instance-access tracking through anonymous and
//!   nested classes
//! - **Dead-code detection**: unreferenced declarations, write-only
//!   fields, suspicious caller chains, mutually-recursive dead clusters
//! - **External names**: qualified-name round-trip for re-resolving
//!   findings across analysis runs
//!
//! # Quick Start
//!
//! Use the [`prelude`] module for convenient imports:
//!
//! ```rust,ignore
//! use deadref_core::prelude::*;
//!
//! let result = Deadref::from_path("model.json")?
//!     .include_parameters(true)
//!     .analyze()?;
//!
//! for item in &result.dead {
//!     println!("Dead {}: {} ({})", item.kind, item.name, item.reason);
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`model`]: the semantic-model input handed over by the front end
//! - [`flow`]: control-flow blocks and single-assignment analysis
//! - [`arena`]: generation-checked node storage
//! - [`node`]: declaration nodes, flags, kind-specific data
//! - [`manager`]: graph construction, identity map, removal protocol
//! - [`statics`]: can-be-static maintenance
//! - [`finality`]: field finality accounting
//! - [`entry`]: entry-point policy
//! - [`reach`]: reachability over the reference graph
//! - [`detect`]: dead declaration determination
//! - [`names`]: external-name formatting and parsing
//! - [`builder`]: fluent analysis API
//! - [`report`]: plaintext/JSON/DOT output
//! - [`error`]: typed error handling

pub mod arena;
pub mod builder;
pub mod config;
pub mod detect;
pub mod entry;
pub mod error;
pub mod finality;
pub mod flow;
pub mod logging;
pub mod manager;
pub mod model;
pub mod names;
pub mod node;
pub mod prelude;
pub mod reach;
pub mod report;
pub mod statics;

// ============================================================================
// Explicit Re-exports (avoiding glob imports for clear API surface)
// ============================================================================

// Error types
pub use error::{DeadrefError, DeadrefResult, IoResultExt};

// Builder API
pub use builder::{AnalysisResult, DeadItem, DeadItemKind, Deadref, DeadrefStats, Suggestion};

// Semantic model
pub use model::{
    Access, AccessContext, AccessKind, AccessLevel, ConstValue, DeclDetails, DeclId, Declaration,
    ModelBuilder, ProgramModel, Roles,
};

// Control flow
pub use flow::{single_assigned_vars, ControlFlow, Instruction};

// Graph structure
pub use arena::{NodeArena, NodeId};
pub use manager::GraphManager;
pub use node::{ClassData, FieldData, MethodData, Node, NodeData, NodeFlags, ParamData, ValueTemplate};

// Entry points and reachability
pub use entry::{ConventionalEntryPoints, EntryPointPolicy};
pub use reach::{build_reach_graph, reachable_from_roots};

// Detection
pub use detect::{
    find_dead, has_suspicious_callers, is_referenced, is_suspicious, is_suspicious_recursive,
    DeadNode, DeadReason,
};

// External names
pub use names::{
    class_from_external_name, external_name, field_from_external_name, method_from_external_name,
};

// Configuration
pub use config::{load_config, DeadrefConfig, OutputConfig};

// Logging
pub use logging::{init_structured_logging, log_error, log_info, log_warn};

// Report output
pub use report::{print_json, print_plain, to_dot};
