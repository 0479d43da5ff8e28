//! Prelude module for convenient imports.
//!
//! Import commonly used types with a single line:
//!
//! ```rust,ignore
//! use deadref_core::prelude::*;
//! ```
//!
//! This provides the most commonly needed types for dead declaration
//! analysis without polluting the namespace with rarely-used items.

// Core analysis types
pub use crate::error::{DeadrefError, DeadrefResult};
pub use crate::model::{
    Access, AccessContext, AccessKind, ConstValue, DeclId, Declaration, ModelBuilder,
    ProgramModel,
};

// Graph structure
pub use crate::arena::NodeId;
pub use crate::manager::GraphManager;
pub use crate::node::{Node, NodeFlags};

// Dead declaration detection
pub use crate::detect::{
    find_dead, has_suspicious_callers, is_referenced, is_suspicious, is_suspicious_recursive,
    DeadNode, DeadReason,
};

// Entry points and reachability
pub use crate::entry::{ConventionalEntryPoints, EntryPointPolicy};
pub use crate::reach::{build_reach_graph, reachable_from_roots};

// External names
pub use crate::names::{
    class_from_external_name, external_name, field_from_external_name, method_from_external_name,
};

// Configuration
pub use crate::config::{load_config, DeadrefConfig};

// Builder API
pub use crate::builder::{AnalysisResult, DeadItem, DeadItemKind, Deadref, Suggestion};
