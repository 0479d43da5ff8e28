//! Dead-declaration determination.
//!
//! Three questions per node, asked over the finished graph:
//! - `is_suspicious` — unreferenced and not exempted (entry points,
//!   specialized types, default constructors).
//! - `has_suspicious_callers` — referenced, but only from code that is
//!   itself a dead-code candidate.
//! - `is_suspicious_recursive` — referenced only by a closed,
//!   mutually-recursive cluster with no path in from live code.
//!
//! The recursive-cluster walk is guarded by stack membership, not a
//! visited set: distinct call chains through the same node must be allowed
//! to re-enter, only true cycles are cut.

use rayon::prelude::*;

use crate::arena::NodeId;
use crate::manager::GraphManager;
use crate::node::NodeFlags;

/// Why a node was flagged dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadReason {
    /// Nothing in scope references it.
    Unreferenced,
    /// Field written but never read.
    WriteOnly,
    /// Field read but never written.
    ReadOnly,
    /// Only callers are a closed recursive cluster.
    RecursiveOnly,
}

impl std::fmt::Display for DeadReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unreferenced => write!(f, "unreferenced"),
            Self::WriteOnly => write!(f, "assigned but never read"),
            Self::ReadOnly => write!(f, "read but never assigned"),
            Self::RecursiveOnly => write!(f, "only called from an isolated recursive cluster"),
        }
    }
}

/// One dead-code candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadNode {
    pub id: NodeId,
    pub reason: DeadReason,
}

/// Is anything in scope using this node?
///
/// An abstract class or interface with in-scope subtypes counts as used:
/// specializing a type is using it.
pub fn is_referenced(g: &GraphManager, id: NodeId) -> bool {
    let Some(node) = g.node(id) else {
        return false;
    };
    if let Some(class) = node.class() {
        if (node.is_abstract() || node.is_interface()) && !class.subclasses.is_empty() {
            return true;
        }
    }
    !node.in_edges.is_empty()
}

/// Dead-code candidate test.
pub fn is_suspicious(g: &GraphManager, id: NodeId) -> bool {
    let Some(node) = g.node(id) else {
        return false;
    };
    if node.is_deleted() || node.is_project() || node.is_package() {
        return false;
    }
    // The synthetic constructor lives and dies with its class.
    if node.is_implicit_constructor() {
        return node.owner.is_some_and(|owner| is_suspicious(g, owner));
    }
    if node.is_entry() {
        return false;
    }
    // Presumed callable by unseen external code.
    if node.flags.contains(NodeFlags::LIBRARY_OVERRIDE) {
        return false;
    }

    if let Some(class) = node.class() {
        // A specialized type is not a finding, abstract or not.
        if !class.subclasses.is_empty() {
            return false;
        }
        return !is_referenced(g, id);
    }

    if node.is_constructor() {
        // The classic private-constructor-of-a-utility-class pattern:
        // a sole, private, zero-argument constructor is intentional.
        let zero_arg = node.method().is_some_and(|m| m.parameters.is_empty());
        let sole = node
            .owner
            .and_then(|o| g.node(o))
            .and_then(|n| n.class())
            .is_some_and(|c| c.constructors.len() == 1);
        if zero_arg && sole && node.access == crate::model::AccessLevel::Private {
            return false;
        }
    }

    if node.is_field() {
        let read = node.flags.contains(NodeFlags::USED_FOR_READING);
        let written = node.flags.contains(NodeFlags::USED_FOR_WRITING);
        if read != written {
            return true;
        }
        return !is_referenced(g, id);
    }

    !is_referenced(g, id)
}

/// Is every incoming reference itself a dead-code candidate?
///
/// Dispatch edges from a method's own super declarations are not callers;
/// a call through a base reference must not make the override look
/// suspiciously-called. Abstract types extend the question to their
/// subtypes.
pub fn has_suspicious_callers(g: &GraphManager, id: NodeId) -> bool {
    has_suspicious_callers_inner(g, id, &mut Vec::new())
}

fn has_suspicious_callers_inner(g: &GraphManager, id: NodeId, visited: &mut Vec<NodeId>) -> bool {
    let Some(node) = g.node(id) else {
        return false;
    };
    for &src in &node.in_edges {
        if node
            .method()
            .is_some_and(|m| m.super_methods.contains(&src))
        {
            continue;
        }
        if is_suspicious(g, src) {
            return true;
        }
    }
    if let Some(class) = node.class() {
        if node.is_abstract() || node.is_interface() {
            for &sub in &class.subclasses {
                if visited.contains(&sub) {
                    continue;
                }
                visited.push(sub);
                if is_suspicious(g, sub) || has_suspicious_callers_inner(g, sub, visited) {
                    return true;
                }
            }
        }
    }
    false
}

/// Does this node belong to an isolated recursive cluster: a set of
/// declarations that only ever call each other, with no path in from
/// outside?
pub fn is_suspicious_recursive(g: &GraphManager, id: NodeId) -> bool {
    let Some(node) = g.node(id) else {
        return false;
    };
    if node.is_entry() || node.is_deleted() {
        return false;
    }
    in_closed_cluster(g, id, &mut Vec::new())
}

fn in_closed_cluster(g: &GraphManager, id: NodeId, stack: &mut Vec<NodeId>) -> bool {
    let Some(node) = g.node(id) else {
        return false;
    };
    let callers: Vec<NodeId> = node.in_edges.iter().copied().collect();
    // No callers at all: plain dead code, not a recursive cluster.
    if callers.is_empty() {
        return false;
    }
    // Inheritance escape hatch: if an overridden declaration has callers
    // outside the cluster, dispatch can reach this node from live code.
    if let Some(m) = node.method() {
        for &sup in &m.super_methods {
            if has_external_callers(g, sup, stack) {
                return false;
            }
        }
    }

    stack.push(id);
    let mut closed = true;
    for caller in callers {
        if stack.contains(&caller) {
            // Part of the cluster currently under test.
            continue;
        }
        if !(is_suspicious(g, caller) || in_closed_cluster(g, caller, stack)) {
            closed = false;
            break;
        }
    }
    stack.pop();
    closed
}

fn has_external_callers(g: &GraphManager, id: NodeId, stack: &[NodeId]) -> bool {
    let Some(node) = g.node(id) else {
        return false;
    };
    let supers = node.method().map(|m| &m.super_methods);
    node.in_edges.iter().any(|src| {
        !stack.contains(src) && !supers.is_some_and(|s| s.contains(src))
    })
}

/// Scan the whole graph for dead declarations.
///
/// Read-only over the finished graph, so the scan fans out across Rayon
/// workers. Results come back in stable arena order.
pub fn find_dead(g: &GraphManager) -> Vec<DeadNode> {
    let ids: Vec<NodeId> = g
        .iter()
        .filter(|(_, n)| {
            !n.is_project() && !n.is_package() && !n.is_implicit_constructor() && !n.is_deleted()
        })
        .map(|(id, _)| id)
        .collect();

    let mut dead: Vec<DeadNode> = ids
        .par_iter()
        .filter_map(|&id| classify(g, id))
        .collect();
    dead.sort_by_key(|d| d.id);
    dead
}

fn classify(g: &GraphManager, id: NodeId) -> Option<DeadNode> {
    let node = g.node(id)?;
    if is_suspicious(g, id) {
        let reason = if node.is_field() {
            let read = node.flags.contains(NodeFlags::USED_FOR_READING);
            let written = node.flags.contains(NodeFlags::USED_FOR_WRITING);
            match (read, written) {
                (false, true) => DeadReason::WriteOnly,
                (true, false) => DeadReason::ReadOnly,
                _ => DeadReason::Unreferenced,
            }
        } else {
            DeadReason::Unreferenced
        };
        return Some(DeadNode { id, reason });
    }
    if is_suspicious_recursive(g, id) {
        return Some(DeadNode {
            id,
            reason: DeadReason::RecursiveOnly,
        });
    }
    None
}
