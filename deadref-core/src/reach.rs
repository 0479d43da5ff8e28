//! Entry-point marking and reachability over the reference graph.
//!
//! Performance characteristics:
//! - Graph build: O(|V| + |E|) over the live nodes
//! - Multi-source reachability: O(|V| + |E|) single traversal
//!
//! The multi-source BFS pattern eliminates redundant traversals when
//! propagating from many entry points at once.

use std::collections::{HashSet, VecDeque};

use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::arena::NodeId;
use crate::entry::EntryPointPolicy;
use crate::manager::GraphManager;
use crate::names;
use crate::node::NodeFlags;

/// Stamp the ENTRY / PERMANENT_ENTRY flags from the three sources:
/// user designations in the model, the injectable policy, and configured
/// qualified names. An entry class keeps its constructors alive too.
pub(crate) fn mark_entry_points(g: &mut GraphManager, policy: &dyn EntryPointPolicy) {
    let model = g.model();
    let ids = g.arena.ids();
    let mut entry_count = 0usize;

    for id in ids {
        let Some(node) = g.node(id) else { continue };
        let Some(source) = node.source else { continue };
        let Some(decl) = model.decl(source) else {
            continue;
        };

        let mut flags = NodeFlags::empty();
        if model.designated_entry_points().contains(&source) {
            flags |= NodeFlags::ENTRY | NodeFlags::PERMANENT_ENTRY;
        }
        if policy.is_entry(model, decl) {
            flags |= NodeFlags::ENTRY;
        }
        if let Some(name) = names::external_name(g, id) {
            if policy.is_entry_name(&name) {
                flags |= NodeFlags::ENTRY | NodeFlags::PERMANENT_ENTRY;
            }
        }
        if flags.is_empty() {
            continue;
        }
        entry_count += 1;

        let ctors: Vec<NodeId> = g
            .node(id)
            .and_then(|n| n.class())
            .map(|c| c.constructors.clone())
            .unwrap_or_default();
        if let Some(n) = g.node_mut(id) {
            n.flags.insert(flags);
        }
        // A container-instantiated class is entered through construction.
        for ctor in ctors {
            if let Some(n) = g.node_mut(ctor) {
                n.flags.insert(NodeFlags::ENTRY);
            }
        }
    }
    debug!(entries = entry_count, "entry points marked");
}

/// Build the reachability view of the reference graph.
///
/// Uses `DiGraphMap<NodeId, ()>` for memory efficiency: node ids are
/// copyable handles and the unit edge type minimizes footprint.
pub fn build_reach_graph(g: &GraphManager) -> DiGraphMap<NodeId, ()> {
    let mut graph = DiGraphMap::new();
    for (id, node) in g.iter() {
        graph.add_node(id);
        for &target in &node.out_edges {
            graph.add_edge(id, target, ());
        }
    }
    graph
}

/// Performs multi-source BFS to find all nodes reachable from the roots.
///
/// Complexity is O(|V| + |E|) regardless of the number of roots; each
/// node and edge is visited at most once.
pub fn reachable_from_roots(
    graph: &DiGraphMap<NodeId, ()>,
    roots: impl IntoIterator<Item = NodeId>,
) -> HashSet<NodeId> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();

    for root in roots {
        if graph.contains_node(root) && visited.insert(root) {
            queue.push_back(root);
        }
    }

    while let Some(node) = queue.pop_front() {
        for n in graph.neighbors(node) {
            if visited.insert(n) {
                queue.push_back(n);
            }
        }
    }

    visited
}

/// Mark every node reachable from an entry point, following out-edges.
pub(crate) fn mark_reachable(g: &mut GraphManager) {
    let graph = build_reach_graph(g);
    let roots: Vec<NodeId> = g
        .iter()
        .filter(|(_, n)| n.is_entry())
        .map(|(id, _)| id)
        .collect();
    let reachable = reachable_from_roots(&graph, roots);

    for id in g.arena.ids() {
        if reachable.contains(&id) {
            if let Some(n) = g.node_mut(id) {
                n.flags.insert(NodeFlags::REACHABLE);
            }
        }
    }
    debug!(reachable = reachable.len(), "reachability computed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ConventionalEntryPoints;
    use crate::model::{Access, ModelBuilder, ProgramModel};

    fn build(model: &ProgramModel) -> GraphManager<'_> {
        let mut g = GraphManager::new(model);
        g.build(&ConventionalEntryPoints::default());
        g
    }

    fn reachable(g: &GraphManager, decl: crate::model::DeclId) -> bool {
        g.node(g.node_of(decl).unwrap())
            .unwrap()
            .flags
            .contains(NodeFlags::REACHABLE)
    }

    #[test]
    fn test_transitive_reachability_from_main() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "App");
        let main = b.method(class, "main");
        b.method_mut(main).main_like = true;
        let helper = b.method(class, "helper");
        let deep = b.method(class, "deep");
        let island = b.method(class, "island");
        b.access(main, Access::call(helper));
        b.access(helper, Access::call(deep));
        let model = b.finish();

        let g = build(&model);
        assert!(reachable(&g, main));
        assert!(reachable(&g, helper));
        assert!(reachable(&g, deep));
        assert!(!reachable(&g, island));
    }

    #[test]
    fn test_designated_entry_is_permanent() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "Api");
        let method = b.method(class, "handle");
        b.entry_point(method);
        let model = b.finish();

        let g = build(&model);
        let n = g.node(g.node_of(method).unwrap()).unwrap();
        assert!(n.flags.contains(NodeFlags::ENTRY));
        assert!(n.flags.contains(NodeFlags::PERMANENT_ENTRY));
    }

    #[test]
    fn test_entry_class_keeps_constructors() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let servlet = b.class(pkg, "UploadServlet");
        b.decl_mut(servlet).roles.servlet_like = true;
        let ctor = b.constructor(servlet);
        let model = b.finish();

        let g = build(&model);
        let n = g.node(g.node_of(ctor).unwrap()).unwrap();
        assert!(n.flags.contains(NodeFlags::ENTRY));
    }

    #[test]
    fn test_recursive_cluster_not_reachable() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let main = b.method(class, "main");
        b.method_mut(main).main_like = true;
        let p = b.method(class, "p");
        let q = b.method(class, "q");
        b.access(p, Access::call(q));
        b.access(q, Access::call(p));
        let model = b.finish();

        let g = build(&model);
        // The p/q cycle has no path from any entry point.
        assert!(!reachable(&g, p));
        assert!(!reachable(&g, q));
    }

    #[test]
    fn test_reachable_from_roots_empty() {
        let b = ModelBuilder::new();
        let model = b.finish();
        let g = build(&model);
        let graph = build_reach_graph(&g);
        let reachable = reachable_from_roots(&graph, std::iter::empty());
        assert!(reachable.is_empty());
    }
}
