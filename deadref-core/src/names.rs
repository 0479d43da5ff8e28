//! External names: stable qualified-name strings for nodes.
//!
//! Reports identify findings by formatted qualified names
//! (`com.acme.Outer.Inner`, `com.acme.A.run(int,String)`, `com.acme.A.count`),
//! and a later run re-resolves those strings back to nodes — after the user
//! edited code and the graph was rebuilt. Formatting and parsing are exact
//! inverses for unambiguous names; malformed or stale strings resolve to
//! nothing, never to a crash.

use regex::Regex;

use crate::arena::NodeId;
use crate::manager::GraphManager;
use crate::node::NodeData;

/// Format the external name of a node.
///
/// Packages and classes use dotted qualification; methods append a
/// parenthesized signature of parameter type names; parameters hang off
/// their method with a `#` separator. The project root has no name.
pub fn external_name(g: &GraphManager, id: NodeId) -> Option<String> {
    let node = g.node(id)?;
    match &node.data {
        NodeData::Project => None,
        NodeData::Package | NodeData::Class(_) => qualified(g, id),
        NodeData::Field(_) => {
            let owner = qualified(g, node.owner?)?;
            Some(format!("{}.{}", owner, node.name))
        }
        NodeData::Method(m) => {
            let owner = qualified(g, node.owner?)?;
            let params: Vec<&str> = m
                .parameters
                .iter()
                .filter_map(|&p| g.node(p)?.param().map(|d| d.type_name.as_str()))
                .collect();
            Some(format!("{}.{}({})", owner, node.name, params.join(",")))
        }
        NodeData::Parameter(_) => {
            let method = external_name(g, node.owner?)?;
            Some(format!("{}#{}", method, node.name))
        }
    }
}

/// Dotted owner-chain name for packages and classes.
fn qualified(g: &GraphManager, id: NodeId) -> Option<String> {
    let mut segments = Vec::new();
    let mut cursor = Some(id);
    while let Some(c) = cursor {
        let node = g.node(c)?;
        if node.is_project() {
            break;
        }
        segments.push(node.name.clone());
        cursor = node.owner;
    }
    if segments.is_empty() {
        return None;
    }
    segments.reverse();
    Some(segments.join("."))
}

/// Resolve a dotted package/class name back to its node.
///
/// Walks the containment tree segment by segment; at each level a package
/// child is preferred over a class child of the same name, which mirrors
/// how the formatter qualifies.
pub fn class_from_external_name(g: &GraphManager, name: &str) -> Option<NodeId> {
    let mut cursor = g.project();
    for segment in name.split('.') {
        if segment.is_empty() {
            return None;
        }
        cursor = child_named(g, cursor, segment)?;
    }
    g.node(cursor)?.is_class().then_some(cursor)
}

fn child_named(g: &GraphManager, parent: NodeId, name: &str) -> Option<NodeId> {
    let node = g.node(parent)?;
    let mut class_match = None;
    for &child in &node.children {
        let Some(c) = g.node(child) else { continue };
        if c.name != name {
            continue;
        }
        if c.is_package() {
            return Some(child);
        }
        if c.is_class() && class_match.is_none() {
            class_match = Some(child);
        }
    }
    class_match
}

/// Resolve a `qualifier.name(type,type)` method signature back to its
/// node. Overloads are disambiguated by the parameter type list.
pub fn method_from_external_name(g: &GraphManager, name: &str) -> Option<NodeId> {
    let re = Regex::new(r"^(?P<qualifier>.+)\.(?P<name>[^.()]+)\((?P<params>[^()]*)\)$").ok()?;
    let caps = re.captures(name)?;
    let class = class_from_external_name(g, &caps["qualifier"])?;
    let method_name = &caps["name"];
    let wanted: Vec<&str> = match &caps["params"] {
        "" => Vec::new(),
        list => list.split(',').map(str::trim).collect(),
    };

    let class_node = g.node(class)?;
    for &child in &class_node.children {
        let Some(node) = g.node(child) else { continue };
        let Some(m) = node.method() else { continue };
        if node.name != method_name {
            continue;
        }
        let types: Vec<&str> = m
            .parameters
            .iter()
            .filter_map(|&p| g.node(p)?.param().map(|d| d.type_name.as_str()))
            .collect();
        if types == wanted {
            return Some(child);
        }
    }
    None
}

/// Resolve a `qualifier.field` name back to its node.
pub fn field_from_external_name(g: &GraphManager, name: &str) -> Option<NodeId> {
    let (qualifier, field_name) = name.rsplit_once('.')?;
    if field_name.is_empty() || field_name.contains('(') {
        return None;
    }
    let class = class_from_external_name(g, qualifier)?;
    let class_node = g.node(class)?;
    class_node
        .children
        .iter()
        .copied()
        .find(|&c| g.node(c).is_some_and(|n| n.is_field() && n.name == field_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ConventionalEntryPoints;
    use crate::model::{ModelBuilder, ProgramModel};

    fn build(model: &ProgramModel) -> GraphManager<'_> {
        let mut g = GraphManager::new(model);
        g.build(&ConventionalEntryPoints::default());
        g
    }

    #[test]
    fn test_class_name_round_trip() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("com.acme");
        let outer = b.class(pkg, "Outer");
        let inner = b.class(outer, "Inner");
        let model = b.finish();

        let g = build(&model);
        let id = g.node_of(inner).unwrap();
        let name = external_name(&g, id).unwrap();
        assert_eq!(name, "com.acme.Outer.Inner");
        assert_eq!(class_from_external_name(&g, &name), Some(id));
    }

    #[test]
    fn test_method_signature_round_trip() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("com.acme");
        let class = b.class(pkg, "A");
        let method = b.method(class, "run");
        b.parameter(method, "count", "int");
        b.parameter(method, "label", "String");
        let model = b.finish();

        let g = build(&model);
        let id = g.node_of(method).unwrap();
        let name = external_name(&g, id).unwrap();
        assert_eq!(name, "com.acme.A.run(int,String)");
        assert_eq!(method_from_external_name(&g, &name), Some(id));
    }

    #[test]
    fn test_overloads_resolved_by_signature() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let by_int = b.method(class, "run");
        b.parameter(by_int, "x", "int");
        let by_str = b.method(class, "run");
        b.parameter(by_str, "x", "String");
        let model = b.finish();

        let g = build(&model);
        assert_eq!(
            method_from_external_name(&g, "p.A.run(int)"),
            g.node_of(by_int)
        );
        assert_eq!(
            method_from_external_name(&g, "p.A.run(String)"),
            g.node_of(by_str)
        );
    }

    #[test]
    fn test_zero_arg_method_round_trip() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let method = b.method(class, "tick");
        let model = b.finish();

        let g = build(&model);
        let id = g.node_of(method).unwrap();
        assert_eq!(external_name(&g, id).unwrap(), "p.A.tick()");
        assert_eq!(method_from_external_name(&g, "p.A.tick()"), Some(id));
    }

    #[test]
    fn test_field_round_trip() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("com.acme");
        let class = b.class(pkg, "A");
        let field = b.field(class, "count");
        let model = b.finish();

        let g = build(&model);
        let id = g.node_of(field).unwrap();
        let name = external_name(&g, id).unwrap();
        assert_eq!(name, "com.acme.A.count");
        assert_eq!(field_from_external_name(&g, &name), Some(id));
    }

    #[test]
    fn test_malformed_names_resolve_to_nothing() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let _class = b.class(pkg, "A");
        let model = b.finish();

        let g = build(&model);
        assert!(class_from_external_name(&g, "").is_none());
        assert!(class_from_external_name(&g, "p..A").is_none());
        assert!(class_from_external_name(&g, "missing.Z").is_none());
        assert!(method_from_external_name(&g, "p.A.run").is_none());
        assert!(method_from_external_name(&g, "p.A.run(").is_none());
        assert!(field_from_external_name(&g, "count").is_none());
    }

    #[test]
    fn test_package_is_not_a_class() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("com.acme");
        let _class = b.class(pkg, "A");
        let model = b.finish();

        let g = build(&model);
        assert!(class_from_external_name(&g, "com.acme").is_none());
    }
}
