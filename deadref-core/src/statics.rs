//! Can-be-static maintenance.
//!
//! Run once per recorded reference: when code owned by one declaration
//! touches an instance member, some class on the accessor's lexical chain
//! can no longer be made static. Which one depends on whether the member
//! belongs to a class the accessor's class inherits from (the access goes
//! through `this`, so the whole lexical ancestor chain is pinned) or to an
//! unrelated enclosing class (only the nearest class is pinned, and the
//! question repeats one level up).
//!
//! Anonymous classes are transparent here: code inside one captures the
//! enclosing scope, so the check re-runs against the anonymous class's own
//! enclosing declaration.

use crate::arena::NodeId;
use crate::manager::GraphManager;
use crate::node::NodeFlags;

/// Record the can-be-static consequences of one access from `accessor`'s
/// code to `target`.
///
/// `static_context` marks accesses attributed to a static initializer
/// block; those never constrain instance-ness.
pub(crate) fn update_can_be_static(
    g: &mut GraphManager,
    accessor: NodeId,
    target: NodeId,
    static_context: bool,
) {
    if static_context {
        return;
    }
    let Some(t) = g.node(target) else {
        return;
    };
    // Only member accesses matter; locals never reach the graph, and
    // parameters say nothing about instance state.
    if !(t.is_method() || t.is_field()) {
        return;
    }
    if t.is_static() {
        return;
    }
    let Some(target_class) = t.owner.and_then(|o| g.nearest_class(o)) else {
        return;
    };

    let mut current = accessor;
    loop {
        let Some(ctx) = g.node(current) else {
            return;
        };
        // A static accessing context severs the chain: static code holds
        // no enclosing instance to pin.
        if ctx.is_static() {
            return;
        }
        let Some(accessor_class) = g.nearest_class(current) else {
            return;
        };
        let class_node = match g.node(accessor_class) {
            Some(n) => n,
            None => return,
        };
        if class_node.is_anonymous() {
            // Captured-outer semantics: the anonymous class itself is
            // never a static candidate; re-run against its enclosing
            // declaration.
            match class_node.owner {
                Some(owner) => {
                    current = owner;
                    continue;
                }
                None => return,
            }
        }

        if g.is_inheritor(accessor_class, target_class) {
            // Inherited instance member: the access goes through `this`,
            // pinning the accessing method, the class, and every lexical
            // ancestor.
            if g.node(current).is_some_and(|n| n.is_method()) {
                clear_one(g, current);
            }
            clear_up_chain(g, accessor_class);
            return;
        }

        // Unrelated instance member of an enclosing class: only the
        // nearest class is pinned; ask the same question one level up.
        clear_one(g, accessor_class);
        let owner = g.node(accessor_class).and_then(|n| n.owner);
        match owner {
            Some(owner) if g.node(owner).is_some_and(|n| !n.is_project() && !n.is_package()) => {
                current = owner;
            }
            _ => return,
        }
    }
}

fn clear_one(g: &mut GraphManager, class: NodeId) {
    if let Some(n) = g.node_mut(class) {
        n.flags.remove(NodeFlags::CAN_BE_STATIC);
    }
}

fn clear_up_chain(g: &mut GraphManager, class: NodeId) {
    let mut cursor = Some(class);
    while let Some(c) = cursor {
        let Some(node) = g.node(c) else { break };
        let owner = node.owner;
        if node.is_class() {
            clear_one(g, c);
        }
        cursor = owner;
    }
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

    fn can_be_static(g: &GraphManager, decl: crate::model::DeclId) -> bool {
        g.node(g.node_of(decl).unwrap())
            .unwrap()
            .flags
            .contains(NodeFlags::CAN_BE_STATIC)
    }

    #[test]
    fn test_instance_field_access_pins_method_class() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let outer = b.class(pkg, "Outer");
        let inner = b.class(outer, "Inner");
        let field = b.field(outer, "state");
        let method = b.method(inner, "peek");
        b.access(method, Access::read(field));
        let model = b.finish();

        let g = build(&model);
        // Inner reads an unrelated enclosing instance member.
        assert!(!can_be_static(&g, inner));
    }

    #[test]
    fn test_static_member_access_does_not_pin() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let outer = b.class(pkg, "Outer");
        let inner = b.class(outer, "Inner");
        let field = b.field(outer, "SHARED");
        b.decl_mut(field).is_static = true;
        let method = b.method(inner, "peek");
        b.access(method, Access::read(field));
        let model = b.finish();

        let g = build(&model);
        assert!(can_be_static(&g, inner));
    }

    #[test]
    fn test_static_accessor_does_not_pin() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let outer = b.class(pkg, "Outer");
        let inner = b.class(outer, "Inner");
        let field = b.field(outer, "state");
        let method = b.method(inner, "peek");
        b.decl_mut(method).is_static = true;
        b.access(method, Access::read(field));
        let model = b.finish();

        let g = build(&model);
        assert!(can_be_static(&g, inner));
    }

    #[test]
    fn test_inherited_member_pins_whole_chain() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let base = b.class(pkg, "Base");
        let field = b.field(base, "state");
        let outer = b.class(pkg, "Outer");
        let inner = b.class(outer, "Inner");
        b.class_mut(inner).supertypes.push(base);
        let method = b.method(inner, "peek");
        b.access(method, Access::read(field));
        let model = b.finish();

        let g = build(&model);
        // Inner inherits the member: Inner and its lexical ancestors lose
        // the static candidacy.
        assert!(!can_be_static(&g, inner));
        assert!(!can_be_static(&g, outer));
    }

    #[test]
    fn test_anonymous_class_access_pins_enclosing_class() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let outer = b.class(pkg, "A");
        let field = b.field(outer, "state");
        let method = b.method(outer, "run");
        let anon = b.class(method, "A$1");
        b.class_mut(anon).is_anonymous = true;
        let anon_method = b.method(anon, "call");
        b.access(anon_method, Access::read(field));
        let model = b.finish();

        let g = build(&model);
        // The read inside the anonymous class reaches A's own instance
        // state, so A itself is pinned, not just the anonymous class.
        assert!(!can_be_static(&g, outer));
    }

    #[test]
    fn test_own_instance_member_pins_class() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let outer = b.class(pkg, "Outer");
        let inner = b.class(outer, "Inner");
        let field = b.field(inner, "state");
        let method = b.method(inner, "peek");
        b.access(method, Access::read(field));
        let model = b.finish();

        let g = build(&model);
        // Inner reads its own instance state: Inner is pinned (the access
        // is through `this`), and so is the lexical ancestor chain.
        assert!(!can_be_static(&g, inner));
    }
}
