//! Field finality: definite single assignment across all construction paths.
//!
//! A field can be made final only if it is assigned exactly once no matter
//! how an instance (or the class, for statics) comes into being. The
//! accounting runs in two stages per class:
//!
//! 1. **Placement filter** — any write outside a constructor of the field's
//!    class or an initializer block of matching staticness disqualifies the
//!    field outright (the declaration-site initializer is not a recorded
//!    write and stays exempt).
//! 2. **Path accounting** — survivors must be assigned exactly once on
//!    every path: by the declaration initializer, by exactly one
//!    initializer block, or by every constructor. Constructors that
//!    redirect to an in-class sibling defer to the redirect chain's final
//!    target for the fields that target assigns.
//!
//! The per-block "exactly once on every path" question is answered by
//! [`crate::flow::single_assigned_vars`].

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::arena::NodeId;
use crate::flow::{single_assigned_vars, ControlFlow};
use crate::manager::GraphManager;
use crate::model::{AccessContext, AccessKind, DeclId, ProgramModel};
use crate::node::NodeFlags;

/// One recorded write: who wrote, and from what context.
type WriteMap = HashMap<DeclId, Vec<(DeclId, AccessContext)>>;

/// Run the finality accounting for every class in the graph.
pub(crate) fn apply(g: &mut GraphManager) {
    let model = g.model();
    let mut writes: WriteMap = HashMap::new();
    for decl in &model.declarations {
        for access in &decl.accesses {
            if access.kind == AccessKind::Write {
                writes
                    .entry(access.target)
                    .or_default()
                    .push((decl.id, access.context));
            }
        }
    }

    let class_ids: Vec<NodeId> = g
        .iter()
        .filter(|(_, n)| n.is_class())
        .map(|(id, _)| id)
        .collect();
    for class in class_ids {
        apply_class(g, class, &writes);
    }
}

fn apply_class(g: &mut GraphManager, class: NodeId, writes: &WriteMap) {
    let model = g.model();
    let Some(class_src) = g.node(class).and_then(|n| n.source) else {
        return;
    };
    let Some(class_decl) = model.decl(class_src) else {
        return;
    };
    let Some(class_data) = class_decl.as_class() else {
        return;
    };

    // Fields of this class, from the containment tree.
    let fields: Vec<(NodeId, DeclId)> = g
        .node(class)
        .map(|n| n.children.clone())
        .unwrap_or_default()
        .into_iter()
        .filter_map(|c| {
            let node = g.node(c)?;
            node.is_field().then_some(())?;
            Some((c, node.source?))
        })
        .collect();
    if fields.is_empty() {
        return;
    }
    let all_fields: HashSet<DeclId> = fields.iter().map(|&(_, d)| d).collect();

    // Stage 1: placement filter.
    let mut candidates: HashSet<DeclId> = HashSet::new();
    for &(_, field) in &fields {
        if write_placement_ok(model, class_src, field, writes) {
            candidates.insert(field);
        }
    }

    // Per-block single-assignment sets, shared across all fields.
    let instance_blocks: Vec<BlockFacts> = class_data
        .initializers
        .iter()
        .filter(|b| !b.is_static)
        .map(|b| BlockFacts::of(&b.flow, &all_fields))
        .collect();
    let static_blocks: Vec<BlockFacts> = class_data
        .initializers
        .iter()
        .filter(|b| b.is_static)
        .map(|b| BlockFacts::of(&b.flow, &all_fields))
        .collect();

    // Explicit constructors with their flow facts and redirect targets.
    let mut ctors: Vec<CtorFacts> = Vec::new();
    for decl in &model.declarations {
        if decl.owner != Some(class_src) {
            continue;
        }
        let Some(m) = decl.as_method() else { continue };
        if !m.is_constructor {
            continue;
        }
        ctors.push(CtorFacts::of(model, decl.id, &all_fields));
    }

    let keep: Vec<DeclId> = candidates
        .iter()
        .copied()
        .filter(|&f| field_stays_final(model, class_src, f, writes, &instance_blocks, &static_blocks, &ctors))
        .collect();

    for &(node, field) in &fields {
        if !keep.contains(&field) {
            if let Some(n) = g.node_mut(node) {
                n.flags.remove(NodeFlags::CAN_BE_FINAL);
            }
        }
    }
    debug!(
        class = %class_decl.name,
        fields = fields.len(),
        final_candidates = keep.len(),
        "finality accounting"
    );
}

/// Stage 1: every recorded write must come from a constructor of the
/// field's own class or an initializer block of matching staticness.
fn write_placement_ok(
    model: &ProgramModel,
    class: DeclId,
    field: DeclId,
    writes: &WriteMap,
) -> bool {
    let is_static = model.decl(field).is_some_and(|d| d.is_static);
    let Some(entries) = writes.get(&field) else {
        return true;
    };
    entries.iter().all(|&(writer, context)| {
        if is_static {
            context == AccessContext::StaticInitializer && writer == class
        } else {
            match context {
                AccessContext::Initializer => writer == class,
                AccessContext::Code => is_constructor_of(model, writer, class),
                AccessContext::StaticInitializer => false,
            }
        }
    })
}

fn is_constructor_of(model: &ProgramModel, method: DeclId, class: DeclId) -> bool {
    model.decl(method).is_some_and(|d| {
        d.owner == Some(class) && d.as_method().is_some_and(|m| m.is_constructor)
    })
}

/// Flow facts of one initializer block.
struct BlockFacts {
    assigned_once: HashSet<DeclId>,
    written: HashSet<DeclId>,
}

impl BlockFacts {
    fn of(flow: &ControlFlow, fields: &HashSet<DeclId>) -> Self {
        Self {
            assigned_once: single_assigned_vars(flow, fields),
            written: flow
                .written_vars()
                .intersection(fields)
                .copied()
                .collect(),
        }
    }
}

/// Flow facts of one explicit constructor, including its redirect chain.
struct CtorFacts {
    /// Fields this constructor's own body assigns exactly once per path.
    assigned_once: HashSet<DeclId>,
    /// Fields this constructor's own body writes at all.
    written: HashSet<DeclId>,
    /// Final target of a redirecting-constructor chain, if any.
    redirect: Option<DeclId>,
    /// The redirect target's single-assignment set.
    redirect_assigned: HashSet<DeclId>,
    has_flow: bool,
}

impl CtorFacts {
    fn of(model: &ProgramModel, ctor: DeclId, fields: &HashSet<DeclId>) -> Self {
        let flow = model
            .decl(ctor)
            .and_then(|d| d.as_method())
            .and_then(|m| m.flow.as_ref());
        let (assigned_once, written) = match flow {
            Some(flow) => (
                single_assigned_vars(flow, fields),
                flow.written_vars().intersection(fields).copied().collect(),
            ),
            None => (HashSet::new(), HashSet::new()),
        };
        let redirect = final_redirect_target(model, ctor);
        let redirect_assigned = redirect
            .and_then(|t| model.decl(t))
            .and_then(|d| d.as_method())
            .and_then(|m| m.flow.as_ref())
            .map(|f| single_assigned_vars(f, fields))
            .unwrap_or_default();
        Self {
            assigned_once,
            written,
            redirect,
            redirect_assigned,
            has_flow: flow.is_some(),
        }
    }
}

/// Resolve a redirecting-constructor chain to its final target.
///
/// Chains of any depth are followed; a cyclic chain is an anomaly and is
/// treated as no redirect at all (the constructor's own body counts).
fn final_redirect_target(model: &ProgramModel, ctor: DeclId) -> Option<DeclId> {
    let mut visited = HashSet::from([ctor]);
    let mut current = ctor;
    loop {
        let target = model
            .decl(current)
            .and_then(|d| d.as_method())
            .and_then(|m| m.flow.as_ref())
            .and_then(|f| f.delegate_target());
        match target {
            Some(t) if model.belongs_to_scope(t) => {
                if !visited.insert(t) {
                    return None;
                }
                current = t;
            }
            _ => return (current != ctor).then_some(current),
        }
    }
}

/// Stage 2: definite single assignment across every construction path.
#[allow(clippy::too_many_arguments)]
fn field_stays_final(
    model: &ProgramModel,
    class: DeclId,
    field: DeclId,
    writes: &WriteMap,
    instance_blocks: &[BlockFacts],
    static_blocks: &[BlockFacts],
    ctors: &[CtorFacts],
) -> bool {
    let decl = match model.decl(field) {
        Some(d) => d,
        None => return false,
    };
    let has_initializer = decl.as_field().is_some_and(|f| f.has_initializer);
    let blocks = if decl.is_static {
        static_blocks
    } else {
        instance_blocks
    };

    // A block that writes the field without assigning it exactly once on
    // every path through itself disqualifies it regardless of anything else.
    if blocks
        .iter()
        .any(|b| b.written.contains(&field) && !b.assigned_once.contains(&field))
    {
        return false;
    }
    let assigning_blocks = blocks
        .iter()
        .filter(|b| b.assigned_once.contains(&field))
        .count();
    let ctor_writes = |f: DeclId| {
        writes.get(&f).is_some_and(|entries| {
            entries
                .iter()
                .any(|&(writer, ctx)| ctx == AccessContext::Code && is_constructor_of(model, writer, class))
        })
    };

    if has_initializer {
        // The declaration initializer is the single assignment; any other
        // write is a duplicate.
        return assigning_blocks == 0
            && blocks.iter().all(|b| !b.written.contains(&field))
            && !ctor_writes(field);
    }

    if decl.is_static {
        // Statics are only constructed through static initializers.
        return assigning_blocks == 1;
    }

    match assigning_blocks {
        // Initialized by one instance initializer: constructors must not
        // touch it again.
        1 => !ctor_writes(field),
        // Two initializer blocks both assigning is duplicate initialization.
        n if n > 1 => false,
        // Not reached by initializers: every explicit constructor must
        // definitely assign it (an implicit constructor assigns nothing).
        _ => {
            if ctors.is_empty() {
                return false;
            }
            ctors.iter().all(|ctor| ctor_assigns(ctor, field))
        }
    }
}

/// Does one constructor definitely assign the field exactly once?
fn ctor_assigns(ctor: &CtorFacts, field: DeclId) -> bool {
    if ctor.redirect.is_some() {
        if ctor.redirect_assigned.contains(&field) {
            // Handled by the redirect target; a second write in the
            // redirecting body would be a duplicate.
            return !ctor.written.contains(&field);
        }
        // Not handled by the chain: this constructor's own set applies.
        return ctor.assigned_once.contains(&field);
    }
    if !ctor.has_flow {
        // Body unknown: nothing can be proven for this path.
        return false;
    }
    ctor.assigned_once.contains(&field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ConventionalEntryPoints;
    use crate::flow::Instruction;
    use crate::model::{Access, InitializerBlock, ModelBuilder, ProgramModel};

    fn build(model: &ProgramModel) -> GraphManager<'_> {
        let mut g = GraphManager::new(model);
        g.build(&ConventionalEntryPoints::default());
        g
    }

    fn can_be_final(g: &GraphManager, decl: DeclId) -> bool {
        g.node(g.node_of(decl).unwrap())
            .unwrap()
            .flags
            .contains(NodeFlags::CAN_BE_FINAL)
    }

    /// Constructor assigning `field` once, unconditionally.
    fn assigning_ctor(b: &mut ModelBuilder, class: DeclId, field: DeclId) -> DeclId {
        let ctor = b.constructor(class);
        b.method_mut(ctor).flow = Some(ControlFlow::new(vec![
            Instruction::Write(field),
            Instruction::Ret,
        ]));
        b.access(ctor, Access::write(field));
        ctor
    }

    #[test]
    fn test_assigned_once_in_every_constructor() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let field = b.field(class, "value");
        assigning_ctor(&mut b, class, field);
        assigning_ctor(&mut b, class, field);
        let model = b.finish();

        let g = build(&model);
        assert!(can_be_final(&g, field));
    }

    #[test]
    fn test_write_in_plain_method_disqualifies() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let field = b.field(class, "value");
        assigning_ctor(&mut b, class, field);
        let setter = b.method(class, "set");
        b.access(setter, Access::write(field));
        let model = b.finish();

        let g = build(&model);
        assert!(!can_be_final(&g, field));
    }

    #[test]
    fn test_conditional_assignment_disqualifies() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let field = b.field(class, "value");
        let ctor = b.constructor(class);
        // if (cond) { value = ...; }
        b.method_mut(ctor).flow = Some(ControlFlow::new(vec![
            Instruction::CondGoto(2),
            Instruction::Write(field),
            Instruction::Ret,
        ]));
        b.access(ctor, Access::write(field));
        let model = b.finish();

        let g = build(&model);
        assert!(!can_be_final(&g, field));
    }

    #[test]
    fn test_one_constructor_missing_assignment_disqualifies() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let field = b.field(class, "value");
        assigning_ctor(&mut b, class, field);
        let empty = b.constructor(class);
        b.method_mut(empty).flow = Some(ControlFlow::new(vec![Instruction::Ret]));
        let model = b.finish();

        let g = build(&model);
        assert!(!can_be_final(&g, field));
    }

    #[test]
    fn test_never_assigned_disqualifies() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let field = b.field(class, "value");
        let model = b.finish();

        let g = build(&model);
        assert!(!can_be_final(&g, field));
    }

    #[test]
    fn test_declaration_initializer_alone_is_final() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let field = b.field(class, "value");
        b.field_mut(field).has_initializer = true;
        let ctor = b.constructor(class);
        b.method_mut(ctor).flow = Some(ControlFlow::new(vec![Instruction::Ret]));
        let model = b.finish();

        let g = build(&model);
        assert!(can_be_final(&g, field));
    }

    #[test]
    fn test_declaration_initializer_plus_ctor_write_disqualifies() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let field = b.field(class, "value");
        b.field_mut(field).has_initializer = true;
        assigning_ctor(&mut b, class, field);
        let model = b.finish();

        let g = build(&model);
        assert!(!can_be_final(&g, field));
    }

    #[test]
    fn test_initializer_block_assignment_is_final() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let field = b.field(class, "value");
        b.class_mut(class).initializers.push(InitializerBlock {
            is_static: false,
            flow: ControlFlow::new(vec![Instruction::Write(field), Instruction::Ret]),
        });
        b.access(
            class,
            Access::write(field).in_context(AccessContext::Initializer),
        );
        let model = b.finish();

        let g = build(&model);
        assert!(can_be_final(&g, field));
    }

    #[test]
    fn test_duplicate_initializer_blocks_disqualify() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let field = b.field(class, "value");
        for _ in 0..2 {
            b.class_mut(class).initializers.push(InitializerBlock {
                is_static: false,
                flow: ControlFlow::new(vec![Instruction::Write(field), Instruction::Ret]),
            });
            b.access(
                class,
                Access::write(field).in_context(AccessContext::Initializer),
            );
        }
        let model = b.finish();

        let g = build(&model);
        assert!(!can_be_final(&g, field));
    }

    #[test]
    fn test_static_field_in_static_initializer() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let field = b.field(class, "TABLE");
        b.decl_mut(field).is_static = true;
        b.class_mut(class).initializers.push(InitializerBlock {
            is_static: true,
            flow: ControlFlow::new(vec![Instruction::Write(field), Instruction::Ret]),
        });
        b.access(
            class,
            Access::write(field).in_context(AccessContext::StaticInitializer),
        );
        let model = b.finish();

        let g = build(&model);
        assert!(can_be_final(&g, field));
    }

    #[test]
    fn test_static_field_written_in_constructor_disqualifies() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let field = b.field(class, "COUNTER");
        b.decl_mut(field).is_static = true;
        assigning_ctor(&mut b, class, field);
        let model = b.finish();

        let g = build(&model);
        assert!(!can_be_final(&g, field));
    }

    #[test]
    fn test_redirecting_constructor_defers_to_target() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let field = b.field(class, "value");
        let primary = assigning_ctor(&mut b, class, field);
        let redirecting = b.constructor(class);
        b.method_mut(redirecting).flow = Some(ControlFlow::new(vec![
            Instruction::Delegate(primary),
            Instruction::Ret,
        ]));
        let model = b.finish();

        let g = build(&model);
        assert!(can_be_final(&g, field));
    }

    #[test]
    fn test_redirecting_constructor_rewrite_disqualifies() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let field = b.field(class, "value");
        let primary = assigning_ctor(&mut b, class, field);
        let redirecting = b.constructor(class);
        // this(...) followed by a second write of the same field.
        b.method_mut(redirecting).flow = Some(ControlFlow::new(vec![
            Instruction::Delegate(primary),
            Instruction::Write(field),
            Instruction::Ret,
        ]));
        b.access(redirecting, Access::write(field));
        let model = b.finish();

        let g = build(&model);
        assert!(!can_be_final(&g, field));
    }

    #[test]
    fn test_two_level_redirect_chain() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let field = b.field(class, "value");
        let primary = assigning_ctor(&mut b, class, field);
        let middle = b.constructor(class);
        b.method_mut(middle).flow = Some(ControlFlow::new(vec![
            Instruction::Delegate(primary),
            Instruction::Ret,
        ]));
        let outer = b.constructor(class);
        b.method_mut(outer).flow = Some(ControlFlow::new(vec![
            Instruction::Delegate(middle),
            Instruction::Ret,
        ]));
        let model = b.finish();

        let g = build(&model);
        // Depth-2 chain resolves to the primary's assignment.
        assert!(can_be_final(&g, field));
    }
}
