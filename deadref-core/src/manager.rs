//! Graph construction and lifecycle: the one owner of all nodes.
//!
//! The [`GraphManager`] holds the node arena and the identity map from
//! source declarations to nodes, and is the only component allowed to
//! create or delete nodes. Construction is a two-phase batch:
//!
//! 1. **Materialize** — visit every in-scope declaration and create its
//!    node, recursively creating the syntactic owner chain first (member
//!    nodes need their owning class node). Structural facts (abstract,
//!    interface, static, inheritance links, override links) are recorded
//!    here, and classes with no explicit constructor get a synthetic
//!    default-constructor node chained to their bases' default constructors.
//! 2. **Build references** — walk every declaration's resolved accesses and
//!    record symmetric in/out edges, usage flags, constant templates, and
//!    the can-be-static consequences of each access.
//!
//! Both phases run inside an explicit build bracket. Node creation outside
//! an open bracket is a usage error and yields no node rather than mutating
//! shared state. After the bracket closes, the graph is immutable and
//! read-only queries are safe from any number of readers.

use std::collections::{HashMap, HashSet};

use tracing::{debug, error, info};

use crate::arena::{NodeArena, NodeId};
use crate::entry::EntryPointPolicy;
use crate::model::{
    Access, AccessContext, AccessKind, DeclDetails, DeclId, Declaration, ProgramModel,
};
use crate::node::{ClassData, FieldData, MethodData, Node, NodeData, NodeFlags, ParamData};
use crate::{finality, reach, statics};

/// Owner of the declaration graph for one analysis run.
///
/// Constructed per run and discarded wholesale afterward; cancellation is
/// abandonment, nothing needs rolling back.
pub struct GraphManager<'m> {
    model: &'m ProgramModel,
    pub(crate) arena: NodeArena,
    /// Identity map: source declaration -> node. The only strong path into
    /// the graph besides the arena itself.
    nodes: HashMap<DeclId, NodeId>,
    project: NodeId,
    /// Build/mutation bracket state.
    in_process: bool,
    /// Declarations currently being materialized; guards supertype cycles.
    creating: HashSet<DeclId>,
    /// Declarations whose nodes were removed; they stay invalid for the
    /// rest of the run.
    removed: HashSet<DeclId>,
}

impl<'m> GraphManager<'m> {
    /// Create an empty graph over a model. No nodes exist yet besides the
    /// project root; call [`GraphManager::build`].
    pub fn new(model: &'m ProgramModel) -> Self {
        let mut arena = NodeArena::new();
        let project = arena.insert(Node::new(None, "project", NodeData::Project));
        Self {
            model,
            arena,
            nodes: HashMap::new(),
            project,
            in_process: false,
            creating: HashSet::new(),
            removed: HashSet::new(),
        }
    }

    pub fn model(&self) -> &'m ProgramModel {
        self.model
    }

    pub fn project(&self) -> NodeId {
        self.project
    }

    /// Open the build/mutation bracket.
    pub fn enter(&mut self) {
        debug_assert!(!self.in_process, "build bracket is not reentrant");
        self.in_process = true;
    }

    /// Close the build/mutation bracket. The graph is read-only until the
    /// next bracket opens.
    pub fn exit(&mut self) {
        debug_assert!(self.in_process, "no bracket open");
        self.in_process = false;
        #[cfg(debug_assertions)]
        self.assert_consistent();
    }

    /// Whole-scope construction: materialize every declaration, synthesize
    /// implicit constructors, build all reference edges, then run the
    /// per-run analyses (entry marking, reachability, field finality).
    pub fn build(&mut self, policy: &dyn EntryPointPolicy) {
        let model = self.model;
        self.enter();

        // Phase 1: materialize. Owner-chain recursion guarantees classes
        // exist before their members.
        for id in model.ids() {
            self.get_or_create(id);
        }
        self.finalize_constructors();
        info!(nodes = self.arena.len(), "declaration nodes materialized");

        // Phase 2: reference edges.
        for id in model.ids() {
            self.build_references(id);
        }
        self.detect_utility_classes();

        reach::mark_entry_points(self, policy);
        reach::mark_reachable(self);
        finality::apply(self);

        self.exit();
        info!(
            nodes = self.arena.len(),
            edges = self.edge_count(),
            "reference graph complete"
        );
    }

    /// The memoized node for a source declaration, creating it (and its
    /// owner chain) on first encounter.
    ///
    /// Yields none for declarations outside the analysis scope, removed
    /// (invalid) declarations, and any call outside an open bracket — the
    /// latter is a usage error, reported as an absence rather than a crash.
    pub fn get_or_create(&mut self, decl: DeclId) -> Option<NodeId> {
        if !self.in_process {
            error!(decl = decl.0, "node requested outside build bracket");
            return None;
        }
        if let Some(&id) = self.nodes.get(&decl) {
            return self.arena.contains(id).then_some(id);
        }
        if self.removed.contains(&decl) {
            return None;
        }
        let model = self.model;
        let d = model.decl(decl)?;
        if self.creating.contains(&decl) {
            // Supertype cycle; treat the anomalous link as absent.
            debug!(decl = decl.0, "declaration cycle, skipping");
            return None;
        }
        self.creating.insert(decl);

        let owner_node = match d.owner {
            Some(o) => self.get_or_create(o),
            None => Some(self.project),
        };
        let created = owner_node.map(|owner| {
            let node = Self::materialize(d);
            let id = self.arena.insert(node);
            self.nodes.insert(decl, id);
            self.attach(owner, id);
            // Only a nested class can be *made* static; top-level classes
            // have no enclosing instance to shed.
            if d.is_class() && !d.is_static {
                let nested = self
                    .arena
                    .get(owner)
                    .is_some_and(|o| o.is_class() || o.is_method() || o.is_field());
                let anonymous = d.as_class().is_some_and(|c| c.is_anonymous);
                if nested && !anonymous {
                    if let Some(n) = self.arena.get_mut(id) {
                        n.flags.insert(NodeFlags::CAN_BE_STATIC);
                    }
                }
            }
            match &d.details {
                DeclDetails::Class(_) => self.wire_class(id, d),
                DeclDetails::Method(_) => self.wire_method(id, d),
                DeclDetails::Parameter(_) => self.register_parameter(id, owner),
                DeclDetails::Package | DeclDetails::Field(_) => {}
            }
            id
        });

        self.creating.remove(&decl);
        created
    }

    /// Node lookup without creation. Safe outside the bracket.
    pub fn node_of(&self, decl: DeclId) -> Option<NodeId> {
        let id = *self.nodes.get(&decl)?;
        self.arena.contains(id).then_some(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.arena.get(id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.arena.get_mut(id)
    }

    /// Iterate every live node.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.arena.iter()
    }

    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    pub fn edge_count(&self) -> usize {
        self.arena.iter().map(|(_, n)| n.out_edges.len()).sum()
    }

    // ------------------------------------------------------------------
    // Phase 1: materialization
    // ------------------------------------------------------------------

    /// Structural facts only; no cross-node links.
    fn materialize(d: &Declaration) -> Node {
        let mut flags = NodeFlags::empty();
        if d.is_static {
            flags |= NodeFlags::STATIC;
        }
        if d.is_final {
            flags |= NodeFlags::FINAL;
        }
        if d.is_abstract {
            flags |= NodeFlags::ABSTRACT;
        }
        if d.roles.test_case {
            flags |= NodeFlags::TEST_CASE;
        }
        if d.roles.servlet_like {
            flags |= NodeFlags::SERVLET_ROLE;
        }
        if d.roles.remote {
            flags |= NodeFlags::REMOTE_ROLE;
        }

        let data = match &d.details {
            DeclDetails::Package => NodeData::Package,
            DeclDetails::Class(c) => {
                if c.is_interface {
                    flags |= NodeFlags::INTERFACE;
                }
                if c.is_anonymous {
                    flags |= NodeFlags::ANONYMOUS;
                }
                if c.is_local {
                    flags |= NodeFlags::LOCAL;
                }
                // Final-ness candidates are concrete classes only. The
                // can-be-static candidacy needs the owner and is decided
                // after the node is attached.
                if !c.is_interface && !d.is_abstract {
                    flags |= NodeFlags::CAN_BE_FINAL;
                }
                NodeData::Class(ClassData::default())
            }
            DeclDetails::Method(m) => {
                if m.is_constructor {
                    flags |= NodeFlags::CONSTRUCTOR;
                }
                if m.main_like {
                    flags |= NodeFlags::APP_MAIN;
                }
                if !d.is_static && !m.is_constructor && !d.is_abstract {
                    flags |= NodeFlags::CAN_BE_STATIC;
                }
                if !d.is_abstract {
                    flags |= NodeFlags::CAN_BE_FINAL;
                }
                let mut data = MethodData {
                    // Declared-but-never-raised exception types.
                    unthrown_exceptions: Some(
                        m.throws
                            .iter()
                            .filter(|t| !m.thrown.contains(t))
                            .cloned()
                            .collect(),
                    ),
                    ..MethodData::default()
                };
                for ret in &m.returns {
                    data.return_value.merge(ret.as_ref());
                }
                NodeData::Method(data)
            }
            DeclDetails::Field(f) => {
                flags |= NodeFlags::CAN_BE_FINAL | NodeFlags::ONLY_INIT_ASSIGNED;
                NodeData::Field(FieldData {
                    has_initializer: f.has_initializer,
                    constant_value: f.constant_value.clone(),
                })
            }
            DeclDetails::Parameter(p) => {
                flags |= NodeFlags::CAN_BE_FINAL;
                NodeData::Parameter(ParamData {
                    index: p.index,
                    type_name: p.type_name.clone(),
                    value: Default::default(),
                })
            }
        };

        let mut node = Node::new(Some(d.id), d.name.clone(), data);
        node.flags = flags;
        node.access = d.access;
        node
    }

    /// Containment-tree attach: sets the owner and appends to children.
    fn attach(&mut self, owner: NodeId, child: NodeId) {
        if let Some(node) = self.arena.get_mut(child) {
            debug_assert!(node.owner.is_none(), "node already owned");
            node.owner = Some(owner);
        }
        if let Some(node) = self.arena.get_mut(owner) {
            node.children.push(child);
        }
    }

    /// Inheritance links: resolve each declared supertype, skipping self
    /// references and cycles, and record the symmetric bases/subclasses
    /// pair. A base with an in-scope subtype can no longer be made final.
    fn wire_class(&mut self, id: NodeId, d: &Declaration) {
        let class = d.as_class().expect("class declaration");
        for &st in &class.supertypes {
            if st == d.id {
                debug!(class = %d.name, "self-inheriting supertype skipped");
                continue;
            }
            let Some(base) = self.get_or_create(st) else {
                continue;
            };
            if let Some(n) = self.arena.get_mut(id).and_then(|n| n.class_mut()) {
                n.bases.insert(base);
            }
            if let Some(b) = self.arena.get_mut(base) {
                if let Some(bc) = b.class_mut() {
                    bc.subclasses.insert(id);
                }
                b.flags.remove(NodeFlags::CAN_BE_FINAL);
            }
        }
    }

    /// Override links, library-override detection, and constructor
    /// registration on the owning class.
    fn wire_method(&mut self, id: NodeId, d: &Declaration) {
        let method = d.as_method().expect("method declaration");

        if method.is_constructor {
            let owner = self.arena.get(id).and_then(|n| n.owner);
            if let Some(class) = owner {
                if let Some(c) = self.arena.get_mut(class).and_then(|n| n.class_mut()) {
                    c.constructors.push(id);
                }
                // A constructor reads its enclosing class (instance state).
                self.add_edge(id, class);
            }
        }

        for p in method.parameters.clone() {
            self.get_or_create(p);
        }

        for &sup in &method.overrides {
            if self.model.belongs_to_scope(sup) {
                let Some(super_node) = self.get_or_create(sup) else {
                    continue;
                };
                if let Some(n) = self.arena.get_mut(id).and_then(|n| n.method_mut()) {
                    n.super_methods.insert(super_node);
                }
                let mut inherit_library = false;
                if let Some(s) = self.arena.get_mut(super_node) {
                    if let Some(sm) = s.method_mut() {
                        sm.derived_methods.insert(id);
                    }
                    // An overridden method can be neither static nor final.
                    s.flags
                        .remove(NodeFlags::CAN_BE_STATIC | NodeFlags::CAN_BE_FINAL);
                    inherit_library = s.flags.contains(NodeFlags::LIBRARY_OVERRIDE);
                }
                // Dispatch edge: a call through the base declaration can
                // land on this override.
                self.add_edge(super_node, id);
                if inherit_library {
                    self.mark_library_override(id);
                }
            } else {
                // Overriding something the analysis cannot see: unseen
                // external code may call it.
                self.mark_library_override(id);
            }
        }
    }

    fn mark_library_override(&mut self, id: NodeId) {
        let owner = {
            let Some(n) = self.arena.get_mut(id) else {
                return;
            };
            n.flags.insert(NodeFlags::LIBRARY_OVERRIDE);
            n.owner
        };
        if let Some(class) = owner {
            if let Some(c) = self.arena.get_mut(class) {
                c.flags.remove(NodeFlags::CAN_BE_STATIC);
            }
        }
    }

    /// Keeps the owning method's positional parameter list in sync.
    /// Creation order can differ from signature order (the owner chain is
    /// built on demand), so the list is re-sorted by declared position.
    fn register_parameter(&mut self, id: NodeId, owner: NodeId) {
        let index_of = |arena: &NodeArena, p: NodeId| {
            arena.get(p).and_then(|n| n.param()).map_or(0, |p| p.index)
        };
        let mut params = match self.arena.get(owner).and_then(|n| n.method()) {
            Some(m) => m.parameters.clone(),
            None => return,
        };
        if !params.contains(&id) {
            params.push(id);
        }
        params.sort_by_key(|&p| index_of(&self.arena, p));
        if let Some(m) = self.arena.get_mut(owner).and_then(|n| n.method_mut()) {
            m.parameters = params;
        }
    }

    /// After all explicit constructors are known: pick each class's
    /// default constructor and synthesize implicit ones for classes with
    /// no constructor at all, chaining them to the bases' defaults so a
    /// subclass's implicit construction transitively reaches the base's.
    fn finalize_constructors(&mut self) {
        let class_ids: Vec<NodeId> = self
            .arena
            .iter()
            .filter(|(_, n)| n.is_class())
            .map(|(id, _)| id)
            .collect();

        for &class in &class_ids {
            self.assign_default_constructor(class);
        }
        for &class in &class_ids {
            self.chain_implicit_constructor(class);
        }
    }

    fn assign_default_constructor(&mut self, class: NodeId) {
        let Some(node) = self.arena.get(class) else {
            return;
        };
        let data = node.class().expect("class node");
        if !data.constructors.is_empty() {
            let zero_arg = data.constructors.iter().copied().find(|&c| {
                self.arena
                    .get(c)
                    .and_then(|n| n.method())
                    .is_some_and(|m| m.parameters.is_empty())
            });
            if let Some(c) = self.arena.get_mut(class).and_then(|n| n.class_mut()) {
                c.default_constructor = zero_arg;
            }
            return;
        }
        if node.is_interface() || node.is_anonymous() {
            return;
        }
        self.create_implicit_constructor(class);
    }

    /// Synthesize the implicit default constructor of `class`. The node
    /// has no source declaration; its name and access mirror the class.
    fn create_implicit_constructor(&mut self, class: NodeId) -> Option<NodeId> {
        let (name, access) = {
            let node = self.arena.get(class)?;
            (node.name.clone(), node.access)
        };
        let mut ctor = Node::new(None, name, NodeData::Method(MethodData::default()));
        ctor.flags = NodeFlags::CONSTRUCTOR | NodeFlags::IMPLICIT_CTOR;
        ctor.access = access;
        let id = self.arena.insert(ctor);
        self.attach(class, id);
        if let Some(c) = self.arena.get_mut(class).and_then(|n| n.class_mut()) {
            c.constructors.push(id);
            c.default_constructor = Some(id);
        }
        Some(id)
    }

    /// Wire an implicit constructor to every base's default constructor.
    fn chain_implicit_constructor(&mut self, class: NodeId) {
        let Some(node) = self.arena.get(class) else {
            return;
        };
        let data = node.class().expect("class node");
        let Some(ctor) = data.default_constructor else {
            return;
        };
        if !self
            .arena
            .get(ctor)
            .is_some_and(|n| n.is_implicit_constructor())
        {
            return;
        }
        let base_defaults: Vec<NodeId> = data
            .bases
            .iter()
            .filter_map(|&b| self.arena.get(b)?.class()?.default_constructor)
            .collect();
        for target in base_defaults {
            self.add_edge(ctor, target);
        }
    }

    // ------------------------------------------------------------------
    // Phase 2: reference edges
    // ------------------------------------------------------------------

    /// Walk one declaration's resolved accesses and record everything they
    /// imply: edges, usage flags, templates, can-be-static consequences.
    pub fn build_references(&mut self, decl: DeclId) {
        let model = self.model;
        let Some(from) = self.node_of(decl) else {
            return;
        };
        let Some(d) = model.decl(decl) else {
            return;
        };
        for access in &d.accesses {
            self.add_reference(from, access);
        }
    }

    /// Record one access. Out-of-scope targets contribute nothing.
    fn add_reference(&mut self, from: NodeId, access: &Access) {
        let model = self.model;
        let Some(target) = self.get_or_create(access.target) else {
            return;
        };

        if model
            .decl(access.target)
            .is_some_and(|t| t.is_deprecated)
        {
            if let Some(n) = self.arena.get_mut(from) {
                n.flags.insert(NodeFlags::USES_DEPRECATED);
            }
        }

        self.add_edge(from, target);

        match access.kind {
            AccessKind::Read => {
                if let Some(n) = self.arena.get_mut(target) {
                    if n.is_field() || n.is_parameter() {
                        n.flags.insert(NodeFlags::USED_FOR_READING);
                    }
                }
            }
            AccessKind::Write => {
                if let Some(n) = self.arena.get_mut(target) {
                    if n.is_field() {
                        n.flags.insert(NodeFlags::USED_FOR_WRITING);
                        if access.context == AccessContext::Code {
                            n.flags.remove(NodeFlags::ONLY_INIT_ASSIGNED);
                        }
                    } else if n.is_parameter() {
                        n.flags.insert(NodeFlags::USED_FOR_WRITING);
                        n.flags.remove(NodeFlags::CAN_BE_FINAL);
                    }
                }
            }
            AccessKind::Call => {
                let params = self
                    .arena
                    .get(target)
                    .and_then(|n| n.method())
                    .map(|m| m.parameters.clone())
                    .unwrap_or_default();
                for (i, &param) in params.iter().enumerate() {
                    let observed = access.arguments.get(i).and_then(|a| a.as_ref());
                    if let Some(p) = self.arena.get_mut(param).and_then(|n| n.param_mut()) {
                        p.value.merge(observed);
                    }
                }
            }
            AccessKind::TypeUse => {
                if let Some(c) = self.arena.get_mut(target).and_then(|n| n.class_mut()) {
                    c.type_references.insert(from);
                }
            }
        }

        if access.instance_capture {
            let enclosing = self.nearest_class(from);
            if let (Some(enclosing), Some(c)) =
                (enclosing, self.arena.get_mut(target).and_then(|n| n.class_mut()))
            {
                c.instance_references.insert(enclosing);
            }
        }

        statics::update_can_be_static(
            self,
            from,
            target,
            access.context == AccessContext::StaticInitializer,
        );
    }

    /// Symmetric edge insert; both sides or neither.
    pub(crate) fn add_edge(&mut self, from: NodeId, to: NodeId) {
        if !self.arena.contains(from) || !self.arena.contains(to) {
            return;
        }
        if let Some(n) = self.arena.get_mut(from) {
            n.out_edges.insert(to);
        }
        if let Some(n) = self.arena.get_mut(to) {
            n.in_edges.insert(from);
        }
    }

    /// Utility classes: concrete, at least one member, every member
    /// static, and no captured instances.
    fn detect_utility_classes(&mut self) {
        let class_ids: Vec<NodeId> = self
            .arena
            .iter()
            .filter(|(_, n)| n.is_class())
            .map(|(id, _)| id)
            .collect();
        for class in class_ids {
            let Some(node) = self.arena.get(class) else {
                continue;
            };
            if node.is_interface() || node.is_anonymous() {
                continue;
            }
            let data = node.class().expect("class node");
            if !data.instance_references.is_empty() {
                continue;
            }
            let members: Vec<&Node> = node
                .children
                .iter()
                .filter_map(|&c| self.arena.get(c))
                .filter(|n| (n.is_method() && !n.is_constructor()) || n.is_field())
                .collect();
            if members.is_empty() {
                continue;
            }
            if members.iter().all(|m| m.is_static()) {
                if let Some(n) = self.arena.get_mut(class) {
                    n.flags.insert(NodeFlags::UTILITY_CLASS);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Traversal helpers
    // ------------------------------------------------------------------

    /// Nearest class on the owner chain, including `id` itself.
    pub fn nearest_class(&self, id: NodeId) -> Option<NodeId> {
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            let node = self.arena.get(c)?;
            if node.is_class() {
                return Some(c);
            }
            cursor = node.owner;
        }
        None
    }

    /// Does `sub` inherit from `base`, directly or transitively?
    /// `sub == base` counts. Cycle-safe via a visited set.
    pub fn is_inheritor(&self, sub: NodeId, base: NodeId) -> bool {
        if sub == base {
            return true;
        }
        let mut visited = HashSet::new();
        let mut stack = vec![sub];
        while let Some(c) = stack.pop() {
            if !visited.insert(c) {
                continue;
            }
            if c == base {
                return true;
            }
            if let Some(data) = self.arena.get(c).and_then(|n| n.class()) {
                stack.extend(data.bases.iter().copied());
            }
        }
        false
    }

    // ------------------------------------------------------------------
    // Removal protocol
    // ------------------------------------------------------------------

    /// Remove a node and detach every trace of it: containment tree,
    /// in/out edges, bases/subclasses, super/derived, constructor lists.
    /// Children (and a method's parameters) are removed first, so callers
    /// may hand in any node of a deleted subtree in any order; repeated
    /// calls on already-removed nodes are no-ops.
    pub fn remove(&mut self, id: NodeId) {
        if !self.in_process {
            error!("removal requested outside mutation bracket");
            return;
        }
        let Some(node) = self.arena.get(id) else {
            return;
        };

        // Snapshot everything before mutating; edge sets must not be
        // iterated while shrinking.
        let children = node.children.clone();
        let owner = node.owner;
        let source = node.source;
        let out_edges: Vec<NodeId> = node.out_edges.iter().copied().collect();
        let in_edges: Vec<NodeId> = node.in_edges.iter().copied().collect();
        let is_ctor = node.is_constructor();
        let class_links = node.class().map(|c| {
            (
                c.bases.iter().copied().collect::<Vec<_>>(),
                c.subclasses.iter().copied().collect::<Vec<_>>(),
            )
        });
        let method_links = node.method().map(|m| {
            (
                m.super_methods.iter().copied().collect::<Vec<_>>(),
                m.derived_methods.iter().copied().collect::<Vec<_>>(),
            )
        });

        if let Some(n) = self.arena.get_mut(id) {
            n.flags.insert(NodeFlags::DELETED);
        }

        // Bottom-up: children first (parameters included).
        for child in children {
            self.remove(child);
        }

        for target in out_edges {
            if let Some(n) = self.arena.get_mut(target) {
                n.in_edges.shift_remove(&id);
            }
        }
        for source_node in in_edges {
            if let Some(n) = self.arena.get_mut(source_node) {
                n.out_edges.shift_remove(&id);
            }
        }

        if let Some((bases, subclasses)) = class_links {
            for b in bases {
                if let Some(c) = self.arena.get_mut(b).and_then(|n| n.class_mut()) {
                    c.subclasses.shift_remove(&id);
                }
            }
            for s in subclasses {
                if let Some(c) = self.arena.get_mut(s).and_then(|n| n.class_mut()) {
                    c.bases.shift_remove(&id);
                }
            }
        }
        if let Some((supers, deriveds)) = method_links {
            for s in supers {
                if let Some(m) = self.arena.get_mut(s).and_then(|n| n.method_mut()) {
                    m.derived_methods.shift_remove(&id);
                }
            }
            for d in deriveds {
                if let Some(m) = self.arena.get_mut(d).and_then(|n| n.method_mut()) {
                    m.super_methods.shift_remove(&id);
                }
            }
        }

        if let Some(owner) = owner {
            if let Some(n) = self.arena.get_mut(owner) {
                n.children.retain(|&c| c != id);
            }
            if is_ctor {
                self.constructor_removed(owner, id);
            }
        }

        if let Some(decl) = source {
            self.nodes.remove(&decl);
            self.removed.insert(decl);
        }
        self.arena.remove(id);
    }

    /// The implicit constructor follows the explicit constructor set: when
    /// the last explicit constructor goes away, the synthetic one comes
    /// back (chained to the bases' defaults).
    fn constructor_removed(&mut self, class: NodeId, ctor: NodeId) {
        let Some(data) = self.arena.get_mut(class).and_then(|n| n.class_mut()) else {
            return;
        };
        data.constructors.retain(|&c| c != ctor);
        if data.default_constructor == Some(ctor) {
            data.default_constructor = None;
        }
        let needs_implicit = data.constructors.is_empty();
        if !needs_implicit {
            return;
        }
        let node = self.arena.get(class).expect("class node");
        if node.is_interface() || node.is_anonymous() || node.is_deleted() {
            return;
        }
        if self.create_implicit_constructor(class).is_some() {
            self.chain_implicit_constructor(class);
        }
    }

    /// Development-build invariant check: edge symmetry and single
    /// ownership. Violations are programming errors in the manager.
    #[cfg(debug_assertions)]
    pub fn assert_consistent(&self) {
        for (id, node) in self.arena.iter() {
            for &t in &node.out_edges {
                let back = self.arena.get(t).is_some_and(|n| n.in_edges.contains(&id));
                debug_assert!(back, "asymmetric edge {:?} -> {:?}", id, t);
            }
            for &s in &node.in_edges {
                let fwd = self.arena.get(s).is_some_and(|n| n.out_edges.contains(&id));
                debug_assert!(fwd, "asymmetric edge {:?} <- {:?}", id, s);
            }
            for &c in &node.children {
                let owned = self.arena.get(c).is_some_and(|n| n.owner == Some(id));
                debug_assert!(owned, "child {:?} of {:?} disowned", c, id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ConventionalEntryPoints;
    use crate::model::ModelBuilder;

    fn build(model: &ProgramModel) -> GraphManager<'_> {
        let mut g = GraphManager::new(model);
        g.build(&ConventionalEntryPoints::default());
        g
    }

    #[test]
    fn test_materializes_owner_chain() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("com.acme");
        let class = b.class(pkg, "A");
        let method = b.method(class, "run");
        let model = b.finish();

        let g = build(&model);
        let m = g.node_of(method).unwrap();
        let c = g.node(m).unwrap().owner.unwrap();
        assert_eq!(g.node(c).unwrap().name, "A");
        let p = g.node(c).unwrap().owner.unwrap();
        assert_eq!(g.node(p).unwrap().name, "acme");
    }

    #[test]
    fn test_no_creation_outside_bracket() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let model = b.finish();

        let mut g = GraphManager::new(&model);
        // Bracket never opened: usage error, absence not panic.
        assert!(g.get_or_create(class).is_none());
    }

    #[test]
    fn test_edges_are_symmetric() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let caller = b.method(class, "caller");
        let callee = b.method(class, "callee");
        b.access(caller, Access::call(callee));
        let model = b.finish();

        let g = build(&model);
        let from = g.node_of(caller).unwrap();
        let to = g.node_of(callee).unwrap();
        assert!(g.node(from).unwrap().out_edges.contains(&to));
        assert!(g.node(to).unwrap().in_edges.contains(&from));
    }

    #[test]
    fn test_out_of_scope_reference_is_absent() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let method = b.method(class, "run");
        let lib = b.external("println");
        b.access(method, Access::call(lib));
        let model = b.finish();

        let g = build(&model);
        let m = g.node_of(method).unwrap();
        assert!(g.node(m).unwrap().out_edges.is_empty());
    }

    #[test]
    fn test_bases_and_subclasses_symmetric() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let base = b.class(pkg, "Base");
        let derived = b.class(pkg, "Derived");
        b.class_mut(derived).supertypes.push(base);
        let model = b.finish();

        let g = build(&model);
        let bn = g.node_of(base).unwrap();
        let dn = g.node_of(derived).unwrap();
        assert!(g.node(dn).unwrap().class().unwrap().bases.contains(&bn));
        assert!(g.node(bn).unwrap().class().unwrap().subclasses.contains(&dn));
        // A specialized class cannot be made final.
        assert!(!g.node(bn).unwrap().flags.contains(NodeFlags::CAN_BE_FINAL));
    }

    #[test]
    fn test_self_inheritance_skipped() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "Weird");
        b.class_mut(class).supertypes.push(class);
        let model = b.finish();

        let g = build(&model);
        let c = g.node_of(class).unwrap();
        assert!(g.node(c).unwrap().class().unwrap().bases.is_empty());
    }

    #[test]
    fn test_inheritance_cycle_tolerated() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let a = b.class(pkg, "A");
        let c = b.class(pkg, "C");
        b.class_mut(a).supertypes.push(c);
        b.class_mut(c).supertypes.push(a);
        let model = b.finish();

        // Must terminate; one direction of the cycle is dropped.
        let g = build(&model);
        assert!(g.node_of(a).is_some());
        assert!(g.node_of(c).is_some());
    }

    #[test]
    fn test_implicit_constructor_synthesized() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let model = b.finish();

        let g = build(&model);
        let c = g.node_of(class).unwrap();
        let data = g.node(c).unwrap().class().unwrap();
        assert_eq!(data.constructors.len(), 1);
        let ctor = data.default_constructor.unwrap();
        let ctor_node = g.node(ctor).unwrap();
        assert!(ctor_node.is_implicit_constructor());
        assert_eq!(ctor_node.name, "A");
    }

    #[test]
    fn test_implicit_constructor_chained_to_base() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let base = b.class(pkg, "Base");
        let derived = b.class(pkg, "Derived");
        b.class_mut(derived).supertypes.push(base);
        let model = b.finish();

        let g = build(&model);
        let base_ctor = g
            .node(g.node_of(base).unwrap())
            .unwrap()
            .class()
            .unwrap()
            .default_constructor
            .unwrap();
        let derived_ctor = g
            .node(g.node_of(derived).unwrap())
            .unwrap()
            .class()
            .unwrap()
            .default_constructor
            .unwrap();
        assert!(g.node(base_ctor).unwrap().in_edges.contains(&derived_ctor));
        assert!(g.node(derived_ctor).unwrap().out_edges.contains(&base_ctor));
    }

    #[test]
    fn test_no_implicit_constructor_with_explicit_one() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let ctor = b.constructor(class);
        let model = b.finish();

        let g = build(&model);
        let c = g.node_of(class).unwrap();
        let data = g.node(c).unwrap().class().unwrap();
        assert_eq!(data.constructors.len(), 1);
        assert_eq!(data.default_constructor, g.node_of(ctor));
        assert!(!g
            .node(data.constructors[0])
            .unwrap()
            .is_implicit_constructor());
    }

    #[test]
    fn test_explicit_constructor_references_class() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let ctor = b.constructor(class);
        let model = b.finish();

        let g = build(&model);
        let cn = g.node_of(class).unwrap();
        let ctor_n = g.node_of(ctor).unwrap();
        assert!(g.node(ctor_n).unwrap().out_edges.contains(&cn));
    }

    #[test]
    fn test_override_links_and_dispatch_edge() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let base = b.class(pkg, "Base");
        let derived = b.class(pkg, "Derived");
        b.class_mut(derived).supertypes.push(base);
        let base_m = b.method(base, "run");
        let derived_m = b.method(derived, "run");
        b.method_mut(derived_m).overrides.push(base_m);
        let model = b.finish();

        let g = build(&model);
        let bm = g.node_of(base_m).unwrap();
        let dm = g.node_of(derived_m).unwrap();
        assert!(g.node(dm).unwrap().method().unwrap().super_methods.contains(&bm));
        assert!(g.node(bm).unwrap().method().unwrap().derived_methods.contains(&dm));
        // Overridden: neither static nor final anymore.
        assert!(!g.node(bm).unwrap().flags.contains(NodeFlags::CAN_BE_STATIC));
        assert!(!g.node(bm).unwrap().flags.contains(NodeFlags::CAN_BE_FINAL));
        // Dispatch edge from the base declaration to the override.
        assert!(g.node(bm).unwrap().out_edges.contains(&dm));
    }

    #[test]
    fn test_library_override_marks_method_and_class() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "Handler");
        let method = b.method(class, "toString");
        let lib = b.external("java.lang.Object.toString()");
        b.method_mut(method).overrides.push(lib);
        let model = b.finish();

        let g = build(&model);
        let m = g.node_of(method).unwrap();
        let c = g.node_of(class).unwrap();
        assert!(g.node(m).unwrap().flags.contains(NodeFlags::LIBRARY_OVERRIDE));
        assert!(!g.node(c).unwrap().flags.contains(NodeFlags::CAN_BE_STATIC));
    }

    #[test]
    fn test_read_write_flags_on_fields() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let field = b.field(class, "count");
        let reader = b.method(class, "get");
        let writer = b.method(class, "set");
        b.access(reader, Access::read(field));
        b.access(writer, Access::write(field));
        let model = b.finish();

        let g = build(&model);
        let f = g.node(g.node_of(field).unwrap()).unwrap();
        assert!(f.flags.contains(NodeFlags::USED_FOR_READING));
        assert!(f.flags.contains(NodeFlags::USED_FOR_WRITING));
        assert!(!f.flags.contains(NodeFlags::ONLY_INIT_ASSIGNED));
    }

    #[test]
    fn test_parameter_constant_templates() {
        use crate::model::ConstValue;

        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let method = b.method(class, "log");
        let level = b.parameter(method, "level", "int");
        let msg = b.parameter(method, "msg", "String");
        let caller = b.method(class, "main");
        b.access(
            caller,
            Access::call(method).with_arguments(vec![
                Some(ConstValue::Int(3)),
                Some(ConstValue::Str("a".into())),
            ]),
        );
        b.access(
            caller,
            Access::call(method).with_arguments(vec![
                Some(ConstValue::Int(3)),
                Some(ConstValue::Str("b".into())),
            ]),
        );
        let model = b.finish();

        let g = build(&model);
        let level_node = g.node(g.node_of(level).unwrap()).unwrap();
        let msg_node = g.node(g.node_of(msg).unwrap()).unwrap();
        assert_eq!(
            level_node.param().unwrap().value.as_constant(),
            Some(&ConstValue::Int(3))
        );
        assert!(msg_node.param().unwrap().value.as_constant().is_none());
    }

    #[test]
    fn test_unthrown_exceptions() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let method = b.method(class, "run");
        b.method_mut(method).throws =
            vec!["java.io.IOException".into(), "java.sql.SQLException".into()];
        b.method_mut(method).thrown = vec!["java.io.IOException".into()];
        let model = b.finish();

        let g = build(&model);
        let m = g.node(g.node_of(method).unwrap()).unwrap();
        assert_eq!(m.unthrown_exceptions(), ["java.sql.SQLException"]);
    }

    #[test]
    fn test_utility_class_detection() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let util = b.class(pkg, "Strings");
        let helper = b.method(util, "join");
        b.decl_mut(helper).is_static = true;
        let plain = b.class(pkg, "Holder");
        let _field = b.field(plain, "value");
        let model = b.finish();

        let g = build(&model);
        assert!(g
            .node(g.node_of(util).unwrap())
            .unwrap()
            .flags
            .contains(NodeFlags::UTILITY_CLASS));
        assert!(!g
            .node(g.node_of(plain).unwrap())
            .unwrap()
            .flags
            .contains(NodeFlags::UTILITY_CLASS));
    }

    #[test]
    fn test_remove_detaches_everything() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let used = b.method(class, "used");
        let user = b.method(class, "user");
        b.access(user, Access::call(used));
        let model = b.finish();

        let mut g = build(&model);
        let user_n = g.node_of(user).unwrap();
        let used_n = g.node_of(used).unwrap();

        g.enter();
        g.remove(user_n);
        g.exit();

        assert!(g.node(user_n).is_none());
        assert!(g.node(used_n).unwrap().in_edges.is_empty());
        assert!(g.node_of(user).is_none());
        let class_n = g.node_of(class).unwrap();
        assert!(!g.node(class_n).unwrap().children.contains(&user_n));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let method = b.method(class, "m");
        let model = b.finish();

        let mut g = build(&model);
        let m = g.node_of(method).unwrap();
        g.enter();
        g.remove(m);
        let after_first = g.node_count();
        g.remove(m);
        g.exit();
        assert_eq!(g.node_count(), after_first);
    }

    #[test]
    fn test_remove_method_removes_parameters() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let method = b.method(class, "m");
        let param = b.parameter(method, "x", "int");
        let model = b.finish();

        let mut g = build(&model);
        let m = g.node_of(method).unwrap();
        let p = g.node_of(param).unwrap();
        g.enter();
        g.remove(m);
        g.exit();
        assert!(g.node(p).is_none());
    }

    #[test]
    fn test_removing_last_constructor_restores_implicit() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let base = b.class(pkg, "Base");
        let class = b.class(pkg, "A");
        b.class_mut(class).supertypes.push(base);
        let ctor = b.constructor(class);
        let model = b.finish();

        let mut g = build(&model);
        let ctor_n = g.node_of(ctor).unwrap();
        g.enter();
        g.remove(ctor_n);
        g.exit();

        let data = g
            .node(g.node_of(class).unwrap())
            .unwrap()
            .class()
            .unwrap()
            .clone();
        assert_eq!(data.constructors.len(), 1);
        let implicit = data.default_constructor.unwrap();
        assert!(g.node(implicit).unwrap().is_implicit_constructor());
        // Chained to the base's default constructor.
        let base_default = g
            .node(g.node_of(base).unwrap())
            .unwrap()
            .class()
            .unwrap()
            .default_constructor
            .unwrap();
        assert!(g.node(implicit).unwrap().out_edges.contains(&base_default));
    }

    #[test]
    fn test_removed_declaration_stays_invalid() {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let method = b.method(class, "m");
        let model = b.finish();

        let mut g = build(&model);
        let m = g.node_of(method).unwrap();
        g.enter();
        g.remove(m);
        // Re-resolution of a removed declaration yields nothing.
        assert!(g.get_or_create(method).is_none());
        g.exit();
    }
}
