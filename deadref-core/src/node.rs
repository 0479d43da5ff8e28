//! Graph nodes: one per declaration, holding both graph structures.
//!
//! Every node sits in two structures at once:
//! - the **containment tree** (owner + ordered children), a forest rooted
//!   at the project node, and
//! - the **reference graph** (in/out edge sets), recording "this
//!   declaration's code mentions that one".
//!
//! The two never mix: tree links say where a declaration lives, edges say
//! who uses it. Kind-specific state lives in the [`NodeData`] sum type;
//! shared state (flags, access level, edges) lives directly on [`Node`].
//! All cross-node links are arena handles, never owning references.

use bitflags::bitflags;
use indexmap::IndexSet;

use crate::arena::NodeId;
use crate::model::{AccessLevel, ConstValue, DeclId};

bitflags! {
    /// Packed boolean properties of a declaration node.
    ///
    /// Structural bits are fixed at construction; usage bits
    /// (`CAN_BE_STATIC`, `CAN_BE_FINAL`, `REACHABLE`, `USED_FOR_*`) change
    /// as edges are recorded.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeFlags: u32 {
        const STATIC            = 1 << 0;
        const FINAL             = 1 << 1;
        const ABSTRACT          = 1 << 2;
        const INTERFACE         = 1 << 3;
        const ANONYMOUS         = 1 << 4;
        const LOCAL             = 1 << 5;
        const CONSTRUCTOR       = 1 << 6;
        /// Synthetic default constructor, materialized for classes with no
        /// explicit constructor.
        const IMPLICIT_CTOR     = 1 << 7;
        const CAN_BE_STATIC     = 1 << 8;
        const CAN_BE_FINAL      = 1 << 9;
        const REACHABLE         = 1 << 10;
        /// Entry point (conventional or designated).
        const ENTRY             = 1 << 11;
        /// User-designated entry point, survives re-analysis.
        const PERMANENT_ENTRY   = 1 << 12;
        /// Overrides a declaration outside the analysis scope.
        const LIBRARY_OVERRIDE  = 1 << 13;
        /// Conventional program entry signature.
        const APP_MAIN          = 1 << 14;
        /// Class with only static members and no instance use.
        const UTILITY_CLASS     = 1 << 15;
        const TEST_CASE         = 1 << 16;
        const SERVLET_ROLE      = 1 << 17;
        const REMOTE_ROLE       = 1 << 18;
        const USES_DEPRECATED   = 1 << 19;
        const USED_FOR_READING  = 1 << 20;
        const USED_FOR_WRITING  = 1 << 21;
        /// Field only ever written by its declaration initializer or
        /// initializer blocks.
        const ONLY_INIT_ASSIGNED = 1 << 22;
        /// Node removed from the graph; queries treat it as absent.
        const DELETED           = 1 << 23;
    }
}

/// Constant-value tracking for parameters and method returns.
///
/// Starts unknown; the first observed constant becomes the template;
/// any conflicting observation collapses it for good.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ValueTemplate {
    #[default]
    Unknown,
    Constant(ConstValue),
    NotConstant,
}

impl ValueTemplate {
    /// Fold one observation into the template.
    pub fn merge(&mut self, observed: Option<&ConstValue>) {
        match (&*self, observed) {
            (ValueTemplate::NotConstant, _) => {}
            (_, None) => *self = ValueTemplate::NotConstant,
            (ValueTemplate::Unknown, Some(v)) => *self = ValueTemplate::Constant(v.clone()),
            (ValueTemplate::Constant(current), Some(v)) => {
                if current != v {
                    *self = ValueTemplate::NotConstant;
                }
            }
        }
    }

    /// The settled constant, if the template never diverged.
    pub fn as_constant(&self) -> Option<&ConstValue> {
        match self {
            ValueTemplate::Constant(v) => Some(v),
            _ => None,
        }
    }
}

/// Class-specific node state.
#[derive(Debug, Clone, Default)]
pub struct ClassData {
    /// In-scope direct superclasses/superinterfaces. Symmetric with the
    /// bases' `subclasses` sets.
    pub bases: IndexSet<NodeId>,
    /// In-scope direct subtypes. Symmetric with the subtypes' `bases` sets.
    pub subclasses: IndexSet<NodeId>,
    /// Constructor method nodes, explicit and implicit.
    pub constructors: Vec<NodeId>,
    /// The zero-argument constructor a subclass's implicit constructor
    /// chains to: the synthetic one, or an explicit zero-parameter one.
    pub default_constructor: Option<NodeId>,
    /// Declarations whose code mentions this class in a type position.
    pub type_references: IndexSet<NodeId>,
    /// Enclosing classes that capture an instance of this one.
    pub instance_references: IndexSet<NodeId>,
}

/// Method-specific node state.
#[derive(Debug, Clone, Default)]
pub struct MethodData {
    /// In-scope methods this one overrides. Symmetric with the supers'
    /// `derived_methods` sets.
    pub super_methods: IndexSet<NodeId>,
    /// In-scope methods overriding this one.
    pub derived_methods: IndexSet<NodeId>,
    /// Parameter nodes in positional order.
    pub parameters: Vec<NodeId>,
    /// Exception types declared in the throws list but never raised by the
    /// body. None until exception facts have been recorded.
    pub unthrown_exceptions: Option<Vec<String>>,
    /// Constant-return tracking across all return sites.
    pub return_value: ValueTemplate,
}

/// Field-specific node state.
#[derive(Debug, Clone, Default)]
pub struct FieldData {
    /// The declaration carries an initializer expression.
    pub has_initializer: bool,
    /// Constant value of the initializer, if constant.
    pub constant_value: Option<ConstValue>,
}

/// Parameter-specific node state.
#[derive(Debug, Clone, Default)]
pub struct ParamData {
    pub index: u32,
    /// Type name used in external-name signatures.
    pub type_name: String,
    /// Constant-argument tracking across all call sites.
    pub value: ValueTemplate,
}

/// Kind-specific payload of a node.
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Root of the containment forest. Exactly one per graph.
    Project,
    Package,
    Class(ClassData),
    Method(MethodData),
    Field(FieldData),
    Parameter(ParamData),
}

impl NodeData {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Package => "package",
            Self::Class(_) => "class",
            Self::Method(_) => "method",
            Self::Field(_) => "field",
            Self::Parameter(_) => "parameter",
        }
    }
}

/// One declaration node: containment tree position, reference edges,
/// packed flags, and kind-specific data.
#[derive(Debug, Clone)]
pub struct Node {
    /// Source declaration this node was built from. None for the project
    /// root and synthetic implicit constructors.
    pub source: Option<DeclId>,
    pub name: String,
    pub owner: Option<NodeId>,
    /// Ordered children in the containment tree.
    pub children: Vec<NodeId>,
    pub flags: NodeFlags,
    pub access: AccessLevel,
    /// Nodes whose code this node's code mentions. Symmetric with the
    /// targets' `in_edges`.
    pub out_edges: IndexSet<NodeId>,
    /// Nodes whose code mentions this node.
    pub in_edges: IndexSet<NodeId>,
    pub data: NodeData,
}

impl Node {
    pub fn new(source: Option<DeclId>, name: impl Into<String>, data: NodeData) -> Self {
        Self {
            source,
            name: name.into(),
            owner: None,
            children: Vec::new(),
            flags: NodeFlags::empty(),
            access: AccessLevel::Package,
            out_edges: IndexSet::new(),
            in_edges: IndexSet::new(),
            data,
        }
    }

    pub fn is_project(&self) -> bool {
        matches!(self.data, NodeData::Project)
    }

    pub fn is_package(&self) -> bool {
        matches!(self.data, NodeData::Package)
    }

    pub fn is_class(&self) -> bool {
        matches!(self.data, NodeData::Class(_))
    }

    pub fn is_method(&self) -> bool {
        matches!(self.data, NodeData::Method(_))
    }

    pub fn is_field(&self) -> bool {
        matches!(self.data, NodeData::Field(_))
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self.data, NodeData::Parameter(_))
    }

    pub fn is_constructor(&self) -> bool {
        self.flags.contains(NodeFlags::CONSTRUCTOR)
    }

    pub fn is_implicit_constructor(&self) -> bool {
        self.flags.contains(NodeFlags::IMPLICIT_CTOR)
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(NodeFlags::STATIC)
    }

    pub fn is_abstract(&self) -> bool {
        self.flags.contains(NodeFlags::ABSTRACT)
    }

    pub fn is_interface(&self) -> bool {
        self.flags.contains(NodeFlags::INTERFACE)
    }

    pub fn is_anonymous(&self) -> bool {
        self.flags.contains(NodeFlags::ANONYMOUS)
    }

    pub fn is_entry(&self) -> bool {
        self.flags.contains(NodeFlags::ENTRY)
    }

    pub fn is_can_be_static(&self) -> bool {
        self.flags.contains(NodeFlags::CAN_BE_STATIC)
    }

    pub fn is_can_be_final(&self) -> bool {
        self.flags.contains(NodeFlags::CAN_BE_FINAL)
    }

    pub fn is_reachable(&self) -> bool {
        self.flags.contains(NodeFlags::REACHABLE)
    }

    pub fn is_deleted(&self) -> bool {
        self.flags.contains(NodeFlags::DELETED)
    }

    pub fn class(&self) -> Option<&ClassData> {
        match &self.data {
            NodeData::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn class_mut(&mut self) -> Option<&mut ClassData> {
        match &mut self.data {
            NodeData::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn method(&self) -> Option<&MethodData> {
        match &self.data {
            NodeData::Method(m) => Some(m),
            _ => None,
        }
    }

    pub fn method_mut(&mut self) -> Option<&mut MethodData> {
        match &mut self.data {
            NodeData::Method(m) => Some(m),
            _ => None,
        }
    }

    pub fn field(&self) -> Option<&FieldData> {
        match &self.data {
            NodeData::Field(f) => Some(f),
            _ => None,
        }
    }

    pub fn field_mut(&mut self) -> Option<&mut FieldData> {
        match &mut self.data {
            NodeData::Field(f) => Some(f),
            _ => None,
        }
    }

    pub fn param(&self) -> Option<&ParamData> {
        match &self.data {
            NodeData::Parameter(p) => Some(p),
            _ => None,
        }
    }

    pub fn param_mut(&mut self) -> Option<&mut ParamData> {
        match &mut self.data {
            NodeData::Parameter(p) => Some(p),
            _ => None,
        }
    }

    /// Exception types declared but never raised. Empty when unknown.
    pub fn unthrown_exceptions(&self) -> &[String] {
        self.method()
            .and_then(|m| m.unthrown_exceptions.as_deref())
            .unwrap_or(&[])
    }

    /// The settled constant return value, if every return site agrees.
    pub fn return_value_if_constant(&self) -> Option<&ConstValue> {
        self.method().and_then(|m| m.return_value.as_constant())
    }
}
