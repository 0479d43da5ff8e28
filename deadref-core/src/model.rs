//! The semantic model handed over by the front end.
//!
//! deadref does not parse source text. A front end (compiler plugin, IDE
//! indexer, bytecode reader) produces a [`ProgramModel`]: every declaration
//! in the analysis scope, already name-resolved accesses with read/write
//! classification, lowered control flow for constructor bodies and
//! initializer blocks, override tables, and entry-point designations.
//! The model is plain data — `serde`-serializable so it can be written to
//! disk by one tool and analyzed by another.
//!
//! Declarations outside the analysis scope (libraries, compiled code) are
//! simply absent from the table; references to them resolve to nothing and
//! override entries pointing at them mark the overriding method as a
//! library override.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DeadrefError, DeadrefResult, IoResultExt};
use crate::flow::ControlFlow;

/// Identity of a source declaration within one model.
///
/// Ids are indices into the model's declaration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclId(pub u32);

impl DeclId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Java-style access level, most restrictive first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Private,
    #[default]
    Package,
    Protected,
    Public,
}

/// A compile-time constant value recorded by the front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

/// Framework/convention roles attached by the external classification
/// service: one boolean per role, nothing more.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Roles {
    /// Test-framework test case (instantiated reflectively by a runner).
    #[serde(default)]
    pub test_case: bool,
    /// Applet/servlet-like container-managed class.
    #[serde(default)]
    pub servlet_like: bool,
    /// Remote-interface role (callable from outside the process).
    #[serde(default)]
    pub remote: bool,
}

impl Roles {
    pub fn any(self) -> bool {
        self.test_case || self.servlet_like || self.remote
    }
}

/// How an access is classified by the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    /// Value read of a field or parameter.
    Read,
    /// Value write of a field or parameter.
    Write,
    /// Method or constructor invocation.
    Call,
    /// Type position mention of a class.
    TypeUse,
}

/// Where inside its owner the access occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccessContext {
    /// Ordinary body code of the owning declaration.
    #[default]
    Code,
    /// An instance initializer block of the owning class.
    Initializer,
    /// A static initializer block of the owning class.
    StaticInitializer,
}

/// One resolved reference from a declaration's body or initializer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Access {
    /// Resolved target declaration. May point out of scope.
    pub target: DeclId,
    pub kind: AccessKind,
    #[serde(default)]
    pub context: AccessContext,
    /// The access captures an instance of the target class from an
    /// enclosing scope (qualified `this`, inner-class construction).
    #[serde(default)]
    pub instance_capture: bool,
    /// For calls: the constant value of each argument, if any.
    #[serde(default)]
    pub arguments: Vec<Option<ConstValue>>,
}

impl Access {
    pub fn read(target: DeclId) -> Self {
        Self::of(target, AccessKind::Read)
    }

    pub fn write(target: DeclId) -> Self {
        Self::of(target, AccessKind::Write)
    }

    pub fn call(target: DeclId) -> Self {
        Self::of(target, AccessKind::Call)
    }

    pub fn type_use(target: DeclId) -> Self {
        Self::of(target, AccessKind::TypeUse)
    }

    pub fn of(target: DeclId, kind: AccessKind) -> Self {
        Self {
            target,
            kind,
            context: AccessContext::Code,
            instance_capture: false,
            arguments: Vec::new(),
        }
    }

    pub fn in_context(mut self, context: AccessContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_arguments(mut self, arguments: Vec<Option<ConstValue>>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn capturing_instance(mut self) -> Self {
        self.instance_capture = true;
        self
    }
}

/// An instance or static initializer block of a class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InitializerBlock {
    #[serde(default)]
    pub is_static: bool,
    pub flow: ControlFlow,
}

/// Class-specific facts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClassDecl {
    #[serde(default)]
    pub is_interface: bool,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub is_local: bool,
    /// Declared supertypes in declaration order. Entries may point out of
    /// scope; self references and cycles are tolerated and skipped.
    #[serde(default)]
    pub supertypes: Vec<DeclId>,
    /// Lowered initializer blocks in textual order.
    #[serde(default)]
    pub initializers: Vec<InitializerBlock>,
}

/// Method-specific facts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MethodDecl {
    #[serde(default)]
    pub is_constructor: bool,
    /// Conventional program entry signature (`public static void main(...)`).
    #[serde(default)]
    pub main_like: bool,
    /// Parameter declarations in positional order.
    #[serde(default)]
    pub parameters: Vec<DeclId>,
    /// Exception type names in the declared throws list.
    #[serde(default)]
    pub throws: Vec<String>,
    /// Exception type names the body can actually raise (computed by the
    /// front end's exception analysis, unhandled inside the body).
    #[serde(default)]
    pub thrown: Vec<String>,
    /// Methods this one overrides. Entries may point out of scope.
    #[serde(default)]
    pub overrides: Vec<DeclId>,
    /// Constant value of each return site, if any. Empty for void methods.
    #[serde(default)]
    pub returns: Vec<Option<ConstValue>>,
    /// Lowered body, present for constructors (needed by finality analysis).
    #[serde(default)]
    pub flow: Option<ControlFlow>,
}

/// Field-specific facts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FieldDecl {
    /// The field carries a declaration-site initializer expression.
    #[serde(default)]
    pub has_initializer: bool,
    /// Constant value of the declaration-site initializer, if constant.
    #[serde(default)]
    pub constant_value: Option<ConstValue>,
}

/// Parameter-specific facts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParamDecl {
    /// Zero-based position in the owning method's signature.
    #[serde(default)]
    pub index: u32,
    /// Type name as it appears in external-name signatures.
    #[serde(default)]
    pub type_name: String,
}

/// Kind-specific payload of a declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DeclDetails {
    Package,
    Class(ClassDecl),
    Method(MethodDecl),
    Field(FieldDecl),
    Parameter(ParamDecl),
}

impl DeclDetails {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Package => "package",
            Self::Class(_) => "class",
            Self::Method(_) => "method",
            Self::Field(_) => "field",
            Self::Parameter(_) => "parameter",
        }
    }
}

/// One declaration in the analysis scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Declaration {
    pub id: DeclId,
    pub name: String,
    /// Syntactic owner: package for top-level classes, class for members,
    /// method for parameters and local/anonymous classes. None for
    /// top-level packages.
    #[serde(default)]
    pub owner: Option<DeclId>,
    #[serde(default)]
    pub access: AccessLevel,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_deprecated: bool,
    #[serde(default)]
    pub roles: Roles,
    pub details: DeclDetails,
    /// Resolved references made by this declaration's body/initializer.
    #[serde(default)]
    pub accesses: Vec<Access>,
}

impl Declaration {
    pub fn as_class(&self) -> Option<&ClassDecl> {
        match &self.details {
            DeclDetails::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_method(&self) -> Option<&MethodDecl> {
        match &self.details {
            DeclDetails::Method(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&FieldDecl> {
        match &self.details {
            DeclDetails::Field(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_param(&self) -> Option<&ParamDecl> {
        match &self.details {
            DeclDetails::Parameter(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_package(&self) -> bool {
        matches!(self.details, DeclDetails::Package)
    }

    pub fn is_class(&self) -> bool {
        matches!(self.details, DeclDetails::Class(_))
    }

    pub fn is_method(&self) -> bool {
        matches!(self.details, DeclDetails::Method(_))
    }

    pub fn is_field(&self) -> bool {
        matches!(self.details, DeclDetails::Field(_))
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self.details, DeclDetails::Parameter(_))
    }
}

/// The whole analysis scope as produced by the front end.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramModel {
    /// Declaration table; `declarations[i].id == DeclId(i)`.
    pub declarations: Vec<Declaration>,
    /// User-designated entry points (permanent, configured externally).
    #[serde(default)]
    pub entry_points: Vec<DeclId>,
}

impl ProgramModel {
    /// Load a model from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> DeadrefResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).with_path(path)?;
        let model: Self = serde_json::from_str(&content)
            .map_err(|e| DeadrefError::model(path, e.to_string()))?;
        model.validate()?;
        Ok(model)
    }

    /// Decode a model from a JSON string.
    pub fn from_json(json: &str) -> DeadrefResult<Self> {
        let model: Self =
            serde_json::from_str(json).map_err(|e| DeadrefError::invalid_model(e.to_string()))?;
        model.validate()?;
        Ok(model)
    }

    /// Consistency checks: ids match table positions, owners and parameter
    /// lists point at existing declarations of the right kind.
    pub fn validate(&self) -> DeadrefResult<()> {
        for (i, decl) in self.declarations.iter().enumerate() {
            if decl.id.index() != i {
                return Err(DeadrefError::invalid_model(format!(
                    "declaration at position {} carries id {}",
                    i, decl.id.0
                )));
            }
            if let Some(owner) = decl.owner {
                if self.decl(owner).is_none() {
                    return Err(DeadrefError::invalid_model(format!(
                        "{} '{}' has dangling owner {}",
                        decl.details.kind_name(),
                        decl.name,
                        owner.0
                    )));
                }
            }
            if let DeclDetails::Method(m) = &decl.details {
                for &p in &m.parameters {
                    let ok = self.decl(p).is_some_and(|d| d.is_parameter());
                    if !ok {
                        return Err(DeadrefError::invalid_model(format!(
                            "method '{}' lists non-parameter {} in its signature",
                            decl.name, p.0
                        )));
                    }
                }
            }
        }
        for &e in &self.entry_points {
            if self.decl(e).is_none() {
                return Err(DeadrefError::invalid_model(format!(
                    "dangling entry point {}",
                    e.0
                )));
            }
        }
        Ok(())
    }

    /// Look up a declaration. Out-of-scope ids return none.
    pub fn decl(&self, id: DeclId) -> Option<&Declaration> {
        self.declarations.get(id.index())
    }

    /// Scope membership test: library/compiled declarations are absent
    /// from the table.
    pub fn belongs_to_scope(&self, id: DeclId) -> bool {
        self.decl(id).is_some()
    }

    /// All declaration ids in scope, in table order.
    pub fn ids(&self) -> impl Iterator<Item = DeclId> + '_ {
        self.declarations.iter().map(|d| d.id)
    }

    /// The user-designated entry points.
    pub fn designated_entry_points(&self) -> &[DeclId] {
        &self.entry_points
    }
}

/// Programmatic construction of a [`ProgramModel`].
///
/// Front-end integrations (and this crate's tests) build models through
/// this instead of assembling the tables by hand.
#[derive(Debug, Default)]
pub struct ModelBuilder {
    declarations: Vec<Declaration>,
    entry_points: Vec<DeclId>,
    /// Ids handed out for declarations the builder never defines; they
    /// model out-of-scope (library) targets.
    external: HashMap<String, DeclId>,
    next_external: u32,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, mut decl: Declaration) -> DeclId {
        let id = DeclId(self.declarations.len() as u32);
        decl.id = id;
        self.declarations.push(decl);
        id
    }

    fn blank(name: &str, owner: Option<DeclId>, details: DeclDetails) -> Declaration {
        Declaration {
            id: DeclId(0),
            name: name.to_string(),
            owner,
            access: AccessLevel::Package,
            is_static: false,
            is_final: false,
            is_abstract: false,
            is_deprecated: false,
            roles: Roles::default(),
            details,
            accesses: Vec::new(),
        }
    }

    /// Define a package; `name` may be dotted (`com.acme`), the last
    /// segment becomes the package name and the rest is looked up or
    /// created as the owner chain.
    pub fn package(&mut self, name: &str) -> DeclId {
        let mut owner = None;
        let mut id = None;
        for segment in name.split('.') {
            let found = self.declarations.iter().find(|d| {
                d.is_package() && d.name == segment && d.owner == owner
            });
            let next = match found {
                Some(d) => d.id,
                None => self.push(Self::blank(segment, owner, DeclDetails::Package)),
            };
            owner = Some(next);
            id = Some(next);
        }
        id.expect("package name must not be empty")
    }

    pub fn class(&mut self, owner: DeclId, name: &str) -> DeclId {
        self.push(Self::blank(
            name,
            Some(owner),
            DeclDetails::Class(ClassDecl::default()),
        ))
    }

    pub fn interface(&mut self, owner: DeclId, name: &str) -> DeclId {
        let id = self.class(owner, name);
        self.decl_mut(id).is_abstract = true;
        self.class_mut(id).is_interface = true;
        id
    }

    pub fn method(&mut self, owner: DeclId, name: &str) -> DeclId {
        self.push(Self::blank(
            name,
            Some(owner),
            DeclDetails::Method(MethodDecl::default()),
        ))
    }

    pub fn constructor(&mut self, class: DeclId) -> DeclId {
        let name = self.declarations[class.index()].name.clone();
        let id = self.method(class, &name);
        self.method_mut(id).is_constructor = true;
        id
    }

    pub fn field(&mut self, owner: DeclId, name: &str) -> DeclId {
        self.push(Self::blank(
            name,
            Some(owner),
            DeclDetails::Field(FieldDecl::default()),
        ))
    }

    /// Append a parameter to `method`'s signature.
    pub fn parameter(&mut self, method: DeclId, name: &str, type_name: &str) -> DeclId {
        let index = self
            .method_mut(method)
            .parameters
            .len() as u32;
        let id = self.push(Self::blank(
            name,
            Some(method),
            DeclDetails::Parameter(ParamDecl {
                index,
                type_name: type_name.to_string(),
            }),
        ));
        self.method_mut(method).parameters.push(id);
        id
    }

    /// An id standing for a declaration outside the analysis scope.
    pub fn external(&mut self, name: &str) -> DeclId {
        if let Some(&id) = self.external.get(name) {
            return id;
        }
        // External ids live past the end of the declaration table and are
        // never valid indices into it.
        let id = DeclId(u32::MAX - self.next_external);
        self.next_external += 1;
        self.external.insert(name.to_string(), id);
        id
    }

    /// Mutable access to a declaration for modifier tweaks.
    pub fn decl_mut(&mut self, id: DeclId) -> &mut Declaration {
        &mut self.declarations[id.index()]
    }

    pub fn class_mut(&mut self, id: DeclId) -> &mut ClassDecl {
        match &mut self.declarations[id.index()].details {
            DeclDetails::Class(c) => c,
            _ => panic!("not a class: {:?}", id),
        }
    }

    pub fn method_mut(&mut self, id: DeclId) -> &mut MethodDecl {
        match &mut self.declarations[id.index()].details {
            DeclDetails::Method(m) => m,
            _ => panic!("not a method: {:?}", id),
        }
    }

    pub fn field_mut(&mut self, id: DeclId) -> &mut FieldDecl {
        match &mut self.declarations[id.index()].details {
            DeclDetails::Field(f) => f,
            _ => panic!("not a field: {:?}", id),
        }
    }

    /// Record a resolved access made by `from`.
    pub fn access(&mut self, from: DeclId, access: Access) {
        self.declarations[from.index()].accesses.push(access);
    }

    /// Designate a permanent entry point.
    pub fn entry_point(&mut self, id: DeclId) {
        self.entry_points.push(id);
    }

    pub fn finish(self) -> ProgramModel {
        let model = ProgramModel {
            declarations: self.declarations,
            entry_points: self.entry_points,
        };
        debug_assert!(model.validate().is_ok());
        model
    }
}
