use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Primitive type tag. `None`/`Any`/`Unknown`/`Generic` are meta-kinds that
/// never appear as a declared variable's concrete type; `Generic` only
/// shows up inside an unpatched intrinsic library's parameter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarKind {
    None,
    Any,
    Unknown,
    Generic,
    Number,
    Bool,
    String,
    Bytes,
    Address,
    Hash,
    Struct,
    StorageMap,
    StorageList,
    StorageSet,
}

/// Ordered field of a declared struct.
#[derive(Debug, Clone, PartialEq)]
pub struct StructDeclaration {
    pub name: String,
    pub fields: Vec<(String, VarType)>,
}

impl StructDeclaration {
    pub fn field_type(&self, name: &str) -> Option<&VarType> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}

/// Backing data for an interned [`VarType`]. Never constructed directly by
/// callers outside the type registry — see `tomb-compiler::TypeRegistry`.
#[derive(Debug)]
pub struct VarTypeData {
    pub kind: VarKind,
    pub name: Option<String>,
    pub struct_decl: Option<Arc<StructDeclaration>>,
}

/// An interned value type. Two `VarType`s compare equal iff they are the
/// *same* interned instance, matching the source's identity-based type
/// equality; the registry guarantees one instance per distinct
/// `(kind, name)` pair, so this coincides with structural equality in
/// practice.
#[derive(Debug, Clone)]
pub struct VarType(pub Arc<VarTypeData>);

impl VarType {
    pub fn new_uninterned(kind: VarKind, name: Option<String>) -> Self {
        Self(Arc::new(VarTypeData {
            kind,
            name,
            struct_decl: None,
        }))
    }

    pub fn new_struct(decl: Arc<StructDeclaration>) -> Self {
        let name = decl.name.clone();
        Self(Arc::new(VarTypeData {
            kind: VarKind::Struct,
            name: Some(name),
            struct_decl: Some(decl),
        }))
    }

    pub fn kind(&self) -> VarKind {
        self.0.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn struct_decl(&self) -> Option<&Arc<StructDeclaration>> {
        self.0.struct_decl.as_ref()
    }

    pub fn is_collection(&self) -> bool {
        matches!(
            self.0.kind,
            VarKind::StorageMap | VarKind::StorageList | VarKind::StorageSet
        )
    }
}

impl PartialEq for VarType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for VarType {}

impl std::fmt::Display for VarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.0.kind, &self.0.name) {
            (VarKind::Struct, Some(name)) => write!(f, "{}", name),
            (kind, _) => write!(f, "{:?}", kind),
        }
    }
}

/// Where a variable's storage lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Local,
    Global,
    Argument,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapDeclaration {
    pub key_type: VarType,
    pub value_type: VarType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListDeclaration {
    pub value_type: VarType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetDeclaration {
    pub value_type: VarType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CollectionDecl {
    Map(MapDeclaration),
    List(ListDeclaration),
    Set(SetDeclaration),
}

/// A declared variable's `{ scope-ref, name, type, storage }`, plus the
/// collection-specific payload when `var_type.kind()` is one of the three
/// storage-collection kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    /// `None` for the synthetic parameters of intrinsic library methods,
    /// which are never parsed and so never belong to a real lexical frame.
    pub scope: Option<ScopeId>,
    pub name: String,
    pub var_type: VarType,
    pub storage: Storage,
    pub collection: Option<CollectionDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Number(i64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    Address(String),
    Hash(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstDeclaration {
    pub name: String,
    pub var_type: VarType,
    pub literal_value: LiteralValue,
}

/// Opaque handle into a [`ScopeArena`]. Scopes reference their parent
/// upward only; nothing owns a scope downward, so there is no `Rc`/`RefCell`
/// cycle to manage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub usize);

#[derive(Debug, Clone, Default)]
pub struct ScopeData {
    pub parent: Option<ScopeId>,
    pub method_name: Option<String>,
    pub parameters: Vec<VarDecl>,
    variables: Vec<(String, VarDecl)>,
    constants: Vec<(String, ConstDeclaration)>,
    /// Only ever populated on a module's root scope.
    libraries: Vec<(String, Arc<LibraryDeclaration>)>,
}

impl ScopeData {
    /// Names bound by a `local`/`global` declaration in this frame alone
    /// (not walking to parents) — used to build fuzzy "did you mean"
    /// candidate lists.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|(n, _)| n.as_str())
    }

    pub fn constant_names(&self) -> impl Iterator<Item = &str> {
        self.constants.iter().map(|(n, _)| n.as_str())
    }
}

/// Owns every [`ScopeData`] created during a compile. Lexical frames are
/// referred to by [`ScopeId`] rather than by pointer — a `(scope_id,
/// decl_index)` alternative to a cyclic-reference scope tree.
#[derive(Debug, Clone, Default)]
pub struct ScopeArena {
    scopes: Vec<ScopeData>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_root(&mut self) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(ScopeData::default());
        id
    }

    pub fn push_child(&mut self, parent: ScopeId, method_name: Option<String>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(ScopeData {
            parent: Some(parent),
            method_name,
            ..Default::default()
        });
        id
    }

    pub fn get(&self, id: ScopeId) -> &ScopeData {
        &self.scopes[id.0]
    }

    pub fn set_parameters(&mut self, id: ScopeId, parameters: Vec<VarDecl>) {
        self.scopes[id.0].parameters = parameters;
    }

    pub fn declare_variable(&mut self, id: ScopeId, decl: VarDecl) {
        self.scopes[id.0].variables.push((decl.name.clone(), decl));
    }

    pub fn declare_constant(&mut self, id: ScopeId, decl: ConstDeclaration) {
        self.scopes[id.0].constants.push((decl.name.clone(), decl));
    }

    pub fn declare_library(&mut self, root: ScopeId, decl: Arc<LibraryDeclaration>) {
        self.scopes[root.0].libraries.push((decl.name.clone(), decl));
    }

    /// Walk outward from `id` toward the module root looking for a
    /// variable bound to `name`.
    pub fn find_variable(&self, id: ScopeId, name: &str) -> Option<&VarDecl> {
        let mut cursor = Some(id);
        while let Some(sid) = cursor {
            let scope = &self.scopes[sid.0];
            if let Some(param) = scope.parameters.iter().find(|p| p.name == name) {
                return Some(param);
            }
            if let Some((_, decl)) = scope.variables.iter().rev().find(|(n, _)| n == name) {
                return Some(decl);
            }
            cursor = scope.parent;
        }
        None
    }

    pub fn find_constant(&self, id: ScopeId, name: &str) -> Option<&ConstDeclaration> {
        let mut cursor = Some(id);
        while let Some(sid) = cursor {
            let scope = &self.scopes[sid.0];
            if let Some((_, decl)) = scope.constants.iter().rev().find(|(n, _)| n == name) {
                return Some(decl);
            }
            cursor = scope.parent;
        }
        None
    }

    pub fn find_library(&self, id: ScopeId, name: &str) -> Option<&Arc<LibraryDeclaration>> {
        let root = self.root_of(id);
        self.scopes[root.0]
            .libraries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, l)| l)
    }

    fn root_of(&self, id: ScopeId) -> ScopeId {
        let mut cursor = id;
        while let Some(parent) = self.scopes[cursor.0].parent {
            cursor = parent;
        }
        cursor
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MethodKind {
    Constructor,
    Method,
    Task,
    Trigger,
}

#[derive(Debug, Clone)]
pub struct MethodInterface {
    pub owning_library: Option<String>,
    pub implementation_type: String,
    pub name: String,
    pub is_public: bool,
    pub kind: MethodKind,
    pub return_type: Option<VarType>,
    pub parameters: Vec<VarDecl>,
    pub body: Option<StatementBlock>,
    /// `None` for intrinsic library methods (`Map.set`, `Runtime.now`, ...)
    /// and for patched copies derived from them.
    pub scope: Option<ScopeId>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct LibraryDeclaration {
    pub name: String,
    pub methods: Vec<MethodInterface>,
}

impl LibraryDeclaration {
    pub fn method(&self, name: &str) -> Option<&MethodInterface> {
        self.methods.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct EventDeclaration {
    pub name: String,
    pub numeric_value: i64,
    pub payload_type: VarType,
    pub description_bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Equal,
}

/// Target of a `Method` expression after generic-library patching and
/// implicit-first-argument lowering have already run.
#[derive(Debug, Clone)]
pub struct MethodCallTarget {
    pub library: String,
    pub method: String,
}

/// Every expression carries its `result_type` computed bottom-up at
/// construction time; there is no later inference pass.
#[derive(Debug, Clone)]
pub enum Expression {
    Literal {
        value: LiteralValue,
        result_type: VarType,
        line: usize,
    },
    Var {
        name: String,
        result_type: VarType,
        line: usize,
    },
    Const {
        name: String,
        result_type: VarType,
        line: usize,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
        result_type: VarType,
        line: usize,
    },
    Negation {
        inner: Box<Expression>,
        result_type: VarType,
        line: usize,
    },
    Cast {
        to: VarType,
        inner: Box<Expression>,
        line: usize,
    },
    Method {
        target: MethodCallTarget,
        args: Vec<Expression>,
        result_type: VarType,
        line: usize,
    },
    Macro {
        name: String,
        result_type: VarType,
        line: usize,
    },
}

impl Expression {
    pub fn result_type(&self) -> &VarType {
        match self {
            Expression::Literal { result_type, .. }
            | Expression::Var { result_type, .. }
            | Expression::Const { result_type, .. }
            | Expression::Binary { result_type, .. }
            | Expression::Negation { result_type, .. }
            | Expression::Method { result_type, .. }
            | Expression::Macro { result_type, .. } => result_type,
            Expression::Cast { to, .. } => to,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            Expression::Literal { line, .. }
            | Expression::Var { line, .. }
            | Expression::Const { line, .. }
            | Expression::Binary { line, .. }
            | Expression::Negation { line, .. }
            | Expression::Cast { line, .. }
            | Expression::Method { line, .. }
            | Expression::Macro { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatementBlock {
    pub scope: ScopeId,
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub enum Statement {
    Assign {
        var_name: String,
        expr: Expression,
        line: usize,
    },
    If {
        cond: Expression,
        body: StatementBlock,
        else_body: Option<StatementBlock>,
        line: usize,
    },
    While {
        cond: Expression,
        body: StatementBlock,
        line: usize,
    },
    DoWhile {
        body: StatementBlock,
        cond: Expression,
        line: usize,
    },
    Return {
        expr: Option<Expression>,
        line: usize,
    },
    Throw {
        message: String,
        line: usize,
    },
    Emit {
        event_name: String,
        address: Expression,
        value: Expression,
        line: usize,
    },
    AsmBlock {
        lines: Vec<String>,
        line: usize,
    },
    MethodCall {
        expr: Expression,
        line: usize,
    },
}

impl Statement {
    pub fn line(&self) -> usize {
        match self {
            Statement::Assign { line, .. }
            | Statement::If { line, .. }
            | Statement::While { line, .. }
            | Statement::DoWhile { line, .. }
            | Statement::Return { line, .. }
            | Statement::Throw { line, .. }
            | Statement::Emit { line, .. }
            | Statement::AsmBlock { line, .. }
            | Statement::MethodCall { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Contract {
    pub name: String,
    pub scope: ScopeId,
    pub libraries: Vec<Arc<LibraryDeclaration>>,
    pub methods: Vec<MethodInterface>,
    pub events: Vec<EventDeclaration>,
}

impl Contract {
    pub fn event(&self, name: &str) -> Option<&EventDeclaration> {
        self.events.iter().find(|e| e.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct Script {
    pub name: String,
    pub hidden: bool,
    pub parameters: Vec<VarDecl>,
    pub main_block: StatementBlock,
    pub return_type: Option<VarType>,
    pub compiled_bytes: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub enum Module {
    Contract(Contract),
    Script(Script),
}

impl Module {
    pub fn name(&self) -> &str {
        match self {
            Module::Contract(c) => &c.name,
            Module::Script(s) => &s.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TypeKey {
    kind: VarKind,
    name: Option<String>,
}

/// Global interner for value types, plus the table of declared and
/// intrinsic [`LibraryDeclaration`]s looked up by name. Shared by
/// `tomb-parser` (which populates and queries it while resolving
/// identifiers during a single parse pass) and `tomb-compiler` (which
/// reuses the populated registry during code generation); it lives here,
/// in the crate both already depend on, rather than in either one.
pub struct TypeRegistry {
    types: DashMap<TypeKey, VarType>,
    libraries: DashMap<String, Arc<LibraryDeclaration>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        let registry = Self {
            types: DashMap::new(),
            libraries: DashMap::new(),
        };
        registry.seed_primitives();
        registry.seed_intrinsic_libraries();
        registry
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn seed_primitives(&self) {
        for kind in [
            VarKind::None,
            VarKind::Any,
            VarKind::Unknown,
            VarKind::Generic,
            VarKind::Number,
            VarKind::Bool,
            VarKind::String,
            VarKind::Bytes,
            VarKind::Address,
            VarKind::Hash,
        ] {
            self.intern(kind, None);
        }
    }

    fn seed_intrinsic_libraries(&self) {
        for lib in intrinsics::build_all(self) {
            self.declare_library(Arc::new(lib));
        }
    }

    /// Intern (or fetch the existing interned instance of) a non-struct
    /// `VarType`.
    pub fn intern(&self, kind: VarKind, name: Option<String>) -> VarType {
        let key = TypeKey {
            kind,
            name: name.clone(),
        };
        self.types
            .entry(key)
            .or_insert_with(|| VarType::new_uninterned(kind, name))
            .clone()
    }

    pub fn intern_struct(&self, decl: Arc<StructDeclaration>) -> VarType {
        let key = TypeKey {
            kind: VarKind::Struct,
            name: Some(decl.name.clone()),
        };
        self.types
            .entry(key)
            .or_insert_with(|| VarType::new_struct(decl))
            .clone()
    }

    pub fn primitive(&self, kind: VarKind) -> VarType {
        self.intern(kind, None)
    }

    pub fn lookup_struct(&self, name: &str) -> Option<VarType> {
        self.types
            .get(&TypeKey {
                kind: VarKind::Struct,
                name: Some(name.to_string()),
            })
            .map(|entry| entry.clone())
    }

    pub fn declare_library(&self, decl: Arc<LibraryDeclaration>) {
        self.libraries.insert(decl.name.clone(), decl);
    }

    pub fn library(&self, name: &str) -> Option<Arc<LibraryDeclaration>> {
        self.libraries.get(name).map(|entry| entry.clone())
    }
}

/// Specializes a generic storage-collection library (`Map`/`List`/`Set`)
/// to a concrete key/value pair. Parameters and return types named/typed
/// `Generic` in the intrinsic are rewritten in the returned copy; the
/// intrinsic itself is
/// never mutated.
pub fn patch_library(
    intrinsic: &LibraryDeclaration,
    key_type: Option<&VarType>,
    value_type: &VarType,
) -> LibraryDeclaration {
    let patch_type = |t: &VarType, param_name: &str| -> VarType {
        if t.kind() != VarKind::Generic {
            return t.clone();
        }
        if param_name == "key" {
            key_type.cloned().unwrap_or_else(|| value_type.clone())
        } else {
            value_type.clone()
        }
    };

    let methods = intrinsic
        .methods
        .iter()
        .map(|m| {
            let parameters = m
                .parameters
                .iter()
                .map(|p| {
                    let mut patched = p.clone();
                    patched.var_type = patch_type(&p.var_type, &p.name);
                    patched
                })
                .collect();
            let return_type = m
                .return_type
                .as_ref()
                .map(|t| patch_type(t, "value"));
            MethodInterface {
                parameters,
                return_type,
                ..m.clone()
            }
        })
        .collect();

    LibraryDeclaration {
        name: intrinsic.name.clone(),
        methods,
    }
}

/// Seed data for the intrinsic libraries named in the glossary (`Map`,
/// `List`, `Set`, `Call`, `Runtime`). Every collection-method's leading
/// parameter is the storage slot name, the string literal synthesized
/// from the collection variable's own name by the implicit-first-argument
/// rule.
mod intrinsics {
    use super::*;

    fn param(name: &str, var_type: VarType) -> VarDecl {
        VarDecl {
            scope: None,
            name: name.to_string(),
            var_type,
            storage: Storage::Argument,
            collection: None,
        }
    }

    fn method(name: &str, parameters: Vec<VarDecl>, return_type: Option<VarType>) -> MethodInterface {
        MethodInterface {
            owning_library: None,
            implementation_type: String::new(),
            name: name.to_string(),
            is_public: true,
            kind: MethodKind::Method,
            return_type,
            parameters,
            body: None,
            scope: None,
            line: 0,
        }
    }

    pub fn build_all(registry: &TypeRegistry) -> Vec<LibraryDeclaration> {
        let string_t = registry.primitive(VarKind::String);
        let number_t = registry.primitive(VarKind::Number);
        let bool_t = registry.primitive(VarKind::Bool);
        let address_t = registry.primitive(VarKind::Address);
        let generic_t = registry.primitive(VarKind::Generic);
        let any_t = registry.primitive(VarKind::Any);

        let map = LibraryDeclaration {
            name: "Map".to_string(),
            methods: vec![
                method(
                    "set",
                    vec![
                        param("name", string_t.clone()),
                        param("key", generic_t.clone()),
                        param("value", generic_t.clone()),
                    ],
                    None,
                ),
                method(
                    "get",
                    vec![param("name", string_t.clone()), param("key", generic_t.clone())],
                    Some(generic_t.clone()),
                ),
                method(
                    "remove",
                    vec![param("name", string_t.clone()), param("key", generic_t.clone())],
                    None,
                ),
                method(
                    "contains",
                    vec![param("name", string_t.clone()), param("key", generic_t.clone())],
                    Some(bool_t.clone()),
                ),
            ],
        };

        let list = LibraryDeclaration {
            name: "List".to_string(),
            methods: vec![
                method(
                    "push",
                    vec![param("name", string_t.clone()), param("value", generic_t.clone())],
                    None,
                ),
                method(
                    "get",
                    vec![param("name", string_t.clone()), param("index", number_t.clone())],
                    Some(generic_t.clone()),
                ),
                method(
                    "remove",
                    vec![param("name", string_t.clone()), param("index", number_t.clone())],
                    None,
                ),
                method(
                    "length",
                    vec![param("name", string_t.clone())],
                    Some(number_t.clone()),
                ),
            ],
        };

        let set = LibraryDeclaration {
            name: "Set".to_string(),
            methods: vec![
                method(
                    "add",
                    vec![param("name", string_t.clone()), param("value", generic_t.clone())],
                    None,
                ),
                method(
                    "remove",
                    vec![param("name", string_t.clone()), param("value", generic_t.clone())],
                    None,
                ),
                method(
                    "contains",
                    vec![param("name", string_t.clone()), param("value", generic_t.clone())],
                    Some(bool_t.clone()),
                ),
            ],
        };

        // `Call` takes a variable number of arguments; modeled with a
        // single `Any`-typed variadic-by-convention slot
        // that the parser's arity check special-cases rather than enforces.
        let call = LibraryDeclaration {
            name: "Call".to_string(),
            methods: vec![method(
                "invoke",
                vec![param("target", address_t.clone()), param("args", any_t.clone())],
                Some(any_t.clone()),
            )],
        };

        let runtime = LibraryDeclaration {
            name: "Runtime".to_string(),
            methods: vec![
                method("now", vec![], Some(number_t.clone())),
                method("sender", vec![], Some(address_t.clone())),
            ],
        };

        vec![map, list, set, call, runtime]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_type_identity_equality() {
        let a = VarType::new_uninterned(VarKind::Number, None);
        let b = VarType::new_uninterned(VarKind::Number, None);
        let c = a.clone();
        assert_ne!(a, b, "separately constructed VarTypes must not be equal");
        assert_eq!(a, c, "a clone shares the same interned instance");
    }

    #[test]
    fn scope_arena_walks_outward_for_variables() {
        let mut arena = ScopeArena::new();
        let root = arena.push_root();
        let number = VarType::new_uninterned(VarKind::Number, None);
        arena.declare_variable(
            root,
            VarDecl {
                scope: Some(root),
                name: "balance".to_string(),
                var_type: number.clone(),
                storage: Storage::Global,
                collection: None,
            },
        );
        let child = arena.push_child(root, Some("transfer".to_string()));
        assert!(arena.find_variable(child, "balance").is_some());
        assert!(arena.find_variable(child, "missing").is_none());
    }

    #[test]
    fn scope_arena_finds_library_only_from_root() {
        let mut arena = ScopeArena::new();
        let root = arena.push_root();
        let lib = Arc::new(LibraryDeclaration {
            name: "Map".to_string(),
            methods: Vec::new(),
        });
        arena.declare_library(root, lib);
        let child = arena.push_child(root, None);
        assert!(arena.find_library(child, "Map").is_some());
        assert!(arena.find_library(child, "List").is_none());
    }

    #[test]
    fn struct_var_type_carries_back_link() {
        let decl = Arc::new(StructDeclaration {
            name: "Point".to_string(),
            fields: vec![
                ("x".to_string(), VarType::new_uninterned(VarKind::Number, None)),
                ("y".to_string(), VarType::new_uninterned(VarKind::Number, None)),
            ],
        });
        let ty = VarType::new_struct(decl.clone());
        assert_eq!(ty.kind(), VarKind::Struct);
        assert_eq!(ty.name(), Some("Point"));
        assert!(ty.struct_decl().unwrap().field_type("x").is_some());
    }

    #[test]
    fn type_registry_interns_primitives_once() {
        let registry = TypeRegistry::new();
        let a = registry.primitive(VarKind::Number);
        let b = registry.primitive(VarKind::Number);
        assert_eq!(a, b);
    }

    #[test]
    fn type_registry_seeds_intrinsic_libraries() {
        let registry = TypeRegistry::new();
        assert!(registry.library("Map").is_some());
        assert!(registry.library("List").is_some());
        assert!(registry.library("Set").is_some());
        assert!(registry.library("Call").is_some());
        assert!(registry.library("Runtime").is_some());
        assert!(registry.library("Nonexistent").is_none());
    }

    #[test]
    fn patch_library_specializes_generic_map_methods() {
        let registry = TypeRegistry::new();
        let map = registry.library("Map").unwrap();
        let address_t = registry.primitive(VarKind::Address);
        let number_t = registry.primitive(VarKind::Number);
        let patched = patch_library(&map, Some(&address_t), &number_t);

        let set_method = patched.method("set").unwrap();
        assert_eq!(set_method.parameters[0].var_type, registry.primitive(VarKind::String));
        assert_eq!(set_method.parameters[1].var_type, address_t);
        assert_eq!(set_method.parameters[2].var_type, number_t);

        let get_method = patched.method("get").unwrap();
        assert_eq!(get_method.return_type, Some(number_t.clone()));

        // original intrinsic is untouched
        let original_set = map.method("set").unwrap();
        assert_eq!(original_set.parameters[1].var_type.kind(), VarKind::Generic);
    }

    #[test]
    fn patch_library_specializes_generic_list_methods_with_value_only() {
        let registry = TypeRegistry::new();
        let list = registry.library("List").unwrap();
        let bytes_t = registry.primitive(VarKind::Bytes);
        let patched = patch_library(&list, None, &bytes_t);
        let push_method = patched.method("push").unwrap();
        assert_eq!(push_method.parameters[1].var_type, bytes_t);
    }
}
