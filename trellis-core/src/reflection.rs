//! Class metadata registry.
//!
//! Rust has no runtime reflection, so every class the framework needs to
//! introspect is described once by a [`ClassDescriptor`]: its fields,
//! methods, constructor parameters and attached route declarations. The
//! descriptors are collected in a [`Reflector`], either registered
//! explicitly or submitted at compile time with [`register_class!`].
//!
//! ```
//! use trellis_core::reflection::*;
//!
//! struct Greeter;
//!
//! let class = ClassDescriptor::of::<Greeter>("app::Greeter")
//!     .final_class()
//!     .method(MethodDescriptor::public("greet").returns("string"))
//!     .constructor(vec![], |_| Ok(Greeter));
//!
//! let reflector = Reflector::new();
//! reflector.register(class);
//! assert!(reflector.is_constructible("app::Greeter"));
//! ```

use crate::instance::{Arguments, Instance};
use crate::logging::{debug, trace};
use crate::Result;
use parking_lot::RwLock;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Type names that never resolve to a class.
pub const BUILTIN_TYPES: &[&str] = &[
    "int", "float", "bool", "string", "array", "mixed", "void", "null", "never", "callable",
    "iterable", "object", "()",
];

pub fn is_builtin_type(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name.trim_start_matches('?'))
}

/// A declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Named(String),
    Union(Vec<String>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    /// True for built-in names and for every union.
    pub fn is_builtin(&self) -> bool {
        match self {
            TypeRef::Named(name) => is_builtin_type(name),
            TypeRef::Union(_) => true,
        }
    }

    /// The class this type refers to, if it is a single non-builtin name.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            TypeRef::Named(name) if !is_builtin_type(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Named(name) if name == "void" || name == "()")
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => f.write_str(name),
            TypeRef::Union(members) => f.write_str(&members.join("|")),
        }
    }
}

impl From<&str> for TypeRef {
    fn from(value: &str) -> Self {
        if value.contains('|') {
            TypeRef::Union(value.split('|').map(|s| s.trim().to_string()).collect())
        } else {
            TypeRef::Named(value.to_string())
        }
    }
}

impl From<String> for TypeRef {
    fn from(value: String) -> Self {
        TypeRef::from(value.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

/// A field declared on a class.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub visibility: Visibility,
    pub ty: Option<TypeRef>,
    /// Whether the field holds a value once the constructor returns
    pub initialized: bool,
    pub readonly: bool,
    pub is_static: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            name: name.into(),
            visibility,
            ty: None,
            initialized: true,
            readonly: false,
            is_static: false,
        }
    }

    pub fn public(name: impl Into<String>) -> Self {
        Self::new(name, Visibility::Public)
    }

    pub fn protected(name: impl Into<String>) -> Self {
        Self::new(name, Visibility::Protected)
    }

    pub fn private(name: impl Into<String>) -> Self {
        Self::new(name, Visibility::Private)
    }

    pub fn typed(mut self, ty: impl Into<TypeRef>) -> Self {
        self.ty = Some(ty.into());
        self
    }

    pub fn uninitialized(mut self) -> Self {
        self.initialized = false;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn static_field(mut self) -> Self {
        self.is_static = true;
        self
    }
}

/// A constructor or method parameter.
#[derive(Debug, Clone)]
pub struct ParamDescriptor {
    pub name: String,
    pub ty: Option<TypeRef>,
    pub default: Option<Value>,
    pub variadic: bool,
}

impl ParamDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: None,
            default: None,
            variadic: false,
        }
    }

    pub fn typed(mut self, ty: impl Into<TypeRef>) -> Self {
        self.ty = Some(ty.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// A declarative route attached to a class or to one of its methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteAttribute {
    pub path: String,
    pub name: Option<String>,
}

impl RouteAttribute {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Invokes a method on an instance with already coerced arguments.
pub type ActionFn = Arc<dyn Fn(&Instance, Vec<Value>) -> Result<Value> + Send + Sync>;

/// A method declared on a class.
#[derive(Clone)]
pub struct MethodDescriptor {
    pub name: String,
    pub visibility: Visibility,
    pub params: Vec<ParamDescriptor>,
    pub returns: Option<TypeRef>,
    pub is_static: bool,
    pub routes: Vec<RouteAttribute>,
    pub action: Option<ActionFn>,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            name: name.into(),
            visibility,
            params: Vec::new(),
            returns: None,
            is_static: false,
            routes: Vec::new(),
            action: None,
        }
    }

    pub fn public(name: impl Into<String>) -> Self {
        Self::new(name, Visibility::Public)
    }

    pub fn protected(name: impl Into<String>) -> Self {
        Self::new(name, Visibility::Protected)
    }

    pub fn private(name: impl Into<String>) -> Self {
        Self::new(name, Visibility::Private)
    }

    pub fn param(mut self, param: ParamDescriptor) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, ty: impl Into<TypeRef>) -> Self {
        self.returns = Some(ty.into());
        self
    }

    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn route(mut self, route: RouteAttribute) -> Self {
        self.routes.push(route);
        self
    }

    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn(&Instance, Vec<Value>) -> Result<Value> + Send + Sync + 'static,
    {
        self.action = Some(Arc::new(action));
        self
    }

    /// Attach an action that receives the instance downcast to `T`.
    pub fn action_on<T, F>(self, action: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, Vec<Value>) -> Result<Value> + Send + Sync + 'static,
    {
        let method = self.name.clone();
        self.action(move |instance, args| {
            let target = instance.downcast_ref::<T>().ok_or_else(|| {
                crate::Error::Container(format!(
                    "Cannot invoke {}::{} on an instance of {}",
                    std::any::type_name::<T>(),
                    method,
                    instance.class_name()
                ))
            })?;
            action(target, args)
        })
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    /// Magic methods are reserved `__name` hooks.
    pub fn is_magic(&self) -> bool {
        self.name.starts_with("__")
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("routes", &self.routes)
            .field("has_action", &self.action.is_some())
            .finish()
    }
}

/// Builds the concrete value of a class from its resolved arguments.
pub type BuildFn = Arc<dyn Fn(&Arguments) -> Result<Arc<dyn Any + Send + Sync>> + Send + Sync>;

#[derive(Clone)]
pub struct Constructor {
    pub params: Vec<ParamDescriptor>,
    pub build: BuildFn,
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Everything the framework knows about one class.
///
/// Fields and methods list only the members declared on this class;
/// inherited members live on the parent's descriptor.
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    /// Fully-qualified identifier, `::` separated
    pub name: String,
    /// Concrete Rust type backing instances, when known
    pub type_id: Option<TypeId>,
    pub type_name: Option<&'static str>,
    pub parent: Option<String>,
    pub interfaces: Vec<String>,
    pub is_final: bool,
    pub is_readonly: bool,
    pub is_abstract: bool,
    /// Subject to security analysis even outside the framework namespace
    pub managed: bool,
    pub fields: Vec<FieldDescriptor>,
    pub methods: Vec<MethodDescriptor>,
    pub constructor: Option<Constructor>,
    pub routes: Vec<RouteAttribute>,
}

impl ClassDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_id: None,
            type_name: None,
            parent: None,
            interfaces: Vec::new(),
            is_final: false,
            is_readonly: false,
            is_abstract: false,
            managed: false,
            fields: Vec::new(),
            methods: Vec::new(),
            constructor: None,
            routes: Vec::new(),
        }
    }

    /// Describe a class backed by the Rust type `T`.
    pub fn of<T: Any + Send + Sync>(name: impl Into<String>) -> Self {
        let mut class = Self::new(name);
        class.type_id = Some(TypeId::of::<T>());
        class.type_name = Some(std::any::type_name::<T>());
        class
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn final_class(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn readonly_class(mut self) -> Self {
        self.is_readonly = true;
        self
    }

    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn managed(mut self) -> Self {
        self.managed = true;
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn route(mut self, route: RouteAttribute) -> Self {
        self.routes.push(route);
        self
    }

    pub fn constructor<T, F>(mut self, params: Vec<ParamDescriptor>, build: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Arguments) -> Result<T> + Send + Sync + 'static,
    {
        let build: BuildFn = Arc::new(move |args: &Arguments| {
            let value: Arc<dyn Any + Send + Sync> = Arc::new(build(args)?);
            Ok(value)
        });
        self.constructor = Some(Constructor { params, build });
        self
    }

    /// The class name without its namespace.
    pub fn short_name(&self) -> &str {
        self.name
            .rsplit_once("::")
            .map(|(_, short)| short)
            .unwrap_or(&self.name)
    }

    pub fn namespace(&self) -> &str {
        self.name.rsplit_once("::").map(|(ns, _)| ns).unwrap_or("")
    }

    pub fn in_namespace(&self, namespace: &str) -> bool {
        self.name
            .strip_prefix(namespace)
            .is_some_and(|rest| rest.starts_with("::"))
    }

    pub fn is_constructible(&self) -> bool {
        !self.is_abstract && self.constructor.is_some()
    }

    pub fn declared_method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn declared_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A compile-time class registration collected via inventory.
pub struct ClassRegistration {
    pub describe: fn() -> ClassDescriptor,
}

inventory::collect!(ClassRegistration);

/// Submit a class descriptor for collection by [`Reflector::from_inventory`].
///
/// Takes the path of a `fn() -> ClassDescriptor`.
#[macro_export]
macro_rules! register_class {
    ($describe:path) => {
        $crate::inventory::submit! {
            $crate::reflection::ClassRegistration { describe: $describe }
        }
    };
}

/// Registry of class descriptors keyed by fully-qualified name.
#[derive(Default)]
pub struct Reflector {
    classes: RwLock<HashMap<String, Arc<ClassDescriptor>>>,
}

impl Reflector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from every descriptor submitted with `register_class!`.
    pub fn from_inventory() -> Self {
        let reflector = Self::new();
        for registration in inventory::iter::<ClassRegistration> {
            reflector.register((registration.describe)());
        }
        debug!(classes = reflector.len(), "Collected class registrations");
        reflector
    }

    /// Register a descriptor; a later registration under the same name wins.
    pub fn register(&self, class: ClassDescriptor) -> Arc<ClassDescriptor> {
        let class = Arc::new(class);
        trace!(class = %class.name, "Registering class descriptor");
        self.classes
            .write()
            .insert(class.name.clone(), Arc::clone(&class));
        class
    }

    pub fn get(&self, name: &str) -> Option<Arc<ClassDescriptor>> {
        self.classes.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.read().contains_key(name)
    }

    pub fn is_constructible(&self, name: &str) -> bool {
        self.get(name).is_some_and(|class| class.is_constructible())
    }

    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parent, grandparent and so on. Unknown or repeated parents end the walk.
    pub fn ancestors(&self, class: &ClassDescriptor) -> Vec<Arc<ClassDescriptor>> {
        let mut seen = HashSet::from([class.name.clone()]);
        let mut ancestors = Vec::new();
        let mut next = class.parent.clone();

        while let Some(name) = next {
            if !seen.insert(name.clone()) {
                break;
            }
            let Some(parent) = self.get(&name) else {
                break;
            };
            next = parent.parent.clone();
            ancestors.push(parent);
        }

        ancestors
    }

    /// True if `class` is `ty`, extends it, or implements it.
    pub fn is_a(&self, class: &ClassDescriptor, ty: &str) -> bool {
        if class.name == ty || class.interfaces.iter().any(|i| i == ty) {
            return true;
        }
        self.ancestors(class)
            .iter()
            .any(|a| a.name == ty || a.interfaces.iter().any(|i| i == ty))
    }

    /// Public methods, declared ones first, then inherited ones that are not
    /// redeclared.
    pub fn public_methods(&self, class: &ClassDescriptor) -> Vec<MethodDescriptor> {
        let mut seen: HashSet<String> = class.methods.iter().map(|m| m.name.clone()).collect();
        let mut methods: Vec<MethodDescriptor> = class
            .methods
            .iter()
            .filter(|m| m.is_public())
            .cloned()
            .collect();

        for ancestor in self.ancestors(class) {
            for method in &ancestor.methods {
                if seen.insert(method.name.clone()) && method.is_public() {
                    methods.push(method.clone());
                }
            }
        }

        methods
    }

    /// Look a method up on the class or its ancestors.
    pub fn find_method(&self, class: &ClassDescriptor, name: &str) -> Option<MethodDescriptor> {
        if let Some(method) = class.declared_method(name) {
            return Some(method.clone());
        }
        self.ancestors(class)
            .iter()
            .find_map(|a| a.declared_method(name).cloned())
    }
}
