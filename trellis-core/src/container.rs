// Dependency injection container

use crate::instance::{Argument, Arguments, Instance};
use crate::logging::{debug, trace};
use crate::reflection::{ClassDescriptor, ParamDescriptor, Reflector, TypeRef};
use crate::security::SecurityEngine;
use crate::{Error, Result};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Produces an instance on demand.
pub type FactoryFn = Arc<dyn Fn(&Container) -> Result<Instance> + Send + Sync>;

/// How an identifier is turned into an instance.
#[derive(Clone)]
pub enum Binding {
    /// Resolve another identifier (usually a concrete class) instead
    Class(String),
    Factory(FactoryFn),
}

impl Binding {
    pub fn class(concrete: impl Into<String>) -> Self {
        Binding::Class(concrete.into())
    }

    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(&Container) -> Result<Instance> + Send + Sync + 'static,
    {
        Binding::Factory(Arc::new(factory))
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Class(concrete) => f.debug_tuple("Class").field(concrete).finish(),
            Binding::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// The dependency injection container.
///
/// Resolved instances are singletons for the lifetime of the container.
/// Clones share all state.
#[derive(Clone)]
pub struct Container {
    reflector: Arc<Reflector>,
    bindings: Arc<RwLock<HashMap<String, Binding>>>,
    instances: Arc<RwLock<HashMap<String, Instance>>>,
    resolving: Arc<Mutex<Vec<String>>>,
    security: Arc<RwLock<Option<Arc<SecurityEngine>>>>,
}

impl Container {
    pub fn new(reflector: Arc<Reflector>) -> Self {
        debug!(classes = reflector.len(), "Creating new DI container");
        Self {
            reflector,
            bindings: Arc::new(RwLock::new(HashMap::new())),
            instances: Arc::new(RwLock::new(HashMap::new())),
            resolving: Arc::new(Mutex::new(Vec::new())),
            security: Arc::new(RwLock::new(None)),
        }
    }

    pub fn reflector(&self) -> &Arc<Reflector> {
        &self.reflector
    }

    /// Register a binding. The last registration for an identifier wins.
    pub fn set(&self, id: impl Into<String>, binding: Binding) {
        let id = id.into();
        trace!(service = %id, binding = ?binding, "Registering binding");
        self.bindings.write().insert(id, binding);
    }

    /// Bind `id` to another identifier.
    pub fn bind(&self, id: impl Into<String>, concrete: impl Into<String>) {
        self.set(id, Binding::class(concrete));
    }

    /// Bind `id` to a factory.
    pub fn factory<F>(&self, id: impl Into<String>, factory: F)
    where
        F: Fn(&Container) -> Result<Instance> + Send + Sync + 'static,
    {
        self.set(id, Binding::factory(factory));
    }

    /// Store a ready-made instance, replacing any cached one.
    pub fn set_instance(&self, id: impl Into<String>, instance: Instance) {
        let id = id.into();
        debug!(service = %id, class = instance.class_name(), "Instance registered");
        self.instances.write().insert(id, instance);
    }

    /// Wrap `value` as an instance of the registered class `class`.
    pub fn make_instance<T: Any + Send + Sync>(&self, class: &str, value: T) -> Result<Instance> {
        let descriptor = self
            .reflector
            .get(class)
            .ok_or_else(|| Error::NotFound(format!("Class {} is not registered", class)))?;
        Ok(Instance::new(descriptor, value))
    }

    /// Install the engine that vets framework-managed instances.
    pub fn install_security(&self, engine: Arc<SecurityEngine>) {
        debug!(level = engine.level().get(), "Security engine installed");
        *self.security.write() = Some(engine);
    }

    pub fn security(&self) -> Option<Arc<SecurityEngine>> {
        self.security.read().clone()
    }

    /// True if `id` is cached, bound, or names a constructible class.
    pub fn has(&self, id: &str) -> bool {
        let exists = self.instances.read().contains_key(id)
            || self.bindings.read().contains_key(id)
            || self.reflector.is_constructible(id);

        trace!(service = id, exists = exists, "Checked service existence");
        exists
    }

    /// Resolve `id`, building and caching it on first use.
    pub fn get(&self, id: &str) -> Result<Instance> {
        if let Some(instance) = self.instances.read().get(id) {
            trace!(service = id, "Returning cached instance");
            return Ok(instance.clone());
        }

        let _guard = self.enter(id)?;

        let instance = self.produce(id)?;
        self.verify(id, &instance)?;

        self.instances
            .write()
            .insert(id.to_string(), instance.clone());
        debug!(service = id, class = instance.class_name(), "Service resolved");

        Ok(instance)
    }

    /// Resolve `id` and downcast it to `T`.
    pub fn get_as<T: Any + Send + Sync>(&self, id: &str) -> Result<Arc<T>> {
        let instance = self.get(id)?;
        instance.downcast::<T>().ok_or_else(|| {
            Error::Container(format!(
                "Service {} ({}) is not a {}",
                id,
                instance.class_name(),
                std::any::type_name::<T>()
            ))
        })
    }

    fn enter(&self, id: &str) -> Result<ResolvingGuard<'_>> {
        let mut stack = self.resolving.lock();
        if stack.iter().any(|entry| entry == id) {
            return Err(Error::circular(stack.as_slice(), id));
        }
        stack.push(id.to_string());

        Ok(ResolvingGuard {
            stack: &self.resolving,
            id: id.to_string(),
        })
    }

    fn produce(&self, id: &str) -> Result<Instance> {
        let binding = self.bindings.read().get(id).cloned();

        match binding {
            Some(Binding::Factory(factory)) => {
                trace!(service = id, "Resolving through factory");
                factory(self)
            }
            Some(Binding::Class(concrete)) if concrete != id => {
                trace!(service = id, concrete = %concrete, "Resolving alias");
                self.get(&concrete)
            }
            _ => self.build(id),
        }
    }

    fn build(&self, class_id: &str) -> Result<Instance> {
        let class = self
            .reflector
            .get(class_id)
            .ok_or_else(|| Error::NotFound(format!("Service not found: {}", class_id)))?;

        if class.is_abstract {
            return Err(Error::Container(format!(
                "Class {} is not instantiable",
                class_id
            )));
        }
        let constructor = class.constructor.as_ref().ok_or_else(|| {
            Error::Container(format!("Class {} is not instantiable", class_id))
        })?;

        let mut items = Vec::with_capacity(constructor.params.len());
        for param in &constructor.params {
            items.push((param.name.clone(), self.resolve_param(&class, param)?));
        }

        trace!(class = class_id, arguments = items.len(), "Invoking constructor");
        let value = (constructor.build)(&Arguments::new(class_id, items))?;

        Ok(Instance::from_arc(class, value))
    }

    fn resolve_param(&self, class: &ClassDescriptor, param: &ParamDescriptor) -> Result<Argument> {
        // Variadics are never autowired.
        if param.variadic {
            return Ok(Argument::Value(Value::Array(Vec::new())));
        }

        if let Some(dependency) = param.ty.as_ref().and_then(TypeRef::class_name) {
            return self.get(dependency).map(Argument::Service).map_err(|e| match e {
                Error::NotFound(_) => Error::Container(format!(
                    "Unable to resolve dependency {} for parameter ${} of {}",
                    dependency, param.name, class.name
                )),
                other => other,
            });
        }

        match &param.default {
            Some(default) => Ok(Argument::Value(default.clone())),
            None => Err(Error::Container(format!(
                "Unable to resolve parameter ${} of {}",
                param.name, class.name
            ))),
        }
    }

    fn verify(&self, id: &str, instance: &Instance) -> Result<()> {
        let Some(engine) = self.security() else {
            return Ok(());
        };
        if !engine.governs(instance.class()) {
            return Ok(());
        }

        let expected = if self.reflector.contains(id) {
            id
        } else {
            instance.class_name()
        };
        engine.analyze(instance, &[expected])
    }
}

/// Removes an identifier from the resolution stack on every exit path.
struct ResolvingGuard<'a> {
    stack: &'a Mutex<Vec<String>>,
    id: String,
}

impl Drop for ResolvingGuard<'_> {
    fn drop(&mut self) {
        let mut stack = self.stack.lock();
        if let Some(position) = stack.iter().rposition(|entry| *entry == self.id) {
            stack.remove(position);
        }
    }
}
