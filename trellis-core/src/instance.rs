// Type-erased instances and resolved constructor arguments

use crate::reflection::ClassDescriptor;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// A shared object together with the descriptor of its runtime class.
#[derive(Clone)]
pub struct Instance {
    class: Arc<ClassDescriptor>,
    value: Arc<dyn Any + Send + Sync>,
}

impl Instance {
    pub fn new<T: Any + Send + Sync>(class: Arc<ClassDescriptor>, value: T) -> Self {
        Self {
            class,
            value: Arc::new(value),
        }
    }

    pub fn from_arc(class: Arc<ClassDescriptor>, value: Arc<dyn Any + Send + Sync>) -> Self {
        Self { class, value }
    }

    pub fn class(&self) -> &Arc<ClassDescriptor> {
        &self.class
    }

    pub fn class_name(&self) -> &str {
        &self.class.name
    }

    /// `TypeId` of the concrete value behind the erasure.
    pub fn value_type_id(&self) -> TypeId {
        (*self.value).type_id()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }

    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// True if both handles point at the same object.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class.name)
            .finish_non_exhaustive()
    }
}

/// One resolved constructor argument.
#[derive(Debug, Clone)]
pub enum Argument {
    Service(Instance),
    Value(Value),
}

/// Resolved constructor arguments, in declaration order.
#[derive(Debug, Clone)]
pub struct Arguments {
    class: String,
    items: Vec<(String, Argument)>,
}

impl Arguments {
    pub fn new(class: impl Into<String>, items: Vec<(String, Argument)>) -> Self {
        Self {
            class: class.into(),
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Argument> {
        self.items
            .get(index)
            .map(|(_, arg)| arg)
            .ok_or_else(|| {
                Error::Container(format!("{} has no constructor argument #{}", self.class, index))
            })
    }

    pub fn instance(&self, index: usize) -> Result<&Instance> {
        match self.get(index)? {
            Argument::Service(instance) => Ok(instance),
            Argument::Value(_) => Err(self.mismatch(index, "a service")),
        }
    }

    /// Argument `index` as a shared service of type `T`.
    pub fn service<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>> {
        self.instance(index)?
            .downcast::<T>()
            .ok_or_else(|| self.mismatch(index, std::any::type_name::<T>()))
    }

    /// Argument `index` as a plain value deserialized into `T`.
    pub fn value<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
        match self.get(index)? {
            Argument::Value(value) => serde_json::from_value(value.clone())
                .map_err(|e| Error::Deserialization(format!("{}: {}", self.name(index), e))),
            Argument::Service(_) => Err(self.mismatch(index, "a value")),
        }
    }

    fn name(&self, index: usize) -> &str {
        self.items
            .get(index)
            .map(|(name, _)| name.as_str())
            .unwrap_or("?")
    }

    fn mismatch(&self, index: usize, expected: &str) -> Error {
        Error::Container(format!(
            "Argument ${} of {} is not {}",
            self.name(index),
            self.class,
            expected
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Repo {
        dsn: String,
    }

    fn repo_instance() -> Instance {
        let class = Arc::new(ClassDescriptor::of::<Repo>("app::Repo"));
        Instance::new(
            class,
            Repo {
                dsn: "memory".into(),
            },
        )
    }

    #[test]
    fn test_downcast() {
        let instance = repo_instance();
        assert_eq!(instance.downcast_ref::<Repo>().unwrap().dsn, "memory");
        assert!(instance.downcast::<String>().is_none());
        assert_eq!(instance.value_type_id(), TypeId::of::<Repo>());
    }

    #[test]
    fn test_ptr_eq() {
        let a = repo_instance();
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&repo_instance()));
    }

    #[test]
    fn test_arguments_accessors() {
        let args = Arguments::new(
            "app::Service",
            vec![
                ("repo".into(), Argument::Service(repo_instance())),
                ("limit".into(), Argument::Value(json!(25))),
            ],
        );

        assert_eq!(args.service::<Repo>(0).unwrap().dsn, "memory");
        assert_eq!(args.value::<u32>(1).unwrap(), 25);
        assert!(args.value::<u32>(0).is_err());
        assert!(args.service::<Repo>(1).is_err());
        assert!(args.get(2).is_err());
    }
}
