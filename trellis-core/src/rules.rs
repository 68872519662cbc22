//! Structural security rules.
//!
//! Each rule inspects the members declared on an instance's class and is
//! bound to exactly one [`SecurityLevel`]. The [`SecurityEngine`] runs them
//! cumulatively in ascending order.
//!
//! [`SecurityEngine`]: crate::security::SecurityEngine

use crate::instance::Instance;
use crate::reflection::{ClassDescriptor, FieldDescriptor, Visibility};
use crate::security::SecurityLevel;

/// Outcome of a single rule: `Err` carries the diagnostic.
pub type Verdict = std::result::Result<(), String>;

pub trait Rule: Send + Sync {
    fn level(&self) -> SecurityLevel;

    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    fn check(&self, instance: &Instance) -> Verdict;
}

/// The ten built-in rules, level 1 through 10.
pub fn default_rules(framework_namespace: &str) -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(RuntimeTypeIntegrity),
        Box::new(TypedPublicFields),
        Box::new(NoVoidPublicMethods),
        Box::new(ExplicitReturnTypes),
        Box::new(TypedPrivateFields),
        Box::new(InitializedFields),
        Box::new(StrictParameterTypes),
        Box::new(FinalControllers),
        Box::new(ReadonlyServices::new(framework_namespace)),
        Box::new(FinalClasses),
    ]
}

fn untyped_field(class: &ClassDescriptor, visibility: Visibility) -> Option<&FieldDescriptor> {
    class
        .fields
        .iter()
        .find(|field| field.visibility == visibility && field.ty.is_none())
}

/// Level 1: the value behind the instance really is the class's Rust type.
pub struct RuntimeTypeIntegrity;

impl Rule for RuntimeTypeIntegrity {
    fn level(&self) -> SecurityLevel {
        SecurityLevel::of(1)
    }

    fn name(&self) -> &'static str {
        "runtime_type_integrity"
    }

    fn check(&self, instance: &Instance) -> Verdict {
        let class = instance.class();
        match class.type_id {
            Some(expected) if expected != instance.value_type_id() => Err(format!(
                "Object is not an instance of its own class {} (expected {})",
                class.name,
                class.type_name.unwrap_or("unknown type")
            )),
            _ => Ok(()),
        }
    }
}

/// Level 2
pub struct TypedPublicFields;

impl Rule for TypedPublicFields {
    fn level(&self) -> SecurityLevel {
        SecurityLevel::of(2)
    }

    fn name(&self) -> &'static str {
        "typed_public_fields"
    }

    fn check(&self, instance: &Instance) -> Verdict {
        let class = instance.class();
        match untyped_field(class, Visibility::Public) {
            Some(field) => Err(format!(
                "Public property {}::${} must declare a type",
                class.name, field.name
            )),
            None => Ok(()),
        }
    }
}

/// Level 3: public methods must produce a value.
pub struct NoVoidPublicMethods;

impl Rule for NoVoidPublicMethods {
    fn level(&self) -> SecurityLevel {
        SecurityLevel::of(3)
    }

    fn name(&self) -> &'static str {
        "no_void_public_methods"
    }

    fn check(&self, instance: &Instance) -> Verdict {
        let class = instance.class();
        let offending = class.methods.iter().find(|method| {
            method.is_public()
                && !method.is_magic()
                && method.returns.as_ref().is_some_and(|ty| ty.is_void())
        });

        match offending {
            Some(method) => Err(format!(
                "Public method {}::{}() must not return void",
                class.name, method.name
            )),
            None => Ok(()),
        }
    }
}

/// Level 4
pub struct ExplicitReturnTypes;

impl Rule for ExplicitReturnTypes {
    fn level(&self) -> SecurityLevel {
        SecurityLevel::of(4)
    }

    fn name(&self) -> &'static str {
        "explicit_return_types"
    }

    fn check(&self, instance: &Instance) -> Verdict {
        let class = instance.class();
        match class
            .methods
            .iter()
            .find(|method| method.is_public() && method.returns.is_none())
        {
            Some(method) => Err(format!(
                "Public method {}::{}() must declare a return type",
                class.name, method.name
            )),
            None => Ok(()),
        }
    }
}

/// Level 5
pub struct TypedPrivateFields;

impl Rule for TypedPrivateFields {
    fn level(&self) -> SecurityLevel {
        SecurityLevel::of(5)
    }

    fn name(&self) -> &'static str {
        "typed_private_fields"
    }

    fn check(&self, instance: &Instance) -> Verdict {
        let class = instance.class();
        match untyped_field(class, Visibility::Private) {
            Some(field) => Err(format!(
                "Private property {}::${} must declare a type",
                class.name, field.name
            )),
            None => Ok(()),
        }
    }
}

/// Level 6
pub struct InitializedFields;

impl Rule for InitializedFields {
    fn level(&self) -> SecurityLevel {
        SecurityLevel::of(6)
    }

    fn name(&self) -> &'static str {
        "initialized_fields"
    }

    fn check(&self, instance: &Instance) -> Verdict {
        let class = instance.class();
        match class.fields.iter().find(|field| !field.initialized) {
            Some(field) => Err(format!(
                "Property {}::${} must be initialized",
                class.name, field.name
            )),
            None => Ok(()),
        }
    }
}

/// Level 7: untyped public parameters need a default.
pub struct StrictParameterTypes;

impl Rule for StrictParameterTypes {
    fn level(&self) -> SecurityLevel {
        SecurityLevel::of(7)
    }

    fn name(&self) -> &'static str {
        "strict_parameter_types"
    }

    fn check(&self, instance: &Instance) -> Verdict {
        let class = instance.class();
        for method in class.methods.iter().filter(|m| m.is_public()) {
            if let Some(param) = method
                .params
                .iter()
                .find(|param| param.ty.is_none() && !param.has_default())
            {
                return Err(format!(
                    "Parameter ${} of {}::{}() must declare a type",
                    param.name, class.name, method.name
                ));
            }
        }
        Ok(())
    }
}

/// Level 8
pub struct FinalControllers;

impl Rule for FinalControllers {
    fn level(&self) -> SecurityLevel {
        SecurityLevel::of(8)
    }

    fn name(&self) -> &'static str {
        "final_controllers"
    }

    fn check(&self, instance: &Instance) -> Verdict {
        let class = instance.class();
        if class.name.contains("Controller") && !class.is_final {
            return Err(format!("Controller {} must be declared final", class.name));
        }
        Ok(())
    }
}

/// Level 9: framework services are immutable.
pub struct ReadonlyServices {
    namespace: String,
}

impl ReadonlyServices {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

impl Rule for ReadonlyServices {
    fn level(&self) -> SecurityLevel {
        SecurityLevel::of(9)
    }

    fn name(&self) -> &'static str {
        "readonly_services"
    }

    fn check(&self, instance: &Instance) -> Verdict {
        let class = instance.class();
        if class.in_namespace(&self.namespace)
            && class.name.contains("Service")
            && !class.is_abstract
            && !class.is_readonly
        {
            return Err(format!("Service {} must be declared readonly", class.name));
        }
        Ok(())
    }
}

/// Level 10
pub struct FinalClasses;

impl Rule for FinalClasses {
    fn level(&self) -> SecurityLevel {
        SecurityLevel::of(10)
    }

    fn name(&self) -> &'static str {
        "final_classes"
    }

    fn check(&self, instance: &Instance) -> Verdict {
        let class = instance.class();
        if !class.is_final {
            return Err(format!("Class {} must be declared final", class.name));
        }
        Ok(())
    }
}
