// Trellis - a micro-framework runtime for Rust
//
// This library boots an application from configuration, resolves services
// through a reflective container, discovers and matches routes declared on
// controllers, and vets every framework-managed object against a cumulative
// set of structural security rules.

// Re-export core functionality
pub use trellis_core::*;

// Re-export optional crates
#[cfg(feature = "config")]
pub use trellis_config;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Arguments,
        ClassDescriptor,
        ConfigSource,
        ConfigSourceExt,
        Container,
        Error,
        FieldDescriptor,
        Instance,
        MethodDescriptor,
        ParamDescriptor,
        Reflector,
        Request,
        Response,
        Result,
        RouteAttribute,
        RouteRecord,
        Router,
        RuntimeMode,
        SecurityEngine,
        SecurityLevel,
        System,
        register_class,
    };

    #[cfg(feature = "config")]
    pub use crate::trellis_config::{ConfigManager, FileFormat};
}
