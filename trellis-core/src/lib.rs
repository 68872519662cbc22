// Core library for the Trellis runtime
// Service container, route discovery and matching, and the security rule engine

pub mod application;
pub mod container;
pub mod discovery;
pub mod error;
pub mod finder;
pub mod http;
pub mod instance;
pub mod logging;
pub mod reflection;
pub mod route;
pub mod route_cache;
pub mod route_parser;
pub mod routing;
pub mod rules;
pub mod runtime_config;
pub mod security;
pub mod traits;

// Used by `register_class!` expansions in downstream crates.
pub use inventory;

// Re-export commonly used types
pub use application::{System, SystemBuilder};
pub use container::{Binding, Container, FactoryFn};
pub use discovery::RouteDiscoverer;
pub use error::*;
pub use finder::ControllerFinder;
pub use http::{Request, RequestKind, Response};
pub use instance::{Argument, Arguments, Instance};
pub use reflection::{
    ClassDescriptor, FieldDescriptor, MethodDescriptor, ParamDescriptor, Reflector,
    RouteAttribute, TypeRef, Visibility,
};
pub use route::{RouteMatch, RouteRecord};
pub use route_cache::{CacheStore, FileStore, MemoryStore, RouteCache};
pub use route_parser::RouteParser;
pub use routing::Router;
pub use rules::{Rule, Verdict};
pub use runtime_config::RuntimeMode;
pub use security::{SecurityEngine, SecurityLevel};
pub use traits::{ConfigSource, ConfigSourceExt};
