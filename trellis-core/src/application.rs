//! Application bootstrap and request dispatch.
//!
//! [`System`] wires the runtime together: it builds the container, installs
//! the security engine, resolves the router through the container and boots
//! it. Each request is then matched against the route table and dispatched
//! to the controller action with its path parameters coerced to the declared
//! types.
//!
//! ```no_run
//! use trellis_core::application::System;
//! use trellis_core::http::Request;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let config = json!({
//!     "security": { "level": 10 },
//!     "paths": { "controllers": "app/controllers" }
//! });
//! let system = System::builder().config(Arc::new(config)).boot()?;
//! let response = system.handle(Request::get("/users/42"))?;
//! # Ok::<(), trellis_core::Error>(())
//! ```

use crate::container::Container;
use crate::discovery::RouteDiscoverer;
use crate::finder::ControllerFinder;
use crate::http::{REQUEST_CLASS, Request, Response};
use crate::logging::{debug, info};
use crate::reflection::{ParamDescriptor, Reflector, TypeRef};
use crate::route::RouteMatch;
use crate::route_cache::{CacheStore, FileStore, RouteCache};
use crate::routing::{ROUTER_CLASS, Router};
use crate::runtime_config::RuntimeMode;
use crate::security::{SECURITY_ENGINE_CLASS, SecurityEngine, SecurityLevel};
use crate::traits::{ConfigSource, ConfigSourceExt};
use crate::{Error, Result};
use serde_json::{Number, Value};
use std::path::PathBuf;
use std::sync::Arc;

/// Directory of controller manifests.
pub const CONTROLLERS_PATH_KEY: &str = "paths.controllers";

/// Directory of service manifests resolved eagerly at boot.
pub const SERVICES_PATH_KEY: &str = "paths.services";

/// Directory of the file-backed route cache.
pub const CACHE_DIRECTORY_KEY: &str = "cache.directory";

/// A booted application.
pub struct System {
    container: Container,
    router: Arc<Router>,
    mode: RuntimeMode,
}

impl System {
    pub fn builder() -> SystemBuilder {
        SystemBuilder::default()
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    /// Route `request` and invoke the matched controller action.
    ///
    /// An unmatched CLI invocation yields `204 No Content`; an unmatched HTTP
    /// request is [`Error::RouteNotFound`].
    pub fn handle(&self, request: Request) -> Result<Response> {
        let current = self.container.make_instance(REQUEST_CLASS, request.clone())?;
        self.container.set_instance(REQUEST_CLASS, current);

        let Some(matched) = self.router.resolve(&self.container, &request)? else {
            if request.is_cli() {
                debug!(uri = %request.uri, "No command matched");
                return Ok(Response::no_content());
            }
            return Err(Error::RouteNotFound(format!(
                "{} {}",
                request.method,
                request.path()
            )));
        };

        let value = self.dispatch(&matched)?;
        Response::ok().with_json(&value)
    }

    fn dispatch(&self, matched: &RouteMatch) -> Result<Value> {
        let route = &matched.route;
        let controller = self.container.get(&route.class)?;
        let method = self
            .container
            .reflector()
            .find_method(controller.class(), &route.method)
            .ok_or_else(|| {
                Error::Container(format!(
                    "Method {}::{}() does not exist",
                    route.class, route.method
                ))
            })?;
        let action = method.action.as_ref().ok_or_else(|| {
            Error::Container(format!(
                "Method {}::{}() is not invokable",
                route.class, route.method
            ))
        })?;

        let arguments = method
            .params
            .iter()
            .map(|param| argument(matched, param))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            class = %route.class,
            method = %route.method,
            arguments = arguments.len(),
            "Dispatching action"
        );
        action(&controller, arguments)
    }
}

/// Value passed for `param`: the captured segment, else its default, else null.
fn argument(matched: &RouteMatch, param: &ParamDescriptor) -> Result<Value> {
    match matched.param(&param.name) {
        Some(raw) => coerce(param, raw),
        None => Ok(param.default.clone().unwrap_or(Value::Null)),
    }
}

fn coerce(param: &ParamDescriptor, raw: &str) -> Result<Value> {
    let ty = match &param.ty {
        Some(TypeRef::Named(name)) => name.trim_start_matches('?'),
        _ => return Ok(Value::String(raw.to_string())),
    };

    let invalid = || {
        Error::Rendering(format!(
            "Invalid value '{}' for parameter ${} of type {}",
            raw, param.name, ty
        ))
    };

    match ty {
        "int" => raw
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid()),
        "float" => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(invalid),
        "bool" => match raw {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        _ => Ok(Value::String(raw.to_string())),
    }
}

/// Builder for [`System`].
#[derive(Default)]
pub struct SystemBuilder {
    reflector: Option<Arc<Reflector>>,
    config: Option<Arc<dyn ConfigSource>>,
    runtime_mode: Option<RuntimeMode>,
    cache_store: Option<Arc<dyn CacheStore>>,
}

impl SystemBuilder {
    /// Class registry; defaults to everything submitted with `register_class!`.
    pub fn reflector(mut self, reflector: Arc<Reflector>) -> Self {
        self.reflector = Some(reflector);
        self
    }

    pub fn config(mut self, config: Arc<dyn ConfigSource>) -> Self {
        self.config = Some(config);
        self
    }

    /// Defaults to [`RuntimeMode::from_env`].
    pub fn runtime_mode(mut self, mode: RuntimeMode) -> Self {
        self.runtime_mode = Some(mode);
        self
    }

    /// Defaults to a [`FileStore`] under `cache.directory` or the temp dir.
    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    pub fn boot(self) -> Result<System> {
        let reflector = self
            .reflector
            .unwrap_or_else(|| Arc::new(Reflector::from_inventory()));
        let config = self
            .config
            .unwrap_or_else(|| Arc::new(Value::Object(Default::default())));
        let mode = self.runtime_mode.unwrap_or_else(RuntimeMode::from_env);

        reflector.register(SecurityEngine::descriptor());
        reflector.register(Router::descriptor());
        reflector.register(Request::descriptor());

        let container = Container::new(Arc::clone(&reflector));

        let level = SecurityLevel::from_config(config.as_ref())?;
        container.factory(SECURITY_ENGINE_CLASS, move |c| {
            let engine = SecurityEngine::new(level, Arc::clone(c.reflector()));
            c.make_instance(SECURITY_ENGINE_CLASS, engine)
        });
        let engine = container.get_as::<SecurityEngine>(SECURITY_ENGINE_CLASS)?;
        engine.analyze(&container.get(SECURITY_ENGINE_CLASS)?, &[SECURITY_ENGINE_CLASS])?;
        container.install_security(engine);

        if let Some(services) = config.get_string(SERVICES_PATH_KEY) {
            let found = ControllerFinder::new().find(Some(PathBuf::from(services).as_path()))?;
            for service in found.unwrap_or_default() {
                container.get(&service)?;
            }
        }

        let controllers = config.get_string(CONTROLLERS_PATH_KEY).map(PathBuf::from);
        let store = self.cache_store.unwrap_or_else(|| {
            let store = match config.get_string(CACHE_DIRECTORY_KEY) {
                Some(directory) => FileStore::new(directory),
                None => FileStore::temp(),
            };
            Arc::new(store)
        });
        container.factory(ROUTER_CLASS, move |c| {
            let security = c.get_as::<SecurityEngine>(SECURITY_ENGINE_CLASS)?;
            let router = Router::new(
                RouteDiscoverer::new(controllers.clone()),
                RouteCache::new(Arc::clone(&store), mode),
                security,
            );
            c.make_instance(ROUTER_CLASS, router)
        });

        let router = container.get_as::<Router>(ROUTER_CLASS)?;
        router.boot(&container)?;

        info!(
            mode = %mode,
            level = level.get(),
            routes = router.len(),
            "System booted"
        );

        Ok(System {
            container,
            router,
            mode,
        })
    }
}
