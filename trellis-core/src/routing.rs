// Routing system for HTTP and CLI requests

use crate::container::Container;
use crate::discovery::RouteDiscoverer;
use crate::http::Request;
use crate::logging::{debug, info, trace};
use crate::reflection::{ClassDescriptor, FieldDescriptor, MethodDescriptor, ParamDescriptor};
use crate::route::{RouteMatch, RouteRecord, match_template};
use crate::route_cache::RouteCache;
use crate::security::SecurityEngine;
use crate::Result;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Class identifier of the router.
pub const ROUTER_CLASS: &str = "trellis::routing::Router";

/// Owns the route table and matches requests against it.
///
/// The table starts empty and is filled by [`Router::boot`], either from the
/// route cache or by running discovery.
pub struct Router {
    routes: RwLock<Vec<RouteRecord>>,
    cache: RouteCache,
    discoverer: RouteDiscoverer,
    security: Arc<SecurityEngine>,
    booted: AtomicBool,
}

impl Router {
    pub fn new(discoverer: RouteDiscoverer, cache: RouteCache, security: Arc<SecurityEngine>) -> Self {
        Self {
            routes: RwLock::new(Vec::new()),
            cache,
            discoverer,
            security,
            booted: AtomicBool::new(false),
        }
    }

    /// Load the route table from the cache, or discover and cache it.
    ///
    /// Calling it again repeats the work and replaces the table.
    pub fn boot(&self, container: &Container) -> Result<()> {
        if let Some(table) = self.cache.load()? {
            info!(routes = table.len(), "Router booted from cache");
            *self.routes.write() = table;
            self.booted.store(true, Ordering::Release);
            return Ok(());
        }

        let table = self.discoverer.discover(container)?;
        self.cache.save(&table)?;
        info!(routes = table.len(), "Router booted from discovery");
        *self.routes.write() = table;
        self.booted.store(true, Ordering::Release);
        Ok(())
    }

    pub fn is_booted(&self) -> bool {
        self.booted.load(Ordering::Acquire)
    }

    /// Snapshot of the route table, in match order.
    pub fn routes(&self) -> Vec<RouteRecord> {
        self.routes.read().clone()
    }

    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `request` matches `route`.
    ///
    /// A structural match resolves the controller and runs it through the
    /// security engine; a violation is returned as an error.
    pub fn match_route(&self, container: &Container, request: &Request, route: &RouteRecord) -> Result<bool> {
        Ok(self.capture(container, request, route)?.is_some())
    }

    /// First route in table order that matches `request`.
    pub fn resolve(&self, container: &Container, request: &Request) -> Result<Option<RouteMatch>> {
        // The lock is not held while controllers are resolved.
        let table = self.routes();

        for route in table {
            if let Some(values) = self.capture(container, request, &route)? {
                debug!(path = request.path(), route = %route.name, "Route matched");
                return Ok(Some(RouteMatch::new(route, values)));
            }
        }

        trace!(path = request.path(), "No route matched");
        Ok(None)
    }

    fn capture(&self, container: &Container, request: &Request, route: &RouteRecord) -> Result<Option<Vec<String>>> {
        let Some(values) = match_template(&route.path, request.path()) else {
            return Ok(None);
        };

        if container.has(&route.class) {
            let controller = container.get(&route.class)?;
            self.security.analyze(&controller, &[route.class.as_str()])?;
        }

        Ok(Some(values.into_iter().map(str::to_string).collect()))
    }

    pub fn descriptor() -> ClassDescriptor {
        ClassDescriptor::of::<Router>(ROUTER_CLASS)
            .final_class()
            .readonly_class()
            .field(FieldDescriptor::private("routes").typed("RwLock<Vec<RouteRecord>>").readonly())
            .field(FieldDescriptor::private("cache").typed("RouteCache").readonly())
            .field(FieldDescriptor::private("discoverer").typed("RouteDiscoverer").readonly())
            .field(FieldDescriptor::private("security").typed("Arc<SecurityEngine>").readonly())
            .field(FieldDescriptor::private("booted").typed("AtomicBool").readonly())
            .method(
                MethodDescriptor::public("boot")
                    .param(ParamDescriptor::new("container").typed("Container"))
                    .returns("Result"),
            )
            .method(
                MethodDescriptor::public("match_route")
                    .param(ParamDescriptor::new("container").typed("Container"))
                    .param(ParamDescriptor::new("request").typed("Request"))
                    .param(ParamDescriptor::new("route").typed("RouteRecord"))
                    .returns("bool"),
            )
            .method(
                MethodDescriptor::public("resolve")
                    .param(ParamDescriptor::new("container").typed("Container"))
                    .param(ParamDescriptor::new("request").typed("Request"))
                    .returns("?RouteMatch"),
            )
            .method(MethodDescriptor::public("routes").returns("array"))
            .method(MethodDescriptor::public("is_booted").returns("bool"))
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.len())
            .field("cache", &self.cache.is_enabled())
            .field("directory", &self.discoverer.directory())
            .field("booted", &self.is_booted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::{Reflector, RouteAttribute};
    use crate::route_cache::{CacheStore, MemoryStore, ROUTE_CACHE_KEY};
    use crate::runtime_config::RuntimeMode;
    use crate::security::SecurityLevel;
    use indexmap::IndexMap;

    struct UserController;

    fn users(final_class: bool) -> ClassDescriptor {
        let class = ClassDescriptor::of::<UserController>("app::UserController")
            .route(RouteAttribute::new("/users").named("users"))
            .method(
                MethodDescriptor::public("show")
                    .param(ParamDescriptor::new("id").typed("int"))
                    .returns("array")
                    .route(RouteAttribute::new("/{id}").named("show")),
            )
            .constructor(vec![], |_| Ok(UserController));
        if final_class { class.final_class() } else { class }
    }

    fn record() -> RouteRecord {
        RouteRecord {
            class: "app::UserController".into(),
            method: "show".into(),
            arguments: IndexMap::from([("id".to_string(), "int".to_string())]),
            path: "/users/{id}".into(),
            name: "users_show".into(),
        }
    }

    fn router(reflector: &Arc<Reflector>, store: MemoryStore, mode: RuntimeMode) -> Router {
        Router::new(
            RouteDiscoverer::new(None),
            RouteCache::new(Arc::new(store), mode),
            Arc::new(SecurityEngine::new(SecurityLevel::MAX, Arc::clone(reflector))),
        )
    }

    #[test]
    fn test_empty_directory_never_matches() {
        let reflector = Arc::new(Reflector::new());
        let container = Container::new(Arc::clone(&reflector));
        let dir = tempfile::tempdir().unwrap();
        let router = Router::new(
            RouteDiscoverer::new(Some(dir.path().to_path_buf())),
            RouteCache::new(Arc::new(MemoryStore::new()), RuntimeMode::Development),
            Arc::new(SecurityEngine::new(SecurityLevel::MAX, reflector)),
        );

        router.boot(&container).unwrap();
        assert!(router.is_booted());
        assert!(router.is_empty());
        for uri in ["/", "/users/1", "/users/{id}"] {
            assert!(router.resolve(&container, &Request::get(uri)).unwrap().is_none());
        }
    }

    #[test]
    fn test_boot_adopts_cached_table() {
        let reflector = Arc::new(Reflector::new());
        let container = Container::new(Arc::clone(&reflector));
        let store = MemoryStore::new();
        store
            .write(ROUTE_CACHE_KEY, &serde_json::to_string(&vec![record()]).unwrap())
            .unwrap();

        let router = router(&reflector, store, RuntimeMode::Production);
        router.boot(&container).unwrap();
        assert_eq!(router.routes(), vec![record()]);
    }

    #[test]
    fn test_match_route_cases() {
        let reflector = Arc::new(Reflector::new());
        reflector.register(users(true));
        let container = Container::new(Arc::clone(&reflector));
        let router = router(&reflector, MemoryStore::new(), RuntimeMode::Development);
        let route = record();

        let matches = |uri: &str| router.match_route(&container, &Request::get(uri), &route).unwrap();
        assert!(matches("/users/123"));
        assert!(matches("/users/123?tab=posts"));
        assert!(!matches("/users/123/extra"));
        assert!(!matches("/users"));
        assert!(!matches("/orders/123"));
    }

    #[test]
    fn test_resolve_extracts_params() {
        let reflector = Arc::new(Reflector::new());
        reflector.register(users(true));
        let container = Container::new(Arc::clone(&reflector));
        let store = MemoryStore::new();
        store
            .write(ROUTE_CACHE_KEY, &serde_json::to_string(&vec![record()]).unwrap())
            .unwrap();
        let router = router(&reflector, store, RuntimeMode::Production);
        router.boot(&container).unwrap();

        let matched = router
            .resolve(&container, &Request::get("/users/42"))
            .unwrap()
            .unwrap();
        assert_eq!(matched.route.name, "users_show");
        assert_eq!(matched.param("id").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_security_violation_aborts_match() {
        let reflector = Arc::new(Reflector::new());
        reflector.register(users(false));
        let container = Container::new(Arc::clone(&reflector));
        let router = router(&reflector, MemoryStore::new(), RuntimeMode::Development);

        let err = router
            .match_route(&container, &Request::get("/users/1"), &record())
            .unwrap_err();
        assert!(matches!(err, crate::Error::Security(_)));
        assert!(err.to_string().contains("app::UserController"));
    }

    #[test]
    fn test_router_passes_its_own_rules() {
        let reflector = Arc::new(Reflector::new());
        let class = reflector.register(Router::descriptor());
        let router = router(&reflector, MemoryStore::new(), RuntimeMode::Development);
        let engine = SecurityEngine::new(SecurityLevel::MAX, Arc::clone(&reflector));

        let instance = crate::instance::Instance::new(class, router);
        assert!(engine.analyze(&instance, &[ROUTER_CLASS]).is_ok());
    }
}
