use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use trellis_core::route_cache::ROUTE_CACHE_KEY;
use trellis_core::*;

struct Controller;

fn manifest(dir: &Path, file: &str, namespace: &str, class: &str) {
    fs::write(
        dir.join(file),
        format!("namespace = \"{}\"\nclass = \"{}\"\n", namespace, class),
    )
    .unwrap();
}

fn users() -> ClassDescriptor {
    ClassDescriptor::of::<Controller>("app::UserController")
        .final_class()
        .route(RouteAttribute::new("/users").named("users"))
        .method(
            MethodDescriptor::public("index")
                .returns("array")
                .route(RouteAttribute::new("").named("index")),
        )
        .method(
            MethodDescriptor::public("show")
                .param(ParamDescriptor::new("id").typed("int"))
                .param(ParamDescriptor::new("verbose").default_value(false))
                .returns("array")
                .route(RouteAttribute::new("/{id}").named("show")),
        )
        .method(
            MethodDescriptor::public("lookup")
                .returns("array")
                .route(RouteAttribute::new("/{id}").named("lookup")),
        )
        .method(
            MethodDescriptor::private("audit")
                .returns("bool")
                .route(RouteAttribute::new("/audit")),
        )
        .constructor(vec![], |_| Ok(Controller))
}

fn reflector(classes: Vec<ClassDescriptor>) -> Arc<Reflector> {
    let reflector = Arc::new(Reflector::new());
    for class in classes {
        reflector.register(class);
    }
    reflector
}

#[test]
fn test_parser_builds_records() {
    let container = Container::new(reflector(vec![users()]));

    let records = RouteParser::new().parse(&container, "app::UserController").unwrap();
    let summary: Vec<(&str, &str, &str)> = records
        .iter()
        .map(|r| (r.path.as_str(), r.name.as_str(), r.method.as_str()))
        .collect();

    assert_eq!(
        summary,
        vec![
            ("/users", "users_index", "index"),
            ("/users/{id}", "users_show", "show"),
        ]
    );
    // Untyped parameters are left out.
    assert_eq!(records[1].arguments.len(), 1);
    assert_eq!(records[1].arguments["id"], "int");
}

#[test]
fn test_parser_default_names_and_inheritance() {
    let base = ClassDescriptor::new("app::BaseController")
        .abstract_class()
        .method(
            MethodDescriptor::public("health")
                .returns("string")
                .route(RouteAttribute::new("/health")),
        );
    let child = ClassDescriptor::of::<Controller>("app::StatusController")
        .final_class()
        .extends("app::BaseController")
        .route(RouteAttribute::new("/status"))
        .method(
            MethodDescriptor::public("show")
                .returns("string")
                .route(RouteAttribute::new("")),
        )
        .constructor(vec![], |_| Ok(Controller));
    let container = Container::new(reflector(vec![base, child]));

    let records = RouteParser::new().parse(&container, "app::StatusController").unwrap();
    let summary: Vec<(&str, &str)> = records
        .iter()
        .map(|r| (r.path.as_str(), r.name.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("/status", "default_default"),
            ("/status/health", "default_default"),
        ]
    );
}

#[test]
fn test_parser_skips_unroutable_classes() {
    let plain = ClassDescriptor::of::<Controller>("app::PlainController")
        .method(MethodDescriptor::public("show").route(RouteAttribute::new("/x")))
        .constructor(vec![], |_| Ok(Controller));
    let container = Container::new(reflector(vec![plain]));
    let parser = RouteParser::new();

    assert!(parser.parse(&container, "app::PlainController").unwrap().is_empty());
    assert!(parser.parse(&container, "app::GhostController").unwrap().is_empty());
}

#[test]
fn test_discovery_drops_duplicate_paths() {
    let dir = tempfile::tempdir().unwrap();
    manifest(dir.path(), "a_users.toml", "app", "UserController");
    manifest(dir.path(), "b_accounts.toml", "app", "AccountController");

    let accounts = ClassDescriptor::of::<Controller>("app::AccountController")
        .final_class()
        .route(RouteAttribute::new("/users").named("accounts"))
        .method(
            MethodDescriptor::public("index")
                .returns("array")
                .route(RouteAttribute::new("").named("index")),
        )
        .method(
            MethodDescriptor::public("settings")
                .returns("array")
                .route(RouteAttribute::new("/settings").named("settings")),
        )
        .constructor(vec![], |_| Ok(Controller));
    let container = Container::new(reflector(vec![users(), accounts]));

    let table = RouteDiscoverer::new(Some(dir.path().to_path_buf()))
        .discover(&container)
        .unwrap();
    let names: Vec<&str> = table.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["users_index", "users_show", "accounts_settings"]);
}

#[test]
fn test_parser_treats_slash_variants_as_one_path() {
    let class = ClassDescriptor::of::<Controller>("app::OrderController")
        .final_class()
        .route(RouteAttribute::new("/orders/").named("orders"))
        .method(
            MethodDescriptor::public("show")
                .returns("array")
                .route(RouteAttribute::new("{id}").named("show")),
        )
        .method(
            MethodDescriptor::public("edit")
                .returns("array")
                .route(RouteAttribute::new("/{id}").named("edit")),
        )
        .constructor(vec![], |_| Ok(Controller));
    let container = Container::new(reflector(vec![class]));

    let records = RouteParser::new().parse(&container, "app::OrderController").unwrap();
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["orders_show"]);
}

#[test]
fn test_discovery_treats_slash_variants_as_one_path() {
    let dir = tempfile::tempdir().unwrap();
    manifest(dir.path(), "a_users.toml", "app", "UserController");
    manifest(dir.path(), "b_members.toml", "app", "MemberController");

    let members = ClassDescriptor::of::<Controller>("app::MemberController")
        .final_class()
        .route(RouteAttribute::new("/users/").named("members"))
        .method(
            MethodDescriptor::public("show")
                .returns("array")
                .route(RouteAttribute::new("{id}").named("show")),
        )
        .constructor(vec![], |_| Ok(Controller));
    let container = Container::new(reflector(vec![users(), members]));

    let table = RouteDiscoverer::new(Some(dir.path().to_path_buf()))
        .discover(&container)
        .unwrap();
    let names: Vec<&str> = table.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["users_index", "users_show"]);
}

#[test]
fn test_parser_keeps_argument_declaration_order() {
    let class = ClassDescriptor::of::<Controller>("app::PostController")
        .final_class()
        .route(RouteAttribute::new("/posts"))
        .method(
            MethodDescriptor::public("show")
                .param(ParamDescriptor::new("slug").typed("string"))
                .param(ParamDescriptor::new("page").typed("int"))
                .param(ParamDescriptor::new("draft").typed("bool"))
                .returns("array")
                .route(RouteAttribute::new("/{slug}/{page}/{draft}")),
        )
        .constructor(vec![], |_| Ok(Controller));
    let container = Container::new(reflector(vec![class]));

    let records = RouteParser::new().parse(&container, "app::PostController").unwrap();
    let arguments: Vec<(&str, &str)> = records[0]
        .arguments
        .iter()
        .map(|(name, ty)| (name.as_str(), ty.as_str()))
        .collect();
    assert_eq!(arguments, vec![("slug", "string"), ("page", "int"), ("draft", "bool")]);

    let encoded = serde_json::to_string(&records[0]).unwrap();
    let decoded: RouteRecord = serde_json::from_str(&encoded).unwrap();
    let order: Vec<&String> = decoded.arguments.keys().collect();
    assert_eq!(order, vec!["slug", "page", "draft"]);
}

#[test]
fn test_discovery_without_directory() {
    let container = Container::new(reflector(vec![users()]));

    assert!(RouteDiscoverer::new(None).discover(&container).unwrap().is_empty());

    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("notes.txt"), "stray").unwrap();
    let err = RouteDiscoverer::new(Some(dir.path().to_path_buf()))
        .discover(&container)
        .unwrap_err();
    assert!(matches!(err, Error::Container(_)));
}

#[test]
fn test_router_caches_discovered_table_in_production() {
    let dir = tempfile::tempdir().unwrap();
    manifest(dir.path(), "users.toml", "app", "UserController");
    let reflector = reflector(vec![users()]);
    let container = Container::new(Arc::clone(&reflector));
    let store = MemoryStore::new();
    let engine = Arc::new(SecurityEngine::new(SecurityLevel::MAX, Arc::clone(&reflector)));

    let first = Router::new(
        RouteDiscoverer::new(Some(dir.path().to_path_buf())),
        RouteCache::new(Arc::new(store.clone()), RuntimeMode::Production),
        Arc::clone(&engine),
    );
    first.boot(&container).unwrap();
    assert_eq!(store.len(), 1);

    // No directory at all: the table can only come from the cache.
    let second = Router::new(
        RouteDiscoverer::new(None),
        RouteCache::new(Arc::new(store.clone()), RuntimeMode::Production),
        engine,
    );
    second.boot(&container).unwrap();
    assert_eq!(second.routes(), first.routes());

    let matched = second
        .resolve(&container, &Request::get("/users/5?x=1"))
        .unwrap()
        .unwrap();
    assert_eq!(matched.route.method, "show");
    assert_eq!(matched.values, vec!["5"]);
}

#[test]
fn test_router_skips_cache_in_development() {
    let dir = tempfile::tempdir().unwrap();
    manifest(dir.path(), "users.toml", "app", "UserController");
    let reflector = reflector(vec![users()]);
    let container = Container::new(Arc::clone(&reflector));
    let store = MemoryStore::new();

    let router = Router::new(
        RouteDiscoverer::new(Some(dir.path().to_path_buf())),
        RouteCache::new(Arc::new(store.clone()), RuntimeMode::Development),
        Arc::new(SecurityEngine::new(SecurityLevel::MAX, reflector)),
    );
    router.boot(&container).unwrap();

    assert_eq!(router.len(), 2);
    assert!(store.is_empty());
}

#[test]
fn test_first_structural_match_is_security_checked() {
    let open = ClassDescriptor::of::<Controller>("app::OpenController")
        .route(RouteAttribute::new("/open"))
        .method(
            MethodDescriptor::public("show")
                .returns("array")
                .route(RouteAttribute::new("/{id}")),
        )
        .constructor(vec![], |_| Ok(Controller));
    let reflector = reflector(vec![open]);
    let container = Container::new(Arc::clone(&reflector));
    let store = MemoryStore::new();
    let table = RouteParser::new().parse(&container, "app::OpenController").unwrap();
    store
        .write(ROUTE_CACHE_KEY, &serde_json::to_string(&table).unwrap())
        .unwrap();

    let router = Router::new(
        RouteDiscoverer::new(None),
        RouteCache::new(Arc::new(store), RuntimeMode::Production),
        Arc::new(SecurityEngine::new(SecurityLevel::MAX, reflector)),
    );
    router.boot(&container).unwrap();

    let err = router
        .resolve(&container, &Request::get("/open/1"))
        .unwrap_err();
    assert!(err.to_string().contains("Controller app::OpenController must be declared final"));

    // Paths that do not match structurally never reach the engine.
    assert!(router.resolve(&container, &Request::get("/closed/1")).unwrap().is_none());
}

#[test]
fn test_route_record_survives_json() {
    let record = RouteRecord {
        class: "app::UserController".into(),
        method: "show".into(),
        arguments: [("id".to_string(), "int".to_string())].into_iter().collect(),
        path: "/users/{id}".into(),
        name: "users_show".into(),
    };
    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(
        value,
        json!({
            "class": "app::UserController",
            "method": "show",
            "arguments": {"id": "int"},
            "path": "/users/{id}",
            "name": "users_show"
        })
    );
}
