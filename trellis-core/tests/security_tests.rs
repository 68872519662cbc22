use std::sync::Arc;
use trellis_core::*;

struct Subject;

fn analyze(classes: Vec<ClassDescriptor>, subject: &str, level: u8) -> Result<()> {
    let reflector = Arc::new(Reflector::new());
    for class in classes {
        reflector.register(class);
    }
    let class = reflector.get(subject).unwrap();
    let engine = SecurityEngine::new(SecurityLevel::of(level), reflector);
    engine.analyze(&Instance::new(class, Subject), &[subject])
}

fn subject(name: &str) -> ClassDescriptor {
    ClassDescriptor::of::<Subject>(name).final_class()
}

#[test]
fn test_untyped_public_field() {
    let class = || subject("app::Profile").field(FieldDescriptor::public("nickname"));

    assert!(analyze(vec![class()], "app::Profile", 1).is_ok());

    let err = analyze(vec![class()], "app::Profile", 2).unwrap_err();
    assert!(matches!(err, Error::Security(_)));
    assert!(
        err.to_string()
            .contains("Public property app::Profile::$nickname must declare a type")
    );
}

#[test]
fn test_void_method_only_counts_when_declared() {
    let parent = ClassDescriptor::new("app::BaseJob")
        .abstract_class()
        .method(MethodDescriptor::public("run").returns("void"));
    let child = || subject("app::Job").extends("app::BaseJob");

    // Inherited void methods are not examined.
    assert!(analyze(vec![parent.clone(), child()], "app::Job", 3).is_ok());

    let redeclared = child().method(MethodDescriptor::public("run").returns("void"));
    let err = analyze(vec![parent, redeclared], "app::Job", 3).unwrap_err();
    assert!(err.to_string().contains("app::Job::run() must not return void"));
}

#[test]
fn test_magic_and_private_methods_may_return_void() {
    let class = subject("app::Job")
        .method(MethodDescriptor::public("__construct").returns("void"))
        .method(MethodDescriptor::private("tick").returns("()"));

    assert!(analyze(vec![class], "app::Job", 3).is_ok());
}

#[test]
fn test_missing_return_type() {
    let class = || subject("app::Job").method(MethodDescriptor::public("run"));

    assert!(analyze(vec![class()], "app::Job", 3).is_ok());
    let err = analyze(vec![class()], "app::Job", 4).unwrap_err();
    assert!(err.to_string().contains("app::Job::run() must declare a return type"));
}

#[test]
fn test_uninitialized_field() {
    let class = || {
        subject("app::Job").field(
            FieldDescriptor::private("handle")
                .typed("int")
                .uninitialized(),
        )
    };

    assert!(analyze(vec![class()], "app::Job", 5).is_ok());
    let err = analyze(vec![class()], "app::Job", 6).unwrap_err();
    assert!(err.to_string().contains("app::Job::$handle must be initialized"));
}

#[test]
fn test_untyped_parameter_needs_default() {
    let method = |param: ParamDescriptor| {
        subject("app::Job").method(MethodDescriptor::public("run").param(param).returns("bool"))
    };

    assert!(analyze(vec![method(ParamDescriptor::new("force").default_value(false))], "app::Job", 7).is_ok());

    let err = analyze(vec![method(ParamDescriptor::new("force"))], "app::Job", 7).unwrap_err();
    assert!(err.to_string().contains("$force of app::Job::run()"));
}

#[test]
fn test_controllers_must_be_final() {
    let class = ClassDescriptor::of::<Subject>("app::UserController");

    assert!(analyze(vec![class.clone()], "app::UserController", 7).is_ok());
    let err = analyze(vec![class], "app::UserController", 8).unwrap_err();
    assert!(err.to_string().contains("Controller app::UserController must be declared final"));
}

#[test]
fn test_framework_services_must_be_readonly() {
    let framework = subject("trellis::mail::MailerService");
    let err = analyze(vec![framework.clone()], "trellis::mail::MailerService", 9).unwrap_err();
    assert!(err.to_string().contains("must be declared readonly"));

    assert!(analyze(vec![framework.readonly_class()], "trellis::mail::MailerService", 9).is_ok());
    assert!(analyze(vec![subject("app::MailerService")], "app::MailerService", 9).is_ok());
    assert!(
        analyze(
            vec![subject("trellis::mail::BaseService").abstract_class()],
            "trellis::mail::BaseService",
            9
        )
        .is_ok()
    );
}

#[test]
fn test_every_class_final_at_level_ten() {
    let open = ClassDescriptor::of::<Subject>("app::Job");

    assert!(analyze(vec![open.clone()], "app::Job", 9).is_ok());
    let err = analyze(vec![open], "app::Job", 10).unwrap_err();
    assert!(err.to_string().contains("Class app::Job must be declared final"));
}

#[test]
fn test_expected_types_include_ancestors_and_interfaces() {
    let classes = vec![
        ClassDescriptor::new("app::BaseJob").implements("app::Runnable"),
        subject("app::Job").extends("app::BaseJob"),
    ];

    let reflector = Arc::new(Reflector::new());
    for class in classes {
        reflector.register(class);
    }
    let class = reflector.get("app::Job").unwrap();
    let engine = SecurityEngine::new(SecurityLevel::MAX, reflector);
    let instance = Instance::new(class, Subject);

    assert!(engine.analyze(&instance, &["app::Job", "app::BaseJob", "app::Runnable"]).is_ok());
    assert!(engine.analyze(&instance, &["app::Other"]).is_err());
}

#[test]
fn test_security_exception_defaults() {
    let exception = SecurityException::new("denied");
    assert_eq!(exception.code, 500);
    assert!(exception.previous.is_none());

    let err: Error = exception.with_code(403).into();
    assert_eq!(err.status_code(), 403);
}
