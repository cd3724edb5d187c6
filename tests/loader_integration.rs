//! Loader integration tests.
//!
//! Exercises the bundled loaders through a container, including data
//! fetched on behalf of extension handlers.

use tempfile::TempDir;

use wireloom::core::types::ModuleState;
use wireloom::core::value::json;
use wireloom::engine::{Content, Declaration, DiagnosticKind, FetchError, FetchKind};
use wireloom::extensions::TextExtension;
use wireloom::loaders::{CatalogLoader, FsLoader, MockLoader};
use wireloom::Container;

fn with_text(loader: impl wireloom::loaders::Loader + 'static) -> Container {
    let mut container = Container::new();
    container.set_loader(loader);
    container
        .register_extension("text", TextExtension::new())
        .unwrap();
    container
}

#[test]
fn fs_loader_serves_text_resources() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("views")).unwrap();
    std::fs::write(dir.path().join("views/home.html"), "<h1>home</h1>").unwrap();
    std::fs::write(dir.path().join("settings.json"), r#"{"theme": "dark"}"#).unwrap();

    let mut container = with_text(FsLoader::new(dir.path()));
    container
        .declare("views/page", &["text!./home.html", "text!settings.json"], |_, args| {
            Ok(Some(json!({
                "html": args[0].clone(),
                "theme": args[1]["theme"].clone(),
            })))
        })
        .unwrap();
    container.start().unwrap();

    assert_eq!(
        container.value("views/page"),
        Some(&json!({"html": "<h1>home</h1>", "theme": "dark"}))
    );
    assert!(container.diagnostics().is_empty());
}

#[test]
fn fs_loader_failures_fail_the_resource() {
    let dir = TempDir::new().unwrap();
    let mut container = with_text(FsLoader::new(dir.path()));
    container
        .declare("page", &["text!missing.txt"], |_, _| Ok(None))
        .unwrap();
    container.start().unwrap();

    assert_eq!(container.state("text!missing.txt"), Some(ModuleState::Failed));
    assert_eq!(container.state("page"), Some(ModuleState::Declared));

    let kinds: Vec<&DiagnosticKind> = container.diagnostics().iter().map(|d| &d.kind).collect();
    assert!(matches!(
        kinds.as_slice(),
        [
            DiagnosticKind::FetchFailed { target, .. },
            DiagnosticKind::ExtensionFailed { module, .. },
        ] if target == "missing.txt" && module == "text!missing.txt"
    ));
}

#[test]
fn fs_loader_cannot_serve_units() {
    let dir = TempDir::new().unwrap();
    let mut container = Container::new();
    container.set_loader(FsLoader::new(dir.path()));
    container.declare("app", &["db"], |_, _| Ok(None)).unwrap();
    container.start().unwrap();

    assert!(matches!(
        &container.diagnostics()[0].kind,
        DiagnosticKind::FetchFailed { message, .. } if message.contains("unit")
    ));
}

#[test]
fn catalog_serves_units_and_data() {
    let catalog = CatalogLoader::new()
        .with_unit(
            "db",
            vec![Declaration::new("db", &["text!dsn"], |_, args| {
                Ok(Some(json!(format!("pool({})", args.str(0).unwrap_or("?")))))
            })],
        )
        .with_data("dsn", json!("sqlite://memory"));

    let mut container = with_text(catalog);
    container
        .declare("app", &["db"], |_, args| Ok(Some(args[0].clone())))
        .unwrap();
    container.start().unwrap();

    assert_eq!(container.value("app"), Some(&json!("pool(sqlite://memory)")));
}

#[test]
fn wrong_content_kind_is_reported() {
    let loader = MockLoader::new();
    let mut container = with_text(loader.clone());
    container
        .declare("page", &["text!a.txt"], |_, _| Ok(None))
        .unwrap();
    container.start().unwrap();

    assert_eq!(loader.requests()[0].kind, FetchKind::Data);
    container.complete_fetch("a.txt", Ok(Content::Unit(Vec::new())));

    assert!(matches!(
        &container.diagnostics()[0].kind,
        DiagnosticKind::UnexpectedContent { target, .. } if target == "a.txt"
    ));
    assert_eq!(container.state("text!a.txt"), Some(ModuleState::Failed));
}

#[test]
fn delivered_data_is_reused_by_later_handlers() {
    let loader = MockLoader::new();
    loader.respond_data("shared.txt", json!("shared"));

    let mut container = with_text(loader.clone());
    container
        .register_extension("raw", TextExtension::new())
        .unwrap();
    container
        .declare("first", &["text!shared.txt"], |_, args| Ok(Some(args[0].clone())))
        .unwrap();
    container.start().unwrap();
    assert_eq!(container.value("first"), Some(&json!("shared")));

    // a different handler asking for the same resource hits the cache
    container
        .declare("second", &["raw!shared.txt"], |_, args| Ok(Some(args[0].clone())))
        .unwrap();
    assert_eq!(container.value("second"), Some(&json!("shared")));
    assert_eq!(loader.request_count("shared.txt"), 1);
}

#[test]
fn scripted_unit_failure_is_reported_once() {
    let loader = MockLoader::new();
    loader.fail(
        "db",
        FetchError::Io {
            target: "db".to_string(),
            message: "disk on fire".to_string(),
        },
    );

    let mut container = Container::new();
    container.set_loader(loader.clone());
    container
        .declare("a", &["db"], |_, _| Ok(None))
        .unwrap()
        .declare("b", &["db"], |_, _| Ok(None))
        .unwrap();
    container.start().unwrap();

    assert_eq!(loader.request_count("db"), 1);
    assert_eq!(container.diagnostics().len(), 1);
    assert!(container.diagnostics()[0].message().contains("disk on fire"));
}

// =============================================================================
// Libraries
// =============================================================================

#[test]
fn lib_module_waits_for_its_file() {
    let loader = MockLoader::new();
    let mut container = Container::new();
    container.set_loader(loader.clone());
    container
        .lib("testLib", "test/test-lib.json")
        .unwrap()
        .declare("app", &["testLib.b"], |_, args| Ok(Some(args[0].clone())))
        .unwrap();
    container.start().unwrap();

    assert_eq!(container.state("testLib"), Some(ModuleState::Deferred));
    let requests = loader.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].target, "test/test-lib.json");
    assert_eq!(requests[0].kind, FetchKind::Data);

    container.complete_fetch("test/test-lib.json", Ok(Content::Data(json!({"a": 1, "b": 2}))));

    assert_eq!(container.value("testLib"), Some(&json!({"a": 1, "b": 2})));
    assert_eq!(container.value("app"), Some(&json!(2)));
    assert!(container.diagnostics().is_empty());
}

#[test]
fn lib_failure_fails_the_module() {
    let dir = TempDir::new().unwrap();
    let mut container = Container::new();
    container.set_loader(FsLoader::new(dir.path()));
    container
        .lib("vendor", "vendor.json")
        .unwrap()
        .declare("app", &["vendor"], |_, _| Ok(None))
        .unwrap();
    container.start().unwrap();

    assert_eq!(container.state("vendor"), Some(ModuleState::Failed));
    assert_eq!(container.state("app"), Some(ModuleState::Declared));
    let kinds: Vec<&DiagnosticKind> = container.diagnostics().iter().map(|d| &d.kind).collect();
    assert!(matches!(
        kinds.as_slice(),
        [
            DiagnosticKind::FetchFailed { target, .. },
            DiagnosticKind::LibraryFailed { module, .. },
        ] if target == "vendor.json" && module == "vendor"
    ));
}

#[test]
fn lib_and_text_handler_share_one_fetch() {
    let loader = MockLoader::new();
    let mut container = with_text(loader.clone());
    container
        .lib("notes", "notes.txt")
        .unwrap()
        .declare("page", &["notes", "text!notes.txt"], |_, args| {
            Ok(Some(json!([args[0].clone(), args[1].clone()])))
        })
        .unwrap();
    container.start().unwrap();

    container.complete_fetch("notes.txt", Ok(Content::Data(json!("hello"))));

    assert_eq!(loader.request_count("notes.txt"), 1);
    assert_eq!(container.value("page"), Some(&json!(["hello", "hello"])));
}
