//! File-driven pipeline: TOML config + JSON program database in, generated
//! registration unit out.

use std::path::Path;

use flatbind::model::{
    Entity, EntityKind, Parameter, Program, RoutineDef, RoutineKind, Storage, Virtuality,
    Visibility,
};
use flatbind::types::TypeNode;

/// `class Widget { public: int ping(); }` plus `int add(int, int)`.
fn sample_program() -> Program {
    let mut program = Program::new();
    let global = program.global;
    let int = program.ensure_primitive("int");

    let widget = program.add(Entity {
        name: "Widget".to_string(),
        container: Some(global),
        location: None,
        kind: EntityKind::Aggregate(Default::default()),
    });
    let ping = program.add(Entity {
        name: "ping".to_string(),
        container: Some(widget),
        location: None,
        kind: EntityKind::Routine(RoutineDef {
            return_type: Some(TypeNode::Leaf(int)),
            parameters: Vec::new(),
            kind: RoutineKind::Normal,
            is_const: false,
            throws: None,
        }),
    });
    program.scope_mut(widget).unwrap().add_routine(
        ping,
        Visibility::Public,
        Virtuality::NonVirtual,
        Storage::Normal,
    );

    let add = program.add(Entity {
        name: "add".to_string(),
        container: Some(global),
        location: None,
        kind: EntityKind::Routine(RoutineDef {
            return_type: Some(TypeNode::Leaf(int)),
            parameters: vec![
                Parameter {
                    name: "a".to_string(),
                    ty: Some(TypeNode::Leaf(int)),
                    has_default: false,
                    output: false,
                },
                Parameter {
                    name: "b".to_string(),
                    ty: Some(TypeNode::Leaf(int)),
                    has_default: false,
                    output: false,
                },
            ],
            kind: RoutineKind::Normal,
            is_const: false,
            throws: None,
        }),
    });
    program.scope_mut(global).unwrap().add_routine(
        add,
        Visibility::Public,
        Virtuality::NonVirtual,
        Storage::Normal,
    );
    program
}

const CONFIG: &str = r#"
database = "program.json"
includes = ["widget.h"]
classes = ["Widget"]
functions = ["add"]
namespace = "pinned_ns"

[output]
file = "out.cc"
"#;

fn write_fixture(dir: &Path) {
    let program = sample_program();
    let database = serde_json::to_string(&program).expect("serialize program database");
    std::fs::write(dir.join("program.json"), database).expect("write database");
    std::fs::write(dir.join("flatbind.toml"), CONFIG).expect("write config");
}

#[test]
fn config_parses_with_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_fixture(dir.path());
    let cfg = flatbind::config::load_config(&dir.path().join("flatbind.toml")).expect("config");
    assert_eq!(cfg.output.file, Path::new("out.cc"));
    assert_eq!(cfg.database, Path::new("program.json"));
    assert_eq!(cfg.classes, vec!["Widget".to_string()]);
    assert_eq!(cfg.functions, vec!["add".to_string()]);
    assert!(cfg.enums.is_empty(), "unset lists default to empty");
    assert!(!cfg.interceptors.auto, "interceptors default off");
    assert_eq!(cfg.namespace.as_deref(), Some("pinned_ns"));
}

#[test]
fn program_database_round_trips() {
    let program = sample_program();
    let json = serde_json::to_string(&program).expect("serialize");
    let back: Program = serde_json::from_str(&json).expect("deserialize");
    let widget = back
        .ids()
        .find(|id| back.entity(*id).name == "ping")
        .expect("ping survives the round trip");
    assert_eq!(back.full_name(widget), "Widget::ping");
}

#[test]
fn run_writes_the_registration_unit() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_fixture(dir.path());

    let written = flatbind::run(&dir.path().join("flatbind.toml"), None).expect("run");
    assert_eq!(written, dir.path().join("out.cc"));

    let out = std::fs::read_to_string(&written).expect("read generated unit");
    assert!(
        out.contains("#include \"widget.h\""),
        "include directive missing:\n{out}"
    );
    assert!(
        out.contains("namespace pinned_ns {"),
        "pinned namespace missing:\n{out}"
    );
    assert!(
        out.contains("int __CDECL routine_"),
        "wrappers missing:\n{out}"
    );
    assert!(
        out.contains("{\"Widget\", \"class\", scope_"),
        "Widget entry line missing:\n{out}"
    );
    assert!(
        out.contains("{\"add\", \"int\", routine_"),
        "add entry row missing:\n{out}"
    );
    assert!(
        out.contains("extern \"C\" EXPORT RegData entry[];"),
        "entry declaration missing:\n{out}"
    );
}

#[test]
fn output_flag_overrides_the_config_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_fixture(dir.path());

    let target = dir.path().join("elsewhere.cc");
    let written =
        flatbind::run(&dir.path().join("flatbind.toml"), Some(&target)).expect("run");
    assert_eq!(written, target);
    assert!(target.exists(), "override path must receive the output");

    let generated = flatbind::generate(&dir.path().join("flatbind.toml")).expect("generate");
    let on_disk = std::fs::read(&target).expect("read override output");
    assert_eq!(
        generated, on_disk,
        "generate() must produce the bytes run() writes"
    );
}

#[test]
fn unmatched_requests_do_not_fail_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let program = sample_program();
    let database = serde_json::to_string(&program).expect("serialize program database");
    std::fs::write(dir.path().join("program.json"), database).expect("write database");
    // "Nope" matches nothing; the report warns but the artifact is the same.
    let config = CONFIG.replace(
        "classes = [\"Widget\"]",
        "classes = [\"Widget\", \"Nope\"]",
    );
    std::fs::write(dir.path().join("flatbind.toml"), config).expect("write config");

    let written = flatbind::run(&dir.path().join("flatbind.toml"), None)
        .expect("unmatched names are diagnostic only");
    let out = std::fs::read_to_string(&written).expect("read generated unit");
    assert!(
        out.contains("{\"Widget\", \"class\", scope_"),
        "matched class must still register:\n{out}"
    );
    assert!(!out.contains("Nope"), "unmatched names never reach the artifact");
}

#[test]
fn missing_database_is_a_context_rich_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("flatbind.toml"), CONFIG).expect("write config");

    let err = flatbind::run(&dir.path().join("flatbind.toml"), None)
        .expect_err("a missing database must fail the run");
    let message = format!("{err:#}");
    assert!(
        message.contains("program.json"),
        "error should name the database file: {message}"
    );
}
