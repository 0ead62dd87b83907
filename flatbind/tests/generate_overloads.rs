//! Default-argument overload expansion: a routine with `d` trailing
//! defaults yields `d+1` wrapper/prototype pairs, all sharing one base
//! identifier, plus matching entry-table rows.

use std::sync::LazyLock;

use flatbind::error::GenError;
use flatbind::model::{
    Entity, EntityKind, Parameter, Program, RoutineDef, RoutineKind, Storage, Virtuality,
    Visibility,
};
use flatbind::types::TypeNode;
use flatbind::{Generator, GeneratorOptions};

fn int_parameter(program: &mut Program, name: &str, has_default: bool) -> Parameter {
    let int = program.ensure_primitive("int");
    Parameter {
        name: name.to_string(),
        ty: Some(TypeNode::Leaf(int)),
        has_default,
        output: false,
    }
}

/// `int add(int a, int b, int c = 0)` at global scope.
static ADD_OUTPUT: LazyLock<String> = LazyLock::new(|| {
    let mut program = Program::new();
    let global = program.global;
    let int = program.ensure_primitive("int");
    let parameters = vec![
        int_parameter(&mut program, "a", false),
        int_parameter(&mut program, "b", false),
        int_parameter(&mut program, "c", true),
    ];
    let add = program.add(Entity {
        name: "add".to_string(),
        container: Some(global),
        location: None,
        kind: EntityKind::Routine(RoutineDef {
            return_type: Some(TypeNode::Leaf(int)),
            parameters,
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

    let mut out = Vec::new();
    {
        let mut generator = Generator::new(
            &mut program,
            &mut out,
            GeneratorOptions {
                namespace: Some("flatbind_test".to_string()),
            },
        );
        generator.add_global_function(add);
        generator.collect_constants().expect("collect constants");
        generator.generate_preface().expect("preface");
        generator.generate_routine_wrappers().expect("routine wrappers");
        generator.generate_entry().expect("entry");
    }
    String::from_utf8(out).expect("generated source is utf-8")
});

#[test]
fn one_wrapper_per_argument_count() {
    let out = &*ADD_OUTPUT;
    assert!(
        out.contains("int __CDECL routine_1s2(int a, int b)"),
        "two-argument wrapper missing:\n{out}"
    );
    assert!(
        out.contains("int __CDECL routine_1s3(int a, int b, int c)"),
        "three-argument wrapper missing:\n{out}"
    );
    assert_eq!(
        out.matches("__CDECL routine_1s").count(),
        2,
        "exactly d+1 wrappers expected:\n{out}"
    );
    assert!(
        out.contains("\treturn add(a, b);"),
        "two-argument call expression missing:\n{out}"
    );
    assert!(
        out.contains("\treturn add(a, b, c);"),
        "three-argument call expression missing:\n{out}"
    );
}

#[test]
fn one_prototype_per_argument_count() {
    let out = &*ADD_OUTPUT;
    assert!(
        out.contains("RegData routine_1s2_proto[] = {"),
        "two-argument prototype missing:\n{out}"
    );
    assert!(
        out.contains("RegData routine_1s3_proto[] = {"),
        "three-argument prototype missing:\n{out}"
    );
    // The defaulted parameter appears only in the full prototype.
    assert_eq!(
        out.matches("{\"c\", \"int\", 0},").count(),
        1,
        "defaulted parameter should be described exactly once:\n{out}"
    );
    assert_eq!(
        out.matches("{\"a\", \"int\", 0},").count(),
        2,
        "leading parameter should appear in both prototypes:\n{out}"
    );
}

#[test]
fn entry_rows_share_name_but_not_symbols() {
    let out = &*ADD_OUTPUT;
    let rows: Vec<&str> = out
        .lines()
        .filter(|l| l.starts_with("{\"add\", \"int\", "))
        .collect();
    assert_eq!(rows.len(), 2, "two entry rows expected, got: {rows:?}");
    assert!(
        rows[0].contains("routine_1s2_proto+0, (void*)&routine_1s2"),
        "first row should bind the two-argument pair: {rows:?}"
    );
    assert!(
        rows[1].contains("routine_1s3_proto+0, (void*)&routine_1s3"),
        "second row should bind the three-argument pair: {rows:?}"
    );
}

#[test]
fn static_pass_skips_unresolvable_methods_and_continues() {
    let mut program = Program::new();
    let global = program.global;
    let int = program.ensure_primitive("int");

    let gadget = program.add(Entity {
        name: "Gadget".to_string(),
        container: Some(global),
        location: None,
        kind: EntityKind::Aggregate(Default::default()),
    });
    let fine = program.add(Entity {
        name: "fine".to_string(),
        container: Some(gadget),
        location: None,
        kind: EntityKind::Routine(RoutineDef {
            return_type: Some(TypeNode::Leaf(int)),
            parameters: Vec::new(),
            kind: RoutineKind::Normal,
            is_const: false,
            throws: None,
        }),
    });
    let broken = program.add(Entity {
        name: "broken".to_string(),
        container: Some(gadget),
        location: None,
        kind: EntityKind::Routine(RoutineDef {
            return_type: None,
            parameters: vec![Parameter {
                name: "x".to_string(),
                ty: None,
                has_default: false,
                output: false,
            }],
            kind: RoutineKind::Normal,
            is_const: false,
            throws: None,
        }),
    });
    {
        let scope = program.scope_mut(gadget).unwrap();
        scope.add_routine(fine, Visibility::Public, Virtuality::NonVirtual, Storage::Normal);
        scope.add_routine(broken, Visibility::Public, Virtuality::NonVirtual, Storage::Normal);
    }

    let mut out = Vec::new();
    {
        let mut generator = Generator::new(
            &mut program,
            &mut out,
            GeneratorOptions {
                namespace: Some("flatbind_test".to_string()),
            },
        );
        generator.add_subject(gadget);
        generator.generate_preface().expect("preface");
        generator
            .generate_static_routines()
            .expect("the static pass must recover from missing information");
    }
    let out = String::from_utf8(out).unwrap();
    assert!(
        out.contains("self->Gadget::fine()"),
        "resolvable method should still get its static wrapper:\n{out}"
    );
    assert!(
        !out.contains("broken"),
        "unresolvable method must be skipped:\n{out}"
    );
}

#[test]
fn routine_wrappers_abort_on_missing_information() {
    let mut program = Program::new();
    let global = program.global;
    let bad = program.add(Entity {
        name: "bad".to_string(),
        container: Some(global),
        location: None,
        kind: EntityKind::Routine(RoutineDef {
            return_type: None,
            parameters: vec![Parameter {
                name: "x".to_string(),
                ty: None,
                has_default: false,
                output: false,
            }],
            kind: RoutineKind::Normal,
            is_const: false,
            throws: None,
        }),
    });

    let mut out = Vec::new();
    let mut generator = Generator::new(
        &mut program,
        &mut out,
        GeneratorOptions {
            namespace: Some("flatbind_test".to_string()),
        },
    );
    generator.add_global_function(bad);
    let err = generator
        .generate_routine_wrappers()
        .expect_err("an unresolvable global function must abort the pass");
    match err {
        GenError::MissingInformation(msg) => {
            assert!(msg.contains("bad"), "error should name the routine: {msg}");
            assert!(msg.contains("'x'"), "error should name the parameter: {msg}");
        }
        other => panic!("expected MissingInformation, got {other}"),
    }
}
