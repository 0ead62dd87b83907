//! The registration root: dependency-ordered class lines, enum and typedef
//! lines, cast helpers, and the closing sentinel.

use std::sync::LazyLock;

use flatbind::model::{
    AliasDef, Entity, EntityKind, EnumConstant, EnumDef, Program, RoutineDef, RoutineKind,
    SourceLocation, Storage, Virtuality, Visibility,
};
use flatbind::types::TypeNode;
use flatbind::{Generator, GeneratorOptions};

fn aggregate(program: &mut Program, name: &str, bases: &[flatbind::model::EntityId]) -> flatbind::model::EntityId {
    let global = program.global;
    let id = program.add(Entity {
        name: name.to_string(),
        container: Some(global),
        location: None,
        kind: EntityKind::Aggregate(Default::default()),
    });
    for base in bases {
        program
            .aggregate_mut(id)
            .unwrap()
            .bases
            .push(flatbind::model::InheritanceConnection {
                base: *base,
                visibility: Visibility::Public,
                template_args: None,
            });
    }
    id
}

/// A diamond-free chain `Top : Mid : Base` (Base polymorphic), a separate
/// `Standalone : NP` pair (NP not polymorphic), one enum and two typedefs.
static ENTRY_OUTPUT: LazyLock<String> = LazyLock::new(|| {
    let mut program = Program::new();
    let global = program.global;
    let int = program.ensure_primitive("int");

    let base = aggregate(&mut program, "Base", &[]);
    let poke = program.add(Entity {
        name: "poke".to_string(),
        container: Some(base),
        location: None,
        kind: EntityKind::Routine(RoutineDef {
            return_type: None,
            parameters: Vec::new(),
            kind: RoutineKind::Normal,
            is_const: false,
            throws: None,
        }),
    });
    program.scope_mut(base).unwrap().add_routine(
        poke,
        Visibility::Public,
        Virtuality::Virtual,
        Storage::Normal,
    );
    let mid = aggregate(&mut program, "Mid", &[base]);
    let top = aggregate(&mut program, "Top", &[mid]);
    let np = aggregate(&mut program, "NP", &[]);
    let standalone = aggregate(&mut program, "Standalone", &[np]);

    let color = program.add(Entity {
        name: "Color".to_string(),
        container: Some(global),
        location: None,
        kind: EntityKind::Enum(EnumDef {
            constants: vec![
                EnumConstant {
                    literal: "RED".to_string(),
                },
                EnumConstant {
                    literal: "GREEN".to_string(),
                },
            ],
        }),
    });
    let handle = program.add(Entity {
        name: "Handle".to_string(),
        container: Some(global),
        location: Some(SourceLocation {
            file: "geometry.h".to_string(),
            line: 12,
        }),
        kind: EntityKind::Alias(AliasDef {
            aliased: TypeNode::Leaf(int),
        }),
    });
    let base_alias = program.add(Entity {
        name: "BaseAlias".to_string(),
        container: Some(global),
        location: Some(SourceLocation {
            file: "geometry.h".to_string(),
            line: 13,
        }),
        kind: EntityKind::Alias(AliasDef {
            aliased: TypeNode::Leaf(base),
        }),
    });

    let mut out = Vec::new();
    {
        let mut generator = Generator::new(
            &mut program,
            &mut out,
            GeneratorOptions {
                namespace: Some("flatbind_test".to_string()),
            },
        );
        // Deliberately derived-first, to exercise the dependency sort.
        generator.add_subject(top);
        generator.add_subject(mid);
        generator.add_subject(base);
        generator.add_subject(standalone);
        generator.add_subject(np);
        generator.add_enum(color);
        generator.add_typedef(handle);
        generator.add_typedef(base_alias);
        generator.collect_constants().expect("collect constants");
        generator
            .generate_include_directives(&["geometry.h".to_string()])
            .expect("include directives");
        generator.generate_preface().expect("preface");
        generator.generate_routine_wrappers().expect("routine wrappers");
        generator.generate_constant_wrappers().expect("constants");
        generator
            .generate_enumerated_type_wrappers()
            .expect("enums");
        generator.generate_entry().expect("entry");
    }
    String::from_utf8(out).expect("generated source is utf-8")
});

#[test]
fn include_directives_and_missing_locations() {
    let out = &*ENTRY_OUTPUT;
    assert!(
        out.contains("#include \"geometry.h\""),
        "verbatim include missing:\n{out}"
    );
    assert!(
        out.contains("// Base: location specification may be missing?"),
        "undeclared subject should draw a comment:\n{out}"
    );
}

#[test]
fn bases_register_before_derivatives() {
    let out = &*ENTRY_OUTPUT;
    let pos = |name: &str| {
        out.find(&format!("\t{{\"{name}\", \"class\", scope_"))
            .unwrap_or_else(|| panic!("entry line for {name} missing:\n{out}"))
    };
    assert!(pos("Base") < pos("Mid"), "Base must precede Mid");
    assert!(pos("Mid") < pos("Top"), "Mid must precede Top");
    assert!(pos("NP") < pos("Standalone"), "NP must precede Standalone");
}

#[test]
fn enums_and_typedefs_precede_classes() {
    let out = &*ENTRY_OUTPUT;
    let enum_pos = out
        .find("\t{\"Color\", \"enum\", enumerated_")
        .expect("enum entry line");
    let proxy_pos = out
        .find("\t{\"Handle\", \"class\", alias_")
        .expect("encapsulated typedef line");
    let forward_pos = out
        .find("\t{\"BaseAlias\", \"=Base\", 0},")
        .expect("forwarding typedef line");
    let class_pos = out
        .find("\t{\"Base\", \"class\", scope_")
        .expect("class entry line");
    assert!(enum_pos < proxy_pos, "enums come before typedefs");
    assert!(proxy_pos < forward_pos, "typedefs keep list order");
    assert!(forward_pos < class_pos, "typedefs come before classes");
}

#[test]
fn enum_cells_and_table() {
    let out = &*ENTRY_OUTPUT;
    assert!(
        out.contains(" = (int)RED;"),
        "enum constant cell missing:\n{out}"
    );
    assert!(
        out.contains("\t{ \"GREEN\", 0, 0, (void*)&const_"),
        "enum table row missing:\n{out}"
    );
}

#[test]
fn encapsulated_typedef_gets_a_proxy_class() {
    let out = &*ENTRY_OUTPUT;
    assert!(
        out.contains("Handle* __CDECL routine_alias_"),
        "boxing constructor missing:\n{out}"
    );
    assert!(
        out.contains("int __CDECL routine_unalias_"),
        "value accessor missing:\n{out}"
    );
    assert!(
        out.contains("\t{ \"^\", \"constructor\", routine_alias_"),
        "proxy ctor row missing:\n{out}"
    );
    assert!(
        out.contains("\t{ \"as\", \"int\", routine_unalias_"),
        "proxy accessor row missing:\n{out}"
    );
    assert!(
        out.contains("\t{ \".\", \"destructor\", 0, (void*)&dtor_alias_"),
        "proxy dtor row missing:\n{out}"
    );
}

#[test]
fn upcasts_always_downcasts_only_for_polymorphic_bases() {
    let out = &*ENTRY_OUTPUT;
    assert!(
        out.contains("Base* __CDECL upcast_"),
        "upcast to Base missing:\n{out}"
    );
    assert!(
        out.contains("NP* __CDECL upcast_"),
        "upcast to NP missing:\n{out}"
    );
    assert!(
        out.contains("dynamic_cast<Mid*>"),
        "downcast to Mid through polymorphic Base missing:\n{out}"
    );
    assert!(
        !out.contains("dynamic_cast<Standalone*>"),
        "NP is not polymorphic, no downcast may exist:\n{out}"
    );
    assert!(
        out.contains("{ \"dynamic_cast< Mid >\", \"&Mid\", downcast_"),
        "downcaster entry line missing:\n{out}"
    );
}

#[test]
fn namespace_closes_before_the_extern_entry_table() {
    let out = &*ENTRY_OUTPUT;
    let close_pos = out
        .find("}  // end of flatbind_test namespace")
        .expect("namespace close");
    let using_pos = out
        .find("using namespace flatbind_test;")
        .expect("using directive");
    let extern_pos = out
        .find("extern \"C\" EXPORT RegData entry[];")
        .expect("extern entry declaration");
    assert!(close_pos < using_pos && using_pos < extern_pos);
    assert!(
        out.trim_end().ends_with("};"),
        "output must end with the closed entry table"
    );
    let sentinel = out.rfind("\t{ 0,0,0,0 }").expect("sentinel present");
    assert!(
        sentinel > extern_pos,
        "the entry table must be sentinel-terminated"
    );
}
