//! Unit coverage for the identity service, the type expression tree, and
//! transformer deduction.

use flatbind::error::GenError;
use flatbind::identity::{Identified, IdentityMap};
use flatbind::model::{AliasDef, Entity, EntityId, EntityKind, EnumDef, Parameter, Program};
use flatbind::transform::{
    self, BodyExpr, TouchupTable, deduce_parameter_transformer, deduce_parameter_transformers,
    deduce_return_transformer,
};
use flatbind::types::{TemplateArg, TypeNode, resolve_original};
use flatbind::wrappers::prototype_is_pointer_shaped;

fn leaf_entity(program: &mut Program, name: &str, kind: EntityKind) -> EntityId {
    let global = program.global;
    program.add(Entity {
        name: name.to_string(),
        container: Some(global),
        location: None,
        kind,
    })
}

#[test]
fn identity_is_memoized_and_dense() {
    let mut uids = IdentityMap::new();
    let a = Identified::Entity(EntityId(7));
    let b = Identified::Entity(EntityId(8));
    assert_eq!(uids.id(a), 1, "first object gets identity 1");
    assert_eq!(uids.id(b), 2, "second object gets identity 2");
    assert_eq!(uids.id(a), 1, "repeated queries are stable");
    assert_eq!(uids.id(b), 2, "repeated queries are stable");
    // A scope keyed by the same entity is a distinct object.
    assert_eq!(uids.id(Identified::Scope(EntityId(7))), 3);
    assert_eq!(uids.id(Identified::EnumConstant(EntityId(7), 0)), 4);
    assert_eq!(uids.id(Identified::EnumConstant(EntityId(7), 1)), 5);
}

#[test]
fn touchup_substitutes_are_pointer_shaped() {
    let mut program = Program::new();
    let touchups = TouchupTable::standard(&mut program);
    let mut count = 0;
    for touchup in touchups.iter() {
        assert!(
            prototype_is_pointer_shaped(&touchup.substitute),
            "every substitute must be a pointer: {:?}",
            touchup.substitute
        );
        count += 1;
    }
    assert_eq!(count, 4, "float, double and the 64-bit integers");
}

#[test]
fn alias_resolution_folds_chains() {
    let mut program = Program::new();
    let int = program.ensure_primitive("int");
    let inner = leaf_entity(
        &mut program,
        "Inner",
        EntityKind::Alias(AliasDef {
            aliased: TypeNode::Leaf(int),
        }),
    );
    let outer = leaf_entity(
        &mut program,
        "Outer",
        EntityKind::Alias(AliasDef {
            aliased: TypeNode::pointer(TypeNode::Leaf(inner)),
        }),
    );
    let resolved = resolve_original(&program, &TypeNode::Leaf(outer));
    assert_eq!(resolved, TypeNode::pointer(TypeNode::Leaf(int)));
    assert!(resolved.is_flat());
}

#[test]
fn cpp_formatting_keeps_declarator_meaning() {
    let mut program = Program::new();
    let int = program.ensure_primitive("int");
    let charp = program.ensure_primitive("char");
    let vec = leaf_entity(&mut program, "vec", EntityKind::Aggregate(Default::default()));

    let const_char_ptr = TypeNode::pointer(TypeNode::constant(TypeNode::Leaf(charp)));
    assert_eq!(const_char_ptr.format_cpp(&program, "s"), "const char *s");

    let array_of_ptr = TypeNode::Array(Box::new(TypeNode::pointer(TypeNode::Leaf(int))), Some(2));
    assert_eq!(array_of_ptr.format_cpp(&program, "x"), "int *x[2]");

    let ptr_to_array = TypeNode::pointer(TypeNode::Array(Box::new(TypeNode::Leaf(int)), Some(2)));
    assert_eq!(ptr_to_array.format_cpp(&program, "x"), "int (*x)[2]");

    let templated = TypeNode::Template {
        base: vec,
        args: vec![TemplateArg::Type(TypeNode::Leaf(int))],
    };
    assert_eq!(templated.format_cpp_bare(&program), "vec< int >");
}

#[test]
fn reference_to_small_primitive_collapses_to_value() {
    let mut program = Program::new();
    let touchups = TouchupTable::standard(&mut program);
    let int = program.ensure_primitive("int");
    let ty = TypeNode::reference(TypeNode::constant(TypeNode::Leaf(int)));
    let t = deduce_parameter_transformer(&program, &touchups, "n", Some(&ty)).unwrap();
    assert_eq!(t.prototype, TypeNode::constant(TypeNode::Leaf(int)));
    assert!(matches!(t.body, BodyExpr::Identity));
    assert_eq!(t.reg_type, "int");
}

#[test]
fn by_value_aggregate_travels_behind_a_pointer() {
    let mut program = Program::new();
    let touchups = TouchupTable::standard(&mut program);
    let point = leaf_entity(&mut program, "Point", EntityKind::Aggregate(Default::default()));
    let ty = TypeNode::Leaf(point);

    let param = deduce_parameter_transformer(&program, &touchups, "p", Some(&ty)).unwrap();
    assert!(prototype_is_pointer_shaped(&param.prototype));
    assert_eq!(param.body.apply("p"), "*p");
    assert_eq!(param.reg_type, "*Point");

    let ret = deduce_return_transformer(&program, &touchups, Some(&ty)).unwrap();
    assert!(prototype_is_pointer_shaped(&ret.prototype));
    assert_eq!(ret.body.apply("self->get()"), "new Point(self->get())");
}

#[test]
fn touched_up_parameter_uses_touchdown() {
    let mut program = Program::new();
    let touchups = TouchupTable::standard(&mut program);
    let double = program.ensure_primitive("double");
    let t =
        deduce_parameter_transformer(&program, &touchups, "v", Some(&TypeNode::Leaf(double)))
            .unwrap();
    assert!(prototype_is_pointer_shaped(&t.prototype));
    assert_eq!(t.body.apply("v"), "touchdown(v)");
    assert_eq!(t.reg_type, "*double");
}

#[test]
fn decorated_parameter_descriptors() {
    let mut program = Program::new();
    let charp = program.ensure_primitive("char");
    let point = leaf_entity(&mut program, "Point", EntityKind::Aggregate(Default::default()));
    let color = leaf_entity(
        &mut program,
        "Color",
        EntityKind::Enum(EnumDef {
            constants: Vec::new(),
        }),
    );
    let vec = leaf_entity(&mut program, "vec", EntityKind::Aggregate(Default::default()));

    let descriptor = |program: &Program, ty: TypeNode, output: bool| {
        transform::decorated_parameter_type(
            program,
            &Parameter {
                name: "arg".to_string(),
                ty: Some(ty),
                has_default: false,
                output,
            },
        )
        .unwrap()
    };

    // An output parameter consumes one pointer level.
    let ptrptr = TypeNode::pointer(TypeNode::pointer(TypeNode::Leaf(point)));
    assert_eq!(descriptor(&program, ptrptr, true), ">*Point");

    // A reference is marked, a by-value aggregate gets the extra `&`.
    let reference = TypeNode::reference(TypeNode::Leaf(point));
    assert_eq!(descriptor(&program, reference, false), "&Point");
    assert_eq!(descriptor(&program, TypeNode::Leaf(point), false), "&Point");

    // char* keeps its pointer even though char is primitive.
    let char_ptr = TypeNode::pointer(TypeNode::Leaf(charp));
    assert_eq!(descriptor(&program, char_ptr, false), "*char");

    // Enumerated bases are hash-marked.
    assert_eq!(descriptor(&program, TypeNode::Leaf(color), false), "#Color");

    // Unresolved template arguments render as `?`.
    let open = TypeNode::pointer(TypeNode::Template {
        base: vec,
        args: vec![TemplateArg::Unresolved],
    });
    assert!(!TypeNode::Template {
        base: vec,
        args: vec![TemplateArg::Unresolved],
    }
    .is_flat());
    assert_eq!(descriptor(&program, open, false), "*vec< ? >");
}

#[test]
fn missing_parameter_type_is_reported() {
    let mut program = Program::new();
    let touchups = TouchupTable::standard(&mut program);
    let parameters = vec![Parameter {
        name: "mystery".to_string(),
        ty: None,
        has_default: false,
        output: false,
    }];
    let err = deduce_parameter_transformers(&program, &touchups, &parameters, 1)
        .expect_err("unresolved parameter must fail");
    match err {
        GenError::MissingInformation(msg) => {
            assert!(msg.contains("mystery"), "error should name the parameter: {msg}")
        }
        other => panic!("expected MissingInformation, got {other}"),
    }
}
