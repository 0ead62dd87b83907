//! Wrapping policy — which entities get wrappers, and how types behave
//! across the generic-slot boundary.

use crate::model::{
    Contained, EntityId, EntityKind, Program, RoutineKind, Storage, Visibility,
};
use crate::query;
use crate::types::{TypeNode, resolve_original};

/// Primitives that fit a pointer-sized slot as-is. Everything else either
/// has a touchup entry or crosses the boundary behind a pointer.
const SMALL_PRIMITIVES: &[&str] = &[
    "bool",
    "char",
    "signed char",
    "unsigned char",
    "short",
    "unsigned short",
    "int",
    "unsigned int",
    "long",
    "unsigned long",
];

pub fn is_primitive(program: &Program, id: EntityId) -> bool {
    program.is_primitive(id)
}

pub fn is_small_primitive(program: &Program, id: EntityId) -> bool {
    let entity = program.entity(id);
    matches!(entity.kind, EntityKind::Primitive) && SMALL_PRIMITIVES.contains(&entity.name.as_str())
}

/// An entity takes part in wrapping when it has a usable name and is not a
/// class template (templates get a separate instantiation-driven pass that
/// this generator does not perform).
pub fn is_available(program: &Program, id: EntityId) -> bool {
    let entity = program.entity(id);
    if entity.name.is_empty() {
        return false;
    }
    match &entity.kind {
        EntityKind::Aggregate(agg) => !agg.templated,
        _ => true,
    }
}

/// Fields are wrapped when public and resolvable.
pub fn is_available_field(program: &Program, connection: &Contained) -> bool {
    connection.visibility == Visibility::Public && is_available(program, connection.entity)
}

/// A field counts as a program constant when it is public and either
/// class-static or declared at namespace scope.
pub fn is_available_static_field(program: &Program, connection: &Contained) -> bool {
    if connection.visibility != Visibility::Public {
        return false;
    }
    if connection.storage == Storage::Static {
        return true;
    }
    let container = program.entity(connection.entity).container;
    container.is_some_and(|c| matches!(program.entity(c).kind, EntityKind::Namespace(_)))
}

/// Methods eligible for the static-call wrapper pass: plain public methods,
/// operators and the special members excluded.
pub fn is_available_static_routine(program: &Program, connection: &Contained) -> bool {
    if connection.visibility != Visibility::Public {
        return false;
    }
    let Some(routine) = program.routine(connection.entity) else {
        return false;
    };
    routine.kind == RoutineKind::Normal
        && !program.entity(connection.entity).name.starts_with("operator")
}

/// A set accessor is generated unless the field is const or an array.
pub fn has_setter(program: &Program, field: EntityId) -> bool {
    let Some(def) = program.field(field) else {
        return false;
    };
    !matches!(def.ty, TypeNode::Const(_)) && !query::is_array_type(program, &def.ty)
}

/// A class can be derived from when some constructor path is non-private.
pub fn is_class_extendible(program: &Program, subject: EntityId) -> bool {
    let ctors = query::constructors(program, subject);
    ctors.is_empty() || ctors.iter().any(|c| c.visibility != Visibility::Private)
}

/// Assignment support: concrete and free of const or reference fields in
/// the class's own scope (either would delete the copy assignment).
pub fn is_assignment_supportive(program: &Program, subject: EntityId) -> bool {
    if query::is_abstract(program, subject) {
        return false;
    }
    let Some(agg) = program.aggregate(subject) else {
        return false;
    };
    agg.scope.fields.iter().all(|c| {
        program.field(c.entity).is_none_or(|f| {
            !matches!(f.ty, TypeNode::Const(_)) && !f.ty.is_reference()
        })
    })
}

/// Clone support: any concrete class is assumed copy-constructible.
pub fn is_cloneable(program: &Program, subject: EntityId) -> bool {
    !query::is_abstract(program, subject)
}

/// A typedef needs a proxy class when it abbreviates a bare primitive —
/// boxing gives the value object identity on the scripting side. Aliases
/// of class types forward to the class registration instead.
pub fn needs_encapsulation(program: &Program, alias: EntityId) -> bool {
    let Some(def) = program.alias(alias) else {
        return false;
    };
    let resolved = resolve_original(program, &def.aliased);
    if resolved.is_reference() || resolved.pointer_degree() > 0 || resolved.is_array() {
        return false;
    }
    let base = program.entity(resolved.base_entity());
    matches!(base.kind, EntityKind::Primitive) && base.name != "void"
}

pub fn is_declared(program: &Program, id: EntityId) -> bool {
    program.entity(id).location.is_some()
}

/// True when the native value must cross the slot boundary behind a
/// pointer even though the native signature takes it directly: any
/// by-value aggregate, since those are neither bitwise-movable through a
/// slot nor free of construct/destroy steps.
pub fn needs_extra_referencing(program: &Program, ty: &TypeNode) -> bool {
    let resolved = resolve_original(program, ty);
    if resolved.is_reference() || resolved.pointer_degree() > 0 || resolved.is_array() {
        return false;
    }
    matches!(
        program.entity(resolved.base_entity()).kind,
        EntityKind::Aggregate(_)
    )
}
