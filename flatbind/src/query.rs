//! Read-only structural queries over the model, shared by every emitter.

use std::collections::HashSet;

use crate::model::{
    Contained, EntityId, EntityKind, InheritanceConnection, Program, RoutineDef, Virtuality,
    Visibility,
};
use crate::types::{TemplateArg, TypeNode, resolve_original};

/// Total number of declared parameters.
pub fn count_parameters(routine: &RoutineDef) -> usize {
    routine.parameters.len()
}

/// Number of parameters that must be supplied — total minus the trailing
/// run of defaulted parameters.
pub fn minimal_argument_count(routine: &RoutineDef) -> usize {
    let trailing = routine
        .parameters
        .iter()
        .rev()
        .take_while(|p| p.has_default)
        .count();
    routine.parameters.len() - trailing
}

/// A virtual method visible on a class through its inheritance chain.
///
/// `routine` is the most-derived declaration; its container is the class
/// whose qualified name a fallback call must use.
#[derive(Debug, Clone, Copy)]
pub struct VirtualMethod {
    pub routine: EntityId,
    pub virtuality: Virtuality,
    pub visibility: Visibility,
}

/// Collects the virtual methods of `subject`, walking the subject scope
/// first and then each base depth-first in declaration order. A signature
/// seen in a derived class hides the base declaration.
pub fn virtual_methods(program: &Program, subject: EntityId) -> Vec<VirtualMethod> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    collect_virtuals(program, subject, &mut seen, &mut out);
    out
}

fn collect_virtuals(
    program: &Program,
    class: EntityId,
    seen: &mut HashSet<(String, usize)>,
    out: &mut Vec<VirtualMethod>,
) {
    let Some(agg) = program.aggregate(class) else {
        return;
    };
    for connection in &agg.scope.routines {
        let Some(routine) = program.routine(connection.entity) else {
            continue;
        };
        if routine.is_constructor() || routine.is_destructor() {
            continue;
        }
        if connection.virtuality == Virtuality::NonVirtual {
            continue;
        }
        let key = (
            program.entity(connection.entity).name.clone(),
            routine.parameters.len(),
        );
        if seen.insert(key) {
            out.push(VirtualMethod {
                routine: connection.entity,
                virtuality: connection.virtuality,
                visibility: connection.visibility,
            });
        }
    }
    for base in &agg.bases {
        collect_virtuals(program, base.base, seen, out);
    }
}

/// A class is abstract when a pure virtual method survives to it unoverridden.
pub fn is_abstract(program: &Program, subject: EntityId) -> bool {
    virtual_methods(program, subject)
        .iter()
        .any(|m| m.virtuality == Virtuality::PureVirtual)
}

/// A class is polymorphic when any routine in its chain is virtual,
/// destructors included.
pub fn is_polymorphic(program: &Program, subject: EntityId) -> bool {
    let Some(agg) = program.aggregate(subject) else {
        return false;
    };
    let own = agg
        .scope
        .routines
        .iter()
        .any(|c| c.virtuality != Virtuality::NonVirtual);
    own || agg.bases.iter().any(|b| is_polymorphic(program, b.base))
}

/// Constructors declared in the subject's own scope.
pub fn constructors(program: &Program, subject: EntityId) -> Vec<Contained> {
    let Some(agg) = program.aggregate(subject) else {
        return Vec::new();
    };
    agg.scope
        .routines
        .iter()
        .filter(|c| {
            program
                .routine(c.entity)
                .is_some_and(|r| r.is_constructor())
        })
        .copied()
        .collect()
}

/// True when the class can be built with no arguments: either no user
/// constructor exists (the compiler provides one) or some non-private
/// constructor accepts an empty argument list.
pub fn has_default_constructor(program: &Program, subject: EntityId) -> bool {
    let ctors = constructors(program, subject);
    if ctors.is_empty() {
        return true;
    }
    ctors.iter().any(|c| {
        c.visibility != Visibility::Private
            && program
                .routine(c.entity)
                .is_some_and(|r| minimal_argument_count(r) == 0)
    })
}

/// Fields visible on `subject` down to (and including) `floor` visibility,
/// own scope first and then bases, hidden names deduplicated.
pub fn accessible_fields(
    program: &Program,
    subject: EntityId,
    floor: Visibility,
) -> Vec<(EntityId, Contained)> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    collect_fields(program, subject, floor, &mut seen, &mut out);
    out
}

fn collect_fields(
    program: &Program,
    class: EntityId,
    floor: Visibility,
    seen: &mut HashSet<String>,
    out: &mut Vec<(EntityId, Contained)>,
) {
    let Some(agg) = program.aggregate(class) else {
        return;
    };
    for connection in &agg.scope.fields {
        let accessible = match connection.visibility {
            Visibility::Public => true,
            Visibility::Protected => floor != Visibility::Public,
            Visibility::Private => false,
        };
        if !accessible {
            continue;
        }
        let name = program.entity(connection.entity).name.clone();
        if seen.insert(name) {
            out.push((connection.entity, *connection));
        }
    }
    for base in &agg.bases {
        collect_fields(program, base.base, floor, seen, out);
    }
}

/// True when a free `operator<<` taking the subject as its second argument
/// exists in the global namespace.
pub fn has_output_operator(program: &Program, subject: EntityId) -> bool {
    global_routines(program).into_iter().any(|id| {
        let Some(routine) = program.routine(id) else {
            return false;
        };
        program.entity(id).name == "operator<<"
            && routine.parameters.len() == 2
            && parameter_base(program, routine, 1) == Some(subject)
    })
}

/// Free operators whose first parameter is the subject — these get listed
/// in the subject's registration scope with the instance argument skipped.
pub fn find_globally_scoped_operators(program: &Program, subject: EntityId) -> Vec<EntityId> {
    global_routines(program)
        .into_iter()
        .filter(|id| {
            let name = &program.entity(*id).name;
            let Some(routine) = program.routine(*id) else {
                return false;
            };
            name.starts_with("operator")
                && name != "operator<<"
                && !routine.parameters.is_empty()
                && parameter_base(program, routine, 0) == Some(subject)
        })
        .collect()
}

fn global_routines(program: &Program) -> Vec<EntityId> {
    program
        .scope(program.global)
        .map(|scope| scope.routines.iter().map(|c| c.entity).collect())
        .unwrap_or_default()
}

fn parameter_base(program: &Program, routine: &RoutineDef, index: usize) -> Option<EntityId> {
    let ty = routine.parameters.get(index)?.ty.as_ref()?;
    Some(resolve_original(program, ty).base_entity())
}

/// Name of a base class as it appears in a derivation, template arguments
/// included when the base is templated.
pub fn actual_base_name(program: &Program, connection: &InheritanceConnection) -> String {
    let base_name = program.full_name(connection.base);
    let templated = program
        .aggregate(connection.base)
        .is_some_and(|agg| agg.templated);
    match (&connection.template_args, templated) {
        (Some(args), true) => template_cpp_expression(program, &base_name, args),
        _ => base_name,
    }
}

/// Renders `Base< arg, arg >`.
pub fn template_cpp_expression(program: &Program, base_name: &str, args: &[TemplateArg]) -> String {
    let rendered: Vec<String> = args
        .iter()
        .map(|a| match a {
            TemplateArg::Type(t) => t.format_cpp_bare(program),
            TemplateArg::Literal(lit) => lit.clone(),
            TemplateArg::Unresolved => "?".to_string(),
        })
        .collect();
    format!("{}< {} >", base_name, rendered.join(", "))
}

/// Both forms a requested identifier may take for an entity.
pub fn possible_names(program: &Program, id: EntityId) -> Vec<String> {
    let bare = program.entity(id).name.clone();
    let full = program.full_name(id);
    if bare == full {
        vec![bare]
    } else {
        vec![bare, full]
    }
}

/// True when the type names an array anywhere in its spine after alias
/// resolution.
pub fn is_array_type(program: &Program, ty: &TypeNode) -> bool {
    resolve_original(program, ty).is_array()
}

/// True when the base of the resolved type is an enumerated type.
pub fn is_enum_based(program: &Program, ty: &TypeNode) -> bool {
    let resolved = resolve_original(program, ty);
    matches!(
        program.entity(resolved.base_entity()).kind,
        EntityKind::Enum(_)
    )
}
