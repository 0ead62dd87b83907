//! Type transform engine — how native values cross the generic-slot ABI.
//!
//! Every argument and result crosses the boundary as one pointer-sized
//! opaque slot. Values that can be reinterpreted into a slot pass through
//! unchanged; by-value aggregates travel behind a pointer; the handful of
//! primitives whose representation does not fit (float, double, the 64-bit
//! integers) are boxed through `touchup`/`touchdown` free functions that
//! the preface emits exactly once. Keeping those in one table confines
//! ABI-width assumptions to this module.

use crate::error::{GenError, Result};
use crate::filters;
use crate::model::{EntityKind, Parameter, Program};
use crate::types::{TemplateArg, TypeNode, resolve_original};

/// A boxed-representation substitute for a type that cannot ride a slot.
#[derive(Debug, Clone)]
pub struct Touchup {
    /// The pointer-shaped type used in flat signatures instead.
    pub substitute: TypeNode,
    /// The touchup/touchdown function pair, emitted in the preface.
    pub code: String,
}

/// Side-table from a native type (structural identity, aliases resolved)
/// to its substitute. Entries are kept in registration order so the
/// preface emits the conversion functions deterministically.
#[derive(Debug, Default)]
pub struct TouchupTable {
    entries: Vec<(TypeNode, Touchup)>,
}

impl TouchupTable {
    /// The standard table: float reinterpreted through a union, double and
    /// the 64-bit integers heap-boxed.
    pub fn standard(program: &mut Program) -> Self {
        let void = program.ensure_primitive("void");
        let float = program.ensure_primitive("float");
        let double = program.ensure_primitive("double");
        let longlong = program.ensure_primitive("long long");
        let ulonglong = program.ensure_primitive("unsigned long long");

        let mut table = TouchupTable::default();
        table.put(
            TypeNode::Leaf(float),
            Touchup {
                substitute: TypeNode::pointer(TypeNode::constant(TypeNode::Leaf(void))),
                code: "const void *touchup(float val)\n{\n\
                       \treturn union_cast<void*>(val);\n}\n\
                       float touchdown(const void* val)\n{\n\
                       \treturn union_cast<float>(val);\n}\n"
                    .to_string(),
            },
        );
        table.put(
            TypeNode::Leaf(double),
            Touchup {
                substitute: TypeNode::pointer(TypeNode::constant(TypeNode::Leaf(double))),
                code: "const double *touchup(double val)\n{\n\
                       \treturn new double(val);\n}\n\
                       double touchdown(const double* val)\n{\n\
                       \treturn *std::auto_ptr<const double>(val);\n}\n"
                    .to_string(),
            },
        );
        table.put(
            TypeNode::Leaf(longlong),
            Touchup {
                substitute: TypeNode::pointer(TypeNode::Leaf(longlong)),
                code: "long long *touchup(long long val)\n{\n\
                       \treturn new long long(val);\n}\n\
                       long long touchdown(long long* val)\n{\n\
                       \treturn *std::auto_ptr<long long>(val);\n}\n"
                    .to_string(),
            },
        );
        table.put(
            TypeNode::Leaf(ulonglong),
            Touchup {
                substitute: TypeNode::pointer(TypeNode::Leaf(ulonglong)),
                code: "unsigned long long *touchup(unsigned long long val)\n{\n\
                       \treturn new unsigned long long(val);\n}\n\
                       unsigned long long touchdown(unsigned long long* val)\n{\n\
                       \treturn *std::auto_ptr<unsigned long long>(val);\n}\n"
                    .to_string(),
            },
        );
        table
    }

    /// Registers a substitute. At most one entry exists per structural
    /// signature; a repeated key replaces the earlier substitute.
    pub fn put(&mut self, native: TypeNode, touchup: Touchup) {
        if let Some(slot) = self.entries.iter_mut().find(|(t, _)| *t == native) {
            slot.1 = touchup;
        } else {
            self.entries.push((native, touchup));
        }
    }

    /// Exact lookup after resolving to the original type.
    pub fn get(&self, program: &Program, ty: &TypeNode) -> Option<&Touchup> {
        let resolved = resolve_original(program, ty);
        self.entries
            .iter()
            .find(|(t, _)| *t == resolved)
            .map(|(_, touchup)| touchup)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Touchup> {
        self.entries.iter().map(|(_, touchup)| touchup)
    }
}

/// Expression rewrite bridging one value across the flat boundary. Applied
/// either to a flat argument name (parameter direction) or to the whole
/// native call expression (return direction).
#[derive(Debug, Clone)]
pub enum BodyExpr {
    /// Pass through unchanged.
    Identity,
    /// `*expr` — the flat side carries a pointer to the native value.
    Deref,
    /// `touchdown(expr)` — unbox a touched-up slot.
    Touchdown,
    /// `touchup(expr)` — box a native value for the slot.
    Touchup,
    /// `new T(expr)` — heap-construct a copy the runtime takes ownership of.
    ConstructCopy(String),
    /// `delete expr` — release an object the flat boundary owns.
    DeleteSelf,
}

impl BodyExpr {
    pub fn apply(&self, expr: &str) -> String {
        match self {
            BodyExpr::Identity => expr.to_string(),
            BodyExpr::Deref => format!("*{expr}"),
            BodyExpr::Touchdown => format!("touchdown({expr})"),
            BodyExpr::Touchup => format!("touchup({expr})"),
            BodyExpr::ConstructCopy(classname) => format!("new {classname}({expr})"),
            BodyExpr::DeleteSelf => format!("delete {expr}"),
        }
    }
}

/// How one parameter or result appears in a flat wrapper: the type written
/// in the signature, the conversion expression used in the body, and the
/// type string reported in registration data. Deduced fresh per use and
/// never shared.
#[derive(Debug, Clone)]
pub struct ParameterTransformer {
    pub name: String,
    pub prototype: TypeNode,
    pub body: BodyExpr,
    pub reg_type: String,
}

/// Deduces the transformer for one parameter type.
pub fn deduce_parameter_transformer(
    program: &Program,
    touchups: &TouchupTable,
    name: &str,
    ty: Option<&TypeNode>,
) -> Result<ParameterTransformer> {
    let ty = ty.ok_or_else(|| {
        GenError::MissingInformation(format!("type of parameter '{name}' is unresolved"))
    })?;
    let original = resolve_original(program, ty);

    if let Some(touchup) = touchups.get(program, &original) {
        return Ok(ParameterTransformer {
            name: name.to_string(),
            prototype: touchup.substitute.clone(),
            body: BodyExpr::Touchdown,
            reg_type: reg_type_string(program, &touchup.substitute),
        });
    }
    // A reference to a small primitive is redundant across the boundary;
    // carry the value itself.
    if original.is_reference()
        && filters::is_small_primitive(program, original.base_entity())
    {
        let collapsed = original.strip_reference();
        let reg = reg_type_string(program, &collapsed);
        return Ok(ParameterTransformer {
            name: name.to_string(),
            prototype: collapsed,
            body: BodyExpr::Identity,
            reg_type: reg,
        });
    }
    if filters::needs_extra_referencing(program, &original) {
        return Ok(ParameterTransformer {
            name: name.to_string(),
            prototype: TypeNode::pointer(ty.clone()),
            body: BodyExpr::Deref,
            reg_type: reg_type_string(program, &original),
        });
    }
    Ok(ParameterTransformer {
        name: name.to_string(),
        prototype: ty.clone(),
        body: BodyExpr::Identity,
        reg_type: reg_type_string(program, &original),
    })
}

/// Deduces transformers for the first `n_arguments` parameters, failing
/// with MissingInformation when any of their types is unresolved.
pub fn deduce_parameter_transformers(
    program: &Program,
    touchups: &TouchupTable,
    parameters: &[Parameter],
    n_arguments: usize,
) -> Result<Vec<ParameterTransformer>> {
    parameters
        .iter()
        .take(n_arguments)
        .map(|p| deduce_parameter_transformer(program, touchups, &p.name, p.ty.as_ref()))
        .collect()
}

/// Deduces the transformer for a result. The body expression wraps the
/// whole call expression; an extra-referenced result is heap-boxed so the
/// flat boundary keeps value semantics without leaking the box.
pub fn deduce_return_transformer(
    program: &Program,
    touchups: &TouchupTable,
    ty: Option<&TypeNode>,
) -> Result<ParameterTransformer> {
    let void = ParameterTransformer {
        name: String::new(),
        prototype: TypeNode::Leaf(void_entity(program)?),
        body: BodyExpr::Identity,
        reg_type: "void".to_string(),
    };
    let Some(ty) = ty else {
        return Ok(void);
    };
    let original = resolve_original(program, ty);
    if is_void(program, &original) {
        return Ok(void);
    }

    if let Some(touchup) = touchups.get(program, &original) {
        return Ok(ParameterTransformer {
            name: String::new(),
            prototype: touchup.substitute.clone(),
            body: BodyExpr::Touchup,
            reg_type: reg_type_string(program, &touchup.substitute),
        });
    }
    if original.is_reference()
        && filters::is_small_primitive(program, original.base_entity())
    {
        let collapsed = original.strip_reference();
        let reg = reg_type_string(program, &collapsed);
        return Ok(ParameterTransformer {
            name: String::new(),
            prototype: collapsed,
            body: BodyExpr::Identity,
            reg_type: reg,
        });
    }
    if filters::needs_extra_referencing(program, &original) {
        return Ok(ParameterTransformer {
            name: String::new(),
            prototype: TypeNode::pointer(ty.clone()),
            body: BodyExpr::ConstructCopy(ty.format_cpp_bare(program)),
            reg_type: reg_type_string(program, &original),
        });
    }
    Ok(ParameterTransformer {
        name: String::new(),
        prototype: ty.clone(),
        body: BodyExpr::Identity,
        reg_type: reg_type_string(program, &original),
    })
}

/// True for a missing type or one resolving to the bare void primitive.
pub fn is_void_type(program: &Program, ty: Option<&TypeNode>) -> bool {
    match ty {
        None => true,
        Some(t) => is_void(program, &resolve_original(program, t)),
    }
}

fn void_entity(program: &Program) -> Result<crate::model::EntityId> {
    program
        .ids()
        .find(|id| program.is_primitive(*id) && program.entity(*id).name == "void")
        .ok_or_else(|| GenError::MissingInformation("no void primitive in program".to_string()))
}

fn is_void(program: &Program, ty: &TypeNode) -> bool {
    match ty {
        TypeNode::Leaf(id) => {
            program.is_primitive(*id) && program.entity(*id).name == "void"
        }
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Registration type strings
// ---------------------------------------------------------------------------

/// Renders the registration type string for a resolved type: `#` marks an
/// enumerated base, `&` a reference, one `*` per pointer level plus one for
/// an extra-referenced by-value aggregate, `[]` an array, and template
/// arguments recursively with `?` for unresolved parameters.
pub fn reg_type_string(program: &Program, ty: &TypeNode) -> String {
    let resolved = resolve_original(program, ty);
    let degree = resolved.pointer_degree();
    let base_id = resolved.base_entity();
    let base = program.entity(base_id);

    if degree == 0 && base.name == "void" && program.is_primitive(base_id) {
        return "void".to_string();
    }

    let mut out = String::new();
    if resolved.is_reference() {
        out.push('&');
    }
    for _ in 0..degree {
        out.push('*');
    }
    if filters::needs_extra_referencing(program, &resolved) {
        out.push('*');
    }
    out.push_str(&decorated_flat_base(program, &resolved));
    out
}

/// Writes the base type name of a flat type, `#`-prefixed for enumerated
/// bases, with template arguments and an array suffix.
pub fn decorated_flat_base(program: &Program, resolved: &TypeNode) -> String {
    let base_id = resolved.base_entity();
    let mut out = String::new();
    if matches!(program.entity(base_id).kind, EntityKind::Enum(_)) {
        out.push('#');
    }
    out.push_str(&program.full_name(base_id));
    if let Some(args) = resolved.template_args() {
        out.push_str("< ");
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            match arg {
                TemplateArg::Type(t) => {
                    out.push_str(&t.format_cpp_bare(program));
                }
                TemplateArg::Literal(lit) => out.push_str(lit),
                TemplateArg::Unresolved => out.push('?'),
            }
        }
        out.push_str(" >");
    }
    if resolved.is_array() {
        out.push_str("[]");
    }
    out
}

/// Builds the decorated parameter descriptor used in registration
/// prototypes: output marker `>` (consuming one pointer level), reference
/// marker `&`, explicit pointer levels for non-primitive bases, the
/// retained `*` for `char*`, the extra-referencing marker, and the
/// decorated base.
pub fn decorated_parameter_type(program: &Program, parameter: &Parameter) -> Result<String> {
    let ty = parameter.ty.as_ref().ok_or_else(|| {
        GenError::MissingInformation(format!(
            "type of parameter '{}' is unresolved",
            parameter.name
        ))
    })?;
    let resolved = resolve_original(program, ty);
    let base_id = resolved.base_entity();
    let base = program.entity(base_id);
    let mut pointers = resolved.pointer_degree();
    let primitive = matches!(base.kind, EntityKind::Primitive);

    let mut out = String::new();
    if !primitive {
        if parameter.output {
            out.push('>');
            pointers = pointers.saturating_sub(1);
        } else if resolved.is_reference() {
            out.push('&');
        }
        for _ in 0..pointers {
            out.push('*');
        }
        if filters::needs_extra_referencing(program, &resolved) {
            out.push('&');
        }
    }
    if primitive && base.name == "char" && pointers > 0 {
        out.push('*');
    }
    out.push_str(&decorated_flat_base(program, &resolved));
    Ok(out)
}

/// Formats one flat-signature parameter declaration.
pub fn format_parameter(program: &Program, transformer: &ParameterTransformer) -> String {
    transformer
        .prototype
        .format_cpp(program, &transformer.name)
}

/// Formats the comma-joined flat parameter list.
pub fn format_parameters(program: &Program, transformers: &[ParameterTransformer]) -> String {
    transformers
        .iter()
        .map(|t| format_parameter(program, t))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Formats the comma-joined native call arguments, each run through its
/// body conversion.
pub fn format_arguments(transformers: &[ParameterTransformer]) -> String {
    transformers
        .iter()
        .map(|t| t.body.apply(&t.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Location line for generated comments.
pub fn format_location(program: &Program, id: crate::model::EntityId) -> String {
    match &program.entity(id).location {
        Some(loc) => format!("from {}:{}", loc.file, loc.line),
        None => "location unknown".to_string(),
    }
}

/// Renders a returned-or-assigned member access.
pub fn format_member(program: &Program, field: crate::model::EntityId, with_self: bool) -> String {
    let container = program.entity(field).container;
    let in_aggregate =
        container.is_some_and(|c| matches!(program.entity(c).kind, EntityKind::Aggregate(_)));
    if in_aggregate && with_self {
        format!("self->{}", program.entity(field).name)
    } else if in_aggregate {
        program.entity(field).name.clone()
    } else {
        program.full_name(field)
    }
}

/// Removes a redundant `const` from a bare primitive type, where constness
/// cannot matter.
pub fn remove_unneeded_constness(program: &Program, ty: &TypeNode) -> TypeNode {
    if let TypeNode::Const(inner) = ty {
        if let TypeNode::Leaf(id) = inner.as_ref() {
            if program.is_primitive(*id) {
                return (**inner).clone();
            }
        }
    }
    ty.clone()
}

/// Attaches the owning routine's name to a missing-information error.
pub fn with_routine_context(err: GenError, routine_name: &str) -> GenError {
    match err {
        GenError::MissingInformation(msg) => {
            GenError::MissingInformation(format!("{routine_name}: {msg}"))
        }
        other => other,
    }
}
