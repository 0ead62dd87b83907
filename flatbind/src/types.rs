//! Structural type expressions.
//!
//! A type is a small tree over leaf / pointer / reference / array / const /
//! template nodes. Types are value-like: freely cloned when the generator
//! synthesizes new declarations, compared and hashed structurally (the
//! touchup table depends on that).

use serde::{Deserialize, Serialize};

use crate::model::{EntityKind, EntityId, Program};

/// One node of a type expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeNode {
    /// A base entity: primitive, aggregate, enum, or alias.
    Leaf(EntityId),
    Pointer(Box<TypeNode>),
    Reference(Box<TypeNode>),
    /// Array of the element type, with an optional extent.
    Array(Box<TypeNode>, Option<u64>),
    /// `const` applied to the wrapped type.
    Const(Box<TypeNode>),
    /// A template instantiation of `base`.
    Template {
        base: EntityId,
        args: Vec<TemplateArg>,
    },
}

/// One argument of a template instantiation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateArg {
    Type(TypeNode),
    /// A non-type argument, kept verbatim.
    Literal(String),
    /// A template parameter the analyzer could not resolve.
    Unresolved,
}

impl TypeNode {
    pub fn pointer(inner: TypeNode) -> TypeNode {
        TypeNode::Pointer(Box::new(inner))
    }

    pub fn reference(inner: TypeNode) -> TypeNode {
        TypeNode::Reference(Box::new(inner))
    }

    pub fn constant(inner: TypeNode) -> TypeNode {
        TypeNode::Const(Box::new(inner))
    }

    /// The entity at the bottom of the tree.
    pub fn base_entity(&self) -> EntityId {
        match self {
            TypeNode::Leaf(id) => *id,
            TypeNode::Template { base, .. } => *base,
            TypeNode::Pointer(inner)
            | TypeNode::Reference(inner)
            | TypeNode::Array(inner, _)
            | TypeNode::Const(inner) => inner.base_entity(),
        }
    }

    /// Number of pointer indirections along the spine.
    pub fn pointer_degree(&self) -> usize {
        match self {
            TypeNode::Pointer(inner) => 1 + inner.pointer_degree(),
            TypeNode::Reference(inner)
            | TypeNode::Array(inner, _)
            | TypeNode::Const(inner) => inner.pointer_degree(),
            TypeNode::Leaf(_) | TypeNode::Template { .. } => 0,
        }
    }

    /// True when the outermost shell (through const) is a reference.
    pub fn is_reference(&self) -> bool {
        match self {
            TypeNode::Reference(_) => true,
            TypeNode::Const(inner) => inner.is_reference(),
            _ => false,
        }
    }

    /// True when the spine contains an array node.
    pub fn is_array(&self) -> bool {
        match self {
            TypeNode::Array(_, _) => true,
            TypeNode::Pointer(inner)
            | TypeNode::Reference(inner)
            | TypeNode::Const(inner) => inner.is_array(),
            TypeNode::Leaf(_) | TypeNode::Template { .. } => false,
        }
    }

    pub fn template_args(&self) -> Option<&[TemplateArg]> {
        match self {
            TypeNode::Template { args, .. } => Some(args),
            TypeNode::Pointer(inner)
            | TypeNode::Reference(inner)
            | TypeNode::Array(inner, _)
            | TypeNode::Const(inner) => inner.template_args(),
            TypeNode::Leaf(_) => None,
        }
    }

    /// A type is flat when it carries no unresolved template parameter.
    pub fn is_flat(&self) -> bool {
        match self {
            TypeNode::Leaf(_) => true,
            TypeNode::Pointer(inner)
            | TypeNode::Reference(inner)
            | TypeNode::Array(inner, _)
            | TypeNode::Const(inner) => inner.is_flat(),
            TypeNode::Template { args, .. } => args.iter().all(|a| match a {
                TemplateArg::Type(t) => t.is_flat(),
                TemplateArg::Literal(_) => true,
                TemplateArg::Unresolved => false,
            }),
        }
    }

    /// Removes reference notations from the outer spine, e.g.
    /// `const int&` becomes `const int`.
    pub fn strip_reference(&self) -> TypeNode {
        match self {
            TypeNode::Reference(inner) => inner.strip_reference(),
            TypeNode::Const(inner) => TypeNode::constant(inner.strip_reference()),
            other => other.clone(),
        }
    }

    /// C++ rendering of this type applied to a declarator (possibly empty).
    pub fn format_cpp(&self, program: &Program, declarator: &str) -> String {
        match self {
            TypeNode::Leaf(id) => glue(&program.full_name(*id), declarator),
            TypeNode::Template { base, args } => {
                let rendered = format!(
                    "{}< {} >",
                    program.full_name(*base),
                    args.iter()
                        .map(|a| a.format_cpp(program))
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                glue(&rendered, declarator)
            }
            TypeNode::Pointer(inner) => inner.format_cpp(program, &format!("*{declarator}")),
            TypeNode::Reference(inner) => inner.format_cpp(program, &format!("&{declarator}")),
            TypeNode::Array(inner, extent) => {
                let suffix = match extent {
                    Some(n) => format!("[{n}]"),
                    None => "[]".to_string(),
                };
                // Parenthesize so an array of pointers keeps its meaning.
                let decl = if declarator.starts_with('*') {
                    format!("({declarator}){suffix}")
                } else {
                    format!("{declarator}{suffix}")
                };
                inner.format_cpp(program, &decl)
            }
            TypeNode::Const(inner) => match inner.as_ref() {
                TypeNode::Leaf(_) | TypeNode::Template { .. } => {
                    format!("const {}", inner.format_cpp(program, declarator))
                }
                // const applied over a pointer shell qualifies the pointer
                _ => inner.format_cpp(program, &format!("const {declarator}")),
            },
        }
    }

    /// C++ rendering with no declarator.
    pub fn format_cpp_bare(&self, program: &Program) -> String {
        self.format_cpp(program, "")
    }
}

impl TemplateArg {
    fn format_cpp(&self, program: &Program) -> String {
        match self {
            TemplateArg::Type(t) => t.format_cpp_bare(program),
            TemplateArg::Literal(lit) => lit.clone(),
            TemplateArg::Unresolved => "?".to_string(),
        }
    }
}

/// Resolves a type to its original representation by folding alias leaves
/// into the trees they abbreviate. The input is left untouched; the result
/// shares no structure with it.
pub fn resolve_original(program: &Program, ty: &TypeNode) -> TypeNode {
    match ty {
        TypeNode::Leaf(id) => match &program.entity(*id).kind {
            EntityKind::Alias(alias) => resolve_original(program, &alias.aliased),
            _ => ty.clone(),
        },
        TypeNode::Pointer(inner) => TypeNode::pointer(resolve_original(program, inner)),
        TypeNode::Reference(inner) => TypeNode::reference(resolve_original(program, inner)),
        TypeNode::Array(inner, extent) => {
            TypeNode::Array(Box::new(resolve_original(program, inner)), *extent)
        }
        TypeNode::Const(inner) => TypeNode::constant(resolve_original(program, inner)),
        TypeNode::Template { .. } => ty.clone(),
    }
}

fn glue(base: &str, declarator: &str) -> String {
    if declarator.is_empty() {
        base.to_string()
    } else {
        format!("{base} {declarator}")
    }
}
