//! Entity model — the analyzed-program side of the generator.
//!
//! An upstream source analyzer produces a [`Program`]: an id-addressed arena
//! of entities (namespaces, classes, routines, fields, enums, typedefs,
//! primitives) whose types live in [`crate::types`]. The generator treats
//! the analyzed content as read-only and extends the arena with the
//! entities it synthesizes itself (interceptor classes and their members).
//!
//! All model types are serde-friendly plain data, so a program database can
//! be exchanged as JSON between the analyzer and this crate.

use serde::{Deserialize, Serialize};

use crate::types::{TemplateArg, TypeNode};

/// Index of an entity inside a [`Program`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(pub u32);

impl EntityId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Member visibility inside a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Virtuality {
    NonVirtual,
    Virtual,
    PureVirtual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Storage {
    Normal,
    Extern,
    Static,
}

/// One scope member together with its containment attributes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Contained {
    pub entity: EntityId,
    pub visibility: Visibility,
    pub virtuality: Virtuality,
    pub storage: Storage,
}

/// Ordered member lists of an aggregate or namespace.
///
/// Insertion order is preserved in every list. Registration tables and
/// interceptor call-signature numbering both derive from that order, so it
/// is part of the generated ABI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scope {
    #[serde(default)]
    pub routines: Vec<Contained>,
    #[serde(default)]
    pub fields: Vec<Contained>,
    #[serde(default)]
    pub aggregates: Vec<Contained>,
    #[serde(default)]
    pub namespaces: Vec<Contained>,
    #[serde(default)]
    pub aliases: Vec<Contained>,
}

impl Scope {
    pub fn add_routine(
        &mut self,
        entity: EntityId,
        visibility: Visibility,
        virtuality: Virtuality,
        storage: Storage,
    ) {
        self.routines.push(Contained {
            entity,
            visibility,
            virtuality,
            storage,
        });
    }

    pub fn add_field(&mut self, entity: EntityId, visibility: Visibility, storage: Storage) {
        self.fields.push(Contained {
            entity,
            visibility,
            virtuality: Virtuality::NonVirtual,
            storage,
        });
    }

    pub fn add_alias(&mut self, entity: EntityId, visibility: Visibility) {
        self.aliases.push(Contained {
            entity,
            visibility,
            virtuality: Virtuality::NonVirtual,
            storage: Storage::Normal,
        });
    }
}

/// Derivation from one base class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InheritanceConnection {
    pub base: EntityId,
    pub visibility: Visibility,
    /// Template arguments for the base when deriving from an instantiation.
    #[serde(default)]
    pub template_args: Option<Vec<TemplateArg>>,
}

/// Declaration site, for diagnostics only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

/// One routine parameter, owned by its routine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// `None` when the analyzer could not resolve the declared type.
    pub ty: Option<TypeNode>,
    #[serde(default)]
    pub has_default: bool,
    /// Marked by the analyzer when the parameter carries a result outward.
    #[serde(default)]
    pub output: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutineKind {
    Normal,
    Constructor { explicit: bool },
    Destructor,
    ConversionOperator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineDef {
    /// `None` for constructors and destructors.
    pub return_type: Option<TypeNode>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    pub kind: RoutineKind,
    #[serde(default)]
    pub is_const: bool,
    /// Exception specification, when the declaration carries one.
    #[serde(default)]
    pub throws: Option<Vec<EntityId>>,
}

impl RoutineDef {
    pub fn is_constructor(&self) -> bool {
        matches!(self.kind, RoutineKind::Constructor { .. })
    }

    pub fn is_destructor(&self) -> bool {
        self.kind == RoutineKind::Destructor
    }

    pub fn is_conversion_operator(&self) -> bool {
        self.kind == RoutineKind::ConversionOperator
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub ty: TypeNode,
    /// Set on interceptor field clones whose access goes through a
    /// generated member accessor instead of the raw member.
    #[serde(default)]
    pub wrapped: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumConstant {
    pub literal: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDef {
    pub constants: Vec<EnumConstant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasDef {
    pub aliased: TypeNode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamespaceDef {
    #[serde(default)]
    pub scope: Scope,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateDef {
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub bases: Vec<InheritanceConnection>,
    /// A class template (wrapped separately, skipped here).
    #[serde(default)]
    pub templated: bool,
    /// A template specialization.
    #[serde(default)]
    pub specialized: bool,
}

/// The closed set of entity variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EntityKind {
    Namespace(NamespaceDef),
    Aggregate(AggregateDef),
    Routine(RoutineDef),
    Field(FieldDef),
    Enum(EnumDef),
    Alias(AliasDef),
    Primitive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    /// Scope containing this entity — a back-reference, not ownership.
    #[serde(default)]
    pub container: Option<EntityId>,
    #[serde(default)]
    pub location: Option<SourceLocation>,
    pub kind: EntityKind,
}

/// The analyzed program: an arena of entities rooted at a global namespace.
#[derive(Debug, Serialize, Deserialize)]
pub struct Program {
    entities: Vec<Entity>,
    pub global: EntityId,
}

impl Program {
    /// An empty program holding only the (unnamed) global namespace.
    pub fn new() -> Self {
        let mut program = Program {
            entities: Vec::new(),
            global: EntityId(0),
        };
        program.global = program.add(Entity {
            name: String::new(),
            container: None,
            location: None,
            kind: EntityKind::Namespace(NamespaceDef::default()),
        });
        program
    }

    pub fn add(&mut self, entity: Entity) -> EntityId {
        let id = EntityId(self.entities.len() as u32);
        self.entities.push(entity);
        id
    }

    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.index()]
    }

    pub fn entity_mut(&mut self, id: EntityId) -> &mut Entity {
        &mut self.entities[id.index()]
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + use<> {
        (0..self.entities.len() as u32).map(EntityId)
    }

    /// Qualified name, `::`-joined through the container chain. The global
    /// namespace (and any unnamed container) contributes nothing.
    pub fn full_name(&self, id: EntityId) -> String {
        let entity = self.entity(id);
        let mut name = entity.name.clone();
        let mut container = entity.container;
        while let Some(up) = container {
            let parent = self.entity(up);
            if !parent.name.is_empty() {
                name = format!("{}::{}", parent.name, name);
            }
            container = parent.container;
        }
        name
    }

    /// Finds or creates the primitive entity with the given name.
    pub fn ensure_primitive(&mut self, name: &str) -> EntityId {
        for id in self.ids() {
            let e = self.entity(id);
            if matches!(e.kind, EntityKind::Primitive) && e.name == name {
                return id;
            }
        }
        self.add(Entity {
            name: name.to_string(),
            container: None,
            location: None,
            kind: EntityKind::Primitive,
        })
    }

    pub fn aggregate(&self, id: EntityId) -> Option<&AggregateDef> {
        match &self.entity(id).kind {
            EntityKind::Aggregate(agg) => Some(agg),
            _ => None,
        }
    }

    pub fn aggregate_mut(&mut self, id: EntityId) -> Option<&mut AggregateDef> {
        match &mut self.entity_mut(id).kind {
            EntityKind::Aggregate(agg) => Some(agg),
            _ => None,
        }
    }

    pub fn routine(&self, id: EntityId) -> Option<&RoutineDef> {
        match &self.entity(id).kind {
            EntityKind::Routine(routine) => Some(routine),
            _ => None,
        }
    }

    pub fn field(&self, id: EntityId) -> Option<&FieldDef> {
        match &self.entity(id).kind {
            EntityKind::Field(field) => Some(field),
            _ => None,
        }
    }

    pub fn enum_def(&self, id: EntityId) -> Option<&EnumDef> {
        match &self.entity(id).kind {
            EntityKind::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn alias(&self, id: EntityId) -> Option<&AliasDef> {
        match &self.entity(id).kind {
            EntityKind::Alias(alias) => Some(alias),
            _ => None,
        }
    }

    pub fn is_primitive(&self, id: EntityId) -> bool {
        matches!(self.entity(id).kind, EntityKind::Primitive)
    }

    /// The scope owned by an aggregate or namespace.
    pub fn scope(&self, id: EntityId) -> Option<&Scope> {
        match &self.entity(id).kind {
            EntityKind::Aggregate(agg) => Some(&agg.scope),
            EntityKind::Namespace(ns) => Some(&ns.scope),
            _ => None,
        }
    }

    pub fn scope_mut(&mut self, id: EntityId) -> Option<&mut Scope> {
        match &mut self.entity_mut(id).kind {
            EntityKind::Aggregate(agg) => Some(&mut agg.scope),
            EntityKind::Namespace(ns) => Some(&mut ns.scope),
            _ => None,
        }
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}
