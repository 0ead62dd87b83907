//! Generator context — the state every emission pass threads through.
//!
//! One [`Generator`] owns the output sink and all the side-tables the
//! passes share: the identity map, the touchup table, the subject and
//! global lists, the interceptor bookkeeping, accumulated downcast and
//! entry records, and the per-run wrapping namespace. Keeping the state in
//! one explicitly threaded value (rather than ambient globals) is what
//! makes repeated passes over the same entity agree on names — wrapper
//! emission and registration emission both rely on that.

use std::collections::{BTreeSet, HashSet};
use std::io::Write;

use tracing::{info, warn};

use crate::error::Result;
use crate::filters;
use crate::identity::{Identified, IdentityMap};
use crate::model::{EntityId, EntityKind, Program};
use crate::query;
use crate::transform::TouchupTable;

/// Terminates every RegData array.
pub(crate) const END_OF_LIST: &str = "\t{ 0,0,0,0 }\n};\n\n";

/// One registration record accumulated for the entry table.
#[derive(Debug, Clone)]
pub struct RegRecord {
    pub name: String,
    pub type_signature: String,
    /// Symbol of the parameter-descriptor array, when one exists.
    pub prototype: Option<String>,
    /// Symbol of the implementation, `None` for dynamically satisfied calls.
    pub symbol: Option<String>,
}

impl RegRecord {
    /// Renders the record as a C++ initializer (without braces).
    pub fn format(&self) -> String {
        let proto = self.prototype.as_deref().unwrap_or("0").to_string();
        let sym = match &self.symbol {
            Some(s) => format!("(void*)&{s}"),
            None => "0".to_string(),
        };
        format!("\"{}\", \"{}\", {}, {}", self.name, self.type_signature, proto, sym)
    }
}

#[derive(Debug, Default)]
pub struct GeneratorOptions {
    /// Overrides the randomized wrapping namespace, for reproducible output.
    pub namespace: Option<String>,
}

/// The code-synthesis engine. Single-threaded; passes run in a fixed order
/// and either complete or abort with [`crate::GenError`].
pub struct Generator<'p, W: Write> {
    pub(crate) program: &'p mut Program,
    pub(crate) out: W,
    pub(crate) uids: IdentityMap,
    pub(crate) touchups: TouchupTable,

    pub(crate) subjects: Vec<EntityId>,
    pub(crate) global_funcs: Vec<EntityId>,
    pub(crate) enums: Vec<EntityId>,
    pub(crate) typedefs: Vec<EntityId>,
    pub(crate) global_data: Vec<EntityId>,

    pub(crate) interceptors: Vec<EntityId>,
    /// Overrides dispatched through the runtime callback; their scope table
    /// rows keep a null implementation pointer and no flat wrapper is
    /// generated for them.
    pub(crate) interceptor_methods: HashSet<EntityId>,

    pub(crate) down_casters: Vec<String>,
    pub(crate) entry_records: Vec<RegRecord>,
    pub(crate) included_snippets: BTreeSet<String>,

    pub(crate) namespace: String,
}

impl<'p, W: Write> Generator<'p, W> {
    pub fn new(program: &'p mut Program, out: W, options: GeneratorOptions) -> Self {
        let touchups = TouchupTable::standard(program);
        let namespace = options
            .namespace
            .unwrap_or_else(|| format!("flatbind_{:x}", rand::random::<u32>()));
        Generator {
            program,
            out,
            uids: IdentityMap::new(),
            touchups,
            subjects: Vec::new(),
            global_funcs: Vec::new(),
            enums: Vec::new(),
            typedefs: Vec::new(),
            global_data: Vec::new(),
            interceptors: Vec::new(),
            interceptor_methods: HashSet::new(),
            down_casters: Vec::new(),
            entry_records: Vec::new(),
            included_snippets: BTreeSet::new(),
            namespace: namespace.replace('-', "_"),
        }
    }

    // -- driver-facing population --------------------------------------

    pub fn add_subject(&mut self, id: EntityId) {
        if !self.subjects.contains(&id) {
            self.subjects.push(id);
        }
    }

    pub fn add_global_function(&mut self, id: EntityId) {
        if !self.global_funcs.contains(&id) {
            self.global_funcs.push(id);
        }
    }

    pub fn add_enum(&mut self, id: EntityId) {
        if !self.enums.contains(&id) {
            self.enums.push(id);
        }
    }

    pub fn add_typedef(&mut self, id: EntityId) {
        if !self.typedefs.contains(&id) {
            self.typedefs.push(id);
        }
    }

    pub fn subjects(&self) -> &[EntityId] {
        &self.subjects
    }

    pub fn program(&self) -> &Program {
        self.program
    }

    pub fn wrapping_namespace(&self) -> &str {
        &self.namespace
    }

    // -- identity ------------------------------------------------------

    pub(crate) fn uid(&mut self, id: EntityId) -> u32 {
        self.uids.id(Identified::Entity(id))
    }

    /// Identity of the scope owned by an aggregate or namespace.
    pub(crate) fn scope_uid(&mut self, owner: EntityId) -> u32 {
        self.uids.id(Identified::Scope(owner))
    }

    pub(crate) fn enum_constant_uid(&mut self, enumeration: EntityId, ordinal: u32) -> u32 {
        self.uids.id(Identified::EnumConstant(enumeration, ordinal))
    }

    // -- interceptor listing -------------------------------------------

    /// Lists the named subject for interceptor creation.
    pub fn invest_interceptor(&mut self, classname: &str) {
        for subject in self.subjects.clone() {
            if self.program.entity(subject).name != classname {
                continue;
            }
            let templated = self
                .program
                .aggregate(subject)
                .is_some_and(|agg| agg.templated);
            if templated {
                continue;
            }
            if !self.interceptors.contains(&subject) {
                self.interceptors.push(subject);
            }
        }
    }

    /// Lists every polymorphic, non-template subject for interception.
    pub fn auto_invest_interceptors(&mut self) {
        for subject in self.subjects.clone() {
            let templated = self
                .program
                .aggregate(subject)
                .is_some_and(|agg| agg.templated);
            if templated || !query::is_polymorphic(self.program, subject) {
                continue;
            }
            if !self.interceptors.contains(&subject) {
                self.interceptors.push(subject);
            }
        }
    }

    // -- constants -----------------------------------------------------

    /// Collects program constants: namespace-scope data members found by
    /// descending from the global namespace, plus static members of the
    /// subject classes.
    pub fn collect_constants(&mut self) -> Result<()> {
        self.collect_constants_in(self.program.global);
        for subject in self.subjects.clone() {
            self.collect_constants_in(subject);
        }
        Ok(())
    }

    fn collect_constants_in(&mut self, owner: EntityId) {
        let Some(scope) = self.program.scope(owner) else {
            return;
        };
        let fields = scope.fields.clone();
        let namespaces = scope.namespaces.clone();
        for connection in fields {
            if filters::is_available_static_field(self.program, &connection)
                && !self.global_data.contains(&connection.entity)
            {
                self.global_data.push(connection.entity);
            }
        }
        for connection in namespaces {
            self.collect_constants_in(connection.entity);
        }
    }

    // -- preface -------------------------------------------------------

    /// Writes the common preamble every generated compilation unit needs:
    /// record layouts, ABI typedefs, the cast helpers, the runtime callback
    /// variable, the wrapping namespace, and the touchup function pairs.
    pub fn generate_preface(&mut self) -> Result<()> {
        self.out.write_all(b"#include <memory>\n")?;

        self.out.write_all(
            b"struct RegData\n{\n\
              \tconst char *name;\n\
              \tconst char *type;\n\
              \tconst RegData *prototype;\n\
              \tvoid *sym;\n};\n\n",
        )?;
        self.out.write_all(
            b"struct PascalString\n{\n\
              \tunsigned long size;\n\
              \tconst char *chars;\n\
              \tchar buffer[1];\n};\n\n",
        )?;
        self.out.write_all(
            b"#ifdef SPECIAL_CONVERSION_OPERATION\n\
              # define CONVOP(type,self) static_cast<type>(*self)\n\
              #else\n\
              # define CONVOP(type,self) self->operator type()\n\
              #endif\n\n",
        )?;
        self.out.write_all(
            b"#ifdef _WINDLL\n# define EXPORT __declspec(dllexport)\n\
              #else\n# define EXPORT\n#endif\n\n",
        )?;
        self.out.write_all(
            b"#if defined(__GNUC__) && defined(__i386__)\n\
              # define __CDECL __attribute__((cdecl))\n\
              #elif defined(_WIN32)\n\
              # define __CDECL __cdecl\n\
              #else\n\
              # define __CDECL\n\
              #endif\n\n",
        )?;

        self.out.write_all(b"typedef void* basic_block;\n")?;
        self.out.write_all(b"typedef void* scripting_element;\n\n")?;
        self.out.write_all(b"typedef void* xfer_float;\n\n")?;
        self.out.write_all(
            b"template < typename TO, typename FROM > TO union_cast(FROM v) \
              { union { FROM f; TO t; } u; u.f = v; return u.t; }\n\n",
        )?;

        let callback = "bool (*__flatbind_callback)(scripting_element twin, \
                        RegData *signature, basic_block args[], \
                        basic_block *result, bool isPure)";
        writeln!(self.out, "extern {callback};")?;
        writeln!(self.out, "{callback} = 0;\n")?;

        writeln!(self.out, "\nnamespace {} {{\n", self.namespace)?;

        self.out.write_all(
            b"template <class T>\n\
              struct SameClass {\n\
              \tstatic T same(T i) { return i; }\n\
              };\n\n",
        )?;

        for touchup in self.touchups.iter() {
            writeln!(self.out, "{}", touchup.code)?;
        }
        Ok(())
    }

    /// Writes the `#include` directives the driver asked for, after noting
    /// any selected entity whose declaration site is unknown.
    pub fn generate_include_directives(&mut self, includes: &[String]) -> Result<()> {
        let mut selected: Vec<EntityId> = Vec::new();
        selected.extend(&self.subjects);
        selected.extend(&self.global_funcs);
        selected.extend(&self.typedefs);
        selected.extend(&self.global_data);
        for id in selected {
            if self.program.entity(id).location.is_none() {
                writeln!(
                    self.out,
                    "// {}: location specification may be missing?",
                    self.program.full_name(id)
                )?;
            }
        }
        for header in includes {
            writeln!(self.out, "#include \"{header}\"")?;
        }
        Ok(())
    }

    // -- snippet management --------------------------------------------

    /// Injects a header include mid-stream, once; the wrapping namespace is
    /// closed and reopened around it so the directive lands at file scope.
    pub(crate) fn include_snippet(&mut self, header: &str) -> Result<()> {
        if self.included_snippets.contains(header) {
            return Ok(());
        }
        writeln!(
            self.out,
            "}}\n\n#include <{header}>\n\nnamespace {} {{\n",
            self.namespace
        )?;
        self.included_snippets.insert(header.to_string());
        Ok(())
    }

    /// Emits a one-time code snippet at the current position.
    pub(crate) fn code_snippet(&mut self, key: &str, code: &str) -> Result<()> {
        if self.included_snippets.contains(key) {
            return Ok(());
        }
        self.out.write_all(code.as_bytes())?;
        self.included_snippets.insert(key.to_string());
        Ok(())
    }

    // -- reporting -----------------------------------------------------

    /// Logs what was registered and which requested identifiers matched
    /// nothing. Diagnostic only; the generated artifact is unaffected.
    pub fn report(&self, requested: &[String]) {
        let mut missing: BTreeSet<String> = requested
            .iter()
            .filter(|n| n.as_str() != "*")
            .cloned()
            .collect();

        for subject in &self.subjects {
            info!(class = %self.program.full_name(*subject), "registered class");
            for name in query::possible_names(self.program, *subject) {
                missing.remove(&name);
            }
        }
        for func in &self.global_funcs {
            info!(function = %self.program.full_name(*func), "registered function");
            for name in query::possible_names(self.program, *func) {
                missing.remove(&name);
            }
        }
        for var in &self.global_data {
            info!(variable = %self.program.full_name(*var), "registered variable");
            for name in query::possible_names(self.program, *var) {
                missing.remove(&name);
            }
        }
        for id in self.enums.iter().chain(&self.typedefs) {
            for name in query::possible_names(self.program, *id) {
                missing.remove(&name);
            }
        }
        for id in self.program.ids() {
            if matches!(self.program.entity(id).kind, EntityKind::Namespace(_)) {
                for name in query::possible_names(self.program, id) {
                    missing.remove(&name);
                }
            }
        }

        for name in &missing {
            warn!(name = %name, "requested component not found");
        }
    }
}
