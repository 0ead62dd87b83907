//! Registration table builder — per-scope RegData tables and the single
//! top-level `entry[]` the runtime loads.

use std::collections::HashSet;
use std::io::Write;

use crate::error::Result;
use crate::filters;
use crate::generator::{END_OF_LIST, Generator};
use crate::model::{EntityId, EntityKind, Visibility};
use crate::query;
use crate::transform;
use crate::types::{TypeNode, resolve_original};

impl<W: Write> Generator<'_, W> {
    /// Emits every subject's scope table, closes the wrapping namespace,
    /// and writes the `entry[]` root: enums, typedefs, classes in
    /// dependency order, global functions, accumulated static records,
    /// global data, downcast helpers, sentinel.
    pub fn generate_entry(&mut self) -> Result<()> {
        let sorted = self.topologically_sort_subjects();

        for subject in self.subjects.clone() {
            if filters::is_available(self.program, subject) {
                self.generate_registration_scope(subject)?;
            }
        }

        writeln!(self.out, "\n}}  // end of {} namespace\n", self.namespace)?;
        writeln!(self.out, "using namespace {};\n", self.namespace)?;

        writeln!(self.out, "extern \"C\" EXPORT RegData entry[];\n")?;
        writeln!(self.out, "RegData entry[] = {{")?;

        // Enumerated types come before anything that may refer to them.
        for subject in self.enums.clone() {
            let uid = self.uid(subject);
            writeln!(
                self.out,
                "\t{{\"{}\", \"enum\", enumerated_{uid}}},",
                self.program.full_name(subject)
            )?;
        }

        for subject in self.typedefs.clone() {
            if !filters::is_declared(self.program, subject) {
                continue;
            }
            let Some(alias) = self.program.alias(subject).cloned() else {
                continue;
            };
            if !alias.aliased.is_flat() {
                continue;
            }
            let full = self.program.full_name(subject);
            if filters::needs_encapsulation(self.program, subject) {
                let uid = self.uid(subject);
                writeln!(self.out, "\t{{\"{full}\", \"class\", alias_{uid}}},")?;
            } else {
                writeln!(
                    self.out,
                    "\t{{\"{full}\", \"={}\", 0}},",
                    self.type_base_name(&alias.aliased)
                )?;
            }
        }

        for subject in sorted {
            if !filters::is_available(self.program, subject) {
                continue;
            }
            let uid = self.scope_uid(subject);
            writeln!(
                self.out,
                "\t{{\"{}\", \"class\", scope_{uid}}},",
                self.program.full_name(subject)
            )?;
        }

        for func in self.global_funcs.clone() {
            if filters::is_available(self.program, func) {
                self.generate_registration_line_routine(func, 0, false)?;
            }
        }

        for record in self.entry_records.clone() {
            writeln!(self.out, "{{ {} }},", record.format())?;
        }

        for field in self.global_data.clone() {
            self.generate_registration_line_field(field, false)?;
        }

        for caster in self.down_casters.clone() {
            writeln!(self.out, "{{ {caster} }},")?;
        }

        self.out.write_all(END_OF_LIST.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }

    /// Orders the subjects so that every public base precedes its
    /// derivatives; a runtime building its reflection graph incrementally
    /// needs the base's table resolved first. Within that constraint the
    /// subject list order is preserved.
    fn topologically_sort_subjects(&self) -> Vec<EntityId> {
        let subjects: HashSet<EntityId> = self.subjects.iter().copied().collect();
        let mut visited = HashSet::new();
        let mut sorted = Vec::new();
        for subject in &self.subjects {
            self.visit_bases_first(*subject, &subjects, &mut visited, &mut sorted);
        }
        sorted
    }

    fn visit_bases_first(
        &self,
        id: EntityId,
        subjects: &HashSet<EntityId>,
        visited: &mut HashSet<EntityId>,
        sorted: &mut Vec<EntityId>,
    ) {
        if !visited.insert(id) {
            return;
        }
        if let Some(agg) = self.program.aggregate(id) {
            for base in &agg.bases {
                self.visit_bases_first(base.base, subjects, visited, sorted);
            }
        }
        if subjects.contains(&id) {
            sorted.push(id);
        }
    }

    /// The scope table for one class, in fixed order: extends links, public
    /// routines, fields, synthesized specials, associated free operators.
    fn generate_registration_scope(&mut self, subject: EntityId) -> Result<()> {
        let Some(agg) = self.program.aggregate(subject).cloned() else {
            return Ok(());
        };
        let classname = self.program.full_name(subject);
        let uid = self.scope_uid(subject);
        let is_abstract = query::is_abstract(self.program, subject);
        let must_have_ctor = query::has_default_constructor(self.program, subject);
        let has_assignment = filters::is_assignment_supportive(self.program, subject);
        let has_clone = filters::is_cloneable(self.program, subject);
        let has_output = query::has_output_operator(self.program, subject);
        let additional = query::find_globally_scoped_operators(self.program, subject);

        writeln!(self.out, "RegData scope_{uid}[] = {{")?;

        for connection in &agg.bases {
            if connection.visibility != Visibility::Public {
                continue;
            }
            let base_uid = self.scope_uid(connection.base);
            writeln!(
                self.out,
                "{{\"{}\", \"extends\", 0, (void*)&upcast_{uid}_to_{base_uid}}},",
                query::actual_base_name(self.program, connection)
            )?;
        }

        let mut ctors = false;
        for connection in &agg.scope.routines {
            let Some(routine) = self.program.routine(connection.entity).cloned() else {
                continue;
            };
            if routine.is_constructor() && is_abstract {
                continue;
            }
            if connection.visibility != Visibility::Public
                || routine.is_destructor()
                || !filters::is_available(self.program, connection.entity)
            {
                continue;
            }
            self.generate_registration_line_routine(connection.entity, 0, true)?;
            ctors = ctors || routine.is_constructor();
        }

        for connection in &agg.scope.fields {
            if filters::is_available_field(self.program, connection) {
                self.generate_registration_line_field(connection.entity, true)?;
            }
        }

        if !ctors && must_have_ctor && !is_abstract {
            writeln!(
                self.out,
                "{{ \"*\", \"constructor\", 0, (void*)&ctor_{uid}}},"
            )?;
        }
        if has_assignment {
            writeln!(
                self.out,
                "{{ \"operator=\", \"void\", assign_{uid}_proto, (void*)&assign_{uid}}},"
            )?;
        }
        if has_clone {
            writeln!(
                self.out,
                "{{ \"clone\", \"*{classname}\", 0, (void*)&clone_{uid}}},"
            )?;
        }
        if has_output {
            writeln!(self.out, "{{ \".print\", \"void\", 0, (void*)&output_{uid}}},")?;
            writeln!(
                self.out,
                "{{ \".string\", \"@string\", 0, (void*)&toString_{uid}}},"
            )?;
        }
        writeln!(self.out, "{{ \".\", \"destructor\", 0, (void*)&dtor_{uid}}},")?;

        // Free operators taking the class as their first argument register
        // here with that instance argument skipped.
        for routine in additional {
            if filters::is_available(self.program, routine) {
                self.generate_registration_line_routine(routine, 1, false)?;
            }
        }

        self.out.write_all(END_OF_LIST.as_bytes())?;
        Ok(())
    }

    /// One RegData row per valid argument count of a routine. Rows of
    /// interceptor-dispatched virtuals keep a null implementation pointer,
    /// telling the runtime to invoke through the virtual table instead.
    fn generate_registration_line_routine(
        &mut self,
        routine_id: EntityId,
        n_skip: usize,
        with: bool,
    ) -> Result<()> {
        let routine = self.routine_def(routine_id)?;
        let retf = transform::deduce_return_transformer(
            self.program,
            &self.touchups,
            routine.return_type.as_ref(),
        )
        .map_err(|e| {
            transform::with_routine_context(e, &self.program.full_name(routine_id))
        })?;

        let container = self.program.entity(routine_id).container;
        let in_aggregate =
            container.is_some_and(|c| matches!(self.program.entity(c).kind, EntityKind::Aggregate(_)));
        let uid = self.uid(routine_id);
        let dispatched = self.interceptor_methods.contains(&routine_id);

        let min_args = query::minimal_argument_count(&routine);
        let max_args = query::count_parameters(&routine);
        for n_arguments in min_args..=max_args {
            if routine.is_constructor() {
                let symbol = match routine.kind {
                    crate::model::RoutineKind::Constructor { explicit: true } => '%',
                    _ => '*',
                };
                write!(self.out, "{{ \"{symbol}\" , \"constructor\", ")?;
            } else {
                let name = if with && in_aggregate {
                    self.program.entity(routine_id).name.clone()
                } else {
                    self.program.full_name(routine_id)
                };
                write!(self.out, "{{\"{name}\", \"{}\", ", retf.reg_type)?;
            }
            let wrapper = format!("routine_{uid}{}{n_arguments}", if with { "r" } else { "s" });
            write!(self.out, "{wrapper}_proto+{n_skip}, ")?;
            if dispatched {
                writeln!(self.out, "0}},")?;
            } else {
                writeln!(self.out, "(void*)&{wrapper}}},")?;
            }
        }
        Ok(())
    }

    /// The `.data_` / `.sink_` row pair for one field.
    fn generate_registration_line_field(&mut self, field_id: EntityId, with: bool) -> Result<()> {
        let field = self.field_def(field_id)?;
        let retf =
            transform::deduce_return_transformer(self.program, &self.touchups, Some(&field.ty))
                .map_err(|e| {
                    transform::with_routine_context(e, &self.program.full_name(field_id))
                })?;

        let container = self.program.entity(field_id).container;
        let in_aggregate =
            container.is_some_and(|c| matches!(self.program.entity(c).kind, EntityKind::Aggregate(_)));
        let identifier = if in_aggregate && with {
            self.program.entity(field_id).name.clone()
        } else {
            self.program.full_name(field_id)
        };
        let uid = self.uid(field_id);
        let fors = if with { "f" } else { "s" };

        writeln!(
            self.out,
            "{{ \".data_{identifier}\", \"{}\", 0, (void*)&data_get_{uid}{fors} }},",
            retf.reg_type
        )?;
        if filters::has_setter(self.program, field_id) {
            writeln!(
                self.out,
                "{{ \".sink_{identifier}\", \"void\", sink_{uid}{fors}_proto, (void*)&data_set_{uid}{fors} }},"
            )?;
        }
        Ok(())
    }

    /// Base name of a type as an entry-table forwarding target, template
    /// arguments included.
    fn type_base_name(&self, ty: &TypeNode) -> String {
        let resolved = resolve_original(self.program, ty);
        let base_name = self.program.full_name(resolved.base_entity());
        match resolved.template_args() {
            Some(args) => query::template_cpp_expression(self.program, &base_name, args),
            None => base_name,
        }
    }
}
