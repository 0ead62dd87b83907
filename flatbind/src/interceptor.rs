//! Interceptor synthesizer — subclasses a native class so a foreign
//! runtime can override its virtual methods.
//!
//! Every override marshals its arguments into generic slots, hands them to
//! the shared runtime callback together with a call-signature index, and
//! (for non-pure virtuals) falls back to the native implementation when the
//! callback declines. The call-signature index is a running counter over
//! the interceptor's members in scope insertion order; that order is part
//! of the generated ABI and must not change between runs.

use std::io::Write;

use crate::error::Result;
use crate::filters;
use crate::generator::Generator;
use crate::model::{
    Contained, Entity, EntityId, EntityKind, FieldDef, InheritanceConnection, Parameter,
    RoutineDef, RoutineKind, Storage, Virtuality, Visibility,
};
use crate::query;
use crate::transform;
use crate::types::{TypeNode, resolve_original};

impl<W: Write> Generator<'_, W> {
    /// Synthesizes an interceptor class for every listed subject that
    /// qualifies, then adds the new classes to the subject set so they flow
    /// through ordinary wrapper and registration emission.
    ///
    /// A listed subject is skipped when it is a template specialization,
    /// declares no virtual method anywhere in its chain, or has only
    /// private constructors.
    pub fn generate_interceptors(&mut self) -> Result<()> {
        let mut new_subjects = Vec::new();
        for subject in self.interceptors.clone() {
            let specialized = self
                .program
                .aggregate(subject)
                .is_some_and(|agg| agg.specialized);
            if specialized {
                continue;
            }
            if query::virtual_methods(self.program, subject).is_empty() {
                continue;
            }
            if !filters::is_class_extendible(self.program, subject) {
                continue;
            }
            new_subjects.push(self.synthesize_interceptor(subject)?);
        }
        for id in new_subjects {
            self.add_subject(id);
        }
        Ok(())
    }

    fn synthesize_interceptor(&mut self, subject: EntityId) -> Result<EntityId> {
        // Counts the member rows preceding each override in the scope
        // table, so the runtime can locate a call's metadata by position.
        let mut func_counter: u32 = 0;

        let subject_name = self.program.entity(subject).name.clone();
        let subject_full = self.program.full_name(subject);
        let interceptor_name = format!("I{subject_name}");

        let interceptor = self.program.add(Entity {
            name: interceptor_name.clone(),
            container: None,
            location: None,
            kind: EntityKind::Aggregate(Default::default()),
        });
        self.program
            .aggregate_mut(interceptor)
            .expect("freshly added aggregate")
            .bases
            .push(InheritanceConnection {
                base: subject,
                visibility: Visibility::Public,
                template_args: None,
            });
        func_counter += 1;

        let scripting_element = self.program.ensure_primitive("scripting_element");
        let void = self.program.ensure_primitive("void");
        let init = self.program.add(Entity {
            name: "_init".to_string(),
            container: Some(interceptor),
            location: None,
            kind: EntityKind::Routine(RoutineDef {
                return_type: Some(TypeNode::Leaf(void)),
                parameters: vec![Parameter {
                    name: "imp".to_string(),
                    ty: Some(TypeNode::Leaf(scripting_element)),
                    has_default: false,
                    output: false,
                }],
                kind: RoutineKind::Normal,
                is_const: false,
                throws: None,
            }),
        });
        let py = self.program.add(Entity {
            name: "_py".to_string(),
            container: Some(interceptor),
            location: None,
            kind: EntityKind::Routine(RoutineDef {
                return_type: Some(TypeNode::Leaf(scripting_element)),
                parameters: Vec::new(),
                kind: RoutineKind::Normal,
                is_const: false,
                throws: None,
            }),
        });
        let scope = self
            .program
            .scope_mut(interceptor)
            .expect("aggregate owns a scope");
        scope.add_routine(init, Visibility::Public, Virtuality::NonVirtual, Storage::Extern);
        func_counter += 1;
        scope.add_routine(py, Visibility::Public, Virtuality::NonVirtual, Storage::Extern);
        func_counter += 1;

        writeln!(self.out, "// Interceptor for {subject_full}")?;
        let scope_uid = self.scope_uid(interceptor);
        writeln!(self.out, "extern RegData scope_{scope_uid}[];")?;
        writeln!(
            self.out,
            "class {interceptor_name} : public {subject_full}\n{{\npublic:"
        )?;

        // The destructor repeats the native throw clause when one exists;
        // a class without an explicit destructor simply gets none.
        let dtor_throws = self.subject_destructor_throws(subject);
        write!(self.out, "\tvirtual ~{interceptor_name}()")?;
        self.write_throws_clause(dtor_throws.as_deref())?;
        self.out.write_all(b" {}\n\n")?;

        let mut any_ctors = false;
        for connection in query::constructors(self.program, subject) {
            if connection.visibility == Visibility::Private {
                continue;
            }
            let ctor = self.routine_def(connection.entity)?;
            let new_ctor = self.clone_routine(connection.entity, &interceptor_name, interceptor)?;
            self.program
                .scope_mut(interceptor)
                .expect("aggregate owns a scope")
                .add_routine(new_ctor, Visibility::Public, Virtuality::NonVirtual, Storage::Extern);
            self.write_forwarding_constructor(&interceptor_name, &subject_name, &ctor)?;
            any_ctors = true;
            func_counter +=
                (query::count_parameters(&ctor) - query::minimal_argument_count(&ctor)) as u32 + 1;
        }

        // A subject with only the compiler-provided default constructor
        // still needs one forwarder.
        if !any_ctors && query::has_default_constructor(self.program, subject) {
            let synthetic = RoutineDef {
                return_type: None,
                parameters: Vec::new(),
                kind: RoutineKind::Constructor { explicit: false },
                is_const: false,
                throws: None,
            };
            let new_ctor = self.program.add(Entity {
                name: interceptor_name.clone(),
                container: Some(interceptor),
                location: None,
                kind: EntityKind::Routine(synthetic.clone()),
            });
            self.program
                .scope_mut(interceptor)
                .expect("aggregate owns a scope")
                .add_routine(new_ctor, Visibility::Public, Virtuality::NonVirtual, Storage::Extern);
            func_counter += 1;
            self.write_forwarding_constructor(&interceptor_name, &subject_name, &synthetic)?;
        }

        writeln!(
            self.out,
            "\tvoid _init(scripting_element imp) {{ twin = imp; }}\n"
        )?;
        writeln!(self.out, "\tscripting_element _py() {{ return twin; }}\n")?;

        for method in query::virtual_methods(self.program, subject) {
            if method.visibility == Visibility::Private {
                // A private virtual cannot be dispatched to the runtime;
                // a forwarding override keeps the subclass compilable, a
                // pure one is left for the model not to produce.
                if method.virtuality != Virtuality::PureVirtual {
                    self.write_private_virtual_forwarder(&method)?;
                }
                continue;
            }
            let routine = self.routine_def(method.routine)?;
            let default_args =
                query::count_parameters(&routine) - query::minimal_argument_count(&routine);
            self.write_interceptor_function(interceptor, scope_uid, &method, func_counter)?;
            func_counter += default_args as u32 + 1;
        }

        for (field_id, connection) in
            query::accessible_fields(self.program, subject, Visibility::Protected)
        {
            self.write_interceptor_field_wrapper(interceptor, field_id, &connection)?;
        }

        self.out
            .write_all(b"private:\n\tscripting_element twin;\n};\n\n")?;
        Ok(interceptor)
    }

    /// Deep-copies only what differs — the name and the containing scope;
    /// parameter and return types are carried over as values.
    fn clone_routine(
        &mut self,
        routine_id: EntityId,
        new_name: &str,
        container: EntityId,
    ) -> Result<EntityId> {
        let def = self.routine_def(routine_id)?;
        let location = self.program.entity(routine_id).location.clone();
        Ok(self.program.add(Entity {
            name: new_name.to_string(),
            container: Some(container),
            location,
            kind: EntityKind::Routine(def),
        }))
    }

    fn subject_destructor_throws(&self, subject: EntityId) -> Option<Vec<EntityId>> {
        let agg = self.program.aggregate(subject)?;
        for connection in &agg.scope.routines {
            if let Some(routine) = self.program.routine(connection.entity) {
                if routine.is_destructor() {
                    return routine.throws.clone();
                }
            }
        }
        None
    }

    fn write_throws_clause(&mut self, throws: Option<&[EntityId]>) -> Result<()> {
        let Some(list) = throws else {
            return Ok(());
        };
        write!(self.out, " throw(")?;
        for (i, id) in list.iter().enumerate() {
            if i > 0 {
                write!(self.out, ", ")?;
            }
            write!(self.out, "{}", self.program.full_name(*id))?;
        }
        write!(self.out, ")")?;
        Ok(())
    }

    /// One constructor forwarder per valid argument count, each passing its
    /// arguments straight through to the subject constructor.
    fn write_forwarding_constructor(
        &mut self,
        interceptor_name: &str,
        subject_name: &str,
        ctor: &RoutineDef,
    ) -> Result<()> {
        let min_args = query::minimal_argument_count(ctor);
        let max_args = query::count_parameters(ctor);
        for n_args in min_args..=max_args {
            writeln!(
                self.out,
                "\t// Interceptor wrapper for constructor with {n_args} out of {max_args} arguments"
            )?;
            write!(self.out, "\t{interceptor_name}(")?;
            for (i, parameter) in ctor.parameters.iter().take(n_args).enumerate() {
                if i > 0 {
                    write!(self.out, ", ")?;
                }
                let ty = parameter.ty.as_ref().ok_or_else(|| {
                    crate::error::GenError::MissingInformation(format!(
                        "type of parameter '{}' is unresolved",
                        parameter.name
                    ))
                })?;
                write!(
                    self.out,
                    "{}",
                    ty.format_cpp(self.program, &parameter.name)
                )?;
            }
            write!(self.out, ") : {subject_name}(")?;
            for (i, parameter) in ctor.parameters.iter().take(n_args).enumerate() {
                if i > 0 {
                    write!(self.out, ", ")?;
                }
                write!(self.out, "{}", parameter.name)?;
            }
            writeln!(self.out, ") {{}}\n")?;
        }
        Ok(())
    }

    /// Emits the overrides for one virtual method — one per argument count
    /// — and records the clone as interceptor-dispatched so the scope table
    /// leaves its implementation pointer null.
    fn write_interceptor_function(
        &mut self,
        interceptor: EntityId,
        scope_uid: u32,
        method: &query::VirtualMethod,
        func_counter: u32,
    ) -> Result<()> {
        let routine = self.routine_def(method.routine)?;
        let name = self.program.entity(method.routine).name.clone();
        let declarer = self
            .program
            .entity(method.routine)
            .container
            .map(|c| self.program.full_name(c))
            .unwrap_or_default();

        let clone = self.clone_routine(method.routine, &name, interceptor)?;
        self.interceptor_methods.insert(clone);
        self.program
            .scope_mut(interceptor)
            .expect("aggregate owns a scope")
            .add_routine(clone, Visibility::Public, Virtuality::Virtual, Storage::Extern);

        let is_pure = method.virtuality == Virtuality::PureVirtual;
        let min_args = query::minimal_argument_count(&routine);
        let max_args = query::count_parameters(&routine);
        let mut counter = func_counter;

        for n_args in min_args..=max_args {
            writeln!(
                self.out,
                "\t /* Wrapper for {name} taking {n_args} out of {max_args} parameters */"
            )?;
            self.write_override_header(&routine, &name, n_args)?;
            self.write_argument_array(&routine, n_args)?;
            self.write_callback_call(&routine, &declarer, &name, scope_uid, counter, is_pure, n_args)?;
            self.write_result_unwrap(&routine)?;
            self.out.write_all(b"\t}\n")?;
            counter += 1;
        }
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn write_override_header(
        &mut self,
        routine: &RoutineDef,
        name: &str,
        n_args: usize,
    ) -> Result<()> {
        let return_display = routine
            .return_type
            .as_ref()
            .map(|t| t.format_cpp_bare(self.program))
            .unwrap_or_else(|| "void".to_string());
        write!(self.out, "\tvirtual {return_display} {name}(")?;
        for (i, parameter) in routine.parameters.iter().take(n_args).enumerate() {
            if i > 0 {
                write!(self.out, ", ")?;
            }
            let ty = self.parameter_type(parameter)?;
            // Generic argument names avoid clashes with our own locals.
            write!(
                self.out,
                "{} /* {} */",
                ty.format_cpp(self.program, &format!("interceptor_arg{i}")),
                parameter.name
            )?;
        }
        write!(self.out, ")")?;
        if routine.is_const {
            write!(self.out, " const")?;
        }
        self.write_throws_clause(routine.throws.as_deref())?;
        self.out.write_all(b" {\n")?;
        Ok(())
    }

    /// Builds the `basic_block args[]` array, casting every argument into a
    /// slot through the generic-cast helper or its touchup function.
    fn write_argument_array(&mut self, routine: &RoutineDef, n_args: usize) -> Result<()> {
        if n_args == 0 {
            // MSVS rejects a zero-length array with an initializer block.
            self.out.write_all(b"\t\tbasic_block *args = NULL;\n")?;
            return Ok(());
        }
        self.out.write_all(b"\t\tbasic_block args[] = {\n")?;
        for (i, parameter) in routine.parameters.iter().take(n_args).enumerate() {
            let ty = self.parameter_type(parameter)?.clone();
            let display = ty.format_cpp_bare(self.program);
            let original = resolve_original(self.program, &ty);
            let touchup = self
                .touchups
                .get(self.program, &original)
                .map(|t| t.substitute.clone());
            let add_reference =
                filters::needs_extra_referencing(self.program, &ty) && touchup.is_none();
            let star = if add_reference { "*" } else { "" };
            let amp = if add_reference { "&" } else { "" };

            write!(self.out, "\t\t\t((basic_block (*)({display}{star}))")?;
            match &touchup {
                None => {
                    write!(self.out, "SameClass< {display}{star} >::same")?;
                }
                Some(substitute) => {
                    write!(
                        self.out,
                        " ({} (*)({display})) touchup",
                        substitute.format_cpp_bare(self.program)
                    )?;
                }
            }
            write!(self.out, ")({amp}interceptor_arg{i})")?;
            if i + 1 < n_args {
                self.out.write_all(b",")?;
            }
            self.out.write_all(b"\n")?;
        }
        self.out.write_all(b"\t\t};\n")?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn write_callback_call(
        &mut self,
        routine: &RoutineDef,
        declarer: &str,
        name: &str,
        scope_uid: u32,
        counter: u32,
        is_pure: bool,
        n_args: usize,
    ) -> Result<()> {
        self.out.write_all(b"\t\tbasic_block result = 0;\n")?;
        if is_pure {
            writeln!(
                self.out,
                "\t\t__flatbind_callback(twin, scope_{scope_uid} + {counter}, args, &result, true);"
            )?;
            return Ok(());
        }
        writeln!(
            self.out,
            "\t\tif (!__flatbind_callback(twin, scope_{scope_uid} + {counter}, args, &result, false))"
        )?;
        // Falling back to the first declarer keeps shadowed signatures
        // resolving to the right base.
        write!(self.out, "\t\t\t")?;
        if !transform::is_void_type(self.program, routine.return_type.as_ref()) {
            write!(self.out, "return ")?;
        }
        write!(self.out, "{declarer}::{name}(")?;
        for i in 0..n_args {
            if i > 0 {
                write!(self.out, ", ")?;
            }
            write!(self.out, "interceptor_arg{i}")?;
        }
        self.out.write_all(b");\n")?;
        Ok(())
    }

    /// Unwraps the callback's result slot: scoped-release for heap-boxed
    /// results, touchdown for touched-up ones, a generic cast otherwise.
    fn write_result_unwrap(&mut self, routine: &RoutineDef) -> Result<()> {
        if transform::is_void_type(self.program, routine.return_type.as_ref()) {
            return Ok(());
        }
        let return_type = routine.return_type.as_ref().expect("non-void return");
        let return_display = return_type.format_cpp_bare(self.program);
        let original = resolve_original(self.program, return_type);
        let touchup = self
            .touchups
            .get(self.program, &original)
            .map(|t| t.substitute.clone());
        let carried = touchup.clone().unwrap_or_else(|| return_type.clone());
        let extra_referenced =
            filters::needs_extra_referencing(self.program, &carried);

        write!(self.out, "\t\treturn ")?;
        let mut nested = 0;
        if extra_referenced {
            write!(
                self.out,
                "*std::auto_ptr< {} >((({return_display} * (*)(basic_block)) ",
                carried.format_cpp_bare(self.program)
            )?;
            nested += 1;
        } else {
            write!(self.out, "( ({return_display} (*)(basic_block)) ")?;
        }
        match &touchup {
            Some(substitute) => {
                write!(
                    self.out,
                    "({return_display} (*)({})) touchdown)(",
                    substitute.format_cpp_bare(self.program)
                )?;
            }
            None => {
                write!(self.out, "SameClass< basic_block >::same)(")?;
            }
        }
        write!(self.out, "result)")?;
        for _ in 0..nested {
            write!(self.out, ")")?;
        }
        self.out.write_all(b";\n")?;
        Ok(())
    }

    /// An override that bypasses the callback entirely, keeping the class
    /// compilable when a base declares a virtual the runtime cannot reach.
    fn write_private_virtual_forwarder(&mut self, method: &query::VirtualMethod) -> Result<()> {
        let routine = self.routine_def(method.routine)?;
        let name = self.program.entity(method.routine).name.clone();
        let declarer = self
            .program
            .entity(method.routine)
            .container
            .map(|c| self.program.full_name(c))
            .unwrap_or_default();
        let n_args = query::count_parameters(&routine);
        self.write_override_header(&routine, &name, n_args)?;
        write!(self.out, "\t\t")?;
        if !transform::is_void_type(self.program, routine.return_type.as_ref()) {
            write!(self.out, "return ")?;
        }
        write!(self.out, "{declarer}::{name}(")?;
        for i in 0..n_args {
            if i > 0 {
                write!(self.out, ", ")?;
            }
            write!(self.out, "interceptor_arg{i}")?;
        }
        self.out.write_all(b");\n\t}\n\n")?;
        Ok(())
    }

    /// Exposes a protected-or-above field through a public typedef plus a
    /// wrapped field clone that delegates to the ordinary accessor
    /// generation in member-access mode. Arrays are not exposed.
    fn write_interceptor_field_wrapper(
        &mut self,
        interceptor: EntityId,
        field_id: EntityId,
        connection: &Contained,
    ) -> Result<()> {
        let field = self.field_def(field_id)?;
        if query::is_array_type(self.program, &field.ty) {
            return Ok(());
        }
        writeln!(
            self.out,
            "\t/* Wrapper for field {} */",
            self.program.full_name(field_id)
        )?;

        let fuid = self.uid(field_id);
        let alias_name = format!("intercepted_{fuid}");
        let alias = self.program.add(Entity {
            name: alias_name.clone(),
            container: Some(interceptor),
            location: None,
            kind: EntityKind::Alias(crate::model::AliasDef {
                aliased: field.ty.clone(),
            }),
        });
        self.program
            .scope_mut(interceptor)
            .expect("aggregate owns a scope")
            .add_alias(alias, Visibility::Public);
        let stripped = transform::remove_unneeded_constness(self.program, &field.ty);
        writeln!(
            self.out,
            "\ttypedef {};",
            stripped.format_cpp(self.program, &alias_name)
        )?;

        let name = self.program.entity(field_id).name.clone();
        let location = self.program.entity(field_id).location.clone();
        let clone = self.program.add(Entity {
            name,
            container: Some(interceptor),
            location,
            kind: EntityKind::Field(FieldDef {
                ty: TypeNode::Leaf(alias),
                wrapped: true,
            }),
        });
        self.program
            .scope_mut(interceptor)
            .expect("aggregate owns a scope")
            .add_field(clone, Visibility::Public, connection.storage);

        self.generate_field_wrapper(clone, true, true)
    }

    fn parameter_type<'a>(&self, parameter: &'a Parameter) -> Result<&'a TypeNode> {
        parameter.ty.as_ref().ok_or_else(|| {
            crate::error::GenError::MissingInformation(format!(
                "type of parameter '{}' is unresolved",
                parameter.name
            ))
        })
    }
}
