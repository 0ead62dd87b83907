//! Wrapper emitter — flat wrappers and their registration prototypes.

use std::io::Write;

use tracing::warn;

use crate::error::{GenError, Result};
use crate::filters;
use crate::generator::{END_OF_LIST, Generator, RegRecord};
use crate::model::{EntityId, FieldDef, RoutineDef};
use crate::query;
use crate::transform;
use crate::types::{TypeNode, resolve_original};

impl<W: Write> Generator<'_, W> {
    pub(crate) fn routine_def(&self, id: EntityId) -> Result<RoutineDef> {
        self.program.routine(id).cloned().ok_or_else(|| {
            GenError::MissingInformation(format!(
                "{} is not a routine",
                self.program.full_name(id)
            ))
        })
    }

    pub(crate) fn field_def(&self, id: EntityId) -> Result<FieldDef> {
        self.program.field(id).cloned().ok_or_else(|| {
            GenError::MissingInformation(format!("{} is not a field", self.program.full_name(id)))
        })
    }

    // -----------------------------------------------------------------
    // Pass drivers
    // -----------------------------------------------------------------

    /// Wraps every subject's routines and fields, the class specials, the
    /// encapsulated typedefs, and the global functions.
    pub fn generate_routine_wrappers(&mut self) -> Result<()> {
        for subject in self.subjects.clone() {
            if !filters::is_available(self.program, subject) {
                continue;
            }
            let Some(agg) = self.program.aggregate(subject) else {
                continue;
            };
            let routines = agg.scope.routines.clone();
            let fields = agg.scope.fields.clone();

            let is_abstract = query::is_abstract(self.program, subject);
            let must_have_ctor = query::has_default_constructor(self.program, subject);
            let has_output = query::has_output_operator(self.program, subject);
            let has_assignment = filters::is_assignment_supportive(self.program, subject);
            let has_clone = filters::is_cloneable(self.program, subject);
            let additional = query::find_globally_scoped_operators(self.program, subject);

            self.generate_up_down_cast_wrappers(subject)?;

            let mut ctors = false;
            for connection in routines {
                let routine = self.routine_def(connection.entity)?;
                if routine.is_constructor() && is_abstract {
                    continue;
                }
                if connection.visibility != crate::model::Visibility::Public
                    || routine.is_destructor()
                    || !filters::is_available(self.program, connection.entity)
                {
                    continue;
                }
                let min_args = query::minimal_argument_count(&routine);
                let max_args = query::count_parameters(&routine);
                for n_arguments in min_args..=max_args {
                    if !self.interceptor_methods.contains(&connection.entity) {
                        self.generate_flat_wrapper_routine(connection.entity, n_arguments, true)?;
                    }
                    self.generate_registration_prototype_routine(
                        connection.entity,
                        n_arguments,
                        true,
                    )?;
                }
                ctors = ctors || routine.is_constructor();
            }

            for connection in fields {
                if filters::is_available_field(self.program, &connection) {
                    self.generate_field_wrapper(connection.entity, true, false)?;
                }
            }

            if !ctors && must_have_ctor && !is_abstract {
                self.generate_special_default_constructor(subject)?;
            }
            if has_assignment {
                self.generate_special_assignment_operator(subject)?;
            }
            if has_clone {
                self.generate_special_clone_method(subject)?;
            }
            if has_output {
                self.generate_special_output_operator(subject)?;
                self.generate_special_string_converter(subject)?;
            }
            for routine in additional {
                if !self.global_funcs.contains(&routine)
                    && filters::is_available(self.program, routine)
                {
                    self.global_funcs.push(routine);
                }
            }
            self.generate_special_destructor(subject)?;
        }

        for alias in self.typedefs.clone() {
            if filters::needs_encapsulation(self.program, alias) {
                self.generate_flat_wrapper_alias(alias)?;
                self.generate_registration_prototype_alias(alias)?;
            }
        }

        for func in self.global_funcs.clone() {
            if !filters::is_available(self.program, func) {
                continue;
            }
            let routine = self.routine_def(func)?;
            let min_args = query::minimal_argument_count(&routine);
            let max_args = query::count_parameters(&routine);
            for n_arguments in min_args..=max_args {
                self.generate_flat_wrapper_routine(func, n_arguments, false)?;
                self.generate_registration_prototype_routine(func, n_arguments, false)?;
            }
        }
        Ok(())
    }

    /// Adds a static-call version of every plain public method, taking the
    /// instance as an explicit first argument. This pass is the one place a
    /// MissingInformation failure is recoverable: the wrapper is skipped
    /// with a warning and generation continues.
    pub fn generate_static_routines(&mut self) -> Result<()> {
        for subject in self.subjects.clone() {
            if !filters::is_available(self.program, subject) {
                continue;
            }
            let Some(agg) = self.program.aggregate(subject) else {
                continue;
            };
            let routines = agg.scope.routines.clone();
            for connection in routines {
                if !filters::is_available_static_routine(self.program, &connection) {
                    continue;
                }
                let routine = self.routine_def(connection.entity)?;
                let min_args = query::minimal_argument_count(&routine);
                let max_args = query::count_parameters(&routine);
                for n_arguments in min_args..=max_args {
                    match self.generate_static_wrapper(subject, connection.entity, n_arguments) {
                        Ok(()) => {}
                        Err(GenError::MissingInformation(_)) => {
                            warn!(
                                method = %self.program.full_name(connection.entity),
                                "skipped static wrapper for method"
                            );
                        }
                        Err(other) => return Err(other),
                    }
                }
            }
        }
        Ok(())
    }

    /// Wraps all the constants found by [`Generator::collect_constants`].
    pub fn generate_constant_wrappers(&mut self) -> Result<()> {
        for global in self.global_data.clone() {
            self.generate_field_wrapper(global, false, false)?;
        }
        Ok(())
    }

    /// Wraps the enumerated types: one integer cell per constant plus the
    /// describing table.
    pub fn generate_enumerated_type_wrappers(&mut self) -> Result<()> {
        for subject in self.enums.clone() {
            self.generate_flat_wrapper_enum(subject)?;
            self.generate_registration_prototype_enum(subject)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Routine wrappers
    // -----------------------------------------------------------------

    /// Emits the flat wrapper for a routine at one argument count. `with`
    /// selects instance invocation (`self->`) over global invocation.
    pub(crate) fn generate_flat_wrapper_routine(
        &mut self,
        routine_id: EntityId,
        n_arguments: usize,
        with: bool,
    ) -> Result<()> {
        let routine = self.routine_def(routine_id)?;
        let full = self.program.full_name(routine_id);
        let bare = self.program.entity(routine_id).name.clone();
        let container = self.program.entity(routine_id).container;
        let this_arg = if with {
            container.filter(|c| self.program.aggregate(*c).is_some())
        } else {
            None
        };

        let return_display = routine
            .return_type
            .as_ref()
            .map(|t| t.format_cpp_bare(self.program))
            .unwrap_or_else(|| "void".to_string());
        writeln!(self.out, "/*\n * {full}")?;
        writeln!(self.out, " * returns {return_display}")?;
        writeln!(
            self.out,
            " * {}\n */",
            transform::format_location(self.program, routine_id)
        )?;

        let uid = self.uid(routine_id);
        let wrapper_name = format!(
            "routine_{uid}{}{n_arguments}",
            if with { "r" } else { "s" }
        );

        let paramf = transform::deduce_parameter_transformers(
            self.program,
            &self.touchups,
            &routine.parameters,
            n_arguments,
        )
        .map_err(|e| transform::with_routine_context(e, &full))?;
        let retf = transform::deduce_return_transformer(
            self.program,
            &self.touchups,
            routine.return_type.as_ref(),
        )
        .map_err(|e| transform::with_routine_context(e, &full))?;

        if routine.is_constructor() {
            let classname = this_arg
                .map(|c| self.program.full_name(c))
                .unwrap_or_default();
            write!(self.out, "{classname}* __CDECL {wrapper_name}")?;
        } else {
            write!(
                self.out,
                "{} __CDECL {wrapper_name}",
                retf.prototype.format_cpp_bare(self.program)
            )?;
        }

        write!(self.out, "(")?;
        let mut first = true;
        if let Some(this) = this_arg {
            if !routine.is_constructor() {
                if routine.is_const {
                    write!(self.out, "const ")?;
                }
                write!(self.out, "{} *self", self.program.full_name(this))?;
                first = false;
            }
        }
        if !first && n_arguments > 0 {
            write!(self.out, ", ")?;
        }
        write!(
            self.out,
            "{}",
            transform::format_parameters(self.program, &paramf)
        )?;
        writeln!(self.out, ")")?;

        let mut invocation;
        if routine.is_constructor() {
            let classname = this_arg
                .map(|c| self.program.full_name(c))
                .unwrap_or_default();
            invocation = format!("new {classname}");
        } else if this_arg.is_some() {
            if routine.is_conversion_operator() {
                invocation = format!("CONVOP({return_display},self)");
            } else if bare == "operator==" || bare == "operator!=" {
                invocation = format!("*self {}", &bare["operator".len()..]);
            } else {
                invocation = format!("self->{bare}");
            }
        } else {
            invocation = full.clone();
        }
        if !routine.is_conversion_operator() {
            invocation.push('(');
            invocation.push_str(&transform::format_arguments(&paramf));
            invocation.push(')');
        }

        let returns_value = routine.is_constructor()
            || !transform::is_void_type(self.program, routine.return_type.as_ref());
        let statement = if returns_value {
            format!("return {};", retf.body.apply(&invocation))
        } else {
            format!("{};", retf.body.apply(&invocation))
        };
        writeln!(self.out, "{{\n\t{statement}\n}}")?;
        Ok(())
    }

    /// Emits the parameter-descriptor array matching one wrapper.
    pub(crate) fn generate_registration_prototype_routine(
        &mut self,
        routine_id: EntityId,
        n_arguments: usize,
        with: bool,
    ) -> Result<()> {
        let routine = self.routine_def(routine_id)?;
        let uid = self.uid(routine_id);
        writeln!(
            self.out,
            "RegData routine_{uid}{}{n_arguments}_proto[] = {{",
            if with { "r" } else { "s" }
        )?;
        for parameter in routine.parameters.iter().take(n_arguments) {
            let decorated = transform::decorated_parameter_type(self.program, parameter)
                .map_err(|e| {
                    transform::with_routine_context(e, &self.program.full_name(routine_id))
                })?;
            writeln!(self.out, "\t{{\"{}\", \"{decorated}\", 0}},", parameter.name)?;
        }
        self.out.write_all(END_OF_LIST.as_bytes())?;
        Ok(())
    }

    fn generate_static_wrapper(
        &mut self,
        subject: EntityId,
        routine_id: EntityId,
        n_arguments: usize,
    ) -> Result<()> {
        let routine = self.routine_def(routine_id)?;
        let qualified = self.program.full_name(routine_id);
        let subject_name = self.program.full_name(subject);

        let paramf = transform::deduce_parameter_transformers(
            self.program,
            &self.touchups,
            &routine.parameters,
            n_arguments,
        )?;
        let retf = transform::deduce_return_transformer(
            self.program,
            &self.touchups,
            routine.return_type.as_ref(),
        )?;

        let uid = self.uid(routine_id);
        let name = format!("static_{uid}r{n_arguments}");

        writeln!(self.out, "/*\n * {qualified}")?;
        writeln!(self.out, " * wraps the non-static method as a static call")?;
        writeln!(
            self.out,
            " * {}\n */",
            transform::format_location(self.program, routine_id)
        )?;
        write!(
            self.out,
            "{} __CDECL {name}(",
            retf.prototype.format_cpp_bare(self.program)
        )?;
        if routine.is_const {
            write!(self.out, "const ")?;
        }
        write!(self.out, "{subject_name} *self")?;
        if n_arguments > 0 {
            write!(self.out, ", ")?;
        }
        writeln!(
            self.out,
            "{})",
            transform::format_parameters(self.program, &paramf)
        )?;

        let invocation = format!(
            "self->{qualified}({})",
            transform::format_arguments(&paramf)
        );
        let returns_value = !transform::is_void_type(self.program, routine.return_type.as_ref());
        let statement = if returns_value {
            format!("return {};", retf.body.apply(&invocation))
        } else {
            format!("{};", retf.body.apply(&invocation))
        };
        writeln!(self.out, "{{\n\t{statement}\n}}")?;

        writeln!(self.out, "RegData {name}_proto[] = {{")?;
        writeln!(self.out, "\t{{\"self\", \"&{subject_name}\", 0}},")?;
        for parameter in routine.parameters.iter().take(n_arguments) {
            let decorated = transform::decorated_parameter_type(self.program, parameter)?;
            writeln!(self.out, "\t{{\"{}\", \"{decorated}\", 0}},", parameter.name)?;
        }
        self.out.write_all(END_OF_LIST.as_bytes())?;

        self.entry_records.push(RegRecord {
            name: qualified,
            type_signature: retf.reg_type,
            prototype: Some(format!("{name}_proto")),
            symbol: Some(name),
        });
        Ok(())
    }

    // -----------------------------------------------------------------
    // Field accessors
    // -----------------------------------------------------------------

    /// Emits the get (and set, when possible) accessors for a field.
    /// `with` selects instance access; `for_interceptor` emits the member
    /// flavor used inside a synthesized interceptor class body.
    pub(crate) fn generate_field_wrapper(
        &mut self,
        field_id: EntityId,
        with: bool,
        for_interceptor: bool,
    ) -> Result<()> {
        let field = self.field_def(field_id)?;
        let full = self.program.full_name(field_id);
        let tabs = if for_interceptor { "\t" } else { "" };
        let fors = if with { "f" } else { "s" };

        writeln!(self.out, "{tabs}/*\n{tabs} * var {full}")?;
        writeln!(
            self.out,
            "{tabs} * of type {}",
            field.ty.format_cpp_bare(self.program)
        )?;
        writeln!(
            self.out,
            "{tabs} * {}\n {tabs}*/",
            transform::format_location(self.program, field_id)
        )?;

        let uid = self.uid(field_id);
        let accessor = format!("data_get_{uid}{fors}");
        let wrapping_interceptor_getter = field.wrapped && !for_interceptor;

        let container = self.program.entity(field_id).container;
        let this_arg = if for_interceptor {
            String::new()
        } else {
            match container.filter(|c| self.program.aggregate(*c).is_some()) {
                Some(c) => format!("{} *self", self.program.full_name(c)),
                None => String::new(),
            }
        };

        let retf = transform::deduce_return_transformer(
            self.program,
            &self.touchups,
            Some(&field.ty),
        )
        .map_err(|e| transform::with_routine_context(e, &full))?;

        write!(
            self.out,
            "{tabs}{} {accessor}({this_arg})",
            retf.prototype.format_cpp_bare(self.program)
        )?;
        if wrapping_interceptor_getter {
            // conversions were already applied inside the generated member
            // accessor; just forward
            writeln!(self.out, " {{ return self->{accessor}(); }}")?;
        } else {
            let member = transform::format_member(self.program, field_id, !for_interceptor);
            writeln!(self.out, " {{ return {}; }}", retf.body.apply(&member))?;
        }

        if !filters::has_setter(self.program, field_id) {
            return Ok(());
        }

        let setter = format!("data_set_{uid}{fors}");
        let paramf = transform::deduce_parameter_transformer(
            self.program,
            &self.touchups,
            "newval",
            Some(&field.ty),
        )
        .map_err(|e| transform::with_routine_context(e, &full))?;

        write!(self.out, "{tabs}void {setter}(")?;
        if !for_interceptor && !this_arg.is_empty() {
            write!(self.out, "{this_arg}, ")?;
        }
        write!(
            self.out,
            "{}) ",
            paramf.prototype.format_cpp(self.program, "newval")
        )?;
        if wrapping_interceptor_getter {
            writeln!(self.out, "{{ self->{setter}(newval); }}")?;
        } else {
            let member = transform::format_member(self.program, field_id, !for_interceptor);
            writeln!(
                self.out,
                "{{ {member} = {}; }}",
                paramf.body.apply("newval")
            )?;
        }

        if !for_interceptor {
            let resolved = resolve_original(self.program, &field.ty);
            let base_name = self.program.full_name(resolved.base_entity());
            writeln!(self.out, "RegData sink_{uid}{fors}_proto[] = {{")?;
            writeln!(self.out, "\t{{\"newval\", \"{base_name}\", 0, 0}},")?;
            self.out.write_all(END_OF_LIST.as_bytes())?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Enumerated types
    // -----------------------------------------------------------------

    fn generate_flat_wrapper_enum(&mut self, enum_id: EntityId) -> Result<()> {
        let Some(def) = self.program.enum_def(enum_id).cloned() else {
            return Ok(());
        };
        writeln!(self.out, "/*\n * enum {}\n */", self.program.full_name(enum_id))?;
        let container_prefix = match self.program.entity(enum_id).container {
            Some(c) if !self.program.full_name(c).is_empty() => {
                format!("{}::", self.program.full_name(c))
            }
            _ => String::new(),
        };
        for (ordinal, constant) in def.constants.iter().enumerate() {
            let cuid = self.enum_constant_uid(enum_id, ordinal as u32);
            writeln!(
                self.out,
                "int const_{cuid} = (int){container_prefix}{};",
                constant.literal
            )?;
        }
        Ok(())
    }

    fn generate_registration_prototype_enum(&mut self, enum_id: EntityId) -> Result<()> {
        let Some(def) = self.program.enum_def(enum_id).cloned() else {
            return Ok(());
        };
        let uid = self.uid(enum_id);
        writeln!(self.out, "RegData enumerated_{uid}[] = {{")?;
        for (ordinal, constant) in def.constants.iter().enumerate() {
            let cuid = self.enum_constant_uid(enum_id, ordinal as u32);
            writeln!(
                self.out,
                "\t{{ \"{}\", 0, 0, (void*)&const_{cuid} }},",
                constant.literal
            )?;
        }
        self.out.write_all(END_OF_LIST.as_bytes())?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Encapsulated typedefs
    // -----------------------------------------------------------------

    /// Boxing constructor, value accessor, and destructor for a typedef
    /// that gets its own proxy class.
    fn generate_flat_wrapper_alias(&mut self, alias_id: EntityId) -> Result<()> {
        let Some(alias) = self.program.alias(alias_id).cloned() else {
            return Ok(());
        };
        let full = self.program.full_name(alias_id);
        let uid = self.uid(alias_id);
        writeln!(self.out, "/*\n * typedef {full}\n */")?;

        let valf = transform::deduce_parameter_transformer(
            self.program,
            &self.touchups,
            "value",
            Some(&alias.aliased),
        )
        .map_err(|e| transform::with_routine_context(e, &full))?;
        writeln!(
            self.out,
            "{full}* __CDECL routine_alias_{uid}({})",
            valf.prototype.format_cpp(self.program, "value")
        )?;
        writeln!(
            self.out,
            "{{\n\treturn new {full}({});\n}}",
            valf.body.apply("value")
        )?;
        writeln!(self.out, "RegData routine_alias_{uid}_proto[] = {{")?;
        writeln!(self.out, "\t{{\"value\", \"{}\", 0}},", valf.reg_type)?;
        self.out.write_all(END_OF_LIST.as_bytes())?;

        let retf = transform::deduce_return_transformer(
            self.program,
            &self.touchups,
            Some(&alias.aliased),
        )
        .map_err(|e| transform::with_routine_context(e, &full))?;
        writeln!(
            self.out,
            "{} __CDECL routine_unalias_{uid}({full} *self)",
            retf.prototype.format_cpp_bare(self.program)
        )?;
        writeln!(self.out, "{{\n\treturn {};\n}}", retf.body.apply("*self"))?;
        writeln!(self.out, "RegData routine_unalias_{uid}_proto[] = {{")?;
        writeln!(self.out, "\t{{\"self\", \"*{full}\", 0}},")?;
        self.out.write_all(END_OF_LIST.as_bytes())?;

        writeln!(self.out, "void __CDECL dtor_alias_{uid}({full} *self)")?;
        writeln!(
            self.out,
            "{{\n\t{};\n}}",
            transform::BodyExpr::DeleteSelf.apply("self")
        )?;
        Ok(())
    }

    /// Proxy-class registration for an encapsulated typedef.
    fn generate_registration_prototype_alias(&mut self, alias_id: EntityId) -> Result<()> {
        let Some(alias) = self.program.alias(alias_id).cloned() else {
            return Ok(());
        };
        let uid = self.uid(alias_id);
        let aliased_base = self
            .program
            .full_name(resolve_original(self.program, &alias.aliased).base_entity());
        writeln!(self.out, "RegData alias_{uid}[] = {{")?;
        writeln!(
            self.out,
            "\t{{ \"^\", \"constructor\", routine_alias_{uid}_proto, (void*)&routine_alias_{uid} }},"
        )?;
        writeln!(
            self.out,
            "\t{{ \"as\", \"{aliased_base}\", routine_unalias_{uid}_proto, (void*)&routine_unalias_{uid} }},"
        )?;
        writeln!(
            self.out,
            "\t{{ \".\", \"destructor\", 0, (void*)&dtor_alias_{uid} }},"
        )?;
        self.out.write_all(END_OF_LIST.as_bytes())?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Class specials
    // -----------------------------------------------------------------

    /// Wrapper over the compiler-provided default constructor, for classes
    /// with no user constructor of their own.
    fn generate_special_default_constructor(&mut self, subject: EntityId) -> Result<()> {
        let classname = self.program.full_name(subject);
        let uid = self.scope_uid(subject);
        writeln!(
            self.out,
            "{classname}* __CDECL ctor_{uid}() {{ return new {classname}; }}"
        )?;
        Ok(())
    }

    fn generate_special_assignment_operator(&mut self, subject: EntityId) -> Result<()> {
        let classname = self.program.full_name(subject);
        let uid = self.scope_uid(subject);
        writeln!(
            self.out,
            "void __CDECL assign_{uid}({classname} *self, {classname} *other) {{ *self = *other; }}"
        )?;
        writeln!(self.out, "RegData assign_{uid}_proto[] = {{")?;
        writeln!(self.out, "\t{{\"other\", \"*{classname}\", 0, 0}},")?;
        self.out.write_all(END_OF_LIST.as_bytes())?;
        Ok(())
    }

    fn generate_special_clone_method(&mut self, subject: EntityId) -> Result<()> {
        let classname = self.program.full_name(subject);
        let uid = self.scope_uid(subject);
        writeln!(
            self.out,
            "{classname}* __CDECL clone_{uid}({classname} *self) {{ return new {classname}(*self); }}"
        )?;
        Ok(())
    }

    pub(crate) fn generate_special_destructor(&mut self, subject: EntityId) -> Result<()> {
        let classname = self.program.full_name(subject);
        let uid = self.scope_uid(subject);
        writeln!(
            self.out,
            "void __CDECL dtor_{uid}({classname} *self) {{ {}; }}",
            transform::BodyExpr::DeleteSelf.apply("self")
        )?;
        Ok(())
    }

    /// Prints the object to std::cerr through the class's `operator<<`.
    fn generate_special_output_operator(&mut self, subject: EntityId) -> Result<()> {
        self.include_snippet("iostream")?;
        let classname = self.program.full_name(subject);
        let uid = self.scope_uid(subject);
        writeln!(
            self.out,
            "void __CDECL output_{uid}({classname} *self) {{ std::cerr << *self; }}\n"
        )?;
        Ok(())
    }

    /// Serializes the object through a stringstream into the wire string
    /// record: explicit size, a redundant pointer to the inline buffer,
    /// then the character bytes, no terminator.
    fn generate_special_string_converter(&mut self, subject: EntityId) -> Result<()> {
        self.include_snippet("sstream")?;
        self.code_snippet(
            "pascalstring_ctor",
            "inline struct PascalString *toPascal(const std::string& cpp)\n\
             { unsigned long size = (unsigned long)cpp.size();\n\
             \x20 PascalString *pascal_string = (PascalString*)\n\
             \x20   malloc(sizeof(PascalString) + size);\n\
             \x20 pascal_string->size = size; pascal_string->chars = pascal_string->buffer;\n\
             \x20 memcpy(pascal_string->buffer, cpp.c_str(), size);\n\
             \x20 return pascal_string;\n}\n",
        )?;
        let classname = self.program.full_name(subject);
        let uid = self.scope_uid(subject);
        writeln!(
            self.out,
            "struct PascalString *toString_{uid}({classname} *self) \
             {{ std::stringstream ss; ss << *self;\n return toPascal(ss.str()); }}\n"
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Casts
    // -----------------------------------------------------------------

    /// Upcast wrapper per public base; checked downcast (plus registration
    /// line for the entry table) when the base is polymorphic.
    pub(crate) fn generate_up_down_cast_wrappers(&mut self, subject: EntityId) -> Result<()> {
        let Some(agg) = self.program.aggregate(subject) else {
            return Ok(());
        };
        let bases = agg.bases.clone();
        for connection in bases {
            if connection.visibility != crate::model::Visibility::Public {
                continue;
            }
            let basename = query::actual_base_name(self.program, &connection);
            let derivedname = self.program.full_name(subject);
            let derived_uid = self.scope_uid(subject);
            let base_uid = self.scope_uid(connection.base);
            let derived2base = format!("{derived_uid}_to_{base_uid}");
            let base2derived = format!("{base_uid}_to_{derived_uid}");

            writeln!(
                self.out,
                "{basename}* __CDECL upcast_{derived2base}({derivedname} *self) {{ return self; }}"
            )?;

            if query::is_polymorphic(self.program, connection.base) {
                writeln!(
                    self.out,
                    "{derivedname}* __CDECL downcast_{base2derived}({basename} *self) \
                     {{ return dynamic_cast<{derivedname}*>(self); }}"
                )?;
                writeln!(self.out, "RegData downcast_{base2derived}_proto[] = {{")?;
                writeln!(self.out, "\t{{\"arg0\", \"*{basename}\", 0, 0}},")?;
                self.out.write_all(END_OF_LIST.as_bytes())?;
                self.down_casters.push(format!(
                    "\"dynamic_cast< {derivedname} >\", \"&{derivedname}\", \
                     downcast_{base2derived}_proto, (void*)&downcast_{base2derived}"
                ));
            }
        }
        Ok(())
    }
}

/// Checks the wrapper type is usable as a flat signature. Kept separate so
/// synthesized prototypes can assert it in tests.
pub fn prototype_is_pointer_shaped(ty: &TypeNode) -> bool {
    matches!(ty, TypeNode::Pointer(_))
}
