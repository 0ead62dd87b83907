//! flatbind — C++ program model → flat wrappers and registration tables.
//!
//! Reads an analyzed program model (the "program database"), then emits a
//! C++ compilation unit containing flat C-callable wrappers for the
//! selected classes, functions, enums and typedefs, interceptor subclasses
//! for classes a foreign runtime wants to extend, and the self-describing
//! RegData tables a runtime loads to discover everything.
//!
//! # Quick start
//!
//! Generate the registration unit from a config (suitable for `build.rs`):
//!
//! ```no_run
//! use std::path::Path;
//!
//! // Reads config TOML, loads the program database, writes the .cc file.
//! flatbind::run(Path::new("flatbind.toml"), None).unwrap();
//! ```
//!
//! Or get the generated source without writing to disk:
//!
//! ```no_run
//! use std::path::Path;
//!
//! let cpp_source = flatbind::generate(Path::new("flatbind.toml")).unwrap();
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

pub mod config;
pub mod entry;
pub mod error;
pub mod filters;
pub mod generator;
pub mod identity;
pub mod interceptor;
pub mod model;
pub mod query;
pub mod transform;
pub mod types;
pub mod wrappers;

pub use error::GenError;
pub use generator::{Generator, GeneratorOptions};

use model::{EntityId, EntityKind, Program};

/// Run the full pipeline: load config, load the program database, generate
/// the registration unit, and write the output file.
///
/// `config_path` is the path to a `flatbind.toml` configuration file.
/// `output` optionally overrides the output file path from the config.
///
/// Returns the path the generated `.cc` file was written to.
pub fn run(config_path: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let source = generate_from_config(&cfg, base_dir)?;

    let output_path = match output {
        Some(p) => p.to_path_buf(),
        None => base_dir.join(&cfg.output.file),
    };
    std::fs::write(&output_path, &source)
        .with_context(|| format!("writing output to {}", output_path.display()))?;

    info!(
        path = %output_path.display(),
        size = source.len(),
        "wrote registration unit"
    );

    Ok(output_path)
}

/// Parse a `flatbind.toml` config file, load the program database it names,
/// and return the generated C++ source without writing to disk.
pub fn generate(config_path: &Path) -> Result<Vec<u8>> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    generate_from_config(&cfg, base_dir)
}

/// Generate the registration unit from an already-loaded [`config::Config`].
///
/// `base_dir` is the directory relative to which the database path in the
/// config is resolved (typically the parent directory of the TOML file).
pub fn generate_from_config(cfg: &config::Config, base_dir: &Path) -> Result<Vec<u8>> {
    let database_path = if cfg.database.is_absolute() {
        cfg.database.clone()
    } else {
        base_dir.join(&cfg.database)
    };
    let database = std::fs::read_to_string(&database_path)
        .with_context(|| format!("reading program database {}", database_path.display()))?;
    let mut program: Program = serde_json::from_str(&database)
        .with_context(|| format!("parsing program database {}", database_path.display()))?;

    let mut out = Vec::new();
    generate_with_program(cfg, &mut program, &mut out)?;
    Ok(out)
}

/// Generate the registration unit for an in-memory [`Program`], writing the
/// C++ source to `out`. The driver owns the sink; it is flushed after the
/// entry table even though emission may have failed partway.
pub fn generate_with_program<W: Write>(
    cfg: &config::Config,
    program: &mut Program,
    out: W,
) -> Result<()> {
    let options = GeneratorOptions {
        namespace: cfg.namespace.clone(),
    };
    let mut generator = Generator::new(program, out, options);

    select_subjects(&mut generator, cfg);
    info!(
        subjects = generator.subjects().len(),
        namespace = %generator.wrapping_namespace(),
        "selected wrapping subjects"
    );

    generator
        .collect_constants()
        .context("collecting constants")?;
    generator
        .generate_include_directives(&cfg.includes)
        .context("emitting include directives")?;
    generator.generate_preface().context("emitting preface")?;

    for classname in &cfg.interceptors.classes {
        generator.invest_interceptor(classname);
    }
    if cfg.interceptors.auto {
        generator.auto_invest_interceptors();
    }
    generator
        .generate_interceptors()
        .context("synthesizing interceptors")?;

    generator
        .generate_routine_wrappers()
        .context("emitting routine wrappers")?;
    generator
        .generate_static_routines()
        .context("emitting static-call wrappers")?;
    generator
        .generate_constant_wrappers()
        .context("emitting constant wrappers")?;
    generator
        .generate_enumerated_type_wrappers()
        .context("emitting enum wrappers")?;
    generator.generate_entry().context("emitting entry table")?;

    let mut requested: Vec<String> = Vec::new();
    requested.extend(cfg.classes.iter().cloned());
    requested.extend(cfg.functions.iter().cloned());
    requested.extend(cfg.enums.iter().cloned());
    requested.extend(cfg.typedefs.iter().cloned());
    generator.report(&requested);
    Ok(())
}

/// Walks the model and populates the generator's subject, function, enum
/// and typedef lists from the config's selection lists.
fn select_subjects<W: Write>(generator: &mut Generator<'_, W>, cfg: &config::Config) {
    let program = generator.program();
    let mut subjects = Vec::new();
    let mut functions = Vec::new();
    let mut enums = Vec::new();
    let mut typedefs = Vec::new();

    for id in program.ids() {
        let entity = program.entity(id);
        match &entity.kind {
            EntityKind::Aggregate(_) => {
                if selected(program, id, &cfg.classes) {
                    subjects.push(id);
                }
            }
            EntityKind::Routine(_) => {
                if at_namespace_scope(program, id) && selected(program, id, &cfg.functions) {
                    functions.push(id);
                }
            }
            EntityKind::Enum(_) => {
                if selected(program, id, &cfg.enums) {
                    enums.push(id);
                }
            }
            EntityKind::Alias(_) => {
                if at_namespace_scope(program, id) && selected(program, id, &cfg.typedefs) {
                    typedefs.push(id);
                }
            }
            _ => {}
        }
    }

    for id in subjects {
        generator.add_subject(id);
    }
    for id in functions {
        generator.add_global_function(id);
    }
    for id in enums {
        generator.add_enum(id);
    }
    for id in typedefs {
        generator.add_typedef(id);
    }
}

fn selected(program: &Program, id: EntityId, requested: &[String]) -> bool {
    if requested.iter().any(|n| n == "*") {
        return filters::is_available(program, id);
    }
    query::possible_names(program, id)
        .iter()
        .any(|name| requested.iter().any(|r| r == name))
}

/// Class methods are never global functions, whatever the name lists say.
fn at_namespace_scope(program: &Program, id: EntityId) -> bool {
    match program.entity(id).container {
        None => true,
        Some(c) => matches!(program.entity(c).kind, EntityKind::Namespace(_)),
    }
}
