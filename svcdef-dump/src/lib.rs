//! Loads generated stubs and proto IDL from disk, builds the service
//! definition and renders it as JSON or as a short text summary.

use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use svcdef::{Definition, FieldType, HttpBinding, ParamLocation, Svcdef, TypeKind};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write to stdout: {0}")]
    Stdout(#[source] io::Error),
    #[error(transparent)]
    Build(#[from] svcdef::Error),
    #[error("failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DumpError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    #[default]
    Json,
    Summary,
}

/// Reads every file into a `(unit, text)` pair; the unit is the path as given.
pub fn load_sources<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<(String, String)>> {
    paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            let text = fs::read_to_string(path).map_err(|source| DumpError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            debug!(path = %path.display(), bytes = text.len(), "loaded source");
            Ok((path.display().to_string(), text))
        })
        .collect()
}

/// Builds the definition of the files at `stubs` and `idl`, logging every
/// warning the build returned.
pub fn dump_definition<P: AsRef<Path>>(stubs: &[P], idl: &[P]) -> Result<Definition> {
    let stubs = load_sources(stubs)?;
    let idl = load_sources(idl)?;
    info!(stubs = stubs.len(), idl = idl.len(), "building service definition");

    let Svcdef {
        definition,
        warnings,
    } = svcdef::build(stubs, idl)?;
    for warning in &warnings {
        warn!("{warning}");
    }
    Ok(definition)
}

pub fn render(definition: &Definition, format: Format) -> Result<String> {
    match format {
        Format::Json => render_json(definition),
        Format::Summary => Ok(render_summary(definition)),
    }
}

pub fn render_json(definition: &Definition) -> Result<String> {
    let mut json = serde_json::to_string_pretty(definition)?;
    json.push('\n');
    Ok(json)
}

/// Human-readable outline of a definition:
///
/// ```text
/// package library (proto library.v1)
///
/// enum Genre
///
/// message Book
///   Id string
///   Related []*Book
///
/// service Library
///   rpc GetBook(*GetBookRequest) returns (*Book)
///     GET /v1/shelves/{shelf_id}/books/{book_id} path=ShelfId,BookId query=View
/// ```
pub fn render_summary(definition: &Definition) -> String {
    let mut out = format!("package {}", definition.package);
    if let Some(pb_package) = &definition.pb_package {
        out.push_str(&format!(" (proto {pb_package})"));
    }
    out.push('\n');

    for e in &definition.enums {
        out.push_str(&format!("\nenum {}\n", e.name));
    }
    for message in &definition.messages {
        out.push_str(&format!("\nmessage {}\n", message.name));
        for field in &message.fields {
            out.push_str(&format!("  {} {}\n", field.name, type_string(definition, &field.ty)));
        }
    }
    if let Some(service) = &definition.service {
        out.push_str(&format!("\nservice {}\n", service.name));
        for method in &service.methods {
            out.push_str(&format!(
                "  rpc {}({}) returns ({})\n",
                method.name,
                type_string(definition, &method.request),
                type_string(definition, &method.response)
            ));
            for binding in &method.bindings {
                out.push_str(&format!("    {}\n", binding_line(binding)));
            }
        }
    }
    out
}

/// Go spelling of a field type, e.g. `[]*Book` or `map[string]*Shelf`.
fn type_string(definition: &Definition, ty: &FieldType) -> String {
    let base = match &ty.kind {
        TypeKind::Map(map) => format!("map[{}]{}", map.key, type_string(definition, &map.value)),
        _ => definition.type_name(ty),
    };
    let repeated = if ty.repeated { "[]" } else { "" };
    let pointer = if ty.pointer { "*" } else { "" };
    format!("{repeated}{pointer}{base}")
}

fn binding_line(binding: &HttpBinding) -> String {
    let mut line = format!("{} {}", binding.verb, binding.path);
    for location in [ParamLocation::Path, ParamLocation::Query, ParamLocation::Body] {
        let names: Vec<&str> = binding
            .params
            .iter()
            .filter(|p| p.location == location)
            .map(|p| p.name.as_str())
            .collect();
        if !names.is_empty() {
            line.push_str(&format!(" {location}={}", names.join(",")));
        }
    }
    line
}

/// Writes `text` to `path`, or to stdout when no path is given.
pub fn write_output(text: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => fs::write(path, text).map_err(|source| DumpError::Write {
            path: path.to_path_buf(),
            source,
        }),
        None => io::stdout()
            .lock()
            .write_all(text.as_bytes())
            .map_err(DumpError::Stdout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use svcdef::{HttpParameter, HttpVerb, MapType, MessageId};

    #[test]
    fn spells_types_like_go() {
        let def = Definition {
            messages: vec![svcdef::Message {
                name: "Shelf".into(),
                fields: Vec::new(),
            }],
            ..Definition::default()
        };
        let shelf = FieldType::new(TypeKind::Message(MessageId(0))).pointer();
        assert_eq!(type_string(&def, &shelf.clone().repeated()), "[]*Shelf");
        assert_eq!(type_string(&def, &FieldType::primitive("[]byte").repeated()), "[][]byte");
        let map = FieldType::new(TypeKind::Map(Box::new(MapType {
            key: "string".into(),
            value: shelf,
        })));
        assert_eq!(type_string(&def, &map), "map[string]*Shelf");
    }

    #[test]
    fn groups_parameters_by_location() {
        let param = |field, name: &str, location| HttpParameter {
            field,
            name: name.into(),
            location,
        };
        let binding = HttpBinding {
            verb: HttpVerb::Post,
            path: "/v1/shelves/{shelf_id}/books".into(),
            params: vec![
                param(0, "ShelfId", ParamLocation::Path),
                param(1, "Book", ParamLocation::Body),
                param(2, "View", ParamLocation::Query),
            ],
        };
        assert_eq!(
            binding_line(&binding),
            "POST /v1/shelves/{shelf_id}/books path=ShelfId query=View body=Book"
        );
    }

    #[test]
    fn summary_omits_missing_proto_package() {
        let def = Definition {
            package: "echo".into(),
            enums: vec![svcdef::Enum {
                name: "Mode".into(),
            }],
            ..Definition::default()
        };
        assert_eq!(render_summary(&def), "package echo\n\nenum Mode\n");
    }

    #[test]
    fn missing_files_are_read_errors() {
        let err = load_sources(&["does/not/exist.pb.go"]).expect_err("file is missing");
        assert!(matches!(err, DumpError::Read { .. }));
        assert!(err.to_string().contains("does/not/exist.pb.go"));
    }
}
