//! First pass: turns generated Go stubs into a [`Definition`] whose type
//! references are still names.
//!
//! The mapping from Go declarations onto the IR follows the conventions of
//! protoc-gen-go and the gRPC plugins:
//!
//! | Go declaration                    | IR                          |
//! |-----------------------------------|-----------------------------|
//! | `type X int32`                    | Enum `X`                    |
//! | `type X struct {...}` (exported)  | Message `X`                 |
//! | `type XServer interface {...}`    | Service `X`                 |
//! | `type XClient interface {...}`    | skipped                     |
//! | gRPC stream and `Unsafe` helpers  | skipped with a warning      |
//! | any other interface               | skipped with a warning      |
//!
//! Field types nest as follows (an arrow means "nested within"):
//!
//! | Type genre | Repeated               | Naked         |
//! |------------|------------------------|---------------|
//! | Enum       | Slice -> Ident         | Ident         |
//! | Message    | Slice -> Star -> Ident | Star -> Ident |
//! | Base type  | Slice -> Ident         | Ident         |
//!
//! Map fields always have an identifier key and a value of one of the genres
//! above.

use crate::ast::{self, InterfaceElem, MethodSpec, Param, StructField, TypeExpr, TypeSpec};
use crate::diagnostics::{Location, Warning};
use crate::error::{Error, Result};
use crate::model::{
    Definition, Enum, Field, FieldType, MapType, Message, Service, ServiceMethod, TypeKind,
};
use crate::naming::{is_exported, wire_name_from_tag};
use heck::ToSnakeCase;
use tracing::{debug, trace};

const SERVER_SUFFIX: &str = "Server";
const CLIENT_SUFFIX: &str = "Client";
const BOOKKEEPING_PREFIX: &str = "XXX_";

/// Go base types; any other identifier is a reference to a message or enum.
const BASE_TYPES: &[&str] = &[
    "bool", "string", "byte", "rune", "int", "int8", "int16", "int32", "int64", "uint", "uint8",
    "uint16", "uint32", "uint64", "uintptr", "float32", "float64", "complex64", "complex128",
    "error", "any",
];

/// Underlying types of a named integer type, i.e. of a generated enum.
const ENUM_BASE_TYPES: &[&str] = &[
    "int32", "int64", "uint32", "uint64", "int", "int8", "int16", "uint", "uint8", "uint16",
];

pub fn is_base_type(name: &str) -> bool {
    BASE_TYPES.contains(&name)
}

/// Analyzes every stub unit in iteration order. The package clause of the
/// last unit wins.
pub fn analyze<I, K, V>(units: I, warnings: &mut Vec<Warning>) -> Result<Definition>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut analyzer = StubAnalyzer {
        definition: Definition::default(),
        service_unit: None,
        warnings,
    };
    for (unit, source) in units {
        let unit = unit.as_ref();
        let file = ast::parse_stub_file(unit, source.as_ref())
            .map_err(|e| e.context(format!("cannot parse Go file {unit:?}")))?;
        analyzer.analyze_file(unit, &file)?;
    }
    Ok(analyzer.definition)
}

struct StubAnalyzer<'w> {
    definition: Definition,
    /// Unit that declared the service, for duplicate reports.
    service_unit: Option<Location>,
    warnings: &'w mut Vec<Warning>,
}

impl StubAnalyzer<'_> {
    fn analyze_file(&mut self, unit: &str, file: &ast::StubFile) -> Result<()> {
        debug!(
            unit,
            package = %file.package,
            types = file.types.len(),
            "analyzing stub unit"
        );
        self.definition.package = file.package.clone();

        for spec in &file.types {
            match &spec.ty {
                TypeExpr::Named {
                    qualifier: None,
                    name,
                    ..
                } if ENUM_BASE_TYPES.contains(&name.as_str()) => {
                    self.add_enum(unit, spec)
                        .map_err(|e| e.context(format!("error parsing enum {:?}", spec.name)))?;
                }
                TypeExpr::Struct(fields) => {
                    // Non-exported structs do not represent messages
                    if !is_exported(&spec.name) {
                        trace!(name = %spec.name, "skipping unexported struct");
                        continue;
                    }
                    self.add_message(unit, spec, fields)
                        .map_err(|e| e.context(format!("error parsing message {:?}", spec.name)))?;
                }
                TypeExpr::Interface(elems) => self.add_interface(unit, spec, elems)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn add_enum(&mut self, unit: &str, spec: &TypeSpec) -> Result<()> {
        if self.definition.enum_id(&spec.name).is_some() {
            return Err(Error::shape(
                format!("enum {:?} is declared more than once", spec.name),
                Some(Location::new(unit, spec.position)),
            ));
        }
        self.definition.enums.push(Enum {
            name: spec.name.clone(),
        });
        Ok(())
    }

    fn add_message(&mut self, unit: &str, spec: &TypeSpec, fields: &[StructField]) -> Result<()> {
        if self.definition.message_id(&spec.name).is_some() {
            return Err(Error::shape(
                format!("message {:?} is declared more than once", spec.name),
                Some(Location::new(unit, spec.position)),
            ));
        }
        let mut message = Message {
            name: spec.name.clone(),
            fields: Vec::new(),
        };
        for field in fields {
            for name in &field.names {
                // XXX_ fields and the unexported state of protoimpl messages
                // carry no domain information
                if name.starts_with(BOOKKEEPING_PREFIX) || !is_exported(name) {
                    continue;
                }
                let ty = field_type(&field.ty).map_err(|message| {
                    Error::shape(message, Some(Location::new(unit, field.position)))
                        .context(format!("cannot create field {name:?}"))
                })?;
                message.fields.push(Field {
                    name: name.clone(),
                    wire_name: field.tag.as_deref().map(wire_name_from_tag).unwrap_or_default(),
                    ty,
                });
            }
        }
        self.definition.messages.push(message);
        Ok(())
    }

    fn add_interface(&mut self, unit: &str, spec: &TypeSpec, elems: &[InterfaceElem]) -> Result<()> {
        let name = spec.name.as_str();
        let location = Location::new(unit, spec.position);

        // Each service has a "{SVC}Server" and a "{SVC}Client" interface
        // carrying the same methods; only the server one is analyzed.
        if let Some(service_name) = name.strip_suffix(SERVER_SUFFIX)
            && !service_name.is_empty()
        {
            if is_grpc_helper(name, elems) {
                self.warnings.push(Warning::new(
                    format!("gRPC helper interface {name:?} is not a service; skipping"),
                    Some(location),
                ));
                return Ok(());
            }
            if let Some(previous) = &self.service_unit {
                return Err(Error::shape(
                    format!(
                        "more than one service interface declared; a service was already declared {previous}"
                    ),
                    Some(location),
                )
                .context(format!("error parsing service {service_name:?}")));
            }
            let service = self
                .service(unit, service_name, elems)
                .map_err(|e| e.context(format!("error parsing service {service_name:?}")))?;
            self.definition.service = Some(service);
            self.service_unit = Some(location);
            return Ok(());
        }
        if name.ends_with(CLIENT_SUFFIX) {
            return Ok(());
        }
        // Oneof fields generate an interface which is not a service
        self.warnings.push(Warning::new(
            format!("unexpected interface {name:?} found; skipping"),
            Some(location),
        ));
        Ok(())
    }

    fn service(&mut self, unit: &str, name: &str, elems: &[InterfaceElem]) -> Result<Service> {
        let mut service = Service {
            name: name.to_string(),
            methods: Vec::new(),
        };
        for elem in elems {
            match elem {
                InterfaceElem::Method(method) if !is_exported(&method.name) => {
                    self.warnings.push(Warning::new(
                        format!(
                            "unexported method {:?} of service {name:?} is not an RPC; skipping",
                            method.name
                        ),
                        Some(Location::new(unit, method.position)),
                    ));
                }
                InterfaceElem::Method(method) => {
                    let method = service_method(unit, method)
                        .map_err(|e| e.context(format!("cannot create service method {:?}", method.name)))?;
                    service.methods.push(method);
                }
                InterfaceElem::Embedded(ty, position) => {
                    return Err(Error::shape(
                        format!("service interfaces cannot embed other types, found {}", ty.describe()),
                        Some(Location::new(unit, *position)),
                    ));
                }
            }
        }
        Ok(service)
    }
}

/// Recognizes the server-side interfaces the gRPC plugins emit next to a
/// service by their shape, never by their name alone:
///
/// - per-stream helpers (`Library_ListBooksServer`) embed `grpc.ServerStream`
///   or `grpc.ServerStreamingServer[T]` and friends;
/// - the `Unsafe{SVC}Server` marker declares nothing but unexported
///   `mustEmbed...` methods.
fn is_grpc_helper(name: &str, elems: &[InterfaceElem]) -> bool {
    let embeds_stream = elems.iter().any(|elem| {
        matches!(
            elem,
            InterfaceElem::Embedded(TypeExpr::Named { qualifier: Some(q), name, .. }, _)
                if q == "grpc" && name.contains("Stream")
        )
    });
    let only_unexported = !elems.is_empty()
        && elems.iter().all(|elem| {
            matches!(elem, InterfaceElem::Method(method) if !is_exported(&method.name))
        });
    embeds_stream || (name.starts_with("Unsafe") && only_unexported)
}

/// Builds a ServiceMethod from a method of a server interface:
///
/// ```text
/// GetMap(context.Context, *MapTypeRequest) (*MapTypeResponse, error)
///                          └────────────┘    └─────────────┘
///                            request           response
/// ```
fn service_method(unit: &str, method: &MethodSpec) -> Result<ServiceMethod> {
    let at = |position| Some(Location::new(unit, position));
    let params = &method.signature.params;

    if !params.first().is_some_and(|p| is_context(&p.ty)) {
        return Err(Error::shape(
            format!(
                "method {:?} must take context.Context as its first parameter",
                method.name
            ),
            at(method.position),
        ));
    }
    if params.len() != 2 {
        return Err(Error::shape(
            format!(
                "method {:?} must take exactly one request parameter after context.Context, found {}",
                method.name,
                params.len() - 1
            ),
            at(method.position),
        ));
    }
    if params[1].variadic {
        return Err(Error::shape(
            format!("request parameter of method {:?} cannot be variadic", method.name),
            at(params[1].position),
        ));
    }
    let request = message_pointer(&params[1]).map_err(|message| {
        Error::shape(message, at(params[1].position))
            .context(format!("request type of method {:?}", method.name))
    })?;

    let Some(first_result) = method.signature.results.first() else {
        return Err(Error::shape(
            format!("method {:?} must return a response", method.name),
            at(method.position),
        ));
    };
    let response = message_pointer(first_result).map_err(|message| {
        Error::shape(message, at(first_result.position))
            .context(format!("response type of method {:?}", method.name))
    })?;

    Ok(ServiceMethod {
        name: method.name.clone(),
        snake_name: method.name.to_snake_case(),
        request,
        response,
        bindings: Vec::new(),
    })
}

fn is_context(ty: &TypeExpr) -> bool {
    matches!(
        ty,
        TypeExpr::Named { qualifier, name, .. }
            if name == "Context" && qualifier.as_deref().is_none_or(|q| q == "context")
    )
}

/// A request or response must be exactly `*Name` or `*pkg.Name`.
fn message_pointer(param: &Param) -> std::result::Result<FieldType, String> {
    match &param.ty {
        TypeExpr::Pointer(inner) => match inner.as_ref() {
            TypeExpr::Named { name, args, .. } if !args.is_empty() => Err(format!(
                "expected a pointer to a message, found a pointer to generic type {name:?}"
            )),
            TypeExpr::Named { name, .. } => Ok(FieldType::named(name.clone()).pointer()),
            other => Err(format!(
                "expected a pointer to a named type, found a pointer to a {}",
                other.describe()
            )),
        },
        other => Err(format!(
            "expected a pointer to a named type, found a {}",
            other.describe()
        )),
    }
}

/// Walks a field's type expression from the outside in.
///
/// A second slice layer does not set another flag: it is folded into the type
/// name, so `[][]byte` is a repeated field of type `[]byte`.
pub(crate) fn field_type(expr: &TypeExpr) -> std::result::Result<FieldType, String> {
    let mut pointer = false;
    let mut repeated = false;
    let mut prefix = String::new();
    let mut current = expr;
    let kind = loop {
        match current {
            TypeExpr::Pointer(inner) => {
                pointer = true;
                current = inner;
            }
            TypeExpr::Slice(inner) | TypeExpr::Array(inner) => {
                if repeated {
                    prefix.push_str("[]");
                }
                repeated = true;
                current = inner;
            }
            TypeExpr::Map { key, value } => {
                let key = match key.as_ref() {
                    TypeExpr::Named {
                        qualifier: None,
                        name,
                        ..
                    } => name.clone(),
                    other => {
                        return Err(format!(
                            "map keys must be base types, found a {}",
                            other.describe()
                        ));
                    }
                };
                let value = field_type(value)?;
                break TypeKind::Map(Box::new(MapType { key, value }));
            }
            TypeExpr::Named { name, args, .. } if !args.is_empty() => {
                return Err(format!("generic type {name:?} cannot be a field type"));
            }
            TypeExpr::Named { name, .. } => {
                let name = format!("{prefix}{name}");
                break if is_base_type(name.trim_start_matches("[]")) {
                    TypeKind::Primitive(name)
                } else {
                    TypeKind::Named(name)
                };
            }
            other => {
                return Err(format!("unsupported field type: {}", other.describe()));
            }
        }
    };
    Ok(FieldType {
        kind,
        pointer,
        repeated,
    })
}
