// IR of one gRPC service, as distilled from generated Go stubs and the
// HTTP annotations of the proto IDL.
// - Top-level has the Go package, the proto package, messages, enums and at
//   most one service.
// - Type references between messages/enums are index handles into the
//   Definition's own tables.

use heck::ToSnakeCase;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Definition {
    /// Package clause of the last analyzed stub unit.
    pub package: String,
    /// Proto package of the IDL unit declaring the service, if one was found.
    pub pb_package: Option<String>,
    pub messages: Vec<Message>,
    pub enums: Vec<Enum>,
    pub service: Option<Service>,
}

impl Definition {
    pub fn message(&self, id: MessageId) -> &Message {
        &self.messages[id.0]
    }

    pub fn enum_(&self, id: EnumId) -> &Enum {
        &self.enums[id.0]
    }

    pub fn message_id(&self, name: &str) -> Option<MessageId> {
        self.messages
            .iter()
            .position(|m| m.name == name)
            .map(MessageId)
    }

    pub fn enum_id(&self, name: &str) -> Option<EnumId> {
        self.enums.iter().position(|e| e.name == name).map(EnumId)
    }

    pub fn message_by_name(&self, name: &str) -> Option<&Message> {
        self.message_id(name).map(|id| self.message(id))
    }

    pub fn enum_by_name(&self, name: &str) -> Option<&Enum> {
        self.enum_id(name).map(|id| self.enum_(id))
    }

    /// Name of the type behind `ty`, with references looked up in this
    /// definition. Maps render as `map[key]value`.
    pub fn type_name(&self, ty: &FieldType) -> String {
        match &ty.kind {
            TypeKind::Primitive(name) | TypeKind::Named(name) => name.clone(),
            TypeKind::Message(id) => self.message(*id).name.clone(),
            TypeKind::Enum(id) => self.enum_(*id).name.clone(),
            TypeKind::Map(map) => format!("map[{}]{}", map.key, self.type_name(&map.value)),
        }
    }
}

/// Handle of a message in [`Definition::messages`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MessageId(pub usize);

/// Handle of an enum in [`Definition::enums`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EnumId(pub usize);

// ---------------- Message & Fields ----------------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Message {
    pub name: String,
    pub fields: Vec<Field>,
}

impl Message {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    /// Go field name, e.g. `SnakeCase`.
    pub name: String,
    /// Field name as written in the .proto file, e.g. `snake_case`. Empty
    /// when the stub carries no struct tag to derive it from.
    pub wire_name: String,
    pub ty: FieldType,
}

impl Field {
    /// Whether `ident` (a path placeholder or body selector) refers to this
    /// field.
    pub fn is_named(&self, ident: &str) -> bool {
        (!self.wire_name.is_empty() && self.wire_name == ident)
            || self.name == ident
            || self.name.to_snake_case() == ident
    }
}

/// Type of a field, a request or a response.
///
/// `pointer` and `repeated` are orthogonal modifiers; `kind` holds exactly one
/// of the closed set of type shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldType {
    pub kind: TypeKind,
    pub pointer: bool,
    pub repeated: bool,
}

impl FieldType {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            pointer: false,
            repeated: false,
        }
    }

    pub fn primitive(name: impl Into<String>) -> Self {
        Self::new(TypeKind::Primitive(name.into()))
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(TypeKind::Named(name.into()))
    }

    pub fn pointer(mut self) -> Self {
        self.pointer = true;
        self
    }

    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    pub fn message_id(&self) -> Option<MessageId> {
        match self.kind {
            TypeKind::Message(id) => Some(id),
            _ => None,
        }
    }

    pub fn enum_id(&self) -> Option<EnumId> {
        match self.kind {
            TypeKind::Enum(id) => Some(id),
            _ => None,
        }
    }

    pub fn map(&self) -> Option<&MapType> {
        match &self.kind {
            TypeKind::Map(map) => Some(map),
            _ => None,
        }
    }

    /// True once no by-name reference is left anywhere in this type.
    pub fn is_resolved(&self) -> bool {
        match &self.kind {
            TypeKind::Named(_) => false,
            TypeKind::Map(map) => map.value.is_resolved(),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "variant", content = "ref", rename_all = "snake_case")]
pub enum TypeKind {
    /// Go base type (`string`, `int64`, `byte`, ...) or an opaque type that is
    /// not declared in the analyzed stubs.
    Primitive(String),
    /// Reference by name to a message or enum; only exists until types are
    /// resolved.
    Named(String),
    Enum(EnumId),
    Message(MessageId),
    Map(Box<MapType>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapType {
    /// Always a base type name, e.g. `string` or `int64`.
    pub key: String,
    pub value: FieldType,
}

// ---------------- Enum ----------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enum {
    pub name: String,
}

// ---------------- Service ----------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Service {
    pub name: String,
    pub methods: Vec<ServiceMethod>,
}

impl Service {
    pub fn method(&self, name: &str) -> Option<&ServiceMethod> {
        self.methods.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceMethod {
    pub name: String,
    pub snake_name: String,
    pub request: FieldType,
    pub response: FieldType,
    pub bindings: Vec<HttpBinding>,
}

impl ServiceMethod {
    pub fn request_message<'d>(&self, definition: &'d Definition) -> Option<&'d Message> {
        self.request.message_id().map(|id| definition.message(id))
    }

    pub fn response_message<'d>(&self, definition: &'d Definition) -> Option<&'d Message> {
        self.response.message_id().map(|id| definition.message(id))
    }
}

// ---------------- HTTP ----------------

/// One HTTP verb + path mapping of a service method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpBinding {
    pub verb: HttpVerb,
    pub path: String,
    /// One entry per field of the request message, in field order.
    pub params: Vec<HttpParameter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Get,
    Put,
    Post,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpVerb {
    /// Verb for a key of a `google.api.HttpRule`, e.g. `get`.
    pub fn from_rule_key(key: &str) -> Option<Self> {
        match key {
            "get" => Some(Self::Get),
            "put" => Some(Self::Put),
            "post" => Some(Self::Post),
            "delete" => Some(Self::Delete),
            "patch" => Some(Self::Patch),
            _ => None,
        }
    }

    /// Verb for the `kind` of a custom pattern, e.g. `HEAD`.
    pub fn from_custom_kind(kind: &str) -> Option<Self> {
        match kind.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "PUT" => Some(Self::Put),
            "POST" => Some(Self::Post),
            "DELETE" => Some(Self::Delete),
            "PATCH" => Some(Self::Patch),
            "HEAD" => Some(Self::Head),
            "OPTIONS" => Some(Self::Options),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpParameter {
    /// Index into the request message's fields.
    pub field: usize,
    /// Go name of that field.
    pub name: String,
    pub location: ParamLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Body,
}

impl ParamLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Body => "body",
        }
    }
}

impl fmt::Display for ParamLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
