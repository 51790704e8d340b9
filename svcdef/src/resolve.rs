//! Second pass: links by-name type references to the messages and enums of
//! the same definition.
//!
//! Runs after every unit has been analyzed, so forward, self and mutual
//! references need no special handling. A name matching neither table is an
//! opaque type (e.g. a well-known type from another package) and becomes a
//! primitive.

use crate::model::{Definition, EnumId, FieldType, MessageId, TypeKind};
use std::collections::HashMap;
use tracing::debug;

struct TypeIndex {
    messages: HashMap<String, MessageId>,
    enums: HashMap<String, EnumId>,
}

impl TypeIndex {
    fn new(definition: &Definition) -> Self {
        Self {
            messages: definition
                .messages
                .iter()
                .enumerate()
                .map(|(i, m)| (m.name.clone(), MessageId(i)))
                .collect(),
            enums: definition
                .enums
                .iter()
                .enumerate()
                .map(|(i, e)| (e.name.clone(), EnumId(i)))
                .collect(),
        }
    }

    fn lookup(&self, name: &str) -> TypeKind {
        if let Some(id) = self.messages.get(name) {
            TypeKind::Message(*id)
        } else if let Some(id) = self.enums.get(name) {
            TypeKind::Enum(*id)
        } else {
            TypeKind::Primitive(name.to_string())
        }
    }

    /// Returns how many references were linked to a message or enum.
    fn resolve(&self, ty: &mut FieldType) -> usize {
        match &mut ty.kind {
            TypeKind::Named(name) => {
                let resolved = self.lookup(name);
                let linked = usize::from(!matches!(resolved, TypeKind::Primitive(_)));
                ty.kind = resolved;
                linked
            }
            TypeKind::Map(map) => self.resolve(&mut map.value),
            _ => 0,
        }
    }
}

/// Replaces every [`TypeKind::Named`] in `definition` with a message handle,
/// an enum handle or a primitive. Cannot fail.
pub fn resolve_types(definition: &mut Definition) {
    let index = TypeIndex::new(definition);
    let mut linked = 0;

    for message in &mut definition.messages {
        for field in &mut message.fields {
            linked += index.resolve(&mut field.ty);
        }
    }
    if let Some(service) = &mut definition.service {
        for method in &mut service.methods {
            linked += index.resolve(&mut method.request);
            linked += index.resolve(&mut method.response);
        }
    }
    debug!(linked, "resolved type references");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Enum, Field, MapType, Message, Service, ServiceMethod};
    use pretty_assertions::assert_eq;

    fn field(name: &str, ty: FieldType) -> Field {
        Field {
            name: name.to_string(),
            wire_name: String::new(),
            ty,
        }
    }

    fn definition() -> Definition {
        Definition {
            package: "library".into(),
            pb_package: None,
            messages: vec![
                Message {
                    name: "Book".into(),
                    fields: vec![
                        field("Related", FieldType::named("Book").pointer().repeated()),
                        field("Shelf", FieldType::named("Shelf").pointer()),
                        field("Genre", FieldType::named("Genre")),
                        field("Published", FieldType::named("Timestamp").pointer()),
                        field(
                            "Labels",
                            FieldType::new(TypeKind::Map(Box::new(MapType {
                                key: "string".into(),
                                value: FieldType::named("Shelf").pointer(),
                            }))),
                        ),
                    ],
                },
                Message {
                    name: "Shelf".into(),
                    fields: vec![field("Books", FieldType::named("Book").pointer().repeated())],
                },
            ],
            enums: vec![Enum {
                name: "Genre".into(),
            }],
            service: Some(Service {
                name: "Library".into(),
                methods: vec![ServiceMethod {
                    name: "GetBook".into(),
                    snake_name: "get_book".into(),
                    request: FieldType::named("Shelf").pointer(),
                    response: FieldType::named("Book").pointer(),
                    bindings: Vec::new(),
                }],
            }),
        }
    }

    #[test]
    fn resolves_self_forward_and_mutual_references() {
        let mut def = definition();
        resolve_types(&mut def);

        let book = &def.messages[0];
        assert_eq!(book.fields[0].ty.kind, TypeKind::Message(MessageId(0)));
        assert!(book.fields[0].ty.pointer && book.fields[0].ty.repeated);
        assert_eq!(book.fields[1].ty.kind, TypeKind::Message(MessageId(1)));
        assert_eq!(book.fields[2].ty.kind, TypeKind::Enum(EnumId(0)));
        assert_eq!(def.messages[1].fields[0].ty.kind, TypeKind::Message(MessageId(0)));
    }

    #[test]
    fn unknown_names_become_primitives() {
        let mut def = definition();
        resolve_types(&mut def);
        assert_eq!(
            def.messages[0].fields[3].ty,
            FieldType::primitive("Timestamp").pointer()
        );
    }

    #[test]
    fn resolves_map_values_and_service_types() {
        let mut def = definition();
        resolve_types(&mut def);

        let labels = def.messages[0].fields[4].ty.map().expect("map");
        assert_eq!(labels.value, FieldType::new(TypeKind::Message(MessageId(1))).pointer());

        let method = &def.service.as_ref().unwrap().methods[0];
        assert_eq!(method.request.message_id(), Some(MessageId(1)));
        assert_eq!(method.response.message_id(), Some(MessageId(0)));
        assert!(def
            .messages
            .iter()
            .flat_map(|m| &m.fields)
            .all(|f| f.ty.is_resolved()));
    }

    #[test]
    fn resolution_is_deterministic() {
        let mut a = definition();
        let mut b = definition();
        resolve_types(&mut a);
        resolve_types(&mut b);
        assert_eq!(a, b);
    }
}
