//! Third pass: attaches the HTTP bindings declared in the proto IDL to the
//! methods of the resolved service.

use crate::diagnostics::Location;
use crate::error::{Error, Result};
use crate::idl::{self, HttpPattern, HttpRule};
use crate::model::{Definition, Field, HttpBinding, HttpParameter, HttpVerb, ParamLocation};
use tracing::{debug, trace};

/// What `body:` of a rule selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodySelector {
    None,
    /// `body: "*"`
    All,
    Field(usize),
}

/// Parses every IDL unit and merges the `(google.api.http)` rules of the
/// service named like the definition's service onto its methods.
///
/// Units are parsed even when the definition has no service, so a broken IDL
/// unit is always reported.
pub fn consolidate<I, K, V>(definition: &mut Definition, units: I) -> Result<()>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    for (unit, source) in units {
        let unit = unit.as_ref();
        let file = idl::parse_idl_file(unit, source.as_ref())
            .map_err(|e| e.context(format!("cannot parse proto file {unit:?}")))?;
        consolidate_file(definition, unit, &file)?;
    }
    Ok(())
}

fn consolidate_file(definition: &mut Definition, unit: &str, file: &idl::IdlFile) -> Result<()> {
    let Some(service_name) = definition.service.as_ref().map(|s| s.name.clone()) else {
        return Ok(());
    };

    for service in file.services.iter().filter(|s| s.name == service_name) {
        debug!(unit, service = %service.name, rpcs = service.rpcs.len(), "consolidating service");
        if file.package.is_some() {
            definition.pb_package = file.package.clone();
        }

        let mut attached = Vec::new();
        for rpc in &service.rpcs {
            let Some(index) = definition
                .service
                .as_ref()
                .and_then(|s| s.methods.iter().position(|m| m.name == rpc.name))
            else {
                trace!(rpc = %rpc.name, "no method for rpc; ignoring");
                continue;
            };
            let bindings = rpc
                .http_rules
                .iter()
                .map(|rule| binding(definition, index, unit, rule))
                .collect::<Result<Vec<_>>>()
                .map_err(|e| e.context(format!("cannot consolidate method {:?}", rpc.name)))?;
            attached.push((index, bindings));
        }

        if let Some(target) = &mut definition.service {
            for (index, bindings) in attached {
                let method = &mut target.methods[index];
                debug!(method = %method.name, bindings = bindings.len(), "attached http bindings");
                method.bindings.extend(bindings);
            }
        }
    }
    Ok(())
}

fn binding(
    definition: &Definition,
    method: usize,
    unit: &str,
    rule: &HttpRule,
) -> Result<HttpBinding> {
    let location = Some(Location::new(unit, rule.position));
    let fail = |message: String| Error::consolidation(message, location.clone());

    let pattern = rule
        .pattern
        .as_ref()
        .ok_or_else(|| fail("http rule declares no verb and path".to_string()))?;
    let verb = match pattern {
        HttpPattern::Standard { key, .. } => HttpVerb::from_rule_key(key)
            .ok_or_else(|| fail(format!("unsupported HTTP verb {key:?}")))?,
        HttpPattern::Custom { kind, .. } => HttpVerb::from_custom_kind(kind)
            .ok_or_else(|| fail(format!("unsupported custom HTTP verb {kind:?}")))?,
    };
    let path = pattern.path();

    let Some(service) = &definition.service else {
        return Err(fail("no service to bind to".to_string()));
    };
    let request = &service.methods[method].request;
    let request_name = definition.type_name(request);
    // An unresolved request type has no fields, so any placeholder fails below
    let fields: &[Field] = request
        .message_id()
        .map(|id| definition.message(id).fields.as_slice())
        .unwrap_or_default();
    let find = |ident: &str| fields.iter().position(|f| f.is_named(ident));

    let mut path_fields = Vec::new();
    for placeholder in path_placeholders(path).map_err(fail)? {
        let index = find(placeholder).ok_or_else(|| {
            fail(format!(
                "path placeholder {placeholder:?} does not name a field of request message {request_name:?}"
            ))
        })?;
        path_fields.push(index);
    }

    let body = match rule.body.as_deref() {
        None | Some("") => BodySelector::None,
        Some("*") => BodySelector::All,
        Some(name) => BodySelector::Field(find(name).ok_or_else(|| {
            fail(format!(
                "body {name:?} does not name a field of request message {request_name:?}"
            ))
        })?),
    };

    let params = fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let location = if path_fields.contains(&i) {
                ParamLocation::Path
            } else {
                match body {
                    BodySelector::All => ParamLocation::Body,
                    BodySelector::Field(j) if j == i => ParamLocation::Body,
                    _ => ParamLocation::Query,
                }
            };
            HttpParameter {
                field: i,
                name: field.name.clone(),
                location,
            }
        })
        .collect();

    Ok(HttpBinding {
        verb,
        path: path.to_string(),
        params,
    })
}

/// Names of the `{...}` placeholders of a path template, with any `=pattern`
/// suffix stripped: `/v1/{name=shelves/*}/books/{id}` yields `name`, `id`.
fn path_placeholders(path: &str) -> std::result::Result<Vec<&str>, String> {
    let mut placeholders = Vec::new();
    let mut rest = path;
    while let Some(open) = rest.find(['{', '}']) {
        if rest[open..].starts_with('}') {
            return Err(format!("unbalanced '}}' in path template {path:?}"));
        }
        let after = &rest[open + 1..];
        let close = after
            .find(['{', '}'])
            .filter(|&i| after[i..].starts_with('}'))
            .ok_or_else(|| format!("unterminated placeholder in path template {path:?}"))?;
        let name = after[..close].split('=').next().unwrap_or_default().trim();
        if name.is_empty() {
            return Err(format!("empty placeholder in path template {path:?}"));
        }
        placeholders.push(name);
        rest = &after[close + 1..];
    }
    Ok(placeholders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::{FieldType, Message, MessageId, Service, ServiceMethod, TypeKind};
    use heck::ToSnakeCase;
    use pretty_assertions::assert_eq;

    fn field(name: &str, wire_name: &str, ty: FieldType) -> Field {
        Field {
            name: name.into(),
            wire_name: wire_name.into(),
            ty,
        }
    }

    fn method(name: &str, request: usize) -> ServiceMethod {
        ServiceMethod {
            name: name.into(),
            snake_name: name.to_snake_case(),
            request: FieldType::new(TypeKind::Message(MessageId(request))).pointer(),
            response: FieldType::new(TypeKind::Message(MessageId(2))).pointer(),
            bindings: Vec::new(),
        }
    }

    fn definition() -> Definition {
        Definition {
            package: "items".into(),
            pb_package: None,
            messages: vec![
                Message {
                    name: "GetItemRequest".into(),
                    fields: vec![
                        field("Id", "id", FieldType::primitive("string")),
                        field("Name", "name", FieldType::primitive("string")),
                    ],
                },
                Message {
                    name: "CreateItemRequest".into(),
                    fields: vec![field(
                        "Payload",
                        "payload",
                        FieldType::new(TypeKind::Message(MessageId(2))).pointer(),
                    )],
                },
                Message {
                    name: "Item".into(),
                    fields: vec![
                        field("ShelfId", "", FieldType::primitive("string")),
                        field("Title", "title", FieldType::primitive("string")),
                    ],
                },
            ],
            enums: Vec::new(),
            service: Some(Service {
                name: "Items".into(),
                methods: vec![
                    method("GetItem", 0),
                    method("CreateItem", 1),
                    method("UpdateItem", 2),
                ],
            }),
        }
    }

    fn idl(rpcs: &str) -> String {
        format!(
            "syntax = \"proto3\";\npackage items.v1;\nservice Items {{\n{rpcs}\n}}\nservice Other {{\n  rpc GetItem(A) returns (B) {{ option (google.api.http) = {{ get: \"/{{bogus}}\" }}; }}\n}}\n"
        )
    }

    fn consolidated(rpcs: &str) -> Result<Definition> {
        let mut def = definition();
        consolidate(&mut def, [("items.proto", idl(rpcs))])?;
        Ok(def)
    }

    fn locations(def: &Definition, method: usize, binding: usize) -> Vec<(String, ParamLocation)> {
        def.service.as_ref().unwrap().methods[method].bindings[binding]
            .params
            .iter()
            .map(|p| (p.name.clone(), p.location))
            .collect()
    }

    #[test]
    fn path_placeholder_and_query_fields() {
        let def = consolidated(
            r#"rpc GetItem(GetItemRequest) returns (Item) { option (google.api.http) = { get: "/v1/items/{id}" }; }"#,
        )
        .expect("consolidation failed");
        let binding = &def.service.as_ref().unwrap().methods[0].bindings[0];
        assert_eq!(binding.verb, HttpVerb::Get);
        assert_eq!(binding.path, "/v1/items/{id}");
        assert_eq!(
            locations(&def, 0, 0),
            vec![
                ("Id".to_string(), ParamLocation::Path),
                ("Name".to_string(), ParamLocation::Query),
            ]
        );
        assert_eq!(def.pb_package.as_deref(), Some("items.v1"));
    }

    #[test]
    fn wildcard_body_takes_every_non_path_field() {
        let def = consolidated(
            r#"rpc CreateItem(CreateItemRequest) returns (Item) { option (google.api.http) = { post: "/v1/items" body: "*" }; }"#,
        )
        .expect("consolidation failed");
        assert_eq!(locations(&def, 1, 0), vec![("Payload".to_string(), ParamLocation::Body)]);
    }

    #[test]
    fn named_body_and_snake_case_placeholders() {
        let def = consolidated(
            r#"rpc UpdateItem(Item) returns (Item) {
                 option (google.api.http) = {
                   put: "/v1/shelves/{shelf_id=shelves/*}"
                   body: "title"
                   additional_bindings { custom { kind: "HEAD" path: "/v1/{ShelfId}" } }
                 };
               }"#,
        )
        .expect("consolidation failed");
        let method = &def.service.as_ref().unwrap().methods[2];
        assert_eq!(method.bindings.len(), 2);
        assert_eq!(method.bindings[1].verb, HttpVerb::Head);
        assert_eq!(
            locations(&def, 2, 0),
            vec![
                ("ShelfId".to_string(), ParamLocation::Path),
                ("Title".to_string(), ParamLocation::Body),
            ]
        );
        assert_eq!(
            locations(&def, 2, 1),
            vec![
                ("ShelfId".to_string(), ParamLocation::Path),
                ("Title".to_string(), ParamLocation::Query),
            ]
        );
    }

    #[test]
    fn unknown_placeholder_is_fatal() {
        let err = consolidated(
            r#"rpc GetItem(GetItemRequest) returns (Item) { option (google.api.http) = { get: "/v1/items/{item_id}" }; }"#,
        )
        .expect_err("placeholder should not match");
        assert_eq!(err.kind(), ErrorKind::Consolidation);
        assert!(err.message().contains("\"item_id\""), "{err}");
        assert_eq!(err.constructs(), vec!["cannot consolidate method \"GetItem\""]);
        let location = err.location().expect("location");
        assert_eq!(location.unit, "items.proto");
        assert_eq!(location.position.map(|p| p.line), Some(4));
    }

    #[test]
    fn unsupported_verb_and_missing_body_field_are_fatal() {
        let err = consolidated(
            r#"rpc GetItem(GetItemRequest) returns (Item) { option (google.api.http) = { fetch: "/v1/items" }; }"#,
        )
        .expect_err("verb should be rejected");
        assert!(err.message().contains("\"fetch\""), "{err}");

        let err = consolidated(
            r#"rpc GetItem(GetItemRequest) returns (Item) { option (google.api.http) = { post: "/v1/items" body: "nope" }; }"#,
        )
        .expect_err("body should be rejected");
        assert_eq!(err.kind(), ErrorKind::Consolidation);
        assert!(err.message().contains("\"nope\""), "{err}");
    }

    #[test]
    fn unmatched_rpcs_and_plain_methods() {
        let def = consolidated(
            r#"rpc Missing(GetItemRequest) returns (Item) { option (google.api.http) = { get: "/v1/{bogus}" }; }
               rpc GetItem(GetItemRequest) returns (Item);"#,
        )
        .expect("consolidation failed");
        assert!(def
            .service
            .as_ref()
            .unwrap()
            .methods
            .iter()
            .all(|m| m.bindings.is_empty()));
    }

    #[test]
    fn no_service_is_a_no_op() {
        let mut def = definition();
        def.service = None;
        consolidate(&mut def, [("items.proto", idl(""))]).expect("consolidation failed");
        assert_eq!(def.pb_package, None);

        let err = consolidate(&mut def, [("broken.proto", "service {")]).expect_err("syntax error");
        assert_eq!(err.kind(), ErrorKind::Syntax);
    }

    #[test]
    fn splits_path_templates() {
        assert_eq!(
            path_placeholders("/v1/{name=shelves/*}/books/{id}:get"),
            Ok(vec!["name", "id"])
        );
        assert_eq!(path_placeholders("/v1/items"), Ok(vec![]));
        assert!(path_placeholders("/v1/{id").is_err());
        assert!(path_placeholders("/v1/{a{b}}").is_err());
        assert!(path_placeholders("/v1/id}").is_err());
        assert!(path_placeholders("/v1/{}").is_err());
    }
}
