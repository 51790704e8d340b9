//! Extraction of HTTP mapping directives from proto IDL.
//!
//! Only services, their rpcs and the `(google.api.http)` options on those rpcs
//! are kept. Both spellings of the option are understood:
//!
//! ```proto
//! option (google.api.http) = { get: "/v1/{id}" additional_bindings { post: "/v1" body: "*" } };
//! option (google.api.http).get = "/v1/{id}";
//! ```

use crate::diagnostics::{Location, Position};
use crate::error::{Error, Result};
use crate::naming::unquote;
use pest::Parser as _;
use pest::iterators::Pair;
use svcdef_grammar::proto::{ProtoParser, Rule};

const HTTP_OPTION: &str = "(google.api.http)";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct IdlFile {
    pub package: Option<String>,
    pub services: Vec<IdlService>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdlService {
    pub name: String,
    pub rpcs: Vec<IdlRpc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdlRpc {
    pub name: String,
    /// Primary rule first, then each additional binding.
    pub http_rules: Vec<HttpRule>,
}

/// One binding of a `google.api.HttpRule`.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRule {
    pub pattern: Option<HttpPattern>,
    /// `*` for the whole request, a field name, or `None`.
    pub body: Option<String>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HttpPattern {
    /// `get: "/v1/..."` and friends; `key` is not validated here.
    Standard { key: String, path: String },
    /// `custom { kind: "HEAD" path: "/v1/..." }`
    Custom { kind: String, path: String },
}

impl HttpPattern {
    pub fn path(&self) -> &str {
        match self {
            HttpPattern::Standard { path, .. } | HttpPattern::Custom { path, .. } => path,
        }
    }
}

/// Value of an option, in text format.
#[derive(Debug, Clone, PartialEq)]
enum OptionValue {
    Scalar(String),
    Aggregate(Vec<OptionEntry>),
    List(Vec<OptionValue>),
}

#[derive(Debug, Clone, PartialEq)]
struct OptionEntry {
    key: String,
    value: OptionValue,
    position: Position,
}

impl OptionValue {
    fn as_scalar(&self) -> Option<&str> {
        match self {
            OptionValue::Scalar(s) => Some(s),
            _ => None,
        }
    }
}

/// Parses one IDL unit, keeping only what HTTP consolidation needs.
pub fn parse_idl_file(unit: &str, source: &str) -> Result<IdlFile> {
    let mut pairs = ProtoParser::parse(Rule::proto, source).map_err(|e| Error::from_pest(unit, e))?;
    let root = pairs
        .next()
        .ok_or_else(|| Error::syntax("expected proto root", Some(Location::unit(unit))))?;

    let mut file = IdlFile::default();
    for inner in root.into_inner() {
        if inner.as_rule() != Rule::proto_body {
            continue;
        }
        for b in inner.into_inner() {
            match b.as_rule() {
                Rule::package_statement => {
                    // package_statement = { "package" ~ package_name ~ ";" }
                    file.package = b
                        .into_inner()
                        .find(|p| p.as_rule() == Rule::package_name)
                        .map(|p| p.as_str().to_string());
                }
                Rule::top_level_definition => {
                    for def in b.into_inner() {
                        if def.as_rule() == Rule::service_block {
                            file.services.push(parse_service_block(def));
                        }
                    }
                }
                _ => {}
            }
        }
    }
    Ok(file)
}

fn parse_service_block(block: Pair<Rule>) -> IdlService {
    // service_block = { "service" ~ service_name ~ "{" ~ (option_statement | rpc)* ~ "}" }
    let mut service = IdlService {
        name: String::new(),
        rpcs: Vec::new(),
    };
    for p in block.into_inner() {
        match p.as_rule() {
            Rule::service_name => service.name = p.as_str().to_string(),
            Rule::rpc => service.rpcs.push(parse_rpc(p)),
            _ => {}
        }
    }
    service
}

fn parse_rpc(pair: Pair<Rule>) -> IdlRpc {
    let mut rpc = IdlRpc {
        name: String::new(),
        http_rules: Vec::new(),
    };
    // `option (google.api.http).<key> = ...` statements accumulate into a
    // single rule
    let mut dotted: Vec<OptionEntry> = Vec::new();
    let mut dotted_position = None;

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::rpc_name => rpc.name = p.as_str().to_string(),
            Rule::rpc_body => {
                for option in p.into_inner() {
                    if option.as_rule() != Rule::option_statement {
                        continue;
                    }
                    let position = Position::of(&option);
                    let (name, value) = parse_option_statement(option);
                    if name == HTTP_OPTION {
                        if let OptionValue::Aggregate(entries) = value {
                            rpc.http_rules.extend(http_rules(&entries, position));
                        }
                    } else if let Some(key) = name
                        .strip_prefix(HTTP_OPTION)
                        .and_then(|rest| rest.strip_prefix('.'))
                    {
                        dotted_position.get_or_insert(position);
                        dotted.push(OptionEntry {
                            key: key.to_string(),
                            value,
                            position,
                        });
                    }
                }
            }
            _ => {}
        }
    }
    if let Some(position) = dotted_position {
        rpc.http_rules.extend(http_rules(&dotted, position));
    }
    rpc
}

fn parse_option_statement(pair: Pair<Rule>) -> (String, OptionValue) {
    // option_statement = { "option" ~ option_name ~ "=" ~ option_value ~ ";" }
    let mut name = String::new();
    let mut value = OptionValue::Scalar(String::new());
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::option_name => name = option_name(p),
            Rule::option_value => {
                if let Some(inner) = p.into_inner().next() {
                    value = parse_value(inner);
                }
            }
            _ => {}
        }
    }
    (name, value)
}

/// Canonical text of an option name: `(google.api.http).get`.
fn option_name(pair: Pair<Rule>) -> String {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::option_name_part)
        .map(|part| match part.clone().into_inner().next() {
            Some(ext) if ext.as_rule() == Rule::extension_name => {
                format!("({})", ext.as_str().trim_start_matches('.'))
            }
            _ => part.as_str().to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn parse_value(pair: Pair<Rule>) -> OptionValue {
    match pair.as_rule() {
        Rule::aggregate_value => match pair.into_inner().next() {
            Some(inner) => parse_value(inner),
            None => OptionValue::Scalar(String::new()),
        },
        Rule::aggregate => OptionValue::Aggregate(
            pair.into_inner()
                .filter(|p| p.as_rule() == Rule::aggregate_entry)
                .map(parse_entry)
                .collect(),
        ),
        Rule::list_value => OptionValue::List(
            pair.into_inner()
                .filter(|p| p.as_rule() == Rule::aggregate_value)
                .map(parse_value)
                .collect(),
        ),
        Rule::constant => {
            let parts: Vec<Pair<Rule>> = pair.into_inner().collect();
            if parts.iter().all(|p| p.as_rule() == Rule::string_literal) && !parts.is_empty() {
                // Adjacent string literals concatenate
                OptionValue::Scalar(parts.iter().map(|p| unquote(p.as_str())).collect())
            } else {
                OptionValue::Scalar(parts.iter().map(|p| p.as_str()).collect())
            }
        }
        _ => OptionValue::Scalar(pair.as_str().to_string()),
    }
}

fn parse_entry(pair: Pair<Rule>) -> OptionEntry {
    // aggregate_entry = { aggregate_key ~ (":" ~ aggregate_value | aggregate) ~ ("," | ";")? }
    let position = Position::of(&pair);
    let mut key = String::new();
    let mut value = OptionValue::Scalar(String::new());
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::aggregate_key => key = p.as_str().to_string(),
            Rule::aggregate_value | Rule::aggregate => value = parse_value(p),
            _ => {}
        }
    }
    OptionEntry {
        key,
        value,
        position,
    }
}

/// Interprets the entries of a `google.api.HttpRule`: the primary rule comes
/// first, followed by every (flattened) additional binding.
fn http_rules(entries: &[OptionEntry], position: Position) -> Vec<HttpRule> {
    let mut primary = HttpRule {
        pattern: None,
        body: None,
        position,
    };
    let mut additional = Vec::new();

    for entry in entries {
        match entry.key.as_str() {
            "body" => primary.body = entry.value.as_scalar().map(str::to_string),
            "response_body" | "selector" => {}
            "additional_bindings" => match &entry.value {
                OptionValue::Aggregate(nested) => {
                    additional.extend(http_rules(nested, entry.position));
                }
                OptionValue::List(items) => {
                    for item in items {
                        if let OptionValue::Aggregate(nested) = item {
                            additional.extend(http_rules(nested, entry.position));
                        }
                    }
                }
                OptionValue::Scalar(_) => {}
            },
            "custom" => {
                if let OptionValue::Aggregate(custom) = &entry.value {
                    let lookup = |key: &str| {
                        custom
                            .iter()
                            .find(|e| e.key == key)
                            .and_then(|e| e.value.as_scalar())
                            .unwrap_or_default()
                            .to_string()
                    };
                    primary.pattern = Some(HttpPattern::Custom {
                        kind: lookup("kind"),
                        path: lookup("path"),
                    });
                    primary.position = entry.position;
                }
            }
            key => {
                primary.pattern = Some(HttpPattern::Standard {
                    key: key.to_string(),
                    path: entry.value.as_scalar().unwrap_or_default().to_string(),
                });
                primary.position = entry.position;
            }
        }
    }

    let mut rules = vec![primary];
    rules.extend(additional);
    rules
}
