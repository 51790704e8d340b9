//! Closed syntax tree for generated Go stubs.
//!
//! The grammar only recognizes a fixed set of shapes: named types, pointers,
//! slices/arrays, maps, channels, structs, interfaces and func types. Anything
//! the analyzer cannot map onto the IR is reported against one of these variants
//! instead of being silently misread.

use crate::diagnostics::{Location, Position};
use crate::error::{Error, Result};
use crate::naming::unquote;
use pest::Parser as _;
use pest::iterators::Pair;
use svcdef_grammar::go::{GoStubParser, Rule};

#[derive(Debug, Clone, PartialEq)]
pub struct StubFile {
    pub package: String,
    pub types: Vec<TypeSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpec {
    pub name: String,
    pub ty: TypeExpr,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// `name` or `qualifier.name`, with optional generic arguments.
    Named {
        qualifier: Option<String>,
        name: String,
        args: Vec<TypeExpr>,
    },
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    Array(Box<TypeExpr>),
    Map {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
    },
    Struct(Vec<StructField>),
    Interface(Vec<InterfaceElem>),
    Func(Signature),
    /// `chan T`, `<-chan T` or `chan<- T`; the direction is dropped.
    Chan(Box<TypeExpr>),
}

impl TypeExpr {
    /// Short description of the shape, used in error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            TypeExpr::Named { .. } => "named type",
            TypeExpr::Pointer(_) => "pointer",
            TypeExpr::Slice(_) => "slice",
            TypeExpr::Array(_) => "array",
            TypeExpr::Map { .. } => "map",
            TypeExpr::Struct(_) => "struct",
            TypeExpr::Interface(_) => "interface",
            TypeExpr::Func(_) => "func",
            TypeExpr::Chan(_) => "channel",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    /// Empty for embedded fields.
    pub names: Vec<String>,
    pub ty: TypeExpr,
    /// Tag text without its quotes.
    pub tag: Option<String>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterfaceElem {
    Method(MethodSpec),
    Embedded(TypeExpr, Position),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSpec {
    pub name: String,
    pub signature: Signature,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    pub params: Vec<Param>,
    pub results: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: TypeExpr,
    pub variadic: bool,
    pub position: Position,
}

/// Parses one generated stub unit.
pub fn parse_stub_file(unit: &str, source: &str) -> Result<StubFile> {
    let mut pairs =
        GoStubParser::parse(Rule::stub_file, source).map_err(|e| Error::from_pest(unit, e))?;
    let root = pairs
        .next()
        .ok_or_else(|| Error::syntax("expected a Go source file", Some(Location::unit(unit))))?;

    let mut file = StubFile {
        package: String::new(),
        types: Vec::new(),
    };
    for inner in root.into_inner() {
        match inner.as_rule() {
            Rule::package_clause => {
                // package_clause = { "package" ~ package_name }
                file.package = inner
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::package_name)
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default();
            }
            Rule::type_decl => {
                for spec in inner.into_inner() {
                    if spec.as_rule() == Rule::type_spec {
                        file.types.push(parse_type_spec(spec));
                    }
                }
            }
            _ => {}
        }
    }
    Ok(file)
}

fn parse_type_spec(pair: Pair<Rule>) -> TypeSpec {
    // type_spec = { type_name ~ "="? ~ type_expr }
    let position = Position::of(&pair);
    let mut name = String::new();
    let mut ty = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::type_name => name = p.as_str().to_string(),
            Rule::type_expr => ty = Some(parse_type_expr(p)),
            _ => {}
        }
    }
    TypeSpec {
        name,
        ty: ty.unwrap_or_else(|| named(None, "")),
        position,
    }
}

fn named(qualifier: Option<String>, name: &str) -> TypeExpr {
    TypeExpr::Named {
        qualifier,
        name: name.to_string(),
        args: Vec::new(),
    }
}

/// Lowers a `type_expr` pair, or any of its alternatives, into a [`TypeExpr`].
fn parse_type_expr(pair: Pair<Rule>) -> TypeExpr {
    match pair.as_rule() {
        Rule::type_expr => match pair.into_inner().next() {
            Some(inner) => parse_type_expr(inner),
            None => named(None, ""),
        },
        Rule::pointer_type => TypeExpr::Pointer(Box::new(first_type(pair))),
        Rule::slice_type => TypeExpr::Slice(Box::new(first_type(pair))),
        Rule::array_type => TypeExpr::Array(Box::new(first_type(pair))),
        Rule::map_type => {
            // map_type = { "map" ~ "[" ~ type_expr ~ "]" ~ type_expr }
            let mut types = pair
                .into_inner()
                .filter(|p| p.as_rule() == Rule::type_expr)
                .map(parse_type_expr);
            let key = types.next().unwrap_or_else(|| named(None, ""));
            let value = types.next().unwrap_or_else(|| named(None, ""));
            TypeExpr::Map {
                key: Box::new(key),
                value: Box::new(value),
            }
        }
        Rule::struct_type => TypeExpr::Struct(
            pair.into_inner()
                .filter(|p| p.as_rule() == Rule::field_decl)
                .map(parse_field_decl)
                .collect(),
        ),
        Rule::interface_type => TypeExpr::Interface(
            pair.into_inner()
                .filter_map(|p| match p.as_rule() {
                    Rule::method_spec => Some(InterfaceElem::Method(parse_method_spec(p))),
                    Rule::embedded_iface => {
                        let position = Position::of(&p);
                        Some(InterfaceElem::Embedded(first_type(p), position))
                    }
                    _ => None,
                })
                .collect(),
        ),
        Rule::func_type => pair
            .into_inner()
            .find(|p| p.as_rule() == Rule::signature)
            .map(parse_signature)
            .map(TypeExpr::Func)
            .unwrap_or_else(|| TypeExpr::Func(Signature::default())),
        Rule::chan_type => TypeExpr::Chan(Box::new(first_type(pair))),
        Rule::named_type => {
            // named_type = { qualified_ident ~ type_args? }
            let mut result = named(None, "");
            let mut args = Vec::new();
            for p in pair.into_inner() {
                match p.as_rule() {
                    Rule::qualified_ident => result = parse_qualified_ident(p),
                    Rule::type_args => {
                        args = p
                            .into_inner()
                            .filter(|a| a.as_rule() == Rule::type_expr)
                            .map(parse_type_expr)
                            .collect();
                    }
                    _ => {}
                }
            }
            if let TypeExpr::Named { args: slot, .. } = &mut result {
                *slot = args;
            }
            result
        }
        Rule::qualified_ident => parse_qualified_ident(pair),
        _ => named(None, pair.as_str()),
    }
}

fn first_type(pair: Pair<Rule>) -> TypeExpr {
    pair.into_inner()
        .find(|p| p.as_rule() == Rule::type_expr)
        .map(parse_type_expr)
        .unwrap_or_else(|| named(None, ""))
}

fn parse_qualified_ident(pair: Pair<Rule>) -> TypeExpr {
    // qualified_ident = ${ ident ~ ("." ~ ident)? }
    let idents: Vec<&str> = pair
        .into_inner()
        .filter(|p| p.as_rule() == Rule::ident)
        .map(|p| p.as_str())
        .collect();
    match idents.as_slice() {
        [qualifier, name] => named(Some(qualifier.to_string()), name),
        [name] => named(None, name),
        _ => named(None, ""),
    }
}

fn parse_field_decl(pair: Pair<Rule>) -> StructField {
    // field_decl = { (field_names ~ type_expr | embedded_field) ~ tag? }
    let position = Position::of(&pair);
    let mut field = StructField {
        names: Vec::new(),
        ty: named(None, ""),
        tag: None,
        position,
    };
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::field_names => {
                field.names = p
                    .into_inner()
                    .filter(|n| n.as_rule() == Rule::ident)
                    .map(|n| n.as_str().to_string())
                    .collect();
            }
            Rule::type_expr => field.ty = parse_type_expr(p),
            Rule::embedded_field => {
                let mut pointer = false;
                let mut ty = named(None, "");
                for e in p.into_inner() {
                    match e.as_rule() {
                        Rule::pointer_marker => pointer = true,
                        Rule::qualified_ident => ty = parse_qualified_ident(e),
                        _ => {}
                    }
                }
                field.ty = if pointer {
                    TypeExpr::Pointer(Box::new(ty))
                } else {
                    ty
                };
            }
            Rule::tag => field.tag = Some(unquote(p.as_str())),
            _ => {}
        }
    }
    field
}

fn parse_method_spec(pair: Pair<Rule>) -> MethodSpec {
    // method_spec = { method_name ~ signature }
    let position = Position::of(&pair);
    let mut method = MethodSpec {
        name: String::new(),
        signature: Signature::default(),
        position,
    };
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::method_name => method.name = p.as_str().to_string(),
            Rule::signature => method.signature = parse_signature(p),
            _ => {}
        }
    }
    method
}

fn parse_signature(pair: Pair<Rule>) -> Signature {
    // signature = { parameters ~ result? }
    // result    = { parameters | type_expr ~ !"(" }
    let mut signature = Signature::default();
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::parameters => signature.params = parse_parameters(p),
            Rule::result => {
                let position = Position::of(&p);
                if let Some(inner) = p.into_inner().next() {
                    signature.results = match inner.as_rule() {
                        Rule::parameters => parse_parameters(inner),
                        _ => vec![Param {
                            ty: parse_type_expr(inner),
                            variadic: false,
                            position,
                        }],
                    };
                }
            }
            _ => {}
        }
    }
    signature
}

fn parse_parameters(pair: Pair<Rule>) -> Vec<Param> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::param)
        .map(|p| {
            // param = { param_name ~ variadic? ~ type_expr | variadic? ~ type_expr }
            let mut param = Param {
                ty: named(None, ""),
                variadic: false,
                position: Position::of(&p),
            };
            for inner in p.into_inner() {
                match inner.as_rule() {
                    Rule::variadic => param.variadic = true,
                    Rule::type_expr => param.ty = parse_type_expr(inner),
                    _ => {}
                }
            }
            param
        })
        .collect()
}
