//! Name conversions and struct-tag lookups shared by the analyzers.

/// Whether a Go identifier is exported.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// Looks up `key` in a Go struct tag (`json:"id,omitempty" protobuf:"..."`),
/// following the conventions of `reflect.StructTag.Get`.
pub fn struct_tag_value<'t>(tag: &'t str, key: &str) -> Option<&'t str> {
    let mut rest = tag;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return None;
        }
        let colon = rest.find(':')?;
        let name = &rest[..colon];
        if name.is_empty() || name.contains(|c: char| c <= ' ' || c == '"') {
            return None;
        }
        let quoted = rest[colon + 1..].strip_prefix('"')?;
        let mut end = None;
        let mut escaped = false;
        for (i, c) in quoted.char_indices() {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => {
                    end = Some(i);
                    break;
                }
                _ => {}
            }
        }
        let end = end?;
        if name == key {
            return Some(&quoted[..end]);
        }
        rest = &quoted[end + 1..];
    }
}

/// Field name as written in the .proto file, recovered from a struct tag: the
/// first entry of the `json` key, or the `name=` entry of the `protobuf` key.
pub fn wire_name_from_tag(tag: &str) -> String {
    if let Some(json) = struct_tag_value(tag, "json") {
        let first = json.split(',').next().unwrap_or_default();
        return if first == "-" {
            String::new()
        } else {
            first.to_string()
        };
    }
    struct_tag_value(tag, "protobuf")
        .and_then(|pb| pb.split(',').find_map(|part| part.strip_prefix("name=")))
        .map(str::to_string)
        .unwrap_or_default()
}

/// Strips the quotes of a Go raw (`` `...` ``) or interpreted (`"..."`)
/// string literal, or of a proto string literal (`"..."` / `'...'`).
pub fn unquote(literal: &str) -> String {
    if let Some(raw) = literal
        .strip_prefix('`')
        .and_then(|s| s.strip_suffix('`'))
    {
        return raw.to_string();
    }
    let inner = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| literal.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(literal);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_struct_tag_keys() {
        let tag = r#"protobuf:"bytes,1,opt,name=snake_case,json=snakeCase,proto3" json:"snake_case,omitempty""#;
        assert_eq!(struct_tag_value(tag, "json"), Some("snake_case,omitempty"));
        assert_eq!(
            struct_tag_value(tag, "protobuf"),
            Some("bytes,1,opt,name=snake_case,json=snakeCase,proto3")
        );
        assert_eq!(struct_tag_value(tag, "yaml"), None);
        assert_eq!(struct_tag_value("broken", "json"), None);
    }

    #[test]
    fn wire_name_prefers_json_then_protobuf_name() {
        assert_eq!(
            wire_name_from_tag(r#"protobuf:"bytes,1,opt,name=text,proto3" json:"text,omitempty""#),
            "text"
        );
        assert_eq!(
            wire_name_from_tag(r#"protobuf:"bytes,6,opt,name=isbn,proto3,oneof""#),
            "isbn"
        );
        assert_eq!(wire_name_from_tag(r#"json:"-""#), "");
        assert_eq!(wire_name_from_tag(""), "");
    }

    #[test]
    fn unquotes_literals() {
        assert_eq!(unquote(r#"`json:"a"`"#), r#"json:"a""#);
        assert_eq!(unquote(r#""/v1/{id}""#), "/v1/{id}");
        assert_eq!(unquote(r#"'say \'hi\''"#), "say 'hi'");
        assert_eq!(unquote(r#""a\"b""#), "a\"b");
    }
}
