//! `pest` grammars for the two inputs of a service definition: Go stubs
//! generated by protoc-gen-go / the gRPC plugins, and the proto IDL they were
//! generated from.
//!
//! Each parser lives in its own module because `pest_derive` emits a `Rule`
//! enum next to the parser struct.

pub mod go {
    use pest_derive::Parser;

    #[derive(Parser)]
    #[grammar = "grammars/go_stub.pest"] // Path relative to src/
    pub struct GoStubParser;
}

pub mod proto {
    use pest_derive::Parser;

    #[derive(Parser)]
    #[grammar = "grammars/proto.pest"] // Path relative to src/
    pub struct ProtoParser;
}

pub use go::GoStubParser;
pub use proto::ProtoParser;

#[cfg(test)]
mod tests {
    use super::{go, proto};
    use pest::Parser;
    use pest::iterators::{Pair, Pairs};
    use pretty_assertions::assert_eq;

    const STUB: &str = r#"
// Code generated by protoc-gen-go. DO NOT EDIT.
// source: echo.proto

package echo

import (
	context "context"
	fmt "fmt"
	grpc "google.golang.org/grpc"
)

var _ = fmt.Errorf

type EchoRequest struct {
	Text                 string   `protobuf:"bytes,1,opt,name=text,proto3" json:"text,omitempty"`
	XXX_NoUnkeyedLiteral struct{} `json:"-"`
}

func (m *EchoRequest) GetText() string {
	if m != nil {
		return m.Text // braces in strings "}" and runes '}' are skipped
	}
	return ""
}

type Mode int32

const (
	Mode_PLAIN Mode = 0
)

type EchoServer interface {
	Echo(context.Context, *EchoRequest) (*EchoRequest, error)
}

type echoClient struct {
	cc *grpc.ClientConn
}
"#;

    fn go_stub(src: &str) -> Pairs<'_, go::Rule> {
        go::GoStubParser::parse(go::Rule::stub_file, src).expect("stub parsing failed")
    }

    fn type_names(pairs: Pairs<'_, go::Rule>) -> Vec<String> {
        pairs
            .flatten()
            .filter(|p| p.as_rule() == go::Rule::type_name)
            .map(|p| p.as_str().to_string())
            .collect()
    }

    #[test]
    fn parses_generated_stub_successfully() {
        let pairs = go_stub(STUB);
        let last_meaningful_pair = pairs.clone().flatten().last().unwrap().as_rule();
        assert_eq!(last_meaningful_pair, go::Rule::EOI);

        let package = pairs
            .clone()
            .flatten()
            .find(|p| p.as_rule() == go::Rule::package_name)
            .map(|p| p.as_str().to_string());
        assert_eq!(package.as_deref(), Some("echo"));
    }

    #[test]
    fn opaque_declarations_do_not_hide_type_declarations() {
        assert_eq!(
            type_names(go_stub(STUB)),
            vec!["EchoRequest", "Mode", "EchoServer", "echoClient"]
        );
    }

    #[test]
    fn grouped_type_declarations_are_structural() {
        let src = "package p\n\ntype (\n\tA int32\n\tB struct {\n\t\tC map[string]*A\n\t}\n)\n";
        assert_eq!(type_names(go_stub(src)), vec!["A", "B"]);
    }

    #[test]
    fn interface_methods_without_results_do_not_swallow_the_next_method() {
        let src = r#"package p

type FooServer interface {
	mustEmbed()
	Bar(context.Context, *Req) (*Resp, error)
	grpc.ServerStream
}
"#;
        let methods: Vec<String> = go_stub(src)
            .flatten()
            .filter(|p| p.as_rule() == go::Rule::method_name)
            .map(|p| p.as_str().to_string())
            .collect();
        assert_eq!(methods, vec!["mustEmbed", "Bar"]);

        let embedded = go_stub(src)
            .flatten()
            .filter(|p| p.as_rule() == go::Rule::embedded_iface)
            .count();
        assert_eq!(embedded, 1);
    }

    #[test]
    fn channel_types_are_structural() {
        let src = "package p\n\ntype Feed struct {\n\tIn chan *Event\n\tOut <-chan int32\n\tSink chan<- []byte\n\tchannel string\n}\n";
        let channels = go_stub(src)
            .flatten()
            .filter(|p| p.as_rule() == go::Rule::chan_type)
            .count();
        assert_eq!(channels, 3);
    }

    #[test]
    fn struct_tags_keep_their_raw_text() {
        let tag = go_stub(STUB)
            .flatten()
            .find(|p| p.as_rule() == go::Rule::tag)
            .map(|p: Pair<'_, go::Rule>| p.as_str().to_string());
        assert_eq!(
            tag.as_deref(),
            Some(r#"`protobuf:"bytes,1,opt,name=text,proto3" json:"text,omitempty"`"#)
        );
    }

    #[test]
    fn fails_on_invalid_stub_syntax() {
        let invalid = "package p\n\ntype Broken struct {\n\tName string\n";
        assert!(go::GoStubParser::parse(go::Rule::stub_file, invalid).is_err());

        let missing_package = "type A int32\n";
        assert!(go::GoStubParser::parse(go::Rule::stub_file, missing_package).is_err());
    }

    const IDL: &str = r#"
syntax = "proto3";

package echo.v1;

import "google/api/annotations.proto";

service Echo {
  // Echo returns the text.
  rpc Echo (EchoRequest) returns (EchoRequest) {
    option (google.api.http) = {
      get: "/v1/echo/{text}"
      additional_bindings {
        post: "/v1/echo"
        body: "*"
      }
    };
  }
  rpc Stream (stream EchoRequest) returns (stream EchoRequest);
}

message EchoRequest {
  string text = 1;
  map<string, int64> counts = 2 [deprecated = true];
  oneof kind {
    string a = 3;
  }
  reserved 4 to 6;
}

enum Mode {
  PLAIN = 0;
}
"#;

    #[test]
    fn parses_idl_with_http_annotations() {
        let pairs = proto::ProtoParser::parse(proto::Rule::proto, IDL).expect("idl parsing failed");
        let rpcs: Vec<String> = pairs
            .clone()
            .flatten()
            .filter(|p| p.as_rule() == proto::Rule::rpc_name)
            .map(|p| p.as_str().to_string())
            .collect();
        assert_eq!(rpcs, vec!["Echo", "Stream"]);

        let keys: Vec<String> = pairs
            .flatten()
            .filter(|p| p.as_rule() == proto::Rule::aggregate_key)
            .map(|p| p.as_str().to_string())
            .collect();
        assert_eq!(keys, vec!["get", "additional_bindings", "post", "body"]);
    }

    #[test]
    fn fails_on_invalid_idl_syntax() {
        let invalid = r#"
            syntax = "proto3";
            message Order {
                int32 id = 1
                string name = 2;
            }
        "#;
        assert!(proto::ProtoParser::parse(proto::Rule::proto, invalid).is_err());
    }
}
