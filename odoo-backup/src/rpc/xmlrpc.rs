//! Minimal XML-RPC codec: encodes parameterless method calls and decodes
//! `methodResponse` documents into [`Value`] trees.

use quick_xml::escape::{escape, resolve_predefined_entity};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XmlRpcError {
    #[error("invalid XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed XML-RPC response: {0}")]
    Malformed(String),
}

/// A decoded XML-RPC value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Boolean(bool),
    Double(f64),
    DateTime(String),
    Base64(String),
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
    Nil,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a member if this is a struct.
    pub fn member(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(members) => members.get(name),
            _ => None,
        }
    }
}

/// Outcome of a call: either the returned value or a server fault.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Success(Value),
    Fault { code: i64, message: String },
}

/// Encode a `methodCall` with no parameters.
pub fn encode_call(method: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?>\n<methodCall><methodName>{}</methodName><params></params></methodCall>",
        escape(method)
    )
}

/// Decode a `methodResponse` document.
pub fn parse_response(xml: &str) -> Result<Response, XmlRpcError> {
    let root = parse_tree(xml)?;
    if root.name != "methodResponse" {
        return Err(malformed(format!("unexpected root element <{}>", root.name)));
    }

    if let Some(fault) = root.child("fault") {
        let value = value_from_node(required(fault, "value")?)?;
        let code = match value.member("faultCode") {
            Some(Value::Int(code)) => *code,
            _ => 0,
        };
        let message = value
            .member("faultString")
            .and_then(Value::as_str)
            .unwrap_or("unknown fault")
            .to_string();
        return Ok(Response::Fault { code, message });
    }

    let params = required(&root, "params")?;
    let param = required(params, "param")?;
    let value = value_from_node(required(param, "value")?)?;
    Ok(Response::Success(value))
}

#[derive(Debug, Default)]
struct Node {
    name: String,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn from_start(start: &BytesStart<'_>) -> Self {
        Node {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            ..Default::default()
        }
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }
}

fn malformed(msg: impl Into<String>) -> XmlRpcError {
    XmlRpcError::Malformed(msg.into())
}

fn required<'a>(node: &'a Node, name: &str) -> Result<&'a Node, XmlRpcError> {
    node.child(name)
        .ok_or_else(|| malformed(format!("<{}> has no <{}>", node.name, name)))
}

/// Build an element tree; returns the document element.
fn parse_tree(xml: &str) -> Result<Node, XmlRpcError> {
    let mut reader = Reader::from_str(xml);
    let mut stack = vec![Node::default()];

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(Node::from_start(&start)),
            Event::Empty(start) => attach(&mut stack, Node::from_start(&start))?,
            Event::End(_) => {
                let node = stack.pop().ok_or_else(|| malformed("unbalanced end tag"))?;
                attach(&mut stack, node)?;
            }
            Event::Text(text) => {
                let decoded = text
                    .decode()
                    .map_err(|e| malformed(format!("bad text encoding: {e}")))?;
                push_text(&mut stack, &decoded);
            }
            Event::CData(data) => {
                let raw = data.into_inner();
                push_text(&mut stack, &String::from_utf8_lossy(&raw));
            }
            Event::GeneralRef(reference) => {
                let resolved = match reference.resolve_char_ref() {
                    Ok(Some(ch)) => ch.to_string(),
                    _ => {
                        let name = reference
                            .decode()
                            .map_err(|e| malformed(format!("bad entity: {e}")))?;
                        resolve_predefined_entity(&name)
                            .ok_or_else(|| malformed(format!("unknown entity &{name};")))?
                            .to_string()
                    }
                };
                push_text(&mut stack, &resolved);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(malformed("unexpected end of document"));
    }
    let document = stack.pop().unwrap_or_default();
    document
        .children
        .into_iter()
        .next()
        .ok_or_else(|| malformed("empty document"))
}

fn attach(stack: &mut [Node], node: Node) -> Result<(), XmlRpcError> {
    let parent = stack
        .last_mut()
        .ok_or_else(|| malformed("element outside of document"))?;
    parent.children.push(node);
    Ok(())
}

fn push_text(stack: &mut [Node], text: &str) {
    if let Some(top) = stack.last_mut() {
        top.text.push_str(text);
    }
}

fn value_from_node(node: &Node) -> Result<Value, XmlRpcError> {
    // <value>text</value> without a type element is a string
    let Some(typed) = node.children.first() else {
        return Ok(Value::String(node.text.clone()));
    };

    let text = typed.text.trim();
    let value = match typed.name.as_str() {
        "string" => Value::String(typed.text.clone()),
        "int" | "i4" | "i8" => Value::Int(
            text.parse()
                .map_err(|_| malformed(format!("invalid integer {text:?}")))?,
        ),
        "boolean" => match text {
            "1" => Value::Boolean(true),
            "0" => Value::Boolean(false),
            other => return Err(malformed(format!("invalid boolean {other:?}"))),
        },
        "double" => Value::Double(
            text.parse()
                .map_err(|_| malformed(format!("invalid double {text:?}")))?,
        ),
        "dateTime.iso8601" => Value::DateTime(text.to_string()),
        "base64" => Value::Base64(text.to_string()),
        "nil" => Value::Nil,
        "array" => {
            let data = required(typed, "data")?;
            let items = data
                .children
                .iter()
                .filter(|c| c.name == "value")
                .map(value_from_node)
                .collect::<Result<Vec<_>, _>>()?;
            Value::Array(items)
        }
        "struct" => {
            let mut members = BTreeMap::new();
            for member in typed.children.iter().filter(|c| c.name == "member") {
                let name = required(member, "name")?.text.clone();
                let value = value_from_node(required(member, "value")?)?;
                members.insert(name, value);
            }
            Value::Struct(members)
        }
        other => return Err(malformed(format!("unsupported value type <{other}>"))),
    };

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERSION_RESPONSE: &str = r#"<?xml version='1.0'?>
<methodResponse>
<params>
<param>
<value><struct>
<member>
<name>server_version</name>
<value><string>17.0</string></value>
</member>
<member>
<name>server_version_info</name>
<value><array><data>
<value><int>17</int></value>
<value><int>0</int></value>
<value><int>0</int></value>
<value><string>final</string></value>
<value><int>0</int></value>
<value><string></string></value>
</data></array></value>
</member>
<member>
<name>server_serie</name>
<value><string>17.0</string></value>
</member>
<member>
<name>protocol_version</name>
<value><int>1</int></value>
</member>
</struct></value>
</param>
</params>
</methodResponse>
"#;

    #[test]
    fn test_encode_call() {
        let body = encode_call("version");
        assert!(body.contains("<methodName>version</methodName>"));
        assert!(body.contains("<params></params>"));
    }

    #[test]
    fn test_parse_version_response() {
        let response = parse_response(VERSION_RESPONSE).unwrap();
        let Response::Success(value) = response else {
            panic!("expected success");
        };

        assert_eq!(value.member("server_version").and_then(Value::as_str), Some("17.0"));
        assert_eq!(value.member("protocol_version"), Some(&Value::Int(1)));

        let Some(Value::Array(info)) = value.member("server_version_info") else {
            panic!("expected array");
        };
        assert_eq!(info.len(), 6);
        assert_eq!(info[3], Value::String("final".to_string()));
        assert_eq!(info[5], Value::String(String::new()));
    }

    #[test]
    fn test_untyped_value_is_string() {
        let xml = "<methodResponse><params><param><value>16.0+e</value></param></params></methodResponse>";
        let response = parse_response(xml).unwrap();
        assert_eq!(response, Response::Success(Value::String("16.0+e".to_string())));
    }

    #[test]
    fn test_entities_are_resolved() {
        let xml = "<methodResponse><params><param><value><string>a &amp; b &#60;c&#62;</string></value></param></params></methodResponse>";
        let response = parse_response(xml).unwrap();
        assert_eq!(response, Response::Success(Value::String("a & b <c>".to_string())));
    }

    #[test]
    fn test_parse_fault() {
        let xml = r#"<?xml version="1.0"?>
<methodResponse><fault><value><struct>
<member><name>faultCode</name><value><int>1</int></value></member>
<member><name>faultString</name><value><string>Access Denied</string></value></member>
</struct></value></fault></methodResponse>"#;

        let response = parse_response(xml).unwrap();
        assert_eq!(
            response,
            Response::Fault {
                code: 1,
                message: "Access Denied".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_non_xmlrpc_documents() {
        assert!(parse_response("<html><body>502 Bad Gateway</body></html>").is_err());
        assert!(parse_response("<methodResponse><params></params></methodResponse>").is_err());
        assert!(parse_response("not xml at all <").is_err());
    }
}
