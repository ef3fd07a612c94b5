//! Content-type negotiation for response bodies.
//!
//! # Design
//! The server often labels JSON as `text/plain`, so decoding runs a fallback
//! chain:
//! 1. `Content-Type` mentions `json` or `javascript` -> JSON.
//! 2. `Content-Type` mentions `xml` -> XML folded into a JSON mapping.
//! 3. Otherwise try JSON anyway, then fall back to the trimmed raw text.
//!
//! A body that fails to decode in steps 1 or 2 also ends up as raw text.
//!
//! XML folding: the root element's content becomes the result. Child
//! elements are keyed by tag name; a tag that repeats among siblings becomes
//! an array in document order. Attributes are keyed `@name`. An element
//! without attributes or children is its trimmed text. Text mixed with
//! children or attributes is kept under `#text` when non-blank.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};

use crate::http::HttpResponse;

/// Decode a response body according to its content type.
pub fn unwrap_response(response: &HttpResponse) -> Value {
    let content_type = response
        .header("Content-Type")
        .unwrap_or_default()
        .to_ascii_lowercase();
    let contents = response.body.trim();

    if content_type.contains("json") || content_type.contains("javascript") {
        return serde_json::from_str(contents).unwrap_or_else(|_| raw(contents));
    }
    if content_type.contains("xml") {
        return xml_to_value(contents).unwrap_or_else(|| raw(contents));
    }
    serde_json::from_str(contents).unwrap_or_else(|_| raw(contents))
}

fn raw(contents: &str) -> Value {
    Value::String(contents.to_string())
}

struct Frame {
    name: String,
    map: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Option<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut map = Map::new();
        for attr in start.attributes() {
            let attr = attr.ok()?;
            let key = format!("@{}", String::from_utf8_lossy(attr.key.as_ref()));
            let value = attr.unescape_value().ok()?.into_owned();
            map.insert(key, Value::String(value));
        }
        Some(Self {
            name,
            map,
            text: String::new(),
        })
    }

    fn close(self) -> (String, Value) {
        let text = self.text.trim();
        let value = if self.map.is_empty() {
            Value::String(text.to_string())
        } else {
            let mut map = self.map;
            if !text.is_empty() {
                map.insert("#text".to_string(), Value::String(text.to_string()));
            }
            Value::Object(map)
        };
        (self.name, value)
    }
}

fn insert_child(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(key, value);
        }
    }
}

/// Fold an XML document into a JSON value; `None` if it is not well formed.
pub fn xml_to_value(xml: &str) -> Option<Value> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        match reader.read_event().ok()? {
            Event::Start(start) => stack.push(Frame::open(&start)?),
            Event::Empty(start) => {
                let (name, value) = Frame::open(&start)?.close();
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.map, name, value),
                    None => root = Some(value),
                }
            }
            Event::Text(text) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text.unescape().ok()?);
                }
            }
            Event::CData(data) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::End(_) => {
                let (name, value) = stack.pop()?.close();
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.map, name, value),
                    None => root = Some(value),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return None;
    }
    root
}
