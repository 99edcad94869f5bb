//! Canonical forms for content-type aware comparison
//!
//! Two payloads are structurally equal when their canonical forms are equal:
//! - JSON: parsed values, so key order and insignificant whitespace vanish
//! - XML: element trees keyed by namespace URI and local name, so prefix
//!   spelling, attribute order and indentation vanish
//! - Text: the body verbatim

use serde_json::Value;
use shared::{ContentType, SharedError, SharedResult};
use std::collections::BTreeMap;
use std::fmt;

/// Upper bound on reported differences per comparison
const MAX_DIFFS: usize = 10;

#[derive(Clone, Debug, PartialEq)]
pub enum Canonical {
    Text(String),
    Json(Value),
    Xml(XmlElement),
}

/// Attribute key: (namespace URI, local name)
pub type XmlAttributeKey = (Option<String>, String);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlElement {
    pub namespace: Option<String>,
    pub name: String,
    pub attributes: BTreeMap<XmlAttributeKey, String>,
    pub children: Vec<XmlNode>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

impl fmt::Display for XmlElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{ns}}}{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl XmlNode {
    fn describe(&self) -> String {
        match self {
            XmlNode::Element(element) => format!("element {element}"),
            XmlNode::Text(text) => format!("text {text:?}"),
        }
    }
}

impl Canonical {
    pub fn content_type(&self) -> ContentType {
        match self {
            Canonical::Text(_) => ContentType::Text,
            Canonical::Json(_) => ContentType::Json,
            Canonical::Xml(_) => ContentType::Xml,
        }
    }

    /// Human-readable differences between `self` (expected) and `observed`
    ///
    /// Returns an empty list when the forms are equal.
    pub fn differences(&self, observed: &Canonical) -> Vec<String> {
        let mut out = Vec::new();
        match (self, observed) {
            (Canonical::Json(expected), Canonical::Json(actual)) => {
                json_diff("$", expected, actual, &mut out);
            }
            (Canonical::Xml(expected), Canonical::Xml(actual)) => {
                if let Some(diff) = xml_diff("", expected, actual) {
                    out.push(diff);
                }
            }
            (Canonical::Text(expected), Canonical::Text(actual)) => {
                if let Some(diff) = text_diff(expected, actual) {
                    out.push(diff);
                }
            }
            (expected, actual) => out.push(format!(
                "expected {} content, got {} content",
                expected.content_type(),
                actual.content_type()
            )),
        }
        out
    }
}

/// Convert a raw body into its canonical form for `content_type`
pub fn to_canonical_form(raw: &str, content_type: ContentType) -> SharedResult<Canonical> {
    match content_type {
        ContentType::Text => Ok(Canonical::Text(raw.to_string())),
        ContentType::Json => serde_json::from_str(raw)
            .map(Canonical::Json)
            .map_err(|e| SharedError::MalformedPayload {
                content_type: content_type.to_string(),
                reason: e.to_string(),
            }),
        ContentType::Xml => {
            let document = roxmltree::Document::parse(raw).map_err(|e| SharedError::MalformedPayload {
                content_type: content_type.to_string(),
                reason: e.to_string(),
            })?;
            Ok(Canonical::Xml(canonical_element(document.root_element())))
        }
    }
}

fn canonical_element(node: roxmltree::Node<'_, '_>) -> XmlElement {
    let tag = node.tag_name();
    let attributes = node
        .attributes()
        .map(|attr| {
            (
                (attr.namespace().map(str::to_string), attr.name().to_string()),
                attr.value().to_string(),
            )
        })
        .collect();

    let mut children: Vec<XmlNode> = Vec::new();
    for child in node.children() {
        if child.is_element() {
            children.push(XmlNode::Element(canonical_element(child)));
        } else if child.is_text() {
            let text = child.text().unwrap_or_default().trim();
            if text.is_empty() {
                continue;
            }
            // Adjacent text (e.g. text followed by CDATA) collapses into one node
            if let Some(XmlNode::Text(previous)) = children.last_mut() {
                previous.push_str(text);
            } else {
                children.push(XmlNode::Text(text.to_string()));
            }
        }
    }

    XmlElement {
        namespace: tag.namespace().map(str::to_string),
        name: tag.name().to_string(),
        attributes,
        children,
    }
}

fn json_diff(path: &str, expected: &Value, actual: &Value, out: &mut Vec<String>) {
    if out.len() >= MAX_DIFFS {
        return;
    }

    match (expected, actual) {
        (Value::Object(e), Value::Object(a)) => {
            for (key, e_value) in e {
                let child = format!("{path}.{key}");
                match a.get(key) {
                    Some(a_value) => json_diff(&child, e_value, a_value, out),
                    None => out.push(format!("{child}: missing (expected {e_value})")),
                }
            }
            for (key, a_value) in a {
                if !e.contains_key(key) && out.len() < MAX_DIFFS {
                    out.push(format!("{path}.{key}: unexpected (got {a_value})"));
                }
            }
        }
        (Value::Array(e), Value::Array(a)) => {
            if e.len() != a.len() {
                out.push(format!("{path}: expected {} elements, got {}", e.len(), a.len()));
            }
            for (index, (e_item, a_item)) in e.iter().zip(a.iter()).enumerate() {
                json_diff(&format!("{path}[{index}]"), e_item, a_item, out);
            }
        }
        _ if expected != actual => out.push(format!("{path}: expected {expected}, got {actual}")),
        _ => {}
    }
}

fn xml_diff(parent: &str, expected: &XmlElement, actual: &XmlElement) -> Option<String> {
    if expected.namespace != actual.namespace || expected.name != actual.name {
        return Some(format!("{parent}/: expected element {expected}, got {actual}"));
    }

    let here = format!("{parent}/{}", expected.name);
    if expected.attributes != actual.attributes {
        return Some(format!(
            "{here}: attributes differ: expected {:?}, got {:?}",
            expected.attributes, actual.attributes
        ));
    }

    for (e_child, a_child) in expected.children.iter().zip(actual.children.iter()) {
        match (e_child, a_child) {
            (XmlNode::Element(e), XmlNode::Element(a)) => {
                if let Some(diff) = xml_diff(&here, e, a) {
                    return Some(diff);
                }
            }
            (XmlNode::Text(e), XmlNode::Text(a)) if e != a => {
                return Some(format!("{here}: expected text {e:?}, got {a:?}"));
            }
            (XmlNode::Text(_), XmlNode::Text(_)) => {}
            (e, a) => return Some(format!("{here}: expected {}, got {}", e.describe(), a.describe())),
        }
    }

    if expected.children.len() != actual.children.len() {
        return Some(format!(
            "{here}: expected {} child nodes, got {}",
            expected.children.len(),
            actual.children.len()
        ));
    }

    None
}

fn text_diff(expected: &str, actual: &str) -> Option<String> {
    if expected == actual {
        return None;
    }

    for (index, (e_line, a_line)) in expected.lines().zip(actual.lines()).enumerate() {
        if e_line != a_line {
            let column = e_line
                .chars()
                .zip(a_line.chars())
                .position(|(e, a)| e != a)
                .unwrap_or_else(|| e_line.chars().count().min(a_line.chars().count()))
                + 1;
            return Some(format!(
                "line {}, column {}: expected {:?}, got {:?}",
                index + 1,
                column,
                e_line,
                a_line
            ));
        }
    }

    let (e_lines, a_lines) = (expected.lines().count(), actual.lines().count());
    if e_lines != a_lines {
        return Some(format!("expected {e_lines} lines, got {a_lines}"));
    }

    Some("bodies differ in trailing whitespace".to_string())
}
