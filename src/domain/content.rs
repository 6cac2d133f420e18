//! Structured rich-text content as delivered by the CMS.
//!
//! The CMS stores block content as loosely typed JSON. It is lifted into a
//! closed tree so traversals are exhaustive: a leaf scalar, a node (which may
//! carry a `url` and ordered `children`), or an ordered sequence.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const TYPE_FIELD: &str = "type";
const URL_FIELD: &str = "url";
const CHILDREN_FIELD: &str = "children";

/// Type tags that mark a node as an image reference.
pub const IMAGE_NODE_TYPES: &[&str] = &["image", "img"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Content {
    Leaf(Value),
    Node(ContentNode),
    Sequence(Vec<Content>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentNode {
    pub kind: Option<String>,
    pub url: Option<String>,
    pub children: Option<Vec<Content>>,
    /// Every other field, untouched.
    pub attrs: Map<String, Value>,
}

impl ContentNode {
    pub fn is_image(&self) -> bool {
        self.url.is_some()
            && self
                .kind
                .as_deref()
                .is_some_and(|kind| IMAGE_NODE_TYPES.contains(&kind))
    }
}

impl From<Value> for Content {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Content::Sequence(items.into_iter().map(Content::from).collect()),
            Value::Object(map) => Content::Node(ContentNode::from(map)),
            scalar => Content::Leaf(scalar),
        }
    }
}

impl From<Map<String, Value>> for ContentNode {
    fn from(mut map: Map<String, Value>) -> Self {
        let kind = take_string(&mut map, TYPE_FIELD);
        let url = take_string(&mut map, URL_FIELD);
        let children = match map.remove(CHILDREN_FIELD) {
            Some(Value::Array(items)) => Some(items.into_iter().map(Content::from).collect()),
            Some(other) => {
                // Not a list; keep it as an ordinary field.
                map.insert(CHILDREN_FIELD.to_string(), other);
                None
            }
            None => None,
        };

        Self {
            kind,
            url,
            children,
            attrs: map,
        }
    }
}

fn take_string(map: &mut Map<String, Value>, field: &str) -> Option<String> {
    match map.remove(field) {
        Some(Value::String(value)) => Some(value),
        Some(other) => {
            map.insert(field.to_string(), other);
            None
        }
        None => None,
    }
}

impl From<Content> for Value {
    fn from(content: Content) -> Self {
        match content {
            Content::Leaf(value) => value,
            Content::Sequence(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Content::Node(node) => Value::Object(node.into()),
        }
    }
}

impl From<ContentNode> for Map<String, Value> {
    fn from(node: ContentNode) -> Self {
        let ContentNode {
            kind,
            url,
            children,
            mut attrs,
        } = node;

        if let Some(kind) = kind {
            attrs.insert(TYPE_FIELD.to_string(), Value::String(kind));
        }
        if let Some(url) = url {
            attrs.insert(URL_FIELD.to_string(), Value::String(url));
        }
        if let Some(children) = children {
            attrs.insert(
                CHILDREN_FIELD.to_string(),
                Value::Array(children.into_iter().map(Value::from).collect()),
            );
        }
        attrs
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_round_trip_is_lossless() {
        let raw = json!({
            "type": "doc",
            "children": [
                {"type": "paragraph", "children": [{"text": "hi", "bold": true}]},
                {"type": "image", "url": "https://cdn.example/a.png", "alt": "a"},
                "loose string",
                42
            ],
            "children_meta": {"url": "not-touched"}
        });

        let content = Content::from(raw.clone());
        assert_eq!(Value::from(content), raw);
    }

    #[test]
    fn non_string_url_stays_an_attribute() {
        let content = Content::from(json!({"type": "image", "url": null}));
        let Content::Node(node) = content else {
            panic!("expected node");
        };
        assert!(node.url.is_none());
        assert!(!node.is_image());
        assert_eq!(node.attrs.get("url"), Some(&Value::Null));
    }

    #[test]
    fn image_detection_requires_type_and_url() {
        let Content::Node(image) = Content::from(json!({"type": "img", "url": "/x.png"})) else {
            panic!("expected node");
        };
        assert!(image.is_image());

        let Content::Node(link) = Content::from(json!({"type": "link", "url": "/x"})) else {
            panic!("expected node");
        };
        assert!(!link.is_image());
    }

    #[test]
    fn serde_uses_plain_json_shape() {
        let content: Content =
            serde_json::from_str(r#"[{"type":"image","url":"/a.png"}]"#).expect("valid json");
        assert!(matches!(content, Content::Sequence(ref items) if items.len() == 1));
        let rendered = serde_json::to_string(&content).expect("serializes");
        assert_eq!(rendered, r#"[{"type":"image","url":"/a.png"}]"#);
    }
}
