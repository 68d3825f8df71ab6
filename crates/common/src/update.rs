//! Node updates and the a2ui rich-content tree.
//!
//! A [`NodeUpdate`] is one unit of output from a capability: a human-readable
//! string and, optionally, a typed rich-content payload. The payload is a
//! recursive tree of typed nodes. Node types this crate does not know are kept
//! as raw JSON and re-serialised verbatim so consumers can render them as data.

use serde::{Deserialize, Deserializer, Serialize};

/// Schema tag every recognised rich payload declares at its root.
pub const A2UI_SCHEMA: &str = "a2ui";

/// Version written by the builders in this workspace.
pub const A2UI_VERSION: &str = "0.1";

/// One unit of output produced by a capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeUpdate {
    /// Human-readable output.
    pub output: String,

    /// Optional structured rendering of the same result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a2ui: Option<RichContent>,
}

impl NodeUpdate {
    /// Plain text update without rich content.
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            a2ui: None,
        }
    }

    /// Attach a typed a2ui payload.
    pub fn with_a2ui(mut self, payload: A2uiPayload) -> Self {
        self.a2ui = Some(RichContent::Payload(payload));
        self
    }

    /// Attach an arbitrary JSON payload that is delivered untouched.
    pub fn with_raw_a2ui(mut self, raw: serde_json::Value) -> Self {
        self.a2ui = Some(RichContent::Raw(raw));
        self
    }
}

/// Rich content attached to an update.
///
/// Payloads that do not parse as [`A2uiPayload`] (missing schema, partially
/// built, extra root keys, ...) are kept as [`RichContent::Raw`] rather than
/// rejected. Either way the payload serialises back to exactly what was read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RichContent {
    Payload(A2uiPayload),
    Raw(serde_json::Value),
}

impl<'de> Deserialize<'de> for RichContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match typed_exactly::<A2uiPayload>(&value) {
            Some(payload) => Self::Payload(payload),
            None => Self::Raw(value),
        })
    }
}

/// Parse `value` as `T` only if `T` writes it back unchanged.
fn typed_exactly<T>(value: &serde_json::Value) -> Option<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    let typed = T::deserialize(value).ok()?;
    let written = serde_json::to_value(&typed).ok()?;
    (written == *value).then_some(typed)
}

impl RichContent {
    /// Whether the root declares the recognised `a2ui` schema tag.
    pub fn is_recognized(&self) -> bool {
        match self {
            Self::Payload(payload) => payload.is_recognized(),
            Self::Raw(_) => false,
        }
    }
}

/// Root of an a2ui payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct A2uiPayload {
    pub schema: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub render: RenderNode,
}

impl A2uiPayload {
    pub fn new(render: RenderNode) -> Self {
        Self {
            schema: A2UI_SCHEMA.to_string(),
            version: Some(A2UI_VERSION.to_string()),
            render,
        }
    }

    pub fn is_recognized(&self) -> bool {
        self.schema == A2UI_SCHEMA
    }
}

/// A node of the render tree: either a type this crate understands or an
/// opaque JSON value preserved as-is.
///
/// A node with a known `type` but an unexpected shape (missing fields, extra
/// keys) is opaque.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RenderNode {
    Known(KnownNode),
    Opaque(serde_json::Value),
}

impl<'de> Deserialize<'de> for RenderNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match typed_exactly::<KnownNode>(&value) {
            Some(node) => Self::Known(node),
            None => Self::Opaque(value),
        })
    }
}

/// Node types with a known shape, discriminated by the `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KnownNode {
    Container {
        children: Vec<RenderNode>,
    },
    Heading {
        level: u8,
        text: String,
    },
    Text {
        text: String,
    },
    List {
        items: Vec<String>,
    },
    Links {
        items: Vec<Link>,
    },
    Card {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subtitle: Option<String>,
        children: Vec<RenderNode>,
    },
    Kv {
        items: Vec<KvItem>,
    },
    Table {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub text: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KvItem {
    pub label: String,
    pub value: String,
}

impl RenderNode {
    pub fn container(children: Vec<RenderNode>) -> Self {
        Self::Known(KnownNode::Container { children })
    }

    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Self::Known(KnownNode::Heading {
            level,
            text: text.into(),
        })
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Known(KnownNode::Text { text: text.into() })
    }

    pub fn list(items: Vec<String>) -> Self {
        Self::Known(KnownNode::List { items })
    }

    pub fn links(items: Vec<Link>) -> Self {
        Self::Known(KnownNode::Links { items })
    }

    pub fn card(
        title: impl Into<String>,
        subtitle: Option<String>,
        children: Vec<RenderNode>,
    ) -> Self {
        Self::Known(KnownNode::Card {
            title: title.into(),
            subtitle,
            children,
        })
    }

    pub fn kv<L, V>(items: impl IntoIterator<Item = (L, V)>) -> Self
    where
        L: Into<String>,
        V: Into<String>,
    {
        Self::Known(KnownNode::Kv {
            items: items
                .into_iter()
                .map(|(label, value)| KvItem {
                    label: label.into(),
                    value: value.into(),
                })
                .collect(),
        })
    }

    pub fn table(title: Option<String>, columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self::Known(KnownNode::Table {
            title,
            columns,
            rows,
        })
    }

    /// Whether this node, or any node below it, is opaque.
    pub fn contains_opaque(&self) -> bool {
        match self {
            Self::Opaque(_) => true,
            Self::Known(KnownNode::Container { children })
            | Self::Known(KnownNode::Card { children, .. }) => {
                children.iter().any(RenderNode::contains_opaque)
            }
            Self::Known(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_update_omits_a2ui() {
        let json = serde_json::to_value(NodeUpdate::text("hello")).unwrap();
        assert_eq!(json, json!({ "output": "hello" }));
    }

    #[test]
    fn test_known_tree_serializes_with_type_tags() {
        let payload = A2uiPayload::new(RenderNode::container(vec![
            RenderNode::heading(2, "Meetings"),
            RenderNode::text("There are no meetings scheduled."),
        ]));
        let json = serde_json::to_value(NodeUpdate::text("x").with_a2ui(payload)).unwrap();

        assert_eq!(json["a2ui"]["schema"], "a2ui");
        assert_eq!(json["a2ui"]["render"]["type"], "container");
        assert_eq!(json["a2ui"]["render"]["children"][0]["type"], "heading");
        assert_eq!(json["a2ui"]["render"]["children"][0]["level"], 2);
        assert_eq!(json["a2ui"]["render"]["children"][1]["text"], "There are no meetings scheduled.");
    }

    #[test]
    fn test_unknown_node_type_is_preserved_verbatim() {
        let raw = json!({
            "schema": "a2ui",
            "render": {
                "type": "container",
                "children": [
                    { "type": "sparkline", "points": [1, 4, 2] },
                    { "type": "text", "text": "ok" }
                ]
            }
        });
        let content: RichContent = serde_json::from_value(raw.clone()).unwrap();

        assert!(content.is_recognized());
        match &content {
            RichContent::Payload(payload) => assert!(payload.render.contains_opaque()),
            RichContent::Raw(_) => panic!("expected a typed payload"),
        }
        assert_eq!(serde_json::to_value(&content).unwrap(), raw);
    }

    #[test]
    fn test_partial_known_node_is_preserved_verbatim() {
        let raw = json!({
            "schema": "a2ui",
            "render": { "type": "card", "title": "x" }
        });
        let content: RichContent = serde_json::from_value(raw.clone()).unwrap();

        match &content {
            RichContent::Payload(payload) => {
                assert!(matches!(payload.render, RenderNode::Opaque(_)))
            }
            RichContent::Raw(_) => panic!("expected a typed payload"),
        }
        assert_eq!(serde_json::to_value(&content).unwrap(), raw);
    }

    #[test]
    fn test_extra_keys_are_preserved_verbatim() {
        let raw = json!({
            "schema": "a2ui",
            "theme": "dark",
            "render": {
                "type": "container",
                "children": [{ "type": "text", "text": "hi", "style": "bold" }]
            }
        });
        let content: RichContent = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&content).unwrap(), raw);

        let node: RenderNode =
            serde_json::from_value(json!({ "type": "text", "text": "hi", "style": "bold" }))
                .unwrap();
        assert!(matches!(node, RenderNode::Opaque(_)));
    }

    #[test]
    fn test_built_payload_parses_back_typed() {
        let payload = A2uiPayload::new(RenderNode::card(
            "Weather",
            None,
            vec![RenderNode::kv([("Now", "50°F (10°C)")])],
        ));
        let json = serde_json::to_value(&payload).unwrap();
        let content: RichContent = serde_json::from_value(json).unwrap();

        assert_eq!(content, RichContent::Payload(payload));
        assert!(content.is_recognized());
    }

    #[test]
    fn test_payload_without_schema_stays_raw() {
        let raw = json!({ "render": { "type": "text" } });
        let content: RichContent = serde_json::from_value(raw.clone()).unwrap();

        assert!(!content.is_recognized());
        assert!(matches!(content, RichContent::Raw(_)));
        assert_eq!(serde_json::to_value(&content).unwrap(), raw);
    }

    #[test]
    fn test_foreign_schema_is_not_recognized() {
        let payload: A2uiPayload = serde_json::from_value(json!({
            "schema": "adaptive-card",
            "render": { "type": "text", "text": "hi" }
        }))
        .unwrap();
        assert!(!payload.is_recognized());
    }

    #[test]
    fn test_kv_and_table_shapes() {
        let node = RenderNode::card(
            "Weather",
            Some("Seattle".into()),
            vec![
                RenderNode::kv([("Now", "50°F (10°C)")]),
                RenderNode::table(None, vec!["Date".into()], vec![vec!["Mon".into()]]),
            ],
        );
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["children"][0]["items"][0]["label"], "Now");
        assert_eq!(json["children"][1]["rows"][0][0], "Mon");
        assert!(json["children"][1].get("title").is_none());
    }
}
