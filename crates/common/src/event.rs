//! Stream events and per-session graph state.

use crate::request::now_millis;
use crate::update::NodeUpdate;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// One update as delivered to a client, tagged with the producing node.
///
/// Serialises to a JSON object with exactly one key, the node name, whose
/// value is the [`NodeUpdate`].
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    /// Position in the session's event sequence, starting at 0.
    pub seq: u64,
    /// Name of the node that produced the update.
    pub node: String,
    pub update: NodeUpdate,
    /// Production timestamp (Unix millis).
    pub produced_at: u64,
}

impl StreamEvent {
    pub fn new(seq: u64, node: impl Into<String>, update: NodeUpdate) -> Self {
        Self {
            seq,
            node: node.into(),
            update,
            produced_at: now_millis(),
        }
    }

    /// Wire payload as a JSON string.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl Serialize for StreamEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.node, &self.update)?;
        map.end()
    }
}

/// Latest update per node plus the full emission history of one session.
///
/// Keys keep the order in which nodes first emitted; a node emitting again
/// overwrites its value in place. Never shared across sessions.
#[derive(Debug, Clone, Default)]
pub struct GraphState {
    latest: Vec<(String, NodeUpdate)>,
    history: Vec<StreamEvent>,
}

impl GraphState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an emitted event.
    pub fn record(&mut self, event: &StreamEvent) {
        match self.latest.iter_mut().find(|(node, _)| *node == event.node) {
            Some((_, update)) => *update = event.update.clone(),
            None => self
                .latest
                .push((event.node.clone(), event.update.clone())),
        }
        self.history.push(event.clone());
    }

    /// Latest update emitted by `node`.
    pub fn get(&self, node: &str) -> Option<&NodeUpdate> {
        self.latest
            .iter()
            .find(|(name, _)| name == node)
            .map(|(_, update)| update)
    }

    /// Node names in first-emission order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.latest.iter().map(|(node, _)| node.as_str())
    }

    /// Every event recorded, in emission order.
    pub fn history(&self) -> &[StreamEvent] {
        &self.history
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

impl Serialize for GraphState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.latest.len()))?;
        for (node, update) in &self.latest {
            map.serialize_entry(node, update)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_serializes_as_single_key_object() {
        let event = StreamEvent::new(0, "meetings_agent", NodeUpdate::text("done"));
        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();

        assert_eq!(value, json!({ "meetings_agent": { "output": "done" } }));
    }

    #[test]
    fn test_graph_state_overwrites_in_place() {
        let mut graph = GraphState::new();
        graph.record(&StreamEvent::new(0, "web_agent", NodeUpdate::text("searching")));
        graph.record(&StreamEvent::new(1, "supervisor", NodeUpdate::text("note")));
        graph.record(&StreamEvent::new(2, "web_agent", NodeUpdate::text("results")));

        let nodes: Vec<&str> = graph.nodes().collect();
        assert_eq!(nodes, vec!["web_agent", "supervisor"]);
        assert_eq!(graph.get("web_agent").unwrap().output, "results");
        assert_eq!(graph.history().len(), 3);
        assert_eq!(graph.history()[0].update.output, "searching");
    }

    #[test]
    fn test_graph_state_serializes_latest_values() {
        let mut graph = GraphState::new();
        graph.record(&StreamEvent::new(0, "rag_agent", NodeUpdate::text("a")));
        graph.record(&StreamEvent::new(1, "rag_agent", NodeUpdate::text("b")));

        let value = serde_json::to_value(&graph).unwrap();
        assert_eq!(value, json!({ "rag_agent": { "output": "b" } }));
    }
}
