//! On-disk JSON Canvas document format.
//!
//! See <https://jsoncanvas.org>. Fields the format does not define (such as
//! `chat_role`) are kept on the node and round-trip untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{CanvasEdge, CanvasNode, NodeKind, Side};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanvasDocument {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRecord {
    pub id: String,
    pub from_node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_side: Option<Side>,
    pub to_node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_side: Option<Side>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeRecord {
    /// Convert to a [`CanvasNode`]. Unknown node types are read as groups so
    /// they stay on the canvas but are never sent to the model.
    pub fn to_node(&self) -> CanvasNode {
        let kind = match self.node_type.as_str() {
            "text" => NodeKind::Text {
                text: self.text.clone().unwrap_or_default(),
            },
            "file" => NodeKind::File {
                file: self.file.clone().unwrap_or_default(),
            },
            "link" => NodeKind::Link {
                url: self.url.clone().unwrap_or_default(),
            },
            _ => NodeKind::Group {
                label: self.label.clone(),
            },
        };
        CanvasNode {
            id: self.id.clone(),
            kind,
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            color: self.color.clone(),
            data: self.extra.clone(),
        }
    }

    pub fn from_node(node: &CanvasNode) -> Self {
        let mut record = Self {
            id: node.id.clone(),
            node_type: String::new(),
            text: None,
            file: None,
            url: None,
            label: None,
            x: node.x,
            y: node.y,
            width: node.width,
            height: node.height,
            color: node.color.clone(),
            extra: node.data.clone(),
        };
        match &node.kind {
            NodeKind::Text { text } => {
                record.node_type = "text".into();
                record.text = Some(text.clone());
            }
            NodeKind::File { file } => {
                record.node_type = "file".into();
                record.file = Some(file.clone());
            }
            NodeKind::Link { url } => {
                record.node_type = "link".into();
                record.url = Some(url.clone());
            }
            NodeKind::Group { label } => {
                record.node_type = "group".into();
                record.label = label.clone();
            }
        }
        record
    }
}

impl EdgeRecord {
    pub fn to_edge(&self) -> CanvasEdge {
        CanvasEdge {
            id: self.id.clone(),
            from_node: self.from_node.clone(),
            from_side: self.from_side,
            to_node: self.to_node.clone(),
            to_side: self.to_side,
        }
    }

    pub fn from_edge(edge: &CanvasEdge) -> Self {
        Self {
            id: edge.id.clone(),
            from_node: edge.from_node.clone(),
            from_side: edge.from_side,
            to_node: edge.to_node.clone(),
            to_side: edge.to_side,
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_obsidian_canvas() {
        let json = r#"{
            "nodes": [
                {"id": "1", "type": "text", "text": "Hello", "x": -20, "y": 40, "width": 250, "height": 60},
                {"id": "2", "type": "text", "text": "Hi there", "x": -20, "y": 160, "width": 250, "height": 60,
                 "color": "6", "chat_role": "assistant"},
                {"id": "3", "type": "file", "file": "images/cat.png", "x": 300, "y": 40, "width": 400, "height": 400}
            ],
            "edges": [
                {"id": "e1", "fromNode": "1", "fromSide": "bottom", "toNode": "2", "toSide": "top"}
            ]
        }"#;
        let doc: CanvasDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.nodes.len(), 3);

        let assistant = doc.nodes[1].to_node();
        assert_eq!(assistant.chat_role(), Some("assistant"));
        assert_eq!(assistant.color.as_deref(), Some("6"));
        assert_eq!(
            doc.nodes[2].to_node().kind,
            NodeKind::File {
                file: "images/cat.png".into()
            }
        );

        let edge = doc.edges[0].to_edge();
        assert_eq!(edge.from_side, Some(Side::Bottom));
        assert_eq!(edge.to_node, "2");
    }

    #[test]
    fn test_extra_fields_survive_write() {
        let json = r#"{"id": "2", "type": "text", "text": "x", "x": 0, "y": 0, "width": 1, "height": 1, "chat_role": "assistant"}"#;
        let record: NodeRecord = serde_json::from_str(json).unwrap();
        let written = serde_json::to_value(NodeRecord::from_node(&record.to_node())).unwrap();
        assert_eq!(written["type"], "text");
        assert_eq!(written["chat_role"], "assistant");
        assert!(written.get("file").is_none());
    }
}
