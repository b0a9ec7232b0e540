//! Canvas node and edge types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type NodeId = String;

/// Key in a node's `data` map naming who authored it.
pub const CHAT_ROLE_KEY: &str = "chat_role";

/// What a node holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Text { text: String },
    /// A file from the vault, path relative to the vault root.
    File { file: String },
    Link { url: String },
    Group { label: Option<String> },
}

/// A box on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    pub color: Option<String>,
    /// Free-form data, used to tag assistant-authored nodes.
    pub data: Map<String, Value>,
}

impl CanvasNode {
    pub fn rect(&self) -> Rect {
        Rect {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text { text } => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn chat_role(&self) -> Option<&str> {
        self.data.get(CHAT_ROLE_KEY).and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Rect {
    pub fn right(&self) -> i64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i64 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

/// A directed link between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasEdge {
    pub id: String,
    pub from_node: NodeId,
    pub from_side: Option<Side>,
    pub to_node: NodeId,
    pub to_side: Option<Side>,
}

/// Request to create a text node.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTextNode {
    pub text: String,
    pub rect: Rect,
    pub color: Option<String>,
    pub data: Map<String, Value>,
}

/// Request to link two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEdge {
    pub from_node: NodeId,
    pub from_side: Side,
    pub to_node: NodeId,
    pub to_side: Side,
}

/// Content read from a node by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeContent {
    Text(String),
    Image { url: String },
}
