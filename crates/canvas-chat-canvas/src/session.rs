//! In-memory canvas backed by a JSON Canvas file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::Engine;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::host::Canvas;
use crate::model::{CanvasEdge, CanvasNode, NewEdge, NewTextNode, NodeContent, NodeKind, Rect};
use crate::protocol::{CanvasDocument, EdgeRecord, NodeRecord};

#[derive(Debug, Default)]
struct SessionState {
    nodes: Vec<CanvasNode>,
    edges: Vec<CanvasEdge>,
    selection: Vec<String>,
    editing: Option<String>,
}

/// A canvas session tracks nodes, edges, and the current selection.
///
/// Saving writes the document back to `path` when one is set. File nodes are
/// resolved relative to `vault_root`.
#[derive(Debug)]
pub struct CanvasSession {
    path: Option<PathBuf>,
    vault_root: PathBuf,
    state: RwLock<SessionState>,
    saves: AtomicUsize,
    frames: AtomicUsize,
}

impl CanvasSession {
    pub fn from_document(doc: CanvasDocument, path: Option<PathBuf>, vault_root: PathBuf) -> Self {
        let state = SessionState {
            nodes: doc.nodes.iter().map(NodeRecord::to_node).collect(),
            edges: doc.edges.iter().map(EdgeRecord::to_edge).collect(),
            selection: Vec::new(),
            editing: None,
        };
        Self {
            path,
            vault_root,
            state: RwLock::new(state),
            saves: AtomicUsize::new(0),
            frames: AtomicUsize::new(0),
        }
    }

    /// Open a `.canvas` file. A missing file opens as an empty canvas.
    pub async fn open(path: &Path, vault_root: PathBuf) -> anyhow::Result<Self> {
        let doc = match tokio::fs::read_to_string(path).await {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("Invalid canvas file {}: {e}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CanvasDocument::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self::from_document(doc, Some(path.to_path_buf()), vault_root))
    }

    pub async fn document(&self) -> CanvasDocument {
        let state = self.state.read().await;
        CanvasDocument {
            nodes: state.nodes.iter().map(NodeRecord::from_node).collect(),
            edges: state.edges.iter().map(EdgeRecord::from_edge).collect(),
        }
    }

    /// Replace the selection with the given node ids.
    pub async fn set_selection(&self, ids: &[&str]) {
        let mut state = self.state.write().await;
        state.selection = ids.iter().map(|id| id.to_string()).collect();
        state.editing = None;
    }

    /// Node currently opened for editing, if any.
    pub async fn editing(&self) -> Option<String> {
        self.state.read().await.editing.clone()
    }

    pub async fn edges(&self) -> Vec<CanvasEdge> {
        self.state.read().await.edges.clone()
    }

    pub async fn nodes(&self) -> Vec<CanvasNode> {
        self.state.read().await.nodes.clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.load(Ordering::Relaxed)
    }

    async fn read_vault_file(&self, file: &str) -> anyhow::Result<Option<NodeContent>> {
        let path = self.vault_root.join(file);
        let mime = mime_guess::from_path(&path).first_or_octet_stream();

        if is_image(&mime) {
            let bytes = tokio::fs::read(&path).await?;
            let data = base64::engine::general_purpose::STANDARD.encode(bytes);
            return Ok(Some(NodeContent::Image {
                url: format!("data:{};base64,{data}", mime.essence_str()),
            }));
        }

        let text = tokio::fs::read_to_string(&path).await?;
        Ok(Some(NodeContent::Text(text)))
    }
}

fn is_image(mime: &mime_guess::Mime) -> bool {
    mime.type_() == mime_guess::mime::IMAGE
}

fn is_image_path(path: &str) -> bool {
    mime_guess::from_path(path).first().is_some_and(|m| is_image(&m))
}

fn parents_of(state: &SessionState, id: &str) -> Vec<CanvasNode> {
    state
        .edges
        .iter()
        .filter(|e| e.to_node == id)
        .filter_map(|e| state.nodes.iter().find(|n| n.id == e.from_node))
        .cloned()
        .collect()
}

fn children_of(state: &SessionState, id: &str) -> Vec<CanvasNode> {
    state
        .edges
        .iter()
        .filter(|e| e.from_node == id)
        .filter_map(|e| state.nodes.iter().find(|n| n.id == e.to_node))
        .cloned()
        .collect()
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..16].to_string()
}

#[async_trait]
impl Canvas for CanvasSession {
    async fn request_frame(&self) -> anyhow::Result<()> {
        self.frames.fetch_add(1, Ordering::Relaxed);
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn request_save(&self) -> anyhow::Result<()> {
        self.saves.fetch_add(1, Ordering::Relaxed);
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.document().await)?;
        tokio::fs::write(path, json).await?;
        debug!(path = %path.display(), "Canvas saved");
        Ok(())
    }

    async fn selection(&self) -> Vec<String> {
        self.state.read().await.selection.clone()
    }

    async fn select_only(&self, id: &str, start_editing: bool) -> anyhow::Result<()> {
        let mut state = self.state.write().await;
        if !state.nodes.iter().any(|n| n.id == id) {
            anyhow::bail!("Cannot select unknown node '{id}'");
        }
        state.selection = vec![id.to_string()];
        state.editing = start_editing.then(|| id.to_string());
        Ok(())
    }

    async fn node(&self, id: &str) -> Option<CanvasNode> {
        let state = self.state.read().await;
        state.nodes.iter().find(|n| n.id == id).cloned()
    }

    async fn parents(&self, id: &str) -> Vec<CanvasNode> {
        parents_of(&*self.state.read().await, id)
    }

    async fn children(&self, id: &str) -> Vec<CanvasNode> {
        children_of(&*self.state.read().await, id)
    }

    async fn read_content(&self, node: &CanvasNode) -> anyhow::Result<Option<NodeContent>> {
        match &node.kind {
            NodeKind::Text { text } => Ok(Some(NodeContent::Text(text.clone()))),
            NodeKind::File { file } => match self.read_vault_file(file).await {
                Ok(content) => Ok(content),
                Err(e) => {
                    warn!(node = %node.id, file = %file, %e, "Failed to read file node");
                    Ok(None)
                }
            },
            NodeKind::Link { url } => {
                if is_image_path(url) {
                    Ok(Some(NodeContent::Image { url: url.clone() }))
                } else {
                    Ok(Some(NodeContent::Text(url.clone())))
                }
            }
            NodeKind::Group { .. } => Ok(None),
        }
    }

    async fn read_text(&self, node: &CanvasNode) -> anyhow::Result<Option<String>> {
        match &node.kind {
            NodeKind::File { file } if is_image_path(file) => Ok(None),
            NodeKind::Link { url } if is_image_path(url) => Ok(None),
            _ => Ok(match self.read_content(node).await? {
                Some(NodeContent::Text(text)) => Some(text),
                _ => None,
            }),
        }
    }

    async fn create_text_node(&self, node: NewTextNode) -> anyhow::Result<CanvasNode> {
        let created = CanvasNode {
            id: new_id(),
            kind: NodeKind::Text { text: node.text },
            x: node.rect.x,
            y: node.rect.y,
            width: node.rect.width,
            height: node.rect.height,
            color: node.color,
            data: node.data,
        };
        self.state.write().await.nodes.push(created.clone());
        debug!(node = %created.id, "Node created");
        Ok(created)
    }

    async fn add_edge(&self, edge: NewEdge) -> anyhow::Result<CanvasEdge> {
        let mut state = self.state.write().await;
        for id in [&edge.from_node, &edge.to_node] {
            if !state.nodes.iter().any(|n| &n.id == id) {
                anyhow::bail!("Cannot link unknown node '{id}'");
            }
        }
        let created = CanvasEdge {
            id: new_id(),
            from_node: edge.from_node,
            from_side: Some(edge.from_side),
            to_node: edge.to_node,
            to_side: Some(edge.to_side),
        };
        state.edges.push(created.clone());
        Ok(created)
    }

    async fn remove_node(&self, id: &str) -> anyhow::Result<()> {
        let mut state = self.state.write().await;
        state.nodes.retain(|n| n.id != id);
        state.edges.retain(|e| e.from_node != id && e.to_node != id);
        state.selection.retain(|s| s != id);
        if state.editing.as_deref() == Some(id) {
            state.editing = None;
        }
        debug!(node = %id, "Node removed");
        Ok(())
    }

    async fn set_text(&self, id: &str, text: &str) -> anyhow::Result<()> {
        let mut state = self.state.write().await;
        let node = state
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| anyhow::anyhow!("Unknown node '{id}'"))?;
        match &mut node.kind {
            NodeKind::Text { text: current } => {
                *current = text.to_string();
                Ok(())
            }
            _ => anyhow::bail!("Node '{id}' is not a text node"),
        }
    }

    async fn move_and_resize(&self, id: &str, rect: Rect) -> anyhow::Result<()> {
        let mut state = self.state.write().await;
        let node = state
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| anyhow::anyhow!("Unknown node '{id}'"))?;
        node.x = rect.x;
        node.y = rect.y;
        node.width = rect.width;
        node.height = rect.height;
        Ok(())
    }
}
