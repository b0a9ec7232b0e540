//! Capability interface onto a host-owned canvas.

use async_trait::async_trait;

use crate::model::{CanvasEdge, CanvasNode, NewEdge, NewTextNode, NodeContent, Rect};

/// Operations the generator needs from the canvas that owns the nodes.
///
/// Implementations are expected to be driven from one task at a time; every
/// method takes `&self` because the host, not the caller, owns the state.
#[async_trait]
pub trait Canvas: Send + Sync {
    /// Wait for the host to flush pending UI state (selection, layout).
    async fn request_frame(&self) -> anyhow::Result<()>;

    /// Persist in-progress edits.
    async fn request_save(&self) -> anyhow::Result<()>;

    /// Ids of the currently selected nodes.
    async fn selection(&self) -> Vec<String>;

    /// Replace the selection with a single node.
    async fn select_only(&self, id: &str, start_editing: bool) -> anyhow::Result<()>;

    async fn node(&self, id: &str) -> Option<CanvasNode>;

    /// Nodes with an edge pointing at `id`, in edge order.
    async fn parents(&self, id: &str) -> Vec<CanvasNode>;

    /// Nodes that `id` has an edge pointing at, in edge order.
    async fn children(&self, id: &str) -> Vec<CanvasNode>;

    /// Read what a node holds. `None` for nodes with nothing readable.
    async fn read_content(&self, node: &CanvasNode) -> anyhow::Result<Option<NodeContent>>;

    /// Read a node's text, skipping anything that is not text.
    ///
    /// Hosts should override this when reading images is costly.
    async fn read_text(&self, node: &CanvasNode) -> anyhow::Result<Option<String>> {
        Ok(match self.read_content(node).await? {
            Some(NodeContent::Text(text)) => Some(text),
            _ => None,
        })
    }

    async fn create_text_node(&self, node: NewTextNode) -> anyhow::Result<CanvasNode>;

    async fn add_edge(&self, edge: NewEdge) -> anyhow::Result<CanvasEdge>;

    /// Remove a node and every edge touching it.
    async fn remove_node(&self, id: &str) -> anyhow::Result<()>;

    async fn set_text(&self, id: &str, text: &str) -> anyhow::Result<()>;

    async fn move_and_resize(&self, id: &str, rect: Rect) -> anyhow::Result<()>;
}
