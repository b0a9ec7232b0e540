//! Canvas model and host seam for note generation.
//!
//! The host owns the canvas; generation code reaches it only through the
//! [`Canvas`] trait. [`CanvasSession`] is an in-memory host backed by a
//! JSON Canvas file.

pub mod host;
pub mod model;
pub mod protocol;
pub mod session;
pub mod walk;

pub use host::Canvas;
pub use model::{CanvasEdge, CanvasNode, NewEdge, NewTextNode, NodeContent, NodeId, NodeKind, Rect, Side};
pub use protocol::CanvasDocument;
pub use session::CanvasSession;
pub use walk::{Ancestors, visit_ancestors};
