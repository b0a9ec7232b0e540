//! Where new notes go and how big they are.

use serde_json::{Map, Value};

use canvas_chat_canvas::model::{CHAT_ROLE_KEY, NewEdge, NewTextNode, Rect, Side};
use canvas_chat_canvas::{Canvas, CanvasNode};

/// Gap between a note and the notes created from it.
pub const NEW_NOTE_MARGIN: i64 = 60;
pub const EMPTY_NOTE_HEIGHT: i64 = 100;
/// Canvas color index used for assistant notes.
pub const ASSISTANT_COLOR: &str = "6";

const MIN_WIDTH: f64 = 360.0;
const PX_PER_CHAR: f64 = 5.0;
const PX_PER_LINE: f64 = 28.0;
const TEXT_PADDING_HEIGHT: f64 = 12.0;

/// Height that fits `text`, never smaller than the parent note.
pub fn calc_height(text: &str, parent_height: i64) -> i64 {
    let chars = text.chars().count() as f64;
    let text_height = (TEXT_PADDING_HEIGHT + PX_PER_LINE * chars / (MIN_WIDTH / PX_PER_CHAR)).round();
    parent_height.max(text_height as i64)
}

/// Rect for a new child of `parent`, given its existing children.
///
/// The first child goes straight below the parent; later children line up to
/// the right of the rightmost one, level with the last.
pub fn child_rect(parent: &CanvasNode, siblings: &[CanvasNode], height: i64) -> Rect {
    let parent_rect = parent.rect();
    let x = siblings
        .iter()
        .map(|s| s.rect().right())
        .max()
        .map(|right| right + NEW_NOTE_MARGIN)
        .unwrap_or(parent_rect.x);
    let y = siblings
        .last()
        .map(|s| s.y)
        .unwrap_or(parent_rect.bottom() + NEW_NOTE_MARGIN);

    Rect {
        x,
        y,
        width: parent_rect.width,
        height,
    }
}

/// Data map tagging a note as written by the assistant.
pub fn assistant_data() -> Map<String, Value> {
    let mut data = Map::new();
    data.insert(CHAT_ROLE_KEY.into(), Value::String("assistant".into()));
    data
}

/// Create a text note below `parent` and link it from the parent.
pub async fn create_child_note<C: Canvas + ?Sized>(
    canvas: &C,
    parent: &CanvasNode,
    text: &str,
    height: i64,
    color: Option<&str>,
    data: Map<String, Value>,
) -> anyhow::Result<CanvasNode> {
    let siblings = canvas.children(&parent.id).await;
    let rect = child_rect(parent, &siblings, height);

    let created = canvas
        .create_text_node(NewTextNode {
            text: text.to_string(),
            rect,
            color: color.map(str::to_string),
            data,
        })
        .await?;

    canvas
        .add_edge(NewEdge {
            from_node: parent.id.clone(),
            from_side: Side::Bottom,
            to_node: created.id.clone(),
            to_side: Side::Top,
        })
        .await?;

    Ok(created)
}
