//! Depth-first traversal from a node up through its incoming links.

use std::collections::HashSet;
use std::ops::ControlFlow;

use tracing::trace;

use crate::host::Canvas;
use crate::model::{CanvasNode, NodeId};

/// Lazy depth-first walk over a node and its ancestors.
///
/// The start node is yielded first at depth 0. A node's parents are only
/// fetched when the walk is advanced past it, so stopping after a node never
/// touches anything further back. Each node is yielded at most once. With a
/// non-zero `max_depth`, reaching an unvisited node deeper than it ends the
/// whole walk.
pub struct Ancestors<'a, C: Canvas + ?Sized> {
    canvas: &'a C,
    max_depth: u32,
    stack: Vec<(CanvasNode, u32)>,
    visited: HashSet<NodeId>,
    expand: Option<(NodeId, u32)>,
    done: bool,
}

impl<'a, C: Canvas + ?Sized> Ancestors<'a, C> {
    pub fn new(canvas: &'a C, start: CanvasNode, max_depth: u32) -> Self {
        Self {
            canvas,
            max_depth,
            stack: vec![(start, 0)],
            visited: HashSet::new(),
            expand: None,
            done: false,
        }
    }

    /// Advance to the next unvisited ancestor.
    pub async fn next(&mut self) -> Option<(CanvasNode, u32)> {
        if self.done {
            return None;
        }

        if let Some((id, depth)) = self.expand.take() {
            let parents = self.canvas.parents(&id).await;
            let child_depth = depth + 1;
            if self.max_depth > 0 && child_depth > self.max_depth {
                if parents.iter().any(|p| !self.visited.contains(&p.id)) {
                    trace!(node = %id, depth, "Max depth exceeded, ending walk");
                    self.finish();
                    return None;
                }
            } else {
                // Reversed so the first parent is popped first
                for parent in parents.into_iter().rev() {
                    self.stack.push((parent, child_depth));
                }
            }
        }

        while let Some((node, depth)) = self.stack.pop() {
            if !self.visited.insert(node.id.clone()) {
                continue;
            }
            self.expand = Some((node.id.clone(), depth));
            return Some((node, depth));
        }

        self.finish();
        None
    }

    fn finish(&mut self) {
        self.done = true;
        self.stack.clear();
    }
}

/// Visit `start` and its ancestors depth-first until the visitor breaks.
///
/// Returns the number of nodes visited.
pub async fn visit_ancestors<C, F>(
    canvas: &C,
    start: CanvasNode,
    max_depth: u32,
    mut visitor: F,
) -> usize
where
    C: Canvas + ?Sized,
    F: FnMut(&CanvasNode, u32) -> ControlFlow<()>,
{
    let mut walk = Ancestors::new(canvas, start, max_depth);
    let mut visited = 0;
    while let Some((node, depth)) = walk.next().await {
        visited += 1;
        if visitor(&node, depth).is_break() {
            break;
        }
    }
    visited
}
