//! Conversation assembly from a note's ancestor chain.

use serde::Serialize;
use tracing::debug;

use canvas_chat_canvas::model::NodeContent;
use canvas_chat_canvas::{Ancestors, Canvas, CanvasNode};
use canvas_chat_core::config::Settings;
use canvas_chat_core::models::input_token_limit;
use canvas_chat_core::types::{ChatMessage, ChatRole};

use crate::tokenizer::Tokenizer;

/// Notes starting with this marker carry the system prompt, not conversation.
pub const SYSTEM_PROMPT_SENTINEL: &str = "SYSTEM PROMPT";

/// Messages to send for one request plus the history token count.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextWindow {
    pub messages: Vec<ChatMessage>,
    pub token_count: usize,
}

impl ContextWindow {
    /// Nothing to send.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of notes in the conversation, system prompt excluded.
    pub fn note_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .count()
    }
}

pub fn is_system_prompt(text: &str) -> bool {
    text.trim_start().starts_with(SYSTEM_PROMPT_SENTINEL)
}

/// Prompt text of a sentinel note, without the marker.
pub fn strip_system_prompt(text: &str) -> &str {
    let text = text.trim_start();
    text.strip_prefix(SYSTEM_PROMPT_SENTINEL)
        .unwrap_or(text)
        .trim()
}

/// Prompt from the nearest sentinel ancestor of `node`, if any.
pub async fn find_system_prompt<C: Canvas + ?Sized>(
    canvas: &C,
    node: &CanvasNode,
    max_depth: u32,
) -> anyhow::Result<Option<String>> {
    let mut walk = Ancestors::new(canvas, node.clone(), max_depth);
    while let Some((ancestor, _)) = walk.next().await {
        if let Some(text) = canvas.read_text(&ancestor).await? {
            if is_system_prompt(&text) {
                debug!(node = %ancestor.id, "Found system prompt note");
                return Ok(Some(strip_system_prompt(&text).to_string()));
            }
        }
    }
    Ok(None)
}

/// Build the conversation ending at `node`.
///
/// Walks `node` and its ancestors nearest first, charging each text note's
/// tokens against the model budget. The note that would overflow the budget
/// is cut to `budget - used - 1` tokens and ends the walk. The result is in
/// chronological order with the system prompt first, or empty when no note
/// had content.
pub async fn build_messages<C: Canvas + ?Sized>(
    canvas: &C,
    node: &CanvasNode,
    settings: &Settings,
    tokenizer: &dyn Tokenizer,
) -> anyhow::Result<ContextWindow> {
    let budget = input_token_limit(settings);
    let system_prompt = find_system_prompt(canvas, node, settings.max_depth)
        .await?
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| settings.system_prompt.clone());

    let mut messages = Vec::new();
    let mut used = 0usize;
    let mut walk = Ancestors::new(canvas, node.clone(), settings.max_depth);

    while let Some((ancestor, depth)) = walk.next().await {
        let text = match canvas.read_content(&ancestor).await? {
            Some(NodeContent::Image { url }) => {
                messages.push(ChatMessage::image(url));
                continue;
            }
            Some(NodeContent::Text(text)) => text,
            None => continue,
        };

        let text = text.trim();
        if text.is_empty() || is_system_prompt(text) {
            continue;
        }

        let role = match ancestor.chat_role() {
            Some("assistant") => ChatRole::Assistant,
            _ => ChatRole::User,
        };

        let tokens = tokenizer.count(text);
        if used.saturating_add(tokens) > budget {
            let keep = budget.saturating_sub(used).saturating_sub(1);
            let kept = tokenizer.truncate(text, keep);
            debug!(
                node = %ancestor.id,
                depth,
                tokens,
                keep,
                "Token budget reached, truncating note"
            );
            used += keep;
            if !kept.is_empty() {
                messages.push(message(role, &kept));
            }
            break;
        }

        used += tokens;
        messages.push(message(role, text));
    }

    if messages.is_empty() {
        return Ok(ContextWindow::default());
    }

    messages.reverse();
    messages.insert(0, ChatMessage::system(system_prompt));

    debug!(
        messages = messages.len(),
        tokens = used,
        tokenizer = tokenizer.name(),
        "Context assembled"
    );

    Ok(ContextWindow {
        messages,
        token_count: used,
    })
}

fn message(role: ChatRole, text: &str) -> ChatMessage {
    match role {
        ChatRole::Assistant => ChatMessage::assistant(text),
        _ => ChatMessage::user(text),
    }
}
