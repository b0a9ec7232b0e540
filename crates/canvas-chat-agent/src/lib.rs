//! Note generation: turns a canvas conversation into an assistant note.
//!
//! [`NoteGenerator`] reads the selected note's ancestor chain, assembles a
//! token-budgeted conversation, calls the chat provider, and writes the reply
//! back to the canvas as a new linked note.

use tracing::info;

pub mod context;
pub mod generate;
pub mod placement;
pub mod tokenizer;

pub use context::{ContextWindow, build_messages};
pub use generate::{GenerationOutcome, GenerationPhase, NoteGenerator};
pub use tokenizer::{BpeTokenizer, Tokenizer, tokenizer_for_model};

/// Sink for short, non-blocking messages shown to the user.
pub trait Notifier: Send + Sync {
    fn notice(&self, message: &str);
}

/// Notifier that only writes notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notice(&self, message: &str) {
        info!(notice = message);
    }
}
