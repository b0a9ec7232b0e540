//! Generate-note and next-note actions.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use canvas_chat_canvas::{Canvas, CanvasNode};
use canvas_chat_core::config::Settings;
use canvas_chat_providers::{CompletionRequest, Credentials, LlmProvider};

use crate::Notifier;
use crate::context::{ContextWindow, build_messages};
use crate::placement::{
    ASSISTANT_COLOR, EMPTY_NOTE_HEIGHT, assistant_data, calc_height, create_child_note,
};
use crate::tokenizer::{Tokenizer, tokenizer_for_model};

/// Steps of one generate-note invocation, logged as it progresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPhase {
    Idle,
    Validating,
    BuildingContext,
    PlaceholderCreated,
    AwaitingCompletion,
    Populated,
    Removed,
}

/// How a generate-note invocation ended.
///
/// Every variant is terminal; nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GenerationOutcome {
    /// No API key configured. Nothing was touched.
    MissingApiKey,
    NoCanvas,
    /// Zero or several notes selected.
    NoSelection,
    /// The selected note and its ancestors hold nothing to send.
    EmptyContext,
    /// The reply was written to a new note.
    Populated { node_id: String },
    /// The provider answered without readable text; placeholder removed.
    EmptyResponse,
    /// The request failed; placeholder removed.
    RequestFailed { message: String },
    /// The placeholder was deleted while the request was in flight.
    PlaceholderGone,
}

/// Runs note actions against a canvas with one set of settings.
pub struct NoteGenerator {
    settings: Settings,
    provider: Arc<dyn LlmProvider>,
    notifier: Arc<dyn Notifier>,
    tokenizer: Box<dyn Tokenizer>,
}

impl NoteGenerator {
    /// Build a generator with the tokenizer of the configured model.
    pub fn new(
        settings: Settings,
        provider: Arc<dyn LlmProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> anyhow::Result<Self> {
        let tokenizer = Box::new(tokenizer_for_model(&settings.model)?);
        Ok(Self {
            settings,
            provider,
            notifier,
            tokenizer,
        })
    }

    pub fn with_tokenizer(mut self, tokenizer: Box<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The single selected note, after letting the host settle.
    async fn selected_note<C: Canvas + ?Sized>(&self, canvas: &C) -> anyhow::Result<Option<CanvasNode>> {
        canvas.request_frame().await?;
        let selection = canvas.selection().await;
        let [id] = selection.as_slice() else {
            debug!(selected = selection.len(), "Need exactly one selected note");
            return Ok(None);
        };
        Ok(canvas.node(id).await)
    }

    /// Assemble what would be sent for the selected note, without side effects.
    pub async fn preview_context<C: Canvas + ?Sized>(
        &self,
        canvas: Option<&C>,
    ) -> anyhow::Result<Option<ContextWindow>> {
        let Some(canvas) = canvas else {
            debug!("No active canvas");
            return Ok(None);
        };
        let Some(node) = self.selected_note(canvas).await? else {
            return Ok(None);
        };
        let window = build_messages(canvas, &node, &self.settings, self.tokenizer.as_ref()).await?;
        Ok(Some(window))
    }

    /// Generate a reply to the selected note and insert it as a linked note.
    pub async fn generate_note<C: Canvas + ?Sized>(
        &self,
        canvas: Option<&C>,
    ) -> anyhow::Result<GenerationOutcome> {
        debug!(phase = ?GenerationPhase::Validating);
        let Some(api_key) = self.settings.api_key.clone().filter(|k| !k.is_empty()) else {
            self.notifier
                .notice("Please set your API key in the settings");
            return Ok(GenerationOutcome::MissingApiKey);
        };

        let Some(canvas) = canvas else {
            debug!("No active canvas");
            return Ok(GenerationOutcome::NoCanvas);
        };

        let Some(selected) = self.selected_note(canvas).await? else {
            return Ok(GenerationOutcome::NoSelection);
        };

        // Flush edits to the selected note, then read it again
        canvas.request_save().await?;
        let Some(source) = canvas.node(&selected.id).await else {
            debug!(node = %selected.id, "Selected note gone after save");
            return Ok(GenerationOutcome::NoSelection);
        };

        debug!(phase = ?GenerationPhase::BuildingContext, node = %source.id);
        let window = build_messages(canvas, &source, &self.settings, self.tokenizer.as_ref()).await?;
        if window.is_empty() {
            debug!(node = %source.id, "Nothing to send");
            return Ok(GenerationOutcome::EmptyContext);
        }

        let model = self.settings.model.clone();
        let placeholder = create_child_note(
            canvas,
            &source,
            &format!("Calling AI ({model})..."),
            EMPTY_NOTE_HEIGHT,
            Some(ASSISTANT_COLOR),
            assistant_data(),
        )
        .await?;
        debug!(phase = ?GenerationPhase::PlaceholderCreated, node = %placeholder.id);

        self.notifier.notice(&format!(
            "Sending {} notes with {} tokens to {model}",
            window.note_count(),
            window.token_count
        ));

        let request = CompletionRequest {
            model: model.clone(),
            messages: window.messages,
            max_tokens: (self.settings.max_response_tokens > 0)
                .then_some(self.settings.max_response_tokens),
            temperature: Some(self.settings.temperature),
        };

        debug!(phase = ?GenerationPhase::AwaitingCompletion);
        info!(model = %model, provider = self.provider.id(), "Requesting completion");
        let result = self
            .provider
            .complete(&request, &Credentials::api_key(api_key))
            .await;

        let outcome = match result {
            Ok(Some(text)) => match self.populate(canvas, &source, &placeholder, &text).await {
                Ok(outcome) => outcome,
                Err(e) => self.fail(canvas, &placeholder, e).await,
            },
            Ok(None) => {
                warn!(node = %source.id, "Empty completion response");
                self.notifier
                    .notice(&format!("Empty or unreadable response from {model}"));
                self.discard(canvas, &placeholder).await;
                GenerationOutcome::EmptyResponse
            }
            Err(e) => self.fail(canvas, &placeholder, e).await,
        };

        canvas.request_save().await?;
        debug!(phase = ?GenerationPhase::Idle);
        Ok(outcome)
    }

    async fn populate<C: Canvas + ?Sized>(
        &self,
        canvas: &C,
        source: &CanvasNode,
        placeholder: &CanvasNode,
        text: &str,
    ) -> anyhow::Result<GenerationOutcome> {
        // The user may have deleted the placeholder while we waited
        let Some(current) = canvas.node(&placeholder.id).await else {
            warn!(node = %placeholder.id, "Placeholder removed during request, dropping reply");
            return Ok(GenerationOutcome::PlaceholderGone);
        };

        canvas.set_text(&current.id, text).await?;
        let mut rect = current.rect();
        rect.height = calc_height(text, source.height);
        canvas.move_and_resize(&current.id, rect).await?;

        // Only move the selection if the user left it where it was
        let selection = canvas.selection().await;
        let untouched = match selection.as_slice() {
            [] => true,
            [only] => only == &source.id,
            _ => false,
        };
        if untouched {
            canvas.select_only(&current.id, false).await?;
        } else {
            debug!("Selection changed during request, leaving it alone");
        }

        debug!(phase = ?GenerationPhase::Populated, node = %current.id, chars = text.len());
        Ok(GenerationOutcome::Populated {
            node_id: current.id,
        })
    }

    /// Report a failed request or write-back and drop the placeholder.
    async fn fail<C: Canvas + ?Sized>(
        &self,
        canvas: &C,
        placeholder: &CanvasNode,
        error: anyhow::Error,
    ) -> GenerationOutcome {
        warn!(%error, "Completion failed");
        self.notifier
            .notice(&format!("Error calling {}: {error}", self.settings.model));
        self.discard(canvas, placeholder).await;
        GenerationOutcome::RequestFailed {
            message: error.to_string(),
        }
    }

    async fn discard<C: Canvas + ?Sized>(&self, canvas: &C, placeholder: &CanvasNode) {
        match canvas.remove_node(&placeholder.id).await {
            Ok(()) => debug!(phase = ?GenerationPhase::Removed, node = %placeholder.id),
            Err(e) => warn!(node = %placeholder.id, %e, "Failed to remove placeholder"),
        }
    }

    /// Create an empty note below the selected note and start editing it.
    ///
    /// Returns the new note's id, or `None` when there was no single selection.
    pub async fn next_note<C: Canvas + ?Sized>(&self, canvas: Option<&C>) -> anyhow::Result<Option<String>> {
        let Some(canvas) = canvas else {
            debug!("No active canvas");
            return Ok(None);
        };
        let Some(source) = self.selected_note(canvas).await? else {
            return Ok(None);
        };

        let created = create_child_note(
            canvas,
            &source,
            "",
            EMPTY_NOTE_HEIGHT,
            None,
            Default::default(),
        )
        .await?;
        canvas.select_only(&created.id, true).await?;
        canvas.request_save().await?;

        debug!(parent = %source.id, node = %created.id, "Next note created");
        Ok(Some(created.id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use canvas_chat_canvas::model::{CanvasEdge, NewEdge, NewTextNode, NodeContent, Rect};
    use canvas_chat_canvas::{CanvasDocument, CanvasSession};
    use canvas_chat_core::types::ChatMessage;
    use canvas_chat_providers::ModelInfo;

    use super::*;

    enum Reply {
        Text(&'static str),
        Empty,
        Fail(&'static str),
    }

    /// Provider double that records requests and runs a hook mid-request.
    struct ScriptedProvider {
        reply: Reply,
        requests: Mutex<Vec<CompletionRequest>>,
        canvas: Option<Arc<CanvasSession>>,
        select_during_request: Option<&'static str>,
        delete_placeholder: bool,
    }

    impl ScriptedProvider {
        fn new(reply: Reply) -> Self {
            Self {
                reply,
                requests: Mutex::new(Vec::new()),
                canvas: None,
                select_during_request: None,
                delete_placeholder: false,
            }
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn id(&self) -> &str {
            "scripted"
        }

        fn format_messages(&self, messages: &[ChatMessage]) -> Vec<serde_json::Value> {
            messages.iter().map(|m| serde_json::to_value(m).unwrap()).collect()
        }

        async fn complete(
            &self,
            request: &CompletionRequest,
            _credentials: &Credentials,
        ) -> anyhow::Result<Option<String>> {
            self.requests.lock().unwrap().push(request.clone());

            if let Some(canvas) = &self.canvas {
                if let Some(id) = self.select_during_request {
                    canvas.set_selection(&[id]).await;
                }
                if self.delete_placeholder {
                    let placeholder = canvas
                        .nodes()
                        .await
                        .into_iter()
                        .find(|n| n.text().is_some_and(|t| t.starts_with("Calling AI")))
                        .unwrap();
                    canvas.remove_node(&placeholder.id).await.unwrap();
                }
            }

            match self.reply {
                Reply::Text(text) => Ok(Some(text.to_string())),
                Reply::Empty => Ok(None),
                Reply::Fail(message) => Err(anyhow::anyhow!(message)),
            }
        }

        async fn list_models(&self, _credentials: &Credentials) -> anyhow::Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        notices: Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn notice(&self, message: &str) {
            self.notices.lock().unwrap().push(message.to_string());
        }
    }

    impl RecordingNotifier {
        fn all(&self) -> Vec<String> {
            self.notices.lock().unwrap().clone()
        }
    }

    /// Host that commits a pending edit on save and can refuse text writes.
    struct EditingCanvas {
        inner: Arc<CanvasSession>,
        edit_on_save: Mutex<Option<(&'static str, &'static str)>>,
        refuse_set_text: bool,
    }

    impl EditingCanvas {
        fn new(inner: Arc<CanvasSession>) -> Self {
            Self {
                inner,
                edit_on_save: Mutex::new(None),
                refuse_set_text: false,
            }
        }
    }

    #[async_trait]
    impl Canvas for EditingCanvas {
        async fn request_frame(&self) -> anyhow::Result<()> {
            self.inner.request_frame().await
        }

        async fn request_save(&self) -> anyhow::Result<()> {
            let edit = self.edit_on_save.lock().unwrap().take();
            if let Some((id, text)) = edit {
                self.inner.set_text(id, text).await?;
            }
            self.inner.request_save().await
        }

        async fn selection(&self) -> Vec<String> {
            self.inner.selection().await
        }

        async fn select_only(&self, id: &str, start_editing: bool) -> anyhow::Result<()> {
            self.inner.select_only(id, start_editing).await
        }

        async fn node(&self, id: &str) -> Option<CanvasNode> {
            self.inner.node(id).await
        }

        async fn parents(&self, id: &str) -> Vec<CanvasNode> {
            self.inner.parents(id).await
        }

        async fn children(&self, id: &str) -> Vec<CanvasNode> {
            self.inner.children(id).await
        }

        async fn read_content(&self, node: &CanvasNode) -> anyhow::Result<Option<NodeContent>> {
            self.inner.read_content(node).await
        }

        async fn create_text_node(&self, node: NewTextNode) -> anyhow::Result<CanvasNode> {
            self.inner.create_text_node(node).await
        }

        async fn add_edge(&self, edge: NewEdge) -> anyhow::Result<CanvasEdge> {
            self.inner.add_edge(edge).await
        }

        async fn remove_node(&self, id: &str) -> anyhow::Result<()> {
            self.inner.remove_node(id).await
        }

        async fn set_text(&self, id: &str, text: &str) -> anyhow::Result<()> {
            if self.refuse_set_text {
                anyhow::bail!("host refused");
            }
            self.inner.set_text(id, text).await
        }

        async fn move_and_resize(&self, id: &str, rect: Rect) -> anyhow::Result<()> {
            self.inner.move_and_resize(id, rect).await
        }
    }

    fn canvas() -> Arc<CanvasSession> {
        let doc: CanvasDocument = serde_json::from_str(
            r#"{
                "nodes": [
                    {"id": "q", "type": "text", "text": "What is Rust?", "x": 0, "y": 0, "width": 300, "height": 80},
                    {"id": "other", "type": "text", "text": "unrelated", "x": 600, "y": 0, "width": 300, "height": 80},
                    {"id": "blank", "type": "text", "text": "   ", "x": 900, "y": 0, "width": 300, "height": 80}
                ]
            }"#,
        )
        .unwrap();
        Arc::new(CanvasSession::from_document(doc, None, std::env::temp_dir()))
    }

    fn settings() -> Settings {
        Settings {
            api_key: Some("sk-test".into()),
            model: "gpt-4".into(),
            temperature: 0.5,
            max_response_tokens: 256,
            ..Settings::default()
        }
    }

    fn generator(
        settings: Settings,
        provider: Arc<ScriptedProvider>,
        notifier: Arc<RecordingNotifier>,
    ) -> NoteGenerator {
        NoteGenerator::new(settings, provider, notifier).unwrap()
    }

    #[tokio::test]
    async fn test_success_creates_one_linked_note() {
        let canvas = canvas();
        canvas.set_selection(&["q"]).await;
        let provider = Arc::new(ScriptedProvider::new(Reply::Text("A systems language.")));
        let notifier = Arc::new(RecordingNotifier::default());
        let generator = generator(settings(), provider.clone(), notifier.clone());

        let outcome = generator.generate_note(Some(&*canvas)).await.unwrap();
        let GenerationOutcome::Populated { node_id } = outcome else {
            panic!("expected populated, got {outcome:?}");
        };

        let children = canvas.children("q").await;
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, node_id);
        assert_eq!(children[0].text(), Some("A systems language."));
        assert_eq!(children[0].chat_role(), Some("assistant"));
        assert_eq!(children[0].height, 80);
        assert_eq!(canvas.nodes().await.len(), 4);

        // Selection follows the new note
        assert_eq!(canvas.selection().await, vec![node_id]);

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "gpt-4");
        assert_eq!(requests[0].max_tokens, Some(256));
        assert_eq!(requests[0].temperature, Some(0.5));
        assert_eq!(requests[0].messages.len(), 2);
        assert_eq!(requests[0].messages[1].text(), Some("What is Rust?"));

        assert_eq!(
            notifier.all(),
            vec!["Sending 1 notes with 4 tokens to gpt-4".to_string()]
        );
        // One save before building context, one after the reply
        assert_eq!(canvas.save_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_response_removes_placeholder() {
        let canvas = canvas();
        canvas.set_selection(&["q"]).await;
        let provider = Arc::new(ScriptedProvider::new(Reply::Empty));
        let notifier = Arc::new(RecordingNotifier::default());

        let outcome = generator(settings(), provider.clone(), notifier.clone())
            .generate_note(Some(&*canvas))
            .await
            .unwrap();

        assert_eq!(outcome, GenerationOutcome::EmptyResponse);
        assert!(canvas.children("q").await.is_empty());
        assert_eq!(canvas.nodes().await.len(), 3);
        assert!(notifier.all().iter().any(|n| n.contains("Empty or unreadable")));
    }

    #[tokio::test]
    async fn test_request_error_removes_placeholder_and_notifies() {
        let canvas = canvas();
        canvas.set_selection(&["q"]).await;
        let provider = Arc::new(ScriptedProvider::new(Reply::Fail("rate limited")));
        let notifier = Arc::new(RecordingNotifier::default());

        let outcome = generator(settings(), provider.clone(), notifier.clone())
            .generate_note(Some(&*canvas))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            GenerationOutcome::RequestFailed {
                message: "rate limited".into()
            }
        );
        assert!(canvas.children("q").await.is_empty());
        assert!(
            notifier
                .all()
                .contains(&"Error calling gpt-4: rate limited".to_string())
        );
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_api_key_blocks_everything() {
        let canvas = canvas();
        canvas.set_selection(&["q"]).await;
        let provider = Arc::new(ScriptedProvider::new(Reply::Text("unused")));
        let notifier = Arc::new(RecordingNotifier::default());
        let settings = Settings {
            api_key: None,
            ..settings()
        };

        let outcome = generator(settings, provider.clone(), notifier.clone())
            .generate_note(Some(&*canvas))
            .await
            .unwrap();

        assert_eq!(outcome, GenerationOutcome::MissingApiKey);
        assert_eq!(provider.calls(), 0);
        assert_eq!(canvas.save_count(), 0);
        assert_eq!(canvas.frame_count(), 0);
        assert_eq!(notifier.all().len(), 1);
    }

    #[tokio::test]
    async fn test_no_or_multiple_selection_makes_no_request() {
        let canvas = canvas();
        let provider = Arc::new(ScriptedProvider::new(Reply::Text("unused")));
        let notifier = Arc::new(RecordingNotifier::default());
        let generator = generator(settings(), provider.clone(), notifier.clone());

        let outcome = generator.generate_note(Some(&*canvas)).await.unwrap();
        assert_eq!(outcome, GenerationOutcome::NoSelection);

        canvas.set_selection(&["q", "other"]).await;
        let outcome = generator.generate_note(Some(&*canvas)).await.unwrap();
        assert_eq!(outcome, GenerationOutcome::NoSelection);

        assert_eq!(provider.calls(), 0);
        assert_eq!(canvas.nodes().await.len(), 3);
        assert!(notifier.all().is_empty());
    }

    #[tokio::test]
    async fn test_no_canvas_aborts_silently() {
        let provider = Arc::new(ScriptedProvider::new(Reply::Text("unused")));
        let notifier = Arc::new(RecordingNotifier::default());
        let outcome = generator(settings(), provider.clone(), notifier.clone())
            .generate_note::<CanvasSession>(None)
            .await
            .unwrap();
        assert_eq!(outcome, GenerationOutcome::NoCanvas);
        assert!(notifier.all().is_empty());
    }

    #[tokio::test]
    async fn test_empty_context_sends_nothing() {
        let canvas = canvas();
        canvas.set_selection(&["blank"]).await;
        let provider = Arc::new(ScriptedProvider::new(Reply::Text("unused")));
        let notifier = Arc::new(RecordingNotifier::default());

        let outcome = generator(settings(), provider.clone(), notifier.clone())
            .generate_note(Some(&*canvas))
            .await
            .unwrap();
        assert_eq!(outcome, GenerationOutcome::EmptyContext);
        assert_eq!(provider.calls(), 0);
        assert!(canvas.children("blank").await.is_empty());
    }

    #[tokio::test]
    async fn test_selection_change_during_request_is_respected() {
        let canvas = canvas();
        canvas.set_selection(&["q"]).await;
        let provider = Arc::new(ScriptedProvider {
            canvas: Some(canvas.clone()),
            select_during_request: Some("other"),
            ..ScriptedProvider::new(Reply::Text("answer"))
        });
        let notifier = Arc::new(RecordingNotifier::default());

        let outcome = generator(settings(), provider, notifier)
            .generate_note(Some(&*canvas))
            .await
            .unwrap();

        assert!(matches!(outcome, GenerationOutcome::Populated { .. }));
        assert_eq!(canvas.selection().await, vec!["other".to_string()]);
    }

    #[tokio::test]
    async fn test_deleted_placeholder_is_not_recreated() {
        let canvas = canvas();
        canvas.set_selection(&["q"]).await;
        let provider = Arc::new(ScriptedProvider {
            canvas: Some(canvas.clone()),
            delete_placeholder: true,
            ..ScriptedProvider::new(Reply::Text("answer"))
        });
        let notifier = Arc::new(RecordingNotifier::default());

        let outcome = generator(settings(), provider, notifier)
            .generate_note(Some(&*canvas))
            .await
            .unwrap();

        assert_eq!(outcome, GenerationOutcome::PlaceholderGone);
        assert!(canvas.children("q").await.is_empty());
        assert_eq!(canvas.nodes().await.len(), 3);
    }

    #[tokio::test]
    async fn test_long_reply_grows_note() {
        let canvas = canvas();
        canvas.set_selection(&["q"]).await;
        let long: &'static str = Box::leak("word ".repeat(200).into_boxed_str());
        let provider = Arc::new(ScriptedProvider::new(Reply::Text(long)));
        let notifier = Arc::new(RecordingNotifier::default());

        generator(settings(), provider, notifier)
            .generate_note(Some(&*canvas))
            .await
            .unwrap();

        let child = &canvas.children("q").await[0];
        assert_eq!(child.height, calc_height(long, 80));
        assert!(child.height > 80);
    }

    #[tokio::test]
    async fn test_next_note_creates_empty_editable_child() {
        let canvas = canvas();
        canvas.set_selection(&["q"]).await;
        let provider = Arc::new(ScriptedProvider::new(Reply::Text("unused")));
        let notifier = Arc::new(RecordingNotifier::default());

        let created = generator(settings(), provider.clone(), notifier)
            .next_note(Some(&*canvas))
            .await
            .unwrap()
            .expect("a note should be created");

        let node = canvas.node(&created).await.unwrap();
        assert_eq!(node.text(), Some(""));
        assert!(node.chat_role().is_none());
        assert_eq!(node.height, EMPTY_NOTE_HEIGHT);
        assert_eq!(canvas.editing().await, Some(created.clone()));
        assert_eq!(canvas.children("q").await.len(), 1);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_preview_context_has_no_side_effects() {
        let canvas = canvas();
        canvas.set_selection(&["q"]).await;
        let provider = Arc::new(ScriptedProvider::new(Reply::Text("unused")));
        let notifier = Arc::new(RecordingNotifier::default());

        let window = generator(settings(), provider.clone(), notifier)
            .preview_context(Some(&*canvas))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(window.note_count(), 1);
        assert_eq!(provider.calls(), 0);
        assert_eq!(canvas.nodes().await.len(), 3);
        assert_eq!(canvas.save_count(), 0);
    }

    #[tokio::test]
    async fn test_edits_flushed_by_save_are_sent() {
        let session = canvas();
        session.set_selection(&["q"]).await;
        let host = EditingCanvas::new(session.clone());
        *host.edit_on_save.lock().unwrap() = Some(("q", "What is Rust, really?"));
        let provider = Arc::new(ScriptedProvider::new(Reply::Text("answer")));
        let notifier = Arc::new(RecordingNotifier::default());

        let outcome = generator(settings(), provider.clone(), notifier)
            .generate_note(Some(&host))
            .await
            .unwrap();

        assert!(matches!(outcome, GenerationOutcome::Populated { .. }));
        let requests = provider.requests.lock().unwrap();
        assert_eq!(
            requests[0].messages.last().and_then(|m| m.text()),
            Some("What is Rust, really?")
        );
    }

    #[tokio::test]
    async fn test_failed_write_back_removes_placeholder() {
        let session = canvas();
        session.set_selection(&["q"]).await;
        let host = EditingCanvas {
            refuse_set_text: true,
            ..EditingCanvas::new(session.clone())
        };
        let provider = Arc::new(ScriptedProvider::new(Reply::Text("answer")));
        let notifier = Arc::new(RecordingNotifier::default());

        let outcome = generator(settings(), provider, notifier.clone())
            .generate_note(Some(&host))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            GenerationOutcome::RequestFailed {
                message: "host refused".into()
            }
        );
        assert!(session.children("q").await.is_empty());
        assert_eq!(session.nodes().await.len(), 3);
        assert!(
            notifier
                .all()
                .contains(&"Error calling gpt-4: host refused".to_string())
        );
        // Pre-request save and the closing save both ran
        assert_eq!(session.save_count(), 2);
    }
}
