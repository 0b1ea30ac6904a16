//! Narrative generator seam.
//!
//! The core never inspects generated prose; it only forwards deltas and
//! observes whether the stream finished or failed.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use augur_core::config::NarratorConfig;
use augur_core::types::{ConversationMode, QuerentRole, SessionTurn};
use tokio_stream::Stream;

use crate::error::ChatError;
use crate::payload::UploadContext;

/// Streamed text deltas from a narrator.
pub type NarrationStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

/// Everything a narrator needs for one generation.
#[derive(Debug, Clone)]
pub struct NarrationRequest {
    pub session_id: String,
    pub input: String,
    pub mode: ConversationMode,
    pub querent_role: QuerentRole,
    /// Assembled instructions from the plan, empty for plain conversation.
    pub instructions: Vec<String>,
    /// Role-specific voice framing once the querent is confirmed.
    pub voice: Option<String>,
    pub history: Vec<SessionTurn>,
    pub contexts: Vec<UploadContext>,
    /// The response must close with exactly one resonance question.
    pub force_question: bool,
    /// Relationship-specific framing is not allowed.
    pub generic_symbolic: bool,
}

#[async_trait]
pub trait Narrator: Send + Sync {
    /// Provider name, used in logs.
    fn name(&self) -> &str;

    /// Start a generation. Errors before the first delta are returned
    /// here; later failures arrive as `Err` items on the stream.
    async fn narrate(&self, request: NarrationRequest) -> Result<NarrationStream, ChatError>;
}

/// Deterministic narrator that restates its instructions.
pub struct EchoNarrator {
    chunk_chars: usize,
}

impl EchoNarrator {
    pub fn new(chunk_chars: usize) -> Self {
        Self {
            chunk_chars: chunk_chars.max(1),
        }
    }

    fn compose(request: &NarrationRequest) -> String {
        let mut text = if request.instructions.is_empty() {
            format!("You said: {}", request.input.trim())
        } else {
            request.instructions.join("\n")
        };
        if request.generic_symbolic {
            text.push_str("\n(Reading in generic symbolic mode: no relationship context given.)");
        }
        if request.force_question {
            text.push_str("\nDoes any of this match what you have actually lived?");
        }
        text
    }
}

#[async_trait]
impl Narrator for EchoNarrator {
    fn name(&self) -> &str {
        "echo"
    }

    async fn narrate(&self, request: NarrationRequest) -> Result<NarrationStream, ChatError> {
        let chars: Vec<char> = Self::compose(&request).chars().collect();
        let chunks: Vec<Result<String, ChatError>> = chars
            .chunks(self.chunk_chars)
            .map(|c| Ok(c.iter().collect()))
            .collect();
        Ok(Box::pin(tokio_stream::iter(chunks)))
    }
}

/// Build the narrator named in config.
pub fn narrator_from_config(config: &NarratorConfig) -> Result<Arc<dyn Narrator>, ChatError> {
    match config.provider.as_str() {
        "echo" => Ok(Arc::new(EchoNarrator::new(config.chunk_chars))),
        other => Err(ChatError::NarratorError(format!(
            "unknown narrator provider: {}",
            other
        ))),
    }
}
