//! One question-answering turn: retrieve, prompt, generate, compose.

use crate::assembler::{AnswerAssembler, ComposedAnswer};
use crate::error::{ChatError, GenerationError};
use crate::generator::TextGenerator;
use crate::session::Conversation;
use kbase_retriever::Retriever;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Answers questions against a loaded knowledge base.
///
/// Built once in `main` and shared for the life of the process. Conversation
/// state is not held here; each call gets the session it should update.
#[derive(Clone)]
pub struct CopilotService {
    retriever: Retriever,
    generator: Arc<dyn TextGenerator>,
    assembler: AnswerAssembler,
    top_k: usize,
    timeout: Duration,
}

impl std::fmt::Debug for CopilotService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopilotService")
            .field("retriever", &self.retriever)
            .field("generator", &self.generator.name())
            .field("assembler", &self.assembler)
            .field("top_k", &self.top_k)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CopilotService {
    pub fn new(
        retriever: Retriever,
        generator: Arc<dyn TextGenerator>,
        assembler: AnswerAssembler,
        top_k: usize,
        timeout: Duration,
    ) -> Result<Self, ChatError> {
        if top_k == 0 {
            return Err(ChatError::Config("k must be at least 1".to_string()));
        }
        if timeout.is_zero() {
            return Err(ChatError::Config(
                "generation timeout must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            retriever,
            generator,
            assembler,
            top_k,
            timeout,
        })
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answers `query` and records the turn in `conversation`.
    ///
    /// The user and assistant messages are appended together after the answer
    /// is composed. On error `conversation` is left as it was.
    pub async fn ask(
        &self,
        conversation: &mut Conversation,
        query: &str,
    ) -> Result<ComposedAnswer, ChatError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ChatError::EmptyQuery);
        }
        let started = Instant::now();

        let retrieved = self.retriever.retrieve(query, self.top_k).await?;
        debug!(
            "Retrieved {} chunks from {:?}",
            retrieved.len(),
            retrieved.iter().map(|r| r.source.as_str()).collect::<Vec<_>>()
        );

        let request = self.assembler.build_request(query, &retrieved);
        let raw = match tokio::time::timeout(self.timeout, self.generator.generate(&request)).await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!("Generation exceeded {:?}", self.timeout);
                return Err(GenerationError::Timeout(self.timeout).into());
            }
        };

        let answer = self.assembler.compose(raw, retrieved);
        conversation.record_turn(query, answer.text.clone());
        info!(
            "Answered in {:.2?} citing {} sources",
            started.elapsed(),
            answer.sources.len()
        );
        Ok(answer)
    }
}
