//! # kbase-chat
//!
//! Cited question answering over a knowledge base built by `kbase-retriever`.
//! Each turn retrieves the nearest chunks, renders them into a prompt, asks a
//! text-generation service for an answer and appends a Sources section.
//!
//! ## Quick Start
//!
//! ```bash
//! kbase-retriever ingest --docs data/docs
//! GROQ_API_KEY=... kbase-chat
//! ```
//!
//! ### As a library
//! ```no_run
//! use kbase_chat::{
//!     AnswerAssembler, Conversation, CopilotService, GeneratorConfig, OpenAiCompatibleGenerator,
//! };
//! use kbase_embed::{EmbedConfig, FastEmbedProvider};
//! use kbase_retriever::{Retriever, storage::ArtifactStore};
//! use std::{sync::Arc, time::Duration};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let knowledge_base = Arc::new(ArtifactStore::new("backend/vector_db").open().await?);
//! let embedder = Arc::new(FastEmbedProvider::create(EmbedConfig::default()).await?);
//! let retriever = Retriever::new_checked(embedder, knowledge_base)?;
//!
//! let generator = Arc::new(OpenAiCompatibleGenerator::new(GeneratorConfig::new("gsk_..."))?);
//! let service = CopilotService::new(
//!     retriever,
//!     generator,
//!     AnswerAssembler::default(),
//!     4,
//!     Duration::from_secs(30),
//! )?;
//!
//! let mut conversation = Conversation::new();
//! let answer = service.ask(&mut conversation, "What is the refund policy?").await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`assembler`]: context numbering, the prompt template and the Sources section
//! - [`generator`]: the [`TextGenerator`] capability and its OpenAI-compatible HTTP client
//! - [`session`]: per-session [`Conversation`] history
//! - [`service`]: [`CopilotService`], one turn end to end
//! - [`repl`]: the line-oriented chat loop used by the binary

pub mod assembler;
pub mod error;
pub mod generator;
pub mod repl;
pub mod service;
pub mod session;

pub use assembler::{
    AnswerAssembler, ChatMessage, ComposedAnswer, DEFAULT_GENERATION_MODEL, GenerationRequest,
    PromptTemplate,
};
pub use error::{ChatError, GenerationError};
pub use generator::{GeneratorConfig, OpenAiCompatibleGenerator, TextGenerator};
pub use repl::run_repl;
pub use service::CopilotService;
pub use session::{Conversation, Message, Role};
