//! Turning retrieved chunks into a generation request, and a raw answer into
//! the cited answer shown to the user.

use crate::error::ChatError;
use crate::session::Role;
use itertools::Itertools;
use kbase_retriever::RetrievedChunk;
use serde::{Deserialize, Serialize};

/// Model used when no other is configured
pub const DEFAULT_GENERATION_MODEL: &str = "llama-3.1-8b-instant";
/// Sampling temperature used when no other is configured
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

const CONTEXT_PLACEHOLDER: &str = "{context}";
const QUERY_PLACEHOLDER: &str = "{query}";

/// A versioned prompt contract.
///
/// `user_template` must contain the `{context}` and `{query}` placeholders.
/// Changing the wording should come with a new `id` so answers can be traced
/// back to the prompt that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub id: String,
    pub system: String,
    pub user_template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            id: "cited-context-v1".to_string(),
            system: "You are a helpful assistant.".to_string(),
            user_template: "You are an internal company knowledge assistant.\n\n\
                            Use ONLY the information below.\n\n\
                            Context:\n{context}\n\n\
                            Question:\n{query}\n\n\
                            Answer clearly and cite sources.\n"
                .to_string(),
        }
    }
}

impl PromptTemplate {
    pub fn new(
        id: impl Into<String>,
        system: impl Into<String>,
        user_template: impl Into<String>,
    ) -> Result<Self, ChatError> {
        let template = Self {
            id: id.into(),
            system: system.into(),
            user_template: user_template.into(),
        };
        for placeholder in [CONTEXT_PLACEHOLDER, QUERY_PLACEHOLDER] {
            if !template.user_template.contains(placeholder) {
                return Err(ChatError::Config(format!(
                    "prompt template '{}' is missing the {placeholder} placeholder",
                    template.id
                )));
            }
        }
        Ok(template)
    }

    /// Substitutes both placeholders in one pass, so text inside `context`
    /// or `query` that looks like a placeholder is left alone.
    pub fn render(&self, context: &str, query: &str) -> String {
        let mut out = String::with_capacity(self.user_template.len() + context.len() + query.len());
        let mut rest = self.user_template.as_str();
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            if let Some(after) = tail.strip_prefix(CONTEXT_PLACEHOLDER) {
                out.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(QUERY_PLACEHOLDER) {
                out.push_str(query);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

/// One message of a generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Body of a chat-completion call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

/// The answer shown to the user, with the material it was built from
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedAnswer {
    /// Raw answer followed by the Sources section
    pub text: String,
    /// The generator's answer as returned
    pub raw: String,
    /// Distinct sources of the retrieved chunks, first-seen order
    pub sources: Vec<String>,
    pub retrieved: Vec<RetrievedChunk>,
}

impl std::fmt::Display for ComposedAnswer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Numbers each chunk as `[Source i]`, 1-indexed in result order.
pub fn build_context(results: &[RetrievedChunk]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| format!("[Source {}] {}\n\n", i + 1, result.text))
        .collect()
}

/// Source names of `results` with duplicates removed, in first-seen order.
pub fn unique_sources(results: &[RetrievedChunk]) -> Vec<String> {
    results
        .iter()
        .map(|result| result.source.clone())
        .unique()
        .collect()
}

/// Appends a Sources section listing `sources` to the raw answer.
pub fn compose_answer(raw: &str, sources: &[String]) -> String {
    let listing = sources.iter().map(|source| format!("- {source}")).join("\n");
    format!("{raw}\n\n---\n\n### Sources\n{listing}")
}

/// Builds generation requests and composes cited answers
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerAssembler {
    template: PromptTemplate,
    model: String,
    temperature: f32,
}

impl Default for AnswerAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_GENERATION_MODEL)
    }
}

impl AnswerAssembler {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            template: PromptTemplate::default(),
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// A system message plus the rendered prompt for `query`.
    pub fn build_request(&self, query: &str, results: &[RetrievedChunk]) -> GenerationRequest {
        let context = build_context(results);
        GenerationRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: self.template.system.clone(),
                },
                ChatMessage {
                    role: Role::User,
                    content: self.template.render(&context, query),
                },
            ],
            temperature: self.temperature,
        }
    }

    pub fn compose(&self, raw: String, retrieved: Vec<RetrievedChunk>) -> ComposedAnswer {
        let sources = unique_sources(&retrieved);
        ComposedAnswer {
            text: compose_answer(&raw, &sources),
            raw,
            sources,
            retrieved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(position: usize, source: &str, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            position,
            distance: position as f32,
            text: text.to_string(),
            source: source.to_string(),
        }
    }

    #[test]
    fn test_build_context_numbers_from_one() {
        let results = vec![
            chunk(3, "refunds.txt", "Refunds take 14 days."),
            chunk(0, "leave.txt", "Leave is 20 days."),
        ];
        assert_eq!(
            build_context(&results),
            "[Source 1] Refunds take 14 days.\n\n[Source 2] Leave is 20 days.\n\n"
        );
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn test_same_source_listed_once() {
        let results = vec![
            chunk(0, "refunds.txt", "a"),
            chunk(1, "leave.txt", "b"),
            chunk(2, "refunds.txt", "c"),
        ];
        assert_eq!(unique_sources(&results), vec!["refunds.txt", "leave.txt"]);
    }

    #[test]
    fn test_compose_answer_format() {
        let sources = vec!["a.txt".to_string(), "b.txt".to_string()];
        assert_eq!(
            compose_answer("Refunds take 14 days [Source 1].", &sources),
            "Refunds take 14 days [Source 1].\n\n---\n\n### Sources\n- a.txt\n- b.txt"
        );
    }

    #[test]
    fn test_build_request_shape() {
        let assembler = AnswerAssembler::default();
        let request =
            assembler.build_request("What is the refund window?", &[chunk(0, "a.txt", "14 days.")]);

        assert_eq!(request.model, "llama-3.1-8b-instant");
        assert_eq!(request.temperature, 0.2);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[0].content, "You are a helpful assistant.");
        assert_eq!(request.messages[1].role, Role::User);

        let prompt = &request.messages[1].content;
        assert!(prompt.contains("Use ONLY the information below."));
        assert!(prompt.contains("Context:\n[Source 1] 14 days.\n\n"));
        assert!(prompt.contains("Question:\nWhat is the refund window?"));
        assert!(prompt.ends_with("cite sources.\n"));

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[test]
    fn test_render_leaves_placeholder_lookalikes_in_input() {
        let template = PromptTemplate::default();
        let rendered = template.render("context mentions {query}", "what is {context}?");
        assert!(rendered.contains("context mentions {query}"));
        assert!(rendered.contains("what is {context}?"));
    }

    #[test]
    fn test_custom_template_requires_placeholders() {
        assert!(PromptTemplate::new("t1", "sys", "Q: {query}").is_err());
        let template = PromptTemplate::new("t2", "sys", "{context} / {query} {literal}").unwrap();
        assert_eq!(template.render("C", "Q"), "C / Q {literal}");
    }

    #[test]
    fn test_compose_keeps_raw_and_sources() {
        let assembler = AnswerAssembler::default();
        let answer = assembler.compose(
            "Answer.".to_string(),
            vec![chunk(0, "a.txt", "x"), chunk(1, "a.txt", "y")],
        );
        assert_eq!(answer.raw, "Answer.");
        assert_eq!(answer.sources, vec!["a.txt"]);
        assert_eq!(answer.to_string(), "Answer.\n\n---\n\n### Sources\n- a.txt");
        assert_eq!(answer.retrieved.len(), 2);
    }
}
