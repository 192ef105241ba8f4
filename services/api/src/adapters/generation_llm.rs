//! services/api/src/adapters/generation_llm.rs
//!
//! This module contains the adapter for the coaching LLM.
//! It implements the `GenerationService` port from the `core` crate.

const CONSULTANT_PERSONA: &str = "You're an intelligent and professional consultant who is respectful, deeply intuitive and part of the top 1% in the world. You also have an expanded background in behavioural psychology and therapy. Therefore, respond intelligently to user's messages like you care deeply about conversing with them without scaring them off then proceed with the consultation.";

const COMMENTARY_MAX_TOKENS: u32 = 500;
const REPLY_MAX_TOKENS: u32 = 300;
const TEMPERATURE: f32 = 0.7;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde::Serialize;
use value_coach_core::ports::{
    GenerationContext, GenerationService, PortError, PortResult, UserContext,
};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `GenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiGenerationAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiGenerationAdapter {
    /// Creates a new `OpenAiGenerationAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    async fn complete(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        max_tokens: u32,
    ) -> PortResult<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(max_tokens)
            .temperature(TEMPERATURE)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                PortError::Unexpected("Generation LLM response contained no text content.".to_string())
            })
    }
}

//=========================================================================================
// Prompt Assembly
//=========================================================================================

/// The JSON shape of one prior response inside the system prompt.
#[derive(Serialize)]
struct PriorResponse<'a> {
    session_type: &'a str,
    question_number: u32,
    question_text: &'a str,
    user_answer: &'a str,
    gpt_response: &'a str,
}

fn user_section(user: &UserContext) -> String {
    format!(
        "Context about the user:\n- Name: {}\n- Location: {}",
        or_default(&user.user_name, "User"),
        or_default(&user.user_location, "Not specified"),
    )
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

/// Builds the system prompt for commentary on an answer.
pub(crate) fn commentary_prompt(
    prompt_template: &str,
    answer: &str,
    context: &GenerationContext,
) -> PortResult<String> {
    let previous: Vec<PriorResponse<'_>> = context
        .previous_responses
        .iter()
        .map(|entry| PriorResponse {
            session_type: entry.stage.as_str(),
            question_number: entry.response.question_number,
            question_text: &entry.response.question_text,
            user_answer: &entry.response.answer_text,
            gpt_response: &entry.response.generated_text,
        })
        .collect();
    let previous =
        serde_json::to_string(&previous).map_err(|e| PortError::Unexpected(e.to_string()))?;

    Ok(format!(
        "{}\n\n{}\n- Previous responses: {}\n\nUser's current answer: {}",
        prompt_template,
        user_section(&context.user),
        previous,
        answer
    ))
}

//=========================================================================================
// `GenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl GenerationService for OpenAiGenerationAdapter {
    async fn generate_commentary(
        &self,
        prompt_template: &str,
        answer: &str,
        context: &GenerationContext,
    ) -> PortResult<String> {
        let system_prompt = commentary_prompt(prompt_template, answer, context)?;
        let messages = vec![ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into()];

        self.complete(messages, COMMENTARY_MAX_TOKENS).await
    }

    async fn generate_reply(&self, message: &str, context: &UserContext) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(format!("{}\n\n{}", CONSULTANT_PERSONA, user_section(context)))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(message)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        self.complete(messages, REPLY_MAX_TOKENS).await
    }
}
