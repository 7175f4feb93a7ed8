//! Google Gemini provider implementation
//!
//! Uses the `streamGenerateContent` endpoint in server-sent-events mode.
//! Every event carries a partial `GenerateContentResponse`; the text parts of
//! each one form a fragment.

use super::types::{FragmentStream, LlmMessage, MessageRole, Usage};
use super::{ChatSession, LlmError, LlmService};
use crate::config::LlmConfig;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini service implementation
pub struct GeminiService {
    inner: Arc<GeminiClient>,
}

struct GeminiClient {
    client: Client,
    /// Absent in gateway mode
    api_key: Option<String>,
    url: String,
    model_id: String,
}

impl GeminiService {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .effective_api_key()
            .map_err(|e| LlmError::auth(e.to_string()))?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            inner: Arc::new(GeminiClient {
                client,
                api_key,
                url: stream_url(&config.model, config.gateway.as_deref()),
                model_id: config.model.clone(),
            }),
        })
    }
}

fn stream_url(model: &str, gateway: Option<&str>) -> String {
    let base = match gateway {
        Some(gw) => format!("{}/gemini/v1beta", gw.trim_end_matches('/')),
        None => GEMINI_BASE_URL.to_string(),
    };
    format!("{base}/models/{model}:streamGenerateContent?alt=sse")
}

impl LlmService for GeminiService {
    fn start_chat(&self, system_instruction: &str) -> Result<Arc<dyn ChatSession>, LlmError> {
        Ok(Arc::new(GeminiChat {
            client: self.inner.clone(),
            system_instruction: system_instruction.to_string(),
            history: Arc::new(Mutex::new(Vec::new())),
        }))
    }

    fn model_id(&self) -> &str {
        &self.inner.model_id
    }
}

/// One chat session; remembers completed exchanges
struct GeminiChat {
    client: Arc<GeminiClient>,
    system_instruction: String,
    history: Arc<Mutex<Vec<LlmMessage>>>,
}

#[async_trait]
impl ChatSession for GeminiChat {
    async fn send_message_stream(&self, text: &str) -> Result<FragmentStream, LlmError> {
        let user_message = LlmMessage::user(text);
        let mut messages = self
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        messages.push(user_message.clone());

        let request = translate_request(&self.system_instruction, &messages);

        let mut builder = self
            .client
            .client
            .post(&self.client.url)
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(api_key) = &self.client.api_key {
            builder = builder.header("x-goog-api-key", api_key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::network(format!("Request timeout: {e}"))
            } else if e.is_connect() {
                LlmError::network(format!("Connection failed: {e}"))
            } else {
                LlmError::unknown(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| LlmError::network(format!("Failed to read error response: {e}")))?;
            return Err(match serde_json::from_str::<GeminiErrorResponse>(&body) {
                Ok(error_resp) => LlmError::from_status(status.as_u16(), &error_resp.error.message),
                Err(_) => LlmError::from_status(status.as_u16(), &body),
            });
        }

        let history = self.history.clone();
        let stream = async_stream::stream! {
            let events = response.bytes_stream().eventsource();
            tokio::pin!(events);

            let mut reply = String::new();
            let mut finished = false;
            let mut usage = Usage::default();

            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(LlmError::network(format!("Stream error: {e}")));
                        return;
                    }
                };

                let chunk = match parse_chunk(&event.data) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };

                if let Some(chunk_usage) = chunk.usage {
                    usage = chunk_usage;
                }
                if !chunk.text.is_empty() {
                    reply.push_str(&chunk.text);
                    yield Ok(chunk.text);
                }
                // Text that arrived with the stop is kept; the reply still fails
                if let Some(reason) = chunk.stopped {
                    yield Err(LlmError::blocked(format!("Reply stopped: {reason}")));
                    return;
                }
                if chunk.finished {
                    finished = true;
                    break;
                }
            }

            if !finished {
                yield Err(LlmError::network("Stream ended before the model finished"));
                return;
            }

            tracing::debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Gemini reply recorded in session history"
            );
            let mut history = history.lock().unwrap_or_else(PoisonError::into_inner);
            history.push(user_message);
            history.push(LlmMessage::assistant(reply));
        };

        Ok(Box::pin(stream))
    }

    fn history_len(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

pub(super) fn translate_request(system_instruction: &str, messages: &[LlmMessage]) -> GeminiRequest {
    let system_instruction = if system_instruction.is_empty() {
        None
    } else {
        Some(GeminiContent {
            role: None,
            parts: vec![GeminiPart::text(system_instruction)],
        })
    };

    let contents = messages
        .iter()
        .map(|msg| GeminiContent {
            role: Some(
                match msg.role {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "model",
                }
                .to_string(),
            ),
            parts: vec![GeminiPart::text(&msg.text)],
        })
        .collect();

    GeminiRequest {
        contents,
        system_instruction,
    }
}

/// What one stream event contributed
#[derive(Debug, Default, PartialEq, Eq)]
pub(super) struct ParsedChunk {
    pub text: String,
    /// The model reported a finish reason that ends the reply normally
    pub finished: bool,
    /// Any other finish reason; the reply ends in error after `text`
    pub stopped: Option<String>,
    pub usage: Option<Usage>,
}

/// Parse one event payload.
///
/// Prompt blocks are errors. `STOP` and `MAX_TOKENS` end the reply
/// normally; any other finish reason lands in `stopped`.
pub(super) fn parse_chunk(data: &str) -> Result<ParsedChunk, LlmError> {
    let response: GeminiResponse = serde_json::from_str(data)
        .map_err(|e| LlmError::malformed(format!("Failed to parse stream chunk: {e} - data: {data}")))?;

    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(LlmError::blocked(format!("Prompt blocked: {reason}")));
    }

    let mut parsed = ParsedChunk {
        usage: response.usage_metadata.map(|u| Usage {
            input_tokens: u64::from(u.prompt_token_count),
            output_tokens: u64::from(u.candidates_token_count),
        }),
        ..ParsedChunk::default()
    };

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Ok(parsed);
    };

    if let Some(content) = candidate.content {
        for part in content.parts {
            if part.thought == Some(true) {
                continue;
            }
            if let Some(text) = part.text {
                parsed.text.push_str(&text);
            }
        }
    }

    match candidate.finish_reason.as_deref() {
        None | Some("FINISH_REASON_UNSPECIFIED") => {}
        Some("STOP" | "MAX_TOKENS") => parsed.finished = true,
        Some(reason) => parsed.stopped = Some(reason.to_string()),
    }

    Ok(parsed)
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

impl GeminiPart {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            thought: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}
