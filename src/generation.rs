//! Text-generation providers.
//!
//! Every provider decodes greedily: temperature comes from config (0.1 by
//! default), Ollama additionally pins `top_k = 1` and `seed = 0`, and the
//! OpenAI request carries `seed = 0`. The per-call timeout is enforced by
//! [`finrag_core::generate::generate_answer`]; the HTTP client timeout is a
//! backstop set to the same value.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use finrag_core::generate::{GenerationParams, Generator, UnavailableGenerator};

use crate::config::GenerationConfig;
use crate::http;

/// Transient HTTP failures are retried once.
const GENERATION_RETRIES: u32 = 1;

// ============ Ollama ============

/// Generator backed by Ollama's `POST /api/generate`.
pub struct OllamaGenerator {
    model: String,
    url: String,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "llama3.2".to_string()),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    top_k: u32,
    seed: u64,
    num_predict: usize,
    num_ctx: usize,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let body = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: params.temperature,
                top_k: 1,
                seed: 0,
                num_predict: params.max_new_tokens,
                num_ctx: params.max_length,
            },
        };
        let json = http::post_json_with_retry(
            &self.client,
            &format!("{}/api/generate", self.url.trim_end_matches('/')),
            None,
            &serde_json::to_value(&body)?,
            GENERATION_RETRIES,
            "Ollama",
        )
        .await?;

        let parsed: OllamaResponse =
            serde_json::from_value(json).context("failed to parse Ollama response")?;
        Ok(parsed.response)
    }
}

// ============ OpenAI ============

/// Generator backed by OpenAI chat completions.
///
/// The whole grounded prompt is sent as a single user message.
pub struct OpenAIGenerator {
    model: String,
    url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            api_key,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    seed: u64,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: params.temperature,
            max_tokens: params.max_new_tokens,
            seed: 0,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        let json = http::post_json_with_retry(
            &self.client,
            &format!("{}/v1/chat/completions", self.url.trim_end_matches('/')),
            Some(&self.api_key),
            &serde_json::to_value(&body)?,
            GENERATION_RETRIES,
            "OpenAI",
        )
        .await?;

        let parsed: ChatResponse =
            serde_json::from_value(json).context("failed to parse OpenAI response")?;
        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("OpenAI response contained no message content"))
    }
}

/// Create the [`Generator`] selected by `config.provider`.
///
/// `"disabled"` yields a generator that always fails, so answers become
/// `"Error generating response: ..."`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        "disabled" => Ok(Arc::new(UnavailableGenerator::new(
            "generation provider is disabled",
        ))),
        other => bail!("Unknown generation provider: {}", other),
    }
}

/// Decoding parameters for `config`.
pub fn params_from_config(config: &GenerationConfig) -> GenerationParams {
    GenerationParams {
        max_new_tokens: config.max_new_tokens,
        max_length: config.max_length,
        temperature: config.temperature,
        do_sample: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_request_is_greedy() {
        let body = OllamaRequest {
            model: "llama3.2",
            prompt: "p",
            stream: false,
            options: OllamaOptions {
                temperature: 0.1,
                top_k: 1,
                seed: 0,
                num_predict: 256,
                num_ctx: 512,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["top_k"], 1);
        assert_eq!(json["options"]["num_predict"], 256);
        assert_eq!(json["options"]["num_ctx"], 512);
    }

    #[test]
    fn test_chat_response_parsing() {
        let parsed: ChatResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Revenue grew 10%."}}]
        }))
        .unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("Revenue grew 10%.")
        );
    }

    #[test]
    fn test_params_from_config() {
        let params = params_from_config(&GenerationConfig::default());
        assert_eq!(params, GenerationParams::default());
    }

    #[tokio::test]
    async fn test_disabled_provider_fails() {
        let config = GenerationConfig {
            provider: "disabled".to_string(),
            ..GenerationConfig::default()
        };
        let generator = create_generator(&config).unwrap();
        assert!(generator
            .generate("p", &GenerationParams::default())
            .await
            .is_err());
        assert!(create_generator(&GenerationConfig {
            provider: "t5".to_string(),
            ..GenerationConfig::default()
        })
        .is_err());
    }
}
