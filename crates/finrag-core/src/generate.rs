//! Generator contract and answer post-processing.
//!
//! A [`Generator`] turns a prompt into text. Backends (Ollama, OpenAI) live
//! in the app crate; this module owns the invocation policy:
//!
//! - decoding is deterministic ([`GenerationParams::do_sample`] is always
//!   `false`, temperature stays low),
//! - every call runs under a timeout,
//! - failures become an answer string instead of an error,
//! - immediately repeated words and short phrases are collapsed.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RagError;

/// Prefix of the answer text produced when generation fails.
pub const GENERATION_ERROR_PREFIX: &str = "Error generating response: ";

/// Longest phrase, in space-separated tokens, that [`clean_response`] collapses.
const MAX_REPEATED_PHRASE: usize = 4;

/// Decoding parameters passed to every generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Upper bound on generated tokens.
    pub max_new_tokens: usize,
    /// Context window (prompt + output) requested from the backend.
    pub max_length: usize,
    pub temperature: f32,
    /// Always `false`: answers use greedy decoding.
    pub do_sample: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 256,
            max_length: 512,
            temperature: 0.1,
            do_sample: false,
        }
    }
}

/// A text-generation backend.
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;

    /// Generate a continuation of `prompt`. Returns only the generated text.
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}

/// Result of [`generate_answer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    /// Cleaned model output.
    Completed(String),
    /// `"Error generating response: <cause>"`.
    Failed(String),
}

impl Generation {
    pub fn text(&self) -> &str {
        match self {
            Generation::Completed(t) | Generation::Failed(t) => t,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Generation::Completed(t) | Generation::Failed(t) => t,
        }
    }
}

/// Call `generator` under `timeout` and post-process the output.
///
/// Never returns an error: a backend failure or a timeout is reported as
/// [`Generation::Failed`] carrying the error text.
pub async fn generate_answer(
    generator: &dyn Generator,
    prompt: &str,
    params: &GenerationParams,
    timeout: Duration,
) -> Generation {
    let params = GenerationParams {
        do_sample: false,
        ..*params
    };

    let result = match tokio::time::timeout(timeout, generator.generate(prompt, &params)).await {
        Ok(result) => result,
        Err(_) => Err(RagError::ModelTimeout(timeout).into()),
    };

    match result {
        Ok(output) => Generation::Completed(clean_response(output.trim())),
        Err(e) => {
            tracing::warn!(model = generator.model_name(), error = %e, "generation failed");
            Generation::Failed(format!("{}{}", GENERATION_ERROR_PREFIX, e))
        }
    }
}

/// Collapse immediate repetitions of a token or short phrase.
///
/// Tokens are split on single spaces. Whenever the output ends with the
/// same run of 1 to 4 tokens twice in a row, the second copy is dropped,
/// so `"10% 10% 10%"` becomes `"10%"` and `"grew 10% grew 10%"` becomes
/// `"grew 10%"`.
///
/// ```rust
/// use finrag_core::generate::clean_response;
///
/// assert_eq!(clean_response("Revenue grew grew 10% 10%."), "Revenue grew 10% 10%.");
/// assert_eq!(clean_response("Source 1 Source 1 says 10%"), "Source 1 says 10%");
/// ```
pub fn clean_response(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();

    for token in text.split(' ') {
        out.push(token);
        while collapse_tail(&mut out) {}
    }

    out.join(" ")
}

fn collapse_tail(out: &mut Vec<&str>) -> bool {
    let n = out.len();
    for width in 1..=MAX_REPEATED_PHRASE {
        if n < 2 * width {
            break;
        }
        let (first, second) = (&out[n - 2 * width..n - width], &out[n - width..]);
        if first == second && second.iter().all(|t| !t.is_empty()) {
            out.truncate(n - width);
            return true;
        }
    }
    false
}

/// Generator that always fails with [`RagError::ModelUnavailable`].
///
/// Used when generation is disabled in configuration.
pub struct UnavailableGenerator {
    reason: String,
}

impl UnavailableGenerator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Generator for UnavailableGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
        Err(RagError::ModelUnavailable(self.reason.clone()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording {
        output: String,
        seen: Mutex<Vec<GenerationParams>>,
    }

    #[async_trait]
    impl Generator for Recording {
        fn model_name(&self) -> &str {
            "recording"
        }
        async fn generate(&self, _prompt: &str, params: &GenerationParams) -> Result<String> {
            self.seen.lock().unwrap().push(*params);
            Ok(self.output.clone())
        }
    }

    struct Slow;

    #[async_trait]
    impl Generator for Slow {
        fn model_name(&self) -> &str {
            "slow"
        }
        async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok("too late".to_string())
        }
    }

    #[test]
    fn test_clean_single_token_repeats() {
        assert_eq!(clean_response("10% 10% 10% growth"), "10% growth");
        assert_eq!(clean_response("the the answer"), "the answer");
    }

    #[test]
    fn test_clean_phrase_repeats() {
        assert_eq!(
            clean_response("Revenue grew 10% Revenue grew 10% Revenue grew 10%"),
            "Revenue grew 10%"
        );
        assert_eq!(
            clean_response("a b c d a b c d end"),
            "a b c d end"
        );
    }

    #[test]
    fn test_clean_leaves_distinct_text() {
        let text = "Revenue grew 10% in Q1 (Source 1).";
        assert_eq!(clean_response(text), text);
        assert_eq!(clean_response(""), "");
    }

    #[test]
    fn test_clean_does_not_merge_across_double_spaces() {
        assert_eq!(clean_response("yes  yes"), "yes  yes");
    }

    #[tokio::test]
    async fn test_generation_forces_greedy_decoding() {
        let g = Recording {
            output: "  Revenue grew 10% 10% (Source 1)\n".to_string(),
            seen: Mutex::new(Vec::new()),
        };
        let sampled = GenerationParams {
            do_sample: true,
            ..GenerationParams::default()
        };
        let out = generate_answer(&g, "prompt", &sampled, Duration::from_secs(5)).await;

        assert_eq!(out, Generation::Completed("Revenue grew 10% (Source 1)".to_string()));
        let seen = g.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(!seen[0].do_sample);
        assert_eq!(seen[0].max_new_tokens, 256);
        assert_eq!(seen[0].max_length, 512);
    }

    #[tokio::test]
    async fn test_unavailable_model_becomes_error_text() {
        let g = UnavailableGenerator::new("generation disabled");
        let out = generate_answer(&g, "p", &GenerationParams::default(), Duration::from_secs(1)).await;
        match out {
            Generation::Failed(text) => {
                assert!(text.starts_with(GENERATION_ERROR_PREFIX));
                assert!(text.contains("generation disabled"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_error_text() {
        let out = generate_answer(
            &Slow,
            "p",
            &GenerationParams::default(),
            Duration::from_secs(60),
        )
        .await;
        assert_eq!(
            out.text(),
            "Error generating response: model timed out after 60s"
        );
    }
}
