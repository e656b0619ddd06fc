//! End-to-end runs of the configured pipeline against a scripted Ollama.

mod common;

use common::{offline_config, MockOllama};
use finrag::runtime::build_pipeline;
use finrag_core::models::RawDocument;
use finrag_core::pipeline::Outcome;

fn revenue_filing() -> RawDocument {
    RawDocument {
        title: "Acme Q1 10-Q".to_string(),
        company: "Acme Corp".to_string(),
        doc_type: "10-Q".to_string(),
        content: "Revenue grew 10% in Q1. ".repeat(30),
        date_filed: chrono::NaiveDate::from_ymd_opt(2024, 5, 1),
    }
}

#[tokio::test]
async fn test_grounded_answer_through_ollama() {
    let ollama = MockOllama::start("  Revenue grew 10% in Q1, per Source 1.\n").await;
    let pipeline = build_pipeline(&ollama.config()).await.unwrap();

    let answer = pipeline
        .answer(&[revenue_filing()], "What was the Q1 revenue growth?")
        .await
        .unwrap();

    assert_eq!(answer.outcome, Outcome::Generated);
    assert_eq!(answer.text, "Revenue grew 10% in Q1, per Source 1.");
    assert_eq!(ollama.request_count(), 1);

    let requests = ollama.requests.lock().unwrap();
    let request = &requests[0];
    let prompt = request["prompt"].as_str().unwrap();
    assert!(prompt.contains("Source 1:\nCompany: Acme Corp\nDocument Type: 10-Q"));
    assert!(prompt.contains("What was the Q1 revenue growth?"));
    assert_eq!(request["stream"], false);
    assert_eq!(request["options"]["top_k"], 1);
    assert_eq!(request["options"]["num_predict"], 256);
}

#[tokio::test]
async fn test_refusal_never_calls_the_model() {
    let ollama = MockOllama::start("should not be used").await;
    let pipeline = build_pipeline(&ollama.config()).await.unwrap();

    let answer = pipeline
        .answer(&[RawDocument::uploaded("tiny.txt", "Q1 up.")], "What was Q1?")
        .await
        .unwrap();

    assert_eq!(answer.outcome, Outcome::Refused);
    assert_eq!(ollama.request_count(), 0);
}

#[tokio::test]
async fn test_repeated_question_reuses_index() {
    let ollama = MockOllama::start("Revenue grew 10%. (Source 1)").await;
    let pipeline = build_pipeline(&ollama.config()).await.unwrap();
    let docs = vec![revenue_filing()];

    let first = pipeline.answer(&docs, "revenue growth").await.unwrap();
    let second = pipeline.answer(&docs, "revenue growth").await.unwrap();

    assert_eq!(first.text, second.text);
    let stored = first.index.unwrap().stored();
    assert_eq!(second.index.unwrap().stored(), stored);
    assert_eq!(pipeline.indexed_count().await.unwrap(), stored);
}

#[tokio::test]
async fn test_unreachable_model_becomes_error_text() {
    let mut config = offline_config();
    config.generation.provider = "ollama".to_string();
    // nothing listens on the discard port
    config.generation.url = Some("http://127.0.0.1:9".to_string());
    config.generation.timeout_secs = 5;
    let pipeline = build_pipeline(&config).await.unwrap();

    let answer = pipeline
        .answer(&[revenue_filing()], "What was the Q1 revenue growth?")
        .await
        .unwrap();

    assert_eq!(answer.outcome, Outcome::GenerationFailed);
    assert!(answer.text.starts_with("Error generating response: "));
}
