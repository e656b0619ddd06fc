//! Prompt assembly with grounding rules.
//!
//! Retrieved passages become numbered `Source` blocks inside a fixed
//! instruction template. When nothing survives retrieval the assembler
//! produces a refusal instead, and the generator is never called.

use std::collections::HashSet;

use crate::models::RetrievedPassage;

/// Literal the model is told to answer with when the context lacks the answer.
pub const REFUSAL_ANSWER: &str = "I don't know based on the provided documents";

/// Output of [`assemble_prompt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Augmented {
    /// No usable passages. The text is the final answer.
    Refusal(String),
    /// A grounded prompt ready for generation.
    Prompt(String),
}

/// Final answer used when retrieval produced nothing.
pub fn refusal_text(query: &str) -> String {
    format!(
        "No relevant information found in the documents.\n\nQuestion: {}\n\nAnswer: {}.",
        query, REFUSAL_ANSWER
    )
}

/// Drop passages whose trimmed content was already seen, keeping first-seen order.
pub fn dedup_passages(passages: &[RetrievedPassage]) -> Vec<&RetrievedPassage> {
    let mut seen = HashSet::new();
    passages
        .iter()
        .filter(|p| seen.insert(p.content.trim()))
        .collect()
}

/// Render one passage as a numbered Source block.
fn source_block(n: usize, passage: &RetrievedPassage) -> String {
    format!(
        "Source {}:\nCompany: {}\nDocument Type: {}\nContent:\n{}",
        n, passage.metadata.company, passage.metadata.doc_type, passage.content
    )
}

/// Build the grounded prompt for `query`, or a refusal when `passages` is empty.
///
/// Sources are numbered consecutively from 1 after deduplication, so a
/// skipped duplicate never leaves a gap: three hits whose second repeats
/// the first render as `Source 1` and `Source 2`, not `Source 1` and
/// `Source 3`.
pub fn assemble_prompt(query: &str, passages: &[RetrievedPassage]) -> Augmented {
    let unique = dedup_passages(passages);
    if unique.is_empty() {
        return Augmented::Refusal(refusal_text(query));
    }

    let context = unique
        .iter()
        .enumerate()
        .map(|(i, p)| source_block(i + 1, p))
        .collect::<Vec<_>>()
        .join("\n\n");

    Augmented::Prompt(format!(
        "You are a financial research assistant.

RULES:
- Use the information in the context below to answer as best you can
- If the answer is not present, say \"{refusal}\"
- Do NOT use outside knowledge to answer
- Be concise and factual
- Keep it simple and straightforward
- If you find an answer, do not repeat it more than once, just give the answer directly
- If you see an out of context answer, provide full context in your answer to justify it
- Mention which Source you used for the answer

CONTEXT:
{context}

QUESTION:
{query}

ANSWER:
",
        refusal = REFUSAL_ANSWER,
        context = context,
        query = query,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkMetadata, RawDocument};

    fn passage(content: &str, company: &str) -> RetrievedPassage {
        let mut doc = RawDocument::uploaded("report", content);
        doc.company = company.to_string();
        doc.doc_type = "10-Q".to_string();
        RetrievedPassage {
            content: content.to_string(),
            metadata: ChunkMetadata::from(&doc),
            score: 0.5,
        }
    }

    fn prompt_text(a: Augmented) -> String {
        match a {
            Augmented::Prompt(p) => p,
            Augmented::Refusal(r) => panic!("unexpected refusal: {}", r),
        }
    }

    #[test]
    fn test_empty_passages_refuse() {
        let a = assemble_prompt("What was Q1 revenue?", &[]);
        assert_eq!(
            a,
            Augmented::Refusal(
                "No relevant information found in the documents.\n\n\
                 Question: What was Q1 revenue?\n\n\
                 Answer: I don't know based on the provided documents."
                    .to_string()
            )
        );
    }

    #[test]
    fn test_source_block_layout() {
        let p = prompt_text(assemble_prompt(
            "What was Q1 revenue growth?",
            &[passage("Revenue grew 10% in Q1.", "Acme")],
        ));
        assert!(p.contains(
            "CONTEXT:\nSource 1:\nCompany: Acme\nDocument Type: 10-Q\nContent:\nRevenue grew 10% in Q1.\n\nQUESTION:"
        ));
        assert!(p.contains("QUESTION:\nWhat was Q1 revenue growth?\n\nANSWER:\n"));
        assert!(p.contains("say \"I don't know based on the provided documents\""));
        assert!(p.contains("Do NOT use outside knowledge"));
        assert!(p.contains("Mention which Source"));
    }

    #[test]
    fn test_duplicates_collapse_and_renumber() {
        let p = prompt_text(assemble_prompt(
            "q",
            &[
                passage("Net income was $4.2M.", "Acme"),
                passage("  Net income was $4.2M.  ", "Acme"),
                passage("Operating margin improved to 18%.", "Beta"),
            ],
        ));
        assert_eq!(p.matches("Net income was $4.2M.").count(), 1);
        assert!(p.contains("Source 2:\nCompany: Beta"));
        assert!(!p.contains("Source 3:"));
    }

    #[test]
    fn test_blocks_separated_by_blank_line() {
        let p = prompt_text(assemble_prompt(
            "q",
            &[passage("first passage", "A"), passage("second passage", "B")],
        ));
        assert!(p.contains("Content:\nfirst passage\n\nSource 2:\n"));
    }
}
