//! Grounding context and prompt assembly

use super::SearchResult;
use crate::llm::Message;

/// Separator between context blocks
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

/// System instruction sent with every chat
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions using only the provided document context.

Rules:
- Answer only from the information in the context below.
- If the context does not contain enough information to answer, say that you don't know rather than guessing.
- Cite the source document (and page, when given) for the facts you use.
- Keep the answer clear and well structured.";

/// Provenance label for one result
fn source_label(result: &SearchResult) -> String {
    match result.page_number {
        Some(page) => format!("[{}, page {}]", result.filename, page),
        None => format!("[{}]", result.filename),
    }
}

/// Concatenate results into a context block, in the order given
pub fn build_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| format!("{}\n{}", source_label(r), r.content))
        .collect::<Vec<_>>()
        .join(CONTEXT_DELIMITER)
}

/// Two-message prompt: fixed system instruction, then context and question
pub fn build_messages(query: &str, results: &[SearchResult]) -> Vec<Message> {
    let user = format!(
        "Context:\n{}\n\nQuestion: {}",
        build_context(results),
        query
    );
    vec![Message::system(SYSTEM_PROMPT), Message::user(user)]
}
