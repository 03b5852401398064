//! Terminal output formatter

use ragdoc_core::{ChatResponse, DocumentInfo, ProviderInfo, SearchResult};

const PREVIEW_LINES: usize = 3;

fn source_label(result: &SearchResult) -> String {
    match result.page_number {
        Some(page) => format!("{} p.{}", result.filename, page),
        None => result.filename.clone(),
    }
}

pub fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No results\n".to_string();
    }

    let mut output = String::new();

    for result in results {
        let score_pct = (result.score.max(0.0) * 100.0) as u32;
        output.push_str(&format!(
            "{:>3}% {} #{} (chunk {})\n",
            score_pct,
            source_label(result),
            result.document_id,
            result.chunk_id
        ));

        let lines: Vec<&str> = result
            .content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .collect();
        for line in lines.iter().take(PREVIEW_LINES) {
            output.push_str(&format!("  {}\n", line.trim()));
        }
        if lines.len() > PREVIEW_LINES {
            output.push_str("  ...\n");
        }
    }

    output
}

/// Source list printed under an answer
pub fn format_sources(sources: &[SearchResult]) -> String {
    if sources.is_empty() {
        return String::new();
    }

    let mut output = String::from("\nSources:\n");
    for (i, source) in sources.iter().enumerate() {
        output.push_str(&format!(
            "  [{}] {} ({:.2})\n",
            i + 1,
            source_label(source),
            source.score
        ));
    }
    output
}

pub fn format_chat(response: &ChatResponse) -> String {
    format!(
        "{}\n{}",
        response.answer.trim_end(),
        format_sources(&response.sources)
    )
}

pub fn format_documents(documents: &[DocumentInfo]) -> String {
    if documents.is_empty() {
        return "No documents\n".to_string();
    }

    let mut output = String::new();
    for doc in documents {
        output.push_str(&format!(
            "#{:<5} {} ({} pages, {} chunks) {}\n",
            doc.id, doc.filename, doc.page_count, doc.chunk_count, doc.created_at
        ));
    }
    output
}

pub fn format_providers(providers: &[ProviderInfo]) -> String {
    let mut output = String::new();

    for info in providers {
        let mut flags = Vec::new();
        if info.is_local {
            flags.push("local");
        }
        if info.requires_api_key {
            flags.push("api key");
        }
        output.push_str(&format!(
            "{} [{}] {}\n",
            info.name,
            info.capability,
            flags.join(", ")
        ));

        for model in &info.models {
            match info.dimensions.get(model) {
                Some(dims) => output.push_str(&format!("  {} ({} dims)\n", model, dims)),
                None => output.push_str(&format!("  {}\n", model)),
            }
        }
    }

    output
}
