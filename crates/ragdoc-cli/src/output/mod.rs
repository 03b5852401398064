//! Output formatters

pub mod json;
pub mod terminal;

use crate::app::OutputFormat;
use ragdoc_core::{ChatResponse, DocumentInfo, ProviderInfo, SearchResult};

/// Format search results
pub fn format_search_results(results: &[SearchResult], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json::to_pretty(&results),
        OutputFormat::Cli => terminal::format_results(results),
    }
}

/// Format an answer with its sources
pub fn format_chat(response: &ChatResponse, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json::to_pretty(response),
        OutputFormat::Cli => terminal::format_chat(response),
    }
}

pub fn format_documents(documents: &[DocumentInfo], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json::to_pretty(&documents),
        OutputFormat::Cli => terminal::format_documents(documents),
    }
}

pub fn format_providers(providers: &[ProviderInfo], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json::to_pretty(&providers),
        OutputFormat::Cli => terminal::format_providers(providers),
    }
}
