//! CLI command handlers

pub mod chat;
pub mod config;
pub mod documents;
pub mod health;
pub mod ingest;
pub mod providers;
pub mod reindex;
pub mod search;

use crate::app::OutputFormat;
use anyhow::{Context as _, Result};
use ragdoc_core::{Database, ProviderManager, Settings};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a command needs, built once in `main`
pub struct Context {
    pub settings: Settings,
    pub config_path: PathBuf,
    pub format: OutputFormat,
    pub manager: ProviderManager,
}

impl Context {
    pub fn open_db(&self) -> Result<Arc<Database>> {
        let path = &self.settings.database_path;
        let db = Database::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Arc::new(db))
    }

    /// `-n` if given, otherwise the configured default
    pub fn top_k(&self, limit: Option<usize>) -> usize {
        limit.unwrap_or(self.settings.top_k)
    }
}
