//! Ingest command

use super::Context;
use crate::app::{IngestArgs, OutputFormat};
use crate::progress::ProgressReporter;
use anyhow::{bail, Context as _, Result};
use ragdoc_core::IndexService;
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Page separator in plain-text input
const PAGE_BREAK: char = '\x0c';

#[derive(Serialize)]
struct Ingested {
    path: String,
    id: i64,
    chunks: usize,
}

pub async fn run(args: IngestArgs, ctx: &Context) -> Result<()> {
    let pattern = glob::Pattern::new(&args.pattern)
        .with_context(|| format!("invalid pattern '{}'", args.pattern))?;
    let files = collect_files(&args.paths, &pattern)?;
    if files.is_empty() {
        bail!("no files matched {}", args.pattern);
    }

    let db = ctx.open_db()?;
    let service = IndexService::from_manager(&ctx.manager, &ctx.settings, db)?;

    let mut progress = ProgressReporter::new(files.len());
    let mut ingested = Vec::new();
    let mut last_error = None;

    for path in &files {
        let filename = display_name(path);
        progress.set_message(&filename);

        let pages = match read_pages(path) {
            Ok(pages) => pages,
            Err(e) => {
                tracing::warn!("Skipping {}: {:#}", path.display(), e);
                progress.fail();
                last_error = Some(e);
                continue;
            }
        };

        match service.index_document(&filename, &pages).await {
            Ok((id, chunks)) => {
                progress.increment();
                ingested.push(Ingested {
                    path: path.display().to_string(),
                    id,
                    chunks,
                });
            }
            Err(e) => {
                tracing::warn!("Failed to ingest {}: {}", path.display(), e);
                progress.fail();
                last_error = Some(e.into());
            }
        }
    }
    progress.finish();

    match ctx.format {
        OutputFormat::Json => print!("{}", crate::output::json::to_pretty(&ingested)),
        OutputFormat::Cli => {
            for doc in &ingested {
                println!("Ingested {} as #{} ({} chunks)", doc.path, doc.id, doc.chunks);
            }
        }
    }

    // Surface the failure when nothing made it in
    match last_error {
        Some(e) if ingested.is_empty() => Err(e),
        _ if progress.failed() > 0 => {
            eprintln!("{} file(s) failed, see log for details", progress.failed());
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Expand directories into the files under them that match `pattern`
fn collect_files(paths: &[PathBuf], pattern: &glob::Pattern) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let relative = entry.path().strip_prefix(path).unwrap_or(entry.path());
                if pattern.matches_path(relative) {
                    files.push(entry.into_path());
                }
            }
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            bail!("{} does not exist", path.display());
        }
    }

    Ok(files)
}

fn read_pages(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(content.split(PAGE_BREAK).map(str::to_string).collect())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}
