//! Reindex command

use super::Context;
use crate::app::{OutputFormat, ReindexArgs};
use crate::output::json::to_pretty;
use anyhow::Result;
use ragdoc_core::{IndexService, ReindexReport};

pub async fn run(args: ReindexArgs, ctx: &Context) -> Result<()> {
    let db = ctx.open_db()?;
    let service = IndexService::from_manager(&ctx.manager, &ctx.settings, db)?;

    let report = match args.id {
        Some(id) if !args.all => {
            let chunks = service.reindex(id).await?;
            if ctx.format == OutputFormat::Cli {
                println!("Reindexed #{} ({} chunks)", id, chunks);
                return Ok(());
            }
            ReindexReport {
                succeeded: vec![id],
                failed: Vec::new(),
            }
        }
        _ => service.reindex_all().await?,
    };

    match ctx.format {
        OutputFormat::Json => print!("{}", to_pretty(&report)),
        OutputFormat::Cli => {
            println!("Reindexed {} document(s)", report.succeeded.len());
            for (id, error) in &report.failed {
                println!("  #{} failed: {}", id, error);
            }
        }
    }
    Ok(())
}
