//! Search command

use super::Context;
use crate::app::SearchArgs;
use crate::output::format_search_results;
use anyhow::Result;
use ragdoc_core::RagService;

pub async fn run(args: SearchArgs, ctx: &Context) -> Result<()> {
    let query = args.query.join(" ");
    let top_k = ctx.top_k(args.limit);

    let db = ctx.open_db()?;
    let rag = RagService::from_manager(&ctx.manager, &ctx.settings, db)?;
    let results = rag
        .search(&query, top_k, Some(args.documents.as_slice()))
        .await?;

    print!("{}", format_search_results(&results, ctx.format));
    Ok(())
}
