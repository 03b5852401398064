//! Chat command

use super::Context;
use crate::app::{ChatArgs, OutputFormat};
use crate::output::{format_chat, terminal};
use anyhow::Result;
use futures::StreamExt;
use ragdoc_core::{ChatResponse, RagService};
use std::io::Write;

pub async fn run(args: ChatArgs, ctx: &Context) -> Result<()> {
    let query = args.query.join(" ");
    let top_k = ctx.top_k(args.limit);
    let filter = Some(args.documents.as_slice());

    let db = ctx.open_db()?;
    let rag = RagService::from_manager(&ctx.manager, &ctx.settings, db)?;

    if !args.stream {
        let response = rag.chat(&query, top_k, filter).await?;
        print!("{}", format_chat(&response, ctx.format));
        return Ok(());
    }

    let (mut stream, sources) = rag.chat_stream(&query, top_k, filter).await?;
    let mut answer = String::new();
    let mut stdout = std::io::stdout();

    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        if ctx.format == OutputFormat::Cli {
            write!(stdout, "{}", fragment)?;
            stdout.flush()?;
        }
        answer.push_str(&fragment);
    }

    match ctx.format {
        OutputFormat::Json => print!(
            "{}",
            format_chat(&ChatResponse { answer, sources }, ctx.format)
        ),
        OutputFormat::Cli => {
            println!();
            print!("{}", terminal::format_sources(&sources));
        }
    }
    Ok(())
}
