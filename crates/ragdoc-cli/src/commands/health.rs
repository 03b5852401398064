//! Health command

use super::Context;
use crate::app::OutputFormat;
use crate::output::json::to_pretty;
use anyhow::Result;
use serde::Serialize;

#[derive(Serialize)]
struct ProviderHealth {
    capability: &'static str,
    provider: String,
    model: String,
    healthy: bool,
}

/// Probe the active providers; never fails on an unreachable backend
pub async fn run(ctx: &Context) -> Result<()> {
    let llm = ctx.manager.llm(&ctx.settings)?;
    let embedding = ctx.manager.embedding(&ctx.settings)?;

    let (llm_ok, embedding_ok) = futures::join!(llm.health_check(), embedding.health_check());

    let report = [
        ProviderHealth {
            capability: "llm",
            provider: llm.provider_name().to_string(),
            model: llm.model_name().to_string(),
            healthy: llm_ok,
        },
        ProviderHealth {
            capability: "embedding",
            provider: embedding.provider_name().to_string(),
            model: embedding.model_name().to_string(),
            healthy: embedding_ok,
        },
    ];

    match ctx.format {
        OutputFormat::Json => print!("{}", to_pretty(&report)),
        OutputFormat::Cli => {
            for entry in &report {
                println!(
                    "{:<10} {}/{}: {}",
                    entry.capability,
                    entry.provider,
                    entry.model,
                    if entry.healthy { "ok" } else { "unavailable" }
                );
            }
        }
    }
    Ok(())
}
