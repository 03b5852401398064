//! Provider introspection

use super::Context;
use crate::app::ProvidersArgs;
use crate::output::format_providers;
use anyhow::Result;
use ragdoc_core::Capability;

pub async fn run(args: ProvidersArgs, ctx: &Context) -> Result<()> {
    let capabilities = match args.capability {
        Some(capability) => vec![capability.into()],
        None => vec![Capability::Llm, Capability::Embedding],
    };

    let registry = ctx.manager.registry();
    let mut infos = Vec::new();
    for capability in capabilities {
        infos.extend(registry.list(capability, &ctx.settings).await);
    }

    print!("{}", format_providers(&infos, ctx.format));
    Ok(())
}
