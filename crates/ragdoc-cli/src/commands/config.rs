//! Settings file commands

use super::Context;
use crate::app::{ConfigAction, ConfigArgs, OutputFormat};
use anyhow::{bail, Result};
use ragdoc_core::Settings;

const MASK: &str = "********";

/// Settings with credentials hidden, for display
fn redacted(settings: &Settings) -> Settings {
    let mask = |key: &Option<String>| key.as_ref().map(|_| MASK.to_string());
    Settings {
        openai_api_key: mask(&settings.openai_api_key),
        google_api_key: mask(&settings.google_api_key),
        xai_api_key: mask(&settings.xai_api_key),
        ..settings.clone()
    }
}

pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let shown = redacted(&ctx.settings);
            match ctx.format {
                OutputFormat::Json => print!("{}", crate::output::json::to_pretty(&shown)),
                OutputFormat::Cli => {
                    println!("# {}", ctx.config_path.display());
                    print!("{}", serde_yaml::to_string(&shown)?);
                }
            }
        }
        ConfigAction::Init { force } => {
            if ctx.config_path.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    ctx.config_path.display()
                );
            }
            ctx.settings.save_to(&ctx.config_path)?;
            println!("Wrote {}", ctx.config_path.display());
        }
    }
    Ok(())
}
