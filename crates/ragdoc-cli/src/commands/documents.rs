//! Document listing and deletion

use super::Context;
use crate::output::format_documents;
use anyhow::Result;
use ragdoc_core::{RagError, VectorStore};

pub async fn run(ctx: &Context) -> Result<()> {
    let db = ctx.open_db()?;
    let documents = db.list_documents().await?;
    print!("{}", format_documents(&documents, ctx.format));
    Ok(())
}

pub async fn delete(id: i64, ctx: &Context) -> Result<()> {
    let db = ctx.open_db()?;
    if !db.delete_document(id).await? {
        return Err(RagError::DocumentNotFound(id).into());
    }
    println!("Deleted document #{}", id);
    Ok(())
}
