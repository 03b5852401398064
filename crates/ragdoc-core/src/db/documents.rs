//! Document operations

use super::{hash_content, Database, Document, DocumentInfo};
use crate::error::{RagError, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<(Document, String)> {
    let pages: String = row.get(2)?;
    Ok((
        Document {
            id: row.get(0)?,
            filename: row.get(1)?,
            pages: Vec::new(),
            content_hash: row.get(3)?,
            page_count: row.get(4)?,
            created_at: row.get(5)?,
        },
        pages,
    ))
}

impl Database {
    /// Insert a new document with its raw page text
    pub fn create_document(&self, filename: &str, pages: &[String]) -> Result<i64> {
        if filename.trim().is_empty() {
            return Err(RagError::InvalidInput("filename must not be empty".into()));
        }

        let now = Utc::now().to_rfc3339();
        let hash = hash_content(&pages.concat());
        let pages_json = serde_json::to_string(pages)?;

        let conn = self.conn();
        conn.execute(
            "INSERT INTO documents (filename, pages, content_hash, page_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![filename, pages_json, hash, pages.len() as u32, now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a document with its pages
    pub fn find_document(&self, id: i64) -> Result<Option<Document>> {
        let row = self
            .conn()
            .query_row(
                "SELECT id, filename, pages, content_hash, page_count, created_at
                 FROM documents WHERE id = ?1",
                params![id],
                document_from_row,
            )
            .optional()?;

        match row {
            Some((mut doc, pages)) => {
                doc.pages = serde_json::from_str(&pages)?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    /// List documents with chunk counts, newest first
    pub fn list_document_info(&self) -> Result<Vec<DocumentInfo>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT d.id, d.filename, d.page_count, d.created_at,
                    (SELECT COUNT(*) FROM document_chunks c WHERE c.document_id = d.id)
             FROM documents d
             ORDER BY d.created_at DESC, d.id DESC",
        )?;

        let docs = stmt
            .query_map([], |row| {
                Ok(DocumentInfo {
                    id: row.get(0)?,
                    filename: row.get(1)?,
                    page_count: row.get(2)?,
                    created_at: row.get(3)?,
                    chunk_count: row.get::<_, i64>(4)? as usize,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(docs)
    }

    /// Delete a document and (by cascade) its chunks
    pub fn remove_document(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}
