//! Vector storage operations
//!
//! Embeddings are stored as little-endian f32 BLOBs. Ranking happens inside
//! SQLite through the `cosine_distance` scalar function.

use super::{Database, DocumentChunk, NewChunk};
use crate::error::{RagError, Result};
use crate::search::SearchResult;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};

impl Database {
    /// Replace every chunk of a document in one transaction
    pub fn replace_document_chunks(&self, document_id: i64, chunks: &[NewChunk]) -> Result<()> {
        let conn = self.conn();

        conn.execute("BEGIN IMMEDIATE", [])?;
        let result = (|| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM documents WHERE id = ?1)",
                params![document_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(RagError::DocumentNotFound(document_id));
            }

            conn.execute(
                "DELETE FROM document_chunks WHERE document_id = ?1",
                params![document_id],
            )?;

            let mut stmt = conn.prepare(
                "INSERT INTO document_chunks (document_id, chunk_index, content, embedding, page_number)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for chunk in chunks {
                stmt.execute(params![
                    document_id,
                    chunk.chunk_index,
                    chunk.content,
                    embedding_to_bytes(&chunk.embedding),
                    chunk.page_number,
                ])?;
            }
            Ok(())
        })();

        if result.is_ok() {
            conn.execute("COMMIT", [])?;
        } else {
            let _ = conn.execute("ROLLBACK", []);
        }
        result
    }

    /// Stored chunks of a document, in sequence order
    pub fn document_chunks(&self, document_id: i64) -> Result<Vec<DocumentChunk>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, document_id, chunk_index, content, embedding, page_number
             FROM document_chunks
             WHERE document_id = ?1
             ORDER BY chunk_index",
        )?;

        let chunks = stmt
            .query_map(params![document_id], |row| {
                let embedding_bytes: Vec<u8> = row.get(4)?;
                Ok(DocumentChunk {
                    id: row.get(0)?,
                    document_id: row.get(1)?,
                    chunk_index: row.get(2)?,
                    content: row.get(3)?,
                    embedding: bytes_to_embedding(&embedding_bytes),
                    page_number: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(chunks)
    }

    pub fn chunk_count(&self, document_id: i64) -> Result<usize> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM document_chunks WHERE document_id = ?1",
            params![document_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Closest chunks to `query`, ordered by ascending cosine distance.
    ///
    /// `document_ids` restricts the candidates before ordering and limiting.
    /// An empty filter is the same as no filter.
    pub fn nearest_chunks(
        &self,
        query: &[f32],
        top_k: usize,
        document_ids: Option<&[i64]>,
    ) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let document_ids = document_ids.filter(|ids| !ids.is_empty());

        let mut sql = String::from(
            "SELECT c.id, c.document_id, d.filename, c.content, c.page_number,
                    cosine_distance(c.embedding, ?1) AS distance
             FROM document_chunks c
             JOIN documents d ON d.id = c.document_id",
        );
        let mut values: Vec<Value> = vec![
            Value::Blob(embedding_to_bytes(query)),
            Value::Integer(top_k as i64),
        ];

        if let Some(ids) = document_ids {
            let placeholders: Vec<String> = (0..ids.len()).map(|i| format!("?{}", i + 3)).collect();
            sql.push_str(&format!(
                " WHERE c.document_id IN ({})",
                placeholders.join(", ")
            ));
            values.extend(ids.iter().map(|id| Value::Integer(*id)));
        }
        sql.push_str(" ORDER BY distance ASC, c.id ASC LIMIT ?2");

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let results = stmt
            .query_map(params_from_iter(values), |row| {
                let distance: f64 = row.get(5)?;
                Ok(SearchResult {
                    chunk_id: row.get(0)?,
                    document_id: row.get(1)?,
                    filename: row.get(2)?,
                    content: row.get(3)?,
                    page_number: row.get(4)?,
                    score: 1.0 - distance,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(results)
    }
}

/// Convert f32 slice to bytes for storage
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert bytes back to f32 vec
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine distance between two encoded embeddings; backs the SQL function.
///
/// A zero vector is treated as maximally unrelated (distance 1). The result
/// always lies in `[0, 2]`.
pub(crate) fn cosine_distance(a: &[u8], b: &[u8]) -> std::result::Result<f64, String> {
    if a.len() % 4 != 0 || b.len() % 4 != 0 {
        return Err("embedding blob length is not a multiple of 4".to_string());
    }
    if a.len() != b.len() {
        return Err(format!(
            "embedding dimension mismatch: {} vs {}",
            a.len() / 4,
            b.len() / 4
        ));
    }

    let a = bytes_to_embedding(a);
    let b = bytes_to_embedding(b);
    let (mut dot, mut norm_a, mut norm_b) = (0f64, 0f64, 0f64);
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(1.0);
    }
    let ratio = (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0);
    Ok(1.0 - ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: u32, content: &str, embedding: Vec<f32>) -> NewChunk {
        NewChunk {
            chunk_index: index,
            content: content.to_string(),
            embedding,
            page_number: Some(1),
        }
    }

    #[test]
    fn test_embedding_bytes_round_trip() {
        let embedding = vec![0.25f32, -1.5, 3.0];
        assert_eq!(bytes_to_embedding(&embedding_to_bytes(&embedding)), embedding);
    }

    #[test]
    fn test_cosine_distance_zero_vector() {
        let zero = embedding_to_bytes(&[0.0, 0.0]);
        let one = embedding_to_bytes(&[1.0, 0.0]);
        assert_eq!(cosine_distance(&zero, &one).unwrap(), 1.0);
        assert!(cosine_distance(&one, &embedding_to_bytes(&[1.0])).is_err());
    }

    #[test]
    fn test_nearest_chunks_order_and_limit() {
        let db = Database::open_in_memory().unwrap();
        let doc = db.create_document("a.txt", &["x".to_string()]).unwrap();
        db.replace_document_chunks(
            doc,
            &[
                chunk(0, "far", vec![0.0, 1.0]),
                chunk(1, "near", vec![1.0, 0.0]),
                chunk(2, "middle", vec![1.0, 1.0]),
            ],
        )
        .unwrap();

        let results = db.nearest_chunks(&[1.0, 0.0], 2, None).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "near");
        assert_eq!(results[1].content, "middle");
        assert!(results[0].score >= results[1].score);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert_eq!(results[0].filename, "a.txt");
    }

    #[test]
    fn test_nearest_chunks_filter() {
        let db = Database::open_in_memory().unwrap();
        let a = db.create_document("a.txt", &["a".to_string()]).unwrap();
        let b = db.create_document("b.txt", &["b".to_string()]).unwrap();
        db.replace_document_chunks(a, &[chunk(0, "from a", vec![1.0, 0.0])])
            .unwrap();
        db.replace_document_chunks(b, &[chunk(0, "from b", vec![1.0, 0.0])])
            .unwrap();

        let only_b = db.nearest_chunks(&[1.0, 0.0], 10, Some(&[b])).unwrap();
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].document_id, b);

        let unfiltered = db.nearest_chunks(&[1.0, 0.0], 10, Some(&[])).unwrap();
        assert_eq!(unfiltered.len(), 2);
    }

    #[test]
    fn test_identical_vectors_score_at_most_one() {
        let db = Database::open_in_memory().unwrap();
        let doc = db.create_document("a.txt", &["a".to_string()]).unwrap();
        let vectors = [
            vec![1.0, 1.0, 1.0],
            vec![0.1, 0.2, 0.3],
            vec![0.3, -0.7, 0.01],
        ];
        let chunks: Vec<NewChunk> = vectors
            .iter()
            .enumerate()
            .map(|(i, v)| chunk(i as u32, "same", v.clone()))
            .collect();
        db.replace_document_chunks(doc, &chunks).unwrap();

        for v in &vectors {
            let results = db.nearest_chunks(v, 1, None).unwrap();
            assert!(results[0].score <= 1.0, "score {} above 1", results[0].score);
            assert!((results[0].score - 1.0).abs() < 1e-6);

            let d = cosine_distance(&embedding_to_bytes(v), &embedding_to_bytes(v)).unwrap();
            assert!((0.0..=2.0).contains(&d));
        }

        let opposite = cosine_distance(
            &embedding_to_bytes(&[1.0, 1.0, 1.0]),
            &embedding_to_bytes(&[-1.0, -1.0, -1.0]),
        )
        .unwrap();
        assert!(opposite <= 2.0);
    }

    #[test]
    fn test_replace_chunks_is_wholesale() {
        let db = Database::open_in_memory().unwrap();
        let doc = db.create_document("a.txt", &["a".to_string()]).unwrap();
        db.replace_document_chunks(
            doc,
            &[chunk(0, "old 0", vec![1.0]), chunk(1, "old 1", vec![1.0])],
        )
        .unwrap();
        db.replace_document_chunks(doc, &[chunk(0, "new 0", vec![1.0])])
            .unwrap();

        let chunks = db.document_chunks(doc).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "new 0");
        assert_eq!(db.chunk_count(doc).unwrap(), 1);
    }

    #[test]
    fn test_failed_replace_keeps_old_chunks() {
        let db = Database::open_in_memory().unwrap();
        let doc = db.create_document("a.txt", &["a".to_string()]).unwrap();
        db.replace_document_chunks(doc, &[chunk(0, "kept", vec![1.0])])
            .unwrap();

        // Duplicate chunk_index violates the unique constraint mid-transaction
        let result = db.replace_document_chunks(
            doc,
            &[chunk(0, "dup", vec![1.0]), chunk(0, "dup", vec![1.0])],
        );
        assert!(result.is_err());

        let chunks = db.document_chunks(doc).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "kept");
    }

    #[test]
    fn test_replace_chunks_unknown_document() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.replace_document_chunks(42, &[]),
            Err(RagError::DocumentNotFound(42))
        ));
    }
}
