//! Document chunking for embedding
//!
//! Windows are measured in characters, not bytes, so multi-byte text gets
//! the same window size as ASCII.

/// Contiguous slice of one page
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    /// Character offset within the source text
    pub position: usize,
}

/// Chunk of a whole document, ready to embed
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    /// 1-based page the chunk came from
    pub page_number: u32,
    /// Dense, zero-based across the whole document
    pub index: u32,
    /// Character offset within the page
    pub position: usize,
}

/// Break points, strongest first, with the length kept on the left side
const SEPARATORS: [&str; 4] = ["\n\n", ". ", "\n", " "];

/// Character-based chunking with overlap.
///
/// Each window ends at the last paragraph break, sentence end, line break or
/// space found in its final 30%, or is hard-cut at `chunk_size` when none is
/// present. Consecutive spans overlap by `overlap` characters and together
/// cover the whole input.
pub fn chunk_by_chars(content: &str, chunk_size: usize, overlap: usize) -> Vec<TextSpan> {
    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size - 1);

    // Byte offset of every char, plus the end of the string
    let bounds: Vec<usize> = content
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(content.len()))
        .collect();
    let total = bounds.len() - 1;

    if total <= chunk_size {
        return vec![TextSpan {
            text: content.to_string(),
            position: 0,
        }];
    }

    let mut spans = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + chunk_size).min(total);
        let mut chunk_end = end;

        if end < total {
            // Never break so early that the next window would not advance
            let search_start = (start + chunk_size * 70 / 100).max(start + overlap + 1);
            if search_start < end {
                let region = &content[bounds[search_start]..bounds[end]];
                if let Some((pos, sep)) = SEPARATORS
                    .iter()
                    .find_map(|sep| region.rfind(sep).map(|pos| (pos, sep)))
                {
                    chunk_end = search_start + region[..pos].chars().count() + sep.chars().count();
                }
            }
        }

        spans.push(TextSpan {
            text: content[bounds[start]..bounds[chunk_end]].to_string(),
            position: start,
        });

        if chunk_end >= total {
            break;
        }
        start = chunk_end - overlap;
    }

    spans
}

/// Chunk every non-blank page, numbering chunks across the document
pub fn chunk_pages(pages: &[String], chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for (page_idx, page) in pages.iter().enumerate() {
        if page.trim().is_empty() {
            continue;
        }
        for span in chunk_by_chars(page, chunk_size, overlap) {
            if span.text.trim().is_empty() {
                continue;
            }
            chunks.push(Chunk {
                text: span.text,
                page_number: page_idx as u32 + 1,
                index: chunks.len() as u32,
                position: span.position,
            });
        }
    }

    chunks
}
