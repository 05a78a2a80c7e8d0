//! Paragraph-then-sentence text chunker.
//!
//! Splits document text into segments of at most `max_chars` characters.
//! Paragraphs (separated by blank lines) that fit are kept whole; longer
//! paragraphs are split on sentence terminators (`.`, `!`, `?`) and the
//! sentences are greedily packed back together, each flushed chunk ending
//! with a period.
//!
//! The closing period counts toward the limit. A single sentence that does
//! not fit together with its period is emitted alone and as-is, so callers
//! must tolerate the occasional oversized single-sentence chunk.
//!
//! Chunk ids are derived from the document id and chunk position, so
//! re-chunking an unchanged document reproduces the same ids.

use std::sync::OnceLock;

use regex::Regex;

use crate::ids::chunk_id;
use crate::models::{ChunkMetadata, DocumentRecord, PendingChunk};

/// Default maximum chunk length in characters.
pub const DEFAULT_MAX_CHARS: usize = 1000;

/// Length of the `". "` joiner used when packing sentences.
const SENTENCE_JOIN_LEN: usize = 2;

/// Length of the `.` appended when a packed chunk is flushed.
const CLOSING_PERIOD_LEN: usize = 1;

fn paragraph_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n").expect("paragraph regex is valid"))
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split text into ordered chunks of at most `max_chars` characters
/// (oversized single sentences excepted).
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();

    for paragraph in paragraph_break().split(text) {
        if paragraph.trim().is_empty() {
            continue;
        }

        if char_len(paragraph) <= max_chars {
            chunks.push(paragraph.trim().to_string());
            continue;
        }

        let mut current = String::new();
        let mut current_len = 0usize;

        for sentence in paragraph.split(['.', '!', '?']) {
            let sentence = sentence.trim();
            if sentence.is_empty() {
                continue;
            }
            let sentence_len = char_len(sentence);

            let packed_len = if current.is_empty() {
                sentence_len + CLOSING_PERIOD_LEN
            } else {
                current_len + SENTENCE_JOIN_LEN + sentence_len + CLOSING_PERIOD_LEN
            };

            if packed_len <= max_chars {
                if !current.is_empty() {
                    current.push_str(". ");
                    current_len += SENTENCE_JOIN_LEN;
                }
                current.push_str(sentence);
                current_len += sentence_len;
            } else {
                if !current.is_empty() {
                    current.push('.');
                    chunks.push(std::mem::take(&mut current));
                }
                current.push_str(sentence);
                current_len = sentence_len;
            }
        }

        if !current.is_empty() {
            current.push('.');
            chunks.push(current);
        }
    }

    chunks.retain(|c| !c.trim().is_empty());
    chunks
}

/// Split a document and label every piece with its chunk id and metadata.
///
/// `section_name` falls back to the file type, matching how exported
/// notebooks are grouped when no real section information exists.
pub fn build_chunks(
    doc: &DocumentRecord,
    max_chars: usize,
    notebook_name: &str,
) -> Vec<PendingChunk> {
    let last_modified = doc.last_modified.to_rfc3339();
    let section_name = if doc.file_type.is_empty() {
        "Default Section".to_string()
    } else {
        doc.file_type.clone()
    };

    split_text(&doc.content, max_chars)
        .into_iter()
        .enumerate()
        .map(|(index, content)| PendingChunk {
            id: chunk_id(&doc.id, index),
            content,
            metadata: ChunkMetadata {
                document_id: doc.id.clone(),
                title: doc.title.clone(),
                section_name: section_name.clone(),
                notebook_name: notebook_name.to_string(),
                chunk_index: index,
                last_modified: last_modified.clone(),
                file_path: doc.source_path.clone(),
                file_type: doc.file_type.clone(),
            },
        })
        .collect()
}
