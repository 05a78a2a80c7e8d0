//! Deterministic identifiers for documents and chunks.
//!
//! Document ids are derived from the file path only, so editing a note in
//! place keeps its id and re-indexing overwrites the old chunks. The hash
//! is a 32-bit `h * 31 + c` rolling hash over UTF-16 code units; it is not
//! collision-resistant in any cryptographic sense.

const ID_PREFIX: &str = "file_";

/// Derive the stable id for a document at `path`.
///
/// ```
/// use noterag_core::ids::document_id;
///
/// let id = document_id("notes/meeting.md");
/// assert!(id.starts_with("file_"));
/// assert_eq!(id, document_id("notes/meeting.md"));
/// ```
pub fn document_id(path: &str) -> String {
    let hash = rolling_hash(path);
    // i32::MIN has no positive i32 counterpart
    let magnitude = (hash as i64).unsigned_abs();
    format!("{}{}", ID_PREFIX, to_base36(magnitude))
}

/// Id of the `index`-th chunk of a document.
pub fn chunk_id(document_id: &str, index: usize) -> String {
    format!("{}_chunk_{}", document_id, index)
}

/// 32-bit wrapping `h = (h << 5) - h + c` over UTF-16 code units.
pub(crate) fn rolling_hash(text: &str) -> i32 {
    text.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(unit as i32)
    })
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_stable() {
        let a = document_id("data/onenote/Work/Meeting notes.docx");
        let b = document_id("data/onenote/Work/Meeting notes.docx");
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_paths_differ() {
        assert_ne!(document_id("a/one.md"), document_id("a/two.md"));
    }

    #[test]
    fn test_known_hash_values() {
        // "a" = 97, "ab" = 97 * 31 + 98
        assert_eq!(rolling_hash("a"), 97);
        assert_eq!(rolling_hash("ab"), 3105);
        assert_eq!(document_id("a"), "file_2p");
        assert_eq!(document_id(""), "file_0");
    }

    #[test]
    fn test_negative_hash_uses_magnitude() {
        let long = "x".repeat(64);
        let hash = rolling_hash(&long);
        let id = document_id(&long);
        assert_eq!(id, format!("file_{}", to_base36((hash as i64).unsigned_abs())));
        assert!(!id.contains('-'));
    }

    #[test]
    fn test_chunk_id_format() {
        assert_eq!(chunk_id("file_abc", 0), "file_abc_chunk_0");
        assert_eq!(chunk_id("file_abc", 12), "file_abc_chunk_12");
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(2_147_483_648), "zik0zk");
    }
}
