//! Per-format text extraction for exported notebook files.
//!
//! Dispatch is by lower-cased file extension. Every extractor returns plain
//! UTF-8 text; trimming and the empty-document check happen in the caller.
//!
//! | Extension | Strategy |
//! |-----------|----------|
//! | `.docx` | OOXML `word/document.xml`, paragraphs separated by a blank line |
//! | `.txt`, `.md` | UTF-8 passthrough (invalid bytes replaced) |
//! | `.html`, `.htm` | Markup stripped, `script`/`style` content dropped, one paragraph per block element |
//! | `.pdf` | Placeholder naming the file; no parser is bundled |

use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use thiserror::Error;

/// Maximum decompressed bytes read from a single ZIP entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// HTML elements whose text content is never part of the document.
const SKIPPED_HTML_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// HTML elements that start a new paragraph in the extracted text.
const BLOCK_HTML_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "td", "th", "title", "tr", "ul",
];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
}

/// Extract the text of a file whose bytes have already been read.
///
/// `file_type` is the lower-cased extension including the dot.
pub fn extract_text(path: &Path, bytes: &[u8], file_type: &str) -> Result<String, ExtractError> {
    match file_type {
        ".docx" => extract_docx(bytes),
        ".txt" | ".md" => Ok(String::from_utf8_lossy(bytes).into_owned()),
        ".html" | ".htm" => Ok(extract_html(&String::from_utf8_lossy(bytes))),
        ".pdf" => Ok(pdf_placeholder(path)),
        other => Err(ExtractError::UnsupportedType(other.to_string())),
    }
}

fn pdf_placeholder(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    tracing::warn!(path = %path.display(), "PDF content extraction is not supported");
    format!(
        "PDF file: {} (content extraction is not supported, convert it to another format)",
        name
    )
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    docx_paragraphs(&doc_xml)
}

/// Collect `w:t` runs, ending each `w:p` paragraph with a blank line so the
/// chunker sees Word paragraphs as paragraphs.
fn docx_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// Visible text of an HTML document.
///
/// Text inside the same block element is concatenated and its whitespace
/// collapsed; each block becomes its own paragraph.
pub fn extract_html(html: &str) -> String {
    let document = scraper::Html::parse_document(html);
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_block = None;

    for node in document.tree.root().descendants() {
        let scraper::Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            matches!(a.value(), scraper::Node::Element(el) if SKIPPED_HTML_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }

        let block = node
            .ancestors()
            .find(|a| {
                matches!(a.value(), scraper::Node::Element(el) if BLOCK_HTML_ELEMENTS.contains(&el.name()))
            })
            .map(|a| a.id());
        if block != current_block {
            push_collapsed(&mut paragraphs, &current);
            current.clear();
            current_block = block;
        }
        current.push_str(text);
    }
    push_collapsed(&mut paragraphs, &current);

    paragraphs.join("\n\n")
}

fn push_collapsed(paragraphs: &mut Vec<String>, text: &str) {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if !collapsed.is_empty() {
        paragraphs.push(collapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noterag_core::chunk::split_text;
    use std::io::Write;

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("word/document.xml", options).unwrap();
            zip.write_all(document_xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn test_docx_paragraphs_become_lines() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Meeting notes</w:t></w:r></w:p>
    <w:p><w:r><w:t xml:space="preserve">Budget </w:t></w:r><w:r><w:t>approved &amp; signed</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
        let text = extract_text(Path::new("notes.docx"), &docx_bytes(xml), ".docx").unwrap();
        let lines: Vec<&str> = text.lines().map(|l| l.trim()).filter(|l| !l.is_empty()).collect();
        assert_eq!(lines, vec!["Meeting notes", "Budget approved & signed"]);
    }

    #[test]
    fn test_docx_paragraphs_chunk_separately() {
        let xml = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>First paragraph about budgets</w:t></w:r></w:p>
    <w:p><w:r><w:t>Second paragraph about travel</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
        let text = extract_text(Path::new("plan.docx"), &docx_bytes(xml), ".docx").unwrap();
        let chunks = split_text(text.trim(), 1000);
        assert_eq!(
            chunks,
            vec!["First paragraph about budgets", "Second paragraph about travel"]
        );
    }

    #[test]
    fn test_invalid_docx_is_an_error() {
        let err = extract_text(Path::new("bad.docx"), b"not a zip", ".docx").unwrap_err();
        assert!(matches!(err, ExtractError::Docx(_)));
    }

    #[test]
    fn test_docx_without_document_xml() {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            zip.start_file("other.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        let err = extract_text(Path::new("a.docx"), &buf.into_inner(), ".docx").unwrap_err();
        assert!(err.to_string().contains("word/document.xml not found"));
    }

    #[test]
    fn test_html_strips_markup_and_scripts() {
        let html = r#"<html><head><title>Trip</title><style>p { color: red; }</style></head>
<body><h1>Packing   list</h1><script>var x = 1;</script><p>Bring <b>boots</b>.</p></body></html>"#;
        let text = extract_html(html);
        assert!(text.contains("Packing list"));
        assert!(text.contains("boots"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("var x"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_html_blocks_chunk_separately() {
        let html = "<body><h2>Groceries</h2><p>Buy <em>fresh</em> bread.</p><ul><li>eggs</li><li>milk</li></ul></body>";
        let text = extract_html(html);
        assert_eq!(text, "Groceries\n\nBuy fresh bread.\n\neggs\n\nmilk");
        assert_eq!(split_text(&text, 1000).len(), 4);
    }

    #[test]
    fn test_text_passthrough_is_lossy() {
        let text = extract_text(Path::new("a.txt"), b"caf\xff notes", ".txt").unwrap();
        assert!(text.starts_with("caf"));
        assert!(text.ends_with(" notes"));
    }

    #[test]
    fn test_pdf_placeholder_names_file() {
        let text = extract_text(Path::new("/notes/report.pdf"), b"%PDF-1.7", ".pdf").unwrap();
        assert!(text.contains("report.pdf"));
    }

    #[test]
    fn test_unsupported_type() {
        let err = extract_text(Path::new("a.xyz"), b"", ".xyz").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedType(_)));
    }
}
