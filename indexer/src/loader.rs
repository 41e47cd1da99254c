//! Corpus walking and markup stripping.
//!
//! A corpus is a directory of `.json` files, each `{"url": ..., "content": <html>}`,
//! or `.jsonl` files with one such object per line.

use anyhow::{Context, Result};
use scraper::{Html, Node, Selector};
use searchcore::DocumentInput;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Documents whose cleaned text is shorter than this are skipped.
pub const DEFAULT_MIN_CONTENT_LEN: usize = 20;

#[derive(Debug, Deserialize)]
pub struct RawPage {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: String,
}

/// Source files under `root` in sorted path order, so the order in which
/// near duplicates are encountered is reproducible.
pub fn walk_corpus(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")))
        .collect()
}

/// Raw pages stored in one corpus file. The file path stands in for a
/// missing url.
pub fn load_file(path: &Path) -> Result<Vec<RawPage>> {
    let fallback_url = path.to_string_lossy().into_owned();
    let with_url = |mut page: RawPage| {
        page.url.get_or_insert_with(|| fallback_url.clone());
        page
    };
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = BufReader::new(file);
    if path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        let mut pages = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() { continue; }
            match serde_json::from_str::<RawPage>(&line) {
                Ok(page) => pages.push(with_url(page)),
                Err(e) => tracing::warn!(file = %path.display(), line = lineno + 1, error = %e, "skipping malformed record"),
            }
        }
        Ok(pages)
    } else {
        let page: RawPage = serde_json::from_reader(reader)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(vec![with_url(page)])
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(doc: &Html, selector: &Selector) -> Vec<String> {
    doc.select(selector)
        .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Visible text of the page; script, style and noscript bodies are dropped.
fn visible_text(doc: &Html) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in doc.tree.root().descendants() {
        let Node::Text(text) = node.value() else { continue };
        let hidden = node.ancestors().any(|a| {
            matches!(a.value(), Node::Element(e) if matches!(e.name(), "script" | "style" | "noscript"))
        });
        let t = text.trim();
        if !hidden && !t.is_empty() {
            parts.push(t);
        }
    }
    collapse_whitespace(&parts.join(" "))
}

/// Strip markup and collect heading and bold spans. Returns `None` when the
/// cleaned text is shorter than `min_content_len` characters.
pub fn load_page(raw_html: &str, url: &str, min_content_len: usize) -> Option<DocumentInput> {
    let doc = Html::parse_document(raw_html);
    let content = visible_text(&doc);
    if content.chars().count() < min_content_len {
        return None;
    }

    let mut input = DocumentInput::new(url, content);
    for level in 1..=3u8 {
        let Ok(sel) = Selector::parse(&format!("h{level}")) else { continue };
        let texts = element_text(&doc, &sel);
        if !texts.is_empty() {
            input.headings.insert(level, texts);
        }
    }
    if let Ok(sel) = Selector::parse("b, strong") {
        input.bold = element_text(&doc, &sel);
    }
    Some(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const PAGE: &str = r#"<html><head><title>Ferris</title><style>body { color: red }</style></head>
        <body>
          <h1>Rust Crabs</h1>
          <p>Ferris is the <b>unofficial</b> mascot of the <strong>Rust</strong> language.</p>
          <h2>Habitat</h2><h3>Tide pools</h3>
          <script>var tracking = true;</script>
        </body></html>"#;

    #[test]
    fn strips_markup_and_hidden_text() {
        let doc = load_page(PAGE, "https://ferris.example", 20).unwrap();
        assert!(doc.content.contains("Ferris is the unofficial mascot"));
        assert!(!doc.content.contains("tracking"));
        assert!(!doc.content.contains("color"));
        assert!(!doc.content.contains('<'));
    }

    #[test]
    fn collects_headings_by_level_and_bold() {
        let doc = load_page(PAGE, "u", 20).unwrap();
        assert_eq!(doc.headings[&1], vec!["Rust Crabs"]);
        assert_eq!(doc.headings[&2], vec!["Habitat"]);
        assert_eq!(doc.headings[&3], vec!["Tide pools"]);
        assert_eq!(doc.bold, vec!["unofficial", "Rust"]);
    }

    #[test]
    fn short_pages_are_skipped() {
        assert!(load_page("<p>too short</p>", "u", DEFAULT_MIN_CONTENT_LEN).is_none());
    }

    #[test]
    fn walks_json_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.json"), r#"{"url": "b", "content": ""}"#).unwrap();
        fs::write(dir.path().join("sub/a.json"), r#"{"url": "a", "content": ""}"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let files = walk_corpus(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("b.json"));
        assert!(files[1].ends_with("sub/a.json"));
    }

    #[test]
    fn jsonl_skips_bad_lines_and_fills_urls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pages.jsonl");
        fs::write(&path, "{\"url\": \"x\", \"content\": \"<p>hi</p>\"}\nnot json\n\n{\"content\": \"<p>yo</p>\"}\n").unwrap();
        let pages = load_file(&path).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].url.as_deref(), Some("x"));
        let fallback = path.to_string_lossy().into_owned();
        assert_eq!(pages[1].url.as_deref(), Some(fallback.as_str()));
    }
}
