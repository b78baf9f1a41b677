use std::path::{Path, PathBuf};
use std::sync::Arc;

use aipsync_fs::{AtomicWriteOptions, atomic_write};

use crate::document::{DocumentCodec, DocumentWriter, PagedDocument};
use crate::error::{CodecError, Result};

const HEADER: &str = "#lines";

/// Plain-text documents: a `#lines` header followed by one page per line.
///
/// Rendering is byte-for-byte deterministic, which makes this format handy
/// wherever merged output has to be compared exactly.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineCodec;

#[derive(Debug, Clone)]
pub struct LineDocument {
    path:  PathBuf,
    pages: Vec<Arc<str>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinePage(Arc<str>);

impl LinePage {
    pub fn new(text: impl Into<Arc<str>>) -> Self { Self(text.into()) }

    pub fn text(&self) -> &str { &self.0 }
}

#[derive(Debug, Default)]
pub struct LineWriter {
    pages:    Vec<LinePage>,
    rendered: Option<Vec<u8>>,
}

impl LineCodec {
    /// Serialize `pages` into the on-disk form.
    pub fn encode<'a>(pages: impl IntoIterator<Item = &'a str>) -> String {
        let mut out = String::from(HEADER);
        out.push('\n');
        for page in pages {
            out.push_str(page);
            out.push('\n');
        }
        out
    }
}

impl DocumentCodec for LineCodec {
    type Page = LinePage;
    type Document = LineDocument;
    type Writer = LineWriter;

    fn extension(&self) -> &'static str { "txt" }

    fn open(&self, path: &Path) -> Result<LineDocument> {
        let bytes = aipsync_fs::atomic_read(path).map_err(|e| CodecError::Open {
            path:   path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let malformed = |reason: &str| CodecError::Malformed {
            path:   path.to_path_buf(),
            reason: reason.to_string(),
        };

        let text = String::from_utf8(bytes).map_err(|_| malformed("not UTF-8"))?;
        let mut lines = text.lines();
        if lines.next() != Some(HEADER) {
            return Err(malformed("missing #lines header"));
        }

        Ok(LineDocument {
            path:  path.to_path_buf(),
            pages: lines.map(Arc::from).collect(),
        })
    }

    fn writer(&self) -> LineWriter { LineWriter::default() }
}

impl LineDocument {
    pub fn path(&self) -> &Path { &self.path }
}

impl PagedDocument for LineDocument {
    type Page = LinePage;

    fn page_count(&self) -> usize { self.pages.len() }

    fn page(&self, index: usize) -> Result<LinePage> {
        self.pages
            .get(index)
            .cloned()
            .map(LinePage)
            .ok_or(CodecError::PageOutOfRange {
                index,
                count: self.pages.len(),
            })
    }
}

impl LineWriter {
    fn render(&mut self) -> Result<&[u8]> {
        if self.rendered.is_none() {
            if let Some(page) = self.pages.iter().find(|p| p.text().contains('\n')) {
                return Err(CodecError::Render(format!(
                    "page {:?} spans several lines",
                    page.text()
                )));
            }
            let encoded = LineCodec::encode(self.pages.iter().map(LinePage::text));
            self.rendered = Some(encoded.into_bytes());
        }
        Ok(self.rendered.as_deref().unwrap_or_default())
    }
}

impl DocumentWriter for LineWriter {
    type Page = LinePage;

    fn add_page(&mut self, page: LinePage) {
        self.rendered = None;
        self.pages.push(page);
    }

    fn page_count(&self) -> usize { self.pages.len() }

    fn render_to_buffer(&mut self) -> Result<u64> { Ok(self.render()?.len() as u64) }

    fn write(&mut self, path: &Path) -> Result<()> {
        let bytes = self.render()?;
        atomic_write(path, bytes, AtomicWriteOptions::default()).map_err(|source| {
            CodecError::Write {
                path: path.to_path_buf(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_counts_pages() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, LineCodec::encode(["p1", "p2", "p3"])).unwrap();

        let doc = LineCodec.open(&path).unwrap();
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.page(1).unwrap().text(), "p2");
        assert!(matches!(
            doc.page(3),
            Err(CodecError::PageOutOfRange { index: 3, count: 3 })
        ));
    }

    #[test]
    fn test_open_rejects_missing_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, "p1\np2\n").unwrap();
        assert!(matches!(LineCodec.open(&path), Err(CodecError::Malformed { .. })));
    }

    #[test]
    fn test_writer_concatenates_in_order() {
        let dir = TempDir::new().unwrap();
        let mut writer = LineCodec.writer();
        writer.add_page(LinePage::new("b"));
        writer.add_page(LinePage::new("a"));

        assert_eq!(writer.render_to_buffer().unwrap(), "#lines\nb\na\n".len() as u64);

        let out = dir.path().join("out.txt");
        writer.write(&out).unwrap();
        assert_eq!(std::fs::read_to_string(out).unwrap(), "#lines\nb\na\n");
    }

    #[test]
    fn test_multiline_page_cannot_render() {
        let mut writer = LineCodec.writer();
        writer.add_page(LinePage::new("a\nb"));
        assert!(matches!(writer.render_to_buffer(), Err(CodecError::Render(_))));
    }
}
