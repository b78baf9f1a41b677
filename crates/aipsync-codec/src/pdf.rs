use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use aipsync_fs::{AtomicWriteOptions, atomic_write};
use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use tracing::debug;

use crate::document::{DocumentCodec, DocumentWriter, PagedDocument};
use crate::error::{CodecError, Result};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// PDF codec backed by `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfCodec;

#[derive(Debug, Clone)]
pub struct PdfDocument {
    doc:   Arc<Document>,
    pages: Vec<ObjectId>,
}

/// A page borrowed from an open [`PdfDocument`].
///
/// Holds the source document alive until the writer has copied it out.
#[derive(Debug, Clone)]
pub struct PdfPage {
    doc: Arc<Document>,
    id:  ObjectId,
}

#[derive(Debug, Default)]
pub struct PdfWriter {
    pages:    Vec<PdfPage>,
    rendered: Option<Vec<u8>>,
}

impl DocumentCodec for PdfCodec {
    type Page = PdfPage;
    type Document = PdfDocument;
    type Writer = PdfWriter;

    fn extension(&self) -> &'static str { "pdf" }

    fn open(&self, path: &Path) -> Result<PdfDocument> {
        let doc = Document::load(path).map_err(|e| CodecError::Malformed {
            path:   path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let pages = doc.get_pages().into_values().collect();

        Ok(PdfDocument {
            doc: Arc::new(doc),
            pages,
        })
    }

    fn writer(&self) -> PdfWriter { PdfWriter::default() }
}

impl PagedDocument for PdfDocument {
    type Page = PdfPage;

    fn page_count(&self) -> usize { self.pages.len() }

    fn page(&self, index: usize) -> Result<PdfPage> {
        let id = *self.pages.get(index).ok_or(CodecError::PageOutOfRange {
            index,
            count: self.pages.len(),
        })?;
        Ok(PdfPage {
            doc: Arc::clone(&self.doc),
            id,
        })
    }
}

impl PdfWriter {
    fn build(&self) -> Result<Document> {
        let mut out = Document::with_version("1.5");
        let pages_id = out.new_object_id();
        let mut imported = HashMap::new();
        let mut kids = Vec::with_capacity(self.pages.len());

        for page in &self.pages {
            let mut importer = Importer {
                src:      &page.doc,
                out:      &mut out,
                imported: &mut imported,
                source:   Arc::as_ptr(&page.doc) as usize,
            };
            kids.push(Object::Reference(importer.page(page.id, pages_id)?));
        }

        let count = kids.len() as i64;
        out.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = out.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        out.trailer.set("Root", catalog_id);
        out.compress();

        Ok(out)
    }

    fn render(&mut self) -> Result<&[u8]> {
        if self.rendered.is_none() {
            let mut doc = self.build()?;
            let mut buffer = Vec::new();
            doc.save_to(&mut buffer)
                .map_err(|e| CodecError::Render(e.to_string()))?;
            debug!(pages = self.pages.len(), bytes = buffer.len(), "rendered pdf");
            self.rendered = Some(buffer);
        }
        Ok(self.rendered.as_deref().unwrap_or_default())
    }
}

impl DocumentWriter for PdfWriter {
    type Page = PdfPage;

    fn add_page(&mut self, page: PdfPage) {
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

/// Deep-copies objects from one source document into the output, assigning
/// fresh ids. Ids already copied from the same source are reused so shared
/// resources (fonts, images) are written once.
struct Importer<'a> {
    src:      &'a Document,
    out:      &'a mut Document,
    imported: &'a mut HashMap<(usize, ObjectId), ObjectId>,
    source:   usize,
}

impl Importer<'_> {
    fn page(&mut self, id: ObjectId, parent: ObjectId) -> Result<ObjectId> {
        let new_id = self.out.new_object_id();
        self.imported.insert((self.source, id), new_id);

        let src = self.src;
        let original = src.get_dictionary(id).map_err(render_err)?;
        let mut page = self.dictionary(original)?;

        for key in INHERITABLE {
            if page.has(key) {
                continue;
            }
            if let Some(value) = self.inherited(original, key) {
                let value = self.object(&value)?;
                page.set(key, value);
            }
        }

        page.set("Parent", parent);
        self.out.objects.insert(new_id, Object::Dictionary(page));
        Ok(new_id)
    }

    fn inherited(&self, page: &Dictionary, key: &[u8]) -> Option<Object> {
        let mut current = page.get(b"Parent").and_then(Object::as_reference).ok();
        while let Some(id) = current {
            let node = self.src.get_dictionary(id).ok()?;
            if let Ok(value) = node.get(key) {
                return Some(value.clone());
            }
            current = node.get(b"Parent").and_then(Object::as_reference).ok();
        }
        None
    }

    fn reference(&mut self, id: ObjectId) -> Result<ObjectId> {
        if let Some(&new_id) = self.imported.get(&(self.source, id)) {
            return Ok(new_id);
        }
        let new_id = self.out.new_object_id();
        self.imported.insert((self.source, id), new_id);

        let src = self.src;
        let object = match src.get_object(id) {
            Ok(object) => self.object(object)?,
            Err(_) => Object::Null,
        };
        self.out.objects.insert(new_id, object);
        Ok(new_id)
    }

    fn object(&mut self, object: &Object) -> Result<Object> {
        Ok(match object {
            Object::Reference(id) => Object::Reference(self.reference(*id)?),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.object(item))
                    .collect::<Result<_>>()?,
            ),
            Object::Dictionary(dict) => Object::Dictionary(self.dictionary(dict)?),
            Object::Stream(stream) => {
                let mut copy = stream.clone();
                copy.dict = self.dictionary(&stream.dict)?;
                Object::Stream(copy)
            }
            other => other.clone(),
        })
    }

    /// Page tree nodes keep no `Parent`; the output builds its own tree.
    fn dictionary(&mut self, dict: &Dictionary) -> Result<Dictionary> {
        let tree_node = matches!(
            dict.get(b"Type"),
            Ok(Object::Name(name)) if name.as_slice() == b"Page" || name.as_slice() == b"Pages"
        );

        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            if tree_node && key.as_slice() == b"Parent" {
                continue;
            }
            copy.set(key.clone(), self.object(value)?);
        }
        Ok(copy)
    }
}

fn render_err(e: lopdf::Error) -> CodecError { CodecError::Render(e.to_string()) }
