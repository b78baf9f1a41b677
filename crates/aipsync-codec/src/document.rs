use std::path::Path;

use crate::Result;

/// A document format the merge step can read and concatenate.
pub trait DocumentCodec: Send + Sync + 'static {
    type Page: Send + 'static;
    type Document: PagedDocument<Page = Self::Page>;
    type Writer: DocumentWriter<Page = Self::Page>;

    /// File extension of documents in this format, without the dot.
    fn extension(&self) -> &'static str;

    fn open(&self, path: &Path) -> Result<Self::Document>;

    /// A writer with no pages.
    fn writer(&self) -> Self::Writer;
}

/// A document opened for reading.
pub trait PagedDocument: Send {
    type Page;

    fn page_count(&self) -> usize;

    /// Page at zero-based `index`.
    fn page(&self, index: usize) -> Result<Self::Page>;

    /// Every page in document order.
    fn pages(&self) -> Result<Vec<Self::Page>> {
        (0..self.page_count()).map(|i| self.page(i)).collect()
    }
}

/// Accumulates pages, possibly taken from several documents, into one output.
pub trait DocumentWriter: Send {
    type Page;

    fn add_page(&mut self, page: Self::Page);

    fn page_count(&self) -> usize;

    /// Render the output in memory and return its size in bytes.
    ///
    /// Encoders are free to be nondeterministic, so two renders of the same
    /// pages may differ slightly in size.
    fn render_to_buffer(&mut self) -> Result<u64>;

    /// Render the output and place it at `path`.
    fn write(&mut self, path: &Path) -> Result<()>;
}
