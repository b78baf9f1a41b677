//! Paged document codecs.
//!
//! The merge step only ever needs four things from a document format: open a
//! file, count its pages, hand a page over to a writer, and render the writer
//! either to memory (to measure it) or to disk. [`DocumentCodec`] captures
//! exactly that, with [`PdfCodec`] as the production implementation and
//! [`LineCodec`] as a deterministic plain-text one.

mod document;
mod error;
mod lines;
mod pdf;

pub use document::{DocumentCodec, DocumentWriter, PagedDocument};
pub use error::{CodecError, Result};
pub use lines::{LineCodec, LineDocument, LinePage, LineWriter};
pub use pdf::{PdfCodec, PdfDocument, PdfPage, PdfWriter};
