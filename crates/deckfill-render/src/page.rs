//! Document collaborator interfaces.
//!
//! The engine never touches a concrete document format. A document is read
//! through [`Page`], which lists the text-bearing spans of one page, and
//! written through [`DocumentWriter`], which receives each rendered value
//! with the location it belongs to.

use serde::{Deserialize, Serialize};

use crate::pipeline::RenderedPage;
use crate::text::{Mode, TextOutput};

/// Kind of a text-bearing span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    /// Free text, rendered inline.
    #[default]
    Text,
    /// A table cell or series entry, rendered in broadcast mode.
    Cell,
}

impl SpanKind {
    /// Text processing mode for spans of this kind.
    pub fn mode(self) -> Mode {
        match self {
            SpanKind::Text => Mode::Inline,
            SpanKind::Cell => Mode::Broadcast,
        }
    }
}

/// A borrowed view of one span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanRef<'a> {
    /// Position of the span within its page.
    pub index: usize,
    pub text: &'a str,
    pub kind: SpanKind,
}

impl<'a> SpanRef<'a> {
    pub fn new(index: usize, text: &'a str, kind: SpanKind) -> Self {
        Self { index, text, kind }
    }
}

/// One page of a document.
pub trait Page {
    /// The page's text-bearing spans, in reading order.
    fn spans(&self) -> Vec<SpanRef<'_>>;
}

impl<P: Page + ?Sized> Page for &P {
    fn spans(&self) -> Vec<SpanRef<'_>> {
        (**self).spans()
    }
}

/// Where a rendered value goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanLocation {
    /// Position of the output page, 0-based.
    pub page: usize,
    /// Index of the template page it was rendered from.
    pub source_page: usize,
    /// Index of the span within the template page.
    pub span: usize,
    pub kind: SpanKind,
}

/// Receives rendered output and writes it into a document.
pub trait DocumentWriter {
    /// Called once per output page, before any of its spans.
    fn begin_page(&mut self, page: &RenderedPage);

    fn write_span(&mut self, location: SpanLocation, value: &TextOutput);
}

/// Writes rendered pages into `writer`, in order.
///
/// Loop marker spans are not written; they keep their template text.
pub fn commit_pages<W: DocumentWriter + ?Sized>(pages: &[RenderedPage], writer: &mut W) {
    for (position, page) in pages.iter().enumerate() {
        writer.begin_page(page);
        for span in page.spans.iter().filter(|span| !span.marker) {
            let location = SpanLocation {
                page: position,
                source_page: page.source_index,
                span: span.index,
                kind: span.kind,
            };
            writer.write_span(location, &span.output);
        }
    }
    tracing::debug!(pages = pages.len(), "committed pages");
}
