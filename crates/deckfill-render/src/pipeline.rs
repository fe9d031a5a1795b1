//! Whole-document rendering.
//!
//! [`render_pages`] plans loops, expands them into work items, and runs the
//! text processor over every span of every work item. Errors from all
//! stages are collected; the rendered pages are returned only when there
//! are none, so a caller that writes output only on `Ok` never persists a
//! partially rendered document.

use deckfill_expr::{Context, Value};

use crate::config::EngineConfig;
use crate::error::{Outcome, RenderErrors};
use crate::loops::{expand, plan_loops, DirectiveGrammar, MarkerGrammar};
use crate::page::{Page, SpanKind};
use crate::permissions::PermissionCheck;
use crate::text::{process_text, Mode, TextOutput};

/// Context name bound to the 1-based output page number.
pub const PAGE_NUMBER: &str = "page_number";

/// One rendered span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSpan {
    pub index: usize,
    pub kind: SpanKind,
    pub output: TextOutput,
    /// Loop marker spans are kept verbatim and never written.
    pub marker: bool,
}

/// One rendered output page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// Index of the template page.
    pub source_index: usize,
    /// Position of the bound element for loop replicas.
    pub iteration: Option<usize>,
    /// 1-based position in the output.
    pub page_number: usize,
    pub spans: Vec<RenderedSpan>,
}

/// Renders a document with the default marker grammar.
///
/// # Example
///
/// ```
/// use deckfill_expr::{Context, Value};
/// use deckfill_render::{render_pages, EngineConfig, Page, SpanKind, SpanRef};
///
/// struct Slide(Vec<&'static str>);
///
/// impl Page for Slide {
///     fn spans(&self) -> Vec<SpanRef<'_>> {
///         self.0.iter().enumerate().map(|(i, t)| SpanRef::new(i, t, SpanKind::Text)).collect()
///     }
/// }
///
/// let deck = vec![
///     Slide(vec!["%loop u in users%", "Hello {{ u }}"]),
///     Slide(vec!["%endloop%"]),
/// ];
/// let ctx = Context::from_iter([("users", Value::list(["ann", "bo"]))]);
///
/// let pages = render_pages(&deck, &ctx, None, &EngineConfig::default()).unwrap();
/// assert_eq!(pages.len(), 4);
/// assert_eq!(pages[2].spans[1].output.as_text(), Some("Hello bo"));
/// ```
pub fn render_pages<P: Page>(
    pages: &[P],
    ctx: &Context,
    predicate: Option<&PermissionCheck>,
    config: &EngineConfig,
) -> Result<Vec<RenderedPage>, RenderErrors> {
    render_pages_with(pages, ctx, predicate, config, &DirectiveGrammar).into_result()
}

/// Renders a document with a custom marker grammar, returning output and errors together.
pub fn render_pages_with<P, G>(
    pages: &[P],
    ctx: &Context,
    predicate: Option<&PermissionCheck>,
    config: &EngineConfig,
    grammar: &G,
) -> Outcome<Vec<RenderedPage>>
where
    P: Page,
    G: MarkerGrammar + ?Sized,
{
    let plan = plan_loops(pages, grammar);
    let mut outcome = Outcome::with_errors(Vec::new(), plan.errors.clone());

    let items = outcome.absorb(expand(
        &plan,
        pages.len(),
        ctx,
        predicate,
        &config.expand_options(),
    ));
    tracing::debug!(
        templates = pages.len(),
        sections = plan.sections.len(),
        output = items.len(),
        "expanded document"
    );

    for (position, item) in items.into_iter().enumerate() {
        let page_number = position + 1;
        let page_ctx = item.context.with(PAGE_NUMBER, page_number);
        let rendered = render_page(&pages[item.page_index], &page_ctx, predicate, config, grammar);
        let spans = outcome.absorb(rendered.map_errors(|err| err.on_page(page_number)));
        outcome.output.push(RenderedPage {
            source_index: item.page_index,
            iteration: item.iteration,
            page_number,
            spans,
        });
    }

    outcome
}

/// Renders every span of one page against `ctx`.
///
/// Marker spans are copied verbatim. A span that fails as a whole renders
/// as an empty string with its error recorded.
pub fn render_page<P, G>(
    page: &P,
    ctx: &Context,
    predicate: Option<&PermissionCheck>,
    config: &EngineConfig,
    grammar: &G,
) -> Outcome<Vec<RenderedSpan>>
where
    P: Page + ?Sized,
    G: MarkerGrammar + ?Sized,
{
    let mut outcome = Outcome::new(Vec::new());

    for span in page.spans() {
        let marker = grammar.is_marker(span.text);
        let output = if marker {
            TextOutput::Text(span.text.to_string())
        } else {
            let options = config.text_options(span.kind.mode());
            match process_text(span.text, ctx, predicate, &options) {
                Ok(processed) => outcome.absorb(processed),
                Err(err) => {
                    outcome.record(err);
                    TextOutput::Text(String::new())
                }
            }
        };
        outcome.output.push(RenderedSpan {
            index: span.index,
            kind: span.kind,
            output,
            marker,
        });
    }

    outcome
}

/// Renders a single string in inline mode, for values that are themselves templates.
pub fn render_str(
    text: &str,
    ctx: &Context,
    predicate: Option<&PermissionCheck>,
    config: &EngineConfig,
) -> Outcome<Value> {
    let options = config.text_options(Mode::Inline);
    match process_text(text, ctx, predicate, &options) {
        Ok(processed) => processed.map(|out| Value::String(out.to_string())),
        Err(err) => Outcome::with_errors(Value::None, vec![err]),
    }
}
