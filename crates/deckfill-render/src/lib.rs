//! # deckfill-render - Placeholder Rendering for Document Pages
//!
//! `deckfill-render` fills `{{ placeholder }}` expressions in the text spans
//! of document pages, gates resolved values through an authorization
//! predicate, and repeats loop sections of pages once per collection
//! element. Expressions are parsed and resolved by `deckfill-expr`.
//!
//! The crate never reads or writes a concrete document format. Documents
//! are seen through the [`Page`] trait and written through
//! [`DocumentWriter`].
//!
//! ## Core Concepts
//!
//! - [`process_text`]: Substitute the placeholders of one span
//! - [`enforce`]: Apply a permission predicate to a resolved value
//! - [`plan_loops`] / [`expand`]: Validate loop markers and produce work items
//! - [`render_pages`]: Run the whole pipeline over a document
//! - [`LayoutMapping`]: Look up template pages by layout identifier
//! - [`EngineConfig`]: Delimiter, depth limit, permission policies, fixed clock
//!
//! ## Quick Start
//!
//! ```rust
//! use deckfill_expr::{Context, Value};
//! use deckfill_render::{process_text, TextOptions, TextOutput};
//!
//! let ctx = Context::from_iter([(
//!     "report",
//!     Value::map([("title", Value::from("Q3 Review"))]),
//! )]);
//!
//! let outcome = process_text("Title: {{ report.title }}", &ctx, None, &TextOptions::default())
//!     .unwrap();
//! assert_eq!(outcome.output, TextOutput::Text("Title: Q3 Review".into()));
//! assert!(outcome.errors.is_empty());
//! ```
//!
//! ## Errors
//!
//! Rendering reports everything it finds. Placeholder, page and loop
//! failures are recorded in an [`Outcome`] and processing continues;
//! [`render_pages`] returns [`RenderErrors`] with the full list if any were
//! recorded, and the rendered pages only if none were.

pub mod config;
mod error;
pub mod format;
pub mod layout;
pub mod loops;
pub mod page;
pub mod permissions;
pub mod pipeline;
pub mod text;

pub use config::EngineConfig;
pub use error::{ErrorKind, Outcome, RenderError, RenderErrors};
pub use format::{apply_format, convert_format};
pub use layout::{layout_tag, LayoutDiscovery, LayoutMapping};
pub use loops::{
    expand, plan_loops, DirectiveGrammar, ExpandOptions, LoopPlan, LoopSection, MarkerGrammar,
    WorkItem,
};
pub use page::{commit_pages, DocumentWriter, Page, SpanKind, SpanLocation, SpanRef};
pub use permissions::{enforce, resolve_permitted, DenyPolicy, PermissionCheck, PermissionGate};
pub use pipeline::{
    render_page, render_pages, render_pages_with, render_str, RenderedPage, RenderedSpan,
    PAGE_NUMBER,
};
pub use text::{
    find_placeholders, has_placeholders, is_pure, process_text, Mode, Placeholder, TextOptions,
    TextOutput,
};
