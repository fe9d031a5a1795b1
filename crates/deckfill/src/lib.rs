//! # deckfill - Data-Driven Presentation Decks
//!
//! deckfill fills the `{{ placeholder }}` expressions of a presentation
//! deck from a data context. It provides:
//!
//! - Dotted expressions with filters, callables and broadcasting over lists
//! - Opt-in permission checks on every resolved value
//! - Loop sections that repeat a run of slides per collection element
//! - Composition of new decks from named, tagged or titled layouts
//! - A serializable in-memory deck model and the `deckfill` command
//!
//! This crate re-exports the engine crates:
//!
//! - [`deckfill_expr`]: expression parsing and resolution
//! - [`deckfill_render`]: text processing, permissions, loops and layouts
//!
//! ## Quick Start
//!
//! ```rust
//! use deckfill::{Context, Deck, EngineConfig, Shape, ShapeKind, Slide, Value};
//!
//! let deck = Deck::new(vec![
//!     Slide::new(vec![Shape::new("title", ShapeKind::Text, "%loop member in team%")]),
//!     Slide::new(vec![Shape::new("body", ShapeKind::Text, "Hello {{ member.name }}")]),
//!     Slide::new(vec![Shape::new("end", ShapeKind::Text, "%endloop%")]),
//! ]);
//! let ctx = Context::from_iter([(
//!     "team",
//!     Value::list([
//!         Value::map([("name", Value::from("Ann"))]),
//!         Value::map([("name", Value::from("Bo"))]),
//!     ]),
//! )]);
//!
//! let rendered = deck.render(&ctx, None, &EngineConfig::default()).unwrap();
//! assert_eq!(rendered.pages.len(), 6);
//! assert_eq!(rendered.pages[4].texts(), ["Hello Bo"]);
//! ```
//!
//! ## All or Nothing
//!
//! Rendering and composition surface every problem in one run. If any error
//! was recorded, the call returns the complete [`RenderErrors`] list and no
//! deck; the CLI writes nothing in that case.

pub mod cli;
pub mod compose;
pub mod deck;

pub use compose::{build_layouts, compose, compose_with};
pub use deck::{
    deny_types, load_context, load_document, Deck, DeckWriter, LoadError, Shape, ShapeKind, Slide,
};

// Re-export the engine crates and their most used items
pub use deckfill_expr;
pub use deckfill_expr::{resolve, Context, ExprError, Expression, ResolveOptions, Value};
pub use deckfill_render;
pub use deckfill_render::{
    enforce, process_text, render_pages, DenyPolicy, EngineConfig, ErrorKind, LayoutDiscovery,
    LayoutMapping, Mode, Outcome, PermissionCheck, RenderError, RenderErrors, TextOptions,
    TextOutput,
};
