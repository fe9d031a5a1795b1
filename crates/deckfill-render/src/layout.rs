//! Layout lookup for composed documents.
//!
//! A [`LayoutMapping`] maps layout identifiers to template pages. Pages
//! are registered explicitly by name, or discovered:
//!
//! - tagged: a span containing `% layout NAME %` (case-insensitive)
//!   registers its page as `NAME`
//! - titled: a page's first non-empty span text is its identifier
//!
//! Later registrations replace earlier ones with the same identifier.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::page::Page;

static LAYOUT_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)%\s*layout\s+(\w+)\s*%").expect("valid layout tag pattern"));

/// Which discovery rules to apply when building a mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutDiscovery {
    pub tagged: bool,
    pub titled: bool,
}

/// The layout name of a `% layout NAME %` tag in `text`.
pub fn layout_tag(text: &str) -> Option<&str> {
    LAYOUT_TAG
        .captures(text.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Identifier to template page mapping.
#[derive(Debug, Clone)]
pub struct LayoutMapping<P> {
    layouts: BTreeMap<String, P>,
}

impl<P> Default for LayoutMapping<P> {
    fn default() -> Self {
        Self {
            layouts: BTreeMap::new(),
        }
    }
}

impl<P: Page + Clone> LayoutMapping<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a mapping from named layouts plus pages discovered per `discovery`.
    ///
    /// Named layouts are registered first, then tagged pages, then titled pages.
    pub fn build<I, S>(named: I, pages: &[P], discovery: LayoutDiscovery) -> Self
    where
        I: IntoIterator<Item = (S, P)>,
        S: Into<String>,
    {
        let mut mapping = Self::new();
        mapping.add_source(named, pages, discovery);
        mapping
    }

    /// Adds one template source: its named layouts, then its discovered pages.
    pub fn add_source<I, S>(&mut self, named: I, pages: &[P], discovery: LayoutDiscovery)
    where
        I: IntoIterator<Item = (S, P)>,
        S: Into<String>,
    {
        for (id, page) in named {
            self.register(id, page);
        }
        if discovery.tagged {
            self.register_tagged(pages);
        }
        if discovery.titled {
            self.register_titled(pages);
        }
    }

    /// Registers `page` under `id`, returning the page it replaces.
    pub fn register(&mut self, id: impl Into<String>, page: P) -> Option<P> {
        self.layouts.insert(id.into(), page)
    }

    /// Registers every page carrying a layout tag. Returns how many were found.
    pub fn register_tagged(&mut self, pages: &[P]) -> usize {
        let mut found = 0;
        for page in pages {
            let tag = page
                .spans()
                .iter()
                .find_map(|span| layout_tag(span.text))
                .map(str::to_string);
            if let Some(id) = tag {
                self.register(id, page.clone());
                found += 1;
            }
        }
        found
    }

    /// Registers every page under its first non-empty span text. Returns how many were found.
    pub fn register_titled(&mut self, pages: &[P]) -> usize {
        let mut found = 0;
        for page in pages {
            let title = page
                .spans()
                .iter()
                .map(|span| span.text.trim())
                .find(|text| !text.is_empty())
                .map(str::to_string);
            if let Some(id) = title {
                self.register(id, page.clone());
                found += 1;
            }
        }
        found
    }

    pub fn get(&self, id: &str) -> Option<&P> {
        self.layouts.get(id)
    }

    /// Like [`get`](Self::get), failing with a layout error.
    pub fn require(&self, id: &str) -> Result<&P, RenderError> {
        self.get(id)
            .ok_or_else(|| RenderError::Layout(format!("layout '{}' not found", id)))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.layouts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}
