//! In-memory deck model.
//!
//! A [`Deck`] is a serializable stand-in for a presentation file: ordered
//! slides of named shapes holding text. It implements the engine's page
//! and writer interfaces, so whole decks can be rendered and written back.
//!
//! ```yaml
//! layouts:
//!   closing:
//!     shapes:
//!       - { name: title, kind: placeholder, text: "" }
//! pages:
//!   - title: Team
//!     shapes:
//!       - { name: heading, text: "Team of {{ team.name }}" }
//!       - { name: members, kind: cell, text: "{{ team.members.name }}" }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use deckfill_expr::{Context, Value};
use deckfill_render::{
    commit_pages, render_pages, DocumentWriter, EngineConfig, Page, PermissionCheck,
    RenderErrors, RenderedPage, SpanKind, SpanLocation, SpanRef, TextOutput,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reading deck, context or slide files.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{path} must contain a mapping at the top level")]
    NotMapping { path: PathBuf },
}

/// Reads a JSON (`.json`) or YAML (any other extension) document.
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&content).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        })
    } else {
        serde_yaml::from_str(&content).map_err(|source| LoadError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Reads a context file. The top level must be a mapping.
pub fn load_context(path: &Path) -> Result<Context, LoadError> {
    let json: serde_json::Value = load_document(path)?;
    Context::from_json(json).ok_or_else(|| LoadError::NotMapping {
        path: path.to_path_buf(),
    })
}

/// Kind of a shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    #[default]
    Text,
    /// Table cell; a list value expands into one shape per element.
    Cell,
    /// Layout placeholder, filled in order by composition.
    Placeholder,
}

impl ShapeKind {
    fn span_kind(self) -> SpanKind {
        match self {
            ShapeKind::Cell => SpanKind::Cell,
            ShapeKind::Text | ShapeKind::Placeholder => SpanKind::Text,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: ShapeKind,
    #[serde(default)]
    pub text: String,
}

impl Shape {
    pub fn new(name: impl Into<String>, kind: ShapeKind, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub shapes: Vec<Shape>,
}

impl Slide {
    pub fn new(shapes: Vec<Shape>) -> Self {
        Self {
            title: None,
            shapes,
        }
    }

    /// Texts of all shapes, in order.
    pub fn texts(&self) -> Vec<&str> {
        self.shapes.iter().map(|s| s.text.as_str()).collect()
    }
}

impl Page for Slide {
    fn spans(&self) -> Vec<SpanRef<'_>> {
        self.shapes
            .iter()
            .enumerate()
            .map(|(i, shape)| SpanRef::new(i, &shape.text, shape.kind.span_kind()))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    /// Named layouts available to composition.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub layouts: BTreeMap<String, Slide>,
    #[serde(default)]
    pub pages: Vec<Slide>,
}

impl Deck {
    pub fn new(pages: Vec<Slide>) -> Self {
        Self {
            layouts: BTreeMap::new(),
            pages,
        }
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        load_document(path)
    }

    /// Renders every page, expanding loops. Returns the new deck only if
    /// no error was recorded.
    pub fn render(
        &self,
        ctx: &Context,
        predicate: Option<&PermissionCheck>,
        config: &EngineConfig,
    ) -> Result<Deck, RenderErrors> {
        let rendered = render_pages(&self.pages, ctx, predicate, config)?;
        let mut writer = DeckWriter::new(&self.pages);
        commit_pages(&rendered, &mut writer);
        Ok(writer.finish())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Builds an output deck from rendered pages.
///
/// Each output page starts as a copy of its template slide. A cell whose
/// value is a list keeps the first element and is followed by one copy of
/// the shape per remaining element, named `<name>#2`, `<name>#3`, ...
#[derive(Debug)]
pub struct DeckWriter<'a> {
    templates: &'a [Slide],
    pages: Vec<Slide>,
    pending: Vec<(usize, Vec<String>)>,
}

impl<'a> DeckWriter<'a> {
    pub fn new(templates: &'a [Slide]) -> Self {
        Self {
            templates,
            pages: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn finish(mut self) -> Deck {
        self.flush();
        Deck::new(self.pages)
    }

    fn flush(&mut self) {
        let Some(slide) = self.pages.last_mut() else {
            return;
        };
        // Spans were written in order, so splicing from the back keeps indices valid.
        for (index, extra) in self.pending.drain(..).rev() {
            let Some(base) = slide.shapes.get(index).cloned() else {
                continue;
            };
            let copies = extra.into_iter().enumerate().map(|(n, text)| Shape {
                name: format!("{}#{}", base.name, n + 2),
                kind: base.kind,
                text,
            });
            slide.shapes.splice(index + 1..index + 1, copies);
        }
    }
}

impl DocumentWriter for DeckWriter<'_> {
    fn begin_page(&mut self, page: &RenderedPage) {
        self.flush();
        let slide = self
            .templates
            .get(page.source_index)
            .cloned()
            .unwrap_or_default();
        self.pages.push(slide);
    }

    fn write_span(&mut self, location: SpanLocation, value: &TextOutput) {
        let Some(shape) = self
            .pages
            .last_mut()
            .and_then(|slide| slide.shapes.get_mut(location.span))
        else {
            return;
        };
        match value {
            TextOutput::Text(text) => shape.text = text.clone(),
            TextOutput::List(items) => {
                shape.text = items.first().cloned().unwrap_or_default();
                if items.len() > 1 {
                    self.pending.push((location.span, items[1..].to_vec()));
                }
            }
        }
    }
}

/// A predicate rejecting values whose type is listed in `types`.
///
/// Objects are matched on their type name, maps on their `__type` key.
/// Every other value is allowed.
pub fn deny_types(types: Vec<String>) -> impl Fn(&Value) -> bool {
    move |value: &Value| {
        let type_name = match value {
            Value::Object(object) => Some(object.type_name().to_string()),
            Value::Map(map) => map.get("__type").map(|t| t.to_string()),
            _ => None,
        };
        !type_name.is_some_and(|name| types.iter().any(|t| *t == name))
    }
}
