//! Deck composition from layouts.
//!
//! Composition builds a new deck from slide specifications instead of
//! rendering an existing one. Each specification names a layout and
//! carries its own fields:
//!
//! ```yaml
//! - layout: title
//!   heading: "{{ program.name }} review"
//!   placeholders: ["{{ heading }}", "{{ now | MMMM YYYY }}"]
//! - layout: closing
//! ```
//!
//! A slide's context is the global context layered with the
//! specification's fields. String fields containing a placeholder are
//! rendered against that context first, so other text can refer to them.
//! `placeholders` fill the layout's placeholder shapes in order, then the
//! whole slide is rendered like any other page.

use deckfill_expr::{Context, Value};
use deckfill_render::{
    commit_pages, has_placeholders, render_page, render_str, DirectiveGrammar, EngineConfig,
    LayoutDiscovery, LayoutMapping, Outcome, PermissionCheck, RenderError, RenderErrors,
    RenderedPage, PAGE_NUMBER,
};

use crate::deck::{Deck, DeckWriter, ShapeKind, Slide};

/// Builds a layout mapping from template decks, in order.
///
/// For each deck, its named layouts are registered first, then its pages
/// per `discovery`. Later decks override earlier ones.
pub fn build_layouts(templates: &[Deck], discovery: LayoutDiscovery) -> LayoutMapping<Slide> {
    let mut mapping = LayoutMapping::new();
    for deck in templates {
        mapping.add_source(deck.layouts.clone(), &deck.pages, discovery);
    }
    tracing::debug!(layouts = mapping.len(), "built layout mapping");
    mapping
}

/// Composes a deck from template decks and slide specifications.
pub fn compose(
    templates: &[Deck],
    specs: &[serde_json::Value],
    global: &Context,
    predicate: Option<&PermissionCheck>,
    config: &EngineConfig,
    discovery: LayoutDiscovery,
) -> Result<Deck, RenderErrors> {
    if templates.is_empty() {
        return Err(RenderError::Layout("no template decks provided".to_string()).into());
    }
    let layouts = build_layouts(templates, discovery);
    compose_with(&layouts, specs, global, predicate, config)
}

/// Composes a deck from an existing layout mapping.
///
/// Every slide is attempted; the deck is returned only if none failed.
pub fn compose_with(
    layouts: &LayoutMapping<Slide>,
    specs: &[serde_json::Value],
    global: &Context,
    predicate: Option<&PermissionCheck>,
    config: &EngineConfig,
) -> Result<Deck, RenderErrors> {
    if specs.is_empty() {
        return Err(RenderError::Usage("no slides specified".to_string()).into());
    }
    if layouts.is_empty() {
        return Err(RenderError::Layout("no layout slides found".to_string()).into());
    }

    let mut outcome = Outcome::new(Vec::with_capacity(specs.len()));
    for (index, spec) in specs.iter().enumerate() {
        let number = index + 1;
        let slide = compose_slide(layouts, spec, number, global, predicate, config);
        if let Some(slide) = outcome.absorb(slide.map_errors(|err| err.on_page(number))) {
            outcome.output.push(slide);
        }
    }

    outcome.into_result().map(Deck::new)
}

fn compose_slide(
    layouts: &LayoutMapping<Slide>,
    spec: &serde_json::Value,
    number: usize,
    global: &Context,
    predicate: Option<&PermissionCheck>,
    config: &EngineConfig,
) -> Outcome<Option<Slide>> {
    let fail = |err: RenderError| Outcome::with_errors(None, vec![err]);

    let Some(fields) = spec.as_object() else {
        return fail(RenderError::Layout(
            "slide specification must be a mapping".to_string(),
        ));
    };
    let Some(layout_id) = fields.get("layout").and_then(|v| v.as_str()) else {
        return fail(RenderError::Layout("missing 'layout' key".to_string()));
    };
    let template = match layouts.require(layout_id) {
        Ok(template) => template,
        Err(err) => return fail(err),
    };
    tracing::debug!(slide = number, layout = layout_id, "composing slide");

    let mut outcome = Outcome::new(None);

    let base = global
        .layered(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), Value::from(value.clone()))),
        )
        .with(PAGE_NUMBER, number);

    let mut templated = Vec::new();
    for (key, value) in fields {
        if let Some(text) = value.as_str().filter(|text| has_placeholders(text)) {
            let rendered = outcome.absorb(render_str(text, &base, predicate, config));
            templated.push((key.clone(), rendered));
        }
    }
    let ctx = if templated.is_empty() {
        base
    } else {
        base.layered(templated)
    };

    let mut slide = template.clone();

    if let Some(placeholders) = fields.get("placeholders").and_then(|v| v.as_array()) {
        let targets = slide
            .shapes
            .iter_mut()
            .filter(|shape| shape.kind == ShapeKind::Placeholder);
        for (shape, text) in targets.zip(placeholders) {
            let text = match text.as_str() {
                Some(s) => s.to_string(),
                None => text.to_string(),
            };
            shape.text = outcome
                .absorb(render_str(&text, &ctx, predicate, config))
                .to_string();
        }
    }

    let spans = outcome.absorb(render_page(
        &slide,
        &ctx,
        predicate,
        config,
        &DirectiveGrammar,
    ));
    let rendered = RenderedPage {
        source_index: 0,
        iteration: None,
        page_number: number,
        spans,
    };

    let templates = std::slice::from_ref(&slide);
    let mut writer = DeckWriter::new(templates);
    commit_pages(std::slice::from_ref(&rendered), &mut writer);
    outcome.output = writer.finish().pages.into_iter().next();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::Shape;
    use deckfill_render::ErrorKind;
    use serde_json::json;

    fn layouts() -> LayoutMapping<Slide> {
        let mut mapping = LayoutMapping::new();
        mapping.register(
            "title",
            Slide::new(vec![
                Shape::new("heading", ShapeKind::Placeholder, ""),
                Shape::new("sub", ShapeKind::Placeholder, ""),
                Shape::new("footer", ShapeKind::Text, "{{ page_number }} / {{ org }}"),
            ]),
        );
        mapping
    }

    fn global() -> Context {
        Context::from_iter([("org", Value::from("Acme"))])
    }

    fn compose_specs(specs: serde_json::Value) -> Result<Deck, RenderErrors> {
        let specs = specs.as_array().cloned().unwrap_or_default();
        compose_with(&layouts(), &specs, &global(), None, &EngineConfig::default())
    }

    #[test]
    fn fills_placeholders_in_order() {
        let deck = compose_specs(json!([
            {"layout": "title", "name": "Q3", "placeholders": ["Report {{ name }}", "{{ org }}"]}
        ]))
        .unwrap();
        assert_eq!(deck.pages[0].texts(), ["Report Q3", "Acme", "1 / Acme"]);
    }

    #[test]
    fn templated_fields_render_first() {
        let deck = compose_specs(json!([
            {"layout": "title", "heading": "{{ org }} review", "placeholders": ["{{ heading }}"]}
        ]))
        .unwrap();
        assert_eq!(deck.pages[0].shapes[0].text, "Acme review");
    }

    #[test]
    fn reports_every_bad_slide() {
        let errors = compose_specs(json!([
            {"name": "no layout"},
            {"layout": "missing"},
            {"layout": "title", "placeholders": ["{{ nope }}"]},
            "not a mapping"
        ]))
        .unwrap_err();
        assert_eq!(
            errors.kinds(),
            [
                ErrorKind::Layout,
                ErrorKind::Layout,
                ErrorKind::MissingData,
                ErrorKind::Layout,
            ]
        );
        let messages: Vec<_> = errors.iter().map(ToString::to_string).collect();
        assert_eq!(messages[0], "page 1: layout error: missing 'layout' key");
        assert_eq!(messages[1], "page 2: layout error: layout 'missing' not found");
    }

    #[test]
    fn empty_inputs_fail() {
        let err = compose_specs(json!([])).unwrap_err();
        assert_eq!(err.kinds(), [ErrorKind::Usage]);

        let err = compose(
            &[],
            &[json!({"layout": "title"})],
            &global(),
            None,
            &EngineConfig::default(),
            LayoutDiscovery::default(),
        )
        .unwrap_err();
        assert_eq!(err.kinds(), [ErrorKind::Layout]);
    }

    #[test]
    fn discovers_titled_layouts_from_decks() {
        let template = Deck::new(vec![Slide::new(vec![
            Shape::new("t", ShapeKind::Text, "Agenda"),
            Shape::new("body", ShapeKind::Text, "{{ items }}"),
        ])]);
        let discovery = LayoutDiscovery {
            titled: true,
            ..LayoutDiscovery::default()
        };
        let ctx = Context::from_iter([("items", Value::list(["a", "b"]))]);

        let deck = compose(
            &[template],
            &[json!({"layout": "Agenda"})],
            &ctx,
            None,
            &EngineConfig::default(),
            discovery,
        )
        .unwrap();
        assert_eq!(deck.pages[0].texts(), ["Agenda", "a, b"]);
    }
}
