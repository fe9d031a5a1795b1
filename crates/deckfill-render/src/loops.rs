//! Loop sections across pages.
//!
//! A loop section is a run of pages repeated once per element of a
//! collection. The first page carries a start marker naming the loop
//! variable and the collection expression, the last page an end marker:
//!
//! ```text
//! page 1   %loop user in program.users%
//! page 2   {{ user.name }} <{{ user.email }}>
//! page 3   %endloop%
//! ```
//!
//! [`plan_loops`] scans the pages and validates marker structure;
//! [`expand`] resolves each section's collection and produces the work
//! items to render. Both record errors rather than stopping: a broken
//! section is skipped and the rest of the document still renders.

use deckfill_expr::{Context, ResolveOptions, Value};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ErrorKind, Outcome, RenderError};
use crate::page::Page;
use crate::permissions::{resolve_permitted, DenyPolicy, PermissionCheck};

static LOOP_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%loop\s+(\w+)\s+in\s+([^%]+?)\s*%").expect("valid loop start pattern")
});

static LOOP_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%endloop\s*%").expect("valid loop end pattern"));

/// Recognizes loop markers in span text.
pub trait MarkerGrammar {
    fn is_loop_start(&self, text: &str) -> bool;

    fn is_loop_end(&self, text: &str) -> bool;

    /// The loop variable and collection expression of a start marker.
    fn extract(&self, text: &str) -> Option<(String, String)>;

    fn is_marker(&self, text: &str) -> bool {
        self.is_loop_start(text) || self.is_loop_end(text)
    }
}

/// The `%loop <var> in <expression>%` / `%endloop%` marker syntax.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectiveGrammar;

impl MarkerGrammar for DirectiveGrammar {
    fn is_loop_start(&self, text: &str) -> bool {
        LOOP_START.is_match(text.trim())
    }

    fn is_loop_end(&self, text: &str) -> bool {
        LOOP_END.is_match(text.trim())
    }

    fn extract(&self, text: &str) -> Option<(String, String)> {
        let caps = LOOP_START.captures(text.trim())?;
        Some((caps[1].to_string(), caps[2].trim().to_string()))
    }
}

/// A validated loop section over pages `start..=end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSection {
    pub start: usize,
    pub end: usize,
    pub variable: String,
    pub collection: String,
}

impl LoopSection {
    pub fn contains(&self, page: usize) -> bool {
        (self.start..=self.end).contains(&page)
    }

    /// Number of pages in one replica.
    pub fn page_count(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Result of scanning a document for loop markers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopPlan {
    /// Closed sections, ordered by start page. They never overlap.
    pub sections: Vec<LoopSection>,
    /// Start page of a loop that is never closed. Pages from there on are
    /// not rendered.
    pub unterminated: Option<usize>,
    pub errors: Vec<RenderError>,
}

impl LoopPlan {
    /// The section starting at `page`, if any.
    pub fn section_at(&self, page: usize) -> Option<&LoopSection> {
        self.sections.iter().find(|s| s.start == page)
    }
}

#[derive(Debug)]
struct OpenLoop {
    start: usize,
    variable: String,
    collection: String,
}

/// Scans pages for loop markers and validates their structure.
///
/// A page may carry one start marker or one end marker. Structure errors
/// (nested starts, an end without a start, both kinds or several markers on
/// one page, an unterminated loop) are recorded; the offending page's
/// markers are ignored and scanning continues in the same state.
pub fn plan_loops<P, G>(pages: &[P], grammar: &G) -> LoopPlan
where
    P: Page,
    G: MarkerGrammar + ?Sized,
{
    let mut plan = LoopPlan::default();
    let mut open: Option<OpenLoop> = None;

    for (index, page) in pages.iter().enumerate() {
        let spans = page.spans();
        let starts: Vec<&str> = spans
            .iter()
            .map(|s| s.text)
            .filter(|t| grammar.is_loop_start(t))
            .collect();
        let ends = spans.iter().filter(|s| grammar.is_loop_end(s.text)).count();

        let structure_error = |reason: &str| RenderError::LoopStructure {
            page: index + 1,
            reason: reason.to_string(),
        };

        match (starts.len(), ends) {
            (0, 0) => {}
            (s, e) if s > 0 && e > 0 => {
                plan.errors
                    .push(structure_error("loop start and end markers on the same page"));
            }
            (s, _) if s > 1 => {
                plan.errors.push(structure_error("multiple loop start markers"));
            }
            (_, e) if e > 1 => {
                plan.errors.push(structure_error("multiple loop end markers"));
            }
            (1, 0) => {
                if let Some(outer) = &open {
                    plan.errors.push(structure_error(&format!(
                        "nested loops unsupported (loop '{}' open since page {})",
                        outer.variable,
                        outer.start + 1
                    )));
                } else {
                    match grammar.extract(starts[0]) {
                        Some((variable, collection)) => {
                            tracing::debug!(page = index + 1, %variable, %collection, "loop start");
                            open = Some(OpenLoop {
                                start: index,
                                variable,
                                collection,
                            });
                        }
                        None => plan.errors.push(structure_error("malformed loop start marker")),
                    }
                }
            }
            _ => match open.take() {
                Some(started) => {
                    tracing::debug!(page = index + 1, variable = %started.variable, "loop end");
                    plan.sections.push(LoopSection {
                        start: started.start,
                        end: index,
                        variable: started.variable,
                        collection: started.collection,
                    });
                }
                None => plan.errors.push(structure_error("end without start")),
            },
        }
    }

    if let Some(started) = open {
        plan.errors.push(RenderError::LoopStructure {
            page: started.start + 1,
            reason: format!("unterminated loop '{}'", started.variable),
        });
        plan.unterminated = Some(started.start);
    }

    for err in &plan.errors {
        tracing::warn!("{}", err);
    }
    plan
}

/// A page to render, with the context to render it in.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// Index of the template page.
    pub page_index: usize,
    /// Position of the bound element for loop replicas.
    pub iteration: Option<usize>,
    pub context: Context,
}

/// Options for [`expand`].
#[derive(Debug, Clone, Default)]
pub struct ExpandOptions {
    pub resolve: ResolveOptions,
    /// What a rejected collection element does to its section.
    pub policy: DenyPolicy,
}

/// Produces the ordered work items for a planned document.
///
/// Pages outside every section appear once with `ctx`. Each section's
/// collection is resolved once against `ctx`; the whole page range is then
/// emitted once per element, in collection order, with the loop variable
/// bound to that element. An empty collection emits nothing. A collection
/// that fails to resolve, resolves to nothing, is not a list, or is
/// rejected by the predicate records an error and emits nothing. The
/// predicate runs on every segment of the collection expression.
///
/// A loop start with no matching end truncates the document: that page and
/// every page after it produce no work items. The structure error is
/// already in the plan; placeholders on the dropped pages are never
/// resolved, so their own errors are not reported.
pub fn expand(
    plan: &LoopPlan,
    page_count: usize,
    ctx: &Context,
    predicate: Option<&PermissionCheck>,
    options: &ExpandOptions,
) -> Outcome<Vec<WorkItem>> {
    let mut outcome = Outcome::new(Vec::with_capacity(page_count));
    let last = plan.unterminated.unwrap_or(page_count).min(page_count);
    let mut index = 0;

    while index < last {
        let Some(section) = plan.section_at(index) else {
            outcome.output.push(WorkItem {
                page_index: index,
                iteration: None,
                context: ctx.clone(),
            });
            index += 1;
            continue;
        };

        let items = match collection_items(section, ctx, predicate, options) {
            Ok(enforced) => outcome.absorb(enforced),
            Err(err) => {
                outcome.record(err);
                Vec::new()
            }
        };
        tracing::debug!(
            variable = %section.variable,
            items = items.len(),
            pages = section.page_count(),
            "expanding loop"
        );

        for (iteration, item) in items.into_iter().enumerate() {
            let bound = ctx.with(section.variable.clone(), item);
            for page_index in section.start..=section.end {
                outcome.output.push(WorkItem {
                    page_index,
                    iteration: Some(iteration),
                    context: bound.clone(),
                });
            }
        }
        index = section.end + 1;
    }

    outcome
}

fn collection_items(
    section: &LoopSection,
    ctx: &Context,
    predicate: Option<&PermissionCheck>,
    options: &ExpandOptions,
) -> Result<Outcome<Vec<Value>>, RenderError> {
    let unusable = |reason: String| RenderError::CollectionResolution {
        expr: section.collection.clone(),
        reason,
    };

    let permitted = resolve_permitted(
        &section.collection,
        ctx,
        predicate,
        options.policy,
        &options.resolve,
    )
    .map_err(|err| match err.kind() {
        ErrorKind::PermissionDenied => err,
        _ => unusable(err.to_string()),
    })?;

    let denied = !permitted.is_clean();
    let Outcome {
        output: resolved,
        errors,
    } = permitted;
    let items = match resolved.value {
        Value::List(items) => items,
        Value::None if denied => Vec::new(),
        Value::None => return Err(unusable("resolved to nothing".to_string())),
        other => {
            return Err(unusable(format!(
                "a {} is not iterable",
                other.type_name()
            )))
        }
    };
    Ok(Outcome::with_errors(items, errors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::page::{SpanKind, SpanRef};

    struct TextPage(Vec<&'static str>);

    impl Page for TextPage {
        fn spans(&self) -> Vec<SpanRef<'_>> {
            self.0
                .iter()
                .enumerate()
                .map(|(i, t)| SpanRef::new(i, t, SpanKind::Text))
                .collect()
        }
    }

    fn pages(texts: &[&[&'static str]]) -> Vec<TextPage> {
        texts.iter().map(|t| TextPage(t.to_vec())).collect()
    }

    fn kinds(plan: &LoopPlan) -> Vec<ErrorKind> {
        plan.errors.iter().map(RenderError::kind).collect()
    }

    #[test]
    fn grammar_extracts_variable_and_expression() {
        let grammar = DirectiveGrammar;
        assert_eq!(
            grammar.extract("  %loop user in program.users[is_active=True]% "),
            Some(("user".to_string(), "program.users[is_active=True]".to_string()))
        );
        assert!(grammar.is_loop_end("%endloop%"));
        assert!(!grammar.is_loop_start("%loop in users%"));
    }

    #[test]
    fn plans_one_section() {
        let doc = pages(&[&["intro"], &["%loop u in users%"], &["{{ u }}"], &["%endloop%"]]);
        let plan = plan_loops(&doc, &DirectiveGrammar);
        assert!(plan.errors.is_empty());
        assert_eq!(
            plan.sections,
            vec![LoopSection {
                start: 1,
                end: 3,
                variable: "u".into(),
                collection: "users".into(),
            }]
        );
    }

    #[test]
    fn nested_start_is_rejected_and_outer_kept() {
        let doc = pages(&[
            &["%loop a in xs%"],
            &["%loop b in ys%"],
            &["body"],
            &["%endloop%"],
        ]);
        let plan = plan_loops(&doc, &DirectiveGrammar);
        assert_eq!(kinds(&plan), [ErrorKind::LoopStructure]);
        assert_eq!(plan.sections.len(), 1);
        assert_eq!((plan.sections[0].start, plan.sections[0].end), (0, 3));
        assert_eq!(plan.sections[0].variable, "a");
    }

    #[test]
    fn end_without_start() {
        let plan = plan_loops(&pages(&[&["x"], &["%endloop%"]]), &DirectiveGrammar);
        assert_eq!(kinds(&plan), [ErrorKind::LoopStructure]);
        assert!(plan.errors[0].to_string().contains("end without start"));
    }

    #[test]
    fn start_and_end_on_one_page() {
        let plan = plan_loops(
            &pages(&[&["%loop a in xs%", "%endloop%"]]),
            &DirectiveGrammar,
        );
        assert_eq!(kinds(&plan), [ErrorKind::LoopStructure]);
        assert!(plan.sections.is_empty());
    }

    #[test]
    fn multiple_markers_on_one_page() {
        let doc = pages(&[
            &["%loop a in xs%", "%loop b in ys%"],
            &["%endloop%", "%endloop%"],
        ]);
        let plan = plan_loops(&doc, &DirectiveGrammar);
        assert_eq!(kinds(&plan), [ErrorKind::LoopStructure, ErrorKind::LoopStructure]);
    }

    #[test]
    fn unterminated_loop_skips_to_end() {
        let doc = pages(&[&["a"], &["%loop x in xs%"], &["b"]]);
        let plan = plan_loops(&doc, &DirectiveGrammar);
        assert_eq!(plan.unterminated, Some(1));

        let ctx = Context::from_iter([("xs", Value::list([1, 2]))]);
        let items = expand(&plan, doc.len(), &ctx, None, &ExpandOptions::default());
        let indices: Vec<_> = items.output.iter().map(|w| w.page_index).collect();
        assert_eq!(indices, [0]);
    }

    #[test]
    fn expands_in_collection_order() {
        let doc = pages(&[&["%loop u in users%"], &["body"], &["%endloop%"], &["outro"]]);
        let plan = plan_loops(&doc, &DirectiveGrammar);
        let ctx = Context::from_iter([("users", Value::list(["ann", "bo"]))]);

        let outcome = expand(&plan, doc.len(), &ctx, None, &ExpandOptions::default());
        assert!(outcome.is_clean());
        let shape: Vec<_> = outcome
            .output
            .iter()
            .map(|w| (w.page_index, w.iteration, w.context.get("u")))
            .collect();
        assert_eq!(
            shape,
            vec![
                (0, Some(0), Some(Value::from("ann"))),
                (1, Some(0), Some(Value::from("ann"))),
                (2, Some(0), Some(Value::from("ann"))),
                (0, Some(1), Some(Value::from("bo"))),
                (1, Some(1), Some(Value::from("bo"))),
                (2, Some(1), Some(Value::from("bo"))),
                (3, None, None),
            ]
        );
    }

    #[test]
    fn empty_collection_emits_nothing() {
        let doc = pages(&[&["%loop u in users%"], &["%endloop%"], &["after"]]);
        let plan = plan_loops(&doc, &DirectiveGrammar);
        let ctx = Context::from_iter([("users", Value::list(Vec::<Value>::new()))]);
        let outcome = expand(&plan, doc.len(), &ctx, None, &ExpandOptions::default());
        assert!(outcome.is_clean());
        assert_eq!(outcome.output.len(), 1);
        assert_eq!(outcome.output[0].page_index, 2);
    }

    #[test]
    fn unusable_collections_skip_section() {
        let doc = pages(&[&["%loop u in users%"], &["%endloop%"]]);
        let plan = plan_loops(&doc, &DirectiveGrammar);
        for ctx in [
            Context::new(),
            Context::from_iter([("users", Value::None)]),
            Context::from_iter([("users", Value::from("ann"))]),
        ] {
            let outcome = expand(&plan, doc.len(), &ctx, None, &ExpandOptions::default());
            assert!(outcome.output.is_empty());
            assert_eq!(outcome.errors[0].kind(), ErrorKind::CollectionResolution);
        }
    }

    #[test]
    fn denied_collection_skips_section_when_raising() {
        let doc = pages(&[&["%loop u in users%"], &["%endloop%"]]);
        let plan = plan_loops(&doc, &DirectiveGrammar);
        let ctx = Context::from_iter([("users", Value::list(["ann", "bo"]))]);
        let no_bo = |v: &Value| v.as_str() != Some("bo");

        let outcome = expand(&plan, doc.len(), &ctx, Some(&no_bo), &ExpandOptions::default());
        assert!(outcome.output.is_empty());
        assert_eq!(outcome.errors[0].kind(), ErrorKind::PermissionDenied);

        let options = ExpandOptions {
            policy: DenyPolicy::Record,
            ..ExpandOptions::default()
        };
        let outcome = expand(&plan, doc.len(), &ctx, Some(&no_bo), &options);
        assert_eq!(outcome.output.len(), 2);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn collection_behind_denied_object_is_not_read() {
        let doc = pages(&[&["%loop m in team.members%"], &["%endloop%"]]);
        let plan = plan_loops(&doc, &DirectiveGrammar);
        let ctx = Context::from_iter([(
            "team",
            Value::map([("members", Value::list(["ann", "bo"]))]),
        )]);
        let no_maps = |v: &Value| !matches!(v, Value::Map(_));

        let outcome = expand(&plan, doc.len(), &ctx, Some(&no_maps), &ExpandOptions::default());
        assert!(outcome.output.is_empty());
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].kind(), ErrorKind::PermissionDenied);

        let options = ExpandOptions {
            policy: DenyPolicy::Record,
            ..ExpandOptions::default()
        };
        let outcome = expand(&plan, doc.len(), &ctx, Some(&no_maps), &options);
        assert!(outcome.output.is_empty());
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].kind(), ErrorKind::PermissionDenied);
    }
}
