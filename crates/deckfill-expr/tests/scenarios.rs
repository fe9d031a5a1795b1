//! End-to-end resolution scenarios with application objects and lazy collections.

use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;

use deckfill_expr::{
    matches_all, resolve, CallError, Condition, Context, ErrorKind, KeyedLookup, LazyFilterable,
    Object, ResolveOptions, Value,
};

#[derive(Debug, Clone)]
struct User {
    email: String,
    is_active: bool,
}

impl KeyedLookup for User {
    fn lookup(&self, key: &str) -> Option<Value> {
        match key {
            "email" => Some(Value::from(self.email.as_str())),
            "is_active" => Some(Value::from(self.is_active)),
            _ => None,
        }
    }
}

impl Object for User {
    fn type_name(&self) -> &str {
        "User"
    }

    fn display(&self) -> String {
        self.email.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An in-memory stand-in for a store-backed query set.
#[derive(Debug, Clone)]
struct UserSet {
    users: Vec<User>,
}

impl LazyFilterable for UserSet {
    fn filter(&self, conditions: &[Condition]) -> Result<Rc<dyn LazyFilterable>, CallError> {
        let users = self
            .users
            .iter()
            .filter(|u| matches_all(&Value::object((*u).clone()), conditions))
            .cloned()
            .collect();
        Ok(Rc::new(UserSet { users }))
    }

    fn materialize(&self) -> Result<Vec<Value>, CallError> {
        Ok(self.users.iter().cloned().map(Value::object).collect())
    }
}

fn users() -> Vec<User> {
    [
        ("user1@example.com", true),
        ("user2@example.com", false),
        ("user3@example.com", true),
    ]
    .into_iter()
    .map(|(email, is_active)| User {
        email: email.to_string(),
        is_active,
    })
    .collect()
}

fn program_ctx(users: Value) -> Context {
    Context::from_iter([("program", Value::map([("users", users)]))])
}

#[test]
fn filter_and_broadcast_over_objects() {
    let list = Value::list(users().into_iter().map(Value::object));
    let ctx = program_ctx(list);

    let resolved = resolve(
        "program.users[is_active=True].email",
        &ctx,
        &ResolveOptions::default(),
    )
    .unwrap();

    assert_eq!(
        resolved.value,
        Value::list(["user1@example.com", "user3@example.com"])
    );
}

#[test]
fn filter_delegates_to_lazy_collection() {
    let ctx = program_ctx(Value::query(UserSet { users: users() }));

    let resolved = resolve(
        "program.users[is_active=True].email",
        &ctx,
        &ResolveOptions::default(),
    )
    .unwrap();

    assert_eq!(
        resolved.value,
        Value::list(["user1@example.com", "user3@example.com"])
    );
}

#[test]
fn lazy_collection_is_materialized_without_filter() {
    let ctx = program_ctx(Value::query(UserSet { users: users() }));

    let resolved = resolve("program.users", &ctx, &ResolveOptions::default()).unwrap();
    assert_eq!(resolved.items().len(), 3);
    assert_eq!(
        resolved.value.to_string(),
        "user1@example.com, user2@example.com, user3@example.com"
    );
}

/// Counts every keyed lookup made on it.
#[derive(Debug)]
struct Tracked {
    lookups: Rc<Cell<usize>>,
}

impl KeyedLookup for Tracked {
    fn lookup(&self, key: &str) -> Option<Value> {
        self.lookups.set(self.lookups.get() + 1);
        Some(Value::from(key))
    }
}

impl Object for Tracked {
    fn type_name(&self) -> &str {
        "Tracked"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn curly_brace_in_segment_is_bad_expression() {
    let lookups = Rc::new(Cell::new(0));
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let ctx = Context::from_iter([
        (
            "dummy",
            Value::object(Tracked {
                lookups: Rc::clone(&lookups),
            }),
        ),
        (
            "make",
            Value::function(move |_: &[Value]| -> Result<Value, CallError> {
                counter.set(counter.get() + 1);
                Ok(Value::map([("name", Value::from("x"))]))
            }),
        ),
    ]);

    for text in ["dummy.{name}", "dummy.name.{x}", "make.{name}", "make().name.{x}"] {
        let err = resolve(text, &ctx, &ResolveOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadExpression, "{text}");
    }
    assert_eq!(lookups.get(), 0);
    assert_eq!(calls.get(), 0);

    let resolved = resolve("dummy.name", &ctx, &ResolveOptions::default()).unwrap();
    assert_eq!(resolved.value, Value::from("name"));
    assert_eq!(lookups.get(), 1);
}

#[test]
fn chained_sub_keys_invoke_intermediate_callables() {
    let profile = Value::function(|_: &[Value]| {
        Ok(Value::map([("city", Value::from("Lisbon"))]))
    });
    let ctx = Context::from_iter([("user", Value::map([("profile", profile)]))]);

    let resolved = resolve("user.profile__city", &ctx, &ResolveOptions::default()).unwrap();
    assert_eq!(resolved.value, Value::from("Lisbon"));
}

#[test]
fn json_context_resolves() {
    let ctx = Context::from_json(serde_json::json!({
        "team": {"members": [{"name": "ann"}, {"name": "bo"}]}
    }))
    .unwrap();

    let resolved = resolve("team.members.name", &ctx, &ResolveOptions::default()).unwrap();
    assert_eq!(resolved.value, Value::list(["ann", "bo"]));
}
