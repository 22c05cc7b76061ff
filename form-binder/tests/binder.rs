//! Tests for binder state, node state and validation scheduling.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::join_all;
use serde_json::json;

use form_binder::prelude::*;

// =============================================================================
// Helpers
// =============================================================================

/// Validator that counts its runs and optionally takes a while to settle.
struct Counting {
    calls: Arc<AtomicUsize>,
    delay: Duration,
    accept: fn(&Value) -> bool,
    message: &'static str,
}

impl Validator for Counting {
    fn message(&self) -> &str {
        self.message
    }

    fn validate(&self, value: &Value) -> BoxFuture<'static, bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay;
        let valid = (self.accept)(value);
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            valid
        }
        .boxed()
    }
}

fn counting(calls: &Arc<AtomicUsize>, delay_ms: u64) -> Counting {
    Counting {
        calls: Arc::clone(calls),
        delay: Duration::from_millis(delay_ms),
        accept: |value| value.as_str().is_some_and(|s| !s.is_empty()),
        message: "must not be empty",
    }
}

fn person() -> Model {
    Model::object("Person").field("name", Model::string().validator(Required::new("Name is required")))
}

fn counting_changes(changes: &Arc<AtomicUsize>) -> BinderConfig {
    let changes = Arc::clone(changes);
    BinderConfig::new().on_change(move |_| {
        changes.fetch_add(1, Ordering::SeqCst);
    })
}

// =============================================================================
// Values, dirty state and notifications
// =============================================================================

#[test]
fn test_reset_restores_default() {
    let binder = Binder::new(person(), BinderConfig::new());
    assert_eq!(binder.value(), json!({"name": ""}));
    assert!(!binder.dirty());

    binder.set_value(json!({"name": "x"}));
    assert!(binder.dirty());

    binder.reset(None);
    assert!(!binder.dirty());
    assert_eq!(binder.value()["name"], json!(""));
}

#[test]
fn test_reset_with_new_default() {
    let binder = Binder::new(person(), BinderConfig::new());
    binder.reset(Some(json!({"name": "Jane"})));

    assert_eq!(binder.default_value(), json!({"name": "Jane"}));
    assert_eq!(binder.value(), json!({"name": "Jane"}));
    assert!(!binder.dirty());

    let name = binder.root().field("name").unwrap();
    name.set_value(json!("Janet"));
    assert!(name.dirty());
    assert_eq!(name.default_value(), json!("Jane"));
}

#[test]
fn test_clear_sets_empty_value() {
    let binder = Binder::new(person(), BinderConfig::new());
    binder.reset(Some(json!({"name": "Jane"})));
    binder.clear();

    assert_eq!(binder.value(), json!({"name": ""}));
    assert_eq!(&binder.value(), binder.empty_value());
    assert!(binder.dirty());
}

#[test]
fn test_set_value_notifies_once_with_previous_value() {
    let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let config = {
        let seen = Arc::clone(&seen);
        BinderConfig::new().on_change(move |old| seen.lock().unwrap().push(old.clone()))
    };
    let binder = Binder::new(person(), config);

    binder.set_value(json!({"name": "x"}));
    binder.set_value(json!({"name": "x"}));
    assert_eq!(*seen.lock().unwrap(), vec![json!({"name": ""})]);

    let name = binder.root().field("name").unwrap();
    name.set_value(json!("y"));
    name.set_value(json!("y"));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![json!({"name": ""}), json!({"name": "x"})]
    );
    assert_eq!(binder.value(), json!({"name": "y"}));
}

#[test]
fn test_change_callback_may_read_binder() {
    let observed: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
    let slot: Arc<Mutex<Option<Binder>>> = Arc::new(Mutex::new(None));
    let config = {
        let observed = Arc::clone(&observed);
        let slot = Arc::clone(&slot);
        BinderConfig::new().on_change(move |_| {
            if let Some(binder) = slot.lock().unwrap().as_ref() {
                *observed.lock().unwrap() = Some(binder.value());
            }
        })
    };
    let binder = Binder::new(person(), config);
    *slot.lock().unwrap() = Some(binder.clone());

    binder.set_value(json!({"name": "x"}));
    assert_eq!(*observed.lock().unwrap(), Some(json!({"name": "x"})));
}

// =============================================================================
// Node structure
// =============================================================================

#[test]
fn test_root_node() {
    let binder = Binder::new(person(), BinderConfig::new());
    let root = binder.root();

    assert!(root.is_root());
    assert_eq!(root.parent(), root);
    assert_eq!(root.name(), "");
    assert_eq!(binder.name(), "");
    assert_eq!(root.default_value(), binder.default_value());
    assert!(!root.dirty());
}

#[test]
fn test_field_nodes_share_state() {
    let binder = Binder::new(person(), BinderConfig::new());
    let first = binder.root().field("name").unwrap();
    let second = binder.for_model(&binder.model().field("name").unwrap()).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.parent(), binder.root());
    assert_eq!(binder.nodes().len(), 2);
}

#[test]
fn test_unknown_field() {
    let binder = Binder::new(person(), BinderConfig::new());
    let err = binder.root().field("email").unwrap_err();
    assert!(matches!(err, BinderError::UnknownPath(ref path) if path == "email"));
}

#[test]
fn test_for_model_rejects_foreign_model() {
    let binder = Binder::new(person(), BinderConfig::new());
    let other = Binder::new(person(), BinderConfig::new());
    let foreign = other.model().field("name").unwrap();

    let err = binder.for_model(&foreign).unwrap_err();
    assert!(matches!(err, BinderError::UnknownModel(ref name) if name == "name"));
}

#[test]
fn test_nested_and_array_values() {
    let model = Model::object("Order")
        .field("customer", Model::object("Customer").field("name", Model::string()))
        .field("lines", Model::array(Model::object("Line").field("sku", Model::string())));
    let binder = Binder::new(model, BinderConfig::new());

    let sku = binder
        .root()
        .field("lines")
        .and_then(|lines| lines.item(1))
        .and_then(|line| line.field("sku"))
        .unwrap();
    assert_eq!(sku.name(), "lines[1].sku");
    assert_eq!(sku.value(), Value::Null);
    assert_eq!(sku.default_value(), Value::Null);

    sku.set_value(json!("A-1"));
    assert_eq!(
        binder.value(),
        json!({"customer": {"name": ""}, "lines": [null, {"sku": "A-1"}]})
    );
    assert!(sku.dirty());
    assert!(sku.parent().dirty());

    let customer = binder.root().field("customer").unwrap();
    assert!(!customer.dirty());
}

#[test]
fn test_unallocatable_item_write_is_refused() {
    let changes = Arc::new(AtomicUsize::new(0));
    let model = Model::object("Post").field("tags", Model::array(Model::string()));
    let binder = Binder::new(model, counting_changes(&changes));
    let item = binder
        .root()
        .field("tags")
        .and_then(|tags| tags.item(usize::MAX))
        .unwrap();

    item.set_value(json!("x"));

    assert_eq!(binder.value(), json!({"tags": []}));
    assert_eq!(item.value(), Value::Null);
    assert_eq!(changes.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_required_field_after_visit() {
    let binder = Binder::new(person(), BinderConfig::new());
    let name = binder.root().field("name").unwrap();

    name.set_visited(true);
    name.validate().await;
    assert!(name.visited());
    assert_eq!(name.errors().len(), 1);
    assert!(name.invalid());
    assert_eq!(name.errors()[0].property, "name");
    assert_eq!(name.errors()[0].message(), "Name is required");
    assert_eq!(binder.errors().len(), 1);

    name.set_value(json!("x"));
    name.validate().await;
    assert!(name.errors().is_empty());
    assert!(!name.invalid());
    assert!(binder.errors().is_empty());
}

#[tokio::test]
async fn test_validate_skips_unvisited_node() {
    let calls = Arc::new(AtomicUsize::new(0));
    let model = Model::object("Person").field("name", Model::string().validator(counting(&calls, 0)));
    let binder = Binder::new(model, BinderConfig::new());
    let name = binder.root().field("name").unwrap();

    name.validate().await;
    name.set_value(json!("programmatic"));
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!binder.validating());
}

#[tokio::test]
async fn test_request_validation_joins_in_flight_run() {
    let calls = Arc::new(AtomicUsize::new(0));
    let validator: Arc<dyn Validator> = Arc::new(counting(&calls, 10));
    let model =
        Model::object("Person").field("name", Model::string().shared_validator(Arc::clone(&validator)));
    let binder = Binder::new(model, BinderConfig::new());
    let name = binder.root().field("name").unwrap();

    let first = binder.request_validation(&name, &validator);
    let second = binder.request_validation(&name, &validator);
    assert!(first.ptr_eq(&second));
    assert!(binder.validating());

    let (a, b) = tokio::join!(first.clone(), second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.map(|e| e.property), Some("name".to_string()));
    assert_eq!(b.map(|e| e.message().to_string()), Some("must not be empty".to_string()));

    let third = binder.request_validation(&name, &validator);
    assert!(!third.ptr_eq(&first));
    third.await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_validate_waits_for_async_validators() {
    let calls = Arc::new(AtomicUsize::new(0));
    let changes = Arc::new(AtomicUsize::new(0));
    let model = Model::object("Person").field(
        "name",
        Model::string()
            .validator(counting(&calls, 20))
            .validator(counting(&calls, 40)),
    );
    let binder = Binder::new(model, counting_changes(&changes));
    binder.root().field("name").unwrap();

    let observer = async {
        tokio::task::yield_now().await;
        assert!(binder.validating());
    };
    tokio::join!(binder.validate(), observer);

    assert!(!binder.validating());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(changes.load(Ordering::SeqCst), 1);
    assert_eq!(binder.errors().len(), 2);
}

#[tokio::test]
async fn test_binder_validate_ignores_visited_flag() {
    let binder = Binder::new(person(), BinderConfig::new());
    let name = binder.root().field("name").unwrap();
    assert!(!name.visited());

    binder.validate().await;
    assert!(name.invalid());
    assert!(!binder.invalid());
    assert_eq!(binder.errors().len(), 1);
}

#[tokio::test]
async fn test_leaf_change_revalidates_ancestors() {
    let model = Model::object("Range")
        .field("first", Model::string())
        .field("last", Model::string())
        .validator(Rule::new("first and last must differ", |value: &Value| {
            value["first"] != value["last"]
        }));
    let binder = Binder::new(model, BinderConfig::new());
    binder.set_value(json!({"first": "a", "last": "a"}));
    let first = binder.root().field("first").unwrap();

    first.set_visited(true);
    first.validate().await;
    assert!(binder.invalid());
    assert!(first.errors().is_empty());
    assert_eq!(binder.errors()[0].property, "");
    assert_eq!(binder.errors()[0].message(), "first and last must differ");

    first.set_value(json!("b"));
    first.validate().await;
    assert!(!binder.invalid());
    assert!(binder.errors().is_empty());
}

#[tokio::test]
async fn test_errors_follow_registration_order() {
    let model = Model::object("Pair")
        .field("a", Model::string().validator(Required::new("a is required")))
        .field("b", Model::string().validator(Required::new("b is required")));
    let binder = Binder::new(model, BinderConfig::new());
    let b = binder.root().field("b").unwrap();
    binder.root().field("a").unwrap();

    binder.validate().await;
    let properties: Vec<String> = binder.errors().into_iter().map(|e| e.property).collect();
    assert_eq!(properties, ["b", "a"]);

    b.delete();
    let properties: Vec<String> = binder.errors().into_iter().map(|e| e.property).collect();
    assert_eq!(properties, ["a"]);
    assert!(!b.invalid());
}

#[tokio::test]
async fn test_node_errors_follow_declaration_order() {
    let model = Model::object("Account").field(
        "username",
        Model::string()
            .validator(MinLength::new(3, "too short"))
            .validator(Pattern::new("^[a-z]+$", "lowercase only").unwrap()),
    );
    let binder = Binder::new(model, BinderConfig::new());
    let username = binder.root().field("username").unwrap();
    username.set_value(json!("A"));

    binder.validate().await;
    let messages: Vec<String> = username
        .errors()
        .iter()
        .map(|e| e.message().to_string())
        .collect();
    assert_eq!(messages, ["too short", "lowercase only"]);
}

#[tokio::test]
async fn test_array_items_validate_independently() {
    let calls = Arc::new(AtomicUsize::new(0));
    let model = Model::object("Post").field("tags", Model::array(Model::string().validator(counting(&calls, 0))));
    let binder = Binder::new(model, BinderConfig::new());
    binder.set_value(json!({"tags": ["rust", ""]}));

    let tags = binder.root().field("tags").unwrap();
    tags.item(0).unwrap();
    tags.item(1).unwrap();
    binder.validate().await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let properties: Vec<String> = binder.errors().into_iter().map(|e| e.property).collect();
    assert_eq!(properties, ["tags[1]"]);
    assert_eq!(binder.errors()[0].value, json!(""));
}

#[tokio::test]
async fn test_deleted_node_ignores_visit() {
    let binder = Binder::new(person(), BinderConfig::new());
    let name = binder.root().field("name").unwrap();
    name.delete();

    name.set_visited(true);
    assert!(!name.visited());
    assert_eq!(binder.nodes().len(), 1);
    assert!(!binder.validating());
}

#[tokio::test]
async fn test_panicking_validator_counts_as_valid() {
    let model = Model::object("Person").field(
        "name",
        Model::string().validator(Rule::new("boom", |_: &Value| panic!("validator bug"))),
    );
    let binder = Binder::new(model, BinderConfig::new());
    binder.root().field("name").unwrap();

    binder.validate().await;
    assert!(binder.errors().is_empty());
    assert!(!binder.validating());
}

#[tokio::test]
async fn test_set_value_revalidates_invalid_unvisited_node() {
    let binder = Binder::new(person(), BinderConfig::new());
    let name = binder.root().field("name").unwrap();
    binder.validate().await;
    assert!(name.invalid());
    assert!(!name.visited());

    name.set_value(json!("Jane"));
    assert!(binder.validating());
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(!name.invalid());
    assert!(!binder.validating());
}

#[tokio::test]
async fn test_child_validation_keeps_deleted_parent_deleted() {
    let model = Model::object("Person").field(
        "address",
        Model::object("Address")
            .field("street", Model::string())
            .validator(Rule::new("address rule", |_: &Value| false)),
    );
    let binder = Binder::new(model, BinderConfig::new());
    let address = binder.root().field("address").unwrap();
    let street = address.field("street").unwrap();

    address.delete();
    street.set_visited(true);
    street.validate().await;

    let names: Vec<String> = binder.nodes().iter().map(BinderNode::name).collect();
    assert_eq!(names, ["", "address.street"]);
    assert_eq!(street.parent(), address);
    assert!(!address.invalid());
    assert!(binder.errors().is_empty());
    assert!(!binder.validating());
}

#[tokio::test]
async fn test_results_of_deleted_node_are_discarded() {
    let model = Model::object("Post").field(
        "tags",
        Model::array(Model::string().validator(AsyncRule::new("slow", |_: Value| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            false
        }))),
    );
    let binder = Binder::new(model, BinderConfig::new());
    binder.set_value(json!({"tags": ["a"]}));
    let tags = binder.root().field("tags").unwrap();
    let tag = tags.item(0).unwrap();

    tag.set_visited(true);
    let scheduled = tag.request_validation();
    tag.delete();
    let fresh = tags.item(0).unwrap();
    assert_ne!(fresh, tag);

    join_all(scheduled.clone()).await;
    assert!(!fresh.visited());
    assert!(fresh.errors().is_empty());
    assert!(!tag.invalid());
    assert!(binder.errors().is_empty());

    let own = fresh.request_validation();
    assert!(!own[0].ptr_eq(&scheduled[0]));
    join_all(own).await;
    assert_eq!(fresh.errors().len(), 1);
    assert_eq!(fresh.errors()[0].property, "tags[0]");
}
