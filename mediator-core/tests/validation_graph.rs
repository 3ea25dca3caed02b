use mediator_core::validation::{ModelMetadata, ValidationContext, Validator, ValidatorProvider};
use mediator_core::{ModelState, Validate, ValidationEngine};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, OnceLock};

#[derive(Validate)]
struct Link {
    #[validate(required)]
    name: String,
    next: OnceLock<Arc<Link>>,
}

fn link(name: &str) -> Arc<Link> {
    Arc::new(Link {
        name: name.to_string(),
        next: OnceLock::new(),
    })
}

#[derive(Validate)]
struct Customer {
    #[validate(required, length(max = 10))]
    name: String,
}

#[derive(Validate)]
struct Line {
    #[validate(length(min = 3))]
    sku: String,
    #[validate(range(min = 1, max = 99))]
    qty: u32,
}

fn not_reserved(value: &Option<String>) -> Option<String> {
    (value.as_deref() == Some("admin")).then(|| "note is reserved".to_string())
}

fn has_lines(order: &Order) -> Option<String> {
    order.lines.is_empty().then(|| "an order needs lines".to_string())
}

#[derive(Validate)]
#[validate(custom = has_lines)]
struct Order {
    customer: Customer,
    #[validate(length(max = 3))]
    lines: Vec<Line>,
    #[validate(custom = not_reserved)]
    note: Option<String>,
}

fn keys(state: &ModelState) -> Vec<&str> {
    state.keys().collect()
}

#[test]
fn self_cycle_terminates() {
    let a = link("a");
    a.next.set(a.clone()).ok().unwrap();

    let mut state = ModelState::new();
    assert!(ValidationEngine::new().validate_value(&*a, &mut state));
    assert!(state.is_valid());
}

#[test]
fn three_hop_cycle_terminates_and_reports_deep_key() {
    let (a, b, c) = (link("a"), link("b"), link(" "));
    a.next.set(b.clone()).ok().unwrap();
    b.next.set(c.clone()).ok().unwrap();
    c.next.set(a.clone()).ok().unwrap();

    let mut state = ModelState::new();
    assert!(!ValidationEngine::new().validate_value(&*a, &mut state));
    assert_eq!(keys(&state), vec!["next.next.name"]);
    assert_eq!(
        state.errors("next.next.name")[0].message(),
        "The name field is required."
    );
}

#[test]
fn nested_errors_use_property_and_index_paths() {
    let order = Order {
        customer: Customer {
            name: "a name that is too long".into(),
        },
        lines: vec![
            Line { sku: "SKU-1".into(), qty: 0 },
            Line { sku: "x".into(), qty: 5 },
        ],
        note: None,
    };

    let mut state = ModelState::new();
    assert!(!ValidationEngine::new().validate_value(&order, &mut state));
    assert_eq!(keys(&state), vec!["customer.name", "lines[0].qty", "lines[1].sku"]);
    // 子节点出错时跳过类型级规则
    assert!(!state.has_errors(""));
}

#[test]
fn type_level_rule_runs_when_children_are_valid() {
    let order = Order {
        customer: Customer { name: "ann".into() },
        lines: Vec::new(),
        note: Some("admin".into()),
    };

    let mut state = ModelState::new();
    assert!(!ValidationEngine::new().validate_value(&order, &mut state));
    assert_eq!(state.errors("note")[0].message(), "note is reserved");
    // note 出错，根节点的类型级规则被跳过
    assert!(!state.has_errors(""));

    let order = Order {
        note: None,
        ..order
    };
    let mut state = ModelState::new();
    assert!(!ValidationEngine::new().validate_value(&order, &mut state));
    assert_eq!(state.errors("")[0].message(), "an order needs lines");
}

#[test]
fn collection_rules_run_after_elements() {
    let lines: Vec<Line> = (0..4)
        .map(|_| Line {
            sku: "SKU".into(),
            qty: 1,
        })
        .collect();
    let order = Order {
        customer: Customer { name: "ann".into() },
        lines,
        note: None,
    };

    let mut state = ModelState::new();
    assert!(!ValidationEngine::new().validate_value(&order, &mut state));
    assert_eq!(
        state.errors("lines")[0].message(),
        "The field lines must have a length of at most 3."
    );
}

#[test]
fn top_level_sequence_keys_start_with_index() {
    let customers = vec![
        Customer { name: "ok".into() },
        Customer { name: String::new() },
    ];
    let mut state = ModelState::new();
    assert!(!ValidationEngine::new().validate_value(&customers, &mut state));
    assert_eq!(keys(&state), vec!["[1].name"]);
}

struct Counting(Arc<AtomicUsize>);
struct Noop;
impl Validator for Noop {
    fn validate(&self, _ctx: &ValidationContext<'_>) -> Vec<String> {
        Vec::new()
    }
}
impl ValidatorProvider for Counting {
    fn validators(&self, _metadata: &ModelMetadata, out: &mut Vec<Arc<dyn Validator>>) {
        self.0.fetch_add(1, Ordering::SeqCst);
        out.push(Arc::new(Noop));
    }
}

#[test]
fn validator_lists_are_built_once_per_metadata() {
    let builds = Arc::new(AtomicUsize::new(0));
    let engine = ValidationEngine::empty().with_provider(Counting(builds.clone()));
    let customer = Customer { name: "ann".into() };

    let mut state = ModelState::new();
    assert!(engine.validate_value(&customer, &mut state));
    let first = builds.load(Ordering::SeqCst);
    assert!(first > 0);

    for _ in 0..3 {
        assert!(engine.validate_value(&customer, &mut state));
    }
    assert_eq!(builds.load(Ordering::SeqCst), first);
}

#[derive(Validate)]
struct Card {
    #[validate(required)]
    holder: String,
}

#[derive(Validate)]
enum Payment {
    Card(Card),
    Transfer {
        #[validate(length(min = 8))]
        iban: String,
    },
    Cash,
}

#[derive(Validate)]
struct Checkout {
    payment: Payment,
    extras: BTreeMap<String, Line>,
    #[validate(length(max = 2))]
    coupons: HashSet<String>,
}

fn checkout(payment: Payment) -> Checkout {
    Checkout {
        payment,
        extras: BTreeMap::new(),
        coupons: HashSet::new(),
    }
}

#[test]
fn enum_payloads_are_validated_under_variant_field_keys() {
    let engine = ValidationEngine::new();

    let mut state = ModelState::new();
    let card = checkout(Payment::Card(Card { holder: String::new() }));
    assert!(!engine.validate_value(&card, &mut state));
    assert_eq!(keys(&state), vec!["payment.0.holder"]);

    let mut state = ModelState::new();
    let transfer = checkout(Payment::Transfer { iban: "DE01".into() });
    assert!(!engine.validate_value(&transfer, &mut state));
    assert_eq!(keys(&state), vec!["payment.iban"]);

    let mut state = ModelState::new();
    assert!(engine.validate_value(&checkout(Payment::Cash), &mut state));
    assert!(state.is_valid());
}

#[test]
fn map_values_and_sets_are_traversed() {
    let mut order = checkout(Payment::Cash);
    order.extras.insert("gift".into(), Line { sku: "x".into(), qty: 1 });
    order.coupons.extend(["A".to_string(), "B".to_string(), "C".to_string()]);

    let mut state = ModelState::new();
    assert!(!ValidationEngine::new().validate_value(&order, &mut state));
    assert_eq!(keys(&state), vec!["coupons", "extras[0].sku"]);
}
