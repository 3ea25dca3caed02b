use mediator_core::validation::{Node, Validate};

fn positive(value: &Amount) -> Option<String> {
    (value.0 <= 0).then(|| "amount must be positive".to_string())
}

#[derive(mediator_core::Validate)]
#[validate(custom = positive)]
struct Amount(#[validate(range(max = 1_000_000))] i64);

#[derive(mediator_core::Validate)]
struct Ping;

#[derive(mediator_core::Validate)]
enum Mode {
    _Fast,
    _Slow,
}

fn main() {
    let amount = Amount(5);
    assert_eq!(amount.metadata().rules().len(), 1);
    assert!(matches!(amount.node(), Node::Object(_)));
    assert!(matches!(Ping.node(), Node::Scalar(_)));
    assert!(Ping.metadata().rules().is_empty());
    let _ = Mode::_Fast.node();
}
