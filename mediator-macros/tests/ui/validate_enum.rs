use mediator_core::validation::{Node, Validate};
use std::collections::BTreeMap;

#[derive(mediator_core::Validate)]
struct Card {
    #[validate(required)]
    holder: String,
}

#[derive(mediator_core::Validate)]
enum Payment {
    Card(Card),
    Transfer {
        #[validate(length(min = 8))]
        iban: String,
        #[validate(skip)]
        _memo: String,
    },
    Cash,
}

#[derive(mediator_core::Validate)]
enum Slot<T> {
    Filled(T),
    _Empty,
}

#[derive(mediator_core::Validate)]
struct Ledger {
    entries: BTreeMap<u32, Payment>,
}

fn main() {
    let card = Payment::Card(Card { holder: "ann".into() });
    match card.node() {
        Node::Object(props) => assert_eq!(props[0].metadata().property_name(), Some("0")),
        _ => panic!("payload variant should be an object"),
    }

    let transfer = Payment::Transfer {
        iban: "DE00".into(),
        _memo: String::new(),
    };
    match transfer.node() {
        Node::Object(props) => {
            assert_eq!(props.len(), 1);
            assert_eq!(props[0].metadata().variant_name(), Some("Transfer"));
        }
        _ => panic!("payload variant should be an object"),
    }

    assert!(matches!(Payment::Cash.node(), Node::Scalar(_)));
    assert!(matches!(Slot::Filled(3u8).node(), Node::Object(_)));

    let ledger = Ledger {
        entries: BTreeMap::from([(1, Payment::Cash)]),
    };
    assert!(matches!(ledger.node(), Node::Object(_)));
}
