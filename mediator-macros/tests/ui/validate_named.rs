use mediator_core::validation::{Node, Validate};

fn no_spaces(value: &String) -> Option<String> {
    value.contains(' ').then(|| "must not contain spaces".to_string())
}

#[derive(mediator_core::Validate)]
struct Register {
    #[validate(required, length(min = 3, max = 16), custom = no_spaces)]
    login: String,
    #[validate(range(min = 18, max = 130))]
    age: u32,
    tags: Vec<String>,
    #[validate(skip)]
    _internal: u64,
}

fn main() {
    let cmd = Register {
        login: "bob".into(),
        age: 20,
        tags: vec![],
        _internal: 0,
    };
    match cmd.node() {
        Node::Object(props) => assert_eq!(props.len(), 3),
        _ => panic!("expected object"),
    }
}
