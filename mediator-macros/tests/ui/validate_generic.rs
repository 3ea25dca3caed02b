use mediator_core::validation::{Node, Validate};

#[derive(mediator_core::Validate)]
struct Page<T> {
    #[validate(length(max = 50))]
    items: Vec<T>,
    #[validate(range(min = 1))]
    number: u32,
}

fn main() {
    let page = Page {
        items: vec!["a".to_string()],
        number: 1,
    };
    match page.node() {
        Node::Object(props) => {
            assert_eq!(props[0].metadata().property_name(), Some("items"));
            assert_eq!(props[1].metadata().property_name(), Some("number"));
        }
        _ => panic!("expected object"),
    }
}
