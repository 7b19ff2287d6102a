// Round trips of object graphs through mappers resolved from the fixture model
use std::path::PathBuf;
use std::sync::Arc;
use typegraph_mapper::{
    convert::{ConversionSession, ObjectGraphMapper},
    descriptor::CollectionFlavor,
    error::Error,
    mapper::TypeAdapter,
    model::{loader::ModelLoader, TypeRef},
    parser::SourceParser,
    resolver::Resolver,
    value::Value,
};

#[derive(Debug)]
struct TimestampAdapter;

impl TypeAdapter for TimestampAdapter {
    fn name(&self) -> &str {
        "TimestampAdapter"
    }

    fn value_type(&self) -> TypeRef {
        TypeRef::named("i64")
    }

    fn marshal(&self, value: &Value) -> Result<Value, String> {
        match value.get("millis") {
            Value::Int(millis) => Ok(Value::Int(millis)),
            other => Err(format!("timestamp without millis: {}", other.shape())),
        }
    }

    fn unmarshal(&self, value: &Value) -> Result<Value, String> {
        Ok(Value::object("Timestamp", vec![("millis", value.clone())]))
    }
}

fn resolver() -> Resolver {
    let files = vec![
        SourceParser::parse_source(
            &PathBuf::from("customers.rs"),
            include_str!("fixtures/model/customers.rs"),
        )
        .expect("Failed to parse customers"),
        SourceParser::parse_source(&PathBuf::from("shop.rs"), include_str!("fixtures/model/shop.rs"))
            .expect("Failed to parse shop"),
    ];
    let model = ModelLoader::load(&files).expect("Failed to load model");
    let resolver = Resolver::new(Arc::new(model));
    resolver.register_adapter(Arc::new(TimestampAdapter));
    resolver
}

/// An order whose customer lists the order back
fn order_graph() -> Value {
    let customer = Value::object("Customer", vec![("name", Value::str("Ada"))]);
    let line = Value::object(
        "OrderLine",
        vec![
            ("sku", Value::str("X-1")),
            ("quantity", Value::Int(2)),
            (
                "tags",
                Value::seq(CollectionFlavor::Vec, vec![Value::str("gift")]),
            ),
        ],
    );
    let order = Value::object(
        "Order",
        vec![
            ("id", Value::Int(7)),
            ("customer", customer.clone()),
            ("status", Value::Enum("New".to_string())),
            ("lines", Value::seq(CollectionFlavor::Vec, vec![line])),
            (
                "attachments",
                Value::seq(
                    CollectionFlavor::Vec,
                    vec![
                        Value::object("Link", vec![("href", Value::str("https://example.com"))]),
                        Value::object("Note", vec![("text", Value::str("fragile"))]),
                    ],
                ),
            ),
            (
                "placed",
                Value::object("Timestamp", vec![("millis", Value::Int(1_700_000_000_000))]),
            ),
        ],
    );
    if let Some(object) = customer.as_object() {
        object
            .borrow_mut()
            .set("orders", Value::seq(CollectionFlavor::Vec, vec![order.clone()]));
    }
    order
}

#[test]
fn test_order_graph_round_trip() {
    let resolver = resolver();
    let mapper = ObjectGraphMapper::new(&resolver);
    let order_id = resolver.resolve_named("Order").unwrap();

    let external = mapper.to_external(&order_graph(), order_id).unwrap();
    assert_eq!(external.type_name().as_deref(), Some("{urn:shop}order"));
    assert!(matches!(external.get("status"), Value::Str(s) if s == "NEW"));
    assert!(matches!(external.get("placed"), Value::Int(1_700_000_000_000)));

    let customer = external.get("customer");
    assert_eq!(customer.type_name().as_deref(), Some("{urn:shop}customer"));
    assert!(customer.get("orders").is_null());
    assert!(customer.get("purchases").item(0).same_instance(&external));

    let attachments = external.get("attachments");
    assert_eq!(attachments.item(0).type_name().as_deref(), Some("link"));
    assert_eq!(attachments.item(1).type_name().as_deref(), Some("note"));

    let internal = mapper.to_internal(&external, order_id).unwrap();
    assert_eq!(internal.type_name().as_deref(), Some("Order"));
    assert!(matches!(internal.get("id"), Value::Int(7)));
    assert!(matches!(internal.get("status"), Value::Enum(s) if s == "New"));
    assert!(matches!(internal.get("placed").get("millis"), Value::Int(1_700_000_000_000)));
    assert!(internal
        .get("customer")
        .get("orders")
        .item(0)
        .same_instance(&internal));
    assert_eq!(
        internal.get("attachments").item(1).type_name().as_deref(),
        Some("Note")
    );
    assert!(matches!(
        internal.get("lines").item(0).get("tags").item(0),
        Value::Str(tag) if tag == "gift"
    ));
}

#[test]
fn test_session_spans_calls() {
    let resolver = resolver();
    let mapper = ObjectGraphMapper::new(&resolver);
    let order_id = resolver.resolve_named("Order").unwrap();
    let customer_id = resolver.resolve_named("Customer").unwrap();

    let order = order_graph();
    let customer = order.get("customer");
    let mut session = ConversionSession::new();
    let external_order = mapper.convert_outward(&order, order_id, &mut session).unwrap();
    let external_customer = mapper
        .convert_outward(&customer, customer_id, &mut session)
        .unwrap();

    assert!(external_order.get("customer").same_instance(&external_customer));
    assert!(!session.is_empty());
}

#[test]
fn test_failures_name_the_property() {
    let resolver = resolver();
    let mapper = ObjectGraphMapper::new(&resolver);
    let line_id = resolver.resolve_named("OrderLine").unwrap();

    let line = Value::object(
        "OrderLine",
        vec![("sku", Value::str("X-1")), ("quantity", Value::Int(-1))],
    );
    match mapper.to_external(&line, line_id) {
        Err(Error::MappingFailure {
            property,
            declaring_type,
            cause,
        }) => {
            assert_eq!(property.as_deref(), Some("quantity"));
            assert_eq!(declaring_type, "OrderLine");
            assert!(cause.contains("out of range"));
        }
        other => panic!("Expected mapping failure, got {:?}", other),
    }
}

#[test]
fn test_resolution_is_idempotent_across_entry_points() {
    let resolver = resolver();
    let first = resolver.resolve_named("Order").unwrap();
    let mappers = resolver.len();
    let second = resolver
        .resolve(&TypeRef::generic("Box", vec![TypeRef::named("Order")]), &Default::default(), None)
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(resolver.len(), mappers);
}
