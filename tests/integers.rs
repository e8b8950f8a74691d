#![allow(clippy::unwrap_used, clippy::expect_used)]
use std::sync::Arc;

use async_graphql::dynamic::{Schema, TypeRef};
use async_graphql::{value, ErrorExtensions, Request, Value, Variables};
use graphql_union_pagination::{
    build_schema, handle_keyset_arguments, handle_offset_arguments, install, scan, Connection,
    ConnectionAdapters, CursorCodec, Edge, FetchEnvironment, FieldCoordinates, FieldDefinition,
    FieldValue, KeyValue, KeysetPosition, ObjectType, PaginationConfig, PaginationRequest,
    SchemaGraph, ScrollPosition, Slice, Sort, UnionType, Window,
};
use serde_json::json;

const LAST: i32 = 1000;

/// Keyset window over 1..=1000, each cursor pointing at the next integer
fn integers_window(request: &PaginationRequest) -> async_graphql::Result<Window> {
    let (_, position) = handle_keyset_arguments(10, request, &Sort::unsorted(), &Sort::unsorted())
        .map_err(|e| e.extend())?;

    let (start, count) = if position.is_initial() {
        (1, 10)
    } else {
        let start = match position.get("start") {
            Some(KeyValue::Int(start)) => *start,
            _ => return Err(async_graphql::Error::new("cursor has no start key")),
        };
        let requested = request.count().map_or(10, |count| count as i32);
        let count = if start + requested <= LAST {
            requested
        } else {
            LAST - start + 1
        };
        (start, count)
    };

    let contents: Vec<i32> = if (1..=LAST).contains(&start) {
        (start..start + count).collect()
    } else {
        Vec::new()
    };
    let positions = contents.clone();

    Ok(Window::from(
        contents,
        move |index| KeysetPosition::forward([("start", positions[index] + 1)]).into(),
        start + count <= LAST,
    ))
}

/// Offset page over 1..=1000, the row at offset `n` holding `n + 1`
fn integers_slice(request: &PaginationRequest) -> async_graphql::Result<Slice> {
    let (page, _) = handle_offset_arguments(10, request, &Sort::unsorted(), &Sort::unsorted())
        .map_err(|e| e.extend())?;

    let first = page.offset();
    let rows = (first..first + u64::from(page.size()))
        .filter(|offset| *offset < LAST as u64)
        .map(|offset| offset as i32 + 1);
    let has_next = first + u64::from(page.size()) < LAST as u64;
    Ok(Slice::new(rows, &page, has_next))
}

fn request(env: &FetchEnvironment) -> PaginationRequest {
    env.pagination().cloned().unwrap_or_default()
}

fn out_of_range(env: &FetchEnvironment) -> bool {
    let first = match env.argument("first") {
        Some(Value::Number(first)) => first.as_i64(),
        _ => None,
    };
    first.is_some_and(|first| !(1..=i64::from(LAST)).contains(&first))
}

fn no_integers_found() -> FieldValue {
    FieldValue::object(
        "NoIntegersFound",
        value!({ "message": "First value must be between 1 and 1000" }),
    )
}

fn graph(union_field: FieldDefinition) -> SchemaGraph {
    let query = ObjectType::new("Query")
        .field(
            FieldDefinition::new("integers", TypeRef::named_nn("IntegerConnection"))
                .relay_arguments()
                .resolve_fn(|env: &FetchEnvironment| {
                    Ok(FieldValue::window(integers_window(&request(env))?).into())
                }),
        )
        .field(union_field)
        .field(
            FieldDefinition::new("integersByOffset", TypeRef::named_nn("IntegerResult"))
                .relay_arguments()
                .resolve_fn(|env: &FetchEnvironment| {
                    Ok(FieldValue::slice(integers_slice(&request(env))?).into())
                }),
        );
    let subscription = ObjectType::new("Subscription").field(
        FieldDefinition::new("integerStream", TypeRef::named("IntegerResult"))
            .relay_arguments()
            .resolve_fn(|env: &FetchEnvironment| {
                Ok(FieldValue::window(integers_window(&request(env))?).into())
            }),
    );

    SchemaGraph::build("Query", None, Some("Subscription"))
        .register(query)
        .register(subscription)
        .connection("Integer", TypeRef::named_nn(TypeRef::INT))
        .register(
            ObjectType::new("NoIntegersFound")
                .field(FieldDefinition::new("message", TypeRef::named_nn(TypeRef::STRING))),
        )
        .register(
            UnionType::new("IntegerResult")
                .possible_type("IntegerConnection")
                .possible_type("NoIntegersFound"),
        )
        .finish()
        .unwrap()
}

fn integers_union() -> FieldDefinition {
    FieldDefinition::new("integersUnion", TypeRef::named_nn("IntegerResult"))
        .relay_arguments()
        .resolve_fn(|env: &FetchEnvironment| {
            let window = integers_window(&request(env))?;
            if out_of_range(env) {
                return Ok(no_integers_found().into());
            }
            Ok(FieldValue::window(window).into())
        })
}

fn config() -> PaginationConfig {
    PaginationConfig {
        max_count: 2000,
        ..Default::default()
    }
}

fn codec() -> Arc<CursorCodec> {
    Arc::new(CursorCodec::from_config(&config()))
}

fn installed(union_field: FieldDefinition) -> SchemaGraph {
    install(graph(union_field), ConnectionAdapters::with_defaults(codec())).unwrap()
}

fn schema() -> Schema {
    build_schema(&installed(integers_union()), &config()).unwrap()
}

fn page_query(field: &str) -> String {
    format!(
        "query($first: Int, $after: String, $last: Int, $before: String) {{ \
         {field}(first: $first, after: $after, last: $last, before: $before) {{ \
         __typename \
         ... on IntegerConnection {{ \
         edges {{ node cursor }} \
         pageInfo {{ hasPreviousPage hasNextPage startCursor endCursor }} }} \
         ... on NoIntegersFound {{ message }} }} }}"
    )
}

async fn page(schema: &Schema, field: &str, variables: serde_json::Value) -> serde_json::Value {
    let request = Request::new(page_query(field)).variables(Variables::from_json(variables));
    let response = schema.execute(request).await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let mut data = response.data.into_json().unwrap();
    data[field].take()
}

fn nodes(page: &serde_json::Value) -> Vec<i64> {
    page["edges"]
        .as_array()
        .unwrap()
        .iter()
        .map(|edge| edge["node"].as_i64().unwrap())
        .collect()
}

fn end_cursor(page: &serde_json::Value) -> serde_json::Value {
    page["pageInfo"]["endCursor"].clone()
}

#[test]
fn only_union_fields_are_matched() {
    let matches = scan(&graph(integers_union()));
    let mut fields: Vec<_> = matches
        .iter()
        .map(|m| m.coordinates.field_name.as_str())
        .collect();
    fields.sort_unstable();
    assert_eq!(fields, ["integersByOffset", "integersUnion"]);
    assert!(matches.iter().all(|m| m.union_type == "IntegerResult"));
    assert!(matches
        .iter()
        .all(|m| m.connection_type == "IntegerConnection"));
}

#[tokio::test]
async fn first_ten_integers() {
    let page = page(&schema(), "integersUnion", json!({ "first": 10 })).await;

    assert_eq!(page["__typename"], "IntegerConnection");
    assert_eq!(nodes(&page), (1..=10).collect::<Vec<_>>());
    assert_eq!(page["pageInfo"]["hasNextPage"], true);
    assert_eq!(page["pageInfo"]["hasPreviousPage"], false);
    assert_eq!(end_cursor(&page), page["edges"][9]["cursor"]);
}

#[tokio::test]
async fn next_page_follows_end_cursor() {
    let schema = schema();
    let first = page(&schema, "integersUnion", json!({ "first": 10 })).await;

    let variables = json!({ "first": 5, "after": end_cursor(&first) });
    let second = page(&schema, "integersUnion", variables).await;
    assert_eq!(nodes(&second), vec![11, 12, 13, 14, 15]);
    assert_eq!(second["pageInfo"]["hasNextPage"], true);
}

#[tokio::test]
async fn last_page_has_no_next() {
    let after = codec()
        .encode(&ScrollPosition::keyset([("start", 991)]))
        .unwrap();
    let variables = json!({ "first": 10, "after": after });
    let page = page(&schema(), "integersUnion", variables).await;

    assert_eq!(nodes(&page), (991..=1000).collect::<Vec<_>>());
    assert_eq!(page["pageInfo"]["hasNextPage"], false);
}

#[tokio::test]
async fn out_of_range_first_resolves_to_error_member() {
    let page = page(&schema(), "integersUnion", json!({ "first": 1500 })).await;
    assert_eq!(
        page,
        json!({
            "__typename": "NoIntegersFound",
            "message": "First value must be between 1 and 1000"
        })
    );
}

#[tokio::test]
async fn offset_pages_forward_and_back() {
    let schema = schema();

    let first = page(&schema, "integersByOffset", json!({ "first": 10 })).await;
    assert_eq!(first["__typename"], "IntegerConnection");
    assert_eq!(nodes(&first), (1..=10).collect::<Vec<_>>());
    assert_eq!(first["pageInfo"]["hasPreviousPage"], false);

    let variables = json!({ "first": 10, "after": end_cursor(&first) });
    let second = page(&schema, "integersByOffset", variables).await;
    assert_eq!(nodes(&second), (11..=20).collect::<Vec<_>>());

    let variables = json!({ "first": 10, "after": end_cursor(&second) });
    let third = page(&schema, "integersByOffset", variables).await;
    assert_eq!(nodes(&third), (21..=30).collect::<Vec<_>>());
    assert_eq!(third["pageInfo"]["hasPreviousPage"], true);

    let before = third["pageInfo"]["startCursor"].clone();
    let back = page(
        &schema,
        "integersByOffset",
        json!({ "last": 10, "before": before }),
    )
    .await;
    assert_eq!(nodes(&back), (11..=20).collect::<Vec<_>>());
    assert_eq!(back["pageInfo"]["hasPreviousPage"], true);
    assert_eq!(back["pageInfo"]["hasNextPage"], true);
    assert_eq!(back["edges"], second["edges"]);
}

#[tokio::test]
async fn invalid_cursor_is_rejected() {
    let request = Request::new(page_query("integersUnion")).variables(Variables::from_json(
        json!({ "first": 10, "after": "not a cursor!" }),
    ));
    let response = schema().execute(request).await;

    assert_eq!(response.errors.len(), 1);
    let code = response.errors[0]
        .extensions
        .as_ref()
        .and_then(|extensions| extensions.get("code"))
        .cloned();
    assert_eq!(code, Some(Value::from("INVALID_CURSOR")));
}

#[tokio::test]
async fn offset_cursor_on_keyset_field_is_unsupported() {
    let after = codec().encode(&ScrollPosition::offset(20)).unwrap();
    let request = Request::new(page_query("integersUnion")).variables(Variables::from_json(
        json!({ "first": 10, "after": after }),
    ));
    let response = schema().execute(request).await;

    assert_eq!(response.errors.len(), 1);
    let code = response.errors[0]
        .extensions
        .as_ref()
        .and_then(|extensions| extensions.get("code"))
        .cloned();
    assert_eq!(code, Some(Value::from("UNSUPPORTED_POSITION")));
}

#[tokio::test]
async fn completed_connection_passes_through() {
    let complete = Connection::new(vec![Edge::new(42, "Y3Vyc29y")], true, false);
    let union_field = FieldDefinition::new("integersUnion", TypeRef::named_nn("IntegerResult"))
        .relay_arguments()
        .resolve_fn(move |_: &FetchEnvironment| {
            Ok(FieldValue::Connection(complete.clone()).into())
        });
    let schema = build_schema(&installed(union_field), &config()).unwrap();

    let page = page(&schema, "integersUnion", json!({})).await;
    assert_eq!(
        page,
        json!({
            "__typename": "IntegerConnection",
            "edges": [{ "node": 42, "cursor": "Y3Vyc29y" }],
            "pageInfo": {
                "hasPreviousPage": true,
                "hasNextPage": false,
                "startCursor": "Y3Vyc29y",
                "endCursor": "Y3Vyc29y"
            }
        })
    );
}

#[tokio::test]
async fn direct_connection_field_is_left_alone() {
    let graph = installed(integers_union());
    let env = FetchEnvironment::new().with_pagination(PaginationRequest::first(10));
    let result = graph
        .fetch(&FieldCoordinates::new("Query", "integers"), &env)
        .unwrap()
        .complete()
        .await
        .unwrap();
    assert!(matches!(
        result.data,
        FieldValue::Paginated(ref container) if container.is::<Window>()
    ));
}

#[tokio::test]
async fn subscription_field_is_left_alone() {
    let graph = installed(integers_union());
    let env = FetchEnvironment::new().with_pagination(PaginationRequest::first(10));
    let result = graph
        .fetch(&FieldCoordinates::new("Subscription", "integerStream"), &env)
        .unwrap()
        .complete()
        .await
        .unwrap();
    assert!(matches!(result.data, FieldValue::Paginated(_)));
}
