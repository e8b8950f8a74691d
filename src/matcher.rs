//! Finds union-typed fields whose union has exactly one connection member
//!
//! Matching is structural. An object type qualifies as a connection when:
//!
//! - its name ends in `Connection`
//! - `edges` is a list of an object type whose name ends in `Edge` and which
//!   has `node` and `cursor` fields
//! - `pageInfo` is the object type `PageInfo` with `hasPreviousPage`,
//!   `hasNextPage`, `startCursor` and `endCursor`

use async_graphql::dynamic::TypeRef;
use tracing::{debug, warn};

use crate::fetcher::FieldCoordinates;
use crate::schema::{FieldDefinition, ObjectType, SchemaGraph, TypeRefExt, UnionType};
use crate::GraphQLError;

const PAGE_INFO_FIELDS: [&str; 4] =
    ["hasPreviousPage", "hasNextPage", "startCursor", "endCursor"];

/// A field to decorate and the connection type its union resolves to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionMatch {
    pub coordinates: FieldCoordinates,
    pub union_type: String,
    pub connection_type: String,
}

/// Whether `object` has the connection shape
pub fn is_connection_type(schema: &SchemaGraph, object: &ObjectType) -> bool {
    if !object.name.ends_with("Connection") {
        return false;
    }

    let Some(edge) = edge_type(schema, object.get_field("edges")) else {
        return false;
    };
    if !edge.name.ends_with("Edge")
        || edge.get_field("node").is_none()
        || edge.get_field("cursor").is_none()
    {
        return false;
    }

    let Some(page_info) = object_type(schema, object.get_field("pageInfo")) else {
        return false;
    };
    page_info.name == "PageInfo"
        && PAGE_INFO_FIELDS
            .iter()
            .all(|name| page_info.get_field(name).is_some())
}

/// Members of `union` that have the connection shape
pub fn connection_members<'a>(schema: &'a SchemaGraph, union: &UnionType) -> Vec<&'a ObjectType> {
    union
        .possible_types
        .iter()
        .filter_map(|member| schema.object(member))
        .filter(|object| is_connection_type(schema, object))
        .collect()
}

/// Walk every field of every object type once, skipping the
/// subscription root, and collect union fields with exactly one connection
/// member.
///
/// Unions with several connection members are left out and logged; the rest
/// of the schema is still scanned.
pub fn scan(schema: &SchemaGraph) -> Vec<ConnectionMatch> {
    let mut matches = Vec::new();

    for ty in schema.types() {
        let Some(fields) = ty.fields() else { continue };
        if schema.is_subscription_type(ty.name()) {
            debug!(type_name = ty.name(), "skipping subscription type");
            continue;
        }

        for field in fields.values() {
            let Some(union) = union_type(schema, field) else { continue };
            let coordinates = FieldCoordinates::new(ty.name(), &field.name);

            match connection_members(schema, union).as_slice() {
                [] => {}
                [connection] => {
                    debug!(
                        field = %coordinates,
                        union = %union.name,
                        connection = %connection.name,
                        "matched connection under union"
                    );
                    matches.push(ConnectionMatch {
                        coordinates,
                        union_type: union.name.clone(),
                        connection_type: connection.name.clone(),
                    });
                }
                several => {
                    let error = GraphQLError::AmbiguousUnionMatch {
                        field: coordinates.to_string(),
                        union_type: union.name.clone(),
                        members: several.iter().map(|object| object.name.clone()).collect(),
                    };
                    warn!(%error, "field left undecorated");
                }
            }
        }
    }

    matches
}

fn union_type<'a>(schema: &'a SchemaGraph, field: &FieldDefinition) -> Option<&'a UnionType> {
    field.ty.as_named().and_then(|name| schema.union(name))
}

fn object_type<'a>(
    schema: &'a SchemaGraph,
    field: Option<&FieldDefinition>,
) -> Option<&'a ObjectType> {
    field?.ty.as_named().and_then(|name| schema.object(name))
}

fn edge_type<'a>(
    schema: &'a SchemaGraph,
    field: Option<&FieldDefinition>,
) -> Option<&'a ObjectType> {
    match field?.ty.unwrap_non_null() {
        TypeRef::List(item) => item.as_named().and_then(|name| schema.object(name)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDefinition as Field, NamedType, UnionType};

    fn page_info() -> ObjectType {
        ObjectType::new("PageInfo")
            .field(Field::new("hasPreviousPage", TypeRef::named_nn("Boolean")))
            .field(Field::new("hasNextPage", TypeRef::named_nn("Boolean")))
            .field(Field::new("startCursor", TypeRef::named("String")))
            .field(Field::new("endCursor", TypeRef::named("String")))
    }

    fn connection(prefix: &str) -> [ObjectType; 2] {
        [
            ObjectType::new(format!("{prefix}Connection"))
                .field(Field::new("edges", TypeRef::named_list_nn(format!("{prefix}Edge"))))
                .field(Field::new("pageInfo", TypeRef::named_nn("PageInfo"))),
            ObjectType::new(format!("{prefix}Edge"))
                .field(Field::new("node", TypeRef::named_nn("Int")))
                .field(Field::new("cursor", TypeRef::named_nn("String"))),
        ]
    }

    fn plain_query() -> ObjectType {
        ObjectType::new("Query").field(Field::new("x", TypeRef::named("Int")))
    }

    fn not_found() -> ObjectType {
        ObjectType::new("NotFound").field(Field::new("message", TypeRef::named_nn("String")))
    }

    fn schema(query: ObjectType, extra: Vec<NamedType>) -> SchemaGraph {
        let mut builder = SchemaGraph::build("Query", None, None)
            .register(query)
            .register(page_info())
            .register(not_found());
        for prefix in ["Integer", "Word"] {
            for object in connection(prefix) {
                builder = builder.register(object);
            }
        }
        for ty in extra {
            builder = builder.register(ty);
        }
        builder.finish().unwrap()
    }

    #[test]
    fn test_connection_shape() {
        let schema = schema(plain_query(), vec![]);
        assert!(is_connection_type(&schema, schema.object("IntegerConnection").unwrap()));
        assert!(!is_connection_type(&schema, schema.object("IntegerEdge").unwrap()));
        assert!(!is_connection_type(&schema, schema.object("NotFound").unwrap()));
    }

    #[test]
    fn test_connection_shape_accepts_non_null_edges() {
        let connection = ObjectType::new("StrictConnection")
            .field(Field::new("edges", TypeRef::named_nn_list_nn("IntegerEdge")))
            .field(Field::new("pageInfo", TypeRef::named_nn("PageInfo")));
        let schema = schema(plain_query(), vec![connection.into()]);
        assert!(is_connection_type(&schema, schema.object("StrictConnection").unwrap()));
    }

    #[test]
    fn test_connection_shape_requires_page_info_fields() {
        let partial = ObjectType::new("PageInfo")
            .field(Field::new("hasNextPage", TypeRef::named_nn("Boolean")));
        let [connection, edge] = connection("Integer");
        let schema = SchemaGraph::build("Query", None, None)
            .register(plain_query())
            .register(partial)
            .register(connection)
            .register(edge)
            .finish()
            .unwrap();
        assert!(!is_connection_type(&schema, schema.object("IntegerConnection").unwrap()));
    }

    #[test]
    fn test_connection_shape_requires_edge_suffix() {
        let connection = ObjectType::new("OddConnection")
            .field(Field::new("edges", TypeRef::named_list("NotFound")))
            .field(Field::new("pageInfo", TypeRef::named_nn("PageInfo")));
        let schema = schema(plain_query(), vec![connection.into()]);
        assert!(!is_connection_type(&schema, schema.object("OddConnection").unwrap()));
    }

    #[test]
    fn test_scan_finds_single_connection_union() {
        let query = ObjectType::new("Query")
            .field(Field::new("integers", TypeRef::named_nn("IntegerConnection")))
            .field(Field::new("integersUnion", TypeRef::named_nn("IntegerResult")))
            .field(Field::new("errorsOnly", TypeRef::named("ErrorResult")));
        let schema = schema(
            query,
            vec![
                UnionType::new("IntegerResult")
                    .possible_type("IntegerConnection")
                    .possible_type("NotFound")
                    .into(),
                UnionType::new("ErrorResult").possible_type("NotFound").into(),
            ],
        );

        assert_eq!(
            scan(&schema),
            vec![ConnectionMatch {
                coordinates: FieldCoordinates::new("Query", "integersUnion"),
                union_type: "IntegerResult".to_string(),
                connection_type: "IntegerConnection".to_string(),
            }]
        );
    }

    #[test]
    fn test_scan_skips_ambiguous_union() {
        let query = ObjectType::new("Query").field(Field::new("either", TypeRef::named("Either")));
        let schema = schema(
            query,
            vec![UnionType::new("Either")
                .possible_type("IntegerConnection")
                .possible_type("WordConnection")
                .possible_type("NotFound")
                .into()],
        );

        assert_eq!(connection_members(&schema, schema.union("Either").unwrap()).len(), 2);
        assert!(scan(&schema).is_empty());
    }

    #[test]
    fn test_scan_ignores_list_of_union() {
        let many = Field::new("many", TypeRef::named_list("IntegerResult"));
        let query = ObjectType::new("Query").field(many);
        let schema = schema(
            query,
            vec![UnionType::new("IntegerResult")
                .possible_type("IntegerConnection")
                .possible_type("NotFound")
                .into()],
        );
        assert!(scan(&schema).is_empty());
    }

    #[test]
    fn test_scan_skips_subscription_fields() {
        let union = UnionType::new("IntegerResult")
            .possible_type("IntegerConnection")
            .possible_type("NotFound");
        let mut builder = SchemaGraph::build("Query", None, Some("Subscription"))
            .register(
                ObjectType::new("Query")
                    .field(Field::new("integersUnion", TypeRef::named("IntegerResult"))),
            )
            .register(
                ObjectType::new("Subscription")
                    .field(Field::new("integerStream", TypeRef::named("IntegerResult"))),
            )
            .register(page_info())
            .register(not_found())
            .register(union);
        for object in connection("Integer") {
            builder = builder.register(object);
        }
        let schema = builder.finish().unwrap();

        let matches = scan(&schema);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].coordinates, FieldCoordinates::new("Query", "integersUnion"));
    }
}
