//! Executable async-graphql schema built from a [`SchemaGraph`]
//!
//! Objects, unions and custom scalars of the graph are registered as
//! `async_graphql::dynamic` types. Fields with a field function resolve
//! through it. The others read the parent value: connections, edges and page
//! info by their Relay field names, plain objects by key.

use std::sync::Arc;

use async_graphql::dynamic::{
    self, Field, FieldFuture, InputValue, Object, ResolverContext, Scalar, Subscription,
    SubscriptionField, SubscriptionFieldFuture, Union,
};
use async_graphql::{ErrorExtensions, Value};
use futures::stream;
use tracing::debug;

use crate::config::PaginationConfig;
use crate::cursor::CursorCodec;
use crate::fetcher::{DataFetcher, FetchEnvironment, FieldCoordinates, FieldValue, TypeResolver};
use crate::pagination::{Connection, Edge, PageInfo, RelayArguments};
use crate::schema::{
    FieldDefinition, NamedType, ObjectType, SchemaGraph, TypeRefExt, BUILTIN_SCALARS,
};
use crate::{GraphQLError, Result};

struct Paging {
    config: PaginationConfig,
    codec: CursorCodec,
}

/// Register every type of `graph` with async-graphql.
///
/// Paginated fields get their `first`/`after`/`last`/`before` validated
/// against `config` and the cursor decoded before the field function runs.
/// Subscription fields emit the value of their field function once.
pub fn build_schema(graph: &SchemaGraph, config: &PaginationConfig) -> Result<dynamic::Schema> {
    config.validate()?;
    let paging = Arc::new(Paging {
        config: config.clone(),
        codec: CursorCodec::from_config(config),
    });

    let mut builder = dynamic::Schema::build(
        graph.query_type(),
        graph.mutation_type(),
        graph.subscription_type(),
    );
    for ty in graph.types() {
        builder = match ty {
            NamedType::Object(object) if graph.is_subscription_type(&object.name) => {
                builder.register(subscription(graph, object, &paging))
            }
            NamedType::Object(object) => builder.register(object_type(graph, object, &paging)),
            NamedType::Union(union) => builder.register(
                union
                    .possible_types
                    .iter()
                    .fold(Union::new(&union.name), |gql, member| gql.possible_type(member)),
            ),
            NamedType::Scalar(name) if BUILTIN_SCALARS.contains(&name.as_str()) => builder,
            NamedType::Scalar(name) => builder.register(Scalar::new(name)),
        };
    }

    debug!(query = graph.query_type(), "built executable schema");
    builder
        .finish()
        .map_err(|e| GraphQLError::InvalidSchema(e.to_string()))
}

/// Runs a field function on behalf of async-graphql
struct FieldResolver {
    coordinates: FieldCoordinates,
    fetcher: Arc<dyn DataFetcher>,
    abstract_type: Option<Arc<dyn TypeResolver>>,
    paginated: bool,
    paging: Arc<Paging>,
}

impl FieldResolver {
    fn new(
        graph: &SchemaGraph,
        type_name: &str,
        field: &FieldDefinition,
        paging: &Arc<Paging>,
    ) -> Option<Arc<Self>> {
        let fetcher = field.fetcher()?.clone();
        let abstract_type = field
            .ty
            .as_named()
            .filter(|name| graph.union(name).is_some())
            .map(|name| graph.type_resolver(name));

        Some(Arc::new(Self {
            coordinates: FieldCoordinates::new(type_name, &field.name),
            fetcher,
            abstract_type,
            paginated: field.is_paginated(),
            paging: paging.clone(),
        }))
    }

    fn environment(&self, ctx: &ResolverContext<'_>) -> async_graphql::Result<FetchEnvironment> {
        let mut env = FetchEnvironment::new();
        if let Some(source) = ctx.parent_value.as_value() {
            env = env.with_source(source.clone());
        }
        for (name, value) in ctx.args.as_index_map() {
            env = env.with_argument(name.as_str(), value.clone());
        }

        if self.paginated {
            let request = RelayArguments::from_arguments(env.arguments())
                .and_then(|arguments| {
                    arguments.to_request(&self.paging.config, &self.paging.codec)
                })
                .map_err(|e| e.extend())?;
            env = env.with_pagination(request);
        }
        Ok(env)
    }

    /// Partial-result errors are added to the response next to the data
    async fn resolve<'a>(
        &self,
        ctx: &ResolverContext<'_>,
    ) -> async_graphql::Result<Option<dynamic::FieldValue<'a>>> {
        let env = self.environment(ctx)?;
        debug!(field = %self.coordinates, "resolving field");

        let result = self.fetcher.fetch(&env)?.complete().await?;
        for error in result.errors {
            ctx.ctx.add_error(error.into_server_error(ctx.ctx.item.pos));
        }
        Ok(self.output(result.data))
    }

    fn output<'a>(&self, data: FieldValue) -> Option<dynamic::FieldValue<'a>> {
        let type_name = self
            .abstract_type
            .as_ref()
            .and_then(|resolver| resolver.resolve_type(&data));

        let value = match data {
            FieldValue::Null => return None,
            FieldValue::Value(value) => from_value(value)?,
            FieldValue::Object { value, .. } => dynamic::FieldValue::value(value),
            FieldValue::Paginated(container) => dynamic::FieldValue::owned_any(container),
            FieldValue::Connection(connection) => dynamic::FieldValue::owned_any(connection),
        };
        Some(match type_name {
            Some(type_name) => value.with_type(type_name),
            None => value,
        })
    }
}

fn object_type(graph: &SchemaGraph, object: &ObjectType, paging: &Arc<Paging>) -> Object {
    object
        .fields
        .values()
        .fold(Object::new(&object.name), |gql, field| {
            let gql_field = match FieldResolver::new(graph, &object.name, field, paging) {
                Some(resolver) => Field::new(&field.name, field.ty.clone(), move |ctx| {
                    let resolver = resolver.clone();
                    FieldFuture::new(async move { resolver.resolve(&ctx).await })
                }),
                None => {
                    let property = field.name.clone();
                    Field::new(&field.name, field.ty.clone(), move |ctx| {
                        let property = property.clone();
                        FieldFuture::new(async move {
                            Ok(property_of(ctx.parent_value, &property))
                        })
                    })
                }
            };
            let gql_field = field.arguments.iter().fold(gql_field, |gql_field, (name, ty)| {
                gql_field.argument(InputValue::new(name, ty.clone()))
            });
            gql.field(gql_field)
        })
}

fn subscription(graph: &SchemaGraph, object: &ObjectType, paging: &Arc<Paging>) -> Subscription {
    object
        .fields
        .values()
        .fold(Subscription::new(&object.name), |gql, field| {
            let resolver = FieldResolver::new(graph, &object.name, field, paging);
            let gql_field = SubscriptionField::new(&field.name, field.ty.clone(), move |ctx| {
                let resolver = resolver.clone();
                SubscriptionFieldFuture::new(async move {
                    let value = match resolver {
                        Some(resolver) => resolver.resolve(&ctx).await?,
                        None => None,
                    };
                    let value = value.unwrap_or(dynamic::FieldValue::NULL);
                    Ok(stream::once(async move { Ok::<_, async_graphql::Error>(value) }))
                })
            });
            let gql_field = field.arguments.iter().fold(gql_field, |gql_field, (name, ty)| {
                gql_field.argument(InputValue::new(name, ty.clone()))
            });
            gql.field(gql_field)
        })
}

/// Read `name` off a parent that has no field function
fn property_of<'a>(
    parent: &dynamic::FieldValue<'_>,
    name: &str,
) -> Option<dynamic::FieldValue<'a>> {
    if let Some(connection) = parent.downcast_ref::<Connection>() {
        return match name {
            "edges" => Some(dynamic::FieldValue::list(
                connection.edges.iter().cloned().map(dynamic::FieldValue::owned_any),
            )),
            "pageInfo" => Some(dynamic::FieldValue::owned_any(connection.page_info.clone())),
            _ => None,
        };
    }
    if let Some(edge) = parent.downcast_ref::<Edge>() {
        return match name {
            "node" => from_value(edge.node.clone()),
            "cursor" => Some(dynamic::FieldValue::value(edge.cursor.clone())),
            _ => None,
        };
    }
    if let Some(page_info) = parent.downcast_ref::<PageInfo>() {
        return page_info.field(name).map(dynamic::FieldValue::value);
    }

    match parent.as_value() {
        Some(Value::Object(object)) => object.get(name).cloned().and_then(from_value),
        _ => None,
    }
}

fn from_value<'a>(value: Value) -> Option<dynamic::FieldValue<'a>> {
    match value {
        Value::Null => None,
        Value::List(items) => Some(dynamic::FieldValue::list(
            items
                .into_iter()
                .map(|item| from_value(item).unwrap_or(dynamic::FieldValue::NULL)),
        )),
        value => Some(dynamic::FieldValue::value(value)),
    }
}
