//! Decorates union fields so paginated results come back as connections
//!
//! For every match found by [`scan`], the field function is wrapped in a
//! [`ConnectionDataFetcher`] and the union gets a [`ConnectionTypeResolver`]
//! that maps connection payloads to the matched connection type. Every other
//! union member resolves through the type resolver the union had before.

use std::sync::Arc;

use async_graphql::ErrorExtensions;
use futures::FutureExt;
use tracing::{debug, error};

use crate::adapter::{ConnectionAdapter, ConnectionAdapters};
use crate::container::Container;
use crate::fetcher::{
    DataFetcher, FetchEnvironment, FieldCoordinates, FieldValue, Outcome, TypeResolver,
};
use crate::matcher::{scan, ConnectionMatch};
use crate::pagination::{Connection, Edge};
use crate::schema::SchemaGraph;
use crate::{GraphQLError, Result};

/// Field function decorator that adapts paginated results to [`Connection`]
pub struct ConnectionDataFetcher {
    delegate: Arc<dyn DataFetcher>,
    adapters: Arc<ConnectionAdapters>,
    coordinates: FieldCoordinates,
}

impl ConnectionDataFetcher {
    pub fn new(
        delegate: Arc<dyn DataFetcher>,
        adapters: Arc<ConnectionAdapters>,
        coordinates: FieldCoordinates,
    ) -> Self {
        Self {
            delegate,
            adapters,
            coordinates,
        }
    }

    /// Adapt whatever the delegate produced.
    ///
    /// Deferred outcomes get the adaptation attached as a continuation; it runs
    /// once, after the delegate succeeds. Failures pass through untouched.
    pub fn adapt(&self, outcome: Outcome) -> async_graphql::Result<Outcome> {
        adapt_outcome(&self.adapters, &self.coordinates, outcome)
    }
}

impl DataFetcher for ConnectionDataFetcher {
    fn fetch(&self, env: &FetchEnvironment) -> async_graphql::Result<Outcome> {
        let outcome = self.delegate.fetch(env)?;
        self.adapt(outcome)
    }
}

fn adapt_outcome(
    adapters: &Arc<ConnectionAdapters>,
    coordinates: &FieldCoordinates,
    outcome: Outcome,
) -> async_graphql::Result<Outcome> {
    let adapted = match outcome {
        Outcome::Ready(value) => {
            Outcome::Ready(adapt_value(adapters, value).map_err(|e| report(coordinates, e))?)
        }
        Outcome::Partial(partial) => Outcome::Partial(
            partial
                .try_map_data(|data| adapt_value(adapters, data))
                .map_err(|e| report(coordinates, e))?,
        ),
        Outcome::Deferred(future) => {
            let adapters = adapters.clone();
            let coordinates = coordinates.clone();
            Outcome::Deferred(
                future
                    .map(move |result| {
                        result.and_then(|outcome| adapt_outcome(&adapters, &coordinates, outcome))
                    })
                    .boxed(),
            )
        }
    };
    Ok(adapted)
}

fn report(coordinates: &FieldCoordinates, e: GraphQLError) -> async_graphql::Error {
    if !e.is_user_error() {
        error!(field = %coordinates, error = %e, "failed to adapt result to a connection");
    }
    e.extend()
}

/// Adapt one field value.
///
/// - `Null` becomes the empty connection
/// - a connection is returned as is
/// - a paginated container goes through the adapters
/// - anything else (plain data, other union members) passes through
pub fn adapt_value(adapters: &ConnectionAdapters, value: FieldValue) -> Result<FieldValue> {
    match value {
        FieldValue::Null => Ok(FieldValue::Connection(Connection::empty())),
        FieldValue::Paginated(container) => adapt_container(adapters, container),
        other @ (FieldValue::Connection(_) | FieldValue::Value(_) | FieldValue::Object { .. }) => {
            Ok(other)
        }
    }
}

fn adapt_container(adapters: &ConnectionAdapters, container: Container) -> Result<FieldValue> {
    let container = match container.downcast::<Connection>() {
        Ok(connection) => return Ok(FieldValue::Connection(connection)),
        Err(container) => container,
    };

    if !adapters.supports(&container) {
        if container.simple_name().ends_with("Connection") {
            return Ok(FieldValue::Paginated(container));
        }
        return Err(GraphQLError::UnsupportedContainer(container.type_name().to_string()));
    }

    let nodes = adapters.content(&container)?;
    if nodes.is_empty() {
        return Ok(FieldValue::Connection(Connection::empty()));
    }

    let edges = nodes
        .into_iter()
        .enumerate()
        .map(|(index, node)| Ok(Edge::new(node, adapters.cursor_at(&container, index)?)))
        .collect::<Result<Vec<_>>>()?;

    Ok(FieldValue::Connection(Connection::new(
        edges,
        adapters.has_previous(&container)?,
        adapters.has_next(&container)?,
    )))
}

/// Union type resolver: connection payloads resolve to the matched
/// connection type, everything else goes to `fallback`.
pub struct ConnectionTypeResolver {
    connection_type: String,
    fallback: Arc<dyn TypeResolver>,
}

impl ConnectionTypeResolver {
    pub fn new(connection_type: impl Into<String>, fallback: Arc<dyn TypeResolver>) -> Self {
        Self {
            connection_type: connection_type.into(),
            fallback,
        }
    }
}

impl TypeResolver for ConnectionTypeResolver {
    fn resolve_type(&self, value: &FieldValue) -> Option<String> {
        match value {
            FieldValue::Connection(_) => Some(self.connection_type.clone()),
            other => self.fallback.resolve_type(other),
        }
    }
}

/// Decorate matched fields and register union type resolvers.
///
/// Fields without a field function, or whose function is a trivial property
/// read, are skipped.
pub fn decorate(
    mut schema: SchemaGraph,
    matches: &[ConnectionMatch],
    adapters: ConnectionAdapters,
) -> Result<SchemaGraph> {
    if adapters.is_empty() {
        return Err(GraphQLError::Configuration(
            "Expected at least one ConnectionAdapter".to_string(),
        ));
    }
    let adapters = Arc::new(adapters);

    for found in matches {
        let Some(delegate) = schema.data_fetcher(&found.coordinates) else {
            debug!(field = %found.coordinates, "skipping connection field without a data fetcher");
            continue;
        };
        if delegate.is_trivial() {
            debug!(
                field = %found.coordinates,
                "skipping connection field mapped to a trivial data fetcher"
            );
            continue;
        }

        let fetcher =
            ConnectionDataFetcher::new(delegate, adapters.clone(), found.coordinates.clone());
        schema.replace_data_fetcher(&found.coordinates, Arc::new(fetcher));

        let fallback = schema.type_resolver(&found.union_type);
        let resolver = ConnectionTypeResolver::new(&found.connection_type, fallback);
        schema.insert_type_resolver(found.union_type.clone(), Arc::new(resolver));

        debug!(
            field = %found.coordinates,
            union = %found.union_type,
            connection = %found.connection_type,
            "decorated connection field"
        );
    }

    Ok(schema)
}

/// [`scan`] the schema, then [`decorate`] what it found
pub fn install(schema: SchemaGraph, adapters: ConnectionAdapters) -> Result<SchemaGraph> {
    let matches = scan(&schema);
    decorate(schema, &matches, adapters)
}
