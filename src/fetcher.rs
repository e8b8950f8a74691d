//! Field functions and the values they produce
//!
//! Field functions live on their [`crate::schema::FieldDefinition`]; abstract
//! types keep their [`TypeResolver`] in the [`crate::schema::SchemaGraph`].

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_graphql::Value;
use futures::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;

use crate::arguments::PaginationRequest;
use crate::container::{Container, Slice, Window};
use crate::pagination::Connection;

/// `(parent type, field name)` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldCoordinates {
    pub type_name: String,
    pub field_name: String,
}

impl FieldCoordinates {
    pub fn new(type_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            field_name: field_name.into(),
        }
    }
}

impl fmt::Display for FieldCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.field_name)
    }
}

/// Value produced for a field
#[derive(Debug)]
pub enum FieldValue {
    Null,
    /// Plain data
    Value(Value),
    /// Instance of a named object type, e.g. an error member of a union
    Object { type_name: String, value: Value },
    /// Result container still to be turned into a connection
    Paginated(Container),
    Connection(Connection),
}

impl FieldValue {
    pub fn object(type_name: impl Into<String>, value: impl Into<Value>) -> Self {
        FieldValue::Object {
            type_name: type_name.into(),
            value: value.into(),
        }
    }

    pub fn window(window: Window) -> Self {
        FieldValue::Paginated(Container::new(window))
    }

    pub fn slice(slice: Slice) -> Self {
        FieldValue::Paginated(Container::new(slice))
    }

    pub fn paginated<T: Any + Send + Sync>(container: T) -> Self {
        FieldValue::Paginated(Container::new(container))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_connection(&self) -> Option<&Connection> {
        match self {
            FieldValue::Connection(connection) => Some(connection),
            _ => None,
        }
    }
}

impl From<Connection> for FieldValue {
    fn from(connection: Connection) -> Self {
        FieldValue::Connection(connection)
    }
}

/// Data together with side-channel errors and local context
#[derive(Debug)]
pub struct PartialResult {
    pub data: FieldValue,
    pub errors: Vec<async_graphql::Error>,
    pub local_context: Option<Arc<dyn Any + Send + Sync>>,
}

impl PartialResult {
    pub fn new(data: FieldValue) -> Self {
        Self {
            data,
            errors: Vec::new(),
            local_context: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<async_graphql::Error>) -> Self {
        self.errors.push(error.into());
        self
    }

    pub fn with_local_context<T: Any + Send + Sync>(mut self, context: T) -> Self {
        self.local_context = Some(Arc::new(context));
        self
    }

    /// Replace the data, keeping errors and local context
    pub fn try_map_data<E>(
        self,
        f: impl FnOnce(FieldValue) -> Result<FieldValue, E>,
    ) -> Result<Self, E> {
        Ok(Self {
            data: f(self.data)?,
            errors: self.errors,
            local_context: self.local_context,
        })
    }
}

/// What a field function hands back
pub enum Outcome {
    Ready(FieldValue),
    Partial(PartialResult),
    /// Completes later; never polled by the decorator itself
    Deferred(BoxFuture<'static, async_graphql::Result<Outcome>>),
}

impl Outcome {
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = async_graphql::Result<Outcome>> + Send + 'static,
    {
        Outcome::Deferred(future.boxed())
    }

    /// Drive deferred outcomes to completion
    pub async fn complete(self) -> async_graphql::Result<PartialResult> {
        let mut outcome = self;
        loop {
            match outcome {
                Outcome::Ready(data) => return Ok(PartialResult::new(data)),
                Outcome::Partial(partial) => return Ok(partial),
                Outcome::Deferred(future) => outcome = future.await?,
            }
        }
    }
}

impl From<FieldValue> for Outcome {
    fn from(value: FieldValue) -> Self {
        Outcome::Ready(value)
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Outcome::Partial(partial) => f.debug_tuple("Partial").field(partial).finish(),
            Outcome::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Per-request input of a field function
#[derive(Debug, Clone, Default)]
pub struct FetchEnvironment {
    source: Value,
    arguments: IndexMap<String, Value>,
    pagination: Option<PaginationRequest>,
}

impl FetchEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of the parent object
    pub fn with_source(mut self, source: impl Into<Value>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    pub fn with_pagination(mut self, request: PaginationRequest) -> Self {
        self.pagination = Some(request);
        self
    }

    pub fn source(&self) -> &Value {
        &self.source
    }

    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }

    pub fn arguments(&self) -> &IndexMap<String, Value> {
        &self.arguments
    }

    pub fn pagination(&self) -> Option<&PaginationRequest> {
        self.pagination.as_ref()
    }
}

/// Produces the value of one field
pub trait DataFetcher: Send + Sync {
    fn fetch(&self, env: &FetchEnvironment) -> async_graphql::Result<Outcome>;

    /// Plain property reads are never decorated
    fn is_trivial(&self) -> bool {
        false
    }
}

impl<F> DataFetcher for F
where
    F: Fn(&FetchEnvironment) -> async_graphql::Result<Outcome> + Send + Sync,
{
    fn fetch(&self, env: &FetchEnvironment) -> async_graphql::Result<Outcome> {
        self(env)
    }
}

/// Reads a property of the parent object
pub struct PropertyFetcher {
    property: String,
}

impl PropertyFetcher {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
        }
    }
}

impl DataFetcher for PropertyFetcher {
    fn fetch(&self, env: &FetchEnvironment) -> async_graphql::Result<Outcome> {
        let value = match env.source() {
            Value::Object(object) => object.get(self.property.as_str()).cloned(),
            _ => None,
        };
        Ok(Outcome::Ready(value.map(FieldValue::Value).unwrap_or(FieldValue::Null)))
    }

    fn is_trivial(&self) -> bool {
        true
    }
}

/// Picks the concrete object type of a value returned for an abstract type
pub trait TypeResolver: Send + Sync {
    fn resolve_type(&self, value: &FieldValue) -> Option<String>;
}

/// Resolves by the name a value carries: the type name of an object, or the
/// unqualified Rust type name of a container.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeNameResolver;

impl TypeResolver for TypeNameResolver {
    fn resolve_type(&self, value: &FieldValue) -> Option<String> {
        match value {
            FieldValue::Object { type_name, .. } => Some(type_name.clone()),
            FieldValue::Paginated(container) => Some(container.simple_name().to_string()),
            FieldValue::Null | FieldValue::Value(_) | FieldValue::Connection(_) => None,
        }
    }
}
