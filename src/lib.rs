//! # graphql-union-pagination
//!
//! Relay-style connection pagination for GraphQL fields whose declared type
//! is a union with exactly one `...Connection` member.
//!
//! ## Features
//!
//! - **Schema Matcher** - finds `field: SomeUnion` where
//!   `union SomeUnion = SomeConnection | OtherResult`
//! - **Field Decoration** - wraps field functions so windows and slices come
//!   back as `{ edges, pageInfo }` while other union members pass through
//! - **Cursor Codec** - opaque base64 cursors for offset and keyset positions
//! - **Argument Normalizer** - turns `first/after/last/before` into page
//!   requests for offset or keyset backends
//!
//! ## Usage
//!
//! ```rust,ignore
//! use graphql_union_pagination::{build_schema, install, ConnectionAdapters, CursorCodec};
//!
//! let adapters = ConnectionAdapters::with_defaults(Arc::new(CursorCodec::default()));
//! let graph = install(graph, adapters)?;
//! let schema = build_schema(&graph, &PaginationConfig::default())?;
//! ```

pub mod adapter;
pub mod arguments;
pub mod config;
pub mod container;
pub mod cursor;
pub mod decorate;
pub mod executable;
pub mod fetcher;
pub mod matcher;
pub mod pagination;
pub mod schema;

pub use adapter::{
    ConnectionAdapter, ConnectionAdapters, SliceConnectionAdapter, WindowConnectionAdapter,
};
pub use arguments::{
    handle_keyset_arguments, handle_keyset_relay_arguments, handle_offset_arguments,
    handle_offset_relay_arguments, Order, PageRequest, PaginationRequest, Sort, SortDirection,
};
pub use config::PaginationConfig;
pub use container::{Container, Slice, Window};
pub use cursor::{
    CursorCodec, Direction, KeyValue, KeysetPosition, OffsetPosition, ScrollPosition,
    TypedValueKind,
};
pub use decorate::{
    adapt_value, decorate, install, ConnectionDataFetcher, ConnectionTypeResolver,
};
pub use executable::build_schema;
pub use fetcher::{
    DataFetcher, FetchEnvironment, FieldCoordinates, FieldValue, Outcome, PartialResult,
    PropertyFetcher, TypeNameResolver, TypeResolver,
};
pub use matcher::{is_connection_type, scan, ConnectionMatch};
pub use pagination::{Connection, Edge, PageInfo, RelayArguments};
pub use schema::{
    FieldDefinition, NamedType, ObjectType, SchemaBuilder, SchemaGraph, TypeRefExt, UnionType,
};

use async_graphql::ErrorExtensions;
use thiserror::Error;

/// Pagination errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphQLError {
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Pagination error: {0}")]
    PaginationError(String),

    #[error("Unsupported after or before parameter: {0}")]
    UnsupportedPosition(String),

    #[error("No ConnectionAdapter for: {0}")]
    UnsupportedContainer(String),

    #[error(
        "Union '{union_type}' of field '{field}' has more than one connection member: {members:?}"
    )]
    AmbiguousUnionMatch {
        field: String,
        union_type: String,
        members: Vec<String>,
    },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl GraphQLError {
    /// Machine-readable code reported in the GraphQL error extensions.
    ///
    /// Cursor and argument problems are the client's to fix; everything else
    /// points at a resolver or schema bug.
    pub fn code(&self) -> &'static str {
        match self {
            GraphQLError::InvalidCursor(_) => "INVALID_CURSOR",
            GraphQLError::PaginationError(_) => "BAD_USER_INPUT",
            GraphQLError::UnsupportedPosition(_) => "UNSUPPORTED_POSITION",
            GraphQLError::UnsupportedContainer(_)
            | GraphQLError::AmbiguousUnionMatch { .. }
            | GraphQLError::InvalidSchema(_)
            | GraphQLError::Configuration(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Whether the error was caused by request input rather than a server fault.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            GraphQLError::InvalidCursor(_)
                | GraphQLError::PaginationError(_)
                | GraphQLError::UnsupportedPosition(_)
        )
    }
}

impl ErrorExtensions for GraphQLError {
    fn extend(&self) -> async_graphql::Error {
        let code = self.code();
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| e.set("code", code))
    }
}

/// Result type for pagination operations
pub type Result<T> = std::result::Result<T, GraphQLError>;
