//! Schema definitions that get both scanned and executed
//!
//! A [`SchemaGraph`] holds named types, output fields with their wrapped
//! [`TypeRef`]s and field functions, union membership and the type resolvers
//! of abstract types. Connection matching walks it, decoration replaces field
//! functions in it, and [`crate::executable::build_schema`] registers the very
//! same definitions with async-graphql.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_graphql::dynamic::TypeRef;
use indexmap::{IndexMap, IndexSet};

use crate::fetcher::{
    DataFetcher, FetchEnvironment, FieldCoordinates, FieldValue, Outcome, TypeNameResolver,
    TypeResolver,
};
use crate::{GraphQLError, Result};

pub(crate) const BUILTIN_SCALARS: [&str; 5] = ["Int", "Float", "String", "Boolean", "ID"];

/// Structural accessors for [`TypeRef`]
pub trait TypeRefExt {
    /// Strip one outer non-null wrapper
    fn unwrap_non_null(&self) -> &TypeRef;

    /// Innermost named type
    fn base_name(&self) -> &str;

    /// Name when this is a bare named type, optionally non-null
    fn as_named(&self) -> Option<&str>;
}

impl TypeRefExt for TypeRef {
    fn unwrap_non_null(&self) -> &TypeRef {
        match self {
            TypeRef::NonNull(inner) => inner,
            other => other,
        }
    }

    fn base_name(&self) -> &str {
        match self {
            TypeRef::Named(name) => name.as_ref(),
            TypeRef::NonNull(inner) | TypeRef::List(inner) => inner.base_name(),
        }
    }

    fn as_named(&self) -> Option<&str> {
        match self.unwrap_non_null() {
            TypeRef::Named(name) => Some(name.as_ref()),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct FieldDefinition {
    pub name: String,
    pub ty: TypeRef,
    pub arguments: IndexMap<String, TypeRef>,
    fetcher: Option<Arc<dyn DataFetcher>>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            arguments: IndexMap::new(),
            fetcher: None,
        }
    }

    pub fn argument(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.arguments.insert(name.into(), ty);
        self
    }

    /// `first: Int, after: String, last: Int, before: String`
    pub fn relay_arguments(self) -> Self {
        self.argument("first", TypeRef::named(TypeRef::INT))
            .argument("after", TypeRef::named(TypeRef::STRING))
            .argument("last", TypeRef::named(TypeRef::INT))
            .argument("before", TypeRef::named(TypeRef::STRING))
    }

    pub fn resolve(mut self, fetcher: impl DataFetcher + 'static) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Use a closure as field function
    pub fn resolve_fn<F>(self, fetcher: F) -> Self
    where
        F: Fn(&FetchEnvironment) -> async_graphql::Result<Outcome> + Send + Sync + 'static,
    {
        self.resolve(fetcher)
    }

    /// Field function, if any; fields without one read the parent value
    pub fn fetcher(&self) -> Option<&Arc<dyn DataFetcher>> {
        self.fetcher.as_ref()
    }

    /// Whether any of the Relay arguments is declared
    pub fn is_paginated(&self) -> bool {
        ["first", "after", "last", "before"]
            .iter()
            .any(|name| self.arguments.contains_key(*name))
    }
}

impl fmt::Debug for FieldDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDefinition")
            .field("name", &self.name)
            .field("ty", &self.ty.to_string())
            .field("arguments", &self.arguments.keys().collect::<Vec<_>>())
            .field("has_fetcher", &self.fetcher.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ObjectType {
    pub name: String,
    pub fields: IndexMap<String, FieldDefinition>,
}

impl ObjectType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    /// Relay `PageInfo`
    pub fn page_info() -> Self {
        Self::new("PageInfo")
            .field(FieldDefinition::new(
                "hasPreviousPage",
                TypeRef::named_nn(TypeRef::BOOLEAN),
            ))
            .field(FieldDefinition::new(
                "hasNextPage",
                TypeRef::named_nn(TypeRef::BOOLEAN),
            ))
            .field(FieldDefinition::new("startCursor", TypeRef::named(TypeRef::STRING)))
            .field(FieldDefinition::new("endCursor", TypeRef::named(TypeRef::STRING)))
    }

    /// `{prefix}Connection` and its `{prefix}Edge` over nodes of type `node`
    pub fn connection(prefix: &str, node: TypeRef) -> (Self, Self) {
        let edge_name = format!("{prefix}Edge");
        let connection = Self::new(format!("{prefix}Connection"))
            .field(FieldDefinition::new(
                "edges",
                TypeRef::named_nn_list_nn(edge_name.as_str()),
            ))
            .field(FieldDefinition::new("pageInfo", TypeRef::named_nn("PageInfo")));
        let edge = Self::new(edge_name)
            .field(FieldDefinition::new("node", node))
            .field(FieldDefinition::new("cursor", TypeRef::named_nn(TypeRef::STRING)));
        (connection, edge)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionType {
    pub name: String,
    pub possible_types: IndexSet<String>,
}

impl UnionType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            possible_types: IndexSet::new(),
        }
    }

    pub fn possible_type(mut self, name: impl Into<String>) -> Self {
        self.possible_types.insert(name.into());
        self
    }
}

#[derive(Debug, Clone)]
pub enum NamedType {
    Object(ObjectType),
    Union(UnionType),
    Scalar(String),
}

impl NamedType {
    pub fn name(&self) -> &str {
        match self {
            NamedType::Object(object) => &object.name,
            NamedType::Union(union) => &union.name,
            NamedType::Scalar(name) => name,
        }
    }

    pub fn fields(&self) -> Option<&IndexMap<String, FieldDefinition>> {
        match self {
            NamedType::Object(object) => Some(&object.fields),
            _ => None,
        }
    }
}

impl From<ObjectType> for NamedType {
    fn from(object: ObjectType) -> Self {
        NamedType::Object(object)
    }
}

impl From<UnionType> for NamedType {
    fn from(union: UnionType) -> Self {
        NamedType::Union(union)
    }
}

/// Validated schema: types, field functions and type resolvers
#[derive(Clone)]
pub struct SchemaGraph {
    query: String,
    mutation: Option<String>,
    subscription: Option<String>,
    types: IndexMap<String, NamedType>,
    type_resolvers: HashMap<String, Arc<dyn TypeResolver>>,
    default_type_resolver: Arc<dyn TypeResolver>,
}

impl SchemaGraph {
    pub fn build(query: &str, mutation: Option<&str>, subscription: Option<&str>) -> SchemaBuilder {
        SchemaBuilder {
            query: query.to_string(),
            mutation: mutation.map(str::to_string),
            subscription: subscription.map(str::to_string),
            types: IndexMap::new(),
            type_resolvers: HashMap::new(),
            default_type_resolver: Arc::new(TypeNameResolver),
        }
    }

    pub fn query_type(&self) -> &str {
        &self.query
    }

    pub fn mutation_type(&self) -> Option<&str> {
        self.mutation.as_deref()
    }

    pub fn subscription_type(&self) -> Option<&str> {
        self.subscription.as_deref()
    }

    pub fn is_subscription_type(&self, name: &str) -> bool {
        self.subscription.as_deref() == Some(name)
    }

    /// All types in registration order
    pub fn types(&self) -> impl Iterator<Item = &NamedType> {
        self.types.values()
    }

    pub fn get_type(&self, name: &str) -> Option<&NamedType> {
        self.types.get(name)
    }

    pub fn object(&self, name: &str) -> Option<&ObjectType> {
        match self.types.get(name) {
            Some(NamedType::Object(object)) => Some(object),
            _ => None,
        }
    }

    pub fn union(&self, name: &str) -> Option<&UnionType> {
        match self.types.get(name) {
            Some(NamedType::Union(union)) => Some(union),
            _ => None,
        }
    }

    pub fn field(&self, coordinates: &FieldCoordinates) -> Option<&FieldDefinition> {
        self.object(&coordinates.type_name)?
            .get_field(&coordinates.field_name)
    }

    pub fn data_fetcher(&self, coordinates: &FieldCoordinates) -> Option<Arc<dyn DataFetcher>> {
        self.field(coordinates)?.fetcher.clone()
    }

    /// Run the field function at `coordinates`
    pub fn fetch(
        &self,
        coordinates: &FieldCoordinates,
        env: &FetchEnvironment,
    ) -> async_graphql::Result<Outcome> {
        let fetcher = self.data_fetcher(coordinates).ok_or_else(|| {
            async_graphql::Error::new(format!("No data fetcher registered for {coordinates}"))
        })?;
        fetcher.fetch(env)
    }

    /// Resolver registered for the abstract type `type_name`, else the default
    pub fn type_resolver(&self, type_name: &str) -> Arc<dyn TypeResolver> {
        self.type_resolvers
            .get(type_name)
            .cloned()
            .unwrap_or_else(|| self.default_type_resolver.clone())
    }

    pub fn default_type_resolver(&self) -> Arc<dyn TypeResolver> {
        self.default_type_resolver.clone()
    }

    /// Concrete type name of `value` returned for the abstract type `type_name`
    pub fn resolve_type(&self, type_name: &str, value: &FieldValue) -> Option<String> {
        self.type_resolver(type_name).resolve_type(value)
    }

    /// Swap the field function at `coordinates`; false when there is no such field
    pub(crate) fn replace_data_fetcher(
        &mut self,
        coordinates: &FieldCoordinates,
        fetcher: Arc<dyn DataFetcher>,
    ) -> bool {
        let field = match self.types.get_mut(&coordinates.type_name) {
            Some(NamedType::Object(object)) => object.fields.get_mut(&coordinates.field_name),
            _ => None,
        };
        match field {
            Some(field) => {
                field.fetcher = Some(fetcher);
                true
            }
            None => false,
        }
    }

    pub(crate) fn insert_type_resolver(
        &mut self,
        type_name: String,
        resolver: Arc<dyn TypeResolver>,
    ) {
        self.type_resolvers.insert(type_name, resolver);
    }
}

impl fmt::Debug for SchemaGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut resolvers: Vec<&String> = self.type_resolvers.keys().collect();
        resolvers.sort();
        f.debug_struct("SchemaGraph")
            .field("query", &self.query)
            .field("mutation", &self.mutation)
            .field("subscription", &self.subscription)
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .field("type_resolvers", &resolvers)
            .finish_non_exhaustive()
    }
}

pub struct SchemaBuilder {
    query: String,
    mutation: Option<String>,
    subscription: Option<String>,
    types: IndexMap<String, NamedType>,
    type_resolvers: HashMap<String, Arc<dyn TypeResolver>>,
    default_type_resolver: Arc<dyn TypeResolver>,
}

impl SchemaBuilder {
    pub fn register(mut self, ty: impl Into<NamedType>) -> Self {
        let ty = ty.into();
        self.types.insert(ty.name().to_string(), ty);
        self
    }

    /// Custom scalar
    pub fn scalar(self, name: impl Into<String>) -> Self {
        self.register(NamedType::Scalar(name.into()))
    }

    /// `PageInfo` plus `{prefix}Connection` and `{prefix}Edge`
    pub fn connection(mut self, prefix: &str, node: TypeRef) -> Self {
        if !self.types.contains_key("PageInfo") {
            self = self.register(ObjectType::page_info());
        }
        let (connection, edge) = ObjectType::connection(prefix, node);
        self.register(connection).register(edge)
    }

    pub fn type_resolver(
        mut self,
        type_name: impl Into<String>,
        resolver: impl TypeResolver + 'static,
    ) -> Self {
        self.type_resolvers.insert(type_name.into(), Arc::new(resolver));
        self
    }

    pub fn default_type_resolver(mut self, resolver: impl TypeResolver + 'static) -> Self {
        self.default_type_resolver = Arc::new(resolver);
        self
    }

    /// Validate the graph and freeze it
    pub fn finish(mut self) -> Result<SchemaGraph> {
        for scalar in BUILTIN_SCALARS {
            self.types
                .entry(scalar.to_string())
                .or_insert_with(|| NamedType::Scalar(scalar.to_string()));
        }

        let roots = std::iter::once(&self.query)
            .chain(self.mutation.as_ref())
            .chain(self.subscription.as_ref());
        for root in roots {
            if !matches!(self.types.get(root), Some(NamedType::Object(_))) {
                return Err(GraphQLError::InvalidSchema(format!(
                    "root type '{root}' is not a registered object type"
                )));
            }
        }

        for ty in self.types.values() {
            match ty {
                NamedType::Union(union) => self.check_union(union)?,
                NamedType::Object(object) => self.check_fields(object)?,
                NamedType::Scalar(_) => {}
            }
        }

        Ok(SchemaGraph {
            query: self.query,
            mutation: self.mutation,
            subscription: self.subscription,
            types: self.types,
            type_resolvers: self.type_resolvers,
            default_type_resolver: self.default_type_resolver,
        })
    }

    fn check_union(&self, union: &UnionType) -> Result<()> {
        if union.possible_types.is_empty() {
            return Err(GraphQLError::InvalidSchema(format!(
                "union '{}' has no member types",
                union.name
            )));
        }
        for member in &union.possible_types {
            if !matches!(self.types.get(member), Some(NamedType::Object(_))) {
                return Err(GraphQLError::InvalidSchema(format!(
                    "member '{member}' of union '{}' is not an object type",
                    union.name
                )));
            }
        }
        Ok(())
    }

    fn check_fields(&self, object: &ObjectType) -> Result<()> {
        if object.fields.is_empty() {
            return Err(GraphQLError::InvalidSchema(format!(
                "object '{}' has no fields",
                object.name
            )));
        }
        for field in object.fields.values() {
            let types = std::iter::once(&field.ty).chain(field.arguments.values());
            for ty in types {
                let base = ty.base_name();
                if !self.types.contains_key(base) {
                    return Err(GraphQLError::InvalidSchema(format!(
                        "field '{}.{}' has unknown type '{base}'",
                        object.name, field.name
                    )));
                }
            }
        }
        Ok(())
    }
}
