//! Paginatable result containers returned by resolvers

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use async_graphql::Value;

use crate::arguments::PageRequest;
use crate::cursor::{OffsetPosition, ScrollPosition};

type PositionFn = dyn Fn(usize) -> ScrollPosition + Send + Sync;

/// Bounded list of items that knows whether more follow and can derive a
/// scroll position for each item
#[derive(Clone)]
pub struct Window {
    content: Vec<Value>,
    has_next: bool,
    positions: Arc<PositionFn>,
}

impl Window {
    pub fn from<T, F>(
        content: impl IntoIterator<Item = T>,
        position_fn: F,
        has_next: bool,
    ) -> Self
    where
        T: Into<Value>,
        F: Fn(usize) -> ScrollPosition + Send + Sync + 'static,
    {
        Self {
            content: content.into_iter().map(Into::into).collect(),
            has_next,
            positions: Arc::new(position_fn),
        }
    }

    /// Window whose items sit at consecutive offsets starting at `first_offset`.
    ///
    /// Offsets saturate at `u64::MAX`.
    pub fn from_offset<T>(
        content: impl IntoIterator<Item = T>,
        first_offset: u64,
        has_next: bool,
    ) -> Self
    where
        T: Into<Value>,
    {
        Self::from(
            content,
            move |index| {
                let offset = first_offset.saturating_add(index as u64);
                ScrollPosition::Offset(OffsetPosition::at(offset))
            },
            has_next,
        )
    }

    pub fn content(&self) -> &[Value] {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn position_at(&self, index: usize) -> ScrollPosition {
        (self.positions)(index)
    }
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("content", &self.content)
            .field("has_next", &self.has_next)
            .finish_non_exhaustive()
    }
}

/// One page of an offset-paged result
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    content: Vec<Value>,
    page: u64,
    size: u32,
    has_next: bool,
}

impl Slice {
    pub fn new<T>(content: impl IntoIterator<Item = T>, page: &PageRequest, has_next: bool) -> Self
    where
        T: Into<Value>,
    {
        Self {
            content: content.into_iter().map(Into::into).collect(),
            page: page.page(),
            size: page.size(),
            has_next,
        }
    }

    pub fn content(&self) -> &[Value] {
        &self.content
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn has_previous(&self) -> bool {
        self.page > 0
    }

    /// Absolute offset of the item at `index`, `None` past `u64::MAX`
    pub fn offset_at(&self, index: usize) -> Option<u64> {
        self.page
            .checked_mul(u64::from(self.size))?
            .checked_add(index as u64)
    }
}

/// Type-erased result container, remembering the name of the type it holds
pub struct Container {
    type_name: &'static str,
    value: Box<dyn Any + Send + Sync>,
}

impl Container {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: type_name::<T>(),
            value: Box::new(value),
        }
    }

    /// Full path of the contained type
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Contained type name without module path or generic arguments
    pub fn simple_name(&self) -> &'static str {
        let name = self.type_name.split('<').next().unwrap_or(self.type_name);
        name.rsplit("::").next().unwrap_or(name)
    }

    pub fn type_id(&self) -> TypeId {
        (*self.value).type_id()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Take the contained value out, or get the container back untouched
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        let type_name = self.type_name;
        self.value
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|value| Self { type_name, value })
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Container").field(&self.type_name).finish()
    }
}

impl From<Window> for Container {
    fn from(window: Window) -> Self {
        Container::new(window)
    }
}

impl From<Slice> for Container {
    fn from(slice: Slice) -> Self {
        Container::new(slice)
    }
}
