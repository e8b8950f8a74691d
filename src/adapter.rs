//! Adapters that read edges and page flags out of result containers

use std::sync::Arc;

use async_graphql::Value;

use crate::container::{Container, Slice, Window};
use crate::cursor::{CursorCodec, ScrollPosition};
use crate::{GraphQLError, Result};

/// Knows how to paginate one kind of [`Container`]
pub trait ConnectionAdapter: Send + Sync {
    /// Whether this adapter handles the container's runtime type
    fn supports(&self, container: &Container) -> bool;

    fn content(&self, container: &Container) -> Result<Vec<Value>>;

    fn cursor_at(&self, container: &Container, index: usize) -> Result<String>;

    fn has_previous(&self, container: &Container) -> Result<bool>;

    fn has_next(&self, container: &Container) -> Result<bool>;
}

fn unsupported(container: &Container) -> GraphQLError {
    GraphQLError::UnsupportedContainer(container.type_name().to_string())
}

/// Adapter for [`Window`]
pub struct WindowConnectionAdapter {
    codec: Arc<CursorCodec>,
}

impl WindowConnectionAdapter {
    pub fn new(codec: Arc<CursorCodec>) -> Self {
        Self { codec }
    }

    fn window<'a>(&self, container: &'a Container) -> Result<&'a Window> {
        container.downcast_ref::<Window>().ok_or_else(|| unsupported(container))
    }
}

impl ConnectionAdapter for WindowConnectionAdapter {
    fn supports(&self, container: &Container) -> bool {
        container.is::<Window>()
    }

    fn content(&self, container: &Container) -> Result<Vec<Value>> {
        Ok(self.window(container)?.content().to_vec())
    }

    fn cursor_at(&self, container: &Container, index: usize) -> Result<String> {
        let window = self.window(container)?;
        if index >= window.len() {
            return Err(GraphQLError::PaginationError(format!(
                "index {index} is outside a window of {} items",
                window.len()
            )));
        }
        self.codec.encode(&window.position_at(index))
    }

    /// Only offset windows can tell: the first item sits past offset 0.
    fn has_previous(&self, container: &Container) -> Result<bool> {
        let window = self.window(container)?;
        if window.is_empty() {
            return Ok(false);
        }
        Ok(matches!(
            window.position_at(0),
            ScrollPosition::Offset(position) if position.offset().is_some_and(|offset| offset > 0)
        ))
    }

    fn has_next(&self, container: &Container) -> Result<bool> {
        Ok(self.window(container)?.has_next())
    }
}

/// Adapter for [`Slice`], cursors carry the absolute offset of each item
pub struct SliceConnectionAdapter {
    codec: Arc<CursorCodec>,
}

impl SliceConnectionAdapter {
    pub fn new(codec: Arc<CursorCodec>) -> Self {
        Self { codec }
    }

    fn slice<'a>(&self, container: &'a Container) -> Result<&'a Slice> {
        container.downcast_ref::<Slice>().ok_or_else(|| unsupported(container))
    }
}

impl ConnectionAdapter for SliceConnectionAdapter {
    fn supports(&self, container: &Container) -> bool {
        container.is::<Slice>()
    }

    fn content(&self, container: &Container) -> Result<Vec<Value>> {
        Ok(self.slice(container)?.content().to_vec())
    }

    fn cursor_at(&self, container: &Container, index: usize) -> Result<String> {
        let slice = self.slice(container)?;
        let offset = slice.offset_at(index).ok_or_else(|| {
            GraphQLError::PaginationError(format!(
                "offset of item {index} on page {} is out of range",
                slice.page()
            ))
        })?;
        self.codec.encode(&ScrollPosition::offset(offset))
    }

    fn has_previous(&self, container: &Container) -> Result<bool> {
        Ok(self.slice(container)?.has_previous())
    }

    fn has_next(&self, container: &Container) -> Result<bool> {
        Ok(self.slice(container)?.has_next())
    }
}

/// Ordered set of adapters; the first one supporting a container handles it
#[derive(Clone, Default)]
pub struct ConnectionAdapters {
    adapters: Vec<Arc<dyn ConnectionAdapter>>,
}

impl ConnectionAdapters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Window and slice adapters sharing one codec
    pub fn with_defaults(codec: Arc<CursorCodec>) -> Self {
        Self::new()
            .register(WindowConnectionAdapter::new(codec.clone()))
            .register(SliceConnectionAdapter::new(codec))
    }

    pub fn register(mut self, adapter: impl ConnectionAdapter + 'static) -> Self {
        self.adapters.push(Arc::new(adapter));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    fn adapter_for(&self, container: &Container) -> Result<&dyn ConnectionAdapter> {
        self.adapters
            .iter()
            .find(|adapter| adapter.supports(container))
            .map(|adapter| adapter.as_ref())
            .ok_or_else(|| unsupported(container))
    }
}

impl ConnectionAdapter for ConnectionAdapters {
    fn supports(&self, container: &Container) -> bool {
        self.adapters.iter().any(|adapter| adapter.supports(container))
    }

    fn content(&self, container: &Container) -> Result<Vec<Value>> {
        self.adapter_for(container)?.content(container)
    }

    fn cursor_at(&self, container: &Container, index: usize) -> Result<String> {
        self.adapter_for(container)?.cursor_at(container, index)
    }

    fn has_previous(&self, container: &Container) -> Result<bool> {
        self.adapter_for(container)?.has_previous(container)
    }

    fn has_next(&self, container: &Container) -> Result<bool> {
        self.adapter_for(container)?.has_next(container)
    }
}
