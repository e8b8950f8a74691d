//! Turns normalized Relay pagination requests into backend page requests
//!
//! Offset backends get a page number computed from the last offset seen;
//! keyset backends get a page size and the keyset position to resume from.

use std::fmt;

use tracing::debug;

use crate::cursor::{Direction, KeysetPosition, OffsetPosition, ScrollPosition};
use crate::pagination::RelayArguments;
use crate::{GraphQLError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn reverse(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Order {
    pub property: String,
    pub direction: SortDirection,
}

impl Order {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Ordered list of sort orders; empty means unsorted
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Sort {
    orders: Vec<Order>,
}

impl Sort {
    pub fn unsorted() -> Self {
        Self::default()
    }

    pub fn by(orders: impl IntoIterator<Item = Order>) -> Self {
        Self {
            orders: orders.into_iter().collect(),
        }
    }

    pub fn and(mut self, order: Order) -> Self {
        self.orders.push(order);
        self
    }

    /// Same properties, every direction flipped
    pub fn reversed(&self) -> Self {
        Self {
            orders: self
                .orders
                .iter()
                .map(|order| Order {
                    property: order.property.clone(),
                    direction: order.direction.reverse(),
                })
                .collect(),
        }
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn is_unsorted(&self) -> bool {
        self.orders.is_empty()
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unsorted() {
            return f.write_str("UNSORTED");
        }
        for (i, order) in self.orders.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let direction = match order.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            write!(f, "{}: {direction}", order.property)?;
        }
        Ok(())
    }
}

/// Zero-based page of a fixed size
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageRequest {
    page: u64,
    size: u32,
    sort: Sort,
}

impl PageRequest {
    pub fn of(page: u64, size: u32) -> Result<Self> {
        if size == 0 {
            return Err(GraphQLError::PaginationError(
                "Page size must not be less than one".to_string(),
            ));
        }
        Ok(Self {
            page,
            size,
            sort: Sort::unsorted(),
        })
    }

    /// First page of the given size
    pub fn of_size(size: u32) -> Result<Self> {
        Self::of(0, size)
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    /// Offset of the first row of this page
    pub fn offset(&self) -> u64 {
        self.page.saturating_mul(u64::from(self.size))
    }
}

impl fmt::Display for PageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page request [number: {}, size {}, sort: {}]", self.page, self.size, self.sort)
    }
}

/// Normalized pagination request: how many items, which way, from where
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PaginationRequest {
    count: Option<u32>,
    direction: Direction,
    position: Option<ScrollPosition>,
}

impl PaginationRequest {
    pub fn new(position: Option<ScrollPosition>, count: Option<u32>, direction: Direction) -> Self {
        Self {
            count,
            direction,
            position,
        }
    }

    /// `first: count`
    pub fn first(count: u32) -> Self {
        Self::new(None, Some(count), Direction::Forward)
    }

    /// `first: count, after: position`
    pub fn after(position: impl Into<ScrollPosition>, count: Option<u32>) -> Self {
        Self::new(Some(position.into()), count, Direction::Forward)
    }

    /// `last: count`
    pub fn last(count: u32) -> Self {
        Self::new(None, Some(count), Direction::Backward)
    }

    /// `last: count, before: position`
    pub fn before(position: impl Into<ScrollPosition>, count: Option<u32>) -> Self {
        Self::new(Some(position.into()), count, Direction::Backward)
    }

    pub fn count(&self) -> Option<u32> {
        self.count
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_forward(&self) -> bool {
        self.direction.is_forward()
    }

    pub fn position(&self) -> Option<&ScrollPosition> {
        self.position.as_ref()
    }
}

/// Page request and offset position for an offset-based backend.
///
/// The page number is derived from the last offset seen: `ceil((offset + 1) /
/// size)` moving forward, `floor((offset + 1) / size)` moving backward, and 0
/// from the initial position.
pub fn handle_offset_arguments(
    default_count: u32,
    request: &PaginationRequest,
    forward_sort: &Sort,
    backward_sort: &Sort,
) -> Result<(PageRequest, OffsetPosition)> {
    debug!(count = ?request.count(), forward = request.is_forward(), "handling offset arguments");

    let position = match request.position() {
        None => OffsetPosition::initial(),
        Some(ScrollPosition::Offset(position)) => *position,
        Some(other) => {
            return Err(GraphQLError::UnsupportedPosition(format!(
                "expected an offset position, got {other:?}"
            )))
        }
    };
    debug!(?position, is_initial = position.is_initial(), "offset position");

    let page_size = effective_page_size(default_count, request)?;
    let page_number = match position.offset() {
        None => 0,
        Some(offset) if request.is_forward() => {
            offset.saturating_add(1).div_ceil(u64::from(page_size))
        }
        Some(offset) => offset.saturating_add(1) / u64::from(page_size),
    };
    debug!(page_size, page_number, "offset page");

    let sort = select_sort(request, forward_sort, backward_sort);
    let page_request = PageRequest::of(page_number, page_size)?.with_sort(sort.clone());
    debug!(%page_request, "page request");

    Ok((page_request, position))
}

/// [`handle_offset_arguments`] for callers still holding the raw Relay
/// arguments. They are only logged; `request` drives the result.
pub fn handle_offset_relay_arguments(
    arguments: &RelayArguments,
    default_count: u32,
    request: &PaginationRequest,
    forward_sort: &Sort,
    backward_sort: &Sort,
) -> Result<(PageRequest, OffsetPosition)> {
    log_relay_arguments(arguments);
    handle_offset_arguments(default_count, request, forward_sort, backward_sort)
}

/// Page request and keyset position for a keyset-based backend.
///
/// Without a position the scroll starts from the initial forward keyset.
pub fn handle_keyset_arguments(
    default_count: u32,
    request: &PaginationRequest,
    forward_sort: &Sort,
    backward_sort: &Sort,
) -> Result<(PageRequest, KeysetPosition)> {
    debug!(count = ?request.count(), forward = request.is_forward(), "handling keyset arguments");

    let position = match request.position() {
        None => KeysetPosition::initial_forward(),
        Some(ScrollPosition::Keyset(position)) => position.clone(),
        Some(other) => {
            return Err(GraphQLError::UnsupportedPosition(format!(
                "expected a keyset position, got {other:?}"
            )))
        }
    };
    debug!(?position, is_initial = position.is_initial(), "keyset position");

    let page_size = effective_page_size(default_count, request)?;
    let sort = select_sort(request, forward_sort, backward_sort);
    let page_request = PageRequest::of_size(page_size)?.with_sort(sort.clone());
    debug!(%page_request, "page request");

    Ok((page_request, position))
}

/// [`handle_keyset_arguments`] for callers still holding the raw Relay
/// arguments. They are only logged; `request` drives the result.
pub fn handle_keyset_relay_arguments(
    arguments: &RelayArguments,
    default_count: u32,
    request: &PaginationRequest,
    forward_sort: &Sort,
    backward_sort: &Sort,
) -> Result<(PageRequest, KeysetPosition)> {
    log_relay_arguments(arguments);
    handle_keyset_arguments(default_count, request, forward_sort, backward_sort)
}

fn effective_page_size(default_count: u32, request: &PaginationRequest) -> Result<u32> {
    match request.count().unwrap_or(default_count) {
        0 => Err(GraphQLError::PaginationError(
            "Page size must not be less than one".to_string(),
        )),
        size => Ok(size),
    }
}

fn select_sort<'a>(
    request: &PaginationRequest,
    forward_sort: &'a Sort,
    backward_sort: &'a Sort,
) -> &'a Sort {
    if request.is_forward() {
        forward_sort
    } else {
        backward_sort
    }
}

fn log_relay_arguments(arguments: &RelayArguments) {
    debug!(
        first = ?arguments.first,
        after = ?arguments.after,
        last = ?arguments.last,
        before = ?arguments.before,
        "relay arguments"
    );
}
