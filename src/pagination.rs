//! Relay-style connection payloads and arguments

use async_graphql::Value;
use indexmap::IndexMap;
use serde::Serialize;

use crate::arguments::PaginationRequest;
use crate::config::PaginationConfig;
use crate::cursor::{CursorCodec, Direction, ScrollPosition};
use crate::GraphQLError;

/// Page information
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_previous_page: bool,
    pub has_next_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

impl PageInfo {
    /// Value of a `PageInfo` field by its GraphQL name
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "hasPreviousPage" => Some(Value::Boolean(self.has_previous_page)),
            "hasNextPage" => Some(Value::Boolean(self.has_next_page)),
            "startCursor" => self.start_cursor.clone().map(Value::String),
            "endCursor" => self.end_cursor.clone().map(Value::String),
            _ => None,
        }
    }
}

/// Edge in a connection
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Edge {
    pub node: Value,
    pub cursor: String,
}

impl Edge {
    pub fn new(node: impl Into<Value>, cursor: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            cursor: cursor.into(),
        }
    }
}

/// Connection (paginated result)
///
/// Serializes to the GraphQL response shape
/// `{ edges: [{ node, cursor }], pageInfo: { ... } }`.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub edges: Vec<Edge>,
    pub page_info: PageInfo,
}

impl Connection {
    /// Create connection from edges
    ///
    /// Without edges this is [`Connection::empty`], whatever the flags say.
    pub fn new(edges: Vec<Edge>, has_previous: bool, has_next: bool) -> Self {
        if edges.is_empty() {
            return Self::empty();
        }

        let start_cursor = edges.first().map(|e| e.cursor.clone());
        let end_cursor = edges.last().map(|e| e.cursor.clone());

        Self {
            edges,
            page_info: PageInfo {
                has_previous_page: has_previous,
                has_next_page: has_next,
                start_cursor,
                end_cursor,
            },
        }
    }

    /// Create empty connection
    pub fn empty() -> Self {
        Self {
            edges: Vec::new(),
            page_info: PageInfo::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Value> {
        self.edges.iter().map(|e| &e.node)
    }
}

/// Pagination arguments of a GraphQL field
///
/// Follows the Relay Cursor Connections Specification:
/// https://relay.dev/graphql/connections.htm
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayArguments {
    /// Number of items to return (forward pagination)
    pub first: Option<i32>,

    /// Cursor to start from (forward pagination)
    pub after: Option<String>,

    /// Number of items to return (backward pagination)
    pub last: Option<i32>,

    /// Cursor to start from (backward pagination)
    pub before: Option<String>,
}

impl RelayArguments {
    pub fn forward(first: Option<i32>, after: Option<String>) -> Self {
        Self {
            first,
            after,
            ..Default::default()
        }
    }

    pub fn backward(last: Option<i32>, before: Option<String>) -> Self {
        Self {
            last,
            before,
            ..Default::default()
        }
    }

    /// Read the four arguments out of resolved field arguments
    pub fn from_arguments(arguments: &IndexMap<String, Value>) -> crate::Result<Self> {
        Ok(Self {
            first: count_argument(arguments, "first")?,
            after: cursor_argument(arguments, "after")?,
            last: count_argument(arguments, "last")?,
            before: cursor_argument(arguments, "before")?,
        })
    }

    /// Validate pagination input
    pub fn validate(&self, config: &PaginationConfig) -> crate::Result<()> {
        if self.first.is_some() && self.last.is_some() {
            return Err(GraphQLError::PaginationError(
                "Cannot specify both 'first' and 'last'".to_string(),
            ));
        }

        for (name, count) in [("first", self.first), ("last", self.last)] {
            let Some(count) = count else { continue };
            if count < 0 {
                return Err(GraphQLError::PaginationError(format!(
                    "'{name}' must be non-negative"
                )));
            }
            if count.unsigned_abs() > config.max_count {
                return Err(GraphQLError::PaginationError(format!(
                    "'{name}' cannot exceed {}",
                    config.max_count
                )));
            }
        }

        Ok(())
    }

    /// Check if forward pagination
    ///
    /// `last`/`before` only count when neither `first` nor `after` is given.
    pub fn is_forward(&self) -> bool {
        !self.is_backward()
    }

    /// Check if backward pagination
    pub fn is_backward(&self) -> bool {
        self.first.is_none()
            && self.after.is_none()
            && (self.last.is_some() || self.before.is_some())
    }

    /// Validate and normalize into a [`PaginationRequest`], decoding the
    /// cursor with `codec`.
    ///
    /// `last: n, before: <offset cursor>` asks for the `n` rows in front of
    /// that offset. The request then carries the offset of the row preceding
    /// them, or no position when they start at the first row, and a count
    /// capped at the rows that exist.
    pub fn to_request(
        &self,
        config: &PaginationConfig,
        codec: &CursorCodec,
    ) -> crate::Result<PaginationRequest> {
        self.validate(config)?;

        let (count, cursor, direction) = if self.is_backward() {
            (self.last, self.before.as_deref(), Direction::Backward)
        } else {
            (self.first, self.after.as_deref(), Direction::Forward)
        };
        let count = count.map(i32::unsigned_abs);
        let position = cursor.map(|cursor| codec.decode(cursor)).transpose()?;

        let request = match (direction, position, count) {
            (Direction::Backward, Some(ScrollPosition::Offset(before)), Some(count)) => {
                match before.offset() {
                    Some(before) if before > 0 => {
                        let count = u64::from(count).min(before);
                        let position = match before - count {
                            0 => None,
                            start => Some(ScrollPosition::offset(start - 1)),
                        };
                        let count = u32::try_from(count).unwrap_or(u32::MAX);
                        PaginationRequest::new(position, Some(count), direction)
                    }
                    _ => PaginationRequest::new(
                        Some(ScrollPosition::Offset(before)),
                        Some(count),
                        direction,
                    ),
                }
            }
            (direction, position, count) => PaginationRequest::new(position, count, direction),
        };
        Ok(request)
    }
}

fn count_argument(arguments: &IndexMap<String, Value>, name: &str) -> crate::Result<Option<i32>> {
    match arguments.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .as_i64()
            .and_then(|count| i32::try_from(count).ok())
            .map(Some)
            .ok_or_else(|| {
                GraphQLError::PaginationError(format!("'{name}' must be a 32-bit integer"))
            }),
        Some(other) => Err(GraphQLError::PaginationError(format!(
            "'{name}' must be an integer, got {other}"
        ))),
    }
}

fn cursor_argument(
    arguments: &IndexMap<String, Value>,
    name: &str,
) -> crate::Result<Option<String>> {
    match arguments.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(cursor)) => Ok(Some(cursor.clone())),
        Some(other) => Err(GraphQLError::PaginationError(format!(
            "'{name}' must be a cursor string, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(node: i32, cursor: &str) -> Edge {
        Edge::new(node, cursor)
    }

    #[test]
    fn test_connection_creation() {
        let conn = Connection::new(vec![edge(1, "a"), edge(2, "b")], false, true);
        assert_eq!(conn.edges.len(), 2);
        assert!(conn.page_info.has_next_page);
        assert!(!conn.page_info.has_previous_page);
        assert_eq!(conn.page_info.start_cursor.as_deref(), Some("a"));
        assert_eq!(conn.page_info.end_cursor.as_deref(), Some("b"));
    }

    #[test]
    fn test_connection_without_edges_is_empty() {
        let conn = Connection::new(Vec::new(), true, true);
        assert_eq!(conn, Connection::empty());
        assert!(!conn.page_info.has_next_page);
        assert!(conn.page_info.start_cursor.is_none());
    }

    #[test]
    fn test_connection_serializes_to_relay_shape() {
        let conn = Connection::new(vec![edge(7, "c7")], true, false);
        let json = serde_json::to_value(&conn).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "edges": [{ "node": 7, "cursor": "c7" }],
                "pageInfo": {
                    "hasPreviousPage": true,
                    "hasNextPage": false,
                    "startCursor": "c7",
                    "endCursor": "c7"
                }
            })
        );
    }

    #[test]
    fn test_validate_rejects_first_and_last() {
        let args = RelayArguments {
            first: Some(1),
            last: Some(1),
            ..Default::default()
        };
        assert!(matches!(
            args.validate(&PaginationConfig::default()),
            Err(GraphQLError::PaginationError(_))
        ));
    }

    #[test]
    fn test_validate_bounds() {
        let config = PaginationConfig::default();
        assert!(RelayArguments::forward(Some(-1), None).validate(&config).is_err());
        assert!(RelayArguments::forward(Some(101), None).validate(&config).is_err());
        assert!(RelayArguments::backward(Some(100), None).validate(&config).is_ok());
    }

    #[test]
    fn test_direction_detection() {
        assert!(RelayArguments::default().is_forward());
        assert!(RelayArguments::forward(Some(5), None).is_forward());
        assert!(RelayArguments::backward(Some(5), None).is_backward());
        assert!(RelayArguments::backward(None, Some("x".to_string())).is_backward());
    }

    #[test]
    fn test_to_request_decodes_cursor() {
        let codec = CursorCodec::default();
        let cursor = codec.encode(&ScrollPosition::keyset([("id", 9)])).unwrap();
        let args = RelayArguments::forward(Some(5), Some(cursor));

        let request = args.to_request(&PaginationConfig::default(), &codec).unwrap();
        assert_eq!(request.count(), Some(5));
        assert_eq!(request.direction(), Direction::Forward);
        assert_eq!(request.position(), Some(&ScrollPosition::keyset([("id", 9)])));
    }

    #[test]
    fn test_backward_offset_request_points_before_the_rows() {
        let codec = CursorCodec::default();
        let config = PaginationConfig::default();
        let before = |offset: u64| codec.encode(&ScrollPosition::offset(offset)).unwrap();

        let request = RelayArguments::backward(Some(10), Some(before(20)))
            .to_request(&config, &codec)
            .unwrap();
        assert_eq!(request.direction(), Direction::Backward);
        assert_eq!(request.count(), Some(10));
        assert_eq!(request.position(), Some(&ScrollPosition::offset(9)));

        let request = RelayArguments::backward(Some(10), Some(before(10)))
            .to_request(&config, &codec)
            .unwrap();
        assert_eq!(request.position(), None);
        assert_eq!(request.count(), Some(10));

        let request = RelayArguments::backward(Some(10), Some(before(4)))
            .to_request(&config, &codec)
            .unwrap();
        assert_eq!(request.position(), None);
        assert_eq!(request.count(), Some(4));

        let request = RelayArguments::backward(None, Some(before(4)))
            .to_request(&config, &codec)
            .unwrap();
        assert_eq!(request.position(), Some(&ScrollPosition::offset(4)));
        assert_eq!(request.count(), None);
    }

    #[test]
    fn test_from_arguments() {
        let mut arguments = IndexMap::new();
        arguments.insert("first".to_string(), Value::from(3));
        arguments.insert("after".to_string(), Value::from("abc"));
        arguments.insert("last".to_string(), Value::Null);

        let args = RelayArguments::from_arguments(&arguments).unwrap();
        assert_eq!(args, RelayArguments::forward(Some(3), Some("abc".to_string())));

        arguments.insert("first".to_string(), Value::from(i64::from(i32::MAX) + 1));
        assert!(matches!(
            RelayArguments::from_arguments(&arguments),
            Err(GraphQLError::PaginationError(_))
        ));

        arguments.insert("first".to_string(), Value::from(1));
        arguments.insert("before".to_string(), Value::from(false));
        assert!(RelayArguments::from_arguments(&arguments).is_err());
    }

    #[test]
    fn test_page_info_fields() {
        let conn = Connection::new(vec![edge(1, "a"), edge(2, "b")], false, true);
        let page_info = &conn.page_info;
        assert_eq!(page_info.field("hasNextPage"), Some(Value::Boolean(true)));
        assert_eq!(page_info.field("hasPreviousPage"), Some(Value::Boolean(false)));
        assert_eq!(page_info.field("endCursor"), Some(Value::from("b")));
        assert_eq!(Connection::empty().page_info.field("startCursor"), None);
        assert_eq!(page_info.field("edges"), None);
    }

    #[test]
    fn test_to_request_rejects_bad_cursor() {
        let args = RelayArguments::forward(Some(5), Some("%%%".to_string()));
        let result = args.to_request(&PaginationConfig::default(), &CursorCodec::default());
        assert!(matches!(result, Err(GraphQLError::InvalidCursor(_))));
    }
}
