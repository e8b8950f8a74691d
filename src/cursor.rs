//! Scroll positions and the opaque cursors that carry them
//!
//! A cursor is a compact JSON document wrapped in standard base64:
//!
//! - offset: `{"offset":29}` (`{"offset":null}` for the initial position)
//! - keyset: `{"keyset":{"keys":{"id":11},"direction":"forward"}}`
//!
//! Keyset values that JSON cannot represent unambiguously (64-bit integers,
//! timestamps) are written as a `["Kind", value]` pair and only accepted when
//! the codec has that [`TypedValueKind`] enabled.

use std::collections::BTreeSet;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::config::PaginationConfig;
use crate::{GraphQLError, Result};

/// Scroll direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    pub fn is_forward(self) -> bool {
        matches!(self, Direction::Forward)
    }

    pub fn reverse(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// Position expressed as the offset of the last row seen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OffsetPosition {
    offset: Option<u64>,
}

impl OffsetPosition {
    /// Position before the first row
    pub const fn initial() -> Self {
        Self { offset: None }
    }

    pub const fn at(offset: u64) -> Self {
        Self { offset: Some(offset) }
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn is_initial(&self) -> bool {
        self.offset.is_none()
    }
}

/// A single sort-key value inside a keyset position
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    Null,
    Bool(bool),
    Int(i32),
    Float(f64),
    String(String),
    /// Requires [`TypedValueKind::Long`]
    Long(i64),
    /// Requires [`TypedValueKind::DateTime`]
    DateTime(DateTime<Utc>),
}

impl KeyValue {
    /// Extension kind needed to put this value in a cursor, if any
    pub fn typed_kind(&self) -> Option<TypedValueKind> {
        match self {
            KeyValue::Long(_) => Some(TypedValueKind::Long),
            KeyValue::DateTime(_) => Some(TypedValueKind::DateTime),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            KeyValue::Int(value) => Some(i64::from(*value)),
            KeyValue::Long(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            KeyValue::String(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for KeyValue {
    fn from(value: bool) -> Self {
        KeyValue::Bool(value)
    }
}

impl From<i32> for KeyValue {
    fn from(value: i32) -> Self {
        KeyValue::Int(value)
    }
}

impl From<i64> for KeyValue {
    fn from(value: i64) -> Self {
        KeyValue::Long(value)
    }
}

impl From<f64> for KeyValue {
    fn from(value: f64) -> Self {
        KeyValue::Float(value)
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue::String(value.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(value: String) -> Self {
        KeyValue::String(value)
    }
}

impl From<DateTime<Utc>> for KeyValue {
    fn from(value: DateTime<Utc>) -> Self {
        KeyValue::DateTime(value)
    }
}

/// Position expressed as the sort-key values of the last row seen
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeysetPosition {
    keys: IndexMap<String, KeyValue>,
    direction: Direction,
}

impl KeysetPosition {
    pub fn initial_forward() -> Self {
        Self::default()
    }

    pub fn initial_backward() -> Self {
        Self {
            keys: IndexMap::new(),
            direction: Direction::Backward,
        }
    }

    pub fn of(keys: IndexMap<String, KeyValue>, direction: Direction) -> Self {
        Self { keys, direction }
    }

    /// Forward position from `(key, value)` pairs, kept in the given order
    pub fn forward<K, V>(keys: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<KeyValue>,
    {
        Self {
            keys: keys.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            direction: Direction::Forward,
        }
    }

    pub fn keys(&self) -> &IndexMap<String, KeyValue> {
        &self.keys
    }

    pub fn get(&self, key: &str) -> Option<&KeyValue> {
        self.keys.get(key)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_initial(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Where a page starts
#[derive(Debug, Clone, PartialEq)]
pub enum ScrollPosition {
    Offset(OffsetPosition),
    Keyset(KeysetPosition),
}

impl ScrollPosition {
    pub fn offset(offset: u64) -> Self {
        ScrollPosition::Offset(OffsetPosition::at(offset))
    }

    pub fn keyset<K, V>(keys: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<KeyValue>,
    {
        ScrollPosition::Keyset(KeysetPosition::forward(keys))
    }

    pub fn is_initial(&self) -> bool {
        match self {
            ScrollPosition::Offset(position) => position.is_initial(),
            ScrollPosition::Keyset(position) => position.is_initial(),
        }
    }
}

impl From<OffsetPosition> for ScrollPosition {
    fn from(position: OffsetPosition) -> Self {
        ScrollPosition::Offset(position)
    }
}

impl From<KeysetPosition> for ScrollPosition {
    fn from(position: KeysetPosition) -> Self {
        ScrollPosition::Keyset(position)
    }
}

/// Keyset value types carried beyond what JSON supports natively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypedValueKind {
    Long,
    DateTime,
}

impl TypedValueKind {
    fn tag(self) -> &'static str {
        match self {
            TypedValueKind::Long => "Long",
            TypedValueKind::DateTime => "DateTime",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "Long" => Some(TypedValueKind::Long),
            "DateTime" => Some(TypedValueKind::DateTime),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase", deny_unknown_fields)]
enum CursorDocument {
    Offset(Option<u64>),
    Keyset {
        keys: IndexMap<String, Json>,
        #[serde(default)]
        direction: Direction,
    },
}

/// Cursor encoding/decoding
///
/// The only component allowed to build or read the encoded form of a
/// [`ScrollPosition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorCodec {
    typed_values: BTreeSet<TypedValueKind>,
}

impl Default for CursorCodec {
    fn default() -> Self {
        Self::from_config(&PaginationConfig::default())
    }
}

impl CursorCodec {
    /// Codec limited to JSON-native keyset values
    pub fn baseline() -> Self {
        Self {
            typed_values: BTreeSet::new(),
        }
    }

    pub fn from_config(config: &PaginationConfig) -> Self {
        Self {
            typed_values: config.typed_cursor_values.iter().copied().collect(),
        }
    }

    /// Enable an extra keyset value type
    pub fn with_typed_value(mut self, kind: TypedValueKind) -> Self {
        self.typed_values.insert(kind);
        self
    }

    pub fn supports(&self, kind: TypedValueKind) -> bool {
        self.typed_values.contains(&kind)
    }

    /// Encode a position to an opaque cursor
    pub fn encode(&self, position: &ScrollPosition) -> Result<String> {
        let document = match position {
            ScrollPosition::Offset(position) => CursorDocument::Offset(position.offset()),
            ScrollPosition::Keyset(position) => CursorDocument::Keyset {
                keys: position
                    .keys()
                    .iter()
                    .map(|(key, value)| Ok((key.clone(), self.value_to_json(value)?)))
                    .collect::<Result<_>>()?,
                direction: position.direction(),
            },
        };

        let json = serde_json::to_string(&document)
            .map_err(|e| GraphQLError::InvalidCursor(e.to_string()))?;
        Ok(BASE64.encode(json.as_bytes()))
    }

    /// Decode an opaque cursor back to its position
    pub fn decode(&self, cursor: &str) -> Result<ScrollPosition> {
        let bytes = BASE64
            .decode(cursor.as_bytes())
            .map_err(|e| GraphQLError::InvalidCursor(e.to_string()))?;
        let document: CursorDocument =
            serde_json::from_slice(&bytes).map_err(|e| GraphQLError::InvalidCursor(e.to_string()))?;

        match document {
            CursorDocument::Offset(offset) => Ok(ScrollPosition::Offset(OffsetPosition { offset })),
            CursorDocument::Keyset { keys, direction } => {
                let keys = keys
                    .into_iter()
                    .map(|(key, value)| Ok((key, self.value_from_json(value)?)))
                    .collect::<Result<_>>()?;
                Ok(ScrollPosition::Keyset(KeysetPosition::of(keys, direction)))
            }
        }
    }

    fn value_to_json(&self, value: &KeyValue) -> Result<Json> {
        if let Some(kind) = value.typed_kind() {
            self.require(kind)?;
        }

        let json = match value {
            KeyValue::Null => Json::Null,
            KeyValue::Bool(value) => Json::Bool(*value),
            KeyValue::Int(value) => Json::from(*value),
            KeyValue::Float(value) => serde_json::Number::from_f64(*value)
                .map(Json::Number)
                .ok_or_else(|| {
                    GraphQLError::InvalidCursor(format!("cannot encode non-finite value {value}"))
                })?,
            KeyValue::String(value) => Json::String(value.clone()),
            KeyValue::Long(value) => {
                Json::Array(vec![TypedValueKind::Long.tag().into(), Json::from(*value)])
            }
            KeyValue::DateTime(value) => Json::Array(vec![
                TypedValueKind::DateTime.tag().into(),
                Json::String(value.to_rfc3339()),
            ]),
        };
        Ok(json)
    }

    fn value_from_json(&self, json: Json) -> Result<KeyValue> {
        match json {
            Json::Null => Ok(KeyValue::Null),
            Json::Bool(value) => Ok(KeyValue::Bool(value)),
            Json::String(value) => Ok(KeyValue::String(value)),
            Json::Number(number) => {
                if number.is_f64() {
                    return number
                        .as_f64()
                        .map(KeyValue::Float)
                        .ok_or_else(|| {
                            GraphQLError::InvalidCursor(format!("unreadable number {number}"))
                        });
                }
                let value = number.as_i64().ok_or_else(|| {
                    GraphQLError::InvalidCursor(format!("number out of range: {number}"))
                })?;
                match i32::try_from(value) {
                    Ok(value) => Ok(KeyValue::Int(value)),
                    Err(_) => {
                        self.require(TypedValueKind::Long)?;
                        Ok(KeyValue::Long(value))
                    }
                }
            }
            Json::Array(items) => self.typed_value_from_json(items),
            Json::Object(_) => Err(GraphQLError::InvalidCursor(
                "nested objects are not valid key values".to_string(),
            )),
        }
    }

    fn typed_value_from_json(&self, items: Vec<Json>) -> Result<KeyValue> {
        let [tag, value]: [Json; 2] = items.try_into().map_err(|_| {
            GraphQLError::InvalidCursor("typed value must be a [kind, value] pair".to_string())
        })?;
        let kind = tag
            .as_str()
            .and_then(TypedValueKind::from_tag)
            .ok_or_else(|| GraphQLError::InvalidCursor(format!("unknown value type {tag}")))?;
        self.require(kind)?;

        match kind {
            TypedValueKind::Long => value.as_i64().map(KeyValue::Long).ok_or_else(|| {
                GraphQLError::InvalidCursor(format!("expected a 64-bit integer, got {value}"))
            }),
            TypedValueKind::DateTime => {
                let text = value.as_str().ok_or_else(|| {
                    GraphQLError::InvalidCursor(format!("expected a timestamp, got {value}"))
                })?;
                DateTime::parse_from_rfc3339(text)
                    .map(|value| KeyValue::DateTime(value.with_timezone(&Utc)))
                    .map_err(|e| GraphQLError::InvalidCursor(format!("Invalid DateTime: {e}")))
            }
        }
    }

    fn require(&self, kind: TypedValueKind) -> Result<()> {
        if self.supports(kind) {
            Ok(())
        } else {
            Err(GraphQLError::InvalidCursor(format!(
                "cursor value type {} is not enabled",
                kind.tag()
            )))
        }
    }
}
