//! Pagination settings

use serde::{Deserialize, Serialize};

use crate::cursor::TypedValueKind;
use crate::{GraphQLError, Result};

/// Page size used when a request names no count
pub const DEFAULT_COUNT: u32 = 20;

/// Largest `first`/`last` a client may ask for
pub const MAX_COUNT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_count: u32,
    pub max_count: u32,
    /// Keyset value types the cursor codec accepts beyond plain JSON values
    pub typed_cursor_values: Vec<TypedValueKind>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_count: DEFAULT_COUNT,
            max_count: MAX_COUNT,
            typed_cursor_values: vec![TypedValueKind::Long, TypedValueKind::DateTime],
        }
    }
}

impl PaginationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_count == 0 {
            return Err(GraphQLError::Configuration(
                "'default_count' must be at least 1".to_string(),
            ));
        }
        if self.max_count < self.default_count {
            return Err(GraphQLError::Configuration(format!(
                "'max_count' ({}) cannot be below 'default_count' ({})",
                self.max_count, self.default_count
            )));
        }
        Ok(())
    }
}
