//! Entity types served by the resolver

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Identifier of a [`User`] row.
///
/// Assigned by the store and immutable once created. Serialized as a bare
/// integer so cached JSON matches the row shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// The raw integer value.
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Whether this id is in the range the store ever assigns.
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl From<i64> for UserId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl From<UserId> for i64 {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self)
    }
}

/// A user row from the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct User {
    /// Primary key.
    #[cfg_attr(feature = "openapi", schema(value_type = i64))]
    pub id: UserId,
    pub name: String,
    pub age: i32,
}

impl User {
    pub fn new(id: impl Into<UserId>, name: impl Into<String>, age: i32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            age,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_parse() {
        assert_eq!("42".parse::<UserId>().unwrap(), UserId::new(42));
        assert_eq!(" 7 ".parse::<UserId>().unwrap(), UserId::new(7));
        assert!("abc".parse::<UserId>().is_err());
        assert!("".parse::<UserId>().is_err());
        assert!("1.5".parse::<UserId>().is_err());
    }

    #[test]
    fn test_user_id_display_is_bare_integer() {
        assert_eq!(UserId::new(1).to_string(), "1");
        assert_eq!(UserId::new(-3).to_string(), "-3");
    }

    #[test]
    fn test_user_id_positive() {
        assert!(UserId::new(1).is_positive());
        assert!(!UserId::new(0).is_positive());
        assert!(!UserId::new(-1).is_positive());
    }

    #[test]
    fn test_user_serializes_as_row_shape() {
        let user = User::new(1, "Alice", 30);
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json, serde_json::json!({"id": 1, "name": "Alice", "age": 30}));
    }
}
