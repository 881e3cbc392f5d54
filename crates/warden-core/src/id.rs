//! Route identifiers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for each registered route, using UUID v7.
///
/// Registration-time hooks key their bookkeeping by route id, so a hook that
/// must run once per route can recognise repeated calls.
///
/// # Example
///
/// ```
/// use warden_core::RouteId;
///
/// let a = RouteId::new();
/// let b = RouteId::new();
/// assert_ne!(a, b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteId(Uuid);

impl RouteId {
    /// Creates a new unique route ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RouteId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RouteId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RouteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_ids_are_unique() {
        let first = RouteId::new();
        let second = RouteId::new();
        assert_ne!(first, second);
    }

    #[test]
    fn test_route_id_roundtrips_through_uuid() {
        let uuid = Uuid::now_v7();
        let id = RouteId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), &uuid);
        assert_eq!(id.to_string(), uuid.to_string());
    }
}
