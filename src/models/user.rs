// SPDX-License-Identifier: MIT

//! User model for storage and API.

use serde::{Deserialize, Serialize};

/// User profile stored in Firestore, keyed by the identity-provider uid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Identity-provider uid (also used as document ID)
    pub uid: String,
    /// Email address
    pub email: String,
    /// Display name
    pub name: String,
    /// Role for route gating
    #[serde(default)]
    pub role: Role,
    /// Running sum of all awarded points.
    ///
    /// Invariant: equals the sum of `points_earned` over this user's scan
    /// documents after every committed mutation.
    #[serde(default)]
    pub total_points: u32,
    /// When the profile was created (RFC 3339)
    pub created_at: String,
}

impl User {
    /// Fresh attendee profile, created on first authenticated request.
    pub fn new_attendee(uid: &str, email: &str, name: &str) -> Self {
        Self {
            uid: uid.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            role: Role::Attendee,
            total_points: 0,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// User role. Ordered so that gating can use `>=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Attendee,
    Moderator,
    Admin,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering_for_gating() {
        assert!(Role::Admin >= Role::Moderator);
        assert!(Role::Moderator >= Role::Moderator);
        assert!(Role::Attendee < Role::Moderator);
    }

    #[test]
    fn test_missing_fields_default() {
        // Documents written by earlier app versions may lack role/points.
        let user: User = serde_json::from_str(
            r#"{"uid":"u1","email":"a@example.com","name":"A","created_at":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(user.role, Role::Attendee);
        assert_eq!(user.total_points, 0);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Moderator).unwrap(), "\"moderator\"");
    }
}
