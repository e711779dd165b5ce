// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User profile and role models.

use crate::db::collections;
use crate::models::{impl_entity, null_as_default};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// User profile stored at `user/{uid}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct User {
    /// Auth provider UID (also the document ID)
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_active: bool,
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, rename = "photoURL")]
    #[validate(url)]
    pub photo_url: Option<String>,
    /// Role granting additional permissions
    #[serde(default)]
    pub role_id: Option<String>,
    /// Permissions granted directly to the user
    #[serde(default, deserialize_with = "null_as_default")]
    pub permission_ids: Vec<String>,
    /// Favourited company/person IDs
    #[serde(default, deserialize_with = "null_as_default")]
    pub favorite_ids: Vec<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing)]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_by: Option<String>,
    #[serde(default, skip_serializing)]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub modified_on: Option<DateTime<Utc>>,
}

impl_entity!(User, collections::USERS);

impl User {
    /// Fresh profile for a newly registered account.
    pub fn new_profile(uid: &str, email: &str) -> Self {
        Self {
            id: uid.to_string(),
            is_active: true,
            email: email.to_string(),
            ..Self::default()
        }
    }

    pub fn is_favorite(&self, item_id: &str) -> bool {
        self.favorite_ids.iter().any(|id| id == item_id)
    }
}

/// Named permission bundle stored at `role/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Role {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub permission_ids: Vec<String>,
}

impl_entity!(Role, collections::ROLES);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Document;
    use crate::fields;

    #[test]
    fn test_user_decodes_with_missing_optional_fields() {
        let doc = Document::new(
            "u1",
            fields! {
                "email" => "jane@example.com",
                "isActive" => true,
                "roleId" => "editor",
            },
        );
        let user: User = doc.decode(collections::USERS).unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.role_id.as_deref(), Some("editor"));
        assert!(user.permission_ids.is_empty());
        assert!(user.favorite_ids.is_empty());
    }

    #[test]
    fn test_new_profile_is_active_without_favorites() {
        let user = User::new_profile("u1", "jane@example.com");
        assert!(user.is_active);
        assert!(user.favorite_ids.is_empty());
        assert!(user.validate().is_ok());

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("id").is_none());
        assert!(json.get("createdOn").is_none());
    }
}
