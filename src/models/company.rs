// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Company directory entries.

use crate::db::collections;
use crate::models::{contains_term, impl_entity, null_as_default};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// A company listed in the directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Company {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_active: bool,
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// Categories this company is listed under
    #[serde(default, deserialize_with = "null_as_default")]
    pub category_ids: Vec<String>,
    #[serde(default)]
    pub image_name: Option<String>,
    #[serde(default, rename = "markURL")]
    pub mark_url: Option<String>,
    #[serde(default, rename = "logoURL")]
    pub logo_url: Option<String>,
    #[serde(default)]
    #[validate(url)]
    pub website_url: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub postal_address: Option<PostalAddress>,
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

impl_entity!(Company, collections::COMPANIES);

/// Mailing address, shared by companies and people.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PostalAddress {
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub street: String,
    #[serde(default, deserialize_with = "null_as_default", rename = "street_2")]
    pub street_2: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub postal_code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub country: String,
}

impl Company {
    /// Match a lowercased search term against name, description, city and state.
    pub fn matches_term(&self, term: &str) -> bool {
        let address = self.postal_address.as_ref();
        contains_term(Some(&self.name), term)
            || contains_term(Some(&self.description), term)
            || contains_term(address.map(|a| a.city.as_str()), term)
            || contains_term(address.map(|a| a.state.as_str()), term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_fields_decode_as_defaults() {
        let company: Company = serde_json::from_value(serde_json::json!({
            "id": "c1",
            "name": "Acme",
            "isActive": null,
            "description": null,
            "categoryIds": null,
            "postalAddress": { "city": "Springfield", "street": null },
        }))
        .unwrap();

        assert!(!company.is_active);
        assert_eq!(company.description, "");
        assert!(company.category_ids.is_empty());
        let address = company.postal_address.unwrap();
        assert_eq!(address.city, "Springfield");
        assert_eq!(address.street, "");
    }
}
