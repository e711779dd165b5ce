// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! People, stored in the `contact` collection.

use crate::db::collections;
use crate::models::company::PostalAddress;
use crate::models::{contains_term, impl_entity, null_as_default};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// A person in the directory, optionally attached to a company.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Person {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_active: bool,
    #[validate(length(min = 1))]
    pub first_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_name: String,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub responsibilities: Option<String>,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub image_name: Option<String>,
    #[serde(default, rename = "imageURL")]
    pub image_url: Option<String>,
    /// Owning company, if any
    #[serde(default)]
    pub company_id: Option<String>,
    /// Display order within a company
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    #[validate(nested)]
    pub email_addresses: Vec<ContactEmailAddress>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub phone_numbers: Vec<ContactPhoneNumber>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub postal_addresses: Vec<PostalAddress>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub links: Vec<ContactLink>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

impl_entity!(Person, collections::CONTACTS);

impl Person {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Match a lowercased search term against names, title, about and skills.
    pub fn matches_term(&self, term: &str) -> bool {
        contains_term(Some(&self.first_name), term)
            || contains_term(Some(&self.last_name), term)
            || contains_term(self.job_title.as_deref(), term)
            || contains_term(self.about.as_deref(), term)
            || self
                .skills
                .iter()
                .any(|skill| contains_term(Some(skill), term))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ContactEmailAddress {
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(default, deserialize_with = "null_as_default", rename = "type")]
    pub kind: String,
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ContactPhoneNumber {
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(default, deserialize_with = "null_as_default", rename = "type")]
    pub kind: String,
    pub phone: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ContactLink {
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(default, deserialize_with = "null_as_default", rename = "type")]
    pub kind: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_term_checks_skills() {
        let person = Person {
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            skills: vec!["Rust".into(), "Kayaking".into()],
            ..Person::default()
        };
        assert!(person.matches_term("kayak"));
        assert!(person.matches_term("doe"));
        assert!(!person.matches_term("golang"));
        assert_eq!(person.full_name(), "Jane Doe");
    }

    #[test]
    fn test_invalid_email_address_fails_validation() {
        let person = Person {
            first_name: "Jane".into(),
            email_addresses: vec![ContactEmailAddress {
                label: "Work".into(),
                kind: "work".into(),
                email: "not-an-email".into(),
            }],
            ..Person::default()
        };
        assert!(person.validate().is_err());
    }
}
