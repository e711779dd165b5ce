// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Events.

use crate::db::collections;
use crate::models::{contains_term, impl_entity, null_as_default};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Event {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[validate(length(min = 1))]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subtitle: String,
    /// Free-form event type used for filtering
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default", rename = "imageURL")]
    pub image_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: EventLocation,
    #[serde(default, deserialize_with = "null_as_default")]
    pub actions: Vec<EventAction>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub weight: f64,
}

impl_entity!(Event, collections::EVENTS);

impl Event {
    /// Match a lowercased search term against title, subtitle, description and type.
    pub fn matches_term(&self, term: &str) -> bool {
        contains_term(Some(&self.title), term)
            || contains_term(Some(&self.subtitle), term)
            || contains_term(Some(&self.description), term)
            || contains_term(self.kind.as_deref(), term)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct EventLocation {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub zipcode: String,
}

/// Call-to-action button shown with an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct EventAction {
    pub label: String,
    #[serde(rename = "linkURL")]
    pub link_url: String,
    #[serde(default)]
    pub fill: Option<bool>,
    #[serde(default)]
    pub color: Option<String>,
}
