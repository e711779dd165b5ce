// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Advertisements.

use crate::db::{collections, Value};
use crate::models::{impl_entity, null_as_default};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Placement an ad is designed for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum AdType {
    #[default]
    Banner,
    Full,
}

impl AdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdType::Banner => "banner",
            AdType::Full => "full",
        }
    }
}

impl From<AdType> for Value {
    fn from(kind: AdType) -> Self {
        Value::String(kind.as_str().to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Ad {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub keywords: Vec<String>,
    #[serde(rename = "linkURL")]
    #[validate(url)]
    pub link_url: String,
    #[serde(default, rename = "imageURL")]
    pub image_url: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub kind: AdType,
}

impl_entity!(Ad, collections::ADS);
