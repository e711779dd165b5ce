// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use crate::db::collections;
use crate::models::{impl_entity, null_as_default};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Top-level tab in the app shell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Tab {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[validate(length(min = 1))]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subtitle: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub icon: String,
    /// Interstitial ad settings for this tab
    #[serde(default)]
    pub advertisement: Option<TabAdvertisement>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub weight: Option<f64>,
}

impl_entity!(Tab, collections::TABS);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TabAdvertisement {
    /// Show an ad every `frequency` visits
    pub frequency: u32,
}
