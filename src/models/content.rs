// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Home page content blocks: community links, pillars and resources.
//!
//! All three share one shape and are ordered by `weight`.

use crate::db::collections;
use crate::models::{impl_entity, null_as_default};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

macro_rules! content_block {
    ($(#[$meta:meta])* $name:ident, $collection:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
        #[serde(rename_all = "camelCase")]
        #[cfg_attr(feature = "binding-generation", derive(TS))]
        #[cfg_attr(
            feature = "binding-generation",
            ts(export, export_to = "web/src/lib/generated/")
        )]
        pub struct $name {
            #[serde(default, skip_serializing)]
            pub id: String,
            #[validate(length(min = 1))]
            pub name: String,
            #[serde(default, deserialize_with = "null_as_default")]
            pub description: String,
            #[serde(default, deserialize_with = "null_as_default")]
            pub is_active: bool,
            #[serde(default, deserialize_with = "null_as_default")]
            pub weight: f64,
            #[serde(default, deserialize_with = "null_as_default", rename = "linkURL")]
            pub link_url: String,
            #[serde(default, deserialize_with = "null_as_default", rename = "imageURL")]
            pub image_url: String,
        }

        impl_entity!($name, $collection);
    };
}

content_block!(
    /// Community link.
    Community,
    collections::COMMUNITY
);
content_block!(Pillar, collections::PILLARS);
content_block!(Resource, collections::RESOURCES);
