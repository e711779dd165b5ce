// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Typed directory entities.
//!
//! Field names follow the stored camelCase schema. Every entity carries its
//! document ID in `id`, which is injected on read and never written back as
//! a field.

pub mod ad;
pub mod category;
pub mod company;
pub mod content;
pub mod event;
pub mod navigation;
pub mod person;
pub mod tab;
pub mod user;

pub use ad::{Ad, AdType};
pub use category::Category;
pub use company::{Company, PostalAddress};
pub use content::{Community, Pillar, Resource};
pub use event::{Event, EventAction, EventLocation};
pub use navigation::NavigationItem;
pub use person::{ContactEmailAddress, ContactLink, ContactPhoneNumber, Person};
pub use tab::{Tab, TabAdvertisement};
pub use user::{Role, User};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// A document type stored in a fixed top-level collection.
pub trait Entity:
    Serialize + DeserializeOwned + Validate + Clone + Send + Sync + 'static
{
    /// Collection the entity lives in.
    const COLLECTION: &'static str;

    /// Document ID; empty for an entity not yet written.
    fn id(&self) -> &str;
}

macro_rules! impl_entity {
    ($ty:ty, $collection:expr) => {
        impl $crate::models::Entity for $ty {
            const COLLECTION: &'static str = $collection;

            fn id(&self) -> &str {
                &self.id
            }
        }
    };
}

pub(crate) use impl_entity;

/// Read an explicit `null` the same as a missing field.
///
/// Writes store cleared fields as `null`, so defaulted fields must accept it.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Case-insensitive substring match on an optional field.
pub(crate) fn contains_term(field: Option<&str>, term: &str) -> bool {
    field.is_some_and(|value| value.to_lowercase().contains(term))
}
