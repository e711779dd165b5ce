// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Directory query presets and client-side search.
//!
//! Presets that depend on a parameter come back disabled when the
//! parameter is missing, so a binding can be set up before the parameter
//! is known without touching the store.

use crate::db::{collections, Filter, FilterOp, QueryBuilder, QueryHandle, Sort, Value};
use crate::error::{AppError, Result};
use crate::models::{Ad, AdType, Company, Event, Person};
use crate::services::mutations::Mutations;
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use ring::rand::{SecureRandom, SystemRandom};

/// A query together with whether it should be live.
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub query: QueryHandle,
    pub enabled: bool,
}

impl Preset {
    fn enabled(query: QueryHandle) -> Self {
        Self {
            query,
            enabled: true,
        }
    }
}

/// Builds the directory's standard queries.
#[derive(Debug, Clone)]
pub struct DirectoryQueries {
    builder: QueryBuilder,
}

fn active() -> Filter {
    Filter::eq("isActive", true)
}

impl DirectoryQueries {
    pub fn new(builder: QueryBuilder) -> Self {
        Self { builder }
    }

    fn build(&self, collection: &str, filters: Vec<Filter>, sorts: Vec<Sort>) -> QueryHandle {
        self.builder.build(collection, filters, sorts, None)
    }

    /// Active records of `collection` ordered by `weight`.
    fn weighted(&self, collection: &str) -> Preset {
        Preset::enabled(self.build(collection, vec![active()], vec![Sort::asc("weight")]))
    }

    /// Active companies by name.
    pub fn companies(&self) -> Preset {
        Preset::enabled(self.build(
            collections::COMPANIES,
            vec![active()],
            vec![Sort::asc("name")],
        ))
    }

    pub fn companies_by_category(&self, category_id: Option<&str>) -> Preset {
        let mut filters = vec![active()];
        if let Some(id) = category_id {
            filters.push(Filter::new("categoryIds", FilterOp::ArrayContains, id));
        }
        Preset {
            query: self.build(collections::COMPANIES, filters, vec![Sort::asc("name")]),
            enabled: category_id.is_some_and(|id| !id.is_empty()),
        }
    }

    pub fn people_by_company(&self, company_id: Option<&str>) -> Preset {
        let mut filters = vec![active()];
        if let Some(id) = company_id {
            filters.push(Filter::eq("companyId", id));
        }
        Preset {
            query: self.build(collections::CONTACTS, filters, vec![Sort::asc("weight")]),
            enabled: company_id.is_some_and(|id| !id.is_empty()),
        }
    }

    /// Active people by first name.
    pub fn contacts(&self) -> Preset {
        Preset::enabled(self.build(
            collections::CONTACTS,
            vec![active()],
            vec![Sort::asc("firstName")],
        ))
    }

    pub fn events(&self) -> Preset {
        Preset::enabled(self.build(
            collections::EVENTS,
            vec![active()],
            vec![Sort::asc("weight"), Sort::asc("startDate")],
        ))
    }

    /// Events starting at or after `now`, soonest first.
    pub fn upcoming_events(&self, now: DateTime<Utc>) -> Preset {
        Preset::enabled(self.build(
            collections::EVENTS,
            vec![
                active(),
                Filter::new("startDate", FilterOp::GreaterThanOrEqual, instant(now)),
            ],
            vec![Sort::asc("startDate")],
        ))
    }

    /// Events that ended before `now`, most recent first.
    pub fn past_events(&self, now: DateTime<Utc>) -> Preset {
        Preset::enabled(self.build(
            collections::EVENTS,
            vec![
                active(),
                Filter::new("endDate", FilterOp::LessThan, instant(now)),
            ],
            vec![Sort::desc("startDate")],
        ))
    }

    pub fn events_by_type(&self, kind: Option<&str>) -> Preset {
        let mut filters = vec![active()];
        if let Some(kind) = kind {
            filters.push(Filter::eq("type", kind));
        }
        Preset {
            query: self.build(
                collections::EVENTS,
                filters,
                vec![Sort::asc("weight"), Sort::asc("startDate")],
            ),
            enabled: kind.is_some_and(|k| !k.is_empty()),
        }
    }

    pub fn ads(&self) -> Preset {
        Preset::enabled(self.build(collections::ADS, vec![active()], vec![Sort::asc("name")]))
    }

    pub fn ads_by_type(&self, kind: AdType) -> Preset {
        Preset::enabled(self.build(
            collections::ADS,
            vec![active(), Filter::eq("type", kind)],
            vec![Sort::asc("name")],
        ))
    }

    pub fn tabs(&self) -> Preset {
        self.weighted(collections::TABS)
    }

    pub fn navigation(&self) -> Preset {
        self.weighted(collections::NAVIGATION)
    }

    pub fn community(&self) -> Preset {
        self.weighted(collections::COMMUNITY)
    }

    pub fn pillars(&self) -> Preset {
        self.weighted(collections::PILLARS)
    }

    pub fn resources(&self) -> Preset {
        self.weighted(collections::RESOURCES)
    }

    /// Every category, active or not, in store order.
    pub fn categories(&self) -> Preset {
        Preset::enabled(self.build(collections::CATEGORIES, Vec::new(), Vec::new()))
    }
}

/// Event dates are stored as RFC 3339 strings, which order lexically.
fn instant(at: DateTime<Utc>) -> Value {
    Value::String(format_utc_rfc3339(at))
}

fn search<T: Clone>(items: &[T], term: &str, matches: impl Fn(&T, &str) -> bool) -> Vec<T> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return items.to_vec();
    }
    items
        .iter()
        .filter(|item| matches(item, &term))
        .cloned()
        .collect()
}

/// Filter companies by name, description, city or state.
pub fn search_companies(companies: &[Company], term: &str) -> Vec<Company> {
    search(companies, term, Company::matches_term)
}

/// Filter people by name, job title, about text or skills.
pub fn search_people(people: &[Person], term: &str) -> Vec<Person> {
    search(people, term, Person::matches_term)
}

/// Filter events by title, subtitle, description or type.
pub fn search_events(events: &[Event], term: &str) -> Vec<Event> {
    search(events, term, Event::matches_term)
}

/// Pick one ad uniformly at random.
pub fn pick_random_ad(ads: &[Ad]) -> Result<Option<&Ad>> {
    if ads.is_empty() {
        return Ok(None);
    }
    let mut bytes = [0u8; 8];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("system RNG unavailable")))?;
    let index = (u64::from_le_bytes(bytes) % ads.len() as u64) as usize;
    Ok(ads.get(index))
}

/// Fetch the active companies among `ids`, sorted by name.
///
/// IDs that fail to load are skipped with a warning.
pub async fn favorite_companies(mutations: &Mutations, ids: &[String]) -> Vec<Company> {
    let mut companies = Vec::new();
    for id in ids {
        let path = format!("{}/{}", collections::COMPANIES, id);
        match mutations.get::<Company>(&path).await {
            Ok(Some(company)) if company.is_active => companies.push(company),
            Ok(_) => {}
            Err(e) => tracing::warn!(id = %id, error = %e, "Failed to load favourite company"),
        }
    }
    companies.sort_by(|a, b| a.name.cmp(&b.name));
    companies
}

/// Fetch the active people among `ids`, sorted by first then last name.
pub async fn favorite_people(mutations: &Mutations, ids: &[String]) -> Vec<Person> {
    let mut people = Vec::new();
    for id in ids {
        let path = format!("{}/{}", collections::CONTACTS, id);
        match mutations.get::<Person>(&path).await {
            Ok(Some(person)) if person.is_active => people.push(person),
            Ok(_) => {}
            Err(e) => tracing::warn!(id = %id, error = %e, "Failed to load favourite person"),
        }
    }
    people.sort_by(|a, b| {
        a.first_name
            .cmp(&b.first_name)
            .then_with(|| a.last_name.cmp(&b.last_name))
    });
    people
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn queries() -> DirectoryQueries {
        DirectoryQueries::new(QueryBuilder::new(1000))
    }

    #[test]
    fn test_parameterised_presets_disable_without_parameter() {
        let q = queries();
        assert!(!q.companies_by_category(None).enabled);
        assert!(!q.companies_by_category(Some("")).enabled);
        assert!(q.companies_by_category(Some("tech")).enabled);
        assert!(!q.people_by_company(None).enabled);
        assert!(!q.events_by_type(None).enabled);
    }

    #[test]
    fn test_presets_are_interned() {
        let q = queries();
        assert!(q.companies().query.ptr_eq(&q.companies().query));
        assert!(!q.companies().query.ptr_eq(&q.contacts().query));
    }

    #[test]
    fn test_upcoming_events_filter_on_start_date() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let preset = queries().upcoming_events(now);
        let key = preset.query.key().to_string();
        assert!(key.contains("startDate:>="), "{key}");
        assert!(key.contains("2024-06-01T12:00:00.000Z"), "{key}");
    }

    #[test]
    fn test_search_is_case_insensitive_and_blank_returns_all() {
        let companies = vec![
            Company {
                name: "Acme Rockets".into(),
                ..Company::default()
            },
            Company {
                name: "Globex".into(),
                description: "Makes ROCKET parts".into(),
                ..Company::default()
            },
            Company {
                name: "Initech".into(),
                ..Company::default()
            },
        ];
        assert_eq!(search_companies(&companies, "rocket").len(), 2);
        assert_eq!(search_companies(&companies, "   ").len(), 3);
        assert!(search_companies(&companies, "umbrella").is_empty());
    }

    #[test]
    fn test_pick_random_ad() {
        assert!(pick_random_ad(&[]).unwrap().is_none());
        let ads = vec![Ad {
            name: "Only".into(),
            ..Ad::default()
        }];
        assert_eq!(pick_random_ad(&ads).unwrap().map(|a| a.name.as_str()), Some("Only"));
    }
}
