// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Directory presets and favourites against the in-memory store.

mod common;

use chrono::{TimeZone, Utc};
use common::test_context;
use directory_data::db::{collections, Value};
use directory_data::fields;
use directory_data::models::{Ad, AdType, Category, Company, Event, Person};
use directory_data::services::directory::{favorite_companies, favorite_people, search_people};

#[tokio::test]
async fn test_people_by_company_in_weight_order() {
    let (ctx, _store) = test_context();
    let mutations = ctx.mutations();
    for (id, name, company, weight, active) in [
        ("p1", "Zed", "c1", 2.0, true),
        ("p2", "Amy", "c1", 1.0, true),
        ("p3", "Bob", "c1", 0.5, false),
        ("p4", "Cat", "c2", 0.0, true),
    ] {
        mutations
            .set(
                &format!("contact/{id}"),
                &fields! {
                    "firstName" => name,
                    "companyId" => company,
                    "weight" => weight,
                    "isActive" => active,
                },
            )
            .await
            .unwrap();
    }

    let presets = ctx.presets();
    let binding = ctx.bind_preset::<Person>(&presets.people_by_company(Some("c1")));
    let state = binding.settled().await;
    let names: Vec<_> = state.items.iter().map(|p| p.first_name.as_str()).collect();
    assert_eq!(names, vec!["Amy", "Zed"]);

    assert_eq!(search_people(&state.items, "ZED").len(), 1);
}

#[tokio::test]
async fn test_upcoming_and_past_events() {
    let (ctx, _store) = test_context();
    let mutations = ctx.mutations();
    let events = [
        ("e1", "Launch", "2024-07-01T10:00:00.000Z", "2024-07-01T12:00:00.000Z"),
        ("e2", "Meetup", "2024-06-15T18:00:00.000Z", "2024-06-15T20:00:00.000Z"),
        ("e3", "Retro", "2024-05-01T09:00:00.000Z", "2024-05-01T10:00:00.000Z"),
        ("e4", "Kickoff", "2024-04-01T09:00:00.000Z", "2024-04-01T10:00:00.000Z"),
    ];
    for (id, title, start, end) in events {
        mutations
            .set(
                &format!("{}/{}", collections::EVENTS, id),
                &fields! {
                    "title" => title,
                    "startDate" => start,
                    "endDate" => end,
                    "isActive" => true,
                },
            )
            .await
            .unwrap();
    }

    let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let presets = ctx.presets();

    let upcoming = ctx.bind_preset::<Event>(&presets.upcoming_events(now));
    let titles: Vec<_> = upcoming
        .settled()
        .await
        .items
        .into_iter()
        .map(|e| e.title)
        .collect();
    assert_eq!(titles, vec!["Meetup", "Launch"]);

    let past = ctx.bind_preset::<Event>(&presets.past_events(now));
    let state = past.settled().await;
    let titles: Vec<_> = state.items.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Retro", "Kickoff"]);
    assert_eq!(
        state.items[0].start_date,
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap())
    );
}

#[tokio::test]
async fn test_ads_by_type_and_categories() {
    let (ctx, _store) = test_context();
    let mutations = ctx.mutations();
    mutations
        .set(
            "ad/a1",
            &fields! {
                "name" => "Top banner",
                "type" => AdType::Banner,
                "linkURL" => "https://example.com/top",
                "isActive" => true,
            },
        )
        .await
        .unwrap();
    mutations
        .set(
            "ad/a2",
            &fields! {
                "name" => "Splash",
                "type" => AdType::Full,
                "linkURL" => "https://example.com/splash",
                "isActive" => true,
            },
        )
        .await
        .unwrap();
    mutations
        .set("category/tech", &fields! { "name" => "Tech" })
        .await
        .unwrap();

    let presets = ctx.presets();
    let banners = ctx.bind_preset::<Ad>(&presets.ads_by_type(AdType::Banner));
    let state = banners.settled().await;
    assert_eq!(state.items.len(), 1);
    assert_eq!(state.items[0].kind, AdType::Banner);

    let categories = ctx.bind_preset::<Category>(&presets.categories());
    let state = categories.settled().await;
    assert_eq!(state.items.len(), 1);
    assert_eq!(state.items[0].id, "tech");
}

#[tokio::test]
async fn test_favorites_skip_missing_and_inactive() {
    let (ctx, _store) = test_context();
    let mutations = ctx.mutations();
    for (id, name, active) in [("c1", "Zeta", true), ("c2", "Acme", true), ("c3", "Gone", false)] {
        mutations
            .set(
                &format!("company/{id}"),
                &fields! { "name" => name, "isActive" => active },
            )
            .await
            .unwrap();
    }
    mutations
        .set(
            "contact/p1",
            &fields! { "firstName" => "Ada", "lastName" => "Lovelace", "isActive" => true },
        )
        .await
        .unwrap();

    let ids: Vec<String> = ["c1", "c2", "c3", "missing", "p1"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let companies: Vec<Company> = favorite_companies(&mutations, &ids).await;
    let names: Vec<_> = companies.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Acme", "Zeta"]);

    let people = favorite_people(&mutations, &ids).await;
    assert_eq!(people.len(), 1);
    assert_eq!(people[0].full_name(), "Ada Lovelace");
}

#[tokio::test]
async fn test_weighted_presets_hide_inactive() {
    let (ctx, _store) = test_context();
    let mutations = ctx.mutations();
    for (id, name, weight, active) in [
        ("t1", "Home", 1_i64, true),
        ("t2", "Old", 0, false),
        ("t3", "About", 2, true),
    ] {
        mutations
            .set(
                &format!("{}/{}", collections::TABS, id),
                &fields! {
                    "name" => name,
                    "weight" => Value::Integer(weight),
                    "isActive" => active,
                },
            )
            .await
            .unwrap();
    }

    let tabs = ctx.bind_preset::<serde_json::Value>(&ctx.presets().tabs());
    let state = tabs.settled().await;
    let names: Vec<_> = state
        .items
        .iter()
        .filter_map(|t| t.get("name").and_then(|n| n.as_str()))
        .collect();
    assert_eq!(names, vec!["Home", "About"]);
}
