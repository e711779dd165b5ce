// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Entity cache behaviour through the directory context.

mod common;

use common::test_context;
use directory_data::models::{Company, Person};

#[test]
fn test_remember_and_recall_entity() {
    let (ctx, _store) = test_context();
    let company = Company {
        id: "c1".into(),
        name: "Acme".into(),
        is_active: true,
        ..Company::default()
    };

    ctx.remember(&company, "Acme").unwrap();

    let cached: Company = ctx.recall("c1").unwrap();
    assert_eq!(cached, company);
    assert_eq!(ctx.cache.get_name("c1").as_deref(), Some("Acme"));
    assert!(ctx.recall::<Company>("c2").is_none());
}

#[test]
fn test_recall_misses_after_clear() {
    let (ctx, _store) = test_context();
    let company = Company {
        id: "c1".into(),
        name: "Acme".into(),
        ..Company::default()
    };
    ctx.remember(&company, "Acme").unwrap();
    ctx.cache.clear();
    assert!(ctx.recall::<Company>("c1").is_none());
    assert!(ctx.cache.get_name("c1").is_none());
}

#[test]
fn test_clones_share_entries() {
    let (ctx, _store) = test_context();
    let other = ctx.clone();
    let person = Person {
        id: "p1".into(),
        first_name: "Ada".into(),
        ..Person::default()
    };

    other.remember(&person, &person.full_name()).unwrap();
    assert_eq!(ctx.recall::<Person>("p1").map(|p| p.first_name), Some("Ada".into()));
}
