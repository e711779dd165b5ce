// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Structured logging setup.

use tracing_subscriber::filter::Directive;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize JSON logging filtered by `RUST_LOG`.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in ["directory_data=debug", "info"] {
        if let Ok(directive) = directive.parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }

    // Err means a subscriber is already installed
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .try_init();
}
